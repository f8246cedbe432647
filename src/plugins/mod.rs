//! Subsystems built on the core store.

pub mod archive;
pub mod injector;
pub mod journal;
pub mod learner;
pub mod registry;
pub mod rules;
pub mod scanner;
pub mod sync;
