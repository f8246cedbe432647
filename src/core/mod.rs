//! Core modules for teamkit's profile store.
//!
//! Shared primitives live here: the on-disk layout, configuration, the
//! profile broker (locking + audit), the DNA codec and the similarity
//! oracles used by rule and journal de-duplication.

pub mod broker;
pub mod config;
pub mod dna;
pub mod error;
pub mod fsio;
pub mod lock;
pub mod output;
pub mod profile;
pub mod similarity;
pub mod store;
pub mod tfidf;
pub mod time;
