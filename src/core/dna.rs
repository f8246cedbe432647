//! DNA codec: a compact, order-stable fingerprint of a profile's facts.
//!
//! `lang:typescript+python|fe:react|db:prisma|naming:camelCase|arch:feature-based`
//!
//! Keys are emitted in the fixed order of [`DnaKey::ORDER`], never in map
//! iteration order. Absent categories are omitted rather than encoded empty.

use crate::core::profile::ProjectFacts;
use std::collections::BTreeMap;

pub const TOKEN_SEPARATOR: char = '|';
pub const KEY_SEPARATOR: char = ':';
/// Languages beyond this many are left out of the `lang` token.
pub const MAX_DNA_LANGUAGES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DnaKey {
    Lang,
    Frontend,
    Backend,
    Database,
    Css,
    Bundler,
    Test,
    Naming,
    Comments,
    Errors,
    Indent,
    Arch,
    State,
}

impl DnaKey {
    pub const ORDER: [DnaKey; 13] = [
        DnaKey::Lang,
        DnaKey::Frontend,
        DnaKey::Backend,
        DnaKey::Database,
        DnaKey::Css,
        DnaKey::Bundler,
        DnaKey::Test,
        DnaKey::Naming,
        DnaKey::Comments,
        DnaKey::Errors,
        DnaKey::Indent,
        DnaKey::Arch,
        DnaKey::State,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DnaKey::Lang => "lang",
            DnaKey::Frontend => "fe",
            DnaKey::Backend => "be",
            DnaKey::Database => "db",
            DnaKey::Css => "css",
            DnaKey::Bundler => "bundler",
            DnaKey::Test => "test",
            DnaKey::Naming => "naming",
            DnaKey::Comments => "comments",
            DnaKey::Errors => "errors",
            DnaKey::Indent => "indent",
            DnaKey::Arch => "arch",
            DnaKey::State => "state",
        }
    }

    fn value(self, facts: &ProjectFacts) -> Option<String> {
        let stack = &facts.stack;
        let style = &facts.code_style;
        let arch = &facts.architecture;
        match self {
            DnaKey::Lang => {
                let langs: Vec<&str> = stack
                    .languages
                    .iter()
                    .map(String::as_str)
                    .filter(|l| !l.is_empty())
                    .take(MAX_DNA_LANGUAGES)
                    .collect();
                (!langs.is_empty()).then(|| langs.join("+"))
            }
            DnaKey::Frontend => stack.frontend.clone(),
            DnaKey::Backend => stack.backend.clone(),
            DnaKey::Database => stack.database.clone(),
            DnaKey::Css => stack.css.clone(),
            DnaKey::Bundler => stack.bundler.clone(),
            DnaKey::Test => stack.testing.clone(),
            DnaKey::Naming => style.naming.clone(),
            DnaKey::Comments => style.comments.clone(),
            DnaKey::Errors => style.error_handling.clone(),
            DnaKey::Indent => style.indent.clone(),
            DnaKey::Arch => arch.pattern.clone(),
            DnaKey::State => arch.state_management.clone(),
        }
    }
}

/// Encode facts into a DNA string. A `|` inside a value is rewritten to `/`
/// so it cannot split the token.
pub fn encode(facts: &ProjectFacts) -> String {
    DnaKey::ORDER
        .iter()
        .filter_map(|key| {
            let value = key.value(facts)?;
            let value = value.trim();
            if value.is_empty() || value == "unknown" {
                return None;
            }
            Some(format!(
                "{}{}{}",
                key.as_str(),
                KEY_SEPARATOR,
                value.replace(TOKEN_SEPARATOR, "/")
            ))
        })
        .collect::<Vec<_>>()
        .join(&TOKEN_SEPARATOR.to_string())
}

/// Decode a DNA string. Tokens without `:` are skipped; a repeated key keeps
/// its last value.
pub fn decode(dna: &str) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for token in dna.trim().split(TOKEN_SEPARATOR) {
        if let Some((key, value)) = token.split_once(KEY_SEPARATOR) {
            if key.is_empty() {
                continue;
            }
            out.insert(key.to_string(), value.to_string());
        }
    }
    out
}
