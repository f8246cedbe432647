//! Rule store: natural-language directives with frequency-based promotion.
//!
//! Rules live in `warm/rules.json`. Adding a rule that is near-identical to
//! an existing one for the same agent bumps that rule's frequency instead of
//! inserting a copy. Rules seen often enough are rendered into the hot
//! `top_rules.md` digest, which is always rebuilt from scratch.

use crate::core::config::{RuleSimilarity, RulesConfig};
use crate::core::error::TeamError;
use crate::core::fsio;
use crate::core::output::{self, OutputFormat};
use crate::core::similarity::rule_similarity;
use crate::core::store::{Store, TeamPaths, is_plain_file_name};
use crate::core::time;
use crate::plugins::registry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const GLOBAL_AGENT: &str = "global";

fn default_agent() -> String {
    GLOBAL_AGENT.to_string()
}

fn default_frequency() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u64,
    pub text: String,
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub last_used: String,
}

impl Rule {
    pub fn is_global(&self) -> bool {
        self.agent == GLOBAL_AGENT
    }
}

/// Contents of `rules.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    /// Texts of the global rules. A projection of `rules`, regenerated on save.
    #[serde(default)]
    pub global: Vec<String>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub next_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupPolicy {
    pub threshold: f64,
    pub metric: RuleSimilarity,
}

impl From<&RulesConfig> for DedupPolicy {
    fn from(config: &RulesConfig) -> Self {
        Self {
            threshold: config.dedup_threshold,
            metric: config.similarity,
        }
    }
}

impl Default for DedupPolicy {
    fn default() -> Self {
        DedupPolicy::from(&RulesConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    Inserted { id: u64 },
    Folded { id: u64, frequency: u32 },
}

impl AddOutcome {
    pub fn id(&self) -> u64 {
        match self {
            AddOutcome::Inserted { id } | AddOutcome::Folded { id, .. } => *id,
        }
    }
}

impl RuleBook {
    /// Hand out the next id. Never reuses an id, even after removals or when
    /// `next_id` is missing from an older file.
    fn allocate_id(&mut self) -> u64 {
        let floor = self.rules.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        let id = self.next_id.max(floor);
        self.next_id = id + 1;
        id
    }

    /// Index of the most similar rule for `agent` whose similarity exceeds the threshold.
    fn best_match(&self, text: &str, agent: &str, policy: &DedupPolicy) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.agent != agent {
                continue;
            }
            let score = rule_similarity(text, &rule.text, policy.metric);
            if score > policy.threshold && best.is_none_or(|(_, s)| score > s) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Record one observation of `text` for `agent`.
    pub fn observe(
        &mut self,
        text: &str,
        agent: &str,
        policy: &DedupPolicy,
        now: &str,
    ) -> AddOutcome {
        if let Some(idx) = self.best_match(text, agent, policy) {
            let rule = &mut self.rules[idx];
            rule.frequency = rule.frequency.saturating_add(1);
            rule.last_used = now.to_string();
            return AddOutcome::Folded {
                id: rule.id,
                frequency: rule.frequency,
            };
        }
        let id = self.allocate_id();
        self.rules.push(Rule {
            id,
            text: text.to_string(),
            agent: agent.to_string(),
            frequency: 1,
            created_at: now.to_string(),
            last_used: now.to_string(),
        });
        AddOutcome::Inserted { id }
    }

    /// Fold a rule from another profile. A match keeps the larger of the two
    /// counts and the later `last_used`, so repeating a merge changes nothing.
    /// A new rule keeps its own counters but gets an id from this book.
    pub fn merge_rule(&mut self, incoming: &Rule, policy: &DedupPolicy) -> AddOutcome {
        if let Some(idx) = self.best_match(&incoming.text, &incoming.agent, policy) {
            let rule = &mut self.rules[idx];
            rule.frequency = rule.frequency.max(incoming.frequency);
            if incoming.last_used > rule.last_used {
                rule.last_used = incoming.last_used.clone();
            }
            return AddOutcome::Folded {
                id: rule.id,
                frequency: rule.frequency,
            };
        }
        let id = self.allocate_id();
        self.rules.push(Rule {
            id,
            ..incoming.clone()
        });
        AddOutcome::Inserted { id }
    }

    pub fn remove(&mut self, id: u64) -> Option<Rule> {
        let idx = self.rules.iter().position(|r| r.id == id)?;
        // Keep the allocator ahead of the removed id.
        self.next_id = self.next_id.max(id + 1);
        Some(self.rules.remove(idx))
    }

    pub fn refresh_global(&mut self) {
        self.global = self
            .rules
            .iter()
            .filter(|r| r.is_global())
            .map(|r| r.text.clone())
            .collect();
    }

    /// Rules with `frequency >= min_frequency`, most frequent first, ties by id.
    pub fn promoted(&self, min_frequency: u32) -> Vec<&Rule> {
        let mut hot: Vec<&Rule> = self
            .rules
            .iter()
            .filter(|r| r.frequency >= min_frequency)
            .collect();
        hot.sort_by(|a, b| b.frequency.cmp(&a.frequency).then(a.id.cmp(&b.id)));
        hot
    }

    /// Rule texts per agent file. The `global` group holds only global rules;
    /// every other agent gets the global rules followed by its own.
    pub fn agent_groups(&self) -> BTreeMap<String, Vec<&str>> {
        let global: Vec<&str> = self
            .rules
            .iter()
            .filter(|r| r.is_global())
            .map(|r| r.text.as_str())
            .collect();
        let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
        for rule in &self.rules {
            if rule.is_global() {
                groups
                    .entry(GLOBAL_AGENT.to_string())
                    .or_insert_with(|| global.clone());
                continue;
            }
            groups
                .entry(rule.agent.clone())
                .or_insert_with(|| global.clone())
                .push(rule.text.as_str());
        }
        groups
    }
}

pub fn render_top_rules(book: &RuleBook, min_frequency: u32) -> String {
    let hot = book.promoted(min_frequency);
    let mut out = String::from("# Team Rules (promoted)\n\n");
    if hot.is_empty() {
        out.push_str(&format!(
            "No rules have been observed {} or more times yet.\n",
            min_frequency
        ));
        return out;
    }
    for rule in hot {
        if rule.is_global() {
            out.push_str(&format!("- {} (x{})\n", rule.text, rule.frequency));
        } else {
            out.push_str(&format!(
                "- [{}] {} (x{})\n",
                rule.agent, rule.text, rule.frequency
            ));
        }
    }
    out
}

pub fn render_agent_file(agent: &str, texts: &[&str]) -> String {
    let mut out = format!("# Team Rules for {}\n\n", agent);
    for text in texts {
        out.push_str(&format!("- {}\n", text));
    }
    out
}

fn validate_rule_input(text: &str, agent: &str) -> Result<(), TeamError> {
    if text.trim().is_empty() {
        return Err(TeamError::ValidationError(
            "rule text must not be empty".to_string(),
        ));
    }
    if !is_plain_file_name(agent) {
        return Err(TeamError::ValidationError(format!(
            "invalid agent tag '{}': must be a plain name",
            agent
        )));
    }
    Ok(())
}

/// Best-effort read: a missing or malformed file is an empty book.
pub fn load_rules(paths: &TeamPaths) -> RuleBook {
    fsio::read_json_or_default(&paths.rules_file())
}

/// Strict read for destructive operations. Missing means empty; malformed is an error.
pub fn load_rules_strict(paths: &TeamPaths) -> Result<RuleBook, TeamError> {
    match fsio::read_json_strict(&paths.rules_file()) {
        Err(e) if e.is_not_found() => Ok(RuleBook::default()),
        other => other,
    }
}

pub fn save_rules(paths: &TeamPaths, book: &mut RuleBook) -> Result<(), TeamError> {
    book.refresh_global();
    fsio::write_json_atomic(&paths.rules_file(), book)
}

/// Rewrite `hot/top_rules.md` from the current book.
pub fn write_top_rules(
    paths: &TeamPaths,
    book: &RuleBook,
    min_frequency: u32,
) -> Result<(), TeamError> {
    fsio::write_atomic(
        &paths.top_rules_file(),
        render_top_rules(book, min_frequency).as_bytes(),
    )
}

pub fn add_rule(
    store: &Store,
    team: &str,
    text: &str,
    agent: &str,
) -> Result<AddOutcome, TeamError> {
    let text = text.trim();
    validate_rule_input(text, agent)?;
    let policy = DedupPolicy::from(&store.config.rules);
    let min_frequency = store.config.rules.promotion_threshold;

    store.broker().with_team(team, "rule.add", |paths| {
        let mut book = load_rules(paths);
        let outcome = book.observe(text, agent, &policy, &time::now_iso());
        save_rules(paths, &mut book)?;
        write_top_rules(paths, &book, min_frequency)?;
        tracing::debug!(team, ?outcome, "rule observed");
        Ok(outcome)
    })
}

/// Rules of `team`, optionally restricted to one agent, in id order.
pub fn list_rules(store: &Store, team: &str, agent: Option<&str>) -> Result<Vec<Rule>, TeamError> {
    let paths = store.root.existing_team(team)?;
    let mut rules: Vec<Rule> = load_rules(&paths)
        .rules
        .into_iter()
        .filter(|r| agent.is_none_or(|a| r.agent == a))
        .collect();
    rules.sort_by_key(|r| r.id);
    Ok(rules)
}

pub fn remove_rule(store: &Store, team: &str, id: u64) -> Result<Rule, TeamError> {
    let min_frequency = store.config.rules.promotion_threshold;
    store.broker().with_team(team, "rule.remove", |paths| {
        let mut book = load_rules_strict(paths)?;
        let removed = book
            .remove(id)
            .ok_or_else(|| TeamError::NotFound(format!("rule #{} in team '{}'", id, team)))?;
        save_rules(paths, &mut book)?;
        write_top_rules(paths, &book, min_frequency)?;
        Ok(removed)
    })
}

/// Rebuild the digest and return the promoted rules.
pub fn promote_rules(store: &Store, team: &str, min_frequency: u32) -> Result<Vec<Rule>, TeamError> {
    store.broker().with_team(team, "rule.promote", |paths| {
        let book = load_rules(paths);
        write_top_rules(paths, &book, min_frequency)?;
        Ok(book.promoted(min_frequency).into_iter().cloned().collect())
    })
}

#[derive(clap::Args, Debug)]
pub struct RuleCli {
    /// Team to operate on (defaults to the active team)
    #[clap(long, global = true)]
    pub team: Option<String>,
    #[clap(subcommand)]
    pub command: RuleCommand,
}

#[derive(clap::Subcommand, Debug)]
pub enum RuleCommand {
    /// Add a rule; a near-duplicate bumps the existing rule's frequency
    Add {
        /// Directive text
        text: String,
        /// Agent tag the rule targets
        #[clap(long, default_value = GLOBAL_AGENT)]
        agent: String,
    },
    /// List rules
    List {
        /// Only rules for this agent
        #[clap(long)]
        agent: Option<String>,
        #[clap(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Remove a rule by id
    Remove { id: u64 },
    /// Rebuild the top rules digest
    Promote {
        /// Minimum frequency (defaults to rules.promotion_threshold)
        #[clap(long)]
        min_frequency: Option<u32>,
    },
}

pub fn run_rule_cli(store: &Store, cli: RuleCli) -> Result<(), TeamError> {
    let team = registry::resolve_team(&store.root, cli.team.as_deref())?;

    match cli.command {
        RuleCommand::Add { text, agent } => match add_rule(store, &team, &text, &agent)? {
            AddOutcome::Inserted { id } => {
                println!("✓ Rule #{} added to team '{}' (agent: {})", id, team, agent)
            }
            AddOutcome::Folded { id, frequency } => println!(
                "✓ Rule #{} already known, frequency now {}",
                id, frequency
            ),
        },
        RuleCommand::List { agent, format } => {
            let rules = list_rules(store, &team, agent.as_deref())?;
            if format == OutputFormat::Json {
                output::print_json(&rules)?;
            } else if rules.is_empty() {
                println!("No rules recorded for team '{}'.", team);
            } else {
                println!("Rules for team '{}':", team);
                for rule in rules {
                    println!(
                        "  #{} [{}] {} (freq: {})",
                        rule.id, rule.agent, rule.text, rule.frequency
                    );
                }
            }
        }
        RuleCommand::Remove { id } => {
            let removed = remove_rule(store, &team, id)?;
            println!(
                "✓ Rule #{} removed: {}",
                removed.id,
                output::compact_line(&removed.text, 60)
            );
        }
        RuleCommand::Promote { min_frequency } => {
            let min = min_frequency.unwrap_or(store.config.rules.promotion_threshold);
            let hot = promote_rules(store, &team, min)?;
            println!(
                "✓ {} rule(s) promoted to the top rules digest (min frequency {})",
                hot.len(),
                min
            );
        }
    }
    Ok(())
}
