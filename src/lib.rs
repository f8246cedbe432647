//! teamkit: portable team profiles for agent-driven projects.
//!
//! A profile captures what a team has learned on one project so it can be
//! carried to the next:
//!
//! - **Facts**: stack, code style and architecture detected by a scan, plus a
//!   compact DNA fingerprint of them
//! - **Rules**: natural-language directives per agent, de-duplicated by token
//!   similarity and promoted to a digest once seen often enough
//! - **Journal**: titled lessons with body files, merged by title similarity
//!
//! # Storage tiers
//!
//! Each profile lives under `<root>/teams/<name>/`:
//!
//! - **hot**: DNA and the top rules digest, small and always derived
//! - **warm**: the full rule list and journal, the source of truth
//! - **cold**: append-only DNA history and archives
//!
//! # The Thin Waist
//!
//! Every mutation goes through [`core::broker::ProfileBroker`], which holds a
//! per-profile lock for the duration of the operation and appends an audit
//! event to `<root>/events.jsonl`.
//!
//! # Examples
//!
//! ```bash
//! teamkit create acme --scan ./web
//! teamkit rule add "always write docs in English"
//! teamkit inject acme --project ./new-service
//! teamkit save-back --project ./new-service
//! teamkit sync other-team
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: layout, config, broker, DNA codec, similarity and TF-IDF
//! - [`plugins`]: scanner, rules, journal, registry, injector, sync, archive, learner

pub mod core;
pub mod plugins;

mod cli;

use crate::cli::{Cli, Command};
use crate::core::{
    error::TeamError,
    output::{self, OutputFormat},
    store::{Store, TeamRoot},
};
use crate::plugins::{
    archive, injector, learner, registry, rules,
    scanner::{self, HeuristicScanner},
    sync,
};

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run() -> Result<(), TeamError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        // Scanning is profile-free and works without a root.
        Command::Scan { path, dna, format } => run_scan(&path, dna, format),
        command => {
            let store = Store::open(TeamRoot::resolve(cli.root)?)?;
            dispatch(&store, command)
        }
    }
}

fn dispatch(store: &Store, command: Command) -> Result<(), TeamError> {
    match command {
        Command::Create { name, scan } => {
            let profile = registry::create_team(store, &name, scan.as_deref(), &HeuristicScanner)?;
            let paths = store.root.team(&name)?;
            println!("{} Team '{}' created and set active", "✓".green(), profile.name);
            let dna = registry::read_dna(&paths)?;
            if !dna.is_empty() {
                println!("  DNA: {}", dna);
            }
            println!("  Location: {}", paths.dir.display());
        }
        Command::List { format } => {
            let teams = registry::list_teams(&store.root)?;
            if format == OutputFormat::Json {
                output::print_json(&teams)?;
            } else if teams.is_empty() {
                println!("No teams yet. Create one with `teamkit create <name>`.");
            } else {
                for team in teams {
                    let marker = if team.active { "*".green().bold() } else { " ".normal() };
                    println!(
                        "{} {:<20} rules: {:<4} journal: {:<4} {}",
                        marker,
                        team.name.as_str().bold(),
                        team.rules,
                        team.journal_entries,
                        output::compact_line(&team.dna, 50).as_str().dimmed()
                    );
                }
            }
        }
        Command::Show { name, format } => {
            let name = registry::resolve_team(&store.root, name.as_deref())?;
            let details = registry::show_team(store, &name)?;
            if format == OutputFormat::Json {
                output::print_json(&details)?;
            } else {
                print_details(&details);
            }
        }
        Command::Delete { name } => {
            registry::delete_team(store, &name)?;
            println!("{} Team '{}' deleted", "✓".green(), name);
        }
        Command::Inject { name, project } => {
            let report = injector::inject(store, &name, &project)?;
            registry::set_active(&store.root, &name)?;
            println!(
                "{} Team '{}' injected into {}",
                "✓".green(),
                name,
                report.brain_dir.display()
            );
            println!(
                "  agents: {} | journal entries: {}",
                if report.agents.is_empty() {
                    "none".to_string()
                } else {
                    report.agents.join(", ")
                },
                report.journal_entries
            );
        }
        Command::SaveBack { name, project } => {
            let name = registry::resolve_team(&store.root, name.as_deref())?;
            let report = injector::save_back(store, &name, &project)?;
            println!(
                "{} Saved {} new journal entries to team '{}' ({} already known)",
                "✓".green(),
                report.new_entries,
                name,
                report.folded
            );
        }
        Command::Rule(rule_cli) => rules::run_rule_cli(store, rule_cli)?,
        Command::Sync { source, team } => {
            let target = registry::resolve_team(&store.root, team.as_deref())?;
            let report = sync::sync_teams(store, &target, &source)?;
            println!("{} Synced '{}' into '{}'", "✓".green(), source, target);
            println!(
                "  rules: {} new, {} reinforced | journal: {} new, {} reinforced",
                report.rules_added, report.rules_folded, report.journal_added, report.journal_folded
            );
        }
        Command::Export { name, output: dest } => {
            let report = archive::export_team(store, &name, dest.as_deref())?;
            println!(
                "{} Exported '{}' ({} files) to {}",
                "✓".green(),
                name,
                report.files,
                report.archive.display()
            );
        }
        Command::Import { archive: path } => {
            let name = archive::import_team(store, &path)?;
            println!("{} Imported team '{}'", "✓".green(), name);
        }
        Command::Learn(learn_cli) => learner::run_learn_cli(store, learn_cli)?,
        Command::Scan { path, dna, format } => run_scan(&path, dna, format)?,
    }

    Ok(())
}

fn run_scan(path: &std::path::Path, dna_only: bool, format: OutputFormat) -> Result<(), TeamError> {
    let facts = scanner::scan_project(path)?;
    let dna = crate::core::dna::encode(&facts);
    if dna_only {
        println!("{}", dna);
        return Ok(());
    }
    if format == OutputFormat::Json {
        return output::print_json(&serde_json::json!({ "facts": facts, "dna": dna }));
    }

    let stack = &facts.stack;
    let style = &facts.code_style;
    let arch = &facts.architecture;
    println!("{}", "Stack".bold());
    println!(
        "  languages: {}",
        if stack.languages.is_empty() {
            "none".to_string()
        } else {
            stack.languages.join(", ")
        }
    );
    for (label, value) in [
        ("frontend", &stack.frontend),
        ("backend", &stack.backend),
        ("database", &stack.database),
        ("css", &stack.css),
        ("testing", &stack.testing),
        ("bundler", &stack.bundler),
        ("ci/cd", &stack.ci_cd),
    ] {
        println!("  {}: {}", label, output::or_none(value.as_deref()));
    }
    println!("{}", "Code style".bold());
    for (label, value) in [
        ("naming", &style.naming),
        ("comments", &style.comments),
        ("errors", &style.error_handling),
        ("quotes", &style.quotes),
        ("indent", &style.indent),
        ("function length", &style.function_length),
    ] {
        println!("  {}: {}", label, output::or_none(value.as_deref()));
    }
    println!("{}", "Architecture".bold());
    for (label, value) in [
        ("pattern", &arch.pattern),
        ("state", &arch.state_management),
        ("api", &arch.api_style),
    ] {
        println!("  {}: {}", label, output::or_none(value.as_deref()));
    }
    println!("DNA: {}", dna.as_str().cyan());
    Ok(())
}

fn print_details(details: &registry::TeamDetails) {
    let profile = &details.profile;
    let active = if details.active { " (active)".green().to_string() } else { String::new() };
    println!("{} {}{}", "Team".bold(), profile.name.as_str().bold(), active);
    println!("  created: {}", profile.created_at);
    if !profile.scanned_from.is_empty() {
        println!("  scanned from: {}", profile.scanned_from.join(", "));
    }
    println!(
        "  DNA: {}",
        if details.dna.is_empty() { "none".to_string() } else { details.dna.as_str().cyan().to_string() }
    );
    for (key, value) in &details.dna_tokens {
        println!("    {:<9} {}", key, value);
    }
    println!(
        "  rules: {} ({} promoted) | journal entries: {}",
        details.rules.len(),
        details.top_rules.len(),
        details.journal.len()
    );
    for rule in &details.top_rules {
        println!(
            "    #{} [{}] {} (x{})",
            rule.id,
            rule.agent,
            output::compact_line(&rule.text, 70),
            rule.frequency
        );
    }
}
