//! Project scanner: derives stack, code style and architecture facts from a
//! project tree.
//!
//! Scans are read-only and deterministic: directory entries are visited in
//! sorted order and ties between equally frequent signals resolve by a fixed
//! preference order. Unreadable files and unparseable manifests are skipped.

use crate::core::error::TeamError;
use crate::core::profile::{Architecture, CodeStyle, ProjectFacts, Stack};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const CODE_EXTENSIONS: &[&str] = &[
    "py", "js", "ts", "jsx", "tsx", "java", "cs", "go", "rb", "php", "rs", "swift", "kt", "dart",
    "vue", "svelte",
];

const IGNORE_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".next",
    ".nuxt",
    "dist",
    "build",
    ".venv",
    "venv",
    "env",
    ".env",
    "vendor",
    ".agent",
    "coverage",
    ".cache",
    ".turbo",
    "target",
];

const LANGUAGE_BY_EXT: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("rs", "rust"),
    ("java", "java"),
    ("cs", "csharp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("dart", "dart"),
    ("swift", "swift"),
    ("vue", "vue"),
    ("svelte", "svelte"),
];

const MAX_LANGUAGES: usize = 3;

// First match wins within each table.
const FRONTEND_DEPS: &[(&str, &str)] = &[
    ("next", "nextjs"),
    ("nuxt", "nuxt"),
    ("vue", "vue"),
    ("svelte", "svelte"),
    ("react", "react"),
];
const BUNDLER_DEPS: &[(&str, &str)] = &[
    ("vite", "vite"),
    ("webpack", "webpack"),
    ("esbuild", "esbuild"),
];
const NODE_BACKEND_DEPS: &[(&str, &str)] = &[
    ("express", "express"),
    ("fastify", "fastify"),
    ("koa", "koa"),
    ("hono", "hono"),
];
const CSS_DEPS: &[(&str, &str)] = &[
    ("tailwindcss", "tailwind"),
    ("styled-components", "styled-components"),
    ("sass", "sass"),
    ("node-sass", "sass"),
];
const NODE_TEST_DEPS: &[(&str, &str)] = &[
    ("vitest", "vitest"),
    ("jest", "jest"),
    ("mocha", "mocha"),
    ("playwright", "playwright"),
    ("cypress", "cypress"),
];
const NODE_DB_DEPS: &[(&str, &str)] = &[
    ("prisma", "prisma"),
    ("@prisma/client", "prisma"),
    ("mongoose", "mongodb"),
    ("pg", "postgresql"),
    ("mysql2", "mysql"),
    ("better-sqlite3", "sqlite"),
    ("drizzle-orm", "drizzle"),
    ("typeorm", "typeorm"),
];
const STATE_DEPS: &[(&str, &str)] = &[
    ("zustand", "zustand"),
    ("redux", "redux"),
    ("@reduxjs/toolkit", "redux"),
    ("jotai", "jotai"),
    ("recoil", "recoil"),
    ("pinia", "pinia"),
    ("vuex", "vuex"),
];
const API_DEPS: &[(&str, &str)] = &[
    ("@tanstack/react-query", "tanstack-query"),
    ("axios", "axios"),
    ("swr", "swr"),
];

const PYTHON_MANIFESTS: &[&str] = &["requirements.txt", "pyproject.toml", "Pipfile"];
const PYTHON_BACKENDS: &[(&str, &str)] = &[
    ("django", "django"),
    ("fastapi", "fastapi"),
    ("flask", "flask"),
];
const PYTHON_TESTS: &[(&str, &str)] = &[("pytest", "pytest"), ("unittest", "unittest")];
const PYTHON_DBS: &[(&str, &str)] = &[
    ("sqlalchemy", "sqlalchemy"),
    ("psycopg", "postgresql"),
    ("pymongo", "mongodb"),
];

const FEATURE_MARKERS: &[&str] = &["features", "modules", "domains"];
const LAYER_MARKERS: &[&str] = &[
    "controllers",
    "services",
    "models",
    "repositories",
    "routes",
    "handlers",
];

static JS_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:function|const|let|var)\s+([a-zA-Z_]\w*)").expect("js declaration pattern")
});
static PY_DECL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:def|class)\s+([a-zA-Z_]\w*)").expect("python declaration pattern")
});
static SINGLE_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'[^']*'").expect("single quote pattern"));
static DOUBLE_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""[^"]*""#).expect("double quote pattern"));
static ERROR_HANDLING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(try|except|catch)\b").expect("error handling pattern"));
static FUNCTION_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(def |function |const \w+ = |async function)").expect("function pattern")
});

/// Source of project facts. The heuristic scanner is the default; callers may
/// plug in their own detection.
pub trait ProjectScanner {
    fn scan(&self, project: &Path) -> Result<ProjectFacts, TeamError>;
}

/// Built-in manifest + regex heuristics.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicScanner;

impl ProjectScanner for HeuristicScanner {
    fn scan(&self, project: &Path) -> Result<ProjectFacts, TeamError> {
        scan_project(project)
    }
}

/// Full scan of `project`. Fails only when `project` is not a directory.
pub fn scan_project(project: &Path) -> Result<ProjectFacts, TeamError> {
    if !project.is_dir() {
        return Err(TeamError::NotFound(format!(
            "project path {}",
            project.display()
        )));
    }
    let files = collect_files(project);
    let deps = package_deps(project);
    tracing::debug!(project = %project.display(), files = files.len(), "scanning project");

    Ok(ProjectFacts {
        stack: detect_stack(project, &files, deps.as_ref()),
        code_style: detect_style(&files),
        architecture: detect_architecture(project, deps.as_ref()),
    })
}

fn collect_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, &mut out);
    out
}

fn walk(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = entries.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        let name = entry.file_name().to_string_lossy().to_string();
        if file_type.is_dir() {
            if !IGNORE_DIRS.contains(&name.as_str()) {
                walk(&entry.path(), out);
            }
        } else if file_type.is_file() {
            out.push(entry.path());
        }
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

fn first_match(deps: &BTreeSet<String>, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(dep, _)| deps.contains(*dep))
        .map(|(_, value)| value.to_string())
}

fn first_substring(content: &str, table: &[(&str, &str)]) -> Option<String> {
    table
        .iter()
        .find(|(needle, _)| content.contains(needle))
        .map(|(_, value)| value.to_string())
}

/// Union of `dependencies` and `devDependencies` names from `package.json`.
fn package_deps(project: &Path) -> Option<BTreeSet<String>> {
    let raw = fs::read(project.join("package.json")).ok()?;
    let pkg: serde_json::Value = serde_json::from_slice(&raw).ok()?;
    let mut deps = BTreeSet::new();
    for section in ["dependencies", "devDependencies"] {
        if let Some(map) = pkg.get(section).and_then(|v| v.as_object()) {
            deps.extend(map.keys().cloned());
        }
    }
    Some(deps)
}

fn detect_stack(project: &Path, files: &[PathBuf], deps: Option<&BTreeSet<String>>) -> Stack {
    let mut stack = Stack::default();

    let mut lang_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for file in files {
        let Some(ext) = extension(file) else { continue };
        if let Some((_, lang)) = LANGUAGE_BY_EXT.iter().find(|(e, _)| *e == ext) {
            *lang_counts.entry(*lang).or_insert(0) += 1;
        }
    }
    let mut ranked: Vec<(&str, usize)> = lang_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    stack.languages = ranked
        .into_iter()
        .take(MAX_LANGUAGES)
        .map(|(lang, _)| lang.to_string())
        .collect();

    if let Some(deps) = deps {
        stack.frontend = first_match(deps, FRONTEND_DEPS);
        stack.bundler = first_match(deps, BUNDLER_DEPS);
        stack.backend = first_match(deps, NODE_BACKEND_DEPS);
        stack.css = first_match(deps, CSS_DEPS);
        stack.testing = first_match(deps, NODE_TEST_DEPS);
        stack.database = first_match(deps, NODE_DB_DEPS);
    }

    for manifest in PYTHON_MANIFESTS {
        let Ok(raw) = fs::read(project.join(manifest)) else {
            continue;
        };
        let content = String::from_utf8_lossy(&raw).to_lowercase();
        if let Some(backend) = first_substring(&content, PYTHON_BACKENDS) {
            stack.backend = Some(backend);
        }
        if let Some(testing) = first_substring(&content, PYTHON_TESTS) {
            stack.testing = Some(testing);
        }
        if let Some(database) = first_substring(&content, PYTHON_DBS) {
            stack.database = Some(database);
        }
    }

    if tsconfig_is_strict(project) && !stack.languages.iter().any(|l| l == "typescript") {
        stack.languages.insert(0, "typescript".to_string());
    }

    if project.join("Dockerfile").exists() || project.join("docker-compose.yml").exists() {
        stack.containerized = Some(true);
    }

    if project.join(".github").join("workflows").is_dir() {
        stack.ci_cd = Some("github_actions".to_string());
    } else if project.join(".gitlab-ci.yml").exists() {
        stack.ci_cd = Some("gitlab_ci".to_string());
    }

    stack
}

fn tsconfig_is_strict(project: &Path) -> bool {
    let Ok(raw) = fs::read(project.join("tsconfig.json")) else {
        return false;
    };
    let Ok(cfg) = serde_json::from_slice::<serde_json::Value>(&raw) else {
        return false;
    };
    cfg.get("compilerOptions")
        .and_then(|c| c.get("strict"))
        .and_then(|s| s.as_bool())
        .unwrap_or(false)
}

/// Pick the highest count; ties go to the earliest category in `order`.
fn dominant<'a>(counts: &BTreeMap<&'a str, usize>, order: &[&'a str]) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &key in order {
        let count = counts.get(key).copied().unwrap_or(0);
        if count > 0 && best.is_none_or(|(_, c)| count > c) {
            best = Some((key, count));
        }
    }
    best.map(|(k, _)| k)
}

#[derive(Default)]
struct StyleTally<'a> {
    naming: BTreeMap<&'a str, usize>,
    quotes: BTreeMap<&'a str, usize>,
    semicolons: BTreeMap<&'a str, usize>,
    indent: BTreeMap<&'a str, usize>,
    total_lines: usize,
    comment_lines: usize,
    try_blocks: usize,
    function_count: usize,
    function_lengths: Vec<usize>,
    current_function_lines: usize,
    in_function: bool,
}

impl StyleTally<'_> {
    fn observe_line(&mut self, line: &str, is_js: bool, is_py: bool) {
        let stripped = line.trim();
        self.total_lines += 1;

        if stripped.starts_with("//")
            || stripped.starts_with('#')
            || stripped.starts_with("/*")
            || stripped.starts_with('*')
        {
            self.comment_lines += 1;
        }

        if is_js {
            for cap in JS_DECL_RE.captures_iter(stripped) {
                if let Some(kind) = classify_js_name(&cap[1]) {
                    *self.naming.entry(kind).or_insert(0) += 1;
                }
            }
            let singles = SINGLE_QUOTE_RE.find_iter(stripped).count();
            let doubles = DOUBLE_QUOTE_RE.find_iter(stripped).count();
            if singles > 0 {
                *self.quotes.entry("single").or_insert(0) += singles;
            }
            if doubles > 0 {
                *self.quotes.entry("double").or_insert(0) += doubles;
            }
            if !stripped.is_empty() && !stripped.starts_with("//") {
                if stripped.ends_with(';') {
                    *self.semicolons.entry("yes").or_insert(0) += 1;
                } else if stripped.ends_with(['{', '}', ',']) {
                    // structural line, no signal
                } else if stripped.len() > 5 {
                    *self.semicolons.entry("no").or_insert(0) += 1;
                }
            }
        } else if is_py {
            for cap in PY_DECL_RE.captures_iter(stripped) {
                if let Some(kind) = classify_py_name(&cap[1]) {
                    *self.naming.entry(kind).or_insert(0) += 1;
                }
            }
        }

        if line.starts_with(' ') {
            match line.len() - line.trim_start_matches(' ').len() {
                2 => *self.indent.entry("2").or_insert(0) += 1,
                4 => *self.indent.entry("4").or_insert(0) += 1,
                _ => {}
            }
        } else if line.starts_with('\t') {
            *self.indent.entry("tab").or_insert(0) += 1;
        }

        if ERROR_HANDLING_RE.is_match(stripped) {
            self.try_blocks += 1;
        }

        if FUNCTION_START_RE.is_match(stripped) {
            if self.in_function && self.current_function_lines > 0 {
                self.function_lengths.push(self.current_function_lines);
            }
            self.in_function = true;
            self.current_function_lines = 0;
            self.function_count += 1;
        } else if self.in_function {
            self.current_function_lines += 1;
        }
    }

    fn finish(mut self) -> CodeStyle {
        if self.in_function && self.current_function_lines > 0 {
            self.function_lengths.push(self.current_function_lines);
        }

        let mut style = CodeStyle {
            naming: dominant(&self.naming, &["camelCase", "snake_case", "PascalCase"])
                .map(str::to_string),
            quotes: dominant(&self.quotes, &["single", "double"]).map(str::to_string),
            semicolons: dominant(&self.semicolons, &["yes", "no"]).map(|w| w == "yes"),
            indent: dominant(&self.indent, &["2", "4", "tab"]).map(|w| match w {
                "tab" => "tabs".to_string(),
                n => format!("{} spaces", n),
            }),
            ..Default::default()
        };

        if self.total_lines > 0 {
            let ratio = self.comment_lines as f64 / self.total_lines as f64;
            style.comments = Some(
                if ratio < 0.03 {
                    "minimal"
                } else if ratio < 0.10 {
                    "moderate"
                } else {
                    "detailed"
                }
                .to_string(),
            );
        }

        if self.function_count > 0 {
            let ratio = self.try_blocks as f64 / self.function_count as f64;
            style.error_handling = Some(
                if ratio < 0.1 {
                    "minimal"
                } else if ratio < 0.3 {
                    "moderate"
                } else {
                    "always"
                }
                .to_string(),
            );
        }

        if !self.function_lengths.is_empty() {
            let avg = self.function_lengths.iter().sum::<usize>() as f64
                / self.function_lengths.len() as f64;
            style.function_length = Some(
                if avg < 15.0 {
                    "short"
                } else if avg < 30.0 {
                    "medium"
                } else {
                    "long"
                }
                .to_string(),
            );
        }

        style
    }
}

fn classify_js_name(name: &str) -> Option<&'static str> {
    let first = name.chars().next()?;
    // SCREAMING_CASE constants say nothing about the naming convention.
    if !name.chars().any(char::is_lowercase) {
        None
    } else if name.contains('_') {
        Some("snake_case")
    } else if first.is_lowercase() && name.chars().any(char::is_uppercase) {
        Some("camelCase")
    } else if first.is_uppercase() {
        Some("PascalCase")
    } else {
        None
    }
}

fn classify_py_name(name: &str) -> Option<&'static str> {
    let first = name.chars().next()?;
    if name.contains('_') {
        Some("snake_case")
    } else if first.is_lowercase() && name.chars().any(char::is_uppercase) {
        Some("camelCase")
    } else if first.is_uppercase() {
        Some("PascalCase")
    } else {
        None
    }
}

fn detect_style(files: &[PathBuf]) -> CodeStyle {
    let mut tally = StyleTally::default();
    for file in files {
        let Some(ext) = extension(file) else { continue };
        if !CODE_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let Ok(raw) = fs::read(file) else {
            continue;
        };
        let content = String::from_utf8_lossy(&raw);
        let is_js = matches!(ext.as_str(), "js" | "jsx" | "ts" | "tsx" | "vue" | "svelte");
        let is_py = ext == "py";
        for line in content.lines() {
            tally.observe_line(line, is_js, is_py);
        }
    }
    tally.finish()
}

fn detect_architecture(project: &Path, deps: Option<&BTreeSet<String>>) -> Architecture {
    let mut arch = Architecture::default();

    let src = project.join("src");
    let base = if src.is_dir() { src } else { project.to_path_buf() };

    let mut found_feature = false;
    let mut found_layer = false;
    if let Ok(entries) = fs::read_dir(&base) {
        for entry in entries.filter_map(|e| e.ok()) {
            if !entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            found_feature |= FEATURE_MARKERS.contains(&name.as_str());
            found_layer |= LAYER_MARKERS.contains(&name.as_str());
        }
    }
    arch.pattern = Some(
        if found_feature {
            "feature-based"
        } else if found_layer {
            "layer-based"
        } else {
            "flat"
        }
        .to_string(),
    );

    if let Some(deps) = deps {
        arch.state_management = first_match(deps, STATE_DEPS);
        arch.api_style = first_match(deps, API_DEPS);
    }

    arch
}
