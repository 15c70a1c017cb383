//! Cross-reference check over a project's generated artifacts.
//!
//! Reads every generated file back and verifies that each path under the
//! project root and each unit name it mentions resolves to something the
//! archive actually ships. The README is parsed as Markdown so the user's
//! feed commands (fenced code blocks) are never mistaken for references.
//!
//! | Source | Scanned |
//! |--------|---------|
//! | README | text and inline code outside fenced blocks |
//! | unit files | every `Key=Value` line |
//! | `bin/*.sh` | every non-comment line |
//! | feed scripts | generated pipeline stages only (`    | ...`) |
//!
//! Globs and shell expansions (`*`, `$`) only need their directory to exist.
//! The enable-all and disable-all scripts must also list every packaged unit.

use crate::generate::{self, Artifact, ArtifactKind};
use crate::naming;
use crate::package::{self, FileTree};
use crate::types::ProjectConfig;
use pulldown_cmark::{Event, Parser, Tag, TagEnd};
use std::fmt;

/// Unit targets provided by systemd itself.
const SYSTEM_TARGETS: &[&str] = &["multi-user.target"];

/// One problem found by [`check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finding {
    /// Generation preconditions not met; nothing else was checked.
    MissingFields(Vec<&'static str>),
    DuplicateFeedSlug(String),
    /// A project or feed slug that is not a plain path component.
    UnsafeName(String),
    /// An install path mentioned in `artifact` that the archive lacks.
    UnknownPath { artifact: String, path: String },
    /// A unit name mentioned in `artifact` that the archive lacks.
    UnknownUnit { artifact: String, unit: String },
    /// A packaged unit file missing from an enable/disable script.
    NotListed { script: String, unit: String },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFields(fields) => {
                write!(f, "project is missing: {}", fields.join(", "))
            }
            Self::DuplicateFeedSlug(slug) => {
                write!(f, "several feeds share the slug '{slug}'")
            }
            Self::UnsafeName(slug) => {
                write!(f, "'{slug}' cannot be used as a file name")
            }
            Self::UnknownPath { artifact, path } => {
                write!(f, "{artifact} mentions {path}, which is not packaged")
            }
            Self::UnknownUnit { artifact, unit } => {
                write!(f, "{artifact} mentions unit {unit}, which is not packaged")
            }
            Self::NotListed { script, unit } => write!(f, "{script} does not list {unit}"),
        }
    }
}

/// Check a project; an empty result means every reference resolves.
pub fn check(config: &ProjectConfig) -> Vec<Finding> {
    let missing = config.missing_fields();
    if !missing.is_empty() {
        return vec![Finding::MissingFields(missing)];
    }

    let unsafe_names = naming::unsafe_slugs(&config.project, &config.feeds);
    if !unsafe_names.is_empty() {
        return unsafe_names.into_iter().map(Finding::UnsafeName).collect();
    }

    let dupes = naming::duplicate_feed_slugs(&config.feeds);
    if !dupes.is_empty() {
        return dupes.into_iter().map(Finding::DuplicateFeedSlug).collect();
    }
    let Ok(tree) = package::build_tree(config) else {
        return Vec::new();
    };
    let root = format!("{}/", naming::project_root(&config.project));
    let unit_paths: Vec<String> = tree
        .files
        .keys()
        .filter(|p| is_unit_name(p))
        .map(|p| naming::install_path(&config.project, p))
        .collect();

    let mut findings = Vec::new();
    for artifact in generate::artifacts(config) {
        for token in references(&artifact) {
            if let Some(finding) = resolve(&tree, &root, &artifact.path, &token) {
                findings.push(finding);
            }
        }
        if matches!(
            artifact.kind,
            ArtifactKind::EnableAllScript | ArtifactKind::DisableAllScript
        ) {
            for unit in &unit_paths {
                if !artifact.contents.split_whitespace().any(|t| t == unit) {
                    findings.push(Finding::NotListed {
                        script: artifact.path.clone(),
                        unit: unit.clone(),
                    });
                }
            }
        }
    }
    findings
}

fn is_unit_name(name: &str) -> bool {
    name.ends_with(".service") || name.ends_with(".timer") || name.ends_with(".target")
}

/// Candidate reference tokens of one artifact.
fn references(artifact: &Artifact) -> Vec<String> {
    let text = &artifact.contents;
    let lines: Vec<&str> = match artifact.kind {
        ArtifactKind::Readme => return markdown_tokens(text),
        ArtifactKind::Config => return Vec::new(),
        ArtifactKind::ProjectUnit
        | ArtifactKind::SyncUnit
        | ArtifactKind::SyncTimer
        | ArtifactKind::FeedUnit => text.lines().filter(|l| l.contains('=')).collect(),
        ArtifactKind::SyncScript
        | ArtifactKind::EnableAllScript
        | ArtifactKind::DisableAllScript => text.lines().filter(|l| !l.starts_with('#')).collect(),
        ArtifactKind::FeedScript => text.lines().filter(|l| l.starts_with("    |")).collect(),
    };
    lines.into_iter().flat_map(tokens).collect()
}

fn markdown_tokens(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    // the parser may split one run of text into several events
    let mut run = String::new();
    let mut in_block = false;
    for event in Parser::new(text) {
        match event {
            Event::Text(s) if !in_block => {
                run.push_str(&s);
                continue;
            }
            Event::Start(Tag::CodeBlock(_)) => in_block = true,
            Event::End(TagEnd::CodeBlock) => in_block = false,
            Event::Code(s) => out.extend(tokens(&s)),
            _ => {}
        }
        out.extend(tokens(&run));
        run.clear();
    }
    out.extend(tokens(&run));
    out
}

fn tokens(line: &str) -> Vec<String> {
    line.split_whitespace()
        .map(|t| t.rsplit('=').next().unwrap_or(t))
        .map(|t| t.trim_matches(|c| matches!(c, '"' | '\'' | '`' | '(' | ')' | ';' | ',')))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn resolve(tree: &FileTree, root: &str, artifact: &str, token: &str) -> Option<Finding> {
    if let Some(rel) = token.strip_prefix(root) {
        let rel = rel
            .trim_end_matches(['.', ',', ';', ':'])
            .trim_end_matches('/');
        let found = if rel.contains(['*', '$']) {
            rel.rsplit_once('/').is_some_and(|(dir, _)| tree.has_dir(dir))
        } else {
            rel.is_empty() || tree.contains(rel) || tree.has_dir(rel)
        };
        return (!found).then(|| Finding::UnknownPath {
            artifact: artifact.to_string(),
            path: token.to_string(),
        });
    }

    let unit = token.trim_end_matches(['.', ',', ';', ':']);
    if !unit.contains('/') && is_unit_name(unit) && !SYSTEM_TARGETS.contains(&unit) {
        let packaged = tree
            .files
            .keys()
            .any(|p| p.rsplit('/').next() == Some(unit));
        if !packaged {
            return Some(Finding::UnknownUnit {
                artifact: artifact.to_string(),
                unit: unit.to_string(),
            });
        }
    }
    None
}
