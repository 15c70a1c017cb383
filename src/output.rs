//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Every entity (project, feed, artifact) leads with its identity: the index
//! a command takes and the human-facing name. Paths, commands and settings
//! follow as indented context lines. The open project is marked with `>>`.
//!
//! # Output Format
//!
//! ## Workspace
//!
//! ```text
//! >> 0 Moon Extractor
//!        Target: u@h:/d
//!        Feeds: 1
//!    1 /unnamed/
//!        Target: (none)
//!        Feeds: 0
//! ```
//!
//! ## Project
//!
//! ```text
//! Moon Extractor
//!     Root: /opt/moon-extractor
//!     Target: u@h:/d
//!     Batch size: 100
//!     User: root
//!
//! Feeds
//!     0 device-1
//!         Hint: Device 1
//!         Command: cat /dev/ttyS0
//! ```
//!
//! ## Files
//!
//! ```text
//! moon-extractor/
//!     README.md
//!     config.json
//!     bin/sync.sh (755)
//!     systemd/moon-extractor.service
//!     ...
//!
//! 10 files installing to /opt/moon-extractor
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::check::Finding;
use crate::generate::Artifact;
use crate::naming;
use crate::package::FileMode;
use crate::store::WorkspaceState;
use crate::types::ProjectConfig;

const UNNAMED: &str = "/unnamed/";

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn display_name(name: &str) -> &str {
    if name.is_empty() { UNNAMED } else { name }
}

fn or_none(value: &str) -> &str {
    if value.is_empty() { "(none)" } else { value }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Workspace
// ============================================================================

/// Format the project list with the open project marked.
pub fn format_workspace(state: &WorkspaceState) -> Vec<String> {
    if state.configs.is_empty() {
        return vec!["No projects. Create one with `feed-deploy new`.".to_string()];
    }
    let mut lines = Vec::new();
    for (i, config) in state.configs.iter().enumerate() {
        let marker = if state.opened_config_num == Some(i) { ">> " } else { "   " };
        lines.push(format!("{marker}{i} {}", display_name(&config.project.name)));
        lines.push(format!("{}   Target: {}", indent(1), or_none(&config.project.target_host)));
        lines.push(format!("{}   Feeds: {}", indent(1), config.active_feeds().count()));
    }
    lines
}

pub fn print_workspace(state: &WorkspaceState) {
    for line in format_workspace(state) {
        println!("{}", line);
    }
}

// ============================================================================
// Project
// ============================================================================

/// Format one project: parameters, then every feed slot by index.
///
/// Empty feed slots are listed too, so indices match what `feed set` and
/// `feed rm` take.
pub fn format_project(config: &ProjectConfig) -> Vec<String> {
    let project = &config.project;
    let mut lines = vec![
        display_name(&project.name).to_string(),
        format!("{}Root: {}", indent(1), naming::project_root(project)),
        format!("{}Target: {}", indent(1), or_none(&project.target_host)),
        format!("{}Batch size: {}", indent(1), project.batch_size),
        format!("{}User: {}", indent(1), project.service_user()),
    ];

    lines.push(String::new());
    lines.push("Feeds".to_string());
    if config.feeds.is_empty() {
        lines.push(format!("{}(none)", indent(1)));
    }
    for (i, feed) in config.feeds.iter().enumerate() {
        if feed.is_empty() {
            lines.push(format!("{}{i} (empty)", indent(1)));
            continue;
        }
        lines.push(format!("{}{i} {}", indent(1), naming::feed_slug(feed)));
        if !feed.hint.is_empty() && naming::slug(&feed.hint) != feed.hint {
            lines.push(format!("{}Hint: {}", indent(2), feed.hint));
        }
        lines.push(format!("{}Command: {}", indent(2), or_none(&feed.command)));
    }

    let missing = config.missing_fields();
    if !missing.is_empty() {
        lines.push(String::new());
        lines.push(format!("Missing before packaging: {}", missing.join(", ")));
    }
    lines
}

pub fn print_project(config: &ProjectConfig) {
    for line in format_project(config) {
        println!("{}", line);
    }
}

// ============================================================================
// Artifacts
// ============================================================================

/// Format the artifact inventory under the archive root folder.
pub fn format_artifacts(config: &ProjectConfig, artifacts: &[Artifact]) -> Vec<String> {
    let mut lines = vec![format!("{}/", naming::project_slug(&config.project))];
    for artifact in artifacts {
        let mode = match FileMode::for_path(&artifact.path) {
            FileMode::Executable => format!(" ({:o})", FileMode::Executable.unix_permissions()),
            FileMode::Regular => String::new(),
        };
        lines.push(format!("{}{}{}", indent(1), artifact.path, mode));
    }
    lines.push(format!("{}{}/", indent(1), naming::TEMP_DIR));
    lines.push(format!("{}{}/", indent(1), naming::SYNC_DIR));
    lines.push(String::new());
    lines.push(format!(
        "{} installing to {}",
        plural(artifacts.len(), "file"),
        naming::project_root(&config.project)
    ));
    lines
}

pub fn print_artifacts(config: &ProjectConfig, artifacts: &[Artifact]) {
    for line in format_artifacts(config, artifacts) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_findings(findings: &[Finding]) -> Vec<String> {
    if findings.is_empty() {
        return vec!["All references resolve.".to_string()];
    }
    let mut lines: Vec<String> = findings.iter().map(|f| format!("✗ {f}")).collect();
    lines.push(String::new());
    lines.push(plural(findings.len(), "problem"));
    lines
}

pub fn print_findings(findings: &[Finding]) {
    for line in format_findings(findings) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate;
    use crate::test_helpers::*;
    use crate::types::Feed;

    #[test]
    fn workspace_marks_opened_project() {
        let state = WorkspaceState {
            configs: vec![moon_config(), named_config("")],
            opened_config_num: Some(0),
        };
        let lines = format_workspace(&state);
        assert_eq!(lines[0], ">> 0 Moon Extractor");
        assert_eq!(lines[1], "       Target: u@h:/d");
        assert_eq!(lines[2], "       Feeds: 1");
        assert_eq!(lines[3], "   1 /unnamed/");
    }

    #[test]
    fn workspace_without_selection_has_no_marker() {
        let state = WorkspaceState {
            configs: vec![moon_config()],
            opened_config_num: None,
        };
        assert!(!format_workspace(&state).iter().any(|l| l.starts_with(">>")));
    }

    #[test]
    fn empty_workspace_suggests_new() {
        let lines = format_workspace(&WorkspaceState::default());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("feed-deploy new"));
    }

    #[test]
    fn project_lists_feed_slots_by_index() {
        let mut config = moon_config();
        config.feeds.push(Feed::default());
        config.feeds.push(Feed::new("uptime", ""));
        let lines = format_project(&config);
        assert_eq!(lines[0], "Moon Extractor");
        assert!(lines.contains(&"    Root: /opt/moon-extractor".to_string()));
        assert!(lines.contains(&"    User: root".to_string()));
        assert!(lines.contains(&"    0 device-1".to_string()));
        assert!(lines.contains(&"        Hint: Device 1".to_string()));
        assert!(lines.contains(&"        Command: cat /dev/ttyS0".to_string()));
        assert!(lines.contains(&"    1 (empty)".to_string()));
        assert!(lines.contains(&"    2 script".to_string()));
    }

    #[test]
    fn project_reports_missing_fields() {
        let mut config = moon_config();
        config.project.name.clear();
        let lines = format_project(&config);
        assert_eq!(lines[0], "/unnamed/");
        assert_eq!(lines.last().unwrap(), "Missing before packaging: name");
    }

    #[test]
    fn artifacts_show_modes_and_placeholders() {
        let config = moon_config();
        let list = generate::artifacts(&config);
        let lines = format_artifacts(&config, &list);
        assert_eq!(lines[0], "moon-extractor/");
        assert!(lines.contains(&"    bin/sync.sh (755)".to_string()));
        assert!(lines.contains(&"    README.md".to_string()));
        assert!(lines.contains(&"    temp/".to_string()));
        assert_eq!(
            lines.last().unwrap(),
            "10 files installing to /opt/moon-extractor"
        );
    }

    #[test]
    fn findings_are_counted() {
        assert_eq!(format_findings(&[]), ["All references resolve."]);
        let lines = format_findings(&[Finding::DuplicateFeedSlug("device-1".into())]);
        assert_eq!(lines[0], "✗ several feeds share the slug 'device-1'");
        assert_eq!(lines.last().unwrap(), "1 problem");
    }
}
