//! Slugs, unit names and filesystem paths derived from project and feed data.
//!
//! Every name or path that appears in more than one artifact is computed
//! here and nowhere else. Generators never rebuild a path by hand: a unit
//! file that points at a script, the README that documents it and the
//! archive entry that ships it all call the same function, so they cannot
//! drift apart when a project is renamed.
//!
//! ## Layout
//!
//! Paths come in two flavours. *Relative* paths (`rel_*`) are relative to the
//! project folder and are the keys of the packaged archive. *Absolute* paths
//! are the same relative path joined onto [`project_root`]:
//!
//! ```text
//! <root>/<project-slug>/
//! ├── README.md
//! ├── config.json
//! ├── bin/{sync,enable-all,disable-all}.sh
//! ├── scripts/<feed-slug>.sh
//! ├── systemd/<project-slug>.service
//! ├── systemd/<project-slug>-sync.service
//! ├── systemd/<project-slug>-sync.timer
//! ├── systemd/<project-slug>.<feed-slug>.service
//! ├── temp/
//! └── to-sync/
//! ```
//!
//! All functions are pure. A project without a name yields an empty slug;
//! callers are expected to check [`ProjectConfig::missing_fields`](crate::types::ProjectConfig::missing_fields)
//! before generating anything.

use crate::types::{Feed, Project};
use std::collections::HashSet;

/// Slug used for feeds with an empty hint.
pub const DEFAULT_FEED_SLUG: &str = "script";

pub const TEMP_DIR: &str = "temp";
pub const SYNC_DIR: &str = "to-sync";
pub const README_FILE: &str = "README.md";
pub const CONFIG_FILE: &str = "config.json";
pub const SYNC_SCRIPT: &str = "bin/sync.sh";
pub const ENABLE_ALL_SCRIPT: &str = "bin/enable-all.sh";
pub const DISABLE_ALL_SCRIPT: &str = "bin/disable-all.sh";

const SYSTEMD_DIR: &str = "systemd";
const SCRIPTS_DIR: &str = "scripts";

/// Lowercase `text` and collapse every whitespace run into one `-`.
///
/// - `"Free Space"` → `"free-space"`
/// - `"Moon  Extractor\t2"` → `"moon-extractor-2"`
/// - `" padded "` → `"-padded-"` (edges are kept, not trimmed)
pub fn slug(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_whitespace() {
            if !in_space {
                out.push('-');
            }
            in_space = true;
        } else {
            out.push(ch);
            in_space = false;
        }
    }
    out
}

// ============================================================================
// Project
// ============================================================================

pub fn project_slug(project: &Project) -> String {
    slug(&project.name)
}

/// `<root>/<project-slug>`
pub fn project_root(project: &Project) -> String {
    format!("{}/{}", project.root, project_slug(project))
}

/// Absolute install path for a project-relative path.
pub fn install_path(project: &Project, rel: &str) -> String {
    format!("{}/{}", project_root(project), rel)
}

/// Where feeds write batches while they are still being filled.
pub fn temp_dir(project: &Project) -> String {
    install_path(project, TEMP_DIR)
}

/// Where closed batches wait for the next push.
pub fn sync_dir(project: &Project) -> String {
    install_path(project, SYNC_DIR)
}

/// Umbrella unit name, e.g. `moon-extractor.service`.
pub fn unit_name(project: &Project) -> String {
    format!("{}.service", project_slug(project))
}

pub fn sync_unit_name(project: &Project) -> String {
    format!("{}-sync.service", project_slug(project))
}

pub fn sync_timer_name(project: &Project) -> String {
    format!("{}-sync.timer", project_slug(project))
}

pub fn rel_unit(project: &Project) -> String {
    format!("{SYSTEMD_DIR}/{}", unit_name(project))
}

pub fn rel_sync_unit(project: &Project) -> String {
    format!("{SYSTEMD_DIR}/{}", sync_unit_name(project))
}

pub fn rel_sync_timer(project: &Project) -> String {
    format!("{SYSTEMD_DIR}/{}", sync_timer_name(project))
}

pub fn unit_path(project: &Project) -> String {
    install_path(project, &rel_unit(project))
}

pub fn sync_unit_path(project: &Project) -> String {
    install_path(project, &rel_sync_unit(project))
}

pub fn sync_timer_path(project: &Project) -> String {
    install_path(project, &rel_sync_timer(project))
}

pub fn sync_script_path(project: &Project) -> String {
    install_path(project, SYNC_SCRIPT)
}

pub fn enable_all_script_path(project: &Project) -> String {
    install_path(project, ENABLE_ALL_SCRIPT)
}

pub fn disable_all_script_path(project: &Project) -> String {
    install_path(project, DISABLE_ALL_SCRIPT)
}

// ============================================================================
// Feed
// ============================================================================

/// Slug of the feed hint, or [`DEFAULT_FEED_SLUG`] when the hint is empty.
pub fn feed_slug(feed: &Feed) -> String {
    if feed.hint.is_empty() {
        DEFAULT_FEED_SLUG.to_string()
    } else {
        slug(&feed.hint)
    }
}

pub fn feed_script_name(feed: &Feed) -> String {
    format!("{}.sh", feed_slug(feed))
}

/// Feed unit name, e.g. `moon-extractor.device-1.service`.
pub fn feed_service_name(feed: &Feed, project: &Project) -> String {
    format!("{}.{}.service", project_slug(project), feed_slug(feed))
}

pub fn rel_feed_script(feed: &Feed) -> String {
    format!("{SCRIPTS_DIR}/{}", feed_script_name(feed))
}

pub fn rel_feed_unit(feed: &Feed, project: &Project) -> String {
    format!("{SYSTEMD_DIR}/{}", feed_service_name(feed, project))
}

pub fn feed_script_path(feed: &Feed, project: &Project) -> String {
    install_path(project, &rel_feed_script(feed))
}

pub fn feed_unit_path(feed: &Feed, project: &Project) -> String {
    install_path(project, &rel_feed_unit(feed, project))
}

/// Prefix of every batch file the feed writes into `dir`.
///
/// `split` appends the part index at run time, so the full name is
/// `<feed-slug>.<hostname>.<epoch-seconds>.<part>`.
pub fn feed_batch_prefix(feed: &Feed, dir: &str) -> String {
    format!("{dir}/{}.", feed_slug(feed))
}

/// Glob matching every batch of the feed inside `dir`.
pub fn feed_batch_mask(feed: &Feed, dir: &str) -> String {
    format!("{dir}/{}.*.*.*", feed_slug(feed))
}

/// Feed slugs used by more than one non-empty feed, in first-seen order.
///
/// Such feeds would write the same script and unit paths.
pub fn duplicate_feed_slugs(feeds: &[Feed]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut dupes = Vec::new();
    for slug in feeds.iter().filter(|f| !f.is_empty()).map(feed_slug) {
        if !seen.insert(slug.clone()) && !dupes.contains(&slug) {
            dupes.push(slug);
        }
    }
    dupes
}

/// Whether `slug` can be used as a single path component.
///
/// Slugs keep punctuation, so a name like `../x` would otherwise leave the
/// project folder once joined.
pub fn is_safe_component(slug: &str) -> bool {
    !slug.is_empty() && slug != "." && slug != ".." && !slug.contains(['/', '\\'])
}

/// Project and non-empty feed slugs that are not safe path components,
/// project first.
pub fn unsafe_slugs(project: &Project, feeds: &[Feed]) -> Vec<String> {
    let feed_slugs = feeds.iter().filter(|f| !f.is_empty()).map(feed_slug);
    std::iter::once(project_slug(project))
        .chain(feed_slugs)
        .filter(|s| !is_safe_component(s))
        .collect()
}
