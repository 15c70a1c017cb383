//! Shared test utilities for the feed-deploy test suite.
//!
//! Provides the canonical fixture project, lookup helpers that panic with a
//! readable message on a miss, and timestamp stripping for comparing
//! generator output across calls.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let list = generate::artifacts(&moon_config());
//! let readme = find_artifact(&list, "README.md");
//! assert_eq!(strip_timestamps(&readme.contents), strip_timestamps(&readme.contents));
//! ```

use crate::generate::Artifact;
use crate::types::{Feed, Project, ProjectConfig};

// =========================================================================
// Fixtures
// =========================================================================

/// `Moon Extractor` under `/opt`, batches of 100, pushing to `u@h:/d`.
pub fn moon_extractor() -> Project {
    Project {
        name: "Moon Extractor".into(),
        root: "/opt".into(),
        target_host: "u@h:/d".into(),
        batch_size: 100,
        user: String::new(),
    }
}

/// `cat /dev/ttyS0` labelled `Device 1`.
pub fn device_feed() -> Feed {
    Feed::new("cat /dev/ttyS0", "Device 1")
}

/// [`moon_extractor`] with a single [`device_feed`].
pub fn moon_config() -> ProjectConfig {
    ProjectConfig::new(moon_extractor(), vec![device_feed()])
}

/// A config whose name is also its slug, for list-shaped tests.
pub fn named_config(name: &str) -> ProjectConfig {
    ProjectConfig::new(
        Project {
            name: name.into(),
            ..Project::default()
        },
        Vec::new(),
    )
}

// =========================================================================
// Lookups: panic with a clear message on miss
// =========================================================================

/// Find an artifact by its project-relative path. Panics if not found.
pub fn find_artifact<'a>(artifacts: &'a [Artifact], path: &str) -> &'a Artifact {
    artifacts.iter().find(|a| a.path == path).unwrap_or_else(|| {
        let paths: Vec<&str> = artifacts.iter().map(|a| a.path.as_str()).collect();
        panic!("artifact '{path}' not found. Available: {paths:?}")
    })
}

/// Drop the lines that embed the generation time.
pub fn strip_timestamps(text: &str) -> String {
    text.lines()
        .filter(|l| !l.starts_with("# Created at ") && !l.starts_with("* **created**:"))
        .collect::<Vec<_>>()
        .join("\n")
}
