//! Project and feed records shared by every stage.
//!
//! These are the values the workspace persists, the import/export payloads
//! carry, and every generator reads. Nothing derived (slugs, paths, file
//! contents) is stored here; see [`crate::naming`] and [`crate::generate`].
//!
//! JSON field names are camelCase so workspaces exported by earlier versions
//! of the editor load unchanged.

use serde::{Deserialize, Deserializer, Serialize};

/// Install root used when a project does not name one.
pub const DEFAULT_ROOT: &str = "/opt";

/// Records per batch file when a project does not set one.
pub const DEFAULT_BATCH_SIZE: u32 = 100;

/// Account the services run as when a project leaves `user` empty.
pub const DEFAULT_SERVICE_USER: &str = "root";

/// One shell-command data source plus the human label it is known by.
///
/// A feed with both fields empty is the editor's "new row" sentinel: it may
/// live in the list but is skipped by every generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Feed {
    /// Command line (or pipeline) printing one record per line on stdout.
    pub command: String,
    /// Record type label; also the basis of the feed slug.
    pub hint: String,
}

impl Feed {
    pub fn new(command: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            hint: hint.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.command.is_empty() && self.hint.is_empty()
    }

    /// One of the ready-made feeds offered by the editor.
    pub fn sample(kind: SampleFeed) -> Self {
        match kind {
            SampleFeed::Serial => Self::new(
                "stty -F /dev/ttyS0 speed 9600 cs8 -cstopb -parenb && cat /dev/ttyS0",
                "device1",
            ),
            SampleFeed::Ping => Self::new(
                "ping example.com | stdbuf -oL -eL grep icmp | stdbuf -oL -eL tr '=' ' ' | stdbuf -oL -eL cut -d ' ' -f 10",
                "ping to example.com",
            ),
            SampleFeed::Disk => Self::new(
                "while true; do df -h / | tail -n +2 |  awk '{print $4}'; sleep 1; done",
                "free space",
            ),
            SampleFeed::Empty => Self::default(),
        }
    }
}

/// Ready-made feed templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SampleFeed {
    /// Read a serial port at 9600 baud
    Serial,
    /// Round-trip time to example.com
    Ping,
    /// Free space on `/` every second
    Disk,
    /// Blank row to fill in later
    Empty,
}

/// Project-level parameters of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    /// Human name; the project slug is derived from it.
    pub name: String,
    /// Directory the project folder is installed under.
    pub root: String,
    /// rsync destination (`user@host:/path`), passed through verbatim.
    pub target_host: String,
    /// Lines per batch file.
    #[serde(deserialize_with = "batch_size_or_default")]
    pub batch_size: u32,
    /// Local account for the services. Empty means [`DEFAULT_SERVICE_USER`].
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user: String,
}

impl Default for Project {
    fn default() -> Self {
        Self {
            name: String::new(),
            root: DEFAULT_ROOT.to_string(),
            target_host: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            user: String::new(),
        }
    }
}

impl Project {
    pub fn service_user(&self) -> &str {
        if self.user.is_empty() {
            DEFAULT_SERVICE_USER
        } else {
            &self.user
        }
    }
}

// Older editors stored `batchSize: null` when the number field was cleared.
fn batch_size_or_default<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u32>::deserialize(deserializer)?.unwrap_or(DEFAULT_BATCH_SIZE))
}

fn feeds_or_empty<'de, D>(deserializer: D) -> Result<Vec<Feed>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Feed>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A project together with its ordered feed list.
///
/// This is both the unit the workspace stores and the `config.json`
/// snapshot packed into every archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub project: Project,
    #[serde(deserialize_with = "feeds_or_empty")]
    pub feeds: Vec<Feed>,
}

impl ProjectConfig {
    pub fn new(project: Project, feeds: Vec<Feed>) -> Self {
        Self { project, feeds }
    }

    /// Feeds that take part in generation, in list order.
    pub fn active_feeds(&self) -> impl Iterator<Item = &Feed> {
        self.feeds.iter().filter(|f| !f.is_empty())
    }

    /// Preconditions for generation that this config does not meet.
    ///
    /// Generators assume an empty result; callers check before offering
    /// packaging or rendering.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.project.name.is_empty() {
            missing.push("name");
        }
        if self.project.batch_size == 0 {
            missing.push("batchSize");
        }
        missing
    }
}

/// Field-wise update for a [`Feed`]; `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedPatch {
    pub command: Option<String>,
    pub hint: Option<String>,
}

impl FeedPatch {
    pub fn apply(self, feed: &mut Feed) {
        if let Some(command) = self.command {
            feed.command = command;
        }
        if let Some(hint) = self.hint {
            feed.hint = hint;
        }
    }

    pub fn is_noop(&self) -> bool {
        self.command.is_none() && self.hint.is_none()
    }
}

/// Field-wise update for a [`Project`]; `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub root: Option<String>,
    pub target_host: Option<String>,
    pub batch_size: Option<u32>,
    pub user: Option<String>,
}

impl ProjectPatch {
    pub fn apply(self, project: &mut Project) {
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(root) = self.root {
            project.root = root;
        }
        if let Some(target_host) = self.target_host {
            project.target_host = target_host;
        }
        if let Some(batch_size) = self.batch_size {
            project.batch_size = batch_size;
        }
        if let Some(user) = self.user {
            project.user = user;
        }
    }

    pub fn is_noop(&self) -> bool {
        self.name.is_none()
            && self.root.is_none()
            && self.target_host.is_none()
            && self.batch_size.is_none()
            && self.user.is_none()
    }
}
