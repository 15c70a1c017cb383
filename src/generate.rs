//! Artifact generation.
//!
//! Turns a [`ProjectConfig`] into the text of every file a deployment needs.
//! Each generator is a pure function of its arguments and does no I/O.
//! The only non-reproducible text is the `Created at` timestamp
//! written into script headers and the README parameter list.
//!
//! ## Generated Files
//!
//! | Artifact | Path (relative to the project folder) |
//! |----------|---------------------------------------|
//! | Feed collector script | `scripts/<feed>.sh` |
//! | Feed unit | `systemd/<project>.<feed>.service` |
//! | Umbrella unit | `systemd/<project>.service` |
//! | Sync unit | `systemd/<project>-sync.service` |
//! | Sync timer | `systemd/<project>-sync.timer` |
//! | Sync script | `bin/sync.sh` |
//! | Enable/disable all | `bin/enable-all.sh`, `bin/disable-all.sh` |
//! | README | `README.md` |
//! | Config snapshot | `config.json` |
//!
//! ## Unit Wiring
//!
//! The umbrella unit is a oneshot that stays "active" after `/bin/true`
//! exits. Feed units and the sync timer are `PartOf=` and `After=` it and are
//! installed into it with `WantedBy=`, so `systemctl start|stop <project>.service`
//! starts or stops the whole project. The timer re-runs the sync unit one
//! minute after it last went inactive.
//!
//! Every name and path used below comes from [`crate::naming`].

use crate::naming::{self, feed_slug};
use crate::types::{Feed, Project, ProjectConfig};
use serde::Serialize;

/// Seconds systemd waits before restarting a crashed feed.
pub const RESTART_SEC: u32 = 5;

/// Inactivity interval of the sync timer, in systemd time-span syntax.
pub const SYNC_INTERVAL: &str = "1m";

/// What a generated file is, independent of where it lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Readme,
    Config,
    SyncScript,
    EnableAllScript,
    DisableAllScript,
    ProjectUnit,
    SyncUnit,
    SyncTimer,
    FeedUnit,
    FeedScript,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    /// Path relative to the project folder; also the archive entry name.
    pub path: String,
    /// Absolute path once unpacked under the project root.
    pub install_path: String,
    pub contents: String,
}

/// Every artifact of a project, in archive order.
///
/// Sentinel feeds are dropped first, so the config snapshot and every feed
/// enumeration see the same list.
pub fn artifacts(config: &ProjectConfig) -> Vec<Artifact> {
    let project = &config.project;
    let feeds: Vec<Feed> = config.active_feeds().cloned().collect();
    let active = ProjectConfig::new(project.clone(), feeds);

    let mut out = vec![
        artifact(
            ArtifactKind::Readme,
            project,
            naming::README_FILE.into(),
            readme(project, &active.feeds),
        ),
        artifact(
            ArtifactKind::Config,
            project,
            naming::CONFIG_FILE.into(),
            config_json(&active),
        ),
        artifact(
            ArtifactKind::SyncScript,
            project,
            naming::SYNC_SCRIPT.into(),
            sync_script(project),
        ),
        artifact(
            ArtifactKind::EnableAllScript,
            project,
            naming::ENABLE_ALL_SCRIPT.into(),
            enable_all_script(project, &active.feeds),
        ),
        artifact(
            ArtifactKind::DisableAllScript,
            project,
            naming::DISABLE_ALL_SCRIPT.into(),
            disable_all_script(project, &active.feeds),
        ),
        artifact(
            ArtifactKind::ProjectUnit,
            project,
            naming::rel_unit(project),
            project_unit(project),
        ),
        artifact(
            ArtifactKind::SyncUnit,
            project,
            naming::rel_sync_unit(project),
            sync_unit(project),
        ),
        artifact(
            ArtifactKind::SyncTimer,
            project,
            naming::rel_sync_timer(project),
            sync_timer(project),
        ),
    ];
    for feed in &active.feeds {
        out.push(artifact(
            ArtifactKind::FeedUnit,
            project,
            naming::rel_feed_unit(feed, project),
            feed_unit(feed, project),
        ));
        out.push(artifact(
            ArtifactKind::FeedScript,
            project,
            naming::rel_feed_script(feed),
            feed_script(feed, project),
        ));
    }
    out
}

fn artifact(kind: ArtifactKind, project: &Project, path: String, contents: String) -> Artifact {
    Artifact {
        kind,
        install_path: naming::install_path(project, &path),
        path,
        contents,
    }
}

fn created_at() -> String {
    chrono::Utc::now().to_rfc2822()
}

fn script_header(summary: &[String]) -> String {
    let mut lines = vec![
        "#!/usr/bin/env bash".to_string(),
        format!("# Created at {}", created_at()),
        "#".to_string(),
    ];
    lines.extend(summary.iter().map(|line| format!("# {line}")));
    lines.join("\n")
}

// ============================================================================
// Feed artifacts
// ============================================================================

/// Collector script: runs the feed command, timestamps each line and splits
/// the stream into batch files in the temp dir.
pub fn feed_script(feed: &Feed, project: &Project) -> String {
    let header = script_header(&[
        format!("Collects {} one record per one line.", feed.hint),
        format!(
            "Data is collected to the temp dir and split into batches of {} records.",
            project.batch_size
        ),
    ]);
    format!(
        r#"{header}
set -e -o pipefail

{command} \
    | stdbuf -oL -eL ts '%.s' \
    | stdbuf -oL -eL split -d -u -l {batch} - {prefix}$(hostname).$(date +%s).
"#,
        command = feed.command,
        batch = project.batch_size,
        prefix = naming::feed_batch_prefix(feed, &naming::temp_dir(project)),
    )
}

/// Service unit running [`feed_script`] as part of the umbrella unit.
pub fn feed_unit(feed: &Feed, project: &Project) -> String {
    let umbrella = naming::unit_name(project);
    format!(
        r#"[Unit]
Description=collect {hint} as part of {name}
PartOf={umbrella}
After={umbrella}

[Service]
ExecStart={script}
Restart=always
RestartSec={RESTART_SEC}

[Install]
WantedBy={umbrella}
"#,
        hint = feed.hint,
        name = project.name,
        script = naming::feed_script_path(feed, project),
    )
}

// ============================================================================
// Project artifacts
// ============================================================================

/// Moves closed batches into the staging dir and pushes them to the target.
///
/// "Closed" means `lsof` reports no holder at the moment of the check. A
/// writer that reopens the file between the check and the `mv` is not
/// detected; feeds never reopen a batch once `split` moves on.
pub fn sync_script(project: &Project) -> String {
    let header = script_header(&[
        "Moves all files without open descriptors from the temp dir to the sync dir.".into(),
        "Expects that a closed file is never opened again.".into(),
        "Then pushes the prepared files to the target host.".into(),
    ]);
    format!(
        r#"{header}
set -e -o pipefail

ls -t "{temp}" | while read FILE;
do
    if ! lsof "{temp}/$FILE"; then
        echo "$FILE"
        mv "{temp}/$FILE" "{sync}/$FILE"
    fi
done
# send to the target host (push); rsync removes local copies only after transfer
/usr/bin/rsync -a --remove-source-files {sync}/. {target}
"#,
        temp = naming::temp_dir(project),
        sync = naming::sync_dir(project),
        target = project.target_host,
    )
}

/// Runs [`sync_script`] once as the project user.
pub fn sync_unit(project: &Project) -> String {
    format!(
        r#"[Unit]
Description=Synchronize {name}
Wants={timer}

[Service]
ExecStart={script}
User={user}

[Install]
WantedBy={umbrella}
"#,
        name = project.name,
        timer = naming::sync_timer_name(project),
        script = naming::sync_script_path(project),
        user = project.service_user(),
        umbrella = naming::unit_name(project),
    )
}

/// Re-triggers [`sync_unit`] a fixed interval after it last finished.
pub fn sync_timer(project: &Project) -> String {
    let umbrella = naming::unit_name(project);
    let sync = naming::sync_unit_name(project);
    format!(
        r#"[Unit]
Description=Synchronization timer of {name}
Requires={sync}
PartOf={umbrella}
After={umbrella}

[Timer]
Unit={sync}
OnUnitInactiveSec={SYNC_INTERVAL}

[Install]
WantedBy={umbrella}
"#,
        name = project.name,
    )
}

/// No-op unit the rest of the project hangs off.
pub fn project_unit(project: &Project) -> String {
    format!(
        r#"[Unit]
Description={name}

[Service]
Type=oneshot
ExecStart=/bin/true
RemainAfterExit=yes
User={user}

[Install]
WantedBy=multi-user.target
"#,
        name = project.name,
        user = project.service_user(),
    )
}

/// Absolute paths of every unit file, umbrella first.
pub fn unit_paths(project: &Project, feeds: &[Feed]) -> Vec<String> {
    let mut paths = vec![
        naming::unit_path(project),
        naming::sync_timer_path(project),
        naming::sync_unit_path(project),
    ];
    paths.extend(
        feeds
            .iter()
            .filter(|f| !f.is_empty())
            .map(|f| naming::feed_unit_path(f, project)),
    );
    paths
}

pub fn enable_all_script(project: &Project, feeds: &[Feed]) -> String {
    let header = script_header(&[format!(
        "Enables all services in {} including the sync unit and the project itself",
        project.name
    )]);
    format!(
        "{header}\n\nmkdir -p {temp} {sync}\nsystemctl enable {units}\n",
        temp = naming::temp_dir(project),
        sync = naming::sync_dir(project),
        units = unit_paths(project, feeds).join(" "),
    )
}

pub fn disable_all_script(project: &Project, feeds: &[Feed]) -> String {
    let header = script_header(&[format!(
        "Disables all services in {} including the sync unit and the project itself",
        project.name
    )]);
    format!(
        "{header}\n\nsystemctl stop {umbrella}\nsystemctl disable {units}\n",
        umbrella = naming::unit_name(project),
        units = unit_paths(project, feeds).join(" "),
    )
}

// ============================================================================
// Documentation and config
// ============================================================================

/// Operator-facing README: parameters, requirements, install and control
/// steps, then one section per feed with its service and file locations.
pub fn readme(project: &Project, feeds: &[Feed]) -> String {
    let umbrella = naming::unit_name(project);
    let mut doc = format!(
        r#"# {name}

The project collects data from several sources (feeds), aggregates it into batches of {batch} records and pushes the batches to a remote host over rsync ({target}).

rsync uses temporary files, so it is safe to use something like `cat <record type>.*` on the target server to combine multiple batches.

# Parameters

* **project name**: {name}
* **created**: {created}
* **batch size**: {batch}
* **target rsync URI**: {target}
* **root dir**: {root}
* **service user**: {user}
* **check interval**: 1 minute

# Requirements

* **lsof** - to detect open descriptors and find prepared batches
* **rsync** - to push data to the target host
* **bash** - for scripts
* **systemd** - for timers and service management
* **ts** - for timestamps in records (moreutils)

Note: ssh access to the target host must work without a password (key based auth).

# Installation

1. Unpack the archive to `{root}`. The main service file must end up at {unit_path}
2. Run `{enable_all}`. It enables all included services but does not start them
3. Run `systemctl start {umbrella}` to start all services and timers

To uninstall, run `{disable_all}`.

# Control

* To see all installed services: `systemctl list-unit-files {slug}*`
* Start everything: `systemctl start {umbrella}`
* Stop everything: `systemctl stop {umbrella}`
* Sync logs: `journalctl -u {sync_unit}`

# Feeds (sources)
"#,
        name = project.name,
        batch = project.batch_size,
        target = project.target_host,
        created = created_at(),
        root = project.root,
        user = project.service_user(),
        unit_path = naming::unit_path(project),
        enable_all = naming::enable_all_script_path(project),
        disable_all = naming::disable_all_script_path(project),
        slug = naming::project_slug(project),
        sync_unit = naming::sync_unit_name(project),
    );

    let temp = naming::temp_dir(project);
    let sync = naming::sync_dir(project);
    for feed in feeds.iter().filter(|f| !f.is_empty()) {
        let service = naming::feed_service_name(feed, project);
        doc.push_str(&format!(
            r#"
## {title}

Script content

```bash
{command}
```

Service name: `{service}`

* start: `systemctl start {service}`
* stop: `systemctl stop {service}`
* logs: `journalctl -u {service}`

Files:

* service unit file: {unit}
* service script: {script}
* temp batch file mask: `{temp_mask}`
* prepared batch file mask: `{sync_mask}`
"#,
            title = if feed.hint.is_empty() { feed_slug(feed) } else { feed.hint.clone() },
            command = feed.command,
            unit = naming::feed_unit_path(feed, project),
            script = naming::feed_script_path(feed, project),
            temp_mask = naming::feed_batch_mask(feed, &temp),
            sync_mask = naming::feed_batch_mask(feed, &sync),
        ));
    }
    doc
}

/// Serialize with four-space indentation, the layout of every JSON file
/// this tool writes.
pub fn pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `config.json` snapshot: `{ "project": {...}, "feeds": [...] }`.
pub fn config_json(config: &ProjectConfig) -> String {
    pretty_json(config).expect("project config must serialize")
}
