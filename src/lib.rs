//! # Feed Deploy
//!
//! Builds deployable data-collection projects for small Linux hosts. A
//! project is a name, an install root, an rsync target and a list of feeds:
//! shell commands that print one record per line. From that description the
//! crate generates every file needed to run the feeds under systemd, batch
//! their output and push the batches to the target, and packs the lot into
//! an archive an operator unpacks on the host.
//!
//! # Architecture: Description In, Files Out
//!
//! ```text
//! Workspace (configs.json)  →  ProjectConfig  →  artifacts()  →  FileTree  →  .zip
//!                                                     │
//!                                                     ├─→ check (references resolve?)
//!                                                     └─→ preview (HTML page)
//! ```
//!
//! Everything between the project description and the archive bytes is a
//! pure function. Generation reads only the config; the only varying byte is
//! the creation timestamp in headers. Persistence and archive encoding sit
//! behind traits ([`store::WorkspaceRepository`], [`package::ArchiveCodec`])
//! so the core runs against in-memory fakes in tests.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`types`] | Data model: `Feed`, `Project`, `ProjectConfig`, field patches, sample feeds |
//! | [`naming`] | Slugs and every file, unit and directory name derived from them |
//! | [`generate`] | Text of each artifact (scripts, units, README, config snapshot) and the ordered inventory |
//! | [`package`] | File tree, archive codec seam, zip codec, on-disk rendering |
//! | [`store`] | Key-value slots (memory, one file per key) and the workspace repository on top |
//! | [`workspace`] | Project list, selection, edit commands with change events, import/export |
//! | [`check`] | Cross-reference check of generated files against the packaged tree |
//! | [`preview`] | Single-page HTML preview of every generated file, built with Maud |
//! | [`config`] | `config.toml` loading and validation: new-project defaults, archive options |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One Slug Function
//!
//! Every derived name (project folder, unit names, script names, batch file
//! prefixes) goes through [`naming::slug`]: lowercase, whitespace runs become
//! one `-`. The README, the unit files and the archive layout all call the
//! same [`naming`] functions, so a path the README mentions is the path the
//! archive ships. [`check`] verifies that by reading the files back.
//!
//! ## Umbrella Unit
//!
//! Each project gets a no-op oneshot unit that stays active. Feed units and
//! the sync timer are `PartOf=` it, so one `systemctl start|stop` controls the
//! whole project while each feed still restarts on its own.
//!
//! ## Empty Feeds Are Placeholders
//!
//! A feed with both fields empty is an unfilled editor row. It keeps its
//! index in the workspace but never reaches a generated file: no script, no
//! unit, no README section, no entry in `config.json`.
//!
//! ## Writes Through, Every Time
//!
//! Each workspace command saves the whole state before returning. A failed
//! write is reported, not retried; memory stays ahead of the store until the
//! next successful save.

pub mod check;
pub mod config;
pub mod generate;
pub mod naming;
pub mod output;
pub mod package;
pub mod preview;
pub mod store;
pub mod types;
pub mod workspace;

#[cfg(test)]
pub(crate) mod test_helpers;
