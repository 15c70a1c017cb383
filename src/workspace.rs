//! The editable workspace: an ordered list of projects, the open-project
//! selection, and the commands that change them.
//!
//! [`Workspace`] owns the in-memory [`WorkspaceState`] and a
//! [`WorkspaceRepository`]. Every command mutates memory, notifies
//! subscribers, then writes the full state back through the repository
//! before returning. There is no batching and no deferred flush.
//!
//! Per-project edits go through a [`ProjectModel`], a short-lived handle
//! borrowed from the workspace for one project index:
//!
//! ```rust,no_run
//! use feed_deploy::store::{MemoryStore, StoreRepository};
//! use feed_deploy::types::{Feed, Project};
//! use feed_deploy::workspace::Workspace;
//!
//! let mut ws = Workspace::load(StoreRepository::new(MemoryStore::new()));
//! let index = ws.add_project(Project { name: "Moon Extractor".into(), ..Project::default() })?;
//! ws.project(index)?.create_feed(Feed::new("cat /dev/ttyS0", "Device 1"))?;
//! # Ok::<(), feed_deploy::workspace::WorkspaceError>(())
//! ```
//!
//! ## Durability
//!
//! A failed write returns [`WorkspaceError::Persist`] after the in-memory
//! change has already been applied; memory is then ahead of the store until
//! the next successful write. Nothing is retried or rolled back.
//!
//! ## Import
//!
//! Import text is untrusted. It is parsed completely before anything is
//! touched, so a malformed payload leaves both memory and store unchanged.
//! Accepted shapes:
//!
//! | Shape | Result |
//! |-------|--------|
//! | `{"configs": [{project, feeds}, ...]}` | every config appended |
//! | `{"project": {...}, "feeds": [...]}` | one config appended (archive `config.json`) |
//! | `{"name": ..., "feeds": [...], ...}` | one config appended (flat project) |

use crate::generate::{self, Artifact};
use crate::store::{StoreError, WorkspaceRepository, WorkspaceState};
use crate::types::{Feed, FeedPatch, Project, ProjectConfig, ProjectPatch};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Expected a JSON object at the top level")]
    NotAnObject,
    #[error("'configs' must be an array of project configs")]
    ConfigsNotArray,
}

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("No project at index {0}")]
    NoSuchProject(usize),
    #[error("No feed at index {feed} in project {project}")]
    NoSuchFeed { project: usize, feed: usize },
    #[error("No project is open")]
    NoOpenProject,
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),
    #[error("Change applied but not saved: {0}")]
    Persist(#[from] StoreError),
}

/// State-change notification delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceEvent {
    ProjectAdded { index: usize },
    ProjectOpened { index: usize },
    ProjectDeleted { index: usize },
    ProjectChanged { index: usize },
    FeedCreated { project: usize, feed: usize },
    FeedChanged { project: usize, feed: usize },
    FeedRemoved { project: usize, feed: usize },
    Imported { first: usize, count: usize },
}

type Listener = Box<dyn FnMut(&WorkspaceEvent)>;

/// Ordered project list plus the open-project selection.
pub struct Workspace<R> {
    repo: R,
    state: WorkspaceState,
    listeners: Vec<Listener>,
}

impl<R: WorkspaceRepository> Workspace<R> {
    /// Load the persisted state (or an empty workspace) from `repo`.
    pub fn load(repo: R) -> Self {
        let state = repo.load();
        Self {
            repo,
            state,
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &WorkspaceState {
        &self.state
    }

    pub fn projects(&self) -> &[ProjectConfig] {
        &self.state.configs
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Persisted selection; may point past the end after external edits.
    pub fn opened_index(&self) -> Option<usize> {
        self.state.opened_config_num
    }

    /// The open project, if the selection points at one.
    pub fn opened(&self) -> Option<&ProjectConfig> {
        self.opened_index().and_then(|i| self.state.configs.get(i))
    }

    /// Register a callback run after every successful in-memory change.
    pub fn subscribe(&mut self, listener: impl FnMut(&WorkspaceEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Append a project and open it. Returns its index.
    pub fn add_project(&mut self, project: Project) -> Result<usize, WorkspaceError> {
        self.state
            .configs
            .push(ProjectConfig::new(project, Vec::new()));
        let index = self.state.configs.len() - 1;
        self.state.opened_config_num = Some(index);
        self.commit(WorkspaceEvent::ProjectAdded { index })?;
        Ok(index)
    }

    pub fn open_project(&mut self, index: usize) -> Result<(), WorkspaceError> {
        self.check_project(index)?;
        self.state.opened_config_num = Some(index);
        self.commit(WorkspaceEvent::ProjectOpened { index })
    }

    /// Remove a project by index.
    ///
    /// The selection follows the project it pointed at: it shifts down when
    /// an earlier project goes and is cleared when the open one goes.
    pub fn delete_project(&mut self, index: usize) -> Result<ProjectConfig, WorkspaceError> {
        self.check_project(index)?;
        let removed = self.state.configs.remove(index);
        self.state.opened_config_num = match self.state.opened_config_num {
            Some(open) if open == index => None,
            Some(open) if open > index => Some(open - 1),
            other => other,
        };
        self.commit(WorkspaceEvent::ProjectDeleted { index })?;
        Ok(removed)
    }

    /// Editing handle for the project at `index`.
    pub fn project(&mut self, index: usize) -> Result<ProjectModel<'_, R>, WorkspaceError> {
        self.check_project(index)?;
        Ok(ProjectModel {
            workspace: self,
            index,
        })
    }

    /// Editing handle for the open project.
    pub fn opened_project(&mut self) -> Result<ProjectModel<'_, R>, WorkspaceError> {
        match self.opened_index() {
            Some(index) if index < self.state.configs.len() => self.project(index),
            _ => Err(WorkspaceError::NoOpenProject),
        }
    }

    /// Parse `text` and append what it contains. Returns how many projects
    /// were added.
    pub fn import_str(&mut self, text: &str) -> Result<usize, WorkspaceError> {
        let configs = match parse_import(text)? {
            ImportPayload::Workspace(configs) => configs,
            ImportPayload::Project(config) => vec![config],
        };
        let first = self.state.configs.len();
        let count = configs.len();
        self.state.configs.extend(configs);
        info!(count, "imported projects");
        self.commit(WorkspaceEvent::Imported { first, count })?;
        Ok(count)
    }

    /// `{"configs": [...]}` with four-space indentation.
    pub fn export_string(&self) -> String {
        export_configs(&self.state.configs)
    }

    fn check_project(&self, index: usize) -> Result<(), WorkspaceError> {
        if index < self.state.configs.len() {
            Ok(())
        } else {
            Err(WorkspaceError::NoSuchProject(index))
        }
    }

    fn commit(&mut self, event: WorkspaceEvent) -> Result<(), WorkspaceError> {
        debug!(?event, "workspace changed");
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.repo.save(&self.state).map_err(|e| {
            warn!(error = %e, "workspace not saved; in-memory state is ahead of the store");
            WorkspaceError::Persist(e)
        })
    }
}

/// Editing handle for one project, borrowed from its [`Workspace`].
pub struct ProjectModel<'w, R> {
    workspace: &'w mut Workspace<R>,
    index: usize,
}

impl<R: WorkspaceRepository> ProjectModel<'_, R> {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.workspace.state.configs[self.index]
    }

    /// Every artifact of the current data, generated now.
    pub fn artifacts(&self) -> Vec<Artifact> {
        generate::artifacts(self.config())
    }

    /// Append a feed (empty sentinel rows included). Returns its index.
    pub fn create_feed(&mut self, feed: Feed) -> Result<usize, WorkspaceError> {
        let feeds = &mut self.config_mut().feeds;
        feeds.push(feed);
        let feed = feeds.len() - 1;
        self.commit(WorkspaceEvent::FeedCreated {
            project: self.index,
            feed,
        })?;
        Ok(feed)
    }

    pub fn update_feed(&mut self, feed: usize, patch: FeedPatch) -> Result<(), WorkspaceError> {
        let project = self.index;
        let target = self
            .config_mut()
            .feeds
            .get_mut(feed)
            .ok_or(WorkspaceError::NoSuchFeed { project, feed })?;
        patch.apply(target);
        self.commit(WorkspaceEvent::FeedChanged { project, feed })
    }

    pub fn remove_feed(&mut self, feed: usize) -> Result<Feed, WorkspaceError> {
        let project = self.index;
        let feeds = &mut self.config_mut().feeds;
        if feed >= feeds.len() {
            return Err(WorkspaceError::NoSuchFeed { project, feed });
        }
        let removed = feeds.remove(feed);
        self.commit(WorkspaceEvent::FeedRemoved { project, feed })?;
        Ok(removed)
    }

    pub fn update_project(&mut self, patch: ProjectPatch) -> Result<(), WorkspaceError> {
        patch.apply(&mut self.config_mut().project);
        self.commit(WorkspaceEvent::ProjectChanged { index: self.index })
    }

    fn config_mut(&mut self) -> &mut ProjectConfig {
        &mut self.workspace.state.configs[self.index]
    }

    fn commit(&mut self, event: WorkspaceEvent) -> Result<(), WorkspaceError> {
        self.workspace.commit(event)
    }
}

// ============================================================================
// Import / export payloads
// ============================================================================

/// A classified import payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportPayload {
    Workspace(Vec<ProjectConfig>),
    Project(ProjectConfig),
}

/// Classify and parse import text. A top-level `configs` key marks a
/// workspace; anything else is read as a single project.
pub fn parse_import(text: &str) -> Result<ImportPayload, ImportError> {
    let mut object = parse_object(text)?;
    match object.remove("configs") {
        Some(Value::Array(items)) => {
            let configs = items
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<ProjectConfig>, _>>()?;
            Ok(ImportPayload::Workspace(configs))
        }
        Some(_) => Err(ImportError::ConfigsNotArray),
        None => Ok(ImportPayload::Project(config_from_object(object)?)),
    }
}

/// Parse one project config, either `{project, feeds}` or the flat
/// `{name, ..., feeds}` form.
pub fn parse_config_content(text: &str) -> Result<ProjectConfig, ImportError> {
    config_from_object(parse_object(text)?)
}

fn parse_object(text: &str) -> Result<Map<String, Value>, ImportError> {
    match serde_json::from_str(text)? {
        Value::Object(object) => Ok(object),
        _ => Err(ImportError::NotAnObject),
    }
}

fn config_from_object(mut object: Map<String, Value>) -> Result<ProjectConfig, ImportError> {
    let feeds: Vec<Feed> = match object.remove("feeds") {
        None | Some(Value::Null) => Vec::new(),
        Some(value) => serde_json::from_value(value)?,
    };
    let project: Project = match object.remove("project") {
        Some(nested @ Value::Object(_)) => serde_json::from_value(nested)?,
        _ => serde_json::from_value(Value::Object(object))?,
    };
    Ok(ProjectConfig::new(project, feeds))
}

#[derive(Serialize)]
struct ExportPayload<'a> {
    configs: &'a [ProjectConfig],
}

/// Serialize a project list as a workspace export.
pub fn export_configs(configs: &[ProjectConfig]) -> String {
    generate::pretty_json(&ExportPayload { configs }).expect("workspace must serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::ReadOnlyStore;
    use crate::store::{CONFIGS_KEY, KeyValueStore, MemoryStore, OPENED_KEY, StoreRepository};
    use crate::test_helpers::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    type MemWorkspace = Workspace<StoreRepository<MemoryStore>>;

    fn empty_workspace() -> MemWorkspace {
        Workspace::load(StoreRepository::new(MemoryStore::new()))
    }

    fn persisted(ws: &MemWorkspace) -> WorkspaceState {
        ws.repository().load()
    }

    fn record_events(ws: &mut MemWorkspace) -> Rc<RefCell<Vec<WorkspaceEvent>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        ws.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        events
    }

    #[test]
    fn add_project_appends_opens_and_persists() {
        let mut ws = empty_workspace();
        let index = ws.add_project(moon_extractor()).unwrap();
        assert_eq!(index, 0);
        assert_eq!(ws.opened_index(), Some(0));
        assert_eq!(ws.opened().unwrap().project, moon_extractor());
        assert_eq!(persisted(&ws), *ws.state());
    }

    #[test]
    fn every_mutation_is_persisted_immediately() {
        let mut ws = empty_workspace();
        let index = ws.add_project(moon_extractor()).unwrap();

        ws.project(index).unwrap().create_feed(device_feed()).unwrap();
        assert_eq!(persisted(&ws).configs[0].feeds, vec![device_feed()]);

        ws.project(index)
            .unwrap()
            .update_feed(
                0,
                FeedPatch {
                    hint: Some("Serial".into()),
                    ..FeedPatch::default()
                },
            )
            .unwrap();
        assert_eq!(persisted(&ws).configs[0].feeds[0].hint, "Serial");

        ws.project(index)
            .unwrap()
            .update_project(ProjectPatch {
                batch_size: Some(10),
                ..ProjectPatch::default()
            })
            .unwrap();
        assert_eq!(persisted(&ws).configs[0].project.batch_size, 10);

        let removed = ws.project(index).unwrap().remove_feed(0).unwrap();
        assert_eq!(removed.hint, "Serial");
        assert!(persisted(&ws).configs[0].feeds.is_empty());
    }

    #[test]
    fn feed_commands_reject_bad_indices() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let mut model = ws.project(0).unwrap();
        assert!(matches!(
            model.update_feed(3, FeedPatch::default()),
            Err(WorkspaceError::NoSuchFeed { project: 0, feed: 3 })
        ));
        assert!(matches!(
            model.remove_feed(0),
            Err(WorkspaceError::NoSuchFeed { .. })
        ));
        assert!(matches!(ws.project(5), Err(WorkspaceError::NoSuchProject(5))));
    }

    #[test]
    fn sentinel_feed_can_be_created_and_filled() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let mut model = ws.opened_project().unwrap();
        let row = model.create_feed(Feed::default()).unwrap();
        assert_eq!(model.artifacts().len(), 8, "empty row generates nothing");
        model
            .update_feed(
                row,
                FeedPatch {
                    command: Some("cat /dev/ttyS0".into()),
                    hint: Some("Device 1".into()),
                },
            )
            .unwrap();
        assert_eq!(model.artifacts().len(), 10);
    }

    #[test]
    fn artifacts_follow_edits() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let mut model = ws.opened_project().unwrap();
        model.create_feed(device_feed()).unwrap();
        model
            .update_project(ProjectPatch {
                name: Some("Sun Catcher".into()),
                ..ProjectPatch::default()
            })
            .unwrap();
        let list = model.artifacts();
        let unit = find_artifact(&list, "systemd/sun-catcher.device-1.service");
        assert!(unit.contents.contains("PartOf=sun-catcher.service"));
    }

    #[test]
    fn subscribers_see_each_change() {
        let mut ws = empty_workspace();
        let events = record_events(&mut ws);
        ws.add_project(moon_extractor()).unwrap();
        ws.project(0).unwrap().create_feed(device_feed()).unwrap();
        ws.open_project(0).unwrap();
        assert_eq!(
            *events.borrow(),
            [
                WorkspaceEvent::ProjectAdded { index: 0 },
                WorkspaceEvent::FeedCreated { project: 0, feed: 0 },
                WorkspaceEvent::ProjectOpened { index: 0 },
            ]
        );
    }

    #[test]
    fn delete_keeps_selection_on_same_project() {
        let mut ws = empty_workspace();
        for name in ["a", "b", "c"] {
            ws.add_project(named_config(name).project).unwrap();
        }
        assert_eq!(ws.opened_index(), Some(2));
        ws.delete_project(0).unwrap();
        assert_eq!(ws.opened_index(), Some(1));
        assert_eq!(ws.opened().unwrap().project.name, "c");

        ws.delete_project(1).unwrap();
        assert_eq!(ws.opened_index(), None);
        assert!(matches!(ws.opened_project(), Err(WorkspaceError::NoOpenProject)));
        assert_eq!(persisted(&ws).opened_config_num, None);
    }

    #[test]
    fn delete_out_of_range_changes_nothing() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        assert!(matches!(
            ws.delete_project(1),
            Err(WorkspaceError::NoSuchProject(1))
        ));
        assert_eq!(ws.projects().len(), 1);
    }

    #[test]
    fn import_workspace_appends_all_configs() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let payload = export_configs(&[named_config("a"), named_config("b")]);
        assert_eq!(ws.import_str(&payload).unwrap(), 2);
        let names: Vec<&str> = ws.projects().iter().map(|c| c.project.name.as_str()).collect();
        assert_eq!(names, ["Moon Extractor", "a", "b"]);
        assert_eq!(persisted(&ws).configs.len(), 3);
    }

    #[test]
    fn import_flat_project_appends_one() {
        let mut ws = empty_workspace();
        let payload = r#"{"name": "Moon Extractor", "root": "/opt", "targetHost": "u@h:/d",
            "batchSize": 100, "feeds": [{"command": "cat /dev/ttyS0", "hint": "Device 1"}]}"#;
        assert_eq!(ws.import_str(payload).unwrap(), 1);
        assert_eq!(ws.projects()[0], moon_config());
    }

    #[test]
    fn import_archive_config_json_appends_one() {
        let mut ws = empty_workspace();
        let list = generate::artifacts(&moon_config());
        let config_json = &find_artifact(&list, "config.json").contents;
        assert_eq!(ws.import_str(config_json).unwrap(), 1);
        assert_eq!(ws.projects()[0], moon_config());
    }

    #[test]
    fn import_with_null_feeds_has_no_feeds() {
        let mut ws = empty_workspace();
        for payload in [
            r#"{"name": "Moon", "feeds": null}"#,
            r#"{"project": {"name": "Sun"}, "feeds": null}"#,
            r#"{"configs": [{"project": {"name": "Star"}, "feeds": null}]}"#,
        ] {
            assert_eq!(ws.import_str(payload).unwrap(), 1, "{payload}");
        }
        assert_eq!(ws.projects().len(), 3);
        assert!(ws.projects().iter().all(|c| c.feeds.is_empty()));
        assert_eq!(ws.projects()[0].project.name, "Moon");
    }

    #[test]
    fn malformed_import_leaves_state_untouched() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let before = ws.state().clone();
        for bad in ["{not json", "[1, 2]", r#"{"configs": 3}"#, r#"{"configs": [{"feeds": 1}]}"#] {
            assert!(
                matches!(ws.import_str(bad), Err(WorkspaceError::Import(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(*ws.state(), before);
        assert_eq!(persisted(&ws), before);
    }

    #[test]
    fn config_round_trip_preserves_fields_and_order() {
        let mut config = moon_config();
        config.project.user = "pi".into();
        config.feeds.push(Feed::new("df -h", "Free Space"));
        config.feeds.push(Feed::new("uptime", ""));
        let text = generate::config_json(&config);
        assert_eq!(parse_config_content(&text).unwrap(), config);
    }

    #[test]
    fn export_is_configs_object() {
        let mut ws = empty_workspace();
        ws.add_project(moon_extractor()).unwrap();
        let text = ws.export_string();
        assert!(text.starts_with("{\n    \"configs\": [\n"));
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["configs"][0]["project"]["name"], "Moon Extractor");
    }

    #[test]
    fn failed_write_keeps_memory_change() {
        let mut ws = Workspace::load(StoreRepository::new(ReadOnlyStore::default()));
        let err = ws.add_project(moon_extractor()).unwrap_err();
        assert!(matches!(err, WorkspaceError::Persist(_)));
        assert_eq!(ws.projects().len(), 1);
        assert_eq!(ws.repository().store().get(CONFIGS_KEY).unwrap(), None);
    }

    #[test]
    fn load_resumes_saved_selection() {
        let mut store = MemoryStore::new();
        store
            .set(CONFIGS_KEY, &serde_json::to_string(&vec![moon_config()]).unwrap())
            .unwrap();
        store.set(OPENED_KEY, "0").unwrap();
        let ws = Workspace::load(StoreRepository::new(store));
        assert_eq!(ws.opened(), Some(&moon_config()));
    }
}
