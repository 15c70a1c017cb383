//! Workspace persistence through the file-backed store, as the CLI uses it.

use feed_deploy::generate;
use feed_deploy::store::{FileStore, StoreRepository};
use feed_deploy::types::{Feed, FeedPatch, Project, ProjectPatch};
use feed_deploy::workspace::{Workspace, WorkspaceError};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

fn open(dir: &TempDir) -> Workspace<StoreRepository<FileStore>> {
    Workspace::load(StoreRepository::new(FileStore::new(dir.path())))
}

fn moon() -> Project {
    Project {
        name: "Moon Extractor".into(),
        target_host: "u@h:/d".into(),
        ..Project::default()
    }
}

#[test]
fn edits_survive_reopening_the_workspace() {
    let tmp = TempDir::new().unwrap();
    {
        let mut ws = open(&tmp);
        let index = ws.add_project(moon()).unwrap();
        let mut model = ws.project(index).unwrap();
        model.create_feed(Feed::new("cat /dev/ttyS0", "Device 1")).unwrap();
        model.create_feed(Feed::default()).unwrap();
        model
            .update_project(ProjectPatch {
                batch_size: Some(50),
                ..ProjectPatch::default()
            })
            .unwrap();
    }

    let ws = open(&tmp);
    assert_eq!(ws.opened_index(), Some(0));
    let config = ws.opened().unwrap();
    assert_eq!(config.project.batch_size, 50);
    assert_eq!(config.feeds.len(), 2);
    assert!(config.feeds[1].is_empty());
    assert!(tmp.path().join("configs.json").is_file());
    assert_eq!(
        fs::read_to_string(tmp.path().join("openedConfigNum.json")).unwrap(),
        "0"
    );
}

#[test]
fn fresh_directory_is_an_empty_workspace() {
    let tmp = TempDir::new().unwrap();
    let ws = open(&tmp);
    assert!(ws.projects().is_empty());
    assert_eq!(ws.opened_index(), Some(0));
    assert!(ws.opened().is_none());
}

#[test]
fn corrupt_configs_file_loads_empty_and_is_overwritten() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("configs.json"), "{{{").unwrap();
    let mut ws = open(&tmp);
    assert!(ws.projects().is_empty());

    ws.add_project(moon()).unwrap();
    let text = fs::read_to_string(tmp.path().join("configs.json")).unwrap();
    assert!(text.contains("Moon Extractor"));
}

#[test]
fn export_then_import_into_another_workspace() {
    let source_dir = TempDir::new().unwrap();
    let mut source = open(&source_dir);
    source.add_project(moon()).unwrap();
    source
        .opened_project()
        .unwrap()
        .create_feed(Feed::new("df -h", "Free Space"))
        .unwrap();
    source
        .add_project(Project {
            name: "Second".into(),
            ..Project::default()
        })
        .unwrap();
    let exported = source.export_string();
    assert!(exported.starts_with("{\n    \"configs\": ["));

    let target_dir = TempDir::new().unwrap();
    let mut target = open(&target_dir);
    assert_eq!(target.import_str(&exported).unwrap(), 2);
    assert_eq!(target.projects(), source.projects());

    let reopened = open(&target_dir);
    assert_eq!(reopened.projects().len(), 2);
}

#[test]
fn archive_config_snapshot_imports_as_one_project() {
    let tmp = TempDir::new().unwrap();
    let mut ws = open(&tmp);
    ws.add_project(moon()).unwrap();
    ws.opened_project()
        .unwrap()
        .create_feed(Feed::new("cat /dev/ttyS0", "Device 1"))
        .unwrap();
    let original = ws.opened().unwrap().clone();
    let artifacts = generate::artifacts(&original);
    let snapshot = artifacts.iter().find(|a| a.path == "config.json").unwrap();

    assert_eq!(ws.import_str(&snapshot.contents).unwrap(), 1);
    assert_eq!(ws.projects()[1], original);
}

#[test]
fn malformed_import_changes_nothing_on_disk() {
    let tmp = TempDir::new().unwrap();
    let mut ws = open(&tmp);
    ws.add_project(moon()).unwrap();
    let before = fs::read_to_string(tmp.path().join("configs.json")).unwrap();

    assert!(matches!(
        ws.import_str("[1, 2, 3]"),
        Err(WorkspaceError::Import(_))
    ));
    assert!(matches!(
        ws.import_str(r#"{"configs": 7}"#),
        Err(WorkspaceError::Import(_))
    ));
    assert_eq!(ws.projects().len(), 1);
    assert_eq!(
        fs::read_to_string(tmp.path().join("configs.json")).unwrap(),
        before
    );
}

#[test]
fn subscribers_see_each_command() {
    let tmp = TempDir::new().unwrap();
    let mut ws = open(&tmp);
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    ws.subscribe(move |event| sink.borrow_mut().push(format!("{event:?}")));

    ws.add_project(moon()).unwrap();
    let mut model = ws.opened_project().unwrap();
    model.create_feed(Feed::default()).unwrap();
    model
        .update_feed(
            0,
            FeedPatch {
                hint: Some("Device 1".into()),
                ..FeedPatch::default()
            },
        )
        .unwrap();
    model.remove_feed(0).unwrap();

    assert_eq!(
        *seen.borrow(),
        [
            "ProjectAdded { index: 0 }",
            "FeedCreated { project: 0, feed: 0 }",
            "FeedChanged { project: 0, feed: 0 }",
            "FeedRemoved { project: 0, feed: 0 }",
        ]
    );
}
