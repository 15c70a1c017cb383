//! Archive packaging.
//!
//! Collects every generated artifact into a [`FileTree`] rooted at the
//! project slug and hands it to an [`ArchiveCodec`]. The codec is the only
//! part that knows about a container format; the production codec is
//! [`ZipCodec`].
//!
//! ## Tree Layout
//!
//! ```text
//! moon-extractor/
//! ├── README.md
//! ├── config.json
//! ├── bin/sync.sh               (0755)
//! ├── bin/enable-all.sh         (0755)
//! ├── bin/disable-all.sh        (0755)
//! ├── scripts/<feed>.sh         (0755)
//! ├── systemd/*.service|.timer
//! ├── temp/                     (empty)
//! └── to-sync/                  (empty)
//! ```
//!
//! Files ending in `.sh` are executable; everything else is `0644`.
//!
//! ## Failure
//!
//! Packaging is all-or-nothing. A codec error is returned as-is inside
//! [`PackageError::Codec`]; nothing is retried and no partial archive is
//! produced. Two feeds whose hints slug to the same name would overwrite
//! each other's script and unit, so the tree refuses to build instead. The
//! same goes for a slug such as `..` or `a/b` that would not stay inside the
//! project folder.

use crate::config::Compression;
use crate::generate;
use crate::naming;
use crate::types::ProjectConfig;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Several feeds share the slug '{0}'; rename one of their hints")]
    DuplicateFeedSlug(String),
    #[error("'{0}' cannot be used as a file name; rename the project or feed")]
    UnsafeName(String),
    #[error("Archive codec failed: {0}")]
    Codec(#[from] CodecError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Permission class of a packaged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
}

impl FileMode {
    pub fn for_path(path: &str) -> Self {
        if path.ends_with(".sh") {
            Self::Executable
        } else {
            Self::Regular
        }
    }

    pub fn unix_permissions(self) -> u32 {
        match self {
            Self::Regular => 0o644,
            Self::Executable => 0o755,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeFile {
    pub contents: String,
    pub mode: FileMode,
}

/// In-memory file tree handed to a codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    /// Top-level folder every entry lives under.
    pub root: String,
    /// Files keyed by path relative to `root`.
    pub files: BTreeMap<String, TreeFile>,
    /// Empty directories relative to `root`.
    pub dirs: Vec<String>,
}

impl FileTree {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            files: BTreeMap::new(),
            dirs: Vec::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        let path = path.into();
        let mode = FileMode::for_path(&path);
        self.files.insert(
            path,
            TreeFile {
                contents: contents.into(),
                mode,
            },
        );
    }

    pub fn add_dir(&mut self, path: impl Into<String>) {
        self.dirs.push(path.into());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn has_dir(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        self.dirs.iter().any(|d| d == path)
            || self
                .files
                .keys()
                .any(|f| f.strip_prefix(path).is_some_and(|rest| rest.starts_with('/')))
    }
}

/// Turns a [`FileTree`] into archive bytes.
pub trait ArchiveCodec {
    /// File extension of the produced archive, without the dot.
    fn extension(&self) -> &str;

    fn encode(&self, tree: &FileTree) -> Result<Vec<u8>, CodecError>;
}

/// Zip container with unix permissions recorded per entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec {
    compression: Compression,
}

impl ZipCodec {
    pub fn new(compression: Compression) -> Self {
        Self { compression }
    }

    fn options(&self, permissions: u32) -> SimpleFileOptions {
        let method = match self.compression {
            Compression::Deflated => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
        };
        SimpleFileOptions::default()
            .compression_method(method)
            .unix_permissions(permissions)
    }
}

impl ArchiveCodec for ZipCodec {
    fn extension(&self) -> &str {
        "zip"
    }

    fn encode(&self, tree: &FileTree) -> Result<Vec<u8>, CodecError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.add_directory(format!("{}/", tree.root), self.options(0o755))?;
        for (path, file) in &tree.files {
            zip.start_file(
                format!("{}/{}", tree.root, path),
                self.options(file.mode.unix_permissions()),
            )?;
            zip.write_all(file.contents.as_bytes())?;
        }
        for dir in &tree.dirs {
            zip.add_directory(format!("{}/{}/", tree.root, dir), self.options(0o755))?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Build the file tree of a project.
///
/// Sentinel feeds are skipped. Fails with [`PackageError::UnsafeName`] when
/// a project or feed slug is not a plain path component, and with
/// [`PackageError::DuplicateFeedSlug`] when two remaining feeds would
/// generate the same paths.
pub fn build_tree(config: &ProjectConfig) -> Result<FileTree, PackageError> {
    if let Some(slug) = naming::unsafe_slugs(&config.project, &config.feeds)
        .into_iter()
        .next()
    {
        return Err(PackageError::UnsafeName(slug));
    }
    if let Some(slug) = naming::duplicate_feed_slugs(&config.feeds).into_iter().next() {
        return Err(PackageError::DuplicateFeedSlug(slug));
    }

    let mut tree = FileTree::new(naming::project_slug(&config.project));
    for artifact in generate::artifacts(config) {
        tree.insert(artifact.path, artifact.contents);
    }
    tree.add_dir(naming::TEMP_DIR);
    tree.add_dir(naming::SYNC_DIR);
    Ok(tree)
}

/// A packaged project ready to be offered as a download.
#[derive(Debug, Clone)]
pub struct Archive {
    /// `<project-slug>.<extension>`
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Build the tree and encode it with `codec`.
pub fn package(config: &ProjectConfig, codec: &dyn ArchiveCodec) -> Result<Archive, PackageError> {
    let tree = build_tree(config)?;
    debug!(root = %tree.root, files = tree.files.len(), "encoding archive");
    let bytes = codec.encode(&tree)?;
    let file_name = format!("{}.{}", tree.root, codec.extension());
    info!(file = %file_name, bytes = bytes.len(), "packaged project");
    Ok(Archive { file_name, bytes })
}

/// Write the tree under `dest/<root>/`, creating directories as needed.
///
/// Permissions are applied on unix; elsewhere files keep the platform default.
pub fn write_tree(tree: &FileTree, dest: &Path) -> Result<(), PackageError> {
    let base = dest.join(&tree.root);
    fs::create_dir_all(&base)?;
    for (path, file) in &tree.files {
        let target = base.join(path);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, &file.contents)?;
        set_mode(&target, file.mode)?;
    }
    for dir in &tree.dirs {
        fs::create_dir_all(base.join(dir))?;
    }
    info!(path = %base.display(), "rendered project tree");
    Ok(())
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: FileMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.unix_permissions()))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: FileMode) -> io::Result<()> {
    Ok(())
}
