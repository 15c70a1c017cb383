use clap::{Args, Parser, Subcommand};
use feed_deploy::config;
use feed_deploy::store::{FileStore, StoreRepository};
use feed_deploy::types::{Feed, FeedPatch, ProjectConfig, ProjectPatch, SampleFeed};
use feed_deploy::workspace::Workspace;
use feed_deploy::{check, output, package, preview};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type Repo = StoreRepository<FileStore>;

#[derive(Parser)]
#[command(name = "feed-deploy")]
#[command(version, about = "Deployable data-collection projects for small Linux hosts")]
#[command(long_about = "\
Deployable data-collection projects for small Linux hosts

A project bundles feeds (shell commands printing one record per line) with a
target rsync URI. Packaging produces an archive that unpacks to:

  <root>/<project>/
  ├── README.md                    # Install and control instructions
  ├── config.json                  # Snapshot of the project, re-importable
  ├── bin/sync.sh                  # Moves closed batches to to-sync/, pushes with rsync
  ├── bin/enable-all.sh            # systemctl enable for every unit
  ├── bin/disable-all.sh
  ├── scripts/<feed>.sh            # Collector: command | ts | split into batches
  ├── systemd/<project>.service    # Umbrella unit; start/stop the whole project
  ├── systemd/<project>-sync.*     # Sync service and its 1 minute timer
  ├── systemd/<project>.<feed>.service
  ├── temp/                        # Batches being written
  └── to-sync/                     # Batches waiting for rsync

Commands act on the open project unless they take an index. The workspace
(projects plus the open-project index) lives in --workspace.

Run 'feed-deploy gen-config' to generate a documented config.toml.")]
struct Cli {
    /// Workspace directory (projects, selection, config.toml)
    #[arg(long, default_value = ".feed-deploy", global = true)]
    workspace: PathBuf,

    /// Log filter, e.g. "debug" or "feed_deploy=trace"
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

/// Project fields; omitted flags keep their current value.
#[derive(Args, Clone, Default)]
struct ProjectFields {
    #[arg(long)]
    name: Option<String>,
    /// Install root, e.g. /opt
    #[arg(long)]
    root: Option<String>,
    /// rsync destination, e.g. user@host:/data
    #[arg(long)]
    target_host: Option<String>,
    /// Records per batch file
    #[arg(long)]
    batch_size: Option<u32>,
    /// Service user ("" = root)
    #[arg(long)]
    user: Option<String>,
}

impl From<ProjectFields> for ProjectPatch {
    fn from(f: ProjectFields) -> Self {
        Self {
            name: f.name,
            root: f.root,
            target_host: f.target_host,
            batch_size: f.batch_size,
            user: f.user,
        }
    }
}

#[derive(Args, Clone, Default)]
struct FeedFields {
    /// Command printing one record per line
    #[arg(long)]
    command: Option<String>,
    /// Record type label; names the feed's script and unit
    #[arg(long)]
    hint: Option<String>,
}

impl From<FeedFields> for FeedPatch {
    fn from(f: FeedFields) -> Self {
        Self {
            command: f.command,
            hint: f.hint,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List projects; the open one is marked with >>
    List,
    /// Create a project from config defaults and open it
    New(ProjectFields),
    /// Open the project at INDEX
    Open { index: usize },
    /// Delete the project at INDEX
    Delete { index: usize },
    /// Change fields of the open project
    Set(ProjectFields),
    /// Edit the feeds of the open project
    #[command(subcommand)]
    Feed(FeedCommand),
    /// List the files the open project generates
    Files,
    /// Print one generated file, by path relative to the project folder
    Show { path: String },
    /// Write the open project's archive
    Package {
        /// Directory the archive is written to
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write the open project's files unpacked
    Render {
        #[arg(long)]
        out: PathBuf,
    },
    /// Write an HTML page previewing every generated file
    Preview {
        #[arg(long)]
        out: PathBuf,
    },
    /// Verify every path and unit the generated files mention is packaged
    Check,
    /// Append projects from workspace exports or config.json snapshots
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Write every project as one JSON document
    Export {
        #[arg(long, default_value = "workspace.json")]
        out: PathBuf,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum FeedCommand {
    /// Append a feed, from flags or a ready-made sample
    Add {
        #[command(flatten)]
        fields: FeedFields,
        /// Start from a sample feed; flags override its fields
        #[arg(long, value_enum)]
        sample: Option<SampleFeed>,
    },
    /// Change fields of the feed at INDEX
    Set {
        index: usize,
        #[command(flatten)]
        fields: FeedFields,
    },
    /// Remove the feed at INDEX
    Rm { index: usize },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let mut ws = Workspace::load(StoreRepository::new(FileStore::new(&cli.workspace)));

    match cli.command {
        Command::List => output::print_workspace(ws.state()),
        Command::New(fields) => {
            let app_config = config::load_config(&cli.workspace)?;
            let mut project = app_config.defaults.new_project("");
            ProjectPatch::from(fields).apply(&mut project);
            let index = ws.add_project(project)?;
            println!("Created project {index}");
            output::print_project(&ws.projects()[index]);
        }
        Command::Open { index } => {
            ws.open_project(index)?;
            output::print_project(&ws.projects()[index]);
        }
        Command::Delete { index } => {
            let removed = ws.delete_project(index)?;
            let name = match removed.project.name.as_str() {
                "" => "unnamed",
                name => name,
            };
            println!("Deleted project {index} ({name})");
        }
        Command::Set(fields) => {
            let patch = ProjectPatch::from(fields);
            let mut model = ws.opened_project()?;
            if patch.is_noop() {
                warn!("no fields given; nothing changed");
            } else {
                model.update_project(patch)?;
            }
            output::print_project(model.config());
        }
        Command::Feed(command) => {
            let mut model = ws.opened_project()?;
            match command {
                FeedCommand::Add { fields, sample } => {
                    let mut feed = sample.map(Feed::sample).unwrap_or_default();
                    FeedPatch::from(fields).apply(&mut feed);
                    let index = model.create_feed(feed)?;
                    println!("Added feed {index}");
                }
                FeedCommand::Set { index, fields } => {
                    let patch = FeedPatch::from(fields);
                    if patch.is_noop() {
                        warn!("no fields given; nothing changed");
                    } else {
                        model.update_feed(index, patch)?;
                    }
                }
                FeedCommand::Rm { index } => {
                    model.remove_feed(index)?;
                    println!("Removed feed {index}");
                }
            }
            output::print_project(model.config());
        }
        Command::Files => {
            let config = ready_project(&mut ws)?;
            let artifacts = feed_deploy::generate::artifacts(&config);
            output::print_artifacts(&config, &artifacts);
        }
        Command::Show { path } => {
            let config = ready_project(&mut ws)?;
            let artifacts = feed_deploy::generate::artifacts(&config);
            match artifacts.iter().find(|a| a.path == path) {
                Some(artifact) => print!("{}", artifact.contents),
                None => {
                    return Err(
                        format!("no generated file at '{path}'; see 'feed-deploy files'").into(),
                    );
                }
            }
        }
        Command::Package { out } => {
            let app_config = config::load_config(&cli.workspace)?;
            let config = ready_project(&mut ws)?;
            let codec = package::ZipCodec::new(app_config.archive.compression);
            let archive = package::package(&config, &codec)?;
            fs::create_dir_all(&out)?;
            let path = out.join(&archive.file_name);
            fs::write(&path, &archive.bytes)?;
            println!("Wrote {} ({} bytes)", path.display(), archive.bytes.len());
        }
        Command::Render { out } => {
            let config = ready_project(&mut ws)?;
            let tree = package::build_tree(&config)?;
            package::write_tree(&tree, &out)?;
            println!("Wrote {}", out.join(&tree.root).display());
        }
        Command::Preview { out } => {
            let config = ready_project(&mut ws)?;
            write_file(&out, &preview::render_preview(&config).into_string())?;
            println!("Wrote {}", out.display());
        }
        Command::Check => {
            let config = ws.opened_project()?.config().clone();
            let findings = check::check(&config);
            output::print_findings(&findings);
            if !findings.is_empty() {
                return Err(format!("{} problems found", findings.len()).into());
            }
        }
        Command::Import { files } => import_files(&mut ws, &files),
        Command::Export { out } => {
            write_file(&out, &ws.export_string())?;
            println!("Exported {} projects to {}", ws.projects().len(), out.display());
        }
        Command::GenConfig => print!("{}", config::stock_config_toml()),
    }

    Ok(())
}

/// The open project, refusing one that cannot be generated yet.
fn ready_project(ws: &mut Workspace<Repo>) -> Result<ProjectConfig, Box<dyn std::error::Error>> {
    let config = ws.opened_project()?.config().clone();
    let missing = config.missing_fields();
    if missing.is_empty() {
        Ok(config)
    } else {
        Err(format!("project is missing: {}", missing.join(", ")).into())
    }
}

/// Import each file on its own; one bad file does not stop the rest.
fn import_files(ws: &mut Workspace<Repo>, files: &[PathBuf]) {
    for path in files {
        let result = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| ws.import_str(&text).map_err(|e| e.to_string()));
        match result {
            Ok(count) => println!("{}: imported {count} projects", path.display()),
            Err(e) => eprintln!("{}: skipped: {e}", path.display()),
        }
    }
}

fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
