//! bucketfs -- command-line access to an object store as a file system.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use bucketfs::config::{load_config, Config, LoggingConfig};
use bucketfs::ObjectFileStore;

/// Command-line arguments for bucketfs.
#[derive(Parser, Debug)]
#[command(
    name = "bucketfs",
    version,
    about = "File-system operations over object-storage buckets"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the default bucket for relative paths.
    #[arg(short, long)]
    bucket: Option<String>,

    /// Print Prometheus metrics to stderr before exiting.
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the directories and files inside a directory.
    Ls {
        #[arg(default_value = "/")]
        directory: String,
    },
    /// Create a directory (and its bucket).
    Mkdir { directory: String },
    /// Delete a directory.
    Rmdir {
        directory: String,
        /// Delete the directory's contents as well.
        #[arg(short, long)]
        recursive: bool,
    },
    /// Delete a file.
    Rm { path: String },
    /// Upload a local file (`-` reads stdin).
    Put { local: PathBuf, path: String },
    /// Download a file to a local path.
    Get { path: String, local: PathBuf },
    /// Write a file to stdout.
    Cat { path: String },
    /// Show size, modification time and ETag.
    Stat {
        path: String,
        /// Treat the path as a directory.
        #[arg(short, long)]
        directory: bool,
        /// Emit JSON.
        #[arg(long)]
        json: bool,
    },
    /// Exit successfully if the path exists.
    Exists {
        path: String,
        #[arg(short, long)]
        directory: bool,
    },
}

#[derive(Serialize)]
struct StatOutput {
    path: String,
    directory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    last_modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    if let Some(bucket) = &cli.bucket {
        config.store.default_bucket = bucket.clone();
    }

    init_tracing(&config.logging);
    if let Some(path) = &cli.config {
        info!("Loaded configuration from {}", path.display());
    }

    if cli.metrics {
        bucketfs::metrics::init_metrics()?;
        bucketfs::metrics::describe_metrics();
        debug!("Prometheus metrics initialized");
    }

    let client = config.build_client().await?;
    info!("Object store client initialized: {}", client.name());
    let store = ObjectFileStore::new(client, config.store.default_bucket.clone())?
        .with_options(config.store_options());

    let code = run(&store, cli.command).await?;

    if cli.metrics {
        let handle = bucketfs::metrics::init_metrics()?;
        eprintln!("{}", handle.render());
    }

    Ok(code)
}

async fn run(store: &ObjectFileStore, command: Command) -> anyhow::Result<ExitCode> {
    match command {
        Command::Ls { directory } => {
            for dir in store.enumerate_directories(&directory).await? {
                println!("{dir}");
            }
            for file in store.enumerate_files(&directory).await? {
                println!("{file}");
            }
        }
        Command::Mkdir { directory } => store.create_directory(&directory).await?,
        Command::Rmdir {
            directory,
            recursive,
        } => {
            let report = store.delete_directory(&directory, recursive).await?;
            info!("Removed {} objects", report.deleted.len());
        }
        Command::Rm { path } => store.delete_file(&path).await?,
        Command::Put { local, path } => {
            let etag = if local.as_os_str() == "-" {
                store.upload_from_stream(&path, &mut tokio::io::stdin()).await?
            } else {
                store.upload_from_local_file(&local, &path).await?
            };
            println!("{etag}");
        }
        Command::Get { path, local } => {
            store.download_to_local_file(&path, &local).await?;
        }
        Command::Cat { path } => {
            store.download_to_stream(&path, &mut tokio::io::stdout()).await?;
        }
        Command::Stat {
            path,
            directory,
            json,
        } => {
            let stat = stat(store, &path, directory).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stat)?);
            } else {
                println!("path:          {}", stat.path);
                if let Some(size) = stat.size {
                    println!("size:          {size}");
                }
                println!("last modified: {}", stat.last_modified);
                if let Some(etag) = &stat.etag {
                    println!("etag:          {etag}");
                }
            }
        }
        Command::Exists { path, directory } => {
            let exists = if directory {
                store.directory_exists(&path).await?
            } else {
                store.file_exists(&path).await?
            };
            println!("{exists}");
            if !exists {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn stat(store: &ObjectFileStore, path: &str, directory: bool) -> anyhow::Result<StatOutput> {
    let last_modified = store.get_last_modified_time(path, directory).await?;
    let (size, etag) = if directory {
        (None, None)
    } else {
        let size = store.get_file_size(path).await?;
        let etag = store.try_get_etag(path).await?;
        (Some(size), etag.map(|e| e.to_string()))
    };
    Ok(StatOutput {
        path: path.to_string(),
        directory,
        size,
        last_modified: last_modified.to_rfc3339(),
        etag,
    })
}

/// Install the global tracing subscriber.  `RUST_LOG` overrides the
/// configured level.  Logs go to stderr so `cat` output stays clean.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
