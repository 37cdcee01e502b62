//! TableFS CLI - Admin Command Line Interface
//!
//! Stores, retrieves and inspects files kept in a redb-backed TableFS
//! database.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tablefs::{FileStore, WriteOptions};
use tablefs_common::Config;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "tablefs-cli")]
#[command(about = "TableFS Admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "tablefs.toml", env = "TABLEFS_CONFIG")]
    config: PathBuf,

    /// Database file (overrides storage.path)
    #[arg(long, env = "TABLEFS_DB")]
    db: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a local file
    Put {
        /// Local file to upload
        path: PathBuf,
        /// Stored name (defaults to the local file name)
        #[arg(short, long)]
        name: Option<String>,
        /// Append to an existing file instead of replacing it
        #[arg(short, long)]
        append: bool,
        /// Chunk size in bytes (e.g. "256K", "1M")
        #[arg(long)]
        chunk_size: Option<String>,
    },
    /// Copy a stored file to a local path or stdout
    Get {
        /// Stored name
        name: String,
        /// Output path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a stored file to stdout
    Cat {
        /// Stored name
        name: String,
    },
    /// List stored files
    Ls {
        /// Name pattern, `*` matches any run of characters
        pattern: Option<String>,
    },
    /// Remove a stored file
    Rm {
        /// Stored name
        name: String,
        /// Do not fail if the file does not exist
        #[arg(short, long)]
        force: bool,
    },
    /// Show the directory entry of a stored file
    Stat {
        /// Stored name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load config file if it exists, CLI args take precedence
    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {}", args.config.display()))?;
    if let Some(db) = args.db {
        config.storage.path = db;
    }
    debug!("Config file: {}", args.config.display());

    let files = FileStore::open_redb(&config)
        .with_context(|| format!("Failed to open {}", config.storage.path.display()))?;
    info!("Using {} workers", files.pool().size());

    match args.command {
        Commands::Put {
            path,
            name,
            append,
            chunk_size,
        } => {
            let name = match name {
                Some(name) => name,
                None => path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .with_context(|| format!("Cannot derive a name from {}", path.display()))?,
            };
            let mut options = WriteOptions::default();
            if let Some(size) = chunk_size {
                options = options.with_chunk_size(parse_size(&size)?);
            }
            let mut source = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;

            let mode = if append { "w+" } else { "w" };
            let mut handle = files.open(&name, mode).await?;
            let summary = handle.write_with(&mut source, options).await?;
            println!(
                "{}: wrote {} in {} parts, total {}",
                handle.name(),
                format_size(summary.bytes_written),
                summary.parts_written,
                format_size(handle.size())
            );
        }
        Commands::Get { name, output } => {
            let mut handle = files.get(&name).await?;
            let mut chunks = handle.readchunks(None).await?;
            match output {
                Some(path) => {
                    let mut out = tokio::fs::File::create(&path)
                        .await
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    while let Some(chunk) = chunks.next().await? {
                        out.write_all(&chunk).await?;
                    }
                    out.flush().await?;
                    println!("{} -> {} ({})", name, path.display(), format_size(chunks.bytes_read()));
                }
                None => {
                    let mut out = tokio::io::stdout();
                    while let Some(chunk) = chunks.next().await? {
                        out.write_all(&chunk).await?;
                    }
                    out.flush().await?;
                }
            }
        }
        Commands::Cat { name } => {
            let data = files.read(&name).await?;
            let mut out = tokio::io::stdout();
            out.write_all(&data).await?;
            out.flush().await?;
        }
        Commands::Ls { pattern } => {
            let names = match pattern {
                Some(pattern) => files.find(&pattern).await?,
                None => files.list().await?,
            };
            if names.is_empty() {
                println!("No files found");
            } else {
                println!("{:<40} {:>12} {:>8}", "NAME", "SIZE", "PARTS");
                for name in names {
                    let record = files.stat(&name).await?;
                    println!(
                        "{:<40} {:>12} {:>8}",
                        record.filename,
                        format_size(record.size),
                        record.part_count
                    );
                }
            }
        }
        Commands::Rm { name, force } => {
            if files.remove(&name, !force).await? {
                println!("Removed {name}");
            }
        }
        Commands::Stat { name } => {
            let record = files.stat(&name).await?;
            println!("File: {}", record.filename);
            println!("  ID: {}", record.id);
            println!("  Size: {} ({} bytes)", format_size(record.size), record.size);
            println!("  Parts: {}", record.part_count);
        }
    }

    Ok(())
}

/// Parse a human-readable size string (e.g. "256K", "1M") into bytes.
fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    let (num, multiplier) = if let Some(n) = s.strip_suffix('G') {
        (n, 1024 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('M') {
        (n, 1024 * 1024)
    } else if let Some(n) = s.strip_suffix('K') {
        (n, 1024)
    } else {
        // Assume bytes if no suffix
        (s, 1)
    };
    let value: usize = num
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid size: '{s}'"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| anyhow::anyhow!("Size too large: '{s}'"))
}

/// Format bytes as a human-readable size string.
fn format_size(bytes: u64) -> String {
    const GIB: u64 = 1024 * 1024 * 1024;
    const MIB: u64 = 1024 * 1024;
    const KIB: u64 = 1024;

    if bytes >= GIB {
        format!("{:.1} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.1} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("256K").unwrap(), 256 * 1024);
        assert_eq!(parse_size(" 2M ").unwrap(), 2 * 1024 * 1024);
        assert!(parse_size("lots").is_err());
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(17), "17 B");
        assert_eq!(format_size(1536), "1.5 KiB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from(["tablefs-cli", "--db", "x.redb", "rm", "old", "--force"])
            .unwrap();
        assert_eq!(args.db, Some(PathBuf::from("x.redb")));
        assert!(matches!(args.command, Commands::Rm { force: true, .. }));
    }
}
