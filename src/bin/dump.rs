//! ringlog inspection tool
//!
//! Decodes ring files, locates files by timestamp and prints checkpoints.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ringlog::checkpoint::CheckpointStore;
use ringlog::payload::Operation;
use ringlog::{Cursor, LogConfig, LogEngine, ReadOutcome};
use tracing_subscriber::{fmt, EnvFilter};

/// ringlog dump
#[derive(Parser, Debug)]
#[command(name = "ringlog-dump")]
#[command(about = "Inspect a ringlog ring directory")]
#[command(version)]
struct Args {
    /// Ring directory
    #[arg(short, long, default_value = "./ringlog_data")]
    dir: PathBuf,

    /// File name prefix
    #[arg(short, long, default_value = "binlog")]
    prefix: String,

    /// Number of files in the ring
    #[arg(short = 'n', long, default_value = "16")]
    max_index: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print records from a position or timestamp to the end of the ring
    Dump {
        /// Start in this file (default: oldest file)
        #[arg(long)]
        index: Option<u32>,

        /// Byte offset inside the start file
        #[arg(long, default_value = "0")]
        offset: u64,

        /// Start at the first record at or after this timestamp (micros)
        #[arg(long, conflicts_with = "index")]
        from_ts: Option<u64>,

        /// Decode payloads as key-value operations
        #[arg(long)]
        operations: bool,

        /// Stop after this many records
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Print the file to start from for a timestamp (micros)
    Locate {
        timestamp: u64,
    },

    /// Print the file whose first record is newest
    Newest,

    /// Print a saved checkpoint
    Checkpoint {
        /// Read the consumer cursor file instead of the primary checkpoint
        #[arg(long)]
        cursor: bool,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ringlog=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("ringlog-dump v{}", ringlog::VERSION);

    if let Err(e) = run(args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> ringlog::Result<()> {
    let config = LogConfig::builder()
        .directory(&args.dir)
        .prefix(&args.prefix)
        .max_index(args.max_index)
        .build()?;

    match args.command {
        Commands::Dump {
            index,
            offset,
            from_ts,
            operations,
            limit,
        } => dump(&config, index, offset, from_ts, operations, limit),
        Commands::Locate { timestamp } => {
            let engine = LogEngine::open_reader(&config)?;
            match engine.locate_index_by_timestamp(timestamp)? {
                Some(index) => println!("{:03} {}", index, engine.ring().file_name_at(index).display()),
                None => println!("ring is empty"),
            }
            Ok(())
        }
        Commands::Newest => {
            let mut engine = LogEngine::open_reader(&config)?;
            match engine.locate_newest_index()? {
                Some(index) => println!(
                    "{:03} first_ts={} {}",
                    index,
                    engine.current_timestamp(),
                    engine.ring().file_name_at(index).display()
                ),
                None => println!("ring is empty"),
            }
            Ok(())
        }
        Commands::Checkpoint { cursor } => {
            let store = if cursor {
                CheckpointStore::cursor(&config.directory, &config.prefix)
            } else {
                CheckpointStore::primary(&config.directory, &config.prefix)
            };
            match store.load()? {
                Some(checkpoint) => {
                    println!("path:          {}", store.path().display());
                    println!("index:         {:03}", checkpoint.current_index);
                    println!("offset:        {}", checkpoint.current_offset);
                    println!("timestamp:     {}", checkpoint.current_timestamp);
                    println!("next index:    {:03}", checkpoint.next_index);
                    println!("next offset:   {}", checkpoint.next_offset);
                    println!("remote ts:     {}", checkpoint.remote_timestamp);
                }
                None => println!("no checkpoint at {}", store.path().display()),
            }
            Ok(())
        }
    }
}

fn dump(
    config: &LogConfig,
    index: Option<u32>,
    offset: u64,
    from_ts: Option<u64>,
    operations: bool,
    limit: Option<u64>,
) -> ringlog::Result<()> {
    let mut engine = LogEngine::open_reader(config)?;

    let start = match (from_ts, index) {
        (Some(ts), _) => engine.seek_timestamp(ts)?,
        (None, Some(index)) => Some(Cursor::new(index, offset)),
        (None, None) => engine.locate_oldest_index()?.map(Cursor::start_of),
    };
    let mut cursor = match start {
        Some(cursor) => cursor,
        None => {
            println!("no records");
            return Ok(());
        }
    };

    let mut printed = 0u64;
    while limit.map_or(true, |max| printed < max) {
        match engine.read_across(cursor)? {
            ReadOutcome::Record(record, next) => {
                let at = next.offset - record.header.record_len();
                let session = record
                    .session_id
                    .map(|id| format!(" sid={}", id))
                    .unwrap_or_default();

                let body = if operations {
                    match Operation::decode(&record.payload) {
                        Ok(op) => format!("{:?}", op),
                        Err(e) => format!("<undecodable: {}>", e),
                    }
                } else {
                    let shown = record.payload.len().min(64);
                    format!("{}", record.payload[..shown].escape_ascii())
                };

                println!(
                    "{:03}:{:<10} ts={} len={}{} {}",
                    next.index,
                    at,
                    record.timestamp(),
                    record.payload.len(),
                    session,
                    body
                );

                printed += 1;
                cursor = next;
            }
            ReadOutcome::EndOfFile => break,
            ReadOutcome::SwitchPending => {
                println!("-- next file holds an older lap, stopping at {:03}:{}", cursor.index, cursor.offset);
                break;
            }
        }
    }

    println!("-- {} records", printed);
    Ok(())
}
