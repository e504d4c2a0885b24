//! tenantkv CLI
//!
//! Command-line interface for managing logical databases on disk.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tenantkv::{Config, KvdbError, KvdbManager, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// Scope name the CLI takes handlers under
const CLI_SCOPE: &str = "cli";

/// tenantkv CLI
#[derive(Parser, Debug)]
#[command(name = "tenantkv")]
#[command(about = "Manage logical databases over one embedded key-value engine")]
#[command(version)]
struct Args {
    /// Storage directory
    #[arg(short, long, default_value = "./tenantkv_data")]
    storage_path: PathBuf,

    /// Main database name inside the storage directory
    #[arg(short, long, default_value = "kvdb")]
    db_name: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List all databases
    List,

    /// Create a database
    Create {
        /// The database to create
        db: String,
    },

    /// Delete a database
    Delete {
        /// The database to delete
        db: String,
    },

    /// Check whether a database exists
    Exists {
        /// The database to check
        db: String,
    },

    /// Bulk-load a JSON object file into a database
    Load {
        /// The target database
        db: String,

        /// Path to the JSON file
        file: PathBuf,
    },

    /// Get a value by key
    Get {
        /// The database to read
        db: String,

        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The database to write
        db: String,

        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Print every key-value pair of a database
    Dump {
        /// The database to dump
        db: String,
    },

    /// Print handler usage by database and by scope
    Info,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tenantkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .storage_path(&args.storage_path)
        .db_name(&args.db_name)
        .build();

    let manager = KvdbManager::new(config);
    if let Err(e) = manager.initialize() {
        tracing::error!("Failed to initialize manager: {}", e);
        return ExitCode::FAILURE;
    }

    let outcome = run(&manager, args.command);

    if let Err(e) = manager.close() {
        tracing::error!("Failed to close manager: {}", e);
        return ExitCode::FAILURE;
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(manager: &KvdbManager, command: Commands) -> Result<()> {
    match command {
        Commands::List => {
            let mut names = manager.list_dbs();
            names.sort();
            for name in names {
                println!("{}", name);
            }
        }
        Commands::Create { db } => manager.create_db(&db)?,
        Commands::Delete { db } => manager.delete_db(&db)?,
        Commands::Exists { db } => println!("{}", manager.exists_db(&db)),
        Commands::Load { db, file } => {
            let written = manager.load_db_from_file(&db, &file)?;
            println!("{} entries loaded", written);
        }
        Commands::Get { db, key } => {
            let handler = manager.get_handler(&db, CLI_SCOPE)?;
            match handler.get(&key)? {
                Some(value) => println!("{}", value),
                None => println!("(nil)"),
            }
        }
        Commands::Set { db, key, value } => {
            let handler = manager.get_handler(&db, CLI_SCOPE)?;
            handler.set(&key, &value)?;
        }
        Commands::Dump { db } => {
            let handler = manager.get_handler(&db, CLI_SCOPE)?;
            for (key, value) in handler.dump()? {
                println!("{}\t{}", key, value);
            }
        }
        Commands::Info => {
            let report = serde_json::to_string_pretty(&manager.usage_report())
                .map_err(|e| KvdbError::Format(e.to_string()))?;
            println!("{}", report);
        }
    }
    Ok(())
}
