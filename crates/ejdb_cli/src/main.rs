//! EJDB CLI
//!
//! Command-line access to EJDB databases.
//!
//! # Commands
//!
//! - `save` - Save a JSON document into a collection
//! - `find` - Query a collection
//! - `inspect` - List collections and document counts
//! - `constants` - Print the exposed flag and type-tag constants

mod commands;
mod json;

use clap::{Parser, Subcommand};
use ejdb_binding::{Connection, ModeArg};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// EJDB command-line database tool.
#[derive(Parser)]
#[command(name = "ejdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Open mode characters (w, c, t, s); reader access is implied
    #[arg(global = true, short, long)]
    mode: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a JSON document and print its id
    Save {
        /// Collection name
        collection: String,

        /// Document as JSON
        document: String,

        /// Merge into the stored document with the same _id
        #[arg(long)]
        merge: bool,
    },

    /// Query a collection
    Find {
        /// Collection name
        collection: String,

        /// Match document as JSON
        #[arg(short, long, default_value = "{}")]
        query: String,

        /// OR alternative as JSON (repeatable)
        #[arg(long = "or")]
        ors: Vec<String>,

        /// Hints as JSON ($orderby, $skip, $max, $fields, $onlycount)
        #[arg(long)]
        hints: Option<String>,

        /// Only print the number of matches
        #[arg(short, long)]
        count: bool,

        /// Pretty-print documents
        #[arg(long)]
        pretty: bool,
    },

    /// List collections and document counts
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the exposed constants
    Constants {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn open(
    path: Option<PathBuf>,
    mode: Option<String>,
    default: ModeArg,
) -> Result<Connection, Box<dyn std::error::Error>> {
    let path = path.ok_or("Database path required")?;
    let mode = mode.map_or(default, ModeArg::from);
    Ok(Connection::open(path, mode)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Save {
            collection,
            document,
            merge,
        } => {
            let mut conn = open(cli.path, cli.mode, ModeArg::default())?;
            commands::save::run(&mut conn, &collection, &document, merge, &mut out)?;
            conn.close()?;
        }
        Commands::Find {
            collection,
            query,
            ors,
            hints,
            count,
            pretty,
        } => {
            let mut conn = open(cli.path, cli.mode, ModeArg::from("r"))?;
            let args = commands::find::FindArgs {
                collection: &collection,
                query: &query,
                ors: &ors,
                hints: hints.as_deref(),
                count,
                pretty,
            };
            commands::find::run(&mut conn, &args, &mut out)?;
            conn.close()?;
        }
        Commands::Inspect { format } => {
            let mut conn = open(cli.path, cli.mode, ModeArg::from("r"))?;
            commands::inspect::run(&mut conn, &format, &mut out)?;
            conn.close()?;
        }
        Commands::Constants { format } => {
            commands::constants::run(&format, &mut out)?;
        }
        Commands::Version => {
            writeln!(out, "EJDB CLI v{}", env!("CARGO_PKG_VERSION"))?;
        }
    }

    Ok(())
}
