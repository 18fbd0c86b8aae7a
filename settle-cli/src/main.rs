mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "settle",
    version,
    about = "Format files until they settle on a canonical form"
)]
struct Cli {
    /// Project root holding `settle.toml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Report files that need formatting or carry lints. Changes nothing.
    Check {
        paths: Vec<PathBuf>,
        /// Evaluate every file, ignoring `.settle/index.json`.
        #[arg(long)]
        no_index: bool,
    },
    /// Rewrite files to their canonical form.
    Apply {
        paths: Vec<PathBuf>,
        #[arg(long)]
        no_index: bool,
    },
    /// Write every intermediate output of files whose formatting does not settle.
    Diagnose {
        paths: Vec<PathBuf>,
        /// Output directory, relative to the root.
        #[arg(long, default_value = "build/settle-diagnose")]
        dir: PathBuf,
    },
    /// Print the formatter's cache key and its digest.
    Key,
    /// Create `settle.toml` with the default steps.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() {
    settle::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(settle::exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let root = cli.root;
    match cli.command {
        Command::Check { paths, no_index } => cli::check(&root, &paths, !no_index),
        Command::Apply { paths, no_index } => cli::apply(&root, &paths, !no_index),
        Command::Diagnose { paths, dir } => cli::diagnose(&root, &paths, &dir),
        Command::Key => cli::key(&root),
        Command::Init { force } => cli::init(&root, force),
    }
}
