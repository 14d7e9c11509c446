//! Decoy Vault - CLI
//!
//! Command-line interface for vault operations.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use decoy_vault::{
    BackendKind, Board, HiddenVaultApi, OpaqueId, VaultConfig, VaultEntry, VaultService,
};

#[derive(Parser)]
#[command(name = "decoy-vault")]
#[command(version = decoy_vault::VERSION)]
#[command(about = "Decoy Vault - hidden file vault behind a Tic-Tac-Toe game")]
struct Cli {
    /// Vault root directory
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Mapping backend (json, sqlite, memory)
    #[arg(short, long)]
    backend: Option<BackendKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import files
    Import {
        /// Files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List all files
    List,

    /// Rename a file
    Rename {
        /// File ID
        id: String,

        /// New display name
        name: String,
    },

    /// Delete a file
    Delete {
        /// File ID
        id: String,
    },

    /// Copy a file out under its display name (preview/share)
    Materialize {
        /// File ID
        id: String,
    },

    /// Show vault statistics
    Stats,

    /// Play Tic-Tac-Toe
    Play,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<VaultConfig> {
    let mut config = match &cli.config {
        Some(path) => VaultConfig::load(path)?,
        None => VaultConfig::default(),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Play => play(&config),
        command => run_file_command(&config, command),
    }
}

/// File subcommands operate on the service directly
fn run_file_command(config: &VaultConfig, command: Commands) -> Result<()> {
    let vault = VaultService::open(config)
        .with_context(|| format!("opening vault at {}", config.root.display()))?;

    match command {
        Commands::Import { paths } => {
            let mut failed = 0;
            for (path, result) in paths.iter().zip(vault.import_many(&paths)) {
                match result {
                    Ok(entry) => println!("Imported {} as {}", path.display(), entry.id),
                    Err(e) => {
                        failed += 1;
                        eprintln!("Failed to import {}: {}", path.display(), e);
                    }
                }
            }
            print_entries(&vault.list()?);
            if failed > 0 {
                anyhow::bail!("{} import(s) failed", failed);
            }
        }

        Commands::List => print_entries(&vault.list()?),

        Commands::Rename { id, name } => {
            let id = OpaqueId::parse(&id)?;
            let result = vault.rename(&id, &name);
            print_entries(&vault.list()?);
            result?;
        }

        Commands::Delete { id } => {
            let id = OpaqueId::parse(&id)?;
            let result = vault.delete(&id);
            print_entries(&vault.list()?);
            result?;
        }

        Commands::Materialize { id } => {
            let id = OpaqueId::parse(&id)?;
            let handle = vault
                .materialize(&id)
                .context("preview/share unavailable")?;
            println!("{}", handle.path().display());
        }

        Commands::Stats => {
            let stats = vault.stats()?;
            println!("Decoy Vault Statistics");
            println!("{:-<40}", "");
            println!("Files:        {}", stats.entries);
            println!("Unnamed:      {}", stats.orphans);
            println!("Total size:   {} bytes", stats.total_size);
        }

        Commands::Play => play(config)?,
    }

    Ok(())
}

fn print_entries(entries: &[VaultEntry]) {
    if entries.is_empty() {
        println!("No file, import one with `decoy-vault import <path>`.");
        return;
    }

    println!("Files in vault ({}):", entries.len());
    println!("{:-<60}", "");
    for entry in entries {
        let marker = if entry.orphaned { "?" } else { " " };
        println!("{} {}  {} ({} bytes)", marker, entry.id, entry.display_name, entry.size);
    }
}

/// Interactive game; `t` taps the title
fn play(config: &VaultConfig) -> Result<()> {
    let api = HiddenVaultApi::open(config)?;
    let mut board = Board::new();
    let stdin = io::stdin();

    println!("Tic-Tac-Toe");
    println!("Moves: `<row> <col>` (0-2), `n` new game, `q` quit");

    loop {
        println!("\n{}", board);
        print!("{} to move> ", board.current_player());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        match line.trim() {
            "q" => break,
            "n" => board.reset(),
            "t" => {
                if api.tap_title()? {
                    print_entries(&api.list()?);
                    api.hide();
                }
            }
            input => {
                let coords: Vec<usize> = input
                    .split_whitespace()
                    .filter_map(|s| s.parse().ok())
                    .collect();
                let [row, col] = coords[..] else {
                    println!("Enter a row and a column, e.g. `1 2`");
                    continue;
                };

                match board.play(row, col) {
                    Ok(Some(outcome)) => {
                        println!("\n{}\nGame Over: {}", board, outcome);
                        board.reset();
                    }
                    Ok(None) => {}
                    Err(e) => println!("{}", e),
                }
            }
        }
    }

    Ok(())
}
