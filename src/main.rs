use anyhow::Result;
use clap::{Parser, Subcommand};
use md2anki::{DeckBuilder, DeckConfig};
use std::path::PathBuf;
use std::process::exit;

/// Build Anki flashcard packages from markdown question/answer notes.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Configuration file (defaults to the user's md2anki config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert every `## ` section of the input directory's markdown files into a card
    Build {
        /// Directory containing the markdown notes
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Package file to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Flat log file, relative to the input directory
        #[arg(long)]
        log_file: Option<PathBuf>,

        /// Name of the deck shown in Anki
        #[arg(long)]
        deck_name: Option<String>,
    },

    /// Build a package from a previously written flat log
    Import {
        /// Tab-separated `question<TAB>answer` file
        flat_log: PathBuf,

        /// Package file to write
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Name of the deck shown in Anki
        #[arg(long)]
        deck_name: Option<String>,
    },
}

pub fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = DeckConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Build {
            input,
            output,
            log_file,
            deck_name,
        } => {
            if let Some(input) = input {
                config.input_dir = input;
            }
            if let Some(output) = output {
                config.output_file = output;
            }
            if let Some(log_file) = log_file {
                config.log_file = log_file;
            }
            if let Some(deck_name) = deck_name {
                config.deck_name = deck_name;
            }
            config.validate()?;

            log::info!("Building deck '{}' from {}", config.deck_name, config.input_dir.display());
            DeckBuilder::new(config).build()?;
        }
        Command::Import {
            flat_log,
            output,
            deck_name,
        } => {
            if let Some(output) = output {
                config.output_file = output;
            }
            if let Some(deck_name) = deck_name {
                config.deck_name = deck_name;
            }
            config.validate()?;

            log::info!("Importing deck '{}' from {}", config.deck_name, flat_log.display());
            DeckBuilder::new(config).import(&flat_log)?;
        }
    }

    Ok(())
}
