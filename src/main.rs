use clap::{Parser, Subcommand};
use mdbook::preprocess::{CmdPreprocessor, Preprocessor};
use mdbook_ipynb::cli;
use mdbook_ipynb::IpynbPreprocessor;
use std::io;
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    name = "mdbook-ipynb",
    about = "mdbook preprocessor that reads Jupyter notebooks as html chapters",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Install the preprocessor into book.toml
    Install,
    /// Check if the preprocessor supports a given renderer
    Supports { renderer: String },
}

fn main() {
    // stdout carries the book, so logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(command) = cli.command {
        match command {
            Command::Install => {
                if let Err(e) = cli::handle_install() {
                    error!("{:#}", e);
                    process::exit(1);
                }
            }
            Command::Supports { renderer } => {
                let preprocessor = IpynbPreprocessor::new();
                let supported = cli::handle_supports(&preprocessor, &renderer);
                process::exit(if supported { 0 } else { 1 });
            }
        }
    } else if let Err(e) = handle_preprocessing() {
        error!("{:#}", e);
        process::exit(1);
    }
}

fn handle_preprocessing() -> anyhow::Result<()> {
    let (ctx, book) = CmdPreprocessor::parse_input(io::stdin())?;
    cli::check_version_compatibility(&ctx.mdbook_version)?;

    let preprocessor = IpynbPreprocessor::new();
    let processed_book = preprocessor.run(&ctx, book)?;
    serde_json::to_writer(io::stdout(), &processed_book)?;

    Ok(())
}
