use std::fs::OpenOptions;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use meinsql::shell::{self, ShellConfig};
use meinsql::storage::Table;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "meinsql", version = VERSION, about = "Tiny B+-tree database.")]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    dbfile: String,

    /// Disable colorized prompt and diagnostics.
    #[arg(long)]
    no_color: bool,
}

fn init_logging() {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("meinsql.log")
        .expect("failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    let mut table = match Table::open(&cli.dbfile) {
        Ok(table) => table,
        Err(e) => {
            eprintln!("Error: unable to open '{}': {}", cli.dbfile, e);
            return ExitCode::FAILURE;
        }
    };

    let config = ShellConfig {
        color: !cli.no_color,
    };

    match shell::run(&mut table, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
