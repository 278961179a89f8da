use std::io::{BufRead, Write};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use lostfound::config::Config;
use lostfound::{execute, AppState, Cli};

fn ask(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

fn main() -> anyhow::Result<ExitCode> {
    // Load .env automatically only in debug builds.
    if cfg!(debug_assertions) {
        let _ = dotenv::dotenv();
    }

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut cfg = Config::from_env();
    if let Some(path) = cli.data_file {
        cfg.data_file = path;
    }
    if let Some(dir) = cli.image_dir {
        cfg.image_dir = dir;
    }
    debug!(?cfg, "configuration loaded");

    let mut state = AppState::open(&cfg)
        .with_context(|| format!("cannot open registry at '{}'", cfg.data_file.display()))?;

    match execute(&mut state, cli.command, &mut ask) {
        Ok(output) => {
            print!("{output}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            Ok(e.exit_code())
        }
    }
}
