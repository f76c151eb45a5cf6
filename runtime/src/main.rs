// Copyright 2026 Coursevault Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use coursevault_runtime::cli;
use coursevault_runtime::config::ArchiveConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coursevault",
    about = "Coursevault: archive your LMS courses to disk",
    version,
    after_help = "Run 'coursevault <command> --help' for details on each command.\nRun 'coursevault' with no command to archive with default settings."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Archive every enrolled course
    Run(RunArgs),
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Root URL of the LMS
    #[arg(long)]
    lms_url: Option<String>,
    /// Directory that receives the archive
    #[arg(long)]
    archive_dir: Option<PathBuf>,
    /// Directory the browser downloads into (defaults to the archive directory)
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    /// Run the browser without a window
    #[arg(long)]
    headless: bool,
    /// Path to the Chromium binary
    #[arg(long)]
    chromium: Option<PathBuf>,
    /// Do not wait for Enter during sign-in
    #[arg(long)]
    no_prompt: bool,
    /// Remove everything under the archive directory first
    #[arg(long)]
    clean: bool,
}

impl RunArgs {
    /// Command-line flags over environment over defaults.
    fn into_config(self) -> ArchiveConfig {
        let mut config = ArchiveConfig::from_env();
        if let Some(url) = self.lms_url {
            config.lms_url = url;
        }
        if let Some(dir) = self.archive_dir {
            if self.scratch_dir.is_none() && config.scratch_dir == config.archive_root {
                config.scratch_dir = dir.clone();
            }
            config.archive_root = dir;
        }
        if let Some(dir) = self.scratch_dir {
            config.scratch_dir = dir;
        }
        if self.headless {
            config.headless = true;
        }
        if let Some(path) = self.chromium {
            config.chromium_path = Some(path);
        }
        if self.no_prompt {
            config.prompt_for_sign_in = false;
        }
        config.clean = self.clean;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("COURSEVAULT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("COURSEVAULT_QUIET", "1");
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let result = match cli.command {
        // No subcommand → archive with environment/default settings
        None => cli::archive_cmd::run(RunArgs::default().into_config()).await,
        Some(Commands::Run(args)) => cli::archive_cmd::run(args.into_config()).await,
        Some(Commands::Doctor) => cli::doctor::run(&ArchiveConfig::from_env()).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "coursevault", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
