use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use locsync_cli::exit::Failure;
use locsync_cli::merge::{MergeCommand, run_merge_command};
use locsync_cli::sync::{SyncCommand, run_sync_command};

#[derive(Parser, Debug)]
#[command(name = "locsync", author, version, about, long_about = None)]
struct Args {
    /// Increase log verbosity (-v info, -vv debug). `LOCSYNC_LOG` overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    commands: Commands,
}

/// Supported subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Merge selected keys from a downloaded file into a project file.
    Merge {
        /// The downloaded .strings or .stringsdict file
        #[arg(short, long)]
        source: PathBuf,
        /// The project file to update (created if missing)
        #[arg(short, long)]
        target: PathBuf,
        /// Keys or glob patterns to merge (comma-separated, `glob:` forces a
        /// pattern); all keys if omitted
        #[arg(short, long, value_delimiter = ',')]
        keys: Vec<String>,
        /// Keys as a JSON array, e.g. '["title", "onboarding.*"]'
        #[arg(long)]
        keys_json: Option<String>,
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Copy the target to <target>.bak before writing
        #[arg(long)]
        backup: bool,
        /// Remove requested keys that the source no longer has
        #[arg(long)]
        prune: bool,
        /// Rewrite the target with entries sorted by key
        #[arg(long)]
        sort: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
        /// Print a unified diff of the change
        #[arg(long)]
        diff: bool,
    },

    /// Merge every language and file pair listed in a config file.
    Sync {
        /// YAML or TOML config file
        #[arg(short, long, default_value = "locsync.yaml")]
        config: PathBuf,
        /// Only sync these languages (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        lang: Vec<String>,
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        backup: bool,
        #[arg(long)]
        prune: bool,
        #[arg(long)]
        sort: bool,
        /// Number of worker threads (defaults to the config, then the CPU count)
        #[arg(short, long)]
        jobs: Option<usize>,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        diff: bool,
    },

    /// Generate shell completions.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("LOCSYNC_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(console_layer).init();
}

fn run(commands: Commands) -> Result<(), Failure> {
    match commands {
        Commands::Merge {
            source,
            target,
            keys,
            keys_json,
            dry_run,
            backup,
            prune,
            sort,
            json,
            diff,
        } => run_merge_command(MergeCommand {
            source,
            target,
            keys,
            keys_json,
            dry_run,
            backup,
            prune,
            sort,
            json,
            diff,
        }),
        Commands::Sync {
            config,
            lang,
            dry_run,
            backup,
            prune,
            sort,
            jobs,
            json,
            diff,
        } => {
            if jobs == Some(0) {
                return Err("--jobs must be at least 1".to_string().into());
            }
            run_sync_command(SyncCommand {
                config,
                langs: lang,
                dry_run,
                backup,
                prune,
                sort,
                jobs,
                json,
                diff,
            })
        }
        Commands::Completions { shell } => {
            let mut cmd = Args::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args.commands) {
        Ok(()) => ExitCode::SUCCESS,
        Err(failure) => {
            eprintln!("❌ {}", failure.message);
            failure.exit_code()
        }
    }
}
