use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use osf_mirror::app::{App, SyncOptions};
use osf_mirror::client::OsfHttpClient;
use osf_mirror::config::ConfigLoader;
use osf_mirror::error::MirrorError;
use osf_mirror::output::{JsonOutput, TextOutput};
use osf_mirror::store::AnnexStore;

#[derive(Parser)]
#[command(name = "osf-mirror")]
#[command(about = "Mirror tagged OSF projects into git-annex datasets")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config file holding `osf_token` and friends.
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, short, global = true)]
    verbose: bool,

    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Add new datasets and update outdated mirrors")]
    Sync(SyncArgs),
    #[command(about = "Print the description of every tagged OSF project")]
    List,
}

#[derive(Args)]
struct SyncArgs {
    /// Directory holding one mirror per dataset.
    #[arg(long)]
    root: Option<Utf8PathBuf>,

    #[arg(long)]
    dry_run: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<MirrorError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MirrorError) -> u8 {
    match error {
        MirrorError::ConfigRead(_) | MirrorError::ConfigParse(_) => 2,
        MirrorError::MissingTool(_) => 2,
        err if err.is_remote() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let transport = OsfHttpClient::new(config.token.as_deref())?;

    match cli.command {
        Commands::Sync(args) => {
            let options = SyncOptions {
                root: args.root.unwrap_or_else(|| config.datasets_root.clone()),
                dry_run: args.dry_run,
            };
            let app = App::new(config, transport, AnnexStore::new()?);
            let report = app.run(&options)?;
            if cli.json {
                JsonOutput::print_report(&report).into_diagnostic()?;
            } else {
                TextOutput::print_report(&report).into_diagnostic()?;
            }
            if report.failures() > 0 {
                return Err(miette::Report::msg(format!(
                    "{} of {} datasets failed to sync",
                    report.failures(),
                    report.items.len()
                )));
            }
            Ok(())
        }
        Commands::List => {
            let app = App::new(config, transport, AnnexStore::new()?);
            let descriptions = app.describe_all()?;
            JsonOutput::print_descriptions(&descriptions).into_diagnostic()?;
            Ok(())
        }
    }
}
