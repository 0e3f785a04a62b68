use std::process::ExitCode;

use camino::Utf8PathBuf;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use seqvault::app::{Operation, run_operation};
use seqvault::config::ConfigLoader;
use seqvault::decide::{DecisionProvider, FixedPolicy, InteractivePrompter};
use seqvault::error::SeqvaultError;
use seqvault::lims::LimsHttpClient;
use seqvault::locator::{ServiceKind, ServiceLocator};
use seqvault::phases::PhaseRunner;
use seqvault::registry::Direction;
use seqvault::selection::{SelectionArgs, SelectionResolver};
use seqvault::transfer::RsyncTransfer;

#[derive(Parser)]
#[command(name = "seqvault")]
#[command(about = "Archive and retrieve genomics service directories between data and cold storage")]
#[command(version, author)]
struct Cli {
    /// Path to the JSON config file (default: ./seqvault.json)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Select a single service by id
    #[arg(long, global = true)]
    service_id: Option<String>,

    /// Select services listed in a file, one id per line
    #[arg(long, global = true)]
    services_file: Option<Utf8PathBuf>,

    /// Select delivered services from this date on (YYYY-MM-DD)
    #[arg(long, global = true)]
    date_from: Option<NaiveDate>,

    /// Select delivered services up to this date (YYYY-MM-DD)
    #[arg(long, global = true)]
    date_until: Option<NaiveDate>,

    /// Service kind, governs the directory layout
    #[arg(long, global = true, value_enum, default_value_t = ServiceKind::ServicesAndColaborations)]
    kind: ServiceKind,

    /// Replace every interactive decision with its documented default
    #[arg(long, global = true)]
    skip_prompts: bool,

    /// Path for the TSV report (auto-renamed if it already exists)
    #[arg(long, global = true, default_value = "seqvault_report.tsv")]
    output: Utf8PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Measure service directory sizes")]
    Scout,
    #[command(about = "Full archive: scout, compress, transfer and uncompress")]
    Archive,
    #[command(about = "Full retrieve: compress, transfer and uncompress from the archive")]
    Retrieve,
    #[command(about = "Compress service directories into .tar.gz artifacts")]
    Compress {
        #[arg(long, value_enum, default_value_t = Direction::Archive)]
        direction: Direction,
    },
    #[command(about = "Copy compressed artifacts to the other area and verify MD5")]
    Transfer {
        #[arg(long, value_enum, default_value_t = Direction::Archive)]
        direction: Direction,
    },
    #[command(about = "Uncompress transferred artifacts at their destination")]
    Decompress {
        #[arg(long, value_enum, default_value_t = Direction::Archive)]
        direction: Direction,
    },
    #[command(about = "Delete data-dir copies of services already present in the archive")]
    RemoveData,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        if let Some(error) = report.downcast_ref::<SeqvaultError>() {
            match error {
                SeqvaultError::NothingFound(_) | SeqvaultError::Aborted => {
                    eprintln!("{error}");
                    return ExitCode::SUCCESS;
                }
                _ => {}
            }
        }
        eprintln!("{report:?}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let conf = ConfigLoader::resolve(cli.config.as_deref()).into_diagnostic()?;

    let decisions: Box<dyn DecisionProvider> = if cli.skip_prompts {
        Box::new(FixedPolicy)
    } else {
        Box::new(InteractivePrompter)
    };

    let lims = LimsHttpClient::new(&conf.api).into_diagnostic()?;
    let locator = ServiceLocator::new(&conf, cli.kind);
    let resolver = SelectionResolver::new(&lims, &locator, decisions.as_ref(), cli.kind);

    let selection = SelectionArgs {
        service_id: cli.service_id.clone(),
        services_file: cli.services_file.clone(),
        date_from: cli.date_from,
        date_until: cli.date_until,
    };
    let mut registry = resolver.resolve(&selection).into_diagnostic()?;

    let transfer = RsyncTransfer::new(&conf.rsync_options);
    let runner = PhaseRunner::new(decisions.as_ref(), &transfer);

    let operation = match cli.command {
        Commands::Scout => Operation::Scout,
        Commands::Archive => Operation::FullArchive,
        Commands::Retrieve => Operation::FullRetrieve,
        Commands::Compress { direction } => Operation::Compress(direction),
        Commands::Transfer { direction } => Operation::Transfer(direction),
        Commands::Decompress { direction } => Operation::Decompress(direction),
        Commands::RemoveData => Operation::RemoveData,
    };

    let report = run_operation(&runner, operation, &mut registry, &cli.output).into_diagnostic()?;
    eprintln!("Report written to {report}");
    Ok(())
}
