use clap::Parser;
use octofhir_sdc_assemble::*;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sdc-assemble")]
#[command(about = "Assemble a modular FHIR SDC Questionnaire into a single Questionnaire")]
#[command(version)]
struct Cli {
    /// Root Questionnaire, or a Parameters resource with a 'questionnaire' parameter
    input: PathBuf,
    /// Directory of Questionnaire/Bundle JSON files used to resolve subquestionnaires
    #[arg(short, long)]
    dir: PathBuf,
    /// JSON file with an AssembleConfig
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Abort assembly after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<bool> {
    let mut config = match &cli.config {
        Some(path) => AssembleConfig::from_file(path)?,
        None => AssembleConfig::default(),
    };
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }

    let input: serde_json::Value =
        serde_json::from_str(&tokio::fs::read_to_string(&cli.input).await?)?;
    let fetcher = DirectoryFetcher::load(&cli.dir).await?;
    if let Some(root) = fetcher.root() {
        tracing::info!("Loaded {} canonical url(s) from {}", fetcher.len(), root.display());
    }

    let output = Assembler::with_config(fetcher, config)
        .assemble_value(input)
        .await;
    let rendered = serde_json::to_string_pretty(&output)?;

    match &cli.output {
        Some(path) => {
            tokio::fs::write(path, rendered).await?;
            println!("{} written to {}", output.resource_type(), path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(!output.is_error())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
