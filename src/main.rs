use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn};

use imapmove::config::MoveConfig;
use imapmove::error::{self, MoveError};
use imapmove::imap::ImapMailbox;
use imapmove::mailbox::MailboxPort;
use imapmove::mover::{AddressErrorPolicy, MoveReport, Mover};

const USAGE: &str = "\
Usage:
  imapmove SOURCE_URL DESTINATION_URL PREFIX
  imapmove PROPERTIES_FILE [PREFIX]

URLs look like imap[s]://user[:password]@host[:port][/folder].";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnAddressError {
    Abort,
    Skip,
}

impl From<OnAddressError> for AddressErrorPolicy {
    fn from(value: OnAddressError) -> Self {
        match value {
            OnAddressError::Abort => Self::Abort,
            OnAddressError::Skip => Self::Skip,
        }
    }
}

/// Move every message from one IMAP folder to another.
#[derive(Debug, Parser)]
#[command(name = "imapmove", version, after_help = USAGE)]
struct Cli {
    /// SOURCE_URL DESTINATION_URL PREFIX, or PROPERTIES_FILE [PREFIX]
    #[arg(required = true, num_args = 1..=3, value_name = "ARGS")]
    args: Vec<String>,

    /// Leave moved messages flagged \Deleted in the source instead of expunging
    #[arg(long)]
    no_expunge: bool,

    /// Fetch and report, but change neither mailbox
    #[arg(long)]
    dry_run: bool,

    /// What to do with a message whose recipients cannot be rewritten
    #[arg(long, value_enum, default_value = "abort", env = "IMAPMOVE_ON_ADDRESS_ERROR")]
    on_address_error: OnAddressError,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Install rustls crypto provider before any TLS usage
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("Error: failed to install rustls crypto provider");
        return ExitCode::FAILURE;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}\n\n{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let mut options = config.move_options();
    options.expunge = options.expunge && !cli.no_expunge;
    options.dry_run = cli.dry_run;
    options.on_address_error = cli.on_address_error.into();

    info!("Source: {}", config.source);
    info!("Destination: {}", config.destination);

    let mover = Mover::new(
        config.source.identity(),
        config.destination.identity(),
        options,
    );

    let outcome = tokio::task::spawn_blocking(move || run(&mover, config))
        .await
        .context("move task panicked")
        .and_then(|r| r.context("move failed"));

    match outcome {
        Ok(report) => {
            info!(
                "Done: {} fetched, {} moved, {} skipped",
                report.fetched,
                report.moved.len(),
                report.skipped.len()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<MoveConfig> {
    match cli.args.as_slice() {
        [source, destination, prefix] => Ok(MoveConfig::from_urls(source, destination, prefix)?),
        [file] => MoveConfig::load(Path::new(file))
            .with_context(|| format!("failed to load {file}")),
        [file, prefix] => {
            let mut config = MoveConfig::load(Path::new(file))
                .with_context(|| format!("failed to load {file}"))?;
            config.subject_prefix = prefix.clone();
            Ok(config)
        }
        _ => anyhow::bail!("expected 1 to 3 arguments"),
    }
}

/// Blocking part of a run: both connections live on this thread.
fn run(mover: &Mover, config: MoveConfig) -> error::Result<MoveReport> {
    let mut source = ImapMailbox::new(config.source);
    let mut destination = ImapMailbox::new(config.destination);

    let result = mover.run(&mut source, &mut destination);

    for (side, mailbox) in [("source", &mut source), ("destination", &mut destination)] {
        if let Err(e) = mailbox.close() {
            warn!("Failed to log out of {side}: {e}");
        }
    }

    if let Err(MoveError::Flag { unmarked, .. }) = &result {
        let ids: Vec<String> = unmarked.iter().map(ToString::to_string).collect();
        warn!(
            "These source messages were copied but are not flagged deleted: {}",
            ids.join(", ")
        );
    }

    Ok(result?)
}
