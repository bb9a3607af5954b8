use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feed_keeper_core::{
    load_keeper_config,
    types::{DataService, DurationInSeconds, TimestampMs, UnixTimestamp},
    AbiChainReader, KeeperConfig, StalenessMonitor, Trigger, UpdateCycle,
};
use feed_keeper_evm::{
    opsgenie::OPSGENIE_API_URL, JsonPackageDecoder, JsonRpcClient, OpsgenieSink,
};
use std::{
    fs,
    path::PathBuf,
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use tracing::{debug, error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the keeper configuration YAML file.
    #[clap(
        short = 'c',
        long,
        value_parser,
        global = true,
        default_value = "keeper-config.yaml"
    )]
    config: PathBuf,

    /// JSON-RPC endpoint of the chain holding the oracle contracts.
    #[clap(
        short,
        long,
        value_parser,
        global = true,
        default_value = "https://rpc.api.lisk.com"
    )]
    rpc_url: String,

    /// Log level (e.g., trace, debug, info, warn, error).
    #[clap(long, value_parser, global = true, default_value = "info")]
    log_level: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one update cycle and print its outcome as JSON on stdout.
    Update {
        /// File holding the verified data packages (JSON).
        #[clap(short, long, value_parser)]
        payload: PathBuf,

        /// Override the data service from the config file.
        #[clap(long, value_parser)]
        data_service: Option<DataService>,

        /// Evaluate as of this time (milliseconds since epoch) instead of now.
        #[clap(long, value_parser)]
        now_ms: Option<TimestampMs>,
    },

    /// Check the configured aggregators for stale data and raise alerts.
    Monitor {
        /// Path to the file containing the Opsgenie API key.
        #[clap(short = 'k', long, value_parser, default_value = "opsgenie-api-key.txt")]
        api_key_file: PathBuf,

        /// Opsgenie API host.
        #[clap(long, value_parser, default_value = OPSGENIE_API_URL)]
        opsgenie_host: String,

        /// Only check this token pair (e.g. "ETH/USD").
        #[clap(long, value_parser)]
        pair: Option<String>,

        /// Re-run the checks every N seconds instead of exiting after one pass.
        #[clap(long, value_parser)]
        interval_secs: Option<DurationInSeconds>,
    },
}

fn unix_now() -> Result<Duration> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("System clock is before the Unix epoch")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // --- Setup Logging ---
    let log_level = args
        .log_level
        .parse::<Level>()
        .context("Invalid log level specified")?;
    // Logs go to stderr so the update outcome on stdout stays machine readable.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Setting default tracing subscriber failed")?;

    info!("Starting feed keeper...");
    debug!(?args, "Parsed command line arguments");

    // --- Load Configurations ---
    let config = load_keeper_config(&args.config)
        .with_context(|| format!("Failed to load keeper config from {:?}", args.config))?;
    info!(
        symbols = config.symbols.len(),
        monitors = config.monitors.len(),
        path = %args.config.display(),
        "Loaded keeper config"
    );

    match args.command {
        Command::Update {
            payload,
            data_service,
            now_ms,
        } => run_update(&config, &args.rpc_url, payload, data_service, now_ms).await,
        Command::Monitor {
            api_key_file,
            opsgenie_host,
            pair,
            interval_secs,
        } => {
            run_monitor(
                &config,
                &args.rpc_url,
                api_key_file,
                opsgenie_host,
                pair,
                interval_secs,
            )
            .await
        }
    }
}

async fn run_update(
    config: &KeeperConfig,
    rpc_url: &str,
    payload_path: PathBuf,
    data_service: Option<DataService>,
    now_ms: Option<TimestampMs>,
) -> Result<()> {
    let payload = fs::read(&payload_path)
        .with_context(|| format!("Failed to read payload file: {:?}", payload_path))?;

    let now_ms = match now_ms {
        Some(ms) => ms,
        None => u64::try_from(unix_now()?.as_millis()).context("Current time out of range")?,
    };
    let trigger = Trigger {
        now_ms,
        symbols: config.symbols.clone(),
        data_service: data_service.unwrap_or(config.data_service),
    };

    info!(url = %rpc_url, oracle = %config.oracle_address, "Initializing update cycle");
    let cycle = UpdateCycle::new(
        AbiChainReader::new(JsonRpcClient::new(rpc_url)),
        JsonPackageDecoder,
        config.oracle_address,
        config.thresholds,
    );

    let outcome = cycle.run_or_skip(&trigger, &payload).await;
    println!("{}", serde_json::to_string_pretty(&outcome.to_json())?);
    Ok(())
}

async fn run_monitor(
    config: &KeeperConfig,
    rpc_url: &str,
    api_key_file: PathBuf,
    opsgenie_host: String,
    pair: Option<String>,
    interval_secs: Option<DurationInSeconds>,
) -> Result<()> {
    let api_key = fs::read_to_string(&api_key_file)
        .with_context(|| format!("Failed to read API key file: {:?}", api_key_file))?
        .trim() // Remove potential trailing newline
        .to_string();
    if api_key.is_empty() {
        anyhow::bail!("API key file is empty: {:?}", api_key_file);
    }

    let monitors: Vec<StalenessMonitor> = config
        .monitors
        .iter()
        .filter(|m| pair.as_deref().map_or(true, |p| m.token_pair == p))
        .map(|m| StalenessMonitor::from_config(m, &config.staleness))
        .collect();
    if monitors.is_empty() {
        match &pair {
            Some(p) => anyhow::bail!("No monitor configured for token pair {}", p),
            None => anyhow::bail!("No monitors configured"),
        }
    }

    info!(url = %rpc_url, count = monitors.len(), "Initializing staleness monitors");
    let reader = AbiChainReader::new(JsonRpcClient::new(rpc_url));
    let sink = OpsgenieSink::new(opsgenie_host, api_key);

    let Some(interval_secs) = interval_secs else {
        return check_all(&monitors, &reader, &sink).await;
    };

    let interval = Duration::from_secs(interval_secs);
    loop {
        info!("Starting new check cycle.");
        if let Err(e) = check_all(&monitors, &reader, &sink).await {
            error!(error = %e, "Error during check cycle. Retrying in next cycle.");
        }
        debug!(duration = ?interval, "Sleeping until next cycle.");
        tokio::time::sleep(interval).await;
    }
}

/// Runs every monitor once; each is independent of the others' failures.
async fn check_all(
    monitors: &[StalenessMonitor],
    reader: &AbiChainReader<JsonRpcClient>,
    sink: &OpsgenieSink,
) -> Result<()> {
    let now: UnixTimestamp = unix_now()?.as_secs();
    let mut failed = 0usize;

    for monitor in monitors {
        if let Err(e) = monitor.run_cycle(reader, sink, now).await {
            error!(token_pair = %monitor.token_pair(), error = %e, "Staleness check failed");
            failed += 1;
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} staleness checks failed", failed, monitors.len());
    }
    Ok(())
}
