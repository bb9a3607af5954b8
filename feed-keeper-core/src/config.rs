use crate::types::{FeedId, KeeperConfig};
use anyhow::{Context, Result};
use std::{collections::HashSet, fs, path::Path};
use tracing::debug;

/// Loads and parses the keeper configuration YAML file.
///
/// Reads the file at the given path, parses it into a `KeeperConfig`, trims
/// symbols and token pair labels, and validates that symbols are usable feed
/// ids, that neither symbols nor monitored token pairs repeat, and that the
/// thresholds are sane.
pub fn load_keeper_config(path: impl AsRef<Path>) -> Result<KeeperConfig> {
    let path_ref = path.as_ref();
    debug!(path = %path_ref.display(), "Loading keeper config file");

    let yaml_content = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read keeper config file: {}", path_ref.display()))?;

    let mut config: KeeperConfig = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to parse YAML from file: {}", path_ref.display()))?;

    // --- Validation ---
    if config.symbols.is_empty() {
        anyhow::bail!("No symbols configured in {}", path_ref.display());
    }

    let mut unique_symbols = HashSet::new();
    for symbol in &mut config.symbols {
        *symbol = symbol.trim().to_string();

        FeedId::from_symbol(symbol).with_context(|| {
            format!(
                "Invalid feed symbol in config file {}: {:?}",
                path_ref.display(),
                symbol
            )
        })?;

        if !unique_symbols.insert(symbol.clone()) {
            anyhow::bail!(
                "Duplicate feed symbol found in config file {}: {}",
                path_ref.display(),
                symbol
            );
        }
    }

    let mut unique_pairs = HashSet::new();
    for monitor in &mut config.monitors {
        monitor.token_pair = monitor.token_pair.trim().to_string();
        if monitor.token_pair.is_empty() {
            anyhow::bail!(
                "Empty token pair for monitor {} in config file {}",
                monitor.contract_address,
                path_ref.display()
            );
        }
        if !unique_pairs.insert(monitor.token_pair.clone()) {
            anyhow::bail!(
                "Duplicate monitored token pair found in config file {}: {} (contract: {})",
                path_ref.display(),
                monitor.token_pair,
                monitor.contract_address
            );
        }
    }

    let thresholds = &config.thresholds;
    if !(thresholds.min_deviation_pct.is_finite() && thresholds.min_deviation_pct >= 0.0) {
        anyhow::bail!("Invalid price_deviation threshold: {}", thresholds.min_deviation_pct);
    }
    if !(thresholds.min_elapsed_hours.is_finite() && thresholds.min_elapsed_hours >= 0.0) {
        anyhow::bail!(
            "Invalid time_elapsed_hours threshold: {}",
            thresholds.min_elapsed_hours
        );
    }
    if config.staleness.max_age == 0 {
        anyhow::bail!("Staleness max_age must be greater than zero");
    }

    debug!(
        symbols = config.symbols.len(),
        monitors = config.monitors.len(),
        "Successfully loaded and validated keeper config"
    );
    Ok(config)
}
