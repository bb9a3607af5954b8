use crate::{
    error::{KeeperError, KeeperResult},
    registry::FeedRegistry,
    types::AttestedPackage,
};
use tracing::{debug, error};

/// Fills live prices from attested packages, first writer wins.
///
/// Packages are scanned in the order given. A point sets the live price of a
/// tracked feed only if that feed has no live price yet; untracked feeds, zero
/// values and later values for an already set feed are skipped. Signatures and
/// quorum are the decoder's business and are not re-checked here.
///
/// Fails with [`KeeperError::FeedNotFound`] naming the first feed (in registry
/// order) that is still unset after the scan.
pub fn aggregate_live_prices(
    registry: &mut FeedRegistry,
    packages: &[AttestedPackage],
) -> KeeperResult<()> {
    for (index, package) in packages.iter().enumerate() {
        debug!(
            index,
            timestamp_ms = package.timestamp_ms,
            signer = %package.signer,
            points = package.points.len(),
            "Processing attested package"
        );

        for point in &package.points {
            let Some(feed) = registry.get_mut(&point.feed_id) else {
                continue;
            };
            if feed.record_live_price(point.value) {
                debug!(symbol = %feed.symbol, value = point.value, "Live price set");
            }
        }
    }

    if let Some(missing) = registry.iter().find(|f| f.live_price.is_none()) {
        error!(symbol = %missing.symbol, "Data feed not found in attested packages");
        return Err(KeeperError::FeedNotFound(missing.symbol.clone()));
    }
    Ok(())
}
