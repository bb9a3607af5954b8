use crate::{
    error::KeeperResult,
    math::{elapsed_hours, price_deviation_pct},
    registry::FeedRegistry,
    types::{FeedId, PctNumber, TimestampMs, TrackedFeed, UpdateBatch, UpdateThresholds},
};
use tracing::{debug, info};

/// Outcome of the update decision for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Nothing crosses a threshold; `reason` names both thresholds.
    NoAction { reason: String },
    /// Every selected feed, to be updated together in one call.
    Execute(UpdateBatch),
}

/// The numbers behind one feed's verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvaluation {
    pub symbol: String,
    pub feed_id: FeedId,
    pub deviation_pct: PctNumber,
    pub elapsed_hours: f64,
    pub selected: bool,
}

/// Checks whether a feed's stored value needs to be refreshed.
///
/// An unset live or stored price counts as zero and an unset stored timestamp
/// as the epoch, so a feed that was never written is always selected.
pub fn evaluate_feed(
    feed: &TrackedFeed,
    now_ms: TimestampMs,
    thresholds: &UpdateThresholds,
) -> KeeperResult<FeedEvaluation> {
    let live = feed.live_price.unwrap_or(0);
    let stored = feed.stored_price.unwrap_or(0);
    let deviation_pct = price_deviation_pct(live, stored);
    let elapsed_hours = elapsed_hours(now_ms, feed.stored_timestamp.unwrap_or(0))?;

    let selected = deviation_pct >= thresholds.min_deviation_pct
        || elapsed_hours >= thresholds.min_elapsed_hours;

    debug!(
        symbol = %feed.symbol,
        live_price = live,
        stored_price = stored,
        stored_timestamp = feed.stored_timestamp.unwrap_or(0),
        deviation_pct = format!("{:.2}", deviation_pct),
        deviation_thresh = thresholds.min_deviation_pct,
        elapsed_hours = format!("{:.2}", elapsed_hours),
        elapsed_thresh = thresholds.min_elapsed_hours,
        selected,
        "Calculated update check values"
    );

    Ok(FeedEvaluation {
        symbol: feed.symbol.clone(),
        feed_id: feed.feed_id,
        deviation_pct,
        elapsed_hours,
        selected,
    })
}

/// Builds the single update batch of a cycle.
///
/// Feeds are evaluated in registry order and selected feeds keep that order.
/// Any evaluation error aborts the whole decision; no partial batch exists.
pub fn decide(
    registry: &FeedRegistry,
    now_ms: TimestampMs,
    thresholds: &UpdateThresholds,
) -> KeeperResult<Decision> {
    let mut batch = UpdateBatch::default();
    for feed in registry.iter() {
        if evaluate_feed(feed, now_ms, thresholds)?.selected {
            batch.push(feed.feed_id);
        }
    }

    if batch.is_empty() {
        let reason = no_update_reason(thresholds);
        info!(%reason, "No update conditions met.");
        return Ok(Decision::NoAction { reason });
    }

    info!(count = batch.len(), feeds = ?batch.symbols(), "Price feeds to update");
    Ok(Decision::Execute(batch))
}

pub fn no_update_reason(thresholds: &UpdateThresholds) -> String {
    format!(
        "No update: price deviation less than {:.2}% or time elapsed since last update is less than {} hours",
        thresholds.min_deviation_pct, thresholds.min_elapsed_hours
    )
}
