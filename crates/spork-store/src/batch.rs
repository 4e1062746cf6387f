//! Adaptive batch fetcher for typed range queries.

use tracing::{info, warn};

use spork_core::{BlockEvents, Error, Result};

use crate::metrics;
use crate::transport::AccessNodeClient;

/// Fetches all events of `event_type` in `[start, end]` from one access node,
/// splitting the range into batches of at most `default_batch_size` blocks.
///
/// Endpoints impose undocumented, load-dependent limits on range width, so a
/// rejected batch is retried at the same cursor with half the size until it
/// succeeds or a single-block batch also fails (fatal). Each new batch starts
/// from the configured default again; shrinking is local to the retry loop.
/// Batches are issued strictly in increasing cursor order, so the result needs
/// no re-sort.
pub async fn fetch_events_adaptive(
    client: &dyn AccessNodeClient,
    event_type: &str,
    start: u64,
    end: u64,
    default_batch_size: u64,
) -> Result<Vec<BlockEvents>> {
    let default_batch_size = default_batch_size.max(1);
    let mut events = Vec::new();
    let mut cursor = start;

    while cursor <= end {
        let mut batch_size = default_batch_size;

        loop {
            let batch_end = cursor.saturating_add(batch_size - 1).min(end);
            info!(event_type, start = cursor, end = batch_end, "querying block range");
            metrics::record_range_query(event_type, batch_end - cursor + 1);

            match client
                .events_for_height_range(event_type, cursor, batch_end)
                .await
            {
                Ok(batch) => {
                    events.extend(batch);
                    cursor = match batch_end.checked_add(1) {
                        Some(next) => next,
                        None => return Ok(events),
                    };
                    break;
                }
                Err(e) => {
                    warn!(
                        event_type,
                        start = cursor,
                        end = batch_end,
                        error = %e,
                        "range query failed"
                    );
                    if batch_size == 1 {
                        return Err(Error::BatchExhausted(e.to_string()));
                    }
                    batch_size /= 2;
                    metrics::record_batch_shrink(event_type);
                    info!(event_type, batch_size, "shrinking query batch size");
                }
            }
        }
    }

    Ok(events)
}
