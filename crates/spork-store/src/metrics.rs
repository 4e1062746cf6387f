//! Metrics emitted by the fetch engine.
//!
//! Facade only; installing a recorder is left to the embedding process.

use metrics::counter;

pub fn record_range_query(event_type: &str, batch_size: u64) {
    counter!("spork_range_queries_total", "event_type" => event_type.to_string()).increment(1);
    counter!("spork_range_query_blocks_total", "event_type" => event_type.to_string())
        .increment(batch_size);
}

pub fn record_batch_shrink(event_type: &str) {
    counter!("spork_batch_shrinks_total", "event_type" => event_type.to_string()).increment(1);
}

pub fn record_reconnect(endpoint: &str) {
    counter!("spork_reconnects_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_fanout_blocks(count: u64) {
    counter!("spork_fanout_blocks_total").increment(count);
}

pub fn record_error_transaction() {
    counter!("spork_error_transactions_total").increment(1);
}
