//! Throughput and ETA math shared by the driver's periodic progress events
//!
//! Kept separate from the driver loop so the calculation (and its "don't
//! derive rate from a loop counter" pitfall) has its own tests.

use std::time::Duration;

/// Bytes per second, computed from whole blocks completed since the last sample
pub fn throughput_bytes_per_sec(blocks_since_last: u64, blocksize: u64, since_last: Duration) -> f64 {
    let bytes = blocks_since_last.saturating_mul(blocksize);
    if since_last.as_secs_f64() > 0.0 {
        bytes as f64 / since_last.as_secs_f64()
    } else {
        0.0
    }
}

/// Estimated time remaining, extrapolated from the average rate seen so far
pub fn estimate_remaining(blocks_done: u64, total_blocks: u64, elapsed_total: Duration) -> Duration {
    if blocks_done == 0 {
        return Duration::ZERO;
    }
    let remaining = total_blocks.saturating_sub(blocks_done);
    Duration::from_secs_f64(remaining as f64 * elapsed_total.as_secs_f64() / blocks_done as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throughput_is_zero_over_zero_elapsed() {
        assert_eq!(throughput_bytes_per_sec(10, 1024, Duration::ZERO), 0.0);
    }

    #[test]
    fn throughput_scales_with_blocks_and_blocksize() {
        let rate = throughput_bytes_per_sec(4, 1024, Duration::from_secs(2));
        assert_eq!(rate, 2048.0);
    }

    #[test]
    fn eta_is_zero_before_any_block_completes() {
        assert_eq!(estimate_remaining(0, 100, Duration::from_secs(5)), Duration::ZERO);
    }

    #[test]
    fn eta_extrapolates_linearly() {
        let eta = estimate_remaining(50, 100, Duration::from_secs(10));
        assert_eq!(eta, Duration::from_secs(10));
    }
}
