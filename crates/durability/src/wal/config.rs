//! Batching and rotation knobs for `LogWriter`.

/// Configuration for the edit log writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalConfig {
    /// Roll to a new segment file once the current one exceeds this many
    /// bytes.
    pub segment_size_limit_bytes: u64,
}

impl WalConfig {
    /// A small segment limit, for tests that want to exercise rotation
    /// without writing megabytes of fixture data.
    pub fn for_testing() -> Self {
        WalConfig {
            segment_size_limit_bytes: 64 * 1024,
        }
    }
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            segment_size_limit_bytes: 64 * 1024 * 1024,
        }
    }
}
