//! Durability mode for the edit log writer.

/// Controls whether `LogWriter::append_group` fsyncs before returning.
///
/// Spec §5 requires `commit`'s `COMMITTED` edit to be durable before the
/// call returns; `Always` is the mode the manager uses in production.
/// `Skip` exists for tests that want to exercise the in-memory state
/// machine without touching disk at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DurabilityMode {
    /// `fsync` after every group (spec §5's synchronous durability
    /// contract).
    #[default]
    Always,
    /// Write to the OS page cache but never `fsync`. Not crash-safe; for
    /// tests only.
    Skip,
}
