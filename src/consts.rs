//! Constant variables.
///
/// extra copies kept besides the root, replica set width is k + 1
pub const DEFAULT_REPLICATION_FACTOR: usize = 4;
/// quiet maintenance ticks tolerated before a replica is considered orphaned
pub const DEFAULT_STALE_LIMIT: u32 = 3;
/// refresh rounds a replica may stay bodyless before the fetch is escalated
pub const DEFAULT_MISSING_LIMIT: u32 = 3;
/// default deadline for collecting InsertAcks, in ms
pub const DEFAULT_REPLICATE_TIMEOUT_MS: u64 = 30 * 1000;
/// default period of the maintenance tick, in ms
pub const DEFAULT_MAINTENANCE_INTERVAL_MS: u64 = 10 * 1000;
/// byte width of ring identifiers
pub const ID_LEN: usize = 20;
