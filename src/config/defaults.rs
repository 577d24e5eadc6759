/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Bridge defaults
pub const DEFAULT_BRIDGE_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_ENV_PREFIX: &str = "YTBRIDGE_";
pub const DEFAULT_CONFIG_FILE: &str = "ytbridge.toml";

// Format policy defaults
pub const DEFAULT_FORMAT_POLICY: &str = "h264_mp4";
pub const DEFAULT_BASELINE_FORMAT_ID: &str = "18";
pub const DEFAULT_HIGH_TIER_FORMAT_ID: &str = "22";

// Candidate selection defaults
pub const DEFAULT_PROGRESSIVE_ONLY: bool = true;
pub const DEFAULT_PREFER_BASELINE_STABLE: bool = false;
pub const DEFAULT_INCLUDE_POLICY_CANDIDATE: bool = true;
pub const DEFAULT_POLICY_FIRST: bool = false;
pub const DEFAULT_POLICY_ON_FETCH_ERROR: bool = false;

// Preflight defaults
pub const DEFAULT_PREFLIGHT_ENABLED: bool = true;
pub const DEFAULT_PREFLIGHT_MAX_CANDIDATES: usize = 5;
pub const DEFAULT_PREFLIGHT_PROBE_BYTES: u64 = 32 * 1024; // 32KiB
pub const DEFAULT_PREFLIGHT_CONCURRENCY: usize = 1;
/// Number of top candidates returned unprobed when preflight is disabled
pub const UNPROBED_CANDIDATE_COUNT: usize = 3;

// Timeout defaults
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_LIST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PREFLIGHT_TIMEOUT_SECS: u64 = 4;
/// Upper bound accepted for any timeout knob
pub const MAX_TIMEOUT_MS: u64 = 300_000; // 5 minutes
