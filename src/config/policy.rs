//! Resolution policy: the tuning knobs read once per resolution.
//!
//! A [`ResolutionPolicy`] is an explicit value handed to the resolver on every
//! call, so different policies can be exercised side by side in one process.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::defaults::*;
use super::duration_serde::option_timeout;
use crate::errors::{AppError, AppResult};

/// Per-call timeouts.
///
/// Each specific timeout falls back to the general `http` timeout, then to
/// its built-in default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// General fallback for every outbound request
    #[serde(default, with = "option_timeout", skip_serializing_if = "Option::is_none")]
    pub http: Option<Duration>,
    /// Format catalog fetch
    #[serde(default, with = "option_timeout", skip_serializing_if = "Option::is_none")]
    pub fetch: Option<Duration>,
    /// Listing calls made by host browsing collaborators
    #[serde(default, with = "option_timeout", skip_serializing_if = "Option::is_none")]
    pub list: Option<Duration>,
    /// Each individual preflight probe
    #[serde(default, with = "option_timeout", skip_serializing_if = "Option::is_none")]
    pub preflight: Option<Duration>,
}

impl TimeoutSettings {
    pub fn fetch(&self) -> Duration {
        self.fetch
            .or(self.http)
            .unwrap_or(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }

    pub fn list(&self) -> Duration {
        self.list
            .or(self.http)
            .unwrap_or(Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS))
    }

    pub fn preflight(&self) -> Duration {
        self.preflight
            .or(self.http)
            .unwrap_or(Duration::from_secs(DEFAULT_PREFLIGHT_TIMEOUT_SECS))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Named server-side format policy used by the policy candidate
    #[serde(default = "default_format_policy")]
    pub format_policy: String,
    /// Ignore video-only variants entirely
    #[serde(default = "default_progressive_only")]
    pub progressive_only: bool,
    /// Format ids never offered to the player
    #[serde(default, deserialize_with = "deserialize_id_set")]
    pub blocked_format_ids: BTreeSet<String>,
    /// Rank the baseline variant above the high-tier one
    #[serde(default = "default_prefer_baseline_stable")]
    pub prefer_baseline_stable: bool,
    /// Known-robust low resolution progressive variant
    #[serde(default = "default_baseline_format_id")]
    pub baseline_format_id: String,
    /// Higher resolution progressive variant, less reliable upstream
    #[serde(default = "default_high_tier_format_id")]
    pub high_tier_format_id: String,
    #[serde(default = "default_include_policy_candidate")]
    pub include_policy_candidate: bool,
    /// Put the policy candidate ahead of every scored candidate
    #[serde(default = "default_policy_first")]
    pub policy_first: bool,
    /// Skip synthesized fallbacks when the catalog gave us nothing
    #[serde(default = "default_policy_on_fetch_error")]
    pub policy_on_fetch_error: bool,
    #[serde(default = "default_preflight_enabled")]
    pub preflight_enabled: bool,
    #[serde(default = "default_preflight_max_candidates")]
    pub preflight_max_candidates: usize,
    /// Bytes read from each probed source; 0 means a minimal 1-byte range probe
    #[serde(default = "default_preflight_probe_bytes")]
    pub preflight_probe_bytes: u64,
    /// Probes in flight at once; 1 keeps probing strictly sequential
    #[serde(default = "default_preflight_concurrency")]
    pub preflight_concurrency: usize,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

fn default_format_policy() -> String {
    DEFAULT_FORMAT_POLICY.to_string()
}

fn default_progressive_only() -> bool {
    DEFAULT_PROGRESSIVE_ONLY
}

fn default_prefer_baseline_stable() -> bool {
    DEFAULT_PREFER_BASELINE_STABLE
}

fn default_baseline_format_id() -> String {
    DEFAULT_BASELINE_FORMAT_ID.to_string()
}

fn default_high_tier_format_id() -> String {
    DEFAULT_HIGH_TIER_FORMAT_ID.to_string()
}

fn default_include_policy_candidate() -> bool {
    DEFAULT_INCLUDE_POLICY_CANDIDATE
}

fn default_policy_first() -> bool {
    DEFAULT_POLICY_FIRST
}

fn default_policy_on_fetch_error() -> bool {
    DEFAULT_POLICY_ON_FETCH_ERROR
}

fn default_preflight_enabled() -> bool {
    DEFAULT_PREFLIGHT_ENABLED
}

fn default_preflight_max_candidates() -> usize {
    DEFAULT_PREFLIGHT_MAX_CANDIDATES
}

fn default_preflight_probe_bytes() -> u64 {
    DEFAULT_PREFLIGHT_PROBE_BYTES
}

fn default_preflight_concurrency() -> usize {
    DEFAULT_PREFLIGHT_CONCURRENCY
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            format_policy: default_format_policy(),
            progressive_only: default_progressive_only(),
            blocked_format_ids: BTreeSet::new(),
            prefer_baseline_stable: default_prefer_baseline_stable(),
            baseline_format_id: default_baseline_format_id(),
            high_tier_format_id: default_high_tier_format_id(),
            include_policy_candidate: default_include_policy_candidate(),
            policy_first: default_policy_first(),
            policy_on_fetch_error: default_policy_on_fetch_error(),
            preflight_enabled: default_preflight_enabled(),
            preflight_max_candidates: default_preflight_max_candidates(),
            preflight_probe_bytes: default_preflight_probe_bytes(),
            preflight_concurrency: default_preflight_concurrency(),
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl ResolutionPolicy {
    pub fn is_blocked(&self, format_id: &str) -> bool {
        self.blocked_format_ids.contains(format_id)
    }

    /// Probe cap, never below one
    pub fn effective_preflight_max(&self) -> usize {
        self.preflight_max_candidates.max(1)
    }

    pub fn effective_preflight_concurrency(&self) -> usize {
        self.preflight_concurrency.max(1)
    }

    /// Block an additional format id (builder style)
    pub fn with_blocked<S: Into<String>>(mut self, format_id: S) -> Self {
        self.blocked_format_ids.insert(format_id.into());
        self
    }

    /// Validate the policy
    pub fn validate(&self) -> AppResult<()> {
        if self.format_policy.trim().is_empty() {
            return Err(AppError::validation("resolution.format_policy must not be empty"));
        }
        if self.baseline_format_id.trim().is_empty()
            || self.high_tier_format_id.trim().is_empty()
        {
            return Err(AppError::validation(
                "resolution baseline and high-tier format ids must not be empty",
            ));
        }
        if self.baseline_format_id == self.high_tier_format_id {
            return Err(AppError::validation(format!(
                "baseline and high-tier format ids must differ (both '{}')",
                self.baseline_format_id
            )));
        }
        if self.preflight_concurrency == 0 {
            return Err(AppError::validation("resolution.preflight_concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// Accept either a list of ids or a single comma-separated string.
fn deserialize_id_set<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdList {
        Csv(String),
        Number(i64),
        List(Vec<IdItem>),
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IdItem {
        Text(String),
        Number(i64),
    }

    let ids: Vec<String> = match IdList::deserialize(deserializer)? {
        IdList::Csv(s) => s.split(',').map(str::to_string).collect(),
        IdList::Number(n) => vec![n.to_string()],
        IdList::List(items) => items
            .into_iter()
            .map(|item| match item {
                IdItem::Text(s) => s,
                IdItem::Number(n) => n.to_string(),
            })
            .collect(),
    };

    Ok(ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ResolutionPolicy::default();
        assert!(policy.progressive_only);
        assert!(policy.preflight_enabled);
        assert!(policy.include_policy_candidate);
        assert!(!policy.policy_first);
        assert!(!policy.policy_on_fetch_error);
        assert_eq!(policy.preflight_max_candidates, 5);
        assert_eq!(policy.preflight_probe_bytes, 32 * 1024);
        assert_eq!(policy.format_policy, "h264_mp4");
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_timeout_fallback_chain() {
        let mut timeouts = TimeoutSettings::default();
        assert_eq!(timeouts.fetch(), Duration::from_secs(20));
        assert_eq!(timeouts.list(), Duration::from_secs(10));
        assert_eq!(timeouts.preflight(), Duration::from_secs(4));

        timeouts.http = Some(Duration::from_secs(7));
        assert_eq!(timeouts.fetch(), Duration::from_secs(7));
        assert_eq!(timeouts.preflight(), Duration::from_secs(7));

        timeouts.preflight = Some(Duration::from_millis(1500));
        assert_eq!(timeouts.preflight(), Duration::from_millis(1500));
        assert_eq!(timeouts.list(), Duration::from_secs(7));
    }

    #[test]
    fn test_blocked_ids_accept_csv_and_lists() {
        let policy: ResolutionPolicy =
            toml::from_str(r#"blocked_format_ids = "22, 137,,""#).unwrap();
        assert!(policy.is_blocked("22"));
        assert!(policy.is_blocked("137"));
        assert_eq!(policy.blocked_format_ids.len(), 2);

        let policy: ResolutionPolicy =
            toml::from_str(r#"blocked_format_ids = ["18", 22]"#).unwrap();
        assert!(policy.is_blocked("18"));
        assert!(policy.is_blocked("22"));
    }

    #[test]
    fn test_preflight_limits_are_clamped() {
        let policy = ResolutionPolicy {
            preflight_max_candidates: 0,
            preflight_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(policy.effective_preflight_max(), 1);
        assert_eq!(policy.effective_preflight_concurrency(), 1);
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_identical_known_ids() {
        let policy = ResolutionPolicy {
            high_tier_format_id: "18".into(),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }
}
