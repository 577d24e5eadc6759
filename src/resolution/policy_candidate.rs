//! Policy Candidate Injector
//!
//! The policy candidate asks the bridge to negotiate an encoding server side
//! under a named format policy. It declares no streams, so it is usually the
//! last resort; `policy_first` promotes it to the head of the ranked list.

use tracing::debug;

use crate::config::ResolutionPolicy;
use crate::models::{CandidateKind, CandidateSource, DeliveryFlags, VideoIdentifier};
use crate::utils::BridgeEndpoints;

/// Fixed score of the policy candidate; it never competes on score
pub const POLICY_CANDIDATE_SCORE: i64 = 100;

/// Where the policy candidate goes for one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyPlacement {
    /// Not offered at all
    Disabled,
    /// Ranked first and preflighted with the scored candidates
    First,
    /// Appended after preflight as the final fallback
    Last,
}

impl PolicyPlacement {
    pub fn for_policy(policy: &ResolutionPolicy) -> Self {
        match (policy.include_policy_candidate, policy.policy_first) {
            (false, _) => Self::Disabled,
            (true, true) => Self::First,
            (true, false) => Self::Last,
        }
    }

    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }
}

/// Builds and places the policy candidate
pub struct PolicyInjector<'a> {
    video_id: &'a VideoIdentifier,
    policy: &'a ResolutionPolicy,
    endpoints: &'a BridgeEndpoints,
}

impl<'a> PolicyInjector<'a> {
    pub fn new(
        video_id: &'a VideoIdentifier,
        policy: &'a ResolutionPolicy,
        endpoints: &'a BridgeEndpoints,
    ) -> Self {
        Self {
            video_id,
            policy,
            endpoints,
        }
    }

    pub fn placement(&self) -> PolicyPlacement {
        PolicyPlacement::for_policy(self.policy)
    }

    /// The policy candidate, or `None` when the policy disables it
    pub fn candidate(&self) -> Option<CandidateSource> {
        if !self.placement().is_enabled() {
            return None;
        }
        let format_policy = self.policy.format_policy.trim();
        Some(CandidateSource {
            source_id: format!("{}@policy", self.video_id),
            format_id: None,
            url: self
                .endpoints
                .play_policy_url(self.video_id.as_str(), format_policy),
            container: "mp4".to_string(),
            name: format!("YouTube Policy: {format_policy}"),
            kind: CandidateKind::Policy,
            priority_score: POLICY_CANDIDATE_SCORE,
            streams_declared: false,
            streams: Vec::new(),
            delivery: DeliveryFlags::default(),
        })
    }

    /// Whether synthesized fallbacks give way to the policy candidate.
    ///
    /// Only applies when the catalog let us down (failed, or nothing usable)
    /// and the policy candidate will be appended after preflight.
    pub fn suppresses_fallbacks(&self, fetch_failed: bool, scored_from_catalog: usize) -> bool {
        let catalog_let_down = fetch_failed || scored_from_catalog == 0;
        let suppress = catalog_let_down
            && self.policy.policy_on_fetch_error
            && self.placement() == PolicyPlacement::Last;
        if suppress {
            debug!(
                target = "resolver.scoring",
                video_id = %self.video_id,
                fetch_failed,
                "Policy candidate replaces synthesized fallbacks"
            );
        }
        suppress
    }

    /// Put the policy candidate at the head of the ranked list when it goes first.
    pub fn place_first(
        &self,
        ranked: &mut Vec<CandidateSource>,
        candidate: &Option<CandidateSource>,
    ) {
        if self.placement() != PolicyPlacement::First {
            return;
        }
        if let Some(candidate) = candidate {
            ranked.retain(|c| c.source_id != candidate.source_id);
            ranked.insert(0, candidate.clone());
        }
    }
}
