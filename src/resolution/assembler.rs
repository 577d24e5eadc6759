//! Result Assembler
//!
//! Combines the ranked list, the preflight report and the policy candidate
//! into the final ordered answer.
//!
//! Final delivery order when something was validated (or preflight is off):
//! baseline id, high-tier id, every other candidate in validated order, then
//! the policy candidate. With `policy_first` the policy candidate leads,
//! unless its own probe failed; then it is only the trailing backup.
//! The soft-fallback list skips this re-rank and keeps score order.

use tracing::debug;

use super::policy_candidate::PolicyPlacement;
use super::preflight::PreflightReport;
use crate::config::ResolutionPolicy;
use crate::models::CandidateSource;

/// Final list plus how it was produced
#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub sources: Vec<CandidateSource>,
    pub soft_fallback: bool,
}

pub struct ResultAssembler<'a> {
    policy: &'a ResolutionPolicy,
}

impl<'a> ResultAssembler<'a> {
    pub fn new(policy: &'a ResolutionPolicy) -> Self {
        Self { policy }
    }

    pub fn assemble(
        &self,
        ranked: &[CandidateSource],
        preflight: PreflightReport,
        policy_candidate: Option<CandidateSource>,
    ) -> Assembly {
        if preflight.nothing_reachable() && !ranked.is_empty() {
            let mut sources = ranked.to_vec();
            if let Some(candidate) = policy_candidate {
                sources.retain(|c| c.source_id != candidate.source_id);
                sources.insert(0, candidate);
            }
            debug!(
                target = "resolver.assemble",
                returned = sources.len(),
                "Soft fallback: returning ranked list unvalidated"
            );
            return Assembly {
                sources,
                soft_fallback: true,
            };
        }

        // A policy candidate that failed its own probe is only a backup
        let policy_passed = !preflight.enabled
            || preflight
                .validated
                .iter()
                .any(CandidateSource::is_policy);
        let policy_leads =
            PolicyPlacement::for_policy(self.policy) == PolicyPlacement::First && policy_passed;

        let mut sources = preflight.validated;
        if let Some(candidate) = policy_candidate {
            if !sources.iter().any(|c| c.source_id == candidate.source_id) {
                sources.push(candidate);
            }
        }
        if sources.is_empty() {
            // Nothing ranked and no policy candidate; take whatever exists
            sources.extend(ranked.first().cloned());
        }

        let sources = self.rerank(sources, policy_leads);
        debug!(
            target = "resolver.assemble",
            returned = sources.len(),
            first = sources.first().map(|c| c.source_id.as_str()).unwrap_or(""),
            "Assembled final source list"
        );
        Assembly {
            sources,
            soft_fallback: false,
        }
    }

    /// Stable delivery re-rank of a validated list
    pub fn rerank(
        &self,
        mut sources: Vec<CandidateSource>,
        policy_leads: bool,
    ) -> Vec<CandidateSource> {
        sources.sort_by_key(|c| self.delivery_rank(c, policy_leads));
        sources
    }

    fn delivery_rank(&self, candidate: &CandidateSource, policy_leads: bool) -> u8 {
        if candidate.is_policy() {
            return if policy_leads { 0 } else { 9 };
        }
        if candidate.has_format_id(&self.policy.baseline_format_id) {
            1
        } else if candidate.has_format_id(&self.policy.high_tier_format_id) {
            2
        } else {
            3
        }
    }
}
