use crate::config::FingerprintConfig;
use crate::model::{HostEvidence, MatchResult};
use crate::signature::store::{SignatureStore, WEIGHT_EPSILON};
use crate::signature::Signature;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Result of scoring one signature, possibly cut short
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureScore {
    pub result: MatchResult,
    /// Evaluation stopped because the threshold was out of reach.
    /// `result.confidence` then only reflects the rules evaluated so far.
    pub abandoned: bool,
}

/// Outcome of scoring one host against the signature store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOutcome {
    /// Highest-scoring candidate, accepted or not.
    pub best: Option<MatchResult>,
    pub evaluated: usize,
    pub abandoned: usize,
    /// Signatures that could not be evaluated at all.
    pub skipped: usize,
    pub early_exit: bool,
    pub threshold: f64,
}

impl ScoreOutcome {
    /// The best match if it reaches the acceptance threshold.
    pub fn accepted(&self) -> Option<&MatchResult> {
        self.best
            .as_ref()
            .filter(|m| m.confidence + WEIGHT_EPSILON >= self.threshold)
    }
}

/// Weighted rule evaluation with per-signature pruning and global early exit.
///
/// Pure and synchronous: no I/O, no suspension points.
#[derive(Debug, Clone, Copy)]
pub struct MatchScorer {
    threshold: f64,
    early_exit: f64,
}

impl MatchScorer {
    pub fn new(threshold: f64, early_exit: f64) -> Self {
        Self {
            threshold,
            early_exit: early_exit.max(threshold),
        }
    }

    pub fn from_config(config: &FingerprintConfig) -> Self {
        Self::new(config.confidence_threshold, config.early_exit_confidence)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn early_exit(&self) -> f64 {
        self.early_exit
    }

    /// Full confidence of `signature` against `evidence`, without pruning.
    pub fn confidence(&self, evidence: &HostEvidence, signature: &Signature) -> f64 {
        self.evaluate(evidence, signature, false).result.confidence
    }

    /// Score one signature, abandoning it once the threshold is unreachable.
    pub fn score_signature(&self, evidence: &HostEvidence, signature: &Signature) -> SignatureScore {
        self.evaluate(evidence, signature, true)
    }

    fn evaluate(&self, evidence: &HostEvidence, signature: &Signature, prune: bool) -> SignatureScore {
        let total = signature.total_weight();
        let mut matched = 0.0;
        let mut remaining = total;
        let mut matched_rule_ids = BTreeSet::new();
        let mut abandoned = false;

        let rules = signature.rules();
        for (index, rule) in rules.iter().enumerate() {
            if rule.matcher.matches(evidence) {
                matched += rule.weight;
                matched_rule_ids.insert(rule.id.clone());
            }
            remaining -= rule.weight;

            // Checkpoints: end of the cheap phase, then after every expensive rule.
            let next_is_expensive = rules
                .get(index + 1)
                .map_or(false, |next| !next.category().is_cheap());
            let checkpoint = !rule.category().is_cheap() || next_is_expensive;
            if prune && checkpoint && remaining > WEIGHT_EPSILON {
                let reachable = (matched + remaining) / total;
                if reachable + WEIGHT_EPSILON < self.threshold {
                    abandoned = true;
                    break;
                }
            }
        }

        let confidence = if total > 0.0 {
            (matched / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        SignatureScore {
            result: MatchResult {
                signature_id: signature.id.clone(),
                confidence,
                matched_rule_ids,
            },
            abandoned,
        }
    }

    /// Highest confidence `signature` could still reach once its cheap
    /// rules are known: the cheap rules that match plus every expensive rule.
    pub fn upper_bound(&self, evidence: &HostEvidence, signature: &Signature) -> f64 {
        let total = signature.total_weight();
        if total <= 0.0 || signature.defect().is_some() {
            return 0.0;
        }
        let reachable: f64 = signature
            .rules()
            .iter()
            .filter(|rule| !rule.category().is_cheap() || rule.matcher.matches(evidence))
            .map(|rule| rule.weight)
            .sum();
        (reachable / total).clamp(0.0, 1.0)
    }

    /// Best identification for `evidence` among the store's candidates.
    ///
    /// The highest confidence wins and ties keep the candidate evaluated
    /// first. The search ends early once the best result is at or above the
    /// early-exit confidence and no remaining candidate's
    /// [`upper_bound`](Self::upper_bound) exceeds it, so the accepted match
    /// is the one full evaluation would pick.
    pub fn identify(&self, store: &SignatureStore, evidence: &HostEvidence) -> ScoreOutcome {
        self.run(store, evidence, true)
    }

    /// Evaluates every rule of every candidate and keeps the highest
    /// confidence, ties going to the earlier candidate.
    pub fn identify_exhaustive(&self, store: &SignatureStore, evidence: &HostEvidence) -> ScoreOutcome {
        self.run(store, evidence, false)
    }

    fn run(&self, store: &SignatureStore, evidence: &HostEvidence, prune: bool) -> ScoreOutcome {
        let mut outcome = ScoreOutcome {
            threshold: self.threshold,
            ..Default::default()
        };

        let candidates = store.candidates(evidence, self.threshold);
        for (index, signature) in candidates.iter().enumerate() {
            if let Some(defect) = signature.defect() {
                warn!(signature = %signature.id, reason = defect, "skipping unscorable signature");
                outcome.skipped += 1;
                continue;
            }

            let score = self.evaluate(evidence, signature, prune);
            outcome.evaluated += 1;
            if score.abandoned {
                outcome.abandoned += 1;
            }

            let confidence = score.result.confidence;
            let better = outcome
                .best
                .as_ref()
                .map_or(true, |best| confidence > best.confidence + WEIGHT_EPSILON);
            if better {
                outcome.best = Some(score.result);
            }

            if prune && self.settled(&outcome, evidence, &candidates[index + 1..]) {
                outcome.early_exit = true;
                break;
            }
        }

        debug!(
            mac = %evidence.mac,
            evaluated = outcome.evaluated,
            abandoned = outcome.abandoned,
            early_exit = outcome.early_exit,
            "scored host evidence"
        );
        outcome
    }

    /// True when the current best is confident enough to stop and none of
    /// `remaining` could strictly beat it.
    fn settled(&self, outcome: &ScoreOutcome, evidence: &HostEvidence, remaining: &[&Signature]) -> bool {
        let Some(best) = outcome.best.as_ref() else {
            return false;
        };
        if best.confidence + WEIGHT_EPSILON < self.early_exit {
            return false;
        }
        remaining
            .iter()
            .all(|signature| self.upper_bound(evidence, signature) <= best.confidence + WEIGHT_EPSILON)
    }
}
