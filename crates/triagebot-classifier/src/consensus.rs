//! Dual-LLM consensus combination (§4.2): a pure function over two
//! independent model verdicts, with no knowledge of how either call was
//! made. Isolating this from the HTTP/timeout machinery in `triagebot-llm`
//! keeps the confidence-combination table testable without a network.

use triagebot_core::types::{Classification, ConsensusKind};
use triagebot_llm::ClassificationResponse;

/// Combine the primary and secondary verdicts per the §4.2 table. Either
/// side may be `None` to represent a call that errored or timed out.
pub fn combine(
    primary: Option<&ClassificationResponse>,
    secondary: Option<&ClassificationResponse>,
) -> Classification {
    match (primary, secondary) {
        (Some(a), Some(b)) if a.is_incident && b.is_incident => Classification {
            is_incident: true,
            category: a.category.or(b.category),
            urgency: a.urgency.or(b.urgency),
            confidence: (1.0_f64).min(mean(a.confidence, b.confidence) * 1.1),
            consensus_kind: ConsensusKind::BothYes,
            rationale_primary: Some(a.rationale.clone()),
            rationale_secondary: Some(b.rationale.clone()),
            needs_human_review: false,
        },
        (Some(a), Some(b)) if !a.is_incident && !b.is_incident => Classification {
            is_incident: false,
            category: None,
            urgency: None,
            confidence: a.confidence.max(b.confidence),
            consensus_kind: ConsensusKind::BothNo,
            rationale_primary: Some(a.rationale.clone()),
            rationale_secondary: Some(b.rationale.clone()),
            needs_human_review: false,
        },
        (Some(a), Some(b)) => {
            let (winner, other) = if a.confidence >= b.confidence { (a, b) } else { (b, a) };
            Classification {
                is_incident: winner.is_incident,
                category: winner.category,
                urgency: winner.urgency,
                confidence: winner.confidence * 0.85,
                consensus_kind: ConsensusKind::Disagree,
                rationale_primary: Some(a.rationale.clone()),
                rationale_secondary: Some(other.rationale.clone()),
                needs_human_review: true,
            }
        }
        (Some(valid), None) | (None, Some(valid)) => Classification {
            is_incident: valid.is_incident,
            category: valid.category,
            urgency: valid.urgency,
            confidence: valid.confidence * 0.75,
            consensus_kind: ConsensusKind::PartialError,
            rationale_primary: Some(valid.rationale.clone()),
            rationale_secondary: None,
            needs_human_review: true,
        },
        (None, None) => Classification {
            is_incident: false,
            category: None,
            urgency: None,
            confidence: 0.0,
            consensus_kind: ConsensusKind::BothError,
            rationale_primary: None,
            rationale_secondary: None,
            needs_human_review: true,
        },
    }
}

fn mean(a: f64, b: f64) -> f64 {
    (a + b) / 2.0
}

/// Action to take on a finished [`Classification`] (§4.2 thresholds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    AutoCreate,
    AskConfirm,
    LogOnly,
}

/// Threshold above which an incident is auto-created without confirmation.
pub const AUTO_CREATE_THRESHOLD: f64 = 0.90;
/// Threshold above which a confirmation prompt is sent instead of a log-only drop.
pub const ASK_CONFIRM_THRESHOLD: f64 = 0.60;

pub fn decide_action(classification: &Classification) -> Action {
    if !classification.is_incident {
        return Action::LogOnly;
    }
    if classification.confidence > AUTO_CREATE_THRESHOLD {
        Action::AutoCreate
    } else if classification.confidence > ASK_CONFIRM_THRESHOLD {
        Action::AskConfirm
    } else {
        Action::LogOnly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use triagebot_core::types::{Category, Urgency};

    fn verdict(is_incident: bool, confidence: f64) -> ClassificationResponse {
        ClassificationResponse {
            is_incident,
            confidence,
            category: Some(Category::Pos),
            urgency: Some(Urgency::High),
            rationale: "test".to_string(),
        }
    }

    #[test]
    fn both_yes_combines_with_boost_clamped_at_one() {
        let a = verdict(true, 0.95);
        let b = verdict(true, 0.95);
        let c = combine(Some(&a), Some(&b));
        assert_eq!(c.consensus_kind, ConsensusKind::BothYes);
        assert!(c.is_incident);
        assert!(!c.needs_human_review);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn both_yes_without_clamp_applies_the_boost() {
        let a = verdict(true, 0.60);
        let b = verdict(true, 0.60);
        let c = combine(Some(&a), Some(&b));
        assert!((c.confidence - 0.66).abs() < 1e-9);
    }

    #[test]
    fn both_no_takes_the_max_confidence() {
        let a = verdict(false, 0.3);
        let b = verdict(false, 0.8);
        let c = combine(Some(&a), Some(&b));
        assert_eq!(c.consensus_kind, ConsensusKind::BothNo);
        assert!(!c.is_incident);
        assert_eq!(c.confidence, 0.8);
        assert!(!c.needs_human_review);
    }

    #[test]
    fn disagreement_follows_higher_confidence_with_penalty() {
        let a = verdict(true, 0.95);
        let b = verdict(false, 0.4);
        let c = combine(Some(&a), Some(&b));
        assert_eq!(c.consensus_kind, ConsensusKind::Disagree);
        assert!(c.is_incident);
        assert!((c.confidence - 0.95 * 0.85).abs() < 1e-9);
        assert!(c.needs_human_review);
    }

    #[test]
    fn one_errored_discounts_the_valid_verdict() {
        let a = verdict(true, 0.8);
        let c = combine(Some(&a), None);
        assert_eq!(c.consensus_kind, ConsensusKind::PartialError);
        assert!((c.confidence - 0.6).abs() < 1e-9);
        assert!(c.needs_human_review);
    }

    #[test]
    fn both_errored_is_defensive_no() {
        let c = combine(None, None);
        assert_eq!(c.consensus_kind, ConsensusKind::BothError);
        assert!(!c.is_incident);
        assert_eq!(c.confidence, 0.0);
        assert!(c.needs_human_review);
    }

    #[test]
    fn thresholds_pick_the_right_action() {
        let mut c = combine(Some(&verdict(true, 0.95)), Some(&verdict(true, 0.95)));
        assert_eq!(decide_action(&c), Action::AutoCreate);

        c.confidence = 0.75;
        assert_eq!(decide_action(&c), Action::AskConfirm);

        c.confidence = 0.5;
        assert_eq!(decide_action(&c), Action::LogOnly);

        c.is_incident = false;
        c.confidence = 0.99;
        assert_eq!(decide_action(&c), Action::LogOnly);
    }
}
