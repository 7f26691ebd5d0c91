//! Keyword fallback classifier (§4.2), used only when both LLM calls fail.
//!
//! Deliberately dumb: a closed, domain-tuned keyword list and a fixed
//! confidence, just enough to keep the pipeline moving during an LLM
//! provider outage rather than silently dropping every message.

use triagebot_core::types::{Category, Classification, ConsensusKind, Urgency};

/// Fixed confidence assigned to every fallback verdict (§4.2).
pub const FALLBACK_CONFIDENCE: f64 = 0.55;

const KEYWORDS: &[&str] = &[
    "impresora",
    "pos",
    "error",
    "no funciona",
    "urgente",
    "caído",
    "caido",
    "no enciende",
    "bloqueado",
];

/// `true` if `text` contains any fallback keyword (case-insensitive).
pub fn matches_keyword(text: &str) -> bool {
    let lower = text.to_lowercase();
    KEYWORDS.iter().any(|kw| lower.contains(kw))
}

/// Produce a last-resort [`Classification`] from a keyword match. Always
/// marks `needs_human_review`, per §4.2 — this verdict substitutes for an
/// LLM consensus, not a replacement for one.
pub fn classify(text: &str) -> Classification {
    let is_incident = matches_keyword(text);
    Classification {
        is_incident,
        category: is_incident.then_some(Category::Other),
        urgency: is_incident.then_some(Urgency::Medium),
        confidence: if is_incident { FALLBACK_CONFIDENCE } else { 0.0 },
        consensus_kind: ConsensusKind::BothError,
        rationale_primary: None,
        rationale_secondary: None,
        needs_human_review: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_keyword_case_insensitively() {
        assert!(matches_keyword("La IMPRESORA no funciona"));
    }

    #[test]
    fn no_match_on_unrelated_text() {
        assert!(!matches_keyword("gracias por su ayuda"));
    }

    #[test]
    fn classify_assigns_fixed_confidence_on_match() {
        let c = classify("el pos esta bloqueado, urgente");
        assert!(c.is_incident);
        assert_eq!(c.confidence, FALLBACK_CONFIDENCE);
        assert!(c.needs_human_review);
    }

    #[test]
    fn classify_is_negative_without_a_match() {
        let c = classify("buenos dias");
        assert!(!c.is_incident);
        assert_eq!(c.confidence, 0.0);
    }
}
