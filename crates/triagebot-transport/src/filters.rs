//! Inbound filter chain (§4.1 step 3-4): duplicate detection, per-sender
//! rate limiting, an observational spam heuristic, and priority tagging.
//! Each filter is a pure function over a [`triagebot_core::types::InboundMessage`]
//! plus whatever small piece of mutable state it owns, so the ordering and
//! behavior of the chain is testable without a live transport.

use std::time::Instant;

use triagebot_core::cache::{SeenCache, SlidingWindowLimiter};
use triagebot_core::config::DUPLICATE_WINDOW_SECS;
use triagebot_core::types::{InboundMessage, Priority};

const SPAM_KEYWORDS: &[&str] = &["gratis", "click aqui", "premio", "oferta", "gana dinero"];
const SPAM_WARN_THRESHOLD: usize = 2;

pub struct InboundFilters {
    dedup: SeenCache<(String, String, triagebot_core::types::MessageKind)>,
    rate_limiter: SlidingWindowLimiter<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Pass,
    DuplicateDropped,
    RateLimited,
}

impl InboundFilters {
    pub fn new(dedup_capacity: usize, rate_window: std::time::Duration, rate_max: u32) -> Self {
        Self {
            dedup: SeenCache::new(dedup_capacity),
            rate_limiter: SlidingWindowLimiter::new(rate_window, rate_max),
        }
    }

    /// Run the duplicate and rate-limit filters, in the fixed order §4.1
    /// requires. Spam heuristic is evaluated separately via [`spam_match_count`]
    /// since it never drops the message.
    pub fn check(&mut self, msg: &InboundMessage, now: Instant) -> FilterOutcome {
        let fingerprint = msg.dedup_fingerprint();
        if self.dedup.check_and_record(
            fingerprint,
            now,
            std::time::Duration::from_secs(DUPLICATE_WINDOW_SECS),
        ) {
            return FilterOutcome::DuplicateDropped;
        }

        if !self.rate_limiter.try_acquire(msg.sender_id.clone(), now) {
            return FilterOutcome::RateLimited;
        }

        FilterOutcome::Pass
    }
}

/// Count of spam-keyword matches in `text`, case-insensitive. §4.1: a
/// match count of 2 or more is logged as a warning, but the message still
/// passes — the heuristic is observational, never blocking.
pub fn spam_match_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    SPAM_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count()
}

pub fn is_spam_suspicious(text: &str) -> bool {
    spam_match_count(text) >= SPAM_WARN_THRESHOLD
}

/// Tag priority per §4.1 step 4: high if live-location, the text contains
/// "urgent", or it's a group message carrying mentions; else normal.
pub fn tag_priority(
    is_live_location: bool,
    text: &str,
    is_group: bool,
    mentions: &[String],
) -> Priority {
    let text_urgent = text.to_lowercase().contains("urgent");
    if is_live_location || text_urgent || (is_group && !mentions.is_empty()) {
        Priority::High
    } else {
        Priority::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use triagebot_core::types::MessageKind;

    fn sample_msg(sender: &str, text: &str) -> InboundMessage {
        InboundMessage {
            id: "m1".to_string(),
            sender_id: sender.to_string(),
            conversation_id: "c1".to_string(),
            is_group: false,
            timestamp: Utc::now(),
            transport: "whatsapp".to_string(),
            text: text.to_string(),
            kind: MessageKind::Text,
            media: None,
            caption: None,
            quoted: None,
            mentions: vec![],
            forwarded: false,
            priority: Priority::Normal,
        }
    }

    #[test]
    fn drops_duplicate_within_window() {
        let mut filters = InboundFilters::new(64, std::time::Duration::from_secs(60), 30);
        let t0 = Instant::now();
        let msg = sample_msg("s1", "hola");
        assert_eq!(filters.check(&msg, t0), FilterOutcome::Pass);
        assert_eq!(
            filters.check(&msg, t0 + std::time::Duration::from_secs(1)),
            FilterOutcome::DuplicateDropped
        );
    }

    #[test]
    fn allows_same_text_after_dedup_window_elapses() {
        let mut filters = InboundFilters::new(64, std::time::Duration::from_secs(60), 30);
        let t0 = Instant::now();
        let msg = sample_msg("s1", "hola");
        assert_eq!(filters.check(&msg, t0), FilterOutcome::Pass);
        assert_eq!(
            filters.check(&msg, t0 + std::time::Duration::from_secs(DUPLICATE_WINDOW_SECS + 1)),
            FilterOutcome::Pass
        );
    }

    #[test]
    fn rate_limits_after_cap_exceeded() {
        let mut filters = InboundFilters::new(64, std::time::Duration::from_secs(60), 2);
        let t0 = Instant::now();
        assert_eq!(filters.check(&sample_msg("s1", "a"), t0), FilterOutcome::Pass);
        assert_eq!(filters.check(&sample_msg("s1", "b"), t0), FilterOutcome::Pass);
        assert_eq!(filters.check(&sample_msg("s1", "c"), t0), FilterOutcome::RateLimited);
    }

    #[test]
    fn spam_heuristic_counts_matches() {
        assert_eq!(spam_match_count("gana dinero con esta oferta gratis"), 3);
        assert!(is_spam_suspicious("gana dinero, oferta limitada"));
        assert!(!is_spam_suspicious("hola, buenos dias"));
    }

    #[test]
    fn priority_tagging_rules() {
        assert_eq!(tag_priority(true, "hola", false, &[]), Priority::High);
        assert_eq!(tag_priority(false, "urgent please help", false, &[]), Priority::High);
        assert_eq!(
            tag_priority(false, "hola", true, &["a".to_string()]),
            Priority::High
        );
        assert_eq!(tag_priority(false, "hola", true, &[]), Priority::Normal);
        assert_eq!(tag_priority(false, "hola", false, &[]), Priority::Normal);
    }
}
