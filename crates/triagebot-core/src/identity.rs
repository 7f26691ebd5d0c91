//! Conversation/identity normalization (§4.4).
//!
//! Every service identifies a conversation by the transport's canonical
//! form before comparing it or using it as a store-key prefix. Any CLI or
//! HTTP input goes through [`normalize_destination`] first.

const TRANSPORT_SUFFIX_INDIVIDUAL: &str = "@s.whatsapp.net";
const TRANSPORT_SUFFIX_GROUP: &str = "@g.us";

/// Strip everything but digits and a leading `+`, then append the transport's
/// individual-chat suffix. Idempotent: running it twice on its own output
/// returns the same string (§8 round-trip law).
pub fn normalize_destination(raw: &str) -> String {
    if raw.ends_with(TRANSPORT_SUFFIX_INDIVIDUAL) || raw.ends_with(TRANSPORT_SUFFIX_GROUP) {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    if let Some('+') = chars.peek() {
        out.push('+');
        chars.next();
    }
    for c in chars {
        if c.is_ascii_digit() {
            out.push(c);
        }
    }
    out.push_str(TRANSPORT_SUFFIX_INDIVIDUAL);
    out
}

/// `true` when `id` is a group conversation identifier (ends in the group suffix).
pub fn is_group_conversation(id: &str) -> bool {
    id.ends_with(TRANSPORT_SUFFIX_GROUP)
}

/// Syntax validation for a normalized destination (§4.1 step 3).
///
/// A destination is well-formed if it carries one of the two known
/// transport suffixes and at least one digit before it.
pub fn validate_destination(destination: &str) -> bool {
    let (prefix, ok_suffix) = if let Some(p) = destination.strip_suffix(TRANSPORT_SUFFIX_INDIVIDUAL)
    {
        (p, true)
    } else if let Some(p) = destination.strip_suffix(TRANSPORT_SUFFIX_GROUP) {
        (p, true)
    } else {
        ("", false)
    };
    ok_suffix && prefix.chars().any(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_raw_phone() {
        assert_eq!(
            normalize_destination("+52 155 1234 5678"),
            "+5215512345678@s.whatsapp.net"
        );
    }

    #[test]
    fn normalization_is_idempotent() {
        let once = normalize_destination("5215512345678");
        let twice = normalize_destination(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn leaves_already_suffixed_group_id_untouched() {
        assert_eq!(normalize_destination("G1@g.us"), "G1@g.us");
    }

    #[test]
    fn group_conversation_detection() {
        assert!(is_group_conversation("G1@g.us"));
        assert!(!is_group_conversation("5215512345678@s.whatsapp.net"));
    }

    #[test]
    fn validates_well_formed_destination() {
        assert!(validate_destination("5215512345678@s.whatsapp.net"));
        assert!(!validate_destination("not-a-number"));
        assert!(!validate_destination("@s.whatsapp.net"));
    }
}
