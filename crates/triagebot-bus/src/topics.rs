//! Logical topic names (§6) and the physical naming convention they map to.
//!
//! §9 flags that the source's Redis channel naming varies (colon- vs.
//! dot-separated) and leaves the choice to the implementer. This crate picks
//! colon-separated physical names throughout — `messages:inbound`, not
//! `messages.inbound` — because colons are the idiomatic Redis key/channel
//! separator and the same separator is already mandated for store keys
//! (`incident:active:{conversation_id}:{ticket_id}`); using one separator
//! for both topics and keys keeps the wire vocabulary uniform across all
//! three services.

pub const MESSAGES_INBOUND: &str = "messages:inbound";
pub const MESSAGES_OUTBOUND: &str = "messages:outbound";
pub const TICKET_CREATE_REQUEST: &str = "ticket:create:request";
pub const TICKET_UPDATE_REQUEST: &str = "ticket:update:request";
pub const TICKET_CREATED: &str = "ticket:created";
pub const TICKET_UPDATED: &str = "ticket:updated";
pub const AGENT_RESPONSE: &str = "agent:response";
pub const SERVICE_NOTIFICATIONS: &str = "service:notifications";

/// Prepend the deployment namespace (`BusConfig::namespace`) to a logical
/// topic or store-key prefix, so multiple deployments can share one Redis
/// instance without collision.
pub fn namespaced(namespace: &str, logical: &str) -> String {
    format!("{namespace}:{logical}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_a_topic() {
        assert_eq!(
            namespaced("triagebot", MESSAGES_INBOUND),
            "triagebot:messages:inbound"
        );
    }
}
