//! Reporter → helpdesk contact resolution (§4.3 step 1-3).

use tracing::debug;

use triagebot_core::types::Reporter;

use crate::error::{Result, TicketingError};
use crate::helpdesk::HelpdeskClient;

/// Resolve a helpdesk contact id for `reporter`, creating the contact if no
/// match exists by email.
pub async fn resolve_contact_id(client: &HelpdeskClient, reporter: &Reporter) -> Result<String> {
    let email = reporter
        .resolution_email()
        .ok_or_else(|| TicketingError::Parse("reporter has neither email nor phone".to_string()))?;

    if let Some(id) = client.search_contact_by_email(&email).await? {
        debug!(email, contact_id = %id, "reused existing helpdesk contact");
        return Ok(id);
    }

    let id = client.create_contact(reporter.display_name.as_deref(), &email).await?;
    debug!(email, contact_id = %id, "created new helpdesk contact");
    Ok(id)
}

/// Build a [`Reporter`] from a transport sender id (a WhatsApp-style JID,
/// e.g. `5215512345678@s.whatsapp.net`) when the classifier has no richer
/// contact information to hand us.
pub fn reporter_from_sender_id(sender_id: &str) -> Reporter {
    let digits: String = sender_id
        .split('@')
        .next()
        .unwrap_or(sender_id)
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();

    Reporter {
        display_name: None,
        phone: if digits.is_empty() { None } else { Some(digits) },
        email: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_digits_from_whatsapp_jid() {
        let reporter = reporter_from_sender_id("5215512345678@s.whatsapp.net");
        assert_eq!(reporter.phone.as_deref(), Some("5215512345678"));
        assert_eq!(reporter.resolution_email().as_deref(), Some("5215512345678@whatsapp.local"));
    }

    #[test]
    fn malformed_sender_id_without_digits_yields_no_phone() {
        let reporter = reporter_from_sender_id("operator@s.whatsapp.net");
        assert!(reporter.phone.is_none());
        assert!(reporter.resolution_email().is_none());
    }
}
