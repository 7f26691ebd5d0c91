//! Helpdesk HTTP client: OAuth2-authenticated contact/ticket operations
//! (§4.3). The refresh-before-expiry / refresh-on-401-then-retry-once flow
//! is grounded on the teacher's `skynet-agent::qwen_oauth::QwenOAuthProvider`,
//! adapted to persist through [`crate::oauth::OAuthStore`] (SQLite) instead
//! of a flat credentials file.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use triagebot_core::types::OAuthState;

use crate::config::TicketingSettings;
use crate::error::{Result, TicketingError};
use crate::oauth::OAuthStore;

#[derive(Debug, Clone, Serialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub category: String,
    pub urgency: String,
    pub department_id: String,
    pub contact_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct TokenRefreshResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct ContactSearchResponse {
    contacts: Vec<ContactRef>,
}

#[derive(Debug, Deserialize)]
struct ContactRef {
    id: String,
}

pub struct HelpdeskClient {
    client: reqwest::Client,
    base_url: String,
    oauth: Arc<OAuthStore>,
    client_id: String,
    client_secret: String,
}

impl HelpdeskClient {
    pub fn new(settings: &TicketingSettings, oauth: Arc<OAuthStore>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.call_timeout_ms))
            .build()
            .expect("helpdesk reqwest client builds with static config");
        Self {
            client,
            base_url: settings.helpdesk_base_url.clone(),
            oauth,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
        }
    }

    /// Refresh the access token if within the expiry margin, persisting the
    /// result atomically before returning it (§4.3 "before every call").
    async fn ensure_token(&self) -> Result<String> {
        let state = self.oauth.load()?.ok_or(TicketingError::NotBootstrapped)?;

        if !state.needs_refresh(Utc::now()) {
            return Ok(state.access_token);
        }

        let refreshed = self.refresh(&state).await?;
        self.oauth.save(&refreshed)?;
        Ok(refreshed.access_token)
    }

    async fn refresh(&self, current: &OAuthState) -> Result<OAuthState> {
        debug!("refreshing helpdesk access token");
        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": current.refresh_token,
            "client_id": self.client_id,
            "client_secret": self.client_secret,
        });

        let resp = self
            .client
            .post(format!("{}/oauth/token", self.base_url))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(body = %text, "helpdesk token refresh failed");
            return Err(TicketingError::AuthExpired);
        }

        let parsed: TokenRefreshResponse = resp
            .json()
            .await
            .map_err(|e| TicketingError::Parse(e.to_string()))?;

        Ok(OAuthState {
            client_id: current.client_id.clone(),
            client_secret: current.client_secret.clone(),
            access_token: parsed.access_token,
            access_token_expires_at: Utc::now() + chrono::Duration::seconds(parsed.expires_in),
            refresh_token: parsed.refresh_token.unwrap_or_else(|| current.refresh_token.clone()),
            organization_id: current.organization_id.clone(),
        })
    }

    /// Issue one authenticated call, retrying once after a forced refresh on
    /// a 401 (§4.3). `build` is invoked again on retry with the new token.
    async fn call<T, F>(&self, build: F) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.ensure_token().await?;
        let resp = build(&self.client, &token).send().await?;

        if resp.status().as_u16() == 401 {
            warn!("helpdesk call returned 401, forcing a refresh and retrying once");
            let state = self.oauth.load()?.ok_or(TicketingError::NotBootstrapped)?;
            let refreshed = self.refresh(&state).await?;
            self.oauth.save(&refreshed)?;
            let resp = build(&self.client, &refreshed.access_token).send().await?;
            return Self::parse_response(resp).await;
        }

        Self::parse_response(resp).await
    }

    async fn parse_response<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TicketingError::Api {
                status: status.as_u16(),
                message,
            });
        }
        resp.json().await.map_err(|e| TicketingError::Parse(e.to_string()))
    }

    /// Like [`Self::call`], but for endpoints whose success body carries no
    /// payload worth deserializing (e.g. adding a ticket note).
    async fn call_ignoring_body<F>(&self, build: F) -> Result<()>
    where
        F: Fn(&reqwest::Client, &str) -> reqwest::RequestBuilder,
    {
        let token = self.ensure_token().await?;
        let resp = build(&self.client, &token).send().await?;

        let resp = if resp.status().as_u16() == 401 {
            warn!("helpdesk call returned 401, forcing a refresh and retrying once");
            let state = self.oauth.load()?.ok_or(TicketingError::NotBootstrapped)?;
            let refreshed = self.refresh(&state).await?;
            self.oauth.save(&refreshed)?;
            build(&self.client, &refreshed.access_token).send().await?
        } else {
            resp
        };

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(TicketingError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    pub async fn search_contact_by_email(&self, email: &str) -> Result<Option<String>> {
        let email = email.to_string();
        let base_url = self.base_url.clone();
        let resp: ContactSearchResponse = self
            .call(move |client, token| {
                client
                    .get(format!("{base_url}/contacts"))
                    .query(&[("email", &email)])
                    .bearer_auth(token)
            })
            .await?;
        Ok(resp.contacts.into_iter().next().map(|c| c.id))
    }

    pub async fn create_contact(&self, display_name: Option<&str>, email: &str) -> Result<String> {
        let body = json!({
            "name": display_name.unwrap_or(email),
            "email": email,
        });
        let base_url = self.base_url.clone();
        let contact: ContactRef = self
            .call(move |client, token| {
                client.post(format!("{base_url}/contacts")).bearer_auth(token).json(&body)
            })
            .await?;
        Ok(contact.id)
    }

    pub async fn create_ticket(&self, req: &CreateTicketRequest) -> Result<TicketRef> {
        let req = req.clone();
        let base_url = self.base_url.clone();
        self.call(move |client, token| {
            client.post(format!("{base_url}/tickets")).bearer_auth(token).json(&req)
        })
        .await
    }

    pub async fn update_ticket(&self, ticket_id: &str, note: &str) -> Result<()> {
        let ticket_id = ticket_id.to_string();
        let note = note.to_string();
        let base_url = self.base_url.clone();
        self.call_ignoring_body(move |client, token| {
            client
                .post(format!("{base_url}/tickets/{ticket_id}/notes"))
                .bearer_auth(token)
                .json(&json!({ "body": note }))
        })
        .await
    }
}
