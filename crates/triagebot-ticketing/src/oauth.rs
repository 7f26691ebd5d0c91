//! Persisted OAuth2 state for the helpdesk (§3, §4.3).
//!
//! Grounded on the teacher's `skynet-sessions::manager::SessionManager`: a
//! single SQLite connection behind a `Mutex`, with `init_db` creating the
//! table on every startup. Unlike sessions this table holds exactly one row
//! — there is one helpdesk credential per deployment.

use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use triagebot_core::types::OAuthState;

use crate::error::{Result, TicketingError};

pub struct OAuthStore {
    db: Mutex<Connection>,
}

impl OAuthStore {
    /// Open (creating if necessary) the SQLite file at `path` and ensure the
    /// table exists.
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Load the single persisted OAuth row, if the operator has ever
    /// completed the one-shot bootstrap exchange (§4.3).
    pub fn load(&self) -> Result<Option<OAuthState>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT client_id, client_secret, access_token, access_token_expires_at,
                    refresh_token, organization_id
             FROM oauth_state WHERE id = 1",
            [],
            row_to_state,
        ) {
            Ok(state) => Ok(Some(state)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TicketingError::Database(e)),
        }
    }

    /// Persist (upsert) the current OAuth state. Called after every refresh
    /// so a crash never loses a freshly minted access token.
    pub fn save(&self, state: &OAuthState) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO oauth_state
                (id, client_id, client_secret, access_token, access_token_expires_at,
                 refresh_token, organization_id)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                client_id = excluded.client_id,
                client_secret = excluded.client_secret,
                access_token = excluded.access_token,
                access_token_expires_at = excluded.access_token_expires_at,
                refresh_token = excluded.refresh_token,
                organization_id = excluded.organization_id",
            rusqlite::params![
                state.client_id,
                state.client_secret,
                state.access_token,
                state.access_token_expires_at.to_rfc3339(),
                state.refresh_token,
                state.organization_id,
            ],
        )?;
        debug!("persisted refreshed oauth state");
        Ok(())
    }

    /// Bootstrap a brand-new row (operator has completed the one-shot
    /// browser code exchange out of band and handed us the resulting
    /// tokens). A no-op if a row already exists.
    pub fn bootstrap_if_absent(&self, state: &OAuthState) -> Result<()> {
        if self.load()?.is_some() {
            return Ok(());
        }
        info!("bootstrapping initial oauth state from operator-provided tokens");
        self.save(state)
    }
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS oauth_state (
            id                       INTEGER PRIMARY KEY CHECK (id = 1),
            client_id                TEXT NOT NULL,
            client_secret             TEXT NOT NULL,
            access_token              TEXT NOT NULL,
            access_token_expires_at   TEXT NOT NULL,
            refresh_token             TEXT NOT NULL,
            organization_id           TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn row_to_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<OAuthState> {
    let expires_raw: String = row.get(3)?;
    let access_token_expires_at = chrono::DateTime::parse_from_rfc3339(&expires_raw)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|_| chrono::Utc::now());

    Ok(OAuthState {
        client_id: row.get(0)?,
        client_secret: row.get(1)?,
        access_token: row.get(2)?,
        access_token_expires_at,
        refresh_token: row.get(4)?,
        organization_id: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_state() -> OAuthState {
        OAuthState {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            access_token: "at-1".to_string(),
            access_token_expires_at: Utc::now() + chrono::Duration::seconds(3600),
            refresh_token: "rt-1".to_string(),
            organization_id: "org-1".to_string(),
        }
    }

    #[test]
    fn load_returns_none_before_bootstrap() {
        let store = OAuthStore::open(":memory:").unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = OAuthStore::open(":memory:").unwrap();
        let state = sample_state();
        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "at-1");
        assert_eq!(loaded.refresh_token, "rt-1");
    }

    #[test]
    fn save_upserts_single_row() {
        let store = OAuthStore::open(":memory:").unwrap();
        let mut state = sample_state();
        store.save(&state).unwrap();
        state.access_token = "at-2".to_string();
        store.save(&state).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "at-2");
    }

    #[test]
    fn bootstrap_if_absent_is_idempotent() {
        let store = OAuthStore::open(":memory:").unwrap();
        let state = sample_state();
        store.bootstrap_if_absent(&state).unwrap();
        let mut other = sample_state();
        other.access_token = "should-not-apply".to_string();
        store.bootstrap_if_absent(&other).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.access_token, "at-1");
    }
}
