//! Time-boxed session snapshots with lazy expiry.
//!
//! A session is a client-local cache of the administrator's identity and
//! permission set, written once at login with an absolute expiry. All reads
//! go through [`SessionStore::current`], the single place where the
//! `Expired -> Empty` transition happens; call sites never check expiry
//! themselves.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use super::permissions::{Permission, PermissionSet};
use crate::directory::admins::Administrator;

/// Storage key for the admin session snapshot. Deliberately distinct from
/// any customer-facing session key so the two never collide.
pub const ADMIN_SESSION_KEY: &str = "custodia_admin_session";

/// Default absolute session lifetime: 24 hours, not sliding.
pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 24 * 60 * 60;

/// Key/value seam under the session store. The server keeps an in-process
/// map; each browser context owns an independent, namespaced key.
pub trait SessionBackend: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, value: String);
    fn remove(&self, key: &str);
}

/// In-process backend. Single writer per key; no cross-context sharing.
#[derive(Debug, Default)]
pub struct MemorySessionBackend {
    entries: RwLock<HashMap<String, String>>,
}

impl MemorySessionBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionBackend for MemorySessionBackend {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: String) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.to_string(), value);
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }
}

/// Persisted snapshot, serialized exactly as the dashboard stores it.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub session_expiry: DateTime<Utc>,
}

/// A live session: the snapshot plus the permission table frozen at login
/// time. Role changes after login do not alter an issued session; the
/// staleness window closes at the next login.
#[derive(Debug, Clone)]
pub struct Session {
    snapshot: SessionSnapshot,
    permissions: &'static PermissionSet,
}

impl Session {
    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let permissions = PermissionSet::for_role_name(&snapshot.role);
        Self {
            snapshot,
            permissions,
        }
    }

    #[must_use]
    pub fn admin_id(&self) -> Uuid {
        self.snapshot.id
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.snapshot.email
    }

    #[must_use]
    pub fn role_name(&self) -> &str {
        &self.snapshot.role
    }

    #[must_use]
    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions.allows(permission)
    }

    #[must_use]
    pub fn permissions(&self) -> &'static PermissionSet {
        self.permissions
    }

    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.snapshot.session_expiry
    }

    #[must_use]
    pub fn snapshot(&self) -> &SessionSnapshot {
        &self.snapshot
    }
}

/// Observed state of the stored snapshot.
#[derive(Debug)]
pub enum SessionState {
    Empty,
    Valid(Session),
    Expired,
}

/// Handle over one browser context's session slot.
#[derive(Clone)]
pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    key: String,
    ttl_seconds: i64,
}

impl SessionStore {
    #[must_use]
    pub fn new(backend: Arc<dyn SessionBackend>, ttl_seconds: i64) -> Self {
        Self {
            backend,
            key: ADMIN_SESSION_KEY.to_string(),
            ttl_seconds,
        }
    }

    /// Store namespaced to one browser context. `context` is an opaque
    /// discriminator (the server uses a hashed session token).
    #[must_use]
    pub fn scoped(backend: Arc<dyn SessionBackend>, ttl_seconds: i64, context: &str) -> Self {
        Self {
            backend,
            key: format!("{ADMIN_SESSION_KEY}:{context}"),
            ttl_seconds,
        }
    }

    fn token_key(&self) -> String {
        format!("{}.verifier", self.key)
    }

    /// Persist a snapshot for `admin` with an absolute expiry computed now.
    ///
    /// The verifier access token is stored beside the snapshot (never inside
    /// it) so logout can invalidate the upstream session.
    pub fn save(&self, admin: &Administrator, verifier_token: &str) -> Session {
        let snapshot = SessionSnapshot {
            id: admin.id,
            email: admin.email.clone(),
            first_name: admin.first_name.clone(),
            last_name: admin.last_name.clone(),
            role: admin.role.clone(),
            is_active: admin.is_active,
            last_login_at: admin.last_login_at,
            created_at: admin.created_at,
            session_expiry: Utc::now() + Duration::seconds(self.ttl_seconds),
        };
        if let Ok(json) = serde_json::to_string(&snapshot) {
            self.backend.put(&self.key, json);
            self.backend.put(&self.token_key(), verifier_token.to_string());
        }
        Session::from_snapshot(snapshot)
    }

    /// The single accessor. Returns the session only while the snapshot is
    /// active and unexpired; otherwise clears the slot and reports absence.
    #[must_use]
    pub fn current(&self) -> Option<Session> {
        match self.state() {
            SessionState::Valid(session) => Some(session),
            SessionState::Expired => {
                self.clear();
                None
            }
            SessionState::Empty => None,
        }
    }

    /// Raw verifier token for the stored session, if any. Used only to sign
    /// the principal out upstream during logout.
    #[must_use]
    pub fn verifier_token(&self) -> Option<String> {
        self.backend.get(&self.token_key())
    }

    /// Remove the stored snapshot unconditionally.
    pub fn clear(&self) {
        self.backend.remove(&self.key);
        self.backend.remove(&self.token_key());
    }

    fn state(&self) -> SessionState {
        let Some(raw) = self.backend.get(&self.key) else {
            return SessionState::Empty;
        };
        let Ok(snapshot) = serde_json::from_str::<SessionSnapshot>(&raw) else {
            // Unreadable snapshots are treated the same as expired ones.
            return SessionState::Expired;
        };
        if !snapshot.is_active || Utc::now() >= snapshot.session_expiry {
            return SessionState::Expired;
        }
        SessionState::Valid(Session::from_snapshot(snapshot))
    }
}
