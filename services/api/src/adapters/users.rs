//! services/api/src/adapters/users.rs
//!
//! The user store: accounts with argon2 password hashes, plus login sessions
//! kept in a keyed map with a TTL. Accounts are snapshotted through the same
//! `SnapshotSink` as the review store; login sessions live in memory only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use review_core::domain::{AuthSession, Role, User, UserCredentials};
use review_core::ports::{PortError, PortResult, SnapshotSink, UserService};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

pub const USERS_KEY: &str = "users";

#[derive(Clone, Serialize, Deserialize)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    display_name: String,
    role: Role,
    hashed_password: String,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(&self) -> User {
        User {
            user_id: self.user_id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct UserBook {
    users: HashMap<Uuid, UserRecord>,
}

impl UserBook {
    fn by_email(&self, email: &str) -> Option<&UserRecord> {
        self.users.values().find(|u| u.email == email)
    }
}

pub struct InMemoryUserStore {
    users: RwLock<UserBook>,
    auth_sessions: Mutex<HashMap<String, AuthSession>>,
    sink: Arc<dyn SnapshotSink>,
}

impl InMemoryUserStore {
    /// Restores accounts from the sink's last `users` snapshot.
    pub async fn open(sink: Arc<dyn SnapshotSink>) -> PortResult<Self> {
        let book: UserBook = match sink.load(USERS_KEY).await? {
            Some(value) => serde_json::from_value(value)?,
            None => UserBook::default(),
        };
        info!("User store opened with {} accounts", book.users.len());

        Ok(Self {
            users: RwLock::new(book),
            auth_sessions: Mutex::new(HashMap::new()),
            sink,
        })
    }

    /// Persists while still holding the write guard, so account snapshots
    /// can never be written out of order.
    async fn persist(&self, book: &UserBook) -> PortResult<()> {
        let snapshot = serde_json::to_value(book)?;
        self.sink.persist(USERS_KEY, snapshot).await
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl UserService for InMemoryUserStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        display_name: &str,
        role: Role,
    ) -> PortResult<User> {
        let email = normalize_email(email);
        let display_name = display_name.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(PortError::Validation("a valid email is required".to_string()));
        }
        if display_name.is_empty() {
            return Err(PortError::Validation("display name is required".to_string()));
        }

        let mut book = self.users.write().await;
        if book.by_email(&email).is_some() {
            return Err(PortError::Validation(format!(
                "an account already exists for {}",
                email
            )));
        }

        let record = UserRecord {
            user_id: Uuid::new_v4(),
            email,
            display_name: display_name.to_string(),
            role,
            hashed_password: hashed_password.to_string(),
            created_at: Utc::now(),
        };
        let user = record.to_domain();
        book.users.insert(record.user_id, record);
        self.persist(&book).await?;

        info!("Created {:?} account {}", role, user.user_id);
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let email = normalize_email(email);
        let book = self.users.read().await;
        let record = book
            .by_email(&email)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", email)))?;

        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email.clone(),
            hashed_password: record.hashed_password.clone(),
        })
    }

    async fn get_user(&self, user_id: Uuid) -> PortResult<User> {
        self.users
            .read()
            .await
            .users
            .get(&user_id)
            .map(UserRecord::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("User {} not found", user_id)))
    }

    async fn list_users(&self) -> PortResult<Vec<User>> {
        let book = self.users.read().await;
        let mut users: Vec<User> = book.users.values().map(UserRecord::to_domain).collect();
        users.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.user_id.cmp(&b.user_id)));
        Ok(users)
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.auth_sessions.lock().await.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let now = Utc::now();
        let mut sessions = self.auth_sessions.lock().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions
            .get(session_id)
            .map(|s| s.user_id)
            .ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.auth_sessions.lock().await.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_store::JsonFileSink;
    use chrono::Duration;

    async fn store_in(dir: &std::path::Path) -> InMemoryUserStore {
        let sink = Arc::new(JsonFileSink::new(dir).await.unwrap());
        InMemoryUserStore::open(sink).await.unwrap()
    }

    #[tokio::test]
    async fn accounts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let created = {
            let store = store_in(dir.path()).await;
            store
                .create_user_with_email(" Ann@Example.com ", "hash", "Ann", Role::Reviewer)
                .await
                .unwrap()
        };

        let store = store_in(dir.path()).await;
        let creds = store.get_user_by_email("ann@example.com").await.unwrap();
        assert_eq!(creds.user_id, created.user_id);
        assert_eq!(store.get_user(created.user_id).await.unwrap().display_name, "Ann");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        store
            .create_user_with_email("ann@example.com", "hash", "Ann", Role::Reviewer)
            .await
            .unwrap();

        let again = store
            .create_user_with_email("ANN@example.com", "hash", "Ann 2", Role::Reviewer)
            .await;
        assert!(matches!(again, Err(PortError::Validation(_))));
    }

    #[tokio::test]
    async fn expired_auth_sessions_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(dir.path()).await;
        let user_id = Uuid::new_v4();

        store
            .create_auth_session("live", user_id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        store
            .create_auth_session("stale", user_id, Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        assert_eq!(store.validate_auth_session("live").await.unwrap(), user_id);
        assert!(matches!(
            store.validate_auth_session("stale").await,
            Err(PortError::Unauthorized)
        ));

        store.delete_auth_session("live").await.unwrap();
        assert!(store.validate_auth_session("live").await.is_err());
    }
}
