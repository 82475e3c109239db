//! Durable account records.
//!
//! `AccountStore` is the contract the flows program against; `PgAccountStore`
//! backs it with Postgres. Uniqueness of username and email is enforced by
//! the store's unique constraints, not by the flows: their lookups before a
//! write are advisory fast-fail checks only, and concurrent writers are
//! decided here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::{info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Role {
    User,
    Admin,
    Moderator,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Admin => "Admin",
            Self::Moderator => "Moderator",
        }
    }

    // The role column carries a CHECK constraint, anything else is legacy data.
    fn from_db(value: &str) -> Self {
        match value {
            "Admin" => Self::Admin,
            "Moderator" => Self::Moderator,
            _ => Self::User,
        }
    }
}

/// A stored account. The password hash is only populated by
/// `find_credentials_by_username_or_email` and is never serialized.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    pub role: Role,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new account; everything else is store-assigned.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Lookup by username or email, whichever is provided. No password hash.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError>;

    /// Same lookup, but including the password hash. Authentication only.
    async fn find_credentials_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a new, unverified account. Unique-constraint violations come
    /// back as `StoreError::Conflict`.
    async fn create(&self, fields: NewAccount) -> Result<Account, StoreError>;

    /// Persist username/email/password/role changes. A `None` password keeps
    /// the stored hash. Unique-constraint violations come back as
    /// `StoreError::Conflict`.
    async fn save(&self, account: &Account) -> Result<Account, StoreError>;

    /// Flip the verification flag, touching nothing else.
    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError>;
}

const ACCOUNT_COLUMNS: &str = "id, username, email, role, is_verified, created_at, updated_at";

pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_account(row: &sqlx::postgres::PgRow, with_password: bool) -> Account {
    let role: String = row.get("role");

    Account {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password: if with_password {
            Some(row.get("password"))
        } else {
            None
        },
        role: Role::from_db(&role),
        is_verified: row.get("is_verified"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn conflict(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict("Username or Email already exists!".to_string())
        }
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1 OR email = $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| row_to_account(&row, false)))
    }

    async fn find_credentials_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<Account>, StoreError> {
        let query = format!(
            "SELECT {ACCOUNT_COLUMNS}, password FROM accounts WHERE username = $1 OR email = $2"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| row_to_account(&row, true)))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| row_to_account(&row, false)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| row_to_account(&row, false)))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| row_to_account(&row, false)))
    }

    async fn create(&self, fields: NewAccount) -> Result<Account, StoreError> {
        let query = format!(
            "INSERT INTO accounts (username, email, password) VALUES ($1, $2, $3) \
             RETURNING {ACCOUNT_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(&fields.username)
            .bind(&fields.email)
            .bind(&fields.password)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(conflict)?;

        Ok(row_to_account(&row, false))
    }

    async fn save(&self, account: &Account) -> Result<Account, StoreError> {
        let query = format!(
            "UPDATE accounts SET username = $2, email = $3, \
             password = COALESCE($4, password), role = $5, is_verified = $6, \
             updated_at = now() WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = %query
        );

        let row = sqlx::query(&query)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.email)
            .bind(account.password.as_deref())
            .bind(account.role.as_str())
            .bind(account.is_verified)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .map_err(conflict)?;

        Ok(row_to_account(&row, false))
    }

    async fn mark_verified(&self, id: Uuid) -> Result<(), StoreError> {
        let query = "UPDATE accounts SET is_verified = TRUE, updated_at = now() WHERE id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );

        sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::memory::MemoryAccountStore;
    use super::*;
    use std::sync::Arc;

    fn new_account(username: &str, email: &str) -> NewAccount {
        NewAccount {
            username: username.to_string(),
            email: email.to_string(),
            password: "$2b$10$hash".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let store = MemoryAccountStore::new();

        let account = store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");

        assert_eq!(account.role, Role::User);
        assert!(!account.is_verified);
        assert!(account.password.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryAccountStore::new();

        store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");
        let err = store
            .create(new_account("alice", "other@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let store = MemoryAccountStore::new();

        store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");
        let err = store
            .create(new_account("bob", "alice@x.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_credentials_lookup_is_the_only_read_with_password() {
        let store = MemoryAccountStore::new();
        store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");

        let plain = store
            .find_by_username_or_email(Some("alice"), None)
            .await
            .expect("find")
            .expect("account");
        assert!(plain.password.is_none());

        let credentials = store
            .find_credentials_by_username_or_email(None, Some("alice@x.com"))
            .await
            .expect("find")
            .expect("account");
        assert_eq!(credentials.password.as_deref(), Some("$2b$10$hash"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_only_one_survives() {
        let store = Arc::new(MemoryAccountStore::new());

        // Both writers race for the same username; the store constraint,
        // not the flows' advisory pre-check, decides the winner.
        let first = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create(new_account("alice", "alice@x.com")).await })
        };
        let second = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create(new_account("alice", "alice@y.com")).await })
        };

        let (first, second) = (first.await.expect("join"), second.await.expect("join"));
        assert_eq!(
            u8::from(first.is_ok()) + u8::from(second.is_ok()),
            1,
            "exactly one concurrent create must win"
        );
    }

    #[tokio::test]
    async fn test_save_keeps_password_when_none() {
        let store = MemoryAccountStore::new();
        let account = store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");

        let mut updated = account.clone();
        updated.username = "alice2".to_string();
        store.save(&updated).await.expect("save");

        let credentials = store
            .find_credentials_by_username_or_email(Some("alice2"), None)
            .await
            .expect("find")
            .expect("account");
        assert_eq!(credentials.password.as_deref(), Some("$2b$10$hash"));
    }

    #[tokio::test]
    async fn test_mark_verified_touches_only_the_flag() {
        let store = MemoryAccountStore::new();
        let account = store
            .create(new_account("alice", "alice@x.com"))
            .await
            .expect("create");

        store.mark_verified(account.id).await.expect("verify");

        let stored = store
            .find_by_id(account.id)
            .await
            .expect("find")
            .expect("account");
        assert!(stored.is_verified);
        assert_eq!(stored.username, "alice");
    }

    #[test]
    fn test_password_is_never_serialized() {
        let account = Account {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            password: Some("$2b$10$hash".to_string()),
            role: Role::User,
            is_verified: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_value(&account).expect("serialize");
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "User");
        assert_eq!(json["isVerified"], false);
    }
}
