// SQLite storage for users and sessions of the auth service

use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use parking_lot::Mutex;
use rand::Rng;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::User;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
    pub auth_provider: String,
    pub provider_user_id: String,
    pub created_at: i64,
    pub last_login: i64,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            id: record.id,
            name: record.name,
            email: record.email,
            avatar: record.avatar_url,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_token: String,
    pub user_id: i64,
    pub expires_at: i64,
}

/// Identity asserted by a provider, as the upsert needs it
#[derive(Debug, Clone, Default)]
pub struct ProviderIdentity {
    pub provider: String,
    pub provider_user_id: String,
    pub email: String,
    pub name: String,
    pub avatar_url: String,
}

const USER_COLUMNS: &str =
    "id, email, name, avatar_url, auth_provider, provider_user_id, created_at, last_login";

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::init(conn, &format!("{:?}", path))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, ":memory:")
    }

    fn init(conn: Connection, label: &str) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                avatar_url TEXT NOT NULL DEFAULT '',
                auth_provider TEXT NOT NULL,
                provider_user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_login INTEGER NOT NULL,
                UNIQUE (auth_provider, provider_user_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS user_sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                session_token TEXT NOT NULL UNIQUE,
                expires_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_user_sessions_token ON user_sessions(session_token)",
            [],
        )?;

        tracing::info!("SQLite database initialized at {}", label);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Find the user for this provider identity, creating it on first login.
    /// A returning user gets name, avatar and last login refreshed.
    pub fn get_or_create_user(&self, identity: &ProviderIdentity) -> Result<UserRecord> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE auth_provider = ?1 AND provider_user_id = ?2",
                rusqlite::params![identity.provider, identity.provider_user_id],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                conn.execute(
                    "UPDATE users SET last_login = ?1, name = ?2, avatar_url = ?3 WHERE id = ?4",
                    rusqlite::params![now, identity.name, identity.avatar_url, id],
                )?;
                tracing::debug!("Returning {} user {}", identity.provider, id);
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO users (email, name, avatar_url, auth_provider, provider_user_id, created_at, last_login)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    rusqlite::params![
                        identity.email,
                        identity.name,
                        identity.avatar_url,
                        identity.provider,
                        identity.provider_user_id,
                        now
                    ],
                )?;
                let id = conn.last_insert_rowid();
                tracing::info!("Created {} user {}", identity.provider, id);
                id
            }
        };

        let user = conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            [id],
            read_user,
        )?;
        Ok(user)
    }

    pub fn create_session(&self, user_id: i64, ttl: chrono::Duration) -> Result<SessionRecord> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now();
        let token = generate_session_token();
        let expires_at = (now + ttl).timestamp();

        conn.execute(
            "INSERT INTO user_sessions (user_id, session_token, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![user_id, token, expires_at, now.timestamp()],
        )?;

        Ok(SessionRecord {
            session_token: token,
            user_id,
            expires_at,
        })
    }

    /// User owning an unexpired session with this token
    pub fn verify_session(&self, token: &str) -> Result<Option<UserRecord>> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();

        let user = conn
            .query_row(
                "SELECT u.id, u.email, u.name, u.avatar_url, u.auth_provider, u.provider_user_id, u.created_at, u.last_login
                 FROM users u
                 JOIN user_sessions s ON u.id = s.user_id
                 WHERE s.session_token = ?1 AND s.expires_at > ?2",
                rusqlite::params![token, now],
                read_user,
            )
            .optional()?;

        Ok(user)
    }
}

fn read_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        avatar_url: row.get(3)?,
        auth_provider: row.get(4)?,
        provider_user_id: row.get(5)?,
        created_at: row.get(6)?,
        last_login: row.get(7)?,
    })
}

/// 32 random bytes, URL-safe base64 without padding
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(provider: &str, id: &str, name: &str) -> ProviderIdentity {
        ProviderIdentity {
            provider: provider.to_string(),
            provider_user_id: id.to_string(),
            email: format!("{}@example.com", id),
            name: name.to_string(),
            avatar_url: String::new(),
        }
    }

    #[test]
    fn test_user_is_created_once_per_provider_identity() {
        let db = Database::open_in_memory().unwrap();

        let first = db.get_or_create_user(&identity("vk", "5", "B C")).unwrap();
        let again = db.get_or_create_user(&identity("vk", "5", "B Renamed")).unwrap();
        let other = db.get_or_create_user(&identity("telegram", "5", "T")).unwrap();

        assert_eq!(first.id, again.id);
        assert_eq!(again.name, "B Renamed");
        assert_eq!(again.email, "5@example.com");
        assert_ne!(first.id, other.id);
    }

    #[test]
    fn test_session_verification() {
        let db = Database::open_in_memory().unwrap();
        let user = db.get_or_create_user(&identity("google", "sub-1", "A")).unwrap();

        let session = db.create_session(user.id, chrono::Duration::days(30)).unwrap();
        let found = db.verify_session(&session.session_token).unwrap().unwrap();
        assert_eq!(found.id, user.id);

        assert_eq!(db.verify_session("not-a-token").unwrap(), None);

        let expired = db.create_session(user.id, chrono::Duration::seconds(-1)).unwrap();
        assert_eq!(db.verify_session(&expired.session_token).unwrap(), None);
    }

    #[test]
    fn test_session_tokens_are_url_safe_and_distinct() {
        let a = generate_session_token();
        let b = generate_session_token();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_database_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("auth.db");

        {
            let db = Database::open(&path).unwrap();
            db.get_or_create_user(&identity("vk", "1", "X")).unwrap();
        }

        let db = Database::open(&path).unwrap();
        let user = db.get_or_create_user(&identity("vk", "1", "X")).unwrap();
        assert_eq!(user.id, 1);
    }
}
