// Authentication module: session client, token store and provider bridges

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub mod browser;
pub mod dialog;
pub mod providers;
pub mod session;
pub mod store;

pub use dialog::{LoginDialog, LoginOutcome};
pub use session::SessionClient;
pub use store::{FileStore, MemoryStore, TokenStore};

/// Key the session token is persisted under
pub const TOKEN_KEY: &str = "authToken";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Google,
    Telegram,
    Vk,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Google, Provider::Telegram, Provider::Vk];

    /// Value of the `action` query parameter selecting this provider
    pub fn action(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Telegram => "telegram",
            Provider::Vk => "vk",
        }
    }

    pub fn from_action(action: &str) -> Option<Provider> {
        match action.to_lowercase().as_str() {
            "google" => Some(Provider::Google),
            "telegram" => Some(Provider::Telegram),
            "vk" | "vkontakte" => Some(Provider::Vk),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Google => "Google",
            Provider::Telegram => "Telegram",
            Provider::Vk => "VK",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleCredential {
    pub credential: String,
}

/// Profile the Telegram login widget hands back, forwarded as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelegramProfile {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_date: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VkProfile {
    pub uid: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub photo: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{provider} authentication failed (HTTP {status})")]
    AuthenticationFailed { provider: Provider, status: u16 },

    #[error("{provider} authentication request failed: {source}")]
    Network {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} authentication returned an unreadable response: {source}")]
    InvalidResponse {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to persist session token: {0}")]
    Storage(anyhow::Error),
}

impl AuthError {
    pub fn provider(&self) -> Option<Provider> {
        match self {
            AuthError::AuthenticationFailed { provider, .. }
            | AuthError::Network { provider, .. }
            | AuthError::InvalidResponse { provider, .. } => Some(*provider),
            AuthError::Storage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_actions() {
        for provider in Provider::ALL {
            assert_eq!(Provider::from_action(provider.action()), Some(provider));
        }
        assert_eq!(Provider::from_action("VK"), Some(Provider::Vk));
        assert_eq!(Provider::from_action("verify"), None);
        assert_eq!(Provider::Vk.to_string(), "VK");
    }

    #[test]
    fn test_telegram_profile_keeps_unknown_fields() {
        let raw = json!({
            "id": 42,
            "first_name": "Ivan",
            "auth_date": 1700000000,
            "hash": "abc",
            "allows_write_to_pm": true
        });

        let profile: TelegramProfile = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.first_name.as_deref(), Some("Ivan"));
        assert_eq!(profile.extra.get("allows_write_to_pm"), Some(&json!(true)));

        // Round trip must not invent fields the widget never sent
        assert_eq!(serde_json::to_value(&profile).unwrap(), raw);
    }

    #[test]
    fn test_telegram_profile_without_hash_stays_without_hash() {
        let raw = json!({"id": 42, "first_name": "Ivan"});

        let profile: TelegramProfile = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(profile.hash, None);
        assert_eq!(serde_json::to_value(&profile).unwrap(), raw);
    }

    #[test]
    fn test_user_tolerates_missing_optional_fields() {
        let user: User = serde_json::from_value(json!({"id": 3, "name": "C"})).unwrap();
        assert_eq!(user.email, "");
        assert_eq!(user.avatar, "");
    }
}
