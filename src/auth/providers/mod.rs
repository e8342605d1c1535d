// Provider bridges: turn a third-party identity widget into a session login

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{AuthError, AuthResponse, Provider, SessionClient};

pub mod google;
pub mod telegram;
pub mod vk;

#[cfg(test)]
pub(crate) mod fakes;

pub use google::{GoogleBridge, GoogleIdentity};
pub use telegram::{TelegramBridge, TelegramWidget, TelegramWidgetOptions};
pub use vk::{VkBridge, VkLoginResponse, VkOpenApi, VkSession, VkUser};

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    #[error("failed to load script {src}: {reason}")]
    ScriptLoad { src: String, reason: String },

    #[error("widget is not loaded")]
    NotLoaded,

    #[error("timed out waiting for the widget callback")]
    Timeout,

    #[error("widget callback channel closed")]
    Closed,

    #[error("malformed widget payload: {0}")]
    Payload(String),

    #[error("widget host failed: {0}")]
    Host(String),
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("{0} sign-in is not configured")]
    NotConfigured(Provider),

    #[error("{0} sign-in was cancelled")]
    Cancelled(Provider),

    #[error("{provider} widget failed: {source}")]
    Widget {
        provider: Provider,
        #[source]
        source: WidgetError,
    },

    #[error("{provider} session exchange failed: {source}")]
    Session {
        provider: Provider,
        #[source]
        source: AuthError,
    },
}

impl BridgeError {
    pub fn provider(&self) -> Provider {
        match self {
            BridgeError::NotConfigured(provider) | BridgeError::Cancelled(provider) => *provider,
            BridgeError::Widget { provider, .. } | BridgeError::Session { provider, .. } => {
                *provider
            }
        }
    }

    /// Inline message for the login surface; `None` when there is nothing to show
    pub fn user_message(&self) -> Option<String> {
        match self {
            BridgeError::NotConfigured(provider) => {
                Some(format!("{} sign-in is not configured", provider))
            }
            BridgeError::Cancelled(_) => None,
            BridgeError::Widget { provider, .. } | BridgeError::Session { provider, .. } => {
                Some(format!("{} sign-in failed", provider))
            }
        }
    }
}

/// Options for the rendered Google sign-in button
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonOptions {
    pub theme: String,
    pub size: String,
    pub width: u32,
}

impl Default for ButtonOptions {
    fn default() -> Self {
        Self {
            theme: "outline".to_string(),
            size: "large".to_string(),
            width: 350,
        }
    }
}

/// Adapter between one identity provider's widget and the session client.
///
/// A bridge only obtains the provider credential; token persistence stays in
/// [`SessionClient`].
#[async_trait]
pub trait ProviderBridge: Send + Sync {
    fn provider(&self) -> Provider;

    /// Work done when the hosting surface opens (script injection, widget rendering)
    async fn prepare(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    /// Obtain a credential from the widget and exchange it for a session
    async fn authenticate(&self, session: &SessionClient) -> Result<AuthResponse, BridgeError>;

    async fn teardown(&self) {}
}

pub(crate) fn widget_error(provider: Provider) -> impl Fn(WidgetError) -> BridgeError {
    move |source| BridgeError::Widget { provider, source }
}

pub(crate) fn session_error(provider: Provider) -> impl Fn(AuthError) -> BridgeError {
    move |source| BridgeError::Session { provider, source }
}
