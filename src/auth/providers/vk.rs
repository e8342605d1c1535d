// VK Open API bridge

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{session_error, widget_error, BridgeError, ProviderBridge, WidgetError};
use crate::auth::{AuthResponse, Provider, SessionClient, VkProfile};

pub const VK_OPENAPI_SCRIPT: &str = "https://vk.com/js/api/openapi.js?169";

/// Response handed to the `VK.Auth.login` callback
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VkLoginResponse {
    #[serde(default)]
    pub session: Option<VkSession>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VkSession {
    pub user: VkUser,
    #[serde(default)]
    pub mid: Option<Value>,
    #[serde(default)]
    pub expire: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VkUser {
    /// Open API reports ids as strings; accept either form
    #[serde(deserialize_with = "deserialize_vk_id")]
    pub id: i64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub photo: String,
}

fn deserialize_vk_id<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("VK user id out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid VK user id: {}", s))),
        other => Err(serde::de::Error::custom(format!(
            "invalid VK user id: {}",
            other
        ))),
    }
}

impl From<&VkUser> for VkProfile {
    fn from(user: &VkUser) -> Self {
        VkProfile {
            uid: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            photo: user.photo.clone(),
        }
    }
}

/// Capability standing in for the global `VK` Open API object
#[async_trait]
pub trait VkOpenApi: Send + Sync {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError>;

    fn init(&self, app_id: &str);

    /// Trigger the login popup and resolve with whatever the callback received
    async fn login(&self) -> Result<VkLoginResponse, WidgetError>;
}

pub struct VkBridge {
    api: Arc<dyn VkOpenApi>,
    app_id: String,
    loaded: Mutex<bool>,
}

impl VkBridge {
    pub fn new(api: Arc<dyn VkOpenApi>, app_id: impl Into<String>) -> Self {
        Self {
            api,
            app_id: app_id.into(),
            loaded: Mutex::new(false),
        }
    }

    async fn ensure_loaded(&self) -> Result<(), BridgeError> {
        let mut loaded = self.loaded.lock().await;
        if !*loaded {
            self.api
                .load_script(VK_OPENAPI_SCRIPT)
                .await
                .map_err(widget_error(Provider::Vk))?;
            self.api.init(&self.app_id);
            *loaded = true;
        }
        Ok(())
    }
}

#[async_trait]
impl ProviderBridge for VkBridge {
    fn provider(&self) -> Provider {
        Provider::Vk
    }

    // Nothing happens on open; the script is loaded when the user asks for VK.

    async fn authenticate(&self, session: &SessionClient) -> Result<AuthResponse, BridgeError> {
        if self.app_id.trim().is_empty() {
            return Err(BridgeError::NotConfigured(Provider::Vk));
        }

        self.ensure_loaded().await?;

        let response = self.api.login().await.map_err(widget_error(Provider::Vk))?;
        let vk_session = match response.session {
            Some(s) => s,
            None => {
                tracing::debug!("VK login returned no session (status {:?})", response.status);
                return Err(BridgeError::Cancelled(Provider::Vk));
            }
        };

        let profile = VkProfile::from(&vk_session.user);
        session
            .login_with_vk(&profile)
            .await
            .map_err(session_error(Provider::Vk))
    }
}
