// Telegram login widget bridge

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{session_error, widget_error, BridgeError, ProviderBridge, WidgetError};
use crate::auth::{AuthResponse, Provider, SessionClient, TelegramProfile};

pub const TELEGRAM_WIDGET_SCRIPT: &str = "https://telegram.org/js/telegram-widget.js?22";
pub const TELEGRAM_BUTTON_SURFACE: &str = "telegramLoginButton";

/// Attributes the widget script is injected with
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramWidgetOptions {
    pub src: String,
    pub bot_username: String,
    pub surface: String,
    pub size: String,
    pub request_access: String,
}

impl TelegramWidgetOptions {
    pub fn new(bot_username: impl Into<String>) -> Self {
        Self {
            src: TELEGRAM_WIDGET_SCRIPT.to_string(),
            bot_username: bot_username.into(),
            surface: TELEGRAM_BUTTON_SURFACE.to_string(),
            size: "large".to_string(),
            request_access: "write".to_string(),
        }
    }

    /// `data-*` attributes of the injected script element
    pub fn data_attributes(&self) -> Vec<(&'static str, String)> {
        vec![
            ("data-telegram-login", self.bot_username.clone()),
            ("data-size", self.size.clone()),
            ("data-request-access", self.request_access.clone()),
        ]
    }
}

/// Capability standing in for the Telegram login widget.
///
/// The auth callback belongs to the capability instance, so each bridge only
/// ever sees the profiles its own widget produced.
#[async_trait]
pub trait TelegramWidget: Send + Sync {
    async fn load_widget(&self, options: &TelegramWidgetOptions) -> Result<(), WidgetError>;

    async fn next_auth(&self) -> Result<TelegramProfile, WidgetError>;

    async fn remove_widget(&self);
}

pub struct TelegramBridge {
    widget: Arc<dyn TelegramWidget>,
    options: TelegramWidgetOptions,
    loaded: Mutex<bool>,
}

impl TelegramBridge {
    pub fn new(widget: Arc<dyn TelegramWidget>, bot_username: impl Into<String>) -> Self {
        Self {
            widget,
            options: TelegramWidgetOptions::new(bot_username),
            loaded: Mutex::new(false),
        }
    }

    pub fn options(&self) -> &TelegramWidgetOptions {
        &self.options
    }
}

#[async_trait]
impl ProviderBridge for TelegramBridge {
    fn provider(&self) -> Provider {
        Provider::Telegram
    }

    async fn prepare(&self) -> Result<(), BridgeError> {
        if self.options.bot_username.trim().is_empty() {
            return Err(BridgeError::NotConfigured(Provider::Telegram));
        }

        let mut loaded = self.loaded.lock().await;
        if !*loaded {
            self.widget
                .load_widget(&self.options)
                .await
                .map_err(widget_error(Provider::Telegram))?;
            *loaded = true;
            tracing::debug!(
                "Telegram widget for @{} rendered into {}",
                self.options.bot_username,
                self.options.surface
            );
        }

        Ok(())
    }

    async fn authenticate(&self, session: &SessionClient) -> Result<AuthResponse, BridgeError> {
        self.prepare().await?;

        let profile = self
            .widget
            .next_auth()
            .await
            .map_err(widget_error(Provider::Telegram))?;

        session
            .login_with_telegram(&profile)
            .await
            .map_err(session_error(Provider::Telegram))
    }

    async fn teardown(&self) {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            self.widget.remove_widget().await;
            *loaded = false;
        }
    }
}
