// Google Identity Services bridge

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{session_error, widget_error, BridgeError, ButtonOptions, ProviderBridge, WidgetError};
use crate::auth::{AuthResponse, Provider, SessionClient};

pub const GSI_CLIENT_SCRIPT: &str = "https://accounts.google.com/gsi/client";
pub const GOOGLE_BUTTON_SURFACE: &str = "googleSignInButton";

/// Capability standing in for the `google.accounts.id` SDK namespace
#[async_trait]
pub trait GoogleIdentity: Send + Sync {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError>;

    fn initialize(&self, client_id: &str);

    async fn render_button(&self, surface: &str, options: &ButtonOptions)
        -> Result<(), WidgetError>;

    /// Resolves with the identity token the next time the SDK callback fires
    async fn next_credential(&self) -> Result<String, WidgetError>;

    async fn remove_script(&self);
}

pub struct GoogleBridge {
    sdk: Arc<dyn GoogleIdentity>,
    client_id: String,
    surface: String,
    button: ButtonOptions,
    loaded: Mutex<bool>,
}

impl GoogleBridge {
    pub fn new(sdk: Arc<dyn GoogleIdentity>, client_id: impl Into<String>) -> Self {
        Self {
            sdk,
            client_id: client_id.into(),
            surface: GOOGLE_BUTTON_SURFACE.to_string(),
            button: ButtonOptions::default(),
            loaded: Mutex::new(false),
        }
    }
}

#[async_trait]
impl ProviderBridge for GoogleBridge {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn prepare(&self) -> Result<(), BridgeError> {
        if self.client_id.trim().is_empty() {
            return Err(BridgeError::NotConfigured(Provider::Google));
        }

        let mut loaded = self.loaded.lock().await;
        if *loaded {
            return Ok(());
        }

        let to_bridge = widget_error(Provider::Google);
        self.sdk.load_script(GSI_CLIENT_SCRIPT).await.map_err(&to_bridge)?;
        self.sdk.initialize(&self.client_id);
        self.sdk
            .render_button(&self.surface, &self.button)
            .await
            .map_err(&to_bridge)?;

        *loaded = true;
        tracing::debug!("Google sign-in button rendered into {}", self.surface);
        Ok(())
    }

    async fn authenticate(&self, session: &SessionClient) -> Result<AuthResponse, BridgeError> {
        self.prepare().await?;

        let credential = self
            .sdk
            .next_credential()
            .await
            .map_err(widget_error(Provider::Google))?;

        session
            .login_with_google(&credential)
            .await
            .map_err(session_error(Provider::Google))
    }

    async fn teardown(&self) {
        let mut loaded = self.loaded.lock().await;
        if *loaded {
            self.sdk.remove_script().await;
            *loaded = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::providers::fakes::{auth_ok, memory_session, FakeGoogle};
    use mockito::Matcher;

    #[tokio::test]
    async fn test_credential_is_exchanged() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_query(Matcher::UrlEncoded("action".into(), "google".into()))
            .match_body(Matcher::Json(serde_json::json!({"credential": "abc.def.ghi"})))
            .with_status(200)
            .with_body(auth_ok(1, "tok1"))
            .create_async()
            .await;

        let sdk = Arc::new(FakeGoogle::with_credential("abc.def.ghi"));
        let bridge = GoogleBridge::new(sdk.clone(), "client-123");
        let session = memory_session(&server.url());

        let data = bridge.authenticate(&session).await.unwrap();

        mock.assert_async().await;
        assert_eq!(data.user.id, 1);
        assert_eq!(session.get_token().as_deref(), Some("tok1"));
        assert_eq!(sdk.loaded_scripts(), vec![GSI_CLIENT_SCRIPT.to_string()]);
        assert_eq!(sdk.client_id().as_deref(), Some("client-123"));
        assert_eq!(sdk.surface().as_deref(), Some(GOOGLE_BUTTON_SURFACE));
    }

    #[tokio::test]
    async fn test_script_injected_once_and_removed_on_teardown() {
        let sdk = Arc::new(FakeGoogle::default());
        let bridge = GoogleBridge::new(sdk.clone(), "client-123");

        bridge.prepare().await.unwrap();
        bridge.prepare().await.unwrap();
        assert_eq!(sdk.loaded_scripts().len(), 1);

        bridge.teardown().await;
        bridge.teardown().await;
        assert_eq!(sdk.removed(), 1);

        bridge.prepare().await.unwrap();
        assert_eq!(sdk.loaded_scripts().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_client_id_touches_nothing() {
        let sdk = Arc::new(FakeGoogle::with_credential("abc.def.ghi"));
        let bridge = GoogleBridge::new(sdk.clone(), "  ");
        let session = memory_session("http://127.0.0.1:1");

        let err = bridge.authenticate(&session).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotConfigured(Provider::Google)));
        assert!(sdk.loaded_scripts().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_exchange_maps_to_session_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_query(Matcher::Any)
            .with_status(403)
            .create_async()
            .await;

        let sdk = Arc::new(FakeGoogle::with_credential("abc.def.ghi"));
        let bridge = GoogleBridge::new(sdk, "client-123");
        let session = memory_session(&server.url());

        let err = bridge.authenticate(&session).await.unwrap_err();
        assert!(matches!(err, BridgeError::Session { provider: Provider::Google, .. }));
        assert_eq!(err.user_message().as_deref(), Some("Google sign-in failed"));
        assert_eq!(session.get_token(), None);
    }
}
