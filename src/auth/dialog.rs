// Login surface hosting the provider bridges

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::providers::{BridgeError, ProviderBridge};
use super::{Provider, SessionClient, User};

pub type AuthSuccessCallback = Arc<dyn Fn(&User) + Send + Sync>;

#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    SignedIn(User),
    Failed(String),
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DialogState {
    pub open: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// Holds the bridges, the visible state and the success callback of the login surface.
///
/// Failures never leave this type: every path ends in an inline message or nothing.
pub struct LoginDialog {
    session: SessionClient,
    bridges: HashMap<Provider, Arc<dyn ProviderBridge>>,
    on_auth_success: AuthSuccessCallback,
    state: Mutex<DialogState>,
}

impl LoginDialog {
    pub fn new<F>(session: SessionClient, on_auth_success: F) -> Self
    where
        F: Fn(&User) + Send + Sync + 'static,
    {
        Self {
            session,
            bridges: HashMap::new(),
            on_auth_success: Arc::new(on_auth_success),
            state: Mutex::new(DialogState::default()),
        }
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn ProviderBridge>) -> Self {
        self.bridges.insert(bridge.provider(), bridge);
        self
    }

    pub fn session(&self) -> &SessionClient {
        &self.session
    }

    pub fn state(&self) -> DialogState {
        self.state.lock().clone()
    }

    /// Open the surface and let every bridge render its widget
    pub async fn open(&self) {
        {
            let mut state = self.state.lock();
            state.open = true;
            state.error = None;
        }

        for provider in Provider::ALL {
            let Some(bridge) = self.bridges.get(&provider) else {
                continue;
            };
            if let Err(e) = bridge.prepare().await {
                tracing::warn!("Failed to prepare {} sign-in: {}", provider, e);
                self.show_error(&e);
            }
        }
    }

    pub async fn close(&self) {
        for bridge in self.bridges.values() {
            bridge.teardown().await;
        }

        let mut state = self.state.lock();
        state.open = false;
        state.loading = false;
    }

    pub async fn login(&self, provider: Provider) -> LoginOutcome {
        let bridge = match self.bridges.get(&provider) {
            Some(bridge) => bridge.clone(),
            None => {
                let err = BridgeError::NotConfigured(provider);
                self.show_error(&err);
                return LoginOutcome::Failed(err.user_message().unwrap_or_default());
            }
        };

        {
            let mut state = self.state.lock();
            state.loading = true;
            state.error = None;
        }

        let result = bridge.authenticate(&self.session).await;
        self.state.lock().loading = false;

        match result {
            Ok(data) => {
                (self.on_auth_success)(&data.user);
                self.close().await;
                LoginOutcome::SignedIn(data.user)
            }
            Err(e) => {
                tracing::warn!("{} sign-in did not complete: {}", provider, e);
                match self.show_error(&e) {
                    Some(message) => LoginOutcome::Failed(message),
                    None => LoginOutcome::Cancelled,
                }
            }
        }
    }

    /// Check the stored token against the service
    pub async fn restore_session(&self) -> Option<User> {
        let token = self.session.get_token()?;
        self.session.verify_session(&token).await
    }

    fn show_error(&self, err: &BridgeError) -> Option<String> {
        let message = err.user_message()?;
        self.state.lock().error = Some(message.clone());
        Some(message)
    }
}
