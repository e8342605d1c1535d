// Session client for the remote authentication endpoint

use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use super::{
    AuthError, AuthResponse, GoogleCredential, Provider, TelegramProfile, TokenStore, User,
    VkProfile, TOKEN_KEY,
};

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: User,
}

/// Exchanges provider credentials for a session token and keeps that token in a store.
///
/// Every call goes to one endpoint; the `action` query parameter selects the verb.
#[derive(Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    endpoint: String,
    store: Arc<dyn TokenStore>,
}

impl SessionClient {
    pub fn new(endpoint: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        Self::with_http_client(reqwest::Client::new(), endpoint, store)
    }

    pub fn with_http_client(
        http: reqwest::Client,
        endpoint: impl Into<String>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            store,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn login_with_google(&self, credential: &str) -> Result<AuthResponse, AuthError> {
        let body = GoogleCredential {
            credential: credential.to_string(),
        };
        self.login(Provider::Google, &body).await
    }

    pub async fn login_with_telegram(
        &self,
        profile: &TelegramProfile,
    ) -> Result<AuthResponse, AuthError> {
        self.login(Provider::Telegram, profile).await
    }

    pub async fn login_with_vk(&self, profile: &VkProfile) -> Result<AuthResponse, AuthError> {
        self.login(Provider::Vk, profile).await
    }

    /// Look up the user behind `token`. Any failure reads as "no session".
    pub async fn verify_session(&self, token: &str) -> Option<User> {
        let response = match self.post("verify", &json!({ "token": token })).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("Session verification request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!("Session rejected with status {}", response.status());
            return None;
        }

        match response.json::<VerifyResponse>().await {
            Ok(data) => Some(data.user),
            Err(e) => {
                tracing::debug!("Unreadable verification response: {}", e);
                None
            }
        }
    }

    pub fn logout(&self) {
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            tracing::warn!("Failed to clear session token: {}", e);
        }
    }

    pub fn get_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    async fn login<B>(&self, provider: Provider, body: &B) -> Result<AuthResponse, AuthError>
    where
        B: Serialize + ?Sized,
    {
        tracing::debug!("Sending {} credential to {}", provider, self.endpoint);

        let response = self
            .post(provider.action(), body)
            .await
            .map_err(|source| AuthError::Network { provider, source })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!("{} authentication rejected with status {}", provider, status);
            return Err(AuthError::AuthenticationFailed {
                provider,
                status: status.as_u16(),
            });
        }

        let data: AuthResponse = response
            .json()
            .await
            .map_err(|source| AuthError::InvalidResponse { provider, source })?;

        self.store
            .set(TOKEN_KEY, &data.token)
            .map_err(AuthError::Storage)?;

        tracing::info!("{} login succeeded for user {}", provider, data.user.id);
        Ok(data)
    }

    async fn post<B>(&self, action: &str, body: &B) -> reqwest::Result<Response>
    where
        B: Serialize + ?Sized,
    {
        self.http
            .post(&self.endpoint)
            .query(&[("action", action)])
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
    }
}
