// CLI command handlers

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::browser::BrowserHost;
use crate::auth::providers::{GoogleBridge, TelegramBridge, VkBridge};
use crate::auth::{FileStore, LoginDialog, LoginOutcome, Provider, SessionClient, User};
use crate::config::AppConfig;

/// Session client persisting its token in the data directory
pub fn session_client(config: &AppConfig) -> SessionClient {
    let store = FileStore::new(config.session_file());
    SessionClient::new(config.auth_endpoint.clone(), Arc::new(store))
}

pub fn widget_host(config: &AppConfig) -> Arc<BrowserHost> {
    Arc::new(
        BrowserHost::new(config.widget_port)
            .with_timeout(Duration::from_secs(config.widget_timeout_secs)),
    )
}

/// Login dialog with a bridge for each of `providers`, all rendered through `host`
pub fn login_dialog<F>(
    config: &AppConfig,
    host: Arc<BrowserHost>,
    providers: &[Provider],
    on_auth_success: F,
) -> LoginDialog
where
    F: Fn(&User) + Send + Sync + 'static,
{
    let mut dialog = LoginDialog::new(session_client(config), on_auth_success);

    for provider in providers {
        dialog = match provider {
            Provider::Google => dialog.with_bridge(Arc::new(GoogleBridge::new(
                host.clone(),
                config.google_client_id.clone(),
            ))),
            Provider::Telegram => dialog.with_bridge(Arc::new(TelegramBridge::new(
                host.clone(),
                config.telegram_bot_username.clone(),
            ))),
            Provider::Vk => dialog.with_bridge(Arc::new(VkBridge::new(
                host.clone(),
                config.vk_app_id.clone(),
            ))),
        };
    }

    dialog
}

/// Run the auth service until Ctrl-C
pub async fn serve(config: &AppConfig) -> Result<()> {
    tokio::select! {
        result = crate::api::start_server(config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down auth server...");
            crate::api::stop_server().await
        }
    }
}

pub async fn login(config: &AppConfig, provider: Provider) -> Result<User> {
    let host = widget_host(config);
    let dialog = login_dialog(config, host.clone(), &[provider], |user| {
        tracing::info!("Signed in as {} (id {})", user.name, user.id);
    });

    dialog.open().await;
    if let Some(message) = dialog.state().error {
        dialog.close().await;
        host.shutdown();
        return Err(anyhow!(message));
    }

    let outcome = dialog.login(provider).await;
    dialog.close().await;
    host.shutdown();

    match outcome {
        LoginOutcome::SignedIn(user) => Ok(user),
        LoginOutcome::Failed(message) => Err(anyhow!(message)),
        LoginOutcome::Cancelled => Err(anyhow!("{} sign-in was cancelled", provider)),
    }
}

/// User behind the stored token, `None` when there is no valid session
pub async fn verify(config: &AppConfig) -> Option<User> {
    let session = session_client(config);
    let token = session.get_token()?;
    session.verify_session(&token).await
}

pub fn logout(config: &AppConfig) {
    session_client(config).logout();
}

pub fn token(config: &AppConfig) -> Option<String> {
    session_client(config).get_token()
}
