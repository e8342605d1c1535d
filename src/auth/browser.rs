// Loopback widget host
//
// A desktop process has no DOM to inject provider scripts into. This host serves
// one small page per provider on 127.0.0.1, opens it in the system browser and
// receives the widget callback payload back through a local POST.

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use super::providers::{
    ButtonOptions, GoogleIdentity, TelegramWidget, TelegramWidgetOptions, VkLoginResponse,
    VkOpenApi, WidgetError,
};
use super::{Provider, TelegramProfile};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{{TITLE}}</title>
    <style>
        body { font-family: system-ui, sans-serif; display: flex; justify-content: center; align-items: center; height: 100vh; margin: 0; background: #f5f5f5; }
        .container { text-align: center; padding: 2rem; background: white; border-radius: 8px; box-shadow: 0 2px 10px rgba(0,0,0,0.1); }
    </style>
    <script>
        function post(provider, payload) {
            fetch('/callback/' + provider, {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                body: JSON.stringify(payload)
            }).then(function () {
                document.getElementById('root').innerHTML = '<h1>Done</h1><p>You can close this window.</p>';
            });
        }
    </script>
</head>
<body>
    <div class="container" id="root">
        <h1>{{TITLE}}</h1>
        {{BODY}}
    </div>
</body>
</html>
"#;

const GOOGLE_BODY: &str = r#"<div id="{{SURFACE}}"></div>
        <script src="{{SRC}}" async defer onload="startGoogle()"></script>
        <script>
            function startGoogle() {
                google.accounts.id.initialize({
                    client_id: {{CLIENT_ID}},
                    callback: function (response) { post('google', { credential: response.credential }); }
                });
                google.accounts.id.renderButton(document.getElementById({{SURFACE_JS}}), {{BUTTON}});
            }
        </script>"#;

const TELEGRAM_BODY: &str = r#"<div id="{{SURFACE}}">
            <script async src="{{SRC}}" {{ATTRIBUTES}} data-onauth="onTelegramAuth(user)"></script>
        </div>
        <script>
            function onTelegramAuth(user) { post('telegram', user); }
        </script>"#;

const VK_BODY: &str = r#"<button id="vkLogin" disabled>Sign in with VK</button>
        <script src="{{SRC}}" onload="startVk()"></script>
        <script>
            function startVk() {
                VK.init({ apiId: {{APP_ID}} });
                var button = document.getElementById('vkLogin');
                button.disabled = false;
                button.onclick = function () {
                    VK.Auth.login(function (response) {
                        post('vk', { session: response.session || null, status: response.status || null });
                    });
                };
            }
        </script>"#;

#[derive(Default)]
struct Mailboxes {
    waiting: HashMap<Provider, oneshot::Sender<Value>>,
    queued: HashMap<Provider, VecDeque<Value>>,
}

#[derive(Default)]
struct HostShared {
    pages: RwLock<HashMap<Provider, String>>,
    mail: Mutex<Mailboxes>,
    google_script: RwLock<String>,
    google_client_id: RwLock<String>,
    vk_script: RwLock<String>,
    vk_app_id: RwLock<String>,
}

impl HostShared {
    fn has_page(&self, provider: Provider) -> bool {
        self.pages.read().contains_key(&provider)
    }

    /// Forget pending waiters and queued payloads; a waiter sees `Closed`
    fn clear_mail(&self, provider: Provider) {
        let mut mail = self.mail.lock();
        mail.waiting.remove(&provider);
        mail.queued.remove(&provider);
    }

    fn deliver(&self, provider: Provider, payload: Value) {
        let mut mail = self.mail.lock();
        let payload = match mail.waiting.remove(&provider) {
            Some(tx) => match tx.send(payload) {
                Ok(()) => return,
                // Waiter gave up; keep the payload for the next one
                Err(payload) => payload,
            },
            None => payload,
        };
        mail.queued.entry(provider).or_default().push_back(payload);
    }
}

struct RunningHost {
    addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
}

/// Serves provider widgets on a loopback port and collects their callbacks
pub struct BrowserHost {
    port: u16,
    timeout: Duration,
    open_browser: bool,
    shared: Arc<HostShared>,
    running: Mutex<Option<RunningHost>>,
    starting: tokio::sync::Mutex<()>,
}

impl Default for BrowserHost {
    fn default() -> Self {
        Self::new(0)
    }
}

impl BrowserHost {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            timeout: DEFAULT_TIMEOUT,
            open_browser: true,
            shared: Arc::new(HostShared::default()),
            running: Mutex::new(None),
            starting: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_open_browser(mut self, open_browser: bool) -> Self {
        self.open_browser = open_browser;
        self
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.running.lock().as_ref().map(|r| r.addr)
    }

    pub fn page_url(&self, provider: Provider) -> Option<String> {
        self.addr()
            .map(|addr| format!("http://{}/{}", addr, provider.action()))
    }

    pub fn shutdown(&self) {
        if let Some(running) = self.running.lock().take() {
            let _ = running.shutdown_tx.send(());
            tracing::info!("Widget host on {} stopped", running.addr);
        }
    }

    async fn ensure_server(&self) -> Result<SocketAddr, WidgetError> {
        if let Some(addr) = self.addr() {
            return Ok(addr);
        }

        // One bind at a time, so a fixed port is never bound twice
        let _starting = self.starting.lock().await;
        if let Some(addr) = self.addr() {
            return Ok(addr);
        }

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| {
                WidgetError::Host(format!("failed to bind port {}: {}", self.port, e))
            })?;
        let addr = listener
            .local_addr()
            .map_err(|e| WidgetError::Host(e.to_string()))?;

        let app = Router::new()
            .route("/:provider", get(serve_page))
            .route("/callback/:provider", post(receive_callback))
            .with_state(self.shared.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .ok();
        });

        *self.running.lock() = Some(RunningHost { addr, shutdown_tx });

        tracing::info!("Widget host listening on {}", addr);
        Ok(addr)
    }

    fn set_page(&self, provider: Provider, title: &str, body: String) {
        let page = PAGE_HTML.replace("{{TITLE}}", title).replace("{{BODY}}", &body);
        self.shared.pages.write().insert(provider, page);
    }

    fn remove_page(&self, provider: Provider) {
        self.shared.pages.write().remove(&provider);
        self.shared.clear_mail(provider);
    }

    fn show(&self, provider: Provider) {
        let Some(url) = self.page_url(provider) else {
            return;
        };

        if !self.open_browser {
            tracing::info!("{} sign-in page ready at {}", provider, url);
            return;
        }

        if let Err(e) = open::that(&url) {
            tracing::warn!("Failed to open browser ({}), open {} manually", e, url);
        }
    }

    async fn wait_for(&self, provider: Provider) -> Result<Value, WidgetError> {
        let rx = {
            let mut mail = self.shared.mail.lock();
            if let Some(payload) = mail.queued.get_mut(&provider).and_then(|q| q.pop_front()) {
                return Ok(payload);
            }
            let (tx, rx) = oneshot::channel();
            mail.waiting.insert(provider, tx);
            rx
        };

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(WidgetError::Closed),
            Err(_) => {
                self.shared.mail.lock().waiting.remove(&provider);
                Err(WidgetError::Timeout)
            }
        }
    }
}

impl Drop for BrowserHost {
    fn drop(&mut self) {
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown_tx.send(());
        }
    }
}

async fn serve_page(
    State(shared): State<Arc<HostShared>>,
    Path(provider): Path<String>,
) -> impl IntoResponse {
    let page = Provider::from_action(&provider)
        .and_then(|provider| shared.pages.read().get(&provider).cloned());

    match page {
        Some(page) => Html(page).into_response(),
        None => (StatusCode::NOT_FOUND, "No sign-in pending").into_response(),
    }
}

async fn receive_callback(
    State(shared): State<Arc<HostShared>>,
    Path(provider): Path<String>,
    Json(payload): Json<Value>,
) -> impl IntoResponse {
    match Provider::from_action(&provider) {
        Some(provider) if shared.has_page(provider) => {
            tracing::debug!("Received {} widget callback", provider);
            shared.deliver(provider, payload);
            (StatusCode::OK, Json(json!({ "ok": true })))
        }
        Some(provider) => {
            tracing::debug!("Dropped {} widget callback with no sign-in pending", provider);
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "No sign-in pending" })),
            )
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Unknown provider" })),
        ),
    }
}

/// JSON string literal that is safe inside a `<script>` element
fn js_string(value: &str) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "\"\"".to_string())
        .replace("</", "<\\/")
}

fn attr_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn payload_error(e: serde_json::Error) -> WidgetError {
    WidgetError::Payload(e.to_string())
}

#[async_trait]
impl GoogleIdentity for BrowserHost {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError> {
        self.ensure_server().await?;
        *self.shared.google_script.write() = src.to_string();
        Ok(())
    }

    fn initialize(&self, client_id: &str) {
        *self.shared.google_client_id.write() = client_id.to_string();
    }

    async fn render_button(
        &self,
        surface: &str,
        options: &ButtonOptions,
    ) -> Result<(), WidgetError> {
        let src = self.shared.google_script.read().clone();
        if src.is_empty() {
            return Err(WidgetError::NotLoaded);
        }
        let client_id = self.shared.google_client_id.read().clone();
        let button = serde_json::to_string(options).map_err(payload_error)?;

        let body = GOOGLE_BODY
            .replace("{{SURFACE_JS}}", &js_string(surface))
            .replace("{{SURFACE}}", &attr_escape(surface))
            .replace("{{SRC}}", &attr_escape(&src))
            .replace("{{CLIENT_ID}}", &js_string(&client_id))
            .replace("{{BUTTON}}", &button);
        self.set_page(Provider::Google, "Sign in with Google", body);
        self.show(Provider::Google);
        Ok(())
    }

    async fn next_credential(&self) -> Result<String, WidgetError> {
        let payload = self.wait_for(Provider::Google).await?;
        payload
            .get("credential")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| WidgetError::Payload("credential missing".to_string()))
    }

    async fn remove_script(&self) {
        self.remove_page(Provider::Google);
        self.shared.google_script.write().clear();
    }
}

#[async_trait]
impl TelegramWidget for BrowserHost {
    async fn load_widget(&self, options: &TelegramWidgetOptions) -> Result<(), WidgetError> {
        self.ensure_server().await?;

        let attributes = options
            .data_attributes()
            .into_iter()
            .map(|(name, value)| format!("{}=\"{}\"", name, attr_escape(&value)))
            .collect::<Vec<_>>()
            .join(" ");

        let body = TELEGRAM_BODY
            .replace("{{SURFACE}}", &attr_escape(&options.surface))
            .replace("{{SRC}}", &attr_escape(&options.src))
            .replace("{{ATTRIBUTES}}", &attributes);
        self.set_page(Provider::Telegram, "Sign in with Telegram", body);
        self.show(Provider::Telegram);
        Ok(())
    }

    async fn next_auth(&self) -> Result<TelegramProfile, WidgetError> {
        let payload = self.wait_for(Provider::Telegram).await?;
        serde_json::from_value(payload).map_err(payload_error)
    }

    async fn remove_widget(&self) {
        self.remove_page(Provider::Telegram);
    }
}

#[async_trait]
impl VkOpenApi for BrowserHost {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError> {
        self.ensure_server().await?;
        *self.shared.vk_script.write() = src.to_string();
        Ok(())
    }

    fn init(&self, app_id: &str) {
        *self.shared.vk_app_id.write() = app_id.to_string();
    }

    async fn login(&self) -> Result<VkLoginResponse, WidgetError> {
        let src = self.shared.vk_script.read().clone();
        if src.is_empty() {
            return Err(WidgetError::NotLoaded);
        }
        let app_id = self.shared.vk_app_id.read().clone();

        let body = VK_BODY
            .replace("{{SRC}}", &attr_escape(&src))
            .replace("{{APP_ID}}", &js_string(&app_id));
        self.set_page(Provider::Vk, "Sign in with VK", body);
        self.show(Provider::Vk);

        let payload = self.wait_for(Provider::Vk).await?;
        serde_json::from_value(payload).map_err(payload_error)
    }
}
