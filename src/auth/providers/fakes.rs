// In-memory SDK capabilities for bridge and dialog tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::{
    ButtonOptions, GoogleIdentity, TelegramWidget, TelegramWidgetOptions, VkLoginResponse,
    VkOpenApi, WidgetError,
};
use crate::auth::{MemoryStore, SessionClient, TelegramProfile};

pub fn memory_session(endpoint: &str) -> SessionClient {
    SessionClient::new(endpoint, Arc::new(MemoryStore::new()))
}

pub fn auth_ok(id: i64, token: &str) -> String {
    serde_json::json!({
        "user": {"id": id, "name": "Test User", "email": "test@example.com", "avatar": ""},
        "token": token
    })
    .to_string()
}

#[derive(Default)]
pub struct FakeGoogle {
    credentials: Mutex<VecDeque<String>>,
    scripts: Mutex<Vec<String>>,
    client_id: Mutex<Option<String>>,
    surface: Mutex<Option<String>>,
    removed: Mutex<usize>,
}

impl FakeGoogle {
    pub fn with_credential(credential: &str) -> Self {
        let fake = Self::default();
        fake.credentials.lock().push_back(credential.to_string());
        fake
    }

    pub fn loaded_scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    pub fn client_id(&self) -> Option<String> {
        self.client_id.lock().clone()
    }

    pub fn surface(&self) -> Option<String> {
        self.surface.lock().clone()
    }

    pub fn removed(&self) -> usize {
        *self.removed.lock()
    }
}

#[async_trait]
impl GoogleIdentity for FakeGoogle {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError> {
        self.scripts.lock().push(src.to_string());
        Ok(())
    }

    fn initialize(&self, client_id: &str) {
        *self.client_id.lock() = Some(client_id.to_string());
    }

    async fn render_button(
        &self,
        surface: &str,
        _options: &ButtonOptions,
    ) -> Result<(), WidgetError> {
        *self.surface.lock() = Some(surface.to_string());
        Ok(())
    }

    async fn next_credential(&self) -> Result<String, WidgetError> {
        self.credentials.lock().pop_front().ok_or(WidgetError::Closed)
    }

    async fn remove_script(&self) {
        *self.removed.lock() += 1;
    }
}

#[derive(Default)]
pub struct FakeTelegram {
    profiles: Mutex<VecDeque<TelegramProfile>>,
    loaded: Mutex<Vec<TelegramWidgetOptions>>,
    removed: Mutex<usize>,
}

impl FakeTelegram {
    pub fn with_profile(profile: TelegramProfile) -> Self {
        let fake = Self::default();
        fake.profiles.lock().push_back(profile);
        fake
    }

    pub fn loaded(&self) -> Vec<TelegramWidgetOptions> {
        self.loaded.lock().clone()
    }

    pub fn removed(&self) -> usize {
        *self.removed.lock()
    }
}

#[async_trait]
impl TelegramWidget for FakeTelegram {
    async fn load_widget(&self, options: &TelegramWidgetOptions) -> Result<(), WidgetError> {
        self.loaded.lock().push(options.clone());
        Ok(())
    }

    async fn next_auth(&self) -> Result<TelegramProfile, WidgetError> {
        self.profiles.lock().pop_front().ok_or(WidgetError::Closed)
    }

    async fn remove_widget(&self) {
        *self.removed.lock() += 1;
    }
}

#[derive(Default)]
pub struct FakeVk {
    response: Mutex<Option<VkLoginResponse>>,
    scripts: Mutex<Vec<String>>,
    app_id: Mutex<Option<String>>,
}

impl FakeVk {
    pub fn with_response(response: VkLoginResponse) -> Self {
        let fake = Self::default();
        *fake.response.lock() = Some(response);
        fake
    }

    pub fn loaded_scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }

    pub fn app_id(&self) -> Option<String> {
        self.app_id.lock().clone()
    }
}

#[async_trait]
impl VkOpenApi for FakeVk {
    async fn load_script(&self, src: &str) -> Result<(), WidgetError> {
        self.scripts.lock().push(src.to_string());
        Ok(())
    }

    fn init(&self, app_id: &str) {
        *self.app_id.lock() = Some(app_id.to_string());
    }

    async fn login(&self) -> Result<VkLoginResponse, WidgetError> {
        self.response.lock().clone().ok_or(WidgetError::Closed)
    }
}
