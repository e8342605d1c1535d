// Auth service request handlers

use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::identity::{self, display_name, value_text};
use super::AppState;
use crate::auth::{Provider, User};
use crate::db::ProviderIdentity;

#[derive(Debug, Default, Deserialize)]
pub struct ActionQuery {
    #[serde(default)]
    pub action: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "Not found")
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Auth request failed: {}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

/// Single entry point; `?action=` picks the operation
pub async fn auth(
    State(state): State<AppState>,
    method: Method,
    Query(query): Query<ActionQuery>,
    body: String,
) -> Response {
    if method != Method::POST {
        return ApiError::not_found().into_response();
    }

    tracing::debug!("Auth request: action={}", query.action);

    let result = match query.action.as_str() {
        "google" => google_login(&state, &body),
        "telegram" => telegram_login(&state, &body),
        "vk" => vk_login(&state, &body),
        "verify" => verify(&state, &body),
        _ => Err(ApiError::not_found()),
    };

    match result {
        Ok(json) => json.into_response(),
        Err(e) => e.into_response(),
    }
}

fn parse_body(body: &str) -> Result<Map<String, Value>, ApiError> {
    if body.trim().is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::new(StatusCode::BAD_REQUEST, "Request body must be a JSON object")),
        Err(e) => Err(ApiError::new(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e))),
    }
}

fn text_field(body: &Map<String, Value>, key: &str) -> String {
    body.get(key)
        .filter(|v| !v.is_null())
        .map(value_text)
        .unwrap_or_default()
}

/// Upsert the user and open a session for it
fn sign_in(state: &AppState, identity: ProviderIdentity) -> ApiResult {
    let user = state.db.get_or_create_user(&identity)?;
    let session = state.db.create_session(user.id, state.session_ttl)?;

    tracing::info!("{} user {} signed in", identity.provider, user.id);

    let user: User = user.into();
    Ok(Json(json!({ "user": user, "token": session.session_token })))
}

fn google_login(state: &AppState, body: &str) -> ApiResult {
    let body = parse_body(body)?;
    let credential = text_field(&body, "credential");
    if credential.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Google credential required"));
    }

    let claims = identity::decode_google_credential(&credential).map_err(|e| {
        tracing::debug!("Undecodable Google credential: {}", e);
        ApiError::new(StatusCode::BAD_REQUEST, "Invalid Google credential")
    })?;

    sign_in(
        state,
        ProviderIdentity {
            provider: Provider::Google.action().to_string(),
            provider_user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            avatar_url: claims.picture,
        },
    )
}

fn telegram_login(state: &AppState, body: &str) -> ApiResult {
    let body = parse_body(body)?;
    if state.telegram_bot_token.is_empty() {
        return Err(ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Telegram bot token not configured",
        ));
    }

    if !identity::verify_telegram_auth(&body, &state.telegram_bot_token) {
        tracing::warn!("Rejected Telegram login with a bad signature");
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid Telegram auth data"));
    }

    let id = text_field(&body, "id");
    if id.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Telegram id required"));
    }

    sign_in(
        state,
        ProviderIdentity {
            provider: Provider::Telegram.action().to_string(),
            provider_user_id: id,
            email: text_field(&body, "username"),
            name: display_name(body.get("first_name"), body.get("last_name")),
            avatar_url: text_field(&body, "photo_url"),
        },
    )
}

fn vk_login(state: &AppState, body: &str) -> ApiResult {
    let body = parse_body(body)?;
    let uid = text_field(&body, "uid");
    if uid.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "VK uid required"));
    }

    sign_in(
        state,
        ProviderIdentity {
            provider: Provider::Vk.action().to_string(),
            provider_user_id: uid,
            email: String::new(),
            name: display_name(body.get("first_name"), body.get("last_name")),
            avatar_url: text_field(&body, "photo"),
        },
    )
}

fn verify(state: &AppState, body: &str) -> ApiResult {
    let body = parse_body(body)?;
    let token = text_field(&body, "token");
    if token.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Token required"));
    }

    match state.db.verify_session(&token)? {
        Some(user) => {
            let user: User = user.into();
            Ok(Json(json!({ "user": user })))
        }
        None => Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid or expired session")),
    }
}
