// Provider identity checks: Telegram login signature and Google ID token payload

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Claims read from the payload segment of a Google ID token
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleClaims {
    pub sub: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
}

/// Decode the claims of a Google ID token. The signature is not checked.
pub fn decode_google_credential(credential: &str) -> Result<GoogleClaims> {
    let payload = credential
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("credential is not a JWT"))?;

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('='))?;
    let claims = serde_json::from_slice(&bytes)?;
    Ok(claims)
}

/// Text of a JSON value as it enters the data-check string
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Every field but `hash` as `key=value`, sorted by key, newline separated
pub fn data_check_string(data: &Map<String, Value>) -> String {
    let mut pairs: Vec<(&String, &Value)> = data.iter().filter(|(k, _)| *k != "hash").collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));

    pairs
        .into_iter()
        .map(|(k, v)| format!("{}={}", k, value_text(v)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn telegram_mac(data: &Map<String, Value>, bot_token: &str) -> Result<HmacSha256> {
    let secret = Sha256::digest(bot_token.as_bytes());
    let mut mac = HmacSha256::new_from_slice(&secret).map_err(|e| anyhow!("{}", e))?;
    mac.update(data_check_string(data).as_bytes());
    Ok(mac)
}

/// Hex signature Telegram attaches to login data for this bot
pub fn sign_telegram_data(data: &Map<String, Value>, bot_token: &str) -> Result<String> {
    let mac = telegram_mac(data, bot_token)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_telegram_auth(data: &Map<String, Value>, bot_token: &str) -> bool {
    let Some(hash) = data.get("hash").and_then(Value::as_str) else {
        return false;
    };
    let Ok(expected) = hex::decode(hash) else {
        return false;
    };

    match telegram_mac(data, bot_token) {
        Ok(mac) => mac.verify_slice(&expected).is_ok(),
        Err(_) => false,
    }
}

pub fn display_name(first: Option<&Value>, last: Option<&Value>) -> String {
    let part = |v: Option<&Value>| {
        v.filter(|v| !v.is_null())
            .map(value_text)
            .unwrap_or_default()
    };
    format!("{} {}", part(first), part(last)).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_google_payload_decodes_without_padding() {
        let payload = URL_SAFE_NO_PAD.encode(
            json!({"sub": "109", "email": "a@x.com", "name": "A", "picture": "p.png"}).to_string(),
        );
        let claims = decode_google_credential(&format!("header.{}.sig", payload)).unwrap();

        assert_eq!(claims.sub, "109");
        assert_eq!(claims.email, "a@x.com");
        assert_eq!(claims.picture, "p.png");

        let padded = format!("h.{}==.s", payload);
        assert_eq!(decode_google_credential(&padded).unwrap().sub, "109");
    }

    #[test]
    fn test_google_rejects_garbage() {
        assert!(decode_google_credential("no-dots").is_err());
        assert!(decode_google_credential("abc.def.ghi").is_err());

        let missing_sub = URL_SAFE_NO_PAD.encode(r#"{"email":"a@x.com"}"#);
        assert!(decode_google_credential(&format!("h.{}.s", missing_sub)).is_err());
    }

    #[test]
    fn test_data_check_string_is_sorted_and_skips_hash() {
        let data = object(json!({
            "username": "bob",
            "id": 42,
            "hash": "ff",
            "auth_date": 1700000000,
            "first_name": "Bob"
        }));

        assert_eq!(
            data_check_string(&data),
            "auth_date=1700000000\nfirst_name=Bob\nid=42\nusername=bob"
        );
    }

    #[test]
    fn test_telegram_signature_round_trip() {
        let mut data = object(json!({"id": 42, "first_name": "Bob", "auth_date": 1700000000}));
        let hash = sign_telegram_data(&data, "123:abc").unwrap();
        assert_eq!(hash.len(), 64);

        data.insert("hash".to_string(), Value::String(hash.clone()));
        assert!(verify_telegram_auth(&data, "123:abc"));
        assert!(!verify_telegram_auth(&data, "other-token"));

        data.insert("first_name".to_string(), json!("Mallory"));
        assert!(!verify_telegram_auth(&data, "123:abc"));
    }

    #[test]
    fn test_telegram_missing_or_malformed_hash() {
        let mut data = object(json!({"id": 42}));
        assert!(!verify_telegram_auth(&data, "123:abc"));

        data.insert("hash".to_string(), json!("not hex"));
        assert!(!verify_telegram_auth(&data, "123:abc"));
    }

    #[test]
    fn test_display_name_trims_missing_parts() {
        assert_eq!(display_name(Some(&json!("B")), Some(&json!("C"))), "B C");
        assert_eq!(display_name(Some(&json!("B")), None), "B");
        assert_eq!(display_name(None, Some(&Value::Null)), "");
    }
}
