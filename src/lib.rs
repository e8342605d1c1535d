// Hotel booking sign-in: session client, provider bridges and auth service

pub mod api;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global tracing subscriber; filtering follows `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
