mod call_flow;
mod config;
mod db_types;
mod error;
mod handlers;
mod store;
mod twilio_types;
mod types;
mod utils;

use crate::config::Settings;
use crate::error::handle_error;
use crate::store::{CallStore, MemoryStore, PgStore};
use crate::types::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;

pub mod consts {
    pub const RING_PATH: &str = "/twilio/voice";
    pub const MENU_SELECTION_PATH: &str = "/twilio/voice/handle";
    pub const DIAL_OUTCOME_PATH: &str = "/twilio/voice/dial-action";
    pub const VOICEMAIL_PATH: &str = "/twilio/voice/voicemail";

    pub const MENU_GREETING: &str =
        "Thank you for calling. Press 1 to reach our team. Press 2 to leave a voicemail.";
    pub const NO_INPUT_MESSAGE: &str = "We did not receive any input.";
    pub const INVALID_INPUT_MESSAGE: &str = "We did not understand your selection.";
    pub const FORWARDING_UNAVAILABLE_MESSAGE: &str =
        "We are unable to transfer your call at the moment. Please try again later or leave a voicemail.";
    pub const CONNECTING_MESSAGE: &str =
        "Connecting you to the next available team member. Please hold.";
    pub const VOICEMAIL_PROMPT: &str =
        "Please leave a message after the tone. Press the pound key when you are done.";
    pub const DIAL_FAILED_MESSAGE: &str =
        "We could not connect your call. Please leave a voicemail after the tone.";
    pub const NO_RECORDING_MESSAGE: &str = "We did not receive a recording. Goodbye.";
    pub const GOODBYE_MESSAGE: &str = "Thank you for calling. Goodbye.";
    pub const VOICEMAIL_THANKS_MESSAGE: &str =
        "Thank you. Your voicemail has been recorded. Goodbye.";

    pub const SAY_VOICE: &str = "alice";
    pub const SAY_LANGUAGE: &str = "en-US";
    pub const GATHER_TIMEOUT_SECS: u16 = 5;
    pub const DIAL_TIMEOUT_SECS: u16 = 20;
    pub const RECORD_MAX_LENGTH_SECS: u16 = 120;
    pub const RECORD_FINISH_ON_KEY: &str = "#";
}

pub fn app(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route(consts::RING_PATH, post(handlers::voice))
        .route(consts::MENU_SELECTION_PATH, post(handlers::voice_handle))
        .route(consts::DIAL_OUTCOME_PATH, post(handlers::dial_action))
        .route(consts::VOICEMAIL_PATH, post(handlers::voicemail))
        .route("/calls", get(handlers::list_calls))
        .route("/health", get(handlers::health))
        .with_state(app_state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        handle_error(e).await;
    }
    info!("shutting down");
}

#[tokio::main]
async fn main() {
    let settings = Settings::from_env();
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_file(true)
                .with_line_number(true),
        )
        .with(tracing_subscriber::filter::Targets::new().with_targets([
            ("hyper", tracing_subscriber::filter::LevelFilter::OFF),
            ("twilio_ivr", settings.log_level),
        ]));
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let store: Arc<dyn CallStore> = match &settings.database_url {
        Some(url) => Arc::new(
            PgStore::connect(url)
                .await
                .expect("failed to open Postgres call store"),
        ),
        None => {
            warn!("DATABASE_URL not set; call records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    if settings.flow.forward_to.is_none() {
        warn!("TWILIO_FORWARD_TO_NUMBER not set; option 1 will report forwarding unavailable");
    }

    let app_state = Arc::new(AppState {
        flow: settings.flow,
        store,
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!(%addr, "listening");
    if let Err(e) = axum::Server::bind(&addr)
        .serve(app(app_state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        handle_error(e).await;
    }
}
