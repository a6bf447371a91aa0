use crate::call_flow::FlowConfig;

use std::env;
use tracing_subscriber::filter::LevelFilter;

pub const DEFAULT_PORT: u16 = 3000;

pub struct Settings {
    pub port: u16,
    pub flow: FlowConfig,
    /// Postgres connection string; the in-memory store is used when unset.
    pub database_url: Option<String>,
    pub log_level: LevelFilter,
}

impl Settings {
    /// Read settings from the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = get("PORT")
            .and_then(|port| port.trim().parse::<u16>().ok())
            .filter(|port| *port > 0)
            .unwrap_or(DEFAULT_PORT);
        let log_level = get("LOG_LEVEL")
            .and_then(|level| level.trim().parse::<LevelFilter>().ok())
            .unwrap_or(LevelFilter::DEBUG);

        Self {
            port,
            flow: FlowConfig {
                forward_to: get("TWILIO_FORWARD_TO_NUMBER"),
                caller_id: get("TWILIO_NUMBER"),
                public_base_url: get("PUBLIC_BASE_URL"),
            },
            database_url: get("DATABASE_URL"),
            log_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Settings {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let s = settings(&[]);
        assert_eq!(s.port, DEFAULT_PORT);
        assert_eq!(s.log_level, LevelFilter::DEBUG);
        assert!(s.flow.forward_to.is_none());
        assert!(s.flow.public_base_url.is_none());
        assert!(s.database_url.is_none());
    }

    #[test]
    fn reads_forwarding_and_base_url() {
        let s = settings(&[
            ("PORT", "8080"),
            ("TWILIO_FORWARD_TO_NUMBER", "+15551234"),
            ("TWILIO_NUMBER", "+15559999"),
            ("PUBLIC_BASE_URL", "https://ivr.example.com"),
            ("LOG_LEVEL", "warn"),
        ]);
        assert_eq!(s.port, 8080);
        assert_eq!(s.flow.forward_to.as_deref(), Some("+15551234"));
        assert_eq!(s.flow.caller_id.as_deref(), Some("+15559999"));
        assert_eq!(
            s.flow.callback("/twilio/voice"),
            "https://ivr.example.com/twilio/voice"
        );
        assert_eq!(s.log_level, LevelFilter::WARN);
    }

    #[test]
    fn bad_port_and_empty_values_fall_back() {
        let s = settings(&[("PORT", "zero"), ("TWILIO_FORWARD_TO_NUMBER", "")]);
        assert_eq!(s.port, DEFAULT_PORT);
        assert!(s.flow.forward_to.is_none());

        assert_eq!(settings(&[("PORT", "0")]).port, DEFAULT_PORT);
    }
}
