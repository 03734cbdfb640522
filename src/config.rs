//! Configuration loading.
//!
//! Loads from `./straylight.toml` (or `$STRAYLIGHT_CONFIG_PATH`).
//! Precedence: env vars > config file > defaults. Secrets get redacting
//! `Debug` impls so a dumped config never leaks them into logs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::notify::EventTemplates;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Core service settings (`[service]`).
    pub service: ServiceConfig,
    /// Bridge sidecar settings (`[bridge]`).
    pub bridge: BridgeConfig,
    /// Commerce platform API settings (`[commerce]`).
    pub commerce: CommerceConfig,
    /// Webhook ingestion settings (`[webhook]`).
    pub webhook: WebhookConfig,
    /// Per-event message templates (`[templates]`); defaults cover
    /// `order/paid`, `order/fulfilled`, and `order/cancelled`.
    pub templates: Option<HashMap<String, String>>,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from the TOML file only, no env overrides.
    fn load_from_file() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                let config: Config =
                    toml::from_str(&contents).context("failed to parse config TOML")?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found, using defaults");
                Ok(Config::default())
            }
            Err(e) => Err(anyhow::anyhow!("failed to read config file: {e}")),
        }
    }

    /// Resolve the config file path using a custom env resolver (for testing).
    fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("STRAYLIGHT_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("straylight.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("STRAYLIGHT_LOG_LEVEL") {
            self.service.log_level = v;
        }
        if let Some(v) = env("STRAYLIGHT_DB_PATH") {
            self.service.database_path = v;
        }
        if let Some(v) = env("STRAYLIGHT_BRIDGE_URL") {
            self.bridge.base_url = v;
        }
        if let Some(v) = env("STRAYLIGHT_STORE_ID") {
            self.commerce.store_id = Some(v);
        }
        if let Some(v) = env("STRAYLIGHT_ACCESS_TOKEN") {
            self.commerce.access_token = Some(v);
        }
        if let Some(v) = env("STRAYLIGHT_WEBHOOK_ADDR") {
            self.webhook.bind_addr = v;
        }
        if let Some(v) = env("STRAYLIGHT_WEBHOOK_SECRET") {
            self.webhook.secret = Some(v);
        }
    }

    /// Parse a TOML string into config (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Message templates, with built-in defaults when `[templates]` is absent.
    pub fn event_templates(&self) -> EventTemplates {
        match &self.templates {
            Some(map) => EventTemplates::from_map(map.clone()),
            None => EventTemplates::default(),
        }
    }
}

// ── Service config ──────────────────────────────────────────────

/// Core service settings (`[service]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Tracing log level filter.
    pub log_level: String,
    /// SQLite database path.
    pub database_path: String,
    /// Queue entry retention in days.
    pub retention_days: u32,
    /// Worker poll interval when the queue is empty, in seconds.
    pub poll_interval_seconds: u64,
    /// Credential-flush quiet period, in seconds.
    pub debounce_seconds: u64,
    /// Fixed delay before a reconnect attempt, in seconds.
    pub reconnect_delay_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            database_path: "straylight.db".to_string(),
            retention_days: 14,
            poll_interval_seconds: 5,
            debounce_seconds: 5,
            reconnect_delay_seconds: 5,
        }
    }
}

impl ServiceConfig {
    /// Worker poll interval as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    /// Debounce quiet period as a [`Duration`].
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_secs(self.debounce_seconds)
    }

    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_seconds)
    }
}

// ── Bridge config ───────────────────────────────────────────────

/// Bridge sidecar settings (`[bridge]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Base URL of the baileys bridge HTTP API.
    pub base_url: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{}", crate::session::bridge::DEFAULT_BRIDGE_PORT),
        }
    }
}

// ── Commerce config ─────────────────────────────────────────────

/// Commerce platform API settings (`[commerce]`).
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct CommerceConfig {
    /// API base URL; the platform default when unset.
    pub base_url: Option<String>,
    /// Store identifier. Required to start.
    pub store_id: Option<String>,
    /// API access token. Required to start.
    pub access_token: Option<String>,
}

impl CommerceConfig {
    /// Default platform API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://api.tiendanube.com";

    /// Effective base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(Self::DEFAULT_BASE_URL)
    }
}

impl std::fmt::Debug for CommerceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommerceConfig")
            .field("base_url", &self.base_url)
            .field("store_id", &self.store_id)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "__REDACTED__"),
            )
            .finish()
    }
}

// ── Webhook config ──────────────────────────────────────────────

/// Webhook ingestion settings (`[webhook]`).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Bind address for the ingestion server.
    pub bind_addr: String,
    /// Shared HMAC secret; verification is skipped when unset.
    pub secret: Option<String>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:10000".to_string(),
            secret: None,
        }
    }
}

impl std::fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("bind_addr", &self.bind_addr)
            .field("secret", &self.secret.as_ref().map(|_| "__REDACTED__"))
            .finish()
    }
}

// ── Tests ───────────────────────────────────────────────────────
