//! # Application State
//!
//! This module defines the shared state that is available to all HTTP request handlers.
//! The state is created once at server startup and shared via `Arc` across all
//! concurrent requests.
//!
//! ## Components
//!
//! - **Rule Registry**: The implementation rules tried for every aggregate. Shared
//!   (not cloned per request) because rules are stateless.
//! - **Planner Settings**: Costing switches and unit costs used when a request does
//!   not bring its own.
//!
//! ## Environment
//!
//! - `AGGX_LISTEN_ADDR`: socket address to bind (default `0.0.0.0:3000`).
//! - `AGGX_USE_DEFAULT_COSTING`: `true`/`false` (or `1`/`0`), default `false`.

use aggx_core::rule::RuleRegistry;
use aggx_core::settings::PlannerSettings;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("AGGX_LISTEN_ADDR is not a socket address: {0}")]
    ListenAddr(#[from] std::net::AddrParseError),

    #[error("AGGX_USE_DEFAULT_COSTING must be true/false or 1/0, got '{0}'")]
    CostingFlag(String),
}

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Settings applied to requests that carry none.
    pub settings: PlannerSettings,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let listen_addr = lookup("AGGX_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string())
            .parse::<SocketAddr>()?;
        let use_default_costing = match lookup("AGGX_USE_DEFAULT_COSTING") {
            None => false,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" | "" => false,
                _ => return Err(ConfigError::CostingFlag(raw)),
            },
        };
        Ok(Self {
            listen_addr,
            settings: PlannerSettings {
                use_default_costing,
                ..PlannerSettings::default()
            },
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            settings: PlannerSettings::default(),
        }
    }
}

/// Shared application state, accessible by all request handlers via Axum's State extractor.
pub struct AppState {
    /// All implementation rules available to the planner.
    pub rule_registry: Arc<RuleRegistry>,
    pub config: ServerConfig,
}

impl AppState {
    /// Create the state with every built-in rule.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            rule_registry: Arc::new(aggx_rules::default_rule_registry()),
            config,
        }
    }
}
