// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connection Configuration
//!
//! Settings for the named broker connections a topology pass may use. A
//! configuration names one connection as the default; declarations that do not name
//! a connection, directly or through an enclosing scope, are declared on it.

use crate::errors::TopologyError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, env};

/// Environment variable holding the broker host
pub const ENV_RABBIT_HOST: &str = "RABBIT_HOST";
/// Environment variable holding the broker port
pub const ENV_RABBIT_PORT: &str = "RABBIT_PORT";
/// Environment variable holding the broker user
pub const ENV_RABBIT_USER: &str = "RABBIT_USER";
/// Environment variable holding the broker password
pub const ENV_RABBIT_PASSWORD: &str = "RABBIT_PASSWORD";
/// Environment variable holding the broker virtual host
pub const ENV_RABBIT_VHOST: &str = "RABBIT_VHOST";

/// Name given to the connection built from the environment
pub const DEFAULT_CONNECTION_NAME: &str = "default";

/// Settings of a single broker connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RabbitMQConfigs {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
}

impl Default for RabbitMQConfigs {
    fn default() -> Self {
        RabbitMQConfigs {
            host: "localhost".to_owned(),
            port: 5672,
            user: "guest".to_owned(),
            password: "guest".to_owned(),
            vhost: String::new(),
        }
    }
}

impl RabbitMQConfigs {
    /// Builds the AMQP URI of this connection.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.vhost
        )
    }

    /// Reads the connection settings from `RABBIT_*` environment variables,
    /// falling back to the defaults for unset ones.
    pub fn from_env() -> Result<Self, TopologyError> {
        let defaults = RabbitMQConfigs::default();

        let port = match env::var(ENV_RABBIT_PORT) {
            Ok(raw) => raw.parse::<u16>().map_err(|err| {
                TopologyError::ConfigurationError(ENV_RABBIT_PORT.to_owned(), err.to_string())
            })?,
            Err(_) => defaults.port,
        };

        Ok(RabbitMQConfigs {
            host: env::var(ENV_RABBIT_HOST).unwrap_or(defaults.host),
            port,
            user: env::var(ENV_RABBIT_USER).unwrap_or(defaults.user),
            password: env::var(ENV_RABBIT_PASSWORD).unwrap_or(defaults.password),
            vhost: env::var(ENV_RABBIT_VHOST).unwrap_or(defaults.vhost),
        })
    }
}

/// Settings of every connection a topology pass may use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmqpConfigs {
    /// Reported to the broker as the connection name.
    pub app_name: String,
    pub default_connection: Option<String>,
    pub connections: BTreeMap<String, RabbitMQConfigs>,
}

impl AmqpConfigs {
    /// Parses the settings from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, TopologyError> {
        let cfgs: AmqpConfigs = serde_json::from_str(raw).map_err(|err| {
            TopologyError::ConfigurationError("connections".to_owned(), err.to_string())
        })?;
        cfgs.validate()?;
        Ok(cfgs)
    }

    /// Builds a single default connection from the environment.
    pub fn from_env(app_name: &str) -> Result<Self, TopologyError> {
        let mut connections = BTreeMap::new();
        connections.insert(
            DEFAULT_CONNECTION_NAME.to_owned(),
            RabbitMQConfigs::from_env()?,
        );

        Ok(AmqpConfigs {
            app_name: app_name.to_owned(),
            default_connection: Some(DEFAULT_CONNECTION_NAME.to_owned()),
            connections,
        })
    }

    /// Fails when the default connection names an unknown connection.
    pub fn validate(&self) -> Result<(), TopologyError> {
        match &self.default_connection {
            Some(name) if !self.connections.contains_key(name) => {
                Err(TopologyError::UnresolvedConnection(name.clone()))
            }
            _ => Ok(()),
        }
    }
}
