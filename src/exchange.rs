// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Model
//!
//! This module provides the types describing broker exchanges and the
//! exchange-to-exchange bindings recorded while a topology is evaluated.
//! Exchange bindings are never applied when recorded; they are collected and
//! applied once every exchange of the pass exists.

use crate::errors::TopologyError;
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};

/// Type token for direct exchanges
pub const EXCHANGE_TYPE_DIRECT: &str = "direct";
/// Type token for fanout exchanges
pub const EXCHANGE_TYPE_FANOUT: &str = "fanout";
/// Type token for topic exchanges
pub const EXCHANGE_TYPE_TOPIC: &str = "topic";
/// Type token for headers exchanges
pub const EXCHANGE_TYPE_HEADERS: &str = "headers";

/// Represents the types of exchanges a topology may declare.
///
/// Each exchange type has specific routing behavior:
/// - Direct: Routes messages to queues based on an exact match of routing keys
/// - Fanout: Broadcasts messages to all bound queues regardless of routing keys
/// - Topic: Routes messages based on wildcard pattern matching of routing keys
/// - Headers: Routes based on message header values instead of routing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Direct,
    Fanout,
    Topic,
    Headers,
}

impl ExchangeKind {
    /// Returns the type token understood by the broker.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeKind::Direct => EXCHANGE_TYPE_DIRECT,
            ExchangeKind::Fanout => EXCHANGE_TYPE_FANOUT,
            ExchangeKind::Topic => EXCHANGE_TYPE_TOPIC,
            ExchangeKind::Headers => EXCHANGE_TYPE_HEADERS,
        }
    }
}

impl FromStr for ExchangeKind {
    type Err = TopologyError;

    /// Parses a type token, failing on anything outside the four known kinds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            EXCHANGE_TYPE_DIRECT => Ok(ExchangeKind::Direct),
            EXCHANGE_TYPE_FANOUT => Ok(ExchangeKind::Fanout),
            EXCHANGE_TYPE_TOPIC => Ok(ExchangeKind::Topic),
            EXCHANGE_TYPE_HEADERS => Ok(ExchangeKind::Headers),
            other => Err(TopologyError::UnknownExchangeType(other.to_owned())),
        }
    }
}

impl fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ExchangeKind> for lapin::ExchangeKind {
    fn from(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Direct => lapin::ExchangeKind::Direct,
            ExchangeKind::Fanout => lapin::ExchangeKind::Fanout,
            ExchangeKind::Topic => lapin::ExchangeKind::Topic,
            ExchangeKind::Headers => lapin::ExchangeKind::Headers,
        }
    }
}

/// Definition of a broker exchange.
///
/// `connection` names the connection the exchange is declared on; `None` means the
/// ambient scope connection or, failing that, the default connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub name: String,
    pub kind: ExchangeKind,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Map<String, Value>,
    pub connection: Option<String>,
}

impl Exchange {
    /// Creates a non-durable, non-auto-delete exchange without arguments.
    pub fn new(name: &str, kind: ExchangeKind) -> Exchange {
        Exchange {
            name: name.to_owned(),
            kind,
            durable: false,
            auto_delete: false,
            arguments: Map::default(),
            connection: None,
        }
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Sets the exchange to auto-delete when no longer used.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Sets the exchange arguments.
    pub fn arguments(mut self, arguments: Map<String, Value>) -> Self {
        self.arguments = arguments;
        self
    }

    /// Pins the exchange to a named connection.
    pub fn connection(mut self, name: &str) -> Self {
        self.connection = Some(name.to_owned());
        self
    }
}

/// Token selecting "this exchange is the origin" in a binding entry
pub const BINDING_AS_SOURCE: &str = "source";
/// Token selecting "this exchange receives" in a binding entry
pub const BINDING_AS_DESTINATION: &str = "destination";

/// Which end of an exchange binding the declaring exchange sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BindingDirection {
    /// The declaring exchange routes into the referenced exchange.
    Source,
    /// The declaring exchange receives from the referenced exchange.
    #[default]
    Destination,
}

impl FromStr for BindingDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            BINDING_AS_SOURCE => Ok(BindingDirection::Source),
            BINDING_AS_DESTINATION => Ok(BindingDirection::Destination),
            other => Err(format!(
                "`as` must be `{BINDING_AS_SOURCE}` or `{BINDING_AS_DESTINATION}`, got `{other}`"
            )),
        }
    }
}

/// A deferred exchange-to-exchange binding.
///
/// Messages published to `source` with a matching `routing_key` are routed to
/// `destination`. `connection` is the name of the connection that was in effect
/// when the binding was recorded (`None` for the default connection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeBinding {
    pub source: String,
    pub destination: String,
    pub routing_key: String,
    pub connection: Option<String>,
}

impl ExchangeBinding {
    /// Orients a binding between the declaring exchange and the referenced one.
    pub fn oriented(
        this: &str,
        other: &str,
        routing_key: &str,
        direction: BindingDirection,
        connection: Option<String>,
    ) -> ExchangeBinding {
        let (source, destination) = match direction {
            BindingDirection::Source => (this, other),
            BindingDirection::Destination => (other, this),
        };

        ExchangeBinding {
            source: source.to_owned(),
            destination: destination.to_owned(),
            routing_key: routing_key.to_owned(),
            connection,
        }
    }
}
