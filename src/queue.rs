// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Queue Model
//!
//! This module provides the types describing broker queues and how a queue is bound
//! to its exchange. Queue bindings are applied immediately when the queue is
//! declared, either by routing key or by header matching.

use serde_json::{Map, Value};
use std::str::FromStr;

/// Binding argument carrying the header match mode
pub const AMQP_HEADERS_MATCH: &str = "x-match";
/// Match mode token: any listed header must match
pub const MATCH_MODE_ANY: &str = "any";
/// Match mode token: every listed header must match
pub const MATCH_MODE_ALL: &str = "all";

/// Header matching mode of a headers binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Any,
    All,
}

impl MatchMode {
    /// Returns the `x-match` token understood by the broker.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Any => MATCH_MODE_ANY,
            MatchMode::All => MATCH_MODE_ALL,
        }
    }
}

impl FromStr for MatchMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            MATCH_MODE_ANY => Ok(MatchMode::Any),
            MATCH_MODE_ALL => Ok(MatchMode::All),
            _ => Err(()),
        }
    }
}

/// How a queue asks to be bound to its exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueBindingSpec {
    /// Bind with a routing key.
    RoutingKey(String),
    /// Bind by matching message headers against this mapping.
    Headers(Map<String, Value>),
}

/// The concrete binding issued to the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueBindTarget {
    RoutingKey(String),
    Headers {
        headers: Map<String, Value>,
        mode: MatchMode,
    },
}

impl QueueBindTarget {
    /// Routing key sent with the bind call; empty for header bindings.
    pub fn routing_key(&self) -> &str {
        match self {
            QueueBindTarget::RoutingKey(key) => key,
            QueueBindTarget::Headers { .. } => "",
        }
    }

    /// Binding arguments: the header mapping plus `x-match` for header bindings.
    pub fn arguments(&self) -> Map<String, Value> {
        match self {
            QueueBindTarget::RoutingKey(_) => Map::default(),
            QueueBindTarget::Headers { headers, mode } => {
                let mut args = headers.clone();
                args.insert(
                    AMQP_HEADERS_MATCH.to_owned(),
                    Value::String(mode.as_str().to_owned()),
                );
                args
            }
        }
    }
}

/// Definition of a broker queue.
///
/// `exchange` is an explicit exchange to bind to; when absent, the queue is bound
/// to the enclosing exchange scope, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Queue {
    pub name: String,
    pub durable: bool,
    pub exclusive: bool,
    pub auto_delete: bool,
    pub arguments: Map<String, Value>,
    pub exchange: Option<String>,
    pub binding: Option<QueueBindingSpec>,
    pub match_mode: Option<String>,
    pub connection: Option<String>,
}

impl Queue {
    /// Creates a non-durable, non-exclusive, non-auto-delete queue.
    pub fn new(name: &str) -> Queue {
        Queue {
            name: name.to_owned(),
            ..Queue::default()
        }
    }

    /// Makes the queue durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    /// Makes the queue exclusive to the connection.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Sets the queue to auto-delete when no longer used.
    pub fn auto_delete(mut self) -> Self {
        self.auto_delete = true;
        self
    }

    /// Binds the queue with a routing key.
    pub fn routing_key(mut self, key: &str) -> Self {
        self.binding = Some(QueueBindingSpec::RoutingKey(key.to_owned()));
        self
    }

    /// Binds the queue by header matching.
    pub fn headers(mut self, headers: Map<String, Value>, mode: &str) -> Self {
        self.binding = Some(QueueBindingSpec::Headers(headers));
        self.match_mode = Some(mode.to_owned());
        self
    }

    /// Computes the binding to issue.
    ///
    /// Without a binding spec the queue is bound with an empty routing key, which
    /// suits fanout exchanges. Header bindings require a match mode of `any` or
    /// `all`; the error carries the reason the binding has to be skipped.
    pub fn bind_target(&self) -> Result<QueueBindTarget, String> {
        match &self.binding {
            None => Ok(QueueBindTarget::RoutingKey(String::new())),
            Some(QueueBindingSpec::RoutingKey(key)) => Ok(QueueBindTarget::RoutingKey(key.clone())),
            Some(QueueBindingSpec::Headers(headers)) => {
                let raw = self.match_mode.as_deref().unwrap_or_default();
                match raw.parse::<MatchMode>() {
                    Ok(mode) => Ok(QueueBindTarget::Headers {
                        headers: headers.clone(),
                        mode,
                    }),
                    Err(_) => Err(format!(
                        "header binding requires match `{MATCH_MODE_ANY}` or `{MATCH_MODE_ALL}`, got `{raw}`"
                    )),
                }
            }
        }
    }
}
