// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Declarations
//!
//! Both configuration front ends lower to the same small tree of declarations:
//! open a connection scope, declare an exchange (optionally with nested
//! declarations), declare a queue. This module defines that tree, the builder used
//! to write it by hand, and the decoding of declaration parameters into the
//! exchange and queue models.

use crate::{
    errors::TopologyError,
    exchange::{BindingDirection, Exchange, ExchangeKind},
    keys::{parse_key, KeyType},
    queue::{Queue, QueueBindingSpec},
};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Prefix of the parameter keys declaring exchange-to-exchange bindings
pub const BIND_TO_PREFIX: &str = "bind-to_";

/// A single step of a topology.
#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    /// Evaluates `body` on the named connection, or the default one when `name`
    /// is `None`.
    Connection {
        name: Option<String>,
        body: Vec<Declaration>,
    },
    /// Declares an exchange, then evaluates `body` with it as parent exchange.
    Exchange {
        parameters: Value,
        body: Option<Vec<Declaration>>,
    },
    /// Declares a queue, binding it to the parent or explicit exchange.
    Queue { parameters: Value },
}

/// Builder for a list of declarations.
///
/// Nested scopes are written with closures receiving a fresh builder:
///
/// ```
/// use rabbitmq_topology::declaration::Declarations;
/// use serde_json::json;
///
/// let topology = Declarations::new().connection("main", |c| {
///     c.exchange_with(json!({"name": "orders", "type": "topic"}), |e| {
///         e.queue(json!({"name": "created", "binding": "order.created"}))
///     })
/// });
/// assert_eq!(topology.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declarations {
    items: Vec<Declaration>,
}

impl Declarations {
    pub fn new() -> Declarations {
        Declarations::default()
    }

    /// Appends a queue declaration.
    pub fn queue(mut self, parameters: Value) -> Self {
        self.items.push(Declaration::Queue { parameters });
        self
    }

    /// Appends an exchange declaration without nested declarations.
    pub fn exchange(mut self, parameters: Value) -> Self {
        self.items.push(Declaration::Exchange {
            parameters,
            body: None,
        });
        self
    }

    /// Appends an exchange declaration whose nested declarations are built by
    /// `nested`.
    pub fn exchange_with<F>(mut self, parameters: Value, nested: F) -> Self
    where
        F: FnOnce(Declarations) -> Declarations,
    {
        self.items.push(Declaration::Exchange {
            parameters,
            body: Some(nested(Declarations::new()).items),
        });
        self
    }

    /// Appends a scope evaluated on the named connection.
    pub fn connection<F>(mut self, name: &str, nested: F) -> Self
    where
        F: FnOnce(Declarations) -> Declarations,
    {
        self.items.push(Declaration::Connection {
            name: Some(name.to_owned()),
            body: nested(Declarations::new()).items,
        });
        self
    }

    /// Appends a scope evaluated on the default connection.
    pub fn default_connection<F>(mut self, nested: F) -> Self
    where
        F: FnOnce(Declarations) -> Declarations,
    {
        self.items.push(Declaration::Connection {
            name: None,
            body: nested(Declarations::new()).items,
        });
        self
    }

    /// Appends an already lowered declaration.
    pub fn push(mut self, declaration: Declaration) -> Self {
        self.items.push(declaration);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[Declaration] {
        &self.items
    }
}

impl From<Vec<Declaration>> for Declarations {
    fn from(items: Vec<Declaration>) -> Self {
        Declarations { items }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct QueueParameters {
    name: Option<String>,
    durable: bool,
    exclusive: bool,
    auto_delete: bool,
    arguments: Map<String, Value>,
    exchange: Option<String>,
    binding: Option<Value>,
    #[serde(rename = "match")]
    match_mode: Option<String>,
    connection: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ExchangeParameters {
    name: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    durable: bool,
    auto_delete: bool,
    arguments: Map<String, Value>,
    connection: Option<String>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

/// An exchange-to-exchange binding requested by a `bind-to_exchange_<name>` key,
/// relative to the exchange declaring it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindTo {
    pub exchange: String,
    pub routing_key: String,
    pub direction: BindingDirection,
}

fn label(parameters: &Value, entity: &str) -> String {
    parameters
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or(entity)
        .to_owned()
}

fn malformed(parameters: &Value, entity: &str, reason: impl ToString) -> TopologyError {
    TopologyError::MalformedParameters {
        name: label(parameters, entity),
        reason: reason.to_string(),
    }
}

fn required(value: Option<String>, entity: &'static str, field: &'static str) -> Result<String, TopologyError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(TopologyError::MissingField { entity, field }),
    }
}

/// Decodes queue parameters.
///
/// `name` is required; flags default to `false` and `arguments` to an empty
/// mapping. A string `binding` is a routing key, a mapping `binding` is a header
/// match whose mode comes from `match`.
pub fn decode_queue(parameters: &Value) -> Result<Queue, TopologyError> {
    if !parameters.is_object() {
        return Err(malformed(parameters, "queue", "parameters must be a mapping"));
    }

    let params = QueueParameters::deserialize(parameters)
        .map_err(|err| malformed(parameters, "queue", err))?;

    let binding = match params.binding {
        None | Some(Value::Null) => None,
        Some(Value::String(key)) => Some(QueueBindingSpec::RoutingKey(key)),
        Some(Value::Object(headers)) => Some(QueueBindingSpec::Headers(headers)),
        Some(other) => {
            return Err(malformed(
                parameters,
                "queue",
                format!("binding must be a routing key or a header mapping, got `{other}`"),
            ))
        }
    };

    Ok(Queue {
        name: required(params.name, "queue", "name")?,
        durable: params.durable,
        exclusive: params.exclusive,
        auto_delete: params.auto_delete,
        arguments: params.arguments,
        exchange: params.exchange,
        binding,
        match_mode: params.match_mode,
        connection: params.connection,
    })
}

/// Decodes exchange parameters and the `bind-to_*` entries they carry.
///
/// `name` and `type` are required and `type` must be a known exchange type.
/// Keys that are neither known parameters nor `bind-to_*` entries are ignored.
pub fn decode_exchange(parameters: &Value) -> Result<(Exchange, Vec<BindTo>), TopologyError> {
    if !parameters.is_object() {
        return Err(malformed(parameters, "exchange", "parameters must be a mapping"));
    }

    let params = ExchangeParameters::deserialize(parameters)
        .map_err(|err| malformed(parameters, "exchange", err))?;

    let name = required(params.name, "exchange", "name")?;
    let kind: ExchangeKind = required(params.kind, "exchange", "type")?.parse()?;

    let mut bind_to = vec![];
    for (key, value) in &params.rest {
        if let Some(target) = key.strip_prefix(BIND_TO_PREFIX) {
            bind_to.push(decode_bind_to(key, target, value)?);
        }
    }

    let exchange = Exchange {
        name,
        kind,
        durable: params.durable,
        auto_delete: params.auto_delete,
        arguments: params.arguments,
        connection: params.connection,
    };

    Ok((exchange, bind_to))
}

fn decode_bind_to(key: &str, target: &str, value: &Value) -> Result<BindTo, TopologyError> {
    let malformed = |reason: String| TopologyError::MalformedBinding {
        key: key.to_owned(),
        reason,
    };

    let exchange = match parse_key(target) {
        Ok((KeyType::Exchange, name)) => name.to_owned(),
        Ok((other, _)) => {
            return Err(malformed(format!(
                "only exchanges can be bound to, got `{}`",
                other.as_str()
            )))
        }
        Err(_) => return Err(malformed("expected `bind-to_exchange_<name>`".to_owned())),
    };

    let (routing_key, direction) = match value {
        Value::Null => (String::new(), BindingDirection::default()),
        Value::String(key) => (key.clone(), BindingDirection::default()),
        Value::Object(entry) => {
            let routing_key = match entry.get("binding") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(key)) => key.clone(),
                Some(other) => {
                    return Err(malformed(format!("`binding` must be a string, got `{other}`")))
                }
            };
            let direction = match entry.get("as") {
                None | Some(Value::Null) => BindingDirection::default(),
                Some(Value::String(raw)) => raw.parse().map_err(malformed)?,
                Some(other) => return Err(malformed(format!("`as` must be a string, got `{other}`"))),
            };
            (routing_key, direction)
        }
        other => {
            return Err(malformed(format!(
                "expected a routing key or a mapping, got `{other}`"
            )))
        }
    };

    Ok(BindTo {
        exchange,
        routing_key,
        direction,
    })
}
