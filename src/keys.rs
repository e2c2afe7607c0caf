// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Flat Configuration Keys
//!
//! Lowers a flat keyed mapping into declarations. Every key the resolver walks must
//! read `<type>_<name>` where `type` is `queue`, `connection` or `exchange` and
//! `name` is made of word characters and hyphens:
//!
//! ```json
//! {
//!   "connection_main": {
//!     "exchange_orders": {
//!       "type": "topic",
//!       "durable": true,
//!       "queue_created": {"binding": "order.created"}
//!     }
//!   }
//! }
//! ```
//!
//! The `<name>` part is the default name of the declared queue or exchange.

use crate::{
    declaration::{Declaration, Declarations},
    errors::TopologyError,
};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// Key of the optional mapping holding an exchange's queues
pub const QUEUES_KEY: &str = "queues";

/// The declaration kind named by a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Queue,
    Connection,
    Exchange,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Queue => "queue",
            KeyType::Connection => "connection",
            KeyType::Exchange => "exchange",
        }
    }
}

/// Splits a `<type>_<name>` key.
///
/// # Parameters
/// * `key` - The configuration key
///
/// # Returns
/// The declaration kind and the name part, or `InvalidKey` citing `key`
pub fn parse_key(key: &str) -> Result<(KeyType, &str), TopologyError> {
    let invalid = || TopologyError::InvalidKey(key.to_owned());

    let (kind, name) = key.split_once('_').ok_or_else(invalid)?;
    let kind = match kind {
        "queue" => KeyType::Queue,
        "connection" => KeyType::Connection,
        "exchange" => KeyType::Exchange,
        _ => return Err(invalid()),
    };

    let is_token_char = |c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-';
    if name.is_empty() || !name.chars().all(is_token_char) {
        return Err(invalid());
    }

    Ok((kind, name))
}

/// Lowers flat keyed configuration into declarations.
pub struct KeyPatternResolver;

impl KeyPatternResolver {
    /// Lowers every top-level key of `config`.
    ///
    /// # Parameters
    /// * `config` - A mapping of `<type>_<name>` keys
    ///
    /// # Returns
    /// The declarations in document order
    pub fn resolve(config: &Map<String, Value>) -> Result<Declarations, TopologyError> {
        let mut declarations = vec![];
        for (key, value) in config {
            declarations.push(Self::resolve_entry(key, value)?);
        }
        Ok(Declarations::from(declarations))
    }

    /// Parses a JSON document and lowers it.
    pub fn from_json_str(raw: &str) -> Result<Declarations, TopologyError> {
        let config: Map<String, Value> = serde_json::from_str(raw).map_err(|err| {
            TopologyError::ConfigurationError("topology".to_owned(), err.to_string())
        })?;
        Self::resolve(&config)
    }

    /// Reads a JSON document from `path` and lowers it.
    ///
    /// # Parameters
    /// * `path` - Location of the JSON document
    ///
    /// # Returns
    /// The declarations, or a `ConfigurationError` naming `path`
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Declarations, TopologyError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "reading topology configuration");

        let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
            TopologyError::ConfigurationError(path.display().to_string(), err.to_string())
        })?;
        Self::from_json_str(&raw)
    }

    fn resolve_entry(key: &str, value: &Value) -> Result<Declaration, TopologyError> {
        let (kind, name) = parse_key(key)?;

        match kind {
            KeyType::Queue => Ok(Declaration::Queue {
                parameters: Value::Object(named(key, name, value)?),
            }),
            KeyType::Connection => {
                let entries = mapping(key, value)?;
                let body = Self::resolve_children(&entries, |k| {
                    k.starts_with("queue") || k.starts_with("exchange")
                })?;
                Ok(Declaration::Connection {
                    name: Some(name.to_owned()),
                    body,
                })
            }
            KeyType::Exchange => {
                let mut parameters = named(key, name, value)?;

                let body = match parameters.shift_remove(QUEUES_KEY) {
                    Some(queues) => {
                        let entries = mapping(QUEUES_KEY, &queues)?;
                        let mut body = Self::resolve_children(&entries, |_| true)?;

                        let nested = |k: &str| k.starts_with("exchange");
                        body.extend(Self::resolve_children(&parameters, nested)?);
                        parameters.retain(|k, _| !nested(k));
                        body
                    }
                    None => {
                        let nested = |k: &str| k.starts_with("queue") || k.starts_with("exchange");
                        let body = Self::resolve_children(&parameters, nested)?;
                        parameters.retain(|k, _| !nested(k));
                        body
                    }
                };

                Ok(Declaration::Exchange {
                    parameters: Value::Object(parameters),
                    body: Some(body),
                })
            }
        }
    }

    fn resolve_children<F>(
        entries: &Map<String, Value>,
        recurse: F,
    ) -> Result<Vec<Declaration>, TopologyError>
    where
        F: Fn(&str) -> bool,
    {
        let mut body = vec![];
        for (key, value) in entries {
            if recurse(key) {
                body.push(Self::resolve_entry(key, value)?);
            }
        }
        Ok(body)
    }
}

fn mapping(key: &str, value: &Value) -> Result<Map<String, Value>, TopologyError> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(entries) => Ok(entries.clone()),
        other => Err(TopologyError::MalformedParameters {
            name: key.to_owned(),
            reason: format!("expected a mapping, got `{other}`"),
        }),
    }
}

fn named(key: &str, name: &str, value: &Value) -> Result<Map<String, Value>, TopologyError> {
    let mut parameters = mapping(key, value)?;
    if !parameters.contains_key("name") {
        parameters.insert("name".to_owned(), Value::String(name.to_owned()));
    }
    Ok(parameters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolve(config: Value) -> Result<Declarations, TopologyError> {
        KeyPatternResolver::resolve(config.as_object().unwrap())
    }

    #[test]
    fn parses_valid_keys() {
        assert_eq!(parse_key("queue_created"), Ok((KeyType::Queue, "created")));
        assert_eq!(
            parse_key("exchange_order-events"),
            Ok((KeyType::Exchange, "order-events"))
        );
        assert_eq!(
            parse_key("connection_main_2"),
            Ok((KeyType::Connection, "main_2"))
        );
    }

    #[test]
    fn rejects_invalid_keys() {
        for key in [
            "queues",
            "topic_orders",
            "queue_",
            "exchange_a.b",
            "Queue_x",
            "queue_café",
            "",
        ] {
            assert_eq!(
                parse_key(key),
                Err(TopologyError::InvalidKey(key.to_owned())),
                "{key}"
            );
        }
    }

    #[test]
    fn lowers_exchange_with_sibling_queues() {
        let declarations = resolve(json!({
            "exchange_orders": {
                "type": "topic",
                "durable": true,
                "queue_created": {"binding": "order.created"}
            }
        }))
        .unwrap();

        assert_eq!(
            declarations.as_slice(),
            &[Declaration::Exchange {
                parameters: json!({"type": "topic", "durable": true, "name": "orders"}),
                body: Some(vec![Declaration::Queue {
                    parameters: json!({"binding": "order.created", "name": "created"})
                }]),
            }]
        );
    }

    #[test]
    fn queues_mapping_takes_precedence_over_siblings() {
        let declarations = resolve(json!({
            "exchange_orders": {
                "type": "direct",
                "queues": {"queue_a": {}},
                "queue_b": {}
            }
        }))
        .unwrap();

        let Declaration::Exchange { body, .. } = &declarations.as_slice()[0] else {
            panic!("expected an exchange");
        };
        assert_eq!(
            body.as_deref(),
            Some(&[Declaration::Queue {
                parameters: json!({"name": "a"})
            }][..])
        );
    }

    #[test]
    fn queues_mapping_keeps_sibling_exchanges() {
        let declarations = resolve(json!({
            "exchange_outer": {
                "type": "topic",
                "queues": {"queue_a": {}},
                "exchange_inner": {"type": "topic"}
            }
        }))
        .unwrap();

        let Declaration::Exchange { parameters, body } = &declarations.as_slice()[0] else {
            panic!("expected an exchange");
        };
        assert_eq!(parameters, &json!({"type": "topic", "name": "outer"}));
        assert!(matches!(
            body.as_deref(),
            Some([Declaration::Queue { .. }, Declaration::Exchange { .. }])
        ));
    }

    #[test]
    fn explicit_name_wins_over_key() {
        let declarations = resolve(json!({"queue_alias": {"name": "real"}})).unwrap();

        assert_eq!(
            declarations.as_slice(),
            &[Declaration::Queue {
                parameters: json!({"name": "real"})
            }]
        );
    }

    #[test]
    fn connection_recurses_only_into_declarations() {
        let declarations = resolve(json!({
            "connection_main": {
                "host": "ignored",
                "queue_a": null,
                "exchange_b": {"type": "fanout"}
            }
        }))
        .unwrap();

        let Declaration::Connection { name, body } = &declarations.as_slice()[0] else {
            panic!("expected a connection");
        };
        assert_eq!(name.as_deref(), Some("main"));
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn invalid_top_level_key_is_cited() {
        assert_eq!(
            resolve(json!({"topic_orders": {}})).unwrap_err(),
            TopologyError::InvalidKey("topic_orders".to_owned())
        );
    }

    #[test]
    fn invalid_nested_key_is_cited() {
        let err = resolve(json!({
            "exchange_orders": {"type": "topic", "queues": {"created": {}}}
        }))
        .unwrap_err();

        assert_eq!(err, TopologyError::InvalidKey("created".to_owned()));
    }

    #[test]
    fn parses_json_documents() {
        let declarations =
            KeyPatternResolver::from_json_str(r#"{"queue_a": {}, "queue_b": {}}"#).unwrap();
        assert_eq!(declarations.len(), 2);

        assert!(matches!(
            KeyPatternResolver::from_json_str("[1, 2]"),
            Err(TopologyError::ConfigurationError(..))
        ));
    }
}
