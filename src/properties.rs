// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Properties
//!
//! A typed alternative to the declaration builder for applications that describe
//! one exchange per configuration section. The section is decoded and validated
//! into an exchange definition plus its explicit binding list; applying them is
//! left to the caller (see `AmqpTopology::apply_properties`).
//!
//! ```json
//! {
//!   "name": "notifications",
//!   "type": "topic",
//!   "durable": true,
//!   "exchangeBindings": [
//!     {"exchange": "orders", "binding": "order.#"},
//!     {"exchange": "audit", "binding": "#", "as": "source"}
//!   ]
//! }
//! ```

use crate::{
    errors::TopologyError,
    exchange::{BindingDirection, Exchange, ExchangeBinding, ExchangeKind},
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One entry of `exchangeBindings`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeBindingProperties {
    /// The other exchange of the binding.
    pub exchange: Option<String>,
    /// Routing key of the binding.
    pub binding: String,
    /// `source` or `destination` (the default).
    #[serde(rename = "as")]
    pub direction: Option<String>,
}

/// A decoded exchange configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExchangeProperties {
    pub name: Option<String>,
    pub arguments: Map<String, Value>,
    pub auto_delete: bool,
    pub durable: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub connection: Option<String>,
    pub exchange_bindings: Vec<ExchangeBindingProperties>,
}

impl ExchangeProperties {
    /// Decodes a property source.
    ///
    /// Fails with `UnknownExchangeType` when `type` is present but unknown. Missing
    /// fields are reported by [`ExchangeProperties::validate`].
    pub fn from_value(source: Value) -> Result<ExchangeProperties, TopologyError> {
        let label = source
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("exchange")
            .to_owned();

        let props: ExchangeProperties = serde_json::from_value(source)
            .map_err(|err| TopologyError::ConfigurationError(label, err.to_string()))?;

        if let Some(kind) = &props.kind {
            kind.parse::<ExchangeKind>()?;
        }

        Ok(props)
    }

    /// Parses and decodes a JSON property source.
    pub fn from_json_str(raw: &str) -> Result<ExchangeProperties, TopologyError> {
        let source: Value = serde_json::from_str(raw).map_err(|err| {
            TopologyError::ConfigurationError("exchange".to_owned(), err.to_string())
        })?;
        Self::from_value(source)
    }

    /// Fails when `name` or `type` is missing.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.name.as_deref().unwrap_or_default().is_empty() {
            return Err(TopologyError::MissingField {
                entity: "exchange",
                field: "name",
            });
        }

        if self.kind.as_deref().unwrap_or_default().is_empty() {
            return Err(TopologyError::MissingField {
                entity: "exchange",
                field: "type",
            });
        }

        Ok(())
    }

    /// The validated exchange definition.
    pub fn exchange(&self) -> Result<Exchange, TopologyError> {
        self.validate()?;

        let name = self.name.clone().unwrap_or_default();
        let kind = self.kind.as_deref().unwrap_or_default().parse()?;

        Ok(Exchange {
            name,
            kind,
            durable: self.durable,
            auto_delete: self.auto_delete,
            arguments: self.arguments.clone(),
            connection: self.connection.clone(),
        })
    }

    /// The bindings of `exchangeBindings`, oriented relative to this exchange.
    ///
    /// `as: source` yields this exchange → target; `as: destination`, the default,
    /// yields target → this exchange.
    pub fn bindings(&self) -> Result<Vec<ExchangeBinding>, TopologyError> {
        self.validate()?;
        let this = self.name.as_deref().unwrap_or_default();

        self.exchange_bindings
            .iter()
            .enumerate()
            .map(|(idx, entry)| {
                let malformed = |reason: String| TopologyError::MalformedBinding {
                    key: format!("exchangeBindings[{idx}]"),
                    reason,
                };

                let target = match entry.exchange.as_deref() {
                    Some(target) if !target.is_empty() => target,
                    _ => return Err(malformed("`exchange` is required".to_owned())),
                };

                let direction = match entry.direction.as_deref() {
                    None => BindingDirection::default(),
                    Some(raw) => raw.parse().map_err(malformed)?,
                };

                Ok(ExchangeBinding::oriented(
                    this,
                    target,
                    &entry.binding,
                    direction,
                    self.connection.clone(),
                ))
            })
            .collect()
    }

    /// Validates and returns the exchange definition with its bindings.
    pub fn decode(&self) -> Result<(Exchange, Vec<ExchangeBinding>), TopologyError> {
        Ok((self.exchange()?, self.bindings()?))
    }
}
