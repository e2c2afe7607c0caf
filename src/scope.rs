// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Evaluation Scope
//!
//! The connection and parent exchange that apply to a nested declaration. A scope
//! is an immutable value: entering a connection or an exchange produces the scope
//! of the nested declarations and leaves the outer one untouched, so leaving a
//! scope is simply dropping it.

use crate::{
    broker::{BrokerConnection, ConnectionResolver},
    errors::TopologyError,
};
use std::sync::Arc;

/// Label used in messages for the default connection
pub const DEFAULT_CONNECTION_LABEL: &str = "default";

/// A resolved connection together with the name it was resolved from.
///
/// `name` is `None` when the default connection was used.
#[derive(Clone)]
pub struct ActiveConnection {
    pub name: Option<String>,
    pub handle: Arc<dyn BrokerConnection>,
}

impl ActiveConnection {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CONNECTION_LABEL)
    }
}

/// Active connection and parent exchange of an evaluation.
#[derive(Clone, Default)]
pub struct Scope {
    connection: Option<ActiveConnection>,
    exchange: Option<String>,
}

impl Scope {
    /// The scope of top-level declarations: no connection, no parent exchange.
    pub fn root() -> Scope {
        Scope::default()
    }

    pub fn connection(&self) -> Option<&ActiveConnection> {
        self.connection.as_ref()
    }

    pub fn exchange(&self) -> Option<&str> {
        self.exchange.as_deref()
    }

    /// Opens a connection scope.
    ///
    /// Fails when a connection scope is already active, or when `name` (the
    /// default connection if `None`) cannot be resolved.
    ///
    /// # Parameters
    /// * `resolver` - Resolves connection names
    /// * `name` - The connection to enter, `None` for the default one
    ///
    /// # Returns
    /// The scope of the declarations nested in the connection
    pub fn enter_connection(
        &self,
        resolver: &dyn ConnectionResolver,
        name: Option<&str>,
    ) -> Result<Scope, TopologyError> {
        if let Some(active) = &self.connection {
            return Err(TopologyError::NestedConnection {
                outer: active.label().to_owned(),
                inner: name.unwrap_or(DEFAULT_CONNECTION_LABEL).to_owned(),
            });
        }

        let handle = resolver.resolve(name)?;

        Ok(Scope {
            connection: Some(ActiveConnection {
                name: name.map(str::to_owned),
                handle,
            }),
            exchange: self.exchange.clone(),
        })
    }

    /// Resolves the connection a declaration runs on: the explicit one, else the
    /// scope connection, else the default connection.
    ///
    /// # Parameters
    /// * `resolver` - Resolves connection names
    /// * `explicit` - The connection named by the declaration itself, if any
    pub fn resolve_connection(
        &self,
        resolver: &dyn ConnectionResolver,
        explicit: Option<&str>,
    ) -> Result<ActiveConnection, TopologyError> {
        match (explicit, &self.connection) {
            (Some(name), _) => Ok(ActiveConnection {
                name: Some(name.to_owned()),
                handle: resolver.resolve(Some(name))?,
            }),
            (None, Some(active)) => Ok(active.clone()),
            (None, None) => Ok(ActiveConnection {
                name: None,
                handle: resolver.resolve(None)?,
            }),
        }
    }

    /// Fails when `name` would be declared inside another exchange.
    pub fn ensure_no_parent_exchange(&self, name: &str) -> Result<(), TopologyError> {
        match &self.exchange {
            Some(outer) => Err(TopologyError::NestedExchange {
                outer: outer.clone(),
                inner: name.to_owned(),
            }),
            None => Ok(()),
        }
    }

    /// The scope of the declarations nested in exchange `name`.
    ///
    /// The nested declarations run on the exchange's connection; the outer scope
    /// keeps its own connection, if any.
    pub fn enter_exchange(
        &self,
        name: &str,
        connection: ActiveConnection,
    ) -> Result<Scope, TopologyError> {
        self.ensure_no_parent_exchange(name)?;

        Ok(Scope {
            connection: Some(connection),
            exchange: Some(name.to_owned()),
        })
    }
}
