// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types for Topology Declaration
//!
//! This module provides the error type shared by every stage of a topology pass.
//! The `TopologyError` enum covers structural configuration errors, which abort the
//! pass at the point of detection, and broker-level failures reported by the
//! channel collaborator.

use thiserror::Error;

/// Represents errors that can occur while declaring a broker topology.
///
/// Configuration variants identify the offending key or name so a single message
/// is enough to locate the mistake. Broker variants carry the entity name and the
/// cause reported by the broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopologyError {
    /// A required field is absent from a declaration
    #[error("missing required field `{field}` in {entity} declaration")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    /// The exchange type is not one of the supported tokens
    #[error("unknown exchange type `{0}`, expected one of direct, fanout, topic, headers")]
    UnknownExchangeType(String),

    /// A configuration key does not follow the `<type>_<name>` grammar
    #[error("configuration key `{0}` does not match `<queue|connection|exchange>_<name>`")]
    InvalidKey(String),

    /// A `bind-to_*` or `exchangeBindings` entry could not be understood
    #[error("malformed exchange binding `{key}`: {reason}")]
    MalformedBinding { key: String, reason: String },

    /// Declaration parameters could not be decoded
    #[error("malformed parameters for `{name}`: {reason}")]
    MalformedParameters { name: String, reason: String },

    /// An exchange was declared while another exchange scope was active
    #[error("exchange `{inner}` cannot be declared inside exchange `{outer}`")]
    NestedExchange { outer: String, inner: String },

    /// A connection scope was opened while another one was active
    #[error("connection scope `{inner}` cannot be opened inside connection scope `{outer}`")]
    NestedConnection { outer: String, inner: String },

    /// The connection name could not be resolved
    #[error("connection `{0}` could not be resolved")]
    UnresolvedConnection(String),

    /// No connection was named and no default connection is configured
    #[error("no connection was named and no default connection is configured")]
    NoDefaultConnection,

    /// The resolved connection is no longer open
    #[error("connection `{0}` is no longer open")]
    ConnectionUnavailable(String),

    /// Error establishing a connection to the broker
    #[error("failure to connect `{0}`: {1}")]
    ConnectionError(String, String),

    /// Error creating a channel from an established connection
    #[error("failure to create a channel: {0}")]
    ChannelError(String),

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`: {1}")]
    DeclareExchangeError(String, String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`: {1}")]
    DeclareQueueError(String, String),

    /// Error binding a queue to an exchange
    #[error("failure to bind queue `{queue}` to exchange `{exchange}`: {cause}")]
    BindingExchangeToQueueError {
        exchange: String,
        queue: String,
        cause: String,
    },

    /// Error binding an exchange to another exchange
    #[error("failure to bind exchange `{destination}` to exchange `{origin}`: {cause}")]
    BindingExchangeToExchangeError {
        origin: String,
        destination: String,
        cause: String,
    },

    /// Error reading or parsing a configuration document
    #[error("failure to load configuration `{0}`: {1}")]
    ConfigurationError(String, String),
}
