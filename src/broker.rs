// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Broker Collaborators
//!
//! The topology engine talks to the broker only through the traits in this module:
//! a resolver that turns a connection name into a live connection, and the scoped
//! channel such a connection opens. The `channel` module implements them on top of
//! `lapin`; tests substitute in-memory implementations.

use crate::{errors::TopologyError, exchange::Exchange, queue::Queue, queue::QueueBindTarget};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A channel able to declare and bind topology entities.
///
/// Channels are opened for a single operation and closed right after it,
/// whatever its outcome.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Declares an exchange.
    async fn declare_exchange(&self, exchange: &Exchange) -> Result<(), TopologyError>;

    /// Declares a queue.
    async fn declare_queue(&self, queue: &Queue) -> Result<(), TopologyError>;

    /// Binds `queue` to `exchange` by routing key or header match.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        target: &QueueBindTarget,
    ) -> Result<(), TopologyError>;

    /// Binds `destination` to `source` so that messages published to `source`
    /// with a matching routing key reach `destination`.
    async fn bind_exchange(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), TopologyError>;

    /// Closes the channel.
    async fn close(&self) -> Result<(), TopologyError>;
}

/// An established broker connection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Reports whether the connection can still open channels.
    fn is_open(&self) -> bool;

    /// Opens a new channel on this connection.
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, TopologyError>;
}

/// Resolves connection names to established connections.
pub trait ConnectionResolver: Send + Sync {
    /// Resolves `name`, or the default connection when `name` is `None`.
    ///
    /// Fails with `UnresolvedConnection` for an unknown name and with
    /// `NoDefaultConnection` when no name is given and no default exists.
    fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn BrokerConnection>, TopologyError>;
}

/// Releases a channel, logging a failed close instead of propagating it.
pub(crate) async fn release(channel: Box<dyn BrokerChannel>) {
    match channel.close().await {
        Err(err) => warn!(error = err.to_string(), "failure to close the channel"),
        _ => debug!("channel released"),
    }
}
