// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Connection and Channel Management
//!
//! This module implements the broker collaborators on top of `lapin`. It establishes
//! the configured connections, keeps them in a named registry that resolves
//! connection names for the topology engine, and opens the short-lived channels
//! every declare and bind call runs on.

use crate::{
    broker::{BrokerChannel, BrokerConnection, ConnectionResolver},
    config::{AmqpConfigs, RabbitMQConfigs},
    errors::TopologyError,
    exchange::Exchange,
    queue::{Queue, QueueBindTarget},
};
use async_trait::async_trait;
use lapin::{
    options::{ExchangeBindOptions, ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions},
    types::{AMQPValue, FieldArray, FieldTable, LongString, ShortString},
    Channel, Connection, ConnectionProperties,
};
use serde_json::{Map, Value};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};
use tracing::{debug, error};

/// Reply code sent when a channel is closed normally
pub const AMQP_REPLY_SUCCESS: u16 = 200;

/// Converts JSON arguments to an AMQP field table.
pub fn field_table(args: &Map<String, Value>) -> FieldTable {
    let mut table = BTreeMap::new();
    for (key, value) in args {
        table.insert(ShortString::from(key.as_str()), amqp_value(value));
    }
    FieldTable::from(table)
}

fn amqp_value(value: &Value) -> AMQPValue {
    match value {
        Value::Null => AMQPValue::Void,
        Value::Bool(b) => AMQPValue::Boolean(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => AMQPValue::LongLongInt(i),
            None => AMQPValue::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => AMQPValue::LongString(LongString::from(s.as_str())),
        Value::Array(items) => AMQPValue::FieldArray(FieldArray::from(
            items.iter().map(amqp_value).collect::<Vec<_>>(),
        )),
        Value::Object(map) => AMQPValue::FieldTable(field_table(map)),
    }
}

/// A `lapin` connection usable by the topology engine.
pub struct AmqpConnection {
    name: String,
    conn: Connection,
}

impl AmqpConnection {
    /// Establishes a connection using the given settings.
    ///
    /// # Parameters
    /// * `name` - The name the connection is registered under
    /// * `app_name` - Reported to the broker as the connection name
    /// * `cfg` - Host, port, credentials and virtual host
    pub async fn connect(
        name: &str,
        app_name: &str,
        cfg: &RabbitMQConfigs,
    ) -> Result<AmqpConnection, TopologyError> {
        debug!(connection = name, "creating amqp connection...");
        let options =
            ConnectionProperties::default().with_connection_name(LongString::from(app_name));

        match Connection::connect(&cfg.uri(), options).await {
            Ok(conn) => {
                debug!(connection = name, "amqp connected");
                Ok(AmqpConnection {
                    name: name.to_owned(),
                    conn,
                })
            }
            Err(err) => {
                error!(error = err.to_string(), connection = name, "failure to connect");
                Err(TopologyError::ConnectionError(
                    name.to_owned(),
                    err.to_string(),
                ))
            }
        }
    }
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    fn is_open(&self) -> bool {
        self.conn.status().connected()
    }

    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, TopologyError> {
        match self.conn.create_channel().await {
            Ok(channel) => {
                debug!(connection = self.name.as_str(), "channel created");
                Ok(Box::new(AmqpChannel { channel }))
            }
            Err(err) => {
                error!(
                    error = err.to_string(),
                    connection = self.name.as_str(),
                    "error to create the channel"
                );
                Err(TopologyError::ChannelError(err.to_string()))
            }
        }
    }
}

/// A `lapin` channel issuing topology declarations.
pub struct AmqpChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_exchange(&self, exchange: &Exchange) -> Result<(), TopologyError> {
        self.channel
            .exchange_declare(
                &exchange.name,
                exchange.kind.into(),
                ExchangeDeclareOptions {
                    passive: false,
                    durable: exchange.durable,
                    auto_delete: exchange.auto_delete,
                    internal: false,
                    nowait: false,
                },
                field_table(&exchange.arguments),
            )
            .await
            .map_err(|err| TopologyError::DeclareExchangeError(exchange.name.clone(), err.to_string()))
    }

    async fn declare_queue(&self, queue: &Queue) -> Result<(), TopologyError> {
        self.channel
            .queue_declare(
                &queue.name,
                QueueDeclareOptions {
                    passive: false,
                    durable: queue.durable,
                    exclusive: queue.exclusive,
                    auto_delete: queue.auto_delete,
                    nowait: false,
                },
                field_table(&queue.arguments),
            )
            .await
            .map(|_| ())
            .map_err(|err| TopologyError::DeclareQueueError(queue.name.clone(), err.to_string()))
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        target: &QueueBindTarget,
    ) -> Result<(), TopologyError> {
        self.channel
            .queue_bind(
                queue,
                exchange,
                target.routing_key(),
                QueueBindOptions { nowait: false },
                field_table(&target.arguments()),
            )
            .await
            .map_err(|err| TopologyError::BindingExchangeToQueueError {
                exchange: exchange.to_owned(),
                queue: queue.to_owned(),
                cause: err.to_string(),
            })
    }

    async fn bind_exchange(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), TopologyError> {
        self.channel
            .exchange_bind(
                destination,
                source,
                routing_key,
                ExchangeBindOptions { nowait: false },
                FieldTable::default(),
            )
            .await
            .map_err(|err| TopologyError::BindingExchangeToExchangeError {
                origin: source.to_owned(),
                destination: destination.to_owned(),
                cause: err.to_string(),
            })
    }

    async fn close(&self) -> Result<(), TopologyError> {
        self.channel
            .close(AMQP_REPLY_SUCCESS, "OK")
            .await
            .map_err(|err| TopologyError::ChannelError(err.to_string()))
    }
}

/// Named registry of established connections.
///
/// Resolves connection names for the topology engine. A connection that reports
/// it is no longer open is refused rather than handed out.
#[derive(Default, Clone)]
pub struct AmqpConnections {
    default: Option<String>,
    connections: HashMap<String, Arc<dyn BrokerConnection>>,
}

impl AmqpConnections {
    /// Creates an empty registry.
    pub fn new() -> AmqpConnections {
        AmqpConnections::default()
    }

    /// Establishes every configured connection.
    ///
    /// # Parameters
    /// * `cfgs` - Application name, named connection settings and default name
    ///
    /// # Returns
    /// A registry holding one open connection per configured name
    pub async fn connect(cfgs: &AmqpConfigs) -> Result<AmqpConnections, TopologyError> {
        cfgs.validate()?;

        let mut registry = AmqpConnections::new();
        for (name, cfg) in &cfgs.connections {
            let conn = AmqpConnection::connect(name, &cfgs.app_name, cfg).await?;
            registry = registry.register(name, Arc::new(conn));
        }

        match &cfgs.default_connection {
            Some(name) => Ok(registry.default_connection(name)),
            None => Ok(registry),
        }
    }

    /// Registers a connection under `name`.
    pub fn register(mut self, name: &str, conn: Arc<dyn BrokerConnection>) -> Self {
        self.connections.insert(name.to_owned(), conn);
        self
    }

    /// Names the connection used when a declaration names none.
    pub fn default_connection(mut self, name: &str) -> Self {
        self.default = Some(name.to_owned());
        self
    }
}

impl ConnectionResolver for AmqpConnections {
    fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn BrokerConnection>, TopologyError> {
        let name = match name.or(self.default.as_deref()) {
            Some(name) => name,
            None => return Err(TopologyError::NoDefaultConnection),
        };

        let Some(conn) = self.connections.get(name) else {
            error!(connection = name, "unknown connection");
            return Err(TopologyError::UnresolvedConnection(name.to_owned()));
        };

        if !conn.is_open() {
            error!(connection = name, "connection is no longer open");
            return Err(TopologyError::ConnectionUnavailable(name.to_owned()));
        }

        Ok(conn.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MockBrokerConnection;
    use serde_json::json;

    fn connection(open: bool) -> Arc<dyn BrokerConnection> {
        let mut conn = MockBrokerConnection::new();
        conn.expect_is_open().return_const(open);
        Arc::new(conn)
    }

    #[test]
    fn converts_arguments() {
        let args = json!({
            "x-message-ttl": 60000,
            "x-dead-letter-exchange": "dlx",
            "flag": true,
            "ratio": 0.5,
            "nested": {"list": [1, "two"]},
        });
        let table = field_table(args.as_object().unwrap());
        let inner = table.inner();

        assert_eq!(inner.get(&ShortString::from("x-message-ttl")), Some(&AMQPValue::LongLongInt(60000)));
        assert_eq!(
            inner.get(&ShortString::from("x-dead-letter-exchange")),
            Some(&AMQPValue::LongString(LongString::from("dlx")))
        );
        assert_eq!(inner.get(&ShortString::from("flag")), Some(&AMQPValue::Boolean(true)));
        assert_eq!(inner.get(&ShortString::from("ratio")), Some(&AMQPValue::Double(0.5)));
        assert!(matches!(inner.get(&ShortString::from("nested")), Some(AMQPValue::FieldTable(_))));
    }

    #[test]
    fn resolves_named_and_default_connections() {
        let registry = AmqpConnections::new()
            .register("main", connection(true))
            .register("audit", connection(true))
            .default_connection("main");

        assert!(registry.resolve(Some("audit")).is_ok());
        assert!(registry.resolve(None).is_ok());
    }

    #[test]
    fn fails_on_unknown_name() {
        let registry = AmqpConnections::new().register("main", connection(true));

        assert_eq!(
            registry.resolve(Some("ghost")).err(),
            Some(TopologyError::UnresolvedConnection("ghost".to_owned()))
        );
    }

    #[test]
    fn fails_without_default() {
        let registry = AmqpConnections::new().register("main", connection(true));

        assert_eq!(
            registry.resolve(None).err(),
            Some(TopologyError::NoDefaultConnection)
        );
    }

    #[test]
    fn refuses_closed_connection() {
        let registry = AmqpConnections::new()
            .register("main", connection(false))
            .default_connection("main");

        assert_eq!(
            registry.resolve(None).err(),
            Some(TopologyError::ConnectionUnavailable("main".to_owned()))
        );
    }
}
