// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! In-memory broker recording every successful declare and bind call.

use crate::{
    broker::{BrokerChannel, BrokerConnection},
    channel::AmqpConnections,
    errors::TopologyError,
    exchange::{Exchange, ExchangeKind},
    queue::{Queue, QueueBindTarget},
};
use async_trait::async_trait;
use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Op {
    DeclareExchange {
        connection: String,
        name: String,
        kind: ExchangeKind,
        durable: bool,
    },
    DeclareQueue {
        connection: String,
        name: String,
        durable: bool,
    },
    BindQueue {
        connection: String,
        queue: String,
        exchange: String,
        target: QueueBindTarget,
    },
    BindExchange {
        connection: String,
        destination: String,
        source: String,
        routing_key: String,
    },
}

impl Op {
    pub(crate) fn declare_exchange(connection: &str, name: &str, kind: ExchangeKind) -> Op {
        Op::DeclareExchange {
            connection: connection.to_owned(),
            name: name.to_owned(),
            kind,
            durable: false,
        }
    }

    pub(crate) fn declare_queue(connection: &str, name: &str) -> Op {
        Op::DeclareQueue {
            connection: connection.to_owned(),
            name: name.to_owned(),
            durable: false,
        }
    }

    pub(crate) fn bind_queue(connection: &str, queue: &str, exchange: &str, key: &str) -> Op {
        Op::BindQueue {
            connection: connection.to_owned(),
            queue: queue.to_owned(),
            exchange: exchange.to_owned(),
            target: QueueBindTarget::RoutingKey(key.to_owned()),
        }
    }

    pub(crate) fn bind_exchange(
        connection: &str,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Op {
        Op::BindExchange {
            connection: connection.to_owned(),
            destination: destination.to_owned(),
            source: source.to_owned(),
            routing_key: routing_key.to_owned(),
        }
    }

    pub(crate) fn is_declare_exchange(&self) -> bool {
        matches!(self, Op::DeclareExchange { .. })
    }

    pub(crate) fn is_bind_exchange(&self) -> bool {
        matches!(self, Op::BindExchange { .. })
    }
}

#[derive(Default)]
struct Shared {
    ops: Mutex<Vec<Op>>,
    failures: Mutex<HashSet<String>>,
    closed: Mutex<HashSet<String>>,
    opened: AtomicUsize,
    released: AtomicUsize,
}

impl Shared {
    fn run(&self, key: String, op: Op, err: TopologyError) -> Result<(), TopologyError> {
        if self.failures.lock().unwrap().contains(&key) {
            return Err(err);
        }
        self.ops.lock().unwrap().push(op);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingBroker {
    shared: Arc<Shared>,
}

impl RecordingBroker {
    pub(crate) fn new() -> RecordingBroker {
        RecordingBroker::default()
    }

    /// Registry holding one recording connection per name.
    pub(crate) fn resolver(&self, names: &[&str], default: Option<&str>) -> AmqpConnections {
        let mut registry = AmqpConnections::new();
        for name in names {
            let conn = FakeConnection {
                name: (*name).to_owned(),
                shared: self.shared.clone(),
            };
            registry = registry.register(name, Arc::new(conn));
        }
        match default {
            Some(name) => registry.default_connection(name),
            None => registry,
        }
    }

    /// Makes the call identified by `key` fail, e.g. `declare_queue:created`,
    /// `bind_queue:created<-orders` or `bind_exchange:notifications<-orders`.
    pub(crate) fn fail_on(&self, key: &str) {
        self.shared.failures.lock().unwrap().insert(key.to_owned());
    }

    pub(crate) fn close_connection(&self, name: &str) {
        self.shared.closed.lock().unwrap().insert(name.to_owned());
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.shared.ops.lock().unwrap().clone()
    }

    pub(crate) fn assert_channels_released(&self) {
        assert_eq!(
            self.shared.opened.load(Ordering::SeqCst),
            self.shared.released.load(Ordering::SeqCst),
            "every opened channel must be closed"
        );
    }
}

struct FakeConnection {
    name: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl BrokerConnection for FakeConnection {
    fn is_open(&self) -> bool {
        !self.shared.closed.lock().unwrap().contains(&self.name)
    }

    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, TopologyError> {
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeChannel {
            connection: self.name.clone(),
            shared: self.shared.clone(),
        }))
    }
}

struct FakeChannel {
    connection: String,
    shared: Arc<Shared>,
}

#[async_trait]
impl BrokerChannel for FakeChannel {
    async fn declare_exchange(&self, exchange: &Exchange) -> Result<(), TopologyError> {
        self.shared.run(
            format!("declare_exchange:{}", exchange.name),
            Op::DeclareExchange {
                connection: self.connection.clone(),
                name: exchange.name.clone(),
                kind: exchange.kind,
                durable: exchange.durable,
            },
            TopologyError::DeclareExchangeError(exchange.name.clone(), "injected".to_owned()),
        )
    }

    async fn declare_queue(&self, queue: &Queue) -> Result<(), TopologyError> {
        self.shared.run(
            format!("declare_queue:{}", queue.name),
            Op::DeclareQueue {
                connection: self.connection.clone(),
                name: queue.name.clone(),
                durable: queue.durable,
            },
            TopologyError::DeclareQueueError(queue.name.clone(), "injected".to_owned()),
        )
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        target: &QueueBindTarget,
    ) -> Result<(), TopologyError> {
        self.shared.run(
            format!("bind_queue:{queue}<-{exchange}"),
            Op::BindQueue {
                connection: self.connection.clone(),
                queue: queue.to_owned(),
                exchange: exchange.to_owned(),
                target: target.clone(),
            },
            TopologyError::BindingExchangeToQueueError {
                exchange: exchange.to_owned(),
                queue: queue.to_owned(),
                cause: "injected".to_owned(),
            },
        )
    }

    async fn bind_exchange(
        &self,
        destination: &str,
        source: &str,
        routing_key: &str,
    ) -> Result<(), TopologyError> {
        self.shared.run(
            format!("bind_exchange:{destination}<-{source}"),
            Op::bind_exchange(&self.connection, destination, source, routing_key),
            TopologyError::BindingExchangeToExchangeError {
                origin: source.to_owned(),
                destination: destination.to_owned(),
                cause: "injected".to_owned(),
            },
        )
    }

    async fn close(&self) -> Result<(), TopologyError> {
        self.shared.released.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
