// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Topology Declaration
//!
//! This module provides the engine that materializes a topology on the broker.
//! A topology is a tree of declarations, written with the builder methods of
//! `AmqpTopology` or lowered from flat keyed configuration, and is installed in one
//! pass:
//!
//! 1. Declarations are evaluated depth first, in order. Exchanges are declared as
//!    they are met and the exchange bindings they request are recorded. Queues are
//!    declared and bound to their exchange immediately.
//! 2. Once the whole tree has been walked, every recorded exchange binding is
//!    applied, in the order it was recorded.
//!
//! Configuration errors and failed declarations abort the pass. Failed exchange
//! bindings are logged and skipped.

use crate::{
    bindings::{resolve_bindings, BindingOutcome},
    broker::{release, ConnectionResolver},
    declaration::{decode_exchange, decode_queue, Declaration, Declarations},
    errors::TopologyError,
    exchange::{Exchange, ExchangeBinding},
    keys::KeyPatternResolver,
    properties::ExchangeProperties,
    scope::{ActiveConnection, Scope},
};
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a topology pass did on the broker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyReport {
    pub exchanges: Vec<String>,
    pub queues: Vec<String>,
    /// Queues bound to an exchange, as `(queue, exchange)`.
    pub queue_bindings: Vec<(String, String)>,
    /// Queues whose binding was skipped, as `(queue, reason)`.
    pub skipped_queue_bindings: Vec<(String, String)>,
    pub exchange_bindings: Vec<ExchangeBinding>,
    pub failed_exchange_bindings: Vec<(ExchangeBinding, TopologyError)>,
}

impl TopologyReport {
    fn record_bindings(&mut self, outcome: BindingOutcome) {
        self.exchange_bindings.extend(outcome.applied);
        self.failed_exchange_bindings.extend(outcome.failed);
    }
}

/// Trait defining the interface for topology management.
#[async_trait]
pub trait Topology {
    /// Adds a queue declaration.
    ///
    /// # Parameters
    /// * `parameters` - The queue parameters: `name`, flags, `binding`, `exchange`
    ///
    /// # Returns
    /// Self for method chaining
    fn queue(self, parameters: Value) -> Self;

    /// Adds an exchange declaration.
    ///
    /// # Parameters
    /// * `parameters` - The exchange parameters, including any `bind-to_*` entries
    ///
    /// # Returns
    /// Self for method chaining
    fn exchange(self, parameters: Value) -> Self;

    /// Adds lowered declarations.
    fn declarations(self, declarations: Declarations) -> Self;

    /// Installs the topology on the broker.
    async fn install(&self) -> Result<TopologyReport, TopologyError>;
}

/// State of one topology pass.
#[derive(Default)]
struct Pass {
    deferred: Vec<ExchangeBinding>,
    report: TopologyReport,
}

/// Broker implementation of the Topology trait.
pub struct AmqpTopology {
    resolver: Arc<dyn ConnectionResolver>,
    declarations: Declarations,
}

impl AmqpTopology {
    /// Creates an empty topology.
    ///
    /// # Parameters
    /// * `resolver` - Resolves connection names to broker connections
    ///
    /// # Returns
    /// A new AmqpTopology instance
    pub fn new(resolver: Arc<dyn ConnectionResolver>) -> AmqpTopology {
        AmqpTopology {
            resolver,
            declarations: Declarations::new(),
        }
    }

    /// Creates a topology from flat keyed configuration.
    ///
    /// # Parameters
    /// * `resolver` - Resolves connection names to broker connections
    /// * `config` - A mapping of `<type>_<name>` keys
    ///
    /// # Returns
    /// The topology, or the first invalid key or malformed value
    pub fn from_config(
        resolver: Arc<dyn ConnectionResolver>,
        config: &Map<String, Value>,
    ) -> Result<AmqpTopology, TopologyError> {
        Ok(AmqpTopology::new(resolver).declarations(KeyPatternResolver::resolve(config)?))
    }

    /// Adds an exchange declaration with nested declarations.
    ///
    /// # Parameters
    /// * `parameters` - The exchange parameters
    /// * `nested` - Builds the declarations evaluated with this exchange as parent
    ///
    /// # Returns
    /// Self for method chaining
    pub fn exchange_with<F>(mut self, parameters: Value, nested: F) -> Self
    where
        F: FnOnce(Declarations) -> Declarations,
    {
        self.declarations = self.declarations.exchange_with(parameters, nested);
        self
    }

    /// Adds declarations evaluated on the named connection.
    ///
    /// # Parameters
    /// * `name` - The connection name
    /// * `nested` - Builds the declarations evaluated on that connection
    ///
    /// # Returns
    /// Self for method chaining
    pub fn connection<F>(mut self, name: &str, nested: F) -> Self
    where
        F: FnOnce(Declarations) -> Declarations,
    {
        self.declarations = self.declarations.connection(name, nested);
        self
    }

    /// Declares the exchange described by `props` and applies its bindings.
    ///
    /// The exchange is declared on its configured connection or the default one.
    /// Binding failures are reported, not returned.
    ///
    /// # Parameters
    /// * `props` - A decoded exchange configuration section
    ///
    /// # Returns
    /// What was declared and bound, or the error that stopped the declaration
    pub async fn apply_properties(
        &self,
        props: &ExchangeProperties,
    ) -> Result<TopologyReport, TopologyError> {
        let (exchange, bindings) = props.decode()?;
        let connection =
            Scope::root().resolve_connection(self.resolver.as_ref(), exchange.connection.as_deref())?;

        let mut report = TopologyReport::default();
        self.declare_exchange_on(&connection, &exchange).await?;
        report.exchanges.push(exchange.name);

        report.record_bindings(resolve_bindings(self.resolver.as_ref(), bindings).await);
        Ok(report)
    }

    fn evaluate<'a>(
        &'a self,
        declarations: &'a [Declaration],
        scope: &'a Scope,
        pass: &'a mut Pass,
    ) -> BoxFuture<'a, Result<(), TopologyError>> {
        Box::pin(async move {
            for declaration in declarations {
                match declaration {
                    Declaration::Connection { name, body } => {
                        let nested =
                            scope.enter_connection(self.resolver.as_ref(), name.as_deref())?;
                        self.evaluate(body, &nested, pass).await?;
                    }
                    Declaration::Exchange { parameters, body } => {
                        self.declare_exchange(parameters, body.as_deref(), scope, pass)
                            .await?;
                    }
                    Declaration::Queue { parameters } => {
                        self.declare_queue(parameters, scope, pass).await?;
                    }
                }
            }

            Ok(())
        })
    }

    /// Declares an exchange, records its `bind-to_*` bindings and evaluates its
    /// nested declarations with it as parent exchange.
    async fn declare_exchange(
        &self,
        parameters: &Value,
        nested: Option<&[Declaration]>,
        scope: &Scope,
        pass: &mut Pass,
    ) -> Result<(), TopologyError> {
        let (exchange, bind_to) = decode_exchange(parameters)?;
        scope.ensure_no_parent_exchange(&exchange.name)?;

        let connection =
            scope.resolve_connection(self.resolver.as_ref(), exchange.connection.as_deref())?;
        self.declare_exchange_on(&connection, &exchange).await?;
        pass.report.exchanges.push(exchange.name.clone());

        for entry in bind_to {
            let binding = ExchangeBinding::oriented(
                &exchange.name,
                &entry.exchange,
                &entry.routing_key,
                entry.direction,
                connection.name.clone(),
            );
            debug!(
                source = binding.source.as_str(),
                destination = binding.destination.as_str(),
                routing_key = binding.routing_key.as_str(),
                "exchange binding recorded"
            );
            pass.deferred.push(binding);
        }

        if let Some(body) = nested {
            let inner = scope.enter_exchange(&exchange.name, connection)?;
            self.evaluate(body, &inner, pass).await?;
        }

        Ok(())
    }

    async fn declare_exchange_on(
        &self,
        connection: &ActiveConnection,
        exchange: &Exchange,
    ) -> Result<(), TopologyError> {
        debug!(
            connection = connection.label(),
            "creating exchange: {}", exchange.name
        );

        let channel = connection.handle.open_channel().await?;
        let result = channel.declare_exchange(exchange).await;
        release(channel).await;

        if let Err(err) = result {
            error!(
                error = err.to_string(),
                name = exchange.name.as_str(),
                "error to declare the exchange"
            );
            return Err(err);
        }

        debug!("exchange: {} was created", exchange.name);
        Ok(())
    }

    /// Declares a queue and binds it to its explicit or parent exchange.
    async fn declare_queue(
        &self,
        parameters: &Value,
        scope: &Scope,
        pass: &mut Pass,
    ) -> Result<(), TopologyError> {
        let queue = decode_queue(parameters)?;
        let connection =
            scope.resolve_connection(self.resolver.as_ref(), queue.connection.as_deref())?;

        debug!(connection = connection.label(), "creating queue: {}", queue.name);

        let channel = connection.handle.open_channel().await?;
        let result = channel.declare_queue(&queue).await;
        release(channel).await;

        if let Err(err) = result {
            error!(
                error = err.to_string(),
                name = queue.name.as_str(),
                "error to declare the queue"
            );
            return Err(err);
        }

        debug!("queue: {} was created", queue.name);
        pass.report.queues.push(queue.name.clone());

        let Some(exchange) = queue.exchange.as_deref().or(scope.exchange()) else {
            return Ok(());
        };

        let target = match queue.bind_target() {
            Ok(target) => target,
            Err(reason) => {
                warn!(
                    queue = queue.name.as_str(),
                    exchange, reason, "skipping queue binding"
                );
                pass.report
                    .skipped_queue_bindings
                    .push((queue.name.clone(), reason));
                return Ok(());
            }
        };

        debug!(
            "binding queue: {} to the exchange: {} with the key: {}",
            queue.name,
            exchange,
            target.routing_key()
        );

        let channel = connection.handle.open_channel().await?;
        let result = channel.bind_queue(&queue.name, exchange, &target).await;
        release(channel).await;

        if let Err(err) = result {
            error!(error = err.to_string(), "error to bind queue to exchange");
            return Err(err);
        }

        pass.report
            .queue_bindings
            .push((queue.name.clone(), exchange.to_owned()));
        Ok(())
    }
}

#[async_trait]
impl Topology for AmqpTopology {
    fn queue(mut self, parameters: Value) -> Self {
        self.declarations = self.declarations.queue(parameters);
        self
    }

    fn exchange(mut self, parameters: Value) -> Self {
        self.declarations = self.declarations.exchange(parameters);
        self
    }

    fn declarations(mut self, declarations: Declarations) -> Self {
        for declaration in declarations.as_slice() {
            self.declarations = self.declarations.push(declaration.clone());
        }
        self
    }

    /// Installs the topology on the broker.
    ///
    /// Declarations are evaluated first; exchange bindings are applied only after
    /// every declaration succeeded.
    async fn install(&self) -> Result<TopologyReport, TopologyError> {
        let mut pass = Pass::default();
        self.evaluate(self.declarations.as_slice(), &Scope::root(), &mut pass)
            .await?;

        let Pass {
            deferred,
            mut report,
        } = pass;
        report.record_bindings(resolve_bindings(self.resolver.as_ref(), deferred).await);

        info!(
            exchanges = report.exchanges.len(),
            queues = report.queues.len(),
            queue_bindings = report.queue_bindings.len(),
            skipped_queue_bindings = report.skipped_queue_bindings.len(),
            exchange_bindings = report.exchange_bindings.len(),
            failed_exchange_bindings = report.failed_exchange_bindings.len(),
            "topology installed"
        );

        Ok(report)
    }
}
