// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Binding Resolution
//!
//! Exchange-to-exchange bindings are recorded while exchanges are declared and
//! applied here, once the whole topology has been walked, so that both ends of
//! every binding exist. A failing binding is logged and skipped; it never undoes
//! earlier declarations nor stops the remaining bindings.

use crate::{
    broker::{release, ConnectionResolver},
    errors::TopologyError,
    exchange::ExchangeBinding,
};
use tracing::{debug, warn};

/// Outcome of a binding resolution pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BindingOutcome {
    pub applied: Vec<ExchangeBinding>,
    pub failed: Vec<(ExchangeBinding, TopologyError)>,
}

/// Applies `bindings` in the order they were recorded.
///
/// The connection of each binding is resolved again by name at this point, so a
/// connection that closed since the binding was recorded fails that binding only.
pub async fn resolve_bindings(
    resolver: &dyn ConnectionResolver,
    bindings: Vec<ExchangeBinding>,
) -> BindingOutcome {
    let mut outcome = BindingOutcome::default();

    for binding in bindings {
        debug!(
            "binding exchange: {} to the exchange: {} with the key: {}",
            binding.destination, binding.source, binding.routing_key
        );

        match apply_binding(resolver, &binding).await {
            Ok(()) => outcome.applied.push(binding),
            Err(err) => {
                warn!(
                    error = err.to_string(),
                    source = binding.source.as_str(),
                    destination = binding.destination.as_str(),
                    routing_key = binding.routing_key.as_str(),
                    "failure to bind exchanges, skipping"
                );
                outcome.failed.push((binding, err));
            }
        }
    }

    debug!(
        applied = outcome.applied.len(),
        failed = outcome.failed.len(),
        "exchange bindings resolved"
    );

    outcome
}

async fn apply_binding(
    resolver: &dyn ConnectionResolver,
    binding: &ExchangeBinding,
) -> Result<(), TopologyError> {
    let connection = resolver.resolve(binding.connection.as_deref())?;
    let channel = connection.open_channel().await?;

    let result = channel
        .bind_exchange(&binding.destination, &binding.source, &binding.routing_key)
        .await;
    release(channel).await;

    result
}
