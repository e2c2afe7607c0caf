// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

use rabbitmq_topology::{
    errors::TopologyError,
    exchange::{ExchangeBinding, ExchangeKind},
    properties::ExchangeProperties,
};
use serde_json::json;

#[test]
fn decodes_a_full_section() {
    let props = ExchangeProperties::from_json_str(
        r##"{
            "name": "notifications",
            "type": "topic",
            "durable": true,
            "autoDelete": true,
            "arguments": {"alternate-exchange": "unrouted"},
            "connection": "audit",
            "exchangeBindings": [
                {"exchange": "orders", "binding": "order.#"},
                {"exchange": "trail", "binding": "#", "as": "source"},
                {"exchange": "billing", "binding": "invoice.*", "as": "destination"}
            ]
        }"##,
    )
    .unwrap();

    let (exchange, bindings) = props.decode().unwrap();

    assert_eq!(exchange.name, "notifications");
    assert_eq!(exchange.kind, ExchangeKind::Topic);
    assert!(exchange.durable);
    assert!(exchange.auto_delete);
    assert_eq!(exchange.arguments.get("alternate-exchange"), Some(&json!("unrouted")));
    assert_eq!(exchange.connection.as_deref(), Some("audit"));

    let pairs: Vec<(&str, &str, &str)> = bindings
        .iter()
        .map(|b: &ExchangeBinding| (b.source.as_str(), b.destination.as_str(), b.routing_key.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("orders", "notifications", "order.#"),
            ("notifications", "trail", "#"),
            ("billing", "notifications", "invoice.*"),
        ]
    );
    assert!(bindings
        .iter()
        .all(|b| b.connection.as_deref() == Some("audit")));
}

#[test]
fn validate_requires_name_and_type() {
    let missing_name = ExchangeProperties::from_value(json!({"type": "fanout"})).unwrap();
    assert_eq!(
        missing_name.validate(),
        Err(TopologyError::MissingField {
            entity: "exchange",
            field: "name"
        })
    );

    let missing_type = ExchangeProperties::from_value(json!({"name": "orders"})).unwrap();
    assert_eq!(
        missing_type.validate(),
        Err(TopologyError::MissingField {
            entity: "exchange",
            field: "type"
        })
    );
    assert!(missing_type.decode().is_err());
}

#[test]
fn only_known_exchange_types_are_accepted() {
    for kind in ["direct", "fanout", "topic", "headers"] {
        let props = ExchangeProperties::from_value(json!({"name": "x", "type": kind})).unwrap();
        assert_eq!(props.exchange().unwrap().kind.as_str(), kind);
    }

    for kind in ["DIRECT", "x-consistent-hash", ""] {
        let result = ExchangeProperties::from_value(json!({"name": "x", "type": kind}))
            .and_then(|props| props.exchange());
        assert!(result.is_err(), "{kind}");
    }
}

#[test]
fn rejects_unknown_binding_direction() {
    let props = ExchangeProperties::from_value(json!({
        "name": "orders",
        "type": "topic",
        "exchangeBindings": [{"exchange": "audit", "as": "upstream"}]
    }))
    .unwrap();

    assert!(matches!(
        props.bindings(),
        Err(TopologyError::MalformedBinding { .. })
    ));
}

#[test]
fn rejects_malformed_documents() {
    assert!(matches!(
        ExchangeProperties::from_json_str(r#"{"name": "orders", "durable": "yes"}"#),
        Err(TopologyError::ConfigurationError(..))
    ));
}
