// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

#[cfg(test)]
mod test_support;

pub mod bindings;
pub mod broker;
pub mod channel;
pub mod config;
pub mod declaration;
pub mod errors;
pub mod exchange;
pub mod keys;
pub mod properties;
pub mod queue;
pub mod scope;
pub mod topology;
