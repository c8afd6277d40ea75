//! EVM JSON-RPC implementation of the chain client.

pub mod client;
pub mod error;
pub mod provider;

pub use client::EvmChainClient;
pub use provider::FallbackProvider;
