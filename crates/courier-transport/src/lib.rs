//! # Courier Transport
//!
//! HTTP Bot API implementation of the [`Transport`](courier_core::Transport)
//! trait defined in `courier-core`.
//!
//! ## Features
//!
//! - `http-client` (default): the reqwest-based [`BotApiClient`]
//!
//! Envelope interpretation and request building are always available and do
//! no I/O.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │  courier-runtime    │  (poll loop)
//! ├─────────────────────┤
//! │  courier-core       │  (Transport trait)
//! ├─────────────────────┤
//! │  courier-transport  │  <- This crate
//! ├─────────────────────┤
//! │  Bot API over HTTPS │
//! └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use courier_transport::{BotApiClient, BotApiConfig};
//! use courier_core::Transport;
//! use std::time::Duration;
//!
//! let client = BotApiClient::new(BotApiConfig::new(token))?;
//! let updates = client.fetch(0, Duration::from_secs(30)).await?;
//! ```

pub mod envelope;
pub mod request;

#[cfg(feature = "http-client")]
pub mod client;

pub use envelope::{interpret, parse_ack, parse_updates};
pub use request::{GetUpdates, action_request};

#[cfg(feature = "http-client")]
pub use client::{BotApiClient, BotApiConfig, DEFAULT_BASE_URL};
