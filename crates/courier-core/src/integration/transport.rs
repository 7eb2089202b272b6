//! The transport capability consumed by the engine.
//!
//! The engine does not know how updates are fetched or how actions are
//! delivered; it only depends on this trait. Implementations live in
//! `courier-transport` (HTTP Bot API) or in tests (scripted transports).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::foundation::update::{Update, UpdateId};
use crate::integration::action::{Ack, Action};

/// Fetches updates and delivers actions.
///
/// Each call performs exactly one underlying attempt. Retry policy belongs to
/// the poll loop, not to implementations of this trait.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches pending updates with `id >= cursor`, in ascending id order.
    ///
    /// Blocks for up to `timeout` waiting for at least one update and returns
    /// an empty vector if none arrived.
    async fn fetch(&self, cursor: UpdateId, timeout: Duration) -> TransportResult<Vec<Update>>;

    /// Delivers an action to its target.
    async fn send(&self, action: Action) -> TransportResult<Ack>;
}

/// A shared, type-erased transport.
pub type BoxedTransport = Arc<dyn Transport>;

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn fetch(&self, cursor: UpdateId, timeout: Duration) -> TransportResult<Vec<Update>> {
        (**self).fetch(cursor, timeout).await
    }

    async fn send(&self, action: Action) -> TransportResult<Ack> {
        (**self).send(action).await
    }
}
