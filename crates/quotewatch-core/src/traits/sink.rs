//! Notification sink trait.

use crate::error::SinkError;
use crate::types::SignalEvent;
use async_trait::async_trait;

/// Receiver of signal events. Delivery and formatting are the sink's concern.
#[async_trait]
pub trait SignalSink: Send + Sync {
    /// Hand over one event.
    async fn emit(&self, event: &SignalEvent) -> Result<(), SinkError>;

    /// Get the sink name.
    fn name(&self) -> &str;
}
