//! Built-in signal sinks.

use async_trait::async_trait;
use quotewatch_core::error::SinkError;
use quotewatch_core::traits::SignalSink;
use quotewatch_core::types::SignalEvent;
use tokio::sync::mpsc;
use tracing::info;

/// Writes every signal to the log.
#[derive(Debug, Clone, Default)]
pub struct LogSignalSink;

#[async_trait]
impl SignalSink for LogSignalSink {
    async fn emit(&self, event: &SignalEvent) -> Result<(), SinkError> {
        info!(
            symbol = %event.symbol,
            date = %event.date,
            direction = %event.direction,
            strength = event.strength,
            indicators = ?event.contributing_indicators(),
            "Signal"
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// Forwards signals over a bounded channel to whoever delivers them.
#[derive(Debug, Clone)]
pub struct ChannelSignalSink {
    tx: mpsc::Sender<SignalEvent>,
}

impl ChannelSignalSink {
    /// Create a sink and the receiving end of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<SignalEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl SignalSink for ChannelSignalSink {
    async fn emit(&self, event: &SignalEvent) -> Result<(), SinkError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| SinkError::Closed)
    }

    fn name(&self) -> &str {
        "channel"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use quotewatch_core::types::{SignalDirection, SignalRule};

    fn event() -> SignalEvent {
        SignalEvent {
            symbol: "601318".into(),
            date: NaiveDate::from_ymd_opt(2024, 9, 2).unwrap(),
            direction: SignalDirection::Buy,
            strength: 2,
            contributing: vec![SignalRule::MacdGoldenCross, SignalRule::KdjGoldenCross],
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSignalSink::channel(4);
        sink.emit(&event()).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received, event());
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (sink, rx) = ChannelSignalSink::channel(1);
        drop(rx);
        assert_eq!(sink.emit(&event()).await, Err(SinkError::Closed));
    }

    #[tokio::test]
    async fn test_log_sink_never_fails() {
        assert!(LogSignalSink.emit(&event()).await.is_ok());
        assert_eq!(LogSignalSink.name(), "log");
    }
}
