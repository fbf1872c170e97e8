//! Signal record sinks.
//!
//! One [`SignalRecord`] is emitted per cycle. Sinks are write-only and
//! best-effort: a failed write is logged and dropped, never surfaced to the
//! trading loop.

use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;
use dr_core::{BotError, SignalRecord};
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

/// Destination for signal records.
#[async_trait]
pub trait SignalSink: Send + Sync {
    async fn write(&self, record: &SignalRecord) -> Result<()>;
}

/// Appends records as JSON lines to a file.
#[derive(Debug, Clone)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

#[async_trait]
impl SignalSink for JsonlSink {
    async fn write(&self, record: &SignalRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).map_err(|e| BotError::Persistence(e.to_string()))?;
        line.push('\n');
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| BotError::Persistence(format!("{}: {e}", self.path.display())))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| BotError::Persistence(format!("{}: {e}", self.path.display())))?;
        Ok(())
    }
}

/// Writes records to the log only. Used when no signal file is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait]
impl SignalSink for LogSink {
    async fn write(&self, record: &SignalRecord) -> Result<()> {
        info!(
            "signal record: model={} signal={} ft={} price={}",
            record.model_id, record.signal_issued, record.ft_value, record.current_price
        );
        Ok(())
    }
}

/// Write `record`, logging and discarding any failure.
pub async fn emit<S: SignalSink + ?Sized>(sink: &S, record: &SignalRecord) {
    if let Err(e) = sink.write(record).await {
        error!("failed to save signal={} with Ft={} - {e:#}", record.signal_issued, record.ft_value);
    }
}

#[cfg(test)]
mod tests {
    use dr_core::Side;

    use super::*;

    fn record(ft: f64) -> SignalRecord {
        SignalRecord::new("models/btc.json", 1_700_000_000_000, Side::Buy, ft, 30_123.456)
    }

    #[tokio::test]
    async fn jsonl_sink_appends_one_line_per_record() {
        let path = std::env::temp_dir().join(format!("dr-engine-sink-{}.jsonl", std::process::id()));
        let _ = tokio::fs::remove_file(&path).await;
        let sink = JsonlSink::new(&path);
        assert_eq!(sink.path(), path.as_path());

        sink.write(&record(0.25)).await.unwrap();
        sink.write(&record(-0.5)).await.unwrap();

        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;
        let rows: Vec<SignalRecord> = content.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ft_value, 0.25);
        assert_eq!(rows[1].current_price, 30_123.46);
        assert!(content.contains("\"signalIssued\":\"BUY\""));
    }

    #[tokio::test]
    async fn write_failure_is_persistence_error() {
        // A directory cannot be opened for appending.
        let sink = JsonlSink::new(std::env::temp_dir());
        let err = sink.write(&record(0.1)).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<BotError>(), Some(BotError::Persistence(_))));
    }

    #[tokio::test]
    async fn emit_swallows_failures() {
        emit(&JsonlSink::new(std::env::temp_dir()), &record(0.1)).await;
        emit(&LogSink, &record(0.1)).await;
    }
}
