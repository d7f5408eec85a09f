use std::path::Path;

use visus_core::sync::{PushAck, PushError, PushPayload, RemoteSink, SyncWorker};
use visus_core::Destination;

use crate::commands::common::{load_settings, open_all_sources, open_database};
use crate::error::CliError;

/// Prints each payload as one JSON line and acknowledges it
pub struct StdoutSink;

impl RemoteSink for StdoutSink {
    async fn push(
        &self,
        _destination: Destination,
        payload: &PushPayload,
    ) -> Result<PushAck, PushError> {
        let line =
            serde_json::to_string(payload).map_err(|error| PushError::Rejected(error.to_string()))?;
        println!("{line}");
        Ok(PushAck::accepted())
    }
}

pub async fn run_drain(
    destination: Destination,
    batch_size: Option<usize>,
    settings_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let settings = load_settings(settings_path)?;
    let batch_size = batch_size.unwrap_or(settings.batch_size);
    if batch_size == 0 {
        return Err(visus_core::Error::Config("batch size must be greater than 0".into()).into());
    }

    let db = open_database(db_path)?;
    let worker = SyncWorker::new(
        destination,
        StdoutSink,
        open_all_sources(&db)?,
        batch_size,
        settings.push_timeout(),
    );
    let report = worker.run_cycle().await?;

    eprintln!(
        "{destination}: attempted={} acknowledged={} retired={} stale={} failed={} remaining={}",
        report.attempted,
        report.acknowledged,
        report.retired,
        report.stale,
        report.failed,
        worker.pending()?
    );
    Ok(())
}
