//! # Reports
//!
//! Writes the final document of each completed run to the reports directory.

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use verdict_core::workflow::{EventSubscription, FinalDocument, WorkflowEvent};

/// Write `document` under `dir`, creating the directory if needed
pub async fn write_report(dir: &Path, document: &FinalDocument) -> anyhow::Result<PathBuf> {
    // Only the file name part is honoured; the renderer never picks the directory
    let name = Path::new(&document.filename)
        .file_name()
        .with_context(|| format!("Invalid report filename '{}'", document.filename))?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create reports directory {}", dir.display()))?;
    let path = dir.join(name);
    tokio::fs::write(&path, &document.content)
        .await
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(path)
}

/// Persist every completion seen on `events` until the bus goes away
pub async fn archive_completions(mut events: EventSubscription, dir: Arc<PathBuf>) {
    while let Some(envelope) = events.recv().await {
        let WorkflowEvent::Completion { final_document, .. } = envelope.event else {
            continue;
        };
        match write_report(&dir, &final_document).await {
            Ok(path) => tracing::info!(
                run_id = %envelope.run_id,
                path = %path.display(),
                "Final document written"
            ),
            Err(e) => tracing::error!(
                run_id = %envelope.run_id,
                error = %format!("{:#}", e),
                "Could not write final document"
            ),
        }
    }
}
