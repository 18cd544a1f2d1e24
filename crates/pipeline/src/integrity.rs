//! Check → repair → recheck, for formats with a validator.
//!
//! The `attempted_fix` flag on the file's node is the circuit breaker: once
//! set, the file is accepted as-is on every later event, so a file that can't
//! be fixed is never fed to the repairer twice.

use crate::dispatcher::Context;
use crate::error::{ErrorKind, Result};
use crate::event::IngestionEvent;
use crate::scratch::Scratch;
use exn::ResultExt;
use maw_inspect::Verdict;
use maw_storage::UploadMeta;
use std::io::ErrorKind as IoErrorKind;
use std::path::Path;

/// Where the integrity stage leaves an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    /// Carry on with fingerprinting and persistence.
    Accepted { attempted_fix: bool },
    /// A repaired replacement was uploaded; its own CREATE event takes over.
    Repaired,
}

pub(crate) async fn inspect(ctx: &Context, event: &IngestionEvent, scratch: &Scratch, mime: &str) -> Result<Gate> {
    if !ctx.checker.applies_to(mime) {
        return Ok(Gate::Accepted { attempted_fix: false });
    }
    let identity = event.identity();
    let known = ctx.repository.lookup(&identity).await.or_raise(|| ErrorKind::Persistence)?;
    if known.is_some_and(|state| state.attempted_fix) {
        tracing::debug!("Repair already attempted; accepting file as-is");
        return Ok(Gate::Accepted { attempted_fix: true });
    }

    let source = scratch.source();
    let verdict = match ctx.checker.check(&source).await {
        Ok(verdict) => verdict,
        Err(e) if e.never_started() => return Err(e).or_raise(|| ErrorKind::Integrity),
        // A check that ran but did not finish says nothing about the file.
        Err(e) => {
            tracing::warn!(error = ?e, "Integrity check did not complete; accepting file unchecked");
            return Ok(Gate::Accepted { attempted_fix: false });
        }
    };
    let diagnostics = match verdict {
        Verdict::Valid => return Ok(Gate::Accepted { attempted_fix: false }),
        Verdict::ValidWithWarnings { diagnostics } => {
            tracing::info!(%diagnostics, "File is valid with warnings");
            return Ok(Gate::Accepted { attempted_fix: false });
        }
        Verdict::Corrupt { diagnostics } => diagnostics,
    };
    tracing::warn!(%diagnostics, "File failed integrity check; attempting repair");

    let candidate = scratch.repaired();
    let repaired = match ctx.repairer.repair(&source, &candidate).await {
        // The repairer never ran, so there is no attempt to record.
        Err(e) if e.never_started() => {
            return Err(e).or_raise(|| ErrorKind::Repair);
        }
        other => other,
    };
    // From here on the repairer has run, whatever it achieved.
    ctx.repository.mark_repair_attempted(&identity).await.or_raise(|| ErrorKind::Persistence)?;

    let accepted = Gate::Accepted { attempted_fix: true };
    match repaired {
        Ok(Verdict::Corrupt { diagnostics }) => {
            tracing::warn!(%diagnostics, "Repair failed; keeping the original file");
            abandon(&candidate).await;
            return Ok(accepted);
        }
        Err(e) => {
            tracing::warn!(error = ?e, "Repair did not complete; keeping the original file");
            abandon(&candidate).await;
            return Ok(accepted);
        }
        Ok(_) => {}
    }

    match ctx.checker.check(&candidate).await {
        Ok(verdict) if verdict.is_valid() => {}
        Ok(_) => {
            tracing::warn!("Repaired file is still corrupt; keeping the original file");
            abandon(&candidate).await;
            return Ok(accepted);
        }
        Err(e) => {
            tracing::warn!(error = ?e, "Could not check the repaired file; keeping the original file");
            abandon(&candidate).await;
            return Ok(accepted);
        }
    }

    let meta = UploadMeta::new(mime, event.name());
    ctx.librarian
        .upload(&event.library, Path::new(&event.path), &candidate, &meta)
        .await
        .or_raise(|| ErrorKind::Acquisition)?;
    tracing::info!("Uploaded repaired file in place of the original");
    Ok(Gate::Repaired)
}

/// Discard a repair candidate. The scratch directory goes away regardless,
/// this only frees the space early.
async fn abandon(candidate: &Path) {
    match tokio::fs::remove_file(candidate).await {
        Err(e) if e.kind() != IoErrorKind::NotFound => {
            tracing::debug!(error = %e, "Could not discard repair candidate");
        }
        _ => {}
    }
}
