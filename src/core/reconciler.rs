/// Reconciliation engine
///
/// One "refresh" = run the scanner to completion, merge every descriptor
/// into the store inside a single transaction, flag whatever wasn't seen
/// as absent, and hand the fresh project list back. At most one
/// reconciliation runs at a time; a second request is rejected, not
/// queued.

use crate::core::scanner::{CancelFlag, ProjectScanner, ScanOptions};
use crate::db::models::{Project, ProjectQuery, ScanWarning};
use crate::db::Database;
use crate::error::{ProjdexError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What a refresh hands back to the caller
#[derive(Debug)]
pub struct ReconcileOutcome {
    /// The full reconciled record set, absent projects included
    pub projects: Vec<Project>,
    /// Non-fatal problems hit along the way
    pub warnings: Vec<ScanWarning>,
    /// How many projects the walk actually found
    pub discovered: usize,
}

/// Orchestrates scan cycles against a shared store handle
pub struct ReconciliationEngine {
    db: Arc<Database>,
    options: ScanOptions,
    in_flight: Arc<AtomicBool>,
}

/// Releases the in-flight latch however the reconcile ends
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ReconciliationEngine {
    pub fn new(db: Arc<Database>, options: ScanOptions) -> Self {
        Self {
            db,
            options,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a reconciliation is currently running
    pub fn is_scanning(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<InFlightGuard> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(ProjdexError::ScanInProgress);
        }
        Ok(InFlightGuard(Arc::clone(&self.in_flight)))
    }

    /// Run one full scan-and-merge cycle over the given roots
    ///
    /// The walk happens on the blocking pool so the caller stays
    /// responsive. Cancellation observed at any point before the commit
    /// aborts with no store writes at all.
    ///
    /// # Returns
    /// * `Ok(ReconcileOutcome)` - Fresh record set plus collected warnings
    /// * `Err(ScanInProgress)` - Another reconcile is already running
    /// * `Err(ScanCancelled)` - Cancelled before commit; store untouched
    pub async fn reconcile(
        &self,
        roots: Vec<PathBuf>,
        cancel: CancelFlag,
    ) -> Result<ReconcileOutcome> {
        let _guard = self.begin()?;

        tracing::info!(roots = roots.len(), "reconciliation started");

        let options = self.options.clone();
        let walk_cancel = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            ProjectScanner::new(options).scan(&roots, &walk_cancel)
        })
        .await
        .map_err(|e| ProjdexError::Generic(format!("scan task failed: {}", e)))??;

        // A cancel that lands after the walk still aborts before commit
        if cancel.is_cancelled() {
            return Err(ProjdexError::ScanCancelled);
        }

        self.db.commit_scan(&outcome.descriptors).await?;

        let projects = self.db.query(&ProjectQuery::all()).await?;

        tracing::info!(
            discovered = outcome.descriptors.len(),
            stored = projects.len(),
            warnings = outcome.warnings.len(),
            "reconciliation finished"
        );

        Ok(ReconcileOutcome {
            discovered: outcome.descriptors.len(),
            projects,
            warnings: outcome.warnings,
        })
    }
}
