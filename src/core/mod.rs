/// Core functionality modules
///
/// Contains the discovery, classification and reconciliation pipeline
/// that keeps the store in step with what's actually on disk.

pub mod classifier;
pub mod reconciler;
pub mod scanner;

pub use classifier::LanguageClassifier;
pub use reconciler::{ReconcileOutcome, ReconciliationEngine};
pub use scanner::{CancelFlag, ProjectScanner, ScanOptions, ScanOutcome};
