//! Coverage collection: run the external tool, classify its output and keep
//! the results in a folder/file tree with aggregated counts.
//!
//! [`CoverageSession`] is the entry point; the other modules are its parts.

pub mod cache;
pub mod coordinator;
pub mod enumerator;
pub mod orchestrator;
pub mod parser;
pub mod progress;
pub mod report;
pub mod session;

pub use cache::{CoverageCache, CoverageNode, CoverageStats, FileCoverage, NodeKind, NodeSummary};
pub use coordinator::{CollectionCoordinator, CollectionState, RefreshOutcome};
pub use enumerator::{Enumeration, FileEnumerator, WalkdirEnumerator};
pub use orchestrator::{CollectionReport, CoverageOrchestrator, ToolMode};
pub use parser::{CoverageRecord, ErrorRecord, LineRecord, RecordParser};
pub use progress::{ConsoleProgress, NoopProgress, ProgressReporter, RecordingProgress};
pub use session::CoverageSession;
