pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod history;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod service;
pub mod synthesizer;
pub mod utils;

// Re-export the types most callers need
pub use error::{Result, TrackerError};
pub use models::{Asset, DirectedPair, HistoryEntry, PairQuote, RawAssetQuote, Snapshot};
pub use orchestrator::{RefreshOrchestrator, RefreshOutcome};
pub use service::PairTrackerService;
