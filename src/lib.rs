pub mod api;
pub mod assistant;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod database;
pub mod errors;
pub mod leaderboard;
pub mod logging;
pub mod models;
pub mod notifications;
pub mod progress;
pub mod scoring;
pub mod session;
pub mod store;
pub mod ticker;

pub use catalog::{CatalogIssue, QuizCatalog};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::SqliteStore;
pub use errors::*;
pub use leaderboard::Leaderboard;
pub use models::*;
pub use notifications::{Notification, Notifier, RecordingNotifier, TracingNotifier};
pub use progress::{Badge, ProgressTracker};
pub use scoring::{Rank, ScoreCard};
pub use session::{Phase, QuizEngine, QuizOutcome, QuizSession, QuizState, StartKind, TickOutcome};
pub use store::{KeyValueStore, MemoryStore};
pub use ticker::Ticker;
