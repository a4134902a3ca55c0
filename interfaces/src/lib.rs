pub mod defs;
pub mod schema;
pub mod telemetry;

pub use defs::{Article, ArticleRecord, HaltReason, StageOutcome};
