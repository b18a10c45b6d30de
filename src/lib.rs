pub mod api;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod event;
pub mod source;
pub mod store;
pub mod views;

pub use cache::{FetchDiagnostic, LogCache, MergeOutcome};
pub use event::{Event, ParsedEvent};

pub const CONFIG_VERSION: f32 = 0.1;
