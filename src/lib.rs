pub mod clients;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::Config;
pub use error::{ModerationError, Result};
pub use models::{Fingerprint, Outcome, ReviewCase, Upload};
pub use services::{ModerationPipeline, ModerationRequest, ModerationVerdict, ReviewCaseService};
