//! Internet Request Engine.

pub mod engine;

pub use engine::{HttpInternetEngine, InternetExecutor, InternetOutcome, InternetRequest};
