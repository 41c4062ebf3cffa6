pub mod adf;
pub mod config;
pub mod confluence;
pub mod error;
pub mod handlers;
pub mod jira;
pub mod jobs;
pub mod jsonpath;
pub mod measurement;
pub mod schedule;

pub use error::{Result, SmsError};
