//! Jira REST integration: client, wire models, field and group resolution,
//! and the typed link-graph walker.

pub mod client;
pub mod fields;
pub mod groups;
pub mod links;
pub mod models;

pub use client::{JiraClient, JIRA_DATETIME_FORMAT, JIRA_DATE_FORMAT};
pub use fields::FieldResolver;
pub use links::LinkDirection;
