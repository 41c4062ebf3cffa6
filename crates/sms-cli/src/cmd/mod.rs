pub mod config;
pub mod event;
pub mod field;
pub mod group;
pub mod job;
pub mod serve;
