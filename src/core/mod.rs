pub mod alerts;
pub mod audit;
pub mod config;
pub mod coordinator;
pub mod log_io;
pub mod model;
pub mod notify;
pub mod parser;
pub mod persistence;
pub mod schedule;
pub mod snooze;
pub mod source;
pub mod thresholds;
