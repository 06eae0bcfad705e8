pub mod auth;
pub mod calendar;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod overlap;
pub mod protocol;
pub mod reaper;
pub mod selection;
pub mod store;
pub mod wal;
pub mod wire;
