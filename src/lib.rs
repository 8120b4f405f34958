pub mod compose;
pub mod config;
pub mod contact;
pub mod filter;
pub mod mode;
pub mod models;
pub mod notify;
pub mod ratelimit;
pub mod scheduler;
pub mod sources;
pub mod store;
pub mod telemetry;
