pub mod backoff;
pub mod client;
pub mod config;
pub mod executor;
pub mod worker;

pub use client::{CoordinatorApi, HttpCoordinator, TransportError};
pub use config::WorkerConfig;
pub use worker::{Worker, WorkerSummary};
