pub mod completion;
pub mod config;
pub mod failover;
pub mod handlers;
pub mod ledger;
pub mod scheduler;
pub mod state;

pub use config::MasterConfig;
pub use ledger::{LedgerError, Task, TaskLedger};
pub use state::AppState;
