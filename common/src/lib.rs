pub mod engine;
pub mod job;
pub mod partition;
pub mod storage;
pub mod task;
pub mod wordcount;
pub mod worker;

pub use engine::{group_by_key, KeyValue, MapFn, MapReduceApp, ReduceFn};
pub use job::{JobDoneResponse, JobPhase, JobSnapshot, TaskSnapshot};
pub use partition::bucket;
pub use storage::{OutputStore, StorageError};
pub use task::{Assignment, Epoch, TaskDescriptor, TaskIndex, TaskPhase, TaskState};
pub use worker::{AssignmentRequest, CompletionReport, CompletionResponse, CompletionStatus, WorkerId};
