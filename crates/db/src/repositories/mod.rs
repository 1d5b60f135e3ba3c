//! Repository implementations of the core persistence traits.

mod activity_log;
mod storage_object;

pub use activity_log::ActivityLogRepository;
pub use storage_object::StorageObjectRepository;
