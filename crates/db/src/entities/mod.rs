//! `SeaORM` entity definitions.

pub mod storage_activity_logs;
pub mod storage_objects;
