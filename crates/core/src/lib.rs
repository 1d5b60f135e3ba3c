//! Core storage and retention logic for Autodocs.
//!
//! This crate has no web or database dependencies. Persistence is reached
//! through the [`retention::RecordStore`] and [`activity::AuditSink`] traits,
//! implemented by the db crate.
//!
//! # Modules
//!
//! - `storage` - Provider-agnostic object storage and batch deletes
//! - `retention` - Calendar-scheduled temp expiry and soft-delete purge
//! - `activity` - Audit trail of retention runs

pub mod activity;
pub mod retention;
pub mod storage;
