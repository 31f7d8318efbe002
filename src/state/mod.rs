//! State module for tracking audit lifecycle
//!
//! `AuditStatus` is the single persisted phase of an audit. The legal
//! transition graph lives here so storage and the engine share one
//! definition of what may follow what.

mod audit_status;

pub use audit_status::AuditStatus;
