//! HTTP clients for external collaborators.
//!
//! Both are plain JSON request/response wrappers; the services decide what
//! a failure means for the operation in progress.

pub mod sms;
pub mod three_ds;
