//! Core types shared across embedx facilities
//!
//! This crate holds the canonical schema constants used by the logging
//! facility and by anything that parses embedx log output:
//!
//! - **Field keys**: component, op, event, duration and the reconciliation
//!   context keys (schema, relation, action, counts)
//! - **Event names**: start, end, end_error

pub mod schema;
