//! # Integration Scenarios
//!
//! Each module drives the public `engine-io` API end to end, either against
//! scripted in-process engines or against `/bin/sh` scripts that speak the
//! status protocol on the status descriptor.

pub mod decrypt_verify;
pub mod fixtures;
pub mod lifecycle;
pub mod subprocess;
pub mod tracing_flows;
