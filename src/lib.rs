//! Core library for the SIP proxy/registrar request-processing pipeline.
//!
//! This crate exposes the message model, the validation chain, the method
//! dispatcher, the transaction-boundary transport adapter, and the
//! error-logging/statistics substrate used by a host SIP server process.
//! It performs no socket I/O, transaction-timer scheduling, or
//! registration-store persistence of its own — those are supplied by the
//! host through the collaborator traits in [`collaborators`].

#![cfg_attr(test, expect(clippy::str_to_string, reason = "test code"))]
#![cfg_attr(test, expect(clippy::unwrap_used, reason = "test code can panic"))]
#![cfg_attr(
    test,
    expect(clippy::indexing_slicing, reason = "test code with known bounds")
)]
#![cfg_attr(test, expect(clippy::shadow_reuse, reason = "test code shadowing"))]
#![cfg_attr(
    test,
    expect(clippy::let_underscore_must_use, reason = "test cleanup code")
)]
#![cfg_attr(
    test,
    expect(clippy::unneeded_field_pattern, reason = "test pattern matching")
)]

pub mod collaborators;
pub mod config;
pub mod detector;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod message;
pub mod observability;
pub mod response;
pub mod transport;
pub mod validation;
