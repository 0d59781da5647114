//! Test doubles for code built on [`crate::ApiClient`].

mod transport;

pub use transport::{MockGate, MockHandler, MockReply, MockTransport};
