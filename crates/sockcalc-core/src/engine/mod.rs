//! # Engine Module
//!
//! Stateful machinery for driving an external simulation engine over a socket
//! protocol: process supervision, the socket seam, and the session that pairs
//! the two.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Socket, process and convention parameters with a validating builder
//! - **Process Supervision** ([`process`]) - Spawning, log capture, liveness polling and reaping of the engine
//! - **Socket Seam** ([`socket`]) - Traits implemented by the protocol library, plus request discipline
//! - **Sessions** ([`session`]) - A listening socket and a running engine, built and torn down together
//! - **State Tracking** ([`state`]) - Client lifecycle states and teardown reasons
//! - **Progress Monitoring** ([`progress`]) - Event reporting for embedders
//! - **Error Handling** ([`error`]) - Engine-specific error types
//!
//! The wire format spoken between socket and engine is owned by whichever
//! [`socket::SocketBackend`] is plugged in.

pub mod config;
pub mod error;
pub mod process;
pub mod progress;
pub mod session;
pub mod socket;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
