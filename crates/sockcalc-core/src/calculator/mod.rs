//! # Calculator Module
//!
//! The public entry point of the library. A [`CalculationClient`] accepts
//! structural-evaluation requests and hides the engine session behind them:
//! the session is started lazily, restarted when the structure's shape or the
//! parameters change, and torn down on shutdown or drop.
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized --evaluate--> Initialized --submit--> Busy --done--> Initialized
//!       ^                          |                   |
//!       +------ teardown ----------+---- engine exit --+
//! ```

pub mod client;

pub use client::CalculationClient;
