//! # Core Module
//!
//! Stateless building blocks shared by the engine machinery and the public client.
//!
//! ## Architecture
//!
//! - **Structure & Results** ([`models`]) - The caller-side structure snapshot and the
//!   raw/converted result tuples exchanged with the engine
//! - **Units** ([`units`]) - Atomic-unit constants used at the engine boundary
//! - **Geometry** ([`geometry`]) - Unit conversion, periodic wrapping and cell matrices
//!   in the engine's conventions
//!
//! Nothing in this module touches processes, sockets or files.

pub mod geometry;
pub mod models;
pub mod units;
