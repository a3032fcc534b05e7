//! # Core Models Module
//!
//! Data structures exchanged across the client boundary.
//!
//! ## Key Components
//!
//! - [`structure`] - `StructureSnapshot`, the immutable caller-side view of an atomic
//!   configuration, and `StructureShape`, the part of it a live session is bound to
//! - [`result`] - `RawResult` as produced by the engine and `CalculationResult` in
//!   caller units, plus the advisory `Property` selector

pub mod result;
pub mod structure;
