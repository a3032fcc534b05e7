//! # sockcalc Core Library
//!
//! A client for driving an external atomistic-simulation engine (DFTB+ in the
//! reference deployment) through an i-PI style socket protocol. The library owns
//! the engine's process lifecycle, translates structural-evaluation requests into
//! the engine's units and conventions, and tolerates the engine dying mid-request.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`StructureSnapshot`,
//!   `CalculationResult`), the atomic unit constants, and the `GeometryAdapter`
//!   that converts structures into engine-native positions and cell matrices.
//!
//! - **[`engine`]: The Machinery.** Stateful building blocks: engine parameters,
//!   the process supervisor that spawns and reaps the engine, the socket seam
//!   (`SocketBackend` / `SocketInterface`) with its request discipline, and the
//!   `Session` that pairs one process with one open socket.
//!
//! - **[`calculator`]: The Public API.** `CalculationClient`, the single entry
//!   point that lazily starts a session, submits requests, polls them to
//!   completion and applies the teardown policy.
//!
//! The byte-level wire protocol lives outside this crate. A protocol implementation
//! plugs in by implementing [`engine::socket::SocketBackend`].

pub mod calculator;
pub mod core;
pub mod engine;
