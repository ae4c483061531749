#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(unreachable_pub, clippy::all, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

//! Deterministic, in-memory transfer engine.
//!
//! A [`Scenario`] scripts what the engine reports on each status poll: when metadata appears,
//! how many peers are connected, how progress moves, and where faults are injected.
//! [`SimulatedEngine`] records every call it receives in a journal so callers can assert the
//! order of engine interactions, including the shutdown sequence.

mod engine;
mod scenario;

pub use engine::{EngineCall, SimulatedEngine, SimulatedHandle};
pub use scenario::{Scenario, StatusHook};
