//! # eqsweep Core Library
//!
//! A batch pipeline for equilibrium parameter sweeps over cementitious
//! carbonation formulations: it enumerates a full-factorial design space of
//! mixture variables, derives elemental bulk compositions for every design
//! point, drives an equilibrium calculation per point (an external GEM-style
//! solver when one is installed, a stoichiometric approximation otherwise),
//! and aggregates the results into tabular datasets.
//!
//! ## Architectural Philosophy
//!
//! The library is split into three layers with a strict dependency order,
//! so each layer stays independently testable.
//!
//! - **[`core`]: The Foundation.** Stateless domain data and pure
//!   transformations: chemistry tables (`chem`), the raw-material library
//!   (`materials`), design-space enumeration (`design`), the stoichiometric
//!   composition engine (`composition`), and artifact I/O with result
//!   parsing, validation, and aggregation (`io`).
//!
//! - **[`engine`]: The Logic Core.** The stateful orchestration layer:
//!   calculation strategies (external process vs. heuristic approximation),
//!   the batch orchestrator with resume/retry/statistics, and progress
//!   reporting.
//!
//! - **[`workflows`]: The Public API.** Ties `core` and `engine` together
//!   into complete procedures: running a sweep end-to-end and aggregating
//!   a finished sweep into exports.

pub mod core;
pub mod engine;
pub mod workflows;
