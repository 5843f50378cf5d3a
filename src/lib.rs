#![warn(missing_docs)]
//! Orchestrate parameter-sweep experiments for a graph coloring (GLS) solver.
//!
//! For every graph of a work list, a sweep family enumerates solver configurations, runs them on
//! a fixed pool of worker slots (each with its own working directory and config file), parses
//! the solver output and writes per-graph tables. Group and global summaries average those
//! tables after normalizing them per graph.
//!
//! All intermediate tables use a quote-delimited format (`"a";"b";"c"`) that keeps line breaks
//! in the last column, see [`tabular`].
//!
//! The crate ships three executables: `gls_runner` runs a sweep family, `gls_summary` builds
//! group and global summaries and `gls_rank` counts which configurations end up among the best
//! runs per graph.
//!
//! Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use gls_experiments::{
//!     catalog, datastructures::*, experiment::Experiment, scheduler::WorkerPool, sweep::SweepSpec,
//! };
//! # use anyhow::Result;
//!
//! fn example() -> Result<()> {
//!     let config = Config::default(); // expects `db/graphs.csv`, `db/experiments.in`, ...
//!     let ctx = Arc::new(Context::new(&config));
//!     let graph_catalog = catalog::GraphCatalog::load(&ctx)?;
//!     let graphs = catalog::load_graphs(&ctx, &graph_catalog)?;
//!
//!     let pool = WorkerPool::new(&ctx.exec_root(), "strategy", config.num_slots);
//!     let experiment = Experiment::new(ctx, SweepSpec::new(SweepFamily::Strategy));
//!     let report = experiment.run(&graphs, &pool)?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

/// Grouping, per-graph normalization and top-N ranking of result tables.
pub mod aggregator;

/// Graph catalog and work list loading.
pub mod catalog;

/// Config, paths, CLI arguments and the types shared by the pipeline stages.
pub mod datastructures;

/// Error type of the library.
pub mod error;

/// Planning, running and assembling one sweep family over a set of graphs.
pub mod experiment;

/// Decoding of the solver's stdout.
pub mod log_parser;

/// Isolated working directories and solver invocation.
pub mod sandbox;

/// A bounded pool of worker slots fed from a single queue.
pub mod scheduler;

/// Group and global summary tables and ranking reports.
pub mod summary;

/// Enumeration of the configurations of each sweep family.
pub mod sweep;

/// The quote-delimited table format used between pipeline stages.
pub mod tabular;

#[cfg(test)]
mod test_utils;
