//! # Tabsmith - Optimize-then-Explore Engine for Tabular Data
//!
//! Tabsmith decides how each column of a table should be stored, which
//! operations are worth running as whole-column batches, and what to look at
//! next. It never parses files or draws charts itself beyond thin adapters;
//! tables arrive through the [`dataset::Table`] trait and charts leave
//! through the [`render::Renderer`] trait.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tabsmith::config::CoreConfig;
//! use tabsmith::dataset::load_df;
//! use tabsmith::engine::Engine;
//!
//! # fn example() -> tabsmith::error::Result<()> {
//! let engine = Engine::new(CoreConfig::default())?;
//! let df = load_df("sales.csv".as_ref())?;
//!
//! let plan = engine.plan_optimization(&df)?;
//! println!("{}", plan.summary());
//!
//! let reply = engine.start_session(&df, "understand revenue drivers")?;
//! let next = engine.continue_session(&reply.session_id, &df, "any correlations?")?;
//! println!("{}", next.summary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Modules
//!
//! - [`profiler`]: per-column statistics, exact or sketched cardinality
//! - [`planner`]: smallest safe representation per column, and applying it
//! - [`advisor`]: vectorization advice, heuristic or measured
//! - [`workflow`]: memory, vectorization and exploration phases as one run
//! - [`session`]: guided multi-turn analysis over independent calls
//! - [`explore`]: the analyses behind exploration and guided steps
//! - [`engine`]: one facade over all of the above
//!
//! Supporting modules: [`dataset`], [`error`], [`response`], [`config`],
//! [`methodology`], [`render`], [`cancel`], [`logging`] and [`cli`].
//!
//! ## Error Handling
//!
//! Every operation returns [`error::Result`]. Failures carry a stable kind
//! string, and any result converts into a [`response::Response`] envelope:
//!
//! ```
//! use tabsmith::error::{Error, Result};
//! use tabsmith::response::Response;
//!
//! let result: Result<u32> = Err(Error::Validation("bad level".to_owned()));
//! let response = Response::from(result);
//! assert_eq!(response.error.map(|e| e.kind), Some("validation_error".to_owned()));
//! ```

#![warn(clippy::all, rust_2018_idioms)]

pub mod advisor;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod explore;
pub mod logging;
pub mod methodology;
pub mod planner;
pub mod profiler;
pub mod render;
pub mod response;
pub mod session;
pub mod workflow;
