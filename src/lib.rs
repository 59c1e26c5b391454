//! warung-load: role-weighted traffic synthesis for the warung point-of-sale
//! backend.
//!
//! Every virtual-user iteration plays one synthetic user type, drawn by
//! weight, through that role's sequence of API calls: a cashier, a browsing
//! customer, a manager or a stock keeper, or one of the database stress
//! readers and writers. Each response is classified against the status the
//! operation expects plus the alternates it tolerates, and the run is judged
//! against k6-style thresholds at the end.
//!
//! # Architecture
//!
//! The load-testing core follows a small pluggable design:
//!
//! - [`Scenario`]: the action executed once per iteration.
//! - [`Executor`]: runs the scenario. [`executor::RampingVuExecutor`] keeps a
//!   ramping number of virtual users busy and [`executor::Plan`] runs several
//!   of those as time-offset phases.
//! - [`Metric`]: what one iteration produced ([`metric::IterationMetric`]).
//! - [`Aggregate`]: worker-local, mergeable summary of metrics
//!   ([`aggregate::RunAggregate`]).
//! - [`Report`]: final statistics derived from an aggregate
//!   ([`report::RunReport`]), checked by [`threshold::ThresholdSet`].
//! - [`Reporter`]: ships a report somewhere (stdout, JSON file).
//!
//! On top of it sit the domain pieces:
//!
//! - [`select::WeightTable`] picks roles and payment methods.
//! - [`cart::build_cart`] synthesizes carts from the catalog.
//! - [`flow`] holds the role flows, driven by [`ScenarioRunner`].
//! - [`Recorder`] classifies outcomes and counts events.
//! - [`setup::setup`] logs in and loads the catalog before the run.
//! - [`backend::Backend`] is the seam to the system under test.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use warung_load::{
//!     Executor, Reporter, Scenario, ScenarioRunner,
//!     aggregate::RunAggregate,
//!     backend::HttpBackend,
//!     config::{LoadConfig, Profile},
//!     report::{RunReport, StdoutReporter},
//!     setup::setup,
//! };
//!
//! #[tokio::main]
//! async fn main() -> warung_load::Result<()> {
//!     let config = LoadConfig::default().with_profile(Profile::Smoke);
//!     let backend = Arc::new(HttpBackend::new(
//!         &config.base_url,
//!         &config.api_prefix,
//!         config.request_timeout,
//!     )?);
//!     let context = Arc::new(setup(backend.as_ref(), &config).await);
//!     let runner = ScenarioRunner::new(backend, context, &config);
//!
//!     let scenario = Scenario::<RunAggregate, _, _>::builder()
//!         .name("smoke")
//!         .action(move || runner.clone().next_iteration())
//!         .build();
//!     let aggregate = config.plan().exec(&scenario).await?;
//!
//!     let mut report = RunReport::from(aggregate);
//!     report.apply_thresholds(&config.threshold_set()?);
//!     StdoutReporter.report(&report).await
//! }
//! ```
//!
//! # Feature flags
//! - `internals`: expose the executor internals (governor task, worker
//!   spawning, target interpolation) for experiments.

/// Metric aggregators
pub mod aggregate;
/// The system under test
pub mod backend;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
/// Orchestrators that define how things will actually run
pub mod executor;
pub mod flow;
pub mod histogram;
/// Single metrics
pub mod metric;
pub mod recorder;
/// Reports and Reporters
pub mod report;
pub mod runner;
/// The action run by executors
pub mod scenario;
pub mod select;
pub mod setup;
pub mod threshold;

pub use aggregate::Aggregate;
pub use error::{Error, Result};
pub use executor::{Executor, Plan, RampingVuExecutor, Stage};
pub use metric::Metric;
pub use recorder::Recorder;
pub use report::{Report, Reporter};
pub use runner::ScenarioRunner;
pub use scenario::Scenario;

/// Procedural macros to reduce boilerplate
pub mod macros {
    pub use warung_load_macros::*;
}
