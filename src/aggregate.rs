use std::{collections::BTreeMap, fmt::Debug, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    Metric,
    domain::{Operation, Role},
    histogram::LatencyHistogram,
    macros::aggregate,
    metric::{IterationMetric, OperationOutcome},
};

/// The `Aggregate` trait defines how raw [`Metric`] values are collected and
/// combined into an intermediate, mergeable representation.
///
/// Aggregates do **not** compute final statistics such as averages or
/// percentiles; that belongs to a [`crate::Report`], which is converted from
/// an aggregate. An aggregate stores the counters and histograms needed to derive
/// those statistics later without losing information.
///
/// Every executor worker owns one aggregate and feeds it the metrics its
/// iterations produce. When the run ends the worker aggregates are merged, so
/// `merge` must be associative and commutative.
///
/// # Example
/// ```rust
/// use warung_load::{Aggregate, Metric, macros::*};
///
/// #[metric]
/// struct Hit(u64);
///
/// #[aggregate]
/// struct Hits {
///     count: u64,
///     sum: u128,
/// }
///
/// impl Aggregate for Hits {
///     type Metric = Hit;
///
///     fn new() -> Self {
///         Self { count: 0, sum: 0 }
///     }
///
///     fn consume(&mut self, metric: &Self::Metric) {
///         self.count += 1;
///         self.sum += metric.0 as u128;
///     }
///
///     fn merge(&mut self, other: Self) {
///         self.count += other.count;
///         self.sum += other.sum;
///     }
/// }
/// ```
pub trait Aggregate
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Aggregate multiple metrics into the current instance.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Raw counters and latency samples of one operation.
#[aggregate]
#[derive(Default)]
pub struct OperationStats {
    pub count: u64,
    pub accepted: u64,
    /// Unacceptable outcomes that count towards the error rate.
    pub errors: u64,
    /// Unacceptable outcomes excluded from the error rate by policy.
    pub ignored_errors: u64,
    /// Transport failures and 4xx/5xx responses.
    pub failed_requests: u64,
    /// Request latencies in microseconds.
    pub latency: LatencyHistogram,
}

impl OperationStats {
    pub fn record(&mut self, outcome: &OperationOutcome) {
        self.count += 1;
        if outcome.accepted {
            self.accepted += 1;
        } else if outcome.counted {
            self.errors += 1;
        } else {
            self.ignored_errors += 1;
        }
        if outcome.is_failed_request() {
            self.failed_requests += 1;
        }
        self.latency
            .record(outcome.latency.as_micros().min(u64::MAX as u128) as u64);
    }

    pub fn merge(&mut self, other: OperationStats) {
        self.count += other.count;
        self.accepted += other.accepted;
        self.errors += other.errors;
        self.ignored_errors += other.ignored_errors;
        self.failed_requests += other.failed_requests;
        self.latency.add(&other.latency);
    }

    /// Outcomes that participate in the error rate.
    pub fn counted(&self) -> u64 {
        self.count - self.ignored_errors
    }
}

/// Aggregate of a whole run: per-operation stats, the role mix and the named
/// event counters.
#[aggregate]
#[derive(Default)]
pub struct RunAggregate {
    pub iterations: u64,
    pub iteration_time: Duration,
    pub roles: BTreeMap<Role, u64>,
    pub operations: BTreeMap<Operation, OperationStats>,
    pub counters: BTreeMap<String, u64>,
}

impl Aggregate for RunAggregate {
    type Metric = IterationMetric;

    fn new() -> Self {
        RunAggregate::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        self.iterations += 1;
        self.iteration_time += metric.duration;
        *self.roles.entry(metric.role).or_default() += 1;
        for outcome in &metric.outcomes {
            self.operations
                .entry(outcome.operation)
                .or_default()
                .record(outcome);
        }
        for event in &metric.events {
            *self.counters.entry(event.clone()).or_default() += 1;
        }
    }

    fn merge(&mut self, other: Self) {
        self.iterations += other.iterations;
        self.iteration_time += other.iteration_time;
        for (role, n) in other.roles {
            *self.roles.entry(role).or_default() += n;
        }
        for (op, stats) in other.operations {
            self.operations.entry(op).or_default().merge(stats);
        }
        for (name, n) in other.counters {
            *self.counters.entry(name).or_default() += n;
        }
    }
}
