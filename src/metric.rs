use std::{fmt::Debug, time::Duration};

use serde::{Serialize, de::DeserializeOwned};

use crate::domain::{Operation, Role};
use crate::macros::metric;

/// A `Metric` is a single observed measurement produced by the action of a
/// [`crate::Scenario`].
///
/// Metrics are folded into an [`crate::Aggregate`] inside the worker that
/// produced them, and only the aggregates cross task boundaries. Keep them
/// small and cheap to clone.
///
/// ## Example
/// ```rust
/// use warung_load::Metric;
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Debug, Clone, PartialOrd, PartialEq, Serialize, Deserialize)]
/// struct PingMetric {
///     latency: Duration,
///     ok: bool,
/// }
/// impl Metric for PingMetric {}
/// ```
pub trait Metric
where
    Self: Serialize + DeserializeOwned + PartialOrd + PartialEq + Send + Sync + Debug + Clone,
{
}

/// The classified result of one request.
#[metric]
pub struct OperationOutcome {
    pub operation: Operation,
    /// `None` when no HTTP response was received.
    pub status: Option<u16>,
    pub expected: u16,
    pub acceptable: Vec<u16>,
    pub latency: Duration,
    /// Status was the expected one or a whitelisted alternate, and any body
    /// check passed.
    pub accepted: bool,
    /// Whether this outcome participates in the business error rate.
    pub counted: bool,
}

impl OperationOutcome {
    /// Transport failures and 4xx/5xx responses, regardless of whether the
    /// operation whitelists them.
    pub fn is_failed_request(&self) -> bool {
        self.status.is_none_or(|s| s >= 400)
    }
}

/// Everything one virtual-user iteration produced.
#[metric]
pub struct IterationMetric {
    pub role: Role,
    pub outcomes: Vec<OperationOutcome>,
    /// Named counters bumped during the iteration, e.g. `transactions_created`.
    pub events: Vec<String>,
    /// Wall time of the iteration including think time.
    pub duration: Duration,
}
