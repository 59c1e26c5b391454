//! Pass/fail predicates evaluated against the final report.
//!
//! Expressions use k6 notation:
//! `p(95)<2000` on a trend (milliseconds), `rate<0.05` on a rate, `count>0` on
//! a counter.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Operation, PaymentMethod},
    error::{Error, Result},
    report::RunReport,
};

/// Counters that exist even when they never fired during a run.
pub const TRANSACTIONS_CREATED: &str = "transactions_created";
pub const READ_SUCCESS: &str = "read_success";
pub const WRITE_SUCCESS: &str = "write_success";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Trend,
    Rate,
    Counter,
}

impl MetricKind {
    /// Classifies a metric name, or `None` if no such metric is reported.
    pub fn of(name: &str) -> Option<MetricKind> {
        match name {
            "http_req_duration" => Some(MetricKind::Trend),
            "error_rate" | "success_rate" | "http_req_failed" => Some(MetricKind::Rate),
            "iterations" | TRANSACTIONS_CREATED | READ_SUCCESS | WRITE_SUCCESS => {
                Some(MetricKind::Counter)
            }
            _ if PaymentMethod::ALL.iter().any(|m| m.counter() == name) => {
                Some(MetricKind::Counter)
            }
            _ => name
                .strip_suffix("_duration")
                .and_then(|op| op.parse::<Operation>().ok())
                .map(|_| MetricKind::Trend),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    Percentile(f64),
    Rate,
    Count,
}

impl Aggregation {
    fn applies_to(&self, kind: MetricKind) -> bool {
        match self {
            Aggregation::Rate => kind == MetricKind::Rate,
            Aggregation::Count => kind == MetricKind::Counter,
            _ => kind == MetricKind::Trend,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(&self, observed: f64, limit: f64) -> bool {
        match self {
            Comparison::Lt => observed < limit,
            Comparison::Le => observed <= limit,
            Comparison::Gt => observed > limit,
            Comparison::Ge => observed >= limit,
            Comparison::Eq => observed == limit,
            Comparison::Ne => observed != limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub limit: f64,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidThreshold {
            metric: metric.to_string(),
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let kind = MetricKind::of(metric).ok_or_else(|| invalid("unknown metric"))?;
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();

        // two-character operators first so `<=` is not read as `<`
        let (at, comparison, width) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .iter()
        .find_map(|(token, cmp)| compact.find(token).map(|at| (at, *cmp, token.len())))
        .ok_or_else(|| invalid("missing comparison operator"))?;

        let (lhs, rhs) = (&compact[..at], &compact[at + width..]);
        let limit: f64 = rhs.parse().map_err(|_| invalid("limit is not a number"))?;
        let aggregation = match lhs {
            "avg" => Aggregation::Avg,
            "min" => Aggregation::Min,
            "med" => Aggregation::Med,
            "max" => Aggregation::Max,
            "rate" => Aggregation::Rate,
            "count" => Aggregation::Count,
            _ => {
                let p = lhs
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .and_then(|n| n.parse::<f64>().ok())
                    .ok_or_else(|| invalid("unknown aggregation"))?;
                if !(0.0..=100.0).contains(&p) {
                    return Err(invalid("percentile must be within 0..=100"));
                }
                Aggregation::Percentile(p)
            }
        };
        if !aggregation.applies_to(kind) {
            return Err(invalid("aggregation does not apply to this metric"));
        }

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            aggregation,
            comparison,
            limit,
        })
    }

    /// Observed value of the aggregation, or `None` when the metric has no
    /// samples.
    pub fn observe(&self, report: &RunReport) -> Option<f64> {
        match self.aggregation {
            Aggregation::Rate => report.rate(&self.metric),
            Aggregation::Count => Some(report.counter(&self.metric) as f64),
            agg => {
                let trend = report.trend(&self.metric)?;
                if trend.count == 0 {
                    return None;
                }
                Some(match agg {
                    Aggregation::Avg => trend.avg_ms,
                    Aggregation::Min => trend.min_ms,
                    Aggregation::Med => trend.percentile(50.0),
                    Aggregation::Max => trend.max_ms,
                    Aggregation::Percentile(p) => trend.percentile(p),
                    Aggregation::Rate | Aggregation::Count => unreachable!("handled above"),
                })
            }
        }
    }

    pub fn evaluate(&self, report: &RunReport) -> ThresholdOutcome {
        let observed = self.observe(report);
        ThresholdOutcome {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            // nothing measured, nothing violated
            passed: observed.is_none_or(|v| self.comparison.holds(v, self.limit)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub metric: String,
    pub expression: String,
    pub observed: Option<f64>,
    pub passed: bool,
}

impl fmt::Display for ThresholdOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mark = if self.passed { "✓" } else { "✗" };
        write!(f, "{mark} {} {}", self.metric, self.expression)?;
        match self.observed {
            Some(v) => write!(f, " (observed {v:.3})"),
            None => write!(f, " (no samples)"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThresholdSet {
    pub thresholds: Vec<Threshold>,
}

impl ThresholdSet {
    pub fn parse(config: &BTreeMap<String, Vec<String>>) -> Result<Self> {
        let thresholds = config
            .iter()
            .flat_map(|(metric, exprs)| exprs.iter().map(move |e| Threshold::parse(metric, e)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { thresholds })
    }

    pub fn evaluate(&self, report: &RunReport) -> Vec<ThresholdOutcome> {
        self.thresholds.iter().map(|t| t.evaluate(report)).collect()
    }
}
