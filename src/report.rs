use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{collections::BTreeMap, fmt, future::Future, path::PathBuf};

use crate::{
    Aggregate,
    aggregate::{OperationStats, RunAggregate},
    histogram::LatencyHistogram,
    domain::{Operation, Role},
    error::Result,
    threshold::{ThresholdOutcome, ThresholdSet},
};

/// A [`Report`] is the processed form of an [`Aggregate`]: averages,
/// percentiles, ratios and totals derived from the raw counters and histograms.
///
/// Reports are pure data; printing or shipping them is the job of a
/// [`Reporter`].
pub trait Report<A>
where
    Self: Send + Sync + fmt::Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// A [`Reporter`] consumes a [`Report`] and performs the side effects:
/// writing it to a terminal, a file, or a service.
pub trait Reporter<A: Aggregate, R: Report<A>> {
    fn report(&self, report: &R) -> impl Future<Output = Result<()>>;
}

/// Latency distribution in milliseconds.
///
/// The summary fields are derived from the histogram, which is serialized
/// along with them so reloaded reports still answer arbitrary percentiles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub count: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub med_ms: f64,
    pub max_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    #[serde(default)]
    histogram: LatencyHistogram,
}

impl Trend {
    pub fn from_histogram(histogram: LatencyHistogram) -> Self {
        let mut trend = Trend {
            count: histogram.len(),
            histogram,
            ..Default::default()
        };
        if trend.count > 0 {
            trend.avg_ms = trend.histogram.mean() / 1000.0;
            trend.min_ms = us_to_ms(trend.histogram.min());
            trend.max_ms = us_to_ms(trend.histogram.max());
            trend.med_ms = trend.percentile(50.0);
            trend.p90_ms = trend.percentile(90.0);
            trend.p95_ms = trend.percentile(95.0);
            trend.p99_ms = trend.percentile(99.0);
        }
        trend
    }

    /// Percentile in milliseconds, 0 for an empty trend.
    pub fn percentile(&self, p: f64) -> f64 {
        us_to_ms(self.histogram.value_at_quantile(p / 100.0))
    }
}

fn us_to_ms(us: u64) -> f64 {
    us as f64 / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    pub count: u64,
    pub accepted: u64,
    pub errors: u64,
    pub ignored_errors: u64,
    pub failed_requests: u64,
    pub error_rate: f64,
    pub latency: Trend,
}

impl From<OperationStats> for OperationReport {
    fn from(stats: OperationStats) -> Self {
        let counted = stats.counted();
        Self {
            count: stats.count,
            accepted: stats.accepted,
            errors: stats.errors,
            ignored_errors: stats.ignored_errors,
            failed_requests: stats.failed_requests,
            error_rate: ratio(stats.errors, counted).unwrap_or(0.0),
            latency: Trend::from_histogram(stats.latency),
        }
    }
}

/// A rate together with the number of samples it was computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub value: f64,
    pub total: u64,
}

impl Rate {
    fn of(hits: u64, total: u64) -> Self {
        Self {
            value: ratio(hits, total).unwrap_or(0.0),
            total,
        }
    }
}

fn ratio(hits: u64, total: u64) -> Option<f64> {
    (total > 0).then(|| hits as f64 / total as f64)
}

/// Final figures of a run, derived from a [`RunAggregate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub iterations: u64,
    pub avg_iteration_ms: f64,
    pub roles: BTreeMap<Role, u64>,
    pub operations: BTreeMap<Operation, OperationReport>,
    pub http_req_duration: Trend,
    /// Unacceptable outcomes over all outcomes that count towards errors.
    pub error_rate: Rate,
    pub success_rate: Rate,
    /// Transport failures and 4xx/5xx responses over all requests.
    pub http_req_failed: Rate,
    pub counters: BTreeMap<String, u64>,
    #[serde(default)]
    pub thresholds: Vec<ThresholdOutcome>,
}

impl From<RunAggregate> for RunReport {
    fn from(agg: RunAggregate) -> Self {
        let mut overall = LatencyHistogram::default();
        let (mut requests, mut failed, mut counted, mut errors, mut accepted) = (0, 0, 0, 0, 0);
        for stats in agg.operations.values() {
            overall.add(&stats.latency);
            requests += stats.count;
            failed += stats.failed_requests;
            counted += stats.counted();
            errors += stats.errors;
            accepted += stats.accepted;
        }

        let avg_iteration_ms = match agg.iterations {
            0 => 0.0,
            n => agg.iteration_time.as_secs_f64() * 1000.0 / n as f64,
        };

        Self {
            iterations: agg.iterations,
            avg_iteration_ms,
            roles: agg.roles,
            operations: agg
                .operations
                .into_iter()
                .map(|(op, stats)| (op, OperationReport::from(stats)))
                .collect(),
            http_req_duration: Trend::from_histogram(overall),
            error_rate: Rate::of(errors, counted),
            success_rate: Rate::of(accepted, requests),
            http_req_failed: Rate::of(failed, requests),
            counters: agg.counters,
            thresholds: Vec::new(),
        }
    }
}

impl Report<RunAggregate> for RunReport {}

impl RunReport {
    pub fn trend(&self, metric: &str) -> Option<&Trend> {
        if metric == "http_req_duration" {
            return Some(&self.http_req_duration);
        }
        let op: Operation = metric.strip_suffix("_duration")?.parse().ok()?;
        self.operations.get(&op).map(|r| &r.latency)
    }

    /// Rate value, or `None` when nothing was sampled.
    pub fn rate(&self, metric: &str) -> Option<f64> {
        let rate = match metric {
            "error_rate" => self.error_rate,
            "success_rate" => self.success_rate,
            "http_req_failed" => self.http_req_failed,
            _ => return None,
        };
        (rate.total > 0).then_some(rate.value)
    }

    pub fn counter(&self, metric: &str) -> u64 {
        match metric {
            "iterations" => self.iterations,
            name => self.counters.get(name).copied().unwrap_or(0),
        }
    }

    pub fn apply_thresholds(&mut self, set: &ThresholdSet) {
        self.thresholds = set.evaluate(self);
    }

    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "iterations: {} (avg {:.0} ms)", self.iterations, self.avg_iteration_ms)?;
        if self.iterations > 0 {
            let roles: Vec<String> = self
                .roles
                .iter()
                .map(|(role, n)| format!("{role} {:.1}%", *n as f64 * 100.0 / self.iterations as f64))
                .collect();
            writeln!(f, "roles: {}", roles.join(", "))?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:<22} {:>8} {:>8} {:>7} {:>10} {:>10} {:>10}",
            "operation", "count", "ok", "errors", "avg ms", "p95 ms", "p99 ms"
        )?;
        for (op, r) in &self.operations {
            writeln!(
                f,
                "{:<22} {:>8} {:>8} {:>7} {:>10.1} {:>10.1} {:>10.1}",
                op.as_str(),
                r.count,
                r.accepted,
                r.errors,
                r.latency.avg_ms,
                r.latency.p95_ms,
                r.latency.p99_ms
            )?;
        }
        writeln!(f)?;
        let d = &self.http_req_duration;
        writeln!(
            f,
            "http_req_duration: avg={:.1}ms med={:.1}ms p(90)={:.1}ms p(95)={:.1}ms p(99)={:.1}ms max={:.1}ms",
            d.avg_ms, d.med_ms, d.p90_ms, d.p95_ms, d.p99_ms, d.max_ms
        )?;
        writeln!(f, "http_req_failed: {:.2}%", self.http_req_failed.value * 100.0)?;
        writeln!(f, "error_rate: {:.2}%", self.error_rate.value * 100.0)?;
        for (name, n) in &self.counters {
            writeln!(f, "{name}: {n}")?;
        }
        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "thresholds:")?;
            for t in &self.thresholds {
                writeln!(f, "  {t}")?;
            }
        }
        Ok(())
    }
}

/// Prints the human readable summary to stdout.
pub struct StdoutReporter;

impl Reporter<RunAggregate, RunReport> for StdoutReporter {
    async fn report(&self, report: &RunReport) -> Result<()> {
        println!("{report}");
        Ok(())
    }
}

/// Writes the report as pretty JSON to a file, or stdout when no path is set.
pub struct JsonReporter {
    pub path: Option<PathBuf>,
}

impl Reporter<RunAggregate, RunReport> for JsonReporter {
    async fn report(&self, report: &RunReport) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        match &self.path {
            Some(path) => {
                tokio::fs::write(path, json)
                    .await
                    .map_err(|source| crate::Error::ReportWrite {
                        path: path.clone(),
                        source,
                    })?;
                tracing::info!("Report written to {}", path.display());
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::Threshold;

    fn histogram(latencies_ms: impl IntoIterator<Item = u64>) -> LatencyHistogram {
        let mut hist = LatencyHistogram::default();
        latencies_ms.into_iter().for_each(|ms| hist.record(ms * 1000));
        hist
    }

    fn stats(latencies_ms: &[u64], accepted: u64, errors: u64, failed: u64) -> OperationStats {
        OperationStats {
            count: latencies_ms.len() as u64,
            accepted,
            errors,
            ignored_errors: 0,
            failed_requests: failed,
            latency: histogram(latencies_ms.iter().copied()),
        }
    }

    fn near(observed: f64, expected: f64) -> bool {
        (observed - expected).abs() <= expected * 0.001
    }

    fn sample_report() -> RunReport {
        let mut agg = RunAggregate::default();
        agg.iterations = 4;
        agg.operations.insert(
            Operation::ProductList,
            stats(&[10, 20, 30, 40, 50, 60, 70, 80, 90, 100], 10, 0, 0),
        );
        agg.operations
            .insert(Operation::Checkout, stats(&[500, 1500], 1, 1, 1));
        agg.counters.insert("transactions_created".into(), 1);
        RunReport::from(agg)
    }

    #[test]
    fn trend_reads_quantiles_off_the_histogram() {
        let trend = Trend::from_histogram(histogram(1..=101));
        assert_eq!(trend.count, 101);
        assert_eq!(trend.min_ms, 1.0);
        assert!(near(trend.max_ms, 101.0));
        assert!(near(trend.med_ms, 51.0));
        assert!(near(trend.p95_ms, 96.0));
        assert!(near(trend.avg_ms, 51.0));
        assert_eq!(Trend::from_histogram(LatencyHistogram::default()).percentile(95.0), 0.0);
    }

    #[test]
    fn reloaded_trend_still_answers_percentiles() {
        let trend = Trend::from_histogram(histogram(1..=101));
        let json = serde_json::to_string(&trend).unwrap();
        let back: Trend = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trend);
        assert_eq!(back.percentile(75.0), trend.percentile(75.0));
        assert!(near(back.percentile(75.0), 76.0));
    }

    #[test]
    fn report_derives_rates_from_all_operations() {
        let report = sample_report();
        assert_eq!(report.http_req_duration.count, 12);
        assert!(near(report.http_req_duration.max_ms, 1500.0));
        assert_eq!(report.http_req_duration.min_ms, 10.0);
        assert_eq!(report.error_rate.total, 12);
        assert!((report.error_rate.value - 1.0 / 12.0).abs() < 1e-12);
        assert!((report.http_req_failed.value - 1.0 / 12.0).abs() < 1e-12);
        assert_eq!(report.operations[&Operation::Checkout].error_rate, 0.5);
        assert_eq!(report.counter("iterations"), 4);
        assert_eq!(report.counter("kasbon_transactions"), 0);
    }

    #[test]
    fn thresholds_are_judged_against_the_report() {
        let mut report = sample_report();
        let mut set = ThresholdSet::default();
        set.thresholds
            .push(Threshold::parse("product_list_duration", "p(95)<1000").unwrap());
        set.thresholds
            .push(Threshold::parse("checkout_duration", "max<1000").unwrap());
        // never sampled: passes
        set.thresholds
            .push(Threshold::parse("dashboard_duration", "p(95)<1").unwrap());
        report.apply_thresholds(&set);

        assert!(report.thresholds[0].passed);
        assert!(!report.thresholds[1].passed);
        assert!(near(report.thresholds[1].observed.unwrap(), 1500.0));
        assert!(report.thresholds[2].passed);
        assert_eq!(report.thresholds[2].observed, None);
        assert!(!report.passed());
    }

    #[test]
    fn empty_run_has_no_rates() {
        let report = RunReport::from(RunAggregate::default());
        assert_eq!(report.rate("error_rate"), None);
        assert!(report.to_string().contains("iterations: 0"));
    }
}
