//! Mergeable latency distribution backed by an HDR histogram.
//!
//! Values are microseconds, kept at three significant digits, so every
//! quantile is within 0.1% of the exact sample value. Histograms from
//! different workers combine by adding bucket counts.

use std::{cmp::Ordering, fmt};

use hdrhistogram::{CreationError, Histogram};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

const SIGNIFICANT_DIGITS: u8 = 3;

/// An auto-resizing histogram of latencies in microseconds. The inner
/// histogram is created on the first recorded value.
#[derive(Clone, Default)]
pub struct LatencyHistogram(Option<Histogram<u64>>);

impl LatencyHistogram {
    fn histogram_mut(&mut self) -> Result<&mut Histogram<u64>, CreationError> {
        match &mut self.0 {
            Some(hist) => Ok(hist),
            slot => Ok(slot.insert(Histogram::new(SIGNIFICANT_DIGITS)?)),
        }
    }

    pub fn record(&mut self, us: u64) {
        match self.histogram_mut() {
            Ok(hist) => hist.saturating_record(us),
            Err(e) => tracing::warn!("Dropping latency sample of {us}us: {e}"),
        }
    }

    /// Adds every count of `other` into this histogram.
    pub fn add(&mut self, other: &LatencyHistogram) {
        let Some(theirs) = &other.0 else {
            return;
        };
        match &mut self.0 {
            Some(ours) => {
                if let Err(e) = ours.add(theirs) {
                    tracing::warn!("Failed to merge latency histograms: {e}");
                }
            }
            None => self.0 = Some(theirs.clone()),
        }
    }

    pub fn len(&self) -> u64 {
        self.0.as_ref().map_or(0, Histogram::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `quantile` (`0.0..=1.0`), or 0 when empty.
    pub fn value_at_quantile(&self, quantile: f64) -> u64 {
        self.0
            .as_ref()
            .map_or(0, |h| h.value_at_quantile(quantile.clamp(0.0, 1.0)))
    }

    pub fn mean(&self) -> f64 {
        self.0.as_ref().map_or(0.0, Histogram::mean)
    }

    pub fn min(&self) -> u64 {
        self.0.as_ref().map_or(0, Histogram::min)
    }

    pub fn max(&self) -> u64 {
        self.0.as_ref().map_or(0, Histogram::max)
    }

    /// Non-empty buckets as `(value, count)`.
    fn recorded(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.0.iter().flat_map(|h| {
            h.iter_recorded()
                .map(|v| (v.value_iterated_to(), v.count_at_value()))
        })
    }
}

impl fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.len())
            .field("min", &self.min())
            .field("max", &self.max())
            .finish()
    }
}

impl PartialEq for LatencyHistogram {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.recorded().eq(other.recorded())
    }
}

/// Histograms are only comparable when they hold the same counts.
impl PartialOrd for LatencyHistogram {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self == other).then_some(Ordering::Equal)
    }
}

impl Serialize for LatencyHistogram {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.recorded())
    }
}

impl<'de> Deserialize<'de> for LatencyHistogram {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let buckets = Vec::<(u64, u64)>::deserialize(deserializer)?;
        let mut histogram = LatencyHistogram::default();
        for (value, count) in buckets {
            histogram
                .histogram_mut()
                .map_err(de::Error::custom)?
                .record_n(value, count)
                .map_err(de::Error::custom)?;
        }
        Ok(histogram)
    }
}
