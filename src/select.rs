//! Weighted random selection over a fixed category table.
//!
//! Used to pick the role of every virtual-user iteration and the payment
//! method of every checkout.

use std::{fmt, marker::PhantomData};

use rand::Rng;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{MapAccess, Visitor},
    ser::SerializeMap,
};

use crate::error::{Error, Result};

/// An ordered table of `category -> weight`.
///
/// Every weight is finite and strictly positive, so is their sum, and the
/// table is never empty,
/// which makes [`WeightTable::select`] infallible. Entry order is preserved
/// because selection walks the entries in order.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightTable<K> {
    entries: Vec<(K, f64)>,
    total: f64,
}

impl<K: fmt::Debug> WeightTable<K> {
    pub fn new(entries: impl IntoIterator<Item = (K, f64)>) -> Result<Self> {
        let entries: Vec<(K, f64)> = entries.into_iter().collect();
        if entries.is_empty() {
            return Err(Error::InvalidConfiguration(
                "weight table must contain at least one category".into(),
            ));
        }
        if let Some((key, weight)) = entries
            .iter()
            .find(|(_, w)| !w.is_finite() || *w <= 0.0)
        {
            return Err(Error::InvalidConfiguration(format!(
                "weight of {key:?} must be a positive number, got {weight}"
            )));
        }
        let total: f64 = entries.iter().map(|(_, w)| w).sum();
        if !total.is_finite() {
            return Err(Error::InvalidConfiguration(format!(
                "weights must sum to a finite number, got {total}"
            )));
        }
        Ok(Self { entries, total })
    }
}

impl<K: Clone> WeightTable<K> {
    /// Builds a table from compiled-in weights, which are known to be valid.
    pub(crate) fn from_static(entries: &[(K, f64)]) -> Self {
        debug_assert!(!entries.is_empty() && entries.iter().all(|(_, w)| *w > 0.0));
        let total = entries.iter().map(|(_, w)| w).sum();
        Self {
            entries: entries.to_vec(),
            total,
        }
    }
}

impl<K> WeightTable<K> {
    /// Draws one category with probability proportional to its weight.
    ///
    /// A single uniform draw in `[0, total)` is walked down the table; the
    /// first entry that brings the remainder to `<= 0` wins. Rounding can in
    /// theory leave the remainder positive after the last entry, in which case
    /// the first category is returned.
    pub fn select<R: Rng>(&self, rng: &mut R) -> &K {
        let mut remainder = rng.gen_range(0.0..self.total);
        for (key, weight) in &self.entries {
            remainder -= weight;
            if remainder <= 0.0 {
                return key;
            }
        }
        &self.entries[0].0
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, f64)> {
        self.entries.iter().map(|(k, w)| (k, *w))
    }

    /// Normalised selection probability of every category, in table order.
    pub fn probabilities(&self) -> Vec<(&K, f64)> {
        self.entries
            .iter()
            .map(|(k, w)| (k, w / self.total))
            .collect()
    }
}

impl<K: Serialize> Serialize for WeightTable<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, weight) in &self.entries {
            map.serialize_entry(key, weight)?;
        }
        map.end()
    }
}

impl<'de, K> Deserialize<'de> for WeightTable<K>
where
    K: Deserialize<'de> + fmt::Debug,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor<K>(PhantomData<K>);

        impl<'de, K> Visitor<'de> for TableVisitor<K>
        where
            K: Deserialize<'de> + fmt::Debug,
        {
            type Value = WeightTable<K>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category to positive weight")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(4));
                while let Some((key, weight)) = access.next_entry::<K, f64>()? {
                    entries.push((key, weight));
                }
                WeightTable::new(entries).map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}
