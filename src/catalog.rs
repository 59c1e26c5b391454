//! Reference data fetched once during setup and shared read-only by every
//! virtual user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a backend record. The API hands out either numbers or
/// strings depending on the table, so both are accepted and echoed back in
/// the same JSON form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Number(n) => write!(f, "{n}"),
            EntityId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        EntityId::Number(value)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        EntityId::Text(value.to_owned())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub barcode: Option<String>,
    #[serde(default)]
    pub base_price: Option<f64>,
    #[serde(default)]
    pub current_stock: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub credit_limit: Option<f64>,
    #[serde(default)]
    pub current_debt: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: EntityId,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    pub products: Vec<Product>,
    pub customers: Vec<Customer>,
    pub categories: Vec<Category>,
}

impl Catalog {
    pub fn product_ids(&self) -> Vec<EntityId> {
        self.products.iter().map(|p| p.id.clone()).collect()
    }
}

/// Pulls the `data` array out of a list response, skipping entries that do
/// not parse instead of rejecting the whole page.
pub(crate) fn parse_list<T: serde::de::DeserializeOwned>(body: &serde_json::Value) -> Vec<T> {
    body.get("data")
        .and_then(|d| d.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}
