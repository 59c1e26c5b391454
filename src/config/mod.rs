//! Run configuration.
//!
//! Everything a run needs besides the backend itself: where the API lives,
//! which accounts to log in with, the traffic mix and flow step tables, the
//! load phases and the pass/fail thresholds. Stored as TOML with durations in
//! `humantime` notation (`"2m"`, `"300ms"`).
//!
//! Missing fields fall back to the `production` profile, so a config file
//! only needs to carry what it changes.
pub mod profile;
pub use profile::Profile;

use std::{collections::BTreeMap, ops::RangeInclusive, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{Operation, OperationPolicy, PaymentMethod, Role},
    error::{Error, Result},
    executor::{Phase, Plan, RampingVuExecutor, Stage},
    select::WeightTable,
    threshold::ThresholdSet,
};

/// `humantime` notation for `Duration` fields.
pub(crate) mod serde_duration {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(d)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub base_url: String,
    pub api_prefix: String,
    #[serde(with = "serde_duration")]
    pub request_timeout: Duration,
    pub credentials: Credentials,
    pub setup: SetupConfig,
    pub traffic: TrafficConfig,
    /// Per-operation overrides of the expected and acceptable statuses.
    pub operations: BTreeMap<Operation, OperationPolicy>,
    pub phases: Vec<PhaseConfig>,
    /// Metric name to threshold expressions, e.g. `p(95)<2000`.
    pub thresholds: BTreeMap<String, Vec<String>>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        let profile = Profile::Production;
        Self {
            base_url: "http://localhost:8080".into(),
            api_prefix: "/api/v1".into(),
            request_timeout: Duration::from_secs(30),
            credentials: Credentials::default(),
            setup: SetupConfig::default(),
            traffic: TrafficConfig::default(),
            operations: BTreeMap::new(),
            phases: profile.phases(),
            thresholds: profile.thresholds(),
        }
    }
}

impl LoadConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: LoadConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Replaces traffic, phases and thresholds with those of a built-in
    /// profile.
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.traffic = profile.traffic();
        self.phases = profile.phases();
        self.thresholds = profile.thresholds();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(invalid(format!(
                "base_url must be an http(s) URL, got `{}`",
                self.base_url
            )));
        }
        if self.setup.products_per_page == 0 || self.setup.customers_per_page == 0 {
            return Err(invalid("setup page sizes must be positive"));
        }
        self.traffic.validate()?;
        if self.phases.is_empty() {
            return Err(invalid("at least one phase is required"));
        }
        for (i, phase) in self.phases.iter().enumerate() {
            if phase.stages.is_empty() {
                return Err(invalid(format!("phase `{}` has no stages", phase.name)));
            }
            if self.phases[..i].iter().any(|p| p.name == phase.name) {
                return Err(invalid(format!("phase `{}` is defined twice", phase.name)));
            }
        }
        ThresholdSet::parse(&self.thresholds)?;
        Ok(())
    }

    /// Default operation policies with the configured overrides applied.
    pub fn policies(&self) -> BTreeMap<Operation, OperationPolicy> {
        Operation::ALL
            .iter()
            .map(|op| {
                let policy = self
                    .operations
                    .get(op)
                    .cloned()
                    .unwrap_or_else(|| op.default_policy());
                (*op, policy)
            })
            .collect()
    }

    pub fn threshold_set(&self) -> Result<ThresholdSet> {
        ThresholdSet::parse(&self.thresholds)
    }

    /// Role mix of the named phase, falling back to the traffic-wide one.
    pub fn roles_for(&self, phase: &str) -> &WeightTable<Role> {
        self.phases
            .iter()
            .find(|p| p.name == phase)
            .and_then(|p| p.roles.as_ref())
            .unwrap_or(&self.traffic.role_weights)
    }

    pub fn plan(&self) -> Plan {
        Plan::new(self.phases.iter().map(PhaseConfig::to_phase).collect())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfiguration(message.into())
}

fn check_probability(name: &str, p: f64) -> Result<()> {
    if (0.0..=1.0).contains(&p) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {p}")))
    }
}

/// Inclusive integer range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub min: u32,
    pub max: u32,
}

impl Span {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.min > self.max {
            return Err(invalid(format!(
                "{name} range is empty: min {} > max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub password: String,
}

impl Account {
    fn new(email: &str) -> Self {
        Self {
            email: email.into(),
            password: "password".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub admin: Account,
    pub cashier: Account,
    pub inventory: Account,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            admin: Account::new("admin@warung.com"),
            cashier: Account::new("cashier@warung.com"),
            inventory: Account::new("inventory@warung.com"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupConfig {
    pub products_per_page: u32,
    pub customers_per_page: u32,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            products_per_page: 200,
            customers_per_page: 100,
        }
    }
}

const SEARCH_TERMS: &[&str] = &[
    "indomie", "mie sedap", "aqua", "le minerale", "teh botol", "teh pucuk", "rokok",
    "sampoerna", "gudang garam", "marlboro", "surya", "sabun", "rinso", "daia", "attack",
    "molto", "downy", "gula", "beras", "minyak", "tepung", "kecap", "saos", "pulsa", "token",
    "gas", "lpg", "galon", "roti", "biskuit", "snack", "chitato", "oreo", "susu", "dancow",
    "indomilk", "ultra", "frisian", "kopi", "kapal api", "abc", "good day", "luwak",
];

const RESTOCK_TERMS: &[&str] = &["gas", "galon", "beras", "gula", "minyak"];

const STRESS_TERMS: &[&str] = &["mie", "sabun", "rokok", "gula", "beras", "aqua", "coca"];

pub(crate) fn terms(list: &[&str]) -> Vec<String> {
    list.iter().map(|t| t.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrafficConfig {
    pub role_weights: WeightTable<Role>,
    pub payment_weights: WeightTable<PaymentMethod>,
    /// Pause after every iteration, in whole seconds.
    pub think_time_secs: Span,
    pub search_terms: Vec<String>,
    pub cashier: CashierConfig,
    pub browser: BrowserConfig,
    pub manager: ManagerConfig,
    pub inventory: InventoryConfig,
    /// Steps of the database stress roles.
    pub stress: StressConfig,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            role_weights: WeightTable::from_static(&[
                (Role::Cashier, 60.0),
                (Role::Browser, 25.0),
                (Role::Manager, 10.0),
                (Role::Inventory, 5.0),
            ]),
            payment_weights: WeightTable::from_static(&[
                (PaymentMethod::Cash, 65.0),
                (PaymentMethod::Transfer, 15.0),
                (PaymentMethod::Qris, 15.0),
                (PaymentMethod::Kasbon, 5.0),
            ]),
            think_time_secs: Span::new(1, 3),
            search_terms: terms(SEARCH_TERMS),
            cashier: CashierConfig::default(),
            browser: BrowserConfig::default(),
            manager: ManagerConfig::default(),
            inventory: InventoryConfig::default(),
            stress: StressConfig::default(),
        }
    }
}

impl TrafficConfig {
    fn validate(&self) -> Result<()> {
        self.think_time_secs.validate("think_time_secs")?;
        if self.search_terms.is_empty() {
            return Err(invalid("search_terms must not be empty"));
        }
        self.cashier.validate()?;
        self.browser.validate()?;
        self.manager.validate()?;
        self.inventory.validate()?;
        self.stress.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashierConfig {
    pub pages: Span,
    pub per_page: u32,
    #[serde(with = "serde_duration")]
    pub pause_after_list: Duration,
    pub search_probability: f64,
    #[serde(with = "serde_duration")]
    pub pause_after_search: Duration,
    /// Smallest catalog a cart is built from.
    pub min_products: usize,
    pub items: Span,
    pub quantity: Span,
    #[serde(with = "serde_duration")]
    pub pause_after_calculate: Duration,
    pub checkout_probability: f64,
    /// Cash payments overpay by a uniform amount in this range.
    pub cash_overpay: Span,
    /// Total used when the calculation response carries none.
    pub fallback_total: i64,
    /// Checkouts are signed `Kasir N` with N in this range.
    pub cashier_numbers: Span,
}

impl Default for CashierConfig {
    fn default() -> Self {
        Self {
            pages: Span::new(1, 5),
            per_page: 20,
            pause_after_list: Duration::from_millis(300),
            search_probability: 0.4,
            pause_after_search: Duration::from_millis(200),
            min_products: 2,
            items: Span::new(1, 5),
            quantity: Span::new(1, 5),
            pause_after_calculate: Duration::from_millis(500),
            checkout_probability: 0.8,
            cash_overpay: Span::new(0, 10_000),
            fallback_total: 50_000,
            cashier_numbers: Span::new(1, 3),
        }
    }
}

impl CashierConfig {
    fn validate(&self) -> Result<()> {
        self.pages.validate("cashier.pages")?;
        self.items.validate("cashier.items")?;
        self.quantity.validate("cashier.quantity")?;
        self.cash_overpay.validate("cashier.cash_overpay")?;
        self.cashier_numbers.validate("cashier.cashier_numbers")?;
        check_probability("cashier.search_probability", self.search_probability)?;
        check_probability("cashier.checkout_probability", self.checkout_probability)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub per_page: u32,
    #[serde(with = "serde_duration")]
    pub pause_after_list: Duration,
    pub category_probability: f64,
    #[serde(with = "serde_duration")]
    pub pause_after_category: Duration,
    pub search_probability: f64,
    #[serde(with = "serde_duration")]
    pub pause_after_search: Duration,
    pub detail_probability: f64,
    pub pagination_probability: f64,
    pub pagination_pages: Span,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            per_page: 20,
            pause_after_list: Duration::from_millis(500),
            category_probability: 0.3,
            pause_after_category: Duration::from_millis(300),
            search_probability: 0.6,
            pause_after_search: Duration::from_millis(300),
            detail_probability: 0.4,
            pagination_probability: 0.2,
            pagination_pages: Span::new(2, 10),
        }
    }
}

impl BrowserConfig {
    fn validate(&self) -> Result<()> {
        self.pagination_pages.validate("browser.pagination_pages")?;
        check_probability("browser.category_probability", self.category_probability)?;
        check_probability("browser.search_probability", self.search_probability)?;
        check_probability("browser.detail_probability", self.detail_probability)?;
        check_probability("browser.pagination_probability", self.pagination_probability)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    #[serde(with = "serde_duration")]
    pub pause_after_dashboard: Duration,
    pub daily_report_probability: f64,
    #[serde(with = "serde_duration")]
    pub pause_after_daily_report: Duration,
    pub kasbon_report_probability: f64,
    #[serde(with = "serde_duration")]
    pub pause_after_kasbon_report: Duration,
    pub customers_with_debt_probability: f64,
    pub customer_kasbon_probability: f64,
    pub transaction_list_probability: f64,
    pub transactions_per_page: u32,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            pause_after_dashboard: Duration::from_millis(500),
            daily_report_probability: 0.6,
            pause_after_daily_report: Duration::from_millis(300),
            kasbon_report_probability: 0.4,
            pause_after_kasbon_report: Duration::from_millis(300),
            customers_with_debt_probability: 0.3,
            customer_kasbon_probability: 0.2,
            transaction_list_probability: 0.5,
            transactions_per_page: 20,
        }
    }
}

impl ManagerConfig {
    fn validate(&self) -> Result<()> {
        check_probability("manager.daily_report_probability", self.daily_report_probability)?;
        check_probability("manager.kasbon_report_probability", self.kasbon_report_probability)?;
        check_probability(
            "manager.customers_with_debt_probability",
            self.customers_with_debt_probability,
        )?;
        check_probability(
            "manager.customer_kasbon_probability",
            self.customer_kasbon_probability,
        )?;
        check_probability(
            "manager.transaction_list_probability",
            self.transaction_list_probability,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    #[serde(with = "serde_duration")]
    pub pause_after_low_stock: Duration,
    pub per_page: u32,
    pub detail_probability: f64,
    pub restock_probability: f64,
    pub restock_terms: Vec<String>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            pause_after_low_stock: Duration::from_millis(300),
            per_page: 50,
            detail_probability: 0.5,
            restock_probability: 0.4,
            restock_terms: terms(RESTOCK_TERMS),
        }
    }
}

impl InventoryConfig {
    fn validate(&self) -> Result<()> {
        if self.restock_terms.is_empty() {
            return Err(invalid("inventory.restock_terms must not be empty"));
        }
        check_probability("inventory.detail_probability", self.detail_probability)?;
        check_probability("inventory.restock_probability", self.restock_probability)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StressConfig {
    pub pages: Span,
    pub per_page: u32,
    #[serde(with = "serde_duration")]
    pub pause_after_list: Duration,
    pub search_terms: Vec<String>,
    #[serde(with = "serde_duration")]
    pub pause_after_search: Duration,
    #[serde(with = "serde_duration")]
    pub pause_after_detail: Duration,
    #[serde(with = "serde_duration")]
    pub pause_after_dashboard: Duration,
    /// Items per priced cart, drawn with replacement. Carts are only priced
    /// when the catalog has at least this many products.
    pub cart_items: u32,
    pub quantity: Span,
    #[serde(with = "serde_duration")]
    pub pause_after_calculate: Duration,
    #[serde(with = "serde_duration")]
    pub pause_after_customer: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            pages: Span::new(1, 50),
            per_page: 20,
            pause_after_list: Duration::from_millis(200),
            search_terms: terms(STRESS_TERMS),
            pause_after_search: Duration::from_millis(200),
            pause_after_detail: Duration::from_millis(300),
            pause_after_dashboard: Duration::from_millis(500),
            cart_items: 3,
            quantity: Span::new(1, 5),
            pause_after_calculate: Duration::from_millis(500),
            pause_after_customer: Duration::from_secs(1),
        }
    }
}

impl StressConfig {
    fn validate(&self) -> Result<()> {
        self.pages.validate("stress.pages")?;
        self.quantity.validate("stress.quantity")?;
        if self.search_terms.is_empty() {
            return Err(invalid("stress.search_terms must not be empty"));
        }
        Ok(())
    }
}

/// One load phase, as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseConfig {
    pub name: String,
    #[serde(default, with = "serde_duration")]
    pub start_time: Duration,
    #[serde(default)]
    pub start_vus: usize,
    pub stages: Vec<Stage>,
    #[serde(default = "default_graceful_ramp_down", with = "serde_duration")]
    pub graceful_ramp_down: Duration,
    /// Role mix of this phase; `traffic.role_weights` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<WeightTable<Role>>,
}

fn default_graceful_ramp_down() -> Duration {
    Duration::from_secs(30)
}

impl PhaseConfig {
    pub fn to_phase(&self) -> Phase {
        Phase {
            name: self.name.clone(),
            start_time: self.start_time,
            executor: RampingVuExecutor::builder()
                .start_vus(self.start_vus)
                .stages(self.stages.clone())
                .graceful_ramp_down(self.graceful_ramp_down)
                .build(),
        }
    }
}
