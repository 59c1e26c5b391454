use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use super::{PhaseConfig, Span, TrafficConfig, terms};
use crate::{domain::Role, error::Error, executor::Stage, select::WeightTable};

const QUICK_SEARCH_TERMS: &[&str] = &[
    "indomie", "aqua", "rokok", "sabun", "gula", "beras", "minyak", "kopi", "teh", "susu",
    "roti", "snack",
];

/// Built-in load shapes: phases, thresholds and the traffic they drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// A compressed business day: morning rush, steady daytime, evening rush
    /// and a flash-sale spike.
    Production,
    /// Five minute validation run with shorter flows.
    ProductionQuick,
    /// Ramp to 1000 VUs and hold, followed by a spike.
    Load,
    Smoke,
    /// Constant read-heavy and write-heavy populations hammering the
    /// database side by side.
    DbStress,
}

impl Profile {
    pub const ALL: &'static [Profile] = &[
        Profile::Production,
        Profile::ProductionQuick,
        Profile::Load,
        Profile::Smoke,
        Profile::DbStress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Production => "production",
            Profile::ProductionQuick => "production-quick",
            Profile::Load => "load",
            Profile::Smoke => "smoke",
            Profile::DbStress => "db-stress",
        }
    }

    pub fn traffic(&self) -> TrafficConfig {
        let mut traffic = TrafficConfig::default();
        match self {
            Profile::ProductionQuick => {
                traffic.think_time_secs = Span::new(1, 2);
                traffic.search_terms = terms(QUICK_SEARCH_TERMS);

                let cashier = &mut traffic.cashier;
                cashier.pages = Span::new(1, 1);
                cashier.pause_after_search = Duration::ZERO;
                cashier.items = Span::new(1, 4);
                cashier.quantity = Span::new(1, 3);
                cashier.pause_after_calculate = Duration::ZERO;
                cashier.checkout_probability = 0.7;
                cashier.cash_overpay = Span::new(5_000, 5_000);

                let browser = &mut traffic.browser;
                browser.pause_after_list = Duration::ZERO;
                browser.category_probability = 0.0;
                browser.pause_after_search = Duration::ZERO;
                browser.detail_probability = 0.3;
                browser.pagination_probability = 0.0;

                let manager = &mut traffic.manager;
                manager.pause_after_dashboard = Duration::ZERO;
                manager.daily_report_probability = 0.5;
                manager.pause_after_daily_report = Duration::ZERO;
                manager.kasbon_report_probability = 0.3;
                manager.pause_after_kasbon_report = Duration::ZERO;
                manager.customers_with_debt_probability = 0.0;
                manager.customer_kasbon_probability = 0.0;
                manager.transaction_list_probability = 0.0;

                let inventory = &mut traffic.inventory;
                inventory.pause_after_low_stock = Duration::ZERO;
                inventory.detail_probability = 0.0;
                inventory.restock_probability = 0.0;
            }
            // the stress flows pace themselves
            Profile::DbStress => traffic.think_time_secs = Span::new(0, 0),
            Profile::Production | Profile::Load | Profile::Smoke => {}
        }
        traffic
    }

    pub fn phases(&self) -> Vec<PhaseConfig> {
        match self {
            Profile::Production => vec![
                phase("morning_rush", 0, 0, 30, &[(60, 50), (120, 200), (180, 300), (60, 100)]),
                // constant 150 VUs for five minutes
                phase("steady_daytime", 420, 150, 30, &[(300, 150)]),
                phase("evening_rush", 720, 150, 30, &[(120, 400), (180, 500), (120, 200), (60, 0)]),
                phase("spike", 1200, 0, 30, &[(10, 300), (30, 500), (10, 100)]),
            ],
            Profile::ProductionQuick => vec![phase(
                "production_quick",
                0,
                0,
                10,
                &[(30, 50), (60, 150), (120, 200), (60, 100), (30, 0)],
            )],
            Profile::Load => vec![
                phase(
                    "load_test",
                    0,
                    0,
                    30,
                    &[(120, 100), (180, 500), (300, 1000), (600, 1000), (120, 0)],
                ),
                phase("spike_test", 1320, 0, 30, &[(10, 500), (60, 500), (10, 0)]),
            ],
            Profile::Smoke => vec![phase(
                "smoke",
                0,
                0,
                30,
                &[(30, 50), (60, 100), (60, 100), (30, 0)],
            )],
            Profile::DbStress => vec![
                PhaseConfig {
                    roles: Some(WeightTable::from_static(&[(Role::Reader, 1.0)])),
                    ..phase("read_heavy", 0, 70, 30, &[(300, 70)])
                },
                PhaseConfig {
                    roles: Some(WeightTable::from_static(&[(Role::Writer, 1.0)])),
                    ..phase("write_heavy", 0, 30, 30, &[(300, 30)])
                },
            ],
        }
    }

    pub fn thresholds(&self) -> BTreeMap<String, Vec<String>> {
        match self {
            Profile::Production => threshold_table(&[
                ("http_req_duration", &["p(95)<2000", "p(99)<5000"]),
                ("http_req_failed", &["rate<0.05"]),
                ("error_rate", &["rate<0.1"]),
                ("product_list_duration", &["p(95)<1000"]),
                ("product_search_duration", &["p(95)<1500"]),
                ("cart_calculate_duration", &["p(95)<1000"]),
                ("checkout_duration", &["p(95)<3000"]),
                ("dashboard_duration", &["p(95)<2000"]),
            ]),
            Profile::ProductionQuick => threshold_table(&[
                ("http_req_duration", &["p(95)<2000"]),
                ("http_req_failed", &["rate<0.05"]),
                ("error_rate", &["rate<0.1"]),
                ("checkout_duration", &["p(95)<3000"]),
            ]),
            Profile::Load => threshold_table(&[
                ("http_req_duration", &["p(95)<2000", "p(99)<5000"]),
                ("http_req_failed", &["rate<0.05"]),
                ("error_rate", &["rate<0.1"]),
                ("product_list_duration", &["p(95)<1000"]),
                ("checkout_duration", &["p(95)<3000"]),
            ]),
            Profile::Smoke => threshold_table(&[
                ("http_req_duration", &["p(95)<2000"]),
                ("http_req_failed", &["rate<0.1"]),
            ]),
            // every request of the stress roles is a timed query
            Profile::DbStress => threshold_table(&[
                ("http_req_duration", &["p(95)<1000", "p(99)<3000"]),
                ("http_req_failed", &["rate<0.05"]),
                ("error_rate", &["rate<0.1"]),
            ]),
        }
    }
}

fn threshold_table(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(metric, exprs)| {
            let exprs = exprs.iter().map(|e| e.to_string()).collect();
            (metric.to_string(), exprs)
        })
        .collect()
}

fn phase(
    name: &str,
    start_secs: u64,
    start_vus: usize,
    graceful_secs: u64,
    stages: &[(u64, usize)],
) -> PhaseConfig {
    PhaseConfig {
        name: name.to_string(),
        start_time: Duration::from_secs(start_secs),
        start_vus,
        stages: stages
            .iter()
            .map(|&(secs, target)| Stage::new(Duration::from_secs(secs), target))
            .collect(),
        graceful_ramp_down: Duration::from_secs(graceful_secs),
        roles: None,
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .iter()
            .find(|p| p.as_str() == s)
            .copied()
            .ok_or_else(|| {
                let known: Vec<&str> = Profile::ALL.iter().map(|p| p.as_str()).collect();
                Error::InvalidConfiguration(format!(
                    "unknown profile `{s}`, expected one of: {}",
                    known.join(", ")
                ))
            })
    }
}
