//! Vocabulary shared by configuration, flows and reports: user roles, payment
//! methods and the operations a flow can issue.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Defines a fieldless enum that (de)serializes as its snake_case name, so it
/// can be used as a map key in TOML and JSON alike.
macro_rules! named_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
        #[serde(try_from = "String")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($label => Ok($name::$variant),)+
                    other => Err(Error::InvalidConfiguration(format!(
                        "unknown {} `{other}`",
                        stringify!($name),
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = Error;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }
    };
}

named_enum! {
    /// The synthetic user type played by one iteration.
    Role {
        Cashier => "cashier",
        Browser => "browser",
        Manager => "manager",
        Inventory => "inventory",
        /// Database stress: read-heavy queries only.
        Reader => "db_reader",
        /// Database stress: cart pricing and customer inserts.
        Writer => "db_writer",
    }
}

named_enum! {
    PaymentMethod {
        Cash => "cash",
        Transfer => "transfer",
        Qris => "qris",
        Kasbon => "kasbon",
    }
}

named_enum! {
    /// Every request a role flow can issue. The label doubles as the prefix of
    /// the latency trend (`<label>_duration`) in reports and thresholds.
    Operation {
        ProductList => "product_list",
        ProductSearch => "product_search",
        CategoryFilter => "category_filter",
        ProductDetail => "product_detail",
        Pagination => "pagination",
        CartCalculate => "cart_calculate",
        Checkout => "checkout",
        Dashboard => "dashboard",
        DailyReport => "daily_report",
        KasbonReport => "kasbon_report",
        CustomersWithDebt => "customers_with_debt",
        CustomerKasbon => "customer_kasbon",
        TransactionList => "transaction_list",
        LowStock => "low_stock",
        CustomerCreate => "customer_create",
    }
}

/// Which stored credential a role authenticates with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    Admin,
    Cashier,
    Inventory,
}

impl Role {
    pub fn credential(&self) -> Credential {
        match self {
            Role::Manager | Role::Reader | Role::Writer => Credential::Admin,
            Role::Inventory => Credential::Inventory,
            Role::Cashier | Role::Browser => Credential::Cashier,
        }
    }
}

impl PaymentMethod {
    /// Name of the counter bumped whenever a checkout with this method is
    /// attempted.
    pub fn counter(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash_transactions",
            PaymentMethod::Transfer => "transfer_transactions",
            PaymentMethod::Qris => "qris_transactions",
            PaymentMethod::Kasbon => "kasbon_transactions",
        }
    }
}

/// How the outcome of one operation is judged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationPolicy {
    pub expected: u16,
    /// Alternate statuses that are handled outcomes rather than errors.
    #[serde(default)]
    pub acceptable: Vec<u16>,
    /// Whether unacceptable outcomes of this operation feed `error_rate`.
    #[serde(default = "counted_by_default")]
    pub counted: bool,
}

fn counted_by_default() -> bool {
    true
}

impl Operation {
    pub fn default_policy(&self) -> OperationPolicy {
        let (expected, acceptable) = match self {
            Operation::ProductDetail | Operation::CustomerKasbon => (200, vec![404]),
            Operation::CartCalculate => (200, vec![400]),
            // stock contention under load makes validation rejections normal
            Operation::Checkout => (201, vec![400]),
            // a duplicate phone number is a handled conflict
            Operation::CustomerCreate => (201, vec![409]),
            _ => (200, vec![]),
        };
        OperationPolicy {
            expected,
            acceptable,
            counted: true,
        }
    }

    pub fn trend_name(&self) -> String {
        format!("{}_duration", self.as_str())
    }
}
