//! How orders are labelled for staff.

use serde::{Deserialize, Serialize};

use super::StatusDisplay;

/// Fallback when an order has no usable customer name.
pub const UNKNOWN_CUSTOMER: &str = "Unknown Customer";

/// How the customer pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Cash on delivery (tagged `cod` or `ppcod` in Shopify).
    Cod,
    /// Paid online.
    Prepaid,
}

impl PaymentMethod {
    /// Infer the payment method from a comma-separated Shopify tag string.
    #[must_use]
    pub fn from_tags(tags: &str) -> Self {
        let lower = tags.to_lowercase();
        if lower.contains("cod") || lower.contains("ppcod") {
            Self::Cod
        } else {
            Self::Prepaid
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Prepaid => "prepaid",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::types::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cod" => Ok(Self::Cod),
            "prepaid" => Ok(Self::Prepaid),
            _ => Err(crate::types::ParseEnumError::new("payment method", s)),
        }
    }
}

/// Badge for a Shopify financial status.
#[must_use]
pub fn financial_status_display(status: &str) -> StatusDisplay {
    let known = match status {
        "pending" => Some(("Pending", "⏳", "yellow")),
        "paid" => Some(("Paid", "✅", "green")),
        "partially_paid" => Some(("Partially Paid", "⚠️", "orange")),
        "refunded" => Some(("Refunded", "↩️", "red")),
        "cancelled" => Some(("Cancelled", "❌", "red")),
        _ => None,
    };

    match known {
        Some((label, icon, color)) => StatusDisplay {
            label: label.to_owned(),
            color,
            icon,
        },
        None => StatusDisplay {
            label: title_case(status),
            color: "gray",
            icon: "❓",
        },
    }
}

/// `partially_refunded` → `Partially Refunded`.
#[must_use]
pub fn title_case(raw: &str) -> String {
    raw.split(['_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Join first and last name, falling back to [`UNKNOWN_CUSTOMER`].
#[must_use]
pub fn customer_name(first: Option<&str>, last: Option<&str>) -> String {
    let joined = format!("{} {}", first.unwrap_or(""), last.unwrap_or(""));
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        UNKNOWN_CUSTOMER.to_owned()
    } else {
        trimmed.to_owned()
    }
}
