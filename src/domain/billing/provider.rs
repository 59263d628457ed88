//! Payment providers known to the platform.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::ValidationError;

/// An external payment processor.
///
/// Each provider has its own event and record vocabulary; everything
/// downstream of parsing works on this enum only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Direct card-billing processor (minor-unit amounts, unix timestamps).
    Card,
    /// Third-party checkout service (decimal amounts, ISO timestamps).
    Checkout,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Card => "card",
            Provider::Checkout => "checkout",
        }
    }

    pub fn all() -> [Provider; 2] {
        [Provider::Card, Provider::Checkout]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "card" => Ok(Provider::Card),
            "checkout" => Ok(Provider::Checkout),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("Card".parse::<Provider>().unwrap(), Provider::Card);
        assert_eq!(" checkout ".parse::<Provider>().unwrap(), Provider::Checkout);
        assert!("paypal".parse::<Provider>().is_err());
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Provider::Checkout).unwrap(), "\"checkout\"");
    }
}
