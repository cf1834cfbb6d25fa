//! Currency code value object.
//!
//! Monetary amounts across the domain are `i64` minor units (e.g. kuruş,
//! cents) paired with one of these codes.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// ISO-4217-style alphabetic currency code (three uppercase ASCII letters).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const TRY: Currency = Currency(*b"TRY");
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");

    pub fn as_str(&self) -> &str {
        // Construction guarantees uppercase ASCII.
        core::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::TRY
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(|b| b.is_ascii_uppercase()) {
            return Err(DomainError::validation(format!(
                "currency must be a three-letter uppercase code, got {s:?}"
            )));
        }
        Ok(Currency([bytes[0], bytes[1], bytes[2]]))
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_codes() {
        assert_eq!("TRY".parse::<Currency>().unwrap(), Currency::TRY);
        assert_eq!("USD".parse::<Currency>().unwrap().as_str(), "USD");
    }

    #[test]
    fn rejects_malformed_codes() {
        for bad in ["", "TL", "try", "TRYY", "T1Y"] {
            assert!(bad.parse::<Currency>().is_err(), "accepted {bad:?}");
        }
    }
}
