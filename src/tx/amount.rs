//! Human-readable token amounts and their base-unit representation

use crate::error::{TransferError, TransferResult};

use ethers::types::U256;
use ethers::utils::{format_units, parse_units, ParseUnits};
use serde::Serialize;
use std::fmt;

/// A strictly positive token quantity, kept in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenAmount {
    base_units: U256,
    decimals: u32,
}

impl TokenAmount {
    /// Parse a decimal string such as `"1101"` or `"0.25"` using `decimals` places
    pub fn parse(input: &str, decimals: u32) -> TransferResult<Self> {
        let invalid = |reason: String| TransferError::InvalidAmount {
            input: input.to_string(),
            reason,
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("amount is empty".to_string()));
        }

        if let Some((_, fraction)) = trimmed.split_once('.') {
            if fraction.len() > decimals as usize {
                return Err(invalid(format!(
                    "more than {} decimal places",
                    decimals
                )));
            }
        }

        let parsed = parse_units(trimmed, decimals).map_err(|e| invalid(e.to_string()))?;
        let base_units = match parsed {
            ParseUnits::U256(value) => value,
            ParseUnits::I256(_) => return Err(invalid("amount must be positive".to_string())),
        };

        if base_units.is_zero() {
            return Err(invalid("amount must be positive".to_string()));
        }

        Ok(Self {
            base_units,
            decimals,
        })
    }

    pub fn base_units(&self) -> U256 {
        self.base_units
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    /// Render any base-unit value with this amount's precision
    pub fn format(value: U256, decimals: u32) -> String {
        format_units(value, decimals).unwrap_or_else(|_| value.to_string())
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&Self::format(self.base_units, self.decimals))
    }
}
