//! Optimizer configuration

use std::path::PathBuf;

use clap::Parser;
use rusty_money::iso::Currency;

use crate::{
    fees::{DEFAULT_FLAT_FEE, FeeConfig, FeeError},
    pricing::{PricingError, parse_currency},
};

/// Retailer selection configuration
#[derive(Debug, Parser)]
#[command(
    name = "cardcart",
    about = "Pick a store for every card on a shopping list at the lowest total cost",
    long_about = None
)]
pub struct OptimizerConfig {
    /// Snapshot of items and listings (JSON or YAML)
    #[arg(env = "CARDCART_SNAPSHOT")]
    pub snapshot: PathBuf,

    /// Store shipping fees (JSON or YAML)
    #[arg(short, long, env = "CARDCART_FEES")]
    pub fees: Option<PathBuf>,

    /// Where to write the snapshot annotated with each item's optimal listing
    #[arg(short, long, env = "CARDCART_OUT")]
    pub out: Option<PathBuf>,

    /// Flat fee in minor units for stores without shipping data
    #[arg(long, env = "CARDCART_DEFAULT_FLAT_FEE", default_value_t = DEFAULT_FLAT_FEE)]
    pub default_flat_fee: i64,

    /// Currency of snapshots that do not declare one
    #[arg(short, long, env = "CARDCART_CURRENCY", default_value = "CAD")]
    pub currency: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

impl OptimizerConfig {
    /// Load configuration from environment and CLI arguments
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be parsed
    pub fn load() -> Result<Self, clap::Error> {
        // Load .env file if present (ignore if missing)
        _ = dotenvy::dotenv();

        Self::try_parse()
    }

    /// Resolved default currency.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::UnknownCurrency`] for unsupported codes.
    pub fn default_currency(&self) -> Result<&'static Currency, PricingError> {
        parse_currency(&self.currency)
    }

    /// Load the fee configuration, or start from an empty one when no file is given.
    ///
    /// The configured default flat fee always overrides the file's.
    ///
    /// # Errors
    ///
    /// Returns a [`FeeError`] if the file cannot be loaded or the default fee is negative.
    pub fn fee_config(&self) -> Result<FeeConfig, FeeError> {
        if self.default_flat_fee < 0 {
            return Err(FeeError::NegativeDefaultFee(self.default_flat_fee));
        }

        let mut config = match &self.fees {
            Some(path) => FeeConfig::load(path)?,
            None => FeeConfig::default(),
        };

        config.default_flat_fee = self.default_flat_fee;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::iso::USD;
    use testresult::TestResult;

    use super::*;

    #[test]
    fn parses_arguments_with_defaults() -> TestResult {
        let config = OptimizerConfig::try_parse_from(["cardcart", "deck.json"])?;

        assert_eq!(config.snapshot, PathBuf::from("deck.json"));
        assert_eq!(config.fees, None);

        Ok(())
    }

    #[test]
    fn overrides_default_flat_fee_and_currency() -> TestResult {
        let config = OptimizerConfig::try_parse_from([
            "cardcart",
            "deck.yaml",
            "--default-flat-fee",
            "750",
            "--currency",
            "usd",
        ])?;

        assert_eq!(config.default_currency()?, USD);
        assert_eq!(config.fee_config()?.default_flat_fee, 750);

        Ok(())
    }

    #[test]
    fn rejects_negative_default_flat_fee() -> TestResult {
        let config = OptimizerConfig::try_parse_from([
            "cardcart",
            "deck.json",
            "--default-flat-fee=-1",
        ])?;

        assert!(matches!(
            config.fee_config(),
            Err(FeeError::NegativeDefaultFee(-1))
        ));

        Ok(())
    }
}
