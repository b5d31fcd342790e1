//! Exchange fee computation.

use rust_decimal::Decimal;
use synthex_types::{AssetKey, ExchangeSettings, Result, SynthexError};

use crate::fixed_point::{effective_value, mul_trunc};

/// Gross, fee and net amounts of one exchange, in destination units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    pub gross: Decimal,
    pub fee: Decimal,
    pub net: Decimal,
    pub fee_rate: Decimal,
}

/// Fee rules for one settings snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FeeCalculator<'a> {
    settings: &'a ExchangeSettings,
}

impl<'a> FeeCalculator<'a> {
    #[must_use]
    pub fn new(settings: &'a ExchangeSettings) -> Self {
        Self { settings }
    }

    /// Rate charged when exchanging `_source` into `destination`. Only the
    /// destination asset is priced.
    #[must_use]
    pub fn fee_rate(&self, _source: &AssetKey, destination: &AssetKey) -> Decimal {
        self.settings.fee_rate_for(destination)
    }

    /// Split `gross` into fee and net at `fee_rate`.
    ///
    /// Fails with `FeeExceedsAmount` when nothing would be left for the
    /// holder, which also covers a zero gross.
    pub fn compute(&self, gross: Decimal, fee_rate: Decimal) -> Result<FeeQuote> {
        let fee = mul_trunc(gross, fee_rate)?;
        if fee >= gross {
            return Err(SynthexError::FeeExceedsAmount { fee, gross });
        }
        Ok(FeeQuote {
            gross,
            fee,
            net: gross - fee,
            fee_rate,
        })
    }

    /// Full quote for exchanging `amount` of `source` into `destination`.
    pub fn quote(
        &self,
        source: &AssetKey,
        amount: Decimal,
        source_rate: Decimal,
        destination: &AssetKey,
        destination_rate: Decimal,
    ) -> Result<FeeQuote> {
        let gross = effective_value(amount, source_rate, destination_rate)?;
        self.compute(gross, self.fee_rate(source, destination))
    }
}
