use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{ChargingError, ChargingResult};

/// Amounts are kept to the currency's minor unit (cents).
pub const MINOR_UNIT_DECIMALS: u32 = 2;

/// Readings and rates entered at the sales terminal or at completion.
///
/// The percentage fields are used together, as are the energy fields. Any
/// incomplete group contributes nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BillingInput {
    pub start_percentage: Option<Decimal>,
    pub end_percentage: Option<Decimal>,
    pub rate_per_percentage_point: Option<Decimal>,
    pub energy_consumed: Option<Decimal>,
    pub rate_per_energy_unit: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BillingBreakdown {
    pub percentage_amount: Decimal,
    pub energy_amount: Decimal,
    pub total_amount: Decimal,
}

fn to_minor_units(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MINOR_UNIT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

fn product(lhs: Decimal, rhs: Decimal) -> ChargingResult<Decimal> {
    lhs.checked_mul(rhs).ok_or_else(|| {
        ChargingError::Validation(format!("Billing amount {lhs} x {rhs} is out of range"))
    })
}

impl BillingInput {
    /// Battery delta times rate. A delta that is not positive is billed as zero.
    pub fn percentage_component(&self) -> ChargingResult<Decimal> {
        let (Some(start), Some(end), Some(rate)) = (
            self.start_percentage,
            self.end_percentage,
            self.rate_per_percentage_point,
        ) else {
            return Ok(Decimal::ZERO);
        };
        if end <= start {
            return Ok(Decimal::ZERO);
        }
        let delta = end.checked_sub(start).ok_or_else(|| {
            ChargingError::Validation(format!("Battery delta {start}..{end} is out of range"))
        })?;
        product(delta, rate).map(to_minor_units)
    }

    pub fn energy_component(&self) -> ChargingResult<Decimal> {
        match (self.energy_consumed, self.rate_per_energy_unit) {
            (Some(energy), Some(rate)) => product(energy, rate).map(to_minor_units),
            _ => Ok(Decimal::ZERO),
        }
    }

    pub fn has_percentage_readings(&self) -> bool {
        self.start_percentage.is_some()
            && self.end_percentage.is_some()
            && self.rate_per_percentage_point.is_some()
    }

    pub fn has_energy_readings(&self) -> bool {
        self.energy_consumed.is_some() && self.rate_per_energy_unit.is_some()
    }
}

/// Amount due for `input`.
///
/// Each component is rounded to the minor unit before summing, so the live
/// preview and the recorded amount always agree and the two modes add up exactly.
pub fn calculate(input: &BillingInput) -> ChargingResult<BillingBreakdown> {
    let percentage_amount = input.percentage_component()?;
    let energy_amount = input.energy_component()?;
    let total_amount = percentage_amount
        .checked_add(energy_amount)
        .ok_or_else(|| ChargingError::Validation("Billing total is out of range".into()))?;

    Ok(BillingBreakdown {
        percentage_amount,
        energy_amount,
        total_amount,
    })
}
