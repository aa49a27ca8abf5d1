//! Fee rate lookup and fee estimation
//!
//! The rate comes from the explorer's fee-estimate table at a fixed
//! confirmation target. A missing table, a missing entry or a nonsense value
//! all fall back to a constant rate; a fee lookup never aborts a payment.
//!
//! Rates are rounded up to whole sat/vB when fetched. Everything downstream
//! is integer arithmetic.

use log::{debug, warn};
use std::collections::HashMap;

use crate::chain_source::ChainSource;
use crate::math::{calculate_fee, estimate_tx_size};
use crate::types::FeeRate;

/// Confirmation target used for "medium priority" payments
pub const DEFAULT_CONFIRMATION_TARGET: u32 = 6;

/// Rate used when no estimate is available
pub const FALLBACK_FEE_RATE: FeeRate = FeeRate::from_sat_per_vb(2);

/// Pick the estimate for `target_blocks`, rounded up to a whole rate
///
/// Returns None when the entry is absent, not finite, or not positive.
pub fn rate_from_estimates(estimates: &HashMap<u32, f64>, target_blocks: u32) -> Option<FeeRate> {
    let raw = *estimates.get(&target_blocks)?;
    if !raw.is_finite() || raw <= 0.0 {
        warn!(
            "Discarding fee estimate {} for target {} blocks",
            raw, target_blocks
        );
        return None;
    }
    Some(FeeRate::from_sat_per_vb(raw.ceil() as u64))
}

/// Query `source` for the rate at `target_blocks`, falling back to `fallback`
pub fn estimate_rate<S: ChainSource + ?Sized>(
    source: &S,
    target_blocks: u32,
    fallback: FeeRate,
) -> FeeRate {
    match source.fee_estimates() {
        Ok(estimates) => match rate_from_estimates(&estimates, target_blocks) {
            Some(rate) => {
                debug!("Fee rate for {} blocks: {}", target_blocks, rate);
                rate
            }
            None => {
                warn!(
                    "No fee estimate for {} blocks, using fallback {}",
                    target_blocks, fallback
                );
                fallback
            }
        },
        Err(e) => {
            warn!("Fee estimates unavailable ({}), using fallback {}", e, fallback);
            fallback
        }
    }
}

/// A fee rate observation plus the size model used to price transactions
///
/// One model is fixed per payment so that selection and assembly price
/// against the same rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeModel {
    rate: FeeRate,
}

impl FeeModel {
    pub fn with_rate(rate: FeeRate) -> Self {
        Self { rate }
    }

    /// Observe the current rate once from `source`
    pub fn from_source<S: ChainSource + ?Sized>(
        source: &S,
        target_blocks: u32,
        fallback: FeeRate,
    ) -> Self {
        Self::with_rate(estimate_rate(source, target_blocks, fallback))
    }

    pub fn rate(&self) -> FeeRate {
        self.rate
    }

    pub fn estimate_virtual_size(&self, inputs: usize, outputs: usize) -> u64 {
        estimate_tx_size(inputs, outputs)
    }

    pub fn estimate_fee(&self, inputs: usize, outputs: usize) -> u64 {
        calculate_fee(self.estimate_virtual_size(inputs, outputs), self.rate)
    }
}

impl Default for FeeModel {
    fn default() -> Self {
        Self::with_rate(FALLBACK_FEE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fractional_rates_round_up() {
        let mut estimates = HashMap::new();
        estimates.insert(6, 3.2);
        estimates.insert(1, 12.0);
        assert_eq!(
            rate_from_estimates(&estimates, 6),
            Some(FeeRate::from_sat_per_vb(4))
        );
        assert_eq!(
            rate_from_estimates(&estimates, 1),
            Some(FeeRate::from_sat_per_vb(12))
        );
    }

    #[test]
    fn bad_entries_are_ignored() {
        let mut estimates = HashMap::new();
        estimates.insert(6, f64::NAN);
        estimates.insert(3, -1.0);
        estimates.insert(2, 0.0);
        assert_eq!(rate_from_estimates(&estimates, 6), None);
        assert_eq!(rate_from_estimates(&estimates, 3), None);
        assert_eq!(rate_from_estimates(&estimates, 2), None);
        assert_eq!(rate_from_estimates(&estimates, 144), None);
    }

    #[test]
    fn model_prices_with_linear_size() {
        let model = FeeModel::with_rate(FeeRate::from_sat_per_vb(2));
        assert_eq!(model.estimate_virtual_size(1, 2), 226);
        assert_eq!(model.estimate_fee(1, 2), 452);
        assert_eq!(model.estimate_fee(1, 1), 384);
    }
}
