//! Coin selection
//!
//! Outputs are taken in the order the explorer lists them, with no sorting
//! by value, until they cover the payment plus a rough two-output fee plus a
//! safety margin. The selector does not decide whether the result is enough;
//! the assembler checks that against its exact pricing.

use log::debug;

use crate::error::{PaymentError, PaymentResult};
use crate::fee_estimation::FeeModel;
use crate::types::UtxoValue;

/// Extra value gathered above amount plus fee (sats)
pub const SELECTION_SAFETY_MARGIN: u64 = 1000;

/// Outputs assumed while selecting: payment and change
const SELECTION_OUTPUT_COUNT: usize = 2;

/// Outcome of a selection pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<U> {
    /// Chosen outputs, in listing order
    pub chosen: Vec<U>,
    pub total_input_value: u64,
}

impl<U> Selection<U> {
    pub fn len(&self) -> usize {
        self.chosen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chosen.is_empty()
    }
}

/// First-fit selector in listing order
#[derive(Debug, Clone, Copy)]
pub struct CoinSelector {
    fee_model: FeeModel,
    margin: u64,
}

impl CoinSelector {
    pub fn new(fee_model: FeeModel) -> Self {
        Self {
            fee_model,
            margin: SELECTION_SAFETY_MARGIN,
        }
    }

    pub fn with_margin(mut self, margin: u64) -> Self {
        self.margin = margin;
        self
    }

    /// Value a selection of `input_count` outputs must reach to stop early
    pub fn threshold(&self, target_amount: u64, input_count: usize) -> u64 {
        target_amount
            .saturating_add(self.fee_model.estimate_fee(input_count, SELECTION_OUTPUT_COUNT))
            .saturating_add(self.margin)
    }

    /// Take outputs from the front of `available` until the threshold is met
    ///
    /// Running out before the threshold is not an error here; everything
    /// collected is returned. An empty `available` is.
    pub fn select<U: UtxoValue + Clone>(
        &self,
        available: &[U],
        target_amount: u64,
    ) -> PaymentResult<Selection<U>> {
        if available.is_empty() {
            return Err(PaymentError::NoSpendableFunds(
                "no unspent outputs available".to_string(),
            ));
        }

        let mut chosen = Vec::new();
        let mut total: u64 = 0;

        for utxo in available {
            chosen.push(utxo.clone());
            total = total.saturating_add(utxo.value_sats());

            if total >= self.threshold(target_amount, chosen.len()) {
                break;
            }
        }

        debug!(
            "Selected {} of {} outputs worth {} sats for target {}",
            chosen.len(),
            available.len(),
            total,
            target_amount
        );

        Ok(Selection {
            chosen,
            total_input_value: total,
        })
    }

    /// Take every output, for sending the whole balance
    pub fn select_all<U: UtxoValue + Clone>(&self, available: &[U]) -> PaymentResult<Selection<U>> {
        if available.is_empty() {
            return Err(PaymentError::NoSpendableFunds(
                "no unspent outputs available".to_string(),
            ));
        }
        Ok(Selection {
            chosen: available.to_vec(),
            total_input_value: available.iter().map(|utxo| utxo.value_sats()).sum(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeeRate;

    #[derive(Debug, Clone, PartialEq)]
    struct Coin(u64);

    impl UtxoValue for Coin {
        fn value_sats(&self) -> u64 {
            self.0
        }
    }

    fn selector() -> CoinSelector {
        CoinSelector::new(FeeModel::with_rate(FeeRate::from_sat_per_vb(2)))
    }

    #[test]
    fn stops_at_first_sufficient_prefix() {
        // threshold for one input: 50_000 + 452 + 1000
        let coins = vec![Coin(51_452), Coin(1), Coin(1)];
        let selection = selector().select(&coins, 50_000).unwrap();
        assert_eq!(selection.chosen, vec![Coin(51_452)]);
    }

    #[test]
    fn does_not_reorder_by_value() {
        let coins = vec![Coin(10_000), Coin(100_000), Coin(5_000)];
        let selection = selector().select(&coins, 20_000).unwrap();
        assert_eq!(selection.chosen, vec![Coin(10_000), Coin(100_000)]);
        assert_eq!(selection.total_input_value, 110_000);
    }

    #[test]
    fn short_selection_returns_everything() {
        let coins = vec![Coin(1_000), Coin(2_000)];
        let selection = selector().select(&coins, 50_000).unwrap();
        assert_eq!(selection.len(), 2);
        assert_eq!(selection.total_input_value, 3_000);
    }

    #[test]
    fn empty_listing_is_no_spendable_funds() {
        let err = selector().select::<Coin>(&[], 1).unwrap_err();
        assert!(matches!(err, PaymentError::NoSpendableFunds(_)));
    }
}
