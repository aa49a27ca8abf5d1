//! Size and fee arithmetic for legacy P2PKH transactions
//!
//! The size model is a fixed linear approximation of a single-signature
//! legacy transaction. It slightly overestimates the signed size, so the
//! measured virtual size of an assembled transaction is usually a few bytes
//! smaller than the estimate that priced it.
//!
//! Example:
//! ```
//! use bitsend_common::math::{estimate_tx_size, calculate_fee};
//! use bitsend_common::types::FeeRate;
//!
//! assert_eq!(estimate_tx_size(1, 2), 226);
//! assert_eq!(calculate_fee(226, FeeRate::from_sat_per_vb(2)), 452);
//! ```

use crate::types::FeeRate;

/// Fixed transaction overhead (version, locktime, counts)
pub const TX_OVERHEAD_VBYTES: u64 = 10;

/// Approximate size of a signed P2PKH input
pub const P2PKH_INPUT_VBYTES: u64 = 148;

/// Approximate size of a P2PKH output
pub const P2PKH_OUTPUT_VBYTES: u64 = 34;

/// Estimates the virtual size of a transaction from its input and output counts
pub fn estimate_tx_size(inputs: usize, outputs: usize) -> u64 {
    TX_OVERHEAD_VBYTES + inputs as u64 * P2PKH_INPUT_VBYTES + outputs as u64 * P2PKH_OUTPUT_VBYTES
}

/// Calculates the fee for a transaction based on size and fee rate
///
/// Both operands are whole numbers; the product never rounds.
pub fn calculate_fee(vsize: u64, fee_rate: FeeRate) -> u64 {
    vsize.saturating_mul(fee_rate.as_sat_per_vb())
}

/// Whether a computed change value must be dropped instead of emitted
///
/// Change equal to the threshold is dust; only `change > threshold` is kept.
pub fn is_dust_change(change: u64, dust_threshold: u64) -> bool {
    change <= dust_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_model_matches_reference_points() {
        assert_eq!(estimate_tx_size(1, 1), 192);
        assert_eq!(estimate_tx_size(1, 2), 226);
        assert_eq!(estimate_tx_size(3, 2), 522);
        assert_eq!(estimate_tx_size(0, 0), 10);
    }

    #[test]
    fn dust_boundary_is_inclusive() {
        assert!(is_dust_change(546, 546));
        assert!(is_dust_change(0, 546));
        assert!(!is_dust_change(547, 546));
    }

    #[test]
    fn fee_saturates_instead_of_overflowing() {
        assert_eq!(calculate_fee(u64::MAX, FeeRate::from_sat_per_vb(2)), u64::MAX);
    }
}
