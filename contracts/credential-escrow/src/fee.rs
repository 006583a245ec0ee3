/*!
 * Platform Fee Calculation
 *
 * Fee rates are expressed in units of `RATE_PRECISION`:
 * 100_000_000 = 100%, 10_000_000 = 10%, 1 = 0.000001%.
 *
 * All divisions floor. When a released batch is split into per-item amounts for
 * the event stream, the remainder ("dust") is reported explicitly by `FeeSplit`
 * so the per-item events plus the dust always add up to what was transferred.
 */

use crate::types::Error;

/// Denominator of every fee rate
pub const RATE_PRECISION: u32 = 100_000_000;

/// 10% platform cut unless the owner configures otherwise
pub const DEFAULT_FEE_RATE: u32 = 10_000_000;

/// Computes `floor(amount * rate / RATE_PRECISION)` without an intermediate overflow.
///
/// Splitting `amount` into `q * P + r` keeps every product within range:
/// `q * rate <= amount` because `rate <= P`, and `r * rate < P * P`.
pub fn platform_fee(amount: i128, rate: u32) -> i128 {
    let precision = RATE_PRECISION as i128;
    let rate = rate as i128;
    (amount / precision) * rate + (amount % precision) * rate / precision
}

/// Rates above 100% are rejected, never clamped.
pub fn validate_rate(rate: u32) -> Result<(), Error> {
    if rate > RATE_PRECISION {
        return Err(Error::FeeRateOutOfRange);
    }
    Ok(())
}

/// How a released amount is divided between the platform and the verifier,
/// in total and per released item.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FeeSplit {
    /// Transferred to the platform
    pub platform_fee: i128,
    /// Transferred to the verifier, `amount - platform_fee`
    pub idv_fee: i128,
    /// `floor(platform_fee / item_count)`, reported in each Released event
    pub platform_fee_per_item: i128,
    /// `floor(idv_fee / item_count)`, reported in each Released event
    pub idv_fee_per_item: i128,
    /// `platform_fee - platform_fee_per_item * item_count`
    pub platform_fee_dust: i128,
    /// `idv_fee - idv_fee_per_item * item_count`
    pub idv_fee_dust: i128,
}

impl FeeSplit {
    /// `item_count` must be non-zero; release paths reject empty release sets before this point.
    pub fn new(amount: i128, rate: u32, item_count: u32) -> Self {
        let platform_fee = platform_fee(amount, rate);
        let idv_fee = amount - platform_fee;
        let count = item_count.max(1) as i128;

        let platform_fee_per_item = platform_fee / count;
        let idv_fee_per_item = idv_fee / count;

        Self {
            platform_fee,
            idv_fee,
            platform_fee_per_item,
            idv_fee_per_item,
            platform_fee_dust: platform_fee - platform_fee_per_item * count,
            idv_fee_dust: idv_fee - idv_fee_per_item * count,
        }
    }
}
