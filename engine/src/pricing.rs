use std::str::FromStr;

use ethers_core::types::{U256, U512};
use rust_decimal::Decimal;
use thiserror::Error;

/// Significand scale applied before the final division so the integer
/// result keeps 18 fractional digits of the price.
const SIGNIFICAND_EXP: usize = 18;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceError {
    /// The feed delivered a zero square-root ratio; no price is derivable.
    #[error("sqrt price ratio is zero")]
    ZeroSqrtPrice,

    /// The converted price does not fit the decimal range.
    #[error("price out of decimal range")]
    OutOfRange,
}

/// Static metadata of the monitored pool's token pair.
///
/// The raw Q64.96 ratio is token1-per-token0 in smallest units; which token
/// plays numerator in the *human* price is fixed here once, at configuration
/// time, and applied in exactly one place.
#[derive(Clone, Copy, Debug)]
pub struct PairMeta {
    pub token0_decimals: u8,
    pub token1_decimals: u8,

    /// Invert the final ratio so the quote currency is token0.
    pub quote_in_token0: bool,
}

/// Convert a Q64.96 square-root price ratio into a decimal price.
///
/// `sqrt_price_x96` encodes √(token1/token0) · 2⁹⁶ over smallest token
/// units. Its square is up to 320 bits, so the whole computation runs in
/// `U512`; the significand scale and the token-decimal adjustment are
/// multiplied in while the value is still integral, and a single division
/// produces the final fixed-point integer. Only that integer is handed to
/// `Decimal`. Narrowing to a float any earlier drops the low digits for
/// pairs with a large decimal gap.
pub fn price_from_sqrt_x96(sqrt_price_x96: U256, pair: &PairMeta) -> Result<Decimal, PriceError> {
    if sqrt_price_x96.is_zero() {
        return Err(PriceError::ZeroSqrtPrice);
    }

    let sq = U512::from(sqrt_price_x96)
        .checked_mul(U512::from(sqrt_price_x96))
        .ok_or(PriceError::OutOfRange)?;

    // price = sq / 2^192 · 10^(dec0 - dec1), carried as price · 10^18
    let (num_exp, den_exp) = decimal_adjustment(pair);

    let numerator = sq
        .checked_mul(pow10(SIGNIFICAND_EXP + num_exp))
        .ok_or(PriceError::OutOfRange)?;
    let denominator = (U512::one() << 192)
        .checked_mul(pow10(den_exp))
        .ok_or(PriceError::OutOfRange)?;

    let scaled = numerator / denominator;
    if scaled.is_zero() {
        // Underflow below 1e-18; nothing meaningful can be reported.
        return Err(PriceError::OutOfRange);
    }

    let price = Decimal::from_str(&scaled.to_string()).map_err(|_| PriceError::OutOfRange)?
        / Decimal::from(10u64.pow(SIGNIFICAND_EXP as u32));

    if pair.quote_in_token0 {
        Decimal::ONE
            .checked_div(price)
            .ok_or(PriceError::OutOfRange)
    } else {
        Ok(price)
    }
}

/// Split the pair's decimal gap into numerator and denominator powers of
/// ten so the adjustment multiplies in before the division.
fn decimal_adjustment(pair: &PairMeta) -> (usize, usize) {
    let d0 = pair.token0_decimals as i32;
    let d1 = pair.token1_decimals as i32;
    if d0 >= d1 {
        ((d0 - d1) as usize, 0)
    } else {
        (0, (d1 - d0) as usize)
    }
}

fn pow10(exp: usize) -> U512 {
    U512::from(10u8).pow(U512::from(exp))
}
