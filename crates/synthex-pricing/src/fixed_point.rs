//! 18-decimal fixed-point helpers.
//!
//! Products and quotients are computed exactly on the integer mantissas and
//! then truncated toward zero to [`PRECISION_DECIMALS`] digits, so the
//! system never credits more than the exact rational value.
//!
//! A result must fit a 96-bit mantissa once truncated. With all 18
//! fractional digits in use that caps its magnitude at about 7.9e10; values
//! with fewer fractional digits may be larger. Anything that does not fit
//! fails with `ArithmeticOverflow` instead of losing precision.

use rust_decimal::Decimal;
use synthex_types::constants::PRECISION_DECIMALS;
use synthex_types::{Result, SynthexError};

/// `trunc(a * b)`.
pub fn mul_trunc(a: Decimal, b: Decimal) -> Result<Decimal> {
    let overflow = SynthexError::ArithmeticOverflow { context: "mul" };
    let mut product = wide_mul(a.mantissa().unsigned_abs(), b.mantissa().unsigned_abs());
    let scale = a.scale() + b.scale();
    if scale > PRECISION_DECIMALS {
        for _ in PRECISION_DECIMALS..scale {
            div_small(&mut product, 10);
        }
    } else {
        for _ in scale..PRECISION_DECIMALS {
            mul_small(&mut product, 10).ok_or_else(|| overflow.clone())?;
        }
    }
    finish(product, a.is_sign_negative() != b.is_sign_negative(), overflow)
}

/// `trunc(a / b)`. Division by zero is rejected.
pub fn div_trunc(a: Decimal, b: Decimal) -> Result<Decimal> {
    if b.is_zero() {
        return Err(SynthexError::InvalidAmount {
            reason: "division by zero rate".into(),
        });
    }
    let overflow = SynthexError::ArithmeticOverflow { context: "div" };
    let numerator = a.mantissa().unsigned_abs();
    let divisor = b.mantissa().unsigned_abs();

    // a / b = (ma / mb) * 10^(sb - sa); the quotient is wanted at 18 dp.
    let shift = i64::from(PRECISION_DECIMALS) + i64::from(b.scale()) - i64::from(a.scale());
    let mut quotient = widen(numerator / divisor);
    let mut remainder = numerator % divisor;
    if shift >= 0 {
        // Long division, one decimal digit per step. The remainder stays
        // below the 96-bit divisor so `remainder * 10` fits a u128.
        for _ in 0..shift {
            let scaled = remainder * 10;
            let digit = u64::try_from(scaled / divisor).map_err(|_| overflow.clone())?;
            remainder = scaled % divisor;
            mul_small(&mut quotient, 10).ok_or_else(|| overflow.clone())?;
            add_small(&mut quotient, digit).ok_or_else(|| overflow.clone())?;
        }
    } else {
        for _ in shift..0 {
            div_small(&mut quotient, 10);
        }
    }
    finish(quotient, a.is_sign_negative() != b.is_sign_negative(), overflow)
}

/// Value of `amount` units priced at `source_rate`, expressed in units
/// priced at `destination_rate`: `trunc(trunc(amount * src) / dst)`.
pub fn effective_value(
    amount: Decimal,
    source_rate: Decimal,
    destination_rate: Decimal,
) -> Result<Decimal> {
    let value = mul_trunc(amount, source_rate)?;
    div_trunc(value, destination_rate)
}

// 256-bit unsigned integer, little-endian u64 limbs.
type Wide = [u64; 4];

#[allow(clippy::cast_possible_truncation)]
fn widen(v: u128) -> Wide {
    [v as u64, (v >> 64) as u64, 0, 0]
}

#[allow(clippy::cast_possible_truncation)]
fn wide_mul(a: u128, b: u128) -> Wide {
    let a = [a as u64, (a >> 64) as u64];
    let b = [b as u64, (b >> 64) as u64];
    let mut out = [0u64; 4];
    for (i, &x) in a.iter().enumerate() {
        let mut carry = 0u128;
        for (j, &y) in b.iter().enumerate() {
            let t = u128::from(out[i + j]) + u128::from(x) * u128::from(y) + carry;
            out[i + j] = t as u64;
            carry = t >> 64;
        }
        out[i + 2] = carry as u64;
    }
    out
}

#[allow(clippy::cast_possible_truncation)]
fn mul_small(n: &mut Wide, m: u64) -> Option<()> {
    let mut carry = 0u128;
    for limb in n.iter_mut() {
        let t = u128::from(*limb) * u128::from(m) + carry;
        *limb = t as u64;
        carry = t >> 64;
    }
    (carry == 0).then_some(())
}

#[allow(clippy::cast_possible_truncation)]
fn add_small(n: &mut Wide, v: u64) -> Option<()> {
    let mut carry = u128::from(v);
    for limb in n.iter_mut() {
        if carry == 0 {
            break;
        }
        let t = u128::from(*limb) + carry;
        *limb = t as u64;
        carry = t >> 64;
    }
    (carry == 0).then_some(())
}

/// Divides in place and returns the remainder.
#[allow(clippy::cast_possible_truncation)]
fn div_small(n: &mut Wide, d: u64) -> u64 {
    let mut rem = 0u128;
    for limb in n.iter_mut().rev() {
        let cur = (rem << 64) | u128::from(*limb);
        *limb = (cur / u128::from(d)) as u64;
        rem = cur % u128::from(d);
    }
    rem as u64
}

/// Turns an 18-dp magnitude into a `Decimal`, dropping trailing zeros so
/// that results with few fractional digits can use the wider integer range.
fn finish(mut value: Wide, negative: bool, overflow: SynthexError) -> Result<Decimal> {
    let mut scale = PRECISION_DECIMALS;
    while scale > 0 {
        let mut reduced = value;
        if div_small(&mut reduced, 10) != 0 {
            break;
        }
        value = reduced;
        scale -= 1;
    }
    if value[2] != 0 || value[3] != 0 {
        return Err(overflow);
    }
    let magnitude = i128::try_from(u128::from(value[0]) | (u128::from(value[1]) << 64))
        .map_err(|_| overflow.clone())?;
    let signed = if negative { -magnitude } else { magnitude };
    Decimal::try_from_i128_with_scale(signed, scale).map_err(|_| overflow)
}
