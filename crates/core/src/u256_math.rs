//! U256 arithmetic for repay amount planning.
//!
//! All amounts stay in raw token units. Conversions to `f64` exist for
//! logging only.

use alloy::primitives::U256;

/// WAD constant: 1e18, the scale of every Comptroller mantissa.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Apply a 1e18-scaled mantissa to `amount`: `amount * mantissa / 1e18`.
///
/// The result never exceeds `amount`, so a misconfigured mantissa above 1e18
/// cannot produce a repay larger than the debt.
#[inline(always)]
pub fn apply_mantissa(amount: U256, mantissa: U256) -> U256 {
    let scaled = match amount.checked_mul(mantissa) {
        Some(product) => product / WAD,
        None => (amount / WAD).saturating_mul(mantissa),
    };
    scaled.min(amount)
}

/// Halve `amount`, or `None` once the result would fall below `floor`.
///
/// A zero floor is treated as 1 so the sequence always terminates.
#[inline(always)]
pub fn halve_above(amount: U256, floor: U256) -> Option<U256> {
    let floor = floor.max(U256::from(1u64));
    let next = amount >> 1;
    (next >= floor).then_some(next)
}

/// Convert a WAD mantissa to f64 (0.5e18 -> 0.5).
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn half() -> U256 {
        WAD / U256::from(2u64)
    }

    #[test]
    fn test_apply_mantissa() {
        assert_eq!(apply_mantissa(U256::from(1000u64), half()), U256::from(500u64));
        assert_eq!(apply_mantissa(U256::from(1001u64), half()), U256::from(500u64));
        assert_eq!(apply_mantissa(U256::ZERO, half()), U256::ZERO);
        assert_eq!(apply_mantissa(U256::from(1000u64), U256::ZERO), U256::ZERO);
    }

    #[test]
    fn test_apply_mantissa_clamps_to_amount() {
        let debt = U256::from(1000u64);
        assert_eq!(apply_mantissa(debt, WAD * U256::from(3u64)), debt);
    }

    #[test]
    fn test_apply_mantissa_overflow_path() {
        let amount = U256::MAX / U256::from(2u64);
        let result = apply_mantissa(amount, half());
        assert!(result < amount);
        assert!(result > U256::ZERO);
    }

    #[test]
    fn test_halve_above_strictly_decreases() {
        let mut amount = U256::from(500u64);
        let mut seen = vec![amount];
        while let Some(next) = halve_above(amount, U256::from(1u64)) {
            assert!(next < amount);
            amount = next;
            seen.push(amount);
        }
        assert_eq!(
            seen,
            [500u64, 250, 125, 62, 31, 15, 7, 3, 1].map(U256::from).to_vec()
        );
    }

    #[test]
    fn test_halve_above_respects_floor() {
        assert_eq!(halve_above(U256::from(100u64), U256::from(60u64)), None);
        assert_eq!(
            halve_above(U256::from(100u64), U256::from(50u64)),
            Some(U256::from(50u64))
        );
        // zero floor behaves like 1
        assert_eq!(halve_above(U256::from(1u64), U256::ZERO), None);
    }

    #[test]
    fn test_wad_to_f64() {
        assert_eq!(wad_to_f64(half()), 0.5);
        assert_eq!(wad_to_f64(WAD), 1.0);
    }
}
