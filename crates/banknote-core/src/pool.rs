//! Pool share / asset conversion math
//!
//! Shared by the lending pool and the staking pool. Given a pool holding
//! total value `V` with `S` shares outstanding:
//!
//! - depositing `a` mints `floor(a * S / V)` shares (1:1 when the pool is
//!   empty),
//! - withdrawing `s` shares returns `floor(s * V / S)` assets.
//!
//! All arithmetic floors toward zero; rounding dust stays in the pool and is
//! never minted from nothing. Intermediates use 256-bit math because `u128`
//! products overflow at 10^18 token scale.

use primitive_types::U256;

/// floor(a * b / d), never panicking: `d == 0` yields 0, and a quotient past
/// `u128::MAX` saturates. The saturation case is reachable (a dust-sized
/// divisor against full-scale amounts, e.g. a 1-wei reward stake), so it must
/// clamp rather than abort.
pub fn mul_div_floor(a: u128, b: u128, d: u128) -> u128 {
    if d == 0 {
        return 0;
    }
    let result = U256::from(a) * U256::from(b) / U256::from(d);
    if result.bits() > 128 {
        u128::MAX
    } else {
        result.as_u128()
    }
}

/// Shares minted for depositing `amount` into a pool of value
/// `total_assets` with `share_supply` shares outstanding.
pub fn shares_for_deposit(total_assets: u128, share_supply: u128, amount: u128) -> u128 {
    if share_supply == 0 || total_assets == 0 {
        // First deposit establishes the 1:1 baseline.
        amount
    } else {
        mul_div_floor(amount, share_supply, total_assets)
    }
}

/// Assets returned for redeeming `shares` from a pool of value
/// `total_assets` with `share_supply` shares outstanding.
pub fn assets_for_withdraw(total_assets: u128, share_supply: u128, shares: u128) -> u128 {
    if share_supply == 0 {
        return 0;
    }
    mul_div_floor(shares, total_assets, share_supply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ONE: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_first_deposit_is_one_to_one() {
        assert_eq!(shares_for_deposit(0, 0, 5000 * ONE), 5000 * ONE);
        // Donated value with no shares outstanding still mints 1:1.
        assert_eq!(shares_for_deposit(1000 * ONE, 0, 5000 * ONE), 5000 * ONE);
    }

    #[test]
    fn test_proportional_deposit() {
        // Pool worth 2x its share supply: half as many shares per asset.
        assert_eq!(
            shares_for_deposit(2000 * ONE, 1000 * ONE, 500 * ONE),
            250 * ONE
        );
    }

    #[test]
    fn test_withdraw_inverse_of_deposit_at_par() {
        let assets = assets_for_withdraw(1000 * ONE, 1000 * ONE, 400 * ONE);
        assert_eq!(assets, 400 * ONE);
    }

    #[test]
    fn test_mul_div_saturates_instead_of_panicking() {
        // 1e26 * 1e18 / 1 exceeds u128; clamp, never abort.
        assert_eq!(mul_div_floor(u128::MAX, 2, 1), u128::MAX);
        assert_eq!(
            mul_div_floor(100_000_000 * ONE, ONE, 1),
            u128::MAX
        );
        // At the boundary the exact value still comes through.
        assert_eq!(mul_div_floor(u128::MAX, 7, 7), u128::MAX);
    }

    #[test]
    fn test_large_amounts_do_not_overflow() {
        // ~1e24 * 1e24 would overflow u128 without the U256 intermediate.
        let v = 1_000_000 * ONE;
        let s = 999_999 * ONE;
        let shares = shares_for_deposit(v, s, 123_456 * ONE);
        assert!(shares > 0);
        assert!(shares < 123_456 * ONE);
    }

    proptest! {
        /// Deposit then immediate withdraw returns at most the deposit;
        /// the difference (dust) stays in the pool.
        #[test]
        fn prop_round_trip_never_returns_surplus(
            total in 1u128..1_000_000_000_000_000_000_000_000_000u128,
            supply in 1u128..1_000_000_000_000_000_000_000_000_000u128,
            amount in 0u128..1_000_000_000_000_000_000_000_000_000u128,
        ) {
            let shares = shares_for_deposit(total, supply, amount);
            let back = assets_for_withdraw(total + amount, supply + shares, shares);
            prop_assert!(back <= amount);
        }

        #[test]
        fn prop_mul_div_matches_reference(
            a in 0u128..u64::MAX as u128,
            b in 0u128..u64::MAX as u128,
            d in 1u128..u64::MAX as u128,
        ) {
            // Reference without widening, valid because operands fit u64.
            prop_assert_eq!(mul_div_floor(a, b, d), a * b / d);
        }
    }
}
