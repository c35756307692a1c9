//! Trade sizing and Q-score pricing.
//!
//! Converts a policy size hint into whole compute units and derives an
//! indicative unit price from the composite score.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

/// Price of one compute unit at a Q-score of 0.
const FLOOR_PRICE: Decimal = dec!(0.1);
/// Price added between a Q-score of 0 and 100.
const PRICE_SPAN: Decimal = dec!(0.9);

/// Indicative unit price: 0.1 at Q=0 rising linearly to 1.0 at Q=100.
pub fn unit_price(composite: f64) -> Decimal {
    let normalized = (composite / 100.0).clamp(0.0, 1.0);
    let normalized = Decimal::from_f64(normalized).unwrap_or(Decimal::ZERO);
    (FLOOR_PRICE + normalized * PRICE_SPAN).round_dp(4)
}

/// Units to buy for a size hint, bounded by the room left under `cap`
/// and by `max_trade_units`. At least one unit whenever there is room.
pub fn buy_units(size_hint: f64, holding: u64, cap: u64, max_trade_units: u64) -> u64 {
    let room = cap.saturating_sub(holding);
    if room == 0 {
        return 0;
    }
    let wanted = (size_hint.clamp(0.0, 1.0) * room as f64).floor() as u64;
    wanted.max(1).min(room).min(max_trade_units.max(1))
}

/// Units to sell for a size hint. At least one unit whenever anything is held.
pub fn sell_units(size_hint: f64, holding: u64, max_trade_units: u64) -> u64 {
    if holding == 0 {
        return 0;
    }
    let wanted = (size_hint.clamp(0.0, 1.0) * holding as f64).ceil() as u64;
    wanted.max(1).min(holding).min(max_trade_units.max(1))
}

/// Amount credited by a mint: `compute_units * floor(q) / 100`, integer math.
pub fn minted_amount(compute_units: u64, composite: f64) -> u64 {
    let q = composite.clamp(0.0, 100.0).floor() as u64;
    compute_units.saturating_mul(q) / 100
}
