use crate::drift::{Order, OrderType, PositionDirection};

/// An auction is complete once the slot window has fully elapsed
pub fn is_auction_complete(order: &Order, slot: u64) -> bool {
    if order.auction_duration == 0 {
        return true;
    }
    slot.saturating_sub(order.slot) > order.auction_duration as u64
}

/// Whether the order has a live auction price at `slot`
pub fn has_auction_price(order: &Order, slot: u64) -> bool {
    !is_auction_complete(order, slot)
        && (order.auction_start_price != 0 || order.auction_end_price != 0)
}

/// The order's auction price at `slot`, sampled on the line from the auction
/// start price to the end price.
///
/// precision: PRICE_PRECISION
pub fn get_auction_price(order: &Order, slot: u64, oracle_price: i64) -> i64 {
    match order.order_type {
        OrderType::Oracle => get_auction_price_for_oracle_offset_auction(order, slot, oracle_price),
        _ => get_auction_price_for_fixed_auction(order, slot),
    }
}

fn get_auction_price_for_fixed_auction(order: &Order, slot: u64) -> i64 {
    order.auction_start_price + auction_price_delta(order, slot)
}

/// Price of an auction whose start/end prices are offsets against the oracle
pub fn get_auction_price_for_oracle_offset_auction(
    order: &Order,
    slot: u64,
    oracle_price: i64,
) -> i64 {
    oracle_price + order.auction_start_price + auction_price_delta(order, slot)
}

fn auction_price_delta(order: &Order, slot: u64) -> i64 {
    let delta_denominator = order.auction_duration.saturating_sub(1) as i64;
    if delta_denominator == 0 {
        return 0;
    }
    let slots_elapsed = slot.saturating_sub(order.slot) as i64;
    let delta_numerator = slots_elapsed.min(delta_denominator);

    (order.auction_end_price - order.auction_start_price) * delta_numerator / delta_denominator
}
