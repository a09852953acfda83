use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

/// Fixed-point precision of all prices on chain
pub const PRICE_PRECISION: u64 = 1_000_000;
pub const PRICE_PRECISION_I64: i64 = 1_000_000;

/// The spot market quotes are settled in (USDC)
pub const QUOTE_SPOT_MARKET_INDEX: u16 = 0;

/// The Drift program
pub fn drift_program() -> Pubkey {
    Pubkey::from_str("dRiftyHA39MWEi3m9aunc5MzRF1JYuBsbn6VPcn33UH").expect("valid program id")
}

/// The drift state account, a pda of the drift program
pub fn state_account() -> Pubkey {
    Pubkey::find_program_address(&[b"drift_state"], &drift_program()).0
}

pub fn derive_perp_market_account(market_index: u16) -> Pubkey {
    Pubkey::find_program_address(
        &[b"perp_market", &market_index.to_le_bytes()],
        &drift_program(),
    )
    .0
}

pub fn derive_spot_market_account(market_index: u16) -> Pubkey {
    Pubkey::find_program_address(
        &[b"spot_market", &market_index.to_le_bytes()],
        &drift_program(),
    )
    .0
}
