use borsh::BorshDeserialize;

use crate::{
    types::{SdkError, SdkResult},
    utils::account_discriminator,
};

pub mod oracle;
pub mod perp_market;
pub mod spot_market;
pub mod user;

pub use oracle::*;
pub use perp_market::*;
pub use spot_market::*;
pub use user::*;

/// An account owned by the drift program.
///
/// `NAME` is the anchor account name the on-chain discriminator is derived from.
pub trait DriftAccount: BorshDeserialize {
    const NAME: &'static str;

    fn discriminator() -> [u8; 8] {
        account_discriminator(Self::NAME)
    }
}

impl DriftAccount for User {
    const NAME: &'static str = "User";
}

impl DriftAccount for UserStats {
    const NAME: &'static str = "UserStats";
}

impl DriftAccount for PerpMarket {
    const NAME: &'static str = "PerpMarket";
}

impl DriftAccount for SpotMarket {
    const NAME: &'static str = "SpotMarket";
}

/// Decode `data` of an account fetched from the chain, discriminator included
pub fn decode_account<T: DriftAccount>(data: &[u8]) -> SdkResult<T> {
    if data.len() < 8 || data[..8] != T::discriminator() {
        return Err(SdkError::InvalidAccount);
    }
    T::deserialize(&mut &data[8..]).map_err(|_| SdkError::Deserializing)
}
