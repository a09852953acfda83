use borsh::{BorshDeserialize, BorshSerialize};

use crate::{
    constants::{PRICE_PRECISION, PRICE_PRECISION_I64},
    types::{SdkError, SdkResult},
};

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OracleSource {
    #[default]
    Pyth,
    Switchboard,
    QuoteAsset,
    Pyth1K,
    Pyth1M,
    PythStableCoin,
    Prelaunch,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OraclePriceData {
    /// precision: PRICE_PRECISION
    pub price: i64,
    /// precision: PRICE_PRECISION
    pub confidence: u64,
    /// slots between the oracle publish and the observing slot
    pub delay: i64,
    pub has_sufficient_number_of_data_points: bool,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default)]
pub struct HistoricalOracleData {
    /// precision: PRICE_PRECISION
    pub last_oracle_price: i64,
    /// precision: PRICE_PRECISION
    pub last_oracle_conf: u64,
    pub last_oracle_delay: i64,
    /// precision: PRICE_PRECISION
    pub last_oracle_price_twap: i64,
    /// precision: PRICE_PRECISION
    pub last_oracle_price_twap_5min: i64,
    pub last_oracle_price_twap_ts: i64,
}

#[derive(BorshSerialize, BorshDeserialize, Clone, Copy, Debug, Default)]
pub struct HistoricalIndexData {
    /// precision: PRICE_PRECISION
    pub last_index_bid_price: u64,
    /// precision: PRICE_PRECISION
    pub last_index_ask_price: u64,
    /// precision: PRICE_PRECISION
    pub last_index_price_twap: u64,
    /// precision: PRICE_PRECISION
    pub last_index_price_twap_5min: u64,
    pub last_index_price_twap_ts: i64,
}

// offsets into the pyth price account layout
const PYTH_EXPONENT_OFFSET: usize = 20;
const PYTH_AGG_PRICE_OFFSET: usize = 208;
const PYTH_AGG_CONF_OFFSET: usize = 216;
const PYTH_AGG_PUB_SLOT_OFFSET: usize = 232;

/// Parse an oracle account's price into `PRICE_PRECISION` terms
pub fn get_oracle_price(
    oracle_source: OracleSource,
    account_data: &[u8],
    slot: u64,
) -> SdkResult<OraclePriceData> {
    match oracle_source {
        OracleSource::Pyth => get_pyth_price(account_data, slot, 1),
        OracleSource::Pyth1K => get_pyth_price(account_data, slot, 1_000),
        OracleSource::Pyth1M => get_pyth_price(account_data, slot, 1_000_000),
        OracleSource::PythStableCoin => {
            let mut data = get_pyth_price(account_data, slot, 1)?;
            let five_bps = PRICE_PRECISION_I64 / 2_000;
            if (data.price - PRICE_PRECISION_I64).abs() <= five_bps.min(data.confidence as i64) {
                data.price = PRICE_PRECISION_I64;
            }
            Ok(data)
        }
        OracleSource::QuoteAsset => Ok(OraclePriceData {
            price: PRICE_PRECISION_I64,
            confidence: 1,
            delay: 0,
            has_sufficient_number_of_data_points: true,
        }),
        OracleSource::Prelaunch => {
            let price = read_i64(account_data, 8)?;
            Ok(OraclePriceData {
                price,
                confidence: 0,
                delay: 0,
                has_sufficient_number_of_data_points: true,
            })
        }
        OracleSource::Switchboard => Err(SdkError::InvalidOracle),
    }
}

fn get_pyth_price(account_data: &[u8], slot: u64, multiple: u64) -> SdkResult<OraclePriceData> {
    let exponent = read_i32(account_data, PYTH_EXPONENT_OFFSET)?;
    let raw_price = read_i64(account_data, PYTH_AGG_PRICE_OFFSET)?;
    let raw_conf = read_u64(account_data, PYTH_AGG_CONF_OFFSET)?;
    let pub_slot = read_u64(account_data, PYTH_AGG_PUB_SLOT_OFFSET)?;

    let oracle_precision = 10_u128
        .checked_pow(exponent.unsigned_abs())
        .ok_or(SdkError::InvalidOracle)?
        .checked_div(multiple as u128)
        .ok_or(SdkError::InvalidOracle)?;

    let (scale_mult, scale_div) = if oracle_precision > PRICE_PRECISION as u128 {
        (1, oracle_precision / PRICE_PRECISION as u128)
    } else {
        (PRICE_PRECISION as u128 / oracle_precision.max(1), 1)
    };

    let price = (raw_price as i128)
        .checked_mul(scale_mult as i128)
        .ok_or(SdkError::InvalidOracle)?
        / scale_div as i128;
    let confidence = (raw_conf as u128).checked_mul(scale_mult).ok_or(SdkError::InvalidOracle)?
        / scale_div;

    Ok(OraclePriceData {
        price: i64::try_from(price).map_err(|_| SdkError::InvalidOracle)?,
        confidence: u64::try_from(confidence).map_err(|_| SdkError::InvalidOracle)?,
        delay: slot as i64 - pub_slot as i64,
        has_sufficient_number_of_data_points: true,
    })
}

fn read_i32(data: &[u8], offset: usize) -> SdkResult<i32> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or(SdkError::InvalidOracle)?;
    Ok(i32::from_le_bytes(bytes.try_into().expect("4 bytes")))
}

fn read_i64(data: &[u8], offset: usize) -> SdkResult<i64> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or(SdkError::InvalidOracle)?;
    Ok(i64::from_le_bytes(bytes.try_into().expect("8 bytes")))
}

fn read_u64(data: &[u8], offset: usize) -> SdkResult<u64> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or(SdkError::InvalidOracle)?;
    Ok(u64::from_le_bytes(bytes.try_into().expect("8 bytes")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pyth_account(exponent: i32, price: i64, conf: u64, pub_slot: u64) -> Vec<u8> {
        let mut data = vec![0_u8; 240];
        data[PYTH_EXPONENT_OFFSET..PYTH_EXPONENT_OFFSET + 4]
            .copy_from_slice(&exponent.to_le_bytes());
        data[PYTH_AGG_PRICE_OFFSET..PYTH_AGG_PRICE_OFFSET + 8].copy_from_slice(&price.to_le_bytes());
        data[PYTH_AGG_CONF_OFFSET..PYTH_AGG_CONF_OFFSET + 8].copy_from_slice(&conf.to_le_bytes());
        data[PYTH_AGG_PUB_SLOT_OFFSET..PYTH_AGG_PUB_SLOT_OFFSET + 8]
            .copy_from_slice(&pub_slot.to_le_bytes());
        data
    }

    #[test]
    fn scales_pyth_price_to_price_precision() {
        // $25.50 at expo -8
        let data = pyth_account(-8, 2_550_000_000, 500_000, 98);
        let price_data = get_oracle_price(OracleSource::Pyth, &data, 100).unwrap();
        assert_eq!(price_data.price, 25_500_000);
        assert_eq!(price_data.confidence, 5_000);
        assert_eq!(price_data.delay, 2);
    }

    #[test]
    fn scales_pyth_1m_price() {
        let data = pyth_account(-8, 150, 2, 100);
        let price_data = get_oracle_price(OracleSource::Pyth1M, &data, 100).unwrap();
        // raw 150e-8 * 1e6 multiple => 1.5 in PRICE_PRECISION
        assert_eq!(price_data.price, 1_500_000);
    }

    #[test]
    fn stable_coin_price_pins_to_one_within_confidence() {
        let data = pyth_account(-8, 100_000_100, 1_000_000, 100);
        let price_data = get_oracle_price(OracleSource::PythStableCoin, &data, 100).unwrap();
        assert_eq!(price_data.price, PRICE_PRECISION_I64);

        let data = pyth_account(-8, 103_000_000, 1_000_000, 100);
        let price_data = get_oracle_price(OracleSource::PythStableCoin, &data, 100).unwrap();
        assert_eq!(price_data.price, 1_030_000);
    }

    #[test]
    fn quote_asset_is_constant() {
        let price_data = get_oracle_price(OracleSource::QuoteAsset, &[], 1).unwrap();
        assert_eq!(price_data.price, PRICE_PRECISION_I64);
    }

    #[test]
    fn switchboard_is_unsupported() {
        assert!(get_oracle_price(OracleSource::Switchboard, &[0; 256], 1).is_err());
    }
}
