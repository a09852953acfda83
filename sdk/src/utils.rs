use borsh::BorshSerialize;
use solana_sdk::{hash::hash, signature::Keypair};

use crate::{
    drift::DriftAccount,
    types::{SdkError, SdkResult},
};

/// 8 byte discriminator of an anchor account, derived from its name
pub fn account_discriminator(name: &str) -> [u8; 8] {
    let mut discriminator = [0_u8; 8];
    let hashed = hash(format!("account:{name}").as_bytes());
    discriminator.copy_from_slice(&hashed.to_bytes()[..8]);
    discriminator
}

/// 8 byte discriminator of an anchor instruction, derived from its name
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    let mut discriminator = [0_u8; 8];
    let hashed = hash(format!("global:{name}").as_bytes());
    discriminator.copy_from_slice(&hashed.to_bytes()[..8]);
    discriminator
}

/// Serialize a drift account the way it is stored on chain, discriminator included
pub fn encode_account<T: DriftAccount + BorshSerialize>(value: &T) -> SdkResult<Vec<u8>> {
    let mut data = T::discriminator().to_vec();
    value
        .serialize(&mut data)
        .map_err(|_| SdkError::Deserializing)?;
    Ok(data)
}

/// Derive the websocket url for a http(s) rpc endpoint
pub fn get_ws_url(url: &str) -> SdkResult<String> {
    if url.starts_with("http") {
        Ok(url.replacen("http", "ws", 1))
    } else if url.starts_with("ws") {
        Ok(url.to_string())
    } else {
        Err(SdkError::Generic(format!("invalid rpc url: {url}")))
    }
}

/// Load a keypair from a raw json byte array ("[1,2,..]") or a base58 string
pub fn load_keypair_multi_format(private_key: &str) -> SdkResult<Keypair> {
    let trimmed = private_key.trim();
    let bytes: Vec<u8> = if trimmed.starts_with('[') {
        trimmed
            .trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|b| b.trim().parse::<u8>().map_err(|_| SdkError::InvalidSeed))
            .collect::<SdkResult<_>>()?
    } else {
        bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| SdkError::InvalidBase58)?
    };

    Keypair::from_bytes(&bytes).map_err(|_| SdkError::InvalidSeed)
}
