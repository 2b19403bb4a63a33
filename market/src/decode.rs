use ethers_core::types::{I256, U256};
use thiserror::Error;

use engine::pricing::{PriceError, price_from_sqrt_x96};

use crate::types::{PoolConfig, RawLog, SwapEvent};

/// keccak256("Swap(address,address,int256,int256,uint160,uint128,int24)")
pub const SWAP_EVENT_SIGNATURE: &str =
    "0xc42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67";

/// Number of 32-byte words in the non-indexed payload:
/// amount0, amount1, sqrtPriceX96, liquidity, tick.
const DATA_WORDS: usize = 5;

#[derive(Error, Debug)]
pub enum DecodeError {
    /// The record is from another contract or another event type; dropped,
    /// never fatal.
    #[error("not a swap event: {0}")]
    NotASwapEvent(&'static str),

    #[error("malformed payload: expected {expected} data bytes, got {actual}")]
    MalformedPayload { expected: usize, actual: usize },

    #[error("invalid hex in log field: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// The payload decoded but carries no derivable price; the event is
    /// meaningless downstream.
    #[error("no derivable price: {0}")]
    InvalidPrice(#[from] PriceError),
}

/// Decode a raw log record into a typed swap event.
///
/// Validates origin, topic shape, signature and payload length before
/// touching any field; the derived price is computed here, in the same
/// step, so an event without one never escapes the boundary.
pub fn decode_swap(raw: &RawLog, pool: &PoolConfig) -> Result<SwapEvent, DecodeError> {
    if !raw.address.eq_ignore_ascii_case(&pool.address) {
        return Err(DecodeError::NotASwapEvent(
            "emitting address is not the configured pool",
        ));
    }

    if raw.topics.len() != 3 {
        return Err(DecodeError::NotASwapEvent(
            "expected signature plus two indexed addresses",
        ));
    }

    if !raw.topics[0].eq_ignore_ascii_case(SWAP_EVENT_SIGNATURE) {
        return Err(DecodeError::NotASwapEvent("topic0 is not the swap signature"));
    }

    let data = decode_hex(&raw.data)?;
    if data.len() != DATA_WORDS * 32 {
        return Err(DecodeError::MalformedPayload {
            expected: DATA_WORDS * 32,
            actual: data.len(),
        });
    }

    let sender = topic_address(&raw.topics[1])?;
    let recipient = topic_address(&raw.topics[2])?;

    let amount0 = I256::from_raw(U256::from_big_endian(word(&data, 0)));
    let amount1 = I256::from_raw(U256::from_big_endian(word(&data, 1)));
    let sqrt_price_x96 = U256::from_big_endian(word(&data, 2));
    let liquidity = U256::from_big_endian(word(&data, 3)).low_u128();
    // ticks are int24, sign-extended over the full word; the low 32 bits
    // carry the value and the clamp guards junk input
    let tick = word_i32(word(&data, 4)).clamp(-8_388_608, 8_388_607);

    let price = price_from_sqrt_x96(sqrt_price_x96, &pool.pair)?;

    Ok(SwapEvent {
        sender,
        recipient,
        amount0,
        amount1,
        sqrt_price_x96,
        liquidity,
        tick,
        block_number: raw.block_number.as_deref().and_then(parse_hex_u64),
        transaction_hash: raw.transaction_hash.clone(),
        price,
    })
}

fn decode_hex(s: &str) -> Result<Vec<u8>, DecodeError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(s)?)
}

/// Best-effort topic word: short or empty hex right-aligns into a zero
/// word, so lenient feeds degrade to zeroed fields instead of erroring.
fn topic_word(topic: &str) -> Result<[u8; 32], DecodeError> {
    let bytes = decode_hex(topic)?;
    let mut word = [0u8; 32];
    let n = bytes.len().min(32);
    word[32 - n..].copy_from_slice(&bytes[bytes.len() - n..]);
    Ok(word)
}

/// Indexed addresses are the low 20 bytes of their topic word.
fn topic_address(topic: &str) -> Result<String, DecodeError> {
    let word = topic_word(topic)?;
    Ok(format!("0x{}", hex::encode(&word[12..])))
}

fn word(data: &[u8], index: usize) -> &[u8] {
    &data[index * 32..(index + 1) * 32]
}

fn word_i32(word: &[u8]) -> i32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&word[28..32]);
    i32::from_be_bytes(b)
}

fn parse_hex_u64(s: &str) -> Option<u64> {
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}
