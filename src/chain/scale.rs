//! Pallet constants out of SCALE-encoded runtime metadata.
//!
//! `state_getMetadata` returns a `RuntimeMetadataPrefixed`; V14 and V15
//! both carry each pallet's constants as raw SCALE values.

use frame_metadata::{RuntimeMetadata, RuntimeMetadataPrefixed, META_RESERVED};
use parity_scale_codec::Decode;

use crate::error::UpstreamError;

/// Raw SCALE value of each constant in `names`, looked up in `pallet`.
/// Missing constants are `None`; an unknown pallet is an error.
pub fn find_constants(
    metadata: &[u8],
    pallet: &str,
    names: &[&str],
) -> Result<Vec<Option<Vec<u8>>>, UpstreamError> {
    let prefixed = RuntimeMetadataPrefixed::decode(&mut &metadata[..])
        .map_err(|e| meta_err(format!("decode: {e}")))?;
    if prefixed.0 != META_RESERVED {
        return Err(meta_err("missing metadata magic"));
    }

    let constants: Vec<(String, Vec<u8>)> = match prefixed.1 {
        RuntimeMetadata::V14(md) => md
            .pallets
            .into_iter()
            .find(|p| p.name == pallet)
            .map(|p| p.constants.into_iter().map(|c| (c.name, c.value)).collect()),
        RuntimeMetadata::V15(md) => md
            .pallets
            .into_iter()
            .find(|p| p.name == pallet)
            .map(|p| p.constants.into_iter().map(|c| (c.name, c.value)).collect()),
        other => {
            return Err(meta_err(format!(
                "unsupported metadata version {}",
                other.version()
            )))
        }
    }
    .ok_or_else(|| meta_err(format!("pallet {pallet} not present")))?;

    Ok(names
        .iter()
        .map(|want| {
            constants
                .iter()
                .find(|(name, _)| name == want)
                .map(|(_, value)| value.clone())
        })
        .collect())
}

/// Decode a little-endian unsigned integer of up to 16 bytes
/// (`u8` through `u128` constants).
pub fn decode_uint_le(bytes: &[u8]) -> Result<u128, UpstreamError> {
    if bytes.is_empty() || bytes.len() > 16 {
        return Err(UpstreamError::Malformed(format!(
            "expected 1..=16 byte integer, got {} bytes",
            bytes.len()
        )));
    }
    let mut wide = [0u8; 16];
    wide[..bytes.len()].copy_from_slice(bytes);
    u128::decode(&mut &wide[..]).map_err(|e| UpstreamError::Malformed(e.to_string()))
}

fn meta_err(msg: impl Into<String>) -> UpstreamError {
    UpstreamError::Metadata(msg.into())
}
