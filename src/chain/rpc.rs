// src/chain/rpc.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::scale::{decode_uint_le, find_constants};
use super::ChainDataSource;
use crate::error::UpstreamError;

/// Substrate JSON-RPC over HTTP.
///
/// Constants are read from the runtime metadata at the chain head, so
/// values that the runtime computes dynamically are current on each call.
pub struct RpcChainSource {
    url: String,
    client: Client,
    timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Header {
    number: String,
}

impl RpcChainSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: Client::new(),
            timeout: Duration::from_secs(20),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, UpstreamError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let rsp: RpcResponse<T> = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = rsp.error {
            return Err(UpstreamError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        rsp.result
            .ok_or_else(|| UpstreamError::Malformed(format!("{method}: response without result")))
    }

    async fn fetch_metadata(&self) -> Result<Vec<u8>, UpstreamError> {
        let raw: String = self.call("state_getMetadata", json!([])).await?;
        decode_hex(&raw)
    }
}

#[async_trait]
impl ChainDataSource for RpcChainSource {
    async fn get_constant(&self, pallet: &str, name: &str) -> Result<f64, UpstreamError> {
        self.get_constants(pallet, &[name])
            .await
            .pop()
            .unwrap_or_else(|| Err(UpstreamError::Malformed("empty constant batch".into())))
    }

    async fn get_constants(
        &self,
        pallet: &str,
        names: &[&str],
    ) -> Vec<Result<f64, UpstreamError>> {
        let found = match self.fetch_metadata().await {
            Ok(md) => find_constants(&md, pallet, names),
            Err(e) => Err(e),
        };

        match found {
            Ok(values) => values
                .into_iter()
                .zip(names)
                .map(|(raw, name)| match raw {
                    Some(bytes) => decode_uint_le(&bytes).map(|v| v as f64),
                    None => Err(UpstreamError::MissingConstant {
                        pallet: pallet.to_string(),
                        name: name.to_string(),
                    }),
                })
                .collect(),
            Err(e) => {
                // One failed round trip fails every constant in the batch.
                tracing::warn!(target: "refresh", pallet, error = %e, "metadata fetch failed");
                let msg = e.to_string();
                names
                    .iter()
                    .map(|_| Err(UpstreamError::Metadata(msg.clone())))
                    .collect()
            }
        }
    }

    async fn get_block_height(&self) -> Result<u64, UpstreamError> {
        let header: Header = self.call("chain_getHeader", json!([])).await?;
        parse_hex_u64(&header.number)
    }

    fn name(&self) -> &'static str {
        "substrate-rpc"
    }
}

fn decode_hex(raw: &str) -> Result<Vec<u8>, UpstreamError> {
    let s = raw.strip_prefix("0x").unwrap_or(raw);
    hex::decode(s).map_err(|e| UpstreamError::Malformed(format!("hex: {e}")))
}

fn parse_hex_u64(raw: &str) -> Result<u64, UpstreamError> {
    let s = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(s, 16)
        .map_err(|e| UpstreamError::Malformed(format!("block number {raw:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_number_is_hex() {
        assert_eq!(parse_hex_u64("0x1a2b").unwrap(), 0x1a2b);
        assert_eq!(parse_hex_u64("ff").unwrap(), 255);
        assert!(parse_hex_u64("0xzz").is_err());
    }

    #[test]
    fn metadata_hex_accepts_prefix() {
        assert_eq!(decode_hex("0x6d657461").unwrap(), b"meta");
        assert!(decode_hex("0x6d6").is_err());
    }

    #[test]
    fn rpc_error_object_parses() {
        let rsp: RpcResponse<String> = serde_json::from_str(
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#,
        )
        .unwrap();
        assert!(rsp.result.is_none());
        assert_eq!(rsp.error.unwrap().code, -32601);
    }
}
