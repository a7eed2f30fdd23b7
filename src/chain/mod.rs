// src/chain/mod.rs
pub mod rpc;
pub mod scale;
pub mod version;

use std::collections::HashMap;

use crate::error::UpstreamError;

/// Read access to network-wide constants and the chain head.
///
/// Every call is independent; a failure is retried by the next refresh
/// cycle, not inline.
#[async_trait::async_trait]
pub trait ChainDataSource: Send + Sync {
    async fn get_constant(&self, pallet: &str, name: &str) -> Result<f64, UpstreamError>;

    /// Fetch several constants of one pallet. Results line up with `names`.
    /// Implementations that can share one round trip should override this.
    async fn get_constants(
        &self,
        pallet: &str,
        names: &[&str],
    ) -> Vec<Result<f64, UpstreamError>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            out.push(self.get_constant(pallet, name).await);
        }
        out
    }

    async fn get_block_height(&self) -> Result<u64, UpstreamError>;

    fn name(&self) -> &'static str;
}

/// Serves constants from a fixed table. Used for dry runs and demos.
#[derive(Debug, Clone, Default)]
pub struct FixedChainSource {
    constants: HashMap<(String, String), f64>,
    block_height: Option<u64>,
}

impl FixedChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constant(mut self, pallet: &str, name: &str, value: f64) -> Self {
        self.constants
            .insert((pallet.to_string(), name.to_string()), value);
        self
    }

    pub fn with_block_height(mut self, height: u64) -> Self {
        self.block_height = Some(height);
        self
    }
}

#[async_trait::async_trait]
impl ChainDataSource for FixedChainSource {
    async fn get_constant(&self, pallet: &str, name: &str) -> Result<f64, UpstreamError> {
        self.constants
            .get(&(pallet.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| UpstreamError::MissingConstant {
                pallet: pallet.to_string(),
                name: name.to_string(),
            })
    }

    async fn get_block_height(&self) -> Result<u64, UpstreamError> {
        self.block_height
            .ok_or_else(|| UpstreamError::Malformed("no block height configured".into()))
    }

    fn name(&self) -> &'static str {
        "fixed"
    }
}
