//! Chain-facing types and the read-only RPC seam.
//!
//! The interceptor needs exactly two facts from the chain: whether a derived
//! token account exists, and a recent blockhash to bound transaction
//! validity. [`ChainClient`] captures that surface so tests can supply ground
//! truth without a network; [`SolanaRpcChainClient`] is the production
//! implementation over the nonblocking Solana RPC client.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_hash::Hash;
use solana_pubkey::Pubkey;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;
use url::Url;

use crate::error::PaymentError;

/// A Solana public key address.
///
/// Wrapper around [`Pubkey`] that serializes as a base58-encoded string,
/// matching the address encoding used in payment challenges.
#[derive(Clone, Copy, Hash, PartialEq, Eq)]
pub struct Address(Pubkey);

impl Address {
    pub const fn new(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }

    pub fn pubkey(&self) -> Pubkey {
        self.0
    }
}

impl From<Pubkey> for Address {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl From<Address> for Pubkey {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pubkey =
            Pubkey::from_str(s).map_err(|_| format!("Failed to decode Solana address: {s}"))?;
        Ok(Self(pubkey))
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let pubkey = Pubkey::from_str(&s)
            .map_err(|_| serde::de::Error::custom("Failed to decode Solana address"))?;
        Ok(Self(pubkey))
    }
}

/// Read-only chain queries the transfer builder depends on.
///
/// Both operations fail with [`PaymentError::ChainQuery`]; neither is retried
/// by this crate.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Whether an account exists on-chain at `address`.
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, PaymentError>;

    /// A recent blockhash bounding the validity window of a transaction.
    async fn recent_block_reference(&self) -> Result<Hash, PaymentError>;
}

/// [`ChainClient`] backed by a Solana JSON-RPC endpoint.
#[derive(Clone)]
pub struct SolanaRpcChainClient {
    rpc: Arc<RpcClient>,
}

impl SolanaRpcChainClient {
    pub fn new(url: &Url) -> Self {
        Self {
            rpc: Arc::new(RpcClient::new(url.to_string())),
        }
    }

    pub fn from_rpc(rpc: RpcClient) -> Self {
        Self { rpc: Arc::new(rpc) }
    }
}

#[async_trait]
impl ChainClient for SolanaRpcChainClient {
    async fn account_exists(&self, address: &Pubkey) -> Result<bool, PaymentError> {
        let account = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await
            .map_err(|e| PaymentError::ChainQuery(e.to_string()))?;
        Ok(account.value.is_some())
    }

    async fn recent_block_reference(&self) -> Result<Hash, PaymentError> {
        self.rpc
            .get_latest_blockhash()
            .await
            .map_err(|e| PaymentError::ChainQuery(e.to_string()))
    }
}
