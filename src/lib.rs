//! Transparent pay-per-call RPC upgrades over HTTP 402 for Solana wallets.
//!
//! This crate turns a normal RPC call into a machine-payable call. A
//! [`PaymentInterceptor`] sits in the reqwest middleware stack: when a
//! facilitator answers `402 Payment Required`, the interceptor parses the
//! payment challenge, builds and signs an SPL token transfer, embeds the
//! signed transaction in an `X-Payment` header, and retries the original
//! request exactly once. The transaction itself is never submitted by the
//! client; settlement belongs to the facilitator.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use url::Url;
//! use x402_premium_rpc::{
//!     KeypairWallet, PremiumConfig, PremiumRpc, SolanaRpcChainClient,
//! };
//!
//! let config = PremiumConfig {
//!     direct_url: Url::parse("https://api.devnet.solana.com")?,
//!     facilitator_url: Url::parse("https://facilitator.example/rpc")?,
//! };
//! let wallet = Arc::new(KeypairWallet::new(keypair));
//! let chain = Arc::new(SolanaRpcChainClient::new(&config.direct_url));
//!
//! let rpc = PremiumRpc::new(config, wallet.clone(), wallet, chain);
//! rpc.set_mode(true, None);
//!
//! // Calls through `rpc.client()` against `rpc.endpoint()` now pay 402
//! // challenges transparently; a successful payment may reveal a premium
//! // endpoint which sticks until the mode is toggled off.
//! let response = rpc.client().post(rpc.endpoint()).body(body).send().await?;
//! ```
//!
//! ## Collaborator seams
//!
//! Key management, signing, and chain reads stay outside this crate, behind
//! [`KeyStore`], [`TransferSigner`], and [`ChainClient`]. [`KeypairWallet`]
//! and [`SolanaRpcChainClient`] are the batteries-included implementations;
//! an extension host supplies its own.

pub mod chain;
pub mod error;
pub mod interceptor;
pub mod premium;
pub mod proto;
pub mod transfer;
pub mod wallet;

pub use chain::{Address, ChainClient, SolanaRpcChainClient};
pub use error::PaymentError;
pub use interceptor::{CallEvent, CallState, PaymentInterceptor, WithPaymentInterceptor};
pub use premium::{PremiumConfig, PremiumRpc, PremiumState};
pub use proto::X_PAYMENT_HEADER;
pub use proto::challenge::PaymentChallenge;
pub use proto::proof::{MAX_SIGNED_TRANSACTION_BYTES, PaymentProof};
pub use transfer::{TransferBuilder, UnsignedTransfer};
pub use wallet::{KeyStore, KeypairWallet, TransferSigner};
