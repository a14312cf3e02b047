//! Error taxonomy for the payment interceptor.
//!
//! Every failure between receiving a 402 challenge and reissuing the paid
//! request surfaces as a [`PaymentError`]. Transport failures of either hop
//! are not wrapped: they propagate as [`reqwest_middleware::Error`] unchanged.

use reqwest_middleware as rqm;

/// Errors that can occur while constructing or applying a payment.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The 402 response body could not be decoded into a payment challenge,
    /// or a required field (`asset`, `recipient`, `amount`) was absent or
    /// failed validation.
    #[error("malformed payment challenge: {0}")]
    MalformedChallenge(String),
    /// The key store has no active signing identity, so no sender address
    /// can be resolved for the transfer.
    #[error("no active signing identity")]
    UnresolvedSender,
    /// A read-only chain query (account existence, recent blockhash) failed.
    /// Queries are not retried here; retry policy belongs to the caller.
    #[error("chain query failed: {0}")]
    ChainQuery(String),
    /// The signer refused to sign the transfer.
    #[error("signing rejected: {0}")]
    SigningRejected(String),
    /// The signer could not be reached at all.
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),
    /// The signed transaction exceeds the wire limit and cannot be embedded
    /// as a payment proof. Rejected outright, never truncated.
    #[error("signed transaction of {size} bytes exceeds the {limit} byte proof limit")]
    ProofTooLarge { size: usize, limit: usize },
    /// The transfer instructions could not be compiled into a message.
    #[error("failed to compile transfer message: {0}")]
    MessageCompile(String),
    /// The payment proof could not be serialized to JSON.
    #[error("failed to encode payment proof to json")]
    JsonEncode(#[source] serde_json::Error),
    /// The encoded proof could not be placed into an HTTP header value.
    #[error("failed to encode payment proof to HTTP header")]
    HeaderEncode(#[source] http::header::InvalidHeaderValue),
    /// The original request could not be cloned for the paid retry.
    /// This typically happens when the request body is a stream.
    #[error("request object is not cloneable. Are you passing a streaming body?")]
    RequestNotCloneable,
}

impl From<PaymentError> for rqm::Error {
    fn from(error: PaymentError) -> Self {
        rqm::Error::Middleware(error.into())
    }
}
