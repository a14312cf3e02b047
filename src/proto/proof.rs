//! Encoding of signed transfers into `X-Payment` proof headers.
//!
//! The proof is one-directional: the client serializes, the facilitator
//! decodes and submits. Encoding is a pure transformation of the signed
//! transaction bytes: base64 the transaction, wrap it in a versioned JSON
//! envelope, base64 the envelope for header transport.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as b64;
use http::HeaderValue;
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::proto::ProtocolVersion1;

/// Largest signed transaction accepted into a proof. Solana's transaction
/// packet limit; anything beyond it could never settle anyway.
pub const MAX_SIGNED_TRANSACTION_BYTES: usize = 1232;

/// The versioned payment proof carried in the `X-Payment` header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    pub version: ProtocolVersion1,
    pub payload: ProofPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    /// Base64 of the fully signed, unsubmitted transaction.
    pub serialized_transaction: String,
}

impl PaymentProof {
    /// Wraps signed transaction bytes into a proof.
    ///
    /// Oversized input is rejected with [`PaymentError::ProofTooLarge`]
    /// rather than truncated.
    pub fn new(signed_transaction: &[u8]) -> Result<Self, PaymentError> {
        if signed_transaction.len() > MAX_SIGNED_TRANSACTION_BYTES {
            return Err(PaymentError::ProofTooLarge {
                size: signed_transaction.len(),
                limit: MAX_SIGNED_TRANSACTION_BYTES,
            });
        }
        Ok(Self {
            version: ProtocolVersion1,
            payload: ProofPayload {
                serialized_transaction: b64.encode(signed_transaction),
            },
        })
    }

    /// Encodes the proof for the `X-Payment` request header:
    /// base64 of `{"version":1,"payload":{"serializedTransaction":...}}`.
    pub fn to_header_value(&self) -> Result<HeaderValue, PaymentError> {
        let json = serde_json::to_vec(self).map_err(PaymentError::JsonEncode)?;
        HeaderValue::from_str(&b64.encode(json)).map_err(PaymentError::HeaderEncode)
    }

    /// Decodes the header encoding produced by [`Self::to_header_value`].
    ///
    /// The client never needs this in production; it exists for the
    /// facilitator side of test fixtures.
    pub fn from_header_value(value: &[u8]) -> Option<Self> {
        let json = b64.decode(value).ok()?;
        serde_json::from_slice(&json).ok()
    }

    /// The raw signed transaction carried by the proof.
    pub fn transaction_bytes(&self) -> Option<Vec<u8>> {
        b64.decode(&self.payload.serialized_transaction).ok()
    }
}
