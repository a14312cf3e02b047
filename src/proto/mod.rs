//! Wire format for the pay-per-call upgrade protocol.
//!
//! Two messages cross the wire: the [`challenge::PaymentChallenge`] a
//! facilitator sends in a 402 response body, and the [`proof::PaymentProof`]
//! the client sends back in the `X-Payment` header of the retried request.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub mod challenge;
pub mod proof;

/// Name of the request header carrying the payment proof.
pub const X_PAYMENT_HEADER: &str = "X-Payment";

/// Version marker for the payment protocol.
///
/// Serializes as the integer `1`; deserialization rejects any other value, so
/// a facilitator speaking a different protocol version fails closed at the
/// parse boundary.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct ProtocolVersion1;

impl ProtocolVersion1 {
    pub const VALUE: u8 = 1;
}

impl Serialize for ProtocolVersion1 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(Self::VALUE)
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion1 {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let num = u8::deserialize(deserializer)?;
        if num == Self::VALUE {
            Ok(ProtocolVersion1)
        } else {
            Err(serde::de::Error::custom(format!(
                "expected version {}, got {num}",
                Self::VALUE
            )))
        }
    }
}

impl fmt::Display for ProtocolVersion1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Self::VALUE)
    }
}
