//! Parsing of 402 payment challenges.
//!
//! A facilitator describes the payment it wants in the body of a 402
//! response. Two body shapes are in the wild: a single requirement wrapped in
//! a `paymentRequirements` envelope, and an `accepts` list of options. When a
//! list is offered, the first element wins.

use serde::Deserialize;
use url::Url;

use crate::chain::Address;
use crate::error::PaymentError;

/// A parsed payment challenge from a 402 response.
///
/// Immutable; one challenge backs at most one payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentChallenge {
    /// Mint address of the fungible token required as payment.
    pub asset: Address,
    /// Owner address the payment goes to.
    pub recipient: Address,
    /// Required quantity in the token's smallest denomination. Always > 0.
    pub amount: u64,
    /// RPC URL to switch to once the payment settles.
    pub premium_rpc_url: Option<Url>,
}

/// One payment option as it appears on the wire.
///
/// Field aliases cover the spellings used by older facilitators: `token` for
/// `asset`, `payTo` for `recipient`, `maxAmountRequired` for `amount`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeWire {
    #[serde(alias = "token")]
    asset: Address,
    #[serde(alias = "payTo")]
    recipient: Address,
    #[serde(alias = "maxAmountRequired", deserialize_with = "amount_from_wire")]
    amount: u64,
    #[serde(default)]
    premium_rpc_url: Option<Url>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChallengeBody {
    #[serde(default)]
    payment_requirements: Option<ChallengeWire>,
    #[serde(default)]
    accepts: Vec<ChallengeWire>,
}

/// Amounts arrive as integer strings or bare JSON integers; nothing else.
fn amount_from_wire<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Integer(u64),
        Text(String),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Integer(v) => Ok(v),
        Raw::Text(s) => s
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("non-integer amount {s:?}"))),
    }
}

impl PaymentChallenge {
    /// Decodes a 402 response body into a challenge.
    ///
    /// Fails closed with [`PaymentError::MalformedChallenge`] when a required
    /// field is absent, an address is not valid base58, the amount is not a
    /// positive integer, or no payment option is offered at all.
    pub fn parse(body: &[u8]) -> Result<Self, PaymentError> {
        let body: ChallengeBody = serde_json::from_slice(body)
            .map_err(|e| PaymentError::MalformedChallenge(e.to_string()))?;
        let wire = match body.payment_requirements {
            Some(wire) => wire,
            None => body.accepts.into_iter().next().ok_or_else(|| {
                PaymentError::MalformedChallenge("no payment option offered".to_string())
            })?,
        };
        if wire.amount == 0 {
            return Err(PaymentError::MalformedChallenge(
                "amount must be positive".to_string(),
            ));
        }
        Ok(Self {
            asset: wire.asset,
            recipient: wire.recipient,
            amount: wire.amount,
            premium_rpc_url: wire.premium_rpc_url,
        })
    }
}
