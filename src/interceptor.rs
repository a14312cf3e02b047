//! Middleware that upgrades a 402 response into a paid retry.
//!
//! [`PaymentInterceptor`] implements [`reqwest_middleware::Middleware`]. An
//! outgoing request passes through unmodified; if the response is a 402, the
//! interceptor parses the challenge, builds and signs a transfer, attaches
//! the proof header to a byte-identical clone of the original request, and
//! reissues it exactly once. Whatever the retry returns, success or another
//! 402, goes back to the caller as-is.
//!
//! The lifecycle is an explicit state machine ([`CallState`]) so the
//! single-retry guarantee is a property of the transition table rather than
//! of call-site control flow.

use http::{Extensions, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;
use std::sync::Arc;
use tracing::{debug, instrument, trace};

use crate::chain::ChainClient;
use crate::error::PaymentError;
use crate::premium::PremiumState;
use crate::proto::X_PAYMENT_HEADER;
use crate::proto::challenge::PaymentChallenge;
use crate::proto::proof::PaymentProof;
use crate::transfer::TransferBuilder;
use crate::wallet::{KeyStore, TransferSigner};

/// Lifecycle states of one intercepted call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    /// Original request dispatched through the underlying transport.
    Sent,
    /// 402 received and parsed into a challenge.
    ChallengeReceived,
    /// Transfer under construction and signing.
    Paying,
    /// Original request reissued with the proof header.
    Retried,
    Done,
    Failed,
}

/// Events driving [`CallState`] transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEvent {
    /// The outgoing request left through the underlying transport.
    Dispatch,
    /// A response with a non-payment status arrived.
    Settle,
    /// A response with a payment-required status arrived.
    PaymentRequired,
    /// The challenge parsed and payment construction started.
    BeginPayment,
    /// The proof header is attached and the retry is leaving.
    ProofReady,
    /// A payment step failed.
    Fail,
}

impl CallState {
    /// Total transition function.
    ///
    /// Every event observed in `Retried` terminates in `Done`: a second
    /// payment-required response on the retry is passed through, never paid
    /// again. Undefined combinations fail closed.
    pub fn next(self, event: CallEvent) -> CallState {
        use CallEvent::*;
        use CallState::*;
        match (self, event) {
            (Idle, Dispatch) => Sent,
            (Sent, Settle) => Done,
            (Sent, PaymentRequired) => ChallengeReceived,
            (ChallengeReceived, BeginPayment) => Paying,
            (Paying, ProofReady) => Retried,
            (Retried, Settle | PaymentRequired) => Done,
            (Idle, _) => Idle,
            _ => Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CallState::Done | CallState::Failed)
    }
}

/// Middleware that pays 402 challenges and retries the original request once.
pub struct PaymentInterceptor {
    keystore: Arc<dyn KeyStore>,
    signer: Arc<dyn TransferSigner>,
    builder: TransferBuilder,
    state: PremiumState,
}

impl PaymentInterceptor {
    pub fn new(
        keystore: Arc<dyn KeyStore>,
        signer: Arc<dyn TransferSigner>,
        chain: Arc<dyn ChainClient>,
        state: PremiumState,
    ) -> Self {
        Self {
            keystore,
            signer,
            builder: TransferBuilder::new(chain),
            state,
        }
    }

    /// Builds the `X-Payment` header for a parsed challenge: resolve the
    /// sender, construct the transfer, sign it, encode the proof.
    #[instrument(name = "premium.make_payment_header", skip_all, err)]
    async fn make_payment_header(
        &self,
        challenge: &PaymentChallenge,
    ) -> Result<HeaderValue, PaymentError> {
        let sender = self.keystore.active_account().await?;
        let transfer = self.builder.build(challenge, sender).await?;
        debug!(
            creations = transfer.account_creations(),
            amount = challenge.amount,
            asset = %challenge.asset,
            "built payment transfer"
        );
        let message = transfer.into_message()?;
        let signed = self.signer.sign_transfer(&message).await?;
        let proof = PaymentProof::new(&signed)?;
        proof.to_header_value()
    }
}

#[async_trait::async_trait]
impl rqm::Middleware for PaymentInterceptor {
    #[instrument(
        name = "premium.intercept",
        skip(self, req, extensions, next),
        fields(method = %req.method(), url = %req.url())
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        // Clone up front; the retry must be byte-identical to the original.
        let retry_req = req.try_clone();

        let mut call = CallState::Idle.next(CallEvent::Dispatch);
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            call = call.next(CallEvent::Settle);
            trace!(?call, status = ?res.status(), "no payment required, passing through");
            return Ok(res);
        }
        call = call.next(CallEvent::PaymentRequired);
        debug!(?call, "received payment challenge");

        let body = match res.bytes().await {
            Ok(body) => body,
            Err(e) => {
                call = call.next(CallEvent::Fail);
                debug!(?call, "challenge body unreadable");
                return Err(rqm::Error::Reqwest(e));
            }
        };
        let challenge = match PaymentChallenge::parse(&body) {
            Ok(challenge) => challenge,
            Err(e) => {
                call = call.next(CallEvent::Fail);
                debug!(?call, error = %e, "challenge rejected");
                return Err(e.into());
            }
        };
        call = call.next(CallEvent::BeginPayment);

        let header = match self.make_payment_header(&challenge).await {
            Ok(header) => header,
            Err(e) => {
                call = call.next(CallEvent::Fail);
                debug!(?call, error = %e, "payment construction failed, request not retried");
                return Err(e.into());
            }
        };
        let mut retry = match retry_req {
            Some(retry) => retry,
            None => {
                call = call.next(CallEvent::Fail);
                debug!(?call, "request body not cloneable");
                return Err(PaymentError::RequestNotCloneable.into());
            }
        };
        retry.headers_mut().insert(X_PAYMENT_HEADER, header);
        call = call.next(CallEvent::ProofReady);
        trace!(?call, "retrying request with payment proof");

        let res = next.run(retry, extensions).await?;
        call = call.next(if res.status() == StatusCode::PAYMENT_REQUIRED {
            CallEvent::PaymentRequired
        } else {
            CallEvent::Settle
        });
        debug_assert!(call.is_terminal());

        // A premium endpoint only sticks once the paid call actually lands;
        // a failed or cancelled call leaves the session state untouched.
        if res.status().is_success()
            && let Some(url) = challenge.premium_rpc_url
        {
            self.state.promote(url);
        }
        Ok(res)
    }
}

/// Extension trait wiring a [`PaymentInterceptor`] into a reqwest client.
pub trait WithPaymentInterceptor {
    fn with_payment_interceptor(self, interceptor: PaymentInterceptor)
    -> rqm::ClientWithMiddleware;
}

impl WithPaymentInterceptor for reqwest::Client {
    fn with_payment_interceptor(
        self,
        interceptor: PaymentInterceptor,
    ) -> rqm::ClientWithMiddleware {
        rqm::ClientBuilder::new(self).with(interceptor).build()
    }
}
