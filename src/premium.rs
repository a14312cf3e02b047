//! Premium mode: the session-wide toggle and the transport it controls.
//!
//! [`PremiumState`] is the shared toggle plus the currently active RPC URL.
//! [`PremiumRpc`] owns two transports, a direct client and an
//! interceptor-wrapped one, and hands out whichever the toggle selects. Both
//! are injectable values rather than module globals, so concurrent sessions
//! (and tests) never interfere.

use reqwest::Client;
use reqwest_middleware as rqm;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use url::Url;

use crate::chain::ChainClient;
use crate::interceptor::PaymentInterceptor;
use crate::wallet::{KeyStore, TransferSigner};

/// The two endpoints the controller switches between.
#[derive(Debug, Clone)]
pub struct PremiumConfig {
    /// RPC URL used while premium mode is off.
    pub direct_url: Url,
    /// Facilitator URL used once premium mode turns on, until a successful
    /// payment reveals a premium URL.
    pub facilitator_url: Url,
}

/// Session-wide premium state. Clones share the same underlying state.
///
/// Lives for the extension session only; nothing is persisted. The endpoint
/// field is advisory for the next call, so last-writer-wins assignment is
/// all the synchronization it needs.
#[derive(Clone)]
pub struct PremiumState(Arc<PremiumStateInner>);

struct PremiumStateInner {
    enabled: AtomicBool,
    active_endpoint: RwLock<Url>,
    config: PremiumConfig,
}

impl PremiumState {
    pub fn new(config: PremiumConfig) -> Self {
        Self(Arc::new(PremiumStateInner {
            enabled: AtomicBool::new(false),
            active_endpoint: RwLock::new(config.direct_url.clone()),
            config,
        }))
    }

    pub fn is_enabled(&self) -> bool {
        self.0.enabled.load(Ordering::Acquire)
    }

    /// RPC URL outgoing calls should target right now.
    pub fn endpoint(&self) -> Url {
        self.0
            .active_endpoint
            .read()
            .expect("endpoint lock poisoned")
            .clone()
    }

    /// Flips the toggle and resets the active endpoint.
    ///
    /// Disabling reverts to the direct URL and discards any discovered
    /// premium endpoint; enabling starts from the facilitator URL (or the
    /// caller's hint) until a payment reveals a better one.
    pub fn set_mode(&self, enabled: bool, premium_hint: Option<Url>) {
        let endpoint = if enabled {
            premium_hint.unwrap_or_else(|| self.0.config.facilitator_url.clone())
        } else {
            self.0.config.direct_url.clone()
        };
        {
            let mut active = self
                .0
                .active_endpoint
                .write()
                .expect("endpoint lock poisoned");
            *active = endpoint;
        }
        self.0.enabled.store(enabled, Ordering::Release);
        info!(enabled, endpoint = %self.endpoint(), "premium mode switched");
    }

    /// Records a premium endpoint discovered from a successful payment.
    ///
    /// Monotonic within one toggle cycle: later transient failures do not
    /// demote it, only [`Self::set_mode`] resets it. Promotions while the
    /// mode is off are dropped.
    pub(crate) fn promote(&self, url: Url) {
        if !self.is_enabled() {
            debug!(%url, "premium endpoint discovered while disabled, ignoring");
            return;
        }
        let mut active = self
            .0
            .active_endpoint
            .write()
            .expect("endpoint lock poisoned");
        if *active != url {
            info!(%url, "premium endpoint discovered");
            *active = url;
        }
    }
}

/// Controller swapping the active transport between direct and paying.
pub struct PremiumRpc {
    state: PremiumState,
    direct: rqm::ClientWithMiddleware,
    paying: rqm::ClientWithMiddleware,
}

impl PremiumRpc {
    pub fn new(
        config: PremiumConfig,
        keystore: Arc<dyn KeyStore>,
        signer: Arc<dyn TransferSigner>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        Self::with_client(Client::new(), config, keystore, signer, chain)
    }

    /// Builds both transports on top of a caller-supplied HTTP client.
    pub fn with_client(
        http: Client,
        config: PremiumConfig,
        keystore: Arc<dyn KeyStore>,
        signer: Arc<dyn TransferSigner>,
        chain: Arc<dyn ChainClient>,
    ) -> Self {
        let state = PremiumState::new(config);
        let interceptor = PaymentInterceptor::new(keystore, signer, chain, state.clone());
        let direct = rqm::ClientBuilder::new(http.clone()).build();
        let paying = rqm::ClientBuilder::new(http).with(interceptor).build();
        Self {
            state,
            direct,
            paying,
        }
    }

    /// Toggles premium mode; see [`PremiumState::set_mode`].
    pub fn set_mode(&self, enabled: bool, premium_hint: Option<Url>) {
        self.state.set_mode(enabled, premium_hint);
    }

    /// The transport outgoing calls should use right now. While premium mode
    /// is off this is a plain single-hop client with no payment logic.
    pub fn client(&self) -> rqm::ClientWithMiddleware {
        if self.state.is_enabled() {
            self.paying.clone()
        } else {
            self.direct.clone()
        }
    }

    /// The RPC URL outgoing calls should target right now.
    pub fn endpoint(&self) -> Url {
        self.state.endpoint()
    }

    /// Handle onto the shared session state.
    pub fn state(&self) -> PremiumState {
        self.state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PremiumConfig {
        PremiumConfig {
            direct_url: Url::parse("https://api.devnet.solana.com/").unwrap(),
            facilitator_url: Url::parse("https://facilitator.example/rpc").unwrap(),
        }
    }

    #[test]
    fn test_starts_disabled_on_direct_endpoint() {
        let state = PremiumState::new(config());
        assert!(!state.is_enabled());
        assert_eq!(state.endpoint(), config().direct_url);
    }

    #[test]
    fn test_enable_defaults_to_facilitator() {
        let state = PremiumState::new(config());
        state.set_mode(true, None);
        assert!(state.is_enabled());
        assert_eq!(state.endpoint(), config().facilitator_url);
    }

    #[test]
    fn test_enable_honors_hint() {
        let state = PremiumState::new(config());
        let hint = Url::parse("https://hint.example/rpc").unwrap();
        state.set_mode(true, Some(hint.clone()));
        assert_eq!(state.endpoint(), hint);
    }

    #[test]
    fn test_promotion_is_monotonic_until_disable() {
        let state = PremiumState::new(config());
        state.set_mode(true, None);
        let premium = Url::parse("https://premium.example/rpc").unwrap();
        state.promote(premium.clone());
        assert_eq!(state.endpoint(), premium);

        // A later promotion of the same URL is a no-op; disabling resets.
        state.promote(premium.clone());
        assert_eq!(state.endpoint(), premium);
        state.set_mode(false, None);
        assert_eq!(state.endpoint(), config().direct_url);
    }

    #[test]
    fn test_promotion_while_disabled_is_dropped() {
        let state = PremiumState::new(config());
        state.promote(Url::parse("https://premium.example/rpc").unwrap());
        assert_eq!(state.endpoint(), config().direct_url);
    }

    #[test]
    fn test_fresh_toggle_cycle_forgets_discovery() {
        let state = PremiumState::new(config());
        state.set_mode(true, None);
        state.promote(Url::parse("https://premium.example/rpc").unwrap());
        state.set_mode(false, None);
        state.set_mode(true, None);
        assert_eq!(state.endpoint(), config().facilitator_url);
    }

    #[test]
    fn test_clones_share_state() {
        let state = PremiumState::new(config());
        let clone = state.clone();
        state.set_mode(true, None);
        assert!(clone.is_enabled());
        assert_eq!(clone.endpoint(), config().facilitator_url);
    }
}
