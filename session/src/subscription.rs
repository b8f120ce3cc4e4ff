use std::fmt;

use stomp::{header_list, AckMode};
use tracing::{info, warn};

use crate::error::EngineError;
use crate::manager::ConnectionManager;
use crate::protocol::{ProtocolEngine, SubscriptionToken};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    Topic(String),
    Queue(String),
}

impl Destination {
    pub fn name(&self) -> &str {
        match self {
            Destination::Topic(name) | Destination::Queue(name) => name,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Destination::Topic(name) => format!("/topic/{}", name),
            Destination::Queue(name) => format!("/queue/{}", name),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub destination: Destination,
    pub ack_mode: AckMode,
    pub id: String,
    pub token: SubscriptionToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Registered(SubscriptionToken),
    Skipped(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub registered: usize,
    pub skipped: usize,
}

/// Active subscriptions of one feed client, keyed by destination.
///
/// Every requested destination is remembered so the whole set can be
/// replayed onto a fresh session; only accepted ones become active.
#[derive(Debug, Clone)]
pub struct SubscriptionRegistry {
    identity: String,
    requested: Vec<Destination>,
    active: Vec<Subscription>,
}

impl SubscriptionRegistry {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            requested: Vec::new(),
            active: Vec::new(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// `<identity>-<destination name>`; unique per consumer identity.
    pub fn subscription_id(&self, destination: &Destination) -> String {
        format!("{}-{}", self.identity, destination.name())
    }

    /// Records a destination for the next `replay` without subscribing.
    pub fn request(&mut self, destination: Destination) {
        if !self.requested.contains(&destination) {
            self.requested.push(destination);
        }
    }

    /// Rejections are reported as `Skipped`; only transient engine errors
    /// (the session went away) are returned as `Err`.
    pub fn subscribe<E: ProtocolEngine>(
        &mut self,
        manager: &mut ConnectionManager<E>,
        destination: Destination,
    ) -> Result<SubscribeOutcome, EngineError> {
        self.request(destination.clone());
        if let Some(existing) = self.find(&destination) {
            return Ok(SubscribeOutcome::Registered(existing.token.clone()));
        }

        let id = self.subscription_id(&destination);
        let ack_mode = AckMode::ClientIndividual;
        let headers = header_list![
            "ack" => ack_mode.as_text(),
            "id" => id.clone()
        ];
        match manager.subscribe(&destination.path(), headers) {
            Ok(token) => {
                info!(destination = %destination, id = %id, "subscribed");
                self.active.push(Subscription {
                    destination,
                    ack_mode,
                    id,
                    token: token.clone(),
                });
                Ok(SubscribeOutcome::Registered(token))
            }
            Err(error) if error.is_transient() => Err(error),
            Err(error) => {
                warn!(destination = %destination, error = %error, "subscription skipped");
                Ok(SubscribeOutcome::Skipped(error.to_string()))
            }
        }
    }

    /// Drops the destination from the registry and cancels it on the
    /// session. Unknown destinations are a no-op.
    pub fn unsubscribe<E: ProtocolEngine>(
        &mut self,
        manager: &mut ConnectionManager<E>,
        destination: &Destination,
    ) -> bool {
        self.requested.retain(|requested| requested != destination);
        let Some(position) = self
            .active
            .iter()
            .position(|subscription| &subscription.destination == destination)
        else {
            info!(destination = %destination, "unsubscribe of unknown destination ignored");
            return false;
        };

        let subscription = self.active.remove(position);
        match manager.unsubscribe(&subscription.token) {
            Ok(()) => info!(destination = %destination, "unsubscribed"),
            Err(error) => warn!(destination = %destination, error = %error, "unsubscribe failed"),
        }
        true
    }

    /// Subscribes every requested destination on a fresh session.
    pub fn replay<E: ProtocolEngine>(
        &mut self,
        manager: &mut ConnectionManager<E>,
    ) -> Result<ReplaySummary, EngineError> {
        self.active.clear();
        let mut summary = ReplaySummary::default();
        for destination in self.requested.clone() {
            match self.subscribe(manager, destination)? {
                SubscribeOutcome::Registered(_) => summary.registered += 1,
                SubscribeOutcome::Skipped(_) => summary.skipped += 1,
            }
        }
        Ok(summary)
    }

    /// Forgets the active set, e.g. after the session closed.
    pub fn clear(&mut self) {
        self.active.clear();
    }

    pub fn get(&self, destination: &Destination) -> Option<&Subscription> {
        self.find(destination)
    }

    pub fn active(&self) -> &[Subscription] {
        &self.active
    }

    pub fn requested(&self) -> &[Destination] {
        &self.requested
    }

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.active
            .iter()
            .map(|subscription| subscription.destination.name().to_string())
            .collect()
    }

    /// Requested destinations that are not active.
    pub fn skipped(&self) -> Vec<String> {
        self.requested
            .iter()
            .filter(|destination| self.find(destination).is_none())
            .map(|destination| destination.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    fn find(&self, destination: &Destination) -> Option<&Subscription> {
        self.active
            .iter()
            .find(|subscription| &subscription.destination == destination)
    }
}

#[cfg(test)]
mod tests {
    use super::{Destination, SubscribeOutcome, SubscriptionRegistry};
    use crate::adapters::{MockCall, MockEngine};
    use crate::manager::{ConnectionManager, SessionConfig};
    use crate::protocol::Credentials;

    fn connected(engine: MockEngine) -> ConnectionManager<MockEngine> {
        let config = SessionConfig::new(Credentials::new("alice@example.com", "secret"));
        let mut manager = ConnectionManager::new(engine, config);
        manager.connect_with_backoff().expect("mock connect");
        manager
    }

    fn topic(name: &str) -> Destination {
        Destination::Topic(name.to_string())
    }

    #[test]
    fn subscription_ids_combine_identity_and_topic() {
        let engine = MockEngine::new();
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        let outcome = registry
            .subscribe(&mut manager, topic("TRAIN_MVT_ALL_TOC"))
            .expect("subscribe");
        assert!(matches!(outcome, SubscribeOutcome::Registered(_)));
        let subscription = registry.get(&topic("TRAIN_MVT_ALL_TOC")).expect("registered");
        assert_eq!(subscription.id, "alice-TRAIN_MVT_ALL_TOC");
        assert_eq!(subscription.token.id(), "alice-TRAIN_MVT_ALL_TOC");
    }

    #[test]
    fn rejected_topic_is_skipped_and_others_continue() {
        let engine = MockEngine::new().rejecting("/topic/BAD");
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        let bad = registry.subscribe(&mut manager, topic("BAD")).expect("non-fatal");
        let good = registry.subscribe(&mut manager, topic("RTPPM_ALL")).expect("subscribe");

        assert!(matches!(bad, SubscribeOutcome::Skipped(_)));
        assert!(matches!(good, SubscribeOutcome::Registered(_)));
        assert_eq!(registry.subscribed_topics(), vec!["RTPPM_ALL".to_string()]);
        assert_eq!(registry.requested().len(), 2);
    }

    #[test]
    fn at_most_one_subscription_per_destination() {
        let engine = MockEngine::new();
        let probe = engine.probe();
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        registry.subscribe(&mut manager, topic("A")).expect("first");
        registry.subscribe(&mut manager, topic("A")).expect("second");
        assert_eq!(registry.len(), 1);
        assert_eq!(probe.subscribe_calls(), 1);
    }

    #[test]
    fn unsubscribe_unknown_is_noop() {
        let engine = MockEngine::new();
        let probe = engine.probe();
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        registry.subscribe(&mut manager, topic("A")).expect("subscribe");
        assert!(!registry.unsubscribe(&mut manager, &topic("B")));
        assert!(registry.unsubscribe(&mut manager, &topic("A")));
        assert!(registry.is_empty());
        assert!(probe
            .calls()
            .contains(&MockCall::Unsubscribe("alice-A".to_string())));
    }

    #[test]
    fn replay_resubscribes_every_requested_destination() {
        let engine = MockEngine::new().rejecting("/queue/NOPE");
        let probe = engine.probe();
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        registry.subscribe(&mut manager, topic("A")).expect("subscribe");
        registry
            .subscribe(&mut manager, Destination::Queue("NOPE".to_string()))
            .expect("subscribe");
        let summary = registry.replay(&mut manager).expect("replay");

        assert_eq!(summary.registered, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            probe.subscribed_destinations(),
            vec!["/topic/A", "/queue/NOPE", "/topic/A", "/queue/NOPE"]
        );
    }

    #[test]
    fn requested_destinations_subscribe_on_replay() {
        let engine = MockEngine::new().rejecting("/topic/B");
        let mut manager = connected(engine);
        let mut registry = SubscriptionRegistry::new("alice");

        registry.request(topic("A"));
        registry.request(topic("B"));
        registry.request(topic("A"));
        assert!(registry.is_empty());

        registry.replay(&mut manager).expect("replay");
        assert_eq!(registry.subscribed_topics(), vec!["A".to_string()]);
        assert_eq!(registry.skipped(), vec!["B".to_string()]);
    }

    #[test]
    fn transient_failure_is_returned_to_caller() {
        let engine = MockEngine::new();
        let config = SessionConfig::new(Credentials::new("alice", "secret"));
        let mut manager = ConnectionManager::new(engine, config);
        let mut registry = SubscriptionRegistry::new("alice");

        assert!(registry.subscribe(&mut manager, topic("A")).is_err());
        assert!(registry.subscribed_topics().is_empty());
        assert_eq!(registry.requested(), &[topic("A")]);
    }
}
