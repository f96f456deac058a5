//! Subscription lifecycle for the message and StateObject channels.
//!
//! The hub hands out one opaque subscription id per channel. The manager keeps
//! at most one id per [`SubscriptionKind`], remembers every message group and
//! StateObject filter it subscribed, and replays all of them when the hub
//! reports that a channel became invalid (status 500 on a long-poll).
//!
//! # Lifecycle
//!
//! 1. First subscribe call without arguments → hub answers `"<36-char id>"`
//! 2. Further calls (groups, extra filters) carry `subscriptionId`
//! 3. On a 500 from `GetMessages`/`GetStateObjects`: [`renew_all`] replays, in
//!    order, the message subscription, every group, every StateObject filter
//!
//! Ids are never dropped on transport errors; only a fresh client starts over.
//!
//! [`renew_all`]: SubscriptionManager::renew_all

use crate::client::parser::HttpResponse;
use crate::client::utils::{is_ok_status, parse_subscription_id};
use crate::error::{ConstellationError, Result};
use crate::protocol::constants::methods;
use crate::types::{StateObjectFilter, SubscriptionKind};

/// Something able to send a one-shot GET request to the hub.
pub trait Requester {
    /// Send `method` with query `args` and read the full response.
    fn get(&mut self, method: &str, args: &[(&str, &str)]) -> Result<HttpResponse>;
}

/// An active hub subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    id: String,
    kind: SubscriptionKind,
}

impl Subscription {
    /// Hub-assigned id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Channel this subscription belongs to.
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }
}

/// Subscription ids plus everything needed to renew them.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    message: Option<Subscription>,
    state_object: Option<Subscription>,
    groups: Vec<String>,
    filters: Vec<StateObjectFilter>,
}

impl SubscriptionManager {
    /// Create a manager without subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current id of a channel, if subscribed.
    pub fn id(&self, kind: SubscriptionKind) -> Option<&str> {
        self.subscription(kind).map(Subscription::id)
    }

    /// Current subscription of a channel.
    pub fn subscription(&self, kind: SubscriptionKind) -> Option<&Subscription> {
        match kind {
            SubscriptionKind::Message => self.message.as_ref(),
            SubscriptionKind::StateObject => self.state_object.as_ref(),
        }
    }

    /// Recorded message groups, in subscription order.
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Recorded StateObject filters, in subscription order.
    pub fn filters(&self) -> &[StateObjectFilter] {
        &self.filters
    }

    /// Acquire the message subscription if there is none yet.
    ///
    /// # Errors
    ///
    /// Transport errors, [`ConstellationError::Credential`] when the hub answers
    /// `null`, [`ConstellationError::UnexpectedStatus`] or
    /// [`ConstellationError::InvalidSubscriptionId`] otherwise.
    pub fn ensure_message<R: Requester + ?Sized>(&mut self, requester: &mut R) -> Result<&str> {
        if self.message.is_none() {
            let id = acquire(requester, methods::SUBSCRIBE_TO_MESSAGE, &[]).inspect_err(|e| {
                tracing::error!("Unable to SubscribeToMessage: {}", e);
            })?;
            tracing::info!("SubscribeToMessage:OK - Subscription Id = {}", id);
            self.message = Some(Subscription {
                id,
                kind: SubscriptionKind::Message,
            });
        }
        self.id(SubscriptionKind::Message)
            .ok_or(ConstellationError::NotSubscribed(SubscriptionKind::Message))
    }

    /// Confirm the existing message subscription with the hub, or acquire one.
    ///
    /// # Errors
    ///
    /// Same as [`ensure_message`](Self::ensure_message); a non-200 renewal
    /// answer is [`ConstellationError::UnexpectedStatus`].
    pub fn renew_message<R: Requester + ?Sized>(&mut self, requester: &mut R) -> Result<()> {
        let Some(subscription) = self.message.as_ref() else {
            return self.ensure_message(requester).map(|_| ());
        };
        let response = requester.get(
            methods::SUBSCRIBE_TO_MESSAGE,
            &[("subscriptionId", subscription.id())],
        )?;
        expect_ok(response)
    }

    /// Subscribe the message channel to a group.
    ///
    /// Acquires the message subscription first. Unless `renew` is set, the
    /// group is recorded (once) so later renewals replay it.
    ///
    /// # Errors
    ///
    /// Any error of [`ensure_message`](Self::ensure_message), or a non-200 answer.
    pub fn subscribe_group<R: Requester + ?Sized>(
        &mut self,
        requester: &mut R,
        group: &str,
        renew: bool,
    ) -> Result<()> {
        let id = self.ensure_message(requester)?.to_string();
        if !renew && !self.groups.iter().any(|g| g == group) {
            self.groups.push(group.to_string());
        }
        let response = requester.get(
            methods::SUBSCRIBE_TO_MESSAGE_GROUP,
            &[("subscriptionId", &id), ("group", group)],
        )?;
        expect_ok(response)
    }

    /// Subscribe the StateObject channel to `filter`.
    ///
    /// The first call acquires the subscription id; later calls add the filter
    /// to the existing subscription. Unless `renew` is set, the filter is
    /// recorded (once) so later renewals replay it.
    ///
    /// # Errors
    ///
    /// Transport errors, [`ConstellationError::Credential`] when the hub answers
    /// `null`, or an unexpected status/body.
    pub fn subscribe_state_objects<R: Requester + ?Sized>(
        &mut self,
        requester: &mut R,
        filter: &StateObjectFilter,
        renew: bool,
    ) -> Result<()> {
        if !renew && !self.filters.contains(filter) {
            self.filters.push(filter.clone());
        }

        match self.state_object.as_ref() {
            None => {
                let args = filter.query_args();
                let id = acquire(requester, methods::SUBSCRIBE_TO_STATE_OBJECTS, &args)
                    .inspect_err(|e| match e {
                        ConstellationError::Credential => {
                            tracing::error!(
                                "Unable to SubscribeToStateObjects : check your credential !"
                            )
                        }
                        e => tracing::error!("Unable to SubscribeToStateObjects: {}", e),
                    })?;
                tracing::info!("SubscribeToStateObjects:OK - Subscription Id = {}", id);
                self.state_object = Some(Subscription {
                    id,
                    kind: SubscriptionKind::StateObject,
                });
                Ok(())
            }
            Some(subscription) => {
                let mut args = vec![("subscriptionId", subscription.id())];
                args.extend(filter.query_args());
                let response = requester.get(methods::SUBSCRIBE_TO_STATE_OBJECTS, &args)?;
                expect_ok(response)
            }
        }
    }

    /// Replay every subscription after the hub reported a server failure.
    ///
    /// Order: message subscription, groups (registration order), StateObject
    /// filters (registration order). The first failure stops the pass.
    ///
    /// # Errors
    ///
    /// The error of the first step that failed.
    pub fn renew_all<R: Requester + ?Sized>(&mut self, requester: &mut R) -> Result<()> {
        if self.message.is_some() {
            tracing::debug!("Renew the message subscription");
            self.renew_message(requester).inspect_err(|e| {
                tracing::error!("Unable to renew the message subscription: {}", e);
            })?;

            for group in self.groups.clone() {
                tracing::debug!("Renew subscription for the group {}", group);
                self.subscribe_group(requester, &group, true).inspect_err(|e| {
                    tracing::error!(
                        "Unable to renew the subscription for the group {}: {}",
                        group,
                        e
                    );
                })?;
            }
        }

        for filter in self.filters.clone() {
            tracing::debug!("Renew the subscription for the StateObjects {}", filter);
            self.subscribe_state_objects(requester, &filter, true).inspect_err(|e| {
                tracing::error!(
                    "Unable to renew the subscription for the StateObjects {}: {}",
                    filter,
                    e
                );
            })?;
        }
        Ok(())
    }
}

fn acquire<R: Requester + ?Sized>(
    requester: &mut R,
    method: &str,
    args: &[(&str, &str)],
) -> Result<String> {
    let response = requester.get(method, args)?;
    let body = response.text();
    if body.trim() == "null" {
        return Err(ConstellationError::Credential);
    }
    if !is_ok_status(response.status) {
        return Err(ConstellationError::UnexpectedStatus {
            status: response.status,
            body: body.into_owned(),
        });
    }
    parse_subscription_id(&body)
}

fn expect_ok(response: HttpResponse) -> Result<()> {
    if is_ok_status(response.status) {
        Ok(())
    } else {
        Err(ConstellationError::UnexpectedStatus {
            status: response.status,
            body: response.text().into_owned(),
        })
    }
}
