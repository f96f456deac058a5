//! The Constellation client engine.
//!
//! [`ConstellationClient`] owns three transports:
//!
//! | Connection | Used for |
//! |------------|----------|
//! | control | subscribe calls, `SendMessage`, `PushStateObject`, `WriteLog`, ... |
//! | messages | the `GetMessages` long-poll |
//! | state objects | the `GetStateObjects` long-poll |
//!
//! Nothing runs in the background. The caller drives the client by calling
//! [`poll`](ConstellationClient::poll) (or the per-channel checks) from its
//! main loop; a tick never blocks while the hub holds a long-poll open.
//!
//! # Examples
//!
//! ```no_run
//! use constellation_http::client::{ClientConfig, ConstellationClient, MessageHandler};
//! use constellation_http::types::StateObjectFilter;
//!
//! # fn main() -> constellation_http::error::Result<()> {
//! let config = ClientConfig::from_url("http://192.168.0.10:8088")?
//!     .with_identity("ESP8266", "Relay", "secret");
//! let mut client = ConstellationClient::with_tcp(config);
//!
//! client.register_message_callback(
//!     "Switch",
//!     MessageHandler::plain(|item| println!("switch: {}", item["Data"])),
//! )?;
//! client.register_state_object_link(
//!     &StateObjectFilter::new("*", "HWMonitor").with_name("/intelcpu/load/0"),
//!     |so| println!("cpu: {}", so["Value"]),
//! )?;
//!
//! loop {
//!     let _ = client.poll();
//! }
//! # }
//! ```

use crate::client::channel::{ControlChannel, Endpoint, PollChannel, PollState};
use crate::client::config::ClientConfig;
use crate::client::dispatch::{DispatchRegistry, MessageHandler};
use crate::client::outbound::{message_data, response_body, StateObjectPush};
use crate::client::parser::HttpResponse;
use crate::client::subscription::{Requester, SubscriptionManager};
use crate::client::utils::{is_no_content_status, is_ok_status, is_renewal_status};
use crate::descriptor::{MessageCallbackDescriptor, PackageDescriptor};
use crate::error::{ConstellationError, Result};
use crate::protocol::constants::{methods, WILDCARD};
use crate::transport::{TcpTransport, Transport};
use crate::types::{LogLevel, MessageContext, ScopeType, StateObjectFilter, SubscriptionKind};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A device connected to a Constellation hub over the HTTP long-poll endpoint.
pub struct ConstellationClient<T: Transport = TcpTransport> {
    config: ClientConfig,
    control: ControlChannel<T>,
    messages: PollChannel<T>,
    state_objects: PollChannel<T>,
    subscriptions: SubscriptionManager,
    registry: DispatchRegistry,
}

impl ConstellationClient<TcpTransport> {
    /// Client over three plain TCP connections, opened lazily.
    pub fn with_tcp(config: ClientConfig) -> Self {
        ConstellationClient::new(
            config,
            TcpTransport::new(),
            TcpTransport::new(),
            TcpTransport::new(),
        )
    }
}

impl<T: Transport> ConstellationClient<T> {
    /// Client over caller-provided transports.
    pub fn new(config: ClientConfig, control: T, messages: T, state_objects: T) -> Self {
        ConstellationClient {
            control: ControlChannel {
                endpoint: Endpoint::new(&config),
                transport: control,
            },
            messages: PollChannel::new(messages),
            state_objects: PollChannel::new(state_objects),
            subscriptions: SubscriptionManager::new(),
            registry: DispatchRegistry::new(),
            config,
        }
    }

    /// Configuration the client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sentinel this device runs as.
    pub fn sentinel_name(&self) -> &str {
        &self.config.sentinel_name
    }

    /// Package this device runs as.
    pub fn package_name(&self) -> &str {
        &self.config.package_name
    }

    /// Id of the message subscription, once acquired.
    pub fn message_subscription_id(&self) -> Option<&str> {
        self.subscriptions.id(SubscriptionKind::Message)
    }

    /// Id of the StateObject subscription, once acquired.
    pub fn state_object_subscription_id(&self) -> Option<&str> {
        self.subscriptions.id(SubscriptionKind::StateObject)
    }

    /// Subscription state.
    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Registered callbacks.
    pub fn registry(&self) -> &DispatchRegistry {
        &self.registry
    }

    /// Handler called for every incoming message.
    pub fn set_message_receive_callback(&mut self, handler: MessageHandler) -> &mut Self {
        self.registry.set_message_handler(handler);
        self
    }

    /// Handler called for every StateObject update.
    pub fn set_state_object_update_callback(
        &mut self,
        handler: impl FnMut(&Value) + 'static,
    ) -> &mut Self {
        self.registry.set_state_object_handler(Box::new(handler));
        self
    }

    /// Verify each connection before a request is written on it (e.g. check a
    /// TLS fingerprint). Returning `false` fails the request.
    pub fn on_client_connected(
        &mut self,
        hook: impl FnMut(&mut T) -> bool + 'static,
    ) -> &mut Self {
        self.control.endpoint.set_connect_hook(Box::new(hook));
        self
    }

    /// Acquire the message subscription if needed.
    ///
    /// # Errors
    ///
    /// [`ConstellationError::Credential`] when the hub refuses the identity,
    /// transport and status errors otherwise.
    pub fn subscribe_to_message(&mut self) -> Result<()> {
        self.subscriptions.ensure_message(&mut self.control).map(|_| ())
    }

    /// Confirm the message subscription with the hub.
    pub fn renew_message_subscription(&mut self) -> Result<()> {
        self.subscriptions.renew_message(&mut self.control)
    }

    /// Join a message group (recorded for renewals).
    pub fn subscribe_to_message_group(&mut self, group: &str) -> Result<()> {
        self.subscriptions.subscribe_group(&mut self.control, group, false)
    }

    /// Call `handler` for every message whose key is `key`.
    ///
    /// The callback is not advertised by
    /// [`declare_package_descriptor`](Self::declare_package_descriptor).
    pub fn register_message_callback(&mut self, key: &str, handler: MessageHandler) -> Result<()> {
        let descriptor = MessageCallbackDescriptor::hidden();
        self.register_message_callback_with_descriptor(key, descriptor, handler)
    }

    /// Call `handler` for every message whose key is `key`, advertised with
    /// `descriptor`.
    pub fn register_message_callback_with_descriptor(
        &mut self,
        key: &str,
        descriptor: MessageCallbackDescriptor,
        handler: MessageHandler,
    ) -> Result<()> {
        self.subscribe_to_message()?;
        self.registry.add_message_callback(key, descriptor, handler);
        Ok(())
    }

    /// Subscribe the StateObject channel to `filter` (recorded for renewals).
    pub fn subscribe_to_state_objects(&mut self, filter: &StateObjectFilter) -> Result<()> {
        self.subscriptions
            .subscribe_state_objects(&mut self.control, filter, false)
    }

    /// Call `handler` for every StateObject update matching `filter`, and
    /// subscribe to it.
    pub fn register_state_object_link(
        &mut self,
        filter: &StateObjectFilter,
        handler: impl FnMut(&Value) + 'static,
    ) -> Result<()> {
        self.registry
            .add_state_object_callback(filter.clone(), Box::new(handler));
        self.subscribe_to_state_objects(filter)
    }

    /// Current StateObjects matching `filter`.
    pub fn request_state_objects(&mut self, filter: &StateObjectFilter) -> Result<Vec<Value>> {
        let response = self
            .control
            .get(methods::REQUEST_STATE_OBJECTS, &filter.query_args())?;
        expect_json(response).inspect_err(|e| {
            tracing::error!("Unable to parse the StateObjects array: {}", e);
        })
    }

    /// Settings of this package.
    pub fn get_settings(&mut self) -> Result<Map<String, Value>> {
        let response = self.control.get(methods::GET_SETTINGS, &[])?;
        expect_json(response).inspect_err(|e| {
            tracing::info!("Unable to parse the settings object: {}", e);
        })
    }

    /// Send a message to `scope`.
    ///
    /// A string `data` is sent as is (it is expected to hold JSON text); any
    /// other value is serialized.
    pub fn send_message(
        &mut self,
        scope: ScopeType,
        scope_args: &str,
        key: &str,
        data: &Value,
    ) -> Result<()> {
        let data = message_data(data);
        let args = [
            ("scope", scope.label()),
            ("args", scope_args),
            ("key", key),
            ("data", data.as_str()),
        ];
        let response = self.control.get(methods::SEND_MESSAGE, &args)?;
        expect_no_content(response)
    }

    /// Send a message in a new saga; `handler` gets the response, once.
    ///
    /// Acquires the message subscription first, since the response arrives on
    /// the message channel. Returns the saga id.
    pub fn send_message_with_saga(
        &mut self,
        handler: MessageHandler,
        scope: ScopeType,
        scope_args: &str,
        key: &str,
        data: &Value,
    ) -> Result<String> {
        self.subscriptions.ensure_message(&mut self.control)?;
        let saga_id = uuid::Uuid::new_v4().to_string();
        tracing::debug!("SagaId: {}", saga_id);

        let data = message_data(data);
        let args = [
            ("scope", scope.label()),
            ("args", scope_args),
            ("key", key),
            ("data", data.as_str()),
            ("sagaId", saga_id.as_str()),
        ];
        let response = self.control.get(methods::SEND_MESSAGE, &args)?;
        expect_no_content(response)?;

        self.registry.add_saga_callback(saga_id.clone(), handler);
        Ok(saga_id)
    }

    /// Answer the saga of `ctx` with `data`.
    pub fn send_response(&mut self, ctx: &MessageContext, data: Value) -> Result<()> {
        let body = response_body(ctx, data).to_string();
        let response = self.control.post(methods::SEND_MESSAGE, &body)?;
        expect_no_content(response)
    }

    /// Publish a StateObject.
    pub fn push_state_object(&mut self, push: &StateObjectPush) -> Result<()> {
        let body = push.to_body().to_string();
        let response = self.control.post(methods::PUSH_STATE_OBJECT, &body)?;
        expect_no_content(response)
    }

    /// Delete this package's StateObjects matching `name` and `type_name`.
    pub fn purge_state_objects(&mut self, name: &str, type_name: &str) -> Result<()> {
        let response = self
            .control
            .get(methods::PURGE_STATE_OBJECTS, &[("name", name), ("type", type_name)])?;
        expect_no_content(response)
    }

    /// Delete every StateObject of this package.
    pub fn purge_all_state_objects(&mut self) -> Result<()> {
        self.purge_state_objects(WILDCARD, WILDCARD)
    }

    /// Write a line to the hub log.
    pub fn write_log(&mut self, text: &str, level: LogLevel) -> Result<()> {
        tracing::info!("WriteLog({}) : {}", level.label(), text);
        let response = self
            .control
            .get(methods::WRITE_LOG, &[("message", text), ("level", level.label())])?;
        expect_no_content(response)
    }

    /// [`write_log`](Self::write_log) at info level.
    pub fn write_info(&mut self, text: &str) -> Result<()> {
        self.write_log(text, LogLevel::Info)
    }

    /// [`write_log`](Self::write_log) at warning level.
    pub fn write_warn(&mut self, text: &str) -> Result<()> {
        self.write_log(text, LogLevel::Warn)
    }

    /// [`write_log`](Self::write_log) at error level.
    pub fn write_error(&mut self, text: &str) -> Result<()> {
        self.write_log(text, LogLevel::Error)
    }

    /// Advertise the visible message callbacks to the hub.
    pub fn declare_package_descriptor(&mut self) -> Result<()> {
        let descriptor = PackageDescriptor::new(
            &self.config.package_name,
            self.registry.message_descriptors(),
        );
        let body = serde_json::to_string(&descriptor)?;
        let response = self.control.post(methods::DECLARE_PACKAGE_DESCRIPTOR, &body)?;
        expect_no_content(response)
    }

    /// Replay every subscription: message, groups, then StateObject filters.
    ///
    /// Stops at the first failure.
    pub fn renew_subscriptions(&mut self) -> Result<()> {
        self.subscriptions.renew_all(&mut self.control)
    }

    /// Tick the message channel.
    ///
    /// Dispatches a `GetMessages` response if one arrived, then makes sure a
    /// long-poll request is outstanding. Returns the number of handler calls.
    ///
    /// # Errors
    ///
    /// Errors are reported after the next long-poll request was issued, so the
    /// next tick carries on. A 500 answer triggers
    /// [`renew_subscriptions`](Self::renew_subscriptions) and is reported as
    /// [`ConstellationError::Server`] once renewal succeeded.
    pub fn check_incoming_messages(&mut self, timeout_ms: u64, limit: u32) -> Result<usize> {
        self.check_channel(SubscriptionKind::Message, timeout_ms, limit)
    }

    /// Tick the StateObject channel. Same contract as
    /// [`check_incoming_messages`](Self::check_incoming_messages).
    pub fn check_state_object_updates(&mut self, timeout_ms: u64, limit: u32) -> Result<usize> {
        self.check_channel(SubscriptionKind::StateObject, timeout_ms, limit)
    }

    /// Tick both channels with the configured timeout and limit.
    pub fn poll(&mut self) -> Result<usize> {
        self.poll_with(self.config.subscription_timeout_ms, self.config.subscription_limit)
    }

    /// Tick both channels. Both are ticked even if the first one fails.
    pub fn poll_with(&mut self, timeout_ms: u64, limit: u32) -> Result<usize> {
        let messages = self.check_incoming_messages(timeout_ms, limit);
        let state_objects = self.check_state_object_updates(timeout_ms, limit);
        Ok(messages? + state_objects?)
    }

    fn check_channel(
        &mut self,
        kind: SubscriptionKind,
        timeout_ms: u64,
        limit: u32,
    ) -> Result<usize> {
        if self.subscriptions.id(kind).is_none() {
            tracing::trace!("Check {} : no subscription id", kind);
            return Ok(0);
        }

        let timeout = self.control.endpoint.request_timeout();
        let outcome = match self.channel_mut(kind).check(timeout) {
            PollState::Waiting => return Ok(0),
            PollState::Idle => Ok(0),
            PollState::Ready(response) => self.handle_poll_response(kind, response),
        };
        let issued = self.issue_poll(kind, timeout_ms, limit);

        let invoked = outcome?;
        issued?;
        Ok(invoked)
    }

    fn channel_mut(&mut self, kind: SubscriptionKind) -> &mut PollChannel<T> {
        match kind {
            SubscriptionKind::Message => &mut self.messages,
            SubscriptionKind::StateObject => &mut self.state_objects,
        }
    }

    fn handle_poll_response(
        &mut self,
        kind: SubscriptionKind,
        response: Result<HttpResponse>,
    ) -> Result<usize> {
        let response = response.inspect_err(|e| {
            tracing::error!("Unable to read the {} long-poll response: {}", kind, e);
        })?;

        if is_renewal_status(response.status) {
            tracing::error!("Unable to get {} updates : internal server error", kind);
            self.renew_subscriptions()?;
            return Err(ConstellationError::Server(response.status));
        }

        let items: Vec<Value> = expect_json(response).inspect_err(|e| {
            tracing::error!("Unable to parse the {} array: {}", kind, e);
        })?;
        Ok(match kind {
            SubscriptionKind::Message => self.registry.dispatch_messages(&items),
            SubscriptionKind::StateObject => self.registry.dispatch_state_objects(&items),
        })
    }

    fn issue_poll(&mut self, kind: SubscriptionKind, timeout_ms: u64, limit: u32) -> Result<()> {
        let id = self
            .subscriptions
            .id(kind)
            .ok_or(ConstellationError::NotSubscribed(kind))?;
        let timeout = timeout_ms.to_string();
        let limit = limit.to_string();
        let args = [
            ("subscriptionId", id),
            ("timeout", timeout.as_str()),
            ("limit", limit.as_str()),
        ];

        let (channel, method) = match kind {
            SubscriptionKind::Message => (&mut self.messages, methods::GET_MESSAGES),
            SubscriptionKind::StateObject => (&mut self.state_objects, methods::GET_STATE_OBJECTS),
        };
        self.control
            .endpoint
            .write_get(&mut channel.transport, method, &args, true)?;
        channel.in_flight = true;
        Ok(())
    }
}

fn expect_no_content(response: HttpResponse) -> Result<()> {
    if is_no_content_status(response.status) {
        Ok(())
    } else {
        Err(unexpected(response))
    }
}

fn expect_json<D: DeserializeOwned>(response: HttpResponse) -> Result<D> {
    if is_ok_status(response.status) {
        response.json()
    } else {
        Err(unexpected(response))
    }
}

fn unexpected(response: HttpResponse) -> ConstellationError {
    ConstellationError::UnexpectedStatus {
        status: response.status,
        body: response.text().into_owned(),
    }
}
