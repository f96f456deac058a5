//! Callback registry and dispatch for incoming messages and StateObjects.
//!
//! # Matching Rules
//!
//! | Item | Entry | Matches when |
//! |------|-------|--------------|
//! | message | keyed | item `Key` equals the entry id |
//! | message | saga | item carries a non-empty `SagaId` equal to the entry id |
//! | StateObject | filter | each filter field is `*` or equals the item's field |
//!
//! The unconditional handler (if set) runs first for every item, then every
//! matching entry runs in registration order. Saga entries are removed after
//! they fire; everything else stays registered.
//!
//! Removal is done after the scan of each item (mark, then `retain`), so an
//! entry that fires is never skipped or visited twice because of index shifts.

use crate::descriptor::MessageCallbackDescriptor;
use crate::types::{MessageContext, StateObjectFilter, StateObjectKey};
use serde_json::Value;
use std::fmt;

/// Handler for incoming messages.
pub enum MessageHandler {
    /// Receives the raw message item only
    Plain(Box<dyn FnMut(&Value)>),
    /// Receives the raw message item and its decoded context
    WithContext(Box<dyn FnMut(&Value, &MessageContext)>),
}

impl MessageHandler {
    /// Wrap a handler that ignores the message context.
    pub fn plain(handler: impl FnMut(&Value) + 'static) -> Self {
        MessageHandler::Plain(Box::new(handler))
    }

    /// Wrap a handler that receives the message context.
    pub fn with_context(handler: impl FnMut(&Value, &MessageContext) + 'static) -> Self {
        MessageHandler::WithContext(Box::new(handler))
    }

    /// Call the handler.
    pub fn invoke(&mut self, item: &Value, ctx: &MessageContext) {
        match self {
            MessageHandler::Plain(handler) => handler(item),
            MessageHandler::WithContext(handler) => handler(item, ctx),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            MessageHandler::Plain(_) => "without context",
            MessageHandler::WithContext(_) => "with context",
        }
    }
}

impl fmt::Debug for MessageHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageHandler({})", self.label())
    }
}

/// Handler for StateObject updates; receives the `StateObject` value.
pub type StateObjectHandler = Box<dyn FnMut(&Value)>;

/// How a message entry is correlated with incoming items.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageRoute {
    /// Persistent entry keyed by message key
    Key(MessageCallbackDescriptor),
    /// One-shot entry keyed by saga id
    Saga,
}

/// A registered message callback.
#[derive(Debug)]
pub struct MessageEntry {
    id: String,
    route: MessageRoute,
    handler: MessageHandler,
}

impl MessageEntry {
    /// Message key or saga id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this is a one-shot saga entry.
    pub fn is_saga(&self) -> bool {
        matches!(self.route, MessageRoute::Saga)
    }

    fn matches(&self, ctx: &MessageContext) -> bool {
        match self.route {
            MessageRoute::Saga => ctx.saga_id.as_deref() == Some(self.id.as_str()),
            MessageRoute::Key(_) => ctx.message_key == self.id,
        }
    }
}

struct StateObjectEntry {
    filter: StateObjectFilter,
    handler: StateObjectHandler,
}

/// Holds every callback and routes poll results to them.
#[derive(Default)]
pub struct DispatchRegistry {
    on_message: Option<MessageHandler>,
    messages: Vec<MessageEntry>,
    on_state_object: Option<StateObjectHandler>,
    state_objects: Vec<StateObjectEntry>,
}

impl DispatchRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or replace) the handler called for every incoming message.
    pub fn set_message_handler(&mut self, handler: MessageHandler) {
        self.on_message = Some(handler);
    }

    /// Set (or replace) the handler called for every StateObject update.
    pub fn set_state_object_handler(&mut self, handler: StateObjectHandler) {
        self.on_state_object = Some(handler);
    }

    /// Register a persistent callback for a message key.
    pub fn add_message_callback(
        &mut self,
        key: impl Into<String>,
        descriptor: MessageCallbackDescriptor,
        handler: MessageHandler,
    ) {
        self.messages.push(MessageEntry {
            id: key.into(),
            route: MessageRoute::Key(descriptor),
            handler,
        });
    }

    /// Register a one-shot callback for a saga id.
    pub fn add_saga_callback(&mut self, saga_id: impl Into<String>, handler: MessageHandler) {
        self.messages.push(MessageEntry {
            id: saga_id.into(),
            route: MessageRoute::Saga,
            handler,
        });
    }

    /// Register a persistent StateObject callback.
    pub fn add_state_object_callback(
        &mut self,
        filter: StateObjectFilter,
        handler: StateObjectHandler,
    ) {
        self.state_objects.push(StateObjectEntry { filter, handler });
    }

    /// Registered message entries, in order.
    pub fn message_entries(&self) -> &[MessageEntry] {
        &self.messages
    }

    /// Number of saga callbacks still waiting for their reply.
    pub fn pending_sagas(&self) -> usize {
        self.messages.iter().filter(|entry| entry.is_saga()).count()
    }

    /// Filters of the registered StateObject callbacks, in order.
    pub fn state_object_filters(&self) -> impl Iterator<Item = &StateObjectFilter> {
        self.state_objects.iter().map(|entry| &entry.filter)
    }

    /// Whether any message handler is registered.
    pub fn has_message_handlers(&self) -> bool {
        self.on_message.is_some() || !self.messages.is_empty()
    }

    /// Whether any StateObject handler is registered.
    pub fn has_state_object_handlers(&self) -> bool {
        self.on_state_object.is_some() || !self.state_objects.is_empty()
    }

    /// `(message key, descriptor)` of every keyed entry, for the package descriptor.
    pub fn message_descriptors(&self) -> impl Iterator<Item = (&str, &MessageCallbackDescriptor)> {
        self.messages.iter().filter_map(|entry| match &entry.route {
            MessageRoute::Key(descriptor) => Some((entry.id.as_str(), descriptor)),
            MessageRoute::Saga => None,
        })
    }

    /// Route a `GetMessages` array. Returns the number of handler invocations.
    pub fn dispatch_messages(&mut self, items: &[Value]) -> usize {
        if !self.has_message_handlers() {
            tracing::trace!("No message handler registered, {} items dropped", items.len());
            return 0;
        }
        let mut invoked = 0;
        for item in items {
            let ctx = match MessageContext::from_item(item) {
                Ok(ctx) => ctx,
                Err(e) => {
                    tracing::error!("Unable to decode the incoming message: {}", e);
                    continue;
                }
            };
            tracing::debug!(
                "Receiving message {} from {}",
                ctx.message_key,
                ctx.sender.friendly_name
            );

            if let Some(handler) = self.on_message.as_mut() {
                tracing::debug!("Invoking MessageReceiveCallback registered {}", handler.label());
                handler.invoke(item, &ctx);
                invoked += 1;
            }

            let mut fired_sagas = false;
            let mut fired = vec![false; self.messages.len()];
            for (entry, fired) in self.messages.iter_mut().zip(fired.iter_mut()) {
                if entry.matches(&ctx) {
                    tracing::debug!(
                        "Invoking MessageCallback '{}' {}",
                        entry.id,
                        entry.handler.label()
                    );
                    entry.handler.invoke(item, &ctx);
                    invoked += 1;
                    *fired = true;
                    fired_sagas |= entry.is_saga();
                }
            }

            if fired_sagas {
                let mut fired = fired.into_iter();
                self.messages.retain(|entry| {
                    let was_fired = fired.next().unwrap_or(false);
                    !(was_fired && entry.is_saga())
                });
            }
        }
        invoked
    }

    /// Route a `GetStateObjects` array. Returns the number of handler invocations.
    pub fn dispatch_state_objects(&mut self, items: &[Value]) -> usize {
        if !self.has_state_object_handlers() {
            tracing::trace!("No StateObject handler registered, {} items dropped", items.len());
            return 0;
        }
        let mut invoked = 0;
        for item in items {
            let Some(state_object) = item.get("StateObject") else {
                tracing::error!("StateObject update without StateObject: {}", item);
                continue;
            };

            if let Some(handler) = self.on_state_object.as_mut() {
                tracing::debug!("Invoking StateObject Callback");
                handler(state_object);
                invoked += 1;
            }

            if self.state_objects.is_empty() {
                continue;
            }
            let key = match StateObjectKey::from_state_object(state_object) {
                Ok(key) => key,
                Err(e) => {
                    tracing::error!("Unable to decode the StateObject identity: {}", e);
                    continue;
                }
            };
            for entry in self.state_objects.iter_mut() {
                if entry.filter.matches(&key) {
                    tracing::debug!("Invoking StateObjectLink registered for {}", entry.filter);
                    (entry.handler)(state_object);
                    invoked += 1;
                }
            }
        }
        invoked
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchRegistry")
            .field("on_message", &self.on_message)
            .field("messages", &self.messages)
            .field("on_state_object", &self.on_state_object.is_some())
            .field("state_objects", &self.state_objects.len())
            .finish()
    }
}
