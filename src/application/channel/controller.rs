//! ChannelController - reconnecting subscription state machine.
//!
//! Owns one logical subscription. All I/O goes through the
//! `ChannelTransport` and `RetryTimer` ports; the controller only reacts to
//! calls and signals, so it is fully deterministic under test.
//!
//! ```text
//! connect() ──▶ Connecting ──Opened──▶ Connected ──Frame──▶ handlers
//!                   │                      │
//!                   └──────Failed──────────┤
//!                                          ▼
//!             retry_count < max ? AwaitingRetry ──timer──▶ connect()
//!                               : Failed (manual connect() still allowed)
//! ```
//!
//! The controller is not thread-safe by itself. `ChannelSubscription` runs
//! it inside a single task and serializes every call.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::ChannelConfig;
use crate::domain::foundation::StateMachine;
use crate::domain::notification::{BackoffPolicy, ChannelState, Frame, Payload};
use crate::ports::{ChannelTransport, RetryTimer, TransportError, TransportSignal};

/// Status shown once the retry budget is spent.
pub const MAX_RETRIES_EXCEEDED: &str = "Connection failed. Max retries exceeded.";

/// Handler for one event type. Receives the parsed payload.
pub type EventHandler = Arc<dyn Fn(&Payload) + Send + Sync>;

/// Returned by `add_event_listener`; pass to `remove_event_listener` to
/// unsubscribe that one handler.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListenerHandle {
    event_type: String,
    id: u64,
}

impl ListenerHandle {
    pub fn event_type(&self) -> &str {
        &self.event_type
    }
}

/// Connection options for one subscription.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub url: String,
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
}

impl ChannelOptions {
    /// Options with the default retry budget (10) and backoff (1s..30s).
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: 10,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Options from the `channel` config section, for `url`.
    pub fn from_config(url: impl Into<String>, config: &ChannelConfig) -> Self {
        Self {
            url: url.into(),
            max_retries: config.max_retries,
            backoff: BackoffPolicy::new(config.initial_retry_delay(), config.max_retry_delay()),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Lifecycle callbacks. All optional.
#[derive(Default)]
pub struct ChannelCallbacks {
    on_open: Option<Box<dyn FnMut() + Send>>,
    on_message: Option<Box<dyn FnMut(&Frame) + Send>>,
    on_error: Option<Box<dyn FnMut(&TransportError) + Send>>,
    on_reconnect: Option<Box<dyn FnMut(u32) + Send>>,
}

impl ChannelCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called each time the stream opens.
    pub fn on_open(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_open = Some(Box::new(f));
        self
    }

    /// Called with every delivered frame, before typed handlers.
    pub fn on_message(mut self, f: impl FnMut(&Frame) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    /// Called for every transport failure.
    pub fn on_error(mut self, f: impl FnMut(&TransportError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Called with the new retry count right before each reconnect.
    pub fn on_reconnect(mut self, f: impl FnMut(u32) + Send + 'static) -> Self {
        self.on_reconnect = Some(Box::new(f));
        self
    }
}

/// Point-in-time view of a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatus {
    pub state: ChannelState,
    pub retry_count: u32,
    pub message: Option<String>,
    pub last_event_id: Option<String>,
}

/// Reconnecting channel over a transport and a retry timer.
pub struct ChannelController<T, R> {
    transport: T,
    timer: R,
    options: ChannelOptions,
    callbacks: ChannelCallbacks,
    state: ChannelState,
    retry_count: u32,
    status_message: Option<String>,
    last_event_id: Option<String>,
    handlers: HashMap<String, Vec<(u64, EventHandler)>>,
    next_listener_id: u64,
}

impl<T, R> ChannelController<T, R>
where
    T: ChannelTransport,
    R: RetryTimer,
{
    pub fn new(transport: T, timer: R, options: ChannelOptions) -> Self {
        Self::with_callbacks(transport, timer, options, ChannelCallbacks::default())
    }

    pub fn with_callbacks(
        transport: T,
        timer: R,
        options: ChannelOptions,
        callbacks: ChannelCallbacks,
    ) -> Self {
        Self {
            transport,
            timer,
            options,
            callbacks,
            state: ChannelState::Disconnected,
            retry_count: 0,
            status_message: None,
            last_event_id: None,
            handlers: HashMap::new(),
            next_listener_id: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Human-readable status, set while reconnecting or after giving up.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Last `id:` seen; sent as `Last-Event-ID` on reconnect.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    pub fn status(&self) -> ChannelStatus {
        ChannelStatus {
            state: self.state,
            retry_count: self.retry_count,
            message: self.status_message.clone(),
            last_event_id: self.last_event_id.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn timer(&self) -> &R {
        &self.timer
    }

    /// Opens the transport unless already connecting or connected.
    ///
    /// From `AwaitingRetry` the pending timer is cancelled first. From
    /// `Failed` the retry count is kept until a connection succeeds.
    pub fn connect(&mut self) {
        if !self.state.accepts_connect() {
            return;
        }
        if self.state == ChannelState::AwaitingRetry {
            self.timer.cancel();
        }

        self.transition(ChannelState::Connecting);
        tracing::debug!(url = %self.options.url, attempt = self.retry_count, "Opening channel");

        for event_type in self.handlers.keys() {
            self.transport.subscribe(event_type);
        }

        let last_event_id = self.last_event_id.clone();
        if let Err(e) = self.transport.open(&self.options.url, last_event_id.as_deref()) {
            self.handle_failure(e);
        }
    }

    /// Stops everything. Safe from any state.
    pub fn disconnect(&mut self) {
        self.timer.cancel();
        self.transport.close();
        self.retry_count = 0;
        self.status_message = None;
        if self.state != ChannelState::Disconnected {
            self.transition(ChannelState::Disconnected);
            tracing::debug!(url = %self.options.url, "Channel disconnected");
        }
    }

    /// Applies one signal from the current transport.
    pub fn handle_signal(&mut self, signal: TransportSignal) {
        match signal {
            TransportSignal::Opened => self.handle_open(),
            TransportSignal::Frame(frame) => self.handle_frame(frame),
            TransportSignal::Failed(error) => {
                if self.state.is_active() {
                    self.handle_failure(error);
                }
            }
        }
    }

    /// The retry timer fired.
    pub fn on_retry_elapsed(&mut self) {
        if self.state != ChannelState::AwaitingRetry {
            return;
        }

        self.retry_count += 1;
        if let Some(on_reconnect) = self.callbacks.on_reconnect.as_mut() {
            on_reconnect(self.retry_count);
        }
        self.connect();
    }

    /// Adds a handler for `event_type` frames.
    ///
    /// The first handler of a new type subscribes a live transport to it
    /// immediately, without reconnecting.
    pub fn add_event_listener(
        &mut self,
        event_type: impl Into<String>,
        handler: EventHandler,
    ) -> ListenerHandle {
        let event_type = event_type.into();
        let id = self.next_listener_id;
        self.next_listener_id += 1;

        let entry = self.handlers.entry(event_type.clone()).or_default();
        let first_of_type = entry.is_empty();
        entry.push((id, handler));

        if first_of_type && self.state.is_active() {
            self.transport.subscribe(&event_type);
        }

        ListenerHandle { event_type, id }
    }

    /// Removes one handler. Returns false if it was already removed.
    pub fn remove_event_listener(&mut self, handle: &ListenerHandle) -> bool {
        let Some(entry) = self.handlers.get_mut(&handle.event_type) else {
            return false;
        };

        let before = entry.len();
        entry.retain(|(id, _)| *id != handle.id);
        let removed = entry.len() != before;

        if entry.is_empty() {
            self.handlers.remove(&handle.event_type);
        }
        removed
    }

    /// Number of handlers registered for `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    fn handle_open(&mut self) {
        if self.state != ChannelState::Connecting {
            return;
        }

        self.transition(ChannelState::Connected);
        self.retry_count = 0;
        self.status_message = None;
        tracing::info!(url = %self.options.url, "Channel connected");

        if let Some(on_open) = self.callbacks.on_open.as_mut() {
            on_open();
        }
    }

    fn handle_frame(&mut self, frame: Frame) {
        if self.state != ChannelState::Connected {
            tracing::trace!(state = ?self.state, "Dropping frame received while not connected");
            return;
        }

        if let Some(id) = &frame.id {
            self.last_event_id = (!id.is_empty()).then(|| id.clone());
        }

        if let Some(on_message) = self.callbacks.on_message.as_mut() {
            on_message(&frame);
        }

        let Some(handlers) = self.handlers.get(frame.event_type()) else {
            return;
        };
        let payload = Payload::parse(&frame.data);
        for (_, handler) in handlers {
            handler(&payload);
        }
    }

    fn handle_failure(&mut self, error: TransportError) {
        self.transport.close();

        if let Some(on_error) = self.callbacks.on_error.as_mut() {
            on_error(&error);
        }

        if self.retry_count < self.options.max_retries {
            let delay = self.options.backoff.delay(self.retry_count);
            let seconds = (delay.as_millis() as f64 / 1000.0).round() as u64;

            self.transition(ChannelState::AwaitingRetry);
            self.status_message = Some(format!("Connection lost. Reconnecting in {}s...", seconds));
            tracing::warn!(
                url = %self.options.url,
                error = %error,
                retry_count = self.retry_count,
                delay_ms = delay.as_millis() as u64,
                "Channel lost, scheduling reconnect"
            );
            self.timer.schedule(delay);
        } else {
            self.transition(ChannelState::Failed);
            self.status_message = Some(MAX_RETRIES_EXCEEDED.to_string());
            tracing::error!(
                url = %self.options.url,
                error = %error,
                retry_count = self.retry_count,
                "Channel failed, retry budget exhausted"
            );
        }
    }

    fn transition(&mut self, target: ChannelState) {
        debug_assert!(
            self.state.can_transition_to(&target),
            "invalid channel transition {:?} -> {:?}",
            self.state,
            target
        );
        self.state = target;
    }
}
