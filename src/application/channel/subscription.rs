//! ChannelSubscription - runs a `ChannelController` on its own task.
//!
//! Every input (caller commands, transport signals, timer fires) goes
//! through one unbounded queue and is applied in arrival order, so the
//! controller never sees two calls at once. Signals from a closed transport
//! or a cancelled timer carry an old generation and are dropped here.
//!
//! ```text
//! handle ──Command──┐
//! HttpEventSource ──┼──▶ queue ──▶ driver task ──▶ ChannelController
//! TokioRetryTimer ──┘
//! ```

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::adapters::event_source::{HttpEventSource, RetryElapsed, SourceEvent, TokioRetryTimer};

use super::controller::{
    ChannelCallbacks, ChannelController, ChannelOptions, ChannelStatus, EventHandler,
    ListenerHandle,
};

/// Errors from talking to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// The driver task has stopped (shut down or panicked).
    #[error("Subscription task is no longer running")]
    Stopped,
}

enum Command {
    Connect,
    Disconnect,
    AddListener {
        event_type: String,
        handler: EventHandler,
        reply: oneshot::Sender<ListenerHandle>,
    },
    RemoveListener {
        handle: ListenerHandle,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<ChannelStatus>,
    },
    Shutdown,
}

/// Item on the driver queue.
enum DriverInput {
    Command(Command),
    Transport(SourceEvent),
    Timer(RetryElapsed),
}

impl From<SourceEvent> for DriverInput {
    fn from(event: SourceEvent) -> Self {
        DriverInput::Transport(event)
    }
}

impl From<RetryElapsed> for DriverInput {
    fn from(elapsed: RetryElapsed) -> Self {
        DriverInput::Timer(elapsed)
    }
}

type Controller = ChannelController<HttpEventSource<DriverInput>, TokioRetryTimer<DriverInput>>;

/// Handle to a reconnecting subscription running on the tokio runtime.
///
/// Dropping the handle shuts the subscription down.
pub struct ChannelSubscription {
    inputs: mpsc::UnboundedSender<DriverInput>,
    task: Option<JoinHandle<()>>,
}

impl ChannelSubscription {
    /// Spawns the driver task with a fresh reqwest client. Does not connect.
    pub fn spawn(options: ChannelOptions, callbacks: ChannelCallbacks) -> Self {
        Self::spawn_with_client(reqwest::Client::new(), options, callbacks)
    }

    /// Spawns the driver task using `client` for every request.
    pub fn spawn_with_client(
        client: reqwest::Client,
        options: ChannelOptions,
        callbacks: ChannelCallbacks,
    ) -> Self {
        let (inputs, queue) = mpsc::unbounded_channel();
        let transport = HttpEventSource::new(client, inputs.clone());
        let timer = TokioRetryTimer::new(inputs.clone());
        let controller = ChannelController::with_callbacks(transport, timer, options, callbacks);

        let task = tokio::spawn(drive(controller, queue));
        Self {
            inputs,
            task: Some(task),
        }
    }

    /// Starts connecting. No-op while connecting or connected.
    pub fn connect(&self) -> Result<(), SubscriptionError> {
        self.send(Command::Connect)
    }

    /// Stops the stream and any pending reconnect.
    pub fn disconnect(&self) -> Result<(), SubscriptionError> {
        self.send(Command::Disconnect)
    }

    /// Registers a handler for `event_type` frames.
    pub async fn add_event_listener(
        &self,
        event_type: impl Into<String>,
        handler: EventHandler,
    ) -> Result<ListenerHandle, SubscriptionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::AddListener {
            event_type: event_type.into(),
            handler,
            reply,
        })?;
        response.await.map_err(|_| SubscriptionError::Stopped)
    }

    /// Removes one handler; false if it was already gone.
    pub async fn remove_event_listener(
        &self,
        handle: ListenerHandle,
    ) -> Result<bool, SubscriptionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::RemoveListener { handle, reply })?;
        response.await.map_err(|_| SubscriptionError::Stopped)
    }

    /// Current state, retry count and status message.
    pub async fn status(&self) -> Result<ChannelStatus, SubscriptionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Status { reply })?;
        response.await.map_err(|_| SubscriptionError::Stopped)
    }

    /// Disconnects and waits for the driver task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.inputs.send(DriverInput::Command(Command::Shutdown));
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "Subscription task ended abnormally");
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), SubscriptionError> {
        self.inputs
            .send(DriverInput::Command(command))
            .map_err(|_| SubscriptionError::Stopped)
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.inputs.send(DriverInput::Command(Command::Shutdown));
        }
    }
}

async fn drive(mut controller: Controller, mut queue: mpsc::UnboundedReceiver<DriverInput>) {
    while let Some(input) = queue.recv().await {
        match input {
            DriverInput::Command(command) => match command {
                Command::Connect => controller.connect(),
                Command::Disconnect => controller.disconnect(),
                Command::AddListener {
                    event_type,
                    handler,
                    reply,
                } => {
                    let handle = controller.add_event_listener(event_type, handler);
                    let _ = reply.send(handle);
                }
                Command::RemoveListener { handle, reply } => {
                    let _ = reply.send(controller.remove_event_listener(&handle));
                }
                Command::Status { reply } => {
                    let _ = reply.send(controller.status());
                }
                Command::Shutdown => break,
            },
            DriverInput::Transport(event) => {
                if controller.transport().is_current(event.generation) {
                    controller.handle_signal(event.signal);
                } else {
                    tracing::trace!(generation = event.generation, "Dropping stale transport signal");
                }
            }
            DriverInput::Timer(elapsed) => {
                if controller.timer().is_current(elapsed.generation) {
                    controller.on_retry_elapsed();
                } else {
                    tracing::trace!(generation = elapsed.generation, "Dropping stale retry timer");
                }
            }
        }
    }

    controller.disconnect();
    tracing::debug!("Subscription stopped");
}
