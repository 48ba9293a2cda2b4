//! Single logic task owning the [`World`].
//!
//! Every mutation is a message sent over one `mpsc` channel and handled in
//! arrival order, so no cascade ever interleaves with another and no lock
//! is needed around the world. A `tokio::time::interval` posts
//! [`Message::Tick`] with the current [`Clock`] time; events drained after
//! each message are published on a `broadcast` channel.
//!
//! # Example
//!
//! ```ignore
//! use rs_interlock::config::RuntimeConfig;
//! use rs_interlock::services::{spawn, SystemClock};
//! use rs_interlock::World;
//!
//! let (handle, task) = spawn(World::default(), &RuntimeConfig::default(), SystemClock::new());
//! let mut events = handle.subscribe();
//!
//! // From a hardware bridge task:
//! handle.post(msg).await?;
//!
//! // From a session:
//! let outcome = handle.command(cmd).await?;
//! ```

use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::commands::{CommandOutcome, Message, WorldCommand};
use crate::config::RuntimeConfig;
use crate::error::TrackingError;
use crate::events::Event;
use crate::traits::{Clock, EventSink};
use crate::world::World;

#[cfg(feature = "serde")]
use crate::persistence::WorldSnapshot;

// ============================================================================
// Clock
// ============================================================================

/// Wall clock measured from creation.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    start_time: Instant,
}

impl SystemClock {
    /// Start counting from now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    #[inline]
    fn now_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

impl EventSink for broadcast::Sender<Event> {
    fn emit(&mut self, event: Event) {
        // No subscribers is fine.
        let _ = self.send(event);
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Failure talking to the logic task.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The logic task is gone.
    #[error("logic task stopped")]
    Stopped,

    /// The world refused the command.
    #[error(transparent)]
    Tracking(#[from] TrackingError),
}

type Query = Box<dyn FnOnce(&mut World) + Send>;

enum Request {
    Post(Message),
    Command {
        cmd: WorldCommand,
        reply: oneshot::Sender<Result<CommandOutcome, TrackingError>>,
    },
    Query(Query),
    Shutdown {
        reply: oneshot::Sender<World>,
    },
}

/// Cheap, cloneable access to the logic task.
#[derive(Clone, Debug)]
pub struct RuntimeHandle {
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Event>,
}

impl core::fmt::Debug for Request {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Request::Post(msg) => write!(f, "Post({})", msg.name()),
            Request::Command { cmd, .. } => write!(f, "Command({})", cmd.name()),
            Request::Query(_) => f.write_str("Query"),
            Request::Shutdown { .. } => f.write_str("Shutdown"),
        }
    }
}

impl RuntimeHandle {
    async fn send(&self, request: Request) -> Result<(), RuntimeError> {
        self.requests
            .send(request)
            .await
            .map_err(|_| RuntimeError::Stopped)
    }

    /// Queue a physical report (sensor, identification). Fire and forget.
    pub async fn post(&self, msg: Message) -> Result<(), RuntimeError> {
        self.send(Request::Post(msg)).await
    }

    /// Run an operator command and wait for its result.
    pub async fn command(&self, cmd: WorldCommand) -> Result<CommandOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Command { cmd, reply }).await?;
        Ok(rx.await.map_err(|_| RuntimeError::Stopped)??)
    }

    /// Run `f` on the logic task with exclusive access to the world.
    ///
    /// Used for layout editing and inspection. Events produced by `f` are
    /// published like any other.
    pub async fn with_world<R, F>(&self, f: F) -> Result<R, RuntimeError>
    where
        R: Send + 'static,
        F: FnOnce(&mut World) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let query: Query = Box::new(move |world| {
            let _ = reply.send(f(world));
        });
        self.send(Request::Query(query)).await?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }

    /// Copy of the current state.
    #[cfg(feature = "serde")]
    pub async fn snapshot(&self) -> Result<WorldSnapshot, RuntimeError> {
        self.with_world(|world| world.snapshot()).await
    }

    /// Receive every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Stop the logic task and get the world back.
    pub async fn shutdown(self) -> Result<World, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Shutdown { reply }).await?;
        rx.await.map_err(|_| RuntimeError::Stopped)
    }
}

// ============================================================================
// Logic task
// ============================================================================

enum Step {
    Request(Option<Request>),
    Tick,
}

/// Start the logic task.
///
/// Must be called from within a tokio runtime. The task ends on
/// [`RuntimeHandle::shutdown`] or when every handle has been dropped.
pub fn spawn<C>(world: World, config: &RuntimeConfig, clock: C) -> (RuntimeHandle, JoinHandle<()>)
where
    C: Clock + Send + 'static,
{
    let (requests, rx) = mpsc::channel(config.channel_capacity.max(1));
    let (events, _) = broadcast::channel(config.event_capacity.max(1));
    let tick = Duration::from_millis(u64::from(config.tick_interval_ms.max(1)));

    let handle = RuntimeHandle {
        requests,
        events: events.clone(),
    };
    let task = tokio::spawn(run(world, rx, events, tick, clock));
    (handle, task)
}

async fn run<C: Clock>(
    mut world: World,
    mut rx: mpsc::Receiver<Request>,
    mut events: broadcast::Sender<Event>,
    tick: Duration,
    clock: C,
) {
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(layout = world.config().name.as_str(), "logic task started");

    loop {
        let step = tokio::select! {
            request = rx.recv() => Step::Request(request),
            _ = interval.tick() => Step::Tick,
        };

        match step {
            Step::Request(None) => break,
            Step::Request(Some(Request::Post(msg))) => {
                let name = msg.name();
                if let Err(err) = world.dispatch(msg) {
                    tracing::warn!(message = name, %err, "posted message failed");
                }
            }
            Step::Request(Some(Request::Command { cmd, reply })) => {
                let result = world.dispatch(Message::Command(cmd));
                if let Err(err) = &result {
                    tracing::info!(%err, "command refused");
                }
                let _ = reply.send(result);
            }
            Step::Request(Some(Request::Query(query))) => {
                query(&mut world);
                world.settle();
            }
            Step::Request(Some(Request::Shutdown { reply })) => {
                world.flush_events(&mut events);
                tracing::info!("logic task stopped");
                let _ = reply.send(world);
                return;
            }
            Step::Tick => {
                let now_ms = clock.now_ms();
                if let Err(err) = world.dispatch(Message::Tick { now_ms }) {
                    tracing::warn!(%err, "tick failed");
                }
            }
        }

        world.flush_events(&mut events);
    }
    tracing::info!("logic task stopped: all handles dropped");
}
