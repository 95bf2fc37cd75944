//! Session driver: the one task per started session that owns the socket,
//! the retry timer and every listener invocation.
//!
//! The [`ConnectionMachine`] decides; this module carries out its effects
//! and feeds transport signals back into it.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::backoff::ReconnectBackoff;
use crate::client::ClientCore;
use crate::config::ConnectionConfig;
use crate::connection::{ConnectionMachine, ConnectionState, Effect, StartOutcome};
use crate::demux::EventDemux;
use crate::types::{FrameError, Notification};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on the close handshake when stopping.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Requests from the façade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Command {
    Stop,
    Ping,
}

/// The façade's side of a running session.
#[derive(Debug)]
pub(crate) struct SessionHandle {
    pub commands: mpsc::UnboundedSender<Command>,
    pub state: watch::Receiver<ConnectionState>,
    pub task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn is_finished(&self) -> bool {
        *self.state.borrow() == ConnectionState::Closed || self.task.is_finished()
    }
}

/// Start a session task.  The receiver settles once with how `start` ends.
pub(crate) fn spawn(
    conn: ConnectionConfig,
    backoff: ReconnectBackoff,
    demux: EventDemux,
    core: Arc<ClientCore>,
) -> (SessionHandle, oneshot::Receiver<StartOutcome>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
    let (start_tx, start_rx) = oneshot::channel();

    let session = Session {
        conn,
        machine: ConnectionMachine::new(backoff),
        demux,
        core,
        link: Link::Idle,
        commands: cmd_rx,
        commands_closed: false,
        state_tx,
        start_tx: Some(start_tx),
    };
    let task = tokio::spawn(session.run());

    (
        SessionHandle {
            commands: cmd_tx,
            state: state_rx,
            task,
        },
        start_rx,
    )
}

// ── Transport link ──────────────────────────────────────────────────

enum Link {
    Idle,
    Connecting(BoxFuture<'static, Result<Ws, String>>),
    Open(Box<Ws>),
    Waiting(Pin<Box<Sleep>>),
}

enum Input {
    Command(Option<Command>),
    Opened(Ws),
    ConnectFailed(String),
    Frame(Message),
    StreamError(String),
    StreamEnded,
    RetryDue,
}

/// Wait for the next signal from whatever the link is doing.  Cancel-safe:
/// in-flight work stays inside the link.
async fn next_signal(link: &mut Link) -> Input {
    match link {
        Link::Idle => std::future::pending().await,
        Link::Connecting(fut) => match fut.as_mut().await {
            Ok(ws) => Input::Opened(ws),
            Err(e) => Input::ConnectFailed(e),
        },
        Link::Open(ws) => match ws.next().await {
            Some(Ok(msg)) => Input::Frame(msg),
            Some(Err(e)) => Input::StreamError(e.to_string()),
            None => Input::StreamEnded,
        },
        Link::Waiting(sleep) => {
            sleep.as_mut().await;
            Input::RetryDue
        }
    }
}

// ── Session ─────────────────────────────────────────────────────────

struct Session {
    conn: ConnectionConfig,
    machine: ConnectionMachine,
    demux: EventDemux,
    core: Arc<ClientCore>,
    link: Link,
    commands: mpsc::UnboundedReceiver<Command>,
    commands_closed: bool,
    state_tx: watch::Sender<ConnectionState>,
    start_tx: Option<oneshot::Sender<StartOutcome>>,
}

impl Session {
    async fn run(mut self) {
        let effects = self.machine.start();
        self.apply(effects).await;

        while !self.machine.is_finished() {
            let input = tokio::select! {
                cmd = self.commands.recv(), if !self.commands_closed => Input::Command(cmd),
                signal = next_signal(&mut self.link) => signal,
            };
            let effects = self.on_input(input);
            self.apply(effects).await;
        }

        tracing::debug!("session finished");
    }

    fn on_input(&mut self, input: Input) -> Vec<Effect> {
        match input {
            Input::Command(Some(Command::Ping)) => self.machine.ping(),
            Input::Command(Some(Command::Stop)) => {
                tracing::info!(state = self.machine.state().as_str(), "stop requested");
                self.machine.stop()
            }
            Input::Command(None) => {
                // Every handle is gone; nobody can stop us later.
                self.commands_closed = true;
                self.machine.stop()
            }
            Input::Opened(ws) => {
                self.link = Link::Open(Box::new(ws));
                self.machine.on_opened()
            }
            Input::ConnectFailed(error) => {
                self.link = Link::Idle;
                tracing::warn!(error = %error, "event socket connect failed");
                self.fail(error)
            }
            Input::StreamError(error) => {
                self.link = Link::Idle;
                tracing::warn!(error = %error, "event socket error");
                self.fail(error)
            }
            Input::StreamEnded => {
                self.link = Link::Idle;
                tracing::info!("event socket closed by server");
                self.machine.on_closed()
            }
            Input::RetryDue => {
                self.link = Link::Idle;
                self.machine.on_retry_due()
            }
            Input::Frame(msg) => self.on_frame(msg),
        }
    }

    /// A failed transport reports an error and then its close.
    fn fail(&mut self, error: String) -> Vec<Effect> {
        let mut effects = self.machine.on_error(error);
        effects.extend(self.machine.on_closed());
        effects
    }

    fn on_frame(&mut self, msg: Message) -> Vec<Effect> {
        match msg {
            Message::Text(text) => self.deliver(&text),
            Message::Binary(bytes) => match String::from_utf8(bytes) {
                Ok(text) => self.deliver(&text),
                Err(_) => self.drop_frame(FrameError::NotUtf8),
            },
            Message::Pong(_) => return self.machine.on_pong(),
            Message::Close(frame) => {
                tracing::debug!(?frame, "close frame received");
            }
            Message::Ping(_) | Message::Frame(_) => {}
        }
        Vec::new()
    }

    fn deliver(&self, text: &str) {
        match self.demux.handle(text) {
            Ok(dispatch) => tracing::debug!(
                event_type = %dispatch.event_type,
                instances = dispatch.instances.len(),
                "event"
            ),
            Err(reason) => self.drop_frame(reason),
        }
    }

    fn drop_frame(&self, reason: FrameError) {
        tracing::warn!(reason = %reason, "dropping frame");
        self.core.hub.notify(&Notification::FrameDropped { reason });
    }

    async fn apply(&mut self, effects: Vec<Effect>) {
        let mut queue: VecDeque<Effect> = effects.into();

        while let Some(effect) = queue.pop_front() {
            match effect {
                Effect::Connect => {
                    let url = self.conn.events_url();
                    tracing::info!(url = %self.conn.redacted_events_url(), "connecting event socket");
                    self.link = Link::Connecting(Box::pin(async move {
                        tokio_tungstenite::connect_async(url)
                            .await
                            .map(|(ws, _response)| ws)
                            .map_err(|e| e.to_string())
                    }));
                }
                Effect::ScheduleReconnect(delay) => {
                    self.link = Link::Waiting(Box::pin(tokio::time::sleep(delay)));
                }
                Effect::CancelReconnect => {
                    if matches!(self.link, Link::Waiting(_)) {
                        self.link = Link::Idle;
                    }
                }
                Effect::Close => {
                    if let Link::Open(mut ws) = std::mem::replace(&mut self.link, Link::Idle) {
                        match tokio::time::timeout(CLOSE_TIMEOUT, ws.close(None)).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => tracing::debug!(error = %e, "close handshake failed"),
                            Err(_) => tracing::debug!("close handshake timed out"),
                        }
                    }
                    queue.extend(self.machine.on_closed());
                }
                Effect::SendPing => {
                    if let Link::Open(ws) = &mut self.link {
                        if let Err(e) = ws.send(Message::Ping(Vec::new())).await {
                            self.link = Link::Idle;
                            tracing::warn!(error = %e, "ping failed");
                            queue.extend(self.fail(e.to_string()));
                        }
                    }
                }
                Effect::Notify(notification) => self.notify(notification),
                Effect::SettleStart(outcome) => {
                    if let Some(tx) = self.start_tx.take() {
                        let _ = tx.send(outcome);
                    }
                }
            }
        }

        self.state_tx.send_replace(self.machine.state());
    }

    fn notify(&self, notification: Notification) {
        match &notification {
            Notification::Connected => tracing::info!("event socket connected"),
            Notification::Reconnecting {
                attempt,
                delay,
                error,
            } => tracing::warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = error.as_deref().unwrap_or("none"),
                "reconnect scheduled"
            ),
            Notification::MaxRetriesExceeded { attempts, error } => tracing::error!(
                attempts,
                error = error.as_deref().unwrap_or("none"),
                "reconnect attempts exhausted"
            ),
            Notification::Stopped => tracing::info!("event socket stopped"),
            _ => tracing::trace!(notification = notification.name(), "notification"),
        }
        self.core.hub.notify(&notification);
    }
}
