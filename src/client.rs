// file: src/client.rs
// description: transport abstraction, websocket connector and the per-instance driver task
// reference: https://docs.rs/tokio-tungstenite/latest/tokio_tungstenite/

use crate::{
    error::RadarError,
    events::{ChannelEvent, EventSender},
    machine::{ConnectionMachine, FrameOutcome, Transition},
    monitoring,
    view::{ConsumerSnapshot, RadarView},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::{sync::Arc, time::Duration};
use tokio::{
    net::TcpStream,
    sync::watch,
    task::JoinHandle,
    time::{sleep, timeout},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

/// Opens transports to an opaque connection target.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    async fn connect(&self, target: &str) -> Result<Self::Conn, RadarError>;
}

/// One established transport.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Next text payload, or `None` once the transport has closed.
    async fn next_frame(&mut self) -> Option<Result<String, RadarError>>;

    async fn close(&mut self);
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsConnection {
    stream: WsStream,
}

#[async_trait]
impl Connector for WsConnector {
    type Conn = WsConnection;

    async fn connect(&self, target: &str) -> Result<WsConnection, RadarError> {
        let url = Url::parse(target)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(RadarError::UnsupportedScheme(url.scheme().to_string()));
        }

        let (stream, _) = connect_async(target).await.map_err(|e| {
            error!("Failed to connect to WebSocket {}: {}", target, e);
            RadarError::WebSocketError(e)
        })?;
        info!("WebSocket connection established to {}", target);
        Ok(WsConnection { stream })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn next_frame(&mut self) -> Option<Result<String, RadarError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    trace!("Received text message: {}", text.as_str());
                    return Some(Ok(text.as_str().to_owned()));
                }
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => warn!("Dropping non-UTF-8 binary message of {} bytes", data.len()),
                },
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {
                    trace!("Skipping control frame");
                }
                Ok(Message::Close(frame)) => {
                    debug!("Received close frame: {:?}", frame);
                    return None;
                }
                Err(e) => return Some(Err(RadarError::WebSocketError(e))),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("WebSocket close handshake failed: {}", e);
        }
    }
}

/// Tunables shared by every instance a binder creates.
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    pub reconnect_delay: Duration,
    pub max_attempts: u32,
    pub connect_timeout: Duration,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            max_attempts: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Owner's handle to one running driver task.
pub struct ChannelHandle {
    cancel: CancellationToken,
    task: JoinHandle<RadarView>,
}

impl ChannelHandle {
    /// Cancels the instance and waits until its transport is closed and its
    /// timer dropped. Returns the accumulated view.
    pub async fn teardown(self) -> Option<RadarView> {
        self.cancel.cancel();
        match self.task.await {
            Ok(view) => Some(view),
            Err(e) => {
                error!("Radar channel task ended abnormally: {}", e);
                None
            }
        }
    }

    /// Signals cancellation without waiting.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Runs `machine` on its own task until cancelled.
pub fn spawn_channel<C: Connector>(
    connector: Arc<C>,
    machine: ConnectionMachine,
    connect_timeout: Duration,
    publisher: Arc<watch::Sender<ConsumerSnapshot>>,
    events: Option<EventSender>,
) -> ChannelHandle {
    let cancel = CancellationToken::new();
    let driver = Driver {
        connector,
        connect_timeout,
        publisher,
        events,
        cancel: cancel.clone(),
    };
    let task = tokio::spawn(driver.run(machine));
    ChannelHandle { cancel, task }
}

struct Driver<C: Connector> {
    connector: Arc<C>,
    connect_timeout: Duration,
    publisher: Arc<watch::Sender<ConsumerSnapshot>>,
    events: Option<EventSender>,
    cancel: CancellationToken,
}

impl<C: Connector> Driver<C> {
    async fn run(self, mut machine: ConnectionMachine) -> RadarView {
        let key = machine.key().to_string();
        let target = machine.target().to_owned();
        let mut conn: Option<C::Conn> = None;

        let mut next = machine.open();
        self.publish(&machine);

        'run: loop {
            next = match next {
                Transition::Connect { attempt } => {
                    self.emit(ChannelEvent::Connecting {
                        key: key.clone(),
                        target: target.clone(),
                        attempt,
                    });
                    let outcome = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break 'run,
                        res = timeout(self.connect_timeout, self.connector.connect(&target)) => res,
                    };
                    match outcome {
                        Ok(Ok(established)) => {
                            conn = Some(established);
                            machine.on_established()
                        }
                        Ok(Err(e)) => machine.on_transport_failure(&e.to_string()),
                        Err(_) => {
                            let e = RadarError::Timeout {
                                secs: self.connect_timeout.as_secs(),
                            };
                            machine.on_transport_failure(&e.to_string())
                        }
                    }
                }
                Transition::Established => {
                    monitoring::CONNECTED_GAUGE.set(1.0);
                    self.emit(ChannelEvent::Connected {
                        key: key.clone(),
                        instance_id: machine.instance_id().to_owned(),
                    });

                    let reason = match conn.as_mut() {
                        Some(active) => loop {
                            let frame = tokio::select! {
                                biased;
                                _ = self.cancel.cancelled() => break 'run,
                                frame = active.next_frame() => frame,
                            };
                            match frame {
                                Some(Ok(text)) => {
                                    self.handle_frame(&mut machine, &key, &text);
                                    self.publish(&machine);
                                }
                                Some(Err(e)) => break e.to_string(),
                                None => break RadarError::ConnectionClosed.to_string(),
                            }
                        },
                        None => RadarError::ConnectionClosed.to_string(),
                    };

                    if let Some(mut closed) = conn.take() {
                        closed.close().await;
                    }
                    monitoring::CONNECTED_GAUGE.set(0.0);
                    self.emit(ChannelEvent::ConnectionLost {
                        key: key.clone(),
                        reason: reason.clone(),
                    });
                    machine.on_transport_failure(&reason)
                }
                Transition::Reconnect { attempt, delay } => {
                    monitoring::RECONNECT_COUNTER.increment(1);
                    warn!(
                        "Reconnecting {} in {}ms (attempt {})",
                        key,
                        delay.as_millis(),
                        attempt
                    );
                    self.emit(ChannelEvent::Reconnecting {
                        key: key.clone(),
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                    });
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break 'run,
                        _ = sleep(delay) => machine.on_reconnect_timer(),
                    }
                }
                Transition::Failed { attempts } => {
                    monitoring::FAILURE_COUNTER.increment(1);
                    error!(
                        "Maximum reconnection attempts ({}) reached for {}",
                        attempts, key
                    );
                    self.emit(ChannelEvent::Failed {
                        key: key.clone(),
                        attempts,
                    });
                    self.cancel.cancelled().await;
                    break 'run;
                }
                Transition::TornDown | Transition::Ignored => {
                    self.cancel.cancelled().await;
                    break 'run;
                }
            };
            self.publish(&machine);
        }

        if let Some(mut open) = conn.take() {
            open.close().await;
            monitoring::CONNECTED_GAUGE.set(0.0);
        }
        machine.teardown();
        self.emit(ChannelEvent::TornDown { key });
        machine.into_view()
    }

    fn handle_frame(&self, machine: &mut ConnectionMachine, key: &str, text: &str) {
        monitoring::FRAMES_RECEIVED_COUNTER.increment(1);
        match machine.on_frame(text) {
            FrameOutcome::Merged { facets } => {
                self.emit(ChannelEvent::Updated {
                    key: key.to_owned(),
                    facets,
                });
            }
            FrameOutcome::ServerError(message) => {
                monitoring::SERVER_ERROR_COUNTER.increment(1);
                self.emit(ChannelEvent::ServerError {
                    key: key.to_owned(),
                    message,
                });
            }
            FrameOutcome::Malformed(reason) => {
                monitoring::MALFORMED_FRAME_COUNTER.increment(1);
                self.emit(ChannelEvent::MalformedFrame {
                    key: key.to_owned(),
                    reason,
                });
            }
            FrameOutcome::Ignored => {}
        }
    }

    fn publish(&self, machine: &ConnectionMachine) {
        // a torn-down instance never writes again
        if machine.is_alive() {
            self.publisher.send_replace(machine.snapshot());
        }
    }

    fn emit(&self, event: ChannelEvent) {
        if let Some(events) = &self.events
            && let Err(e) = events.try_send(event)
        {
            debug!("Dropping channel event: {}", e);
        }
    }
}
