//! Scripted transport for driving radar channels without a network.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use radar_client::{
    RadarError,
    client::{Connection, Connector},
    view::ConsumerSnapshot,
};
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::{mpsc, watch},
    time::timeout,
};

pub const BTC_SNAPSHOT_FRAME: &str = r#"{"type":"market_radar_update","symbol":"BTCUSDT","timestamp":"2025-12-25T10:00:00","data":{"snapshot":{"priceChange":1.2,"volumeChange":25.0,"rsiShift":{"from":50.0,"to":55.0},"momentum":"rising","newsCount":0,"newsTopic":"Market","timestamp":"2025-12-25T10:00:00"},"anomalies":null,"tempo":null,"timeline":null},"errors":{"snapshot":null,"anomalies":null,"tempo":null,"timeline":null}}"#;

pub const BTC_ANOMALIES_FRAME: &str = r#"{"type":"market_radar_update","symbol":"BTCUSDT","timestamp":"2025-12-25T10:00:30","data":{"snapshot":null,"anomalies":{"alerts":[{"id":"volume_spike","type":"high","icon":"","title":"Volume Spike","description":"+240% vs 7-day average","context":"Z-score: 3.1","timestamp":"15 minutes ago"}],"timestamp":"2025-12-25T10:00:30"},"tempo":null,"timeline":null}}"#;

enum Script {
    Refuse,
    Hang,
    Accept(mpsc::UnboundedReceiver<String>),
}

/// Hands out connections in the order they were scripted; an empty script
/// refuses.
#[derive(Default)]
pub struct MockConnector {
    scripts: Mutex<VecDeque<Script>>,
    log: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    connects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queues an accepting connection; frames sent on the returned sender
    /// are delivered in order, dropping it closes the transport.
    pub fn accept(&self) -> mpsc::UnboundedSender<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.scripts.lock().unwrap().push_back(Script::Accept(rx));
        tx
    }

    pub fn refuse(&self) {
        self.scripts.lock().unwrap().push_back(Script::Refuse);
    }

    pub fn hang(&self) {
        self.scripts.lock().unwrap().push_back(Script::Hang);
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConnection;

    async fn connect(&self, target: &str) -> Result<MockConnection, RadarError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front().unwrap_or(Script::Refuse);
        match script {
            Script::Refuse => Err(RadarError::ConnectionRefused(target.to_string())),
            Script::Hang => std::future::pending().await,
            Script::Accept(frames) => {
                let now_live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_live.fetch_max(now_live, Ordering::SeqCst);
                self.log.lock().unwrap().push(format!("open {target}"));
                Ok(MockConnection {
                    target: target.to_string(),
                    frames,
                    log: Arc::clone(&self.log),
                    live: Arc::clone(&self.live),
                    closed: false,
                })
            }
        }
    }
}

pub struct MockConnection {
    target: String,
    frames: mpsc::UnboundedReceiver<String>,
    log: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    closed: bool,
}

impl MockConnection {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
            self.log.lock().unwrap().push(format!("close {}", self.target));
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn next_frame(&mut self) -> Option<Result<String, RadarError>> {
        self.frames.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.release();
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.release();
    }
}

pub fn target_for(key: &radar_client::types::ChannelKey) -> String {
    format!("mock://radar/{key}")
}

/// Waits (on the paused test clock) until `pred` holds for the published
/// snapshot.
pub async fn wait_until<F>(
    rx: &mut watch::Receiver<ConsumerSnapshot>,
    mut pred: F,
) -> ConsumerSnapshot
where
    F: FnMut(&ConsumerSnapshot) -> bool,
{
    let snapshot = timeout(Duration::from_secs(600), rx.wait_for(|s| pred(s)))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot publisher dropped");
    snapshot.clone()
}
