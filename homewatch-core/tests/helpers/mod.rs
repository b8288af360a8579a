//! Shared fixtures for the integration tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use homewatch_core::{Notifier, NotifyError, Transport, TransportError, TransportMessage};

/// A notifier that records every alert it is asked to deliver.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    delivered: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.delivered
            .lock()
            .unwrap()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

/// A transport the test feeds through an mpsc sender.
pub struct ScriptedTransport {
    feed: Mutex<Option<mpsc::Receiver<TransportMessage>>>,
    disconnected: Arc<AtomicBool>,
}

impl ScriptedTransport {
    pub fn new() -> (Box<Self>, mpsc::Sender<TransportMessage>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(16);
        let disconnected = Arc::new(AtomicBool::new(false));
        (
            Box::new(Self {
                feed: Mutex::new(Some(rx)),
                disconnected: Arc::clone(&disconnected),
            }),
            tx,
            disconnected,
        )
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<TransportMessage>, TransportError> {
        self.feed
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| TransportError::Connect("already connected".to_string()))
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        self.disconnected.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Give spawned handler tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;
}
