//! In-memory adapter for driving boards and sessions in tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{ProtocolAdapter, WireMessage};
use crate::error::{MixerError, Result};

type Inbound = Result<WireMessage>;

#[derive(Default)]
pub struct MockAdapter {
    sent: Mutex<Vec<WireMessage>>,
    tx: Mutex<Option<mpsc::UnboundedSender<Inbound>>>,
    rx: tokio::sync::Mutex<Option<mpsc::UnboundedReceiver<Inbound>>>,
    target: Mutex<Option<String>>,
    fail_open: Mutex<Option<String>>,
    fail_send: AtomicBool,
    opens: AtomicUsize,
    closes: AtomicUsize,
}

impl MockAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue a message as if the console had sent it
    pub fn inject(&self, message: WireMessage) {
        self.push(Ok(message));
    }

    /// Queue a receive error (decode failure or transport loss)
    pub fn inject_error(&self, error: MixerError) {
        self.push(Err(error));
    }

    fn push(&self, item: Inbound) {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(item);
        }
    }

    pub fn sent(&self) -> Vec<WireMessage> {
        self.sent.lock().clone()
    }

    pub fn clear_sent(&self) {
        self.sent.lock().clear();
    }

    pub fn fail_next_open(&self, reason: &str) {
        *self.fail_open.lock() = Some(reason.to_string());
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.fail_send.store(fail, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.tx.lock().is_some()
    }

    pub fn target(&self) -> Option<String> {
        self.target.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProtocolAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, target: &str) -> Result<()> {
        if let Some(reason) = self.fail_open.lock().take() {
            return Err(MixerError::Connection(reason));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.tx.lock() = Some(tx);
        *self.rx.lock().await = Some(rx);
        *self.target.lock() = Some(target.to_string());
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) {
        // Dropping the sender ends any pending receive
        self.tx.lock().take();
        self.rx.lock().await.take();
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    async fn send(&self, message: &WireMessage) -> Result<()> {
        if !self.is_open() {
            return Err(MixerError::Connection("mock transport not open".into()));
        }
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(MixerError::Connection("mock send failure".into()));
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn receive(&self) -> Result<Option<WireMessage>> {
        let mut rx = self.rx.lock().await;
        let Some(rx) = rx.as_mut() else {
            return Ok(None);
        };
        match rx.recv().await {
            Some(item) => item.map(Some),
            None => Ok(None),
        }
    }
}
