//! Capture source contract.
//!
//! A source pushes encoded images (JPEG) only when screen content changes.
//! Every frame carries a [`FrameAck`] that must be handed back through
//! [`FrameSource::ack`] before the source may deliver its next frame. The
//! token is move-only, so a frame is acknowledged at most once, and the
//! recorder acknowledges each one it receives.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use dolly_common::{DollyError, DollyResult};
use tokio::sync::mpsc;

/// Acknowledgement token for one delivered frame.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FrameAck {
    id: u64,
}

impl FrameAck {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

/// A frame delivered by a capture source.
#[derive(Debug)]
pub struct SourceFrame {
    /// Encoded image bytes.
    pub data: Arc<[u8]>,
    pub ack: FrameAck,
}

/// Push-based capture source.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Begin delivering frames into `frames`.
    async fn start(&mut self, frames: mpsc::Sender<SourceFrame>) -> DollyResult<()>;

    /// Stop emitting until [`FrameSource::resume`].
    async fn pause(&mut self) -> DollyResult<()>;

    async fn resume(&mut self) -> DollyResult<()>;

    /// Acknowledge a received frame.
    async fn ack(&mut self, ack: FrameAck) -> DollyResult<()>;

    /// Stop delivering frames for good.
    async fn detach(&mut self) -> DollyResult<()>;
}

/// Control messages a [`ChannelSource`] reports to its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceControl {
    Started,
    Pause,
    Resume,
    Ack(u64),
    Detach,
}

/// Frame source fed from outside through a [`ChannelSourceHandle`].
///
/// Embedders with their own capture mechanism push frames through the
/// handle and follow the control stream to honor pause/resume/ack.
pub struct ChannelSource {
    sender: Arc<Mutex<Option<mpsc::Sender<SourceFrame>>>>,
    controls: mpsc::UnboundedSender<SourceControl>,
}

/// Producer side of a [`ChannelSource`].
pub struct ChannelSourceHandle {
    sender: Arc<Mutex<Option<mpsc::Sender<SourceFrame>>>>,
    controls: mpsc::UnboundedReceiver<SourceControl>,
    next_id: AtomicU64,
}

impl ChannelSource {
    pub fn new() -> (Self, ChannelSourceHandle) {
        let sender = Arc::new(Mutex::new(None));
        let (controls_tx, controls_rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Arc::clone(&sender),
                controls: controls_tx,
            },
            ChannelSourceHandle {
                sender,
                controls: controls_rx,
                next_id: AtomicU64::new(1),
            },
        )
    }

    fn notify(&self, control: SourceControl) {
        // The producer may have gone away; nothing to tell then.
        let _ = self.controls.send(control);
    }

    fn set_sender(&self, sender: Option<mpsc::Sender<SourceFrame>>) {
        let mut slot = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        *slot = sender;
    }
}

#[async_trait::async_trait]
impl FrameSource for ChannelSource {
    async fn start(&mut self, frames: mpsc::Sender<SourceFrame>) -> DollyResult<()> {
        self.set_sender(Some(frames));
        self.notify(SourceControl::Started);
        Ok(())
    }

    async fn pause(&mut self) -> DollyResult<()> {
        self.notify(SourceControl::Pause);
        Ok(())
    }

    async fn resume(&mut self) -> DollyResult<()> {
        self.notify(SourceControl::Resume);
        Ok(())
    }

    async fn ack(&mut self, ack: FrameAck) -> DollyResult<()> {
        self.notify(SourceControl::Ack(ack.id()));
        Ok(())
    }

    async fn detach(&mut self) -> DollyResult<()> {
        self.set_sender(None);
        self.notify(SourceControl::Detach);
        Ok(())
    }
}

impl ChannelSourceHandle {
    /// Deliver a frame. Returns the id its acknowledgement will carry.
    pub async fn push(&self, data: impl Into<Arc<[u8]>>) -> DollyResult<u64> {
        let sender = {
            let slot = self.sender.lock().unwrap_or_else(|e| e.into_inner());
            slot.clone()
        };
        let sender =
            sender.ok_or_else(|| DollyError::capture("Capture source is not attached"))?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        sender
            .send(SourceFrame {
                data: data.into(),
                ack: FrameAck::new(id),
            })
            .await
            .map_err(|_| DollyError::capture("Recorder stopped receiving frames"))?;
        Ok(id)
    }

    /// Next control message, or `None` once the source is dropped.
    pub async fn next_control(&mut self) -> Option<SourceControl> {
        self.controls.recv().await
    }

    /// Wait until the frame with `id` is acknowledged, collecting the
    /// controls seen on the way (including the ack).
    pub async fn wait_for_ack(&mut self, id: u64) -> DollyResult<Vec<SourceControl>> {
        let mut seen = Vec::new();
        while let Some(control) = self.controls.recv().await {
            seen.push(control);
            if control == SourceControl::Ack(id) {
                return Ok(seen);
            }
        }
        Err(DollyError::capture(format!(
            "Capture source dropped before frame {id} was acknowledged"
        )))
    }

    /// Whether the recorder currently holds the frame sender.
    pub fn is_attached(&self) -> bool {
        let slot = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        slot.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_push_requires_start() {
        let (mut source, mut handle) = ChannelSource::new();
        assert!(handle.push(vec![1u8, 2, 3]).await.is_err());

        let (tx, mut rx) = mpsc::channel(4);
        source.start(tx).await.unwrap();
        assert_eq!(handle.next_control().await, Some(SourceControl::Started));

        let id = handle.push(vec![9u8]).await.unwrap();
        let frame = rx.recv().await.unwrap();
        assert_eq!(&*frame.data, &[9]);
        source.ack(frame.ack).await.unwrap();
        let seen = handle.wait_for_ack(id).await.unwrap();
        assert_eq!(seen, vec![SourceControl::Ack(id)]);
    }

    #[tokio::test]
    async fn test_detach_releases_sender() {
        let (mut source, handle) = ChannelSource::new();
        let (tx, mut rx) = mpsc::channel(1);
        source.start(tx).await.unwrap();
        assert!(handle.is_attached());
        source.detach().await.unwrap();
        assert!(!handle.is_attached());
        assert!(rx.recv().await.is_none());
    }
}
