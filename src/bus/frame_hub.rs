//! Frame hub (§4.I): the capture producer publishes the latest frame;
//! consumers either pull `get_latest()` or register a listener. Built on
//! `tokio::sync::watch`, whose defining property — only the most recent
//! value is ever retained, intermediate values are silently coalesced — is
//! exactly the hub's overwrite policy.

use crate::domain::frame::Frame;
use std::sync::Arc;
use tokio::sync::watch;

pub struct FrameHub {
    sender: watch::Sender<Option<Frame>>,
}

impl FrameHub {
    pub fn new() -> FrameHub {
        let (sender, _receiver) = watch::channel(None);
        FrameHub { sender }
    }

    pub fn publish(&self, frame: Frame) {
        self.sender.send_replace(Some(frame));
    }

    pub fn get_latest(&self) -> Option<Frame> {
        self.sender.borrow().clone()
    }

    /// Runs `listener` on every new frame, on its own spawned task. A
    /// listener that falls behind never backs up a queue: it always sees
    /// whatever was most recently published when it next runs.
    pub fn on_frame(self: &Arc<Self>, mut listener: impl FnMut(Frame) + Send + 'static) {
        let mut receiver = self.sender.subscribe();
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                if let Some(frame) = receiver.borrow_and_update().clone() {
                    listener(frame);
                }
            }
        });
    }
}

impl Default for FrameHub {
    fn default() -> FrameHub {
        FrameHub::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_bgr(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0], 2, 2)
    }

    #[test]
    fn get_latest_starts_empty_and_tracks_the_last_publish() {
        let hub = FrameHub::new();
        assert!(hub.get_latest().is_none());
        hub.publish(frame());
        assert!(hub.get_latest().is_some());
    }

    #[tokio::test]
    async fn listener_observes_a_published_frame() {
        let hub = Arc::new(FrameHub::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        hub.on_frame(move |_frame| {
            let _ = tx.send(());
        });

        hub.publish(frame());
        let received = tokio::time::timeout(std::time::Duration::from_secs(1), rx.recv()).await;
        assert!(received.is_ok());
    }
}
