use finch_protocol::Frame;
use parking_lot::{Condvar, Mutex};

/// The single shared cell between the blocking reader thread and the
/// cooperative scheduler. Writers always win: a new frame overwrites
/// whatever is waiting, unread or not. Readers either take what's
/// there or miss.
pub struct Mailbox {
    slot: Mutex<Option<Frame>>,
    ready: Condvar,
}

impl Default for Mailbox {
    fn default() -> Self {
        Mailbox {
            slot: Mutex::new(None),
            ready: Condvar::new(),
        }
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Mailbox::default()
    }

    /// Called from the reader thread. Always succeeds; any
    /// previously-published, unread frame is dropped.
    pub fn publish(&self, frame: Frame) {
        let mut slot = self.slot.lock();
        *slot = Some(frame);
        self.ready.notify_one();
    }

    /// Non-blocking: returns `None` immediately if the mailbox is
    /// empty.
    pub fn take(&self) -> Option<Frame> {
        self.slot.lock().take()
    }

    /// Blocks the calling thread until a frame is available. Not used
    /// by the Coordinator's tick loop (which always calls `take()`
    /// non-blocking so the ticker never stalls on the camera), but
    /// available for synchronous callers such as `finch-cli`.
    pub fn take_blocking(&self) -> Frame {
        let mut slot = self.slot.lock();
        loop {
            if let Some(frame) = slot.take() {
                return frame;
            }
            self.ready.wait(&mut slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn frame(n: u64) -> Frame {
        Frame {
            payload: Arc::from(vec![0u8; 1]),
            metadata: finch_protocol::FrameMetadata {
                frame_number: n,
                width: 1,
                height: 1,
                pixel_format: "raw".into(),
                timestamp_nanos: 0,
                extra: Default::default(),
            },
        }
    }

    #[test]
    fn latest_wins_on_overwrite() {
        let mailbox = Mailbox::new();
        mailbox.publish(frame(1));
        mailbox.publish(frame(2));
        let taken = mailbox.take().unwrap();
        assert_eq!(taken.metadata.frame_number, 2);
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn take_on_empty_mailbox_is_none() {
        let mailbox = Mailbox::new();
        assert!(mailbox.take().is_none());
    }
}
