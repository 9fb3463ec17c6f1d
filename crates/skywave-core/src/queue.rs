use crate::frame::AudioFrame;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Bounded hand-off queue between the network-receive boundary and the
/// pipeline driver.
///
/// Capacity is a small constant; when full, the OLDEST queued frame is
/// dropped so a stalled consumer resumes on fresh audio instead of replaying
/// a backlog. Frames are always popped in arrival order.
pub struct FrameQueue {
    inner: Mutex<Inner>,
    cond: Condvar,
    capacity: usize,
}

struct Inner {
    frames: VecDeque<AudioFrame>,
    closed: bool,
    dropped: u64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
                dropped: 0,
            }),
            cond: Condvar::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::error!("frame queue mutex poisoned; recovering");
            poisoned.into_inner()
        })
    }

    /// Enqueues a frame, evicting the oldest one when the queue is full.
    /// Frames pushed after `close` are discarded.
    pub fn push(&self, frame: AudioFrame) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        if inner.frames.len() >= self.capacity {
            inner.frames.pop_front();
            inner.dropped += 1;
            tracing::debug!(dropped = inner.dropped, "frame queue full, dropped oldest");
        }
        inner.frames.push_back(frame);
        drop(inner);
        self.cond.notify_one();
    }

    /// Blocks until a frame is available. Returns `None` once the queue is
    /// closed and drained.
    pub fn pop(&self) -> Option<AudioFrame> {
        let mut inner = self.lock();
        loop {
            if let Some(frame) = inner.frames.pop_front() {
                return Some(frame);
            }
            if inner.closed {
                return None;
            }
            inner = self
                .cond
                .wait(inner)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    pub fn close(&self) {
        self.lock().closed = true;
        self.cond.notify_all();
    }

    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: f32) -> AudioFrame {
        AudioFrame::new(vec![tag], 1, 12_000)
    }

    #[test]
    fn frames_pop_in_arrival_order() {
        let q = FrameQueue::new(4);
        for i in 0..3 {
            q.push(frame(i as f32));
        }
        q.close();
        assert_eq!(q.pop().unwrap().samples, [0.0]);
        assert_eq!(q.pop().unwrap().samples, [1.0]);
        assert_eq!(q.pop().unwrap().samples, [2.0]);
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest_first() {
        let q = FrameQueue::new(2);
        q.push(frame(1.0));
        q.push(frame(2.0));
        q.push(frame(3.0));
        assert_eq!(q.dropped(), 1);
        q.close();
        assert_eq!(q.pop().unwrap().samples, [2.0]);
        assert_eq!(q.pop().unwrap().samples, [3.0]);
        assert!(q.pop().is_none());
    }

    #[test]
    fn push_after_close_is_discarded() {
        let q = FrameQueue::new(2);
        q.close();
        q.push(frame(1.0));
        assert!(q.is_empty());
        assert!(q.pop().is_none());
    }

    #[test]
    fn pop_wakes_on_cross_thread_push() {
        let q = std::sync::Arc::new(FrameQueue::new(2));
        let producer = {
            let q = q.clone();
            std::thread::spawn(move || {
                q.push(frame(7.0));
                q.close();
            })
        };
        let got = q.pop();
        producer.join().unwrap();
        assert_eq!(got.unwrap().samples, [7.0]);
        assert!(q.pop().is_none());
    }
}
