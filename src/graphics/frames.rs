use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;

pub type FrameId = u64;

/// Schedules one-shot callbacks for the next display refresh.
pub trait FrameScheduler {
    fn request_frame(&self) -> FrameId;

    fn cancel_frame(&self, id: FrameId);
}

#[derive(Debug, Default)]
struct FrameQueue {
    next_id: FrameId,
    pending: BTreeSet<FrameId>,
}

/// Frame queue shared by every player in a window.
///
/// Requests only record an id; the event loop fires them on the next
/// redraw and each owner checks whether its id was among them.
#[derive(Debug, Clone, Default)]
pub struct AnimationFrames {
    queue: Rc<RefCell<FrameQueue>>,
}

impl AnimationFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.borrow().pending.len()
    }

    /// Take every pending request. Owners re-request if they want another frame.
    pub fn fire(&self) -> Vec<FrameId> {
        let mut queue = self.queue.borrow_mut();
        std::mem::take(&mut queue.pending).into_iter().collect()
    }

    /// Put back ids taken by a redraw that never reached its owners.
    pub fn requeue(&self, ids: &[FrameId]) {
        self.queue.borrow_mut().pending.extend(ids.iter().copied());
    }
}

impl FrameScheduler for AnimationFrames {
    fn request_frame(&self) -> FrameId {
        let mut queue = self.queue.borrow_mut();
        queue.next_id += 1;
        let id = queue.next_id;
        queue.pending.insert(id);
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        self.queue.borrow_mut().pending.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_and_fire() {
        let frames = AnimationFrames::new();
        let shared = frames.clone();

        let a = frames.request_frame();
        let b = shared.request_frame();
        assert_ne!(a, b);
        assert_eq!(frames.pending_count(), 2);

        assert_eq!(frames.fire(), vec![a, b]);
        assert!(!shared.has_pending());
    }

    #[test]
    fn test_cancel_removes_request() {
        let frames = AnimationFrames::new();
        let id = frames.request_frame();
        frames.cancel_frame(id);
        assert!(!frames.has_pending());
        assert!(frames.fire().is_empty());

        // cancelling twice is harmless
        frames.cancel_frame(id);
    }

    #[test]
    fn test_requeue_restores_fired_ids() {
        let frames = AnimationFrames::new();
        let id = frames.request_frame();
        let fired = frames.fire();

        frames.requeue(&fired);
        assert_eq!(frames.fire(), vec![id]);
    }
}
