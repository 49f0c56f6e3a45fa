#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameToken(u64);

/// "Run this on the next paintable frame" / "never mind".
pub trait FrameScheduler {
    fn request(&mut self) -> FrameToken;
    fn cancel(&mut self, token: FrameToken);
}

/// Frame requests serviced by the host's own frame loop: the GUI calls
/// `begin_frame` once per repaint and hands the fired tokens to each
/// pipeline.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next: u64,
    pending: Vec<FrameToken>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn begin_frame(&mut self) -> Vec<FrameToken> {
        std::mem::take(&mut self.pending)
    }
}

impl FrameScheduler for FrameQueue {
    fn request(&mut self) -> FrameToken {
        let token = FrameToken(self.next);
        self.next += 1;
        self.pending.push(token);
        token
    }

    fn cancel(&mut self, token: FrameToken) {
        self.pending.retain(|pending| *pending != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_requests_do_not_fire() {
        let mut queue = FrameQueue::new();
        let a = queue.request();
        let b = queue.request();
        queue.cancel(a);
        assert_eq!(queue.begin_frame(), vec![b]);
        assert!(!queue.has_pending());
        assert!(queue.begin_frame().is_empty());
    }
}
