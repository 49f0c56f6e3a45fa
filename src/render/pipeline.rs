use crate::render::color::{ColorMapper, Theme};
use crate::render::scheduler::{FrameScheduler, FrameToken};
use crate::render::surface::{DisplayList, Size, Surface};

/// Draws one snapshot of a visualization. Must be a pure function of its
/// inputs so that repainting the same snapshot at the same size produces
/// the same output.
pub trait Painter {
    type Snapshot: Clone + PartialEq;

    fn paint(
        &self,
        snapshot: &Self::Snapshot,
        theme: Theme,
        colors: &mut ColorMapper,
        surface: &mut dyn Surface,
    );
}

struct Painted<S> {
    snapshot: S,
    size: Size,
    theme: Theme,
}

/// Coalesces snapshots for one visualization into at most one paint per
/// frame and keeps the last paint for replay.
pub struct RenderPipeline<P: Painter> {
    painter: P,
    pending: Option<(FrameToken, P::Snapshot)>,
    painted: Option<Painted<P::Snapshot>>,
    output: DisplayList,
    paints: u64,
}

impl<P: Painter> RenderPipeline<P> {
    pub fn new(painter: P) -> Self {
        Self {
            painter,
            pending: None,
            painted: None,
            output: DisplayList::default(),
            paints: 0,
        }
    }

    /// Queues `snapshot` for the next frame, replacing any paint still
    /// waiting. Returns false when nothing needed scheduling.
    pub fn submit(&mut self, snapshot: P::Snapshot, scheduler: &mut dyn FrameScheduler) -> bool {
        if self.pending.is_none()
            && self
                .painted
                .as_ref()
                .map_or(false, |p| p.snapshot == snapshot)
        {
            return false;
        }
        if let Some((stale, _)) = self.pending.take() {
            scheduler.cancel(stale);
        }
        self.pending = Some((scheduler.request(), snapshot));
        true
    }

    /// Re-queues the last painted snapshot if the canvas size or theme moved
    /// since it was drawn.
    pub fn sync_view(&mut self, size: Size, theme: Theme, scheduler: &mut dyn FrameScheduler) {
        if self.pending.is_some() {
            return;
        }
        if let Some(p) = &self.painted {
            if p.size != size || p.theme != theme {
                self.pending = Some((scheduler.request(), p.snapshot.clone()));
            }
        }
    }

    /// Runs the pending paint if its token fired this frame. Returns whether
    /// the display list changed.
    pub fn on_frame(
        &mut self,
        fired: &[FrameToken],
        size: Size,
        theme: Theme,
        colors: &mut ColorMapper,
    ) -> bool {
        match &self.pending {
            Some((token, _)) if fired.contains(token) => {}
            _ => return false,
        }
        let Some((_, snapshot)) = self.pending.take() else {
            return false;
        };
        if let Some(p) = &self.painted {
            if p.snapshot == snapshot && p.size == size && p.theme == theme {
                return false;
            }
        }
        let mut list = DisplayList::new(size);
        self.painter.paint(&snapshot, theme, colors, &mut list);
        self.output = list;
        self.painted = Some(Painted {
            snapshot,
            size,
            theme,
        });
        self.paints += 1;
        true
    }

    /// Cancels any scheduled paint and forgets the last one.
    pub fn teardown(&mut self, scheduler: &mut dyn FrameScheduler) {
        if let Some((token, _)) = self.pending.take() {
            scheduler.cancel(token);
        }
        self.painted = None;
        self.output = DisplayList::default();
    }

    pub fn output(&self) -> &DisplayList {
        &self.output
    }

    #[cfg(test)]
    pub fn paint_count(&self) -> u64 {
        self.paints
    }

    /// Off-screen paint at an arbitrary size, e.g. for PNG export.
    pub fn render_offscreen(
        &self,
        snapshot: &P::Snapshot,
        size: Size,
        theme: Theme,
        colors: &mut ColorMapper,
    ) -> DisplayList {
        let mut list = DisplayList::new(size);
        self.painter.paint(snapshot, theme, colors, &mut list);
        list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::Rgba;
    use crate::render::scheduler::FrameQueue;
    use crate::render::surface::Rect;

    struct Bars;

    impl Painter for Bars {
        type Snapshot = Vec<u8>;

        fn paint(
            &self,
            snapshot: &Vec<u8>,
            _theme: Theme,
            _colors: &mut ColorMapper,
            surface: &mut dyn Surface,
        ) {
            for (i, &v) in snapshot.iter().enumerate() {
                let rect = Rect::from_origin_size(i as f32, 0.0, 1.0, v as f32);
                surface.fill_rect(rect, Rgba::rgb(v, v, v));
            }
        }
    }

    const SIZE: Size = Size::new(100.0, 50.0);

    fn frame(pipe: &mut RenderPipeline<Bars>, queue: &mut FrameQueue, size: Size) -> bool {
        let fired = queue.begin_frame();
        pipe.on_frame(&fired, size, Theme::Dark, &mut ColorMapper::new())
    }

    #[test]
    fn newer_data_replaces_pending_paint() {
        let mut queue = FrameQueue::new();
        let mut pipe = RenderPipeline::new(Bars);
        assert!(pipe.submit(vec![1], &mut queue));
        assert!(pipe.submit(vec![2, 3], &mut queue));
        assert!(frame(&mut pipe, &mut queue, SIZE));
        assert_eq!(pipe.paint_count(), 1);
        assert_eq!(pipe.output().ops().len(), 2);
        // Nothing left over for the next frame.
        assert!(!frame(&mut pipe, &mut queue, SIZE));
        assert_eq!(pipe.paint_count(), 1);
    }

    #[test]
    fn identical_snapshot_is_not_repainted() {
        let mut queue = FrameQueue::new();
        let mut pipe = RenderPipeline::new(Bars);
        pipe.submit(vec![4, 5], &mut queue);
        frame(&mut pipe, &mut queue, SIZE);
        assert!(!pipe.submit(vec![4, 5], &mut queue));
        assert!(!queue.has_pending());
        assert_eq!(pipe.paint_count(), 1);
    }

    #[test]
    fn resize_repaints_same_data() {
        let mut queue = FrameQueue::new();
        let mut pipe = RenderPipeline::new(Bars);
        pipe.submit(vec![7], &mut queue);
        frame(&mut pipe, &mut queue, SIZE);
        pipe.sync_view(SIZE, Theme::Dark, &mut queue);
        assert!(!queue.has_pending());
        let bigger = Size::new(200.0, 50.0);
        pipe.sync_view(bigger, Theme::Dark, &mut queue);
        assert!(frame(&mut pipe, &mut queue, bigger));
        assert_eq!(pipe.output().size(), bigger);
    }

    #[test]
    fn teardown_cancels_pending_paint() {
        let mut queue = FrameQueue::new();
        let mut pipe = RenderPipeline::new(Bars);
        pipe.submit(vec![1, 2], &mut queue);
        pipe.teardown(&mut queue);
        assert!(!queue.has_pending());
        assert!(!frame(&mut pipe, &mut queue, SIZE));
        assert!(pipe.output().is_empty());
    }

    #[test]
    fn painting_is_idempotent() {
        let pipe = RenderPipeline::new(Bars);
        let mut colors = ColorMapper::new();
        let a = pipe.render_offscreen(&vec![3, 1, 2], SIZE, Theme::Light, &mut colors);
        let b = pipe.render_offscreen(&vec![3, 1, 2], SIZE, Theme::Light, &mut colors);
        assert_eq!(a, b);
    }
}
