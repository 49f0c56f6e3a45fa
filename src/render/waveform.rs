use crate::render::color::{Channel, ColorMapper, Theme};
use crate::render::pipeline::Painter;
use crate::render::surface::{Anchor, Point, Rect, Surface};

const MARGIN_LEFT: f32 = 50.0;
const MARGIN_RIGHT: f32 = 15.0;
const MARGIN_TOP: f32 = 10.0;
const MARGIN_BOTTOM: f32 = 30.0;
const GRID_PERCENT: [f64; 3] = [0.0, 50.0, 100.0];
const FILL_ALPHA: u8 = 0x1c;

/// Scrolling volume trace (0..100 %), newest sample on the right edge.
pub struct WaveformPainter {
    channel: Channel,
    max_points: usize,
}

impl WaveformPainter {
    pub fn new(channel: Channel, max_points: usize) -> Self {
        Self {
            channel,
            max_points: max_points.max(2),
        }
    }
}

impl Painter for WaveformPainter {
    type Snapshot = Vec<f64>;

    fn paint(
        &self,
        data: &Vec<f64>,
        theme: Theme,
        _colors: &mut ColorMapper,
        surface: &mut dyn Surface,
    ) {
        let size = surface.size();
        if size.is_empty() {
            return;
        }
        let palette = theme.palette();
        let accent = self.channel.accent();
        let plot_w = (size.width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
        let plot_h = (size.height - MARGIN_BOTTOM - MARGIN_TOP).max(1.0);
        let baseline = MARGIN_TOP + plot_h;
        let y_of = |v: f64| baseline - (v.clamp(0.0, 100.0) as f32 / 100.0) * plot_h;

        surface.fill_rect(
            Rect::from_origin_size(0.0, 0.0, size.width, size.height),
            palette.background,
        );
        surface.fill_rect(
            Rect::from_origin_size(MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h),
            palette.plot,
        );

        for pct in GRID_PERCENT {
            let y = y_of(pct);
            surface.polyline(
                &[Point::new(MARGIN_LEFT, y), Point::new(MARGIN_LEFT + plot_w, y)],
                1.0,
                palette.grid,
            );
            surface.text(
                Point::new(MARGIN_LEFT - 8.0, y),
                Anchor::RightCenter,
                11.0,
                &format!("{pct}%"),
                palette.axis_text,
            );
        }
        surface.text(
            Point::new(MARGIN_LEFT + plot_w / 2.0, size.height - 10.0),
            Anchor::Center,
            10.0,
            "Time (seconds)",
            palette.axis_text,
        );

        if data.len() < 2 {
            surface.text(
                Point::new(MARGIN_LEFT + plot_w / 2.0, MARGIN_TOP + plot_h / 2.0),
                Anchor::Center,
                12.0,
                "Awaiting signal data...",
                palette.muted_text,
            );
            return;
        }

        let visible = &data[data.len().saturating_sub(self.max_points)..];
        let step = plot_w / self.max_points as f32;
        let start_x = MARGIN_LEFT + plot_w - visible.len() as f32 * step;
        let points: Vec<Point> = visible
            .iter()
            .enumerate()
            .map(|(i, &v)| Point::new(start_x + i as f32 * step, y_of(v)))
            .collect();

        let fill = accent.with_alpha(FILL_ALPHA);
        for pair in points.windows(2) {
            surface.fill_convex(
                &[
                    Point::new(pair[0].x, baseline),
                    pair[0],
                    pair[1],
                    Point::new(pair[1].x, baseline),
                ],
                fill,
            );
        }
        surface.polyline(&points, 2.0, accent);

        if let (Some(&last), Some(&value)) = (points.last(), visible.last()) {
            surface.circle(last, 5.0, accent);
            surface.text(
                Point::new((last.x + 10.0).min(size.width - 50.0), last.y),
                Anchor::LeftCenter,
                13.0,
                &format!("{value:.0}%"),
                palette.value_text,
            );
        }
    }
}
