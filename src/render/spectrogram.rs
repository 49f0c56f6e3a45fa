use crate::render::color::{Channel, ColorMapper, Theme};
use crate::render::pipeline::Painter;
use crate::render::surface::{Anchor, Point, Rect, Surface};
use crate::stream::sample::{BAND_COUNT, BAND_LABELS};

const MARGIN_LEFT: f32 = 50.0;
const MARGIN_RIGHT: f32 = 25.0;
const MARGIN_TOP: f32 = 15.0;
const MARGIN_BOTTOM: f32 = 5.0;
const LEGEND_WIDTH: f32 = 14.0;

/// Band-intensity history: one column per sample, lowest band at the bottom.
pub struct SpectrogramPainter {
    channel: Channel,
    columns: usize,
}

impl SpectrogramPainter {
    pub fn new(channel: Channel, columns: usize) -> Self {
        Self {
            channel,
            columns: columns.max(1),
        }
    }
}

impl Painter for SpectrogramPainter {
    type Snapshot = Vec<Vec<f64>>;

    fn paint(
        &self,
        history: &Vec<Vec<f64>>,
        theme: Theme,
        colors: &mut ColorMapper,
        surface: &mut dyn Surface,
    ) {
        let size = surface.size();
        if size.is_empty() {
            return;
        }
        let palette = theme.palette();
        let plot_w = (size.width - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
        let plot_h = (size.height - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);

        surface.fill_rect(
            Rect::from_origin_size(0.0, 0.0, size.width, size.height),
            palette.background,
        );
        surface.fill_rect(
            Rect::from_origin_size(MARGIN_LEFT, MARGIN_TOP, plot_w, plot_h),
            palette.plot,
        );

        if history.is_empty() {
            surface.text(
                Point::new(MARGIN_LEFT + plot_w / 2.0, MARGIN_TOP + plot_h / 2.0),
                Anchor::Center,
                12.0,
                "Awaiting FFT data...",
                palette.muted_text,
            );
            return;
        }

        let visible = &history[history.len().saturating_sub(self.columns)..];
        let col_w = plot_w / self.columns as f32;
        let band_h = plot_h / BAND_COUNT as f32;
        for (col, bands) in visible.iter().enumerate() {
            let x = MARGIN_LEFT + col as f32 * col_w;
            for band in 0..BAND_COUNT {
                let y = MARGIN_TOP + plot_h - (band + 1) as f32 * band_h;
                // Short or missing entries paint as silence.
                let value = bands.get(band).copied().unwrap_or(0.0);
                surface.fill_rect(
                    Rect::from_origin_size(x, y, col_w + 1.0, band_h + 1.0),
                    colors.color(value, self.channel, theme),
                );
            }
        }

        for (band, label) in BAND_LABELS.iter().enumerate().step_by(2) {
            let y = MARGIN_TOP + plot_h - (band as f32 + 0.5) * band_h;
            surface.fill_rect(
                Rect::from_origin_size(0.0, y - 7.0, MARGIN_LEFT - 4.0, 14.0),
                palette.label_backdrop,
            );
            surface.text(
                Point::new(MARGIN_LEFT - 6.0, y),
                Anchor::RightCenter,
                10.0,
                label,
                palette.axis_text,
            );
        }

        let cursor_x = MARGIN_LEFT + visible.len() as f32 * col_w;
        surface.polyline(
            &[
                Point::new(cursor_x, MARGIN_TOP),
                Point::new(cursor_x, MARGIN_TOP + plot_h),
            ],
            2.0,
            self.channel.accent(),
        );

        let legend_x = size.width - LEGEND_WIDTH - 6.0;
        let legend_h = plot_h * 0.7;
        let legend_y = MARGIN_TOP + (plot_h - legend_h) / 2.0;
        let rows = legend_h.floor() as usize;
        for i in 0..rows {
            let intensity = (legend_h - i as f32) / legend_h * 100.0;
            surface.fill_rect(
                Rect::from_origin_size(legend_x, legend_y + i as f32, LEGEND_WIDTH, 1.0),
                colors.color(intensity as f64, self.channel, theme),
            );
        }
        surface.stroke_rect(
            Rect::from_origin_size(legend_x, legend_y, LEGEND_WIDTH, legend_h),
            1.0,
            palette.border,
        );
        let legend_mid = legend_x + LEGEND_WIDTH / 2.0;
        surface.text(
            Point::new(legend_mid, legend_y - 8.0),
            Anchor::Center,
            9.0,
            "Max",
            palette.axis_text,
        );
        surface.text(
            Point::new(legend_mid, legend_y + legend_h + 8.0),
            Anchor::Center,
            9.0,
            "Min",
            palette.axis_text,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::color::Rgba;
    use crate::render::surface::{DisplayList, DrawOp, Size};

    fn paint(history: Vec<Vec<f64>>, colors: &mut ColorMapper) -> DisplayList {
        let mut list = DisplayList::new(Size::new(400.0, 180.0));
        SpectrogramPainter::new(Channel::Filtered, 120).paint(&history, Theme::Dark, colors, &mut list);
        list
    }

    fn cell_colors(list: &DisplayList) -> Vec<Rgba> {
        // Skip the two background fills; cells come next.
        list.ops()
            .iter()
            .skip(2)
            .take_while(|op| matches!(op, DrawOp::FillRect(..)))
            .filter_map(|op| match op {
                DrawOp::FillRect(_, c) => Some(*c),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_history_shows_placeholder() {
        let list = paint(Vec::new(), &mut ColorMapper::new());
        assert!(list.ops().iter().any(|op| matches!(
            op,
            DrawOp::Text { text, .. } if text == "Awaiting FFT data..."
        )));
    }

    #[test]
    fn one_cell_per_band_per_column() {
        let mut colors = ColorMapper::new();
        let list = paint(vec![vec![50.0; BAND_COUNT]; 3], &mut colors);
        // 3 columns of cells plus the first label backdrop.
        assert_eq!(cell_colors(&list).len(), 3 * BAND_COUNT + 1);
        let labels: Vec<&str> = list
            .ops()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(labels, ["250", "1k", "2k", "3k", "8k", "Max", "Min"]);
    }

    #[test]
    fn short_band_rows_paint_as_zero() {
        let mut colors = ColorMapper::new();
        let zero = colors.color(0.0, Channel::Filtered, Theme::Dark);
        let list = paint(vec![vec![80.0, 80.0]], &mut colors);
        let cells = cell_colors(&list);
        assert_ne!(cells[0], zero);
        assert!(cells[2..BAND_COUNT].iter().all(|&c| c == zero));
    }
}
