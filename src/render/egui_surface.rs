use eframe::egui;
use egui::{Align2, Color32, FontId, Pos2, Shape, Stroke};

use crate::render::color::Rgba;
use crate::render::surface::{Anchor, Point, Rect, Size, Surface};

pub(crate) fn color32(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

/// Draws into an egui painter, offset to the allocated widget rect.
pub struct EguiSurface<'a> {
    painter: &'a egui::Painter,
    origin: Pos2,
    size: Size,
}

impl<'a> EguiSurface<'a> {
    pub fn new(painter: &'a egui::Painter, rect: egui::Rect) -> Self {
        Self {
            painter,
            origin: rect.min,
            size: Size::new(rect.width(), rect.height()),
        }
    }

    fn pos(&self, p: Point) -> Pos2 {
        self.origin + egui::vec2(p.x, p.y)
    }

    fn rect(&self, r: Rect) -> egui::Rect {
        egui::Rect::from_min_max(self.pos(r.min), self.pos(r.max))
    }
}

impl Surface for EguiSurface<'_> {
    fn size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.painter.rect_filled(self.rect(rect), 0.0, color32(color));
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) {
        self.painter
            .rect_stroke(self.rect(rect), 0.0, Stroke::new(width, color32(color)));
    }

    fn polyline(&mut self, points: &[Point], width: f32, color: Rgba) {
        let points = points.iter().map(|&p| self.pos(p)).collect();
        self.painter
            .add(Shape::line(points, Stroke::new(width, color32(color))));
    }

    fn fill_convex(&mut self, points: &[Point], color: Rgba) {
        let points = points.iter().map(|&p| self.pos(p)).collect();
        self.painter
            .add(Shape::convex_polygon(points, color32(color), Stroke::NONE));
    }

    fn circle(&mut self, center: Point, radius: f32, color: Rgba) {
        self.painter
            .circle_filled(self.pos(center), radius, color32(color));
    }

    fn text(&mut self, at: Point, anchor: Anchor, size: f32, text: &str, color: Rgba) {
        let align = match anchor {
            Anchor::LeftCenter => Align2::LEFT_CENTER,
            Anchor::Center => Align2::CENTER_CENTER,
            Anchor::RightCenter => Align2::RIGHT_CENTER,
        };
        self.painter.text(
            self.pos(at),
            align,
            text,
            FontId::proportional(size),
            color32(color),
        );
    }
}
