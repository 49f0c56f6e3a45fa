use crate::render::color::Rgba;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_origin_size(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            min: Point::new(x, y),
            max: Point::new(x + width, y + height),
        }
    }
}

/// Which point of the text box sits on the given position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Anchor {
    LeftCenter,
    Center,
    RightCenter,
}

/// Minimal 2D drawing target. Coordinates are logical pixels with the origin
/// at the top-left of the canvas.
pub trait Surface {
    fn size(&self) -> Size;
    fn fill_rect(&mut self, rect: Rect, color: Rgba);
    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba);
    fn polyline(&mut self, points: &[Point], width: f32, color: Rgba);
    /// `points` must describe a convex polygon.
    fn fill_convex(&mut self, points: &[Point], color: Rgba);
    fn circle(&mut self, center: Point, radius: f32, color: Rgba);
    fn text(&mut self, at: Point, anchor: Anchor, size: f32, text: &str, color: Rgba);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    FillRect(Rect, Rgba),
    StrokeRect(Rect, f32, Rgba),
    Polyline(Vec<Point>, f32, Rgba),
    FillConvex(Vec<Point>, Rgba),
    Circle(Point, f32, Rgba),
    Text {
        at: Point,
        anchor: Anchor,
        size: f32,
        text: String,
        color: Rgba,
    },
}

/// Recorded paint. egui redraws every frame, so a finished paint is kept
/// here and replayed until the next one replaces it.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    size: Size,
    ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn replay(&self, target: &mut dyn Surface) {
        for op in &self.ops {
            match op {
                DrawOp::FillRect(rect, color) => target.fill_rect(*rect, *color),
                DrawOp::StrokeRect(rect, width, color) => target.stroke_rect(*rect, *width, *color),
                DrawOp::Polyline(points, width, color) => target.polyline(points, *width, *color),
                DrawOp::FillConvex(points, color) => target.fill_convex(points, *color),
                DrawOp::Circle(center, radius, color) => target.circle(*center, *radius, *color),
                DrawOp::Text {
                    at,
                    anchor,
                    size,
                    text,
                    color,
                } => target.text(*at, *anchor, *size, text, *color),
            }
        }
    }
}

impl Surface for DisplayList {
    fn size(&self) -> Size {
        self.size
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) {
        self.ops.push(DrawOp::FillRect(rect, color));
    }

    fn stroke_rect(&mut self, rect: Rect, width: f32, color: Rgba) {
        self.ops.push(DrawOp::StrokeRect(rect, width, color));
    }

    fn polyline(&mut self, points: &[Point], width: f32, color: Rgba) {
        if points.len() >= 2 {
            self.ops.push(DrawOp::Polyline(points.to_vec(), width, color));
        }
    }

    fn fill_convex(&mut self, points: &[Point], color: Rgba) {
        if points.len() >= 3 {
            self.ops.push(DrawOp::FillConvex(points.to_vec(), color));
        }
    }

    fn circle(&mut self, center: Point, radius: f32, color: Rgba) {
        self.ops.push(DrawOp::Circle(center, radius, color));
    }

    fn text(&mut self, at: Point, anchor: Anchor, size: f32, text: &str, color: Rgba) {
        self.ops.push(DrawOp::Text {
            at,
            anchor,
            size,
            text: text.to_owned(),
            color,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_reproduces_ops() {
        let mut list = DisplayList::new(Size::new(10.0, 10.0));
        list.fill_rect(Rect::from_origin_size(0.0, 0.0, 5.0, 5.0), Rgba::rgb(1, 2, 3));
        list.polyline(&[Point::new(0.0, 0.0)], 1.0, Rgba::rgb(0, 0, 0));
        list.text(Point::new(1.0, 1.0), Anchor::Center, 12.0, "hi", Rgba::rgb(9, 9, 9));
        // Degenerate polyline is not recorded.
        assert_eq!(list.ops().len(), 2);

        let mut copy = DisplayList::new(list.size());
        list.replay(&mut copy);
        assert_eq!(copy, list);
    }
}
