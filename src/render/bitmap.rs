use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

use crate::error::MonitorError;
use crate::render::color::Rgba;
use crate::render::surface::{Anchor, DisplayList, DrawOp, Point, Surface};

fn rgba(c: Rgba) -> RGBAColor {
    RGBAColor(c.r, c.g, c.b, c.a as f64 / 255.0)
}

fn px(p: Point) -> (i32, i32) {
    (p.x.round() as i32, p.y.round() as i32)
}

/// Rasterizes a recorded paint with plotters and encodes it as PNG.
pub fn render_png(list: &DisplayList) -> Result<Vec<u8>, MonitorError> {
    let size = list.size();
    if size.is_empty() {
        return Err(MonitorError::Plot("canvas has no area".into()));
    }
    let (width, height) = (size.width.round() as u32, size.height.round() as u32);
    let mut buffer = vec![0u8; (width * height * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&BLACK)?;
        for op in list.ops() {
            draw_op(&root, op)?;
        }
        root.present()?;
    }
    encode_png(&buffer, width, height)
}

fn draw_op<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    op: &DrawOp,
) -> Result<(), DrawingAreaErrorKind<DB::ErrorType>> {
    match op {
        DrawOp::FillRect(rect, color) => area.draw(&Rectangle::new(
            [px(rect.min), px(rect.max)],
            rgba(*color).filled(),
        )),
        DrawOp::StrokeRect(rect, width, color) => area.draw(&Rectangle::new(
            [px(rect.min), px(rect.max)],
            rgba(*color).stroke_width(width.round().max(1.0) as u32),
        )),
        DrawOp::Polyline(points, width, color) => area.draw(&PathElement::new(
            points.iter().copied().map(px).collect::<Vec<_>>(),
            rgba(*color).stroke_width(width.round().max(1.0) as u32),
        )),
        DrawOp::FillConvex(points, color) => area.draw(&Polygon::new(
            points.iter().copied().map(px).collect::<Vec<_>>(),
            rgba(*color).filled(),
        )),
        DrawOp::Circle(center, radius, color) => area.draw(&Circle::new(
            px(*center),
            radius.round() as i32,
            rgba(*color).filled(),
        )),
        DrawOp::Text {
            at,
            anchor,
            size,
            text,
            color,
        } => {
            let h = match anchor {
                Anchor::LeftCenter => HPos::Left,
                Anchor::Center => HPos::Center,
                Anchor::RightCenter => HPos::Right,
            };
            let style = ("sans-serif", *size as f64)
                .into_font()
                .color(&rgba(*color))
                .pos(Pos::new(h, VPos::Center));
            area.draw(&Text::new(text.as_str(), px(*at), style))
        }
    }
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MonitorError> {
    let image = ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MonitorError::Plot("failed to allocate image buffer".into()))?;
    let mut output = Vec::new();
    DynamicImage::ImageRgb8(image).write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
    Ok(output)
}
