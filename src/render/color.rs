use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    Raw,
    Filtered,
}

impl Channel {
    pub fn label(self) -> &'static str {
        match self {
            Channel::Raw => "RAW",
            Channel::Filtered => "FILTERED",
        }
    }

    /// Trace/accent colour for this channel.
    pub fn accent(self) -> Rgba {
        match self {
            Channel::Raw => Rgba::rgb(0x60, 0xa5, 0xfa),
            Channel::Filtered => Rgba::rgb(0xf4, 0x72, 0xb6),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

/// Surface colours shared by every painter.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub background: Rgba,
    pub plot: Rgba,
    pub grid: Rgba,
    pub axis_text: Rgba,
    pub muted_text: Rgba,
    pub value_text: Rgba,
    pub border: Rgba,
    pub label_backdrop: Rgba,
}

impl Theme {
    pub fn palette(self) -> Palette {
        match self {
            Theme::Dark => Palette {
                background: Rgba::rgb(0x0f, 0x17, 0x2a),
                plot: Rgba::rgb(0x1e, 0x29, 0x3b),
                grid: Rgba::rgb(0x33, 0x41, 0x55),
                axis_text: Rgba::rgb(0x94, 0xa3, 0xb8),
                muted_text: Rgba::rgb(0x64, 0x74, 0x8b),
                value_text: Rgba::rgb(0xf1, 0xf5, 0xf9),
                border: Rgba::rgb(0x47, 0x55, 0x69),
                label_backdrop: Rgba::rgb(0x0f, 0x17, 0x2a).with_alpha(230),
            },
            Theme::Light => Palette {
                background: Rgba::rgb(0xf8, 0xfa, 0xfc),
                plot: Rgba::rgb(0xff, 0xff, 0xff),
                grid: Rgba::rgb(0xcb, 0xd5, 0xe1),
                axis_text: Rgba::rgb(0x47, 0x55, 0x69),
                muted_text: Rgba::rgb(0x47, 0x55, 0x69),
                value_text: Rgba::rgb(0x0f, 0x17, 0x2a),
                border: Rgba::rgb(0xcb, 0xd5, 0xe1),
                label_backdrop: Rgba::rgb(0xf8, 0xfa, 0xfc).with_alpha(230),
            },
        }
    }
}

pub const GAMMA: f64 = 0.75;
pub const CACHE_LIMIT: usize = 1000;

/// Start colour and per-segment delta for each quarter of the gradient.
type Gradient = [([f32; 3], [f32; 3]); 4];

const DARK_RAW: Gradient = [
    ([0.0, 0.0, 0.0], [0.0, 60.0, 120.0]),
    ([0.0, 60.0, 120.0], [40.0, 80.0, 100.0]),
    ([40.0, 140.0, 220.0], [100.0, 60.0, 35.0]),
    ([140.0, 200.0, 255.0], [100.0, 55.0, 0.0]),
];
const DARK_FILTERED: Gradient = [
    ([0.0, 0.0, 0.0], [80.0, 0.0, 60.0]),
    ([80.0, 0.0, 60.0], [100.0, 40.0, 100.0]),
    ([180.0, 40.0, 160.0], [50.0, 80.0, 60.0]),
    ([230.0, 120.0, 220.0], [0.0, 100.0, 35.0]),
];
const LIGHT_RAW: Gradient = [
    ([200.0, 220.0, 255.0], [30.0, 25.0, 0.0]),
    ([100.0, 150.0, 255.0], [100.0, 80.0, 0.0]),
    ([30.0, 100.0, 255.0], [100.0, 100.0, 0.0]),
    ([30.0, 50.0, 255.0], [30.0, 100.0, 0.0]),
];
const LIGHT_FILTERED: Gradient = [
    ([255.0, 220.0, 240.0], [0.0, 20.0, 15.0]),
    ([255.0, 150.0, 200.0], [0.0, 80.0, 55.0]),
    ([255.0, 100.0, 150.0], [0.0, 100.0, 100.0]),
    ([255.0, 50.0, 100.0], [0.0, 100.0, 100.0]),
];

fn gradient(channel: Channel, theme: Theme) -> &'static Gradient {
    match (theme, channel) {
        (Theme::Dark, Channel::Raw) => &DARK_RAW,
        (Theme::Dark, Channel::Filtered) => &DARK_FILTERED,
        (Theme::Light, Channel::Raw) => &LIGHT_RAW,
        (Theme::Light, Channel::Filtered) => &LIGHT_FILTERED,
    }
}

/// Intensity (0..=100) to colour through a gamma curve and a four segment
/// gradient. Results are memoised until the cache holds `CACHE_LIMIT`
/// entries; after that new colours are computed but not stored.
#[derive(Debug, Default)]
pub struct ColorMapper {
    cache: HashMap<(u32, Channel, Theme), Rgba>,
}

impl ColorMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn color(&mut self, intensity: f64, channel: Channel, theme: Theme) -> Rgba {
        let key = (quantize(intensity), channel, theme);
        if let Some(&hit) = self.cache.get(&key) {
            return hit;
        }
        let color = map_intensity(key.0 as f64 / 100.0, channel, theme);
        if self.cache.len() < CACHE_LIMIT {
            self.cache.insert(key, color);
        }
        color
    }

    #[cfg(test)]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

/// Hundredths of a percent, clamped. NaN reads as 0.
fn quantize(intensity: f64) -> u32 {
    if intensity.is_nan() {
        return 0;
    }
    (intensity.clamp(0.0, 100.0) * 100.0).round() as u32
}

fn map_intensity(percent: f64, channel: Channel, theme: Theme) -> Rgba {
    let level = (percent / 100.0).powf(GAMMA);
    let segment = ((level * 4.0) as usize).min(3);
    let t = ((level - segment as f64 * 0.25) / 0.25) as f32;
    let (start, delta) = gradient(channel, theme)[segment];
    let channel_value = |i: usize| (start[i] + t * delta[i]).floor().clamp(0.0, 255.0) as u8;
    Rgba::rgb(channel_value(0), channel_value(1), channel_value(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_of_each_gradient() {
        let mut mapper = ColorMapper::new();
        assert_eq!(mapper.color(0.0, Channel::Raw, Theme::Dark), Rgba::rgb(0, 0, 0));
        assert_eq!(
            mapper.color(100.0, Channel::Raw, Theme::Dark),
            Rgba::rgb(240, 255, 255)
        );
        assert_eq!(
            mapper.color(100.0, Channel::Filtered, Theme::Dark),
            Rgba::rgb(230, 220, 255)
        );
        assert_eq!(
            mapper.color(0.0, Channel::Filtered, Theme::Light),
            Rgba::rgb(255, 220, 240)
        );
    }

    #[test]
    fn applies_gamma_before_gradient() {
        let mut mapper = ColorMapper::new();
        // 50% ** 0.75 ~= 0.595: third segment, t ~= 0.38.
        let c = mapper.color(50.0, Channel::Raw, Theme::Dark);
        assert_eq!(c, Rgba::rgb(77, 162, 233));
    }

    #[test]
    fn out_of_range_is_clamped() {
        let mut mapper = ColorMapper::new();
        assert_eq!(
            mapper.color(-20.0, Channel::Raw, Theme::Dark),
            mapper.color(0.0, Channel::Raw, Theme::Dark)
        );
        assert_eq!(
            mapper.color(400.0, Channel::Raw, Theme::Light),
            mapper.color(100.0, Channel::Raw, Theme::Light)
        );
    }

    #[test]
    fn cache_stops_growing_at_limit() {
        let mut mapper = ColorMapper::new();
        for i in 0..3000 {
            mapper.color(i as f64 / 30.0, Channel::Filtered, Theme::Dark);
        }
        assert_eq!(mapper.cached(), CACHE_LIMIT);
        // Uncached lookups still agree with a fresh mapper.
        let late = mapper.color(99.99, Channel::Filtered, Theme::Dark);
        assert_eq!(
            late,
            ColorMapper::new().color(99.99, Channel::Filtered, Theme::Dark)
        );
        assert_eq!(mapper.cached(), CACHE_LIMIT);
    }

    #[test]
    fn keys_distinguish_channel_and_theme() {
        let mut mapper = ColorMapper::new();
        mapper.color(42.0, Channel::Raw, Theme::Dark);
        mapper.color(42.001, Channel::Raw, Theme::Dark);
        assert_eq!(mapper.cached(), 1);
        mapper.color(42.0, Channel::Filtered, Theme::Dark);
        mapper.color(42.0, Channel::Raw, Theme::Light);
        assert_eq!(mapper.cached(), 3);
    }
}
