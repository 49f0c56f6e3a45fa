use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

pub const CUTOFF_RANGE_HZ: (f64, f64) = (100.0, 8000.0);
pub const MIN_BAND_GAP_HZ: f64 = 100.0;
pub const BOOST_RANGE_PERCENT: (u32, u32) = (100, 300);
pub const UPDATE_RATE_RANGE_MS: (u32, u32) = (50, 500);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    Bypass,
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterKind {
    pub const ALL: [FilterKind; 5] = [
        FilterKind::Bypass,
        FilterKind::LowPass,
        FilterKind::BandPass,
        FilterKind::HighPass,
        FilterKind::Notch,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FilterKind::Bypass => "Bypass",
            FilterKind::LowPass => "Low-Pass",
            FilterKind::HighPass => "High-Pass",
            FilterKind::BandPass => "Band-Pass",
            FilterKind::Notch => "Notch",
        }
    }
}

/// User-chosen processing configuration forwarded to the device.
///
/// `cutoff_high_hz` is kept while editing other kinds so switching back to
/// band-pass restores it; it is only put on the wire for band-pass.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub kind: FilterKind,
    pub cutoff_hz: f64,
    pub cutoff_high_hz: Option<f64>,
    /// Gain in percent: 150 means 1.5x.
    pub voice_boost: u32,
    pub update_rate_ms: Option<u32>,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            kind: FilterKind::BandPass,
            cutoff_hz: 1200.0,
            cutoff_high_hz: Some(3400.0),
            voice_boost: 150,
            update_rate_ms: Some(200),
        }
    }
}

impl FilterSettings {
    /// Settings applied by the "reset" action.
    pub fn reset() -> Self {
        Self {
            kind: FilterKind::Bypass,
            ..Self::default()
        }
    }

    pub fn boost_multiplier(&self) -> f64 {
        self.voice_boost as f64 / 100.0
    }

    /// Boundary check run before anything is encoded. Inverted or too-narrow
    /// band-pass ranges are rejected rather than silently repaired.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let in_cutoff_range = |hz: f64| (CUTOFF_RANGE_HZ.0..=CUTOFF_RANGE_HZ.1).contains(&hz);
        if !in_cutoff_range(self.cutoff_hz) {
            return Err(MonitorError::CutoffOutOfRange(self.cutoff_hz));
        }
        if self.kind == FilterKind::BandPass {
            let high = self.cutoff_high_hz.ok_or(MonitorError::MissingHighCutoff)?;
            if !in_cutoff_range(high) {
                return Err(MonitorError::CutoffOutOfRange(high));
            }
            if high < self.cutoff_hz + MIN_BAND_GAP_HZ {
                return Err(MonitorError::BandTooNarrow {
                    low: self.cutoff_hz,
                    high,
                });
            }
        }
        if !(BOOST_RANGE_PERCENT.0..=BOOST_RANGE_PERCENT.1).contains(&self.voice_boost) {
            return Err(MonitorError::BoostOutOfRange(self.voice_boost));
        }
        if let Some(rate) = self.update_rate_ms {
            if !(UPDATE_RATE_RANGE_MS.0..=UPDATE_RATE_RANGE_MS.1).contains(&rate) {
                return Err(MonitorError::UpdateRateOutOfRange(rate));
            }
        }
        Ok(())
    }

    /// Short description for the sync-status badge, e.g. `Bandpass @ 1200Hz`.
    pub fn summary(&self) -> String {
        let wire = match self.kind {
            FilterKind::Bypass => "Bypass",
            FilterKind::LowPass => "Lowpass",
            FilterKind::HighPass => "Highpass",
            FilterKind::BandPass => "Bandpass",
            FilterKind::Notch => "Notch",
        };
        format!("{wire} @ {}Hz", self.cutoff_hz)
    }
}

/// Anything that can put a text frame on the wire.
pub trait CommandSink {
    fn send(&mut self, text: &str) -> bool;
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSettings {
    filter_type: FilterKind,
    cutoff_freq: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cutoff_freq_high: Option<f64>,
    voice_boost: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    update_rate: Option<u32>,
}

impl From<WireSettings> for FilterSettings {
    fn from(wire: WireSettings) -> Self {
        Self {
            kind: wire.filter_type,
            cutoff_hz: wire.cutoff_freq,
            cutoff_high_hz: wire.cutoff_freq_high,
            voice_boost: wire.voice_boost,
            update_rate_ms: wire.update_rate,
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    target: &'a str,
    settings: WireSettings,
}

/// Validates and serializes a `filter_settings` command for `target`.
pub fn encode_filter_command(
    settings: &FilterSettings,
    target: &str,
) -> Result<String, MonitorError> {
    settings.validate()?;
    let envelope = Envelope {
        kind: "filter_settings",
        target,
        settings: WireSettings {
            filter_type: settings.kind,
            cutoff_freq: settings.cutoff_hz,
            cutoff_freq_high: match settings.kind {
                FilterKind::BandPass => settings.cutoff_high_hz,
                _ => None,
            },
            voice_boost: settings.voice_boost,
            update_rate: settings.update_rate_ms,
        },
    };
    Ok(serde_json::to_string(&envelope)?)
}

#[derive(Deserialize)]
struct IncomingCommand {
    #[serde(rename = "type")]
    kind: String,
    settings: WireSettings,
}

/// Device-side parse of a `filter_settings` command. Anything else, or
/// settings that fail validation, yields `None`.
pub fn decode_filter_command(text: &str) -> Option<FilterSettings> {
    let command: IncomingCommand = serde_json::from_str(text).ok()?;
    if command.kind != "filter_settings" {
        return None;
    }
    let settings = FilterSettings::from(command.settings);
    settings.validate().ok()?;
    Some(settings)
}

/// Encodes and hands the command to `sink`. `Ok(false)` means the settings
/// were fine but the link was not open; delivery is not tracked further.
pub fn apply_filter(
    sink: &mut impl CommandSink,
    settings: &FilterSettings,
    target: &str,
) -> Result<bool, MonitorError> {
    let text = encode_filter_command(settings, target)?;
    Ok(sink.send(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    struct Recorder {
        open: bool,
        sent: Vec<String>,
    }

    impl CommandSink for Recorder {
        fn send(&mut self, text: &str) -> bool {
            if self.open {
                self.sent.push(text.to_owned());
            }
            self.open
        }
    }

    fn wire(settings: &FilterSettings) -> Value {
        serde_json::from_str(&encode_filter_command(settings, "esp32").unwrap()).unwrap()
    }

    #[test]
    fn band_pass_carries_high_cutoff() {
        let v = wire(&FilterSettings::default());
        assert_eq!(v["type"], "filter_settings");
        assert_eq!(v["target"], "esp32");
        assert_eq!(v["settings"]["filterType"], "bandpass");
        assert_eq!(v["settings"]["cutoffFreq"], 1200.0);
        assert_eq!(v["settings"]["cutoffFreqHigh"], 3400.0);
        assert_eq!(v["settings"]["voiceBoost"], 150);
        assert_eq!(v["settings"]["updateRate"], 200);
    }

    #[test]
    fn other_kinds_never_carry_high_cutoff() {
        for kind in FilterKind::ALL {
            if kind == FilterKind::BandPass {
                continue;
            }
            let settings = FilterSettings {
                kind,
                cutoff_high_hz: Some(5000.0),
                ..FilterSettings::default()
            };
            let v = wire(&settings);
            assert!(v["settings"].get("cutoffFreqHigh").is_none(), "{kind:?}");
        }
        assert_eq!(wire(&FilterSettings::reset())["settings"]["filterType"], "bypass");
    }

    #[test]
    fn kinds_use_wire_names() {
        let names: Vec<String> = FilterKind::ALL
            .iter()
            .map(|k| serde_json::to_value(k).unwrap().as_str().unwrap().to_owned())
            .collect();
        assert_eq!(names, ["bypass", "lowpass", "bandpass", "highpass", "notch"]);
    }

    #[test]
    fn rejects_inverted_and_narrow_band() {
        let inverted = FilterSettings {
            cutoff_hz: 3000.0,
            cutoff_high_hz: Some(1000.0),
            ..FilterSettings::default()
        };
        assert!(matches!(
            inverted.validate(),
            Err(MonitorError::BandTooNarrow { .. })
        ));
        let narrow = FilterSettings {
            cutoff_hz: 1000.0,
            cutoff_high_hz: Some(1050.0),
            ..FilterSettings::default()
        };
        assert!(narrow.validate().is_err());
        let missing = FilterSettings {
            cutoff_high_hz: None,
            ..FilterSettings::default()
        };
        assert!(matches!(
            missing.validate(),
            Err(MonitorError::MissingHighCutoff)
        ));
        // The same pair is fine once the kind no longer needs two cutoffs.
        let low_pass = FilterSettings {
            kind: FilterKind::LowPass,
            ..inverted
        };
        assert!(low_pass.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_values() {
        let s = FilterSettings {
            cutoff_hz: 50.0,
            ..FilterSettings::reset()
        };
        assert!(matches!(s.validate(), Err(MonitorError::CutoffOutOfRange(_))));
        let s = FilterSettings {
            voice_boost: 500,
            ..FilterSettings::reset()
        };
        assert!(matches!(s.validate(), Err(MonitorError::BoostOutOfRange(500))));
        let s = FilterSettings {
            update_rate_ms: Some(10),
            ..FilterSettings::reset()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn apply_reports_send_result() {
        let mut sink = Recorder {
            open: false,
            sent: Vec::new(),
        };
        assert!(!apply_filter(&mut sink, &FilterSettings::default(), "esp32").unwrap());
        assert!(sink.sent.is_empty());
        sink.open = true;
        assert!(apply_filter(&mut sink, &FilterSettings::default(), "esp32").unwrap());
        assert_eq!(sink.sent.len(), 1);
        let bad = FilterSettings {
            cutoff_high_hz: Some(1.0),
            ..FilterSettings::default()
        };
        assert!(apply_filter(&mut sink, &bad, "esp32").is_err());
        assert_eq!(sink.sent.len(), 1);
    }

    #[test]
    fn device_side_decode() {
        let text = encode_filter_command(&FilterSettings::default(), "esp32").unwrap();
        assert_eq!(decode_filter_command(&text), Some(FilterSettings::default()));
        let low = FilterSettings {
            kind: FilterKind::LowPass,
            ..FilterSettings::default()
        };
        let decoded = decode_filter_command(&encode_filter_command(&low, "esp32").unwrap());
        assert_eq!(decoded.map(|s| s.cutoff_high_hz), Some(None));
        assert_eq!(decode_filter_command(r#"{"type":"heartbeat"}"#), None);
    }

    #[test]
    fn summary_matches_badge_text() {
        assert_eq!(FilterSettings::default().summary(), "Bandpass @ 1200Hz");
        assert!((FilterSettings::default().boost_multiplier() - 1.5).abs() < 1e-9);
    }
}
