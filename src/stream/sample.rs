use chrono::{DateTime, Local, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Number of frequency buckets in `bands` / `bandsFiltered`.
pub const BAND_COUNT: usize = 9;
/// Display labels aligned positionally with the band arrays.
pub const BAND_LABELS: [&str; BAND_COUNT] =
    ["250", "500", "1k", "1.5k", "2k", "2.5k", "3k", "4k", "8k"];
/// Nominal centre frequency of each band, in Hz.
pub const BAND_CENTERS_HZ: [f32; BAND_COUNT] = [
    250.0, 500.0, 1000.0, 1500.0, 2000.0, 2500.0, 3000.0, 4000.0, 8000.0,
];

/// Device timestamps arrive either as ISO-8601 text or as epoch milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    EpochMillis(f64),
    Text(String),
}

impl Timestamp {
    /// Zero and empty stamps count as missing.
    fn is_set(&self) -> bool {
        match self {
            Timestamp::EpochMillis(ms) => *ms != 0.0,
            Timestamp::Text(text) => !text.is_empty(),
        }
    }
}

/// Optional fields with an unexpected JSON type read as absent instead of
/// failing the whole sample.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Non-numeric entries become 0 so band positions stay aligned.
fn lenient_bands<'de, D>(deserializer: D) -> Result<Option<Vec<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(items.iter().map(|v| v.as_f64().unwrap_or(0.0)).collect()),
        _ => None,
    })
}

/// One telemetry reading from the sensor device.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub source: String,
    pub volume: f64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub volume_filtered: Option<f64>,
    pub peak_to_peak: f64,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_bands",
        skip_serializing_if = "Option::is_none"
    )]
    pub bands: Option<Vec<f64>>,
    #[serde(
        default,
        deserialize_with = "lenient_bands",
        skip_serializing_if = "Option::is_none"
    )]
    pub bands_filtered: Option<Vec<f64>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub snr_raw: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub snr_filtered: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    #[serde(
        default,
        rename = "server_timestamp",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub server_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibrated: Option<Value>,
}

impl Sample {
    /// Checks the raw shape and, if accepted, parses and normalizes it.
    pub fn from_value(raw: &Value, expected_source: &str) -> Option<Sample> {
        if !validate(raw, expected_source) {
            return None;
        }
        match Sample::deserialize(raw) {
            Ok(sample) => Some(normalize(&sample)),
            Err(err) => {
                log::debug!("dropping telemetry with bad field types: {err}");
                None
            }
        }
    }

    /// Filtered volume, falling back to the raw channel when the device
    /// does not report one.
    pub fn volume_filtered_or_raw(&self) -> f64 {
        self.volume_filtered.unwrap_or(self.volume)
    }

    /// Device time when present, otherwise the server-assigned time.
    pub fn display_time(&self) -> String {
        match self.timestamp.as_ref().filter(|ts| ts.is_set()) {
            Some(ts) => format_timestamp(Some(ts)),
            None => format_timestamp(
                self.server_timestamp
                    .clone()
                    .map(Timestamp::Text)
                    .as_ref(),
            ),
        }
    }
}

/// Accepts only objects tagged with the expected device source that carry
/// numeric `volume` and `peakToPeak` fields.
pub fn validate(raw: &Value, expected_source: &str) -> bool {
    let Some(obj) = raw.as_object() else {
        return false;
    };
    obj.get("source").and_then(Value::as_str) == Some(expected_source)
        && obj.get("volume").map_or(false, Value::is_number)
        && obj.get("peakToPeak").map_or(false, Value::is_number)
}

/// Clamps every range-limited field. Pure: identical input gives identical
/// output, and a normalized sample is a fixed point.
pub fn normalize(sample: &Sample) -> Sample {
    Sample {
        volume: clamp_percent(sample.volume),
        volume_filtered: sample.volume_filtered.map(clamp_percent),
        peak_to_peak: sample.peak_to_peak.max(0.0),
        bands: sample.bands.as_deref().map(clamp_bands),
        bands_filtered: sample.bands_filtered.as_deref().map(clamp_bands),
        ..sample.clone()
    }
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

fn clamp_bands(bands: &[f64]) -> Vec<f64> {
    bands.iter().copied().map(clamp_percent).collect()
}

/// `HH:MM:SS`, or `-` when the timestamp is missing or unparseable.
pub fn format_timestamp(timestamp: Option<&Timestamp>) -> String {
    let formatted = match timestamp {
        Some(Timestamp::EpochMillis(ms)) if *ms > 0.0 && ms.is_finite() => {
            DateTime::from_timestamp_millis(*ms as i64)
                .map(|utc| utc.with_timezone(&Local).format("%H:%M:%S").to_string())
        }
        Some(Timestamp::Text(text)) if !text.is_empty() => parse_text_time(text),
        _ => None,
    };
    formatted.unwrap_or_else(|| "-".to_owned())
}

fn parse_text_time(text: &str) -> Option<String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Local).format("%H:%M:%S").to_string());
    }
    // The server stamps naive local time (no offset).
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.format("%H:%M:%S").to_string())
}

/// Mean intensity over all bands; 0 for a missing or empty array.
pub fn band_energy(bands: Option<&[f64]>) -> f64 {
    match bands {
        Some(b) if !b.is_empty() => b.iter().sum::<f64>() / b.len() as f64,
        _ => 0.0,
    }
}

/// Index of the strongest band (first one wins on ties).
pub fn dominant_band(bands: Option<&[f64]>) -> Option<usize> {
    let bands = bands?;
    let mut best: Option<(usize, f64)> = None;
    for (idx, &value) in bands.iter().enumerate() {
        if best.map_or(true, |(_, max)| value > max) {
            best = Some((idx, value));
        }
    }
    best.map(|(idx, _)| idx)
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AudioStats {
    pub avg_volume: f64,
    pub avg_volume_filtered: f64,
    pub max_volume: f64,
    pub min_volume: f64,
    pub avg_peak_to_peak: f64,
}

/// Aggregates over a set of samples. Filtered averages only count samples
/// that actually carry a filtered volume.
pub fn audio_stats<'a>(samples: impl IntoIterator<Item = &'a Sample>) -> AudioStats {
    let mut count = 0usize;
    let mut filtered_count = 0usize;
    let mut stats = AudioStats {
        min_volume: f64::MAX,
        max_volume: f64::MIN,
        ..AudioStats::default()
    };
    for s in samples {
        count += 1;
        stats.avg_volume += s.volume;
        stats.avg_peak_to_peak += s.peak_to_peak;
        stats.max_volume = stats.max_volume.max(s.volume);
        stats.min_volume = stats.min_volume.min(s.volume);
        if let Some(f) = s.volume_filtered {
            filtered_count += 1;
            stats.avg_volume_filtered += f;
        }
    }
    if count == 0 {
        return AudioStats::default();
    }
    stats.avg_volume /= count as f64;
    stats.avg_peak_to_peak /= count as f64;
    if filtered_count > 0 {
        stats.avg_volume_filtered /= filtered_count as f64;
    }
    stats
}

#[cfg(test)]
pub(crate) fn sample_with_volume(volume: f64) -> Sample {
    Sample {
        source: "esp32".into(),
        volume,
        volume_filtered: None,
        peak_to_peak: 0.0,
        min: None,
        max: None,
        avg: None,
        bands: None,
        bands_filtered: None,
        snr_raw: None,
        snr_filtered: None,
        timestamp: None,
        server_timestamp: None,
        client: None,
        calibrated: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_wrong_source_and_shapes() {
        assert!(!validate(
            &json!({"source": "other", "volume": 1, "peakToPeak": 1}),
            "esp32"
        ));
        assert!(!validate(&json!({"source": "esp32", "volume": "1", "peakToPeak": 1}), "esp32"));
        assert!(!validate(&json!({"source": "esp32", "volume": 1}), "esp32"));
        assert!(!validate(&json!([1, 2, 3]), "esp32"));
        assert!(!validate(&Value::Null, "esp32"));
        assert!(validate(&json!({"source": "esp32", "volume": 1, "peakToPeak": 0.5}), "esp32"));
    }

    #[test]
    fn clamps_scenario_volumes() {
        let out: Vec<f64> = [150.0, -5.0, 42.0]
            .into_iter()
            .map(|v| normalize(&sample_with_volume(v)).volume)
            .collect();
        assert_eq!(out, vec![100.0, 0.0, 42.0]);
    }

    #[test]
    fn clamps_bands_and_peak_to_peak() {
        let raw = json!({
            "source": "esp32",
            "volume": 50,
            "volumeFiltered": 120,
            "peakToPeak": -3,
            "bands": [-1, 0, 50, 100, 101, 7, 8, 9, 300],
            "bandsFiltered": [1, 2, 3, 4, 5, 6, 7, 8, -9],
            "snrRaw": -4.5,
            "min": -2000,
            "timestamp": 1700000000000u64
        });
        let s = Sample::from_value(&raw, "esp32").unwrap();
        assert_eq!(s.volume_filtered, Some(100.0));
        assert_eq!(s.peak_to_peak, 0.0);
        assert_eq!(
            s.bands.as_deref(),
            Some(&[0.0, 0.0, 50.0, 100.0, 100.0, 7.0, 8.0, 9.0, 100.0][..])
        );
        assert_eq!(s.bands_filtered.as_ref().unwrap()[8], 0.0);
        // Unbounded fields pass through untouched.
        assert_eq!(s.snr_raw, Some(-4.5));
        assert_eq!(s.min, Some(-2000.0));
        assert_eq!(s.timestamp, Some(Timestamp::EpochMillis(1.7e12)));
        assert!(s.avg.is_none());
    }

    #[test]
    fn normalize_is_a_fixed_point() {
        let raw = json!({
            "source": "esp32", "volume": 250, "peakToPeak": -1,
            "bands": [500, -500, 1, 2, 3, 4, 5, 6, 7]
        });
        let once = Sample::from_value(&raw, "esp32").unwrap();
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn odd_optional_fields_keep_the_sample() {
        let raw = json!({
            "source": "esp32", "volume": 50, "peakToPeak": 1,
            "calibrated": 1, "client": {"id": 7},
            "bands": [1, null, 3, "x", 5, 6, 7, 8, 900],
            "bandsFiltered": "none",
            "snrRaw": "high",
            "timestamp": true
        });
        assert!(validate(&raw, "esp32"));
        let s = Sample::from_value(&raw, "esp32").unwrap();
        assert_eq!(s.volume, 50.0);
        assert_eq!(s.calibrated, Some(json!(1)));
        assert_eq!(s.client, Some(json!({"id": 7})));
        assert_eq!(
            s.bands.as_deref(),
            Some(&[1.0, 0.0, 3.0, 0.0, 5.0, 6.0, 7.0, 8.0, 100.0][..])
        );
        assert!(s.bands_filtered.is_none());
        assert!(s.snr_raw.is_none());
        assert!(s.timestamp.is_none());
    }

    #[test]
    fn blank_device_time_falls_back_to_server_time() {
        let mut s = sample_with_volume(1.0);
        s.server_timestamp = Some("2024-05-01T13:04:05.123456".into());
        s.timestamp = Some(Timestamp::EpochMillis(0.0));
        assert_eq!(s.display_time(), "13:04:05");
        s.timestamp = Some(Timestamp::Text(String::new()));
        assert_eq!(s.display_time(), "13:04:05");
        s.timestamp = None;
        assert_eq!(s.display_time(), "13:04:05");
        s.server_timestamp = None;
        assert_eq!(s.display_time(), "-");
    }

    #[test]
    fn formats_timestamps() {
        assert_eq!(format_timestamp(None), "-");
        assert_eq!(format_timestamp(Some(&Timestamp::Text(String::new()))), "-");
        assert_eq!(format_timestamp(Some(&Timestamp::Text("garbage".into()))), "-");
        assert_eq!(
            format_timestamp(Some(&Timestamp::Text("2024-05-01T13:04:05.123456".into()))),
            "13:04:05"
        );
        assert_ne!(format_timestamp(Some(&Timestamp::EpochMillis(1.7e12))), "-");
    }

    #[test]
    fn band_helpers() {
        let bands = [1.0, 9.0, 3.0, 9.0];
        assert_eq!(band_energy(Some(&bands[..])), 5.5);
        assert_eq!(band_energy(None), 0.0);
        assert_eq!(dominant_band(Some(&bands[..])), Some(1));
        assert_eq!(dominant_band(Some(&[][..])), None);
        assert_eq!(dominant_band(None), None);
    }

    #[test]
    fn stats_over_log() {
        let mut a = sample_with_volume(10.0);
        a.peak_to_peak = 4.0;
        a.volume_filtered = Some(6.0);
        let mut b = sample_with_volume(30.0);
        b.peak_to_peak = 2.0;
        let stats = audio_stats([&a, &b]);
        assert_eq!(stats.avg_volume, 20.0);
        assert_eq!(stats.avg_volume_filtered, 6.0);
        assert_eq!(stats.max_volume, 30.0);
        assert_eq!(stats.min_volume, 10.0);
        assert_eq!(stats.avg_peak_to_peak, 3.0);
        assert_eq!(audio_stats(std::iter::empty()), AudioStats::default());
    }
}
