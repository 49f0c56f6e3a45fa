use std::time::{Duration, Instant};

use crate::error::MonitorError;
use crate::stream::buffer::{RollingLog, WindowBuffer};
use crate::stream::quality::SignalQuality;
use crate::stream::sample::{audio_stats, normalize, AudioStats, Sample, BAND_COUNT};
use crate::stream::throttle::Throttle;

#[derive(Clone, Debug, PartialEq)]
pub struct DashboardConfig {
    pub waveform_capacity: usize,
    pub spectrogram_capacity: usize,
    pub log_rows: usize,
    pub throttle: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            waveform_capacity: 100,
            spectrogram_capacity: 120,
            log_rows: 20,
            throttle: Throttle::DEFAULT_INTERVAL,
        }
    }
}

/// Headline numbers for the metric cards; absent fields read as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metrics {
    pub volume: f64,
    pub volume_filtered: f64,
    pub peak_to_peak: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Every buffer the visualizations read from, behind one throttle.
pub struct Dashboard {
    throttle: Throttle,
    waveform_raw: WindowBuffer<f64>,
    waveform_filtered: WindowBuffer<f64>,
    spectrogram_raw: WindowBuffer<Vec<f64>>,
    spectrogram_filtered: WindowBuffer<Vec<f64>>,
    bands_raw: Vec<f64>,
    bands_filtered: Vec<f64>,
    log: RollingLog<Sample>,
    latest: Option<Sample>,
    last_update: String,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            throttle: Throttle::new(config.throttle),
            waveform_raw: WindowBuffer::with_capacity(config.waveform_capacity)?,
            waveform_filtered: WindowBuffer::with_capacity(config.waveform_capacity)?,
            spectrogram_raw: WindowBuffer::with_capacity(config.spectrogram_capacity)?,
            spectrogram_filtered: WindowBuffer::with_capacity(config.spectrogram_capacity)?,
            bands_raw: vec![0.0; BAND_COUNT],
            bands_filtered: vec![0.0; BAND_COUNT],
            log: RollingLog::with_capacity(config.log_rows)?,
            latest: None,
            last_update: "-".to_owned(),
        })
    }

    /// Folds one sample into every buffer if the throttle admits it.
    /// Returns whether anything changed.
    pub fn ingest(&mut self, sample: &Sample, now: Instant) -> bool {
        if !self.throttle.admit(now) {
            return false;
        }
        let sample = normalize(sample);

        self.waveform_raw.push(sample.volume);
        self.waveform_filtered.push(sample.volume_filtered_or_raw());

        // No bands means this tick leaves the spectrogram alone.
        if let Some(bands) = &sample.bands {
            self.bands_raw.clone_from(bands);
            self.spectrogram_raw.push(bands.clone());
        }
        if let Some(bands) = &sample.bands_filtered {
            self.bands_filtered.clone_from(bands);
            self.spectrogram_filtered.push(bands.clone());
        }

        self.last_update = sample.display_time();
        self.log.record(sample.clone());
        self.latest = Some(sample);
        true
    }

    pub fn waveform_raw(&self) -> Vec<f64> {
        self.waveform_raw.snapshot()
    }

    pub fn waveform_filtered(&self) -> Vec<f64> {
        self.waveform_filtered.snapshot()
    }

    pub fn spectrogram_raw(&self) -> Vec<Vec<f64>> {
        self.spectrogram_raw.snapshot()
    }

    pub fn spectrogram_filtered(&self) -> Vec<Vec<f64>> {
        self.spectrogram_filtered.snapshot()
    }

    pub fn bands_raw(&self) -> &[f64] {
        &self.bands_raw
    }

    pub fn bands_filtered(&self) -> &[f64] {
        &self.bands_filtered
    }

    pub fn log(&self) -> &RollingLog<Sample> {
        &self.log
    }

    #[cfg(test)]
    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    pub fn last_update(&self) -> &str {
        &self.last_update
    }

    pub fn metrics(&self) -> Metrics {
        let Some(s) = &self.latest else {
            return Metrics::default();
        };
        Metrics {
            volume: s.volume,
            volume_filtered: s.volume_filtered.unwrap_or(0.0),
            peak_to_peak: s.peak_to_peak,
            min: s.min.unwrap_or(0.0),
            max: s.max.unwrap_or(0.0),
            avg: s.avg.unwrap_or(0.0),
        }
    }

    pub fn quality(&self) -> SignalQuality {
        match &self.latest {
            Some(s) => SignalQuality::new(s.snr_raw, s.snr_filtered),
            None => SignalQuality::new(None, None),
        }
    }

    /// Session statistics over the rolling log.
    pub fn stats(&self) -> AudioStats {
        audio_stats(self.log.iter())
    }

    /// Drops all buffered data but keeps capacities and throttle interval.
    pub fn clear(&mut self) {
        self.throttle.reset();
        self.waveform_raw.clear();
        self.waveform_filtered.clear();
        self.spectrogram_raw.clear();
        self.spectrogram_filtered.clear();
        self.bands_raw = vec![0.0; BAND_COUNT];
        self.bands_filtered = vec![0.0; BAND_COUNT];
        self.log.clear();
        self.latest = None;
        self.last_update = "-".to_owned();
    }
}
