// Stand-in for the sensor device and telemetry server, used when there is no
// hardware to talk to. Speaks the same wire protocol as the real server.
use std::f64::consts::PI;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{Local, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rustfft::{num_complex::Complex32, Fft, FftPlanner};
use serde::Serialize;

use crate::error::MonitorError;
use crate::link::transport::{emit, Outbound, Tagged, Transport, TransportEvent};
use crate::stream::sample::{Sample, Timestamp, BAND_CENTERS_HZ, BAND_COUNT};
use crate::stream::settings::{decode_filter_command, FilterKind, FilterSettings};

pub const SAMPLE_RATE_HZ: f32 = 22_050.0;
pub const CHUNK_LEN: usize = 1024;

const ADC_MID: f32 = 2048.0;
const ADC_SPAN: f32 = 2047.0;
const VOICE_BAND_HZ: (f32, f32) = (300.0, 3400.0);
const NOTCH_HALF_WIDTH_HZ: f32 = 50.0;
/// RMS that reads as 100 % volume.
const FULL_SCALE_RMS: f32 = 0.3;
/// Band intensity maps this dB window onto 0..100.
const BAND_DB_RANGE: (f32, f32) = (-70.0, -10.0);
const BACKLOG_LEN: usize = 3;
const HEARTBEAT_EVERY: Duration = Duration::from_secs(30);
const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// Voiced-speech-like test signal: a gliding fundamental with formant
/// weighted harmonics, a syllable envelope, mains hum and broadband hiss.
struct VoiceSynth {
    rng: StdRng,
    t: f64,
}

impl VoiceSynth {
    fn new(rng: StdRng) -> Self {
        Self { rng, t: 0.0 }
    }

    fn next_chunk(&mut self, len: usize) -> Vec<f32> {
        let dt = 1.0 / SAMPLE_RATE_HZ as f64;
        let nyquist = SAMPLE_RATE_HZ as f64 / 2.0;
        (0..len)
            .map(|_| {
                let t = self.t;
                self.t += dt;
                let envelope = 0.55 + 0.45 * (2.0 * PI * 3.0 * t).sin();
                let pitch = 160.0 + 25.0 * (2.0 * PI * 0.7 * t).sin();
                let voice: f64 = (1..=24)
                    .map(|h| pitch * h as f64)
                    .take_while(|&f| f < nyquist)
                    .map(|f| formant_gain(f) * (2.0 * PI * f * t).sin())
                    .sum();
                let hum = 0.08 * (2.0 * PI * 50.0 * t).sin();
                let hiss = self.rng.gen_range(-0.06..0.06);
                (0.25 * envelope * voice + hum + hiss).clamp(-1.0, 1.0) as f32
            })
            .collect()
    }
}

fn formant_gain(f: f64) -> f64 {
    const FORMANTS: [(f64, f64, f64); 3] =
        [(700.0, 150.0, 1.0), (1220.0, 200.0, 0.6), (2600.0, 300.0, 0.35)];
    FORMANTS
        .iter()
        .map(|&(centre, width, gain)| gain * (-((f - centre) / width).powi(2)).exp())
        .sum::<f64>()
        + 0.02
}

/// Frequency-domain analysis and filtering of one chunk.
struct Analyzer {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    size: usize,
}

impl Analyzer {
    fn with_size(size: usize) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        Self {
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            size,
        }
    }

    fn bin_hz(&self, k: usize) -> f32 {
        let k = if k <= self.size / 2 { k } else { self.size - k };
        k as f32 * SAMPLE_RATE_HZ / self.size as f32
    }

    fn spectrum(&self, chunk: &[f32]) -> Vec<Complex32> {
        let mut buffer: Vec<Complex32> = chunk
            .iter()
            .copied()
            .take(self.size)
            .map(|v| Complex32::new(v, 0.0))
            .collect();
        buffer.resize(self.size, Complex32::new(0.0, 0.0));
        self.forward.process(&mut buffer);
        buffer
    }

    fn filtered(&self, spectrum: &[Complex32], settings: &FilterSettings) -> Vec<Complex32> {
        spectrum
            .iter()
            .enumerate()
            .map(|(k, &bin)| bin * filter_gain(settings, self.bin_hz(k)))
            .collect()
    }

    fn to_time(&self, mut spectrum: Vec<Complex32>) -> Vec<f32> {
        self.inverse.process(&mut spectrum);
        let scale = 1.0 / self.size as f32;
        spectrum.iter().map(|c| c.re * scale).collect()
    }

    /// Strongest component per band, mapped from dB onto 0..100.
    fn bands(&self, spectrum: &[Complex32]) -> Vec<f64> {
        let edges = band_edges();
        let half = &spectrum[..self.size / 2];
        edges
            .iter()
            .map(|&(lo, hi)| {
                let peak = half
                    .iter()
                    .enumerate()
                    .filter(|&(k, _)| (lo..hi).contains(&self.bin_hz(k)))
                    .map(|(_, c)| c.norm() * 2.0 / self.size as f32)
                    .fold(0.0f32, f32::max);
                let db = 20.0 * (peak + 1e-9).log10();
                let (floor, ceil) = BAND_DB_RANGE;
                (((db - floor) / (ceil - floor)) * 100.0).clamp(0.0, 100.0) as f64
            })
            .collect()
    }

    /// Voice-band power against everything else, DC excluded.
    fn snr_db(&self, spectrum: &[Complex32]) -> f64 {
        let (mut signal, mut noise) = (0.0f64, 0.0f64);
        for (k, c) in spectrum.iter().enumerate().skip(1) {
            let power = c.norm_sqr() as f64;
            if (VOICE_BAND_HZ.0..=VOICE_BAND_HZ.1).contains(&self.bin_hz(k)) {
                signal += power;
            } else {
                noise += power;
            }
        }
        10.0 * (signal.max(1e-12) / noise.max(1e-12)).log10()
    }
}

/// Lower/upper edge of each band: geometric midpoints between neighbouring
/// centres, half an octave out at either end.
fn band_edges() -> [(f32, f32); BAND_COUNT] {
    let mut edges = [(0.0, 0.0); BAND_COUNT];
    for (i, &centre) in BAND_CENTERS_HZ.iter().enumerate() {
        let lo = match i {
            0 => centre / 2f32.sqrt(),
            _ => (BAND_CENTERS_HZ[i - 1] * centre).sqrt(),
        };
        let hi = match BAND_CENTERS_HZ.get(i + 1) {
            Some(&next) => (centre * next).sqrt(),
            None => (centre * 2f32.sqrt()).min(SAMPLE_RATE_HZ / 2.0),
        };
        edges[i] = (lo, hi);
    }
    edges
}

fn filter_gain(settings: &FilterSettings, hz: f32) -> f32 {
    let cutoff = settings.cutoff_hz as f32;
    let pass = match settings.kind {
        FilterKind::Bypass => return 1.0,
        FilterKind::LowPass => hz <= cutoff,
        FilterKind::HighPass => hz >= cutoff,
        FilterKind::BandPass => {
            let high = settings.cutoff_high_hz.unwrap_or(settings.cutoff_hz) as f32;
            (cutoff..=high).contains(&hz)
        }
        FilterKind::Notch => (hz - cutoff).abs() > NOTCH_HALF_WIDTH_HZ,
    };
    if pass {
        settings.boost_multiplier() as f32
    } else {
        0.0
    }
}

fn volume_percent(chunk: &[f32]) -> f64 {
    let rms = (chunk.iter().map(|v| v * v).sum::<f32>() / chunk.len().max(1) as f32).sqrt();
    (rms / FULL_SCALE_RMS * 100.0).clamp(0.0, 100.0) as f64
}

/// The simulated sensor: produces one telemetry sample per tick and obeys
/// filter commands the way the firmware does.
pub struct SimulatedDevice {
    synth: VoiceSynth,
    analyzer: Analyzer,
    settings: FilterSettings,
    source: String,
}

impl SimulatedDevice {
    pub fn new(source: &str) -> Self {
        Self::with_rng(source, StdRng::from_entropy())
    }

    fn with_rng(source: &str, rng: StdRng) -> Self {
        Self {
            synth: VoiceSynth::new(rng),
            analyzer: Analyzer::with_size(CHUNK_LEN),
            settings: FilterSettings {
                update_rate_ms: Some(DEFAULT_TICK.as_millis() as u32),
                ..FilterSettings::reset()
            },
            source: source.to_owned(),
        }
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn tick(&self) -> Duration {
        self.settings
            .update_rate_ms
            .map(|ms| Duration::from_millis(ms as u64))
            .unwrap_or(DEFAULT_TICK)
    }

    /// Applies a `filter_settings` frame. Returns false if it was ignored.
    pub fn apply_command(&mut self, text: &str) -> bool {
        match decode_filter_command(text) {
            Some(settings) => {
                log::info!("simulated device now running {}", settings.summary());
                self.settings = settings;
                true
            }
            None => {
                log::debug!("simulated device ignored frame: {text}");
                false
            }
        }
    }

    pub fn next_sample(&mut self) -> Sample {
        let raw = self.synth.next_chunk(CHUNK_LEN);
        let spectrum = self.analyzer.spectrum(&raw);
        let filtered_spectrum = self.analyzer.filtered(&spectrum, &self.settings);
        let filtered = self.analyzer.to_time(filtered_spectrum.clone());

        let adc: Vec<f32> = raw.iter().map(|v| ADC_MID + v * ADC_SPAN).collect();
        let min = adc.iter().copied().fold(f32::MAX, f32::min);
        let max = adc.iter().copied().fold(f32::MIN, f32::max);
        let avg = adc.iter().sum::<f32>() / adc.len() as f32;

        Sample {
            source: self.source.clone(),
            volume: volume_percent(&raw),
            volume_filtered: Some(volume_percent(&filtered)),
            peak_to_peak: (max - min) as f64,
            min: Some(min.round() as f64),
            max: Some(max.round() as f64),
            avg: Some(avg.round() as f64),
            bands: Some(self.analyzer.bands(&spectrum)),
            bands_filtered: Some(self.analyzer.bands(&filtered_spectrum)),
            snr_raw: Some(self.analyzer.snr_db(&spectrum)),
            snr_filtered: Some(self.analyzer.snr_db(&filtered_spectrum)),
            timestamp: Some(Timestamp::EpochMillis(Utc::now().timestamp_millis() as f64)),
            server_timestamp: Some(Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()),
            client: Some(serde_json::Value::from("simulator")),
            calibrated: Some(serde_json::Value::Bool(true)),
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Serialize)]
struct Backlog<'a> {
    data: &'a [Sample],
}

#[derive(Serialize)]
struct PeerStatus {
    connected: bool,
}

#[derive(Serialize)]
struct Heartbeat {
    timestamp: String,
}

fn envelope<T: Serialize>(kind: &'static str, body: &T) -> Option<String> {
    match serde_json::to_string(&Envelope { kind, body }) {
        Ok(text) => Some(text),
        Err(err) => {
            log::warn!("failed to encode simulated {kind} frame: {err}");
            None
        }
    }
}

/// Transport that runs a `SimulatedDevice` on a worker thread instead of
/// opening a socket.
pub struct SimTransport {
    events: Sender<Tagged>,
    device_source: String,
    outbound: Option<Sender<Outbound>>,
}

impl SimTransport {
    pub fn new(events: Sender<Tagged>, device_source: &str) -> Self {
        Self {
            events,
            device_source: device_source.to_owned(),
            outbound: None,
        }
    }
}

impl Transport for SimTransport {
    fn open(&mut self, _url: &str, generation: u64) -> Result<(), MonitorError> {
        self.close();
        let (tx, rx) = mpsc::channel();
        let events = self.events.clone();
        let device = SimulatedDevice::new(&self.device_source);
        thread::Builder::new()
            .name(format!("sim-device-{generation}"))
            .spawn(move || run_device(device, generation, &events, rx))
            .map_err(|err| MonitorError::Transport(err.to_string()))?;
        self.outbound = Some(tx);
        Ok(())
    }

    fn send(&mut self, text: String) -> Result<(), MonitorError> {
        let tx = self.outbound.as_ref().ok_or(MonitorError::NotOpen)?;
        tx.send(Outbound::Text(text))
            .map_err(|_| MonitorError::Transport("simulated device has stopped".into()))
    }

    fn close(&mut self) {
        if let Some(tx) = self.outbound.take() {
            tx.send(Outbound::Close).ok();
        }
    }
}

fn run_device(
    mut device: SimulatedDevice,
    generation: u64,
    events: &Sender<Tagged>,
    outbound: Receiver<Outbound>,
) {
    let send_text = |text: Option<String>| {
        if let Some(text) = text {
            emit(events, generation, TransportEvent::Text(text));
        }
    };
    emit(events, generation, TransportEvent::Opened);
    send_text(envelope("esp32_status", &PeerStatus { connected: true }));
    let backlog: Vec<Sample> = (0..BACKLOG_LEN).map(|_| device.next_sample()).collect();
    send_text(envelope("initial_data", &Backlog { data: &backlog }));

    let mut last_heartbeat = Instant::now();
    loop {
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Text(text)) => {
                    device.apply_command(&text);
                }
                Ok(Outbound::Close) | Err(TryRecvError::Disconnected) => {
                    emit(events, generation, TransportEvent::Closed);
                    return;
                }
                Err(TryRecvError::Empty) => break,
            }
        }
        match serde_json::to_string(&device.next_sample()) {
            Ok(text) => send_text(Some(text)),
            Err(err) => log::warn!("failed to encode simulated sample: {err}"),
        }
        if last_heartbeat.elapsed() >= HEARTBEAT_EVERY {
            let timestamp = Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string();
            send_text(envelope("heartbeat", &Heartbeat { timestamp }));
            last_heartbeat = Instant::now();
        }
        thread::sleep(device.tick());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::message::{decode, Inbound};
    use crate::stream::sample::{dominant_band, validate};
    use crate::stream::settings::encode_filter_command;

    fn device() -> SimulatedDevice {
        SimulatedDevice::with_rng("esp32", StdRng::seed_from_u64(7))
    }

    #[test]
    fn samples_pass_validation() {
        let mut dev = device();
        let sample = dev.next_sample();
        let value = serde_json::to_value(&sample).unwrap();
        assert!(validate(&value, "esp32"));
        assert_eq!(sample.bands.as_ref().map(Vec::len), Some(BAND_COUNT));
        assert!((0.0..=100.0).contains(&sample.volume));
        assert!(sample.peak_to_peak > 0.0);
    }

    #[test]
    fn voice_dominates_low_bands() {
        let mut dev = device();
        let sample = dev.next_sample();
        // The strongest formant sits near 700 Hz.
        let dominant = dominant_band(sample.bands.as_deref()).unwrap();
        assert!(dominant <= 3, "dominant band {dominant}");
    }

    #[test]
    fn band_pass_improves_snr() {
        let mut dev = device();
        let bypass = dev.next_sample();
        let diff = bypass.snr_filtered.unwrap() - bypass.snr_raw.unwrap();
        assert!(diff.abs() < 1e-6);

        let command = encode_filter_command(&FilterSettings::default(), "esp32").unwrap();
        assert!(dev.apply_command(&command));
        assert_eq!(dev.settings().kind, FilterKind::BandPass);
        assert_eq!(dev.tick(), Duration::from_millis(200));
        let filtered = dev.next_sample();
        assert!(filtered.snr_filtered.unwrap() > filtered.snr_raw.unwrap());
    }

    #[test]
    fn low_pass_silences_top_band() {
        let mut dev = device();
        let low = FilterSettings {
            kind: FilterKind::LowPass,
            cutoff_hz: 1000.0,
            ..FilterSettings::default()
        };
        assert!(dev.apply_command(&encode_filter_command(&low, "esp32").unwrap()));
        let sample = dev.next_sample();
        assert_eq!(sample.bands_filtered.unwrap()[BAND_COUNT - 1], 0.0);
        assert!(sample.bands.unwrap()[BAND_COUNT - 1] > 0.0);
    }

    #[test]
    fn ignores_unrelated_frames() {
        let mut dev = device();
        assert!(!dev.apply_command("{}"));
        assert!(!dev.apply_command(r#"{"type":"heartbeat"}"#));
        assert_eq!(dev.settings().kind, FilterKind::Bypass);
    }

    #[test]
    fn transport_speaks_the_wire_protocol() {
        let (tx, rx) = mpsc::channel();
        let mut transport = SimTransport::new(tx, "esp32");
        transport.open("sim://", 3).unwrap();
        let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(
            first,
            Tagged {
                generation: 3,
                event: TransportEvent::Opened
            }
        );
        let mut saw_status = false;
        let mut saw_backlog = false;
        for _ in 0..2 {
            let Tagged {
                event: TransportEvent::Text(text),
                ..
            } = rx.recv_timeout(Duration::from_secs(5)).unwrap()
            else {
                panic!("expected a text frame");
            };
            match decode(&text, "esp32") {
                Some(Inbound::PeerStatus(true)) => saw_status = true,
                Some(Inbound::Backlog(Some(_))) => saw_backlog = true,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(saw_status && saw_backlog);
        transport.close();
        let closed = (0..100)
            .filter_map(|_| rx.recv_timeout(Duration::from_secs(5)).ok())
            .any(|t| t.event == TransportEvent::Closed);
        assert!(closed);
    }
}
