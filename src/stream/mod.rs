// Inbound telemetry: decoding, validation, buffering and throttling, plus the
// outbound filter command.
pub mod buffer;
pub mod dashboard;
pub mod message;
pub mod quality;
pub mod sample;
pub mod settings;
pub mod throttle;

pub use dashboard::{Dashboard, DashboardConfig};
pub use quality::{snr_bar_fraction, SnrGrade};
pub use sample::{Sample, BAND_LABELS};
pub use settings::{apply_filter, FilterKind, FilterSettings};
