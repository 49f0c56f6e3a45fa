use thiserror::Error;

use crate::stream::settings::{
    BOOST_RANGE_PERCENT, CUTOFF_RANGE_HZ, MIN_BAND_GAP_HZ, UPDATE_RATE_RANGE_MS,
};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("window capacity must be greater than zero")]
    ZeroCapacity,
    #[error(
        "cutoff frequency {0} Hz is outside {min}..={max} Hz",
        min = CUTOFF_RANGE_HZ.0,
        max = CUTOFF_RANGE_HZ.1
    )]
    CutoffOutOfRange(f64),
    #[error("band-pass filter needs a high cutoff frequency")]
    MissingHighCutoff,
    #[error(
        "band-pass high cutoff {high} Hz must exceed low cutoff {low} Hz by at least {gap} Hz",
        gap = MIN_BAND_GAP_HZ
    )]
    BandTooNarrow { low: f64, high: f64 },
    #[error(
        "voice boost {0}% is outside {min}..={max}%",
        min = BOOST_RANGE_PERCENT.0,
        max = BOOST_RANGE_PERCENT.1
    )]
    BoostOutOfRange(u32),
    #[error(
        "update rate {0} ms is outside {min}..={max} ms",
        min = UPDATE_RATE_RANGE_MS.0,
        max = UPDATE_RATE_RANGE_MS.1
    )]
    UpdateRateOutOfRange(u32),
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport not open")]
    NotOpen,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for MonitorError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        MonitorError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for MonitorError {
    fn from(value: image::ImageError) -> Self {
        MonitorError::Plot(value.to_string())
    }
}
