// Drawing of the four live visualizations: color mapping, frame-coalesced
// paint pipelines and the surfaces they paint onto.
pub mod bitmap;
pub mod color;
pub mod egui_surface;
pub mod pipeline;
pub mod scene;
pub mod scheduler;
pub mod spectrogram;
pub mod surface;
pub mod waveform;

pub use color::{Channel, Theme};
pub use egui_surface::EguiSurface;
pub use scene::{Scene, View};
pub use surface::Size;
