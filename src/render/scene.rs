use crate::error::MonitorError;
use crate::render::bitmap::render_png;
use crate::render::color::{Channel, ColorMapper, Theme};
use crate::render::pipeline::{Painter, RenderPipeline};
use crate::render::scheduler::{FrameQueue, FrameToken};
use crate::render::spectrogram::SpectrogramPainter;
use crate::render::surface::{DisplayList, Size};
use crate::render::waveform::WaveformPainter;
use crate::stream::dashboard::{Dashboard, DashboardConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    WaveformRaw,
    WaveformFiltered,
    SpectrogramRaw,
    SpectrogramFiltered,
}

impl View {
    pub const ALL: [View; 4] = [
        View::WaveformRaw,
        View::WaveformFiltered,
        View::SpectrogramRaw,
        View::SpectrogramFiltered,
    ];

    pub fn title(self) -> &'static str {
        match self {
            View::WaveformRaw => "Raw Waveform",
            View::WaveformFiltered => "Filtered Waveform",
            View::SpectrogramRaw => "Raw Spectrogram",
            View::SpectrogramFiltered => "Filtered Spectrogram",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            View::WaveformRaw => "waveform_raw",
            View::WaveformFiltered => "waveform_filtered",
            View::SpectrogramRaw => "spectrogram_raw",
            View::SpectrogramFiltered => "spectrogram_filtered",
        }
    }
}

/// The four dashboard visualizations sharing one frame queue and one color
/// cache.
pub struct Scene {
    frames: FrameQueue,
    fired: Vec<FrameToken>,
    colors: ColorMapper,
    theme: Theme,
    waveform_raw: RenderPipeline<WaveformPainter>,
    waveform_filtered: RenderPipeline<WaveformPainter>,
    spectrogram_raw: RenderPipeline<SpectrogramPainter>,
    spectrogram_filtered: RenderPipeline<SpectrogramPainter>,
}

fn drive<'a, P: Painter>(
    pipe: &'a mut RenderPipeline<P>,
    frames: &mut FrameQueue,
    fired: &[FrameToken],
    size: Size,
    theme: Theme,
    colors: &mut ColorMapper,
) -> &'a DisplayList {
    pipe.on_frame(fired, size, theme, colors);
    pipe.sync_view(size, theme, frames);
    pipe.output()
}

impl Scene {
    pub fn new(config: &DashboardConfig, theme: Theme) -> Self {
        let points = config.waveform_capacity;
        let columns = config.spectrogram_capacity;
        Self {
            frames: FrameQueue::new(),
            fired: Vec::new(),
            colors: ColorMapper::new(),
            theme,
            waveform_raw: RenderPipeline::new(WaveformPainter::new(Channel::Raw, points)),
            waveform_filtered: RenderPipeline::new(WaveformPainter::new(Channel::Filtered, points)),
            spectrogram_raw: RenderPipeline::new(SpectrogramPainter::new(Channel::Raw, columns)),
            spectrogram_filtered: RenderPipeline::new(SpectrogramPainter::new(
                Channel::Filtered,
                columns,
            )),
        }
    }

    /// Takes effect on the next frame through each pipeline's view sync.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Hands the dashboard's current windows to every pipeline.
    pub fn submit(&mut self, dashboard: &Dashboard) {
        self.waveform_raw
            .submit(dashboard.waveform_raw(), &mut self.frames);
        self.waveform_filtered
            .submit(dashboard.waveform_filtered(), &mut self.frames);
        self.spectrogram_raw
            .submit(dashboard.spectrogram_raw(), &mut self.frames);
        self.spectrogram_filtered
            .submit(dashboard.spectrogram_filtered(), &mut self.frames);
    }

    /// Call once per GUI frame before laying out any view.
    pub fn begin_frame(&mut self) {
        self.fired = self.frames.begin_frame();
    }

    /// Paints `view` if its turn came up this frame and returns what to show.
    pub fn layout(&mut self, view: View, size: Size) -> &DisplayList {
        let Scene {
            frames,
            fired,
            colors,
            theme,
            waveform_raw,
            waveform_filtered,
            spectrogram_raw,
            spectrogram_filtered,
        } = self;
        let theme = *theme;
        match view {
            View::WaveformRaw => drive(waveform_raw, frames, fired, size, theme, colors),
            View::WaveformFiltered => drive(waveform_filtered, frames, fired, size, theme, colors),
            View::SpectrogramRaw => drive(spectrogram_raw, frames, fired, size, theme, colors),
            View::SpectrogramFiltered => {
                drive(spectrogram_filtered, frames, fired, size, theme, colors)
            }
        }
    }

    /// Whether another frame is needed to catch up.
    pub fn has_pending(&self) -> bool {
        self.frames.has_pending()
    }

    #[cfg(test)]
    pub fn paint_count(&self, view: View) -> u64 {
        match view {
            View::WaveformRaw => self.waveform_raw.paint_count(),
            View::WaveformFiltered => self.waveform_filtered.paint_count(),
            View::SpectrogramRaw => self.spectrogram_raw.paint_count(),
            View::SpectrogramFiltered => self.spectrogram_filtered.paint_count(),
        }
    }

    /// Renders the current data for `view` off screen and encodes it as PNG.
    pub fn export_png(
        &mut self,
        view: View,
        dashboard: &Dashboard,
        size: Size,
    ) -> Result<Vec<u8>, MonitorError> {
        let (theme, colors) = (self.theme, &mut self.colors);
        let list = match view {
            View::WaveformRaw => {
                self.waveform_raw
                    .render_offscreen(&dashboard.waveform_raw(), size, theme, colors)
            }
            View::WaveformFiltered => self.waveform_filtered.render_offscreen(
                &dashboard.waveform_filtered(),
                size,
                theme,
                colors,
            ),
            View::SpectrogramRaw => self.spectrogram_raw.render_offscreen(
                &dashboard.spectrogram_raw(),
                size,
                theme,
                colors,
            ),
            View::SpectrogramFiltered => self.spectrogram_filtered.render_offscreen(
                &dashboard.spectrogram_filtered(),
                size,
                theme,
                colors,
            ),
        };
        render_png(&list)
    }

    /// Cancels every scheduled paint; used when the window goes away.
    pub fn teardown(&mut self) {
        self.waveform_raw.teardown(&mut self.frames);
        self.waveform_filtered.teardown(&mut self.frames);
        self.spectrogram_raw.teardown(&mut self.frames);
        self.spectrogram_filtered.teardown(&mut self.frames);
        self.fired.clear();
    }
}
