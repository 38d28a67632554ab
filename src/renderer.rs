use anyhow::{Result, anyhow};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Rect, Stroke, Transform};
use vrt_core::{ControlLabel, RenderCommand, Side, Summary};

/// Longest latency the feedback bar can show before it saturates.
const LATENCY_BAR_FULL_MS: f32 = 1000.0;

/// What is currently on screen, folded from the experiment's render commands.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub active: [bool; 2],
    pub fixation: bool,
    pub control_enabled: bool,
    pub control_label: ControlLabel,
    pub last_latency_ms: Option<u64>,
    pub summary: Option<[Summary; 3]>,
    pub offered_download: Option<String>,
}

impl Default for Scene {
    fn default() -> Self {
        Self {
            active: [false; 2],
            fixation: false,
            control_enabled: true,
            control_label: ControlLabel::Start,
            last_latency_ms: None,
            summary: None,
            offered_download: None,
        }
    }
}

impl Scene {
    pub fn apply(&mut self, command: &RenderCommand) {
        match command {
            RenderCommand::Stimulus { side, active } => self.active[slot(*side)] = *active,
            RenderCommand::ClearStimuli => self.active = [false; 2],
            RenderCommand::Fixation { visible } => self.fixation = *visible,
            RenderCommand::LastLatency { latency_ms } => self.last_latency_ms = Some(*latency_ms),
            RenderCommand::Control { enabled, label } => {
                self.control_enabled = *enabled;
                self.control_label = *label;
            }
            RenderCommand::Summary {
                side_a,
                side_b,
                overall,
            } => self.summary = Some([*side_a, *side_b, *overall]),
            RenderCommand::OfferDownload { file_name } => {
                self.offered_download = Some(file_name.clone())
            }
        }
    }

    /// Applies every command; returns true if the scene changed.
    pub fn apply_all(&mut self, commands: &[RenderCommand]) -> bool {
        let before = self.clone();
        for command in commands {
            self.apply(command);
        }
        *self != before
    }

    pub fn is_active(&self, side: Side) -> bool {
        self.active[slot(side)]
    }
}

fn slot(side: Side) -> usize {
    match side {
        Side::A => 0,
        Side::B => 1,
    }
}

/// Draws a [`Scene`] into an RGBA frame buffer.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),
    canvas: Pixmap,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let canvas = Pixmap::new(width, height)
            .ok_or_else(|| anyhow!("cannot allocate {width}x{height} canvas"))?;
        Ok(Self {
            width,
            height,
            center: (width as f32 / 2.0, height as f32 / 2.0),
            canvas,
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        *self = Self::new(new_width, new_height)?;
        Ok(())
    }

    pub fn render_frame(&mut self, scene: &Scene, frame_buffer: &mut [u8]) -> Result<()> {
        self.canvas.fill(Color::from_rgba8(128, 128, 128, 255));

        for side in Side::ALL {
            self.draw_circle(side, scene.is_active(side))?;
        }
        if scene.fixation {
            self.draw_fixation()?;
        }
        if let Some(latency_ms) = scene.last_latency_ms {
            self.draw_latency_bar(latency_ms)?;
        }
        if let Some(summary) = &scene.summary {
            self.draw_summary(summary)?;
        }
        self.draw_control(
            scene.control_enabled,
            scene.control_label,
            scene.offered_download.is_some(),
        )?;

        let data = self.canvas.data();
        if frame_buffer.len() != data.len() {
            return Err(anyhow!(
                "frame buffer is {} bytes, canvas is {}",
                frame_buffer.len(),
                data.len()
            ));
        }
        frame_buffer.copy_from_slice(data);
        Ok(())
    }

    fn radius(&self) -> f32 {
        self.width.min(self.height) as f32 / 10.0
    }

    pub fn circle_center(&self, side: Side) -> (f32, f32) {
        let offset = self.width as f32 / 4.0;
        match side {
            Side::A => (self.center.0 - offset, self.center.1),
            Side::B => (self.center.0 + offset, self.center.1),
        }
    }

    fn draw_circle(&mut self, side: Side, active: bool) -> Result<()> {
        let (cx, cy) = self.circle_center(side);
        let path = PathBuilder::from_circle(cx, cy, self.radius())
            .ok_or_else(|| anyhow!("degenerate circle"))?;

        let mut paint = Paint::default();
        paint.anti_alias = true;
        if active {
            paint.set_color_rgba8(220, 30, 30, 255);
        } else {
            paint.set_color_rgba8(64, 64, 64, 255);
        }
        self.canvas
            .fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

        paint.set_color_rgba8(16, 16, 16, 255);
        let stroke = Stroke {
            width: 3.0,
            ..Default::default()
        };
        self.canvas
            .stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        Ok(())
    }

    fn draw_fixation(&mut self) -> Result<()> {
        let arm = self.radius() / 2.0;
        let thickness = (arm / 6.0).max(2.0);
        let (cx, cy) = self.center;
        let mut paint = Paint::default();
        paint.set_color_rgba8(0, 0, 0, 255);

        let bars = [
            Rect::from_xywh(cx - arm, cy - thickness / 2.0, arm * 2.0, thickness),
            Rect::from_xywh(cx - thickness / 2.0, cy - arm, thickness, arm * 2.0),
        ];
        for bar in bars {
            let bar = bar.ok_or_else(|| anyhow!("degenerate fixation bar"))?;
            self.canvas
                .fill_rect(bar, &paint, Transform::identity(), None);
        }
        Ok(())
    }

    fn draw_latency_bar(&mut self, latency_ms: u64) -> Result<()> {
        let full = self.width as f32 / 2.0;
        let fraction = (latency_ms as f32 / LATENCY_BAR_FULL_MS).clamp(0.0, 1.0);
        let height = self.height as f32 / 60.0;
        let y = self.center.1 + self.radius() * 2.0;
        let x = self.center.0 - full / 2.0;

        let mut paint = Paint::default();
        paint.set_color_rgba8(40, 40, 40, 255);
        let track = Rect::from_xywh(x, y, full, height).ok_or_else(|| anyhow!("bad track"))?;
        self.canvas
            .fill_rect(track, &paint, Transform::identity(), None);

        if fraction > 0.0 {
            paint.set_color_rgba8(250, 200, 40, 255);
            let fill = Rect::from_xywh(x, y, full * fraction, height)
                .ok_or_else(|| anyhow!("bad latency bar"))?;
            self.canvas
                .fill_rect(fill, &paint, Transform::identity(), None);
        }
        Ok(())
    }

    /// Mean latency bars for left, right and overall, with an SD whisker each.
    fn draw_summary(&mut self, summary: &[Summary; 3]) -> Result<()> {
        const COLORS: [[u8; 3]; 3] = [[230, 120, 40], [40, 180, 200], [240, 240, 240]];
        let whisker = (self.width as f32 / 400.0).max(1.0);

        for (slot, (s, [r, g, b])) in summary.iter().zip(COLORS).enumerate() {
            let bar = self
                .summary_bar(slot, s.mean)
                .ok_or_else(|| anyhow!("bad summary bar"))?;
            let mut paint = Paint::default();
            paint.set_color_rgba8(r, g, b, 255);
            self.canvas
                .fill_rect(bar, &paint, Transform::identity(), None);

            let spread = self.summary_height(s.standard_deviation);
            if spread > 0.0 {
                let line = Rect::from_xywh(
                    bar.left() + bar.width() / 2.0 - whisker / 2.0,
                    bar.top() - spread,
                    whisker,
                    spread * 2.0,
                )
                .ok_or_else(|| anyhow!("bad whisker"))?;
                paint.set_color_rgba8(0, 0, 0, 255);
                self.canvas
                    .fill_rect(line, &paint, Transform::identity(), None);
            }
        }
        Ok(())
    }

    fn summary_height(&self, ms: f64) -> f32 {
        let full = self.height as f32 / 5.0;
        (ms as f32 / LATENCY_BAR_FULL_MS).clamp(0.0, 1.0) * full
    }

    fn summary_bar(&self, slot: usize, mean: f64) -> Option<Rect> {
        let bar_w = self.width as f32 / 20.0;
        let spacing = bar_w * 2.0;
        let base = self.height as f32 / 3.0;
        let x = self.center.0 + (slot as f32 - 1.0) * spacing - bar_w / 2.0;
        let h = self.summary_height(mean).max(1.0);
        Rect::from_xywh(x, base - h, bar_w, h)
    }

    fn control_rect(&self) -> Option<Rect> {
        let w = self.width as f32 / 8.0;
        let h = self.height as f32 / 16.0;
        Rect::from_xywh(self.center.0 - w / 2.0, self.height as f32 - h * 2.0, w, h)
    }

    fn draw_control(&mut self, enabled: bool, label: ControlLabel, download_ready: bool) -> Result<()> {
        let rect = self
            .control_rect()
            .ok_or_else(|| anyhow!("bad control rect"))?;

        let mut paint = Paint::default();
        match (enabled, label) {
            (false, _) => paint.set_color_rgba8(90, 90, 90, 255),
            (true, ControlLabel::Start) => paint.set_color_rgba8(40, 160, 70, 255),
            (true, ControlLabel::Download) => paint.set_color_rgba8(40, 90, 200, 255),
        }
        self.canvas
            .fill_rect(rect, &paint, Transform::identity(), None);

        // an export has been written: white core in the control
        if download_ready {
            let inset = Rect::from_xywh(
                rect.left() + rect.width() / 4.0,
                rect.top() + rect.height() / 4.0,
                rect.width() / 2.0,
                rect.height() / 2.0,
            )
            .ok_or_else(|| anyhow!("bad download marker"))?;
            paint.set_color_rgba8(255, 255, 255, 255);
            self.canvas
                .fill_rect(inset, &paint, Transform::identity(), None);
        }
        Ok(())
    }

    #[cfg(test)]
    fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let px = self.canvas.pixel(x, y)?;
        Some([px.red(), px.green(), px.blue(), px.alpha()])
    }
}
