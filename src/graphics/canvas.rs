use egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

use super::waveform::{RenderFrame, BACKGROUND_ALPHA};

/// 2D drawing surface a [`RenderFrame`] is painted onto.
pub trait Canvas {
    fn fill(&mut self, color: Color32);

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color32, glow: f32);

    fn vertical_line(&mut self, x: f32, width: f32, color: Color32, glow: f32);
}

pub fn accent_color(rgb: [u8; 3], alpha: f32) -> Color32 {
    let a = (alpha.clamp(0.0, 1.0) * 255.0).round() as u8;
    Color32::from_rgba_unmultiplied(rgb[0], rgb[1], rgb[2], a)
}

/// Background, then the progress marker, then bars on top of it.
pub fn paint(frame: &RenderFrame, canvas: &mut dyn Canvas) {
    canvas.fill(accent_color([0, 0, 0], BACKGROUND_ALPHA));
    canvas.vertical_line(
        frame.marker.x,
        frame.marker.width,
        accent_color(frame.accent, 1.0),
        frame.marker.glow,
    );
    for bar in &frame.bars {
        canvas.fill_rect(
            bar.x,
            bar.y,
            bar.width,
            bar.height,
            accent_color(frame.accent, bar.alpha),
            bar.glow,
        );
    }
}

/// Paints into a rectangle of an egui layer.
pub struct EguiCanvas<'a> {
    painter: &'a Painter,
    rect: Rect,
}

impl<'a> EguiCanvas<'a> {
    pub fn new(painter: &'a Painter, rect: Rect) -> Self {
        Self { painter, rect }
    }

    fn at(&self, x: f32, y: f32) -> Pos2 {
        self.rect.min + Vec2::new(x, y)
    }
}

impl Canvas for EguiCanvas<'_> {
    fn fill(&mut self, color: Color32) {
        self.painter.rect_filled(self.rect, 4.0, color);
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Color32, glow: f32) {
        let rect = Rect::from_min_size(self.at(x, y), Vec2::new(width, height));
        if glow > 0.0 {
            // soft halo approximating a canvas shadow blur
            self.painter
                .rect_filled(rect.expand(glow / 2.0), glow / 2.0, color.gamma_multiply(0.3));
        }
        self.painter.rect_filled(rect, 0.0, color);
    }

    fn vertical_line(&mut self, x: f32, width: f32, color: Color32, glow: f32) {
        let points = [self.at(x, 0.0), self.at(x, self.rect.height())];
        if glow > 0.0 {
            self.painter
                .line_segment(points, Stroke::new(width + glow, color.gamma_multiply(0.3)));
        }
        self.painter.line_segment(points, Stroke::new(width, color));
    }
}
