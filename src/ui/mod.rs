pub mod panel;
pub mod transport;

pub use transport::{format_time, scrub_target, TransportCommand, TransportModel};

use anyhow::Result;
use egui_wgpu::Renderer;
use egui_winit::State;
use std::time::Duration;
use winit::{event::WindowEvent, window::Window};

use crate::audio::MediaElement;
use crate::briefing::Briefing;
use crate::graphics::{FrameId, FrameTarget, GraphicsEngine};
use crate::player::TacticalAudioPlayer;

/// Everything one egui pass shows.
pub struct Dashboard<'a, M: MediaElement> {
    pub title: &'a str,
    pub players: &'a mut [TacticalAudioPlayer<M>],
    pub briefing: Option<&'a Briefing>,
    pub fired: &'a [FrameId],
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_briefing: bool,
    repaint_after: Option<Duration>,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();
        context.set_visuals(egui::Visuals::dark());

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
        );

        let renderer = Renderer::new(&graphics_engine.device, graphics_engine.format(), None, 1);

        Self {
            context,
            state: egui_state,
            renderer,
            show_briefing: true,
            repaint_after: None,
        }
    }

    /// Feed a window event to egui. Returns whether it wants a repaint.
    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.state.on_window_event(window, event).repaint
    }

    /// egui asked to be repainted within this long.
    pub fn repaint_after(&self) -> Option<Duration> {
        self.repaint_after
    }

    /// Run one egui pass and record it into `target`. Returns the commands
    /// issued, tagged with the index of the player they belong to.
    pub fn render<M: MediaElement>(
        &mut self,
        target: FrameTarget<'_>,
        window: &Window,
        dashboard: Dashboard<'_, M>,
    ) -> Result<Vec<(usize, TransportCommand)>> {
        let raw_input = self.state.take_egui_input(window);

        let show_briefing = &mut self.show_briefing;
        let mut commands = Vec::new();
        let Dashboard {
            title,
            players,
            briefing,
            fired,
        } = dashboard;

        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, title, players, briefing, fired, show_briefing, &mut commands);
        });

        self.state.handle_platform_output(window, full_output.platform_output);
        self.repaint_after = full_output
            .viewport_output
            .get(&egui::ViewportId::ROOT)
            .map(|viewport| viewport.repaint_delay);

        let tris = self
            .context
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer
                .update_texture(target.device, target.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: target.size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer
            .update_buffers(target.device, target.queue, target.encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(commands)
    }

    fn ui_content<M: MediaElement>(
        ctx: &egui::Context,
        title: &str,
        players: &mut [TacticalAudioPlayer<M>],
        briefing: Option<&Briefing>,
        fired: &[FrameId],
        show_briefing: &mut bool,
        commands: &mut Vec<(usize, TransportCommand)>,
    ) {
        egui::TopBottomPanel::top("mission_header").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading(title.to_uppercase());
                if briefing.is_some() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        ui.weak("F1 toggles briefing");
                    });
                }
            });
        });

        if let Some(briefing) = briefing.filter(|_| *show_briefing) {
            egui::SidePanel::right("briefing")
                .default_width(360.0)
                .resizable(true)
                .show(ctx, |ui| {
                    egui::ScrollArea::vertical().show(ui, |ui| panel::briefing_panel(ui, briefing));
                });
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                for (index, player) in players.iter_mut().enumerate() {
                    egui::Frame::group(ui.style()).show(ui, |ui| {
                        let issued = panel::player_panel(ui, player, fired);
                        commands.extend(issued.into_iter().map(|command| (index, command)));
                    });
                    ui.add_space(8.0);
                }
            });
        });

        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            *show_briefing = !*show_briefing;
        }
    }
}
