use egui::{Button, Color32, ProgressBar, Rect, RichText, Sense, Ui, Vec2};

use super::transport::{scrub_target, TransportCommand, TransportModel, SKIP_SECONDS};
use crate::audio::{ErrorKind, MediaElement};
use crate::briefing::{Briefing, Segment};
use crate::graphics::{paint, EguiCanvas, FrameId};
use crate::player::TacticalAudioPlayer;

const WAVEFORM_HEIGHT: f32 = 64.0;
const SCRUB_HEIGHT: f32 = 6.0;
const ERROR_RED: Color32 = Color32::from_rgb(0xef, 0x44, 0x44);

fn rgb(color: [u8; 3]) -> Color32 {
    Color32::from_rgb(color[0], color[1], color[2])
}

/// Draw one player and collect what the user asked it to do.
pub fn player_panel<M: MediaElement>(
    ui: &mut Ui,
    player: &mut TacticalAudioPlayer<M>,
    fired: &[FrameId],
) -> Vec<TransportCommand> {
    let model = player.transport();
    let accent = rgb(player.theme().accent());
    let mut commands = Vec::new();

    ui.horizontal(|ui| {
        ui.label(RichText::new(&model.title).strong().color(accent));
        if model.synthetic {
            ui.label(RichText::new("SYNTHETIC").small().color(Color32::YELLOW))
                .on_hover_text(ErrorKind::AnalysisGraphFailure.user_message());
        }
    });

    let sense = if model.can_seek { Sense::click() } else { Sense::hover() };
    let (rect, response) =
        ui.allocate_exact_size(Vec2::new(ui.available_width(), WAVEFORM_HEIGHT), sense);
    if let Some(frame) = player.frame(fired, rect.width(), rect.height()) {
        paint(frame, &mut EguiCanvas::new(ui.painter(), rect));
    }
    if !model.can_seek {
        ui.painter().rect_filled(rect, 4.0, Color32::from_black_alpha(90));
    }
    if response.clicked() {
        push_seek(&response, rect, model.duration, &mut commands);
    }

    ui.horizontal(|ui| {
        let label = if model.playing { "⏸" } else { "▶" };
        if ui
            .add_enabled(model.can_play, Button::new(label))
            .on_hover_text(model.button_title.as_str())
            .on_disabled_hover_text(model.button_title.as_str())
            .clicked()
        {
            commands.push(TransportCommand::TogglePlay);
        }
        if ui.add_enabled(model.can_seek, Button::new("-10s")).clicked() {
            commands.push(TransportCommand::Skip(-SKIP_SECONDS));
        }
        if ui.add_enabled(model.can_seek, Button::new("+10s")).clicked() {
            commands.push(TransportCommand::Skip(SKIP_SECONDS));
        }
        ui.separator();
        ui.monospace(format!("{} / {}", model.elapsed, model.total));
        ui.monospace(RichText::new(&model.remaining).weak());
    });

    scrub_bar(ui, &model, accent, &mut commands);

    if model.loading {
        if model.loading_progress > 0.0 {
            ui.add(ProgressBar::new(model.loading_progress / 100.0).text(model.button_title.as_str()));
        } else {
            ui.weak(model.button_title.as_str());
        }
    }

    if let Some(message) = model.error {
        ui.horizontal(|ui| {
            ui.colored_label(ERROR_RED, message);
            if model.offers_download && ui.button("Download audio").clicked() {
                commands.push(TransportCommand::Download);
            }
        });
    }
    if let Some(notice) = player.notice() {
        ui.small(notice);
    }

    commands
}

fn scrub_bar(ui: &mut Ui, model: &TransportModel, accent: Color32, commands: &mut Vec<TransportCommand>) {
    let sense = if model.can_seek {
        Sense::click_and_drag()
    } else {
        Sense::hover()
    };
    let (rect, response) =
        ui.allocate_exact_size(Vec2::new(ui.available_width(), SCRUB_HEIGHT), sense);

    let dim = if model.can_seek { 1.0 } else { 0.4 };
    let painter = ui.painter();
    painter.rect_filled(rect, 2.0, Color32::from_gray(48).gamma_multiply(dim));
    let filled = Rect::from_min_size(rect.min, Vec2::new(rect.width() * model.progress, rect.height()));
    painter.rect_filled(filled, 2.0, accent.gamma_multiply(dim));

    if response.clicked() || response.dragged() {
        push_seek(&response, rect, model.duration, commands);
    }
}

fn push_seek(response: &egui::Response, rect: Rect, duration: f64, commands: &mut Vec<TransportCommand>) {
    let Some(pos) = response.interact_pointer_pos() else {
        return;
    };
    if let Some(target) = scrub_target(pos.x - rect.min.x, rect.width(), duration) {
        commands.push(TransportCommand::Seek(target));
    }
}

pub fn briefing_panel(ui: &mut Ui, briefing: &Briefing) {
    if let Some(marker) = briefing.assessment {
        ui.label(
            RichText::new(format!("ASSESSMENT {}", marker.label().trim_end_matches(':')))
                .strong()
                .color(rgb(marker.color())),
        );
        ui.separator();
    }

    for section in &briefing.sections {
        egui::CollapsingHeader::new(section.title.as_str())
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing.x = 0.0;
                    for segment in &section.segments {
                        match segment {
                            Segment::Plain(text) => {
                                ui.label(text.as_str());
                            }
                            Segment::Label(marker) => {
                                ui.label(
                                    RichText::new(format!("● {} ", marker.label()))
                                        .strong()
                                        .color(rgb(marker.color())),
                                );
                            }
                            Segment::Mention(marker, word) => {
                                ui.label(RichText::new(word.as_str()).color(rgb(marker.color())));
                            }
                        }
                    }
                });
            });
    }
}
