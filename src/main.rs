use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

use operation_dq::briefing::Briefing;
use operation_dq::config::MissionConfig;
use operation_dq::graphics::{AnimationFrames, GraphicsEngine};
use operation_dq::ui::{Dashboard, UserInterface};
use operation_dq::TacticalAudioPlayer;

const TICK: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "operation-dq")]
#[command(about = "Tactical audio player for mission briefings")]
struct Cli {
    /// Mission file (JSON) listing players and an optional briefing
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Window title override
    #[arg(short, long)]
    title: Option<String>,

    /// Briefing text shown beside the players
    #[arg(short, long, value_name = "FILE")]
    briefing: Option<PathBuf>,

    /// Audio files to mount when no mission file is given
    #[arg(value_name = "AUDIO")]
    audio: Vec<PathBuf>,
}

fn load_mission(cli: &Cli) -> Result<MissionConfig> {
    let mut config = match &cli.config {
        Some(path) => MissionConfig::load(path)?,
        None => MissionConfig::from_paths(cli.audio.iter().cloned()),
    };
    if let Some(title) = &cli.title {
        config.window_title = title.clone();
    }
    if cli.briefing.is_some() {
        config.briefing = cli.briefing.clone();
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = load_mission(&cli).context("Invalid mission setup")?;
    info!(
        "Starting {} with {} player(s)",
        config.window_title,
        config.players.len()
    );

    let briefing = config.briefing.as_deref().and_then(|path| match Briefing::load(path) {
        Ok(briefing) => Some(briefing),
        Err(e) => {
            warn!("Briefing unavailable: {:#}", e);
            None
        }
    });

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(&config.window_title)
            .with_inner_size(winit::dpi::LogicalSize::new(1200, 800))
            .build(&event_loop)?,
    );

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(Arc::clone(&window)))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);

    let frames = AnimationFrames::new();
    let download_dir = config.download_dir();
    let mut players: Vec<TacticalAudioPlayer> = config
        .players
        .iter()
        .map(|player| {
            TacticalAudioPlayer::open(
                player,
                frames.clone(),
                config.load_timeout(),
                download_dir.clone(),
            )
        })
        .collect();

    info!("Player initialized successfully");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => match event {
            WindowEvent::CloseRequested => {
                info!("Close requested");
                players.iter_mut().for_each(TacticalAudioPlayer::dispose);
                elwt.exit();
            }
            WindowEvent::KeyboardInput { event: ref key, .. }
                if key.physical_key == PhysicalKey::Code(KeyCode::Escape)
                    && key.state == ElementState::Pressed =>
            {
                info!("Escape pressed");
                players.iter_mut().for_each(TacticalAudioPlayer::dispose);
                elwt.exit();
            }
            WindowEvent::Resized(physical_size) => {
                graphics_engine.resize(physical_size);
                window_clone.request_redraw();
            }
            WindowEvent::RedrawRequested => {
                let fired = frames.fire();
                let mut commands = Vec::new();
                let mut drawn = false;
                let result = graphics_engine.render(|target| {
                    drawn = true;
                    commands = ui.render(
                        target,
                        &window_clone,
                        Dashboard {
                            title: &config.window_title,
                            players: &mut players,
                            briefing: briefing.as_ref(),
                            fired: &fired,
                        },
                    )?;
                    Ok(())
                });
                if let Err(e) = result {
                    error!("Render error: {:#}", e);
                }
                if !drawn {
                    frames.requeue(&fired);
                }

                if !commands.is_empty() {
                    for (index, command) in commands {
                        if let Some(player) = players.get_mut(index) {
                            pollster::block_on(player.apply(command));
                        }
                    }
                    window_clone.request_redraw();
                }
            }
            other => {
                if ui.handle_event(&other, &window_clone) {
                    window_clone.request_redraw();
                }
            }
        },
        Event::AboutToWait => {
            let now = Instant::now();
            let mut changed = false;
            for player in &mut players {
                changed |= pollster::block_on(player.update(now));
            }

            let egui_due = ui.repaint_after().map_or(false, |delay| delay.is_zero());
            if changed || frames.has_pending() || egui_due {
                window_clone.request_redraw();
            }

            // Poll media only while a player is loading or playing
            let control_flow = if players.iter().any(TacticalAudioPlayer::is_busy) {
                ControlFlow::WaitUntil(now + TICK)
            } else {
                ui.repaint_after()
                    .and_then(|delay| now.checked_add(delay))
                    .map_or(ControlFlow::Wait, ControlFlow::WaitUntil)
            };
            elwt.set_control_flow(control_flow);
        }
        _ => {}
    })?;

    Ok(())
}
