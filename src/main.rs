//! Pyre Arena Headless Runner
//!
//! Runs two sessions in one room over the loopback transport with scripted
//! input, then logs what happened. The first argument is an optional launch
//! query string, e.g. `"char=herald&mode=shooting&arena=large"`. With a
//! `room` parameter the local session joins that room on the server named by
//! `PYRE_ARENA_SERVER` instead of the loopback room.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec2;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pyre_arena::{
    bridge::{HeadlessSurface, MemoryStore, RecordingAudio, SoundCue},
    config::SimConfig,
    game::{
        animation::CharacterAssets,
        events::GameEventData,
        input::InputState,
        mode::ModeEvent,
        session::{join_room, Session, SessionSetup},
    },
    network::{LoopbackHub, StaticTextureLoader},
    LaunchParams, PlayerId, FRAME_RATE, VERSION,
};

/// Demo length (20 seconds at the nominal frame rate).
const DEMO_FRAMES: u32 = 20 * FRAME_RATE;

/// Room server used when none is configured.
const DEFAULT_SERVER: &str = "ws://127.0.0.1:8080";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Pyre Arena headless v{}", VERSION);

    let query = std::env::args().nth(1).unwrap_or_else(|| "mode=shooting".to_string());
    let config = match std::env::var("PYRE_ARENA_CONFIG") {
        Ok(path) => SimConfig::load(&path).with_context(|| format!("loading config from {path}"))?,
        Err(_) => SimConfig::default(),
    };

    demo(&query, config).await
}

/// Two players in one loopback room.
async fn demo(query: &str, config: SimConfig) -> Result<()> {
    let seed: u64 = rand::random();
    let assets = Arc::new(CharacterAssets::uniform(6, 10.0));
    let loader = Arc::new(StaticTextureLoader::new());
    let hub = LoopbackHub::new();

    info!(%query, seed, "starting demo");

    let params = LaunchParams::parse(query);
    let local_id = PlayerId::random();
    let peer_id = PlayerId::random();

    let mut local = Session::start(
        SessionSetup::new(local_id, MemoryStore::shared(), assets.clone(), loader.clone())
            .with_config(config.clone())
            .with_params(params.clone())
            .with_seed(seed),
    )
    .context("starting local session")?;

    match &params.room {
        Some(room) => {
            let server = std::env::var("PYRE_ARENA_SERVER").unwrap_or_else(|_| DEFAULT_SERVER.to_string());
            match join_room(&server, room, local_id, &local.config().session).await {
                Ok(transport) => local.attach_transport(Box::new(transport)),
                Err(e) => {
                    warn!(%room, error = %e, "room join failed, using loopback");
                    local.attach_transport(Box::new(hub.join(local_id)));
                }
            }
        }
        None => local.attach_transport(Box::new(hub.join(local_id))),
    }

    let mut peer = Session::start(
        SessionSetup::new(peer_id, MemoryStore::shared(), assets, loader)
            .with_config(config)
            .with_params(LaunchParams::parse("char=herald"))
            .with_seed(seed.wrapping_add(1)),
    )
    .context("starting peer session")?;
    peer.attach_transport(Box::new(hub.join(peer_id)));

    let mut surface = HeadlessSurface::new();
    let mut peer_surface = HeadlessSurface::new();
    let mut audio = RecordingAudio::default();
    let mut peer_audio = RecordingAudio::default();

    let dt = 1.0 / FRAME_RATE as f32;
    let mut kills = 0u32;
    let mut damage_taken = 0.0f32;
    let mut total_events = 0usize;

    for frame in 0..DEMO_FRAMES {
        let t = frame as f32 * dt;

        // Walk a slow circle, shoot ahead and jump now and then
        let mut input = InputState::with_movement(t.cos(), t.sin());
        input.cursor = Some(Vec2::new(8.0 * (t * 0.5).cos(), 8.0 * (t * 0.5).sin()));
        input.set(InputState::FIRE, frame % 30 < 15);
        input.set(InputState::MORTAR, frame % 120 == 0);
        input.set(InputState::JUMP, frame % 90 == 0);
        input.set(InputState::MELEE, frame % 200 == 100);

        let report = local.tick(dt, input, &mut surface, &mut audio);
        peer.tick(dt, InputState::new(), &mut peer_surface, &mut peer_audio);
        total_events += report.events.len();

        for event in &report.events {
            match &event.data {
                GameEventData::BotKilled { bot_id } => {
                    kills += 1;
                    info!(frame = report.frame, bot = %bot_id.short(), "bot down");
                }
                GameEventData::DamageTaken { amount, .. } => damage_taken += amount,
                GameEventData::RemoteSpawned { player_id } => {
                    info!(frame = report.frame, player = %player_id.short(), "peer visible");
                }
                GameEventData::Mode(ModeEvent::RecordBroken { record, .. }) => {
                    info!(frame = report.frame, ?record, "record broken");
                }
                _ => {}
            }
        }

        if frame % FRAME_RATE == 0 {
            // Let remote spawn preparation make progress
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        if frame % (5 * FRAME_RATE) == 0 {
            let p = local.local().position;
            info!(
                frame = report.frame,
                x = p.x,
                y = p.y,
                z = p.z,
                health = local.local().health,
                remotes = local.replication().len(),
                projectiles = local.projectiles().len(),
                "progress"
            );
        }
    }

    let state = local.mode_state();
    info!("=== Demo Results ===");
    info!(
        mode = %state.mode,
        arena = %state.arena,
        score = state.score,
        kills,
        deaths = state.deaths,
        damage_taken,
        total_events,
        "local session"
    );
    info!(
        firebolts = audio.count(SoundCue::Firebolt),
        mortars = audio.count(SoundCue::MortarLaunch),
        jumps = audio.count(SoundCue::Jump),
        peer_sees = peer.replication().len(),
        "activity"
    );

    local.detach_transport();
    peer.detach_transport();
    Ok(())
}
