//! Offline replay host: drives the lip-sync engine over a saved speech
//! response at a fixed frame rate and prints every shape change.
//!
//! Output is newline-delimited JSON on stdout; tracing goes to stderr.

use anyhow::Context;
use lipsync::{
    Clock, FaceMesh, LipSyncConfig, LipSyncEngine, ManualClock, MorphTargets, TickOutcome, Utterance,
};
use std::path::PathBuf;

const USAGE: &str = "usage: lipsync-replay <utterance.json> <shape1,shape2,...> [mapping.json]";

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let utterance_path = PathBuf::from(args.next().context(USAGE)?);
    let shapes = args.next().context(USAGE)?;
    let mapping_path = args.next().map(PathBuf::from);

    let config_path = LipSyncConfig::default_config_path();
    let mut config = LipSyncConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;
    if mapping_path.is_some() {
        config.mapping.path = mapping_path;
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.filter)),
        )
        .init();

    let utterance = Utterance::from_file(&utterance_path)
        .with_context(|| format!("failed to read {}", utterance_path.display()))?;
    let mesh = FaceMesh::from_shape_names(
        shapes
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned),
    );

    replay(config, mesh, &utterance)
}

fn replay(config: LipSyncConfig, mesh: FaceMesh, utterance: &Utterance) -> anyhow::Result<()> {
    let frame_secs = config.playback.frame_interval_secs();
    let clock = ManualClock::new(0.0);
    let mut engine = LipSyncEngine::with_clock(config, clock.clone());
    engine.load_mesh(mesh);

    let duration = utterance.playable_duration(None);
    let timeline = engine.build_timeline(&utterance.visemes, duration);
    println!(
        "{}",
        serde_json::json!({ "text": utterance.answer_text, "timeline": &timeline })
    );

    if !engine.start(timeline, duration) {
        tracing::info!("no visemes in utterance, nothing to replay");
        return Ok(());
    }

    let mut frame: u64 = 0;
    let mut last_index = None;
    loop {
        let time = clock.now();
        match engine.tick() {
            TickOutcome::Active {
                index,
                viseme,
                slot,
            } => {
                if last_index != Some(index) {
                    let shape = slot.and_then(|slot| shape_name(&engine, slot));
                    println!(
                        "{}",
                        serde_json::json!({
                            "frame": frame,
                            "time": time,
                            "index": index,
                            "viseme": viseme,
                            "shape": shape,
                        })
                    );
                    last_index = Some(index);
                }
            }
            TickOutcome::Finished => {
                println!(
                    "{}",
                    serde_json::json!({ "frame": frame, "time": time, "event": "finished" })
                );
                break;
            }
            TickOutcome::Idle => break,
        }
        frame += 1;
        clock.advance(frame_secs);
    }

    tracing::info!(frames = frame, "replay complete");
    Ok(())
}

fn shape_name(engine: &LipSyncEngine<FaceMesh, ManualClock>, slot: usize) -> Option<String> {
    engine
        .mesh()?
        .shape_dictionary()
        .iter()
        .find(|(_, s)| **s == slot)
        .map(|(name, _)| name.clone())
}
