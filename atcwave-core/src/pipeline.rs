//! Radio Pipeline — §4.6. Turns expanded `ATCMessage`s into sequential,
//! single-voice-at-a-time playback via two dedicated workers.
//!
//! ```text
//! Exchange Planner ──▶ radioQueue (message_buffer_size) ──▶ TTS pre-warm worker
//!                                                               │
//!                                                        prepQueue (size 2)
//!                                                               │
//!                                                          playback worker ──▶ speakers
//! ```
//!
//! The playback worker's blocking dequeue is the pipeline's only clock:
//! when `prepQueue` fills the pre-warm worker blocks, and when `radioQueue`
//! fills the planner blocks, so backpressure travels all the way back to
//! the ingest-driven aircraft channel (which drops instead of blocking).

use crate::error::PipelineError;
use crate::model::{AtcMessage, NoiseType, VoiceMetadata};
use crate::voice::VoiceSessionManager;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

pub struct PipelineConfig {
    pub message_buffer_size: usize,
    pub tts_binary: PathBuf,
    pub effects_binary: PathBuf,
    pub length_scale: f32,
}

/// A TTS process mid-flight: its stdout feeds the effects subprocess while
/// the playback worker catches up. Single-producer, single-consumer.
struct PreparedAudio {
    tts: Child,
    metadata: VoiceMetadata,
    message: AtcMessage,
}

/// Spawns the pre-warm and playback workers and returns the sender side of
/// `radioQueue`. Dropping the sender (or the Exchange Planner exiting)
/// drains both queues and ends both worker tasks.
pub fn spawn(
    config: PipelineConfig,
    voices: Arc<VoiceSessionManager>,
    seed: u64,
) -> mpsc::Sender<AtcMessage> {
    let (radio_tx, radio_rx) = mpsc::channel(config.message_buffer_size);
    let (prep_tx, prep_rx) = mpsc::channel(2);

    let tts_binary = config.tts_binary.clone();
    let effects_binary = config.effects_binary;
    let length_scale = config.length_scale;
    let prewarm_voices = Arc::clone(&voices);

    tokio::spawn(async move {
        run_prewarm(radio_rx, prep_tx, prewarm_voices, tts_binary, length_scale).await;
    });

    tokio::spawn(async move {
        run_playback(prep_rx, voices, effects_binary, seed).await;
    });

    radio_tx
}

async fn run_prewarm(
    mut radio_rx: mpsc::Receiver<AtcMessage>,
    prep_tx: mpsc::Sender<PreparedAudio>,
    voices: Arc<VoiceSessionManager>,
    tts_binary: PathBuf,
    length_scale: f32,
) {
    tracing::info!("TTS pre-warm worker started");
    while let Some(message) = radio_rx.recv().await {
        let airborne = message.aircraft.altitude_ft > 0.0;
        let voice_name = match message.speaker {
            crate::model::EndpointKind::Pilot => {
                voices.active_voice_for(&crate::voice::pilot_key(&message.aircraft.comms.callsign))
            }
            crate::model::EndpointKind::Atc => {
                voices.active_voice_for(&crate::voice::atc_key(&message.controller_icao, &message.role_label))
            }
        }
        .unwrap_or_else(|| "default".to_string());

        let metadata = voices.metadata(&voice_name, message.speaker, airborne);

        match launch_tts(&tts_binary, &metadata, length_scale, &message.text).await {
            Ok(tts) => {
                let prepared = PreparedAudio {
                    tts,
                    metadata,
                    message,
                };
                if prep_tx.send(prepared).await.is_err() {
                    tracing::warn!("prepQueue closed, dropping prepared audio");
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "TTS spawn failed, dropping message");
            }
        }
    }
    tracing::info!("TTS pre-warm worker stopped");
}

async fn launch_tts(
    tts_binary: &std::path::Path,
    metadata: &VoiceMetadata,
    length_scale: f32,
    text: &str,
) -> Result<Child, PipelineError> {
    let mut child = Command::new(tts_binary)
        .arg("--model")
        .arg(&metadata.model_path)
        .arg("--length_scale")
        .arg(length_scale.to_string())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(PipelineError::TtsSpawn)?;

    let mut stdin = child.stdin.take().ok_or(PipelineError::MissingStdin)?;
    stdin
        .write_all(text.as_bytes())
        .await
        .map_err(PipelineError::TtsSpawn)?;
    drop(stdin);

    Ok(child)
}

async fn run_playback(
    mut prep_rx: mpsc::Receiver<PreparedAudio>,
    voices: Arc<VoiceSessionManager>,
    effects_binary: PathBuf,
    seed: u64,
) {
    tracing::info!("playback worker started");
    let rng = parking_lot::Mutex::new(StdRng::seed_from_u64(seed));

    while let Some(prepared) = prep_rx.recv().await {
        let voice_lock = voices.voice_lock(&prepared.metadata.voice);
        let _guard = voice_lock.lock().await;

        if let Err(err) = play_one(prepared, &effects_binary).await {
            tracing::warn!(error = %err, "playback failed for transmission");
        }

        let sleep_ms = { rng.lock().gen_range(500..=1000) };
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
    }
    tracing::info!("playback worker stopped");
}

async fn play_one(prepared: PreparedAudio, effects_binary: &std::path::Path) -> Result<(), PipelineError> {
    let PreparedAudio {
        mut tts, metadata, message,
    } = prepared;
    let tts_stdout = tts.stdout.take().ok_or(PipelineError::MissingStdin)?;

    let noise_arg = metadata.noise.label();
    let mut effects = Command::new(effects_binary)
        .arg("-")
        .arg("-d")
        .arg("bandpass")
        .arg("1350")
        .arg("150")
        .arg("overdrive")
        .arg("20")
        .arg("tremolo")
        .arg("5")
        .arg("40")
        .arg("pad")
        .arg("0")
        .arg("0.3")
        .arg("synth")
        .arg(noise_arg)
        .stdin(TryInto::<Stdio>::try_into(tts_stdout).map_err(|_| PipelineError::MissingStdin)?)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(PipelineError::EffectsSpawn)?;

    tracing::debug!(
        key = %message.aircraft.key(),
        voice = %metadata.voice,
        role = %message.role_label,
        "playing transmission"
    );

    let _ = tts.wait().await;
    let _ = effects.wait().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_labels_are_stable_sox_synth_names() {
        assert_eq!(NoiseType::Pink.label(), "pinknoise");
        assert_eq!(NoiseType::Brown.label(), "brownnoise");
    }
}
