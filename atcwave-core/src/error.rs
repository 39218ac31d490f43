//! Error types for the core ATC pipeline.
//!
//! The locator never errors (see `locator.rs`); these cover the
//! components that can fail: phrase catalogue parsing, voice resolution
//! bookkeeping, and the radio pipeline's subprocess plumbing.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhraseError {
    #[error("failed to parse phrase catalogue: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("phrase catalogue has no exchanges for phase {0:?}")]
    EmptyPhase(crate::model::AtcPhase),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to spawn tts process: {0}")]
    TtsSpawn(std::io::Error),
    #[error("failed to spawn audio-effects process: {0}")]
    EffectsSpawn(std::io::Error),
    #[error("tts stdin unavailable")]
    MissingStdin,
}
