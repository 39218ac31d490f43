//! Voice model directory scanner — §6 "Voice models (consumed)".
//!
//! One model file per voice. The filename's locale prefix (e.g. `enGB` in
//! `enGB-alan-medium.onnx`) identifies the voice's country: not the first
//! two characters (the language code) but the third and fourth (the
//! region code), since pools group by country, not language. An optional
//! sidecar `<file>.json` carries `{"audio": {"sample_rate": N}}`.

use atcwave_core::voice::{VoiceModelInfo, VoicePools};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceLoadError {
    #[error("failed to read voice model directory {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Deserialize)]
struct Sidecar {
    audio: Option<SidecarAudio>,
}

#[derive(Deserialize)]
struct SidecarAudio {
    sample_rate: Option<u32>,
}

fn locale_token(stem: &str) -> String {
    stem.chars().take_while(|c| c.is_ascii_alphabetic()).collect()
}

/// Extracts the ISO country code from a locale token: characters 3-4 when
/// present, else the whole token uppercased.
fn iso_country(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() >= 4 {
        chars[2..4].iter().collect::<String>().to_uppercase()
    } else {
        token.to_uppercase()
    }
}

pub struct LoadedVoices {
    pub pools: VoicePools,
    pub models: HashMap<String, VoiceModelInfo>,
}

pub fn load(dir: &Path) -> Result<LoadedVoices, VoiceLoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| VoiceLoadError::Io {
        path: dir.display().to_string(),
        source,
    })?;

    let mut pools: HashMap<String, Vec<String>> = HashMap::new();
    let mut models = HashMap::new();

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            continue; // sidecar, read alongside its model below
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let voice_name = stem.to_string();
        let token = locale_token(stem);
        let country = iso_country(&token);

        let sidecar_path = path.with_extension(format!(
            "{}.json",
            path.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));
        let sample_rate = std::fs::read_to_string(&sidecar_path)
            .ok()
            .and_then(|text| serde_json::from_str::<Sidecar>(&text).ok())
            .and_then(|sidecar| sidecar.audio)
            .and_then(|audio| audio.sample_rate)
            .unwrap_or(atcwave_core::model::DEFAULT_SAMPLE_RATE_HZ);

        pools.entry(country).or_default().push(voice_name.clone());
        models.insert(
            voice_name,
            VoiceModelInfo {
                model_path: path,
                sample_rate,
            },
        );
    }

    Ok(LoadedVoices {
        pools: VoicePools { by_country: pools },
        models,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_by_characters_three_and_four() {
        assert_eq!(iso_country(&locale_token("enGB-alan-medium")), "GB");
        assert_eq!(iso_country(&locale_token("deDE-eva")), "DE");
    }

    #[test]
    fn short_token_falls_back_to_whole_token() {
        assert_eq!(iso_country(&locale_token("en")), "EN");
    }

    #[test]
    fn loads_model_and_sidecar_sample_rate() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("enGB-alan-medium.onnx"), b"model").unwrap();
        std::fs::write(
            dir.path().join("enGB-alan-medium.onnx.json"),
            r#"{"audio": {"sample_rate": 24000}}"#,
        )
        .unwrap();
        let loaded = load(dir.path()).unwrap();
        assert_eq!(
            loaded.models["enGB-alan-medium"].sample_rate,
            24000
        );
        assert!(loaded.pools.by_country.contains_key("GB"));
    }
}
