//! Runtime configuration. Loaded from `config.yaml` by
//! `atcwave-cli::config_loader`; this module owns only the shape and
//! defaults, not the file search or YAML parsing.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_message_buffer_size() -> usize {
    16
}

fn default_say_again_factor() -> u32 {
    20
}

fn default_handoff_valediction_factor() -> u32 {
    4
}

fn default_release_cooldown_secs() -> u64 {
    15
}

fn default_voice_cleaner_interval_secs() -> u64 {
    60
}

fn default_voice_idle_timeout_secs() -> u64 {
    1200
}

fn default_voice_pilot_max_range_nm() -> f64 {
    150.0
}

fn default_voice_atc_max_range_nm() -> f64 {
    400.0
}

fn default_length_scale() -> f32 {
    0.7
}

fn default_mock_port() -> u16 {
    8086
}

fn default_max_ai_aircraft() -> usize {
    8
}

/// Every tunable named across §2/§4/§6, plus the file paths and network
/// endpoints `atcwave-sim` and `atcwave-cli` need to start a real process.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_message_buffer_size")]
    pub message_buffer_size: usize,
    #[serde(default = "default_say_again_factor")]
    pub say_again_factor: u32,
    #[serde(default = "default_handoff_valediction_factor")]
    pub handoff_valediction_factor: u32,
    #[serde(default = "default_release_cooldown_secs")]
    pub release_cooldown_secs: u64,
    #[serde(default = "default_voice_cleaner_interval_secs")]
    pub voice_cleaner_interval_secs: u64,
    #[serde(default = "default_voice_idle_timeout_secs")]
    pub voice_idle_timeout_secs: u64,
    #[serde(default = "default_voice_pilot_max_range_nm")]
    pub voice_pilot_max_range_nm: f64,
    #[serde(default = "default_voice_atc_max_range_nm")]
    pub voice_atc_max_range_nm: f64,
    #[serde(default = "default_length_scale")]
    pub tts_length_scale: f32,

    pub tts_binary: PathBuf,
    pub effects_binary: PathBuf,
    pub airport_data_path: PathBuf,
    pub region_data_path: PathBuf,
    pub phrase_catalogue_path: PathBuf,
    pub unicom_phrase_catalogue_path: PathBuf,
    pub voice_model_dir: PathBuf,

    pub simulator_base_url: String,

    #[serde(default = "default_mock_port")]
    pub mock_port: u16,

    /// Upper bound on AI traffic slots the dataref bridge resolves and
    /// subscribes to at startup.
    #[serde(default = "default_max_ai_aircraft")]
    pub max_ai_aircraft: usize,
}

impl Config {
    pub fn release_cooldown(&self) -> Duration {
        Duration::from_secs(self.release_cooldown_secs)
    }

    pub fn voice_cleaner_interval(&self) -> Duration {
        Duration::from_secs(self.voice_cleaner_interval_secs)
    }

    pub fn voice_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.voice_idle_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_in_defaults() {
        let yaml = r#"
tts_binary: /usr/local/bin/piper
effects_binary: /usr/bin/sox
airport_data_path: data/airports.dat
region_data_path: data/regions.txt
phrase_catalogue_path: data/phrases.json
unicom_phrase_catalogue_path: data/unicom.json
voice_model_dir: data/voices
simulator_base_url: http://127.0.0.1:8086
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.message_buffer_size, 16);
        assert_eq!(config.tts_length_scale, 0.7);
        assert_eq!(config.release_cooldown(), Duration::from_secs(15));
        assert_eq!(config.mock_port, 8086);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let yaml = r#"
message_buffer_size: 32
say_again_factor: 50
tts_binary: /usr/local/bin/piper
effects_binary: /usr/bin/sox
airport_data_path: data/airports.dat
region_data_path: data/regions.txt
phrase_catalogue_path: data/phrases.json
unicom_phrase_catalogue_path: data/unicom.json
voice_model_dir: data/voices
simulator_base_url: http://127.0.0.1:8086
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.message_buffer_size, 32);
        assert_eq!(config.say_again_factor, 50);
    }
}
