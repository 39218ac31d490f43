//! Voice Session Manager — §4.5. Assigns a stable voice identity per
//! endpoint, prevents conversational partners from sharing a voice, and
//! reclaims voices as aircraft depart or go silent.

use crate::geo::{haversine_nm, Point};
use crate::model::{EndpointKind, NoiseType, VoiceMetadata, VoiceSession, DEFAULT_SAMPLE_RATE_HZ};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Voice pools grouped by ISO country code, built once from the voice
/// model directory by `atcwave-sim::voice_loader`.
#[derive(Debug, Clone, Default)]
pub struct VoicePools {
    pub by_country: HashMap<String, Vec<String>>,
}

impl VoicePools {
    fn region_candidates(&self, country_code: &str) -> Vec<String> {
        let first = country_code.chars().next();
        let Some(first) = first else { return Vec::new() };
        let mut out = Vec::new();
        for (code, voices) in &self.by_country {
            if code.chars().next() == Some(first) {
                out.extend(voices.iter().cloned());
            }
        }
        out
    }

    fn global_candidates(&self) -> Vec<String> {
        self.by_country.values().flatten().cloned().collect()
    }
}

struct SessionEntry {
    session: VoiceSession,
    /// Nonzero while a release is pending; a timer only deletes the entry
    /// if this still matches the epoch it was scheduled with, so a resolve
    /// in the interim (which resets this to 0) cancels the release.
    release_epoch: u64,
}

/// Metadata for a known voice model file, from `atcwave-sim::voice_loader`.
#[derive(Debug, Clone)]
pub struct VoiceModelInfo {
    pub model_path: PathBuf,
    pub sample_rate: u32,
}

pub struct VoiceSessionManager {
    pools: VoicePools,
    models: HashMap<String, VoiceModelInfo>,
    sessions: Mutex<HashMap<String, SessionEntry>>,
    voice_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    rng: Mutex<StdRng>,
    release_epoch_counter: AtomicU64,
    idle_timeout: Duration,
    pilot_max_range_nm: f64,
    atc_max_range_nm: f64,
}

/// Symmetric session key: `<callsign-or-registration>_PILOT` or
/// `<icao>_<role-label>`, per spec §3.
pub fn pilot_key(callsign_or_registration: &str) -> String {
    format!("{callsign_or_registration}_PILOT")
}

pub fn atc_key(icao: &str, role_label: &str) -> String {
    format!("{icao}_{role_label}")
}

impl VoiceSessionManager {
    pub fn new(
        pools: VoicePools,
        models: HashMap<String, VoiceModelInfo>,
        seed: u64,
        idle_timeout: Duration,
        pilot_max_range_nm: f64,
        atc_max_range_nm: f64,
    ) -> Self {
        Self {
            pools,
            models,
            sessions: Mutex::new(HashMap::new()),
            voice_locks: Mutex::new(HashMap::new()),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            release_epoch_counter: AtomicU64::new(0),
            idle_timeout,
            pilot_max_range_nm,
            atc_max_range_nm,
        }
    }

    /// Resolves (or assigns) the voice for `key`, forbidding
    /// `partner_voice` where possible. Always returns a voice.
    pub fn resolve(
        &self,
        key: &str,
        endpoint: EndpointKind,
        country_code: &str,
        position: Point,
        partner_voice: Option<&str>,
    ) -> String {
        let mut sessions = self.sessions.lock();

        if let Some(entry) = sessions.get_mut(key) {
            entry.session.last_seen = Instant::now();
            entry.session.position = position;
            entry.release_epoch = 0; // resolving cancels a pending release
            return entry.session.voice.clone();
        }

        let in_use: std::collections::HashSet<String> =
            sessions.values().map(|e| e.session.voice.clone()).collect();

        let tiers: [Vec<String>; 3] = [
            self.pools
                .by_country
                .get(country_code)
                .cloned()
                .unwrap_or_default(),
            self.pools.region_candidates(country_code),
            self.pools.global_candidates(),
        ];

        let voice = self.pick_voice(&tiers, partner_voice, &in_use, &sessions);

        sessions.insert(
            key.to_string(),
            SessionEntry {
                session: VoiceSession {
                    voice: voice.clone(),
                    last_seen: Instant::now(),
                    position,
                    endpoint,
                },
                release_epoch: 0,
            },
        );

        voice
    }

    fn pick_voice(
        &self,
        tiers: &[Vec<String>; 3],
        partner_voice: Option<&str>,
        in_use: &std::collections::HashSet<String>,
        sessions: &HashMap<String, SessionEntry>,
    ) -> String {
        for tier in tiers {
            let candidates: Vec<&String> = tier
                .iter()
                .filter(|v| Some(v.as_str()) != partner_voice)
                .collect();
            if candidates.is_empty() {
                continue;
            }

            let free: Vec<&String> = candidates
                .iter()
                .filter(|v| !in_use.contains(v.as_str()))
                .copied()
                .collect();
            if !free.is_empty() {
                let idx = self.rng.lock().gen_range(0..free.len());
                return free[idx].clone();
            }

            // Twin rule: every candidate in this tier is in use. Pick the
            // least-recently-seen session among them (excluding the
            // partner, already filtered out above).
            if let Some(least_recent) = candidates
                .iter()
                .filter_map(|v| {
                    sessions
                        .values()
                        .find(|e| &e.session.voice == *v)
                        .map(|e| (v.as_str(), e.session.last_seen))
                })
                .min_by_key(|(_, last_seen)| *last_seen)
            {
                return least_recent.0.to_string();
            }
        }

        // Only reached if the global pool contains nothing but the
        // partner's voice: reluctantly reuse it, per spec §4.5 step 5.
        partner_voice.unwrap_or("default").to_string()
    }

    /// Returns voice metadata for playback: model path, sample rate
    /// (defaulting to 22050 Hz), and noise type.
    pub fn metadata(&self, voice: &str, endpoint: EndpointKind, airborne: bool) -> VoiceMetadata {
        let info = self.models.get(voice);
        let noise = if endpoint == EndpointKind::Pilot && airborne {
            NoiseType::Pink
        } else {
            NoiseType::Brown
        };
        VoiceMetadata {
            voice: voice.to_string(),
            model_path: info
                .map(|i| i.model_path.clone())
                .unwrap_or_else(|| PathBuf::from(voice)),
            sample_rate: info.map(|i| i.sample_rate).unwrap_or(DEFAULT_SAMPLE_RATE_HZ),
            noise,
        }
    }

    /// Acquires the per-voice lock, creating it lazily if needed, so
    /// concurrent transmissions never collide on one TTS model file. Must
    /// never be called while holding the session mutex, per spec §5.
    pub fn voice_lock(&self, voice: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.voice_locks
            .lock()
            .entry(voice.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Schedules release of `key`'s session after `cooldown`. The delete
    /// takes the session mutex and re-checks presence and epoch, so a
    /// resolve in the interim cancels it.
    pub fn release_after(self: &Arc<Self>, key: String, cooldown: Duration) {
        let epoch = self.release_epoch_counter.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut sessions = self.sessions.lock();
            if let Some(entry) = sessions.get_mut(&key) {
                entry.release_epoch = epoch;
            } else {
                return;
            }
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            let mut sessions = manager.sessions.lock();
            if let Some(entry) = sessions.get(&key) {
                if entry.release_epoch == epoch {
                    sessions.remove(&key);
                    tracing::debug!(key = %key, "voice session released after cooldown");
                }
            }
        });
    }

    /// Evicts sessions whose last-seen exceeds the idle timeout, or whose
    /// distance from the user exceeds the per-endpoint range, per spec
    /// §4.5 "periodic cleaner".
    pub fn run_cleanup(&self, user_position: Point) {
        let now = Instant::now();
        let mut sessions = self.sessions.lock();
        sessions.retain(|key, entry| {
            let idle = now.duration_since(entry.session.last_seen) > self.idle_timeout;
            let max_range = match entry.session.endpoint {
                EndpointKind::Pilot => self.pilot_max_range_nm,
                EndpointKind::Atc => self.atc_max_range_nm,
            };
            let far = haversine_nm(user_position, entry.session.position) > max_range;
            let keep = !idle && !far;
            if !keep {
                tracing::debug!(key = %key, idle, far, "voice session evicted by cleaner");
            }
            keep
        });
    }

    pub fn active_voice_for(&self, key: &str) -> Option<String> {
        self.sessions.lock().get(key).map(|e| e.session.voice.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.lock().contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with(pools: HashMap<String, Vec<String>>) -> Arc<VoiceSessionManager> {
        Arc::new(VoiceSessionManager::new(
            VoicePools { by_country: pools },
            HashMap::new(),
            42,
            Duration::from_secs(1200),
            150.0,
            400.0,
        ))
    }

    #[test]
    fn pilot_does_not_mimic_its_tower() {
        let mgr = manager_with(HashMap::from([(
            "GB".to_string(),
            vec!["Hans".to_string(), "Nigel".to_string()],
        )]));
        let atc_key = atc_key("EGKK", "TOWER");
        let atc_voice = mgr.resolve(&atc_key, EndpointKind::Atc, "GB", Point::default(), None);
        let pilot_voice = mgr.resolve(
            &pilot_key("BAW123"),
            EndpointKind::Pilot,
            "GB",
            Point::default(),
            Some(&atc_voice),
        );
        assert_ne!(atc_voice, pilot_voice);
    }

    #[test]
    fn twin_reallocation_picks_least_recently_seen() {
        let mgr = manager_with(HashMap::from([(
            "DE".to_string(),
            vec!["Hans".to_string(), "Dieter".to_string()],
        )]));
        let v1 = mgr.resolve("AC1_PILOT", EndpointKind::Pilot, "DE", Point::default(), None);
        std::thread::sleep(Duration::from_millis(5));
        let v2 = mgr.resolve("AC2_PILOT", EndpointKind::Pilot, "DE", Point::default(), None);
        assert_ne!(v1, v2);

        // AC1 refreshed most recently now; so AC1's voice should NOT be
        // picked as least-recently-seen for the third aircraft. Instead,
        // bump AC2's session by re-resolving it, leaving AC1 stale.
        std::thread::sleep(Duration::from_millis(5));
        mgr.resolve("AC2_PILOT", EndpointKind::Pilot, "DE", Point::default(), None);

        let v3 = mgr.resolve("AC3_PILOT", EndpointKind::Pilot, "DE", Point::default(), None);
        assert_eq!(v3, v1, "expected the least-recently-seen twin to be reused");
    }

    #[test]
    fn release_cooldown_defers_deletion() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mgr = manager_with(HashMap::from([(
                "GB".to_string(),
                vec!["Nigel".to_string()],
            )]));
            let key = pilot_key("BAW1");
            mgr.resolve(&key, EndpointKind::Pilot, "GB", Point::default(), None);
            mgr.release_after(key.clone(), Duration::from_millis(50));
            assert!(mgr.contains(&key));
            tokio::time::sleep(Duration::from_millis(120)).await;
            assert!(!mgr.contains(&key));
        });
    }

    #[test]
    fn resolve_before_cooldown_cancels_release() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let mgr = manager_with(HashMap::from([(
                "GB".to_string(),
                vec!["Nigel".to_string()],
            )]));
            let key = pilot_key("BAW1");
            let voice = mgr.resolve(&key, EndpointKind::Pilot, "GB", Point::default(), None);
            mgr.release_after(key.clone(), Duration::from_millis(50));
            tokio::time::sleep(Duration::from_millis(20)).await;
            let reused = mgr.resolve(&key, EndpointKind::Pilot, "GB", Point::default(), None);
            assert_eq!(voice, reused);
            tokio::time::sleep(Duration::from_millis(80)).await;
            assert!(mgr.contains(&key), "resolve should have cancelled the pending release");
        });
    }
}
