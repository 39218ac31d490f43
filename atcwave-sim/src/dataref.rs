//! Simulator dataref bridge — §6 "Simulator dataref bridge (consumed)".
//!
//! REST discovery + value reads, and a WebSocket subscription client that
//! decodes `dataref_update_values` frames into `atcwave_core::world::IngestSink`
//! calls. Read errors are logged and the socket closes; per spec Open
//! Question (a), this collaborator does not retry.

use atcwave_core::geo::Point;
use atcwave_core::model::{Aircraft, AtcPhase, ComSlot, Frequency, Role};
use atcwave_core::world::IngestSink;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite::Message;

#[derive(Error, Debug)]
pub enum DatarefError {
    #[error("dataref discovery request failed: {0}")]
    Discovery(#[from] reqwest::Error),
    #[error("dataref index missing for name {0}")]
    MissingIndex(String),
    #[error("websocket connect failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Debug, Deserialize)]
struct DatarefListResponse {
    data: Vec<DatarefDescriptor>,
}

#[derive(Debug, Deserialize)]
struct DatarefDescriptor {
    id: u64,
    #[allow(dead_code)]
    name: String,
    #[allow(dead_code)]
    value_type: Option<String>,
}

/// Thin REST client over the simulator's `/api/v2/datarefs` surface.
pub struct DatarefClient {
    http: reqwest::Client,
    base_url: String,
}

impl DatarefClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("reqwest client"),
            base_url: base_url.into(),
        }
    }

    /// Resolves a dataref name to its numeric id via `GET
    /// /api/v2/datarefs?filter[name]=<name>`.
    pub async fn resolve_id(&self, name: &str) -> Result<u64, DatarefError> {
        let url = format!("{}/api/v2/datarefs", self.base_url);
        let response: DatarefListResponse = self
            .http
            .get(url)
            .query(&[("filter[name]", name)])
            .send()
            .await?
            .json()
            .await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.id)
            .ok_or_else(|| DatarefError::MissingIndex(name.to_string()))
    }

    /// Reads a single dataref value via `GET /api/v2/datarefs/{id}/value`.
    pub async fn read_value(&self, id: u64) -> Result<Value, DatarefError> {
        let url = format!("{}/api/v2/datarefs/{id}/value", self.base_url);
        #[derive(Deserialize)]
        struct ValueResponse {
            data: Value,
        }
        let response: ValueResponse = self.http.get(url).send().await?.json().await?;
        Ok(response.data)
    }
}

/// Decodes a base64 blob of null-terminated strings, the wire shape spec §6
/// gives for array-valued string datarefs (tail numbers, callsigns, ...).
pub fn decode_string_array(base64_blob: &str) -> Vec<String> {
    let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(base64_blob) else {
        return Vec::new();
    };
    bytes
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect()
}

/// Unpacks a little-endian 4-byte integer runway designator into ASCII.
pub fn decode_runway_designator(packed: u32) -> String {
    packed
        .to_le_bytes()
        .into_iter()
        .take_while(|&b| b != 0)
        .map(|b| b as char)
        .collect()
}

fn phase_from_code(code: u8) -> Option<AtcPhase> {
    Some(match code {
        0 => AtcPhase::PreFlightParked,
        1 => AtcPhase::Startup,
        2 => AtcPhase::TaxiOut,
        3 => AtcPhase::Depart,
        4 => AtcPhase::ClimbOut,
        5 => AtcPhase::Cruise,
        6 => AtcPhase::Approach,
        7 => AtcPhase::Holding,
        8 => AtcPhase::Final,
        9 => AtcPhase::GoAround,
        10 => AtcPhase::Braking,
        11 => AtcPhase::TaxiIn,
        12 => AtcPhase::PostFlightParked,
        13 => AtcPhase::Shutdown,
        _ => return None,
    })
}

pub const USER_LATITUDE_DATAREF: &str = "sim/flightmodel/position/latitude";
pub const USER_LONGITUDE_DATAREF: &str = "sim/flightmodel/position/longitude";
pub const USER_ELEVATION_DATAREF: &str = "sim/flightmodel/position/elevation";
pub const SIMULATED_TIME_DATAREF: &str = "sim/time/zulu_time_sec";

pub fn com_frequency_dataref_name(slot: ComSlot) -> &'static str {
    match slot {
        ComSlot::Com1 => "sim/cockpit2/radios/actuators/com1_frequency_hz_833",
        ComSlot::Com2 => "sim/cockpit2/radios/actuators/com2_frequency_hz_833",
    }
}

/// The role a COM slot's tuned frequency currently matches. Not part of the
/// base simulator dataref set; published by the same plugin that exposes
/// the AI traffic block below.
pub fn com_role_dataref_name(slot: ComSlot) -> &'static str {
    match slot {
        ComSlot::Com1 => "atcwave/radios/com1_active_role",
        ComSlot::Com2 => "atcwave/radios/com2_active_role",
    }
}

/// One field of an AI aircraft's published state, per slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiField {
    TailNumber,
    FlightNumber,
    Origin,
    Destination,
    Callsign,
    ControllerIcao,
    CountryCode,
    Latitude,
    Longitude,
    AltitudeFt,
    HeadingDeg,
    PhaseCode,
    AssignedRunway,
    Squawk,
    ClearedAltitudeFt,
}

impl AiField {
    pub const ALL: [AiField; 15] = [
        AiField::TailNumber,
        AiField::FlightNumber,
        AiField::Origin,
        AiField::Destination,
        AiField::Callsign,
        AiField::ControllerIcao,
        AiField::CountryCode,
        AiField::Latitude,
        AiField::Longitude,
        AiField::AltitudeFt,
        AiField::HeadingDeg,
        AiField::PhaseCode,
        AiField::AssignedRunway,
        AiField::Squawk,
        AiField::ClearedAltitudeFt,
    ];

    fn suffix(self) -> &'static str {
        match self {
            AiField::TailNumber => "tail_number",
            AiField::FlightNumber => "flight_number",
            AiField::Origin => "origin",
            AiField::Destination => "destination",
            AiField::Callsign => "callsign",
            AiField::ControllerIcao => "controller_icao",
            AiField::CountryCode => "country_code",
            AiField::Latitude => "latitude",
            AiField::Longitude => "longitude",
            AiField::AltitudeFt => "altitude_ft",
            AiField::HeadingDeg => "heading_deg",
            AiField::PhaseCode => "phase",
            AiField::AssignedRunway => "assigned_runway",
            AiField::Squawk => "squawk",
            AiField::ClearedAltitudeFt => "cleared_altitude_ft",
        }
    }
}

/// Dataref name for one AI traffic slot's field, e.g.
/// `atcwave/traffic/0/tail_number`.
pub fn ai_dataref_name(slot: usize, field: AiField) -> String {
    format!("atcwave/traffic/{slot}/{}", field.suffix())
}

/// What a subscribed dataref id decodes into, resolved once at startup and
/// consulted on every `dataref_update_values` frame.
#[derive(Debug, Clone, Copy)]
pub enum Watched {
    ComFrequency(ComSlot),
    ComRole(ComSlot),
    UserLatitude,
    UserLongitude,
    UserElevation,
    SimulatedTimeSec,
    Ai(usize, AiField),
}

fn apply_ai_field(aircraft: &mut Aircraft, field: AiField, value: &Value) -> bool {
    match field {
        AiField::TailNumber => {
            if let Some(blob) = value.as_str() {
                aircraft.registration = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::FlightNumber => {
            if let Some(blob) = value.as_str() {
                aircraft.flight_number = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::Origin => {
            if let Some(blob) = value.as_str() {
                aircraft.origin = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::Destination => {
            if let Some(blob) = value.as_str() {
                aircraft.destination = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::Callsign => {
            if let Some(blob) = value.as_str() {
                aircraft.comms.callsign = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::ControllerIcao => {
            if let Some(blob) = value.as_str() {
                aircraft.comms.controller_icao =
                    decode_string_array(blob).into_iter().next().filter(|s| !s.is_empty());
            }
            false
        }
        AiField::CountryCode => {
            if let Some(blob) = value.as_str() {
                aircraft.comms.country_code = decode_string_array(blob).into_iter().next().unwrap_or_default();
            }
            false
        }
        AiField::Latitude => {
            if let Some(v) = value.as_f64() {
                aircraft.position.lat = v;
            }
            false
        }
        AiField::Longitude => {
            if let Some(v) = value.as_f64() {
                aircraft.position.lon = v;
            }
            false
        }
        AiField::AltitudeFt => {
            if let Some(v) = value.as_f64() {
                aircraft.altitude_ft = v;
            }
            false
        }
        AiField::HeadingDeg => {
            if let Some(v) = value.as_f64() {
                aircraft.heading_deg = v;
                aircraft.heading = v;
            }
            false
        }
        AiField::AssignedRunway => {
            if let Some(packed) = value.as_u64() {
                let designator = decode_runway_designator(packed as u32);
                aircraft.assigned_runway = if designator.is_empty() { None } else { Some(designator) };
            }
            false
        }
        AiField::Squawk => {
            if let Some(v) = value.as_u64() {
                aircraft.squawk = v as u16;
            }
            false
        }
        AiField::ClearedAltitudeFt => {
            if let Some(v) = value.as_f64() {
                aircraft.cleared_altitude_ft = v;
            }
            false
        }
        AiField::PhaseCode => {
            let Some(code) = value.as_u64().and_then(|c| u8::try_from(c).ok()) else {
                return false;
            };
            let Some(new_phase) = phase_from_code(code) else {
                return false;
            };
            if aircraft.phase.current == Some(new_phase) {
                return false;
            }
            aircraft.phase.previous = aircraft.phase.current;
            aircraft.phase.current = Some(new_phase);
            true
        }
    }
}

/// Drives a websocket subscription to a fixed set of dataref ids, applying
/// updates to the given `IngestSink`. Returns once the socket closes or a
/// read error occurs; the caller decides whether to log and exit or retry.
pub async fn run_subscription<S: IngestSink>(
    ws_url: &str,
    subscribed_ids: &[u64],
    sink: &S,
    watched: &HashMap<u64, Watched>,
) -> Result<(), DatarefError> {
    let (ws_stream, _) = tokio_tungstenite::connect_async(ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe = serde_json::json!({
        "req_id": 1,
        "type": "dataref_subscribe_values",
        "params": {
            "datarefs": subscribed_ids.iter().map(|id| serde_json::json!({"id": id})).collect::<Vec<_>>(),
        }
    });
    write.send(Message::Text(subscribe.to_string())).await?;

    let mut user_position = Point::default();
    let mut user_altitude_ft = 0.0;
    let mut simulated_time = chrono::DateTime::from_timestamp(0, 0).unwrap();
    let mut com_freq: HashMap<ComSlot, Frequency> = HashMap::new();
    let mut com_role: HashMap<ComSlot, Role> = HashMap::new();
    let mut slots: HashMap<usize, Aircraft> = HashMap::new();
    let mut known_flights: HashMap<usize, (String, String)> = HashMap::new();

    while let Some(message) = read.next().await {
        let message = match message {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(error = %err, "dataref websocket read error, closing");
                break;
            }
        };
        let Message::Text(text) = message else { continue };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if frame.get("type").and_then(Value::as_str) != Some("dataref_update_values") {
            continue;
        }
        let Some(data) = frame.get("data").and_then(Value::as_object) else {
            continue;
        };

        let mut user_changed = false;
        let mut com_changed = false;
        let mut phase_changed_slots = Vec::new();

        for (id_str, value) in data {
            let Ok(id) = id_str.parse::<u64>() else { continue };
            let Some(&watch) = watched.get(&id) else { continue };
            match watch {
                Watched::ComFrequency(slot) => {
                    if let Some(mhz) = value.as_f64() {
                        com_freq.insert(slot, Frequency::from_mhz(mhz));
                        com_changed = true;
                    }
                }
                Watched::ComRole(slot) => {
                    if let Some(role) = value.as_u64().and_then(|c| Role::try_from(c as u8).ok()) {
                        com_role.insert(slot, role);
                        com_changed = true;
                    }
                }
                Watched::UserLatitude => {
                    if let Some(v) = value.as_f64() {
                        user_position.lat = v;
                        user_changed = true;
                    }
                }
                Watched::UserLongitude => {
                    if let Some(v) = value.as_f64() {
                        user_position.lon = v;
                        user_changed = true;
                    }
                }
                Watched::UserElevation => {
                    if let Some(v) = value.as_f64() {
                        user_altitude_ft = v;
                        user_changed = true;
                    }
                }
                Watched::SimulatedTimeSec => {
                    if let Some(secs) = value.as_i64() {
                        if let Some(time) = chrono::DateTime::from_timestamp(secs, 0) {
                            simulated_time = time;
                        }
                    }
                }
                Watched::Ai(slot, field) => {
                    let aircraft = slots.entry(slot).or_default();
                    if apply_ai_field(aircraft, field, value) {
                        aircraft.phase.transition_time = Some(simulated_time);
                        phase_changed_slots.push(slot);
                    }
                }
            }
        }

        if user_changed || com_changed {
            let tuned: HashMap<ComSlot, (Frequency, Role)> = com_freq
                .iter()
                .filter_map(|(&slot, &freq)| com_role.get(&slot).map(|&role| (slot, (freq, role))))
                .collect();
            sink.notify_user_change(user_position, user_altitude_ft, &tuned);
        }

        for slot in phase_changed_slots {
            let Some(aircraft) = slots.get(&slot) else { continue };
            if aircraft.registration.is_empty() || aircraft.flight_number.is_empty() {
                continue;
            }
            let key = (aircraft.registration.clone(), aircraft.flight_number.clone());
            if known_flights.get(&slot) != Some(&key) {
                known_flights.insert(slot, key);
                sink.add_flight_plan(aircraft, simulated_time);
            }
            sink.notify_aircraft_change(aircraft);
        }
    }

    Ok(())
}
