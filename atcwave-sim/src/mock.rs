//! Mock simulator — §6, `--mock`. Replays the same REST + WebSocket
//! dataref shapes as a real simulator so the rest of atcwave can run
//! without one attached, on `Config.mock_port` (default 8086). A single
//! scripted AI aircraft cycles through every phase over time so the full
//! Ingest -> World State -> Exchange Planner -> Template Expander -> Radio
//! Pipeline chain is reachable without a real simulator attached.

use crate::dataref::{self, AiField};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;

/// A single dataref the mock knows about: a stable id and its current
/// value, mutated by the scripted ticker below.
#[derive(Clone)]
struct MockDataref {
    id: u64,
    name: String,
    value: Value,
}

struct MockState {
    datarefs: parking_lot::RwLock<Vec<MockDataref>>,
}

#[derive(Deserialize)]
struct DiscoveryQuery {
    #[serde(rename = "filter[name]")]
    filter_name: Option<String>,
}

async fn list_datarefs(
    State(state): State<Arc<MockState>>,
    Query(query): Query<DiscoveryQuery>,
) -> impl IntoResponse {
    let datarefs = state.datarefs.read();
    let matched: Vec<Value> = datarefs
        .iter()
        .filter(|d| query.filter_name.as_deref().map(|n| n == d.name).unwrap_or(true))
        .map(|d| json!({"id": d.id, "name": d.name, "value_type": "float"}))
        .collect();
    Json(json!({ "data": matched }))
}

async fn dataref_value(
    State(state): State<Arc<MockState>>,
    axum::extract::Path(id): axum::extract::Path<u64>,
) -> impl IntoResponse {
    let datarefs = state.datarefs.read();
    let value = datarefs
        .iter()
        .find(|d| d.id == id)
        .map(|d| d.value.clone())
        .unwrap_or(Value::Null);
    Json(json!({ "data": value }))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<MockState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<MockState>) {
    let mut subscribed: Vec<u64> = Vec::new();
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(frame) = serde_json::from_str::<Value>(&text) {
                            if frame.get("type").and_then(Value::as_str) == Some("dataref_subscribe_values") {
                                if let Some(ids) = frame["params"]["datarefs"].as_array() {
                                    subscribed = ids
                                        .iter()
                                        .filter_map(|d| d.get("id").and_then(Value::as_u64))
                                        .collect();
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "mock simulator websocket read error");
                        break;
                    }
                    _ => {}
                }
            }
            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                tick += 1;
                {
                    let mut datarefs = state.datarefs.write();
                    advance_script(&mut datarefs, tick);
                }
                if subscribed.is_empty() {
                    continue;
                }
                let data = {
                    let datarefs = state.datarefs.read();
                    let mut data = serde_json::Map::new();
                    for id in &subscribed {
                        if let Some(found) = datarefs.iter().find(|d| d.id == *id) {
                            data.insert(found.id.to_string(), found.value.clone());
                        }
                    }
                    data
                };
                let frame = json!({"type": "dataref_update_values", "data": data});
                if socket.send(Message::Text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn set_value(datarefs: &mut [MockDataref], name: &str, value: Value) {
    if let Some(found) = datarefs.iter_mut().find(|d| d.name == name) {
        found.value = value;
    }
}

/// Advances the scripted aircraft in slot 0 by one 500ms tick: cycles its
/// phase every 6 ticks (3s) through the full 14-phase set, and drifts its
/// position, altitude, and heading so downstream consumers see motion.
fn advance_script(datarefs: &mut [MockDataref], tick: u64) {
    let phase_index = ((tick / 6) % 14) as u8;
    let t = tick as f64;

    set_value(datarefs, dataref::SIMULATED_TIME_DATAREF, json!((tick * 500 / 1000) as i64));
    set_value(
        datarefs,
        &dataref::ai_dataref_name(0, AiField::PhaseCode),
        json!(phase_index),
    );
    set_value(
        datarefs,
        &dataref::ai_dataref_name(0, AiField::AltitudeFt),
        json!(phase_index as f64 * 2000.0),
    );
    set_value(
        datarefs,
        &dataref::ai_dataref_name(0, AiField::HeadingDeg),
        json!((t * 2.0) % 360.0),
    );
    set_value(
        datarefs,
        &dataref::ai_dataref_name(0, AiField::Latitude),
        json!(51.4706 + t * 0.0005),
    );
    set_value(
        datarefs,
        &dataref::ai_dataref_name(0, AiField::Longitude),
        json!(-0.4543 + t * 0.0005),
    );
}

fn encode_string(value: &str) -> Value {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    json!(base64::engine::general_purpose::STANDARD.encode(bytes))
}

fn pack_runway(designator: &str) -> u32 {
    let mut bytes = [0u8; 4];
    for (slot, b) in designator.bytes().take(4).enumerate() {
        bytes[slot] = b;
    }
    u32::from_le_bytes(bytes)
}

/// Seeds COM frequencies/roles, user position, a simulated clock, and one
/// scripted AI aircraft (slot 0, parked at Heathrow), enough to drive the
/// pipeline end-to-end without a real simulator attached. `advance_script`
/// mutates the AI aircraft's fields on every tick of the websocket loop.
fn seed_datarefs() -> Vec<MockDataref> {
    use atcwave_core::model::{ComSlot, Role};

    let mut seeded: Vec<(String, Value)> = vec![
        (
            dataref::com_frequency_dataref_name(ComSlot::Com1).to_string(),
            json!(118.5),
        ),
        (
            dataref::com_role_dataref_name(ComSlot::Com1).to_string(),
            json!(Role::Tower as u8),
        ),
        (
            dataref::com_frequency_dataref_name(ComSlot::Com2).to_string(),
            json!(121.7),
        ),
        (
            dataref::com_role_dataref_name(ComSlot::Com2).to_string(),
            json!(Role::Ground as u8),
        ),
        (dataref::USER_LATITUDE_DATAREF.to_string(), json!(51.4706)),
        (dataref::USER_LONGITUDE_DATAREF.to_string(), json!(-0.4543)),
        (dataref::USER_ELEVATION_DATAREF.to_string(), json!(83.0)),
        (dataref::SIMULATED_TIME_DATAREF.to_string(), json!(0)),
    ];

    seeded.push((
        dataref::ai_dataref_name(0, AiField::TailNumber),
        encode_string("G-ABCD"),
    ));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::FlightNumber),
        encode_string("BA001"),
    ));
    seeded.push((dataref::ai_dataref_name(0, AiField::Origin), encode_string("EGLL")));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::Destination),
        encode_string("EHAM"),
    ));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::Callsign),
        encode_string("Speedbird 1"),
    ));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::ControllerIcao),
        encode_string("EGLL"),
    ));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::CountryCode),
        encode_string("GB"),
    ));
    seeded.push((dataref::ai_dataref_name(0, AiField::Latitude), json!(51.4706)));
    seeded.push((dataref::ai_dataref_name(0, AiField::Longitude), json!(-0.4543)));
    seeded.push((dataref::ai_dataref_name(0, AiField::AltitudeFt), json!(0.0)));
    seeded.push((dataref::ai_dataref_name(0, AiField::HeadingDeg), json!(270.0)));
    seeded.push((dataref::ai_dataref_name(0, AiField::PhaseCode), json!(0)));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::AssignedRunway),
        json!(pack_runway("27L")),
    ));
    seeded.push((dataref::ai_dataref_name(0, AiField::Squawk), json!(1000)));
    seeded.push((
        dataref::ai_dataref_name(0, AiField::ClearedAltitudeFt),
        json!(0.0),
    ));

    seeded
        .into_iter()
        .enumerate()
        .map(|(i, (name, value))| MockDataref {
            id: i as u64 + 1,
            name,
            value,
        })
        .collect()
}

pub async fn run(port: u16) -> std::io::Result<()> {
    let state = Arc::new(MockState {
        datarefs: parking_lot::RwLock::new(seed_datarefs()),
    });

    let app = Router::new()
        .route("/api/v2/datarefs", get(list_datarefs))
        .route("/api/v2/datarefs/:id/value", get(dataref_value))
        .route("/api/v2", get(websocket_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "mock simulator listening");
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_datarefs_cover_both_com_radios() {
        let seeded = seed_datarefs();
        assert!(seeded.iter().any(|d| d.name.contains("com1_frequency")));
        assert!(seeded.iter().any(|d| d.name.contains("com2_frequency")));
    }

    #[test]
    fn seeded_datarefs_cover_every_ai_field_of_the_scripted_aircraft() {
        let seeded = seed_datarefs();
        for field in AiField::ALL {
            let name = dataref::ai_dataref_name(0, field);
            assert!(seeded.iter().any(|d| d.name == name), "missing {name}");
        }
    }

    #[test]
    fn advance_script_cycles_the_scripted_aircraft_through_every_phase() {
        let mut datarefs = seed_datarefs();
        let phase_name = dataref::ai_dataref_name(0, AiField::PhaseCode);

        let mut seen = std::collections::HashSet::new();
        for tick in 1..=(6 * 14) {
            advance_script(&mut datarefs, tick);
            let phase = datarefs
                .iter()
                .find(|d| d.name == phase_name)
                .and_then(|d| d.value.as_u64())
                .unwrap();
            seen.insert(phase);
        }
        assert_eq!(seen.len(), 14);
    }
}
