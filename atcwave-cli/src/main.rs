//! Atcwave CLI - process entry point. Wires the Controller Locator's
//! database, the phrase catalogue, the Voice Session Manager, the
//! Exchange Planner, the Template Expander, and the radio pipeline
//! together, then drives them from either a live simulator or the mock.

mod config_loader;

use anyhow::{Context, Result};
use atcwave_core::locator::ControllerDatabase;
use atcwave_core::pipeline::PipelineConfig;
use atcwave_core::voice::VoiceSessionManager;
use atcwave_core::world::{IngestSink, WorldIngest, WorldState};
use atcwave_core::{AirportDirectory, ExchangePlanner, PlannerConfig, TemplateExpander, TemplateExpanderConfig};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "atcwave", about = "ATC radio-communications simulator")]
struct Args {
    /// Path to config.yaml. Defaults to searching the current directory
    /// and its two parents.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// Run against the bundled mock simulator instead of a live one.
    #[arg(long)]
    mock: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new().context("building async runtime")?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> Result<()> {
    let config = config_loader::load(args.config.as_deref())?;

    if !config.tts_binary.exists() {
        anyhow::bail!("tts binary not found at {}", config.tts_binary.display());
    }
    if !config.effects_binary.exists() {
        anyhow::bail!("effects binary not found at {}", config.effects_binary.display());
    }
    if !config.voice_model_dir.is_dir() {
        anyhow::bail!("voice model directory not found at {}", config.voice_model_dir.display());
    }

    let airports = atcwave_sim::airport_parser::parse(
        &std::fs::read_to_string(&config.airport_data_path)
            .with_context(|| format!("reading {}", config.airport_data_path.display()))?,
    );
    let regions = atcwave_sim::region_parser::parse(
        &std::fs::read_to_string(&config.region_data_path)
            .with_context(|| format!("reading {}", config.region_data_path.display()))?,
    );

    let mut controllers = airports.controllers;
    controllers.extend(regions);
    if controllers.is_empty() {
        anyhow::bail!("dataref indices incomplete: no controllers parsed from airport/region data");
    }
    let db = Arc::new(ControllerDatabase::new(controllers));
    let airport_directory = Arc::new(AirportDirectory {
        names: airports.names,
    });

    let normal_phrases = atcwave_sim::phrase_loader::load(&config.phrase_catalogue_path)
        .with_context(|| format!("loading {}", config.phrase_catalogue_path.display()))?;
    let unicom_phrases = atcwave_sim::phrase_loader::load(&config.unicom_phrase_catalogue_path)
        .with_context(|| format!("loading {}", config.unicom_phrase_catalogue_path.display()))?;

    let loaded_voices = atcwave_sim::voice_loader::load(&config.voice_model_dir)
        .with_context(|| format!("loading voices from {}", config.voice_model_dir.display()))?;
    let voices = Arc::new(VoiceSessionManager::new(
        loaded_voices.pools,
        loaded_voices.models,
        0xA7C_5EED,
        config.voice_idle_timeout(),
        config.voice_pilot_max_range_nm,
        config.voice_atc_max_range_nm,
    ));

    let world = Arc::new(WorldState::new());

    let planner = Arc::new(ExchangePlanner::new(
        normal_phrases,
        unicom_phrases,
        PlannerConfig {
            say_again_factor: config.say_again_factor,
            release_cooldown: config.release_cooldown(),
        },
        Arc::clone(&voices),
        0xA7C_5EED,
    ));
    let expander = Arc::new(TemplateExpander::new(
        Arc::clone(&db),
        airport_directory,
        Arc::clone(&voices),
        TemplateExpanderConfig {
            handoff_valediction_factor: config.handoff_valediction_factor,
        },
        0xA7C_5EED,
    ));

    let radio_tx = atcwave_core::pipeline::spawn(
        PipelineConfig {
            message_buffer_size: config.message_buffer_size,
            tts_binary: config.tts_binary.clone(),
            effects_binary: config.effects_binary.clone(),
            length_scale: config.tts_length_scale,
        },
        Arc::clone(&voices),
        0xA7C_5EED,
    );

    let (aircraft_tx, aircraft_rx) = tokio::sync::mpsc::channel(config.message_buffer_size);

    let planner_for_task = Arc::clone(&planner);
    let world_for_plan = Arc::clone(&world);
    let expander_for_plan = Arc::clone(&expander);
    let planner_task = tokio::spawn(async move {
        planner_for_task
            .run(aircraft_rx, |aircraft, utterances| {
                let world = Arc::clone(&world_for_plan);
                let expander = Arc::clone(&expander_for_plan);
                let radio_tx = radio_tx.clone();
                async move {
                    let Some(phase) = aircraft.phase.current else {
                        return;
                    };
                    let messages = expander.expand_all(&world, &aircraft, phase, &utterances);
                    for message in messages {
                        if radio_tx.send(message).await.is_err() {
                            tracing::warn!("radioQueue closed, dropping remaining transmissions");
                            break;
                        }
                    }
                }
            })
            .await;
    });

    let cleaner_voices = Arc::clone(&voices);
    let cleaner_world = Arc::clone(&world);
    let cleaner_interval = config.voice_cleaner_interval();
    let cleaner_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleaner_interval);
        loop {
            ticker.tick().await;
            cleaner_voices.run_cleanup(cleaner_world.user().position);
        }
    });

    // `--mock` starts the bundled simulator locally; either way, the
    // dataref bridge speaks to whichever base URL ends up being live.
    let (simulator_base_url, mock_task) = if args.mock {
        let mock_port = config.mock_port;
        let task = tokio::spawn(async move {
            atcwave_sim::mock::run(mock_port).await.context("mock simulator exited")?;
            Ok::<(), anyhow::Error>(())
        });
        // Give the mock listener a moment to bind before the bridge connects.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        (format!("http://127.0.0.1:{mock_port}"), Some(task))
    } else {
        (config.simulator_base_url.clone(), None)
    };

    let ingest_task = tokio::spawn(run_live_ingest(
        simulator_base_url,
        Arc::clone(&world),
        Arc::clone(&db),
        aircraft_tx,
        config.max_ai_aircraft,
    ));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
        result = planner_task => {
            result.context("planner task panicked")?;
        }
        result = ingest_task => {
            result.context("ingest task panicked")??;
        }
    }
    cleaner_task.abort();
    if let Some(task) = mock_task {
        task.abort();
    }

    Ok(())
}

/// Whether the user is tuned, on any COM slot, to the controller this
/// aircraft's current phase expects to be handling it — spec §2's data
/// flow gate ("if aircraft phase changed and the user's active facility
/// matches the AI's intended controller, enqueue the aircraft"). An
/// aircraft with no controller ICAO reported yet is audible to any active
/// controller of the expected role.
fn audible_to_user(world: &WorldState, aircraft: &atcwave_core::model::Aircraft) -> bool {
    let Some(phase) = aircraft.phase.current else {
        return false;
    };
    let expected_role = phase.expected_role();
    world.user().active_controllers.values().any(|active| match active {
        Some(controller) => {
            controller.role == expected_role
                && aircraft
                    .comms
                    .controller_icao
                    .as_deref()
                    .map(|icao| icao == controller.icao)
                    .unwrap_or(true)
        }
        None => false,
    })
}

/// Wraps `WorldIngest` so every phase transition the user can actually
/// hear is also handed to the planner's input channel. `try_send` matches
/// the pipeline's drop-under-backpressure rule rather than blocking the
/// ingest loop.
struct ChannelIngest<'a> {
    inner: WorldIngest<'a>,
    aircraft_tx: tokio::sync::mpsc::Sender<atcwave_core::model::Aircraft>,
}

impl<'a> IngestSink for ChannelIngest<'a> {
    fn notify_user_change(
        &self,
        position: atcwave_core::geo::Point,
        altitude_ft: f64,
        tuned: &std::collections::HashMap<atcwave_core::model::ComSlot, (atcwave_core::model::Frequency, atcwave_core::model::Role)>,
    ) {
        self.inner.notify_user_change(position, altitude_ft, tuned);
    }

    fn notify_aircraft_change(&self, aircraft: &atcwave_core::model::Aircraft) {
        self.inner.notify_aircraft_change(aircraft);
        if !audible_to_user(self.inner.world, aircraft) {
            tracing::debug!(key = %aircraft.key(), "not on an active facility, not enqueued");
            return;
        }
        if self.aircraft_tx.try_send(aircraft.clone()).is_err() {
            tracing::debug!(key = %aircraft.key(), "planner input full, dropping transition");
        }
    }

    fn add_flight_plan(&self, aircraft: &atcwave_core::model::Aircraft, simulated_time: chrono::DateTime<chrono::Utc>) {
        self.inner.add_flight_plan(aircraft, simulated_time);
    }
}

/// Resolves one dataref name to an id and records it in `watched`/
/// `subscribed_ids`. Required datarefs (position, frequencies) fail the
/// whole ingest on a miss; AI traffic slots beyond what the simulator
/// actually publishes are expected to miss and are skipped.
async fn resolve_watch(
    client: &atcwave_sim::dataref::DatarefClient,
    name: &str,
    watch: atcwave_sim::dataref::Watched,
    watched: &mut std::collections::HashMap<u64, atcwave_sim::dataref::Watched>,
    subscribed_ids: &mut Vec<u64>,
    required: bool,
) -> Result<()> {
    match client.resolve_id(name).await {
        Ok(id) => {
            watched.insert(id, watch);
            subscribed_ids.push(id);
            Ok(())
        }
        Err(err) if required => {
            Err(err).with_context(|| format!("simulator unreachable: resolving required dataref {name}"))
        }
        Err(err) => {
            tracing::debug!(name, error = %err, "optional dataref not published, skipping");
            Ok(())
        }
    }
}

/// Drives a live simulator: resolves the dataref bridge's subscribed ids,
/// then runs the websocket loop, feeding aircraft transitions into the
/// planner's input channel via `ChannelIngest`.
async fn run_live_ingest(
    simulator_base_url: String,
    world: Arc<WorldState>,
    db: Arc<ControllerDatabase>,
    aircraft_tx: tokio::sync::mpsc::Sender<atcwave_core::model::Aircraft>,
    max_ai_aircraft: usize,
) -> Result<()> {
    use atcwave_core::model::ComSlot;
    use atcwave_sim::dataref::{self, Watched};

    let client = dataref::DatarefClient::new(simulator_base_url.clone());

    let mut watched = std::collections::HashMap::new();
    let mut subscribed_ids = Vec::new();

    resolve_watch(&client, dataref::USER_LATITUDE_DATAREF, Watched::UserLatitude, &mut watched, &mut subscribed_ids, true).await?;
    resolve_watch(&client, dataref::USER_LONGITUDE_DATAREF, Watched::UserLongitude, &mut watched, &mut subscribed_ids, true).await?;
    resolve_watch(&client, dataref::USER_ELEVATION_DATAREF, Watched::UserElevation, &mut watched, &mut subscribed_ids, true).await?;
    resolve_watch(&client, dataref::SIMULATED_TIME_DATAREF, Watched::SimulatedTimeSec, &mut watched, &mut subscribed_ids, false).await?;

    for slot in [ComSlot::Com1, ComSlot::Com2] {
        resolve_watch(&client, dataref::com_frequency_dataref_name(slot), Watched::ComFrequency(slot), &mut watched, &mut subscribed_ids, true).await?;
        resolve_watch(&client, dataref::com_role_dataref_name(slot), Watched::ComRole(slot), &mut watched, &mut subscribed_ids, false).await?;
    }

    for slot in 0..max_ai_aircraft {
        for field in atcwave_sim::dataref::AiField::ALL {
            let name = dataref::ai_dataref_name(slot, field);
            resolve_watch(&client, &name, Watched::Ai(slot, field), &mut watched, &mut subscribed_ids, false).await?;
        }
    }

    let ingest = ChannelIngest {
        inner: WorldIngest::new(&world, &db),
        aircraft_tx,
    };
    let ws_url = simulator_base_url.replacen("http", "ws", 1) + "/api/v2";

    if let Err(err) = dataref::run_subscription(&ws_url, &subscribed_ids, &ingest, &watched).await {
        tracing::warn!(error = %err, "dataref bridge closed");
    }

    Ok(())
}
