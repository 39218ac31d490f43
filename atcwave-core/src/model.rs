//! Core data model: §3 of the spec, realized as Rust types.

use crate::geo::{BoundingBox, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;

/// Controller role. `0=Unicom 1=Delivery 2=Ground 3=Tower 4=Departure
/// 5=Approach 6=Center`, per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    Unicom = 0,
    Delivery = 1,
    Ground = 2,
    Tower = 3,
    Departure = 4,
    Approach = 5,
    Center = 6,
}

impl Role {
    /// Maximum acceptable point-facility distance for this role, per
    /// spec §4.1 step 3: 60 NM below Departure/Approach/Center, 200 NM at
    /// or above.
    pub fn max_range_nm(self) -> f64 {
        if (self as u8) < (Role::Departure as u8) {
            60.0
        } else {
            200.0
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Unicom => "UNICOM",
            Role::Delivery => "DELIVERY",
            Role::Ground => "GROUND",
            Role::Tower => "TOWER",
            Role::Departure => "DEPARTURE",
            Role::Approach => "APPROACH",
            Role::Center => "CENTER",
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Role::Unicom,
            1 => Role::Delivery,
            2 => Role::Ground,
            3 => Role::Tower,
            4 => Role::Departure,
            5 => Role::Approach,
            6 => Role::Center,
            _ => return Err(()),
        })
    }
}

/// A radio frequency normalized to six significant digits, e.g. 118.5 MHz
/// becomes 118500. Comparisons tolerate a 25 kHz channel (top 5 digits).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency(pub u32);

impl Frequency {
    /// Normalizes a frequency given in MHz (e.g. `118.5`) by left-padding
    /// then right-trimming to six significant digits.
    pub fn from_mhz(mhz: f64) -> Self {
        let micro = (mhz * 1000.0).round() as u32; // e.g. 118.500 -> 118500
        Self(micro)
    }

    pub fn from_raw(six_digit: u32) -> Self {
        Self(six_digit)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// 25 kHz channel-tolerant equality: compares the top five digits.
    pub fn matches(self, other: Frequency) -> bool {
        self.0 / 10 == other.0 / 10
    }

    pub fn as_mhz(self) -> f64 {
        self.0 as f64 / 1000.0
    }
}

/// A closed lat/lon polygon with altitude bounds, belonging to a region
/// controller.
#[derive(Debug, Clone)]
pub struct Airspace {
    pub floor_ft: i32,
    pub ceiling_ft: i32,
    pub points: Vec<Point>,
    pub bbox: Option<BoundingBox>,
    pub rough_area: f64,
}

impl Airspace {
    pub fn new(floor_ft: i32, ceiling_ft: i32, points: Vec<Point>) -> Self {
        let bbox = BoundingBox::from_polygon(&points);
        let rough_area = crate::geo::rough_area(&points);
        Self {
            floor_ft,
            ceiling_ft,
            points,
            bbox,
            rough_area,
        }
    }

    pub fn altitude_in_range(&self, alt_ft: f64) -> bool {
        alt_ft >= self.floor_ft as f64 && alt_ft <= self.ceiling_ft as f64
    }
}

/// Either a point facility (tower/ground/delivery) or a region facility
/// (approach/center), per spec §9 "heterogeneous controller entities".
#[derive(Debug, Clone)]
pub enum Facility {
    Point { position: Point },
    Region { airspaces: Vec<Airspace> },
}

/// An ATC service: a name, role, location or airspace, and frequencies.
#[derive(Debug, Clone)]
pub struct Controller {
    pub name: String,
    pub icao: String,
    pub role: Role,
    pub frequencies: Vec<Frequency>,
    pub facility: Facility,
}

impl Controller {
    pub fn is_point(&self) -> bool {
        matches!(self.facility, Facility::Point { .. })
    }

    pub fn is_region(&self) -> bool {
        matches!(self.facility, Facility::Region { .. })
    }

    pub fn matches_frequency(&self, target: Frequency) -> bool {
        if target.is_zero() {
            return true;
        }
        self.frequencies.iter().any(|f| f.matches(target))
    }

    pub fn first_frequency(&self) -> Option<Frequency> {
        self.frequencies.first().copied()
    }
}

/// Flight phase, driving which role the AI is talking to. The thirteen
/// classifications of spec §4.3 plus `Shutdown`, referenced by §4.3 step 5
/// and §4.5 but absent from the enumerated list — see DESIGN.md Open
/// Question (d).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtcPhase {
    PreFlightParked,
    Startup,
    TaxiOut,
    Depart,
    ClimbOut,
    Cruise,
    Approach,
    Holding,
    Final,
    GoAround,
    Braking,
    TaxiIn,
    PostFlightParked,
    Shutdown,
}

impl AtcPhase {
    /// The role id expected to handle this phase.
    pub fn expected_role(self) -> Role {
        match self {
            AtcPhase::PreFlightParked | AtcPhase::Startup => Role::Delivery,
            AtcPhase::TaxiOut | AtcPhase::TaxiIn | AtcPhase::PostFlightParked => Role::Ground,
            AtcPhase::Depart | AtcPhase::Braking => Role::Tower,
            AtcPhase::ClimbOut => Role::Departure,
            AtcPhase::Cruise => Role::Center,
            AtcPhase::Approach | AtcPhase::Holding => Role::Approach,
            AtcPhase::Final | AtcPhase::GoAround => Role::Tower,
            AtcPhase::Shutdown => Role::Ground,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhaseState {
    pub current: Option<AtcPhase>,
    pub previous: Option<AtcPhase>,
    pub transition_time: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct Comms {
    pub callsign: String,
    pub country_code: String,
    pub controller_icao: Option<String>,
}

/// A tracked aircraft, keyed by `tail#_flight#`.
#[derive(Debug, Clone, Default)]
pub struct Aircraft {
    pub registration: String,
    pub aircraft_type: String,
    pub size_class: String,
    pub airline_code: String,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub position: Point,
    pub altitude_ft: f64,
    pub heading_deg: f64,
    pub heading: f64,
    pub phase: PhaseState,
    pub comms: Comms,
    pub assigned_runway: Option<String>,
    pub assigned_parking: Option<String>,
    pub squawk: u16,
    pub cleared_altitude_ft: f64,
}

impl Aircraft {
    /// Key used to identify an aircraft across ticks: `tail#_flight#`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.registration, self.flight_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComSlot {
    Com1,
    Com2,
}

/// The user's position, tuned radios, and active controllers. Mutated
/// only by the Ingest collaborator.
#[derive(Debug, Clone, Default)]
pub struct UserState {
    pub nearest_icao: String,
    pub position: Point,
    pub altitude_ft: f64,
    pub active_controllers: HashMap<ComSlot, Option<Controller>>,
    pub tuned_frequencies: HashMap<ComSlot, Frequency>,
    pub tuned_roles: HashMap<ComSlot, Role>,
}

impl UserState {
    pub fn new() -> Self {
        Self {
            nearest_icao: String::new(),
            position: Point::new(0.0, 0.0),
            altitude_ft: 0.0,
            active_controllers: HashMap::new(),
            tuned_frequencies: HashMap::new(),
            tuned_roles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Wind {
    pub direction_deg: f64,
    pub speed_mps: f64,
    pub shear_mps: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Baro {
    pub flight_pa: f64,
    pub sea_level_pa: f64,
    pub transition_altitude_ft: f64,
}

/// Process-wide weather state. Mutated only by the Ingest collaborator.
#[derive(Debug, Clone, Default)]
pub struct Weather {
    pub wind: Wind,
    pub baro: Baro,
    pub temperature_c: f64,
    pub visibility_sm: f64,
    pub magnetic_variation_deg: f64,
    pub turbulence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EndpointKind {
    Pilot,
    Atc,
}

/// The stable voice identity assigned to one conversational endpoint.
#[derive(Debug, Clone)]
pub struct VoiceSession {
    pub voice: String,
    pub last_seen: Instant,
    pub position: Point,
    pub endpoint: EndpointKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiator {
    Pilot,
    Atc,
}

/// A templated pilot/controller turn pair from the phrase catalogue.
#[derive(Debug, Clone, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub initiator: InitiatorField,
    #[serde(default)]
    pub pilot: Option<String>,
    #[serde(default)]
    pub atc: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitiatorField {
    Pilot,
    Atc,
}

impl From<InitiatorField> for Initiator {
    fn from(value: InitiatorField) -> Self {
        match value {
            InitiatorField::Pilot => Initiator::Pilot,
            InitiatorField::Atc => Initiator::Atc,
        }
    }
}

/// A single utterance in a planned exchange, before template expansion.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub speaker: EndpointKind,
    pub template: String,
}

/// A transmission en route through the radio pipeline.
#[derive(Debug, Clone)]
pub struct AtcMessage {
    pub controller_icao: String,
    pub controller_name: String,
    pub role_label: String,
    pub aircraft: Aircraft,
    pub text: String,
    pub country_code: String,
    pub speaker: EndpointKind,
}

/// Sample rate default when a voice model has no sidecar metadata.
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 22050;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseType {
    Pink,
    Brown,
}

impl NoiseType {
    pub fn label(self) -> &'static str {
        match self {
            NoiseType::Pink => "pinknoise",
            NoiseType::Brown => "brownnoise",
        }
    }
}

/// Voice metadata resolved for a given message.
#[derive(Debug, Clone)]
pub struct VoiceMetadata {
    pub voice: String,
    pub model_path: std::path::PathBuf,
    pub sample_rate: u32,
    pub noise: NoiseType,
}
