//! Static, read-only lookup tables built once at process start, per spec
//! §9 "ICAO→ISO and role/phase tables".

use crate::model::{AtcPhase, Role};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Maps an ICAO prefix (first one or two characters) to an ISO country
/// code. Not exhaustive — a real deployment would load this from a data
/// file alongside the airport database; this is the static core subset
/// referenced directly by the spec's worked examples (Heathrow/EGLL,
/// Gatwick/EGKK, Shoreham/EGKA all under "EG").
pub fn icao_to_iso(icao: &str) -> &'static str {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    let table = TABLE.get_or_init(|| {
        HashMap::from([
            ("EG", "GB"),
            ("EH", "NL"),
            ("ED", "DE"),
            ("ET", "DE"),
            ("LF", "FR"),
            ("LE", "ES"),
            ("LI", "IT"),
            ("EB", "BE"),
            ("EK", "DK"),
            ("ES", "SE"),
            ("EN", "NO"),
            ("EF", "FI"),
            ("LO", "AT"),
            ("LS", "CH"),
            ("EP", "PL"),
            ("K", "US"),
            ("C", "CA"),
            ("RJ", "JP"),
            ("RK", "KR"),
            ("Z", "CN"),
            ("YB", "AU"),
            ("YS", "AU"),
            ("YM", "AU"),
            ("NZ", "NZ"),
        ])
    });

    // Try the longest matching prefix first (two letters beats one).
    if icao.len() >= 2 {
        if let Some(code) = table.get(&icao[0..2]) {
            return code;
        }
    }
    if !icao.is_empty() {
        if let Some(code) = table.get(&icao[0..1]) {
            return code;
        }
    }
    "XX"
}

/// True for North American ICAO prefixes, used by `{PARKING}` expansion
/// ("gate" vs "stand") per spec §4.4.
pub fn is_north_american(icao: &str) -> bool {
    icao.starts_with('K') || icao.starts_with('C')
}

/// The next controller role for a handoff at the end of a phase, per spec
/// §4.4 "Handoff protocol". `None` means no handoff (terminal phases), per
/// DESIGN.md Open Question (e).
pub fn handoff_next_role(phase: AtcPhase) -> Option<Role> {
    match phase {
        AtcPhase::PreFlightParked => Some(Role::Delivery),
        AtcPhase::Startup => Some(Role::Ground),
        AtcPhase::TaxiOut => Some(Role::Tower),
        AtcPhase::Depart => Some(Role::Departure),
        AtcPhase::ClimbOut => Some(Role::Center),
        AtcPhase::Cruise => Some(Role::Approach),
        AtcPhase::Approach => Some(Role::Tower),
        AtcPhase::Holding => Some(Role::Approach),
        AtcPhase::Final => Some(Role::Tower),
        AtcPhase::GoAround => Some(Role::Tower),
        AtcPhase::Braking => Some(Role::Ground),
        AtcPhase::TaxiIn => Some(Role::Ground),
        AtcPhase::PostFlightParked => None,
        AtcPhase::Shutdown => None,
    }
}

/// Whether `{HANDOFF}` should include the facility name alongside the
/// controller name, per spec §4.4: "When the next role is approach or
/// cruise, include the facility name; otherwise omit it." ("cruise" here
/// names the en-route/center handoff, the only other facility-qualified
/// case.)
pub fn handoff_includes_facility_name(role: Role) -> bool {
    matches!(role, Role::Approach | Role::Center)
}

/// English digit words, per spec §4.4 post-expansion cleanup: "0"->"zero"
/// ... "9"->"niner".
pub fn digit_word(c: char) -> Option<&'static str> {
    Some(match c {
        '0' => "zero",
        '1' => "one",
        '2' => "two",
        '3' => "three",
        '4' => "four",
        '5' => "five",
        '6' => "six",
        '7' => "seven",
        '8' => "eight",
        '9' => "niner",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_icaos_resolve() {
        assert_eq!(icao_to_iso("EGLL"), "GB");
        assert_eq!(icao_to_iso("KJFK"), "US");
        assert_eq!(icao_to_iso("CYYZ"), "CA");
    }

    #[test]
    fn unknown_icao_falls_back() {
        assert_eq!(icao_to_iso("QQ"), "XX");
    }

    #[test]
    fn na_prefixes_use_gate() {
        assert!(is_north_american("KJFK"));
        assert!(is_north_american("CYYZ"));
        assert!(!is_north_american("EGLL"));
    }
}
