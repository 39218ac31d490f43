//! Phrase catalogue file loader — §6 "Phrase catalogue (consumed)".
//!
//! The JSON shape is a flat object mapping phase key to an array of
//! exchanges; `atcwave_core::phrases::PhraseCatalogue::from_raw` owns the
//! phase-key validation, this module only owns the file read and parse.

use atcwave_core::model::Exchange;
use atcwave_core::phrases::PhraseCatalogue;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhraseLoadError {
    #[error("failed to read phrase catalogue at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse phrase catalogue at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load(path: &Path) -> Result<PhraseCatalogue, PhraseLoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| PhraseLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let raw: HashMap<String, Vec<Exchange>> =
        serde_json::from_str(&text).map_err(|source| PhraseLoadError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    Ok(PhraseCatalogue::from_raw(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_a_minimal_catalogue() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"taxi_out": [{{"id": "x", "initiator": "pilot", "pilot": "ready to taxi"}}]}}"#
        )
        .unwrap();
        let catalogue = load(file.path()).unwrap();
        assert!(!catalogue.is_empty());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let result = load(Path::new("/nonexistent/phrases.json"));
        assert!(matches!(result, Err(PhraseLoadError::Io { .. })));
    }
}
