//! First-run preferences

use sj_core::PreferenceRoot;

use crate::document::{parse_document, DocumentError};

/// The bundled defaults document.
pub const DEFAULTS_JSON: &str = include_str!("../data/defaults.json");

/// Preferences used on first run and by "reset to defaults".
pub fn default_preferences() -> Result<PreferenceRoot, DocumentError> {
    parse_document(DEFAULTS_JSON).map(|imported| imported.prefs)
}
