//! ScriptJaeger Preferences
//!
//! This crate reads and writes the persisted preferences document, migrates
//! legacy document shapes and ships the first-run defaults.

pub mod defaults;
pub mod document;
pub mod export;
pub mod migrate;

pub use defaults::default_preferences;
pub use document::{parse_document, parse_value, DocumentError, Imported, Warning};
pub use export::export_document;
pub use migrate::{detect_version, migrate, Migrated, CURRENT_VERSION};

use sj_core::PolicyStore;

/// Replace the store's preferences with a document.
pub fn import_document(store: &mut PolicyStore, text: &str) -> Result<Vec<Warning>, DocumentError> {
    let imported = parse_document(text)?;
    store.replace_preferences(imported.prefs);
    Ok(imported.warnings)
}

/// Merge a document into the store's preferences. Top-level settings the
/// document leaves out keep their current values.
pub fn merge_document(store: &mut PolicyStore, text: &str) -> Result<Vec<Warning>, DocumentError> {
    let imported = parse_document(text)?;
    store.merge_preferences(&imported.prefs, &imported.settings);
    Ok(imported.warnings)
}

/// Reset the store to the bundled defaults.
pub fn reset_to_defaults(store: &mut PolicyStore) -> Result<(), DocumentError> {
    store.replace_preferences(default_preferences()?);
    Ok(())
}
