//! # turno-settings
//!
//! Configuration management with layered sources for the Turno daemon.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`TurnoSettings::default()`]
//! 2. **User file** — `~/.turno/settings.json` (merged over defaults)
//! 3. **Environment variables** — `TURNO_*` overrides (highest priority)
//!
//! The daemon loads settings once at boot and passes them down explicitly;
//! there is no global settings instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, load_settings, load_settings_from_path, settings_path};
pub use types::{EngineSettings, ServerSettings, TurnoSettings};

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = TurnoSettings::default();
        let _path = settings_path();
    }
}
