//! Dealer settings loader.
//!
//! Settings documents are partial: anything left out keeps the built-in
//! dealer defaults. `.yaml`/`.yml` files are read as YAML, everything else as
//! JSON.

use std::path::Path;

use dealer_payments_core::settings::DealerSettings;

use super::file;

pub fn load_settings(path: Option<&str>) -> Result<DealerSettings, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(DealerSettings::default());
    };
    let (resolved, contents) = file::read_text(path)?;
    let settings = parse_settings(&resolved, &contents)
        .map_err(|e| format!("Invalid settings in '{}': {}", resolved.display(), e))?;
    tracing::debug!(path = %resolved.display(), dealer = %settings.dealer_id, "dealer settings loaded");
    Ok(settings)
}

fn parse_settings(path: &Path, contents: &str) -> Result<DealerSettings, Box<dyn std::error::Error>> {
    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));
    let settings: DealerSettings = if is_yaml {
        serde_yaml::from_str(contents)?
    } else {
        serde_json::from_str(contents)?
    };
    settings.validate()?;
    Ok(settings)
}
