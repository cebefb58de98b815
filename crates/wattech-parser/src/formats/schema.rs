use std::collections::HashMap;

use once_cell::sync::Lazy;

pub const APPLIANCE_COLUMNS: [&str; 6] = [
    "name",
    "power_rating",
    "usage_days",
    "usage_factor",
    "unit",
    "consumption",
];

/// Positional names applied when a weather table has exactly this many columns.
pub const WEATHER_COLUMNS: [&str; 7] = [
    "DATE",
    "HOUR_UTC",
    "TEMP_MAX",
    "TEMP_MIN",
    "HUMIDITY",
    "WIND_DIR",
    "WIND_SPEED",
];

pub const PRICE_MONTH_COLUMN: &str = "MES_REFERENCIA";
pub const PRICE_DAY_COLUMN: &str = "DIA";
pub const PRICE_HOUR_COLUMN: &str = "HORA";

/// Combined date-hour column added by the weather, price and sensor paths.
pub const TIMESTAMP_COLUMN: &str = "DATAHORA";

pub const SENSOR_COLUMNS: [&str; 7] = [
    "sensor_model",
    "measure_unit",
    "device",
    "location",
    "data_type",
    "data",
    "created_at",
];

/// A row missing any of these after parsing is dropped.
pub const SENSOR_CRITICAL_COLUMNS: [&str; 3] = ["data", "created_at", "data_type"];

pub const UNIT_COLUMN: &str = "unit";
pub const METRIC_COLUMN: &str = "metric";

static SENSOR_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("tipo_dado", "data_type"),
        ("valor", "data"),
        ("timestamp", "created_at"),
    ])
});

static UNIT_TABLE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("kwh", "kWh"),
        ("wh", "Wh"),
        ("w", "W"),
        ("%", "pct"),
        ("v", "V"),
        ("°c", "C"),
        ("c", "C"),
        ("a", "A"),
    ])
});

static METRIC_TABLE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("energia", "energy"),
        ("energy", "energy"),
        ("potência", "power"),
        ("potencia", "power"),
        ("power", "power"),
        ("fator de potência", "power_factor"),
        ("fator de potencia", "power_factor"),
        ("power factor", "power_factor"),
        ("tensão", "voltage"),
        ("tensao", "voltage"),
        ("voltage", "voltage"),
        ("temperatura", "temperature"),
        ("temperature", "temperature"),
        ("corrente", "current"),
        ("current", "current"),
    ])
});

/// Lowercase, trim, and turn spaces and hyphens into underscores, then resolve
/// known synonyms (`valor` -> `data`).
pub fn canonical_sensor_column(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match SENSOR_ALIASES.get(normalized.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => normalized,
    }
}

/// Canonical unit spelling; unknown units come back trimmed.
pub fn canonical_unit(raw: &str) -> String {
    lookup_canonical(&UNIT_TABLE, raw)
}

/// Canonical metric name; unknown metrics come back trimmed.
pub fn canonical_metric(raw: &str) -> String {
    lookup_canonical(&METRIC_TABLE, raw)
}

fn lookup_canonical(table: &HashMap<&'static str, &'static str>, raw: &str) -> String {
    let trimmed = raw.trim();
    match table.get(trimmed.to_lowercase().as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => trimmed.to_string(),
    }
}

pub fn is_placeholder_column(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with("Unnamed")
}
