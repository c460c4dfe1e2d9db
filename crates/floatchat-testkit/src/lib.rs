// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

#[cfg(feature = "tempdir")]
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
#[cfg(feature = "tempdir")]
use std::path::PathBuf;

/// `(lat_lo, lat_hi, lon_lo, lon_hi)` per ocean basin.
const BASINS: [(f64, f64, f64, f64); 6] = [
    (8.0, 24.0, 52.0, 72.0),      // Arabian Sea
    (6.0, 21.0, 81.0, 94.0),      // Bay of Bengal
    (-5.0, 5.0, 55.0, 95.0),      // Equatorial Indian
    (-45.0, -20.0, 40.0, 110.0),  // Southern Indian
    (25.0, 55.0, -60.0, -15.0),   // North Atlantic
    (-10.0, 10.0, 150.0, 200.0),  // Tropical Pacific
];

const PLATFORM_PREFIXES: [i64; 6] = [1_901, 2_902, 2_903, 5_904, 5_906, 6_902];

pub const SAMPLE_QUESTIONS: [&str; 5] = [
    "Plot the temperature profile for float 53548 on cycle 97",
    "Where are the floats near the equator?",
    "Show salinity against depth for float 2902746",
    "Which float reported the warmest surface temperature?",
    "How many profiles were recorded in March 2023?",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64
    }

    fn range(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.unit()
    }
}

/// Deterministic generator of ARGO-shaped result rows.
#[derive(Debug, Clone)]
pub struct ArgoFaker {
    rng: DeterministicRng,
}

impl ArgoFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn platform_number(&mut self) -> i64 {
        let prefix = PLATFORM_PREFIXES[self.rng.int_n(PLATFORM_PREFIXES.len())];
        prefix * 1_000 + self.rng.int_n(1_000) as i64
    }

    pub fn position(&mut self) -> (f64, f64) {
        let (lat_lo, lat_hi, lon_lo, lon_hi) = BASINS[self.rng.int_n(BASINS.len())];
        let lat = round3(self.rng.range(lat_lo, lat_hi));
        let lon = wrap_longitude(self.rng.range(lon_lo, lon_hi));
        (lat, round3(lon))
    }

    pub fn juld(&mut self) -> String {
        let year = 2019 + self.rng.int_n(6);
        let month = 1 + self.rng.int_n(12);
        let day = 1 + self.rng.int_n(28);
        format!("{year:04}-{month:02}-{day:02}")
    }

    /// One cast for a single float: shared position, pressure increasing,
    /// temperature falling off through the thermocline.
    pub fn profile(&mut self, platform_number: i64, points: usize) -> Vec<Map<String, Value>> {
        let (lat, lon) = self.position();
        let juld = self.juld();
        let cycle = 1 + self.rng.int_n(250) as i64;
        let surface = self.rng.range(24.0, 30.0);
        let deep = self.rng.range(2.0, 5.0);
        let surface_salinity = self.rng.range(34.0, 36.5);

        (0..points)
            .map(|index| {
                let pressure = round3(5.0 + index as f64 * 2_000.0 / points.max(1) as f64);
                let depth_fraction = (pressure / 2_000.0).min(1.0);
                let temperature =
                    deep + (surface - deep) * (-depth_fraction * 4.0).exp() + self.jitter(0.15);
                let salinity = surface_salinity - 0.8 * depth_fraction + self.jitter(0.02);
                object(json!({
                    "platform_number": platform_number,
                    "cycle_number": cycle,
                    "juld": juld,
                    "latitude": lat,
                    "longitude": lon,
                    "pressure": pressure,
                    "temperature": round3(temperature),
                    "salinity": round3(salinity),
                }))
            })
            .collect()
    }

    /// Surface fixes for distinct floats.
    pub fn positions(&mut self, count: usize) -> Vec<Map<String, Value>> {
        (0..count)
            .map(|_| {
                let platform_number = self.platform_number();
                let (lat, lon) = self.position();
                let juld = self.juld();
                let temperature = round3(self.rng.range(18.0, 30.0));
                object(json!({
                    "platform_number": platform_number,
                    "juld": juld,
                    "latitude": lat,
                    "longitude": lon,
                    "temperature": temperature,
                }))
            })
            .collect()
    }

    /// Aggregate rows with no coordinates and no pressure.
    pub fn monthly_counts(&mut self, months: usize) -> Vec<Map<String, Value>> {
        (0..months)
            .map(|index| {
                let profiles = 40 + self.rng.int_n(160) as i64;
                object(json!({
                    "month": format!("2023-{:02}", index % 12 + 1),
                    "profile_count": profiles,
                }))
            })
            .collect()
    }

    fn jitter(&mut self, scale: f64) -> f64 {
        self.rng.range(-scale, scale)
    }
}

fn round3(value: f64) -> f64 {
    (value * 1_000.0).round() / 1_000.0
}

fn wrap_longitude(lon: f64) -> f64 {
    if lon > 180.0 { lon - 360.0 } else { lon }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Converts a JSON array literal into rows; non-object entries are skipped.
pub fn rows(value: Value) -> Vec<Map<String, Value>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

pub fn single_position_rows() -> Vec<Map<String, Value>> {
    rows(json!([
        {"latitude": 10, "longitude": 20, "platform_number": 5, "temperature": 15.2}
    ]))
}

pub fn single_float_profile_rows() -> Vec<Map<String, Value>> {
    rows(json!([
        {"pressure": 10, "temperature": 5, "platform_number": 1},
        {"pressure": 20, "temperature": 4, "platform_number": 1}
    ]))
}

pub fn mixed_float_profile_rows() -> Vec<Map<String, Value>> {
    rows(json!([
        {"pressure": 10, "temperature": 5, "platform_number": 1},
        {"pressure": 20, "temperature": 4, "platform_number": 2}
    ]))
}

/// Second row drops `latitude`, which only breaks the map at render time.
pub fn heterogeneous_position_rows() -> Vec<Map<String, Value>> {
    rows(json!([
        {"latitude": -12.5, "longitude": 71.25, "platform_number": 2902746, "temperature": 27.1},
        {"longitude": 72.0, "platform_number": 2902747, "temperature": 26.4}
    ]))
}

/// Fresh temp dir plus a `config.toml` path inside it that does not exist yet.
#[cfg(feature = "tempdir")]
pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}
