// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use floatchat_app::{
    Classification, GeoFields, GeoPoint, Message, PLATFORM_FIELD, ProfileFields, Record,
    RowMismatch, SALINITY_FIELD, Strictness, TEMPERATURE_FIELD, VisualizationPlan, classify_with,
    display_value, has_field, numeric_field, select_views,
};

const MISSING_LABEL: &str = "N/A";
const CHART_X_PADDING: f64 = 1.0;
const MAP_MIN_HALF_LON: f64 = 40.0;
const MAP_MIN_HALF_LAT: f64 = 20.0;
const MAP_MARGIN: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    pub field: &'static str,
    /// `(measurement, pressure)` in ascending pressure order.
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub title: String,
    pub series: Vec<ChartSeries>,
    pub x_bounds: [f64; 2],
    pub pressure_bounds: [f64; 2],
    pub y_descending: bool,
}

impl ChartView {
    pub fn x_label(&self) -> &'static str {
        match self.series.as_slice() {
            [only] if only.field == TEMPERATURE_FIELD => "temperature (°C)",
            [only] if only.field == SALINITY_FIELD => "salinity (PSU)",
            _ => "value",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapPoint {
    pub lat: f64,
    pub lon: f64,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapView {
    pub center: GeoPoint,
    pub points: Vec<MapPoint>,
}

impl MapView {
    /// Longitude and latitude windows around the center wide enough to hold
    /// every point, clamped to the globe.
    pub fn bounds(&self) -> ([f64; 2], [f64; 2]) {
        let half_lon = self
            .points
            .iter()
            .map(|point| (point.lon - self.center.lon).abs() + MAP_MARGIN)
            .fold(MAP_MIN_HALF_LON, f64::max);
        let half_lat = self
            .points
            .iter()
            .map(|point| (point.lat - self.center.lat).abs() + MAP_MARGIN)
            .fold(MAP_MIN_HALF_LAT, f64::max);

        (
            clamp_window(self.center.lon, half_lon, 180.0),
            clamp_window(self.center.lat, half_lat, 90.0),
        )
    }
}

fn clamp_window(center: f64, half: f64, limit: f64) -> [f64; 2] {
    if half >= limit {
        return [-limit, limit];
    }
    let low = (center - half).max(-limit);
    let high = (center + half).min(limit);
    if high - low < half * 2.0 {
        if low <= -limit {
            return [-limit, -limit + half * 2.0];
        }
        return [limit - half * 2.0, limit];
    }
    [low, high]
}

/// Everything needed to draw one message's visuals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageView {
    pub plan: VisualizationPlan,
    pub table: Option<TableView>,
    pub chart: Option<ChartView>,
    pub map: Option<MapView>,
}

impl MessageView {
    pub fn is_blank(&self) -> bool {
        self.table.is_none() && self.chart.is_none() && self.map.is_none()
    }
}

/// Builds the visuals for one message. Any fault here belongs to the
/// message's render boundary, never to the conversation.
pub fn build_message_view(message: &Message, strictness: Strictness) -> Result<MessageView> {
    let rows = message.rows();
    let classification = classify_with(rows, strictness);
    let plan = select_views(&classification);
    if !plan.shows_anything() {
        return Ok(MessageView {
            plan,
            ..MessageView::default()
        });
    }

    let table = plan.show_table.then(|| build_table(rows));
    let chart = match classification.profile {
        Some(profile) if plan.show_chart => Some(build_chart(rows, profile)?),
        _ => None,
    };
    let map = match classification.geo {
        Some(geo) if plan.show_map => Some(build_map(rows, geo, &classification)?),
        _ => None,
    };

    Ok(MessageView {
        plan,
        table,
        chart,
        map,
    })
}

pub fn build_table(rows: &[Record]) -> TableView {
    let Some(first) = rows.first() else {
        return TableView {
            headers: Vec::new(),
            rows: Vec::new(),
        };
    };

    let keys = first.keys().collect::<Vec<_>>();
    TableView {
        headers: keys.iter().map(|key| format_header(key)).collect(),
        rows: rows
            .iter()
            .map(|row| keys.iter().map(|key| display_value(row.get(*key))).collect())
            .collect(),
    }
}

/// `platform_number` becomes `Platform Number`.
pub fn format_header(key: &str) -> String {
    key.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn build_chart(rows: &[Record], profile: ProfileFields) -> Result<ChartView> {
    let mut sorted = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            numeric_field(row, profile.pressure)
                .map(|pressure| (pressure, row))
                .ok_or_else(|| missing_number(index, profile.pressure))
        })
        .collect::<Result<Vec<_>>>()?;
    sorted.sort_by(|left, right| left.0.total_cmp(&right.0));

    let mut fields = Vec::new();
    if profile.has_temperature {
        fields.push(TEMPERATURE_FIELD);
    }
    if profile.has_salinity {
        fields.push(SALINITY_FIELD);
    }
    if fields.is_empty() {
        bail!("profile has neither temperature nor salinity to plot");
    }

    let series = fields
        .into_iter()
        .map(|field| -> Result<ChartSeries> {
            let points = sorted
                .iter()
                .map(|(pressure, row)| {
                    numeric_field(row, field)
                        .map(|value| (value, *pressure))
                        .ok_or_else(|| {
                            anyhow!("profile row at {pressure} dbar has no numeric {field}")
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ChartSeries { field, points })
        })
        .collect::<Result<Vec<_>>>()?;

    let (x_min, x_max) = series
        .iter()
        .flat_map(|line| line.points.iter().map(|(value, _)| *value))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), value| {
            (low.min(value), high.max(value))
        });
    let pressure_bounds = match (sorted.first(), sorted.last()) {
        (Some((low, _)), Some((high, _))) => [*low, *high],
        _ => bail!("profile has no rows"),
    };

    let float = rows
        .first()
        .map(float_label)
        .unwrap_or_else(|| MISSING_LABEL.to_owned());

    Ok(ChartView {
        title: format!("Profile for Float #{float}"),
        series,
        x_bounds: [x_min - CHART_X_PADDING, x_max + CHART_X_PADDING],
        pressure_bounds,
        y_descending: true,
    })
}

pub fn build_map(
    rows: &[Record],
    geo: GeoFields,
    classification: &Classification,
) -> Result<MapView> {
    let points = rows
        .iter()
        .enumerate()
        .map(|(index, row)| -> Result<MapPoint> {
            let lat = numeric_field(row, geo.lat).ok_or_else(|| missing_number(index, geo.lat))?;
            let lon = numeric_field(row, geo.lon).ok_or_else(|| missing_number(index, geo.lon))?;
            Ok(MapPoint {
                lat,
                lon,
                label: map_label(row, lat, lon),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let center = geo.center.ok_or_else(|| {
        anyhow!(
            "cannot center map over {} rows without numeric coordinates",
            classification.row_count
        )
    })?;

    Ok(MapView { center, points })
}

pub fn map_label(row: &Record, lat: f64, lon: f64) -> String {
    let temperature = numeric_field(row, TEMPERATURE_FIELD)
        .map(|value| format!("{value:.2}"))
        .unwrap_or_else(|| MISSING_LABEL.to_owned());
    format!(
        "Float: {}  Temp: {temperature} °C  Lat: {lat:.3}, Lon: {lon:.3}",
        float_label(row)
    )
}

fn float_label(row: &Record) -> String {
    if has_field(row, PLATFORM_FIELD) {
        display_value(row.get(PLATFORM_FIELD))
    } else {
        MISSING_LABEL.to_owned()
    }
}

fn missing_number(index: usize, field: &str) -> anyhow::Error {
    anyhow!("row {index} has no numeric {field}")
}

pub fn rejection_notice(mismatch: &RowMismatch) -> String {
    format!(
        "row {} lacks `{}` from the first row; visuals skipped",
        mismatch.row, mismatch.field
    )
}
