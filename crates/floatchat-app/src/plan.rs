// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::classify::{Classification, GeoPoint, RowMismatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartAxes {
    pub x: &'static str,
    pub y: &'static str,
    /// Depth-down convention: larger pressure is drawn lower.
    pub y_descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapFields {
    pub lat: &'static str,
    pub lon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct VisualizationPlan {
    pub show_table: bool,
    pub show_chart: bool,
    pub show_map: bool,
    pub chart_axes: Option<ChartAxes>,
    pub map_fields: Option<MapFields>,
    pub map_center: Option<GeoPoint>,
    pub rejected: Option<RowMismatch>,
}

impl VisualizationPlan {
    pub const fn shows_anything(&self) -> bool {
        self.show_table || self.show_chart || self.show_map
    }
}

pub fn select_views(classification: &Classification) -> VisualizationPlan {
    if let Some(mismatch) = &classification.mismatch {
        return VisualizationPlan {
            rejected: Some(mismatch.clone()),
            ..VisualizationPlan::default()
        };
    }

    let mut plan = VisualizationPlan::default();

    if let Some(profile) = classification.profile {
        plan.show_chart = true;
        plan.chart_axes = Some(ChartAxes {
            x: profile.measurement(),
            y: profile.pressure,
            y_descending: true,
        });
    } else if !classification.is_empty() {
        plan.show_table = true;
    }

    if let Some(geo) = classification.geo {
        plan.show_map = true;
        plan.map_fields = Some(MapFields {
            lat: geo.lat,
            lon: geo.lon,
        });
        plan.map_center = geo.center;
    }

    plan
}
