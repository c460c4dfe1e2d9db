// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde_json::Value;

use crate::model::{
    LATITUDE_FIELD, LONGITUDE_FIELD, PLATFORM_FIELD, PRESSURE_FIELD, Record, SALINITY_FIELD,
    TEMPERATURE_FIELD, has_field, numeric_field,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Inspect the first record only.
    #[default]
    Lenient,
    /// Also require every later record to carry the first record's fields.
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoFields {
    pub lat: &'static str,
    pub lon: &'static str,
    /// Plain arithmetic mean over every record. `None` when some record has
    /// no numeric coordinate.
    pub center: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileFields {
    pub pressure: &'static str,
    pub has_temperature: bool,
    pub has_salinity: bool,
}

impl ProfileFields {
    /// Temperature wins when both measurements are present.
    pub const fn measurement(&self) -> &'static str {
        if self.has_temperature {
            TEMPERATURE_FIELD
        } else {
            SALINITY_FIELD
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowMismatch {
    pub row: usize,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Classification {
    pub row_count: usize,
    pub geo: Option<GeoFields>,
    pub profile: Option<ProfileFields>,
    pub mismatch: Option<RowMismatch>,
}

impl Classification {
    pub const fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub const fn is_geo(&self) -> bool {
        self.geo.is_some()
    }

    pub const fn is_profile(&self) -> bool {
        self.profile.is_some()
    }
}

pub fn classify(rows: &[Record]) -> Classification {
    classify_with(rows, Strictness::Lenient)
}

pub fn classify_with(rows: &[Record], strictness: Strictness) -> Classification {
    let Some(first) = rows.first() else {
        return Classification::default();
    };

    let mismatch = match strictness {
        Strictness::Lenient => None,
        Strictness::Strict => find_mismatch(first, rows),
    };

    Classification {
        row_count: rows.len(),
        geo: geo_fields(first, rows),
        profile: profile_fields(first, rows),
        mismatch,
    }
}

fn geo_fields(first: &Record, rows: &[Record]) -> Option<GeoFields> {
    if !has_field(first, LATITUDE_FIELD) || !has_field(first, LONGITUDE_FIELD) {
        return None;
    }

    Some(GeoFields {
        lat: LATITUDE_FIELD,
        lon: LONGITUDE_FIELD,
        center: mean_center(rows),
    })
}

fn mean_center(rows: &[Record]) -> Option<GeoPoint> {
    let mut lat_sum = 0.0;
    let mut lon_sum = 0.0;
    for row in rows {
        lat_sum += numeric_field(row, LATITUDE_FIELD)?;
        lon_sum += numeric_field(row, LONGITUDE_FIELD)?;
    }
    let count = rows.len() as f64;
    Some(GeoPoint {
        lat: lat_sum / count,
        lon: lon_sum / count,
    })
}

fn profile_fields(first: &Record, rows: &[Record]) -> Option<ProfileFields> {
    if rows.len() < 2 || !has_field(first, PRESSURE_FIELD) {
        return None;
    }

    let has_temperature = has_field(first, TEMPERATURE_FIELD);
    let has_salinity = has_field(first, SALINITY_FIELD);
    if !has_temperature && !has_salinity {
        return None;
    }

    if distinct_float_count(rows) != 1 {
        return None;
    }

    Some(ProfileFields {
        pressure: PRESSURE_FIELD,
        has_temperature,
        has_salinity,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FloatIdentity<'a> {
    Absent,
    Number(f64),
    Text(&'a str),
    Flag(bool),
    Other(&'a Value),
}

impl<'a> FloatIdentity<'a> {
    fn of(record: &'a Record) -> Self {
        let Some(value) = record.get(PLATFORM_FIELD) else {
            return Self::Absent;
        };
        match value {
            Value::Null => Self::Absent,
            Value::Number(number) => match number.as_f64() {
                Some(number) => Self::Number(number),
                None => Self::Other(value),
            },
            Value::String(text) => Self::Text(text),
            Value::Bool(flag) => Self::Flag(*flag),
            other => Self::Other(other),
        }
    }
}

/// Number of distinct float identifiers, saturating at 2.
fn distinct_float_count(rows: &[Record]) -> usize {
    let Some(first) = rows.first() else {
        return 0;
    };
    let identity = FloatIdentity::of(first);
    if rows.iter().skip(1).all(|row| FloatIdentity::of(row) == identity) {
        1
    } else {
        2
    }
}

fn find_mismatch(first: &Record, rows: &[Record]) -> Option<RowMismatch> {
    let expected = first
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, _)| key.as_str())
        .collect::<Vec<_>>();

    rows.iter().enumerate().skip(1).find_map(|(index, row)| {
        expected
            .iter()
            .find(|field| !has_field(row, field))
            .map(|field| RowMismatch {
                row: index,
                field: (*field).to_owned(),
            })
    })
}

#[cfg(test)]
mod tests {
    use super::{Strictness, classify, classify_with, distinct_float_count};
    use crate::model::{SALINITY_FIELD, TEMPERATURE_FIELD};
    use floatchat_testkit::{
        ArgoFaker, heterogeneous_position_rows, mixed_float_profile_rows, rows,
        single_float_profile_rows, single_position_rows,
    };
    use serde_json::json;

    #[test]
    fn empty_rows_classify_as_nothing() {
        let classification = classify(&[]);
        assert!(classification.is_empty());
        assert!(!classification.is_geo());
        assert!(!classification.is_profile());
        assert!(classification.mismatch.is_none());
    }

    #[test]
    fn single_position_is_geo_but_not_profile() {
        let classification = classify(&single_position_rows());
        assert_eq!(classification.row_count, 1);
        assert!(classification.is_geo());
        assert!(!classification.is_profile());
    }

    #[test]
    fn single_float_profile_is_profile_without_geo() {
        let classification = classify(&single_float_profile_rows());
        let profile = classification.profile.expect("profile fields");
        assert_eq!(profile.measurement(), TEMPERATURE_FIELD);
        assert!(!classification.is_geo());
    }

    #[test]
    fn two_floats_are_not_a_profile() {
        let classification = classify(&mixed_float_profile_rows());
        assert!(!classification.is_profile());
        assert_eq!(classification.row_count, 2);
    }

    #[test]
    fn salinity_only_profile_uses_salinity_axis() {
        let data = rows(json!([
            {"pressure": 5, "salinity": 35.1, "platform_number": 7},
            {"pressure": 50, "salinity": 35.4, "platform_number": 7},
        ]));
        let profile = classify(&data).profile.expect("salinity profile");
        assert!(!profile.has_temperature);
        assert!(profile.has_salinity);
        assert_eq!(profile.measurement(), SALINITY_FIELD);
    }

    #[test]
    fn profile_needs_a_measurement_column() {
        let data = rows(json!([
            {"pressure": 5, "platform_number": 7},
            {"pressure": 50, "platform_number": 7},
        ]));
        assert!(!classify(&data).is_profile());
    }

    #[test]
    fn zero_valued_fields_still_count_as_present() {
        let data = rows(json!([
            {"latitude": 0, "longitude": 0, "pressure": 0, "temperature": 0, "platform_number": 0},
            {"latitude": 0, "longitude": 0, "pressure": 10, "temperature": 0, "platform_number": 0},
        ]));
        let classification = classify(&data);
        assert!(classification.is_geo());
        assert!(classification.is_profile());
    }

    #[test]
    fn null_fields_count_as_absent() {
        let data = rows(json!([
            {"latitude": null, "longitude": 20, "pressure": null, "temperature": 3, "platform_number": 1},
            {"latitude": 1, "longitude": 20, "pressure": 10, "temperature": 2, "platform_number": 1},
        ]));
        let classification = classify(&data);
        assert!(!classification.is_geo());
        assert!(!classification.is_profile());
    }

    #[test]
    fn float_ids_compare_by_numeric_value() {
        let data = rows(json!([
            {"pressure": 1, "temperature": 3, "platform_number": 4},
            {"pressure": 2, "temperature": 2, "platform_number": 4.0},
        ]));
        assert_eq!(distinct_float_count(&data), 1);
    }

    #[test]
    fn text_and_number_ids_are_distinct() {
        let data = rows(json!([
            {"pressure": 1, "temperature": 3, "platform_number": 4},
            {"pressure": 2, "temperature": 2, "platform_number": "4"},
        ]));
        assert_eq!(distinct_float_count(&data), 2);
        assert!(!classify(&data).is_profile());
    }

    #[test]
    fn rows_all_missing_float_id_share_one_identity() {
        let data = rows(json!([
            {"pressure": 10, "temperature": 5},
            {"pressure": 20, "temperature": 4},
        ]));
        assert_eq!(distinct_float_count(&data), 1);
        assert!(classify(&data).is_profile());
    }

    #[test]
    fn null_float_id_matches_missing_one() {
        let data = rows(json!([
            {"pressure": 10, "temperature": 5, "platform_number": null},
            {"pressure": 20, "temperature": 4},
        ]));
        assert!(classify(&data).is_profile());
    }

    #[test]
    fn one_missing_float_id_among_known_ids_is_not_a_profile() {
        let data = rows(json!([
            {"pressure": 10, "temperature": 5, "platform_number": 7},
            {"pressure": 20, "temperature": 4},
        ]));
        assert_eq!(distinct_float_count(&data), 2);
        let classification = classify(&data);
        assert!(!classification.is_profile());
        assert!(!classification.is_empty());
    }

    #[test]
    fn map_center_is_plain_mean() {
        let data = rows(json!([
            {"latitude": 10, "longitude": 20},
            {"latitude": 20, "longitude": 40},
            {"latitude": 60, "longitude": 0},
        ]));
        let geo = classify(&data).geo.expect("geo fields");
        let center = geo.center.expect("numeric center");
        assert!((center.lat - 30.0).abs() < f64::EPSILON);
        assert!((center.lon - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn map_center_is_unset_when_a_later_row_lacks_coordinates() {
        let geo = classify(&heterogeneous_position_rows())
            .geo
            .expect("first row drives geo");
        assert!(geo.center.is_none());
    }

    #[test]
    fn lenient_mode_ignores_later_rows() {
        let classification = classify(&heterogeneous_position_rows());
        assert!(classification.mismatch.is_none());
    }

    #[test]
    fn strict_mode_reports_first_missing_field() {
        let classification = classify_with(&heterogeneous_position_rows(), Strictness::Strict);
        let mismatch = classification.mismatch.expect("mismatch reported");
        assert_eq!(mismatch.row, 1);
        assert_eq!(mismatch.field, "latitude");
    }

    #[test]
    fn strict_mode_accepts_homogeneous_rows() {
        let mut faker = ArgoFaker::new(11);
        let data = faker.profile(5_903_377, 12);
        let classification = classify_with(&data, Strictness::Strict);
        assert!(classification.mismatch.is_none());
        assert!(classification.is_profile());
        assert!(classification.is_geo());
    }

    #[test]
    fn classification_is_deterministic() {
        let mut faker = ArgoFaker::new(3);
        let data = faker.positions(25);
        assert_eq!(classify(&data), classify(&data));
    }
}
