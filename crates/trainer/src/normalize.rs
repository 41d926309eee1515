//! Feature normalization
//!
//! Turns a freshly loaded all-text [`Table`] into typed columns a booster can
//! consume. Normalization never fails: a numeric or date cell that cannot be
//! coerced becomes the `-1` sentinel. Running it on its own output changes
//! nothing.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::dataset::{CategoricalColumn, Column, Table};
use crate::schema::{ColumnKind, ColumnSpec, Schema, SchemaConfig};

/// Value written for missing or unparsable numeric and date cells
pub const SENTINEL: i64 = -1;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Default)]
pub struct FeatureNormalizer {
    config: SchemaConfig,
}

impl FeatureNormalizer {
    pub fn new(config: SchemaConfig) -> Self {
        Self { config }
    }

    /// Infer the schema descriptor for `table` and normalize with it
    pub fn normalize(&self, table: Table) -> Table {
        let schema = Schema::infer(&table, &self.config);
        Self::normalize_with(table, &schema)
    }

    /// Normalize `table` following an explicit descriptor
    ///
    /// Columns absent from `schema` are treated like undeclared text:
    /// text becomes categorical, typed columns are kept. Derived date columns
    /// are appended after all other columns, in descriptor order.
    pub fn normalize_with(table: Table, schema: &Schema) -> Table {
        let n_rows = table.n_rows();
        let mut output: Vec<(String, Column)> = Vec::with_capacity(table.n_columns());
        let mut derived: Vec<(String, Column)> = Vec::new();

        for (name, column) in table.into_columns() {
            let spec = schema.get(&name);
            match spec.map(|s| s.kind) {
                Some(ColumnKind::Date) => {
                    let (years, months) = date_parts(&column);
                    derived.push((format!("{name}_year"), Column::Integer(years)));
                    derived.push((format!("{name}_month"), Column::Integer(months)));
                }
                _ => {
                    let column = normalize_column(column, spec);
                    output.push((name, column));
                }
            }
        }

        for (name, column) in derived {
            match output.iter_mut().find(|(existing, _)| *existing == name) {
                Some((_, slot)) => *slot = column,
                None => output.push((name, column)),
            }
        }

        Table::from_parts(output, n_rows)
    }
}

fn normalize_column(column: Column, spec: Option<&ColumnSpec>) -> Column {
    let Some(spec) = spec else {
        return match column {
            Column::Text(values) => Column::Categorical(CategoricalColumn::from_text(&values)),
            typed => typed,
        };
    };

    match spec.kind {
        ColumnKind::Numeric => to_numeric(column, spec.declared),
        ColumnKind::Categorical => to_categorical(column),
        ColumnKind::Label => to_label(column),
        ColumnKind::Identifier | ColumnKind::Date => column,
    }
}

fn to_numeric(column: Column, sentinel: bool) -> Column {
    let missing = if sentinel { SENTINEL as f64 } else { f64::NAN };
    match column {
        Column::Integer(values) => Column::Integer(values),
        Column::Float(values) => Column::Float(
            values
                .into_iter()
                .map(|v| if v.is_nan() { missing } else { v })
                .collect(),
        ),
        other => Column::Float(
            (0..other.len())
                .map(|row| {
                    other
                        .display(row)
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .filter(|v| !v.is_nan())
                        .unwrap_or(missing)
                })
                .collect(),
        ),
    }
}

fn to_categorical(column: Column) -> Column {
    match column {
        Column::Categorical(c) => Column::Categorical(c),
        Column::Text(values) => Column::Categorical(CategoricalColumn::from_text(&values)),
        other => {
            let values: Vec<Option<String>> = (0..other.len()).map(|row| other.display(row)).collect();
            Column::Categorical(CategoricalColumn::from_text(&values))
        }
    }
}

/// Integer labels when every cell parses; otherwise the raw cells are kept so
/// the offending value, or its absence, can be reported
fn to_label(column: Column) -> Column {
    match column {
        Column::Integer(values) => Column::Integer(values),
        other => {
            let parsed: Option<Vec<i64>> = (0..other.len())
                .map(|row| other.display(row).and_then(|v| parse_integer(v.trim())))
                .collect();
            match parsed {
                Some(values) => Column::Integer(values),
                None => other,
            }
        }
    }
}

fn parse_integer(value: &str) -> Option<i64> {
    value.parse::<i64>().ok().or_else(|| {
        value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.fract() == 0.0)
            .map(|v| v as i64)
    })
}

fn date_parts(column: &Column) -> (Vec<i64>, Vec<i64>) {
    (0..column.len())
        .map(|row| {
            column
                .display(row)
                .and_then(|v| parse_year_month(v.trim()))
                .map_or((SENTINEL, SENTINEL), |(y, m)| (i64::from(y), i64::from(m)))
        })
        .unzip()
}

/// Calendar year and month of a date-like string
pub fn parse_year_month(value: &str) -> Option<(i32, u32)> {
    if value.is_empty() {
        return None;
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some((ts.year(), ts.month()));
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, format) {
            return Some((ts.year(), ts.month()));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some((date.year(), date.month()));
        }
    }

    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());

    // 20180102
    if value.len() == 8 && digits(value) {
        let year = value[..4].parse().ok()?;
        let month = value[4..6].parse().ok()?;
        let day = value[6..].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day).map(|d| (d.year(), d.month()));
    }

    // 2018-03 or 2018/03
    let mut parts = value.split(['-', '/']);
    if let (Some(year), Some(month), None) = (parts.next(), parts.next(), parts.next()) {
        if year.len() == 4 && digits(year) && (1..=2).contains(&month.len()) && digits(month) {
            let year = year.parse().ok()?;
            let month = month.parse().ok()?;
            return NaiveDate::from_ymd_opt(year, month, 1).map(|d| (d.year(), d.month()));
        }
    }

    None
}
