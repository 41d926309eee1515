//! Segment partitioning
//!
//! Groups rows by the value of a segmentation key. Segments come out in
//! ascending order of the key's typed value: numeric order for numeric keys,
//! lexical order for categorical and text keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dataset::{Column, Table};
use crate::errors::{PipelineError, Result};

/// Rows sharing one value of the segmentation key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub value: String,
    /// Row indices into the normalized table, ascending
    pub rows: Vec<usize>,
    pub positives: usize,
    pub negatives: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct label values present
    pub fn label_classes(&self) -> usize {
        usize::from(self.positives > 0) + usize::from(self.negatives > 0)
    }

    /// A segment can be trained only when both label values occur
    pub fn is_eligible(&self) -> bool {
        self.label_classes() >= 2
    }
}

/// Every segment of one key, eligible or not
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Partition {
    pub segments: Vec<Segment>,
    /// Rows whose key is missing
    pub unassigned_rows: usize,
}

impl Partition {
    pub fn eligible(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.is_eligible())
    }

    pub fn ineligible(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| !s.is_eligible())
    }
}

#[derive(Debug, Clone)]
pub struct SegmentPartitioner {
    key: String,
}

impl SegmentPartitioner {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Split `table` into segments; `labels` must hold 0.0 or 1.0 per row
    pub fn partition(&self, table: &Table, labels: &[f64]) -> Result<Partition> {
        let column = table
            .column(&self.key)
            .ok_or_else(|| PipelineError::MissingColumn {
                column: self.key.clone(),
            })?;

        let mut index: HashMap<String, usize> = HashMap::new();
        let mut groups: Vec<(f64, Segment)> = Vec::new();
        let mut unassigned_rows = 0;

        for row in 0..table.n_rows() {
            let Some(value) = column.display(row) else {
                unassigned_rows += 1;
                continue;
            };

            let slot = *index.entry(value).or_insert_with_key(|value| {
                groups.push((
                    sort_key(column, row),
                    Segment {
                        value: value.clone(),
                        rows: Vec::new(),
                        positives: 0,
                        negatives: 0,
                    },
                ));
                groups.len() - 1
            });

            let segment = &mut groups[slot].1;
            segment.rows.push(row);
            if labels[row] > 0.5 {
                segment.positives += 1;
            } else {
                segment.negatives += 1;
            }
        }

        if groups.is_empty() {
            return Err(PipelineError::EmptySegmentationColumn {
                column: self.key.clone(),
            });
        }

        groups.sort_by(|(a, sa), (b, sb)| a.total_cmp(b).then_with(|| sa.value.cmp(&sb.value)));

        Ok(Partition {
            segments: groups.into_iter().map(|(_, segment)| segment).collect(),
            unassigned_rows,
        })
    }
}

/// Numeric order key; text keys all share NaN and fall back to the value
fn sort_key(column: &Column, row: usize) -> f64 {
    match column {
        Column::Text(_) => f64::NAN,
        _ => column.feature_value(row),
    }
}

/// Read the label column as 0.0 / 1.0, rejecting anything else
pub fn binary_labels(table: &Table, label: &str) -> Result<Vec<f64>> {
    let column = table.column(label).ok_or_else(|| PipelineError::MissingColumn {
        column: label.to_string(),
    })?;

    (0..table.n_rows())
        .map(|row| {
            let cell = column.display(row);
            match cell.as_deref().map(str::trim).and_then(|v| v.parse::<f64>().ok()) {
                Some(v) if v == 0.0 || v == 1.0 => Ok(v),
                _ => Err(PipelineError::InvalidLabel {
                    column: label.to_string(),
                    row,
                    value: cell.unwrap_or_else(|| "<missing>".to_string()),
                }),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CategoricalColumn;
    use proptest::prelude::*;

    fn table(key: Column, labels: Vec<i64>) -> Table {
        Table::from_columns(vec![
            ("key".into(), key),
            ("purchase".into(), Column::Integer(labels)),
        ])
        .unwrap()
    }

    fn categorical(values: &[Option<&str>]) -> Column {
        let values: Vec<Option<String>> = values.iter().map(|v| v.map(str::to_string)).collect();
        Column::Categorical(CategoricalColumn::from_text(&values))
    }

    #[test]
    fn test_segments_sorted_and_eligibility() {
        let t = table(
            categorical(&[Some("B"), Some("A"), Some("B"), None, Some("A")]),
            vec![0, 1, 0, 1, 0],
        );
        let labels = binary_labels(&t, "purchase").unwrap();
        let partition = SegmentPartitioner::new("key").partition(&t, &labels).unwrap();

        let values: Vec<&str> = partition.segments.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["A", "B"]);
        assert_eq!(partition.unassigned_rows, 1);
        assert_eq!(partition.segments[0].rows, vec![1, 4]);
        assert!(partition.segments[0].is_eligible());
        assert!(!partition.segments[1].is_eligible());
        assert_eq!(partition.eligible().count(), 1);
        assert_eq!(partition.ineligible().next().unwrap().value, "B");
    }

    #[test]
    fn test_numeric_keys_sorted_numerically() {
        let t = table(
            Column::Float(vec![10.0, 2.0, f64::NAN, 1.0]),
            vec![0, 1, 1, 0],
        );
        let labels = binary_labels(&t, "purchase").unwrap();
        let partition = SegmentPartitioner::new("key").partition(&t, &labels).unwrap();

        let values: Vec<&str> = partition.segments.iter().map(|s| s.value.as_str()).collect();
        assert_eq!(values, vec!["1", "2", "10"]);
        assert_eq!(partition.unassigned_rows, 1);
    }

    #[test]
    fn test_missing_and_empty_key_are_fatal() {
        let t = table(categorical(&[None, None]), vec![0, 1]);
        let labels = binary_labels(&t, "purchase").unwrap();

        let err = SegmentPartitioner::new("channel").partition(&t, &labels).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { column } if column == "channel"));

        let err = SegmentPartitioner::new("key").partition(&t, &labels).unwrap_err();
        assert!(matches!(err, PipelineError::EmptySegmentationColumn { .. }));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let t = table(categorical(&[Some("A"), Some("A")]), vec![0, 2]);
        let err = binary_labels(&t, "purchase").unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLabel { row: 1, .. }));
    }

    #[test]
    fn test_blank_label_reported_as_missing() {
        let raw = Table::from_columns(vec![
            ("key".into(), categorical(&[Some("A"), Some("A"), Some("A")])),
            (
                "purchase".into(),
                Column::Text(vec![Some("1".into()), None, Some("yes".into())]),
            ),
        ])
        .unwrap();
        let t = crate::normalize::FeatureNormalizer::default().normalize(raw);

        let err = binary_labels(&t, "purchase").unwrap_err();
        assert!(matches!(
            &err,
            PipelineError::InvalidLabel { row: 1, value, .. } if value == "<missing>"
        ));
    }

    proptest! {
        #[test]
        fn segments_are_disjoint_and_complete(
            keys in proptest::collection::vec(proptest::option::of(0u8..5), 1..200),
        ) {
            prop_assume!(keys.iter().any(Option::is_some));
            let values: Vec<Option<String>> =
                keys.iter().map(|k| k.map(|k| format!("v{k}"))).collect();
            let labels: Vec<i64> = (0..keys.len() as i64).map(|i| i % 2).collect();
            let t = table(
                Column::Categorical(CategoricalColumn::from_text(&values)),
                labels,
            );
            let labels = binary_labels(&t, "purchase").unwrap();
            let partition = SegmentPartitioner::new("key").partition(&t, &labels).unwrap();

            let mut seen: Vec<usize> = partition
                .segments
                .iter()
                .flat_map(|s| s.rows.iter().copied())
                .collect();
            let assigned = seen.len();
            seen.sort_unstable();
            seen.dedup();

            prop_assert_eq!(seen.len(), assigned);
            prop_assert_eq!(assigned + partition.unassigned_rows, keys.len());
            for segment in &partition.segments {
                prop_assert_eq!(segment.positives + segment.negatives, segment.len());
                prop_assert!(segment.rows.iter().all(|&r| values[r].as_deref() == Some(segment.value.as_str())));
            }
        }
    }
}
