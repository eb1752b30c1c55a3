//! Aggregation primitives
//!
//! filter → group → aggregate → rank building blocks shared by every analytics
//! query. All functions are pure: they read a table and return a new value.
use std::collections::HashMap;

use crate::error::{AppError, Result};
use crate::models::{Row, Scalar, Table};

/// One test on a named column
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Scalar),
    Ne(String, Scalar),
    In(String, Vec<Scalar>),
}

impl Condition {
    fn column(&self) -> &str {
        match self {
            Condition::Eq(col, _) | Condition::Ne(col, _) | Condition::In(col, _) => col,
        }
    }

    fn test(&self, value: &Scalar) -> bool {
        match self {
            Condition::Eq(_, expected) => value.matches(expected),
            // Nulls differ from everything, so they survive `ne`
            Condition::Ne(_, expected) => !value.matches(expected),
            Condition::In(_, set) => set.iter().any(|candidate| value.matches(candidate)),
        }
    }
}

/// Conjunction of column tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, column: &str, value: impl Into<Scalar>) -> Self {
        self.conditions
            .push(Condition::Eq(column.to_string(), value.into()));
        self
    }

    pub fn not_equals(mut self, column: &str, value: impl Into<Scalar>) -> Self {
        self.conditions
            .push(Condition::Ne(column.to_string(), value.into()));
        self
    }

    pub fn one_of<V: Into<Scalar>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.conditions.push(Condition::In(
            column.to_string(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

/// Rows satisfying every condition, in their original order.
pub fn filter(table: &Table, predicate: &Predicate) -> Result<Table> {
    let bound: Vec<(usize, &Condition)> = predicate
        .conditions
        .iter()
        .map(|c| table.column_index(c.column()).map(|idx| (idx, c)))
        .collect::<Result<_>>()?;

    let rows = table
        .raw_rows()
        .iter()
        .filter(|row| bound.iter().all(|(idx, cond)| cond.test(&row[*idx])))
        .cloned()
        .collect();

    Table::with_schema(table.schema(), rows)
}

/// Replace a numeric column with `f(value)`; nulls stay null.
pub fn map_numeric(table: &Table, column: &str, f: impl Fn(f64) -> f64) -> Result<Table> {
    let idx = table.column_index(column)?;
    let mut rows = Vec::with_capacity(table.len());
    for row in table.raw_rows() {
        let mut row = row.clone();
        row[idx] = match &row[idx] {
            Scalar::Null => Scalar::Null,
            value => {
                let x = numeric(value, column)?;
                Scalar::Float(f(x))
            }
        };
        rows.push(row);
    }
    Table::with_schema(table.schema(), rows)
}

fn numeric(value: &Scalar, column: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        AppError::SchemaMismatch(format!(
            "column '{}' holds non-numeric value {:?}",
            column, value
        ))
    })
}

/// Hashable identity of a group key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Bool(bool),
    Int(i64),
    Float(u64),
    Str(String),
}

impl GroupKey {
    fn of(value: &Scalar) -> Option<Self> {
        match value.normalized() {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(GroupKey::Bool(b)),
            Scalar::Int(i) => Some(GroupKey::Int(i)),
            Scalar::Float(f) if f.is_nan() => None,
            Scalar::Float(f) => Some(GroupKey::Float(f.to_bits())),
            Scalar::Str(s) => Some(GroupKey::Str(s)),
        }
    }
}

/// Per-group totals in the order groups were first seen
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupedSums {
    entries: Vec<(Scalar, f64)>,
}

impl GroupedSums {
    pub fn entries(&self) -> &[(Scalar, f64)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<(Scalar, f64)> {
        self.entries
    }
}

/// Sum `value_col` per distinct `group_col`. Booleans count as 1/0; null
/// keys and null values are skipped.
pub fn group_sum(table: &Table, group_col: &str, value_col: &str) -> Result<GroupedSums> {
    let key_idx = table.column_index(group_col)?;
    let value_idx = table.column_index(value_col)?;

    let mut positions: HashMap<GroupKey, usize> = HashMap::new();
    let mut entries: Vec<(Scalar, f64)> = Vec::new();

    for row in table.raw_rows() {
        let Some(key) = GroupKey::of(&row[key_idx]) else {
            continue;
        };
        let pos = *positions.entry(key).or_insert_with(|| {
            entries.push((row[key_idx].normalized(), 0.0));
            entries.len() - 1
        });

        let value = &row[value_idx];
        if value.is_null() {
            continue;
        }
        let x = numeric(value, value_col)?;
        if !x.is_nan() {
            entries[pos].1 += x;
        }
    }

    Ok(GroupedSums { entries })
}

/// Row count per distinct value of `column`, in first-seen order
pub fn value_counts(table: &Table, column: &str) -> Result<Vec<(Scalar, usize)>> {
    let idx = table.column_index(column)?;
    let mut positions: HashMap<GroupKey, usize> = HashMap::new();
    let mut counts: Vec<(Scalar, usize)> = Vec::new();

    for row in table.raw_rows() {
        let Some(key) = GroupKey::of(&row[idx]) else {
            continue;
        };
        let pos = *positions.entry(key).or_insert_with(|| {
            counts.push((row[idx].normalized(), 0));
            counts.len() - 1
        });
        counts[pos].1 += 1;
    }

    Ok(counts)
}

/// First row holding the maximum of `value_col`.
pub fn argmax<'a>(table: &'a Table, value_col: &str) -> Result<Row<'a>> {
    let idx = table.column_index(value_col)?;
    let mut best: Option<(usize, f64)> = None;

    for (pos, row) in table.raw_rows().iter().enumerate() {
        let value = &row[idx];
        if value.is_null() {
            continue;
        }
        let x = numeric(value, value_col)?;
        if x.is_nan() {
            continue;
        }
        // Strict comparison keeps the earliest row on ties
        if best.map_or(true, |(_, max)| x > max) {
            best = Some((pos, x));
        }
    }

    best.and_then(|(pos, _)| table.row(pos)).ok_or_else(|| {
        AppError::EmptyInput(format!("no values in column '{}' to rank", value_col))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    /// Largest first
    Max,
    /// Smallest first
    Min,
}

/// Up to `k` groups ranked by total. Equal totals keep grouping order.
pub fn top_k(groups: &GroupedSums, k: usize, order: Order) -> Vec<(Scalar, f64)> {
    let mut ranked = groups.entries.clone();
    // stable sort: ties keep insertion order
    ranked.sort_by(|a, b| match order {
        Order::Max => b.1.total_cmp(&a.1),
        Order::Min => a.1.total_cmp(&b.1),
    });
    ranked.truncate(k);
    ranked
}

/// Minutes → hours, rounded to two decimals
pub fn minutes_to_hours(minutes: f64) -> f64 {
    (minutes / 60.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reviews() -> Table {
        Table::new(
            vec!["title".into(), "year".into(), "recommend".into(), "hours".into()],
            vec![
                vec!["Portal".into(), Scalar::Int(2011), Scalar::Bool(true), Scalar::Float(3.0)],
                vec!["Dota".into(), Scalar::Int(2011), Scalar::Bool(true), Scalar::Float(9.0)],
                vec!["Portal".into(), Scalar::Int(2012), Scalar::Bool(false), Scalar::Float(9.0)],
                vec!["Quake".into(), Scalar::Float(2011.0), Scalar::Bool(true), Scalar::Null],
                vec![Scalar::Null, Scalar::Int(2011), Scalar::Bool(true), Scalar::Float(1.0)],
            ],
        )
        .unwrap()
    }

    fn titles(table: &Table) -> Vec<Scalar> {
        table.column_values("title").unwrap().cloned().collect()
    }

    #[test]
    fn test_filter_preserves_order() {
        let table = reviews();
        let filtered = filter(&table, &Predicate::new().equals("year", 2011i64)).unwrap();
        assert_eq!(
            titles(&filtered),
            vec!["Portal".into(), "Dota".into(), "Quake".into(), Scalar::Null]
        );
    }

    #[test]
    fn test_filter_conjunction_and_membership() {
        let table = reviews();
        let predicate = Predicate::new()
            .one_of("year", [2011i64, 2012])
            .equals("recommend", true)
            .not_equals("title", "Dota");
        let filtered = filter(&table, &predicate).unwrap();
        // null title survives not_equals
        assert_eq!(
            titles(&filtered),
            vec!["Portal".into(), "Quake".into(), Scalar::Null]
        );
    }

    #[test]
    fn test_filter_can_be_empty() {
        let table = reviews();
        let filtered = filter(&table, &Predicate::new().equals("year", 1999i64)).unwrap();
        assert!(filtered.is_empty());
        assert_eq!(filtered.columns(), table.columns());
    }

    #[test]
    fn test_filter_unknown_column() {
        let table = reviews();
        let err = filter(&table, &Predicate::new().equals("genre", "RPG")).unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(_)));
    }

    #[test]
    fn test_group_sum_booleans_and_insertion_order() {
        let table = reviews();
        let sums = group_sum(&table, "title", "recommend").unwrap();
        assert_eq!(
            sums.entries(),
            &[
                (Scalar::from("Portal"), 1.0),
                (Scalar::from("Dota"), 1.0),
                (Scalar::from("Quake"), 1.0),
            ]
        );
    }

    #[test]
    fn test_group_sum_merges_whole_float_keys() {
        let table = reviews();
        let sums = group_sum(&table, "year", "hours").unwrap();
        assert_eq!(
            sums.entries(),
            &[(Scalar::Int(2011), 13.0), (Scalar::Int(2012), 9.0)]
        );
    }

    #[test]
    fn test_group_sum_rejects_text_values() {
        let table = reviews();
        let err = group_sum(&table, "year", "title").unwrap_err();
        assert!(matches!(err, AppError::SchemaMismatch(_)));
    }

    #[test]
    fn test_argmax_first_of_ties() {
        let table = reviews();
        let row = argmax(&table, "hours").unwrap();
        assert_eq!(row.get("title"), Some(&"Dota".into()));
    }

    #[test]
    fn test_argmax_empty_input() {
        let table = reviews().empty_like();
        let err = argmax(&table, "hours").unwrap_err();
        assert!(matches!(err, AppError::EmptyInput(_)));
    }

    #[test]
    fn test_top_k_orders_and_ties() {
        let groups = GroupedSums {
            entries: vec![
                (Scalar::from("a"), 2.0),
                (Scalar::from("b"), 5.0),
                (Scalar::from("c"), 2.0),
                (Scalar::from("d"), 1.0),
            ],
        };
        let max = top_k(&groups, 3, Order::Max);
        assert_eq!(
            max,
            vec![(Scalar::from("b"), 5.0), (Scalar::from("a"), 2.0), (Scalar::from("c"), 2.0)]
        );
        let min = top_k(&groups, 3, Order::Min);
        assert_eq!(
            min,
            vec![(Scalar::from("d"), 1.0), (Scalar::from("a"), 2.0), (Scalar::from("c"), 2.0)]
        );
    }

    #[test]
    fn test_top_k_short_result() {
        let groups = GroupedSums {
            entries: vec![(Scalar::from("a"), 1.0)],
        };
        assert_eq!(top_k(&groups, 3, Order::Max).len(), 1);
    }

    #[test]
    fn test_value_counts() {
        let table = reviews();
        let counts = value_counts(&table, "title").unwrap();
        assert_eq!(
            counts,
            vec![(Scalar::from("Portal"), 2), (Scalar::from("Dota"), 1), (Scalar::from("Quake"), 1)]
        );
    }

    #[test]
    fn test_map_numeric_and_hours() {
        let table = reviews();
        let doubled = map_numeric(&table, "hours", |h| h * 2.0).unwrap();
        let hours: Vec<Scalar> = doubled.column_values("hours").unwrap().cloned().collect();
        assert_eq!(hours[0], Scalar::Float(6.0));
        assert_eq!(hours[3], Scalar::Null);

        assert_eq!(minutes_to_hours(90.0), 1.5);
        assert_eq!(minutes_to_hours(100.0), 1.67);
        assert_eq!(minutes_to_hours(0.0), 0.0);
    }
}
