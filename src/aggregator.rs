use std::cmp::Ordering;

use itertools::Itertools;
use log::debug;
use polars::prelude::*;

use crate::{
    error::{ExperimentError, Result},
    tabular::{Record, Table, Value},
};


const PARTITION: &str = "__partition";
const LOWER_BOUND: &str = "__lower_bound";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Divide by the partition maximum, unless that maximum is 0.
    PartitionMax,
    Mean,
}

/// The rows of one graph (or one group, for global tables).
#[derive(Debug, Clone)]
pub struct Partition {
    pub name: String,
    pub table: Table,
    pub lower_bound: f64,
}

impl Partition {
    pub fn new(name: impl Into<String>, table: Table) -> Self {
        Self {
            name: name.into(),
            table,
            lower_bound: 0.0,
        }
    }

    pub fn with_lower_bound(mut self, lower_bound: f64) -> Self {
        self.lower_bound = lower_bound;
        self
    }
}

/// How records are grouped and which numbers are averaged.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub keys: Vec<String>,
    pub metrics: Vec<String>,
    pub normalization: Normalization,
    /// Rows where this column is 0 are dropped before anything else.
    pub skip_zero: Option<String>,
    /// Metric the partition lower bound is subtracted from.
    pub subtract_lower_bound: Option<String>,
    /// Name of the column counting contributing partitions.
    pub hits: Option<String>,
}

impl Aggregation {
    pub fn new<K: Into<String>, M: Into<String>>(
        keys: impl IntoIterator<Item = K>,
        metrics: impl IntoIterator<Item = M>,
        normalization: Normalization,
    ) -> Self {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
            metrics: metrics.into_iter().map(Into::into).collect(),
            normalization,
            skip_zero: None,
            subtract_lower_bound: None,
            hits: None,
        }
    }

    pub fn skip_zero(mut self, column: impl Into<String>) -> Self {
        self.skip_zero = Some(column.into());
        self
    }

    pub fn subtract_lower_bound(mut self, metric: impl Into<String>) -> Self {
        self.subtract_lower_bound = Some(metric.into());
        self
    }

    pub fn with_hits(mut self, column: impl Into<String>) -> Self {
        self.hits = Some(column.into());
        self
    }

    fn header(&self) -> Vec<String> {
        self.keys
            .iter()
            .chain(&self.metrics)
            .chain(&self.hits)
            .cloned()
            .collect()
    }

    /// Every column a partition table must carry.
    fn required_columns(&self) -> impl Iterator<Item = &str> {
        self.keys
            .iter()
            .chain(&self.metrics)
            .chain(&self.skip_zero)
            .chain(&self.subtract_lower_bound)
            .map(String::as_str)
            .unique()
    }

    fn numeric_columns(&self) -> Vec<&str> {
        self.metrics
            .iter()
            .chain(&self.skip_zero)
            .map(String::as_str)
            .unique()
            .collect()
    }
}

fn number(record: &Record, column: &str, line: usize) -> Result<Option<f64>> {
    match record.get(column) {
        None => Ok(None),
        Some(value) if value.is_empty() => Ok(None),
        Some(value) => value.as_f64().map(Some).ok_or_else(|| {
            ExperimentError::parse(line, format!("{column} is not numeric: {value:?}"))
        }),
    }
}

/// Partitions sharing a schema is a precondition, a missing column fails instead of averaging
/// over fewer graphs.
fn check_schema(partition: &Partition, spec: &Aggregation) -> Result<()> {
    let header = partition.table.header();
    match spec
        .required_columns()
        .find(|column| !header.iter().any(|name| name == column))
    {
        Some(column) => Err(ExperimentError::parse(
            1,
            format!("{}: table has no column {column:?}", partition.name),
        )),
        None => Ok(()),
    }
}

fn to_frame(partitions: &[Partition], spec: &Aggregation) -> Result<DataFrame> {
    for partition in partitions {
        check_schema(partition, spec)?;
    }
    let numeric = spec.numeric_columns();
    let mut names = Vec::new();
    let mut bounds = Vec::new();
    let mut keys = vec![Vec::new(); spec.keys.len()];
    let mut values = vec![Vec::new(); numeric.len()];
    for partition in partitions {
        for (idx, record) in partition.table.records().iter().enumerate() {
            names.push(partition.name.clone());
            bounds.push(partition.lower_bound);
            for (column, key) in keys.iter_mut().zip(&spec.keys) {
                column.push(record.get(key).map(Value::to_string).unwrap_or_default());
            }
            for (column, metric) in values.iter_mut().zip(&numeric) {
                column.push(number(record, metric, idx + 2)?);
            }
        }
    }

    let mut series = vec![
        Series::new(PARTITION, names),
        Series::new(LOWER_BOUND, bounds),
    ];
    series.extend(
        spec.keys
            .iter()
            .zip(keys)
            .map(|(name, column)| Series::new(name, column)),
    );
    series.extend(
        numeric
            .iter()
            .zip(values)
            .map(|(name, column)| Series::new(name, column)),
    );
    Ok(DataFrame::new(series)?)
}

/// Groups the rows of all partitions by the key columns, in order of first appearance.
pub fn aggregate(partitions: &[Partition], spec: &Aggregation) -> Result<Table> {
    let mut frame = to_frame(partitions, spec)?.lazy();
    if let Some(column) = &spec.skip_zero {
        frame = frame.filter(col(column).neq(lit(0.0)));
    }
    if let Some(metric) = &spec.subtract_lower_bound {
        frame = frame.with_column((col(metric) - col(LOWER_BOUND)).alias(metric));
    }
    if spec.normalization == Normalization::PartitionMax {
        frame = frame.with_columns(
            spec.metrics
                .iter()
                .map(|metric| {
                    let max = col(metric).max().over(vec![col(PARTITION)]);
                    when(max.clone().eq(lit(0.0)))
                        .then(col(metric))
                        .otherwise(col(metric) / max)
                        .alias(metric)
                })
                .collect_vec(),
        );
    }
    let mut aggs = spec
        .metrics
        .iter()
        .map(|metric| col(metric).mean().alias(metric))
        .collect_vec();
    if let Some(hits) = &spec.hits {
        aggs.push(
            col(PARTITION)
                .n_unique()
                .cast(DataType::Float64)
                .alias(hits),
        );
    }
    let grouped = frame
        .groupby_stable(spec.keys.iter().map(|key| col(key)).collect_vec())
        .agg(aggs)
        .collect()?;
    debug!(
        "aggregated {} partitions into {} rows",
        partitions.len(),
        grouped.height()
    );

    let mut table = Table::new(spec.header());
    let mut columns: Vec<Vec<Value>> = Vec::new();
    for key in &spec.keys {
        columns.push(
            grouped
                .column(key)?
                .utf8()?
                .into_iter()
                .map(|v| Value::from(v.unwrap_or_default()))
                .collect(),
        );
    }
    for metric in spec.metrics.iter().chain(&spec.hits) {
        columns.push(
            grouped
                .column(metric)?
                .f64()?
                .into_iter()
                .map(|v| v.map(Value::from).unwrap_or_else(|| Value::from("")))
                .collect(),
        );
    }
    for row in 0..grouped.height() {
        table.push_row(columns.iter().map(|column| column[row].clone()))?;
    }
    Ok(table)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Eq(String, String),
    Ne(String, String),
}

impl Filter {
    /// Parses `column=value`.
    pub fn parse(expr: &str, keep: bool) -> Option<Filter> {
        let (column, value) = expr.split_once('=')?;
        let (column, value) = (column.trim().to_string(), value.trim().to_string());
        Some(if keep {
            Filter::Eq(column, value)
        } else {
            Filter::Ne(column, value)
        })
    }

    fn matches(&self, record: &Record) -> bool {
        let equal = |column: &str, value: &str| {
            let Some(actual) = record.get(column) else {
                return false;
            };
            match (actual.as_f64(), value.parse::<f64>()) {
                (Some(a), Ok(b)) => a == b,
                _ => actual.to_string() == value,
            }
        };
        match self {
            Filter::Eq(column, value) => equal(column, value),
            Filter::Ne(column, value) => !equal(column, value),
        }
    }
}

/// Which rows of a partition count as its best configurations.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub key: String,
    pub filters: Vec<Filter>,
    pub sort_by: Vec<String>,
    pub top: usize,
}

fn compare(a: &Record, b: &Record, columns: &[String]) -> Ordering {
    columns
        .iter()
        .map(|column| {
            let value = |r: &Record| r.get_f64(column).unwrap_or(f64::INFINITY);
            value(a).total_cmp(&value(b))
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Counts in how many partitions each key value is among the `top` rows, ordered by key.
pub fn rank_top(partitions: &[Partition], ranking: &Ranking) -> Result<Table> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for partition in partitions {
        let best = partition
            .table
            .records()
            .iter()
            .filter(|record| ranking.filters.iter().all(|f| f.matches(record)))
            .sorted_by(|a, b| compare(a, b, &ranking.sort_by))
            .take(ranking.top)
            .filter_map(|record| record.get(&ranking.key).map(Value::to_string))
            .unique()
            .collect_vec();
        for value in best {
            match counts.iter_mut().find(|(v, _)| *v == value) {
                Some((_, count)) => *count += 1,
                None => counts.push((value, 1)),
            }
        }
    }

    let mut table = Table::new([ranking.key.as_str(), "count"]);
    for (value, count) in counts
        .into_iter()
        .sorted_by(|(a, _), (b, _)| match (a.parse::<f64>(), b.parse::<f64>()) {
            (Ok(a), Ok(b)) => a.total_cmp(&b),
            _ => a.cmp(b),
        })
    {
        table.push_row([Value::from(value), Value::from(count as f64)])?;
    }
    Ok(table)
}
