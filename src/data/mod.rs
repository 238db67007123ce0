//! Dataset loading, task detection, feature encoding, and partitioning
//!
//! These are the data-side collaborators the pipeline steps call into. The
//! loader reads CSV/TSV files with schema inference; the encoder turns a
//! DataFrame into a numeric matrix (one-hot for categoricals, first level
//! dropped); the partitioner produces a seeded train/validation split,
//! stratified only when every class can appear in the validation set.

pub mod profile;

use std::collections::HashMap;
use std::fs::File;

use ndarray::{Array1, Array2};
use polars::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{CopilotError, Result};
use crate::session::TaskType;

/// Targets with more distinct numeric values than this are regression.
const REGRESSION_CARDINALITY_THRESHOLD: usize = 20;

/// Load a tabular dataset, dispatching on the file extension.
///
/// CSV is the default; `.tsv` switches the separator.
pub fn load_dataset(path: &str) -> Result<DataFrame> {
    let file = File::open(path)
        .map_err(|e| CopilotError::LoadError(format!("cannot open {path}: {e}")))?;

    let separator = if path.to_lowercase().ends_with(".tsv") {
        b'\t'
    } else {
        b','
    };
    let parse_opts = CsvParseOptions::default().with_separator(separator);

    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(100))
        .with_parse_options(parse_opts)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| CopilotError::LoadError(format!("cannot parse {path}: {e}")))
}

/// Fetch a column as a materialized series, mapping absence to a typed error.
pub fn column(df: &DataFrame, name: &str) -> Result<Series> {
    Ok(df
        .column(name)
        .map_err(|_| CopilotError::ColumnNotFound(name.to_string()))?
        .as_materialized_series()
        .clone())
}

pub(crate) fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float64
            | DataType::Float32
            | DataType::Int64
            | DataType::Int32
            | DataType::Int16
            | DataType::Int8
            | DataType::UInt64
            | DataType::UInt32
            | DataType::UInt16
            | DataType::UInt8
    )
}

/// Detect the prediction task from the target column.
///
/// A numeric target with more than 20 distinct values is regression;
/// everything else is classification.
pub fn detect_task_type(df: &DataFrame, target_column: &str) -> Result<TaskType> {
    let series = column(df, target_column)?;
    let n_unique = series.n_unique()?;

    if is_numeric_dtype(series.dtype()) && n_unique > REGRESSION_CARDINALITY_THRESHOLD {
        Ok(TaskType::Regression)
    } else {
        Ok(TaskType::Classification)
    }
}

fn series_to_f64(series: &Series) -> Result<Vec<f64>> {
    let casted = series
        .cast(&DataType::Float64)
        .map_err(|e| CopilotError::LoadError(e.to_string()))?;
    Ok(casted
        .f64()
        .map_err(|e| CopilotError::LoadError(e.to_string()))?
        .into_iter()
        .map(|v| v.unwrap_or(0.0))
        .collect())
}

fn series_to_strings(series: &Series) -> Result<Vec<Option<String>>> {
    let casted = series
        .cast(&DataType::String)
        .map_err(|e| CopilotError::LoadError(e.to_string()))?;
    Ok(casted
        .str()
        .map_err(|e| CopilotError::LoadError(e.to_string()))?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect())
}

/// Numeric design matrix plus the names of its columns
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub x: Array2<f64>,
}

/// Encode all non-target columns into a numeric matrix.
///
/// Numeric columns pass through (nulls become 0.0); categorical columns are
/// one-hot encoded over their sorted distinct values with the first level
/// dropped.
pub fn encode_features(df: &DataFrame, target_column: &str) -> Result<FeatureMatrix> {
    let n_rows = df.height();
    let mut feature_names: Vec<String> = Vec::new();
    let mut columns: Vec<Vec<f64>> = Vec::new();

    for name in df.get_column_names() {
        if name.as_str() == target_column {
            continue;
        }
        let series = column(df, name.as_str())?;

        if is_numeric_dtype(series.dtype()) || series.dtype() == &DataType::Boolean {
            feature_names.push(name.to_string());
            columns.push(series_to_f64(&series)?);
        } else {
            let values = series_to_strings(&series)?;
            let mut levels: Vec<String> = values.iter().flatten().cloned().collect();
            levels.sort();
            levels.dedup();

            // First level is the implicit reference category.
            for level in levels.iter().skip(1) {
                feature_names.push(format!("{name}_{level}"));
                columns.push(
                    values
                        .iter()
                        .map(|v| if v.as_deref() == Some(level) { 1.0 } else { 0.0 })
                        .collect(),
                );
            }
        }
    }

    if feature_names.is_empty() {
        return Err(CopilotError::LoadError(
            "dataset has no usable feature columns".to_string(),
        ));
    }

    let n_cols = columns.len();
    let x = Array2::from_shape_fn((n_rows, n_cols), |(r, c)| columns[c][r]);
    Ok(FeatureMatrix { feature_names, x })
}

/// Encode the target column: label-encoded class indices for classification,
/// raw float values for regression.
pub fn encode_target(df: &DataFrame, target_column: &str, task_type: TaskType) -> Result<Array1<f64>> {
    let series = column(df, target_column)?;

    let values = match task_type {
        TaskType::Regression => series_to_f64(&series)?,
        TaskType::Classification => {
            let labels = series_to_strings(&series)?;
            let mut classes: Vec<String> = labels.iter().flatten().cloned().collect();
            classes.sort();
            classes.dedup();

            let index: HashMap<&str, f64> = classes
                .iter()
                .enumerate()
                .map(|(i, c)| (c.as_str(), i as f64))
                .collect();

            labels
                .iter()
                .map(|v| {
                    v.as_deref()
                        .and_then(|s| index.get(s).copied())
                        .unwrap_or(0.0)
                })
                .collect()
        }
    };

    Ok(Array1::from_vec(values))
}

/// Disjoint train/validation partitions
#[derive(Debug, Clone)]
pub struct TrainValSplit {
    pub x_train: Array2<f64>,
    pub x_val: Array2<f64>,
    pub y_train: Array1<f64>,
    pub y_val: Array1<f64>,
}

/// Split into train/validation partitions with a seeded shuffle.
///
/// For classification the split is stratified per class, but only when the
/// validation partition is large enough to hold at least one example of
/// every class; otherwise it falls back to an unstratified shuffle.
pub fn train_val_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    val_fraction: f64,
    seed: u64,
    task_type: TaskType,
) -> Result<TrainValSplit> {
    let n = x.nrows();
    if n < 2 {
        return Err(CopilotError::TrainingError(format!(
            "need at least 2 rows to split, got {n}"
        )));
    }

    let val_size = ((n as f64) * val_fraction) as usize;
    let val_size = val_size.clamp(1, n - 1);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let (train_indices, val_indices) = if task_type == TaskType::Classification {
        let mut class_indices: Vec<(i64, Vec<usize>)> = Vec::new();
        for (i, &label) in y.iter().enumerate() {
            let key = label.round() as i64;
            match class_indices.iter_mut().find(|(k, _)| *k == key) {
                Some((_, v)) => v.push(i),
                None => class_indices.push((key, vec![i])),
            }
        }
        class_indices.sort_by_key(|(k, _)| *k);

        let n_classes = class_indices.len();
        if n_classes > 1 && val_size >= n_classes {
            stratified_indices(&class_indices, val_fraction, &mut rng)
        } else {
            shuffled_indices(n, val_size, &mut rng)
        }
    } else {
        shuffled_indices(n, val_size, &mut rng)
    };

    if train_indices.is_empty() || val_indices.is_empty() {
        return Err(CopilotError::TrainingError(
            "split produced an empty train or validation partition".to_string(),
        ));
    }

    let n_cols = x.ncols();
    let take = |indices: &[usize]| {
        (
            Array2::from_shape_fn((indices.len(), n_cols), |(i, j)| x[[indices[i], j]]),
            Array1::from_iter(indices.iter().map(|&i| y[i])),
        )
    };
    let (x_train, y_train) = take(&train_indices);
    let (x_val, y_val) = take(&val_indices);

    Ok(TrainValSplit {
        x_train,
        x_val,
        y_train,
        y_val,
    })
}

fn shuffled_indices(n: usize, val_size: usize, rng: &mut ChaCha8Rng) -> (Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(rng);
    let val = indices.split_off(n - val_size);
    (indices, val)
}

fn stratified_indices(
    class_indices: &[(i64, Vec<usize>)],
    val_fraction: f64,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut val = Vec::new();

    for (_, indices) in class_indices {
        let mut shuffled = indices.clone();
        shuffled.shuffle(rng);

        // Single-member classes stay in training.
        if shuffled.len() == 1 {
            train.extend_from_slice(&shuffled);
            continue;
        }

        let class_val = (((shuffled.len() as f64) * val_fraction).round() as usize)
            .clamp(1, shuffled.len() - 1);
        let split = shuffled.len() - class_val;

        train.extend_from_slice(&shuffled[..split]);
        val.extend_from_slice(&shuffled[split..]);
    }

    (train, val)
}
