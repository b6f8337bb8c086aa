//! Fitted feature transform: table rows to a dense matrix

use super::{
    CategoricalEncoder, NumericImputer, OutlierClipper, PipelineConfig, Scaler, SelectKBest,
};
use crate::error::{AutoMLError, Result};
use crate::table::Table;
use crate::training::TaskKind;
use ndarray::{concatenate, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Preprocessing learned on training rows, applicable to any table with the same schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedTransform {
    numeric_columns: Vec<String>,
    categorical_columns: Vec<String>,
    clipper: Option<OutlierClipper>,
    imputer: NumericImputer,
    scaler: Scaler,
    encoders: Vec<CategoricalEncoder>,
    selector: Option<SelectKBest>,
    feature_names: Vec<String>,
}

impl FittedTransform {
    /// Fit on `train_rows` of `table`; `target` is the encoded target of those rows
    pub fn fit(
        config: &PipelineConfig,
        table: &Table,
        train_rows: &[usize],
        target: &Array1<f64>,
        task: TaskKind,
    ) -> Result<Self> {
        if config.n_input_columns() == 0 {
            return Err(AutoMLError::FatalTrainingError(
                "no usable feature columns for the transform".to_string(),
            ));
        }
        if target.len() != train_rows.len() {
            return Err(AutoMLError::ShapeError {
                expected: format!("{} target values", train_rows.len()),
                actual: format!("{} target values", target.len()),
            });
        }
        let rules = &config.rules;

        let mut numeric = numeric_block(table, &config.numeric_columns, train_rows)?;
        let clipper = config
            .outlier_clipping
            .then(|| OutlierClipper::fit(&numeric, rules.clip_iqr_factor));
        if let Some(clipper) = &clipper {
            clipper.transform(&mut numeric);
        }

        let mut imputer =
            NumericImputer::new(config.numeric_imputation).with_neighbors(rules.knn_neighbors);
        imputer.fit(&numeric)?;
        imputer.transform(&mut numeric)?;

        let scaler = Scaler::fit(config.scaling, &numeric);

        let target_values = target.to_vec();
        let encoders = config
            .categorical_columns
            .iter()
            .map(|name| {
                let keys = column_keys(table, name, train_rows)?;
                Ok(CategoricalEncoder::fit(
                    name,
                    config.encoding,
                    &keys,
                    &target_values,
                    rules.target_smoothing,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut fitted = Self {
            numeric_columns: config.numeric_columns.clone(),
            categorical_columns: config.categorical_columns.clone(),
            clipper,
            imputer,
            scaler,
            encoders,
            selector: None,
            feature_names: Vec::new(),
        };

        let encoded_names = fitted.encoded_names();
        let train = fitted.encode(table, train_rows)?;
        if train.ncols() == 0 {
            return Err(AutoMLError::FatalTrainingError(
                "transform produced no feature columns".to_string(),
            ));
        }

        if config.feature_selection {
            let k = config.feature_selection_k.unwrap_or(rules.default_selection_k);
            if k < train.ncols() {
                let selector = SelectKBest::fit(&train, target, task, k);
                fitted.feature_names = selector.select_names(&encoded_names);
                fitted.selector = Some(selector);
            }
        }
        if fitted.selector.is_none() {
            fitted.feature_names = encoded_names;
        }

        debug!(
            rows = train_rows.len(),
            features = fitted.feature_names.len(),
            "Transform fitted"
        );
        Ok(fitted)
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Source columns the transform reads
    pub fn input_columns(&self) -> impl Iterator<Item = &str> {
        self.numeric_columns
            .iter()
            .chain(&self.categorical_columns)
            .map(String::as_str)
    }

    /// Transform every row of `table`
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        let rows: Vec<usize> = (0..table.n_rows()).collect();
        self.transform_rows(table, &rows)
    }

    pub fn transform_rows(&self, table: &Table, rows: &[usize]) -> Result<Array2<f64>> {
        let encoded = self.encode(table, rows)?;
        let out = match &self.selector {
            Some(selector) => selector.transform(&encoded),
            None => encoded,
        };
        if out.iter().any(|v| !v.is_finite()) {
            return Err(AutoMLError::FatalTrainingError(
                "transform produced non-finite values".to_string(),
            ));
        }
        Ok(out)
    }

    fn encoded_names(&self) -> Vec<String> {
        self.numeric_columns
            .iter()
            .cloned()
            .chain(self.encoders.iter().flat_map(CategoricalEncoder::output_names))
            .collect()
    }

    /// Numeric then categorical blocks, before selection
    fn encode(&self, table: &Table, rows: &[usize]) -> Result<Array2<f64>> {
        let mut numeric = numeric_block(table, &self.numeric_columns, rows)?;
        if let Some(clipper) = &self.clipper {
            clipper.transform(&mut numeric);
        }
        self.imputer.transform(&mut numeric)?;
        self.scaler.transform(&mut numeric);

        let mut blocks = vec![numeric];
        for (name, encoder) in self.categorical_columns.iter().zip(&self.encoders) {
            blocks.push(encoder.transform(&column_keys(table, name, rows)?));
        }
        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        Ok(concatenate(Axis(1), &views)?)
    }
}

/// Numeric reading of `columns` at `rows`; unreadable cells become NaN
fn numeric_block(table: &Table, columns: &[String], rows: &[usize]) -> Result<Array2<f64>> {
    let mut out = Array2::<f64>::from_elem((rows.len(), columns.len()), f64::NAN);
    for (j, name) in columns.iter().enumerate() {
        let values = table.require(name)?.values();
        for (i, &row) in rows.iter().enumerate() {
            if let Some(v) = values.get(row).and_then(|v| v.as_f64()) {
                out[[i, j]] = v;
            }
        }
    }
    Ok(out)
}

fn column_keys(table: &Table, name: &str, rows: &[usize]) -> Result<Vec<Option<String>>> {
    let values = table.require(name)?.values();
    Ok(rows
        .iter()
        .map(|&row| values.get(row).and_then(|v| v.key()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intelligence::{ProblemType, RoleAssignment};
    use crate::pipeline::{EncodingMethod, ImputationMethod, PipelineSelector, ScalingMethod};
    use crate::profiling::{profile_dataset, ProfilingThresholds};
    use crate::table::Column;

    fn table() -> Table {
        let n = 40;
        Table::new(vec![
            Column::numeric_opt(
                "age",
                (0..n).map(|i| if i % 7 == 3 { None } else { Some(18.0 + i as f64) }).collect(),
            ),
            Column::text_opt(
                "plan",
                &(0..n)
                    .map(|i| if i % 9 == 4 { None } else { Some(["basic", "pro", "team"][i % 3]) })
                    .collect::<Vec<_>>(),
            ),
            Column::numeric("user_id", (0..n).map(|i| i as f64).collect()),
            Column::numeric_opt("blank", vec![None; n]),
            Column::numeric("label", (0..n).map(|i| (i % 2) as f64).collect()),
        ])
        .unwrap()
    }

    fn config(t: &Table) -> PipelineConfig {
        let profile = profile_dataset(t, &ProfilingThresholds::default());
        let roles = RoleAssignment {
            target: Some("label".into()),
            features: vec!["age".into(), "plan".into()],
            identifiers: vec!["user_id".into()],
            ..Default::default()
        };
        let mut config =
            PipelineSelector::new().select(ProblemType::BinaryClassification, &roles, &profile);
        config.numeric_imputation = ImputationMethod::Median;
        config.scaling = ScalingMethod::Standard;
        config.encoding = EncodingMethod::OneHot;
        config.feature_selection = false;
        config.outlier_clipping = false;
        config
    }

    #[test]
    fn test_same_width_on_train_and_holdout() {
        let t = table();
        let config = config(&t);
        let train: Vec<usize> = (0..30).collect();
        let holdout: Vec<usize> = (30..40).collect();
        let y = Array1::from_iter(train.iter().map(|i| (i % 2) as f64));

        let fitted =
            FittedTransform::fit(&config, &t, &train, &y, TaskKind::Classification).unwrap();
        assert_eq!(fitted.feature_names(), ["age", "plan_pro", "plan_team"]);

        let a = fitted.transform_rows(&t, &train).unwrap();
        let b = fitted.transform_rows(&t, &holdout).unwrap();
        assert_eq!(a.ncols(), 3);
        assert_eq!(b.ncols(), 3);
        assert!(a.iter().chain(b.iter()).all(|v| v.is_finite()));
        // identifiers never reach the matrix
        assert!(fitted.input_columns().all(|c| c != "user_id"));
    }

    #[test]
    fn test_selection_reduces_width() {
        let t = table();
        let mut config = config(&t);
        config.feature_selection = true;
        config.feature_selection_k = Some(2);
        let rows: Vec<usize> = (0..40).collect();
        let y = Array1::from_iter(rows.iter().map(|i| (i % 2) as f64));

        let fitted =
            FittedTransform::fit(&config, &t, &rows, &y, TaskKind::Classification).unwrap();
        assert_eq!(fitted.n_features(), 2);
        assert_eq!(fitted.transform(&t).unwrap().ncols(), 2);
    }

    #[test]
    fn test_no_features_is_fatal() {
        let t = table();
        let mut config = config(&t);
        config.numeric_columns.clear();
        config.categorical_columns.clear();
        let y = Array1::zeros(2);
        let err = FittedTransform::fit(&config, &t, &[0, 1], &y, TaskKind::Classification)
            .unwrap_err();
        assert!(matches!(err, AutoMLError::FatalTrainingError(_)));
    }

    #[test]
    fn test_empty_numeric_column_survives_json() {
        let t = table();
        let mut config = config(&t);
        config.numeric_columns.push("blank".into());
        config.outlier_clipping = true;
        let rows: Vec<usize> = (0..40).collect();
        let y = Array1::from_iter(rows.iter().map(|i| (i % 2) as f64));
        let fitted =
            FittedTransform::fit(&config, &t, &rows, &y, TaskKind::Classification).unwrap();

        let json = serde_json::to_string(&fitted).unwrap();
        let back: FittedTransform = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature_names(), fitted.feature_names());
        assert_eq!(back.transform(&t).unwrap(), fitted.transform(&t).unwrap());
    }

    #[test]
    fn test_missing_column_on_predict_is_rejected() {
        let t = table();
        let config = config(&t);
        let rows: Vec<usize> = (0..40).collect();
        let y = Array1::from_iter(rows.iter().map(|i| (i % 2) as f64));
        let fitted =
            FittedTransform::fit(&config, &t, &rows, &y, TaskKind::Classification).unwrap();

        let other = Table::new(vec![Column::numeric("age", vec![30.0])]).unwrap();
        assert!(fitted.transform(&other).is_err());
    }
}
