//! Synthetic tables shared by the integration tests

#![allow(dead_code)]

use automl_engine::table::{Column, Table};

/// `n` rows: a binary `churn` column followed by eight numeric features
pub fn churn_table(n: usize) -> Table {
    let churn: Vec<f64> = (0..n).map(|i| ((i * 7) % 10 < 3) as u8 as f64).collect();
    let mut columns = vec![Column::numeric("churn", churn.clone())];
    for k in 0..8 {
        let values = (0..n)
            .map(|i| {
                let base = ((i * (k + 3) + k * 11) % 83) as f64 * 0.5;
                // the first two features carry signal
                if k < 2 { base + 25.0 * churn[i] } else { base }
            })
            .collect();
        columns.push(Column::numeric(format!("feature_{}", k), values));
    }
    Table::new(columns).unwrap()
}

/// `n` rows with a numeric `target` holding 200 distinct values
pub fn regression_table(n: usize) -> Table {
    let x1: Vec<f64> = (0..n).map(|i| (i % 200) as f64).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * 13) % 31) as f64).collect();
    let target: Vec<f64> = x1.iter().map(|v| 3.0 * v + 7.0).collect();
    Table::new(vec![
        Column::numeric("x1", x1),
        Column::numeric("x2", x2),
        Column::numeric("target", target),
    ])
    .unwrap()
}

/// Mostly small values with a 5% spike; flagged as skewed by the profiler
pub fn skewed(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| if i % 20 == 0 { 500.0 } else { (i % 7) as f64 })
        .collect()
}

/// Mixed-type customer table with missing values, a skewed column and an identifier
pub fn customer_table(n: usize) -> Table {
    let plans = ["basic", "pro", "team", "enterprise"];
    Table::new(vec![
        Column::numeric("customer_id", (0..n).map(|i| 1000.0 + i as f64).collect()),
        Column::numeric_opt(
            "age",
            (0..n)
                .map(|i| if i % 11 == 5 { None } else { Some(18.0 + (i % 50) as f64) })
                .collect(),
        ),
        Column::text_opt(
            "plan",
            &(0..n)
                .map(|i| if i % 13 == 7 { None } else { Some(plans[i % 4]) })
                .collect::<Vec<_>>(),
        ),
        Column::numeric("monthly_spend", (0..n).map(|i| 10.0 + ((i * 17) % 90) as f64).collect()),
        Column::numeric("support_tickets", skewed(n)),
        Column::text(
            "renewal_label",
            &(0..n).map(|i| if i % 4 == 0 || i % 7 == 0 { "lost" } else { "kept" }).collect::<Vec<_>>(),
        ),
    ])
    .unwrap()
}
