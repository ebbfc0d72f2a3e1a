//! Running feature table.
//!
//! One row per processed batch: the (possibly normalized) feature values and
//! the row timestamp in milliseconds. Columns are fixed by the first row;
//! label columns can be appended once the run is complete.
use anyhow::{ensure, Result};
use ndarray::{s, Array1, Array2, ArrayView1};

/// Name of the timestamp column in [`FeatureTable::to_array`] /
/// [`FeatureTable::column_names`].
pub const TIME_COLUMN: &str = "time";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Array1<f64>>,
    times: Vec<f64>,
}

impl FeatureTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
            times: Vec::new(),
        }
    }

    pub fn push(&mut self, time_ms: f64, values: Array1<f64>) -> Result<()> {
        ensure!(
            values.len() == self.columns.len(),
            "row has {} values, table has {} columns",
            values.len(),
            self.columns.len()
        );
        self.rows.push(values);
        self.times.push(time_ms);
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature (and label) columns, without the time column.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// All column names in [`to_array`](Self::to_array) order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = self.columns.clone();
        names.push(TIME_COLUMN.to_string());
        names
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn row(&self, i: usize) -> Option<ArrayView1<'_, f64>> {
        self.rows.get(i).map(|r| r.view())
    }

    pub fn column(&self, name: &str) -> Option<Array1<f64>> {
        if name == TIME_COLUMN {
            return Some(Array1::from(self.times.clone()));
        }
        let c = self.columns.iter().position(|n| n == name)?;
        Some(self.rows.iter().map(|r| r[c]).collect())
    }

    /// `[rows, columns + 1]`, time in the last column.
    pub fn to_array(&self) -> Array2<f64> {
        let n_col = self.columns.len();
        let mut out = Array2::zeros((self.rows.len(), n_col + 1));
        for (i, (row, &t)) in self.rows.iter().zip(&self.times).enumerate() {
            out.slice_mut(s![i, ..n_col]).assign(row);
            out[[i, n_col]] = t;
        }
        out
    }

    /// Append a column with one value per row.
    pub fn add_column(&mut self, name: &str, values: ArrayView1<f64>) -> Result<()> {
        ensure!(
            values.len() == self.rows.len(),
            "column '{name}' has {} values, table has {} rows",
            values.len(),
            self.rows.len()
        );
        ensure!(
            name != TIME_COLUMN && !self.columns.iter().any(|c| c == name),
            "column '{name}' already exists"
        );
        self.columns.push(name.to_string());
        for (row, &v) in self.rows.iter_mut().zip(values) {
            let mut grown = Array1::zeros(row.len() + 1);
            grown.slice_mut(s![..row.len()]).assign(row);
            grown[row.len()] = v;
            *row = grown;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn rows_columns_and_array() {
        let mut t = FeatureTable::new(vec!["a".into(), "b".into()]);
        t.push(100.0, arr1(&[1.0, 2.0])).unwrap();
        t.push(200.0, arr1(&[3.0, 4.0])).unwrap();
        assert!(t.push(300.0, arr1(&[1.0])).is_err());
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.column("b"), Some(arr1(&[2.0, 4.0])));
        assert_eq!(t.column("time"), Some(arr1(&[100.0, 200.0])));
        assert_eq!(t.column_names(), vec!["a", "b", "time"]);
        assert_eq!(t.to_array(), ndarray::arr2(&[[1.0, 2.0, 100.0], [3.0, 4.0, 200.0]]));
    }

    #[test]
    fn add_column_checks_length() {
        let mut t = FeatureTable::new(vec!["a".into()]);
        t.push(0.0, arr1(&[1.0])).unwrap();
        assert!(t.add_column("lbl", arr1(&[1.0, 2.0]).view()).is_err());
        t.add_column("lbl", arr1(&[5.0]).view()).unwrap();
        assert_eq!(t.row(0).unwrap(), arr1(&[1.0, 5.0]));
        assert!(t.add_column("lbl", arr1(&[5.0]).view()).is_err());
    }
}
