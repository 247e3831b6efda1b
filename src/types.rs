/**
 * AlsReco
 * Copyright (C) 2018 Sebastian Schelter
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with this program. If not, see <http://www.gnu.org/licenses/>.
 */

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use fnv::FnvHashMap;
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

/// Dense factor matrix, one row per user or item.
pub type Factors = Array2<f32>;

/// Aggregated interaction counts per row, keyed by column index.
pub type SparseCounts = FnvHashMap<u32, i64>;
pub type SparseCountMatrix = Vec<SparseCounts>;

#[cfg(test)]
pub(crate) fn new_sparse_count_matrix(num_rows: usize) -> SparseCountMatrix {
    vec![FnvHashMap::with_capacity_and_hasher(0, Default::default()); num_rows]
}

/// Opaque external identifier of a user or an item. We never assume that identifiers are dense
/// or zero-based, the `Dictionary` is the only place where they are mapped to matrix positions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Identifier {
    Int(i64),
    Str(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Identifier::Int(value) => write!(f, "{}", value),
            Identifier::Str(value) => write!(f, "{}", value),
        }
    }
}

/// Text fields become integer identifiers whenever they parse as one.
impl FromStr for Identifier {
    type Err = Infallible;

    fn from_str(field: &str) -> Result<Self, Self::Err> {
        Ok(match field.parse::<i64>() {
            Ok(value) => Identifier::Int(value),
            Err(_) => Identifier::Str(field.to_string()),
        })
    }
}

impl From<i64> for Identifier {
    fn from(value: i64) -> Self {
        Identifier::Int(value)
    }
}

impl From<i32> for Identifier {
    fn from(value: i32) -> Self {
        Identifier::Int(i64::from(value))
    }
}

impl From<u32> for Identifier {
    fn from(value: u32) -> Self {
        Identifier::Int(i64::from(value))
    }
}

impl<'a> From<&'a str> for Identifier {
    fn from(value: &'a str) -> Self {
        Identifier::Str(value.to_string())
    }
}

impl From<String> for Identifier {
    fn from(value: String) -> Self {
        Identifier::Str(value)
    }
}

/// A single observed (user, item, quantity) record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub user: Identifier,
    pub item: Identifier,
    pub quantity: i64,
}

impl Interaction {
    pub fn new<U, I>(user: U, item: I, quantity: i64) -> Self
        where U: Into<Identifier>, I: Into<Identifier> {
        Interaction { user: user.into(), item: item.into(), quantity }
    }
}

/// Sparse confidence matrix in compressed sparse row layout. Only observed pairs are stored,
/// unobserved pairs carry the implicit confidence of 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceMatrix {
    num_rows: usize,
    num_cols: usize,
    indptr: Vec<usize>,
    indices: Vec<u32>,
    data: Vec<f32>,
}

impl ConfidenceMatrix {

    /// Compresses per-row counts, applying `1 + alpha * count` to every non-zero count. Column
    /// indices end up sorted inside each row.
    pub fn from_counts(counts: &SparseCountMatrix, num_cols: usize, alpha: f64) -> Self {

        let num_rows = counts.len();
        let nnz = counts.iter()
            .map(|row| row.values().filter(|count| **count > 0).count())
            .sum();

        let mut indptr = Vec::with_capacity(num_rows + 1);
        let mut indices = Vec::with_capacity(nnz);
        let mut data = Vec::with_capacity(nnz);

        indptr.push(0);

        for row in counts.iter() {
            let mut entries: Vec<(u32, i64)> = row.iter()
                .filter(|(_, count)| **count > 0)
                .map(|(column, count)| (*column, *count))
                .collect();

            entries.sort_unstable_by_key(|(column, _)| *column);

            for (column, count) in entries {
                indices.push(column);
                data.push((1.0 + alpha * count as f64) as f32);
            }

            indptr.push(indices.len());
        }

        ConfidenceMatrix { num_rows, num_cols, indptr, indices, data }
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_cols(&self) -> usize {
        self.num_cols
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Column indices and confidences of the observed entries of a row.
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let start = self.indptr[row];
        let end = self.indptr[row + 1];
        (&self.indices[start..end], &self.data[start..end])
    }

    /// Stored confidence, or `None` for an unobserved pair.
    pub fn get(&self, row: usize, column: usize) -> Option<f32> {
        if row >= self.num_rows {
            return None;
        }
        let (columns, confidences) = self.row(row);
        columns.binary_search(&(column as u32))
            .ok()
            .map(|position| confidences[position])
    }

    /// Same entries with rows and columns swapped, rows of the result sorted by column again.
    pub fn transpose(&self) -> Self {

        let nnz = self.nnz();

        let mut column_counts = vec![0_usize; self.num_cols];
        for column in self.indices.iter() {
            column_counts[*column as usize] += 1;
        }

        let mut indptr = vec![0_usize; self.num_cols + 1];
        for column in 0..self.num_cols {
            indptr[column + 1] = indptr[column] + column_counts[column];
        }

        let mut indices = vec![0_u32; nnz];
        let mut data = vec![0.0_f32; nnz];
        let mut next_position = indptr[..self.num_cols].to_vec();

        for row in 0..self.num_rows {
            let (columns, confidences) = self.row(row);
            for (column, confidence) in columns.iter().zip(confidences.iter()) {
                let position = next_position[*column as usize];
                indices[position] = row as u32;
                data[position] = *confidence;
                next_position[*column as usize] += 1;
            }
        }

        ConfidenceMatrix {
            num_rows: self.num_cols,
            num_cols: self.num_rows,
            indptr,
            indices,
            data,
        }
    }
}


#[cfg(test)]
mod tests {

    use super::*;

    fn small_matrix() -> ConfidenceMatrix {
        let mut counts = new_sparse_count_matrix(2);
        counts[0].insert(2, 1);
        counts[0].insert(0, 3);
        counts[1].insert(1, 0);
        counts[1].insert(0, 5);

        ConfidenceMatrix::from_counts(&counts, 3, 0.5)
    }

    #[test]
    fn compresses_rows_with_sorted_columns() {
        let matrix = small_matrix();

        assert_eq!(matrix.num_rows(), 2);
        assert_eq!(matrix.num_cols(), 3);
        assert_eq!(matrix.nnz(), 3);

        let (columns, confidences) = matrix.row(0);
        assert_eq!(columns, &[0, 2]);
        assert_eq!(confidences, &[2.5, 1.5]);

        // zero counts are implicit
        let (columns, _) = matrix.row(1);
        assert_eq!(columns, &[0]);
        assert_eq!(matrix.get(1, 1), None);
        assert_eq!(matrix.get(1, 0), Some(3.5));
        assert_eq!(matrix.get(7, 0), None);
    }

    #[test]
    fn transpose_swaps_rows_and_columns() {
        let matrix = small_matrix();
        let transposed = matrix.transpose();

        assert_eq!(transposed.num_rows(), 3);
        assert_eq!(transposed.num_cols(), 2);
        assert_eq!(transposed.nnz(), matrix.nnz());

        let (rows, confidences) = transposed.row(0);
        assert_eq!(rows, &[0, 1]);
        assert_eq!(confidences, &[2.5, 3.5]);

        assert_eq!(transposed.row(1).0.len(), 0);
        assert_eq!(transposed.get(2, 0), Some(1.5));

        assert_eq!(transposed.transpose(), matrix);
    }

    #[test]
    fn identifiers_parse_integers_first() {
        assert_eq!("17".parse::<Identifier>().unwrap(), Identifier::Int(17));
        assert_eq!("-3".parse::<Identifier>().unwrap(), Identifier::Int(-3));
        assert_eq!("85123A".parse::<Identifier>().unwrap(), Identifier::from("85123A"));
        assert_eq!(Identifier::from(12_i64).to_string(), "12");
    }

    #[test]
    fn identifiers_serialize_untagged() {
        assert_eq!(serde_json::to_string(&Identifier::Int(5)).unwrap(), "5");
        assert_eq!(serde_json::to_string(&Identifier::from("a")).unwrap(), "\"a\"");
    }
}
