//! Aggregate per-gene partitions into a pairwise [SupportMatrix].

use crate::error::{Diagnostic, Error};
use crate::partition::{MissingPolicy, Partition};
use crate::Table;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;


// ----------------------------------------------------------------------------
// Support Matrix
// ----------------------------------------------------------------------------

/// A symmetric matrix of co-membership votes between strains.
///
/// `S[i][j]` is the number of partitions in which strains `i` and `j` share a group label.
/// The diagonal is the number of partitions used, as a strain always shares a group with itself.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SupportMatrix {
    /// Strains, in canonical order.
    strains: Vec<String>,
    /// Row-major values.
    values: Vec<u32>,
    /// Number of partitions that contributed votes.
    partitions: u32,
}

/// The result of [`SupportMatrix::build`].
#[derive(Clone, Debug)]
pub struct Build {
    pub matrix: SupportMatrix,
    /// Partitions that were skipped, and why.
    pub diagnostics: Vec<Diagnostic>,
}

impl SupportMatrix {
    /// Returns a [`SupportMatrix`] of zeros over the strains.
    pub fn zeros(strains: Vec<String>) -> Self {
        let n = strains.len();
        SupportMatrix { strains, values: vec![0; n * n], partitions: 0 }
    }

    /// Build a [`SupportMatrix`] from partitions.
    ///
    /// Partitions that are incompatible with the strain universe under the [`MissingPolicy`]
    /// are skipped, logged, and recorded as diagnostics. Accumulation is a fold over the usable
    /// partitions, so the result does not depend on their order.
    ///
    /// ## Errors
    ///
    /// - [`Error::NoUsablePartitions`] if no partition is usable.
    /// - If the strain universe is empty or has duplicates.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::{MissingPolicy, Partition, SupportMatrix};
    /// let strains = ["A", "B", "C"].map(String::from);
    /// let partitions = [
    ///     Partition::new("gene_1", [("A", 1), ("B", 1), ("C", 2)]),
    ///     Partition::new("gene_2", [("A", 1), ("B", 2), ("C", 2)]),
    /// ];
    /// let build = SupportMatrix::build(&strains, &partitions, MissingPolicy::default())?;
    /// let matrix = build.matrix;
    ///
    /// assert_eq!(matrix.partitions(), 2);
    /// assert_eq!(matrix.get(0, 0), 2);
    /// assert_eq!(matrix.get(0, 1), 1);
    /// assert_eq!(matrix.get(1, 2), 1);
    /// assert_eq!(matrix.get(0, 2), 0);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn build(
        strains: &[String],
        partitions: &[Partition],
        policy: MissingPolicy,
    ) -> Result<Build, Report> {
        if strains.is_empty() {
            return Err(eyre!("The strain universe is empty."));
        }
        if let Some(duplicate) = strains.iter().duplicates().next() {
            return Err(eyre!("Strain {duplicate:?} is duplicated in the strain universe."));
        }

        let mut diagnostics = Vec::new();
        let usable = partitions
            .iter()
            .filter_map(|partition| match partition.resolve(strains, policy) {
                Ok(labels) => Some(labels),
                Err(e) => {
                    warn!("Skipping partition: {e}");
                    diagnostics.push(Diagnostic::new(&partition.name, &e));
                    None
                }
            })
            .collect_vec();

        if usable.is_empty() {
            return Err(Report::new(Error::NoUsablePartitions { skipped: diagnostics.len() })
                .suggestion("Check that the partitions share strain names with the universe.")
                .suggestion("Try a more lenient --missing policy."));
        }

        let zero = SupportMatrix::zeros(strains.to_vec());
        let matrix = usable
            .par_iter()
            .fold(|| zero.clone(), |matrix, labels| matrix.accumulate(labels))
            .reduce(|| zero.clone(), SupportMatrix::merge);

        info!(
            "Built support matrix of {} strains from {} partitions ({} skipped).",
            matrix.len(),
            matrix.partitions,
            diagnostics.len()
        );

        Ok(Build { matrix, diagnostics })
    }

    /// Add the votes of one resolved partition.
    fn accumulate(mut self, labels: &[Option<usize>]) -> Self {
        let n = self.strains.len();
        for i in 0..n {
            self.values[i * n + i] += 1;
            let Some(label) = labels[i] else { continue };
            for j in (i + 1)..n {
                if labels[j] == Some(label) {
                    self.values[i * n + j] += 1;
                    self.values[j * n + i] += 1;
                }
            }
        }
        self.partitions += 1;
        self
    }

    /// Add two matrices over the same strains.
    fn merge(mut self, other: Self) -> Self {
        self.values.iter_mut().zip(other.values).for_each(|(a, b)| *a += b);
        self.partitions += other.partitions;
        self
    }

    /// Number of strains.
    pub fn len(&self) -> usize {
        self.strains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strains.is_empty()
    }

    pub fn strains(&self) -> &[String] {
        &self.strains
    }

    /// Number of partitions that contributed votes.
    pub fn partitions(&self) -> u32 {
        self.partitions
    }

    /// Returns the support between the strains at indices `i` and `j`.
    ///
    /// Panics if either index is out of bounds.
    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.values[i * self.strains.len() + j]
    }

    /// Returns a row of the matrix.
    pub fn row(&self, i: usize) -> &[u32] {
        let n = self.strains.len();
        &self.values[i * n..(i + 1) * n]
    }

    /// Returns the index of a strain.
    pub fn index_of(&self, strain: &str) -> Result<usize, Error> {
        self.strains
            .iter()
            .position(|s| s == strain)
            .ok_or_else(|| Error::UnknownStrain(strain.to_string()))
    }

    /// Returns the support between two named strains.
    pub fn get_by_name(&self, a: &str, b: &str) -> Result<u32, Error> {
        Ok(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    /// Returns the largest value in the matrix.
    pub fn max(&self) -> u32 {
        self.values.iter().max().copied().unwrap_or(0)
    }

    /// Returns true if `S[i][j] == S[j][i]` for all strains.
    pub fn is_symmetric(&self) -> bool {
        let n = self.strains.len();
        (0..n).tuple_combinations().all(|(i, j)| self.get(i, j) == self.get(j, i))
    }

    /// Returns the matrix restricted to a subset of strains, in the subset's order.
    pub fn submatrix(&self, subset: &[String]) -> Result<SupportMatrix, Report> {
        let indices = subset.iter().map(|s| self.index_of(s)).collect::<Result<Vec<_>, _>>()?;
        let values = indices
            .iter()
            .flat_map(|i| indices.iter().map(move |j| (*i, *j)))
            .map(|(i, j)| self.get(i, j))
            .collect();
        Ok(SupportMatrix { strains: subset.to_vec(), values, partitions: self.partitions })
    }

    /// Convert to a labelled square [`Table`], with an empty top-left cell.
    pub fn to_table(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = std::iter::once(String::new()).chain(self.strains.iter().cloned()).collect();
        table.rows = self
            .strains
            .iter()
            .enumerate()
            .map(|(i, strain)| {
                std::iter::once(strain.clone())
                    .chain(self.row(i).iter().map(|v| v.to_string()))
                    .collect()
            })
            .collect();
        table
    }

    /// Write the matrix as a labelled square table.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        self.to_table().write(path, None).wrap_err_with(|| format!("Failed to write support matrix: {path:?}"))
    }

    /// Read a labelled square table into a [`SupportMatrix`].
    ///
    /// Rows may be in any order, and are reordered to match the column order. The matrix must
    /// be symmetric with a constant diagonal, which is taken as the number of partitions.
    pub fn read<P>(path: &P) -> Result<SupportMatrix, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let table = Table::read(path, None)?;
        let strains = table.headers.iter().skip(1).cloned().collect_vec();
        let n = strains.len();
        if n == 0 || table.rows.len() != n {
            return Err(eyre!(
                "Support matrix is not square: {n} columns and {} rows in {path:?}",
                table.rows.len()
            ));
        }

        let column_i: HashMap<&str, usize> =
            strains.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();
        if column_i.len() != n {
            return Err(eyre!("Support matrix has duplicated strain columns: {path:?}"));
        }

        let mut matrix = SupportMatrix::zeros(strains.clone());
        let mut rows_seen = vec![false; n];
        for row in &table.rows {
            let strain = row.first().map(|s| s.as_str()).unwrap_or_default();
            let i = *column_i
                .get(strain)
                .ok_or_else(|| eyre!("Row strain {strain:?} is not a column in {path:?}"))?;
            if rows_seen[i] {
                return Err(eyre!("Row strain {strain:?} is duplicated in {path:?}"));
            }
            rows_seen[i] = true;
            if row.len() != n + 1 {
                return Err(eyre!("Row {strain:?} has {} values, expected {n}.", row.len() - 1));
            }
            for (j, value) in row[1..].iter().enumerate() {
                matrix.values[i * n + j] = value
                    .parse()
                    .wrap_err_with(|| format!("Invalid support {value:?} in row {strain:?}"))?;
            }
        }

        if !matrix.is_symmetric() {
            return Err(eyre!("Support matrix is not symmetric: {path:?}"));
        }
        let diagonal = (0..n).map(|i| matrix.get(i, i)).unique().collect_vec();
        if diagonal.len() != 1 {
            return Err(eyre!("Support matrix diagonal is not constant: {diagonal:?}")
                .suggestion("The diagonal should be the number of partitions used."));
        }
        matrix.partitions = diagonal[0];
        if matrix.max() > matrix.partitions {
            return Err(eyre!("Support matrix has values above its diagonal: {path:?}"));
        }
        debug!("Read support matrix of {n} strains and {} partitions: {path:?}", matrix.partitions);

        Ok(matrix)
    }
}
