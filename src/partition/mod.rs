//! Per-gene [Partition]s of strains into groups, and the [Delimiter]s that produce them.

use crate::error::{Diagnostic, Error};
use crate::{utils, Table};
use clap::ValueEnum;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, warn};
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use strum::{Display, EnumIter};

#[cfg(test)]
mod tests;

// ----------------------------------------------------------------------------
// Missing Policy
// ----------------------------------------------------------------------------

/// How strains that are absent from a partition are treated.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumIter, Eq, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MissingPolicy {
    /// Every missing strain gets its own label, and never shares a group.
    #[default]
    Distinct,
    /// All missing strains of a partition share one label.
    Shared,
    /// A partition missing any strain is rejected.
    Reject,
}

// ----------------------------------------------------------------------------
// Partition
// ----------------------------------------------------------------------------

/// A [`Partition`] assigns strains to group labels, for one gene.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Partition {
    /// Name of the partition (ex. the gene).
    pub name: String,
    /// Strain and group label pairs, in file order.
    pub assignments: Vec<(String, String)>,
}

impl Partition {
    /// Returns a [`Partition`] from strain and label pairs.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::Partition;
    /// let partition = Partition::new("gene_1", [("A", 1), ("B", 1), ("C", 2)]);
    /// assert_eq!(partition.strains().collect::<Vec<_>>(), ["A", "B", "C"]);
    /// ```
    pub fn new<I, S, L>(name: &str, assignments: I) -> Self
    where
        I: IntoIterator<Item = (S, L)>,
        S: ToString,
        L: ToString,
    {
        let assignments =
            assignments.into_iter().map(|(s, l)| (s.to_string(), l.to_string())).collect();
        Partition { name: name.to_string(), assignments }
    }

    /// Returns the strains of the partition, in file order.
    pub fn strains(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|(strain, _)| strain.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Read a partition from a delimited file.
    ///
    /// Two layouts are recognized:
    ///
    /// - An assignment table of `strain` and `group` columns, with an optional header row.
    /// - A square co-membership matrix, with an empty top-left cell, strain names on the first
    ///   row and column, and non-zero values where two strains share a group.
    ///
    /// The partition is named after the file stem.
    pub fn read<P>(path: &P) -> Result<Partition, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let name = path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.as_ref().to_string_lossy().to_string());
        let table = Table::read(path, None)?;

        let is_matrix = table.headers.first().is_some_and(|h| h.is_empty())
            && table.headers.len() == table.rows.len() + 1;

        match is_matrix {
            true => Partition::from_membership_matrix(&name, &table),
            false => Partition::from_assignment_table(&name, &table),
        }
        .wrap_err_with(|| format!("Failed to parse partition: {path:?}"))
    }

    /// Parse a table of strain and group columns.
    ///
    /// Rows with fewer than two cells, or an empty strain, are ignored.
    fn from_assignment_table(name: &str, table: &Table<String>) -> Result<Partition, Report> {
        let has_header = table.headers.first().is_some_and(|h| h.eq_ignore_ascii_case("strain"));
        let rows = match has_header {
            true => table.rows.iter().collect_vec(),
            false => std::iter::once(&table.headers).chain(table.rows.iter()).collect_vec(),
        };

        let assignments = rows
            .into_iter()
            .filter(|row| row.len() >= 2 && !row[0].is_empty())
            .map(|row| (row[0].clone(), row[1].clone()))
            .collect_vec();

        Ok(Partition { name: name.to_string(), assignments })
    }

    /// Parse a square co-membership matrix into group labels.
    ///
    /// Labels are the connected components of the co-membership entries, which must be
    /// symmetric and transitive to be a partition.
    fn from_membership_matrix(name: &str, table: &Table<String>) -> Result<Partition, Report> {
        let strains = &table.headers[1..];
        let n = strains.len();
        let column_i: HashMap<&str, usize> =
            strains.iter().enumerate().map(|(i, s)| (s.as_str(), i)).collect();
        if column_i.len() != n {
            return Err(eyre!("Co-membership matrix has duplicated strain columns."));
        }

        // reorder rows to match the column order
        let mut member = vec![false; n * n];
        let mut rows_seen = vec![false; n];
        for row in &table.rows {
            let strain = row.first().map(|s| s.as_str()).unwrap_or_default();
            let i = *column_i
                .get(strain)
                .ok_or_else(|| eyre!("Row strain {strain:?} is not a matrix column."))?;
            if rows_seen[i] {
                return Err(eyre!("Row strain {strain:?} is duplicated."));
            }
            rows_seen[i] = true;
            if row.len() != n + 1 {
                return Err(eyre!("Row {strain:?} has {} values, expected {n}.", row.len() - 1));
            }
            for (j, value) in row[1..].iter().enumerate() {
                let value: f64 = value
                    .parse()
                    .wrap_err_with(|| format!("Invalid value {value:?} in row {strain:?}."))?;
                member[i * n + j] = value != 0.0;
            }
        }

        let mut union_find: UnionFind<usize> = UnionFind::new(n);
        for (i, j) in (0..n).tuple_combinations() {
            if member[i * n + j] != member[j * n + i] {
                return Err(eyre!("Co-membership of {} and {} is not symmetric.", strains[i], strains[j]));
            }
            if member[i * n + j] {
                union_find.union(i, j);
            }
        }
        // every pair in one component must be marked as co-members
        for (i, j) in (0..n).tuple_combinations() {
            if union_find.equiv(i, j) != member[i * n + j] {
                return Err(eyre!("Co-membership is not transitive, for {} and {}.", strains[i], strains[j])
                    .suggestion("Each gene should contribute exactly one partition of the strains."));
            }
        }

        let labels = union_find.into_labeling();
        let assignments =
            strains.iter().zip(labels).map(|(s, l)| (s.clone(), l.to_string())).collect();

        Ok(Partition { name: name.to_string(), assignments })
    }

    /// Resolve the group labels of the partition against the ordered strain universe.
    ///
    /// Returns one label id per strain of the universe, where [`None`] is a missing strain that
    /// matches no other strain. Strains that are not in the universe are ignored.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::{MissingPolicy, Partition};
    /// let universe = ["A", "B", "C", "D"].map(String::from);
    /// let partition = Partition::new("gene_1", [("A", "x"), ("B", "x"), ("C", "y")]);
    ///
    /// let labels = partition.resolve(&universe, MissingPolicy::Distinct)?;
    /// assert_eq!(labels, [Some(0), Some(0), Some(1), None]);
    ///
    /// let labels = partition.resolve(&universe, MissingPolicy::Shared)?;
    /// assert_eq!(labels, [Some(0), Some(0), Some(1), Some(2)]);
    ///
    /// assert!(partition.resolve(&universe, MissingPolicy::Reject).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn resolve(
        &self,
        strains: &[String],
        policy: MissingPolicy,
    ) -> Result<Vec<Option<usize>>, Error> {
        let incompatible =
            |reason: String| Error::IncompatiblePartition { name: self.name.clone(), reason };

        let mut lookup: HashMap<&str, &str> = HashMap::new();
        for (strain, label) in &self.assignments {
            if lookup.insert(strain.as_str(), label.as_str()).is_some() {
                return Err(incompatible(format!("strain {strain:?} is assigned more than once")));
            }
        }

        let mut label_ids: HashMap<&str, usize> = HashMap::new();
        let mut missing = Vec::new();
        let mut labels = Vec::with_capacity(strains.len());
        for strain in strains {
            match lookup.get(strain.as_str()).copied() {
                Some(label) => {
                    let next = label_ids.len();
                    labels.push(Some(*label_ids.entry(label).or_insert(next)));
                }
                None => {
                    missing.push(strain.as_str());
                    labels.push(None);
                }
            }
        }

        if !strains.is_empty() && missing.len() == strains.len() {
            return Err(incompatible("it shares no strains with the universe".to_string()));
        }

        let universe: HashSet<&str> = strains.iter().map(|s| s.as_str()).collect();
        let extra = lookup.keys().filter(|s| !universe.contains(*s)).count();
        if extra > 0 {
            debug!("Partition {:?}: ignoring {extra} strain(s) outside the universe.", self.name);
        }

        if missing.is_empty() {
            return Ok(labels);
        }

        match policy {
            MissingPolicy::Distinct => Ok(labels),
            MissingPolicy::Shared => {
                let shared = label_ids.len();
                Ok(labels.into_iter().map(|l| l.or(Some(shared))).collect())
            }
            MissingPolicy::Reject => {
                let preview = missing.iter().take(5).join(", ");
                let more = match missing.len() > 5 {
                    true => ", ...",
                    false => "",
                };
                Err(incompatible(format!(
                    "missing {} strain(s): {preview}{more}",
                    missing.len()
                )))
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Strains
// ----------------------------------------------------------------------------

/// Read an ordered, duplicate-free list of strains.
///
/// The file is either one strain per line, or a delimited table whose first column is the
/// strain (with an optional `strain` header).
pub fn read_strains<P>(path: &P) -> Result<Vec<String>, Report>
where
    P: AsRef<Path> + Debug,
{
    let table = Table::read(path, None)?;
    let has_header = table.headers.first().is_some_and(|h| h.eq_ignore_ascii_case("strain"));
    let rows = match has_header {
        true => table.rows.iter().collect_vec(),
        false => std::iter::once(&table.headers).chain(table.rows.iter()).collect_vec(),
    };

    let strains =
        rows.into_iter().filter_map(|row| row.first()).filter(|s| !s.is_empty()).cloned().collect_vec();

    if let Some(duplicate) = strains.iter().duplicates().next() {
        return Err(eyre!("Strain {duplicate:?} is duplicated in: {path:?}"));
    }
    if strains.is_empty() {
        return Err(eyre!("No strains were found in: {path:?}"));
    }

    Ok(strains)
}

// ----------------------------------------------------------------------------
// Delimiter
// ----------------------------------------------------------------------------

/// A source of per-gene partitions, produced by one delimitation method.
///
/// Running external tools, including retries and timeouts, is the responsibility of the
/// implementor. Failures that only affect one gene should be recorded as [`Diagnostic`]s
/// and skipped, rather than returned as errors.
pub trait Delimiter {
    /// Name of the delimitation method (ex. ABGD).
    fn name(&self) -> &str;

    /// Returns the partitions, one per gene.
    fn partitions(&self, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<Partition>, Report>;
}

/// A directory of partition files that were already produced by a delimitation method.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PartitionDir {
    pub name: String,
    pub dir: PathBuf,
}

impl PartitionDir {
    pub fn new<P>(name: &str, dir: &P) -> Self
    where
        P: AsRef<Path>,
    {
        PartitionDir { name: name.to_string(), dir: dir.as_ref().to_path_buf() }
    }

    /// Returns the partition files of the directory, sorted by file name.
    pub fn files(&self) -> Result<Vec<PathBuf>, Report> {
        let entries = std::fs::read_dir(&self.dir)
            .wrap_err_with(|| format!("Failed to read partition directory: {:?}", self.dir))?;
        let files = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .filter(|path| utils::is_delimited(path))
            .sorted()
            .collect_vec();
        Ok(files)
    }
}

impl Delimiter for PartitionDir {
    fn name(&self) -> &str {
        &self.name
    }

    fn partitions(&self, diagnostics: &mut Vec<Diagnostic>) -> Result<Vec<Partition>, Report> {
        let files = self.files()?;
        info!("{}: reading {} partition files from {:?}", self.name, files.len(), self.dir);
        if files.is_empty() {
            warn!("{}: no partition files (.csv, .tsv, .txt) were found in {:?}", self.name, self.dir);
        }

        let style = ProgressStyle::with_template("{msg} [{bar:40}] {pos}/{len}")?;
        let progress = ProgressBar::new(files.len() as u64)
            .with_style(style)
            .with_message(self.name.clone());

        let results = files
            .par_iter()
            .progress_with(progress)
            .map(|path| (path, Partition::read(path)))
            .collect::<Vec<_>>();

        let mut partitions = Vec::with_capacity(results.len());
        for (path, result) in results {
            match result {
                Ok(partition) if partition.is_empty() => {
                    warn!("{}: skipping empty partition {path:?}", self.name);
                    diagnostics.push(Diagnostic::new(path.to_string_lossy(), "partition is empty"));
                }
                Ok(partition) => partitions.push(partition),
                Err(e) => {
                    warn!("{}: skipping {path:?}: {e:#}", self.name);
                    diagnostics.push(Diagnostic::new(path.to_string_lossy(), format!("{e:#}")));
                }
            }
        }

        Ok(partitions)
    }
}
