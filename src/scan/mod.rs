//! Scan thresholds of a [SupportMatrix] into a group-count [Curve], and export [Grouping]s.

use crate::error::Error;
use crate::{SupportMatrix, Table};
use cgcd_graph::ThresholdGraph;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};


/// Default lower bound of the scan, as a fraction of the largest support.
pub const DEFAULT_MIN_FRACTION: f64 = 0.5;

const CURVE_HEADERS: [&str; 3] = ["threshold", "restricted_groups", "total_groups"];

// ----------------------------------------------------------------------------
// Threshold Range
// ----------------------------------------------------------------------------

/// An inclusive range of integer thresholds, where `1 <= min <= max`.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct ThresholdRange {
    pub min: u32,
    pub max: u32,
}

impl ThresholdRange {
    /// Returns a [`ThresholdRange`], or an error if it is empty or starts below 1.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::scan::ThresholdRange;
    /// let range = ThresholdRange::new(3, 5)?;
    /// assert_eq!(range.len(), 3);
    /// assert!(ThresholdRange::new(0, 5).is_err());
    /// assert!(ThresholdRange::new(6, 5).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new(min: u32, max: u32) -> Result<Self, Report> {
        if min < 1 {
            return Err(Report::new(Error::InvalidThreshold(min)));
        }
        if min > max {
            return Err(Report::new(Error::DegenerateRange { min, max })
                .suggestion("Lower the minimum threshold, or widen the scan range."));
        }
        Ok(ThresholdRange { min, max })
    }

    /// Returns the [`ThresholdRange`] for a matrix, where the maximum is the largest support.
    ///
    /// ## Arguments
    ///
    /// - `matrix` - Support matrix.
    /// - `min` - Minimum threshold. If [`None`], the largest support times `min_fraction`
    ///   rounded down, and at least 1.
    /// - `min_fraction` - Fraction of the largest support to use when `min` is [`None`].
    pub fn from_matrix(
        matrix: &SupportMatrix,
        min: Option<u32>,
        min_fraction: f64,
    ) -> Result<Self, Report> {
        let max = matrix.max();
        let min = match min {
            Some(min) => min,
            None => {
                if !(0.0..=1.0).contains(&min_fraction) {
                    return Err(eyre!("Minimum fraction {min_fraction} must be between 0 and 1."));
                }
                ((max as f64 * min_fraction).floor() as u32).max(1)
            }
        };
        ThresholdRange::new(min, max)
    }

    /// Number of thresholds in the range.
    pub fn len(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    /// Always false, a [`ThresholdRange`] contains at least one threshold.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, threshold: u32) -> bool {
        (self.min..=self.max).contains(&threshold)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> {
        self.min..=self.max
    }
}

// ----------------------------------------------------------------------------
// Curve
// ----------------------------------------------------------------------------

/// Group counts at one threshold.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct CurvePoint {
    pub threshold: u32,
    /// Number of groups containing at least one strain of interest.
    pub restricted_groups: usize,
    /// Number of groups over all strains.
    pub total_groups: usize,
}

/// A group-count curve, strictly ordered by increasing threshold.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Curve {
    points: Vec<CurvePoint>,
}

impl Curve {
    /// Returns a [`Curve`], or an error if the thresholds are not strictly increasing.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::scan::Curve;
    /// let curve = Curve::from_counts([(1, 5, 5), (2, 5, 6), (3, 3, 6)])?;
    /// assert_eq!(curve.len(), 3);
    /// assert_eq!(curve.get(2).map(|p| p.total_groups), Some(6));
    /// assert!(Curve::from_counts([(2, 1, 1), (1, 1, 1)]).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new(points: Vec<CurvePoint>) -> Result<Self, Report> {
        if let Some((a, b)) = points.iter().tuple_windows().find(|(a, b)| a.threshold >= b.threshold) {
            return Err(eyre!(
                "Curve thresholds must be strictly increasing, found {} before {}.",
                a.threshold,
                b.threshold
            ));
        }
        Ok(Curve { points })
    }

    /// Returns a [`Curve`] from `(threshold, restricted_groups, total_groups)` tuples.
    pub fn from_counts<I>(counts: I) -> Result<Self, Report>
    where
        I: IntoIterator<Item = (u32, usize, usize)>,
    {
        let points = counts
            .into_iter()
            .map(|(threshold, restricted_groups, total_groups)| CurvePoint {
                threshold,
                restricted_groups,
                total_groups,
            })
            .collect();
        Curve::new(points)
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns the point at a threshold, if it was scanned.
    pub fn get(&self, threshold: u32) -> Option<&CurvePoint> {
        self.points
            .binary_search_by_key(&threshold, |p| p.threshold)
            .ok()
            .map(|i| &self.points[i])
    }

    /// Returns the point whose threshold is closest, the first in threshold order on ties.
    pub fn closest(&self, threshold: u32) -> Option<&CurvePoint> {
        self.points.iter().min_by_key(|p| p.threshold.abs_diff(threshold))
    }

    /// Returns the points with a threshold in `start..=end`.
    pub fn window(&self, start: u32, end: u32) -> &[CurvePoint] {
        let from = self.points.partition_point(|p| p.threshold < start);
        let to = self.points.partition_point(|p| p.threshold <= end);
        &self.points[from..to.max(from)]
    }

    /// Returns true if both counts never decrease as the threshold increases.
    pub fn is_monotonic(&self) -> bool {
        self.points.iter().tuple_windows().all(|(a, b)| {
            a.restricted_groups <= b.restricted_groups && a.total_groups <= b.total_groups
        })
    }

    /// Returns true if every threshold between the first and last was scanned.
    pub fn is_contiguous(&self) -> bool {
        self.points.iter().tuple_windows().all(|(a, b)| b.threshold == a.threshold + 1)
    }

    pub fn to_table(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = CURVE_HEADERS.iter().map(|h| h.to_string()).collect();
        table.rows = self
            .points
            .iter()
            .map(|p| {
                vec![p.threshold.to_string(), p.restricted_groups.to_string(), p.total_groups.to_string()]
            })
            .collect();
        table
    }

    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        self.to_table().write(path, None).wrap_err_with(|| format!("Failed to write curve: {path:?}"))
    }

    /// Read a curve table with `threshold`, `restricted_groups`, and `total_groups` columns.
    pub fn read<P>(path: &P) -> Result<Curve, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let table = Table::read(path, None)?;
        let columns = CURVE_HEADERS
            .iter()
            .map(|header| {
                table
                    .get_column(header)?
                    .into_iter()
                    .map(|value| {
                        value
                            .parse::<u64>()
                            .wrap_err_with(|| format!("Invalid {header} value: {value:?}"))
                    })
                    .collect::<Result<Vec<_>, Report>>()
            })
            .collect::<Result<Vec<_>, Report>>()
            .wrap_err_with(|| format!("Failed to read curve: {path:?}"))
            .suggestion(format!("Curve columns: {}", CURVE_HEADERS.join(", ")))?;

        let points = (0..table.rows.len())
            .map(|i| {
                Ok::<_, Report>(CurvePoint {
                    threshold: u32::try_from(columns[0][i])?,
                    restricted_groups: usize::try_from(columns[1][i])?,
                    total_groups: usize::try_from(columns[2][i])?,
                })
            })
            .collect::<Result<Vec<_>, Report>>()?;

        Curve::new(points).wrap_err_with(|| format!("Failed to read curve: {path:?}"))
    }
}

// ----------------------------------------------------------------------------
// Scan
// ----------------------------------------------------------------------------

/// Returns the [`ThresholdGraph`] of a support matrix, over all of its strains.
pub fn threshold_graph(matrix: &SupportMatrix) -> ThresholdGraph<String> {
    ThresholdGraph::from_fn(matrix.strains().to_vec(), |i, j| matrix.get(i, j))
}

/// Returns the indices of the subset strains, or all indices if there is no subset.
fn subset_indices(matrix: &SupportMatrix, subset: Option<&[String]>) -> Result<Vec<usize>, Report> {
    match subset {
        None => Ok((0..matrix.len()).collect()),
        Some(subset) => {
            let indices = subset
                .iter()
                .map(|s| matrix.index_of(s))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .unique()
                .collect_vec();
            Ok(indices)
        }
    }
}

/// Scan every threshold of a range, and count the groups at each.
///
/// The graph at each threshold connects strains whose support is at least the threshold.
/// All strains take part in the connectivity. With a subset, `restricted_groups` counts only
/// the groups that contain at least one subset strain; without one it equals `total_groups`.
///
/// ## Examples
///
/// ```rust
/// use cgcd::{scan, MissingPolicy, Partition, SupportMatrix};
/// let strains = ["A", "B", "C"].map(String::from);
/// let partitions = [
///     Partition::new("gene_1", [("A", 1), ("B", 1), ("C", 2)]),
///     Partition::new("gene_2", [("A", 1), ("B", 1), ("C", 1)]),
/// ];
/// let matrix = SupportMatrix::build(&strains, &partitions, MissingPolicy::default())?.matrix;
/// let range = scan::ThresholdRange::new(1, 2)?;
/// let curve = scan::scan(&matrix, range, None)?;
/// let totals: Vec<_> = curve.points().iter().map(|p| p.total_groups).collect();
/// assert_eq!(totals, [1, 2]);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn scan(
    matrix: &SupportMatrix,
    range: ThresholdRange,
    subset: Option<&[String]>,
) -> Result<Curve, Report> {
    let marked = subset_indices(matrix, subset)?;
    let graph = threshold_graph(matrix);
    debug!("Threshold graph: {} strains, {} edges.", graph.node_count(), graph.edge_count());

    let points = graph
        .sweep(range.min..=range.max, &marked)?
        .into_iter()
        .map(|p| CurvePoint {
            threshold: p.threshold,
            restricted_groups: p.marked_components,
            total_groups: p.components,
        })
        .collect();
    let curve = Curve::new(points)?;

    info!("Scanned thresholds {} to {} over {} strains.", range.min, range.max, matrix.len());
    Ok(curve)
}

// ----------------------------------------------------------------------------
// Grouping
// ----------------------------------------------------------------------------

/// Group membership of strains at one threshold.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Grouping {
    pub threshold: u32,
    /// Groups in order of discovery, group ids are 1-based positions in this list.
    pub groups: Vec<Vec<String>>,
}

impl Grouping {
    /// Returns the groups of all strains at a threshold.
    pub fn at(matrix: &SupportMatrix, threshold: u32) -> Result<Grouping, Report> {
        Grouping::from_graph(&threshold_graph(matrix), threshold)
    }

    /// Returns the groups of all nodes of a [`ThresholdGraph`] at a threshold.
    pub fn from_graph(graph: &ThresholdGraph<String>, threshold: u32) -> Result<Grouping, Report> {
        if threshold < 1 {
            return Err(Report::new(Error::InvalidThreshold(threshold)));
        }
        let groups = graph
            .components(threshold)?
            .into_iter()
            .map(|members| members.into_iter().map(|i| graph.nodes[i].clone()).collect())
            .collect();
        Ok(Grouping { threshold, groups })
    }

    /// Returns the grouping of only the subset strains.
    ///
    /// Strains outside the subset are dropped from their groups, and groups without any subset
    /// strain are dropped.
    pub fn restrict(&self, subset: &[String]) -> Grouping {
        let subset: HashSet<&str> = subset.iter().map(|s| s.as_str()).collect();
        let groups = self
            .groups
            .iter()
            .map(|group| group.iter().filter(|s| subset.contains(s.as_str())).cloned().collect_vec())
            .filter(|group| !group.is_empty())
            .collect();
        Grouping { threshold: self.threshold, groups }
    }

    /// Number of groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Returns the group id (1-based) of every strain, in group order.
    pub fn assignments(&self) -> Vec<(&str, usize)> {
        self.groups
            .iter()
            .enumerate()
            .flat_map(|(i, group)| group.iter().map(move |s| (s.as_str(), i + 1)))
            .collect()
    }

    pub fn to_table(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = vec!["strain".to_string(), "group".to_string()];
        table.rows =
            self.assignments().into_iter().map(|(s, g)| vec![s.to_string(), g.to_string()]).collect();
        table
    }

    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        self.to_table().write(path, None).wrap_err_with(|| format!("Failed to write groups: {path:?}"))
    }
}

/// Groupings to export at one threshold: all strains, and optionally the subset only.
#[derive(Clone, Debug)]
pub struct Export {
    pub all: Grouping,
    pub subset: Option<Grouping>,
}

impl Export {
    /// Write the groupings as `{prefix}_t{threshold}.tsv` and `{prefix}_t{threshold}_subset.tsv`.
    pub fn write<P>(&self, dir: &P, prefix: &str) -> Result<Vec<PathBuf>, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let threshold = self.all.threshold;
        let mut paths = Vec::new();

        let path = dir.as_ref().join(format!("{prefix}_t{threshold}.tsv"));
        self.all.write(&path)?;
        paths.push(path);

        if let Some(subset) = &self.subset {
            let path = dir.as_ref().join(format!("{prefix}_t{threshold}_subset.tsv"));
            subset.write(&path)?;
            paths.push(path);
        }

        Ok(paths)
    }
}

/// Returns the groupings at each of the thresholds.
pub fn groupings<I>(
    matrix: &SupportMatrix,
    thresholds: I,
    subset: Option<&[String]>,
) -> Result<Vec<Export>, Report>
where
    I: IntoIterator<Item = u32>,
{
    // fail early on unknown subset strains
    subset_indices(matrix, subset)?;
    let graph = threshold_graph(matrix);
    thresholds
        .into_iter()
        .map(|threshold| {
            let all = Grouping::from_graph(&graph, threshold)?;
            let subset = subset.map(|s| all.restrict(s));
            Ok(Export { all, subset })
        })
        .collect()
}

/// Returns the groupings at every scanned threshold whose restricted group count is the target.
pub fn groupings_with_count(
    matrix: &SupportMatrix,
    curve: &Curve,
    target: usize,
    subset: Option<&[String]>,
) -> Result<Vec<Export>, Report> {
    let thresholds = curve
        .points()
        .iter()
        .filter(|p| p.restricted_groups == target)
        .map(|p| p.threshold)
        .collect_vec();
    if thresholds.is_empty() {
        warn!("No scanned threshold has exactly {target} restricted groups.");
    }
    groupings(matrix, thresholds, subset)
}
