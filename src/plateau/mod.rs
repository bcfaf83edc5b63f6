//! Detect [Plateaus] of constant group count in a [Curve].

use crate::scan::{Curve, CurvePoint};
use crate::Table;
use clap::ValueEnum;
use color_eyre::eyre::{Report, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::Path;
use strum::{Display, EnumIter};


// ----------------------------------------------------------------------------
// Column
// ----------------------------------------------------------------------------

/// A group-count column of a [`Curve`].
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumIter, Eq, Hash, PartialEq, Serialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Column {
    /// Groups containing at least one strain of interest.
    #[default]
    Restricted,
    /// Groups over all strains.
    Total,
}

impl Column {
    /// Returns the value of this column at a point.
    pub fn value(&self, point: &CurvePoint) -> usize {
        match self {
            Column::Restricted => point.restricted_groups,
            Column::Total => point.total_groups,
        }
    }
}

// ----------------------------------------------------------------------------
// Plateau
// ----------------------------------------------------------------------------

/// An inclusive run of consecutive thresholds that share one group count.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Plateau {
    pub start: u32,
    pub end: u32,
}

impl Plateau {
    /// Number of thresholds in the plateau.
    pub fn len(&self) -> u32 {
        self.end - self.start + 1
    }

    /// Always false, a plateau covers at least one threshold.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, threshold: u32) -> bool {
        (self.start..=self.end).contains(&threshold)
    }

    /// Returns the points of the curve inside this plateau.
    pub fn window<'c>(&self, curve: &'c Curve) -> &'c [CurvePoint] {
        curve.window(self.start, self.end)
    }
}

// ----------------------------------------------------------------------------
// Plateaus
// ----------------------------------------------------------------------------

/// Every maximal plateau of one [`Column`], keyed by group count.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct Plateaus {
    pub column: Column,
    /// Plateaus of each group count, in threshold order.
    pub runs: BTreeMap<usize, Vec<Plateau>>,
}

impl Plateaus {
    /// Detect the plateaus of a column in a single pass over the curve.
    ///
    /// A run continues while the next threshold is exactly one more than the last and the value
    /// is unchanged. A gap in the thresholds always ends the run.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::plateau::{Column, Plateau, Plateaus};
    /// use cgcd::scan::Curve;
    /// let curve = Curve::from_counts([(1, 5, 5), (2, 5, 5), (3, 3, 4), (4, 3, 4), (5, 5, 6)])?;
    /// let plateaus = Plateaus::detect(&curve, Column::Restricted);
    ///
    /// assert_eq!(plateaus.get(3), [Plateau { start: 3, end: 4 }]);
    /// assert_eq!(plateaus.get(5).len(), 2);
    /// assert_eq!(plateaus.total_length(5), 3);
    /// assert_eq!(plateaus.best(5), Some(&Plateau { start: 1, end: 2 }));
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn detect(curve: &Curve, column: Column) -> Self {
        let mut runs: BTreeMap<usize, Vec<Plateau>> = BTreeMap::new();
        let mut points = curve.points().iter();

        let Some(first) = points.next() else {
            return Plateaus { column, runs };
        };
        let mut value = column.value(first);
        let mut run = Plateau { start: first.threshold, end: first.threshold };

        for point in points {
            let next = column.value(point);
            if point.threshold == run.end + 1 && next == value {
                run.end = point.threshold;
                continue;
            }
            runs.entry(value).or_default().push(run);
            value = next;
            run = Plateau { start: point.threshold, end: point.threshold };
        }
        runs.entry(value).or_default().push(run);

        Plateaus { column, runs }
    }

    /// Returns the plateaus of a group count, in threshold order.
    pub fn get(&self, value: usize) -> &[Plateau] {
        self.runs.get(&value).map(|runs| runs.as_slice()).unwrap_or_default()
    }

    /// Returns the group counts that have at least one plateau, in ascending order.
    pub fn values(&self) -> impl Iterator<Item = usize> + '_ {
        self.runs.keys().copied()
    }

    pub fn contains(&self, value: usize) -> bool {
        self.runs.contains_key(&value)
    }

    /// Number of distinct group counts.
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns the longest plateau of a group count, the lowest start on ties.
    pub fn best(&self, value: usize) -> Option<&Plateau> {
        self.get(value).iter().min_by_key(|p| (std::cmp::Reverse(p.len()), p.start))
    }

    /// Returns the summed length of every plateau of a group count.
    pub fn total_length(&self, value: usize) -> u32 {
        self.get(value).iter().map(|p| p.len()).sum()
    }

    /// Returns all plateaus in threshold order, with their group count.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Plateau)> {
        let mut all: Vec<_> =
            self.runs.iter().flat_map(|(v, runs)| runs.iter().map(move |p| (*v, p))).collect();
        all.sort_by_key(|(_, p)| p.start);
        all.into_iter()
    }

    pub fn to_table(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = ["column", "groups", "start", "end", "length"].map(String::from).to_vec();
        table.rows = self
            .iter()
            .map(|(value, p)| {
                vec![
                    self.column.to_string(),
                    value.to_string(),
                    p.start.to_string(),
                    p.end.to_string(),
                    p.len().to_string(),
                ]
            })
            .collect();
        table
    }

    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        self.to_table().write(path, None).wrap_err_with(|| format!("Failed to write plateaus: {path:?}"))
    }
}

// ----------------------------------------------------------------------------
// Stability
// ----------------------------------------------------------------------------

/// The most frequent total group count in a window, and the fraction of the window that has it.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Stability {
    pub mode: usize,
    pub proportion: f64,
}

/// Returns the most frequent total group count of the points and its proportion.
///
/// On ties, the mode is the count that is reached first in threshold order.
/// Returns [`None`] if there are no points.
///
/// ```rust
/// use cgcd::plateau::mode_and_proportion;
/// use cgcd::scan::Curve;
/// let curve = Curve::from_counts([(1, 3, 7), (2, 3, 6), (3, 3, 6), (4, 3, 7)])?;
/// let stability = mode_and_proportion(curve.points());
/// assert_eq!(stability.map(|s| s.mode), Some(7));
/// assert_eq!(stability.map(|s| s.proportion), Some(0.5));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn mode_and_proportion(points: &[CurvePoint]) -> Option<Stability> {
    // (value, count) in order of first appearance
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for point in points {
        match counts.iter_mut().find(|(value, _)| *value == point.total_groups) {
            Some((_, count)) => *count += 1,
            None => counts.push((point.total_groups, 1)),
        }
    }

    let mut best: Option<(usize, usize)> = None;
    for (value, count) in counts {
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((value, count));
        }
    }

    best.map(|(mode, count)| Stability { mode, proportion: count as f64 / points.len() as f64 })
}
