//! Select a consensus group count between two delimitation methods.

use crate::plateau::{mode_and_proportion, Column, Plateau, Plateaus};
use crate::scan::{Curve, CurvePoint};
use crate::Table;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use indoc::formatdoc;
use itertools::Itertools;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{Debug, Display};
use std::path::Path;

#[cfg(test)]
mod tests;

/// Default scale of the penalty for disagreeing total group counts.
pub const DEFAULT_KAPPA: f64 = 20.0;

// ----------------------------------------------------------------------------
// Method
// ----------------------------------------------------------------------------

/// The group-count curve of one delimitation method, with its restricted plateaus.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Method {
    pub name: String,
    pub curve: Curve,
    /// Plateaus of the restricted column.
    pub plateaus: Plateaus,
}

impl Method {
    pub fn new(name: &str, curve: Curve) -> Self {
        let plateaus = Plateaus::detect(&curve, Column::Restricted);
        Method { name: name.to_string(), curve, plateaus }
    }

    /// Returns the best plateau of a restricted group count.
    ///
    /// Plateaus are ranked by stability proportion, then length, then lowest start.
    pub fn choose(&self, groups: usize) -> Option<PlateauChoice> {
        let length = self.plateaus.total_length(groups);
        self.plateaus
            .get(groups)
            .iter()
            .filter_map(|plateau| {
                let stability = mode_and_proportion(plateau.window(&self.curve))?;
                Some(PlateauChoice {
                    plateau: *plateau,
                    mode: stability.mode,
                    proportion: stability.proportion,
                    length,
                })
            })
            .min_by(|a, b| {
                b.proportion
                    .total_cmp(&a.proportion)
                    .then(b.plateau.len().cmp(&a.plateau.len()))
                    .then(a.plateau.start.cmp(&b.plateau.start))
            })
    }
}

/// The plateau chosen for one method and one group count.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlateauChoice {
    pub plateau: Plateau,
    /// Most frequent total group count inside the plateau.
    pub mode: usize,
    /// Fraction of the plateau where the total group count is the mode.
    pub proportion: f64,
    /// Summed length of all plateaus of this group count.
    pub length: u32,
}

// ----------------------------------------------------------------------------
// Candidate
// ----------------------------------------------------------------------------

/// A restricted group count shared by both methods, and its score.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct Candidate {
    pub groups: usize,
    pub score: f64,
    pub a: PlateauChoice,
    pub b: PlateauChoice,
}

/// Score a candidate from the plateau choices of both methods.
///
/// `(L_a * L_b) * (p_a * p_b) * exp(-|T_a - T_b| / kappa)`, where `L` is the summed plateau
/// length, `p` the stability proportion, and `T` the mode of the total group count.
///
/// ```rust
/// use cgcd::consensus::{score, PlateauChoice, DEFAULT_KAPPA};
/// use cgcd::plateau::Plateau;
/// let a = PlateauChoice { plateau: Plateau { start: 3, end: 5 }, mode: 3, proportion: 1.0, length: 3 };
/// let b = PlateauChoice { plateau: Plateau { start: 3, end: 4 }, mode: 3, proportion: 1.0, length: 2 };
/// assert_eq!(score(&a, &b, DEFAULT_KAPPA), 6.0);
/// ```
pub fn score(a: &PlateauChoice, b: &PlateauChoice, kappa: f64) -> f64 {
    let lengths = a.length as f64 * b.length as f64;
    let stability = a.proportion * b.proportion;
    let penalty = (-(a.mode.abs_diff(b.mode) as f64) / kappa).exp();
    lengths * stability * penalty
}

// ----------------------------------------------------------------------------
// Consensus
// ----------------------------------------------------------------------------

/// The representative threshold of one method at the consensus group count.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Pick {
    pub method: String,
    pub threshold: u32,
    pub restricted_groups: usize,
    pub total_groups: usize,
    pub plateau: Plateau,
    pub mode: usize,
    pub proportion: f64,
    pub length: u32,
}

/// A selected consensus group count.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ConsensusResult {
    /// Consensus restricted group count.
    pub groups: usize,
    pub score: f64,
    pub kappa: f64,
    pub a: Pick,
    pub b: Pick,
    /// Every candidate, in ascending group count.
    pub candidates: Vec<Candidate>,
}

/// The outcome of [`select`].
#[derive(Clone, Debug, PartialEq)]
pub enum Consensus {
    Selected(ConsensusResult),
    /// No restricted group count has a plateau in both methods.
    NoConsensus { a: Plateaus, b: Plateaus },
}

/// Select the consensus group count of two methods, and a representative threshold for each.
///
/// Candidates are the restricted group counts with a plateau in both methods. The candidate
/// with the highest [`score`] wins, ties go to the lowest group count. When there are no
/// candidates, [`Consensus::NoConsensus`] is returned with both plateau catalogues.
///
/// ## Examples
///
/// ```rust
/// use cgcd::consensus::{select, Consensus, Method, DEFAULT_KAPPA};
/// use cgcd::scan::Curve;
/// let a = Curve::from_counts([(1, 5, 5), (2, 5, 5), (3, 3, 3), (4, 3, 3), (5, 3, 3)])?;
/// let b = Curve::from_counts([(1, 5, 5), (2, 4, 4), (3, 3, 3), (4, 3, 3), (5, 2, 2)])?;
/// let a = Method::new("ABGD", a);
/// let b = Method::new("ASAP", b);
///
/// match select(&a, &b, DEFAULT_KAPPA)? {
///     Consensus::Selected(result) => {
///         assert_eq!(result.groups, 3);
///         assert_eq!(result.a.threshold, 4);
///         assert_eq!(result.b.threshold, 4);
///     }
///     Consensus::NoConsensus { .. } => unreachable!(),
/// }
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn select(a: &Method, b: &Method, kappa: f64) -> Result<Consensus, Report> {
    if !(kappa.is_finite() && kappa > 0.0) {
        return Err(eyre!("Kappa ({kappa}) must be a positive number."));
    }

    let candidates = a
        .plateaus
        .values()
        .filter(|groups| b.plateaus.contains(*groups))
        .filter_map(|groups| {
            let choice_a = a.choose(groups)?;
            let choice_b = b.choose(groups)?;
            let score = score(&choice_a, &choice_b, kappa);
            debug!("Candidate {groups} groups: score {score:.4}");
            Some(Candidate { groups, score, a: choice_a, b: choice_b })
        })
        .collect_vec();

    // strictly greater, so ties keep the lowest group count
    let mut best: Option<&Candidate> = None;
    for candidate in &candidates {
        if best.map_or(true, |b| candidate.score.total_cmp(&b.score) == Ordering::Greater) {
            best = Some(candidate);
        }
    }

    let Some(best) = best.copied() else {
        warn!("{} and {} share no plateau group count, there is no consensus.", a.name, b.name);
        return Ok(Consensus::NoConsensus { a: a.plateaus.clone(), b: b.plateaus.clone() });
    };

    let pick_a = pick(a, &best.a, best.groups);
    let pick_b = pick(b, &best.b, best.groups);
    info!(
        "Consensus of {} groups: {} threshold {}, {} threshold {}.",
        best.groups, a.name, pick_a.threshold, b.name, pick_b.threshold
    );

    Ok(Consensus::Selected(ConsensusResult {
        groups: best.groups,
        score: best.score,
        kappa,
        a: pick_a,
        b: pick_b,
        candidates,
    }))
}

/// Returns the representative [`Pick`] of a method at its chosen plateau.
fn pick(method: &Method, choice: &PlateauChoice, groups: usize) -> Pick {
    let point = representative_point(&method.curve, &choice.plateau, groups, choice.mode);
    // the plateau comes from the curve, so a point is always found
    let (threshold, restricted_groups, total_groups) = point
        .map(|p| (p.threshold, p.restricted_groups, p.total_groups))
        .unwrap_or((choice.plateau.start, groups, choice.mode));
    Pick {
        method: method.name.clone(),
        threshold,
        restricted_groups,
        total_groups,
        plateau: choice.plateau,
        mode: choice.mode,
        proportion: choice.proportion,
        length: choice.length,
    }
}

/// Returns the representative point of a plateau.
///
/// The threshold is the median of the plateau thresholds where the restricted count is `groups`
/// and the total count is `mode`. Without such thresholds, the plateau midpoint is used. Both
/// round half to even. The point is then the curve point at that threshold, or the closest one.
///
/// ```rust
/// use cgcd::consensus::representative_point;
/// use cgcd::plateau::Plateau;
/// use cgcd::scan::Curve;
/// let curve = Curve::from_counts([(1, 2, 4), (2, 2, 5), (3, 2, 5), (4, 2, 4)])?;
/// let plateau = Plateau { start: 1, end: 4 };
///
/// // median of 1 and 4 is 2.5, rounded to 2
/// assert_eq!(representative_point(&curve, &plateau, 2, 4).map(|p| p.threshold), Some(2));
/// // no point has a total of 9, midpoint of 1 and 4 is also 2
/// assert_eq!(representative_point(&curve, &plateau, 2, 9).map(|p| p.threshold), Some(2));
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn representative_point<'c>(
    curve: &'c Curve,
    plateau: &Plateau,
    groups: usize,
    mode: usize,
) -> Option<&'c CurvePoint> {
    let thresholds = plateau
        .window(curve)
        .iter()
        .filter(|p| p.restricted_groups == groups && p.total_groups == mode)
        .map(|p| p.threshold)
        .collect_vec();

    let threshold = match median(&thresholds) {
        Some(threshold) => threshold,
        None => half_even(plateau.start as u64 + plateau.end as u64),
    };

    curve.get(threshold).or_else(|| curve.closest(threshold))
}

/// Returns the median of sorted thresholds, rounded half to even.
fn median(thresholds: &[u32]) -> Option<u32> {
    let n = thresholds.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(thresholds[n / 2]),
        _ => Some(half_even(thresholds[n / 2 - 1] as u64 + thresholds[n / 2] as u64)),
    }
}

/// Returns `sum / 2` rounded half to even.
fn half_even(sum: u64) -> u32 {
    let half = sum / 2;
    let rounded = match sum % 2 == 1 && half % 2 == 1 {
        true => half + 1,
        false => half,
    };
    rounded as u32
}

// ----------------------------------------------------------------------------
// Output
// ----------------------------------------------------------------------------

/// The data needed to plot both curves with the consensus.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlotData {
    pub groups: usize,
    pub score: f64,
    pub kappa: f64,
    pub methods: Vec<PlotMethod>,
    pub candidates: Vec<Candidate>,
}

/// One curve of the [`PlotData`], with its chosen plateau and threshold.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlotMethod {
    pub name: String,
    pub curve: Vec<CurvePoint>,
    pub plateau: Plateau,
    pub threshold: u32,
}

impl ConsensusResult {
    /// Summary table, with one row per method.
    pub fn to_table(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = [
            "method",
            "groups",
            "threshold",
            "restricted_groups",
            "total_groups",
            "plateau_start",
            "plateau_end",
            "total_mode",
            "stability",
            "plateau_length",
            "score",
        ]
        .map(String::from)
        .to_vec();
        table.rows = [&self.a, &self.b]
            .into_iter()
            .map(|pick| {
                vec![
                    pick.method.clone(),
                    self.groups.to_string(),
                    pick.threshold.to_string(),
                    pick.restricted_groups.to_string(),
                    pick.total_groups.to_string(),
                    pick.plateau.start.to_string(),
                    pick.plateau.end.to_string(),
                    pick.mode.to_string(),
                    format!("{:.4}", pick.proportion),
                    pick.length.to_string(),
                    format!("{:.4}", self.score),
                ]
            })
            .collect();
        table
    }

    pub fn plot_data(&self, a: &Method, b: &Method) -> PlotData {
        let method = |method: &Method, pick: &Pick| PlotMethod {
            name: method.name.clone(),
            curve: method.curve.points().to_vec(),
            plateau: pick.plateau,
            threshold: pick.threshold,
        };
        PlotData {
            groups: self.groups,
            score: self.score,
            kappa: self.kappa,
            methods: vec![method(a, &self.a), method(b, &self.b)],
            candidates: self.candidates.clone(),
        }
    }

    /// Write the summary table.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        self.to_table().write(path, None).wrap_err_with(|| format!("Failed to write consensus: {path:?}"))
    }
}

impl Display for Pick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: threshold {} ({} restricted, {} total groups), plateau {}-{}, stability {:.2}",
            self.method,
            self.threshold,
            self.restricted_groups,
            self.total_groups,
            self.plateau.start,
            self.plateau.end,
            self.proportion,
        )
    }
}

impl Display for ConsensusResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let candidates = self.candidates.iter().map(|c| format!("{}={:.4}", c.groups, c.score)).join(", ");
        write!(
            f,
            "{}",
            formatdoc!(
                "groups: {}
                score: {:.4}
                candidates: {candidates}
                {}
                {}",
                self.groups,
                self.score,
                self.a,
                self.b,
            )
        )
    }
}

impl PlotData {
    /// Write [`PlotData`] to a JSON file.
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        crate::utils::create_parent_dir(path)?;
        let output = serde_json::to_string_pretty(self)
            .wrap_err_with(|| format!("Failed to serialize plot data: {path:?}"))?;
        std::fs::write(path, output).wrap_err_with(|| format!("Failed to write plot data: {path:?}"))?;
        Ok(())
    }
}
