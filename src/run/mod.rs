//! Run the delimitation pipeline, or one of its steps, from command-line arguments.

use crate::consensus::{self as selector, Consensus, Method, DEFAULT_KAPPA};
use crate::error::{write_diagnostics, Diagnostic};
use crate::partition::{read_strains, Delimiter, MissingPolicy, PartitionDir};
use crate::plateau::{Column, Plateaus};
use crate::scan::{Curve, Export, ThresholdRange, DEFAULT_MIN_FRACTION};
use crate::{utils, SupportMatrix};
use clap::{Args as ClapArgs, Parser};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(test)]
mod tests;

// ----------------------------------------------------------------------------
// Method Input
// ----------------------------------------------------------------------------

/// A delimitation method and the directory of its per-gene partitions, written as `NAME=DIR`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct MethodInput {
    pub name: String,
    pub dir: PathBuf,
}

impl FromStr for MethodInput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((name, dir)) if !name.trim().is_empty() && !dir.trim().is_empty() => {
                Ok(MethodInput { name: name.trim().to_string(), dir: PathBuf::from(dir.trim()) })
            }
            _ => Err(format!("Expected NAME=DIR, found {s:?}")),
        }
    }
}

impl Display for MethodInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.name, self.dir.display())
    }
}

// ----------------------------------------------------------------------------
// Scan Range Args
// ----------------------------------------------------------------------------

/// Threshold range arguments shared by the scanning commands.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, ClapArgs)]
pub struct RangeArgs {
    /// Lowest threshold to scan.
    ///
    /// Defaults to the largest support times --min-fraction, and at least 1.
    #[arg(long)]
    pub min_threshold: Option<u32>,

    /// Highest threshold to scan, defaults to the largest support.
    #[arg(long)]
    pub max_threshold: Option<u32>,

    /// Fraction of the largest support used as the default lowest threshold.
    #[arg(long, default_value_t = RangeArgs::default().min_fraction)]
    pub min_fraction: f64,
}

impl Default for RangeArgs {
    fn default() -> Self {
        RangeArgs { min_threshold: None, max_threshold: None, min_fraction: DEFAULT_MIN_FRACTION }
    }
}

impl RangeArgs {
    /// Returns the [`ThresholdRange`] to scan for a matrix.
    pub fn range(&self, matrix: &SupportMatrix) -> Result<ThresholdRange, Report> {
        let range = ThresholdRange::from_matrix(matrix, self.min_threshold, self.min_fraction)?;
        match self.max_threshold {
            Some(max) => ThresholdRange::new(range.min, max),
            None => Ok(range),
        }
    }
}

// ----------------------------------------------------------------------------
// Matrix
// ----------------------------------------------------------------------------

/// Build the support matrix of one method's partitions.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct MatrixArgs {
    /// Directory of per-gene partition files (.tsv, .csv, .txt).
    #[clap(short = 'p', long, required = true)]
    pub partitions: PathBuf,

    /// Ordered strain universe, one strain per line.
    ///
    /// Defaults to the strains of the first partition.
    #[arg(short = 's', long)]
    pub strains: Option<PathBuf>,

    /// How strains missing from a partition are treated.
    #[arg(short = 'm', long, value_enum, default_value_t = MissingPolicy::default())]
    pub missing: MissingPolicy,

    /// Output support matrix (.tsv or .csv).
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Output table of skipped partitions.
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,
}

/// Build a support matrix from a partition directory, and write it.
pub fn matrix(args: &MatrixArgs) -> Result<SupportMatrix, Report> {
    let name = dir_name(&args.partitions);
    let source = PartitionDir::new(&name, &args.partitions);
    let mut diagnostics = Vec::new();
    let partitions = source.partitions(&mut diagnostics)?;

    let strains = match &args.strains {
        Some(path) => read_strains(path)?,
        None => default_universe([partitions.as_slice()])?,
    };
    let build = SupportMatrix::build(&strains, &partitions, args.missing)?;
    diagnostics.extend(build.diagnostics);

    build.matrix.write(&args.output)?;
    if let Some(path) = &args.diagnostics {
        write_diagnostics(&diagnostics, path)?;
    }
    info!("Support matrix: {:?}", args.output);

    Ok(build.matrix)
}

// ----------------------------------------------------------------------------
// Scan
// ----------------------------------------------------------------------------

/// Scan the thresholds of a support matrix into a group-count curve.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct ScanArgs {
    /// Input support matrix.
    #[clap(short = 'i', long, required = true)]
    pub matrix: PathBuf,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Strains of interest, one per line. Restricted group counts only count their groups.
    #[arg(long)]
    pub subset: Option<PathBuf>,

    /// Output curve (.tsv or .csv).
    #[clap(short = 'o', long, required = true)]
    pub output: PathBuf,

    /// Output table of restricted plateaus.
    #[arg(long)]
    pub plateaus: Option<PathBuf>,
}

/// Scan a support matrix, and write the curve.
pub fn scan(args: &ScanArgs) -> Result<Curve, Report> {
    let matrix = SupportMatrix::read(&args.matrix)?;
    let subset = args.subset.as_ref().map(read_strains).transpose()?;
    let range = args.range.range(&matrix)?;
    let curve = crate::scan::scan(&matrix, range, subset.as_deref())?;
    let plateaus = Plateaus::detect(&curve, Column::Restricted);

    curve.write(&args.output)?;
    if let Some(path) = &args.plateaus {
        plateaus.write(path)?;
    }
    info!("Curve: {:?}", args.output);

    Ok(curve)
}

// ----------------------------------------------------------------------------
// Groups
// ----------------------------------------------------------------------------

/// Export group membership at chosen thresholds.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct GroupsArgs {
    /// Input support matrix.
    #[clap(short = 'i', long, required = true)]
    pub matrix: PathBuf,

    /// Thresholds to export, comma separated.
    #[arg(short = 't', long, value_delimiter = ',', conflicts_with = "target")]
    pub thresholds: Option<Vec<u32>>,

    /// Export every scanned threshold with exactly this many restricted groups.
    ///
    /// Without --thresholds or --target, every scanned threshold is exported.
    #[arg(short = 'g', long)]
    pub target: Option<usize>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Strains of interest, one per line. Also writes groupings of only these strains.
    #[arg(long)]
    pub subset: Option<PathBuf>,

    /// Output directory.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long, required = true)]
    pub output_dir: PathBuf,

    /// Prefix of the output file names.
    #[arg(long, default_value_t = GroupsArgs::default_prefix())]
    pub prefix: String,
}

impl GroupsArgs {
    pub fn default_prefix() -> String {
        "groups".to_string()
    }
}

/// Export groupings of a support matrix, and returns the paths written.
pub fn groups(args: &GroupsArgs) -> Result<Vec<PathBuf>, Report> {
    let matrix = SupportMatrix::read(&args.matrix)?;
    let subset = args.subset.as_ref().map(read_strains).transpose()?;

    let exports = match (&args.thresholds, args.target) {
        (Some(thresholds), _) => crate::scan::groupings(&matrix, thresholds.clone(), subset.as_deref())?,
        (None, target) => {
            let range = args.range.range(&matrix)?;
            match target {
                Some(target) => {
                    let curve = crate::scan::scan(&matrix, range, subset.as_deref())?;
                    crate::scan::groupings_with_count(&matrix, &curve, target, subset.as_deref())?
                }
                None => crate::scan::groupings(&matrix, range.iter(), subset.as_deref())?,
            }
        }
    };

    write_exports(&exports, &args.output_dir, &args.prefix)
}

fn write_exports(exports: &[Export], dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, Report> {
    let mut paths = Vec::new();
    for export in exports {
        paths.extend(export.write(&dir, prefix)?);
    }
    info!("Wrote {} group tables to {dir:?}", paths.len());
    Ok(paths)
}

// ----------------------------------------------------------------------------
// Consensus
// ----------------------------------------------------------------------------

/// Select the consensus group count of two curves.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct ConsensusArgs {
    /// Two curves, comma separated.
    #[clap(short = 'c', long, value_delimiter = ',', required = true)]
    pub curves: Vec<PathBuf>,

    /// Method names of the two curves, comma separated. Defaults to the file stems.
    #[arg(short = 'n', long, value_delimiter = ',')]
    pub names: Option<Vec<String>>,

    /// Scale of the penalty for disagreeing total group counts.
    #[arg(short = 'k', long, default_value_t = DEFAULT_KAPPA)]
    pub kappa: f64,

    /// Output directory.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long, required = true)]
    pub output_dir: PathBuf,
}

/// Select the consensus of two curve files, and write the result.
pub fn consensus(args: &ConsensusArgs) -> Result<Consensus, Report> {
    let [path_a, path_b] = args.curves.as_slice() else {
        return Err(eyre!("Exactly two curves are required, found {}.", args.curves.len()));
    };
    let names = match &args.names {
        Some(names) => names.clone(),
        None => vec![dir_name(path_a), dir_name(path_b)],
    };
    let [name_a, name_b] = names.as_slice() else {
        return Err(eyre!("Exactly two method names are required, found {}.", names.len()));
    };
    check_names(name_a, name_b)?;

    let a = Method::new(name_a, Curve::read(path_a)?);
    let b = Method::new(name_b, Curve::read(path_b)?);
    let consensus = selector::select(&a, &b, args.kappa)?;

    write_consensus(&consensus, &a, &b, &args.output_dir)?;
    Ok(consensus)
}

/// Write the consensus outputs, or the plateau catalogues when there is no consensus.
fn write_consensus(consensus: &Consensus, a: &Method, b: &Method, dir: &Path) -> Result<(), Report> {
    match consensus {
        Consensus::Selected(result) => {
            result.write(&dir.join("consensus.tsv"))?;
            result.plot_data(a, b).write(&dir.join("consensus.json"))?;
        }
        Consensus::NoConsensus { a: plateaus_a, b: plateaus_b } => {
            warn!("No consensus, writing plateau catalogues to {dir:?}");
            plateaus_a.write(&dir.join(format!("plateaus_{}.tsv", utils::file_stem(&a.name))))?;
            plateaus_b.write(&dir.join(format!("plateaus_{}.tsv", utils::file_stem(&b.name))))?;
        }
    }
    Ok(())
}

// ----------------------------------------------------------------------------
// RunArgs
// ----------------------------------------------------------------------------

/// Run the full pipeline: support matrices, threshold scans, and consensus of two methods.
#[derive(Clone, Debug, Deserialize, Parser, Serialize)]
pub struct RunArgs {
    /// Two methods and their partition directories, as NAME=DIR.
    ///
    /// Example: --method abgd=genes/abgd --method asap=genes/asap
    #[clap(long = "method", required = true)]
    pub methods: Vec<MethodInput>,

    /// Ordered strain universe, one strain per line.
    ///
    /// Defaults to the strains of the first partition of the first method.
    #[arg(short = 's', long)]
    pub strains: Option<PathBuf>,

    /// Strains of interest, one per line. Restricted group counts only count their groups.
    #[arg(long)]
    pub subset: Option<PathBuf>,

    /// How strains missing from a partition are treated.
    #[arg(short = 'm', long, value_enum, default_value_t = RunArgs::default().missing)]
    pub missing: MissingPolicy,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Scale of the penalty for disagreeing total group counts.
    #[arg(short = 'k', long, default_value_t = RunArgs::default().kappa)]
    pub kappa: f64,

    /// Output directory.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long, required = true)]
    #[serde(skip_serializing_if = "RunArgs::is_default_output_dir", skip_deserializing)]
    pub output_dir: PathBuf,

    /// Number of CPU threads to use.
    #[clap(short = 't', long, default_value_t = RunArgs::default().threads)]
    #[serde(skip)]
    pub threads: usize,
}

impl Default for RunArgs {
    fn default() -> Self {
        RunArgs {
            methods: Vec::new(),
            strains: None,
            subset: None,
            missing: MissingPolicy::default(),
            range: RangeArgs::default(),
            kappa: DEFAULT_KAPPA,
            output_dir: PathBuf::new(),
            threads: 1,
        }
    }
}

impl RunArgs {
    /// Check if output directory is default.
    pub fn is_default_output_dir(path: &Path) -> bool {
        path == RunArgs::default().output_dir
    }

    /// Reads [`RunArgs`] from a JSON file.
    pub fn read<P>(path: &P) -> Result<RunArgs, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let input = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read run arguments: {path:?}."))?;
        let run_args = serde_json::from_str(&input)
            .wrap_err_with(|| format!("Failed to deserialize run arguments: {input}"))?;
        Ok(run_args)
    }

    /// Write [`RunArgs`] to a JSON file.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use cgcd::RunArgs;
    /// let dir = tempfile::tempdir()?;
    /// let path = dir.path().join("run_args.json");
    /// RunArgs::write(&RunArgs::default(), &path)?;
    /// assert_eq!(RunArgs::read(&path)?.kappa, 20.0);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn write<P>(&self, path: &P) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        utils::create_parent_dir(path)?;
        let output = serde_json::to_string_pretty(self)
            .wrap_err(format!("Failed to serialize run arguments: {self:?}"))?;
        std::fs::write(path, output)
            .wrap_err(format!("Failed to write run arguments: {path:?}"))?;
        Ok(())
    }
}

/// The scanned state of one method, before anything is written.
struct Scanned {
    method: Method,
    matrix: SupportMatrix,
}

/// Run the full pipeline, and returns the consensus.
///
/// Every fatal condition (unreadable inputs, no usable partitions, an empty threshold range,
/// unknown subset strains) is checked before the first output file is written.
pub fn run(args: &RunArgs) -> Result<Consensus, Report> {
    if args.threads > 1 {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(args.threads).build_global() {
            warn!("Could not set the number of threads: {e}");
        }
    }

    let [input_a, input_b] = args.methods.as_slice() else {
        return Err(eyre!("Exactly two methods are required, found {}.", args.methods.len())
            .suggestion("Example: --method abgd=genes/abgd --method asap=genes/asap"));
    };
    check_names(&input_a.name, &input_b.name)?;

    // ------------------------------------------------------------------------
    // Inputs

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let sources = [input_a, input_b].map(|input| PartitionDir::new(&input.name, &input.dir));
    let partitions = sources
        .iter()
        .map(|source| source.partitions(&mut diagnostics))
        .collect::<Result<Vec<_>, Report>>()?;

    let strains = match &args.strains {
        Some(path) => read_strains(path)?,
        None => default_universe(partitions.iter().map(|p| p.as_slice()))?,
    };
    let subset = args.subset.as_ref().map(read_strains).transpose()?;

    // ------------------------------------------------------------------------
    // Matrices and Curves

    let mut scanned = Vec::with_capacity(2);
    for (source, partitions) in sources.iter().zip(&partitions) {
        let build = SupportMatrix::build(&strains, partitions, args.missing)
            .wrap_err_with(|| format!("Failed to build the support matrix of {}", source.name))?;
        diagnostics.extend(build.diagnostics);
        let matrix = build.matrix;

        let range = args.range.range(&matrix)?;
        let curve = crate::scan::scan(&matrix, range, subset.as_deref())?;
        scanned.push(Scanned { method: Method::new(&source.name, curve), matrix });
    }
    let [a, b] = scanned.as_slice() else {
        return Err(eyre!("Expected two scanned methods, found {}.", scanned.len()));
    };

    // ------------------------------------------------------------------------
    // Consensus

    let consensus = selector::select(&a.method, &b.method, args.kappa)?;
    let exports = match &consensus {
        Consensus::Selected(result) => [(a, &result.a), (b, &result.b)]
            .into_iter()
            .map(|(scanned, pick)| {
                crate::scan::groupings(&scanned.matrix, [pick.threshold], subset.as_deref())
            })
            .collect::<Result<Vec<_>, Report>>()?,
        Consensus::NoConsensus { .. } => Vec::new(),
    };

    // ------------------------------------------------------------------------
    // Outputs

    let dir = &args.output_dir;
    std::fs::create_dir_all(dir).wrap_err_with(|| format!("Failed to create directory: {dir:?}"))?;
    args.write(&dir.join("run_args.json"))?;

    for scanned in [a, b] {
        let stem = utils::file_stem(&scanned.method.name);
        scanned.matrix.write(&dir.join(format!("support_matrix_{stem}.tsv")))?;
        scanned.method.curve.write(&dir.join(format!("curve_{stem}.tsv")))?;
        scanned.method.plateaus.write(&dir.join(format!("plateaus_{stem}.tsv")))?;
    }
    write_consensus(&consensus, &a.method, &b.method, dir)?;
    for (scanned, exports) in [a, b].into_iter().zip(&exports) {
        let prefix = format!("groups_{}", utils::file_stem(&scanned.method.name));
        write_exports(exports, dir, &prefix)?;
    }
    write_diagnostics(&diagnostics, &dir.join("diagnostics.tsv"))?;

    if !diagnostics.is_empty() {
        warn!("{} partition(s) were skipped, see: {:?}", diagnostics.len(), dir.join("diagnostics.tsv"));
    }
    info!("Done.");

    Ok(consensus)
}

// ----------------------------------------------------------------------------
// Utilities
// ----------------------------------------------------------------------------

/// Returns the strains of the first non-empty partition, in its order.
fn default_universe<'p, I>(partitions: I) -> Result<Vec<String>, Report>
where
    I: IntoIterator<Item = &'p [crate::Partition]>,
{
    let first = partitions
        .into_iter()
        .flatten()
        .find(|p| !p.is_empty())
        .ok_or_else(|| eyre!("No readable partitions were found."))
        .suggestion("Check the partition directories, or provide --strains.")?;
    info!("Using the {} strains of partition {:?} as the strain universe.", first.assignments.len(), first.name);
    Ok(first.strains().unique().map(String::from).collect())
}

/// Method names become file names, and must stay distinct.
fn check_names(a: &str, b: &str) -> Result<(), Report> {
    if utils::file_stem(a) == utils::file_stem(b) {
        return Err(eyre!("Method names {a:?} and {b:?} are not distinct."));
    }
    Ok(())
}

/// Returns the file or directory name, without extension.
fn dir_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
