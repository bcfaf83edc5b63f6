use crate::error::Error;
use crate::run::{self, ConsensusArgs, GroupsArgs, MatrixArgs, MethodInput, RangeArgs, RunArgs, ScanArgs};
use crate::{Consensus, Curve, MissingPolicy, SupportMatrix, Table};
use color_eyre::eyre::{eyre, Report, Result};
use std::path::{Path, PathBuf};

/// Write one partition file per gene, each gene is a list of groups.
fn write_method(dir: &Path, genes: &[&[&[&str]]]) -> Result<PathBuf, Report> {
    std::fs::create_dir_all(dir)?;
    for (i, groups) in genes.iter().enumerate() {
        let mut content = String::from("strain\tgroup\n");
        for (g, group) in groups.iter().enumerate() {
            for strain in group.iter() {
                content.push_str(&format!("{strain}\t{g}\n"));
            }
        }
        std::fs::write(dir.join(format!("gene_{i}.tsv")), content)?;
    }
    Ok(dir.to_path_buf())
}

const SPLIT: &[&[&str]] = &[&["A", "B", "C"], &["D", "E"], &["F"]];
const MERGED: &[&[&str]] = &[&["A", "B", "C", "D", "E"], &["F"]];
const SINGLETONS: &[&[&str]] = &[&["A"], &["B"], &["C"], &["D"], &["E"], &["F"]];

fn run_args(abgd: PathBuf, asap: PathBuf, output_dir: PathBuf) -> RunArgs {
    RunArgs {
        methods: vec![
            MethodInput { name: "ABGD".to_string(), dir: abgd },
            MethodInput { name: "ASAP".to_string(), dir: asap },
        ],
        output_dir,
        ..Default::default()
    }
}

#[test]
fn method_input() -> Result<(), Report> {
    let observed: MethodInput = "abgd=genes/abgd".parse().map_err(|e: String| eyre!(e))?;
    assert_eq!(MethodInput { name: "abgd".to_string(), dir: PathBuf::from("genes/abgd") }, observed);
    assert_eq!("abgd=genes/abgd", observed.to_string());
    assert!("genes/abgd".parse::<MethodInput>().is_err());
    assert!("=genes/abgd".parse::<MethodInput>().is_err());
    Ok(())
}

#[test]
fn run_args_write_read() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let mut args = run_args(PathBuf::from("abgd"), PathBuf::from("asap"), dir.path().to_path_buf());
    args.missing = MissingPolicy::Shared;
    args.range.min_threshold = Some(2);

    let path = dir.path().join("run_args.json");
    args.write(&path)?;
    let observed = RunArgs::read(&path)?;
    assert_eq!(args.methods, observed.methods);
    assert_eq!(MissingPolicy::Shared, observed.missing);
    assert_eq!(args.range, observed.range);
    Ok(())
}

#[test]
fn run_consensus() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[MERGED, SPLIT, SPLIT])?;
    let output_dir = tmp.path().join("output");

    let consensus = run::run(&run_args(abgd, asap, output_dir.clone()))?;
    let Consensus::Selected(result) = consensus else {
        return Err(eyre!("Expected a consensus."));
    };
    assert_eq!(3, result.groups);
    assert_eq!(2, result.a.threshold);
    // median of 2 and 3 is 2.5, rounded to 2
    assert_eq!(2, result.b.threshold);

    for file in [
        "run_args.json",
        "support_matrix_abgd.tsv",
        "support_matrix_asap.tsv",
        "curve_abgd.tsv",
        "curve_asap.tsv",
        "plateaus_abgd.tsv",
        "plateaus_asap.tsv",
        "consensus.tsv",
        "consensus.json",
        "groups_abgd_t2.tsv",
        "groups_asap_t2.tsv",
        "diagnostics.tsv",
    ] {
        assert!(output_dir.join(file).exists(), "missing output: {file}");
    }

    let curve = Curve::read(&output_dir.join("curve_asap.tsv"))?;
    let totals: Vec<_> = curve.points().iter().map(|p| p.total_groups).collect();
    assert_eq!(vec![2, 3, 3], totals);

    let matrix = SupportMatrix::read(&output_dir.join("support_matrix_asap.tsv"))?;
    assert_eq!(1, matrix.get_by_name("A", "D")?);

    let groups = Table::read(&output_dir.join("groups_abgd_t2.tsv"), None)?;
    let observed: Vec<_> = groups.get_column("group")?.into_iter().cloned().collect();
    assert_eq!(vec!["1", "1", "1", "2", "2", "3"], observed);
    Ok(())
}

#[test]
fn run_subset() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[MERGED, SPLIT, SPLIT])?;
    let subset = tmp.path().join("subset.txt");
    std::fs::write(&subset, "A\nD\n")?;
    let output_dir = tmp.path().join("output");

    let mut args = run_args(abgd, asap, output_dir.clone());
    args.subset = Some(subset);
    let Consensus::Selected(result) = run::run(&args)? else {
        return Err(eyre!("Expected a consensus."));
    };
    assert_eq!(2, result.groups);
    assert_eq!(3, result.a.total_groups);

    let groups = Table::read(&output_dir.join("groups_abgd_t2_subset.tsv"), None)?;
    assert_eq!(vec![vec!["A", "1"], vec!["D", "2"]], groups.rows);
    Ok(())
}

#[test]
fn run_no_consensus() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[SINGLETONS, SINGLETONS])?;
    let output_dir = tmp.path().join("output");

    let consensus = run::run(&run_args(abgd, asap, output_dir.clone()))?;
    let Consensus::NoConsensus { a, b } = consensus else {
        return Err(eyre!("Expected no consensus."));
    };
    assert_eq!(vec![3], a.values().collect::<Vec<_>>());
    assert_eq!(vec![6], b.values().collect::<Vec<_>>());

    assert!(output_dir.join("curve_asap.tsv").exists());
    assert!(output_dir.join("plateaus_asap.tsv").exists());
    assert!(output_dir.join("diagnostics.tsv").exists());
    assert!(!output_dir.join("consensus.tsv").exists());
    Ok(())
}

#[test]
fn run_no_usable_partitions() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[&[&["X", "Y"]]])?;
    let output_dir = tmp.path().join("output");

    let observed = run::run(&run_args(abgd, asap, output_dir.clone()));
    let error = observed.as_ref().err().and_then(|r| r.downcast_ref::<Error>());
    assert!(matches!(error, Some(Error::NoUsablePartitions { skipped: 1 })));

    // nothing is written
    assert!(!output_dir.exists());
    Ok(())
}

#[test]
fn run_degenerate_range() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[SPLIT, SPLIT])?;
    let output_dir = tmp.path().join("output");

    let mut args = run_args(abgd, asap, output_dir.clone());
    args.range = RangeArgs { min_threshold: Some(5), ..Default::default() };
    let observed = run::run(&args);
    let error = observed.as_ref().err().and_then(|r| r.downcast_ref::<Error>());
    assert!(matches!(error, Some(Error::DegenerateRange { min: 5, max: 2 })));
    assert!(!output_dir.exists());
    Ok(())
}

#[test]
fn run_requires_two_methods() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT])?;

    let mut args = run_args(abgd.clone(), abgd.clone(), tmp.path().join("output"));
    args.methods.pop();
    assert!(run::run(&args).is_err());

    // names must stay distinct as file names
    let mut args = run_args(abgd.clone(), abgd, tmp.path().join("output"));
    args.methods[1].name = "abgd".to_string();
    assert!(run::run(&args).is_err());
    Ok(())
}

#[test]
fn steps() -> Result<(), Report> {
    let tmp = tempfile::tempdir()?;
    let abgd = write_method(&tmp.path().join("abgd"), &[SPLIT, SPLIT, SPLIT])?;
    let asap = write_method(&tmp.path().join("asap"), &[MERGED, SPLIT, SPLIT])?;
    let out = tmp.path().join("output");

    for (name, partitions) in [("abgd", abgd), ("asap", asap)] {
        let args = MatrixArgs {
            partitions,
            strains: None,
            missing: MissingPolicy::Distinct,
            output: out.join(format!("support_matrix_{name}.tsv")),
            diagnostics: Some(out.join(format!("diagnostics_{name}.tsv"))),
        };
        let matrix = run::matrix(&args)?;
        assert_eq!(3, matrix.partitions());

        let args = ScanArgs {
            matrix: out.join(format!("support_matrix_{name}.tsv")),
            range: RangeArgs::default(),
            subset: None,
            output: out.join(format!("curve_{name}.tsv")),
            plateaus: None,
        };
        assert_eq!(3, run::scan(&args)?.len());
    }

    let args = ConsensusArgs {
        curves: vec![out.join("curve_abgd.tsv"), out.join("curve_asap.tsv")],
        names: None,
        kappa: 20.0,
        output_dir: out.clone(),
    };
    let Consensus::Selected(result) = run::consensus(&args)? else {
        return Err(eyre!("Expected a consensus."));
    };
    assert_eq!("curve_abgd", result.a.method);
    assert!(out.join("consensus.tsv").exists());

    let args = GroupsArgs {
        matrix: out.join("support_matrix_asap.tsv"),
        thresholds: None,
        target: Some(3),
        range: RangeArgs::default(),
        subset: None,
        output_dir: out.join("groups"),
        prefix: GroupsArgs::default_prefix(),
    };
    let paths = run::groups(&args)?;
    let names: Vec<_> = paths.iter().filter_map(|p| p.file_name()).collect();
    assert_eq!(vec!["groups_t2.tsv", "groups_t3.tsv"], names);
    Ok(())
}
