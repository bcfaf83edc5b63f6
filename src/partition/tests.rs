use crate::error::Error;
use crate::partition::{read_strains, Delimiter, MissingPolicy, Partition, PartitionDir};
use color_eyre::eyre::{Report, Result};
use std::path::Path;
use strum::IntoEnumIterator;

fn universe(strains: &[&str]) -> Vec<String> {
    strains.iter().map(|s| s.to_string()).collect()
}

fn write(dir: &Path, name: &str, content: &str) -> Result<(), Report> {
    std::fs::write(dir.join(name), content)?;
    Ok(())
}

#[test]
fn read_assignment_table() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "gene_1.tsv", "strain\tgroup\nA\t1\nB\t1\nC\t2\n")?;
    write(dir.path(), "gene_2.csv", "A,x\nB,y\n")?;

    let observed = Partition::read(&dir.path().join("gene_1.tsv"))?;
    let expected = Partition::new("gene_1", [("A", 1), ("B", 1), ("C", 2)]);
    assert_eq!(expected, observed);

    // no header row
    let observed = Partition::read(&dir.path().join("gene_2.csv"))?;
    let expected = Partition::new("gene_2", [("A", "x"), ("B", "y")]);
    assert_eq!(expected, observed);
    Ok(())
}

#[test]
fn read_membership_matrix() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let content = "\tA\tB\tC\nB\t1\t1\t0\nA\t1\t1\t0\nC\t0\t0\t1\n";
    write(dir.path(), "gene_1.tsv", content)?;

    let partition = Partition::read(&dir.path().join("gene_1.tsv"))?;
    let labels = partition.resolve(&universe(&["A", "B", "C"]), MissingPolicy::Reject)?;
    assert_eq!(labels[0], labels[1]);
    assert_ne!(labels[0], labels[2]);
    Ok(())
}

#[test]
fn read_membership_matrix_not_transitive() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let content = "\tA\tB\tC\nA\t1\t1\t0\nB\t1\t1\t1\nC\t0\t1\t1\n";
    write(dir.path(), "gene_1.tsv", content)?;
    assert!(Partition::read(&dir.path().join("gene_1.tsv")).is_err());

    let content = "\tA\tB\nA\t1\t1\nB\t0\t1\n";
    write(dir.path(), "gene_2.tsv", content)?;
    assert!(Partition::read(&dir.path().join("gene_2.tsv")).is_err());
    Ok(())
}

#[test]
fn resolve_missing_policies() -> Result<(), Report> {
    let strains = universe(&["A", "B", "C", "D"]);
    // B and D are both missing
    let partition = Partition::new("gene_1", [("A", "x"), ("C", "x")]);

    let observed = partition.resolve(&strains, MissingPolicy::Distinct)?;
    assert_eq!(vec![Some(0), None, Some(0), None], observed);

    let observed = partition.resolve(&strains, MissingPolicy::Shared)?;
    assert_eq!(vec![Some(0), Some(1), Some(0), Some(1)], observed);

    let observed = partition.resolve(&strains, MissingPolicy::Reject);
    assert!(matches!(observed, Err(Error::IncompatiblePartition { .. })));
    Ok(())
}

#[test]
fn resolve_complete_partition() -> Result<(), Report> {
    let strains = universe(&["A", "B", "C"]);
    // extra strains outside the universe are ignored
    let partition = Partition::new("gene_1", [("C", 2), ("Z", 2), ("B", 1), ("A", 2)]);
    for policy in MissingPolicy::iter() {
        let observed = partition.resolve(&strains, policy)?;
        assert_eq!(vec![Some(0), Some(1), Some(0)], observed);
    }
    Ok(())
}

#[test]
fn resolve_incompatible() {
    let strains = universe(&["A", "B"]);

    let partition = Partition::new("gene_1", [("X", 1), ("Y", 1)]);
    let observed = partition.resolve(&strains, MissingPolicy::Distinct);
    assert!(matches!(observed, Err(Error::IncompatiblePartition { .. })));

    let partition = Partition::new("gene_2", [("A", 1), ("A", 2), ("B", 1)]);
    let observed = partition.resolve(&strains, MissingPolicy::Distinct);
    assert!(matches!(observed, Err(Error::IncompatiblePartition { .. })));
}

#[test]
fn strains_file() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "strains.txt", "C\nA\n\nB\n")?;
    write(dir.path(), "header.tsv", "strain\tcountry\nB\tNZ\nA\tCA\n")?;
    write(dir.path(), "duplicated.txt", "A\nB\nA\n")?;

    assert_eq!(vec!["C", "A", "B"], read_strains(&dir.path().join("strains.txt"))?);
    assert_eq!(vec!["B", "A"], read_strains(&dir.path().join("header.tsv"))?);
    assert!(read_strains(&dir.path().join("duplicated.txt")).is_err());
    Ok(())
}

#[test]
fn partition_dir() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "gene_2.tsv", "A\t1\nB\t2\n")?;
    write(dir.path(), "gene_1.tsv", "A\t1\nB\t1\n")?;
    write(dir.path(), "gene_3.tsv", "")?;
    write(dir.path(), "notes.md", "not a partition")?;
    write(dir.path(), "gene_4.tsv", "\tA\tB\nA\t1\t0\nB\t1\t1\n")?;

    let source = PartitionDir::new("ABGD", &dir.path());
    assert_eq!(4, source.files()?.len());

    let mut diagnostics = Vec::new();
    let partitions = source.partitions(&mut diagnostics)?;
    let names: Vec<_> = partitions.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(vec!["gene_1", "gene_2"], names);

    // the empty file and the asymmetric matrix are skipped
    assert_eq!(2, diagnostics.len());
    assert!(diagnostics[0].source.ends_with("gene_3.tsv"));
    assert!(diagnostics[1].source.ends_with("gene_4.tsv"));
    Ok(())
}
