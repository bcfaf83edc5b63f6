use crate::Table;
use color_eyre::eyre::{Report, Result};

fn groups_table() -> Result<Table<&'static str>, Report> {
    let mut table = Table::new();
    table.headers = vec!["strain", "group"];
    table.add_row(vec!["A", "1"])?;
    table.add_row(vec!["B", "1"])?;
    table.add_row(vec!["C", "2"])?;
    Ok(table)
}

#[test]
fn add_row_wrong_size() -> Result<(), Report> {
    let mut table = groups_table()?;
    assert!(table.add_row(vec!["D"]).is_err());
    assert_eq!(3, table.rows.len());
    Ok(())
}

#[test]
fn get_column() -> Result<(), Report> {
    let table = groups_table()?;
    let observed = table.get_column("group")?;
    let expected = [&"1", &"1", &"2"];
    assert_eq!(expected.as_slice(), observed.as_slice());
    assert_eq!(&"C", table.get("strain", 2)?);
    assert!(table.get("strain", 3).is_err());
    Ok(())
}

#[test]
fn write_read_csv() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("groups.csv");
    let table = groups_table()?;
    table.write(&path, None)?;

    let observed = Table::read(&path, None)?;
    assert_eq!(table.to_string_values().headers, observed.headers);
    assert_eq!(table.to_string_values().rows, observed.rows);
    assert_eq!(Some(path), observed.path);
    Ok(())
}

#[test]
fn read_skips_empty_lines() -> Result<(), Report> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("groups.tsv");
    std::fs::write(&path, "strain\tgroup\r\n\nA\t1\r\n \nB\t2\n")?;

    let observed = Table::read(&path, None)?;
    let expected = vec![vec!["A", "1"], vec!["B", "2"]];
    assert_eq!(expected, observed.rows);
    Ok(())
}

#[test]
fn read_unknown_extension() {
    assert!(Table::read(&"groups.json", None).is_err());
}

#[test]
fn to_markdown() -> Result<(), Report> {
    let mut table = Table::new();
    table.headers = vec!["strain", "group"];
    table.add_row(vec!["A", "1"])?;

    let observed = table.to_markdown();
    let expected = "| strain | group |\n|--------|-------|\n|   A    |   1   |\n";
    assert_eq!(expected, observed);
    Ok(())
}
