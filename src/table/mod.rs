//! Create, read, and write delimited [Table]s.

use crate::utils;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fmt::{Debug, Display};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

#[cfg(test)]
mod tests;

/// A row-based table of generic data.
///
/// # Examples
///
/// ```
/// use cgcd::Table;
///
/// let mut table = Table::new();
/// table.headers = vec!["threshold", "restricted_groups", "total_groups"];
/// table.add_row(vec!["1", "5", "7"])?;
///
/// println!("{}", table.to_markdown());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
///
/// | threshold | restricted_groups | total_groups |
/// |-----------|-------------------|--------------|
/// |     1     |         5         |      7       |
///
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Table<T> {
    /// Names of the table columns.
    pub headers: Vec<T>,
    /// Rows of table values.
    pub rows: Vec<Vec<T>>,
    /// Optional file path for where the table was read from.
    pub path: Option<PathBuf>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Table<T> {
    /// Create a new table with empty headers and rows.
    pub fn new() -> Self {
        Table { headers: Vec::new(), rows: Vec::new(), path: None }
    }

    /// Add a new row to the table.
    ///
    /// The row must be the same length as the headers, or if there are no headers,
    /// the same length as the existing rows.
    pub fn add_row(&mut self, row: Vec<T>) -> Result<(), Report> {
        let expected = match self.headers.is_empty() {
            true => self.rows.first().map(|r| r.len()),
            false => Some(self.headers.len()),
        };
        if let Some(ex) = expected {
            let new = row.len();
            if ex != new {
                return Err(eyre!("New row size ({new}) does not match existing table ({ex})."));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Return a row of table values.
    ///
    /// # Arguments
    ///
    /// * `i` - Row index (0-based).
    pub fn get_row(&self, i: usize) -> Result<&[T], Report> {
        self.rows
            .get(i)
            .map(|row| row.as_slice())
            .ok_or_else(|| eyre!("Row ({i}) does not exist in the table."))
    }
}

/// Methods for when the table data can be viewed as strings.
impl<T> Table<T>
where
    T: AsRef<str>,
{
    /// Get the column index (0-based) correponding to the header.
    ///
    /// # Examples
    ///
    /// ```
    /// use cgcd::Table;
    ///
    /// let mut table = Table::new();
    /// table.headers = vec!["strain", "group"];
    /// table.add_row(vec!["A", "1"])?;
    ///
    /// assert_eq!(table.get_header_index("group")?, 1);
    /// assert!(table.get_header_index("missing").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn get_header_index(&self, header: &str) -> Result<usize, Report> {
        self.headers
            .iter()
            .position(|h| h.as_ref() == header)
            .ok_or_else(|| eyre!("Column '{header}' was not found in table: {:?}.", self.path))
    }

    /// Return a vector of table values in a column.
    pub fn get_column(&self, header: &str) -> Result<Vec<&T>, Report> {
        let header_i = self.get_header_index(header)?;
        self.rows
            .iter()
            .enumerate()
            .map(|(row_i, row)| {
                row.get(header_i)
                    .ok_or_else(|| eyre!("Row ({row_i}) has no value for column '{header}'."))
            })
            .collect()
    }

    /// Get table value at a particular column and row index.
    pub fn get(&self, header: &str, row: usize) -> Result<&T, Report> {
        let header_i = self.get_header_index(header)?;
        let row = self.get_row(row)?;
        row.get(header_i).ok_or_else(|| eyre!("Row has no value for column '{header}'."))
    }
}

impl Table<String> {
    /// Read a TSV or CSV file into a Table.
    ///
    /// The first line is the headers, empty lines are skipped.
    ///
    /// # Arguments
    ///
    /// * `path` - File path.
    /// * `delim` - Optional delimiter. Otherwise, will be identified based on path suffix (.tsv, .txt, or .csv).
    pub fn read<P>(path: &P, delim: Option<char>) -> Result<Table<String>, Report>
    where
        P: AsRef<Path> + Debug,
    {
        let mut table = Table::new();

        // if not provided, lookup delimiter from file extension
        let delim = match delim {
            Some(c) => c,
            None => utils::get_delimiter(path)?,
        };

        let file = File::open(path).wrap_err_with(|| eyre!("Failed to read file: {path:?}"))?;

        for line in BufReader::new(file).lines() {
            let line = line.wrap_err_with(|| eyre!("Failed to read line in file: {path:?}"))?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let row = line.split(delim).map(|s| s.trim().to_string()).collect_vec();
            // if headers are empty, this is the first line, write headers
            if table.headers.is_empty() {
                table.headers = row;
            }
            // otherwise regular row
            else {
                table.rows.push(row);
            }
        }

        table.path = Some(path.as_ref().to_path_buf());

        Ok(table)
    }
}

/// Methods for when the table data can be displayed.
impl<T> Table<T>
where
    T: Display,
{
    /// Write table to file.
    ///
    /// # Examples
    ///
    /// ```
    /// use cgcd::Table;
    ///
    /// let mut table = Table::new();
    /// table.headers = vec!["strain", "group"];
    /// table.add_row(vec!["A", "1"])?;
    ///
    /// let dir = tempfile::tempdir()?;
    /// let path = dir.path().join("groups.tsv");
    /// table.write(&path, None)?;
    /// let observed = Table::read(&path, None)?;
    /// assert_eq!(observed.rows, [["A", "1"]]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn write<P>(&self, path: &P, delim: Option<char>) -> Result<(), Report>
    where
        P: AsRef<Path> + Debug,
    {
        // if not provided, lookup delimiter from file extension
        let delim = match delim {
            Some(c) => c,
            None => utils::get_delimiter(path)?,
        }
        .to_string();

        utils::create_parent_dir(path)?;
        let file =
            File::create(path).wrap_err_with(|| format!("Unable to create file: {path:?}"))?;
        let mut writer = BufWriter::new(file);

        // write headers
        let line = format!("{}\n", self.headers.iter().join(&delim));
        writer
            .write_all(line.as_bytes())
            .wrap_err_with(|| format!("Unable to write table headers: {line}"))?;

        // write regular rows
        for row in &self.rows {
            let line = format!("{}\n", row.iter().join(&delim));
            writer
                .write_all(line.as_bytes())
                .wrap_err_with(|| format!("Unable to write table rows: {line}"))?;
        }

        writer.flush().wrap_err_with(|| format!("Unable to write file: {path:?}"))?;

        Ok(())
    }

    /// Convert table to markdown format.
    pub fn to_markdown(&self) -> String {
        // get the maximum width of each column, +2 to add space on either side
        let col_widths = self
            .headers
            .iter()
            .enumerate()
            .map(|(col_i, header)| {
                let header_width = header.to_string().len();
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col_i))
                    .map(|cell| cell.to_string().len().max(header_width) + 2)
                    .max()
                    .unwrap_or(header_width + 2)
            })
            .collect_vec();

        let mut markdown = String::from("|");
        // frame in between headers and rows
        let mut header_frame = String::from("|");

        // Create the header line
        for (header, col_width) in self.headers.iter().zip(col_widths.iter()) {
            let cell = format!("{:^width$}|", header.to_string(), width = col_width);
            markdown.push_str(&cell);

            let frame = format!("{}|", "-".repeat(*col_width));
            header_frame.push_str(&frame);
        }
        markdown.push('\n');
        markdown.push_str(&header_frame);
        markdown.push('\n');

        // Create the row lines
        for row in &self.rows {
            markdown.push('|');
            for (cell, col_width) in row.iter().zip(col_widths.iter()) {
                let cell = format!("{:^width$}|", cell.to_string(), width = col_width);
                markdown.push_str(&cell);
            }
            markdown.push('\n');
        }

        markdown
    }
}

impl<T> Table<T>
where
    T: ToString,
{
    /// Create a new table with all values converted to owned String.
    pub fn to_string_values(&self) -> Table<String> {
        let mut table = Table::new();
        table.headers = self.headers.iter().map(|s| s.to_string()).collect();
        table.rows =
            self.rows.iter().map(|row| row.iter().map(|s| s.to_string()).collect()).collect();
        table.path = self.path.clone();
        table
    }
}
