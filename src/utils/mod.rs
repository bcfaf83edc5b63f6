use color_eyre::eyre::{eyre, ContextCompat, Report, Result, WrapErr};
use color_eyre::Help;
use std::fmt::Debug;
use std::path::Path;

/// Get delimiter based on file extension.
///
/// ## Arguments
///
/// - `path` - File path.
///
/// ## Examples
///
/// - `.tsv` => `\t`
/// - `.txt` => `\t`
/// - `.csv` => `,`
///
/// Note that `.txt` is assumed to be tab-delimited!
///
/// ```rust
/// use cgcd::utils::get_delimiter;
///
/// assert_eq!(get_delimiter(&"file.tsv")?, '\t');
/// assert_eq!(get_delimiter(&"file.csv")?, ',');
/// assert_eq!(get_delimiter(&"file.txt")?, '\t');
/// assert!(get_delimiter(&"file").is_err());
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn get_delimiter<P>(path: &P) -> Result<char, Report>
where
    P: AsRef<Path> + Debug,
{
    let ext = path
        .as_ref()
        .extension()
        .wrap_err_with(|| format!("Failed to get file extension: {path:?}"))?
        .to_str()
        .wrap_err_with(|| format!("Failed to convert file extension to str: {path:?}"))?;
    // convert extension to the expected delimiter
    match ext {
        "tsv" | "txt" => Ok('\t'),
        "csv" => Ok(','),
        _ext => {
            Err(eyre!("Unknown file extension: {_ext:?}").suggestion("Options: tsv, csv, or txt"))
        }
    }
}

/// Returns true if the file extension is one that [`get_delimiter`] understands.
pub fn is_delimited<P>(path: &P) -> bool
where
    P: AsRef<Path> + Debug,
{
    path.as_ref().is_file() && get_delimiter(path).is_ok()
}

/// Create the parent directory of a file path, if it doesn't exist yet.
pub fn create_parent_dir<P>(path: &P) -> Result<(), Report>
where
    P: AsRef<Path> + Debug,
{
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .wrap_err_with(|| format!("Failed to create directory: {parent:?}"))?;
        }
    }
    Ok(())
}

/// Convert a method name into something safe to use in a file name.
///
/// ```rust
/// use cgcd::utils::file_stem;
/// assert_eq!(file_stem("ABGD"), "abgd");
/// assert_eq!(file_stem("my method/2"), "my_method_2");
/// ```
pub fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| match c.is_ascii_alphanumeric() || c == '-' || c == '.' {
            true => c.to_ascii_lowercase(),
            false => '_',
        })
        .collect()
}
