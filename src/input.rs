//! Discovery and loading of input series batches.
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;

use crate::series::SeriesDescriptor;

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("invalid input file pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("{path} is not a JSON array of series: {source}")]
    Parse {
        path: Utf8PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot verify registration for empty PACS data in {path}")]
    EmptyBatch { path: Utf8PathBuf },
}

/// Find the files directly under `dir` whose name matches the glob `pattern`,
/// sorted by name. In the pattern, `*` matches any run of characters and `?`
/// matches any single character.
pub(crate) fn discover_input_files(
    dir: &Utf8Path,
    pattern: &str,
) -> Result<Vec<Utf8PathBuf>, InputError> {
    let re = glob_to_regex(pattern)?;
    let mut found = Vec::new();
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if re.is_match(name) {
            found.push(dir.join(name));
        }
    }
    found.sort();
    Ok(found)
}

/// Read one input file: a JSON array of series descriptors. An empty array is
/// an error, since it means there is nothing whose registration could ever be
/// confirmed.
pub(crate) async fn read_series_batch(
    path: &Utf8Path,
) -> Result<Vec<SeriesDescriptor>, InputError> {
    let text = fs_err::tokio::read_to_string(path).await?;
    let batch: Vec<SeriesDescriptor> =
        serde_json::from_str(&text).map_err(|source| InputError::Parse {
            path: path.to_owned(),
            source,
        })?;
    if batch.is_empty() {
        return Err(InputError::EmptyBatch {
            path: path.to_owned(),
        });
    }
    Ok(batch)
}

fn glob_to_regex(pattern: &str) -> Result<Regex, InputError> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    let mut buf = [0u8; 4];
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            c => expr.push_str(&regex::escape(c.encode_utf8(&mut buf))),
        }
    }
    expr.push('$');
    Regex::new(&expr).map_err(|source| InputError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}
