use crate::prelude::{RecorderError, RecorderResult};
use std::io::Write;
use std::path::Path;
use tempfile::Builder;

/// Writes `bytes` to a hidden sibling temp file, then renames it over `path`.
///
/// Readers either see the previous contents or the new ones, never a partial file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> RecorderResult<()> {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut temp = Builder::new()
        .prefix(".")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|err| RecorderError::storage(format!("creating temp in {}", dir.display()), err))?;
    temp.write_all(bytes)
        .and_then(|_| temp.flush())
        .map_err(|err| RecorderError::storage(format!("writing {}", path.display()), err))?;
    temp.persist(path)
        .map_err(|err| RecorderError::storage(format!("replacing {}", path.display()), err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn replaces_contents_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("status.json");

        atomic_write(&target, b"first").unwrap();
        atomic_write(&target, b"second").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"second");
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn missing_directory_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("gone").join("live.jpg");
        assert!(matches!(
            atomic_write(&target, b"x"),
            Err(RecorderError::Storage(_))
        ));
    }
}
