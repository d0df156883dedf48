//! Data-root confinement: every input file must canonicalize to a path
//! strictly below the configured root. Symlinks pointing out of the
//! root fail the check because both sides are canonicalized first.

use std::path::{Path, PathBuf};

use xena_core::{Error, Result};

pub fn confine(root: &Path, file: &Path) -> Result<PathBuf> {
    let root = root
        .canonicalize()
        .map_err(|e| Error::input(format!("data root {}: {e}", root.display())))?;
    let file = file
        .canonicalize()
        .map_err(|e| Error::input(format!("input {}: {e}", file.display())))?;
    if file != root && file.starts_with(&root) {
        Ok(file)
    } else {
        Err(Error::input(format!(
            "input {} is outside the data root {}",
            file.display(),
            root.display()
        )))
    }
}
