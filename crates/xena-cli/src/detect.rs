// SPDX-License-Identifier: Apache-2.0

//! Format detection. A cgdata sidecar (`<file>.json`) decides the type
//! when present and contributes metadata; otherwise the `-p` flag or a
//! sniff of the first data line does. Detection reads the file once
//! (the bytes are needed for the content hash anyway) and hands back a
//! deferred reader, so parsing only happens when the loader decides the
//! source set changed.

use std::fmt::{Display, Formatter};
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use xena_core::{sha256_hex, Error, Result};
use xena_model::{MatrixSource, SourceFile};

use crate::probemap::probemap_source;
use crate::tsv::{clinical_matrix_source, genomic_matrix_source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    GenomicMatrix,
    ClinicalMatrix,
    Probemap,
}

impl FileType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GenomicMatrix => "genomicMatrix",
            Self::ClinicalMatrix => "clinicalMatrix",
            Self::Probemap => "probeMap",
        }
    }
}

impl Display for FileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct Detected {
    pub file_type: FileType,
    pub dataset_name: String,
    pub sources: Vec<SourceFile>,
    pub metadata: serde_json::Value,
    pub reader: MatrixSource,
}

fn source_entry(path: &Path, bytes: &[u8]) -> Result<SourceFile> {
    let mtime = fs::metadata(path)?
        .modified()?
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::Io(e.to_string()))?
        .as_millis() as i64;
    Ok(SourceFile::new(
        path.to_string_lossy().into_owned(),
        mtime,
        sha256_hex(bytes),
    ))
}

/// More non-numeric than numeric cells in the first data line reads as
/// a clinical matrix.
fn sniff_matrix_kind(text: &str) -> FileType {
    let Some(line) = text.lines().filter(|l| !l.trim().is_empty()).nth(1) else {
        return FileType::GenomicMatrix;
    };
    let cells: Vec<&str> = line.split('\t').skip(1).collect();
    let numeric = cells
        .iter()
        .filter(|c| c.trim().parse::<f64>().is_ok())
        .count();
    if numeric * 2 < cells.len() {
        FileType::ClinicalMatrix
    } else {
        FileType::GenomicMatrix
    }
}

pub fn detect(path: &Path, probemap_flag: bool) -> Result<Detected> {
    let bytes = fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let mut sources = vec![source_entry(path, &bytes)?];

    // Sidecar metadata, cgdata style: "<file>.json" next to the matrix.
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(".json");
    let sidecar = Path::new(&sidecar);
    let metadata = if sidecar.is_file() {
        let sidecar_bytes = fs::read(sidecar)?;
        sources.push(source_entry(sidecar, &sidecar_bytes)?);
        let parsed: serde_json::Value = serde_json::from_slice(&sidecar_bytes)
            .map_err(|e| Error::input(format!("bad sidecar {}: {e}", sidecar.display())))?;
        if !parsed.is_object() {
            return Err(Error::input(format!(
                "sidecar {} is not a JSON object",
                sidecar.display()
            )));
        }
        parsed
    } else {
        serde_json::Value::Object(serde_json::Map::new())
    };

    let file_type = match metadata.get("type").and_then(|t| t.as_str()) {
        Some("probeMap") => FileType::Probemap,
        Some("clinicalMatrix") => FileType::ClinicalMatrix,
        Some("genomicMatrix") => FileType::GenomicMatrix,
        Some(other) => {
            return Err(Error::input(format!(
                "unrecognized dataset type `{other}` in {}",
                sidecar.display()
            )))
        }
        None if probemap_flag => FileType::Probemap,
        None => sniff_matrix_kind(&text),
    };

    let reader = match file_type {
        FileType::GenomicMatrix => genomic_matrix_source(text),
        FileType::ClinicalMatrix => clinical_matrix_source(text),
        FileType::Probemap => probemap_source(text),
    };
    Ok(Detected {
        file_type,
        dataset_name: path.to_string_lossy().into_owned(),
        sources,
        metadata,
        reader,
    })
}
