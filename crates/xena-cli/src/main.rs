// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xena_cli::{confine::confine, detect::detect, synth::test_matrix};
use xena_loader::write_matrix;
use xena_store::{Db, DbOptions};

#[derive(Parser, Debug)]
#[command(name = "xena", version, about = "Xena dataset loader")]
struct Cli {
    /// Database file.
    #[arg(short = 'd', long = "db", default_value = "xena.db")]
    db: PathBuf,
    /// Treat input files as probemaps.
    #[arg(short = 'p', long = "probemap", default_value_t = false)]
    probemap: bool,
    /// Reload even when sources are unchanged.
    #[arg(short = 'f', long = "force", default_value_t = false)]
    force: bool,
    /// Directory inputs must live under.
    #[arg(short = 'r', long = "root", default_value = ".")]
    root: PathBuf,
    /// Synthesize a test dataset: NAME SAMPLES PROBES.
    #[arg(short = 't', long = "test-data", num_args = 3, value_names = ["NAME", "SAMPLES", "PROBES"])]
    test_data: Option<Vec<String>>,
    /// Delete the named dataset instead of loading.
    #[arg(long = "delete")]
    delete: Option<String>,
    /// Drop source rows no dataset references.
    #[arg(long = "clean-sources", default_value_t = false)]
    clean_sources: bool,
    /// Matrix files to load.
    files: Vec<PathBuf>,
}

fn load_synthetic(db: &Db, args: &[String]) -> Result<(), String> {
    let name = &args[0];
    let samples: usize = args[1]
        .parse()
        .map_err(|_| format!("bad sample count `{}`", args[1]))?;
    let probes: usize = args[2]
        .parse()
        .map_err(|_| format!("bad probe count `{}`", args[2]))?;
    let data = test_matrix(name, samples, probes);
    let result = write_matrix(
        db,
        name,
        &data.sources,
        &serde_json::json!({"type": "genomicMatrix"}),
        data.matrix,
        None,
        true,
    )
    .map_err(|e| e.to_string())?;
    info!(dataset = name.as_str(), rows = result.rows, "synthesized test data");
    Ok(())
}

fn load_file(db: &Db, cli: &Cli, file: &PathBuf) -> Result<(), String> {
    let path = confine(&cli.root, file).map_err(|e| e.to_string())?;
    let detected = detect(&path, cli.probemap).map_err(|e| e.to_string())?;
    info!(
        file = %path.display(),
        kind = detected.file_type.as_str(),
        "loading"
    );
    let mut metadata = detected.metadata;
    if metadata.get("type").is_none() {
        metadata["type"] = serde_json::Value::String(detected.file_type.as_str().to_string());
    }
    let result = write_matrix(
        db,
        &detected.dataset_name,
        &detected.sources,
        &metadata,
        detected.reader,
        None,
        cli.force,
    )
    .map_err(|e| e.to_string())?;
    info!(
        dataset = detected.dataset_name.as_str(),
        rows = result.rows,
        warnings = result.warnings.len(),
        "loaded"
    );
    for warning in &result.warnings {
        error!(dataset = detected.dataset_name.as_str(), warning = warning.as_str());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let db = match Db::open(&cli.db, DbOptions::default()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("cannot open database {}: {e}", cli.db.display());
            return ExitCode::from(1);
        }
    };

    if let Some(args) = &cli.test_data {
        if let Err(message) = load_synthetic(&db, args) {
            eprintln!("test data: {message}");
            return ExitCode::from(1);
        }
    }

    if let Some(name) = &cli.delete {
        if let Err(e) = xena_loader::delete_matrix(&db, name) {
            eprintln!("delete {name}: {e}");
            return ExitCode::from(1);
        }
    }

    // Per-file failures are reported and skipped; a batch load carries
    // on and still exits zero.
    for file in &cli.files {
        if let Err(message) = load_file(&db, &cli, file) {
            eprintln!("{}: {message}", file.display());
        }
    }

    if cli.clean_sources {
        let removed = db
            .pool()
            .get()
            .and_then(|conn| xena_store::clean_sources(&conn));
        match removed {
            Ok(n) => info!(removed = n, "cleaned unreferenced sources"),
            Err(e) => {
                eprintln!("clean-sources: {e}");
                return ExitCode::from(1);
            }
        }
    }

    db.close();
    ExitCode::SUCCESS
}
