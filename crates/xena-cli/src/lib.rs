#![forbid(unsafe_code)]

//! File-side collaborators of the engine: format detection, the TSV /
//! probemap / clinical readers that produce [`xena_model::MatrixSource`]
//! values, test-data synthesis and the data-root confinement check. The
//! engine itself never touches files; everything here stays on the CLI
//! side of that boundary.

pub mod confine;
pub mod detect;
pub mod probemap;
pub mod synth;
pub mod tsv;

pub const CRATE_NAME: &str = "xena-cli";
