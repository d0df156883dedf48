#![forbid(unsafe_code)]

pub mod bins;
pub mod codec;
pub mod error;
pub mod hash;

pub use crate::codec::{SEGMENT_BYTES, SEGMENT_SIZE};
pub use crate::error::{Error, Result};
pub use crate::hash::{hash_file, sha256_hex};

pub const CRATE_NAME: &str = "xena-core";
