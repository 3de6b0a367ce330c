//! In-memory assembly of the copy function's deployment package.
//!
//! The handler source is embedded at compile time and zipped on demand;
//! nothing is written to disk.

use std::io::{Cursor, Write};

use thiserror::Error;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

const HANDLER_SOURCE: &str = include_str!("../assets/copy_handler.py");

/// File name the handler is packaged under.
pub const HANDLER_FILE: &str = "copy_handler.py";
/// Entry point passed to the function-creation call.
pub const HANDLER_ENTRY_POINT: &str = "copy_handler.handler";
/// Runtime the packaged handler targets.
pub const HANDLER_RUNTIME: &str = "python3.12";

/// Raised when the package cannot be assembled.
#[derive(Debug, Error)]
#[error("failed to assemble function package: {message}")]
pub struct PayloadError {
    message: String,
}

impl PayloadError {
    fn new(err: impl std::fmt::Display) -> Self {
        Self {
            message: err.to_string(),
        }
    }
}

/// Builds the zipped deployment package.
///
/// # Errors
///
/// Returns [`PayloadError`] when the archive cannot be written.
pub fn build_function_package() -> Result<Vec<u8>, PayloadError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file(HANDLER_FILE, SimpleFileOptions::default())
        .map_err(PayloadError::new)?;
    writer
        .write_all(HANDLER_SOURCE.as_bytes())
        .map_err(PayloadError::new)?;
    let cursor = writer.finish().map_err(PayloadError::new)?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    #[test]
    fn package_is_a_zip_archive() {
        let package = build_function_package().expect("package should build");
        assert!(package.starts_with(b"PK"), "missing zip signature");
    }

    #[test]
    fn package_contains_the_handler() {
        let package = build_function_package().expect("package should build");
        let mut archive =
            ZipArchive::new(Cursor::new(package)).expect("package should be readable");
        let mut entry = archive
            .by_name(HANDLER_FILE)
            .expect("handler entry should exist");
        let mut source = String::new();
        entry
            .read_to_string(&mut source)
            .expect("handler should be utf8");
        assert!(source.contains("def handler"), "handler entry point missing");
        assert!(source.contains("TARGET_BUCKET"), "target bucket env missing");
    }
}
