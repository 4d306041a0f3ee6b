//! Reading the message body for the command-line tools

use std::io::Read;

use crate::error::{FanpostError, Result};

/// Content from the argument, or all of stdin when absent or `-`
///
/// A single trailing newline from stdin is dropped.
pub fn read_content(arg: Option<&str>) -> Result<String> {
    read_content_from(arg, std::io::stdin())
}

/// Like [`read_content`], reading from `reader` instead of stdin
pub fn read_content_from<R: Read>(arg: Option<&str>, mut reader: R) -> Result<String> {
    match arg {
        Some(content) if content != "-" => Ok(content.to_string()),
        _ => {
            let mut buffer = String::new();
            reader
                .read_to_string(&mut buffer)
                .map_err(|e| FanpostError::InvalidInput(format!("Failed to read stdin: {}", e)))?;

            if let Some(stripped) = buffer.strip_suffix('\n') {
                let stripped = stripped.strip_suffix('\r').unwrap_or(stripped);
                buffer.truncate(stripped.len());
            }
            Ok(buffer)
        }
    }
}
