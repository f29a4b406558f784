//! Filesystem tool implementations
//!
//! Implements sandboxed filesystem operations:
//! - read_file: Read file contents, truncated past the output threshold
//! - write_file: Write content, creating parent directories
//! - list_directory: List directory contents, optionally recursive
//!
//! All paths arrive already resolved; nothing here joins or normalizes paths
//! received from the model.

use crate::tools::registry::ToolArgs;
use crate::tools::security::SandboxPath;
use crate::tools::types::{ToolContext, ToolError, ToolOutput};
use std::fs;
use std::io::Read;
use std::path::Path;

/// Read file contents
///
/// # Bounds
/// - At most `max_output_bytes` are read; the rest is reported in a
///   truncation marker
/// - Content must be UTF-8
pub fn read_file(args: &ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
    let path = args.path("path")?;
    let name = path.display_name();
    let io_err = |e: std::io::Error| ToolError::from_io("read", &name, &e);

    let file = fs::File::open(path.as_path()).map_err(io_err)?;
    let metadata = file.metadata().map_err(io_err)?;

    if !metadata.is_file() {
        return Err(ToolError::ToolIo {
            message: format!("Failed to read {}: not a regular file", name),
        });
    }

    let limit = context.max_output_bytes as u64;
    let mut bytes = Vec::new();
    file.take(limit).read_to_end(&mut bytes).map_err(io_err)?;

    let content = decode_prefix(bytes, metadata.len() > limit).ok_or_else(|| ToolError::ToolIo {
        message: format!("Failed to read {}: file is not valid UTF-8 text", name),
    })?;

    Ok(ToolOutput::bounded_with_total(
        content,
        context.max_output_bytes,
        Some(metadata.len()),
    ))
}

/// Decode UTF-8, tolerating a multi-byte char split at the end of a prefix
fn decode_prefix(bytes: Vec<u8>, is_prefix: bool) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(err) => {
            let utf8 = err.utf8_error();
            if is_prefix && utf8.error_len().is_none() {
                let valid = utf8.valid_up_to();
                let mut bytes = err.into_bytes();
                bytes.truncate(valid);
                String::from_utf8(bytes).ok()
            } else {
                None
            }
        }
    }
}

/// Write file contents
///
/// Overwrites existing files. Missing parent directories are created; the
/// resolver guarantees they lie under the sandbox root.
pub fn write_file(args: &ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
    let path = args.path("path")?;
    let content = args.text("content")?;
    let name = path.display_name();

    if content.len() > context.max_write_bytes {
        return Err(ToolError::Argument {
            message: format!(
                "content too large: {} bytes (max: {} bytes)",
                content.len(),
                context.max_write_bytes
            ),
        });
    }

    if path.is_root() {
        return Err(ToolError::ToolIo {
            message: "Failed to write .: path is a directory".to_string(),
        });
    }

    if let Some(parent) = path.as_path().parent() {
        fs::create_dir_all(parent)
            .map_err(|e| ToolError::from_io("create parent directory for", &name, &e))?;
    }

    fs::write(path.as_path(), content).map_err(|e| ToolError::from_io("write", &name, &e))?;

    Ok(ToolOutput::new(format!(
        "Successfully wrote {} bytes to {}",
        content.len(),
        name
    )))
}

/// List directory contents
///
/// Symlinks are listed but never followed when recursing.
pub fn list_directory(args: &ToolArgs, context: &ToolContext) -> Result<ToolOutput, ToolError> {
    let path = args.path("path")?;
    let recursive = args.flag("recursive");
    let name = path.display_name();

    let metadata = fs::metadata(path.as_path()).map_err(|e| ToolError::from_io("list", &name, &e))?;
    if !metadata.is_dir() {
        return Err(ToolError::ToolIo {
            message: format!("Failed to list {}: not a directory", name),
        });
    }

    let mut entries = Vec::new();
    let listed = if recursive {
        list_recursive_helper(path, path.as_path(), &mut entries)
    } else {
        list_single_level(path.as_path(), &mut entries)
    };
    listed.map_err(|e| ToolError::from_io("list", &name, &e))?;

    entries.sort();

    let output = if entries.is_empty() {
        format!("{} is empty", name)
    } else {
        entries.join("\n")
    };

    Ok(ToolOutput::bounded(output, context.max_output_bytes))
}

fn entry_label(file_type: &fs::FileType) -> &'static str {
    if file_type.is_symlink() {
        "LINK"
    } else if file_type.is_dir() {
        "DIR"
    } else if file_type.is_file() {
        "FILE"
    } else {
        "OTHER"
    }
}

/// List single level directory
fn list_single_level(dir: &Path, entries: &mut Vec<String>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = entry.file_type()?;
        let suffix = if file_type.is_dir() { "/" } else { "" };

        entries.push(format!("{:<5} {}{}", entry_label(&file_type), name, suffix));
    }

    Ok(())
}

fn list_recursive_helper(
    base: &SandboxPath,
    current: &Path,
    entries: &mut Vec<String>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let relative = path.strip_prefix(base.as_path()).unwrap_or(&path);
        let name = relative.to_string_lossy().to_string();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            entries.push(format!("{:<5} {}/", entry_label(&file_type), name));
            list_recursive_helper(base, &path, entries)?;
        } else {
            entries.push(format!("{:<5} {}", entry_label(&file_type), name));
        }
    }

    Ok(())
}
