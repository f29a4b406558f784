//! Sandbox path resolution
//!
//! Every path a tool touches is produced here:
//! - Lexical normalization of `.` and `..` against the sandbox root
//! - Canonicalization of the deepest existing ancestor (symlinks resolved)
//! - Containment check on the canonical form, never on the raw string
//!
//! Handlers receive a [`SandboxPath`] and never do their own path arithmetic.

use crate::errors::{AgentError, Result};
use crate::tools::types::ToolError;
use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A path validated to lie within the sandbox root
///
/// Only [`SandboxResolver::resolve`] can construct one. It is recomputed on
/// every tool call and never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxPath {
    absolute: PathBuf,
    relative: PathBuf,
}

impl SandboxPath {
    /// Absolute path inside the sandbox
    pub fn as_path(&self) -> &Path {
        &self.absolute
    }

    /// Path relative to the sandbox root (empty for the root itself)
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    /// Whether this is the sandbox root
    pub fn is_root(&self) -> bool {
        self.relative.as_os_str().is_empty()
    }

    /// Root-relative name used in tool messages
    pub fn display_name(&self) -> String {
        if self.is_root() {
            ".".to_string()
        } else {
            self.relative().to_string_lossy().into_owned()
        }
    }
}

impl AsRef<Path> for SandboxPath {
    fn as_ref(&self) -> &Path {
        &self.absolute
    }
}

/// Resolves requested paths against a fixed sandbox root
#[derive(Debug, Clone)]
pub struct SandboxResolver {
    /// Canonicalized sandbox root directory
    root: PathBuf,
}

impl SandboxResolver {
    /// Create resolver for an existing root directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();

        if !root.is_dir() {
            return Err(AgentError::ConfigError(format!(
                "Sandbox root is not a directory: {}",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            AgentError::ConfigError(format!("Failed to canonicalize sandbox root: {}", e))
        })?;

        Ok(Self { root })
    }

    /// Canonical sandbox root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `requested` to a path guaranteed to be the root or below it
    ///
    /// ```text
    /// R = canonical root, p = requested
    /// c = normalize(R / p)            (lexical: ., .. collapsed)
    /// a = deepest existing ancestor of c, t = remaining tail
    ///     (a dangling symlink met on the way is replaced by its target)
    /// accept  ⟺  canonical(a) = R ∨ canonical(a) ∈ Subtree(R)
    /// result  = canonical(a) / t
    /// ```
    ///
    /// The tail contains only normal components that do not exist yet, so
    /// it cannot introduce a symlink or a parent hop.
    pub fn resolve(&self, requested: &str) -> std::result::Result<SandboxPath, ToolError> {
        if requested.trim().is_empty() {
            return Err(ToolError::InvalidPath {
                path: requested.to_string(),
                reason: "path is empty".to_string(),
            });
        }

        if requested.chars().any(char::is_control) {
            return Err(ToolError::InvalidPath {
                path: requested.escape_debug().to_string(),
                reason: "path contains a control character".to_string(),
            });
        }

        let candidate = normalize_lexically(&self.root.join(requested));

        let (canonical, tail) = split_existing(&candidate).map_err(|err| match err {
            SplitError::LinkLoop => ToolError::InvalidPath {
                path: requested.to_string(),
                reason: "too many levels of symbolic links".to_string(),
            },
            SplitError::Unreadable => ToolError::InvalidPath {
                path: requested.to_string(),
                reason: "path cannot be inspected".to_string(),
            },
            SplitError::NoAncestor => ToolError::PathEscape {
                path: requested.to_string(),
            },
        })?;

        if !canonical.starts_with(&self.root) {
            debug!(requested, resolved = %canonical.display(), "rejected path outside sandbox");
            return Err(ToolError::PathEscape {
                path: requested.to_string(),
            });
        }

        let mut absolute = canonical;
        for part in tail.iter().rev() {
            absolute.push(part);
        }

        let relative = absolute
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .map_err(|_| ToolError::PathEscape {
                path: requested.to_string(),
            })?;

        Ok(SandboxPath { absolute, relative })
    }
}

/// Collapse `.` and `..` without touching the filesystem
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }

    out
}

/// Symlink hops followed before giving up (Linux `MAXSYMLINKS`)
const MAX_LINK_HOPS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitError {
    LinkLoop,
    Unreadable,
    NoAncestor,
}

/// Split into (canonical deepest existing ancestor, missing tail in reverse order)
///
/// A dangling symlink is replaced by its target and the walk continues from
/// there, so the caller checks containment on where the link points.
fn split_existing(path: &Path) -> std::result::Result<(PathBuf, Vec<OsString>), SplitError> {
    let mut current = path.to_path_buf();
    let mut tail = Vec::new();
    let mut hops = 0;

    loop {
        if let Ok(canonical) = fs::canonicalize(&current) {
            return Ok((canonical, tail));
        }

        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_LINK_HOPS {
                    return Err(SplitError::LinkLoop);
                }

                let target = fs::read_link(&current).map_err(|_| SplitError::Unreadable)?;
                let base = current.parent().map(Path::to_path_buf).unwrap_or_default();
                debug!(link = %current.display(), target = %target.display(), "following dangling symlink");
                current = normalize_lexically(&base.join(target));
            }
            Ok(_) => return Err(SplitError::Unreadable),
            Err(_) => {
                let name = current.file_name().ok_or(SplitError::NoAncestor)?.to_os_string();
                tail.push(name);

                if !current.pop() {
                    return Err(SplitError::NoAncestor);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolCallRequest, ToolRuntime};
    use quickcheck::TestResult;
    use quickcheck_macros::quickcheck;

    fn setup_test_sandbox() -> (SandboxResolver, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let resolver = SandboxResolver::new(temp_dir.path()).unwrap();
        (resolver, temp_dir)
    }

    #[test]
    fn test_resolver_creation_nonexistent() {
        let resolver = SandboxResolver::new("/nonexistent/path/12345");
        assert!(resolver.is_err());
    }

    #[test]
    fn test_resolve_existing_file() {
        let (resolver, temp_dir) = setup_test_sandbox();
        fs::write(temp_dir.path().join("test.txt"), "test").unwrap();

        let path = resolver.resolve("test.txt").unwrap();
        assert!(path.as_path().starts_with(resolver.root()));
        assert_eq!(path.relative(), Path::new("test.txt"));
        assert_eq!(path.display_name(), "test.txt");
    }

    #[test]
    fn test_resolve_root_itself() {
        let (resolver, _temp_dir) = setup_test_sandbox();

        for requested in [".", "./", "a/..", "./a/b/../.."] {
            let path = resolver.resolve(requested).unwrap();
            assert!(path.is_root(), "{} should resolve to root", requested);
            assert_eq!(path.as_path(), resolver.root());
        }
    }

    #[test]
    fn test_resolve_nonexistent_nested_path() {
        let (resolver, _temp_dir) = setup_test_sandbox();

        let path = resolver.resolve("new/dir/file.txt").unwrap();
        assert_eq!(path.as_path(), resolver.root().join("new/dir/file.txt"));
    }

    #[test]
    fn test_reject_parent_directory_escape() {
        let (resolver, _temp_dir) = setup_test_sandbox();

        let result = resolver.resolve("../../etc/passwd");
        assert!(matches!(result, Err(ToolError::PathEscape { .. })));
    }

    #[test]
    fn test_reject_sibling_prefix_escape() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("code");
        let sibling = temp_dir.path().join("code2");
        fs::create_dir(&root).unwrap();
        fs::create_dir(&sibling).unwrap();
        fs::write(sibling.join("secret.txt"), "x").unwrap();

        let resolver = SandboxResolver::new(&root).unwrap();
        let result = resolver.resolve("../code2/secret.txt");
        assert!(matches!(result, Err(ToolError::PathEscape { .. })));
    }

    #[test]
    fn test_absolute_paths() {
        let (resolver, temp_dir) = setup_test_sandbox();
        let inside = temp_dir.path().join("inside.txt");
        fs::write(&inside, "x").unwrap();

        assert!(resolver.resolve(inside.to_str().unwrap()).is_ok());
        assert!(matches!(
            resolver.resolve("/etc/passwd"),
            Err(ToolError::PathEscape { .. })
        ));
    }

    #[test]
    fn test_reject_empty_and_control_characters() {
        let (resolver, _temp_dir) = setup_test_sandbox();

        for requested in ["", "   ", "a\0b", "line\nbreak", "tab\there"] {
            let result = resolver.resolve(requested);
            assert!(
                matches!(result, Err(ToolError::InvalidPath { .. })),
                "{:?} should be invalid",
                requested
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_reject_symlink_escape() {
        let (resolver, temp_dir) = setup_test_sandbox();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();

        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("link")).unwrap();

        assert!(matches!(
            resolver.resolve("link/secret.txt"),
            Err(ToolError::PathEscape { .. })
        ));
        assert!(matches!(
            resolver.resolve("link/new.txt"),
            Err(ToolError::PathEscape { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_reject_dangling_symlink() {
        let (resolver, temp_dir) = setup_test_sandbox();
        let outside = tempfile::tempdir().unwrap();

        std::os::unix::fs::symlink(
            outside.path().join("not-yet.txt"),
            temp_dir.path().join("dangling"),
        )
        .unwrap();

        assert!(matches!(
            resolver.resolve("dangling"),
            Err(ToolError::PathEscape { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_inside_root_follows_target() {
        let (resolver, temp_dir) = setup_test_sandbox();
        fs::create_dir(temp_dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink("real/later.txt", temp_dir.path().join("pending")).unwrap();

        let path = resolver.resolve("pending").unwrap();
        assert_eq!(path.relative(), Path::new("real/later.txt"));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_is_invalid_path() {
        let (resolver, temp_dir) = setup_test_sandbox();
        std::os::unix::fs::symlink("b", temp_dir.path().join("a")).unwrap();
        std::os::unix::fs::symlink("a", temp_dir.path().join("b")).unwrap();

        match resolver.resolve("a") {
            Err(ToolError::InvalidPath { reason, .. }) => assert!(reason.contains("symbolic links")),
            other => panic!("expected invalid path, got {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_within_sandbox_allowed() {
        let (resolver, temp_dir) = setup_test_sandbox();
        fs::create_dir(temp_dir.path().join("real")).unwrap();
        fs::write(temp_dir.path().join("real/file.txt"), "x").unwrap();
        std::os::unix::fs::symlink(temp_dir.path().join("real"), temp_dir.path().join("alias"))
            .unwrap();

        let path = resolver.resolve("alias/file.txt").unwrap();
        assert_eq!(path.relative(), Path::new("real/file.txt"));
    }

    #[test]
    fn test_security_multiple_escape_attempts() {
        let (resolver, _temp_dir) = setup_test_sandbox();

        let escape_attempts = vec![
            "../../../etc/passwd",
            "../../..",
            "./../../../",
            "..",
            "/etc/passwd",
            "/tmp/../etc/passwd",
            "subdir/../../..",
        ];

        for attempt in escape_attempts {
            let result = resolver.resolve(attempt);
            assert!(
                matches!(result, Err(ToolError::PathEscape { .. })),
                "Escape attempt should fail: {}",
                attempt
            );
        }
    }

    #[quickcheck]
    fn prop_resolved_paths_stay_in_sandbox(segments: Vec<String>) -> bool {
        let (resolver, _temp_dir) = setup_test_sandbox();
        let requested = segments.join("/");

        match resolver.resolve(&requested) {
            Ok(path) => path.as_path().starts_with(resolver.root()),
            Err(_) => true,
        }
    }

    #[quickcheck]
    fn prop_parent_hops_past_root_escape(depth: u8) -> bool {
        let (resolver, _temp_dir) = setup_test_sandbox();
        let hops = "../".repeat(depth as usize % 8 + 1);

        matches!(
            resolver.resolve(&format!("{}etc/passwd", hops)),
            Err(ToolError::PathEscape { .. })
        )
    }

    #[quickcheck]
    fn prop_write_then_read_returns_content(segments: Vec<String>, content: String) -> TestResult {
        let parts: Vec<String> = segments
            .iter()
            .map(|s| s.chars().filter(char::is_ascii_alphanumeric).take(12).collect::<String>())
            .filter(|s| !s.is_empty())
            .take(4)
            .collect();
        if parts.is_empty() || content.len() > crate::tools::types::DEFAULT_MAX_OUTPUT_BYTES {
            return TestResult::discard();
        }
        let path = format!("{}.txt", parts.join("/"));

        let temp_dir = tempfile::tempdir().unwrap();
        let runtime = ToolRuntime::new(temp_dir.path()).unwrap();

        let written = runtime.execute(&ToolCallRequest::new(
            "write_file",
            serde_json::json!({"path": path, "content": content}),
        ));
        if !written.is_success() {
            return TestResult::error(format!("write of {} failed: {:?}", path, written.error()));
        }

        let read = runtime.execute(&ToolCallRequest::new("read_file", serde_json::json!({"path": path})));
        match read.output() {
            Some(output) => TestResult::from_bool(!output.truncated && output.content == content),
            None => TestResult::error(format!("read of {} failed: {:?}", path, read.error())),
        }
    }
}
