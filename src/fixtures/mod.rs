//! Fixture store: golden test cases grouped by language feature area.
//!
//! A fixture pairs a Lox script (relative to a scripts root) with the exact stdout and stderr the target
//! interpreter must emit for it. Goldens come from one of two places:
//!
//! - [`FixtureStore::builtin`]: the embedded suite in [`builtin`], golden text inlined as string literals.
//! - [`FixtureStore::load_dir`]: sibling golden files next to each script on disk.
//!
//! ## Golden file layout
//!
//! For `<dir>/<name>.lox`:
//!
//! - `<name>.out` (required) expected stdout; scripts without it are not fixtures
//! - `<name>.err` expected stderr, empty when absent
//! - `<name>.code` expected exit code
//! - `<name>.skip` marks the fixture as statically excluded; the file content is the reason
//!
//! The group is the script's parent directory relative to the root. Scripts directly under the root belong to
//! [`ROOT_GROUP`].

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod builtin;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Group name for scripts that sit directly under the scripts root.
pub const ROOT_GROUP: &str = "root";

/// Extension of Lox source scripts.
pub const SCRIPT_EXTENSION: &str = "lox";

/// Errors raised while looking up or loading fixtures.
#[derive(Debug, Error, Diagnostic)]
pub enum FixtureError {
    #[error("no fixture named '{name}' in group '{group}'")]
    #[diagnostic(
        code(loxharness::fixture::not_found),
        help("run `loxharness list -g {group}` to see the fixtures in this group")
    )]
    NotFound { group: String, name: String },

    #[error("unknown fixture group '{0}'")]
    #[diagnostic(code(loxharness::fixture::unknown_group), help("run `loxharness list` to see all groups"))]
    UnknownGroup(String),

    #[error("cannot read golden file '{}'", .path.display())]
    #[diagnostic(code(loxharness::fixture::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' does not hold an exit code: {value:?}", .path.display())]
    #[diagnostic(code(loxharness::fixture::bad_exit_code), help("the file must contain a single integer"))]
    InvalidExitCode { path: PathBuf, value: String },

    #[error("no fixtures found under '{}'", .0.display())]
    #[diagnostic(
        code(loxharness::fixture::empty),
        help("each script needs a sibling `<name>.out` golden file to become a fixture")
    )]
    Empty(PathBuf),
}

/// One golden test case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    pub group: String,
    pub name: String,
    /// Script location relative to the scripts root
    pub script_path: PathBuf,
    pub expected_stdout: String,
    pub expected_stderr: String,
    /// Exit code the interpreter is expected to return, when recorded
    pub expected_exit: Option<i32>,
    /// Reason for a static exclusion; skipped cases are never executed
    pub skip: Option<String>,
}

impl TestCase {
    /// Qualified identifier, `group::name`, or the bare name for the root group.
    pub fn id(&self) -> String {
        if self.group == ROOT_GROUP {
            self.name.clone()
        } else {
            format!("{}::{}", self.group, self.name)
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip.is_some()
    }
}

/// Fixtures for one feature area.
#[derive(Debug, Clone)]
pub struct FixtureGroup {
    pub name: String,
    pub cases: Vec<TestCase>,
}

/// Case selection applied before a run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Only cases in this group
    pub group: Option<String>,
    /// Only cases whose id contains this keyword
    pub keyword: Option<String>,
}

/// Read-only collection of fixture groups.
#[derive(Debug, Clone, Default)]
pub struct FixtureStore {
    groups: Vec<FixtureGroup>,
}

impl FixtureStore {
    pub fn new(groups: Vec<FixtureGroup>) -> Self {
        Self { groups }
    }

    /// The embedded suite.
    pub fn builtin() -> Self {
        builtin::suite()
    }

    /// Discover fixtures from sibling golden files under `root`.
    pub fn load_dir(root: &Path) -> Result<Self, FixtureError> {
        let mut by_dir: BTreeMap<String, Vec<TestCase>> = BTreeMap::new();

        for script in discover_scripts(root)? {
            let Some(case) = load_case(root, &script)? else {
                tracing::debug!(script = %script.display(), "no .out golden, not a fixture");
                continue;
            };
            let dir = script_dir_key(root, &script);
            by_dir.entry(dir).or_default().push(case);
        }

        if by_dir.is_empty() {
            return Err(FixtureError::Empty(root.to_path_buf()));
        }

        let groups = by_dir
            .into_iter()
            .map(|(dir, cases)| FixtureGroup {
                name: group_name(&dir),
                cases,
            })
            .collect();
        Ok(Self { groups })
    }

    pub fn groups(&self) -> &[FixtureGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Result<&FixtureGroup, FixtureError> {
        self.groups
            .iter()
            .find(|g| g.name == name)
            .ok_or_else(|| FixtureError::UnknownGroup(name.to_string()))
    }

    /// Look up a case by group and name.
    pub fn get(&self, group: &str, name: &str) -> Result<&TestCase, FixtureError> {
        self.group(group)?
            .cases
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FixtureError::NotFound {
                group: group.to_string(),
                name: name.to_string(),
            })
    }

    /// All cases, in group order.
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        self.groups.iter().flat_map(|g| g.cases.iter())
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.cases.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cases matching `selection`, in store order.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&TestCase>, FixtureError> {
        let candidates: Vec<&TestCase> = match &selection.group {
            Some(group) => self.group(group)?.cases.iter().collect(),
            None => self.iter().collect(),
        };

        Ok(candidates
            .into_iter()
            .filter(|c| selection.keyword.as_deref().is_none_or(|k| c.id().contains(k)))
            .collect())
    }
}

/// Recursively collect `.lox` scripts under `path`, sorted.
fn discover_scripts(path: &Path) -> Result<Vec<PathBuf>, FixtureError> {
    let mut scripts = Vec::new();
    let entries = fs::read_dir(path).map_err(|source| FixtureError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let entry_path = entry.path();
        let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if entry_path.is_dir() {
            if !name.starts_with('.') {
                scripts.extend(discover_scripts(&entry_path)?);
            }
        } else if entry_path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION) {
            scripts.push(entry_path);
        }
    }

    scripts.sort();
    Ok(scripts)
}

fn load_case(root: &Path, script: &Path) -> Result<Option<TestCase>, FixtureError> {
    let Some(expected_stdout) = read_optional(&script.with_extension("out"))? else {
        return Ok(None);
    };
    let expected_stderr = read_optional(&script.with_extension("err"))?.unwrap_or_default();

    let code_path = script.with_extension("code");
    let expected_exit = match read_optional(&code_path)? {
        Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| FixtureError::InvalidExitCode {
            path: code_path.clone(),
            value: raw.trim().to_string(),
        })?),
        None => None,
    };

    let skip = read_optional(&script.with_extension("skip"))?.map(|reason| reason.trim().to_string());

    let name = script
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let script_path = script.strip_prefix(root).unwrap_or(script).to_path_buf();

    Ok(Some(TestCase {
        group: group_name(&script_dir_key(root, script)),
        name,
        script_path,
        expected_stdout,
        expected_stderr,
        expected_exit,
        skip,
    }))
}

fn read_optional(path: &Path) -> Result<Option<String>, FixtureError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(FixtureError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parent directory of `script` relative to `root`, `/`-separated; empty for the root itself.
fn script_dir_key(root: &Path, script: &Path) -> String {
    let rel = script.strip_prefix(root).unwrap_or(script);
    rel.parent()
        .map(|p| {
            p.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default()
}

fn group_name(dir_key: &str) -> String {
    if dir_key.is_empty() {
        ROOT_GROUP.to_string()
    } else {
        dir_key.to_string()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_get_known_case() {
        let store = FixtureStore::builtin();
        let case = store.get("bool", "not").unwrap();
        assert_eq!(case.expected_stdout, "false\ntrue\ntrue\n");
        assert_eq!(case.script_path, Path::new("bool/not.lox"));
    }

    #[test]
    fn test_get_unknown_name_is_not_found() {
        let store = FixtureStore::builtin();
        let err = store.get("bool", "nope").unwrap_err();
        assert!(matches!(err, FixtureError::NotFound { ref group, ref name } if group == "bool" && name == "nope"));
    }

    #[test]
    fn test_get_unknown_group() {
        let store = FixtureStore::builtin();
        assert!(matches!(store.get("classes", "empty"), Err(FixtureError::UnknownGroup(_))));
    }

    #[test]
    fn test_case_id() {
        let store = FixtureStore::builtin();
        assert_eq!(store.get("call", "nil").unwrap().id(), "call::nil");
        assert_eq!(store.get(ROOT_GROUP, "precedence").unwrap().id(), "precedence");
    }

    #[test]
    fn test_select_by_group_and_keyword() {
        let store = FixtureStore::builtin();
        let selection = Selection {
            group: Some("assignment".to_string()),
            keyword: Some("operator".to_string()),
        };
        let ids: Vec<String> = store.select(&selection).unwrap().iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["assignment::infix_operator", "assignment::prefix_operator"]);
    }

    #[test]
    fn test_select_keyword_spans_groups() {
        let store = FixtureStore::builtin();
        let selection = Selection {
            group: None,
            keyword: Some("bool".to_string()),
        };
        let ids: Vec<String> = store.select(&selection).unwrap().iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["bool::equality", "bool::not", "call::bool"]);
    }

    #[test]
    fn test_load_dir_reads_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "empty_file.lox", "");
        write(root, "empty_file.out", "");
        write(root, "block/scope.lox", "print 1;");
        write(root, "block/scope.out", "1\n");
        write(root, "block/scope.code", "0\n");
        write(root, "call/object.lox", "class Foo {}");
        write(root, "call/object.out", "");
        write(root, "call/object.err", "Can only call functions and classes.\n[line 4] in script\n");
        write(root, "call/object.skip", "classes unimplemented\n");
        write(root, "call/notes.lox", "// no golden");

        let store = FixtureStore::load_dir(root).unwrap();
        let names: Vec<&str> = store.groups().iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, [ROOT_GROUP, "block", "call"]);
        assert_eq!(store.len(), 3);

        let scope = store.get("block", "scope").unwrap();
        assert_eq!(scope.expected_stdout, "1\n");
        assert_eq!(scope.expected_stderr, "");
        assert_eq!(scope.expected_exit, Some(0));
        assert_eq!(scope.script_path, Path::new("block").join("scope.lox"));

        let object = store.get("call", "object").unwrap();
        assert_eq!(object.skip.as_deref(), Some("classes unimplemented"));
        assert!(object.expected_stderr.ends_with("in script\n"));
        assert!(store.get("call", "notes").is_err());
    }

    #[test]
    fn test_load_dir_rejects_bad_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.lox", "");
        write(dir.path(), "a.out", "");
        write(dir.path(), "a.code", "sixty-five");
        assert!(matches!(
            FixtureStore::load_dir(dir.path()),
            Err(FixtureError::InvalidExitCode { ref value, .. }) if value == "sixty-five"
        ));
    }

    #[test]
    fn test_load_dir_without_goldens_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.lox", "print 1;");
        assert!(matches!(FixtureStore::load_dir(dir.path()), Err(FixtureError::Empty(_))));
    }

    #[test]
    fn test_load_dir_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".cache/a.lox", "");
        write(dir.path(), ".cache/a.out", "");
        write(dir.path(), "b.lox", "");
        write(dir.path(), "b.out", "");
        let store = FixtureStore::load_dir(dir.path()).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.get(ROOT_GROUP, "b").is_ok());
    }
}
