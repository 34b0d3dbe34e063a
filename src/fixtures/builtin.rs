//! Embedded conformance suite.
//!
//! Golden text follows the reference clox interpreter: `print` output is newline terminated, compile errors are
//! reported as `[line N] Error...` lines and exit with 65, runtime errors print the message followed by a
//! `[line N] in script` trace and exit with 70.
//!
//! Scripts live under `lox_scripts/`, one directory per group; the root group sits directly in it.

use std::path::PathBuf;

use super::{FixtureGroup, FixtureStore, ROOT_GROUP, SCRIPT_EXTENSION, TestCase};

/// Exit code for a clean run.
pub const EXIT_OK: i32 = 0;
/// Exit code for a compile (scan/parse) error.
pub const EXIT_COMPILE_ERROR: i32 = 65;
/// Exit code for a runtime error.
pub const EXIT_RUNTIME_ERROR: i32 = 70;

/// Default scripts root, relative to the repository.
pub const SCRIPTS_ROOT: &str = "lox_scripts";

#[derive(Clone, Copy)]
struct Golden {
    name: &'static str,
    stdout: &'static str,
    stderr: &'static str,
    exit: i32,
    skip: Option<&'static str>,
}

const fn ok(name: &'static str, stdout: &'static str) -> Golden {
    Golden {
        name,
        stdout,
        stderr: "",
        exit: EXIT_OK,
        skip: None,
    }
}

const fn compile_error(name: &'static str, stderr: &'static str) -> Golden {
    Golden {
        name,
        stdout: "",
        stderr,
        exit: EXIT_COMPILE_ERROR,
        skip: None,
    }
}

const fn runtime_error(name: &'static str, stderr: &'static str) -> Golden {
    Golden {
        name,
        stdout: "",
        stderr,
        exit: EXIT_RUNTIME_ERROR,
        skip: None,
    }
}

const fn unimplemented(golden: Golden, reason: &'static str) -> Golden {
    Golden {
        skip: Some(reason),
        ..golden
    }
}

const NOT_CALLABLE: &str = "Can only call functions and classes.\n[line 1] in script\n";

const ROOT: &[Golden] = &[
    ok("empty_file", ""),
    ok("precedence", "14\n8\n4\n0\ntrue\ntrue\ntrue\n0\n0\n0\n0\n4\n"),
    compile_error("unexpected_character", "[line 3] Error: Unexpected character.\n"),
];

const ASSIGNMENT: &[Golden] = &[
    ok("associativity", "c\nc\nc\n"),
    ok("global", "before\nafter\narg\narg\n"),
    compile_error("grouping", "[line 2] Error at '=': Invalid assignment target.\n"),
    compile_error("infix_operator", "[line 3] Error at '=': Invalid assignment target.\n"),
    ok("local", "before\nafter\narg\narg\n"),
    compile_error("prefix_operator", "[line 2] Error at '=': Invalid assignment target.\n"),
    ok("syntax", "var\nvar\n"),
    runtime_error("undefined", "Undefined variable 'unknown'.\n[line 1] in script\n"),
];

const BLOCK: &[Golden] = &[ok("empty", "ok\n"), ok("scope", "inner\nouter\n")];

const BOOL: &[Golden] = &[
    ok(
        "equality",
        "true\nfalse\nfalse\ntrue\n\
         false\nfalse\nfalse\nfalse\nfalse\n\
         false\ntrue\ntrue\nfalse\n\
         true\ntrue\ntrue\ntrue\ntrue\n",
    ),
    ok("not", "false\ntrue\ntrue\n"),
];

const CALL: &[Golden] = &[
    runtime_error("bool", NOT_CALLABLE),
    runtime_error("nil", NOT_CALLABLE),
    runtime_error("num", NOT_CALLABLE),
    unimplemented(
        runtime_error("object", "Can only call functions and classes.\n[line 4] in script\n"),
        "classes are not implemented by the target",
    ),
    runtime_error("string", NOT_CALLABLE),
];

const COMMENTS: &[Golden] = &[
    ok("line_at_eof", "ok\n"),
    ok("only_line_comment", ""),
    ok("unicode", "ok\n"),
];

const GROUPS: &[(&str, &[Golden])] = &[
    (ROOT_GROUP, ROOT),
    ("assignment", ASSIGNMENT),
    ("block", BLOCK),
    ("bool", BOOL),
    ("call", CALL),
    ("comments", COMMENTS),
];

pub(super) fn suite() -> FixtureStore {
    let groups = GROUPS
        .iter()
        .map(|(group, goldens)| FixtureGroup {
            name: (*group).to_string(),
            cases: goldens.iter().map(|g| to_case(group, g)).collect(),
        })
        .collect();
    FixtureStore::new(groups)
}

fn to_case(group: &str, golden: &Golden) -> TestCase {
    let file = format!("{}.{}", golden.name, SCRIPT_EXTENSION);
    let script_path = if group == ROOT_GROUP {
        PathBuf::from(file)
    } else {
        PathBuf::from(group).join(file)
    };

    TestCase {
        group: group.to_string(),
        name: golden.name.to_string(),
        script_path,
        expected_stdout: golden.stdout.to_string(),
        expected_stderr: golden.stderr.to_string(),
        expected_exit: Some(golden.exit),
        skip: golden.skip.map(str::to_string),
    }
}
