//! Layering guardrails between the harness and the benchmark driver.
//!
//! The benchmark driver (`loxharness_bench`) measures in-process and shares nothing with the harness, so neither
//! manifest may list the other in `[dependencies]`.

/// Names listed in the `[dependencies]` table of a manifest.
fn main_dependencies(manifest: &str) -> Vec<String> {
    let mut in_dependencies = false;
    let mut names = Vec::new();

    for raw_line in manifest.lines() {
        let line = raw_line.trim();
        if line.starts_with('[') {
            if line == "[dependencies]" {
                in_dependencies = true;
                continue;
            }
            if in_dependencies {
                break;
            }
        }

        if !in_dependencies || line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Strip inline comments for robustness.
        let line_no_comment = line.split('#').next().unwrap_or("").trim();
        if let Some((name, _)) = line_no_comment.split_once('=') {
            names.push(name.trim().to_string());
        }
    }
    names
}

#[test]
fn harness_does_not_depend_on_bench() {
    let deps = main_dependencies(include_str!("../Cargo.toml"));
    assert!(deps.iter().any(|d| d == "wait-timeout"), "scan found no dependencies: {deps:?}");
    assert!(
        !deps.iter().any(|d| d == "loxharness_bench"),
        "`loxharness_bench` must not appear in the harness [dependencies]"
    );
}

#[test]
fn bench_does_not_depend_on_harness() {
    let deps = main_dependencies(include_str!("../crates/loxharness_bench/Cargo.toml"));
    assert!(deps.iter().any(|d| d == "clap"), "scan found no dependencies: {deps:?}");
    assert!(
        !deps.iter().any(|d| d == "loxharness"),
        "`loxharness` must not appear in the bench [dependencies]"
    );
}
