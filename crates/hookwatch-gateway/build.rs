use std::env;
use std::process::Command;

const SHA_VAR: &str = "HOOKWATCH_GIT_SHA";

/// Version suffix for `--version`: an explicit `HOOKWATCH_GIT_SHA` (release
/// builds from a source tarball) wins over what git reports.
fn main() {
    println!("cargo:rerun-if-env-changed={SHA_VAR}");

    let sha = env::var(SHA_VAR)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| git(&["describe", "--always", "--dirty", "--abbrev=8"]))
        .unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env={SHA_VAR}={}", sha.trim());

    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        println!("cargo:rerun-if-changed={git_dir}/HEAD");
        println!("cargo:rerun-if-changed={git_dir}/index");
    }
}

fn git(args: &[&str]) -> Option<String> {
    let out = Command::new("git").args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}
