use std::path::Path;
use std::process::Command;

/// `git describe` of the workspace, e.g. `a1b2c3d` or `a1b2c3d-dirty`.
fn describe(workspace: &Path) -> Option<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(workspace)
        .args(["describe", "--always", "--dirty", "--abbrev=7"])
        .output()
        .ok()?;
    if !out.status.success() {
        return None;
    }
    let s = String::from_utf8_lossy(&out.stdout).trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    let workspace = Path::new(&manifest_dir).join("..");

    let sha = describe(&workspace).unwrap_or_else(|| "unknown".to_string());
    println!("cargo:rustc-env=TASKMATE_BUILD_SHA={sha}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
