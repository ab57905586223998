use std::process::Command;

/// Short commit hash from git, or `GIT_SHA` for builds outside a checkout
fn commit_sha() -> Option<String> {
    let from_git = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .map(|out| String::from_utf8_lossy(&out.stdout).trim().to_string());

    from_git
        .or_else(|| std::env::var("GIT_SHA").ok())
        .filter(|sha| !sha.is_empty())
}

fn main() {
    let mut version = env!("CARGO_PKG_VERSION").to_string();

    // Development builds carry the commit so field units can be traced back
    let dev_build = std::env::var("LFP_BMS_DEV_BUILD")
        .is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if dev_build {
        version.push_str("-dev");
        if let Some(sha) = commit_sha() {
            version.push('+');
            version.push_str(&sha);
        }
    }

    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=LFP_BMS_DEV_BUILD");
    println!("cargo:rerun-if-env-changed=GIT_SHA");
    println!("cargo:rerun-if-changed=.git/HEAD");
}
