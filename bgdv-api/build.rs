//! Stamps the bgdv-api binary with the commit, build time and cargo profile
//! it was built from. `main` prints them in its startup banner.

use std::process::Command;

/// Commit the geometry validator was built from, `unknown` outside a checkout
fn git_short_hash() -> String {
    let output = match Command::new("git").args(["rev-parse", "--short=8", "HEAD"]).output() {
        Ok(output) if output.status.success() => output,
        _ => return "unknown".to_string(),
    };

    String::from_utf8(output.stdout)
        .map(|hash| hash.trim().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

fn stamp(key: &str, value: &str) {
    println!("cargo:rustc-env=BGDV_{}={}", key, value);
}

fn main() {
    stamp("GIT_HASH", &git_short_hash());
    // RFC 3339 in local time, seconds precision
    stamp(
        "BUILT_AT",
        &chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false),
    );
    stamp(
        "PROFILE",
        &std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string()),
    );
}
