//! Build stamp for the gemlens-ai binary
//!
//! Exposes GIT_HASH, BUILD_TIMESTAMP and BUILD_PROFILE to `env!`. The hash
//! carries a `-dirty` suffix for uncommitted trees. SOURCE_DATE_EPOCH, when
//! set, pins the timestamp so packaged builds are reproducible.

use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, SecondsFormat, Utc};

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn build_time() -> DateTime<Utc> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

fn main() {
    let hash = git(&["describe", "--always", "--dirty", "--abbrev=8", "--exclude=*"])
        .unwrap_or_else(|| "unknown".into());
    let built = build_time().to_rfc3339_opts(SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into());

    println!("cargo:rustc-env=GIT_HASH={hash}");
    println!("cargo:rustc-env=BUILD_TIMESTAMP={built}");
    println!("cargo:rustc-env=BUILD_PROFILE={profile}");

    // Restamp when HEAD moves or the pinned epoch changes
    println!("cargo:rerun-if-env-changed=SOURCE_DATE_EPOCH");
    if let Some(git_dir) = git(&["rev-parse", "--absolute-git-dir"]) {
        let git_dir = PathBuf::from(git_dir);
        println!("cargo:rerun-if-changed={}", git_dir.join("HEAD").display());
        println!("cargo:rerun-if-changed={}", git_dir.join("index").display());
    } else {
        println!("cargo:rerun-if-changed=build.rs");
    }
}
