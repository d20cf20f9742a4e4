//! Environment readiness check.

use crate::browser::chromium::find_chromium;
use anyhow::Result;
use std::process::Command;

/// Check Chromium availability and report overall readiness.
pub async fn run() -> Result<()> {
    println!("fbevents Doctor");
    println!("===============");
    println!();

    let os = std::env::consts::OS;
    let arch = std::env::consts::ARCH;
    println!("OS:   {os}");
    println!("Arch: {arch}");
    println!();

    let chromium_path = find_chromium();
    match &chromium_path {
        Some(path) => {
            println!("[OK] Chromium found: {}", path.display());
            match Command::new(path).arg("--version").output() {
                Ok(output) if output.status.success() => {
                    let version = String::from_utf8_lossy(&output.stdout);
                    println!("[OK] Version: {}", version.trim());
                }
                _ => println!("[??] Could not determine Chromium version"),
            }
        }
        None => {
            println!("[!!] Chromium NOT found.");
            println!("     Install google-chrome or chromium, or set FBEVENTS_CHROMIUM_PATH.");
        }
    }

    println!();
    if chromium_path.is_some() {
        println!("Status: READY");
    } else {
        println!("Status: NOT READY");
    }

    Ok(())
}
