//! Build script for discoverfm.
//!
//! Copies the `.env.example` configuration template into the local data
//! directory, where the binary looks for its `.env`:
//! - Linux: `~/.local/share/discoverfm/.env.example`
//! - macOS: `~/Library/Application Support/discoverfm/.env.example`
//! - Windows: `%LOCALAPPDATA%/discoverfm/.env.example`
//!
//! A missing template only produces a cargo warning.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let env_example_path = manifest_dir.join(".env.example");

    let mut out_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    out_dir.push("discoverfm");
    fs::create_dir_all(&out_dir)?;

    if env_example_path.is_file() {
        fs::copy(&env_example_path, out_dir.join(".env.example"))?;
    } else {
        println!(
            "cargo:warning=.env.example not found at {}",
            env_example_path.display()
        );
    }

    Ok(())
}
