use std::{
    fs::{self, canonicalize},
    path::PathBuf,
};

use anyhow::{Context, Result};
use metadata::{DetectionRecord, Settings, Vocabulary};
use schemars::schema_for;

const VSCODE_DIR: &str = "../.vscode";

fn main() -> Result<()> {
    let vscode_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(VSCODE_DIR);
    fs::create_dir_all(&vscode_dir)?;
    let vscode_dir = canonicalize(vscode_dir).context("定位 .vscode 目录失败")?;

    let vocabulary_schema = serde_json::to_string_pretty(&schema_for!(Vocabulary))?;
    fs::write(vscode_dir.join("vocabulary.schema.json"), vocabulary_schema)?;

    let settings_schema = serde_json::to_string_pretty(&schema_for!(Settings))?;
    fs::write(vscode_dir.join("settings.schema.json"), settings_schema)?;

    let records_schema = serde_json::to_string_pretty(&schema_for!(Vec<DetectionRecord>))?;
    fs::write(vscode_dir.join("records.schema.json"), records_schema)?;
    Ok(())
}
