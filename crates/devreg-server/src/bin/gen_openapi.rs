//! Writes the OpenAPI specification to `openapi.json` in the workspace root.
//!
//! Run with: cargo run --bin gen-openapi -p devreg-server

use std::path::PathBuf;

fn main() -> anyhow::Result<()> {
    let json = devreg_server::api::get_openapi_json()?;

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let workspace_root = manifest_dir
        .parent()
        .and_then(|p| p.parent())
        .ok_or_else(|| anyhow::anyhow!("could not find workspace root"))?;
    let output_path = workspace_root.join("openapi.json");

    std::fs::write(&output_path, &json)?;
    println!("Written to: {}", output_path.display());

    let spec: serde_json::Value = serde_json::from_str(&json)?;
    if let Some(paths) = spec.get("paths").and_then(|p| p.as_object()) {
        println!("Paths: {}", paths.len());
    }
    if let Some(schemas) = spec.pointer("/components/schemas").and_then(|s| s.as_object()) {
        println!("Schemas: {}", schemas.len());
    }
    Ok(())
}
