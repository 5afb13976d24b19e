use anyhow::Context;
use colored::Colorize;
use serde_json::Value;
use std::path::Path;
use tfrestore_core::state;

/// 保存済みステートをデコードし、terraformステートの概要を表示
pub fn handle(path: &Path) -> anyhow::Result<()> {
    let blob = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let raw = state::decode(Some(blob.as_slice()))
        .with_context(|| format!("failed to decode {}", path.display()))?;

    println!("{} {}", "State".green().bold(), path.display().to_string().cyan());
    if raw.is_empty() {
        println!("  empty (next restore starts from scratch)");
        return Ok(());
    }
    println!("  size: {} bytes", raw.len());

    let Ok(doc) = serde_json::from_slice::<Value>(raw.as_bytes()) else {
        println!("  {}", "not a JSON terraform state".yellow());
        return Ok(());
    };

    for key in ["version", "terraform_version", "serial", "lineage"] {
        if let Some(value) = doc.get(key) {
            println!("  {}: {}", key, display(value));
        }
    }

    let resources = doc
        .get("resources")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    println!("  resources: {}", resources.len());
    for resource in resources {
        let kind = resource.get("type").map(display).unwrap_or_default();
        let name = resource.get("name").map(display).unwrap_or_default();
        let data = match resource.get("mode").and_then(Value::as_str) {
            Some("data") => "data.",
            _ => "",
        };
        println!("    - {}{}.{}", data, kind, name);
    }

    let outputs = doc.get("outputs").and_then(Value::as_object);
    if let Some(outputs) = outputs.filter(|o| !o.is_empty()) {
        println!("  outputs:");
        for (name, output) in outputs {
            let sensitive = output.get("sensitive").and_then(Value::as_bool) == Some(true);
            let value = if sensitive {
                "<sensitive>".to_string()
            } else {
                output.get("value").map(display).unwrap_or_default()
            };
            println!("    {} = {}", name.cyan(), value);
        }
    }

    Ok(())
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
