use crate::descriptor;
use crate::pipeline;
use anyhow::Context;
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

/// 適用せずにチャートを展開
pub async fn handle(
    descriptor_path: &Path,
    config_path: Option<&Path>,
    output_dir: Option<&Path>,
) -> anyhow::Result<ExitCode> {
    let config = pipeline::load_config(config_path)?;
    let descriptor = descriptor::load(descriptor_path)?;
    let restorer = pipeline::build_restorer(&config);

    let rendered = match restorer.render(&descriptor).await {
        Ok(rendered) => rendered,
        Err(err) => {
            eprintln!("{} {}", "✗".red().bold(), err);
            return Ok(ExitCode::FAILURE);
        }
    };

    println!(
        "{} {} ({})",
        "Rendered".green().bold(),
        restorer.options().chart.cyan(),
        descriptor.id
    );
    println!("  region: {}", rendered.config.region);
    println!("  credentials: {}", rendered.credentials.keys().collect::<Vec<_>>().join(", "));
    println!("  files:");
    for (name, content) in rendered.bundle.files() {
        println!("    - {} ({} bytes)", name.cyan(), content.len());
    }
    println!("  fingerprint: {}", rendered.bundle.fingerprint());

    if let Some(dir) = output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (name, content) in rendered.bundle.files() {
            let path = dir.join(name);
            std::fs::write(&path, content)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        println!("  written to: {}", dir.display().to_string().cyan());
    }

    Ok(ExitCode::SUCCESS)
}
