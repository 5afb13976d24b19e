//! チャートレンダラ
//!
//! チャートは `<charts_dir>/<chart>/templates/` ディレクトリで、各ファイルがTeraテンプレートです。
//! 各ファイルは同名のバンドルエントリに展開されます。
//! `_` で始まるファイルはパーシャル（他のテンプレートから読み込むだけで出力しない）です。

use heck::ToShoutySnakeCase;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use tfrestore_core::{RenderError, RenderedBundle, TemplateContext, TemplateRenderer};
use tracing::{debug, info};

/// チャート内のテンプレートディレクトリ
pub const TEMPLATES_DIR: &str = "templates";

const PARTIAL_PREFIX: char = '_';

/// ディスク上のチャートを展開するレンダラ
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    charts_dir: PathBuf,
}

impl ChartRenderer {
    pub fn new(charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            charts_dir: charts_dir.into(),
        }
    }

    pub fn charts_dir(&self) -> &Path {
        &self.charts_dir
    }

    /// チャートのディレクトリ
    pub fn chart_dir(&self, chart: &str) -> PathBuf {
        self.charts_dir.join(chart)
    }

    /// チャートのテンプレートファイル（名前順）
    pub fn template_files(&self, chart: &str) -> Result<Vec<PathBuf>, RenderError> {
        let templates_dir = self.chart_dir(chart).join(TEMPLATES_DIR);
        if !templates_dir.is_dir() {
            return Err(RenderError::ChartNotFound(self.chart_dir(chart)));
        }

        let pattern = templates_dir.join("*");
        let entries = glob::glob(&pattern.to_string_lossy()).map_err(|e| {
            RenderError::Template {
                file: templates_dir.display().to_string(),
                message: e.to_string(),
            }
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RenderError::Io(e.into()))?;
            let hidden = file_name(&path).is_none_or(|name| name.starts_with('.'));
            if path.is_file() && !hidden {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn load(&self, chart: &str) -> Result<(Tera, Vec<String>), RenderError> {
        let mut tera = Tera::default();
        tera.register_filter("shouty_snake_case", shouty_snake_case);

        let mut outputs = Vec::new();
        for path in self.template_files(chart)? {
            let Some(name) = file_name(&path).map(str::to_string) else {
                continue;
            };
            let content = std::fs::read_to_string(&path)?;
            tera.add_raw_template(&name, &content)
                .map_err(|e| RenderError::Template {
                    file: name.clone(),
                    message: tera_error_detail(&e),
                })?;
            debug!(file = %name, "Loaded template");

            if !name.starts_with(PARTIAL_PREFIX) {
                outputs.push(name);
            }
        }
        Ok((tera, outputs))
    }
}

impl TemplateRenderer for ChartRenderer {
    #[tracing::instrument(skip(self, context), fields(charts_dir = %self.charts_dir.display()))]
    fn render(
        &self,
        chart: &str,
        namespace: &str,
        context: &TemplateContext,
    ) -> Result<RenderedBundle, RenderError> {
        let (tera, outputs) = self.load(chart)?;

        let mut tera_context = Context::new();
        for (key, value) in context {
            tera_context.insert(key.as_str(), value);
        }
        tera_context.insert("release", &json!({ "name": chart, "namespace": namespace }));

        let mut bundle = RenderedBundle::new();
        for name in outputs {
            let rendered = tera
                .render(&name, &tera_context)
                .map_err(|e| RenderError::Template {
                    file: name.clone(),
                    message: tera_error_detail(&e),
                })?;
            bundle.insert(name, rendered);
        }

        info!(
            files = bundle.file_names().count(),
            "Rendered chart"
        );
        Ok(bundle)
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// `{{ key | shouty_snake_case }}`: `accessKeyID` → `ACCESS_KEY_ID`
fn shouty_snake_case(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let s = value
        .as_str()
        .ok_or_else(|| tera::Error::msg("shouty_snake_case expects a string"))?;
    Ok(Value::String(s.to_shouty_snake_case()))
}

/// Teraのエラーチェーンを1つのメッセージにまとめる
///
/// 未定義変数は変数名で報告する。
fn tera_error_detail(e: &tera::Error) -> String {
    use std::error::Error;

    let mut details = vec![e.to_string()];
    let mut source = e.source();
    while let Some(err) = source {
        details.push(err.to_string());
        source = err.source();
    }
    let full_error = details.join(" | ");

    if let Some(start) = full_error.find("Variable `")
        && let Some(end) = full_error[start..].find("` not found")
    {
        let var_name = &full_error[start + "Variable `".len()..start + end];
        return format!("undefined variable `{}`", var_name);
    }

    if full_error.contains("Filter") && full_error.contains("not found") {
        return format!("undefined filter: {}", full_error);
    }

    full_error
}
