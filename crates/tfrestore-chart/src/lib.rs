//! チャート展開機能
//!
//! Teraを使用して [`tfrestore_core::TemplateRenderer`] を実装します。
//! チャートは普通のディレクトリなので `tfrestore render` でオフライン展開できます。

pub mod renderer;

pub use renderer::{ChartRenderer, TEMPLATES_DIR};
