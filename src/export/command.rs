//! External HTML-to-PDF converter

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::renderer::{DocumentRenderer, RenderMetadata, RenderedPage, assemble_html};
use crate::config::ExportConfig;
use crate::error::RenderError;
use crate::types::ExportFormat;

/// Binary looked up in `PATH` when no command is configured
pub const DEFAULT_PDF_COMMAND: &str = "wkhtmltopdf";

/// Renderer that pipes the assembled HTML document through an external
/// converter
///
/// The converter is invoked as `<binary> <args...> - -`, reading HTML from
/// stdin and writing the PDF to stdout.
///
/// # Examples
///
/// ```no_run
/// use wiki_export::export::CommandRenderer;
/// use std::path::PathBuf;
///
/// let renderer =
///     CommandRenderer::new(PathBuf::from("/usr/bin/wkhtmltopdf"), vec!["--quiet".into()]);
///
/// // Or auto-discover from PATH
/// let renderer = CommandRenderer::from_path(Vec::new());
/// ```
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    binary_path: PathBuf,
    args: Vec<String>,
}

impl CommandRenderer {
    /// Create a renderer with an explicit binary path
    pub fn new(binary_path: PathBuf, args: Vec<String>) -> Self {
        Self { binary_path, args }
    }

    /// Attempt to find the default converter in `PATH`
    pub fn from_path(args: Vec<String>) -> Option<Self> {
        which::which(DEFAULT_PDF_COMMAND)
            .ok()
            .map(|path| Self::new(path, args))
    }

    /// Use the configured converter, falling back to a `PATH` lookup
    pub fn from_config(config: &ExportConfig) -> Option<Self> {
        match &config.pdf_command {
            Some(path) => Some(Self::new(path.clone(), config.pdf_args.clone())),
            None => Self::from_path(config.pdf_args.clone()),
        }
    }

    /// Path of the converter binary
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }
}

#[async_trait]
impl DocumentRenderer for CommandRenderer {
    async fn render(
        &self,
        pages: &[RenderedPage],
        format: ExportFormat,
        meta: &RenderMetadata,
    ) -> Result<Vec<u8>, RenderError> {
        if !self.supports(format) {
            return Err(RenderError::Unsupported(format.to_string()));
        }

        let html = assemble_html(pages, meta);
        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .arg("-")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                RenderError::Tool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?;

        // stdin is fed while stdout is drained; both pipes have bounded buffers
        let writer = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                stdin.write_all(html.as_bytes()).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await.map_err(|e| {
            RenderError::Tool(format!(
                "Failed to wait for {}: {}",
                self.binary_path.display(),
                e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RenderError::Tool(format!(
                "{} exited with {}: {}",
                self.binary_path.display(),
                output.status,
                stderr.trim()
            )));
        }

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    return Err(RenderError::Tool(format!("Failed to send document: {}", e)));
                }
                Err(e) => {
                    return Err(RenderError::Tool(format!("Document writer failed: {}", e)));
                }
            }
        }

        if output.stdout.is_empty() {
            return Err(RenderError::Tool(format!(
                "{} produced no output",
                self.binary_path.display()
            )));
        }

        tracing::debug!(
            tool = %self.binary_path.display(),
            pages = pages.len(),
            bytes = output.stdout.len(),
            "External renderer finished"
        );

        Ok(output.stdout)
    }

    fn supports(&self, format: ExportFormat) -> bool {
        format == ExportFormat::Pdf
    }

    fn name(&self) -> &'static str {
        "command"
    }
}
