use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use crate::config::{CommandTemplate, WorkerConfig};
use crate::error::WorkerError;
use crate::worker::{run_isolated, PageExtractor};

const TEXT_OPERATION: &str = "text extraction";
const RENDER_OPERATION: &str = "raster render";

/// [`PageExtractor`] that shells out to external tools, poppler's
/// `pdftotext` and `pdftoppm` by default.
///
/// Every call gets its own scratch directory, removed when the call returns.
pub struct SubprocessExtractor {
    text_command: CommandTemplate,
    render_command: CommandTemplate,
    timeout: Duration,
}

impl SubprocessExtractor {
    pub fn new(
        text_command: CommandTemplate,
        render_command: CommandTemplate,
        timeout: Duration,
    ) -> Self {
        Self {
            text_command,
            render_command,
            timeout,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(
            config.text_command.clone(),
            config.render_command.clone(),
            config.timeout(),
        )
    }

    fn scratch(&self, page: &[u8]) -> Result<(TempDir, PathBuf), WorkerError> {
        let dir = tempfile::Builder::new()
            .prefix("labelpool-page-")
            .tempdir()
            .map_err(|e| WorkerError::Io {
                path: std::env::temp_dir(),
                source: e,
            })?;
        let input = dir.path().join("page.pdf");
        std::fs::write(&input, page).map_err(|e| WorkerError::Io {
            path: input.clone(),
            source: e,
        })?;
        Ok((dir, input))
    }
}

/// Substitutes `{input}`, `{output}` and `{dpi}` in a command template.
pub fn expand_args(
    template: &CommandTemplate,
    input: &Path,
    output: Option<&Path>,
    dpi: Option<u32>,
) -> Vec<String> {
    let input = input.to_string_lossy();
    let output = output.map(|p| p.to_string_lossy().into_owned());
    let dpi = dpi.map(|d| d.to_string());

    template
        .args
        .iter()
        .map(|arg| {
            let mut arg = arg.replace("{input}", &input);
            if let Some(ref output) = output {
                arg = arg.replace("{output}", output);
            }
            if let Some(ref dpi) = dpi {
                arg = arg.replace("{dpi}", dpi);
            }
            arg
        })
        .collect()
}

fn scale_to_dpi(scale: f32) -> u32 {
    (scale * 72.0).round().max(1.0) as u32
}

/// Checks that the renderer produced a decodable, non-empty PNG.
fn check_png(bytes: &[u8]) -> Result<(), WorkerError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| WorkerError::Render(e.to_string()))?;
    if reader.format() != Some(image::ImageFormat::Png) {
        return Err(WorkerError::Render("renderer did not produce a PNG".to_string()));
    }
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| WorkerError::Render(e.to_string()))?;
    if width == 0 || height == 0 {
        return Err(WorkerError::Render("rendered image is empty".to_string()));
    }
    Ok(())
}

#[async_trait]
impl PageExtractor for SubprocessExtractor {
    async fn extract_text(&self, page: &[u8]) -> Result<String, WorkerError> {
        let (_dir, input) = self.scratch(page)?;
        let args = expand_args(&self.text_command, &input, None, None);
        let stdout = run_isolated(
            TEXT_OPERATION,
            &self.text_command.program,
            &args,
            self.timeout,
        )
        .await?;
        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    async fn render_raster(&self, page: &[u8], scale: f32) -> Result<Vec<u8>, WorkerError> {
        let (dir, input) = self.scratch(page)?;
        let output = dir.path().join("raster");
        let args = expand_args(
            &self.render_command,
            &input,
            Some(&output),
            Some(scale_to_dpi(scale)),
        );
        run_isolated(
            RENDER_OPERATION,
            &self.render_command.program,
            &args,
            self.timeout,
        )
        .await?;

        // pdftoppm appends the extension to the output root; other tools may
        // write the path verbatim.
        let produced = [output.with_extension("png"), output.clone()]
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| WorkerError::Render("renderer produced no output file".to_string()))?;
        let bytes = std::fs::read(&produced).map_err(|e| WorkerError::Io {
            path: produced.clone(),
            source: e,
        })?;
        check_png(&bytes)?;
        Ok(bytes)
    }
}
