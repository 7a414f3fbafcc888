use crate::assets::{FontAsset, FontRegistrar, default_font_assets};
use crate::compose::Composer;
use crate::debug::DebugLogger;
use crate::error::CertificateError;
use crate::extract::ExportSurface;
use crate::fields::CertificateFields;
use crate::font::FontRegistry;
use crate::pdf::{self, PdfOptions};
use crate::perf::{PerfLogger, timed};
use crate::render;
use crate::theme::LayoutTheme;
use crate::types::{CanvasSize, Size};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "Share_Certificate_SC-2025-007.pdf";

/// Everything an export needs besides the page itself.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub canvas: CanvasSize,
    pub page_size: Size,
    pub theme: LayoutTheme,
    pub font_assets: Vec<FontAsset>,
    pub asset_root: PathBuf,
    pub output_dir: PathBuf,
    pub file_name: String,
    pub compress: bool,
    pub title: Option<String>,
    pub debug_path: Option<PathBuf>,
    pub perf_path: Option<PathBuf>,
}

impl ExportOptions {
    pub fn builder() -> ExportOptionsBuilder {
        ExportOptionsBuilder::new()
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.file_name)
    }
}

pub struct ExportOptionsBuilder {
    options: ExportOptions,
}

impl Default for ExportOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ExportOptions {
                canvas: CanvasSize::CERTIFICATE,
                page_size: Size::a4(),
                theme: LayoutTheme::classic(),
                font_assets: default_font_assets(),
                asset_root: PathBuf::from("."),
                output_dir: PathBuf::from("."),
                file_name: DEFAULT_FILE_NAME.to_string(),
                compress: true,
                title: Some("Share Certificate".to_string()),
                debug_path: None,
                perf_path: None,
            },
        }
    }

    // Drawing surface size in layout units. The page scale is derived from it.
    pub fn canvas(mut self, canvas: CanvasSize) -> Self {
        self.options.canvas = canvas;
        self
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.options.page_size = size;
        self
    }

    pub fn theme(mut self, theme: LayoutTheme) -> Self {
        self.options.theme = theme;
        self
    }

    pub fn font_assets(mut self, assets: Vec<FontAsset>) -> Self {
        self.options.font_assets = assets;
        self
    }

    /// No custom fonts; text falls back to the base-14 faces and approximate widths.
    pub fn without_fonts(mut self) -> Self {
        self.options.font_assets.clear();
        self
    }

    pub fn asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.options.asset_root = root.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.output_dir = dir.into();
        self
    }

    pub fn file_name(mut self, name: impl Into<String>) -> Self {
        self.options.file_name = name.into();
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.options.compress = enabled;
        self
    }

    pub fn title(mut self, title: Option<String>) -> Self {
        self.options.title = title;
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.debug_path = Some(path.into());
        self
    }

    pub fn perf_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.perf_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<ExportOptions, CertificateError> {
        let options = self.options;
        let name = options.file_name.trim();
        if name.is_empty() || name.contains(['/', '\\']) {
            return Err(CertificateError::InvalidConfiguration(format!(
                "file name must be a plain file name, got '{}'",
                options.file_name
            )));
        }
        let canvas_ok = |v: f32| v.is_finite() && v > 0.0;
        if !canvas_ok(options.canvas.width) || !canvas_ok(options.canvas.height) {
            return Err(CertificateError::InvalidConfiguration(
                "canvas size must be positive".to_string(),
            ));
        }
        if options.page_size.width.to_f32() <= 0.0 || options.page_size.height.to_f32() <= 0.0 {
            return Err(CertificateError::InvalidConfiguration(
                "page size must be positive".to_string(),
            ));
        }
        options.theme.validate()?;
        Ok(options)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub byte_len: usize,
    /// Lowercase hex SHA-256 of the written bytes.
    pub sha256: String,
    pub font_count: usize,
}

/// Hides the trigger and a visible watermark for its lifetime. Whatever happens in between,
/// dropping the guard shows the trigger again and brings back the watermark it hid.
struct SurfaceGuard<'a> {
    surface: &'a mut dyn ExportSurface,
    restore_watermark: bool,
}

impl<'a> SurfaceGuard<'a> {
    fn engage(surface: &'a mut dyn ExportSurface) -> Self {
        surface.set_trigger_visible(false);
        let restore_watermark = surface.watermark_visible() == Some(true);
        if restore_watermark {
            surface.set_watermark_visible(false);
        }
        Self {
            surface,
            restore_watermark,
        }
    }

    fn surface(&self) -> &dyn ExportSurface {
        &*self.surface
    }
}

impl Drop for SurfaceGuard<'_> {
    fn drop(&mut self) {
        self.surface.set_trigger_visible(true);
        if self.restore_watermark {
            self.surface.set_watermark_visible(true);
        }
    }
}

/// Runs the certificate export pipeline.
pub struct Exporter {
    options: ExportOptions,
    debug: Option<DebugLogger>,
    perf: Option<PerfLogger>,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Result<Self, CertificateError> {
        let debug = match &options.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let perf = match &options.perf_path {
            Some(path) => Some(PerfLogger::new(path)?),
            None => None,
        };
        Ok(Self {
            options,
            debug,
            perf,
        })
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Fetches and registers the configured fonts. Any failure aborts the whole set.
    pub fn load_fonts(&self) -> Result<FontRegistry, CertificateError> {
        if self.options.font_assets.is_empty() {
            return Ok(FontRegistry::new());
        }
        let registrar = FontRegistrar::new(&self.options.asset_root);
        let registry = registrar.load(&self.options.font_assets)?;
        if let Some(debug) = &self.debug {
            debug.event(
                "export.fonts",
                json!({ "registered": registry.virtual_names() }),
            );
        }
        Ok(registry)
    }

    /// Composes, lowers and serializes one certificate.
    pub fn render(
        &self,
        fields: &CertificateFields,
        registry: &FontRegistry,
    ) -> Result<Vec<u8>, CertificateError> {
        let debug = self.debug.as_ref();
        let perf = self.perf.as_ref();
        let canvas = self.options.canvas;

        let composition = timed(perf, "export.compose", || {
            Composer::new(self.options.theme.clone())
                .with_registry(registry)
                .with_debug(debug)
                .compose(fields, canvas.width, canvas.height)
        });
        if let Some(debug) = debug {
            debug.event(
                "export.composed",
                json!({
                    "theme": self.options.theme.name,
                    "flow_steps": composition.flow.len(),
                    "content_bottom": composition.content_bottom(),
                }),
            );
        }

        let document = timed(perf, "export.lower", || {
            render::lower_with_logs(&composition.tree, self.options.page_size, Some(registry), debug)
        });

        let pdf_options = PdfOptions {
            compress: self.options.compress,
            title: self.options.title.clone(),
        };
        timed(perf, "export.serialize", || {
            pdf::document_to_pdf_with_logs(&document, Some(registry), &pdf_options, debug)
        })
        .map_err(|err| CertificateError::Conversion(err.to_string()))
    }

    /// The download action: hides the trigger and watermark, produces the PDF, writes it to
    /// the output directory and restores the page on every exit path.
    pub fn export(&self, page: &mut dyn ExportSurface) -> Result<ExportReport, CertificateError> {
        let result = {
            let guard = SurfaceGuard::engage(page);
            self.run(guard.surface())
        };

        if let Some(debug) = &self.debug {
            match &result {
                Ok(report) => debug.event(
                    "export.completed",
                    json!({
                        "path": report.path.display().to_string(),
                        "bytes": report.byte_len,
                        "sha256": report.sha256,
                        "fonts": report.font_count,
                    }),
                ),
                Err(err) => debug.event("export.failed", json!({ "error": err.to_string() })),
            }
            debug.emit_summary("export");
            debug.flush();
        }
        if let Some(perf) = &self.perf {
            perf.flush();
        }
        result
    }

    fn run(&self, surface: &dyn ExportSurface) -> Result<ExportReport, CertificateError> {
        let perf = self.perf.as_ref();
        let registry = timed(perf, "export.fonts", || self.load_fonts())?;
        let fields = timed(perf, "export.extract", || surface.extract_fields())?;
        let bytes = self.render(&fields, &registry)?;
        let path = self.options.output_path();
        timed(perf, "export.write", || write_output(&path, &bytes))?;
        Ok(ExportReport {
            byte_len: bytes.len(),
            sha256: sha256_hex(&bytes),
            font_count: registry.len(),
            path,
        })
    }
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), CertificateError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
