mod assets;
mod canvas;
mod compose;
mod debug;
mod draw;
mod error;
mod export;
mod extract;
mod fields;
mod font;
mod pdf;
mod pdfinspect;
mod perf;
mod render;
mod svg;
mod text;
mod theme;
mod types;

pub use assets::{FontAsset, FontRegistrar, default_font_assets};
pub use canvas::{Canvas, Command, Document};
pub use compose::{Composer, Composition, FlowBlock, FlowStep, compose, strip_svg_wrapper};
pub use draw::{
    DrawNode, DrawTree, FontSpec, GradientStop, LinearGradient, Paint, Point, Stroke, TextAnchor,
    TextBlock, TextRun, Transform,
};
pub use error::CertificateError;
pub use export::{DEFAULT_FILE_NAME, ExportOptions, ExportOptionsBuilder, ExportReport, Exporter};
pub use extract::{
    ExportSurface, FIELD_SELECTORS, FieldSource, HIDDEN_CLASS, HtmlSource, SEAL_SELECTOR,
    StaticPage, TRIGGER_ID, WATERMARK_ID, toggle_watermark,
};
pub use fields::{CertificateFields, DetailRow};
pub use font::{FontRegistry, FontVariant, font_key};
pub use pdf::{PdfOptions, document_to_pdf};
pub use pdfinspect::{
    PdfInspectError, PdfInspectErrorCode, PdfInspectReport, inspect_pdf_bytes, inspect_pdf_path,
    require_readable_certificate,
};
pub use render::lower;
pub use text::{
    FALLBACK_CHAR_RATIO, Measurer, fallback_width, measure_tracked_width, tracking_offsets,
    wrap_text_to_width,
};
pub use theme::{
    AccentTriangle, Accents, FontFamilies, FrameGeometry, LayoutTheme, Offset, Palette, Spacing,
    ThemeStop, ThemeVariant, TypeScale,
};
pub use types::{CanvasSize, Color, Pt, Shading, ShadingStop, Size};

/// Renders `fields` with the classic theme and no custom fonts into PDF bytes.
pub fn render_certificate(fields: &CertificateFields) -> Result<Vec<u8>, CertificateError> {
    let options = ExportOptions::builder().without_fonts().build()?;
    Exporter::new(options)?.render(fields, &FontRegistry::new())
}
