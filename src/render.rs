use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::draw::{
    DrawNode, DrawTree, FontSpec, Paint, Point, Stroke, TextAnchor, TextBlock, TextRun,
};
use crate::font::{FontRegistry, FontVariant};
use crate::svg::{self, CompiledItem, CompiledText};
use crate::text::Measurer;
use crate::types::{Pt, Size};
use serde_json::json;

/// Lowers a draw tree onto one page of `page_size`, scaling canvas units to points per axis.
pub fn lower(tree: &DrawTree, page_size: Size, registry: Option<&FontRegistry>) -> Document {
    lower_with_logs(tree, page_size, registry, None)
}

pub(crate) fn lower_with_logs(
    tree: &DrawTree,
    page_size: Size,
    registry: Option<&FontRegistry>,
    debug: Option<&DebugLogger>,
) -> Document {
    let measurer = match registry {
        Some(registry) => Measurer::with_registry(registry),
        None => Measurer::approximate(),
    }
    .with_debug(debug);

    let mut lowering = Lowering {
        canvas: Canvas::new(page_size),
        tree,
        measurer,
        debug,
    };

    let sx = axis_scale(page_size.width, tree.width);
    let sy = axis_scale(page_size.height, tree.height);
    lowering.canvas.save_state();
    lowering
        .canvas
        .concat_matrix(sx, 0.0, 0.0, sy, Pt::ZERO, Pt::ZERO);
    lowering.nodes(&tree.nodes);
    lowering.canvas.restore_state();

    if let Some(debug) = debug {
        debug.event(
            "render.lowered",
            json!({
                "nodes": tree.nodes.len(),
                "commands": lowering.canvas.command_count(),
                "scale": [sx, sy],
            }),
        );
    }
    lowering.canvas.finish()
}

fn axis_scale(page: Pt, canvas: f32) -> f32 {
    if canvas > 0.0 && canvas.is_finite() {
        page.to_f32() / canvas
    } else {
        1.0
    }
}

/// PDF font name for `font`: the registry key when a program is registered, otherwise the
/// closest base-14 face.
pub(crate) fn font_resource_name(font: &FontSpec, registry: Option<&FontRegistry>) -> String {
    let variant = font.variant();
    if let Some(registered) = registry.and_then(|r| r.resolve(&font.family, variant)) {
        return registered.key.clone();
    }
    base14_name(&font.family, variant).to_string()
}

fn base14_name(family: &str, variant: FontVariant) -> &'static str {
    let family = family.to_ascii_lowercase();
    let (bold, italic) = (variant.is_bold(), variant.is_italic());
    if family.contains("mono") || family.contains("courier") {
        return match (bold, italic) {
            (false, false) => "Courier",
            (true, false) => "Courier-Bold",
            (false, true) => "Courier-Oblique",
            (true, true) => "Courier-BoldOblique",
        };
    }
    let serif = family.contains("serif") && !family.contains("sans");
    if serif || family.contains("garamond") || family.contains("times") {
        return match (bold, italic) {
            (false, false) => "Times-Roman",
            (true, false) => "Times-Bold",
            (false, true) => "Times-Italic",
            (true, true) => "Times-BoldItalic",
        };
    }
    match (bold, italic) {
        (false, false) => "Helvetica",
        (true, false) => "Helvetica-Bold",
        (false, true) => "Helvetica-Oblique",
        (true, true) => "Helvetica-BoldOblique",
    }
}

/// Restores the namespaces the seal fragment lost with its root element.
fn wrap_markup(fragment: &str) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" xmlns:xlink=\"http://www.w3.org/1999/xlink\">{}</svg>",
        fragment
    )
}

struct Lowering<'t, 'm> {
    canvas: Canvas,
    tree: &'t DrawTree,
    measurer: Measurer<'m>,
    debug: Option<&'m DebugLogger>,
}

impl Lowering<'_, '_> {
    fn nodes(&mut self, nodes: &[DrawNode]) {
        for node in nodes {
            self.node(node);
        }
    }

    fn node(&mut self, node: &DrawNode) {
        match node {
            DrawNode::Rect {
                x,
                y,
                width,
                height,
                fill,
                stroke,
            } => {
                if let (Paint::Solid(color), None) = (fill, stroke) {
                    self.canvas.set_fill_color(*color);
                    self.canvas.draw_rect(
                        Pt::from_f32(*x),
                        Pt::from_f32(*y),
                        Pt::from_f32(*width),
                        Pt::from_f32(*height),
                    );
                    return;
                }
                let points = [
                    Point::new(*x, *y),
                    Point::new(x + width, *y),
                    Point::new(x + width, y + height),
                    Point::new(*x, y + height),
                ];
                self.shape(&points, fill, stroke.as_ref());
            }
            DrawNode::Line { from, to, stroke } => {
                self.apply_stroke(stroke);
                self.canvas.move_to(Pt::from_f32(from.x), Pt::from_f32(from.y));
                self.canvas.line_to(Pt::from_f32(to.x), Pt::from_f32(to.y));
                self.canvas.stroke();
            }
            DrawNode::Polygon {
                points,
                fill,
                stroke,
            } => self.shape(points, fill, stroke.as_ref()),
            DrawNode::Text(block) => self.text_block(block),
            DrawNode::Group {
                transform,
                children,
            } => {
                self.canvas.save_state();
                if !transform.is_identity() {
                    self.canvas.concat_matrix(
                        transform.a,
                        transform.b,
                        transform.c,
                        transform.d,
                        Pt::from_f32(transform.e),
                        Pt::from_f32(transform.f),
                    );
                }
                self.nodes(children);
                self.canvas.restore_state();
            }
            DrawNode::Markup(fragment) => self.markup(fragment),
        }
    }

    fn polygon_path(&mut self, points: &[Point]) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.canvas.move_to(Pt::from_f32(first.x), Pt::from_f32(first.y));
        for point in rest {
            self.canvas.line_to(Pt::from_f32(point.x), Pt::from_f32(point.y));
        }
        self.canvas.close_path();
    }

    fn apply_stroke(&mut self, stroke: &Stroke) {
        self.canvas.set_stroke_color(stroke.color);
        self.canvas.set_line_width(Pt::from_f32(stroke.width));
    }

    fn shape(&mut self, points: &[Point], fill: &Paint, stroke: Option<&Stroke>) {
        if points.len() < 2 {
            return;
        }
        match fill {
            Paint::Gradient(id) => {
                match self.tree.gradient(id).and_then(|g| g.to_shading()) {
                    Some(shading) => {
                        self.canvas.save_state();
                        self.polygon_path(points);
                        self.canvas.clip_path(false);
                        self.canvas.shading_fill(shading);
                        self.canvas.restore_state();
                    }
                    None => {
                        if let Some(debug) = self.debug {
                            debug.event("render.gradient.missing", json!({ "id": id }));
                        }
                    }
                }
                if let Some(stroke) = stroke {
                    self.apply_stroke(stroke);
                    self.polygon_path(points);
                    self.canvas.stroke();
                }
            }
            Paint::Solid(color) => {
                self.canvas.set_fill_color(*color);
                if let Some(stroke) = stroke {
                    self.apply_stroke(stroke);
                }
                self.polygon_path(points);
                if stroke.is_some() {
                    self.canvas.fill_stroke();
                } else {
                    self.canvas.fill();
                }
            }
            Paint::None => {
                if let Some(stroke) = stroke {
                    self.apply_stroke(stroke);
                    self.polygon_path(points);
                    self.canvas.stroke();
                }
            }
        }
    }

    fn text_block(&mut self, block: &TextBlock) {
        let widths: Vec<f32> = block
            .runs
            .iter()
            .map(|run| {
                if run.text.is_empty() {
                    0.0
                } else {
                    self.measurer
                        .tracked_width(&run.text, &run.font, run.size, run.tracking_value())
                }
            })
            .collect();
        let gaps = self.run_gaps(&block.runs);
        let total: f32 = widths.iter().sum::<f32>() + gaps.iter().sum::<f32>();
        let mut cursor = anchored_start(block.x, total, block.anchor);
        let y = Pt::from_f32(block.y);

        for ((run, width), gap) in block.runs.iter().zip(widths).zip(gaps) {
            cursor += gap;
            if run.text.is_empty() {
                continue;
            }
            let name = font_resource_name(&run.font, self.measurer.registry());
            self.canvas.set_fill_color(run.fill);
            self.canvas.set_font_name(&name);
            self.canvas.set_font_size(Pt::from_f32(run.size));

            if run.tracking.is_empty() {
                self.canvas.draw_string(Pt::from_f32(cursor), y, run.text.as_str());
            } else {
                // Each character at the measured advance of its predecessors plus its offset.
                let mut x = cursor;
                let mut buf = [0u8; 4];
                for (index, ch) in run.text.chars().enumerate() {
                    if index > 0 {
                        x += run.tracking.get(index - 1).copied().unwrap_or(0.0);
                    }
                    let glyph = ch.encode_utf8(&mut buf);
                    self.canvas.draw_string(Pt::from_f32(x), y, glyph.to_string());
                    x += self.measurer.tracked_width(glyph, &run.font, run.size, 0.0);
                }
            }
            cursor += width;
        }
    }

    /// Letter spacing carries across run boundaries inside a block: a tracked run is followed
    /// by its tracking before the next run starts. The approximate width already ends with
    /// that gap, so only runs measured from a font program get it added here.
    fn run_gaps(&self, runs: &[TextRun]) -> Vec<f32> {
        let mut gaps = vec![0.0; runs.len()];
        let mut previous: Option<&TextRun> = None;
        for (index, run) in runs.iter().enumerate() {
            if run.text.is_empty() {
                continue;
            }
            if let Some(prev) = previous {
                if self.measurer.has_metrics(&prev.font) {
                    gaps[index] = prev.tracking_value();
                }
            }
            previous = Some(run);
        }
        gaps
    }

    fn markup(&mut self, fragment: &str) {
        let items = match svg::compile_svg(&wrap_markup(fragment), None) {
            Ok(items) => items,
            Err(err) => {
                if let Some(debug) = self.debug {
                    debug.event("render.markup.error", json!({ "error": err.to_string() }));
                }
                return;
            }
        };
        if let Some(debug) = self.debug {
            debug.event("render.markup", json!({ "items": items.len() }));
        }
        for item in &items {
            match item {
                CompiledItem::Path(path) => svg::draw_compiled_path(&mut self.canvas, path),
                CompiledItem::Text(text) => self.compiled_text(text),
            }
        }
    }

    fn compiled_text(&mut self, text: &CompiledText) {
        if text.text.is_empty() || text.opacity <= 0.0 {
            return;
        }
        let width = self
            .measurer
            .tracked_width(&text.text, &text.font, text.size, 0.0);
        let x = anchored_start(text.x, width, text.anchor);
        let name = font_resource_name(&text.font, self.measurer.registry());

        self.canvas.save_state();
        let t = text.transform;
        if !t.is_identity() {
            self.canvas
                .concat_matrix(t.a, t.b, t.c, t.d, Pt::from_f32(t.e), Pt::from_f32(t.f));
        }
        if text.opacity < 1.0 {
            self.canvas.set_opacity(text.opacity, text.opacity);
        }
        self.canvas.set_fill_color(text.fill);
        self.canvas.set_font_name(&name);
        self.canvas.set_font_size(Pt::from_f32(text.size));
        self.canvas
            .draw_string(Pt::from_f32(x), Pt::from_f32(text.y), text.text.as_str());
        self.canvas.restore_state();
    }
}

fn anchored_start(x: f32, width: f32, anchor: TextAnchor) -> f32 {
    match anchor {
        TextAnchor::Start => x,
        TextAnchor::Middle => x - width / 2.0,
        TextAnchor::End => x - width,
    }
}
