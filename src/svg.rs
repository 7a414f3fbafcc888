use crate::canvas::Canvas;
use crate::draw::{FontSpec, Point, TextAnchor, Transform};
use crate::types::{Color, Pt, Shading, ShadingStop};
use std::collections::HashMap;

// SVG subset compiled to vector paths for the seal graphic.
//
// Supported:
// - <svg>, <g>, <defs>, <use href="#id">, <clipPath> (via clip-path="url(#id)")
// - <path> with M/L/H/V/C/S/Q/T/A/Z (relative and absolute)
// - <rect>, <circle>, <ellipse>, <line>, <polyline>, <polygon>
// - <linearGradient>, <radialGradient> fills (href stop inheritance)
// - <text> as a single positioned run
// - presentation attributes and style="" declarations
// - transform="" with translate, scale, rotate, skewX, skewY, matrix
//
// Not supported: <style> sheets, <mask>, <filter>, <image>, <textPath>, per-tspan positioning.

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

const PRESENTATION_ATTRIBUTES: &[&str] = &[
    "color",
    "fill",
    "stroke",
    "stroke-width",
    "stroke-miterlimit",
    "stroke-linecap",
    "stroke-linejoin",
    "fill-rule",
    "stroke-dasharray",
    "stroke-dashoffset",
    "opacity",
    "fill-opacity",
    "stroke-opacity",
    "font-family",
    "font-size",
    "font-weight",
    "font-style",
    "text-anchor",
];

fn q(value: f32) -> f32 {
    Pt::from_f32(value).to_f32()
}

fn map(ctm: Transform, x: f32, y: f32) -> (f32, f32) {
    let p = ctm.apply(Point::new(x, y));
    (p.x, p.y)
}

#[derive(Debug, Clone)]
struct SvgPaint {
    color: Option<Color>,        // None => "none" (unless gradient_id is set)
    gradient_id: Option<String>, // url(#id)
}

#[derive(Debug, Clone)]
pub(crate) struct SvgStyle {
    color: Color,
    fill: SvgPaint,
    stroke: SvgPaint,
    stroke_width: f32,
    line_cap: u8,
    line_join: u8,
    miter_limit: f32,
    dash_pattern: Vec<f32>,
    dash_offset: f32,
    fill_rule_evenodd: bool,
    fill_opacity: f32,
    stroke_opacity: f32,
    fill_shading: Option<Shading>,
    font_family: String,
    font_size: f32,
    font_weight: u16,
    font_italic: bool,
    text_anchor: TextAnchor,
}

impl Default for SvgStyle {
    fn default() -> Self {
        // SVG defaults: black fill, no stroke.
        Self {
            color: Color::BLACK,
            fill: SvgPaint {
                color: Some(Color::BLACK),
                gradient_id: None,
            },
            stroke: SvgPaint {
                color: None,
                gradient_id: None,
            },
            stroke_width: 1.0,
            line_cap: 0,
            line_join: 0,
            miter_limit: 4.0,
            dash_pattern: Vec::new(),
            dash_offset: 0.0,
            fill_rule_evenodd: false,
            fill_opacity: 1.0,
            stroke_opacity: 1.0,
            fill_shading: None,
            font_family: "serif".to_string(),
            font_size: 16.0,
            font_weight: 400,
            font_italic: false,
            text_anchor: TextAnchor::Start,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PathSeg {
    MoveTo(f32, f32),
    LineTo(f32, f32),
    CurveTo(f32, f32, f32, f32, f32, f32),
    Close,
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledPath {
    segs: Vec<PathSeg>,
    style: SvgStyle,
    clip: Option<(Vec<PathSeg>, bool)>,
}

/// `<text>` content flattened to one run. `x`/`y` are in the coordinate space set up by
/// `transform`; the baseline sits at `y`.
#[derive(Debug, Clone)]
pub(crate) struct CompiledText {
    pub(crate) transform: Transform,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) text: String,
    pub(crate) font: FontSpec,
    pub(crate) size: f32,
    pub(crate) fill: Color,
    pub(crate) opacity: f32,
    pub(crate) anchor: TextAnchor,
}

#[derive(Debug, Clone)]
pub(crate) enum CompiledItem {
    Path(CompiledPath),
    Text(CompiledText),
}

struct CompileContext<'a, 'input> {
    gradients: HashMap<String, GradientDef>,
    id_map: HashMap<String, roxmltree::Node<'a, 'input>>,
    // Guards against <use> cycles.
    use_depth: usize,
}

const MAX_USE_DEPTH: usize = 16;

/// Compiles an SVG document into flattened paths and text runs.
///
/// With a `viewport`, the root `viewBox` is mapped into it ("meet", centered). Without one,
/// the root's own `width`/`height` are used when present, otherwise user units pass through.
pub(crate) fn compile_svg(
    svg_xml: &str,
    viewport: Option<(f32, f32)>,
) -> Result<Vec<CompiledItem>, roxmltree::Error> {
    let doc = roxmltree::Document::parse(svg_xml)?;
    let Some(root) = doc
        .descendants()
        .find(|n| n.is_element() && n.tag_name().name().eq_ignore_ascii_case("svg"))
    else {
        return Ok(Vec::new());
    };

    let view_box = parse_viewbox(root.attribute("viewBox"));
    let viewport = viewport.or_else(|| {
        let w = root.attribute("width").and_then(parse_number)?;
        let h = root.attribute("height").and_then(parse_number)?;
        Some((w, h))
    });
    let base = match viewport {
        Some((w, h)) => viewbox_to_viewport_matrix(view_box, w, h),
        None => Transform::IDENTITY,
    };

    let mut ctx = CompileContext {
        gradients: extract_gradients(&doc),
        id_map: build_id_map(&doc),
        use_depth: 0,
    };
    let mut out = Vec::new();
    compile_element(&mut out, root, base, &SvgStyle::default(), &mut ctx);
    Ok(out)
}

fn compile_element<'a, 'input>(
    out: &mut Vec<CompiledItem>,
    node: roxmltree::Node<'a, 'input>,
    ctm: Transform,
    style: &SvgStyle,
    ctx: &mut CompileContext<'a, 'input>,
) {
    if !node.is_element() {
        return;
    }

    let mut local_style = style.clone();
    apply_presentation_and_style(node, &mut local_style);

    let mut local_ctm = ctm;
    if let Some(transform) = node.attribute("transform") {
        local_ctm = local_ctm.then(parse_transform(transform));
    }

    let tag = node.tag_name().name();
    match tag {
        // Definitions render only through <use>, gradients and clip references.
        "defs" | "clipPath" | "linearGradient" | "radialGradient" | "style" | "title"
        | "desc" | "metadata" => {}
        "g" | "svg" => {
            for child in node.children().filter(|n| n.is_element()) {
                compile_element(out, child, local_ctm, &local_style, ctx);
            }
        }
        "use" => {
            let Some(target) = href_id(node).and_then(|id| ctx.id_map.get(&id).copied()) else {
                return;
            };
            if ctx.use_depth >= MAX_USE_DEPTH {
                return;
            }
            let x = node.attribute("x").and_then(parse_number).unwrap_or(0.0);
            let y = node.attribute("y").and_then(parse_number).unwrap_or(0.0);
            let use_ctm = local_ctm.then(Transform::translate(x, y));
            ctx.use_depth += 1;
            compile_element(out, target, use_ctm, &local_style, ctx);
            ctx.use_depth -= 1;
        }
        "text" => {
            if let Some(text) = compile_text(node, local_ctm, &local_style, &ctx.gradients) {
                out.push(CompiledItem::Text(text));
            }
        }
        _ => {
            let Some(segs) = shape_to_path(node) else {
                return;
            };
            let clip = compile_clip_for_node(node, local_ctm, &ctx.id_map);
            push_compiled_path(out, &segs, &local_style, local_ctm, &ctx.gradients, clip);
        }
    }
}

fn shape_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathSeg>> {
    match node.tag_name().name() {
        "path" => node.attribute("d").map(parse_path_data),
        "rect" => rect_to_path(node),
        "circle" => circle_to_path(node),
        "ellipse" => ellipse_to_path(node),
        "line" => line_to_path(node),
        "polyline" => poly_points_to_path(node, false),
        "polygon" => poly_points_to_path(node, true),
        _ => None,
    }
}

fn compile_text(
    node: roxmltree::Node<'_, '_>,
    ctm: Transform,
    style: &SvgStyle,
    gradients: &HashMap<String, GradientDef>,
) -> Option<CompiledText> {
    let raw: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return None;
    }
    // Gradient text fill degrades to the first stop color.
    let fill = match (&style.fill.color, &style.fill.gradient_id) {
        (Some(color), _) => *color,
        (None, Some(id)) => gradients.get(id)?.stops().first()?.color,
        (None, None) => return None,
    };
    let first = |name: &str| {
        node.attribute(name)
            .map(parse_number_list)
            .and_then(|v| v.first().copied())
            .unwrap_or(0.0)
    };
    Some(CompiledText {
        transform: ctm,
        x: first("x"),
        y: first("y"),
        text,
        font: FontSpec::new(
            style.font_family.clone(),
            style.font_weight,
            style.font_italic,
        ),
        size: style.font_size,
        fill,
        opacity: style.fill_opacity,
        anchor: style.text_anchor,
    })
}

fn build_id_map<'a, 'input>(
    doc: &'a roxmltree::Document<'input>,
) -> HashMap<String, roxmltree::Node<'a, 'input>> {
    let mut out = HashMap::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        if let Some(id) = node.attribute("id") {
            // First wins.
            out.entry(id.to_string()).or_insert(node);
        }
    }
    out
}

fn href_attr<'a>(node: roxmltree::Node<'a, '_>) -> Option<&'a str> {
    node.attribute("href")
        .or_else(|| node.attribute((XLINK_NS, "href")))
}

fn href_id(node: roxmltree::Node<'_, '_>) -> Option<String> {
    let raw = href_attr(node)?;
    let raw = raw.trim().trim_matches('"').trim_matches('\'');
    let id = raw.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

fn push_compiled_path(
    out: &mut Vec<CompiledItem>,
    segs: &[PathSeg],
    style: &SvgStyle,
    ctm: Transform,
    gradients: &HashMap<String, GradientDef>,
    clip: Option<(Vec<PathSeg>, bool)>,
) {
    let has_fill = style.fill.color.is_some() || style.fill.gradient_id.is_some();
    let has_stroke = style.stroke.color.is_some() && style.stroke_width > 0.0;
    if !has_fill && !has_stroke {
        return;
    }

    let out_segs: Vec<PathSeg> = transform_path_segs(segs, ctm)
        .into_iter()
        .map(|seg| match seg {
            PathSeg::MoveTo(x, y) => PathSeg::MoveTo(q(x), q(y)),
            PathSeg::LineTo(x, y) => PathSeg::LineTo(q(x), q(y)),
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => {
                PathSeg::CurveTo(q(x1), q(y1), q(x2), q(y2), q(x), q(y))
            }
            PathSeg::Close => PathSeg::Close,
        })
        .collect();

    let mut out_style = style.clone();
    out_style.fill_shading = None;
    if has_stroke {
        let sf = ctm.scale_factor();
        out_style.stroke_width *= sf;
        for v in &mut out_style.dash_pattern {
            *v *= sf;
        }
        out_style.dash_offset *= sf;
    }

    // Gradient geometry is resolved in the element's own space, then mapped like the path.
    if out_style.fill.color.is_none() {
        if let Some(id) = &out_style.fill.gradient_id {
            out_style.fill_shading = bbox_of_segs(segs)
                .and_then(|b| resolve_gradient_fill(id, gradients, b, ctm));
        }
        if out_style.fill_shading.is_none() && !has_stroke {
            return;
        }
    }
    out.push(CompiledItem::Path(CompiledPath {
        segs: out_segs,
        style: out_style,
        clip,
    }));
}

fn bbox_of_segs(segs: &[PathSeg]) -> Option<(f32, f32, f32, f32)> {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for seg in segs {
        let points: &[(f32, f32)] = match *seg {
            PathSeg::MoveTo(x, y) | PathSeg::LineTo(x, y) => &[(x, y)],
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => &[(x1, y1), (x2, y2), (x, y)],
            PathSeg::Close => &[],
        };
        for &(px, py) in points {
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }
    }

    if !min_x.is_finite() || !min_y.is_finite() || !max_x.is_finite() || !max_y.is_finite() {
        return None;
    }
    Some((min_x, min_y, (max_x - min_x).max(0.0), (max_y - min_y).max(0.0)))
}

fn resolve_gradient_fill(
    id: &str,
    gradients: &HashMap<String, GradientDef>,
    bbox: (f32, f32, f32, f32),
    ctm: Transform,
) -> Option<Shading> {
    let def = gradients.get(id)?;
    let (bx, by, bw, bh) = bbox;
    if bw <= 0.0 || bh <= 0.0 {
        return None;
    }

    let coord = |c: Coord, units: GradientUnits, origin: f32, extent: f32| match units {
        GradientUnits::ObjectBoundingBox => origin + extent * c.v,
        GradientUnits::UserSpaceOnUse if c.is_percent => origin + extent * c.v,
        GradientUnits::UserSpaceOnUse => c.v,
    };

    match def {
        GradientDef::Linear {
            x1,
            y1,
            x2,
            y2,
            units,
            transform,
            stops,
        } => {
            if stops.is_empty() {
                return None;
            }
            let space = ctm.then(transform.unwrap_or(Transform::IDENTITY));
            let (x0, y0) = map(
                space,
                coord(*x1, *units, bx, bw),
                coord(*y1, *units, by, bh),
            );
            let (x1, y1) = map(
                space,
                coord(*x2, *units, bx, bw),
                coord(*y2, *units, by, bh),
            );
            Some(Shading::Axial {
                x0: q(x0),
                y0: q(y0),
                x1: q(x1),
                y1: q(y1),
                stops: stops.clone(),
            })
        }
        GradientDef::Radial {
            cx,
            cy,
            r,
            units,
            transform,
            stops,
        } => {
            if stops.is_empty() {
                return None;
            }
            let space = ctm.then(transform.unwrap_or(Transform::IDENTITY));
            let (cxv, cyv) = map(
                space,
                coord(*cx, *units, bx, bw),
                coord(*cy, *units, by, bh),
            );
            let rv = match units {
                GradientUnits::UserSpaceOnUse if !r.is_percent => r.v,
                _ => bw.min(bh) * r.v,
            } * space.scale_factor();
            Some(Shading::Radial {
                x0: q(cxv),
                y0: q(cyv),
                r0: 0.0,
                x1: q(cxv),
                y1: q(cyv),
                r1: q(rv.max(0.0)),
                stops: stops.clone(),
            })
        }
    }
}

fn compile_clip_for_node(
    node: roxmltree::Node<'_, '_>,
    ctm: Transform,
    id_map: &HashMap<String, roxmltree::Node<'_, '_>>,
) -> Option<(Vec<PathSeg>, bool)> {
    let clip = node.attribute("clip-path")?;
    let id = parse_url_ref(clip)?;
    let clip_node = id_map.get(&id).copied()?;
    if clip_node.tag_name().name() != "clipPath" {
        return None;
    }

    // clip-rule on children is not honored; the clipPath's own rule applies to the union.
    let evenodd = clip_node
        .attribute("clip-rule")
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("evenodd"));

    let mut out = Vec::new();
    compile_clip_subtree(&mut out, clip_node, ctm, id_map, 0);
    if out.is_empty() {
        None
    } else {
        Some((out, evenodd))
    }
}

fn compile_clip_subtree(
    out: &mut Vec<PathSeg>,
    node: roxmltree::Node<'_, '_>,
    ctm: Transform,
    id_map: &HashMap<String, roxmltree::Node<'_, '_>>,
    depth: usize,
) {
    if !node.is_element() || depth > MAX_USE_DEPTH {
        return;
    }

    let mut local_ctm = ctm;
    if let Some(transform) = node.attribute("transform") {
        local_ctm = local_ctm.then(parse_transform(transform));
    }

    match node.tag_name().name() {
        "clipPath" | "g" | "svg" | "defs" => {
            for child in node.children().filter(|n| n.is_element()) {
                compile_clip_subtree(out, child, local_ctm, id_map, depth);
            }
        }
        "use" => {
            if let Some(target) = href_id(node).and_then(|id| id_map.get(&id).copied()) {
                let x = node.attribute("x").and_then(parse_number).unwrap_or(0.0);
                let y = node.attribute("y").and_then(parse_number).unwrap_or(0.0);
                let use_ctm = local_ctm.then(Transform::translate(x, y));
                compile_clip_subtree(out, target, use_ctm, id_map, depth + 1);
            }
        }
        _ => {
            if let Some(segs) = shape_to_path(node) {
                out.extend(transform_path_segs(&segs, local_ctm));
            }
        }
    }
}

fn transform_path_segs(segs: &[PathSeg], ctm: Transform) -> Vec<PathSeg> {
    segs.iter()
        .map(|seg| match *seg {
            PathSeg::MoveTo(x, y) => {
                let (x, y) = map(ctm, x, y);
                PathSeg::MoveTo(x, y)
            }
            PathSeg::LineTo(x, y) => {
                let (x, y) = map(ctm, x, y);
                PathSeg::LineTo(x, y)
            }
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => {
                let (x1, y1) = map(ctm, x1, y1);
                let (x2, y2) = map(ctm, x2, y2);
                let (x, y) = map(ctm, x, y);
                PathSeg::CurveTo(x1, y1, x2, y2, x, y)
            }
            PathSeg::Close => PathSeg::Close,
        })
        .collect()
}

fn emit_path(canvas: &mut Canvas, segs: &[PathSeg]) {
    for seg in segs {
        match *seg {
            PathSeg::MoveTo(x, y) => canvas.move_to(Pt::from_f32(x), Pt::from_f32(y)),
            PathSeg::LineTo(x, y) => canvas.line_to(Pt::from_f32(x), Pt::from_f32(y)),
            PathSeg::CurveTo(x1, y1, x2, y2, x, y) => canvas.curve_to(
                Pt::from_f32(x1),
                Pt::from_f32(y1),
                Pt::from_f32(x2),
                Pt::from_f32(y2),
                Pt::from_f32(x),
                Pt::from_f32(y),
            ),
            PathSeg::Close => canvas.close_path(),
        }
    }
}

/// Paints one compiled path in the canvas' current coordinate system.
pub(crate) fn draw_compiled_path(canvas: &mut Canvas, path: &CompiledPath) {
    let style = &path.style;
    let has_fill = style.fill.color.is_some() || style.fill_shading.is_some();
    let has_stroke = style.stroke.color.is_some() && style.stroke_width > 0.0;
    if !has_fill && !has_stroke {
        return;
    }

    // Opacity and dash are not tracked by the canvas, so scope them.
    canvas.save_state();
    if let Some((clip_segs, evenodd)) = &path.clip {
        emit_path(canvas, clip_segs);
        canvas.clip_path(*evenodd);
    }

    if style.fill_opacity < 1.0 || style.stroke_opacity < 1.0 {
        canvas.set_opacity(style.fill_opacity, style.stroke_opacity);
    }

    if has_stroke {
        if let Some(stroke) = style.stroke.color {
            canvas.set_stroke_color(stroke);
        }
        canvas.set_line_width(Pt::from_f32(style.stroke_width));
        canvas.set_line_cap(style.line_cap);
        canvas.set_line_join(style.line_join);
        if (style.miter_limit - 4.0).abs() > f32::EPSILON {
            canvas.set_miter_limit(Pt::from_f32(style.miter_limit));
        }
        if !style.dash_pattern.is_empty() {
            let pattern = style
                .dash_pattern
                .iter()
                .map(|v| Pt::from_f32(*v))
                .collect::<Vec<_>>();
            canvas.set_dash(pattern, Pt::from_f32(style.dash_offset));
        }
    }

    // Gradient fill: clip then shade, then optionally stroke.
    if let Some(sh) = &style.fill_shading {
        canvas.save_state();
        emit_path(canvas, &path.segs);
        canvas.clip_path(style.fill_rule_evenodd);
        canvas.shading_fill(sh.clone());
        canvas.restore_state();

        if has_stroke {
            emit_path(canvas, &path.segs);
            canvas.stroke();
        }
        canvas.restore_state();
        return;
    }

    if let Some(fill) = style.fill.color {
        canvas.set_fill_color(fill);
    }
    emit_path(canvas, &path.segs);

    match (has_fill, has_stroke, style.fill_rule_evenodd) {
        (true, true, true) => canvas.fill_stroke_evenodd(),
        (true, true, false) => canvas.fill_stroke(),
        (true, false, true) => canvas.fill_evenodd(),
        (true, false, false) => canvas.fill(),
        (false, true, _) => canvas.stroke(),
        (false, false, _) => {}
    }
    canvas.restore_state();
}

fn parse_viewbox(view_box: Option<&str>) -> Option<(f32, f32, f32, f32)> {
    let nums = parse_number_list(view_box?);
    let &[min_x, min_y, w, h] = nums.as_slice() else {
        return None;
    };
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some((min_x, min_y, w, h))
}

fn viewbox_to_viewport_matrix(view_box: Option<(f32, f32, f32, f32)>, w: f32, h: f32) -> Transform {
    let Some((min_x, min_y, vb_w, vb_h)) = view_box else {
        return Transform::IDENTITY;
    };

    // "xMidYMid meet".
    let s = (w / vb_w).min(h / vb_h);
    let tx = (w - vb_w * s) * 0.5 - min_x * s;
    let ty = (h - vb_h * s) * 0.5 - min_y * s;
    Transform::translate(tx, ty).then(Transform::scale(s, s))
}

fn apply_presentation_and_style(node: roxmltree::Node<'_, '_>, style: &mut SvgStyle) {
    // Presentation attributes are the baseline; style="" wins over them.
    for name in PRESENTATION_ATTRIBUTES {
        if let Some(value) = node.attribute(*name) {
            apply_declaration(name, value, style);
        }
    }
    if let Some(s) = node.attribute("style") {
        apply_style_string(s, style);
    }
}

fn apply_style_string(input: &str, style: &mut SvgStyle) {
    let mut important: Vec<(String, String)> = Vec::new();
    for decl in input.split(';') {
        let Some((k, v)) = decl.split_once(':') else {
            continue;
        };
        let key = k.trim().to_ascii_lowercase();
        let value = v.trim();
        match value.rsplit_once("!important") {
            Some((head, _)) => important.push((key, head.trim().to_string())),
            None => apply_declaration(&key, value, style),
        }
    }
    for (key, value) in important {
        apply_declaration(&key, &value, style);
    }
}

fn apply_declaration(key: &str, val: &str, style: &mut SvgStyle) {
    let val = val.trim();
    match key {
        "color" => {
            if let Some((c, _)) = parse_color(val) {
                style.color = c;
            }
        }
        "fill" => {
            let current = style.color;
            if let Some(alpha) = parse_paint_into(val, current, &mut style.fill) {
                style.fill_opacity *= alpha;
            }
        }
        "stroke" => {
            let current = style.color;
            if let Some(alpha) = parse_paint_into(val, current, &mut style.stroke) {
                style.stroke_opacity *= alpha;
            }
        }
        "stroke-width" => {
            if let Some(v) = parse_number(val) {
                style.stroke_width = v.max(0.0);
            }
        }
        "stroke-miterlimit" => {
            if let Some(v) = parse_number(val) {
                style.miter_limit = v.max(1.0);
            }
        }
        "stroke-linecap" => {
            style.line_cap = match val {
                "round" => 1,
                "square" => 2,
                _ => 0,
            };
        }
        "stroke-linejoin" => {
            style.line_join = match val {
                "round" => 1,
                "bevel" => 2,
                _ => 0,
            };
        }
        "fill-rule" => {
            style.fill_rule_evenodd = val.eq_ignore_ascii_case("evenodd");
        }
        "stroke-dasharray" => {
            if val.eq_ignore_ascii_case("none") {
                style.dash_pattern.clear();
            } else {
                style.dash_pattern = parse_length_list(val);
                if style.dash_pattern.iter().all(|v| *v <= 0.0) {
                    style.dash_pattern.clear();
                } else if style.dash_pattern.len() % 2 == 1 {
                    let dup = style.dash_pattern.clone();
                    style.dash_pattern.extend_from_slice(&dup);
                }
            }
        }
        "stroke-dashoffset" => {
            if let Some(v) = parse_number(val) {
                style.dash_offset = v;
            }
        }
        "opacity" => {
            if let Some(v) = parse_number(val) {
                let o = v.clamp(0.0, 1.0);
                style.fill_opacity *= o;
                style.stroke_opacity *= o;
            }
        }
        "fill-opacity" => {
            if let Some(v) = parse_number(val) {
                style.fill_opacity *= v.clamp(0.0, 1.0);
            }
        }
        "stroke-opacity" => {
            if let Some(v) = parse_number(val) {
                style.stroke_opacity *= v.clamp(0.0, 1.0);
            }
        }
        "font-family" => {
            let first = val.split(',').next().unwrap_or("").trim();
            let first = first.trim_matches('"').trim_matches('\'').trim();
            if !first.is_empty() {
                style.font_family = first.to_string();
            }
        }
        "font-size" => {
            if let Some(v) = parse_number(val).filter(|v| *v > 0.0) {
                style.font_size = v;
            }
        }
        "font-weight" => {
            style.font_weight = match val.to_ascii_lowercase().as_str() {
                "normal" => 400,
                "bold" => 700,
                "bolder" => (style.font_weight + 300).min(900),
                "lighter" => style.font_weight.saturating_sub(300).max(100),
                other => other.parse::<u16>().unwrap_or(style.font_weight),
            };
        }
        "font-style" => {
            style.font_italic = matches!(val, "italic" | "oblique");
        }
        "text-anchor" => {
            style.text_anchor = match val {
                "middle" => TextAnchor::Middle,
                "end" => TextAnchor::End,
                _ => TextAnchor::Start,
            };
        }
        _ => {}
    }
}

fn parse_length_list(input: &str) -> Vec<f32> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(parse_number)
        .collect()
}

/// Updates `out` from a paint value and returns the color's alpha when one was given.
/// Unknown paints keep the inherited value.
fn parse_paint_into(input: &str, current: Color, out: &mut SvgPaint) -> Option<f32> {
    let v = input.trim();
    if v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("transparent") {
        out.color = None;
        out.gradient_id = None;
        return None;
    }
    if v.eq_ignore_ascii_case("currentcolor") {
        out.color = Some(current);
        out.gradient_id = None;
        return None;
    }
    if let Some(id) = parse_url_ref(v) {
        out.color = None;
        out.gradient_id = Some(id);
        return None;
    }
    let (c, alpha) = parse_color(v)?;
    out.color = Some(c);
    out.gradient_id = None;
    Some(alpha)
}

fn parse_url_ref(input: &str) -> Option<String> {
    let s = input.trim();
    if !s.to_ascii_lowercase().starts_with("url(") {
        return None;
    }
    let open = s.find('(')?;
    let close = s.rfind(')')?;
    if close <= open + 1 {
        return None;
    }
    let inner = s[open + 1..close]
        .trim()
        .trim_matches('"')
        .trim_matches('\'');
    let id = inner.strip_prefix('#')?;
    if id.is_empty() {
        return None;
    }
    Some(id.to_string())
}

#[derive(Debug, Clone, Copy)]
enum GradientUnits {
    ObjectBoundingBox,
    UserSpaceOnUse,
}

#[derive(Debug, Clone, Copy)]
struct Coord {
    v: f32,
    is_percent: bool,
}

impl Coord {
    const fn percent(v: f32) -> Self {
        Self {
            v,
            is_percent: true,
        }
    }
}

#[derive(Debug, Clone)]
enum GradientDef {
    Linear {
        x1: Coord,
        y1: Coord,
        x2: Coord,
        y2: Coord,
        units: GradientUnits,
        transform: Option<Transform>,
        stops: Vec<ShadingStop>,
    },
    Radial {
        cx: Coord,
        cy: Coord,
        r: Coord,
        units: GradientUnits,
        transform: Option<Transform>,
        stops: Vec<ShadingStop>,
    },
}

impl GradientDef {
    fn stops(&self) -> &[ShadingStop] {
        match self {
            GradientDef::Linear { stops, .. } | GradientDef::Radial { stops, .. } => stops,
        }
    }

    fn stops_mut(&mut self) -> &mut Vec<ShadingStop> {
        match self {
            GradientDef::Linear { stops, .. } | GradientDef::Radial { stops, .. } => stops,
        }
    }
}

fn parse_coord(input: Option<&str>, default: Coord) -> Coord {
    let Some(s) = input else { return default };
    let s = s.trim();
    if let Some(p) = s.strip_suffix('%') {
        return match p.trim().parse::<f32>() {
            Ok(v) => Coord::percent(v / 100.0),
            Err(_) => default,
        };
    }
    match parse_number(s) {
        Some(v) => Coord {
            v,
            is_percent: false,
        },
        None => default,
    }
}

fn parse_stop_offset(input: Option<&str>) -> Option<f32> {
    let s = input.unwrap_or("0").trim();
    let v = match s.strip_suffix('%') {
        Some(p) => p.trim().parse::<f32>().ok()? / 100.0,
        None => s.parse::<f32>().ok()?,
    };
    Some(v.clamp(0.0, 1.0))
}

fn parse_stop_color(node: roxmltree::Node<'_, '_>) -> Option<Color> {
    let mut stop_color = node
        .attribute("stop-color")
        .and_then(parse_color)
        .map(|(c, _)| c);
    if let Some(style_attr) = node.attribute("style") {
        for decl in style_attr.split(';') {
            let Some((k, v)) = decl.split_once(':') else {
                continue;
            };
            if k.trim().eq_ignore_ascii_case("stop-color") {
                let v = v.trim().trim_end_matches("!important").trim();
                stop_color = parse_color(v).map(|(c, _)| c);
            }
        }
    }
    // Missing stop-color is black.
    Some(stop_color.unwrap_or(Color::BLACK))
}

fn extract_gradients(doc: &roxmltree::Document<'_>) -> HashMap<String, GradientDef> {
    // Per-stop opacity is ignored; element opacity goes through ExtGState.
    let mut out: HashMap<String, GradientDef> = HashMap::new();
    let mut hrefs: Vec<(String, String)> = Vec::new();
    for node in doc.descendants().filter(|n| n.is_element()) {
        let name = node.tag_name().name();
        if name != "linearGradient" && name != "radialGradient" {
            continue;
        }
        let Some(id) = node.attribute("id") else {
            continue;
        };
        if let Some(base) = href_id(node) {
            hrefs.push((id.to_string(), base));
        }

        let units = match node.attribute("gradientUnits") {
            Some("userSpaceOnUse") => GradientUnits::UserSpaceOnUse,
            _ => GradientUnits::ObjectBoundingBox,
        };
        let transform = node.attribute("gradientTransform").map(parse_transform);

        let mut stops: Vec<ShadingStop> = Vec::new();
        for stop in node
            .children()
            .filter(|n| n.is_element() && n.tag_name().name() == "stop")
        {
            let Some(mut offset) = parse_stop_offset(stop.attribute("offset")) else {
                continue;
            };
            // Offsets never decrease.
            if let Some(prev) = stops.last() {
                offset = offset.max(prev.offset);
            }
            let Some(color) = parse_stop_color(stop) else {
                continue;
            };
            stops.push(ShadingStop { offset, color });
        }

        let attr = |k: &str| node.attribute(k);
        let def = if name == "linearGradient" {
            GradientDef::Linear {
                x1: parse_coord(attr("x1"), Coord::percent(0.0)),
                y1: parse_coord(attr("y1"), Coord::percent(0.0)),
                x2: parse_coord(attr("x2"), Coord::percent(1.0)),
                y2: parse_coord(attr("y2"), Coord::percent(0.0)),
                units,
                transform,
                stops,
            }
        } else {
            GradientDef::Radial {
                cx: parse_coord(attr("cx"), Coord::percent(0.5)),
                cy: parse_coord(attr("cy"), Coord::percent(0.5)),
                r: parse_coord(attr("r"), Coord::percent(0.5)),
                units,
                transform,
                stops,
            }
        };

        out.insert(id.to_string(), def);
    }

    // A gradient with no stops of its own inherits them from its href target.
    // Coordinate and unit inheritance is not handled.
    for (id, base) in hrefs {
        let Some(base_stops) = out.get(&base).map(|d| d.stops().to_vec()) else {
            continue;
        };
        if let Some(def) = out.get_mut(&id) {
            if def.stops().is_empty() {
                *def.stops_mut() = base_stops;
            }
        }
    }
    out
}

/// Parses a color and its alpha (1.0 unless given by `rgba()`).
fn parse_color(input: &str) -> Option<(Color, f32)> {
    let v = input.trim();
    if v.starts_with('#') {
        return Color::from_hex(v).map(|c| (c, 1.0));
    }
    let lower = v.to_ascii_lowercase();
    if let Some(args) = lower
        .strip_prefix("rgba(")
        .or_else(|| lower.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
    {
        let parts: Vec<&str> = args
            .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
            .filter(|s| !s.is_empty())
            .collect();
        if parts.len() < 3 {
            return None;
        }
        let channel = |s: &str| -> Option<f32> {
            match s.strip_suffix('%') {
                Some(p) => p.parse::<f32>().ok().map(|v| v / 100.0),
                None => s.parse::<f32>().ok().map(|v| v / 255.0),
            }
            .map(|v| v.clamp(0.0, 1.0))
        };
        let alpha = match parts.get(3) {
            Some(a) => match a.strip_suffix('%') {
                Some(p) => p.parse::<f32>().ok()? / 100.0,
                None => a.parse::<f32>().ok()?,
            },
            None => 1.0,
        };
        let c = Color::rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
        return Some((c, alpha.clamp(0.0, 1.0)));
    }
    named_color(&lower).map(|c| (c, 1.0))
}

fn named_color(name: &str) -> Option<Color> {
    let hex = match name {
        "black" => "#000000",
        "white" => "#ffffff",
        "red" => "#ff0000",
        "green" => "#008000",
        "blue" => "#0000ff",
        "yellow" => "#ffff00",
        "gold" => "#ffd700",
        "goldenrod" => "#daa520",
        "darkgoldenrod" => "#b8860b",
        "navy" => "#000080",
        "maroon" => "#800000",
        "darkred" => "#8b0000",
        "crimson" => "#dc143c",
        "gray" | "grey" => "#808080",
        "silver" => "#c0c0c0",
        "lightgray" | "lightgrey" => "#d3d3d3",
        "darkgray" | "darkgrey" => "#a9a9a9",
        "ivory" => "#fffff0",
        "beige" => "#f5f5dc",
        "tan" => "#d2b48c",
        "brown" => "#a52a2a",
        "orange" => "#ffa500",
        "purple" => "#800080",
        "teal" => "#008080",
        _ => return None,
    };
    Color::from_hex(hex)
}

fn parse_number(input: &str) -> Option<f32> {
    // Unit suffixes are dropped; values are treated as user units.
    let s = input
        .trim()
        .trim_end_matches("px")
        .trim_end_matches("pt")
        .trim_end_matches("mm")
        .trim_end_matches("cm")
        .trim_end_matches("in")
        .trim();
    s.parse::<f32>().ok().filter(|v| v.is_finite())
}

fn parse_transform(input: &str) -> Transform {
    let mut out = Transform::IDENTITY;
    let mut s = input.trim();

    while !s.is_empty() {
        let Some(open) = s.find('(') else { break };
        let name = s[..open].trim().trim_start_matches(',').trim();
        let Some(close) = s[open + 1..].find(')') else {
            break;
        };
        let args = parse_number_list(&s[open + 1..open + 1 + close]);
        let arg = |i: usize, default: f32| args.get(i).copied().unwrap_or(default);

        let m = match name {
            "translate" => Transform::translate(arg(0, 0.0), arg(1, 0.0)),
            "scale" => Transform::scale(arg(0, 1.0), arg(1, arg(0, 1.0))),
            "rotate" => {
                let a = arg(0, 0.0);
                if args.len() >= 3 {
                    let (cx, cy) = (args[1], args[2]);
                    Transform::translate(cx, cy)
                        .then(Transform::rotate(a))
                        .then(Transform::translate(-cx, -cy))
                } else {
                    Transform::rotate(a)
                }
            }
            "skewX" => Transform::skew_x(arg(0, 0.0)),
            "skewY" => Transform::skew_y(arg(0, 0.0)),
            "matrix" if args.len() >= 6 => Transform {
                a: args[0],
                b: args[1],
                c: args[2],
                d: args[3],
                e: args[4],
                f: args[5],
            },
            _ => Transform::IDENTITY,
        };

        out = out.then(m);
        s = s[open + 1 + close + 1..].trim_start();
    }

    out
}

fn parse_number_list(input: &str) -> Vec<f32> {
    input
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f32>().ok())
        .collect()
}

fn number_attr(node: roxmltree::Node<'_, '_>, name: &str) -> f32 {
    node.attribute(name).and_then(parse_number).unwrap_or(0.0)
}

fn rect_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathSeg>> {
    let x = number_attr(node, "x");
    let y = number_attr(node, "y");
    let w = parse_number(node.attribute("width")?)?;
    let h = parse_number(node.attribute("height")?)?;
    if w <= 0.0 || h <= 0.0 {
        return None;
    }

    // rx/ry default to each other; both are capped at half the side.
    let rx_attr = node.attribute("rx").and_then(parse_number);
    let ry_attr = node.attribute("ry").and_then(parse_number);
    let rx = rx_attr.or(ry_attr).unwrap_or(0.0).clamp(0.0, w / 2.0);
    let ry = ry_attr.or(rx_attr).unwrap_or(0.0).clamp(0.0, h / 2.0);
    if rx <= 0.0 || ry <= 0.0 {
        return Some(vec![
            PathSeg::MoveTo(x, y),
            PathSeg::LineTo(x + w, y),
            PathSeg::LineTo(x + w, y + h),
            PathSeg::LineTo(x, y + h),
            PathSeg::Close,
        ]);
    }

    let k = 0.552_284_8_f32;
    let (ox, oy) = (rx * k, ry * k);
    let (r, b) = (x + w, y + h);
    Some(vec![
        PathSeg::MoveTo(x + rx, y),
        PathSeg::LineTo(r - rx, y),
        PathSeg::CurveTo(r - rx + ox, y, r, y + ry - oy, r, y + ry),
        PathSeg::LineTo(r, b - ry),
        PathSeg::CurveTo(r, b - ry + oy, r - rx + ox, b, r - rx, b),
        PathSeg::LineTo(x + rx, b),
        PathSeg::CurveTo(x + rx - ox, b, x, b - ry + oy, x, b - ry),
        PathSeg::LineTo(x, y + ry),
        PathSeg::CurveTo(x, y + ry - oy, x + rx - ox, y, x + rx, y),
        PathSeg::Close,
    ])
}

fn circle_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathSeg>> {
    let r = parse_number(node.attribute("r")?)?;
    if r <= 0.0 {
        return None;
    }
    Some(ellipse_segs(number_attr(node, "cx"), number_attr(node, "cy"), r, r))
}

fn ellipse_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathSeg>> {
    let rx = parse_number(node.attribute("rx")?)?;
    let ry = parse_number(node.attribute("ry")?)?;
    if rx <= 0.0 || ry <= 0.0 {
        return None;
    }
    Some(ellipse_segs(number_attr(node, "cx"), number_attr(node, "cy"), rx, ry))
}

fn ellipse_segs(cx: f32, cy: f32, rx: f32, ry: f32) -> Vec<PathSeg> {
    // Four cubic quadrants.
    let k = 0.552_284_8_f32;
    let ox = rx * k;
    let oy = ry * k;
    vec![
        PathSeg::MoveTo(cx + rx, cy),
        PathSeg::CurveTo(cx + rx, cy + oy, cx + ox, cy + ry, cx, cy + ry),
        PathSeg::CurveTo(cx - ox, cy + ry, cx - rx, cy + oy, cx - rx, cy),
        PathSeg::CurveTo(cx - rx, cy - oy, cx - ox, cy - ry, cx, cy - ry),
        PathSeg::CurveTo(cx + ox, cy - ry, cx + rx, cy - oy, cx + rx, cy),
        PathSeg::Close,
    ]
}

fn line_to_path(node: roxmltree::Node<'_, '_>) -> Option<Vec<PathSeg>> {
    Some(vec![
        PathSeg::MoveTo(number_attr(node, "x1"), number_attr(node, "y1")),
        PathSeg::LineTo(number_attr(node, "x2"), number_attr(node, "y2")),
    ])
}

fn poly_points_to_path(node: roxmltree::Node<'_, '_>, close: bool) -> Option<Vec<PathSeg>> {
    let points = parse_points(node.attribute("points")?);
    let (first, rest) = points.split_first()?;
    if rest.is_empty() {
        return None;
    }
    let mut segs = Vec::with_capacity(points.len() + 1);
    segs.push(PathSeg::MoveTo(first.0, first.1));
    segs.extend(rest.iter().map(|&(x, y)| PathSeg::LineTo(x, y)));
    if close {
        segs.push(PathSeg::Close);
    }
    Some(segs)
}

fn parse_points(input: &str) -> Vec<(f32, f32)> {
    let nums = parse_number_list(input);
    nums.chunks_exact(2).map(|p| (p[0], p[1])).collect()
}

fn parse_path_data(d: &str) -> Vec<PathSeg> {
    // Quadratics and arcs are normalized to cubics.
    let mut segs = Vec::new();
    let mut p = PathParser::new(d);
    let mut cmd = ' ';
    let mut cur_x = 0.0;
    let mut cur_y = 0.0;
    let mut start_x = 0.0;
    let mut start_y = 0.0;
    let mut last_cubic_ctrl2: Option<(f32, f32)> = None;
    let mut last_quad_ctrl: Option<(f32, f32)> = None;

    loop {
        let before = p.i;
        let Some(c) = p.next_command_or_number(&mut cmd) else {
            break;
        };
        match c {
            'M' | 'm' => {
                let rel = c == 'm';
                if let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::MoveTo(x, y));
                    cur_x = x;
                    cur_y = y;
                    start_x = x;
                    start_y = y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;

                    // Implicit subsequent pairs are line segments.
                    while let Some((x2, y2)) = p.next_pair() {
                        let (x2, y2) = if rel {
                            (cur_x + x2, cur_y + y2)
                        } else {
                            (x2, y2)
                        };
                        segs.push(PathSeg::LineTo(x2, y2));
                        cur_x = x2;
                        cur_y = y2;
                    }
                    cmd = if rel { 'l' } else { 'L' };
                }
            }
            'L' | 'l' => {
                let rel = c == 'l';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    segs.push(PathSeg::LineTo(x, y));
                    cur_x = x;
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'H' | 'h' => {
                let rel = c == 'h';
                while let Some(x) = p.next_number() {
                    let x = if rel { cur_x + x } else { x };
                    segs.push(PathSeg::LineTo(x, cur_y));
                    cur_x = x;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'V' | 'v' => {
                let rel = c == 'v';
                while let Some(y) = p.next_number() {
                    let y = if rel { cur_y + y } else { y };
                    segs.push(PathSeg::LineTo(cur_x, y));
                    cur_y = y;
                }
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
            }
            'C' | 'c' => {
                let rel = c == 'c';
                while let Some([x1, y1, x2, y2, x, y]) = p.next_numbers::<6>() {
                    let (x1, y1, x2, y2, x, y) = if rel {
                        (
                            cur_x + x1,
                            cur_y + y1,
                            cur_x + x2,
                            cur_y + y2,
                            cur_x + x,
                            cur_y + y,
                        )
                    } else {
                        (x1, y1, x2, y2, x, y)
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'S' | 's' => {
                let rel = c == 's';
                while let Some([x2, y2, x, y]) = p.next_numbers::<4>() {
                    let (x2, y2, x, y) = if rel {
                        (cur_x + x2, cur_y + y2, cur_x + x, cur_y + y)
                    } else {
                        (x2, y2, x, y)
                    };
                    let (x1, y1) = match last_cubic_ctrl2 {
                        Some((px2, py2)) => (2.0 * cur_x - px2, 2.0 * cur_y - py2),
                        None => (cur_x, cur_y),
                    };
                    segs.push(PathSeg::CurveTo(x1, y1, x2, y2, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = Some((x2, y2));
                    last_quad_ctrl = None;
                }
            }
            'Q' | 'q' => {
                let rel = c == 'q';
                while let Some([x1, y1, x, y]) = p.next_numbers::<4>() {
                    let (x1, y1, x, y) = if rel {
                        (cur_x + x1, cur_y + y1, cur_x + x, cur_y + y)
                    } else {
                        (x1, y1, x, y)
                    };
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, x1, y1, x, y);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((x1, y1));
                    last_cubic_ctrl2 = None;
                }
            }
            'T' | 't' => {
                let rel = c == 't';
                while let Some((x, y)) = p.next_pair() {
                    let (x, y) = if rel { (cur_x + x, cur_y + y) } else { (x, y) };
                    let (qx, qy) = match last_quad_ctrl {
                        Some((px1, py1)) => (2.0 * cur_x - px1, 2.0 * cur_y - py1),
                        None => (cur_x, cur_y),
                    };
                    let (c1x, c1y, c2x, c2y) = quad_to_cubic(cur_x, cur_y, qx, qy, x, y);
                    segs.push(PathSeg::CurveTo(c1x, c1y, c2x, c2y, x, y));
                    cur_x = x;
                    cur_y = y;
                    last_quad_ctrl = Some((qx, qy));
                    last_cubic_ctrl2 = None;
                }
            }
            'A' | 'a' => {
                let rel = c == 'a';
                while let Some(arc) = p.next_arc() {
                    let (x, y) = if rel {
                        (cur_x + arc.x, cur_y + arc.y)
                    } else {
                        (arc.x, arc.y)
                    };
                    segs.extend(arc_to_cubics(
                        cur_x,
                        cur_y,
                        arc.rx,
                        arc.ry,
                        arc.rotation,
                        arc.large_arc,
                        arc.sweep,
                        x,
                        y,
                    ));
                    cur_x = x;
                    cur_y = y;
                    last_cubic_ctrl2 = None;
                    last_quad_ctrl = None;
                }
            }
            'Z' | 'z' => {
                segs.push(PathSeg::Close);
                cur_x = start_x;
                cur_y = start_y;
                last_cubic_ctrl2 = None;
                last_quad_ctrl = None;
                cmd = ' ';
            }
            _ => {}
        }
        // Unparseable input: skip one byte.
        if p.i == before {
            p.i += 1;
        }
    }

    segs
}

fn quad_to_cubic(x0: f32, y0: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> (f32, f32, f32, f32) {
    let c1x = x0 + (2.0 / 3.0) * (x1 - x0);
    let c1y = y0 + (2.0 / 3.0) * (y1 - y0);
    let c2x = x2 + (2.0 / 3.0) * (x1 - x2);
    let c2y = y2 + (2.0 / 3.0) * (y1 - y2);
    (c1x, c1y, c2x, c2y)
}

#[allow(clippy::too_many_arguments)]
fn arc_to_cubics(
    x0: f32,
    y0: f32,
    rx_in: f32,
    ry_in: f32,
    x_axis_rotation_deg: f32,
    large_arc: bool,
    sweep: bool,
    x1: f32,
    y1: f32,
) -> Vec<PathSeg> {
    // Endpoint to center parameterization (SVG 1.1 implementation notes, F.6.5).
    use std::f32::consts::PI;

    let mut rx = rx_in.abs();
    let mut ry = ry_in.abs();
    if rx == 0.0 || ry == 0.0 || (x0 == x1 && y0 == y1) {
        return vec![PathSeg::LineTo(x1, y1)];
    }

    let phi = x_axis_rotation_deg.to_radians();
    let sin_phi = libm::sinf(phi);
    let cos_phi = libm::cosf(phi);

    let dx2 = (x0 - x1) / 2.0;
    let dy2 = (y0 - y1) / 2.0;
    let x1p = cos_phi * dx2 + sin_phi * dy2;
    let y1p = -sin_phi * dx2 + cos_phi * dy2;

    // Scale radii up when the endpoints cannot be reached.
    let x1p2 = x1p * x1p;
    let y1p2 = y1p * y1p;
    let lambda = x1p2 / (rx * rx) + y1p2 / (ry * ry);
    if lambda > 1.0 {
        let s = libm::sqrtf(lambda);
        rx *= s;
        ry *= s;
    }

    let rx2 = rx * rx;
    let ry2 = ry * ry;
    let num = rx2 * ry2 - rx2 * y1p2 - ry2 * x1p2;
    let den = rx2 * y1p2 + ry2 * x1p2;
    let coef = if den != 0.0 {
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        sign * libm::sqrtf((num / den).max(0.0))
    } else {
        0.0
    };
    let cxp = coef * (rx * y1p / ry);
    let cyp = coef * (-ry * x1p / rx);

    let cx = cos_phi * cxp - sin_phi * cyp + (x0 + x1) / 2.0;
    let cy = sin_phi * cxp + cos_phi * cyp + (y0 + y1) / 2.0;

    fn angle(ux: f32, uy: f32, vx: f32, vy: f32) -> f32 {
        libm::atan2f(ux * vy - uy * vx, ux * vx + uy * vy)
    }

    let ux = (x1p - cxp) / rx;
    let uy = (y1p - cyp) / ry;
    let vx = (-x1p - cxp) / rx;
    let vy = (-y1p - cyp) / ry;

    let mut theta1 = angle(1.0, 0.0, ux, uy);
    let mut dtheta = angle(ux, uy, vx, vy);
    if !sweep && dtheta > 0.0 {
        dtheta -= 2.0 * PI;
    } else if sweep && dtheta < 0.0 {
        dtheta += 2.0 * PI;
    }

    // At most 90 degrees per cubic.
    let count = libm::ceilf(dtheta.abs() / (PI / 2.0)).max(1.0) as i32;
    let delta = dtheta / count as f32;

    let ellipse = EllipseFrame {
        cx,
        cy,
        rx,
        ry,
        sin_phi,
        cos_phi,
    };
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(ellipse.segment_to_cubic(theta1, theta1 + delta));
        theta1 += delta;
    }
    out
}

struct EllipseFrame {
    cx: f32,
    cy: f32,
    rx: f32,
    ry: f32,
    sin_phi: f32,
    cos_phi: f32,
}

impl EllipseFrame {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        let x = self.rx * x;
        let y = self.ry * y;
        (
            self.cx + self.cos_phi * x - self.sin_phi * y,
            self.cy + self.sin_phi * x + self.cos_phi * y,
        )
    }

    fn segment_to_cubic(&self, t1: f32, t2: f32) -> PathSeg {
        let k = (4.0 / 3.0) * libm::tanf((t2 - t1) / 4.0);
        let (s1, c1) = (libm::sinf(t1), libm::cosf(t1));
        let (s2, c2) = (libm::sinf(t2), libm::cosf(t2));

        let (c1x, c1y) = self.map(c1 - k * s1, s1 + k * c1);
        let (c2x, c2y) = self.map(c2 + k * s2, s2 - k * c2);
        let (ex, ey) = self.map(c2, s2);
        PathSeg::CurveTo(c1x, c1y, c2x, c2y, ex, ey)
    }
}

struct ArcArgs {
    rx: f32,
    ry: f32,
    rotation: f32,
    large_arc: bool,
    sweep: bool,
    x: f32,
    y: f32,
}

struct PathParser<'a> {
    bytes: &'a [u8],
    i: usize,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            bytes: input.as_bytes(),
            i: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.i).copied()
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\n' | b'\r' | b'\t' | b',')) {
            self.i += 1;
        }
    }

    fn next_command_or_number(&mut self, current: &mut char) -> Option<char> {
        self.skip_ws();
        let b = self.peek()?;
        if b.is_ascii_alphabetic() && b != b'e' && b != b'E' {
            *current = b as char;
            self.i += 1;
            return Some(*current);
        }
        // No new command; repeat the previous one.
        Some(*current)
    }

    fn skip_digits(&mut self) -> bool {
        let start = self.i;
        while self.peek().is_some_and(|b| b.is_ascii_digit()) {
            self.i += 1;
        }
        self.i > start
    }

    fn next_number(&mut self) -> Option<f32> {
        self.skip_ws();
        let start = self.i;

        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.i += 1;
        }
        let mut has = self.skip_digits();
        if self.peek() == Some(b'.') {
            self.i += 1;
            has |= self.skip_digits();
        }
        if !has {
            self.i = start;
            return None;
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            let mark = self.i;
            self.i += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.i += 1;
            }
            if !self.skip_digits() {
                self.i = mark;
            }
        }

        let s = std::str::from_utf8(&self.bytes[start..self.i]).ok()?;
        s.parse::<f32>().ok()
    }

    fn next_numbers<const N: usize>(&mut self) -> Option<[f32; N]> {
        let start = self.i;
        let mut out = [0.0; N];
        for slot in &mut out {
            match self.next_number() {
                Some(v) => *slot = v,
                None => {
                    self.i = start;
                    return None;
                }
            }
        }
        Some(out)
    }

    fn next_flag(&mut self) -> Option<bool> {
        self.skip_ws();
        match self.peek()? {
            b'0' => {
                self.i += 1;
                Some(false)
            }
            b'1' => {
                self.i += 1;
                Some(true)
            }
            _ => None,
        }
    }

    /// `rx ry rotation large-arc sweep x y`; rewinds on a partial argument list.
    fn next_arc(&mut self) -> Option<ArcArgs> {
        let start = self.i;
        let parsed = self.parse_arc_args();
        if parsed.is_none() {
            self.i = start;
        }
        parsed
    }

    fn parse_arc_args(&mut self) -> Option<ArcArgs> {
        let [rx, ry, rotation] = self.next_numbers::<3>()?;
        let large_arc = self.next_flag()?;
        let sweep = self.next_flag()?;
        let [x, y] = self.next_numbers::<2>()?;
        Some(ArcArgs {
            rx,
            ry,
            rotation,
            large_arc,
            sweep,
            x,
            y,
        })
    }

    fn next_pair(&mut self) -> Option<(f32, f32)> {
        let [x, y] = self.next_numbers::<2>()?;
        Some((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::types::Size;

    fn paths(items: &[CompiledItem]) -> Vec<&CompiledPath> {
        items
            .iter()
            .filter_map(|item| match item {
                CompiledItem::Path(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn parses_simple_path() {
        let segs = parse_path_data("M 0 0 L 10 0 L 10 10 Z");
        assert_eq!(
            segs,
            vec![
                PathSeg::MoveTo(0.0, 0.0),
                PathSeg::LineTo(10.0, 0.0),
                PathSeg::LineTo(10.0, 10.0),
                PathSeg::Close,
            ]
        );
    }

    #[test]
    fn parses_quadratic_and_arc() {
        let segs = parse_path_data("M 0 0 Q 10 0 10 10 T 20 20 A 5 5 0 0 1 30 30 Z");
        // Quadratic and arc both normalize to cubic CurveTo segments.
        assert!(segs.iter().any(|s| matches!(s, PathSeg::CurveTo(..))));
        assert!(matches!(segs.last(), Some(PathSeg::Close)));
    }

    #[test]
    fn parses_compact_arc_flags_without_separator() {
        let segs = parse_path_data("M10 10 A5 5 0 01 20 20");
        assert!(
            segs.iter().any(|s| matches!(s, PathSeg::CurveTo(..))),
            "compact arc flag syntax should produce cubic segments"
        );
        let Some(PathSeg::CurveTo(.., x, y)) = segs.last() else {
            panic!("expected the arc to end with a curve");
        };
        assert!((x - 20.0).abs() < 0.01 && (y - 20.0).abs() < 0.01);
    }

    #[test]
    fn implicit_pairs_after_relative_move_are_relative_lines() {
        let segs = parse_path_data("m 5 5 10 0 0 10z");
        assert_eq!(segs[1], PathSeg::LineTo(15.0, 5.0));
        assert_eq!(segs[2], PathSeg::LineTo(15.0, 15.0));
    }

    #[test]
    fn garbage_in_path_data_terminates() {
        let segs = parse_path_data("M 0 0 L 10 # 5 ; Z 4 4 é");
        assert!(matches!(segs[0], PathSeg::MoveTo(..)));
        assert!(segs.iter().any(|s| matches!(s, PathSeg::Close)));
    }

    #[test]
    fn gradients_compile_to_shading() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10">
          <defs>
            <linearGradient id="g1">
              <stop offset="0" stop-color="#00ff00"/>
              <stop offset="1" stop-color="#0000ff"/>
            </linearGradient>
          </defs>
          <rect x="0" y="0" width="10" height="10" fill="url(#g1)"/>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let first = paths(&compiled)[0];
        let Some(Shading::Axial { x0, x1, stops, .. }) = &first.style.fill_shading else {
            panic!("expected an axial shading");
        };
        assert_eq!((*x0, *x1), (0.0, 10.0));
        assert_eq!(stops.len(), 2);
    }

    #[test]
    fn gradient_href_inherits_stops() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">
          <linearGradient id="base"><stop offset="0.2" stop-color="gold"/></linearGradient>
          <radialGradient id="ring" xlink:href="#base"/>
          <circle cx="10" cy="10" r="5" fill="url(#ring)"/>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let shading = paths(&compiled)[0]
            .style
            .fill_shading
            .clone()
            .expect("shading");
        assert!(matches!(shading, Shading::Radial { .. }));
        assert_eq!(shading.stops().len(), 1);
    }

    #[test]
    fn use_references_defs_by_id() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" width="40" height="20" viewBox="0 0 40 20">
          <defs>
            <g id="icon">
              <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
            </g>
          </defs>
          <use href="#icon" x="2" y="2"/>
          <use href="#icon" x="20" y="2" transform="scale(1.0)"/>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let found = paths(&compiled);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].segs[0], PathSeg::MoveTo(20.0, 2.0));
    }

    #[test]
    fn self_referencing_use_stops() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg"><g id="a"><use href="#a"/><rect width="1" height="1"/></g></svg>"##;
        let compiled = compile_svg(svg, None).expect("svg");
        assert!(!compiled.is_empty());
    }

    #[test]
    fn style_attribute_overrides_presentation_attributes() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" width="20" height="10" viewBox="0 0 20 10">
          <rect
            x="1"
            y="1"
            width="18"
            height="8"
            fill="#ff0000"
            style="fill:#0000ff; stroke:#00ff00; stroke-width:2; stroke-linecap:round; stroke-linejoin:bevel;"
          />
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let path = paths(&compiled)[0];
        let fill = path.style.fill.color.expect("expected fill color");
        let stroke = path.style.stroke.color.expect("expected stroke color");
        assert_eq!(fill, Color::rgb(0.0, 0.0, 1.0));
        assert_eq!(stroke, Color::rgb(0.0, 1.0, 0.0));
        assert!((path.style.stroke_width - 2.0).abs() < 0.001);
        assert_eq!(path.style.line_cap, 1);
        assert_eq!(path.style.line_join, 2);
    }

    #[test]
    fn inline_style_parses_important_and_opacity() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" width="24" height="12" viewBox="0 0 24 12">
          <rect
            x="1"
            y="1"
            width="22"
            height="10"
            style="fill: rgba(255, 0, 0, 0.5); stroke: rgba(0, 128, 0, 0.25); stroke-width: 2px; stroke-dasharray: 2 3 4; fill-rule: evenodd; opacity: 0.5; fill-opacity: 0.8; stroke-opacity: 0.5; stroke-linecap: round !important; stroke-linecap: butt; stroke-linejoin: bevel;"
          />
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let path = paths(&compiled)[0];
        let fill = path.style.fill.color.expect("expected fill color");
        let stroke = path.style.stroke.color.expect("expected stroke color");
        assert_eq!(fill, Color::rgb(1.0, 0.0, 0.0));
        assert!((stroke.g - (128.0 / 255.0)).abs() < 0.001);
        assert!((path.style.stroke_width - 2.0).abs() < 0.001);
        assert_eq!(path.style.line_cap, 1);
        assert_eq!(path.style.line_join, 2);
        assert!(path.style.fill_rule_evenodd);
        assert_eq!(path.style.dash_pattern, vec![2.0, 3.0, 4.0, 2.0, 3.0, 4.0]);
        assert!((path.style.fill_opacity - 0.2).abs() < 0.001);
        assert!((path.style.stroke_opacity - 0.0625).abs() < 0.001);
    }

    #[test]
    fn group_transform_and_viewport_flatten_into_points() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10">
          <g transform="translate(2 3)"><rect width="4" height="4" stroke="black" stroke-width="1"/></g>
        </svg>
        "##;
        let compiled = compile_svg(svg, Some((20.0, 20.0))).expect("svg");
        let path = paths(&compiled)[0];
        assert_eq!(path.segs[0], PathSeg::MoveTo(4.0, 6.0));
        assert_eq!(path.segs[2], PathSeg::LineTo(12.0, 14.0));
        assert!((path.style.stroke_width - 2.0).abs() < 0.001);
    }

    #[test]
    fn rotate_and_skew_transforms_parse() {
        let m = parse_transform("rotate(90) skewX(0)");
        let (x, y) = map(m, 1.0, 0.0);
        assert!(x.abs() < 1e-5 && (y - 1.0).abs() < 1e-5);
        let m = parse_transform("matrix(1 0 0 1 5 6)");
        assert_eq!(map(m, 0.0, 0.0), (5.0, 6.0));
    }

    #[test]
    fn rounded_rect_uses_curves() {
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg"><rect width="20" height="10" rx="4"/></svg>"##;
        let compiled = compile_svg(svg, None).expect("svg");
        let curves = paths(&compiled)[0]
            .segs
            .iter()
            .filter(|s| matches!(s, PathSeg::CurveTo(..)))
            .count();
        assert_eq!(curves, 4);
    }

    #[test]
    fn text_elements_compile_to_runs() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg">
          <g font-family="'EB Garamond', serif" font-size="12" fill="#a1822c">
            <text x="100" y="40" text-anchor="middle" font-weight="bold">  SEALED
              <tspan>2025</tspan> </text>
          </g>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let CompiledItem::Text(text) = &compiled[0] else {
            panic!("expected text");
        };
        assert_eq!(text.text, "SEALED 2025");
        assert_eq!(text.font.family, "EB Garamond");
        assert_eq!(text.font.weight, 700);
        assert_eq!(text.anchor, TextAnchor::Middle);
        assert_eq!((text.x, text.y, text.size), (100.0, 40.0, 12.0));
        assert_eq!(Some(text.fill), Color::from_hex("#a1822c"));
    }

    #[test]
    fn clip_path_attaches_to_shapes() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg">
          <clipPath id="c" clip-rule="evenodd"><circle cx="5" cy="5" r="5"/></clipPath>
          <rect width="10" height="10" fill="navy" clip-path="url(#c)"/>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let found = paths(&compiled);
        assert_eq!(found.len(), 1);
        let (segs, evenodd) = found[0].clip.as_ref().expect("clip");
        assert!(*evenodd);
        assert_eq!(segs.len(), 6);
    }

    #[test]
    fn malformed_markup_is_an_error() {
        assert!(compile_svg("<svg><g></svg>", None).is_err());
        assert!(compile_svg("<g/>", None).expect("no svg root").is_empty());
    }

    #[test]
    fn draws_fill_and_gradient_paths() {
        let svg = r##"
        <svg xmlns="http://www.w3.org/2000/svg">
          <linearGradient id="g"><stop offset="0" stop-color="#fff"/><stop offset="1" stop-color="#000"/></linearGradient>
          <rect width="8" height="8" fill="#ff0000"/>
          <circle cx="4" cy="4" r="2" fill="url(#g)" stroke="black"/>
        </svg>
        "##;
        let compiled = compile_svg(svg, None).expect("svg");
        let mut canvas = Canvas::new(Size::a4());
        for path in paths(&compiled) {
            draw_compiled_path(&mut canvas, path);
        }
        let doc = canvas.finish();
        assert!(doc.commands.contains(&Command::Fill));
        assert!(
            doc.commands
                .iter()
                .any(|c| matches!(c, Command::ShadingFill(Shading::Axial { .. })))
        );
        assert!(doc.commands.contains(&Command::Stroke));
        let saves = doc
            .commands
            .iter()
            .filter(|c| matches!(c, Command::SaveState))
            .count();
        let restores = doc
            .commands
            .iter()
            .filter(|c| matches!(c, Command::RestoreState))
            .count();
        assert_eq!(saves, restores);
    }

    #[test]
    fn colors_parse_named_rgb_and_hex() {
        assert_eq!(parse_color("#000").map(|c| c.0), Some(Color::BLACK));
        assert_eq!(parse_color("White").map(|c| c.0), Some(Color::WHITE));
        let (c, a) = parse_color("rgb(100%, 0%, 0%)").expect("rgb");
        assert_eq!((c, a), (Color::rgb(1.0, 0.0, 0.0), 1.0));
        assert!(parse_color("chartreuse-ish").is_none());
    }
}
