use crate::canvas::{Command, Document};
use crate::debug::DebugLogger;
use crate::font::{FontProgramKind, FontRegistry, RegisteredFont};
use crate::types::{Color, Pt, Shading, ShadingStop};
use fixed::types::I32F32;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Write};

const PRODUCER: &str = concat!("certpress ", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct PdfOptions {
    /// Flate-compress content streams, font programs and CMaps.
    pub compress: bool,
    pub title: Option<String>,
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self {
            compress: true,
            title: None,
        }
    }
}

const PDF_CATALOG_ID: usize = 1;
const PDF_PAGES_ID: usize = 2;
const PDF_PAGE_ID: usize = 3;
const PDF_CONTENT_ID: usize = 4;

/// Object bodies indexed by object number minus one.
struct PdfObjects {
    bodies: Vec<Vec<u8>>,
}

impl PdfObjects {
    fn new() -> Self {
        // Catalog, page tree, page and content are filled in last.
        Self {
            bodies: vec![Vec::new(); PDF_CONTENT_ID],
        }
    }

    fn push(&mut self, body: impl Into<Vec<u8>>) -> usize {
        self.bodies.push(body.into());
        self.bodies.len()
    }

    fn set(&mut self, id: usize, body: impl Into<Vec<u8>>) {
        if let Some(slot) = self.bodies.get_mut(id - 1) {
            *slot = body.into();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FontEncoding {
    WinAnsi,
    IdentityH,
}

#[derive(Debug, Clone)]
struct FontResource {
    resource: String,
    encoding: FontEncoding,
}

#[derive(Debug, Clone, Copy)]
enum StreamFilter {
    None,
    Flate,
    AsciiHex,
}

/// Serializes a single-page document.
pub fn document_to_pdf(
    document: &Document,
    registry: Option<&FontRegistry>,
    options: &PdfOptions,
) -> io::Result<Vec<u8>> {
    document_to_pdf_with_logs(document, registry, options, None)
}

pub(crate) fn document_to_pdf_with_logs(
    document: &Document,
    registry: Option<&FontRegistry>,
    options: &PdfOptions,
    debug: Option<&DebugLogger>,
) -> io::Result<Vec<u8>> {
    let page_size = document.page_size;
    if page_size.width <= Pt::ZERO || page_size.height <= Pt::ZERO {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "page size must be positive",
        ));
    }

    let mut objects = PdfObjects::new();

    let font_names = collect_used_font_names(&document.commands);
    let usage = collect_font_usage(&document.commands, registry);
    let (font_map, font_resources) =
        build_font_objects(&mut objects, &font_names, registry, &usage, options, debug)?;
    let (gs_map, gs_resources) = build_extgstate_objects(&mut objects, &document.commands);
    let (shading_map, shading_resources) =
        build_shading_objects(&mut objects, &document.commands);

    let content = render_content(document, &font_map, &gs_map, &shading_map, registry, debug);
    let content_filter = if options.compress {
        StreamFilter::Flate
    } else {
        StreamFilter::None
    };
    objects.set(
        PDF_CONTENT_ID,
        stream_object("", content.as_bytes(), content_filter)?,
    );

    let mut resources = String::from("<<");
    if !font_resources.is_empty() {
        resources.push_str(&format!(" /Font {}", resource_dict(&font_resources)));
    }
    if !gs_resources.is_empty() {
        resources.push_str(&format!(" /ExtGState {}", resource_dict(&gs_resources)));
    }
    if !shading_resources.is_empty() {
        resources.push_str(&format!(" /Shading {}", resource_dict(&shading_resources)));
    }
    resources.push_str(" >>");

    objects.set(
        PDF_PAGE_ID,
        format!(
            "<< /Type /Page /Parent {} 0 R /MediaBox [0 0 {} {}] /Resources {} /Contents {} 0 R >>",
            PDF_PAGES_ID,
            fmt_pt(page_size.width),
            fmt_pt(page_size.height),
            resources,
            PDF_CONTENT_ID
        ),
    );
    objects.set(
        PDF_PAGES_ID,
        format!(
            "<< /Type /Pages /Kids [{} 0 R] /Count 1 >>",
            PDF_PAGE_ID
        ),
    );
    objects.set(
        PDF_CATALOG_ID,
        format!("<< /Type /Catalog /Pages {} 0 R >>", PDF_PAGES_ID),
    );
    let info_id = objects.push(info_object(options.title.as_deref()));

    if let Some(debug) = debug {
        debug.event(
            "pdf.summary",
            json!({
                "objects": objects.bodies.len(),
                "fonts": font_names.len(),
                "shadings": shading_resources.len(),
                "ext_gstates": gs_resources.len(),
                "content_bytes": content.len(),
                "compressed": options.compress,
            }),
        );
    }

    Ok(build_pdf(&objects, PDF_CATALOG_ID, info_id))
}

/// Fonts that draw at least one string, in first-use order.
fn collect_used_font_names(commands: &[Command]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut current_font = "Helvetica".to_string();
    for cmd in commands {
        match cmd {
            Command::SetFontName(name) => current_font = name.clone(),
            Command::DrawString { .. } => {
                if !names.contains(&current_font) {
                    names.push(current_font.clone());
                }
            }
            _ => {}
        }
    }
    names
}

/// Glyph id to source text, per registered font, for the W array and ToUnicode CMap.
fn collect_font_usage(
    commands: &[Command],
    registry: Option<&FontRegistry>,
) -> HashMap<String, BTreeMap<u16, String>> {
    let mut map: HashMap<String, BTreeMap<u16, String>> = HashMap::new();
    let Some(registry) = registry else {
        return map;
    };
    let mut current_font = "Helvetica".to_string();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();

    for cmd in commands {
        match cmd {
            Command::SetFontName(name) => current_font = name.clone(),
            Command::DrawString { text, .. } => {
                let Some(font) = registry.resolve_key(&current_font) else {
                    continue;
                };
                if !seen.insert((current_font.clone(), text.clone())) {
                    continue;
                }
                let glyph_map = shape_text_to_glyph_map(&font.data, text)
                    .unwrap_or_else(|| direct_glyph_map(font, text));
                let usage = map.entry(current_font.clone()).or_default();
                for (gid, s) in glyph_map {
                    usage.entry(gid).or_insert(s);
                }
            }
            _ => {}
        }
    }
    map
}

fn direct_glyph_map(font: &RegisteredFont, text: &str) -> BTreeMap<u16, String> {
    let mut map = BTreeMap::new();
    let Some(face) = font.face() else {
        return map;
    };
    for ch in text.chars() {
        if let Some(gid) = face.glyph_index(ch) {
            if gid.0 != 0 {
                map.entry(gid.0).or_insert_with(|| ch.to_string());
            }
        }
    }
    map
}

fn is_base14_font(name: &str) -> bool {
    matches!(
        name,
        "Courier"
            | "Courier-Bold"
            | "Courier-Oblique"
            | "Courier-BoldOblique"
            | "Helvetica"
            | "Helvetica-Bold"
            | "Helvetica-Oblique"
            | "Helvetica-BoldOblique"
            | "Times-Roman"
            | "Times-Bold"
            | "Times-Italic"
            | "Times-BoldItalic"
            | "Symbol"
            | "ZapfDingbats"
    )
}

type ResourceList = Vec<(String, usize)>;

fn build_font_objects(
    objects: &mut PdfObjects,
    font_names: &[String],
    registry: Option<&FontRegistry>,
    usage: &HashMap<String, BTreeMap<u16, String>>,
    options: &PdfOptions,
    debug: Option<&DebugLogger>,
) -> io::Result<(BTreeMap<String, FontResource>, ResourceList)> {
    let mut font_map = BTreeMap::new();
    let mut resources = Vec::new();

    for (index, name) in font_names.iter().enumerate() {
        let resource = format!("F{}", index + 1);
        let (font_id, encoding) = match registry.and_then(|r| r.resolve_key(name)) {
            Some(font) => {
                let glyph_map = usage.get(name).cloned().unwrap_or_default();
                let font_id = build_cidfont_objects(objects, font, &glyph_map, options)?;
                if let Some(debug) = debug {
                    debug.event(
                        "pdf.font.embedded",
                        json!({
                            "resource": resource,
                            "font": font.virtual_name,
                            "postscript_name": font.postscript_name,
                            "glyphs": glyph_map.len(),
                        }),
                    );
                }
                (font_id, FontEncoding::IdentityH)
            }
            None => {
                let base = if is_base14_font(name) {
                    name.as_str()
                } else {
                    if let Some(debug) = debug {
                        debug.event(
                            "pdf.font.substituted",
                            json!({ "requested": name, "used": "Helvetica" }),
                        );
                    }
                    "Helvetica"
                };
                (objects.push(font_object(base)), FontEncoding::WinAnsi)
            }
        };
        resources.push((resource.clone(), font_id));
        font_map.insert(name.clone(), FontResource { resource, encoding });
    }

    Ok((font_map, resources))
}

fn build_cidfont_objects(
    objects: &mut PdfObjects,
    font: &RegisteredFont,
    glyph_map: &BTreeMap<u16, String>,
    options: &PdfOptions,
) -> io::Result<usize> {
    let filter = if options.compress {
        StreamFilter::Flate
    } else {
        StreamFilter::AsciiHex
    };
    let font_file_id = objects.push(font_file_object(&font.data, font.program_kind, filter)?);
    let descriptor_id = objects.push(font_descriptor_object(font, font_file_id));

    let face = font.face();
    let mut w_entries: Vec<String> = Vec::new();
    for gid in glyph_map.keys() {
        let adv = face
            .as_ref()
            .map(|face| RegisteredFont::glyph_advance(face, *gid))
            .unwrap_or(0);
        let width = if adv > 0 {
            adv
        } else {
            font.metrics.missing_width
        };
        w_entries.push(format!("{} [{}]", gid, width));
    }
    let w_array = if w_entries.is_empty() {
        String::new()
    } else {
        format!(" /W [{}]", w_entries.join(" "))
    };

    let base = sanitize_font_name(&font.postscript_name);
    let (subtype, cid_to_gid) = match font.program_kind {
        FontProgramKind::TrueType => ("CIDFontType2", " /CIDToGIDMap /Identity"),
        FontProgramKind::OpenTypeCff => ("CIDFontType0", ""),
    };
    let cid_font_id = objects.push(format!(
        "<< /Type /Font /Subtype /{} /BaseFont /{} /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> /FontDescriptor {} 0 R /DW {}{}{} >>",
        subtype, base, descriptor_id, font.metrics.missing_width, w_array, cid_to_gid
    ));

    let cmap_filter = if options.compress {
        StreamFilter::Flate
    } else {
        StreamFilter::None
    };
    let to_unicode_id =
        objects.push(stream_object("", to_unicode_cmap(glyph_map).as_bytes(), cmap_filter)?);

    Ok(objects.push(format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} /Encoding /Identity-H /DescendantFonts [{} 0 R] /ToUnicode {} 0 R >>",
        base, cid_font_id, to_unicode_id
    )))
}

fn build_extgstate_objects(
    objects: &mut PdfObjects,
    commands: &[Command],
) -> (HashMap<(u16, u16), String>, ResourceList) {
    // (fill_alpha, stroke_alpha) in thousandths -> /GSn.
    let mut pairs: BTreeSet<(u16, u16)> = BTreeSet::new();
    for cmd in commands {
        if let Command::SetOpacity { fill, stroke } = cmd {
            pairs.insert((quantize_alpha(*fill), quantize_alpha(*stroke)));
        }
    }

    let mut resources = Vec::new();
    let mut name_map = HashMap::new();
    for (index, (f, s)) in pairs.into_iter().enumerate() {
        let name = format!("GS{}", index + 1);
        let obj_id = objects.push(format!(
            "<< /Type /ExtGState /ca {} /CA {} >>",
            format_milli(f as i64),
            format_milli(s as i64)
        ));
        resources.push((name.clone(), obj_id));
        name_map.insert((f, s), name);
    }
    (name_map, resources)
}

fn quantize_alpha(value: f32) -> u16 {
    ((value * 1000.0).round() as i32).clamp(0, 1000) as u16
}

fn build_shading_objects(
    objects: &mut PdfObjects,
    commands: &[Command],
) -> (HashMap<u64, String>, ResourceList) {
    // Identical shadings share one /ShN resource; first use decides the number.
    let mut order: Vec<(u64, &Shading)> = Vec::new();
    for cmd in commands {
        if let Command::ShadingFill(sh) = cmd {
            let key = hash_shading(sh);
            if !order.iter().any(|(k, _)| *k == key) {
                order.push((key, sh));
            }
        }
    }

    let mut resources = Vec::new();
    let mut name_map = HashMap::new();
    for (index, (key, shading)) in order.into_iter().enumerate() {
        let name = format!("Sh{}", index + 1);
        let sh_obj_id = shading_to_objects(objects, shading);
        resources.push((name.clone(), sh_obj_id));
        name_map.insert(key, name);
    }
    (name_map, resources)
}

fn flate_compress(data: &[u8]) -> io::Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn stream_object(extra_entries: &str, data: &[u8], filter: StreamFilter) -> io::Result<Vec<u8>> {
    let (payload, filter_entry) = match filter {
        StreamFilter::None => (data.to_vec(), ""),
        StreamFilter::Flate => (flate_compress(data)?, " /Filter /FlateDecode"),
        StreamFilter::AsciiHex => {
            let mut hex = ascii_hex_encode(data);
            hex.push('>');
            (hex.into_bytes(), " /Filter /ASCIIHexDecode")
        }
    };
    let mut out = format!(
        "<< /Length {}{}{} >>\nstream\n",
        payload.len(),
        filter_entry,
        extra_entries
    )
    .into_bytes();
    out.extend_from_slice(&payload);
    out.extend_from_slice(b"\nendstream");
    Ok(out)
}

fn font_descriptor_object(font: &RegisteredFont, font_file_id: usize) -> String {
    let base = sanitize_font_name(&font.postscript_name);
    let metrics = &font.metrics;
    // Nonsymbolic, plus FixedPitch and Italic when they apply.
    let mut flags = 32;
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    if font.variant.is_italic() {
        flags |= 64;
    }
    let font_file_entry = match font.program_kind {
        FontProgramKind::OpenTypeCff => "FontFile3",
        FontProgramKind::TrueType => "FontFile2",
    };
    format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags {} /FontBBox [{} {} {} {}] /ItalicAngle {} /Ascent {} /Descent {} /CapHeight {} /StemV {} /MissingWidth {} /{} {} 0 R >>",
        base,
        flags,
        metrics.bbox.0,
        metrics.bbox.1,
        metrics.bbox.2,
        metrics.bbox.3,
        metrics.italic_angle,
        metrics.ascent,
        metrics.descent,
        metrics.cap_height,
        metrics.stem_v,
        metrics.missing_width,
        font_file_entry,
        font_file_id
    )
}

fn font_file_object(data: &[u8], kind: FontProgramKind, filter: StreamFilter) -> io::Result<Vec<u8>> {
    let extra = match kind {
        FontProgramKind::OpenTypeCff => " /Subtype /OpenType".to_string(),
        FontProgramKind::TrueType => format!(" /Length1 {}", data.len()),
    };
    stream_object(&extra, data, filter)
}

fn ascii_hex_encode(data: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(data.len() * 2 + data.len() / 32);
    for (index, byte) in data.iter().enumerate() {
        let _ = write!(&mut out, "{:02X}", byte);
        if index % 32 == 31 {
            out.push('\n');
        }
    }
    out
}

fn font_object(base: &str) -> String {
    let encoding = if matches!(base, "Symbol" | "ZapfDingbats") {
        ""
    } else {
        " /Encoding /WinAnsiEncoding"
    };
    format!(
        "<< /Type /Font /Subtype /Type1 /BaseFont /{}{} >>",
        base, encoding
    )
}

fn resource_dict(entries: &[(String, usize)]) -> String {
    let entries = entries
        .iter()
        .map(|(resource, obj_id)| format!("/{} {} 0 R", resource, obj_id))
        .collect::<Vec<_>>();
    format!("<< {} >>", entries.join(" "))
}

fn sanitize_font_name(name: &str) -> String {
    let mut out = String::new();
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '-' {
            out.push(ch);
        } else if ch == ' ' {
            out.push('-');
        }
    }
    if out.is_empty() {
        "Helvetica".to_string()
    } else {
        out
    }
}

/// Page content. Canvas coordinates are top-left based, so the whole page is flipped once
/// and text matrices flip glyphs back upright.
fn render_content(
    document: &Document,
    font_map: &BTreeMap<String, FontResource>,
    gs_map: &HashMap<(u16, u16), String>,
    shading_map: &HashMap<u64, String>,
    registry: Option<&FontRegistry>,
    debug: Option<&DebugLogger>,
) -> String {
    let mut out = String::new();
    let mut current_font_size = Pt::from_f32(12.0);
    let mut current_font_name = "Helvetica".to_string();
    let mut tj_cache: HashMap<(String, String), Option<String>> = HashMap::new();

    out.push_str(&format!(
        "1 0 0 -1 0 {} cm\n",
        fmt_pt(document.page_size.height)
    ));

    for cmd in &document.commands {
        match cmd {
            Command::SaveState => out.push_str("q\n"),
            Command::RestoreState => out.push_str("Q\n"),
            Command::ConcatMatrix { a, b, c, d, e, f } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} cm\n",
                    fmt(*a),
                    fmt(*b),
                    fmt(*c),
                    fmt(*d),
                    fmt_pt(*e),
                    fmt_pt(*f)
                ));
            }
            Command::SetFillColor(color) => out.push_str(&color_to_pdf_fill(*color)),
            Command::SetStrokeColor(color) => out.push_str(&color_to_pdf_stroke(*color)),
            Command::SetLineWidth(width) => {
                out.push_str(&format!("{} w\n", fmt_pt(*width)));
            }
            Command::SetLineCap(cap) => {
                out.push_str(&format!("{} J\n", cap));
            }
            Command::SetLineJoin(join) => {
                out.push_str(&format!("{} j\n", join));
            }
            Command::SetMiterLimit(limit) => {
                out.push_str(&format!("{} M\n", fmt_pt(*limit)));
            }
            Command::SetDash { pattern, phase } => {
                let items = pattern.iter().map(|v| fmt_pt(*v)).collect::<Vec<_>>();
                out.push_str(&format!("[{}] {} d\n", items.join(" "), fmt_pt(*phase)));
            }
            Command::SetOpacity { fill, stroke } => {
                let key = (quantize_alpha(*fill), quantize_alpha(*stroke));
                if let Some(name) = gs_map.get(&key) {
                    out.push_str(&format!("/{} gs\n", name));
                }
            }
            Command::SetFontName(name) => current_font_name = name.clone(),
            Command::SetFontSize(size) => current_font_size = *size,
            Command::ClipPath { evenodd } => {
                out.push_str(if *evenodd { "W* n\n" } else { "W n\n" });
            }
            Command::ShadingFill(shading) => {
                if let Some(name) = shading_map.get(&hash_shading(shading)) {
                    out.push_str(&format!("/{} sh\n", name));
                }
            }
            Command::MoveTo { x, y } => {
                out.push_str(&format!("{} {} m\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::LineTo { x, y } => {
                out.push_str(&format!("{} {} l\n", fmt_pt(*x), fmt_pt(*y)));
            }
            Command::CurveTo {
                x1,
                y1,
                x2,
                y2,
                x,
                y,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} {} {} c\n",
                    fmt_pt(*x1),
                    fmt_pt(*y1),
                    fmt_pt(*x2),
                    fmt_pt(*y2),
                    fmt_pt(*x),
                    fmt_pt(*y),
                ));
            }
            Command::ClosePath => out.push_str("h\n"),
            Command::Fill => out.push_str("f\n"),
            Command::FillEvenOdd => out.push_str("f*\n"),
            Command::Stroke => out.push_str("S\n"),
            Command::FillStroke => out.push_str("B\n"),
            Command::FillStrokeEvenOdd => out.push_str("B*\n"),
            Command::DrawString { x, y, text } => {
                let Some(font_res) = font_map.get(&current_font_name) else {
                    continue;
                };
                out.push_str("BT\n");
                out.push_str(&format!(
                    "/{} {} Tf\n",
                    font_res.resource,
                    fmt_pt(current_font_size)
                ));
                out.push_str(&format!("1 0 0 -1 {} {} Tm\n", fmt_pt(*x), fmt_pt(*y)));
                match font_res.encoding {
                    FontEncoding::WinAnsi => {
                        let encoded = encode_winansi_pdf_string(text);
                        if let Some(debug) = debug {
                            if encoded.replaced > 0 {
                                debug.increment("pdf.winansi.replaced", encoded.replaced as u64);
                            }
                            if encoded.fallbacks > 0 {
                                debug.increment("pdf.winansi.fallback", encoded.fallbacks as u64);
                            }
                        }
                        out.push_str(&format!("({}) Tj\n", encoded.text));
                    }
                    FontEncoding::IdentityH => {
                        let font = registry.and_then(|r| r.resolve_key(&current_font_name));
                        let tj = tj_cache
                            .entry((current_font_name.clone(), text.clone()))
                            .or_insert_with(|| font.and_then(|f| shape_text_to_tj(f, text)));
                        match (tj.as_deref(), font) {
                            (Some(tj), _) => out.push_str(tj),
                            (None, Some(font)) => {
                                out.push_str(&format!("{} Tj\n", encode_cid_hex(font, text)));
                            }
                            (None, None) => {}
                        }
                    }
                }
                out.push_str("ET\n");
            }
            Command::DrawRect {
                x,
                y,
                width,
                height,
            } => {
                out.push_str(&format!(
                    "{} {} {} {} re\nf\n",
                    fmt_pt(*x),
                    fmt_pt(*y),
                    fmt_pt(*width),
                    fmt_pt(*height)
                ));
            }
        }
    }

    out
}

fn hash_shading(shading: &Shading) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();

    fn hash_f32(hasher: &mut DefaultHasher, v: f32) {
        v.to_bits().hash(hasher);
    }
    fn hash_stops(hasher: &mut DefaultHasher, stops: &[ShadingStop]) {
        stops.len().hash(hasher);
        for s in stops {
            hash_f32(hasher, s.offset);
            hash_f32(hasher, s.color.r);
            hash_f32(hasher, s.color.g);
            hash_f32(hasher, s.color.b);
        }
    }

    match shading {
        Shading::Axial {
            x0,
            y0,
            x1,
            y1,
            stops,
        } => {
            1u8.hash(&mut hasher);
            for v in [x0, y0, x1, y1] {
                hash_f32(&mut hasher, *v);
            }
            hash_stops(&mut hasher, stops);
        }
        Shading::Radial {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
            stops,
        } => {
            2u8.hash(&mut hasher);
            for v in [x0, y0, r0, x1, y1, r1] {
                hash_f32(&mut hasher, *v);
            }
            hash_stops(&mut hasher, stops);
        }
    }
    hasher.finish()
}

/// Emits the color function objects, then the shading dictionary. Coordinates are in the
/// user space current at the `sh` operator.
fn shading_to_objects(objects: &mut PdfObjects, shading: &Shading) -> usize {
    let fun_id = build_gradient_function_objects(objects, shading.stops());

    let sh_dict = match shading {
        Shading::Axial { x0, y0, x1, y1, .. } => format!(
            "<< /ShadingType 2 /ColorSpace /DeviceRGB /Coords [{} {} {} {}] /Function {} 0 R /Extend [true true] >>",
            fmt(*x0),
            fmt(*y0),
            fmt(*x1),
            fmt(*y1),
            fun_id
        ),
        Shading::Radial {
            x0,
            y0,
            r0,
            x1,
            y1,
            r1,
            ..
        } => format!(
            "<< /ShadingType 3 /ColorSpace /DeviceRGB /Coords [{} {} {} {} {} {}] /Function {} 0 R /Extend [true true] >>",
            fmt(*x0),
            fmt(*y0),
            fmt(*r0),
            fmt(*x1),
            fmt(*y1),
            fmt(*r1),
            fun_id
        ),
    };
    objects.push(sh_dict)
}

/// One Type 2 function per stop interval, stitched by a Type 3 function when there is
/// more than one interval. Returns the id of the function to reference.
fn build_gradient_function_objects(objects: &mut PdfObjects, stops: &[ShadingStop]) -> usize {
    let mut stops = stops.to_vec();
    for s in &mut stops {
        s.offset = s.offset.clamp(0.0, 1.0);
    }
    stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));

    let first = stops.first().map(|s| s.color).unwrap_or(Color::BLACK);
    let last = stops.last().map(|s| s.color).unwrap_or(first);
    if stops.first().is_none_or(|s| s.offset > 0.0) {
        stops.insert(
            0,
            ShadingStop {
                offset: 0.0,
                color: first,
            },
        );
    }
    if stops.last().is_none_or(|s| s.offset < 1.0) {
        stops.push(ShadingStop {
            offset: 1.0,
            color: last,
        });
    }

    let components = |c: Color| format!("{} {} {}", fmt(c.r), fmt(c.g), fmt(c.b));
    let seg_fun_ids: Vec<usize> = stops
        .windows(2)
        .map(|pair| {
            objects.push(format!(
                "<< /FunctionType 2 /Domain [0 1] /C0 [{}] /C1 [{}] /N 1 >>",
                components(pair[0].color),
                components(pair[1].color),
            ))
        })
        .collect();

    if let [only] = seg_fun_ids[..] {
        return only;
    }

    let bounds = stops[1..stops.len() - 1]
        .iter()
        .map(|s| fmt(s.offset))
        .collect::<Vec<_>>();
    let encode = vec!["0 1"; seg_fun_ids.len()];
    let fun_refs = seg_fun_ids
        .iter()
        .map(|id| format!("{} 0 R", id))
        .collect::<Vec<_>>();

    objects.push(format!(
        "<< /FunctionType 3 /Domain [0 1] /Functions [{}] /Bounds [{}] /Encode [{}] >>",
        fun_refs.join(" "),
        bounds.join(" "),
        encode.join(" "),
    ))
}

fn info_object(title: Option<&str>) -> String {
    let mut entries: Vec<String> = Vec::new();
    if let Some(title) = title {
        entries.push(format!("/Title {}", pdf_text_string(title)));
    }
    entries.push(format!("/Producer ({})", escape_pdf_string(PRODUCER)));
    format!("<< {} >>", entries.join(" "))
}

/// Literal string when the text is printable ASCII, UTF-16BE hex otherwise.
fn pdf_text_string(text: &str) -> String {
    if text.chars().all(|c| (' '..='~').contains(&c)) {
        return format!("({})", escape_pdf_string(text));
    }
    let mut out = String::from("<FEFF");
    for unit in text.encode_utf16() {
        out.push_str(&format!("{:04X}", unit));
    }
    out.push('>');
    out
}

fn build_pdf(objects: &PdfObjects, catalog_id: usize, info_id: usize) -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    out.extend_from_slice(b"%PDF-1.7\n");
    out.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

    let mut offsets = Vec::with_capacity(objects.bodies.len());
    for (index, body) in objects.bodies.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.bodies.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }

    let trailer = format!(
        "trailer\n<< /Size {} /Root {} 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.bodies.len() + 1,
        catalog_id,
        info_id,
        xref_start
    );
    out.extend_from_slice(trailer.as_bytes());
    out
}

fn escape_pdf_string(input: &str) -> String {
    let mut out = String::new();
    for ch in input.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(ch),
        }
    }
    out
}

struct WinAnsiEncoded {
    text: String,
    replaced: usize,
    fallbacks: usize,
}

fn encode_winansi_pdf_string(input: &str) -> WinAnsiEncoded {
    let mut out = String::new();
    let mut replaced = 0usize;
    let mut fallbacks = 0usize;
    for ch in input.chars() {
        // ASCII stand-ins for symbols outside WinAnsi.
        let stand_in = match ch {
            '\u{2265}' => Some(">="),
            '\u{2264}' => Some("<="),
            '\u{2212}' => Some("-"),
            '\u{2032}' => Some("'"),
            '\u{2033}' => Some("\""),
            _ => None,
        };
        if let Some(stand_in) = stand_in {
            out.push_str(stand_in);
            fallbacks += 1;
            continue;
        }

        let byte = match ch {
            '\u{0000}'..='\u{007F}' => ch as u8,
            '\u{00A0}'..='\u{00FF}' => ch as u8,
            // cp1252 extensions
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{0192}' => 0x83,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2020}' => 0x86,
            '\u{2021}' => 0x87,
            '\u{02C6}' => 0x88,
            '\u{2030}' => 0x89,
            '\u{0160}' => 0x8A,
            '\u{2039}' => 0x8B,
            '\u{0152}' => 0x8C,
            '\u{017D}' => 0x8E,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{02DC}' => 0x98,
            '\u{2122}' => 0x99,
            '\u{0161}' => 0x9A,
            '\u{203A}' => 0x9B,
            '\u{0153}' => 0x9C,
            '\u{017E}' => 0x9E,
            '\u{0178}' => 0x9F,
            _ => {
                replaced += 1;
                b'?'
            }
        };

        match byte {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            b if b < 0x20 || b >= 0x7f => out.push_str(&format!("\\{:03o}", b)),
            b => out.push(b as char),
        }
    }

    WinAnsiEncoded {
        text: out,
        replaced,
        fallbacks,
    }
}

fn to_unicode_cmap(glyph_map: &BTreeMap<u16, String>) -> String {
    let entries: Vec<(&u16, &String)> = glyph_map.iter().collect();

    let mut out = String::new();
    out.push_str("/CIDInit /ProcSet findresource begin\n");
    out.push_str("12 dict begin\n");
    out.push_str("begincmap\n");
    out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    out.push_str("/CMapName /Adobe-Identity-UCS def\n");
    out.push_str("/CMapType 2 def\n");
    out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    // At most 100 entries per bfchar block.
    for chunk in entries.chunks(100) {
        out.push_str(&format!("{} beginbfchar\n", chunk.len()));
        for (gid, s) in chunk {
            let uni: String = s
                .encode_utf16()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            out.push_str(&format!("<{:04X}> <{}>\n", gid, uni));
        }
        out.push_str("endbfchar\n");
    }

    out.push_str("endcmap\n");
    out.push_str("CMapName currentdict /CMap defineresource pop\n");
    out.push_str("end\nend\n");
    out
}

/// Unshaped glyph string through the font's cmap; unmapped characters become `.notdef`.
fn encode_cid_hex(font: &RegisteredFont, text: &str) -> String {
    let face = font.face();
    let mut out = String::from("<");
    for ch in text.chars() {
        let gid = face
            .as_ref()
            .and_then(|face| face.glyph_index(ch))
            .map(|g| g.0)
            .unwrap_or(0);
        out.push_str(&format!("{:04X}", gid));
    }
    out.push('>');
    out
}

fn shape_text_to_glyph_map(font_data: &[u8], text: &str) -> Option<BTreeMap<u16, String>> {
    let face = HbFace::from_slice(font_data, 0)?;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    if infos.is_empty() {
        return None;
    }

    // A glyph maps to the text of its cluster, up to the next larger cluster start.
    let mut boundaries: Vec<usize> = infos.iter().map(|g| g.cluster as usize).collect();
    boundaries.push(text.len());
    boundaries.sort_unstable();
    boundaries.dedup();

    let mut map: BTreeMap<u16, String> = BTreeMap::new();
    for info in infos {
        let start = (info.cluster as usize).min(text.len());
        let end = boundaries
            .iter()
            .copied()
            .find(|b| *b > start)
            .unwrap_or(text.len());
        let gid = info.glyph_id as u16;
        if gid != 0 && start < end {
            if let Some(s) = text.get(start..end) {
                map.entry(gid).or_insert_with(|| s.to_string());
            }
        }
    }
    Some(map)
}

/// Shaped glyph run as a TJ array. Kerning and offsets become TJ adjustments relative to
/// the advances published in the W array.
fn shape_text_to_tj(font: &RegisteredFont, text: &str) -> Option<String> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let metrics = font.face()?;
    let units_per_em = face.units_per_em().max(1);
    let scale = 1000.0 / units_per_em as f32;

    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let infos = output.glyph_infos();
    let positions = output.glyph_positions();
    if infos.is_empty() || infos.len() != positions.len() {
        return None;
    }

    let mut parts: Vec<String> = Vec::new();
    for (info, pos) in infos.iter().zip(positions.iter()) {
        let gid = info.glyph_id as u16;
        if gid == 0 {
            continue;
        }
        let x_offset = (pos.x_offset as f32 * scale).round() as i32;
        if x_offset != 0 {
            parts.push(format!("{}", -x_offset));
        }
        parts.push(format!("<{:04X}>", gid));

        let adv_default = RegisteredFont::glyph_advance(&metrics, gid) as i32;
        let adv_shaped = (pos.x_advance as f32 * scale).round() as i32;
        let adjust = adv_default - adv_shaped + x_offset;
        if adjust != 0 {
            parts.push(format!("{}", adjust));
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(format!("[{}] TJ\n", parts.join(" ")))
}

fn fmt(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_string();
    }
    let fixed = I32F32::saturating_from_num(value);
    let scaled = fixed.saturating_mul(I32F32::from_num(1000)).round();
    let milli: i64 = scaled.to_num();
    format_milli(milli)
}

fn format_milli(milli: i64) -> String {
    if milli == 0 {
        return "0".to_string();
    }
    let sign = if milli < 0 { "-" } else { "" };
    let abs = milli.unsigned_abs();
    let int_part = abs / 1000;
    let frac_part = abs % 1000;
    if frac_part == 0 {
        format!("{}{}", sign, int_part)
    } else {
        let frac = format!("{:03}", frac_part);
        format!("{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
    }
}

fn fmt_pt(value: Pt) -> String {
    format_milli(value.to_milli_i64())
}

fn color_to_pdf_fill(color: Color) -> String {
    format!(
        "{} {} {} rg\n",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0))
    )
}

fn color_to_pdf_stroke(color: Color) -> String {
    format!(
        "{} {} {} RG\n",
        fmt(color.r.clamp(0.0, 1.0)),
        fmt(color.g.clamp(0.0, 1.0)),
        fmt(color.b.clamp(0.0, 1.0))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Canvas;
    use crate::font::{FontVariant, font_key};
    use crate::types::Size;
    use std::io::Read;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn uncompressed() -> PdfOptions {
        PdfOptions {
            compress: false,
            title: None,
        }
    }

    fn count_token(bytes: &[u8], token: &[u8]) -> usize {
        if token.is_empty() || bytes.len() < token.len() {
            return 0;
        }
        bytes.windows(token.len()).filter(|w| *w == token).count()
    }

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "certpress_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    fn system_font() -> Option<Vec<u8>> {
        [
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
            "/usr/share/fonts/TTF/DejaVuSans.ttf",
            "/Library/Fonts/Arial.ttf",
            "C:\\Windows\\Fonts\\arial.ttf",
        ]
        .iter()
        .find_map(|p| std::fs::read(p).ok())
    }

    fn text_document(font: &str, text: &str) -> Document {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_font_name(font);
        canvas.set_font_size(Pt::from_f32(12.0));
        canvas.draw_string(Pt::from_f32(72.0), Pt::from_f32(100.0), text);
        canvas.finish()
    }

    #[test]
    fn to_unicode_cmap_handles_surrogates() {
        let mut map = BTreeMap::new();
        map.insert(3u16, "A".to_string());
        map.insert(4u16, "\u{1F600}".to_string());
        let cmap = to_unicode_cmap(&map);
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<0004> <D83DDE00>"));
    }

    #[test]
    fn empty_page_has_a4_media_box_and_trailer() {
        let doc = Canvas::new(Size::a4()).finish();
        let bytes = document_to_pdf(&doc, None, &uncompressed()).expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.starts_with("%PDF-1.7\n"));
        assert!(pdf.contains("/MediaBox [0 0 595.28 841.89]"));
        assert!(pdf.contains("/Type /Pages /Kids [3 0 R] /Count 1"));
        assert!(pdf.contains("/Producer (certpress "));
        assert!(pdf.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let doc = text_document("Helvetica", "Offsets");
        let bytes = document_to_pdf(&doc, None, &PdfOptions::default()).expect("pdf");
        let tail = String::from_utf8_lossy(&bytes);
        let start: usize = tail
            .rsplit("startxref\n")
            .next()
            .and_then(|rest| rest.lines().next())
            .and_then(|line| line.trim().parse().ok())
            .expect("startxref offset");
        assert!(bytes[start..].starts_with(b"xref\n0 "));
        let table = String::from_utf8_lossy(&bytes[start..]);
        let entries: Vec<usize> = table
            .lines()
            .skip(3)
            .take_while(|line| line.ends_with(" n "))
            .filter_map(|line| line.split(' ').next()?.parse().ok())
            .collect();
        assert!(!entries.is_empty());
        for (index, offset) in entries.iter().enumerate() {
            let expected = format!("{} 0 obj", index + 1);
            assert!(bytes[*offset..].starts_with(expected.as_bytes()));
        }
    }

    #[test]
    fn base14_text_is_flipped_upright_and_winansi_encoded() {
        let doc = text_document("Times-Italic", "Caf\u{e9} (A)");
        let bytes = document_to_pdf(&doc, None, &uncompressed()).expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("1 0 0 -1 0 841.89 cm"));
        assert!(pdf.contains("/F1 12 Tf"));
        assert!(pdf.contains("1 0 0 -1 72 100 Tm"));
        assert!(pdf.contains("(Caf\\351 \\(A\\)) Tj"));
        assert!(pdf.contains("/BaseFont /Times-Italic /Encoding /WinAnsiEncoding"));
    }

    #[test]
    fn unknown_fonts_without_registry_fall_back_to_helvetica() {
        let doc = text_document(&font_key("Inter", FontVariant::Bold), "Hi");
        let bytes = document_to_pdf(&doc, None, &uncompressed()).expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("/BaseFont /Helvetica /Encoding /WinAnsiEncoding"));
    }

    #[test]
    fn winansi_replacements_are_counted() {
        let doc = text_document("Helvetica", "A \u{2265} B \u{4e2d}");
        let path = temp_log_path("winansi");
        let logger = DebugLogger::new(&path).expect("debug logger");
        let bytes = document_to_pdf_with_logs(&doc, None, &uncompressed(), Some(&logger))
            .expect("pdf bytes");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("(A >= B ?) Tj"));
        assert_eq!(logger.counter("pdf.winansi.replaced"), 1);
        assert_eq!(logger.counter("pdf.winansi.fallback"), 1);
        logger.flush();
        let log = std::fs::read_to_string(&path).expect("read debug log");
        assert!(log.contains("\"pdf.summary\""));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn opacity_maps_to_shared_extgstate() {
        let mut canvas = Canvas::new(Size::a4());
        canvas.set_opacity(0.5, 0.25);
        canvas.draw_rect(Pt::ZERO, Pt::ZERO, Pt::from_f32(10.0), Pt::from_f32(10.0));
        canvas.set_opacity(0.5, 0.25);
        let bytes = document_to_pdf(&canvas.finish(), None, &uncompressed()).expect("pdf");
        assert_eq!(count_token(&bytes, b"/Type /ExtGState /ca 0.5 /CA 0.25"), 1);
        assert_eq!(count_token(&bytes, b"/GS1 gs"), 2);
        assert_eq!(count_token(&bytes, b"0 0 10 10 re\nf"), 1);
    }

    #[test]
    fn shadings_are_deduplicated_and_stitched() {
        let shading = Shading::Axial {
            x0: 0.0,
            y0: 0.0,
            x1: 100.0,
            y1: 0.0,
            stops: vec![
                ShadingStop {
                    offset: 0.0,
                    color: Color::BLACK,
                },
                ShadingStop {
                    offset: 0.5,
                    color: Color::WHITE,
                },
                ShadingStop {
                    offset: 1.0,
                    color: Color::BLACK,
                },
            ],
        };
        let mut canvas = Canvas::new(Size::a4());
        canvas.shading_fill(shading.clone());
        canvas.shading_fill(shading);
        let bytes = document_to_pdf(&canvas.finish(), None, &uncompressed()).expect("pdf");
        assert_eq!(count_token(&bytes, b"/ShadingType 2"), 1);
        assert_eq!(count_token(&bytes, b"/Sh1 sh"), 2);
        assert_eq!(count_token(&bytes, b"/FunctionType 2"), 2);
        assert_eq!(count_token(&bytes, b"/FunctionType 3"), 1);
        assert_eq!(count_token(&bytes, b"/Bounds [0.5]"), 1);
        assert_eq!(count_token(&bytes, b"/Matrix"), 0);
    }

    #[test]
    fn interior_single_stop_is_padded_and_stitched() {
        let mut objects = PdfObjects::new();
        let before = objects.bodies.len() + 1;
        let id = build_gradient_function_objects(
            &mut objects,
            &[ShadingStop {
                offset: 0.3,
                color: Color::WHITE,
            }],
        );
        // 0.3 is padded on both sides, giving two intervals and a stitch.
        assert_eq!(id, before + 2);
    }

    #[test]
    fn compressed_content_inflates_to_operators() {
        let doc = text_document("Helvetica", "Zip");
        let bytes = document_to_pdf(&doc, None, &PdfOptions::default()).expect("pdf");
        let marker = b"/Filter /FlateDecode >>\nstream\n";
        let start = bytes
            .windows(marker.len())
            .position(|w| w == marker)
            .expect("compressed stream")
            + marker.len();
        let end = start
            + bytes[start..]
                .windows(10)
                .position(|w| w == b"\nendstream")
                .expect("endstream");
        let mut decoder = flate2::read::ZlibDecoder::new(&bytes[start..end]);
        let mut content = String::new();
        decoder.read_to_string(&mut content).expect("inflate");
        assert!(content.contains("(Zip) Tj"));
    }

    #[test]
    fn title_is_written_to_info_dictionary() {
        let doc = Canvas::new(Size::a4()).finish();
        let options = PdfOptions {
            compress: false,
            title: Some("Share Certificate (SC-2025-007)".to_string()),
        };
        let bytes = document_to_pdf(&doc, None, &options).expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("/Title (Share Certificate \\(SC-2025-007\\))"));
        assert_eq!(pdf_text_string("\u{e9}"), "<FEFF00E9>");
    }

    #[test]
    fn output_is_deterministic() {
        let doc = text_document("Helvetica", "Same bytes");
        let a = document_to_pdf(&doc, None, &PdfOptions::default()).expect("pdf");
        let b = document_to_pdf(&doc, None, &PdfOptions::default()).expect("pdf");
        assert_eq!(a, b);
    }

    #[test]
    fn zero_page_size_is_rejected() {
        let doc = Canvas::new(Size {
            width: Pt::ZERO,
            height: Pt::from_f32(10.0),
        })
        .finish();
        let err = document_to_pdf(&doc, None, &uncompressed()).expect_err("invalid page");
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn registered_fonts_embed_as_cid_fonts() {
        let Some(data) = system_font() else {
            return;
        };
        let mut registry = FontRegistry::new();
        registry
            .register_bytes(data, "Inter", FontVariant::Regular)
            .expect("register font");
        let key = font_key("Inter", FontVariant::Regular);
        let doc = text_document(&key, "Share");
        let bytes = document_to_pdf(&doc, Some(&registry), &uncompressed()).expect("pdf");
        let pdf = String::from_utf8_lossy(&bytes);
        assert!(pdf.contains("/Subtype /Type0"));
        assert!(pdf.contains("/Encoding /Identity-H"));
        assert!(pdf.contains("/CIDToGIDMap /Identity"));
        assert!(pdf.contains("/FontFile2"));
        assert!(pdf.contains("/Filter /ASCIIHexDecode"));
        assert!(pdf.contains("] TJ"));
        assert!(pdf.contains("beginbfchar"));
    }

    #[test]
    fn unkerned_glyphs_need_no_tj_adjustment() {
        let Some(data) = system_font() else {
            return;
        };
        let mut registry = FontRegistry::new();
        registry
            .register_bytes(data, "Inter", FontVariant::Regular)
            .expect("register font");
        let font = registry
            .resolve("Inter", FontVariant::Regular)
            .expect("registered");
        let gid = font
            .face()
            .and_then(|face| face.glyph_index('l'))
            .expect("glyph for l")
            .0;
        let tj = shape_text_to_tj(font, "l").expect("shaped run");
        assert_eq!(tj, format!("[<{:04X}>] TJ\n", gid));
    }

    #[test]
    fn number_formatting_trims_trailing_zeros() {
        assert_eq!(fmt(1.5), "1.5");
        assert_eq!(fmt(-0.25), "-0.25");
        assert_eq!(fmt(2.0), "2");
        assert_eq!(fmt(f32::NAN), "0");
        assert_eq!(format_milli(-1005), "-1.005");
        assert_eq!(fmt_pt(Pt::from_f32(841.89)), "841.89");
    }
}
