use crate::debug::DebugLogger;
use crate::draw::{
    DrawNode, DrawTree, FontSpec, GradientStop, LinearGradient, Paint, Point, Stroke, TextAnchor,
    TextBlock, TextRun, Transform,
};
use crate::fields::{CertificateFields, DetailRow};
use crate::font::FontRegistry;
use crate::text::Measurer;
use crate::theme::{AccentTriangle, LayoutTheme};

/// Layout block whose baseline the vertical cursor positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBlock {
    Header,
    Title,
    Amount,
    AmountText,
    IssuedToLabel,
    IssuedToName,
    Details,
    Seal,
    Signatures,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowStep {
    pub block: FlowBlock,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub tree: DrawTree,
    pub flow: Vec<FlowStep>,
}

impl Composition {
    /// Lowest text baseline, i.e. the signature titles.
    pub fn content_bottom(&self) -> f32 {
        self.tree
            .text_blocks()
            .iter()
            .map(|block| block.y)
            .fold(0.0, f32::max)
    }
}

/// Classic layout, approximate text widths.
pub fn compose(fields: &CertificateFields, canvas_width: f32, canvas_height: f32) -> Composition {
    Composer::new(LayoutTheme::classic()).compose(fields, canvas_width, canvas_height)
}

pub struct Composer<'a> {
    theme: LayoutTheme,
    measurer: Measurer<'a>,
}

impl<'a> Composer<'a> {
    pub fn new(theme: LayoutTheme) -> Self {
        Self {
            theme,
            measurer: Measurer::approximate(),
        }
    }

    pub fn with_registry(mut self, registry: &'a FontRegistry) -> Self {
        self.measurer = Measurer::with_registry(registry);
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<&'a DebugLogger>) -> Self {
        self.measurer = self.measurer.with_debug(debug);
        self
    }

    pub fn theme(&self) -> &LayoutTheme {
        &self.theme
    }

    pub fn compose(&self, fields: &CertificateFields, width: f32, height: f32) -> Composition {
        let mut layout = Layout {
            theme: &self.theme,
            measurer: self.measurer,
            tree: DrawTree::new(width, height),
            flow: Vec::new(),
            cx: width / 2.0,
        };
        layout.frame();
        layout.body(fields);
        Composition {
            tree: layout.tree,
            flow: layout.flow,
        }
    }
}

struct Layout<'t, 'm> {
    theme: &'t LayoutTheme,
    measurer: Measurer<'m>,
    tree: DrawTree,
    flow: Vec<FlowStep>,
    cx: f32,
}

impl Layout<'_, '_> {
    fn sans(&self, bold: bool) -> FontSpec {
        let fonts = &self.theme.fonts;
        let weight = if bold {
            fonts.bold_weight
        } else {
            fonts.regular_weight
        };
        FontSpec::new(fonts.sans.clone(), weight, false)
    }

    fn script(&self) -> FontSpec {
        let fonts = &self.theme.fonts;
        FontSpec::new(fonts.script.clone(), fonts.regular_weight, true)
    }

    fn push(&mut self, node: DrawNode) {
        self.tree.nodes.push(node);
    }

    fn mark(&mut self, block: FlowBlock, y: f32) {
        self.flow.push(FlowStep { block, y });
    }

    fn centered(&mut self, y: f32, run: TextRun) {
        let x = self.cx;
        self.push(DrawNode::Text(TextBlock::new(
            x,
            y,
            TextAnchor::Middle,
            vec![run],
        )));
    }

    fn frame(&mut self) {
        let theme = self.theme;
        let (w, h) = (self.tree.width, self.tree.height);
        let palette = &theme.palette;
        let frame = &theme.frame;

        self.push(DrawNode::Rect {
            x: 0.0,
            y: 0.0,
            width: w,
            height: h,
            fill: Paint::Solid(palette.background),
            stroke: None,
        });
        let inset = frame.border_inset;
        self.push(DrawNode::Rect {
            x: inset,
            y: inset,
            width: (w - 2.0 * inset).max(0.0),
            height: (h - 2.0 * inset).max(0.0),
            fill: Paint::None,
            stroke: Some(Stroke::new(palette.frame, frame.border_width)),
        });

        let corner = Stroke::new(palette.frame, frame.corner_width);
        let near = frame.corner_inset;
        let reach = frame.corner_reach;
        let top_left = Point::new(near, near);
        let bottom_right = Point::new(w - near, h - near);
        for (from, to) in [
            (top_left, Point::new(near, reach)),
            (top_left, Point::new(reach, near)),
            (bottom_right, Point::new(w - near, h - reach)),
            (bottom_right, Point::new(w - reach, h - near)),
        ] {
            self.push(DrawNode::Line {
                from,
                to,
                stroke: corner,
            });
        }

        let top_right = accent_top_right(theme.accents.top_right, w);
        let bottom_left = accent_bottom_left(theme.accents.bottom_left, h);
        for (id, (points, start, end)) in [
            ("grad-top-right", top_right),
            ("grad-bottom-left", bottom_left),
        ] {
            self.tree.gradients.push(LinearGradient {
                id: id.to_string(),
                start,
                end,
                stops: theme
                    .accents
                    .stops
                    .iter()
                    .map(|s| GradientStop {
                        offset: s.offset,
                        color: s.color,
                    })
                    .collect(),
            });
            self.push(DrawNode::Polygon {
                points,
                fill: Paint::Gradient(id.to_string()),
                stroke: None,
            });
        }
    }

    fn body(&mut self, fields: &CertificateFields) {
        let theme = self.theme;
        let palette = &theme.palette;
        let scale = &theme.type_scale;
        let spacing = &theme.spacing;
        let tracking = theme.tracking;
        let cx = self.cx;

        let mut y = spacing.top;
        self.mark(FlowBlock::Header, y);
        let header = TextRun::new(&fields.company, self.sans(true), scale.header, palette.frame)
            .tracked(tracking);
        self.centered(y, header);

        y += spacing.after_header;
        self.mark(FlowBlock::Title, y);
        let title = TextRun::new(&fields.title, self.sans(true), scale.title, palette.ink)
            .tracked(tracking);
        self.centered(y, title);

        y += spacing.after_title;
        self.mark(FlowBlock::Amount, y);
        let figure = TextRun::new(
            &fields.amount_number,
            self.sans(true),
            scale.amount,
            palette.figure,
        );
        let shadow = TextRun {
            fill: palette.shadow,
            ..figure.clone()
        };
        self.push(DrawNode::Group {
            transform: Transform::translate(theme.shadow.dx, theme.shadow.dy),
            children: vec![DrawNode::Text(TextBlock::new(
                cx,
                y,
                TextAnchor::Middle,
                vec![shadow],
            ))],
        });
        self.centered(y, figure);

        y += spacing.after_amount;
        self.mark(FlowBlock::AmountText, y);
        let amount_font = self.sans(true);
        let line_height = scale.amount_text * scale.amount_line_height;
        let lines = self.measurer.wrap(
            &fields.amount_text,
            &amount_font,
            scale.amount_text,
            tracking,
            self.tree.width * spacing.amount_wrap_ratio,
        );
        for (index, line) in lines.iter().enumerate() {
            let run = TextRun::new(line, amount_font.clone(), scale.amount_text, palette.ink)
                .tracked(tracking);
            self.centered(y + index as f32 * line_height, run);
        }
        y += lines.len() as f32 * line_height + spacing.after_amount_text;

        self.mark(FlowBlock::IssuedToLabel, y);
        let label = TextRun::new(
            &fields.issued_to_label,
            self.sans(true),
            scale.label,
            palette.frame,
        )
        .tracked(tracking);
        self.centered(y, label);

        y += spacing.after_label;
        self.mark(FlowBlock::IssuedToName, y);
        let name = TextRun::new(&fields.issued_to_name, self.sans(true), scale.name, palette.ink);
        self.centered(y, name);
        let underline_y = y + spacing.underline_drop;
        self.push(DrawNode::Line {
            from: Point::new(cx - spacing.underline_half_width, underline_y),
            to: Point::new(cx + spacing.underline_half_width, underline_y),
            stroke: Stroke::new(palette.frame, spacing.underline_width),
        });

        y += spacing.after_name;
        self.mark(FlowBlock::Details, y);
        for (index, line) in fields.detail_lines().iter().enumerate() {
            let row = DetailRow::parse(line);
            let runs = vec![
                TextRun::new(row.label, self.sans(true), scale.detail, palette.frame)
                    .tracked(tracking),
                TextRun::new(
                    format!(" {}", row.value),
                    self.sans(false),
                    scale.detail,
                    palette.ink,
                )
                .tracked(tracking),
            ];
            self.push(DrawNode::Text(TextBlock::new(
                cx,
                y + index as f32 * spacing.detail_row_gap,
                TextAnchor::Middle,
                runs,
            )));
        }

        y += spacing.after_details;
        self.mark(FlowBlock::Seal, y);
        let seal = strip_svg_wrapper(&fields.seal_svg);
        if !seal.trim().is_empty() {
            self.push(DrawNode::Group {
                transform: Transform::translate(cx + spacing.seal_dx, y + spacing.seal_dy)
                    .then(Transform::scale(spacing.seal_scale, spacing.seal_scale)),
                children: vec![DrawNode::Markup(seal)],
            });
        }

        y += spacing.after_seal;
        self.mark(FlowBlock::Signatures, y);
        let line_stroke = Stroke::new(palette.frame, spacing.signature_line_width);
        for (index, (signer, role)) in fields.signatures().into_iter().enumerate() {
            let x = if index == 0 {
                cx - spacing.signature_dx
            } else {
                cx + spacing.signature_dx
            };
            let name_run = TextRun::new(signer, self.script(), scale.signature_name, palette.frame);
            self.push(DrawNode::Text(TextBlock::new(
                x,
                y,
                TextAnchor::Middle,
                vec![name_run],
            )));
            let line_y = y + spacing.signature_line_drop;
            self.push(DrawNode::Line {
                from: Point::new(x - spacing.signature_line_half_width, line_y),
                to: Point::new(x + spacing.signature_line_half_width, line_y),
                stroke: line_stroke,
            });
            let role_run = TextRun::new(role, self.sans(true), scale.signature_title, palette.ink);
            self.push(DrawNode::Text(TextBlock::new(
                x,
                y + spacing.signature_title_drop,
                TextAnchor::Middle,
                vec![role_run],
            )));
        }
    }
}

// Gradients in both corners run "to top left": from the lower-right tip to the upper-left tip.
fn accent_top_right(accent: AccentTriangle, width: f32) -> (Vec<Point>, Point, Point) {
    let corner = Point::new(width - accent.inset, accent.inset);
    let run_tip = Point::new(corner.x - accent.run, corner.y);
    let rise_tip = Point::new(corner.x, corner.y + accent.rise);
    (vec![corner, run_tip, rise_tip], rise_tip, run_tip)
}

fn accent_bottom_left(accent: AccentTriangle, height: f32) -> (Vec<Point>, Point, Point) {
    let corner = Point::new(accent.inset, height - accent.inset);
    let run_tip = Point::new(corner.x + accent.run, corner.y);
    let rise_tip = Point::new(corner.x, corner.y - accent.rise);
    (vec![corner, run_tip, rise_tip], run_tip, rise_tip)
}

/// Removes the seal's own `<svg ...>` opening tag and its matching (final) `</svg>`.
/// Anything ahead of the opening tag (XML declaration, doctype, comments) is dropped too.
///
/// Markup without an `<svg` tag is returned unchanged.
pub fn strip_svg_wrapper(markup: &str) -> String {
    let Some(open) = find_svg_open(markup) else {
        return markup.to_string();
    };
    let Some(open_end) = markup[open..].find('>').map(|i| open + i + 1) else {
        return String::new();
    };
    let body = &markup[open_end..];
    let body = match body.rfind("</svg>") {
        Some(close) => &body[..close],
        None => body,
    };
    body.to_string()
}

fn find_svg_open(markup: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(offset) = markup[from..].find("<svg") {
        let start = from + offset;
        let next = markup[start + 4..].chars().next();
        if next.is_none_or(|c| !c.is_ascii_alphanumeric() && c != '-' && c != ':') {
            return Some(start);
        }
        from = start + 4;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CanvasSize;

    fn sample_fields() -> CertificateFields {
        CertificateFields {
            company: "ACME HOLDINGS INC.".to_string(),
            title: "SHARE CERTIFICATE".to_string(),
            amount_number: "1,000".to_string(),
            amount_text: "One Thousand Shares of Common Stock, fully paid and non-assessable"
                .to_string(),
            issued_to_label: "THIS CERTIFIES THAT".to_string(),
            issued_to_name: "Jane Q. Holder".to_string(),
            cert_no: "Certificate No: SC-2025-007".to_string(),
            cert_class: "Class: Common".to_string(),
            cert_date: "Date: 10:30 AM, 1 May 2025".to_string(),
            signature1_name: "A. Founder".to_string(),
            signature1_title: "PRESIDENT".to_string(),
            signature2_name: "B. Keeper".to_string(),
            signature2_title: "SECRETARY".to_string(),
            seal_svg: r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 200 200"><circle cx="100" cy="100" r="90" fill="#d5a60c"/></svg>"##
                .to_string(),
        }
    }

    fn certificate() -> Composition {
        let size = CanvasSize::CERTIFICATE;
        compose(&sample_fields(), size.width, size.height)
    }

    #[test]
    fn flow_is_monotonic_and_fits_the_canvas() {
        let composition = certificate();
        assert_eq!(composition.flow.len(), 9);
        for pair in composition.flow.windows(2) {
            assert!(pair[1].y > pair[0].y, "{:?} -> {:?}", pair[0], pair[1]);
        }
        let bottom = composition.content_bottom();
        assert!(bottom > composition.flow[8].y);
        assert!(bottom < CanvasSize::CERTIFICATE.height);
    }

    #[test]
    fn classic_flow_uses_fixed_increments() {
        let composition = certificate();
        let y = |block: FlowBlock| {
            composition
                .flow
                .iter()
                .find(|step| step.block == block)
                .map(|step| step.y)
                .expect("block")
        };
        assert_eq!(y(FlowBlock::Header), 88.0);
        assert_eq!(y(FlowBlock::Title), 148.0);
        assert_eq!(y(FlowBlock::Amount), 308.0);
        assert_eq!(y(FlowBlock::AmountText), 356.0);
        assert_eq!(y(FlowBlock::Seal) - y(FlowBlock::Details), 100.0);
        assert_eq!(y(FlowBlock::Signatures) - y(FlowBlock::Seal), 320.0);
    }

    #[test]
    fn amount_advance_depends_on_wrapped_line_count() {
        let mut short = sample_fields();
        short.amount_text = "One Thousand".to_string();
        let size = CanvasSize::CERTIFICATE;
        let one = compose(&short, size.width, size.height);
        let label_y = |c: &Composition| {
            c.flow
                .iter()
                .find(|s| s.block == FlowBlock::IssuedToLabel)
                .map(|s| s.y)
                .expect("label")
        };
        assert_eq!(label_y(&one), 356.0 + 22.0 + 58.0);

        let mut long = sample_fields();
        long.amount_text = "word ".repeat(120);
        let many = compose(&long, size.width, size.height);
        assert!(label_y(&many) > label_y(&one) + 22.0);
    }

    #[test]
    fn detail_rows_have_label_and_value_runs() {
        let composition = certificate();
        let rows: Vec<&TextBlock> = composition
            .tree
            .text_blocks()
            .into_iter()
            .filter(|b| b.runs.len() == 2)
            .collect();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].runs[0].text, "CERTIFICATE NO:");
        assert_eq!(rows[0].runs[1].text, " SC-2025-007");
        assert_eq!(rows[0].runs[0].font.weight, 700);
        assert_eq!(rows[0].runs[1].font.weight, 400);
        assert_eq!(rows[2].runs[1].text, " 10:30 AM, 1 May 2025");
        assert_eq!(rows[1].y - rows[0].y, 24.0);
    }

    #[test]
    fn tracked_runs_carry_one_offset_per_gap() {
        let composition = certificate();
        let header = composition.tree.text_blocks()[0];
        let run = &header.runs[0];
        assert_eq!(run.text, "ACME HOLDINGS INC.");
        assert_eq!(run.tracking.len(), run.text.chars().count() - 1);
    }

    #[test]
    fn amount_shadow_is_an_offset_duplicate() {
        let composition = certificate();
        let shadow = composition.tree.nodes.iter().find_map(|node| match node {
            DrawNode::Group {
                transform,
                children,
            } => match children.first() {
                Some(DrawNode::Text(block)) => Some((*transform, block.clone())),
                _ => None,
            },
            _ => None,
        });
        let (transform, block) = shadow.expect("shadow group");
        assert_eq!(transform, Transform::translate(1.0, 3.0));
        assert_eq!(block.runs[0].text, "1,000");
    }

    #[test]
    fn seal_is_wrapped_in_a_scaled_group() {
        let composition = certificate();
        let seal = composition.tree.nodes.iter().find_map(|node| match node {
            DrawNode::Group {
                transform,
                children,
            } => match children.first() {
                Some(DrawNode::Markup(markup)) => Some((*transform, markup.clone())),
                _ => None,
            },
            _ => None,
        });
        let (transform, markup) = seal.expect("seal group");
        assert!(markup.starts_with("<circle"));
        assert!(!markup.contains("svg"));
        assert_eq!(transform.a, 0.6);
        assert!((transform.e - (793.7 / 2.0 - 110.0)).abs() < 1e-3);
    }

    #[test]
    fn accents_reference_gradients() {
        let composition = certificate();
        assert_eq!(composition.tree.gradients.len(), 2);
        let top_right = composition.tree.gradient("grad-top-right").expect("gradient");
        assert!((top_right.start.x - (793.7 - 8.0)).abs() < 1e-3);
        assert_eq!(top_right.start.y, 100.0);
        assert!((top_right.end.x - (793.7 - 235.0)).abs() < 1e-3);
        let bottom_left = composition.tree.gradient("grad-bottom-left").expect("gradient");
        assert_eq!(bottom_left.start.x, 460.0);
        assert!((bottom_left.end.y - (1122.5 - 170.0)).abs() < 1e-3);
    }

    #[test]
    fn empty_fields_still_compose() {
        let size = CanvasSize::CERTIFICATE;
        let composition = compose(&CertificateFields::default(), size.width, size.height);
        assert_eq!(composition.flow.len(), 9);
        let has_seal = composition.tree.nodes.iter().any(|node| match node {
            DrawNode::Group { children, .. } => {
                children.iter().any(|c| matches!(c, DrawNode::Markup(_)))
            }
            _ => false,
        });
        assert!(!has_seal);
    }

    #[test]
    fn strip_svg_wrapper_removes_outer_tags_only() {
        assert_eq!(
            strip_svg_wrapper(r#"<svg viewBox="0 0 1 1"><g><svg x="1"></svg></g></svg>"#),
            r#"<g><svg x="1"></svg></g>"#
        );
        assert_eq!(strip_svg_wrapper("<circle r=\"1\"/>"), "<circle r=\"1\"/>");
        assert_eq!(strip_svg_wrapper("<svgx/><svg>a</svg>"), "a");
        assert_eq!(strip_svg_wrapper("<svg"), "");
    }

    #[test]
    fn strip_svg_wrapper_drops_prolog_and_comments() {
        let seal = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
            <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"svg11.dtd\">\n\
            <!-- company seal -->\n\
            <svg viewBox=\"0 0 10 10\"><circle r=\"4\"/></svg>\n";
        assert_eq!(strip_svg_wrapper(seal), "<circle r=\"4\"/>");
    }
}
