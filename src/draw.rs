use crate::font::FontVariant;
use crate::text::tracking_offsets;
use crate::types::{Color, Shading, ShadingStop};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Affine transform `[a b c d e f]` in canvas units, applied as `x' = a*x + c*y + e`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            e: x,
            f: y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn rotate(degrees: f32) -> Self {
        let rad = degrees.to_radians();
        let (s, c) = (libm::sinf(rad), libm::cosf(rad));
        Self {
            a: c,
            b: s,
            c: -s,
            d: c,
            ..Self::IDENTITY
        }
    }

    pub fn skew_x(degrees: f32) -> Self {
        Self {
            c: libm::tanf(degrees.to_radians()),
            ..Self::IDENTITY
        }
    }

    pub fn skew_y(degrees: f32) -> Self {
        Self {
            b: libm::tanf(degrees.to_radians()),
            ..Self::IDENTITY
        }
    }

    /// Approximate uniform scale, `sqrt(|det|)`. Used for stroke widths and font sizes.
    pub fn scale_factor(&self) -> f32 {
        let det = self.a * self.d - self.b * self.c;
        libm::sqrtf(det.abs())
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// `self` followed by `next` in the child's coordinate system, like SVG
    /// `transform="translate(..) scale(..)"`.
    pub fn then(self, next: Transform) -> Self {
        Self {
            a: self.a * next.a + self.c * next.b,
            b: self.b * next.a + self.d * next.b,
            c: self.a * next.c + self.c * next.d,
            d: self.b * next.c + self.d * next.d,
            e: self.a * next.e + self.c * next.f + self.e,
            f: self.b * next.e + self.d * next.f + self.f,
        }
    }

    pub fn apply(&self, point: Point) -> Point {
        Point::new(
            self.a * point.x + self.c * point.y + self.e,
            self.b * point.x + self.d * point.y + self.f,
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Paint {
    None,
    Solid(Color),
    Gradient(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f32,
}

impl Stroke {
    pub fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Color,
}

/// Linear gradient in user space. Stop offsets may lie outside `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    pub id: String,
    pub start: Point,
    pub end: Point,
    pub stops: Vec<GradientStop>,
}

impl LinearGradient {
    /// Axial shading equivalent to this gradient.
    ///
    /// PDF stop domains are `[0, 1]`, so out-of-range offsets extend the axis instead: the
    /// axis is stretched to cover `[min_offset, max_offset]` and the offsets are remapped into
    /// it. Colors between stops land at the same user-space positions as with CSS gradients.
    pub fn to_shading(&self) -> Option<Shading> {
        let mut stops = self.stops.clone();
        stops.retain(|s| s.offset.is_finite());
        if stops.is_empty() {
            return None;
        }
        stops.sort_by(|a, b| {
            a.offset
                .partial_cmp(&b.offset)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let min = stops.first().map(|s| s.offset.min(0.0)).unwrap_or(0.0);
        let max = stops.last().map(|s| s.offset.max(1.0)).unwrap_or(1.0);
        let span = max - min;
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let start = Point::new(self.start.x + dx * min, self.start.y + dy * min);
        let end = Point::new(self.start.x + dx * max, self.start.y + dy * max);
        let stops = stops
            .into_iter()
            .map(|stop| ShadingStop {
                offset: ((stop.offset - min) / span).clamp(0.0, 1.0),
                color: stop.color,
            })
            .collect();
        Some(Shading::Axial {
            x0: start.x,
            y0: start.y,
            x1: end.x,
            y1: end.y,
            stops,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontSpec {
    pub family: String,
    pub weight: u16,
    pub italic: bool,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, weight: u16, italic: bool) -> Self {
        Self {
            family: family.into(),
            weight,
            italic,
        }
    }

    pub fn variant(&self) -> FontVariant {
        FontVariant::from_weight(self.weight, self.italic)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub font: FontSpec,
    pub size: f32,
    pub fill: Color,
    /// Extra advance before each character after the first. Empty means untracked.
    pub tracking: Vec<f32>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, font: FontSpec, size: f32, fill: Color) -> Self {
        Self {
            text: text.into(),
            font,
            size,
            fill,
            tracking: Vec::new(),
        }
    }

    /// Letter-spaced run: one `tracking` offset per character after the first.
    pub fn tracked(mut self, tracking: f32) -> Self {
        self.tracking = if tracking == 0.0 {
            Vec::new()
        } else {
            tracking_offsets(&self.text, tracking)
        };
        self
    }

    /// Uniform tracking value, or 0 for untracked runs.
    pub fn tracking_value(&self) -> f32 {
        self.tracking.first().copied().unwrap_or(0.0)
    }
}

/// One or more runs laid out left to right from a shared anchor point.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub x: f32,
    pub y: f32,
    pub anchor: TextAnchor,
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    pub fn new(x: f32, y: f32, anchor: TextAnchor, runs: Vec<TextRun>) -> Self {
        Self { x, y, anchor, runs }
    }

    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawNode {
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Polygon {
        points: Vec<Point>,
        fill: Paint,
        stroke: Option<Stroke>,
    },
    Text(TextBlock),
    Group {
        transform: Transform,
        children: Vec<DrawNode>,
    },
    /// Opaque SVG fragment, drawn in the coordinate system of the enclosing group.
    Markup(String),
}

/// Back-to-front drawing of one page in canvas units.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawTree {
    pub width: f32,
    pub height: f32,
    pub gradients: Vec<LinearGradient>,
    pub nodes: Vec<DrawNode>,
}

impl DrawTree {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            gradients: Vec::new(),
            nodes: Vec::new(),
        }
    }

    pub fn gradient(&self, id: &str) -> Option<&LinearGradient> {
        self.gradients.iter().find(|g| g.id == id)
    }

    /// All text blocks in drawing order, descending into groups.
    pub fn text_blocks(&self) -> Vec<&TextBlock> {
        fn walk<'a>(nodes: &'a [DrawNode], out: &mut Vec<&'a TextBlock>) {
            for node in nodes {
                match node {
                    DrawNode::Text(block) => out.push(block),
                    DrawNode::Group { children, .. } => walk(children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gold() -> Color {
        Color::rgb(0.8, 0.7, 0.4)
    }

    #[test]
    fn tracked_run_has_one_offset_per_gap() {
        let font = FontSpec::new("Inter", 700, false);
        let run = TextRun::new("ACME", font.clone(), 24.0, Color::BLACK).tracked(2.0);
        assert_eq!(run.tracking, vec![2.0, 2.0, 2.0]);
        assert_eq!(run.tracking_value(), 2.0);
        let plain = TextRun::new("ACME", font, 24.0, Color::BLACK).tracked(0.0);
        assert!(plain.tracking.is_empty());
    }

    #[test]
    fn transform_then_applies_child_first() {
        let t = Transform::translate(10.0, 20.0).then(Transform::scale(0.5, 0.5));
        let p = t.apply(Point::new(4.0, 8.0));
        assert_eq!(p, Point::new(12.0, 24.0));
    }

    #[test]
    fn in_range_gradient_keeps_axis() {
        let g = LinearGradient {
            id: "g".to_string(),
            start: Point::new(0.0, 0.0),
            end: Point::new(100.0, 0.0),
            stops: vec![
                GradientStop {
                    offset: 0.0,
                    color: Color::BLACK,
                },
                GradientStop {
                    offset: 1.0,
                    color: gold(),
                },
            ],
        };
        let Some(Shading::Axial { x0, x1, stops, .. }) = g.to_shading() else {
            panic!("expected shading");
        };
        assert_eq!((x0, x1), (0.0, 100.0));
        assert_eq!(stops[1].offset, 1.0);
    }

    #[test]
    fn out_of_range_stops_extend_the_axis() {
        let g = LinearGradient {
            id: "g".to_string(),
            start: Point::new(0.0, 0.0),
            end: Point::new(100.0, 0.0),
            stops: vec![
                GradientStop {
                    offset: -0.1,
                    color: Color::BLACK,
                },
                GradientStop {
                    offset: 0.4,
                    color: gold(),
                },
                GradientStop {
                    offset: 1.2,
                    color: Color::BLACK,
                },
            ],
        };
        let Some(Shading::Axial { x0, x1, stops, .. }) = g.to_shading() else {
            panic!("expected shading");
        };
        assert!((x0 + 10.0).abs() < 1e-4);
        assert!((x1 - 120.0).abs() < 1e-4);
        assert_eq!(stops[0].offset, 0.0);
        assert_eq!(stops[2].offset, 1.0);
        // 0.4 on the original axis is x=40, which is (40 + 10) / 130 on the stretched axis.
        assert!((stops[1].offset - 50.0 / 130.0).abs() < 1e-4);
    }

    #[test]
    fn gradient_without_stops_has_no_shading() {
        let g = LinearGradient {
            id: "empty".to_string(),
            start: Point::new(0.0, 0.0),
            end: Point::new(1.0, 1.0),
            stops: Vec::new(),
        };
        assert!(g.to_shading().is_none());
    }

    #[test]
    fn text_blocks_descend_into_groups() {
        let font = FontSpec::new("Inter", 400, false);
        let mut tree = DrawTree::new(100.0, 100.0);
        tree.nodes.push(DrawNode::Group {
            transform: Transform::IDENTITY,
            children: vec![DrawNode::Text(TextBlock::new(
                1.0,
                2.0,
                TextAnchor::Start,
                vec![TextRun::new("inner", font, 10.0, Color::BLACK)],
            ))],
        });
        assert_eq!(tree.text_blocks().len(), 1);
        assert_eq!(tree.text_blocks()[0].text(), "inner");
    }
}
