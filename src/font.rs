use crate::error::CertificateError;
use crate::types::Pt;
use rustybuzz::{Face as HbFace, UnicodeBuffer};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use ttf_parser::GlyphId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontVariant {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontVariant {
    /// Accepts the style names used in font asset lists: `normal`, `bold`, `italic`,
    /// `bolditalic`.
    pub fn from_style(raw: &str) -> Option<Self> {
        let key: String = raw
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "normal" | "regular" => Some(FontVariant::Regular),
            "bold" => Some(FontVariant::Bold),
            "italic" | "oblique" => Some(FontVariant::Italic),
            "bolditalic" | "italicbold" => Some(FontVariant::BoldItalic),
            _ => None,
        }
    }

    pub fn from_weight(weight: u16, italic: bool) -> Self {
        match (weight >= 600, italic) {
            (false, false) => FontVariant::Regular,
            (true, false) => FontVariant::Bold,
            (false, true) => FontVariant::Italic,
            (true, true) => FontVariant::BoldItalic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FontVariant::Regular => "normal",
            FontVariant::Bold => "bold",
            FontVariant::Italic => "italic",
            FontVariant::BoldItalic => "bolditalic",
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, FontVariant::Bold | FontVariant::BoldItalic)
    }

    pub fn is_italic(&self) -> bool {
        matches!(self, FontVariant::Italic | FontVariant::BoldItalic)
    }

    // Nearest registered substitutes, best first.
    fn fallbacks(&self) -> &'static [FontVariant] {
        match self {
            FontVariant::Regular => &[],
            FontVariant::Bold => &[FontVariant::Regular],
            FontVariant::Italic => &[FontVariant::Regular],
            FontVariant::BoldItalic => &[
                FontVariant::Italic,
                FontVariant::Bold,
                FontVariant::Regular,
            ],
        }
    }
}

pub fn font_key(family: &str, variant: FontVariant) -> String {
    format!("{}:{}", normalize_family(family), variant.as_str())
}

fn normalize_family(name: &str) -> String {
    name.trim()
        .trim_matches('"')
        .trim_matches('\'')
        .to_ascii_lowercase()
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

/// Fonts registered under `(family, style)` pairs. Shared by the text measurer and the PDF
/// writer so that what is measured is what gets embedded.
#[derive(Debug)]
pub struct FontRegistry {
    fonts: Vec<RegisteredFont>,
    lookup: HashMap<String, usize>,
    text_width_cache: Mutex<TextWidthCache>,
}

#[derive(Debug)]
pub(crate) struct RegisteredFont {
    pub(crate) key: String,
    pub(crate) family: String,
    pub(crate) variant: FontVariant,
    pub(crate) postscript_name: String,
    pub(crate) virtual_name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) metrics: FontMetrics,
    pub(crate) program_kind: FontProgramKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

// Values in 1000-unit glyph space.
#[derive(Debug)]
pub(crate) struct FontMetrics {
    pub(crate) ascent: i16,
    pub(crate) descent: i16,
    pub(crate) cap_height: i16,
    pub(crate) italic_angle: i16,
    pub(crate) stem_v: i16,
    pub(crate) bbox: (i16, i16, i16, i16),
    pub(crate) missing_width: u16,
    pub(crate) is_fixed_pitch: bool,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            text_width_cache: Mutex::new(TextWidthCache::new(4_096)),
        }
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Registers a TrueType/OpenType program. A later registration of the same
    /// `(family, style)` replaces the earlier one.
    pub fn register_bytes(
        &mut self,
        data: Vec<u8>,
        family: &str,
        variant: FontVariant,
    ) -> Result<String, CertificateError> {
        let virtual_name = format!("{}-{}.ttf", family.trim(), variant.as_str());
        let face = ttf_parser::Face::parse(&data, 0).map_err(|err| {
            CertificateError::InvalidFont(format!("{virtual_name}: {err}"))
        })?;
        let postscript_name = postscript_name(&face).unwrap_or_else(|| {
            format!("{}-{}", family.trim().replace(' ', ""), variant.as_str())
        });
        let (metrics, program_kind) = FontMetrics::from_face(&face);

        let key = font_key(family, variant);
        let font = RegisteredFont {
            key: key.clone(),
            family: family.trim().to_string(),
            variant,
            postscript_name: postscript_name.clone(),
            virtual_name,
            data,
            metrics,
            program_kind,
        };
        match self.lookup.get(&key).copied() {
            Some(index) => self.fonts[index] = font,
            None => {
                self.lookup.insert(key, self.fonts.len());
                self.fonts.push(font);
            }
        }
        if let Ok(mut cache) = self.text_width_cache.lock() {
            let max_entries = cache.max_entries;
            *cache = TextWidthCache::new(max_entries);
        }
        Ok(postscript_name)
    }

    pub fn contains(&self, family: &str, variant: FontVariant) -> bool {
        self.lookup.contains_key(&font_key(family, variant))
    }

    /// Virtual file names of registered fonts, in registration order.
    pub fn virtual_names(&self) -> Vec<String> {
        self.fonts.iter().map(|f| f.virtual_name.clone()).collect()
    }

    pub(crate) fn resolve(&self, family: &str, variant: FontVariant) -> Option<&RegisteredFont> {
        std::iter::once(variant)
            .chain(variant.fallbacks().iter().copied())
            .find_map(|candidate| self.resolve_key(&font_key(family, candidate)))
    }

    pub(crate) fn resolve_key(&self, key: &str) -> Option<&RegisteredFont> {
        self.lookup.get(key).and_then(|index| self.fonts.get(*index))
    }

    /// Untracked advance width of `text`, or `None` when no font of `family` is registered.
    pub fn measure_text_width(
        &self,
        family: &str,
        variant: FontVariant,
        font_size: Pt,
        text: &str,
    ) -> Option<Pt> {
        let font = self.resolve(family, variant)?;
        let index = self.lookup.get(&font.key).copied()?;
        let cache_key = TextWidthKey {
            font_index: index,
            size_milli: font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.text_width_cache.lock() {
            if let Some(value) = cache.get(&cache_key) {
                return Some(value);
            }
        }
        let value = shaped_width(font, font_size, text)
            .unwrap_or_else(|| advance_width(font, font_size, text));
        if let Ok(mut cache) = self.text_width_cache.lock() {
            cache.insert(cache_key, value);
        }
        Some(value)
    }
}

impl RegisteredFont {
    pub(crate) fn face(&self) -> Option<ttf_parser::Face<'_>> {
        ttf_parser::Face::parse(&self.data, 0).ok()
    }

    pub(crate) fn glyph_advance(face: &ttf_parser::Face<'_>, gid: u16) -> u16 {
        let advance = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0);
        let units = face.units_per_em().max(1) as i64;
        let scaled = ((advance as i64) * 1000 + (units / 2)) / units;
        scaled.clamp(0, u16::MAX as i64) as u16
    }
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> (Self, FontProgramKind) {
        let units_per_em = face.units_per_em().max(1);
        let scale = 1000.0 / units_per_em as f32;

        let ascent = scale_i16(face.ascender(), scale);
        let descent = scale_i16(face.descender(), scale);
        let cap_height = face
            .capital_height()
            .map(|value| scale_i16(value, scale))
            .unwrap_or(ascent);
        let bbox = face.global_bounding_box();
        let bbox = (
            scale_i16(bbox.x_min, scale),
            scale_i16(bbox.y_min, scale),
            scale_i16(bbox.x_max, scale),
            scale_i16(bbox.y_max, scale),
        );
        let italic_angle = face
            .italic_angle()
            .map(|value| value.round() as i16)
            .unwrap_or(0);
        let missing_width = face
            .glyph_index(' ')
            .map(|gid| RegisteredFont::glyph_advance(face, gid.0))
            .unwrap_or(500);

        let program_kind = if face.tables().cff.is_some() {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };

        (
            Self {
                ascent,
                descent,
                cap_height,
                italic_angle,
                stem_v: if face.is_bold() { 120 } else { 80 },
                bbox,
                missing_width,
                is_fixed_pitch: face.is_monospaced(),
            },
            program_kind,
        )
    }
}

fn shaped_width(font: &RegisteredFont, font_size: Pt, text: &str) -> Option<Pt> {
    let face = HbFace::from_slice(&font.data, 0)?;
    let units_per_em = face.units_per_em().max(1) as i64;
    let mut buffer = UnicodeBuffer::new();
    buffer.push_str(text);
    let output = rustybuzz::shape(&face, &[], buffer);
    let positions = output.glyph_positions();
    if positions.is_empty() {
        return None;
    }
    let mut total_units: i32 = 0;
    for pos in positions {
        let adv = (((pos.x_advance as i64) * 1000 + (units_per_em / 2)) / units_per_em) as i32;
        total_units = total_units.saturating_add(adv);
    }
    if total_units <= 0 {
        return Some(Pt::ZERO);
    }
    Some(font_size.mul_ratio(total_units, 1000))
}

fn advance_width(font: &RegisteredFont, font_size: Pt, text: &str) -> Pt {
    let Some(face) = font.face() else {
        return Pt::ZERO;
    };
    let total_units: i32 = text
        .chars()
        .map(|ch| match face.glyph_index(ch) {
            Some(gid) => RegisteredFont::glyph_advance(&face, gid.0) as i32,
            None => font.metrics.missing_width as i32,
        })
        .fold(0i32, |acc, v| acc.saturating_add(v));
    font_size.mul_ratio(total_units, 1000)
}

fn scale_i16(value: i16, scale: f32) -> i16 {
    let scaled = (value as f32 * scale).round() as i32;
    scaled.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn postscript_name(face: &ttf_parser::Face<'_>) -> Option<String> {
    use ttf_parser::name::name_id;

    let mut full = None;
    for entry in face.names() {
        let Some(name) = entry.to_string() else {
            continue;
        };
        match entry.name_id {
            name_id::POST_SCRIPT_NAME => return Some(name),
            name_id::FULL_NAME if full.is_none() => full = Some(name.replace(' ', "-")),
            _ => {}
        }
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_names_map_to_variants() {
        assert_eq!(FontVariant::from_style("normal"), Some(FontVariant::Regular));
        assert_eq!(FontVariant::from_style(" Bold "), Some(FontVariant::Bold));
        assert_eq!(FontVariant::from_style("italic"), Some(FontVariant::Italic));
        assert_eq!(
            FontVariant::from_style("bold-italic"),
            Some(FontVariant::BoldItalic)
        );
        assert_eq!(FontVariant::from_style("heavy"), None);
    }

    #[test]
    fn weights_at_or_above_600_are_bold() {
        assert_eq!(FontVariant::from_weight(400, false), FontVariant::Regular);
        assert_eq!(FontVariant::from_weight(600, false), FontVariant::Bold);
        assert_eq!(FontVariant::from_weight(700, true), FontVariant::BoldItalic);
        assert!(FontVariant::from_weight(700, true).is_italic());
    }

    #[test]
    fn font_keys_normalize_family_names() {
        assert_eq!(font_key("'EB Garamond'", FontVariant::Italic), "eb garamond:italic");
        assert_eq!(font_key("Inter ", FontVariant::Bold), "inter:bold");
    }

    #[test]
    fn invalid_font_data_is_rejected() {
        let mut registry = FontRegistry::new();
        let err = registry
            .register_bytes(b"not a font".to_vec(), "Inter", FontVariant::Regular)
            .expect_err("invalid");
        assert!(matches!(err, CertificateError::InvalidFont(_)));
        assert!(err.to_string().contains("Inter-normal.ttf"));
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_family_has_no_measurement() {
        let registry = FontRegistry::new();
        assert!(
            registry
                .measure_text_width("Inter", FontVariant::Bold, Pt::from_f32(12.0), "ABC")
                .is_none()
        );
        assert!(!registry.contains("Inter", FontVariant::Bold));
    }

    #[test]
    fn text_width_cache_evicts_oldest_entries() {
        let mut cache = TextWidthCache::new(2);
        let key = |text: &str| TextWidthKey {
            font_index: 0,
            size_milli: 12_000,
            text: text.to_string(),
        };
        cache.insert(key("a"), Pt::from_f32(1.0));
        cache.insert(key("b"), Pt::from_f32(2.0));
        cache.insert(key("c"), Pt::from_f32(3.0));
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.get(&key("c")), Some(Pt::from_f32(3.0)));
    }
}
