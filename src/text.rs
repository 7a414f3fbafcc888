use crate::debug::DebugLogger;
use crate::draw::FontSpec;
use crate::font::FontRegistry;
use crate::types::Pt;

/// Average glyph advance, as a fraction of the font size, assumed when no font is available.
pub const FALLBACK_CHAR_RATIO: f32 = 0.6;

/// Width model shared by the composer (wrapping) and the renderer (anchoring).
///
/// With a registry, widths come from the registered font program; families the registry
/// does not know degrade to the approximate model instead of failing.
#[derive(Clone, Copy, Default)]
pub struct Measurer<'a> {
    registry: Option<&'a FontRegistry>,
    debug: Option<&'a DebugLogger>,
}

impl<'a> Measurer<'a> {
    pub fn approximate() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: &'a FontRegistry) -> Self {
        Self {
            registry: Some(registry),
            debug: None,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<&'a DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn registry(&self) -> Option<&'a FontRegistry> {
        self.registry
    }

    /// True when `font` is measured from a registered program rather than the approximation.
    pub fn has_metrics(&self, font: &FontSpec) -> bool {
        self.registry
            .is_some_and(|r| r.resolve(&font.family, font.variant()).is_some())
    }

    pub fn tracked_width(&self, text: &str, font: &FontSpec, size: f32, tracking: f32) -> f32 {
        let width = measure_tracked_width(text, font, size, tracking, self.registry);
        if let Some(debug) = self.debug {
            if !self.has_metrics(font) && !text.is_empty() {
                debug.increment("measure.fallback", 1);
            }
        }
        width
    }

    pub fn wrap(
        &self,
        text: &str,
        font: &FontSpec,
        size: f32,
        tracking: f32,
        max_width: f32,
    ) -> Vec<String> {
        wrap_text_to_width(text, max_width, |candidate| {
            self.tracked_width(candidate, font, size, tracking)
        })
    }
}

/// Rendered width of `text` with `tracking` added between consecutive characters.
///
/// Registered fonts give `advance + (n - 1) * tracking`. Otherwise each character is assumed
/// to take `size * 0.6 + tracking`. Non-empty text never measures below 1.0.
pub fn measure_tracked_width(
    text: &str,
    font: &FontSpec,
    size: f32,
    tracking: f32,
    registry: Option<&FontRegistry>,
) -> f32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0.0;
    }
    let measured = registry.and_then(|registry| {
        registry.measure_text_width(&font.family, font.variant(), Pt::from_f32(size), text)
    });
    let width = match measured {
        Some(base) => base.to_f32() + (chars.saturating_sub(1) as f32) * tracking,
        None => fallback_width(text, size, tracking),
    };
    if width.is_finite() { width.max(1.0) } else { 1.0 }
}

pub fn fallback_width(text: &str, size: f32, tracking: f32) -> f32 {
    text.chars().count() as f32 * (size * FALLBACK_CHAR_RATIO + tracking)
}

/// One offset per character after the first; the first character sits at the run origin.
pub fn tracking_offsets(text: &str, tracking: f32) -> Vec<f32> {
    let chars = text.chars().count();
    vec![tracking; chars.saturating_sub(1)]
}

/// Greedy word wrap. Words are whitespace-separated and re-joined with single spaces; a word
/// wider than `max_width` is placed alone on its own line rather than broken.
pub fn wrap_text_to_width(
    text: &str,
    max_width: f32,
    mut measure: impl FnMut(&str) -> f32,
) -> Vec<String> {
    let mut words = text.split_whitespace();
    let Some(first) = words.next() else {
        return vec![String::new()];
    };
    let mut lines = Vec::new();
    let mut line = first.to_string();
    for word in words {
        let candidate = format!("{line} {word}");
        if measure(&candidate) <= max_width {
            line = candidate;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        }
    }
    lines.push(line);
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inter_bold() -> FontSpec {
        FontSpec::new("Inter", 700, false)
    }

    #[test]
    fn fallback_width_matches_char_model() {
        let width = measure_tracked_width("AB", &inter_bold(), 10.0, 1.0, None);
        assert!((width - 14.0).abs() < 1e-5);
        assert_eq!(measure_tracked_width("", &inter_bold(), 10.0, 1.0, None), 0.0);
    }

    #[test]
    fn non_empty_text_never_measures_zero() {
        let width = measure_tracked_width("x", &inter_bold(), 0.0, 0.0, None);
        assert!(width >= 1.0);
        let negative = measure_tracked_width("xy", &inter_bold(), 1.0, -5.0, None);
        assert!(negative >= 1.0);
    }

    #[test]
    fn unknown_family_with_registry_uses_fallback() {
        let registry = FontRegistry::new();
        let measurer = Measurer::with_registry(&registry);
        let width = measurer.tracked_width("AB", &inter_bold(), 10.0, 1.0);
        assert!((width - 14.0).abs() < 1e-5);
    }

    #[test]
    fn tracking_offsets_skip_the_first_character() {
        let offsets = tracking_offsets("SHARE", 2.0);
        assert_eq!(offsets, vec![2.0; 4]);
        assert!(tracking_offsets("", 2.0).is_empty());
        assert!(tracking_offsets("A", 2.0).is_empty());
        assert_eq!(tracking_offsets("é√x", 1.5).len(), 2);
    }

    #[test]
    fn wrap_keeps_fitting_text_on_one_line() {
        let lines = wrap_text_to_width("  One   thousand shares ", 1_000.0, |s| s.len() as f32);
        assert_eq!(lines, vec!["One thousand shares".to_string()]);
    }

    #[test]
    fn wrap_of_empty_text_is_one_empty_line() {
        assert_eq!(wrap_text_to_width("", 10.0, |s| s.len() as f32), vec![String::new()]);
        assert_eq!(wrap_text_to_width("   ", 10.0, |s| s.len() as f32), vec![String::new()]);
    }

    #[test]
    fn wrapped_multi_word_lines_fit_the_width() {
        let measurer = Measurer::approximate();
        let font = inter_bold();
        let text = "Five Hundred Thousand Shares Of Common Stock Fully Paid And Non Assessable";
        let max = 200.0;
        let lines = measurer.wrap(text, &font, 16.0, 2.0, max);
        assert!(lines.len() > 1);
        for line in &lines {
            if line.contains(' ') {
                assert!(measurer.tracked_width(line, &font, 16.0, 2.0) <= max);
            }
        }
        assert_eq!(lines.join(" "), text);
    }

    #[test]
    fn oversized_word_sits_alone() {
        let lines = wrap_text_to_width("a Supercalifragilistic b", 5.0, |s| s.len() as f32);
        assert_eq!(lines, vec!["a", "Supercalifragilistic", "b"]);
    }
}
