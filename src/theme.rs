use crate::error::CertificateError;
use crate::types::Color;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

/// Every color, size and increment the composer uses. Field defaults are the classic layout,
/// so a theme file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutTheme {
    pub name: String,
    pub palette: Palette,
    pub fonts: FontFamilies,
    pub type_scale: TypeScale,
    /// Letter spacing for the tracked blocks (header, title, amount text, label, details).
    pub tracking: f32,
    pub frame: FrameGeometry,
    pub accents: Accents,
    pub shadow: Offset,
    pub spacing: Spacing,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Palette {
    pub background: Color,
    pub frame: Color,
    pub ink: Color,
    pub figure: Color,
    pub shadow: Color,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FontFamilies {
    pub sans: String,
    pub script: String,
    pub regular_weight: u16,
    pub bold_weight: u16,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TypeScale {
    pub header: f32,
    pub title: f32,
    pub amount: f32,
    pub amount_text: f32,
    pub amount_line_height: f32,
    pub label: f32,
    pub name: f32,
    pub detail: f32,
    pub signature_name: f32,
    pub signature_title: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameGeometry {
    pub border_inset: f32,
    pub border_width: f32,
    pub corner_inset: f32,
    pub corner_reach: f32,
    pub corner_width: f32,
}

/// Right triangle tucked into a page corner: `inset` from both edges, legs `run` (horizontal)
/// and `rise` (vertical).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AccentTriangle {
    pub inset: f32,
    pub run: f32,
    pub rise: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeStop {
    pub offset: f32,
    pub color: Color,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Accents {
    pub top_right: AccentTriangle,
    pub bottom_left: AccentTriangle,
    pub stops: Vec<ThemeStop>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Offset {
    pub dx: f32,
    pub dy: f32,
}

/// Vertical flow increments and horizontal offsets, in canvas units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Spacing {
    pub top: f32,
    pub after_header: f32,
    pub after_title: f32,
    pub after_amount: f32,
    pub amount_wrap_ratio: f32,
    pub after_amount_text: f32,
    pub after_label: f32,
    pub underline_drop: f32,
    pub underline_half_width: f32,
    pub underline_width: f32,
    pub after_name: f32,
    pub detail_row_gap: f32,
    pub after_details: f32,
    pub seal_dx: f32,
    pub seal_dy: f32,
    pub seal_scale: f32,
    pub after_seal: f32,
    pub signature_dx: f32,
    pub signature_line_half_width: f32,
    pub signature_line_drop: f32,
    pub signature_line_width: f32,
    pub signature_title_drop: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeVariant {
    Classic,
    Ledger,
}

impl ThemeVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeVariant::Classic => "classic",
            ThemeVariant::Ledger => "ledger",
        }
    }

    pub fn theme(&self) -> LayoutTheme {
        match self {
            ThemeVariant::Classic => LayoutTheme::classic(),
            ThemeVariant::Ledger => LayoutTheme::ledger(),
        }
    }
}

impl FromStr for ThemeVariant {
    type Err = CertificateError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "classic" | "gold" => Ok(ThemeVariant::Classic),
            "ledger" | "navy" => Ok(ThemeVariant::Ledger),
            other => Err(CertificateError::InvalidTheme(format!(
                "unknown theme '{other}' (expected classic or ledger)"
            ))),
        }
    }
}

fn hex(raw: &str) -> Color {
    Color::from_hex(raw).unwrap_or(Color::BLACK)
}

fn stop(offset: f32, color: &str) -> ThemeStop {
    ThemeStop {
        offset,
        color: hex(color),
    }
}

impl Default for LayoutTheme {
    fn default() -> Self {
        Self::classic()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            background: hex("#f9eeee"),
            frame: hex("#7a6d4d"),
            ink: hex("#1f2121"),
            figure: hex("#d5a60c"),
            shadow: hex("#5f5c5c"),
        }
    }
}

impl Default for FontFamilies {
    fn default() -> Self {
        Self {
            sans: "Inter".to_string(),
            script: "EB Garamond".to_string(),
            regular_weight: 400,
            bold_weight: 700,
        }
    }
}

impl Default for TypeScale {
    fn default() -> Self {
        Self {
            header: 24.0,
            title: 48.0,
            amount: 82.0,
            amount_text: 16.0,
            amount_line_height: 1.375,
            label: 14.0,
            name: 24.0,
            detail: 14.0,
            signature_name: 28.0,
            signature_title: 14.0,
        }
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            border_inset: 8.0,
            border_width: 1.0,
            corner_inset: 16.0,
            corner_reach: 208.0,
            corner_width: 2.0,
        }
    }
}

impl Default for AccentTriangle {
    fn default() -> Self {
        Self {
            inset: 8.0,
            run: 227.0,
            rise: 92.0,
        }
    }
}

impl Default for Accents {
    fn default() -> Self {
        Self {
            top_right: AccentTriangle::default(),
            bottom_left: AccentTriangle {
                inset: 9.0,
                run: 451.0,
                rise: 161.0,
            },
            stops: vec![
                stop(-0.1, "#332e36"),
                stop(0.4, "#d8ba6a"),
                stop(0.6, "#a1822c"),
                stop(0.8, "#a1822c"),
                stop(1.2, "#332e36"),
            ],
        }
    }
}

impl Default for Offset {
    fn default() -> Self {
        Self { dx: 1.0, dy: 3.0 }
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            // 48 outer padding + 16 content padding + 24 baseline.
            top: 88.0,
            after_header: 60.0,
            after_title: 160.0,
            after_amount: 48.0,
            amount_wrap_ratio: 0.8,
            after_amount_text: 58.0,
            after_label: 30.0,
            underline_drop: 8.0,
            underline_half_width: 200.0,
            underline_width: 1.0,
            after_name: 50.0,
            detail_row_gap: 24.0,
            after_details: 100.0,
            seal_dx: -110.0,
            seal_dy: -30.0,
            seal_scale: 0.6,
            after_seal: 320.0,
            signature_dx: 180.0,
            signature_line_half_width: 128.0,
            signature_line_drop: 10.0,
            signature_line_width: 2.0,
            signature_title_drop: 30.0,
        }
    }
}

impl LayoutTheme {
    pub fn classic() -> Self {
        Self {
            name: ThemeVariant::Classic.as_str().to_string(),
            palette: Palette::default(),
            fonts: FontFamilies::default(),
            type_scale: TypeScale::default(),
            tracking: 2.0,
            frame: FrameGeometry::default(),
            accents: Accents::default(),
            shadow: Offset::default(),
            spacing: Spacing::default(),
        }
    }

    /// Navy and silver variant with a softer shadow and slightly tighter flow.
    pub fn ledger() -> Self {
        let classic = Self::classic();
        Self {
            name: ThemeVariant::Ledger.as_str().to_string(),
            palette: Palette {
                background: hex("#f3f5f8"),
                frame: hex("#1d2b4f"),
                ink: hex("#121826"),
                figure: hex("#8a94a6"),
                shadow: hex("#1d2b4f"),
            },
            tracking: 1.5,
            accents: Accents {
                stops: vec![
                    stop(-0.1, "#0f1730"),
                    stop(0.35, "#c9ced8"),
                    stop(0.6, "#7d8799"),
                    stop(0.85, "#7d8799"),
                    stop(1.2, "#0f1730"),
                ],
                ..classic.accents.clone()
            },
            shadow: Offset { dx: 2.0, dy: 2.0 },
            spacing: Spacing {
                after_title: 150.0,
                after_amount_text: 54.0,
                detail_row_gap: 26.0,
                after_seal: 310.0,
                ..classic.spacing.clone()
            },
            ..classic
        }
    }

    pub fn from_variant(variant: ThemeVariant) -> Self {
        variant.theme()
    }

    pub fn from_json(raw: &str) -> Result<Self, CertificateError> {
        let theme: LayoutTheme = serde_json::from_str(raw)
            .map_err(|err| CertificateError::InvalidTheme(err.to_string()))?;
        theme.validate()?;
        Ok(theme)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CertificateError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), CertificateError> {
        let sizes = [
            ("type_scale.header", self.type_scale.header),
            ("type_scale.title", self.type_scale.title),
            ("type_scale.amount", self.type_scale.amount),
            ("type_scale.amount_text", self.type_scale.amount_text),
            ("type_scale.amount_line_height", self.type_scale.amount_line_height),
            ("type_scale.label", self.type_scale.label),
            ("type_scale.name", self.type_scale.name),
            ("type_scale.detail", self.type_scale.detail),
            ("type_scale.signature_name", self.type_scale.signature_name),
            ("type_scale.signature_title", self.type_scale.signature_title),
            ("spacing.seal_scale", self.spacing.seal_scale),
            ("spacing.amount_wrap_ratio", self.spacing.amount_wrap_ratio),
        ];
        for (name, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return Err(CertificateError::InvalidTheme(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        let spacing = &self.spacing;
        let increments = [
            ("spacing.top", spacing.top),
            ("spacing.after_header", spacing.after_header),
            ("spacing.after_title", spacing.after_title),
            ("spacing.after_amount", spacing.after_amount),
            ("spacing.after_amount_text", spacing.after_amount_text),
            ("spacing.after_label", spacing.after_label),
            ("spacing.after_name", spacing.after_name),
            ("spacing.detail_row_gap", spacing.detail_row_gap),
            ("spacing.after_details", spacing.after_details),
            ("spacing.after_seal", spacing.after_seal),
        ];
        for (name, value) in increments {
            if !value.is_finite() || value < 0.0 {
                return Err(CertificateError::InvalidTheme(format!(
                    "{name} must be a non-negative increment, got {value}"
                )));
            }
        }
        let offsets = [
            ("tracking", self.tracking),
            ("shadow.dx", self.shadow.dx),
            ("shadow.dy", self.shadow.dy),
            ("spacing.underline_drop", spacing.underline_drop),
            ("spacing.underline_half_width", spacing.underline_half_width),
            ("spacing.underline_width", spacing.underline_width),
            ("spacing.seal_dx", spacing.seal_dx),
            ("spacing.seal_dy", spacing.seal_dy),
            ("spacing.signature_dx", spacing.signature_dx),
            ("spacing.signature_line_half_width", spacing.signature_line_half_width),
            ("spacing.signature_line_drop", spacing.signature_line_drop),
            ("spacing.signature_line_width", spacing.signature_line_width),
            ("spacing.signature_title_drop", spacing.signature_title_drop),
        ];
        if let Some((name, value)) = offsets.iter().find(|(_, value)| !value.is_finite()) {
            return Err(CertificateError::InvalidTheme(format!(
                "{name} must be finite, got {value}"
            )));
        }
        if self.spacing.amount_wrap_ratio > 1.0 {
            return Err(CertificateError::InvalidTheme(
                "spacing.amount_wrap_ratio must be at most 1".to_string(),
            ));
        }
        if self.accents.stops.is_empty() {
            return Err(CertificateError::InvalidTheme(
                "accents.stops must not be empty".to_string(),
            ));
        }
        if self.fonts.sans.trim().is_empty() || self.fonts.script.trim().is_empty() {
            return Err(CertificateError::InvalidTheme(
                "font families must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_matches_reference_layout() {
        let theme = LayoutTheme::classic();
        assert_eq!(theme.palette.background, Color::from_hex("#f9eeee").expect("hex"));
        assert_eq!(theme.spacing.top, 88.0);
        assert_eq!(theme.accents.stops.len(), 5);
        assert_eq!(theme.accents.stops[0].offset, -0.1);
        assert_eq!(theme.accents.stops[4].offset, 1.2);
        assert!(theme.validate().is_ok());
    }

    #[test]
    fn variants_parse_by_name() {
        assert_eq!("Classic".parse::<ThemeVariant>().ok(), Some(ThemeVariant::Classic));
        assert_eq!(" ledger ".parse::<ThemeVariant>().ok(), Some(ThemeVariant::Ledger));
        let err = "sepia".parse::<ThemeVariant>().expect_err("unknown");
        assert!(matches!(err, CertificateError::InvalidTheme(_)));
    }

    #[test]
    fn ledger_differs_in_palette_shadow_and_spacing() {
        let classic = LayoutTheme::classic();
        let ledger = LayoutTheme::ledger();
        assert_ne!(classic.palette, ledger.palette);
        assert_ne!(classic.shadow, ledger.shadow);
        assert_ne!(classic.spacing, ledger.spacing);
        assert_eq!(classic.type_scale, ledger.type_scale);
        assert!(ledger.validate().is_ok());
    }

    #[test]
    fn partial_json_overrides_defaults() {
        let theme = LayoutTheme::from_json(
            r##"{"name":"custom","palette":{"frame":"#112233"},"shadow":{"dx":0}}"##,
        )
        .expect("theme");
        assert_eq!(theme.name, "custom");
        assert_eq!(theme.palette.frame, Color::from_hex("#112233").expect("hex"));
        assert_eq!(theme.palette.ink, LayoutTheme::classic().palette.ink);
        assert_eq!(theme.shadow.dx, 0.0);
        assert_eq!(theme.shadow.dy, 3.0);
    }

    #[test]
    fn invalid_theme_json_is_rejected() {
        let unknown = LayoutTheme::from_json(r#"{"palete":{}}"#).expect_err("typo");
        assert!(matches!(unknown, CertificateError::InvalidTheme(_)));
        let negative =
            LayoutTheme::from_json(r#"{"type_scale":{"title":-4}}"#).expect_err("negative");
        assert!(negative.to_string().contains("type_scale.title"));
        let empty = LayoutTheme::from_json(r#"{"accents":{"stops":[]}}"#).expect_err("stops");
        assert!(empty.to_string().contains("stops"));
    }

    #[test]
    fn flow_increments_must_not_run_backwards() {
        let err = LayoutTheme::from_json(r#"{"spacing":{"after_title":-200}}"#)
            .expect_err("negative increment");
        assert!(err.to_string().contains("spacing.after_title"));

        let mut theme = LayoutTheme::ledger();
        theme.spacing.detail_row_gap = f32::INFINITY;
        assert!(theme.validate().is_err());

        let mut theme = LayoutTheme::classic();
        theme.tracking = f32::NAN;
        let err = theme.validate().expect_err("nan tracking");
        assert!(err.to_string().contains("tracking"));

        let mut theme = LayoutTheme::classic();
        theme.shadow.dx = -4.0;
        theme.tracking = -0.5;
        assert!(theme.validate().is_ok());
    }
}
