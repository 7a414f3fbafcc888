use crate::error::CertificateError;
use crate::font::{FontRegistry, FontVariant};
use base64::Engine;
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

/// One font binary to register: where to fetch it and the `(family, style)` it provides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FontAsset {
    pub url: String,
    pub family: String,
    pub style: String,
}

impl FontAsset {
    pub fn new(url: impl Into<String>, family: impl Into<String>, style: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            family: family.into(),
            style: style.into(),
        }
    }
}

pub fn default_font_assets() -> Vec<FontAsset> {
    vec![
        FontAsset::new("/fonts/Inter-Regular.ttf", "Inter", "normal"),
        FontAsset::new("/fonts/Inter-SemiBold.ttf", "Inter", "bold"),
        FontAsset::new("/fonts/EBGaramond-Regular.ttf", "EB Garamond", "normal"),
        FontAsset::new("/fonts/EBGaramond-Italic.ttf", "EB Garamond", "italic"),
    ]
}

/// Fetches font binaries and builds a [`FontRegistry`] from them.
///
/// URLs are either `data:` URIs or paths resolved against the asset root. A leading `/`
/// means the root of the asset directory, never the host filesystem root.
#[derive(Debug, Clone)]
pub struct FontRegistrar {
    asset_root: PathBuf,
}

impl FontRegistrar {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    /// Loads every asset in order. The first failure aborts the whole load, so callers never
    /// see a partially populated registry.
    pub fn load(&self, assets: &[FontAsset]) -> Result<FontRegistry, CertificateError> {
        let mut registry = FontRegistry::new();
        for asset in assets {
            let variant = FontVariant::from_style(&asset.style).ok_or_else(|| {
                CertificateError::FontFetch {
                    url: asset.url.clone(),
                    message: format!("unknown font style '{}'", asset.style),
                }
            })?;
            let data = self.fetch(&asset.url)?;
            registry
                .register_bytes(data, &asset.family, variant)
                .map_err(|err| CertificateError::FontFetch {
                    url: asset.url.clone(),
                    message: err.to_string(),
                })?;
        }
        Ok(registry)
    }

    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, CertificateError> {
        if url.starts_with("data:") {
            return parse_data_uri(url)
                .map(|(_, data)| data)
                .ok_or_else(|| CertificateError::FontFetch {
                    url: truncate_url(url),
                    message: "malformed data uri".to_string(),
                });
        }
        let path = self.resolve_path(url);
        std::fs::read(&path).map_err(|err| CertificateError::FontFetch {
            url: url.to_string(),
            message: format!("{} ({})", err, path.display()),
        })
    }

    fn resolve_path(&self, url: &str) -> PathBuf {
        let mut path = self.asset_root.clone();
        for component in Path::new(url).components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }
        path
    }
}

fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, data_part) = rest.split_once(',')?;
    let mime = header
        .split(';')
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let data = if header.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(data_part.trim())
            .ok()?
    } else {
        data_part.as_bytes().to_vec()
    };
    Some((mime, data))
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() <= 48 {
        return url.to_string();
    }
    let mut out: String = url.chars().take(48).collect();
    out.push_str("...");
    out
}
