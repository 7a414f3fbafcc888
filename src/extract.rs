use crate::error::CertificateError;
use crate::fields::CertificateFields;
use kuchiki::traits::TendrilSink;
use kuchiki::{NodeData, NodeRef};
use std::path::Path;

pub const TRIGGER_ID: &str = "download-pdf-btn";
pub const WATERMARK_ID: &str = "watermark-overlay";
pub const HIDDEN_CLASS: &str = "hidden";

const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Where each text field lives in the certificate page.
pub const FIELD_SELECTORS: [(&str, &str); 13] = [
    ("company", "header p"),
    ("title", ".title-section h1"),
    ("amount_number", ".amount-number"),
    ("amount_text", ".amount-text"),
    ("issued_to_label", ".issued-to-label"),
    ("issued_to_name", ".issued-to-name"),
    ("cert_no", ".certificate-details p:nth-child(1)"),
    ("cert_class", ".certificate-details p:nth-child(2)"),
    ("cert_date", ".certificate-details p:nth-child(3)"),
    (
        "signature1_name",
        ".signature-block:nth-child(1) .signature-name",
    ),
    (
        "signature1_title",
        ".signature-block:nth-child(1) .signature-title",
    ),
    (
        "signature2_name",
        ".signature-block:nth-child(2) .signature-name",
    ),
    (
        "signature2_title",
        ".signature-block:nth-child(2) .signature-title",
    ),
];

pub const SEAL_SELECTOR: &str = ".seal-inner svg";

pub trait FieldSource {
    fn extract_fields(&self) -> Result<CertificateFields, CertificateError>;
}

impl FieldSource for CertificateFields {
    fn extract_fields(&self) -> Result<CertificateFields, CertificateError> {
        Ok(self.clone())
    }
}

/// The page an export is started from. The exporter hides the trigger and the watermark
/// while it runs and puts both back afterwards.
pub trait ExportSurface: FieldSource {
    fn trigger_visible(&self) -> bool;
    fn set_trigger_visible(&mut self, visible: bool);
    /// `None` when the page has no watermark overlay.
    fn watermark_visible(&self) -> Option<bool>;
    fn set_watermark_visible(&mut self, visible: bool);
}

/// Flips the watermark, as the `cancel-btn` control does. Returns the new visibility, or `None`
/// when there is no watermark.
pub fn toggle_watermark(surface: &mut dyn ExportSurface) -> Option<bool> {
    let visible = !surface.watermark_visible()?;
    surface.set_watermark_visible(visible);
    Some(visible)
}

/// A parsed certificate page.
pub struct HtmlSource {
    document: NodeRef,
}

impl HtmlSource {
    pub fn parse(html: &str) -> Self {
        Self {
            document: kuchiki::parse_html().one(html),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, CertificateError> {
        let html = std::fs::read_to_string(path)?;
        Ok(Self::parse(&html))
    }

    pub fn to_html(&self) -> String {
        self.document.to_string()
    }

    fn select_first(&self, selector: &str) -> Result<NodeRef, CertificateError> {
        self.document
            .select_first(selector)
            .map(|node| node.as_node().clone())
            .map_err(|_| CertificateError::MissingField(selector.to_string()))
    }

    fn text(&self, selector: &str) -> Result<String, CertificateError> {
        Ok(self.select_first(selector)?.text_contents().trim().to_string())
    }

    /// The seal `<svg>` as standalone XML.
    pub fn seal_svg(&self) -> Result<String, CertificateError> {
        let node = self.select_first(SEAL_SELECTOR)?;
        let mut out = String::new();
        write_svg_xml(&node, &mut out, true);
        Ok(out)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeRef> {
        self.document
            .select_first(&format!("#{id}"))
            .ok()
            .map(|node| node.as_node().clone())
    }

    fn attribute(node: &NodeRef, name: &str) -> Option<String> {
        let element = node.as_element()?;
        let attrs = element.attributes.borrow();
        attrs.get(name).map(str::to_string)
    }

    fn set_attribute(node: &NodeRef, name: &str, value: String) {
        if let Some(element) = node.as_element() {
            element.attributes.borrow_mut().insert(name, value);
        }
    }
}

impl FieldSource for HtmlSource {
    fn extract_fields(&self) -> Result<CertificateFields, CertificateError> {
        let [
            company,
            title,
            amount_number,
            amount_text,
            issued_to_label,
            issued_to_name,
            cert_no,
            cert_class,
            cert_date,
            signature1_name,
            signature1_title,
            signature2_name,
            signature2_title,
        ] = FIELD_SELECTORS.map(|(_, selector)| selector);

        Ok(CertificateFields {
            company: self.text(company)?,
            title: self.text(title)?,
            amount_number: self.text(amount_number)?,
            amount_text: self.text(amount_text)?,
            issued_to_label: self.text(issued_to_label)?,
            issued_to_name: self.text(issued_to_name)?,
            cert_no: self.text(cert_no)?,
            cert_class: self.text(cert_class)?,
            cert_date: self.text(cert_date)?,
            signature1_name: self.text(signature1_name)?,
            signature1_title: self.text(signature1_title)?,
            signature2_name: self.text(signature2_name)?,
            signature2_title: self.text(signature2_title)?,
            seal_svg: self.seal_svg()?,
        })
    }
}

impl ExportSurface for HtmlSource {
    fn trigger_visible(&self) -> bool {
        let Some(trigger) = self.element_by_id(TRIGGER_ID) else {
            return false;
        };
        let style = Self::attribute(&trigger, "style").unwrap_or_default();
        !style_declares(&style, "display", "none")
    }

    fn set_trigger_visible(&mut self, visible: bool) {
        let Some(trigger) = self.element_by_id(TRIGGER_ID) else {
            return;
        };
        let style = Self::attribute(&trigger, "style").unwrap_or_default();
        let display = if visible { "flex" } else { "none" };
        Self::set_attribute(&trigger, "style", set_style_property(&style, "display", display));
    }

    fn watermark_visible(&self) -> Option<bool> {
        let watermark = self.element_by_id(WATERMARK_ID)?;
        let classes = Self::attribute(&watermark, "class").unwrap_or_default();
        Some(!classes.split_whitespace().any(|c| c == HIDDEN_CLASS))
    }

    fn set_watermark_visible(&mut self, visible: bool) {
        let Some(watermark) = self.element_by_id(WATERMARK_ID) else {
            return;
        };
        let classes = Self::attribute(&watermark, "class").unwrap_or_default();
        let mut list: Vec<&str> = classes
            .split_whitespace()
            .filter(|c| *c != HIDDEN_CLASS)
            .collect();
        if !visible {
            list.push(HIDDEN_CLASS);
        }
        Self::set_attribute(&watermark, "class", list.join(" "));
    }
}

/// A field record with no page behind it, e.g. a JSON file. Visibility is tracked in memory.
#[derive(Debug, Clone)]
pub struct StaticPage {
    fields: CertificateFields,
    trigger_visible: bool,
    watermark_visible: Option<bool>,
}

impl StaticPage {
    pub fn new(fields: CertificateFields) -> Self {
        Self {
            fields,
            trigger_visible: true,
            watermark_visible: None,
        }
    }

    pub fn with_watermark(mut self, visible: bool) -> Self {
        self.watermark_visible = Some(visible);
        self
    }
}

impl FieldSource for StaticPage {
    fn extract_fields(&self) -> Result<CertificateFields, CertificateError> {
        Ok(self.fields.clone())
    }
}

impl ExportSurface for StaticPage {
    fn trigger_visible(&self) -> bool {
        self.trigger_visible
    }

    fn set_trigger_visible(&mut self, visible: bool) {
        self.trigger_visible = visible;
    }

    fn watermark_visible(&self) -> Option<bool> {
        self.watermark_visible
    }

    fn set_watermark_visible(&mut self, visible: bool) {
        if self.watermark_visible.is_some() {
            self.watermark_visible = Some(visible);
        }
    }
}

fn style_declares(style: &str, property: &str, value: &str) -> bool {
    style.split(';').any(|decl| {
        decl.split_once(':').is_some_and(|(k, v)| {
            k.trim().eq_ignore_ascii_case(property) && v.trim().eq_ignore_ascii_case(value)
        })
    })
}

fn set_style_property(style: &str, property: &str, value: &str) -> String {
    let mut decls: Vec<String> = style
        .split(';')
        .map(str::trim)
        .filter(|decl| !decl.is_empty())
        .filter(|decl| {
            decl.split_once(':')
                .is_none_or(|(k, _)| !k.trim().eq_ignore_ascii_case(property))
        })
        .map(str::to_string)
        .collect();
    decls.push(format!("{property}: {value}"));
    decls.join("; ")
}

// kuchiki serializes HTML, where void-looking SVG elements and unquoted namespaces do not
// round-trip through an XML parser. Write well-formed XML instead.
fn write_svg_xml(node: &NodeRef, out: &mut String, root: bool) {
    match node.data() {
        NodeData::Element(el) => {
            let tag = el.name.local.as_ref();
            out.push('<');
            out.push_str(tag);

            let attrs = el.attributes.borrow();
            let mut has_xmlns = false;
            let mut has_xlink = false;
            for (k, v) in attrs.map.iter() {
                let key = k.local.as_ref();
                let prefix = match &*k.ns {
                    XLINK_NS => "xlink:",
                    XMLNS_NS if key != "xmlns" => "xmlns:",
                    XML_NS => "xml:",
                    _ => "",
                };
                if key == "xmlns" {
                    has_xmlns = true;
                }
                if prefix == "xmlns:" && key == "xlink" {
                    has_xlink = true;
                }
                out.push(' ');
                out.push_str(prefix);
                out.push_str(key);
                out.push_str("=\"");
                escape_xml_attr(&v.value, out);
                out.push('"');
            }
            if root {
                if !has_xmlns {
                    out.push_str(" xmlns=\"http://www.w3.org/2000/svg\"");
                }
                if !has_xlink {
                    out.push_str(" xmlns:xlink=\"");
                    out.push_str(XLINK_NS);
                    out.push('"');
                }
            }

            if node.first_child().is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in node.children() {
                write_svg_xml(&child, out, false);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::Text(t) => escape_xml_text(&t.borrow(), out),
        _ => {}
    }
}

fn escape_xml_attr(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

fn escape_xml_text(input: &str, out: &mut String) {
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = include_str!("../demos/certificate.html");

    #[test]
    fn extracts_every_field_from_the_page() {
        let source = HtmlSource::parse(PAGE);
        let fields = source.extract_fields().expect("fields");
        assert_eq!(fields.company, "Aurelia Holdings Ltd.");
        assert_eq!(fields.title, "Share Certificate");
        assert_eq!(fields.amount_number, "1,000");
        assert_eq!(fields.issued_to_name, "Jane A. Doe");
        assert_eq!(fields.cert_no, "Certificate No: SC-2025-007");
        assert_eq!(fields.cert_class, "Class: Ordinary Shares");
        assert_eq!(fields.cert_date, "Date of Issue: 14 March 2025");
        assert_eq!(fields.signature1_name, "Margaret Ellison");
        assert_eq!(fields.signature2_title, "Company Secretary");
        assert!(fields.seal_svg.starts_with("<svg"));
    }

    #[test]
    fn seal_is_serialized_as_xml() {
        let source = HtmlSource::parse(PAGE);
        let seal = source.seal_svg().expect("seal");
        let doc = roxmltree::Document::parse(&seal).expect("well-formed seal");
        assert_eq!(doc.root_element().tag_name().name(), "svg");
        assert!(seal.contains("viewBox=\"0 0 200 200\""));
        assert!(seal.contains("xlink:href=\"#ring\""));
    }

    #[test]
    fn missing_selector_is_named() {
        let html = PAGE.replace("amount-text", "amount-words");
        let err = HtmlSource::parse(&html)
            .extract_fields()
            .expect_err("missing field");
        match err {
            CertificateError::MissingField(selector) => assert_eq!(selector, ".amount-text"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn trigger_and_watermark_visibility_round_trip() {
        let mut source = HtmlSource::parse(PAGE);
        assert!(source.trigger_visible());
        assert_eq!(source.watermark_visible(), Some(true));

        source.set_trigger_visible(false);
        source.set_watermark_visible(false);
        assert!(!source.trigger_visible());
        assert_eq!(source.watermark_visible(), Some(false));
        assert!(source.to_html().contains("display: none"));

        source.set_trigger_visible(true);
        assert!(source.trigger_visible());
        assert_eq!(toggle_watermark(&mut source), Some(true));
        assert_eq!(toggle_watermark(&mut source), Some(false));
    }

    #[test]
    fn pages_without_watermark_do_not_toggle() {
        let mut source = HtmlSource::parse("<html><body><p>no overlay</p></body></html>");
        assert_eq!(source.watermark_visible(), None);
        assert_eq!(toggle_watermark(&mut source), None);

        let mut page = StaticPage::new(CertificateFields::default());
        assert_eq!(toggle_watermark(&mut page), None);
        let mut page = page.with_watermark(true);
        assert_eq!(toggle_watermark(&mut page), Some(false));
    }

    #[test]
    fn style_edits_keep_other_declarations() {
        let style = set_style_property("color: red; display: flex", "display", "none");
        assert_eq!(style, "color: red; display: none");
        assert!(style_declares(&style, "display", "none"));
        assert!(!style_declares("color: red", "display", "none"));
    }
}
