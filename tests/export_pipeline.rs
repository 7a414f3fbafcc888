use certpress::{
    CertificateFields, Command, ExportOptions, ExportSurface, Exporter, FieldSource, HtmlSource,
    LayoutTheme, Size, ThemeVariant, compose, inspect_pdf_bytes, lower, render_certificate,
    toggle_watermark,
};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(tag: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!(
        "certpress_it_{tag}_{}_{}",
        std::process::id(),
        nanos
    ))
}

fn demo_page() -> HtmlSource {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/certificate.html");
    HtmlSource::from_path(path).expect("demo page")
}

#[test]
fn html_page_exports_to_one_a4_page() {
    let dir = temp_dir("html");
    let options = ExportOptions::builder()
        .without_fonts()
        .output_dir(&dir)
        .build()
        .expect("options");
    let exporter = Exporter::new(options).expect("exporter");
    let mut page = demo_page();

    let report = exporter.export(&mut page).expect("export");
    let bytes = std::fs::read(&report.path).expect("pdf on disk");
    let inspected = inspect_pdf_bytes(&bytes).expect("lopdf parse");
    assert_eq!(inspected.page_count, 1);
    let (w, h) = inspected.page_size.expect("media box");
    assert!((w - Size::a4().width.to_f32()).abs() < 0.01);
    assert!((h - Size::a4().height.to_f32()).abs() < 0.01);
    assert_eq!(inspected.title.as_deref(), Some("Share Certificate"));

    assert!(page.trigger_visible());
    assert_eq!(page.watermark_visible(), Some(true));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn json_and_html_records_agree() {
    let from_html = demo_page().extract_fields().expect("html fields");
    let raw = std::fs::read_to_string(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/fields.json"),
    )
    .expect("fields json");
    let from_json = CertificateFields::from_json(&raw).expect("json fields");
    assert_eq!(from_html.company, from_json.company);
    assert_eq!(from_html.amount_text, from_json.amount_text);
    assert_eq!(from_html.cert_no, from_json.cert_no);
    assert_eq!(from_html.signature2_name, from_json.signature2_name);
}

#[test]
fn flow_is_monotonic_and_fits_the_canvas() {
    let fields = demo_page().extract_fields().expect("fields");
    for variant in [ThemeVariant::Classic, ThemeVariant::Ledger] {
        let composition = certpress::Composer::new(LayoutTheme::from_variant(variant))
            .compose(&fields, 793.7, 1122.5);
        let ys: Vec<f32> = composition.flow.iter().map(|step| step.y).collect();
        assert!(ys.windows(2).all(|pair| pair[0] <= pair[1]), "{variant:?}: {ys:?}");
        assert!(composition.content_bottom() < 1122.5);
    }
    let classic = compose(&fields, 793.7, 1122.5);
    assert!(!classic.tree.text_blocks().is_empty());
}

#[test]
fn render_certificate_is_byte_stable() {
    let fields = demo_page().extract_fields().expect("fields");
    let a = render_certificate(&fields).expect("render");
    let b = render_certificate(&fields).expect("render");
    assert_eq!(a, b);
    assert!(inspect_pdf_bytes(&a).expect("parse").is_single_a4_page());
}

#[test]
fn cancel_control_toggles_the_overlay() {
    let mut page = demo_page();
    assert_eq!(toggle_watermark(&mut page), Some(false));
    assert_eq!(toggle_watermark(&mut page), Some(true));
}

#[test]
fn seal_with_xml_prolog_still_draws() {
    let fields = CertificateFields {
        seal_svg: "<?xml version=\"1.0\"?>\n<!-- seal -->\n\
            <svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 200 200\">\
            <circle cx=\"100\" cy=\"100\" r=\"90\" fill=\"#d4af37\"/></svg>"
            .to_string(),
        ..CertificateFields::default()
    };
    let composition = compose(&fields, 793.7, 1122.5);
    let document = lower(&composition.tree, Size::a4(), None);
    let curves = document
        .commands
        .iter()
        .filter(|command| matches!(command, Command::CurveTo { .. }))
        .count();
    assert!(curves >= 4, "seal circle missing: {curves} curves");
}
