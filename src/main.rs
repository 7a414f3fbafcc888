use certpress::{
    CertificateFields, ExportOptions, ExportSurface, Exporter, HtmlSource, LayoutTheme,
    StaticPage, ThemeVariant,
};
use std::path::{Path, PathBuf};

const HELP: &str = "\
certpress renders a share certificate page into a vector PDF.

USAGE:
  certpress [OPTIONS] <input> [<output-dir>]

  <input> is the certificate page (.html) or a field record (.json).

OPTIONS:
  -h, --help                Prints this help
  -V, --version             Prints version
      --assets DIR          Directory the font URLs are resolved against [default: .]
      --theme NAME          Built-in theme: classic or ledger [default: classic]
      --theme-file PATH     JSON theme; overrides --theme
      --filename NAME       Output file name [default: Share_Certificate_SC-2025-007.pdf]
      --no-fonts            Skip custom fonts and use the standard PDF faces
      --no-compress         Write uncompressed streams
      --debug-log PATH      Write JSONL diagnostics
      --perf-log PATH       Write JSONL stage timings

ARGS:
  <input>                   Certificate HTML or field JSON
  <output-dir>              Output directory [default: .]
";

struct CliArgs {
    assets: PathBuf,
    theme: ThemeVariant,
    theme_file: Option<PathBuf>,
    filename: Option<String>,
    no_fonts: bool,
    no_compress: bool,
    debug_log: Option<PathBuf>,
    perf_log: Option<PathBuf>,
    input: PathBuf,
    output_dir: PathBuf,
}

fn main() {
    if let Err(e) = process() {
        eprintln!("Error: {}.", e);
        std::process::exit(1);
    }
}

fn process() -> Result<(), String> {
    let Some(args) = collect_args().map_err(|e| e.to_string())? else {
        return Ok(());
    };

    let theme = match &args.theme_file {
        Some(path) => LayoutTheme::from_path(path).map_err(|e| e.to_string())?,
        None => LayoutTheme::from_variant(args.theme),
    };

    let mut builder = ExportOptions::builder()
        .theme(theme)
        .asset_root(&args.assets)
        .output_dir(&args.output_dir)
        .compress(!args.no_compress);
    if let Some(name) = &args.filename {
        builder = builder.file_name(name.as_str());
    }
    if args.no_fonts {
        builder = builder.without_fonts();
    }
    if let Some(path) = &args.debug_log {
        builder = builder.debug_log(path);
    }
    if let Some(path) = &args.perf_log {
        builder = builder.perf_log(path);
    }
    let options = builder.build().map_err(|e| e.to_string())?;
    let exporter = Exporter::new(options).map_err(|e| e.to_string())?;

    let mut page = load_page(&args.input)?;
    let report = exporter.export(page.as_mut()).map_err(|e| e.to_string())?;
    println!(
        "{} ({} bytes, {} fonts, sha256 {})",
        report.path.display(),
        report.byte_len,
        report.font_count,
        report.sha256
    );
    Ok(())
}

fn load_page(input: &Path) -> Result<Box<dyn ExportSurface>, String> {
    let is_json = input
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        let raw = std::fs::read_to_string(input)
            .map_err(|e| format!("failed to read {}: {}", input.display(), e))?;
        let fields = CertificateFields::from_json(&raw).map_err(|e| e.to_string())?;
        return Ok(Box::new(StaticPage::new(fields)));
    }
    let page = HtmlSource::from_path(input).map_err(|e| e.to_string())?;
    Ok(Box::new(page))
}

fn collect_args() -> Result<Option<CliArgs>, pico_args::Error> {
    let mut input = pico_args::Arguments::from_env();

    if input.contains(["-h", "--help"]) {
        print!("{}", HELP);
        return Ok(None);
    }

    if input.contains(["-V", "--version"]) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(None);
    }

    let args = CliArgs {
        assets: input
            .opt_value_from_str("--assets")?
            .unwrap_or_else(|| PathBuf::from(".")),
        theme: input
            .opt_value_from_str("--theme")?
            .unwrap_or(ThemeVariant::Classic),
        theme_file: input.opt_value_from_str("--theme-file")?,
        filename: input.opt_value_from_str("--filename")?,
        no_fonts: input.contains("--no-fonts"),
        no_compress: input.contains("--no-compress"),
        debug_log: input.opt_value_from_str("--debug-log")?,
        perf_log: input.opt_value_from_str("--perf-log")?,
        input: input.free_from_str()?,
        output_dir: input
            .opt_free_from_str()?
            .unwrap_or_else(|| PathBuf::from(".")),
    };

    let remaining = input.finish();
    if !remaining.is_empty() {
        eprintln!("Warning: unused arguments left: {:?}.", remaining);
    }
    Ok(Some(args))
}
