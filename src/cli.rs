// ============================================================================
// StickerStudio CLI — headless rendering, cropping and quoting
// ============================================================================
//
// Usage examples:
//   stickerstudio --design art.ssd --output art.png --scale 2
//   stickerstudio --upload logo.png badge.png --output sheet.png --save sheet.ssd
//   stickerstudio --crop scan.png --output scan_cropped.png
//   stickerstudio --quote --quantity 250 --size custom --width 2.5 --height 4 --rush
//
// No window is opened in CLI mode.  Decodes still run on the rayon pool; the
// CLI blocks until they settle before painting.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::autocrop;
use crate::engine::CanvasEngine;
use crate::pricing::{self, Material, OrderLine, StickerShape, StickerSize};
use crate::settings::EditorSettings;

/// How long the CLI waits for decodes before rendering whatever is ready.
const DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// StickerStudio headless tools.
///
/// Render saved designs, place artwork, crop transparent margins and print
/// price quotes without opening the editor.
#[derive(Parser, Debug)]
#[command(
    name = "stickerstudio",
    about = "StickerStudio headless renderer and price calculator",
    long_about = "Render .ssd designs to PNG, compose uploaded artwork onto a fresh\n\
                  canvas, trim transparent margins and quote sticker orders\n\
                  without opening the editor.\n\n\
                  Example:\n  \
                  stickerstudio --design art.ssd --output art.png\n  \
                  stickerstudio --quote --quantity 100 --size medium --rush"
)]
pub struct CliArgs {
    /// Saved design to render.
    #[arg(short, long, value_name = "FILE.ssd")]
    pub design: Option<PathBuf>,

    /// Artwork to place on a fresh canvas, one sticker per file.
    #[arg(short, long, num_args = 1.., value_name = "IMAGE")]
    pub upload: Vec<PathBuf>,

    /// Image whose transparent margins should be trimmed.
    #[arg(long, value_name = "IMAGE")]
    pub crop: Option<PathBuf>,

    /// Output PNG path.
    #[arg(short, long, value_name = "FILE.png")]
    pub output: Option<PathBuf>,

    /// Also save the composed canvas as a design file.
    #[arg(long, value_name = "FILE.ssd")]
    pub save: Option<PathBuf>,

    /// Device pixels per canvas unit for --output renders (0.1-8).
    #[arg(long, default_value_t = 1.0, value_parser = parse_scale)]
    pub scale: f32,

    /// Print a price quote.
    #[arg(long)]
    pub quote: bool,

    #[arg(long, default_value_t = 50)]
    pub quantity: u32,

    /// small, medium, large, xlarge or custom.
    #[arg(long, default_value = "medium")]
    pub size: String,

    /// Custom width in inches.
    #[arg(long, default_value = "")]
    pub width: String,

    /// Custom height in inches.
    #[arg(long, default_value = "")]
    pub height: String,

    #[arg(long)]
    pub rush: bool,

    /// Print timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| {
            matches!(
                a.as_str(),
                "--design" | "-d" | "--upload" | "-u" | "--crop" | "--quote"
            )
        })
    }
}

/// Accepted range for `--scale`.
const SCALE_RANGE: std::ops::RangeInclusive<f32> = 0.1..=8.0;

fn parse_scale(raw: &str) -> Result<f32, String> {
    let v: f32 = raw.trim().parse().map_err(|_| format!("'{}' is not a number", raw))?;
    if !SCALE_RANGE.contains(&v) {
        return Err(format!(
            "scale must be between {} and {}",
            SCALE_RANGE.start(),
            SCALE_RANGE.end()
        ));
    }
    Ok(v)
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run the requested CLI actions and return an OS exit code.
pub fn run(args: CliArgs) -> ExitCode {
    let start = Instant::now();
    let mut did_something = false;

    if args.quote {
        did_something = true;
        print_quote(&args);
    }

    if let Some(input) = &args.crop {
        did_something = true;
        let Some(output) = &args.output else {
            eprintln!("error: --crop needs --output");
            return ExitCode::FAILURE;
        };
        if let Err(e) = run_crop(input, output) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    } else if args.design.is_some() || !args.upload.is_empty() {
        did_something = true;
        if let Err(e) = run_render(&args) {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    }

    if !did_something {
        eprintln!("error: nothing to do (try --design, --upload, --crop or --quote)");
        return ExitCode::FAILURE;
    }
    if args.verbose {
        println!("done in {:.0}ms", start.elapsed().as_secs_f64() * 1000.0);
    }
    ExitCode::SUCCESS
}

// ============================================================================
// Actions
// ============================================================================

fn print_quote(args: &CliArgs) {
    let size = StickerSize::parse(&args.size, &args.width, &args.height);
    let line = OrderLine::quote(
        StickerShape::default(),
        Material::default(),
        size,
        args.quantity,
        args.rush,
    );
    println!("{} x {}{}", line.quantity, size.label(), if args.rush { " (rush)" } else { "" });
    println!("  per sticker: ${:.2}", pricing::round_cents(line.unit_price));
    println!("  total:       ${:.2}", pricing::round_cents(line.total_price));
}

fn run_crop(input: &Path, output: &Path) -> Result<(), String> {
    let img = image::open(input)
        .map_err(|e| format!("could not open '{}': {}", input.display(), e))?
        .into_rgba8();
    let bounds = autocrop::crop_bounds(&img);
    let cropped = autocrop::auto_crop(&img);
    cropped
        .save_with_format(output, image::ImageFormat::Png)
        .map_err(|e| format!("could not write '{}': {}", output.display(), e))?;
    println!(
        "{}x{} -> {}x{} (offset {}, {})",
        img.width(),
        img.height(),
        bounds.width,
        bounds.height,
        bounds.x,
        bounds.y
    );
    Ok(())
}

fn run_render(args: &CliArgs) -> Result<(), String> {
    let mut engine = CanvasEngine::new(EditorSettings::load());

    if let Some(design) = &args.design {
        engine
            .load_design(design)
            .map_err(|e| format!("could not load '{}': {}", design.display(), e))?;
    }

    for path in &args.upload {
        engine
            .upload_file(path)
            .map_err(|e| format!("'{}': {}", path.display(), e))?;
    }

    let (w, h) = (engine.scene().width, engine.scene().height);
    engine.attach_surface(w, h, args.scale);

    // Requests the bitmaps; the wait below lets them land.
    engine.render_now();
    if !engine.wait_idle(DECODE_TIMEOUT) {
        eprintln!("warning: some images were still decoding after {:?}", DECODE_TIMEOUT);
    }
    if let Some(e) = engine.take_upload_error() {
        return Err(format!("upload failed: {}", e));
    }

    if let Some(save) = &args.save {
        engine
            .save_design(save)
            .map_err(|e| format!("could not save '{}': {}", save.display(), e))?;
        if args.verbose {
            println!("saved {}", save.display());
        }
    }

    if let Some(output) = &args.output {
        let png = engine
            .export_png()
            .ok_or_else(|| "render produced no image".to_string())?;
        std::fs::write(output, png)
            .map_err(|e| format!("could not write '{}': {}", output.display(), e))?;
        if args.verbose {
            println!("wrote {} ({}x{} units at {}x)", output.display(), w, h, args.scale);
        }
    } else if args.save.is_none() {
        return Err("--design/--upload need --output or --save".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quote_flags() {
        let args = CliArgs::try_parse_from([
            "stickerstudio", "--quote", "--quantity", "250", "--size", "custom", "--width", "2", "--height", "3", "--rush",
        ])
        .unwrap();
        assert!(args.quote && args.rush);
        assert_eq!(args.quantity, 250);
        assert_eq!(StickerSize::parse(&args.size, &args.width, &args.height).area_sq_in(), 6.0);
    }

    #[test]
    fn parses_multiple_uploads() {
        let args = CliArgs::try_parse_from(["stickerstudio", "-u", "a.png", "b.png", "-o", "out.png"]).unwrap();
        assert_eq!(args.upload.len(), 2);
        assert_eq!(args.output.as_deref(), Some(Path::new("out.png")));
        assert_eq!(args.scale, 1.0);
    }

    #[test]
    fn scale_outside_range_is_rejected() {
        assert!(CliArgs::try_parse_from(["stickerstudio", "-d", "a.ssd", "--scale", "1000"]).is_err());
        assert!(CliArgs::try_parse_from(["stickerstudio", "-d", "a.ssd", "--scale", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["stickerstudio", "-d", "a.ssd", "--scale", "NaN"]).is_err());
        let args = CliArgs::try_parse_from(["stickerstudio", "-d", "a.ssd", "--scale", "2.5"]).unwrap();
        assert_eq!(args.scale, 2.5);
    }
}
