use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use photomark::batch::{
    collect_sources, read_source_list, BatchEvent, BatchJob, BatchPipeline, BatchReport,
    ConflictPolicy,
};
use photomark::config::AppConfig;
use photomark::image_io::{FsImageIo, OutputFormat, ResizeTo};
use photomark::templates::{JsonTemplateStore, Template, TemplateStore};
use photomark::watermark::{
    parse_hex_color, Anchor, Color, Offset, Renderer, Shadow, Stroke, SystemFontResolver,
    WatermarkSpec,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Photomark - stamp text watermarks onto photos in bulk
#[derive(Parser, Debug)]
#[command(name = "photomark")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Watermark images and export them
    Apply(ApplyArgs),

    /// Manage saved watermark templates
    #[command(subcommand)]
    Template(TemplateCommand),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Image files or directories (directories are not searched recursively)
    inputs: Vec<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// File listing one source path per line
    #[arg(long)]
    source_list: Option<PathBuf>,

    /// Start from a saved template
    #[arg(short, long)]
    template: Option<String>,

    #[command(flatten)]
    spec: SpecArgs,

    /// Prepended to every output file name
    #[arg(long)]
    prefix: Option<String>,

    /// Appended to every output file stem
    #[arg(long)]
    suffix: Option<String>,

    /// Name outputs image_0001, image_0002, ... instead of keeping source names
    #[arg(long)]
    numbered: bool,

    /// Write every output in this format (jpeg, png, bmp, tiff)
    #[arg(long)]
    format: Option<OutputFormat>,

    /// JPEG quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Replace existing output files instead of renaming
    #[arg(long)]
    overwrite: bool,

    /// Downscale outputs to at most this width
    #[arg(long)]
    max_width: Option<u32>,

    /// Downscale outputs to at most this height
    #[arg(long)]
    max_height: Option<u32>,

    /// Worker threads (default: available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    /// List saved templates
    List,
    /// Print a template as JSON
    Show { name: String },
    /// Save a template, starting from an existing one or the defaults
    Save {
        name: String,
        /// Template to start from
        #[arg(long)]
        from: Option<String>,
        #[command(flatten)]
        spec: SpecArgs,
    },
    /// Delete a template
    Delete { name: String },
}

/// Watermark settings that override the template or config defaults.
#[derive(Args, Debug, Default)]
struct SpecArgs {
    /// Watermark text; supports {{filename}}, {{stem}}, {{index}}, {{total}}, {{date}}
    #[arg(long)]
    text: Option<String>,

    #[arg(long)]
    font_family: Option<String>,

    /// TTF/OTF file (overrides --font-family)
    #[arg(long)]
    font_file: Option<PathBuf>,

    /// Font size in points
    #[arg(long)]
    font_size: Option<f32>,

    #[arg(long)]
    bold: bool,

    #[arg(long)]
    italic: bool,

    /// Text color as #RGB, #RRGGBB or #RRGGBBAA
    #[arg(long, value_parser = parse_hex_color)]
    color: Option<Color>,

    /// 0.0 (invisible) to 1.0 (opaque)
    #[arg(long)]
    opacity: Option<f32>,

    /// Counter-clockwise rotation in degrees
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<f32>,

    /// top-left, top-center, ..., bottom-right, center or free-offset
    #[arg(long)]
    anchor: Option<Anchor>,

    #[arg(long, allow_hyphen_values = true)]
    offset_x: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    offset_y: Option<f32>,

    /// Shadow color; enables the drop shadow
    #[arg(long, value_parser = parse_hex_color)]
    shadow_color: Option<Color>,

    /// Shadow offset in pixels (both axes)
    #[arg(long, allow_hyphen_values = true)]
    shadow_offset: Option<f32>,

    /// Shadow blur radius in pixels
    #[arg(long)]
    shadow_blur: Option<f32>,

    /// Remove any shadow from the template
    #[arg(long, conflicts_with = "shadow_color")]
    no_shadow: bool,

    /// Outline width in pixels; enables the outline
    #[arg(long)]
    stroke_width: Option<f32>,

    #[arg(long, value_parser = parse_hex_color)]
    stroke_color: Option<Color>,

    /// Remove any outline from the template
    #[arg(long, conflicts_with = "stroke_width")]
    no_stroke: bool,
}

impl SpecArgs {
    fn apply_to(&self, spec: &mut WatermarkSpec) {
        if let Some(text) = &self.text {
            spec.text = text.clone();
        }
        if let Some(family) = &self.font_family {
            spec.font_family = Some(family.clone());
        }
        if let Some(file) = &self.font_file {
            spec.font_file = Some(file.clone());
        }
        if let Some(size) = self.font_size {
            spec.font_size_pt = size;
        }
        spec.bold |= self.bold;
        spec.italic |= self.italic;
        if let Some(color) = self.color {
            spec.color = color;
        }
        if let Some(opacity) = self.opacity {
            spec.opacity = opacity;
        }
        if let Some(rotation) = self.rotation {
            spec.rotation_degrees = rotation;
        }
        if let Some(anchor) = self.anchor {
            spec.anchor = anchor;
        }
        if self.offset_x.is_some() || self.offset_y.is_some() {
            spec.offset = Offset::new(
                self.offset_x.unwrap_or(spec.offset.dx),
                self.offset_y.unwrap_or(spec.offset.dy),
            );
        }

        if self.no_shadow {
            spec.shadow = None;
        } else if self.shadow_color.is_some()
            || self.shadow_offset.is_some()
            || self.shadow_blur.is_some()
        {
            let mut shadow = spec.shadow.unwrap_or(Shadow {
                offset_x: 2.0,
                offset_y: 2.0,
                color: Color::rgba(0, 0, 0, 128),
                blur_radius: 2.0,
            });
            if let Some(color) = self.shadow_color {
                shadow.color = color;
            }
            if let Some(offset) = self.shadow_offset {
                shadow.offset_x = offset;
                shadow.offset_y = offset;
            }
            if let Some(blur) = self.shadow_blur {
                shadow.blur_radius = blur;
            }
            spec.shadow = Some(shadow);
        }

        if self.no_stroke {
            spec.stroke = None;
        } else if self.stroke_width.is_some() || self.stroke_color.is_some() {
            let mut stroke = spec.stroke.unwrap_or(Stroke {
                width: 1.0,
                color: Color::black(),
            });
            if let Some(width) = self.stroke_width {
                stroke.width = width;
            }
            if let Some(color) = self.stroke_color {
                stroke.color = color;
            }
            spec.stroke = Some(stroke);
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = photomark::logging::init_subscriber(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let result = match cli.command {
        Command::Apply(args) => run_apply(&config, args),
        Command::Template(command) => run_template(&config, command).map(|_| true),
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Command failed");
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

fn open_store(config: &AppConfig) -> Result<JsonTemplateStore> {
    let path = config
        .templates
        .resolved_path()
        .context("No template path configured and no user config directory available")?;
    JsonTemplateStore::open(&path)
        .with_context(|| format!("Failed to open template store {}", path.display()))
}

/// Returns `Ok(false)` when any item was not exported.
fn run_apply(config: &AppConfig, args: ApplyArgs) -> Result<bool> {
    let mut spec = match &args.template {
        Some(name) => open_store(config)?
            .load(name)
            .with_context(|| format!("Failed to load template '{}'", name))?,
        None => config.watermark.clone().unwrap_or_default(),
    };
    args.spec.apply_to(&mut spec);
    if spec.text.is_empty() {
        tracing::warn!("Watermark text is empty; images will be exported unchanged");
    }

    let mut inputs = args.inputs.clone();
    if let Some(list) = &args.source_list {
        inputs.extend(read_source_list(list)?);
    }
    let sources = collect_sources(&inputs)?;
    if sources.is_empty() {
        bail!("No input images given");
    }

    let output = args
        .output
        .clone()
        .or_else(|| config.export.output_dir.clone())
        .context("No output directory given (use --output or export.output_dir)")?;

    let mut destination = config.export.destination_policy(output);
    if let Some(prefix) = &args.prefix {
        destination.naming.prefix = prefix.clone();
    }
    if let Some(suffix) = &args.suffix {
        destination.naming.suffix = suffix.clone();
    }
    if args.numbered {
        destination.naming.keep_original_name = false;
    }
    if args.format.is_some() {
        destination.naming.force_format = args.format;
    }
    if let Some(quality) = args.quality {
        destination.quality = quality;
    }
    if args.overwrite {
        destination.conflict = ConflictPolicy::Overwrite;
    }
    if args.max_width.is_some() || args.max_height.is_some() {
        destination.resize = Some(ResizeTo::new(args.max_width, args.max_height));
    }

    let fonts = if config.fonts.include_platform_dirs {
        SystemFontResolver::with_platform_dirs(config.fonts.dirs.clone())
    } else {
        SystemFontResolver::new(config.fonts.dirs.clone())
    };
    let pipeline = BatchPipeline::new(
        Renderer::new(Arc::new(fonts)),
        Arc::new(FsImageIo::with_max_pixels(config.export.max_pixels)),
    )
    .with_workers(args.workers.unwrap_or(config.workers));

    let job = BatchJob::new(sources, spec, destination);
    let handle = pipeline.spawn(job)?;

    signal_hook::flag::register(
        signal_hook::consts::SIGINT,
        handle.cancellation_token().flag(),
    )
    .context("Failed to install Ctrl-C handler")?;

    for event in handle.events().iter() {
        match event {
            BatchEvent::Progress(progress) => {
                tracing::info!(
                    completed = progress.completed,
                    total = progress.total,
                    "Progress {:.0}%",
                    progress.fraction() * 100.0
                );
            }
            BatchEvent::Item(item) => {
                for warning in &item.warnings {
                    tracing::warn!(path = %item.path.display(), "{}", warning);
                }
            }
        }
    }

    let report = handle.join()?;
    print_report(&report);
    Ok(report.is_complete_success())
}

fn print_report(report: &BatchReport) {
    for item in report.failures() {
        if let Some(failure) = item.failure() {
            println!("FAILED {}: {}", item.path.display(), failure);
        }
    }
    println!(
        "Exported {} of {} images ({} failed, {} cancelled) in {:.1}s",
        report.succeeded,
        report.total(),
        report.failed,
        report.cancelled,
        report.elapsed.as_secs_f64()
    );
}

fn run_template(config: &AppConfig, command: TemplateCommand) -> Result<()> {
    let store = open_store(config)?;

    match command {
        TemplateCommand::List => {
            let last_used = store.last_used();
            for name in store.list()? {
                let marker = if last_used.as_deref() == Some(name.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!("{} {}", marker, name);
            }
        }
        TemplateCommand::Show { name } => {
            let spec = store.load(&name)?;
            let template = Template { name, spec };
            println!("{}", serde_json::to_string_pretty(&template)?);
        }
        TemplateCommand::Save { name, from, spec } => {
            let mut base = match from {
                Some(from) => store
                    .load(&from)
                    .with_context(|| format!("Failed to load template '{}'", from))?,
                None => config.watermark.clone().unwrap_or_default(),
            };
            spec.apply_to(&mut base);
            base.validate()
                .with_context(|| format!("Template '{}' is not valid", name))?;
            store.save(&name, &base.normalized())?;
            tracing::info!(template = %name, "Template saved");
        }
        TemplateCommand::Delete { name } => {
            store.delete(&name)?;
            tracing::info!(template = %name, "Template deleted");
        }
    }

    Ok(())
}
