use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use photo_editor_history::{
    HistoryConfig, HistoryUpdate, MemorySurface, PixelBuffer, SnapshotHistory,
};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

pub mod script;

use script::{parse_script, ScriptLine, Step};

#[derive(Debug, Parser)]
#[command(name = "history-cli")]
#[command(about = "Replay edit scripts against the photo editor history")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Replay a script of edits and history steps over an image.
    Replay {
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        #[arg(long, value_name = "FILE")]
        script: PathBuf,
        #[arg(long)]
        max_entries: Option<usize>,
        #[arg(long)]
        max_bytes: Option<u64>,
        #[arg(long)]
        thumbnail_height: Option<u32>,
        #[arg(long)]
        no_thumbnails: bool,
        /// Write the final surface as PNG.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

struct ReplayOptions<'a> {
    image: &'a Path,
    script: &'a Path,
    max_entries: Option<usize>,
    max_bytes: Option<u64>,
    thumbnail_height: Option<u32>,
    no_thumbnails: bool,
    output: Option<&'a Path>,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    match cli.command {
        Commands::Replay {
            image,
            script,
            max_entries,
            max_bytes,
            thumbnail_height,
            no_thumbnails,
            output,
        } => {
            let update = run_replay(&ReplayOptions {
                image: &image,
                script: &script,
                max_entries,
                max_bytes,
                thumbnail_height,
                no_thumbnails,
                output: output.as_deref(),
            })?;
            println!("{}", update.to_json_pretty()?);
            Ok(())
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_config(options: &ReplayOptions<'_>) -> Result<HistoryConfig> {
    let mut config = HistoryConfig::from_env()
        .context("invalid history settings in environment")?
        .with_thumbnail_workers(0);

    if let Some(max_entries) = options.max_entries {
        config = config.with_max_entries(max_entries);
    }
    if let Some(max_bytes) = options.max_bytes {
        config = config.with_max_bytes(Some(max_bytes));
    }
    if let Some(height) = options.thumbnail_height {
        config = config.with_thumbnail_height(height);
    }
    if options.no_thumbnails {
        config = config.with_thumbnails(false);
    }

    config.validate().context("invalid history settings")?;
    Ok(config)
}

fn load_surface(path: &Path) -> Result<MemorySurface> {
    let image = image::open(path)
        .with_context(|| format!("failed to open image {}", path.display()))?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let pixels = PixelBuffer::new(width, height, image.into_raw())?;
    Ok(MemorySurface::new(pixels))
}

fn run_replay(options: &ReplayOptions<'_>) -> Result<HistoryUpdate> {
    let config = build_config(options)?;
    let source = fs::read_to_string(options.script)
        .with_context(|| format!("failed to read script {}", options.script.display()))?;
    let steps = parse_script(&source)?;

    let surface = load_surface(options.image)?;
    let mut history = SnapshotHistory::new(surface, config)?;

    for ScriptLine { line, step } in &steps {
        apply_step(&mut history, step).with_context(|| format!("line {line}"))?;
    }

    let drained = history.run_idle_jobs();
    tracing::debug!(drained, "thumbnail jobs drained");

    if let Some(output) = options.output {
        write_png(history.surface().pixels(), output)?;
    }

    let mut update = history.current_update();
    update.tainted = Some(history.is_tainted());
    Ok(update)
}

fn apply_step(history: &mut SnapshotHistory<MemorySurface>, step: &Step) -> Result<()> {
    match step {
        Step::Push(label) => {
            if !history.push(label.as_deref()) {
                tracing::warn!("push skipped, surface unreadable");
            }
        }
        Step::Undo => match history.undo() {
            Some(snapshot) => history.restore(&snapshot)?,
            None => tracing::info!("nothing to undo"),
        },
        Step::Redo => match history.redo() {
            Some(snapshot) => history.restore(&snapshot)?,
            None => tracing::info!("nothing to redo"),
        },
        Step::Fill(rgba) => {
            let pixels = history.surface().pixels();
            let filled = PixelBuffer::filled(pixels.width(), pixels.height(), *rgba);
            history.surface_mut().set_pixels(filled);
        }
        Step::Invert => {
            for pixel in history.surface_mut().pixels_mut().data_mut().chunks_exact_mut(4) {
                for channel in &mut pixel[..3] {
                    *channel = 255 - *channel;
                }
            }
        }
        Step::Block => history.surface_mut().block_reads("blocked by replay script"),
        Step::Unblock => history.surface_mut().unblock_reads(),
        Step::MaxEntries(max_entries) => history.set_max_entries(*max_entries)?,
        Step::Clear => {
            if !history.clear() {
                tracing::warn!("clear refused, surface unreadable");
            }
        }
    }
    Ok(())
}

fn write_png(pixels: &PixelBuffer, path: &Path) -> Result<()> {
    let image = image::RgbaImage::from_raw(pixels.width(), pixels.height(), pixels.data().to_vec())
        .context("surface pixels do not form an RGBA image")?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
