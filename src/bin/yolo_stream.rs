// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
/// YOLO 实时视频检测 - 三线程流水线
///
/// 直接运行: cargo run --release --features onnx,ffmpeg,display -- --source video.mp4
/// 摄像头:   cargo run --release --features onnx,ffmpeg,display -- --device 0
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use yolo_stream::config::{Args, OutputKind, PipelineConfig, SourceSpec};
use yolo_stream::inference::OrtEngine;
use yolo_stream::input::{ImageSequenceSource, VideoSource};
use yolo_stream::pipeline::{Pipeline, PipelineHandle, PipelineSummary, StopReason};
use yolo_stream::renderer::{HeadlessSurface, ImageDirSurface, RenderSurface};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.pipeline_config().context("invalid configuration")?;
    config.print_summary();

    // 模型和后端先加载, 失败时不启动任何线程
    let engine = OrtEngine::build(&args.model, config.backend())
        .with_context(|| format!("cannot load model {}", args.model.display()))?;
    let source = open_source(&args, &config)?;

    let summary = match args.output.unwrap_or_else(default_output) {
        OutputKind::Window => run_window(&config, source, engine)?,
        OutputKind::Headless => run_blocking(&config, source, engine, HeadlessSurface::new())?,
        OutputKind::Dir => {
            let surface = ImageDirSurface::create(&args.save_dir)?;
            run_blocking(&config, source, engine, surface)?
        }
    };

    info!(
        "🏁 Done ({}): {} frames rendered in {:.1}s",
        summary.reason,
        summary.frames_rendered,
        summary.elapsed.as_secs_f64()
    );
    Ok(())
}

fn default_output() -> OutputKind {
    if cfg!(feature = "display") {
        OutputKind::Window
    } else {
        OutputKind::Headless
    }
}

fn open_source(args: &Args, config: &PipelineConfig) -> Result<Box<dyn VideoSource + Send>> {
    match args.source_spec()? {
        SourceSpec::Images(dir) => {
            let source = ImageSequenceSource::open(&dir, Some(config.fallback_source_fps))?;
            Ok(Box::new(source))
        }
        spec => open_ffmpeg(spec, config),
    }
}

#[cfg(feature = "ffmpeg")]
fn open_ffmpeg(spec: SourceSpec, config: &PipelineConfig) -> Result<Box<dyn VideoSource + Send>> {
    use yolo_stream::input::FfmpegSource;

    let fps = Some(config.fallback_source_fps);
    let source = match spec {
        SourceSpec::Camera(device) => FfmpegSource::open_camera(&device, fps)
            .with_context(|| format!("cannot open camera {}", device))?,
        SourceSpec::Stream(url) => FfmpegSource::open(&url, fps)?,
        SourceSpec::Images(dir) => anyhow::bail!("{} is an image directory", dir.display()),
    };
    Ok(Box::new(source))
}

#[cfg(not(feature = "ffmpeg"))]
fn open_ffmpeg(spec: SourceSpec, _config: &PipelineConfig) -> Result<Box<dyn VideoSource + Send>> {
    anyhow::bail!("{:?} needs the `ffmpeg` feature (or pass a directory of images)", spec)
}

/// Ctrl-C → Interrupted
fn install_interrupt(handle: PipelineHandle) -> Result<()> {
    ctrlc::set_handler(move || {
        if !handle.stop(StopReason::Interrupted) {
            warn!("⚠️ Already stopping");
        }
    })
    .context("cannot install Ctrl-C handler")
}

fn run_blocking<R>(
    config: &PipelineConfig,
    source: Box<dyn VideoSource + Send>,
    engine: OrtEngine,
    surface: R,
) -> Result<PipelineSummary>
where
    R: RenderSurface + Send + 'static,
{
    let pipeline = Pipeline::start(config, source, engine, surface)?;
    install_interrupt(pipeline.handle())?;
    Ok(pipeline.wait()?)
}

#[cfg(feature = "display")]
fn run_window(
    config: &PipelineConfig,
    source: Box<dyn VideoSource + Send>,
    engine: OrtEngine,
) -> Result<PipelineSummary> {
    let (surface, window) = yolo_stream::renderer::window_surface();
    let pipeline = Pipeline::start(config, source, engine, surface)?;
    let handle = pipeline.handle();
    install_interrupt(handle.clone())?;

    // macroquad 必须在主线程运行
    macroquad::Window::new("YOLO Stream", window.run(handle.clone()));
    handle.stop(StopReason::UserQuit);
    Ok(pipeline.wait()?)
}

#[cfg(not(feature = "display"))]
fn run_window(
    _config: &PipelineConfig,
    _source: Box<dyn VideoSource + Send>,
    _engine: OrtEngine,
) -> Result<PipelineSummary> {
    anyhow::bail!("--output window needs the `display` feature; use --output headless or --output dir")
}
