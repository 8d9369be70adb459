#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod assets;
mod colors;
mod constants;
mod snapshot_watcher;
mod ui;

use clap::Parser;
use constants::{HEADLESS_ICON_RETRIES, HEADLESS_SETTLE};
use eframe::egui::{self, TextureHandle};
use egui_toast::{Toast, ToastKind, ToastOptions, Toasts};
use minimap::snapshot::SnapshotError;
use minimap::{
    ConfigError, FogPreset, FrameClock, IconCache, LabelPlacement, MapLocation, MapSnapshot,
    MinimapConfig, MinimapController, PipelineKind, SvgIconRasterizer,
};
use serde::{Deserialize, Serialize};
use snapshot_watcher::SnapshotWatcher;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use ui::ContextTarget;

/// Interactive minimap viewer.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Snapshot file (.ron or .json), reloaded whenever it changes. Defaults to the
    /// bundled demo map.
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Config file. Defaults to <config dir>/minimap/config.ron when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fog preset: light, standard, heavy or mystical
    #[arg(long)]
    fog: Option<FogPreset>,

    /// Render pipeline: direct or layered
    #[arg(long)]
    pipeline: Option<PipelineKind>,

    /// Render a single frame to this PNG file and exit
    #[arg(long, value_name = "PATH")]
    render_png: Option<PathBuf>,

    /// Surface width for --render-png
    #[arg(long, default_value_t = 640)]
    width: u32,

    /// Surface height for --render-png
    #[arg(long, default_value_t = 480)]
    height: u32,
}

#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error(transparent)]
    Asset(#[from] assets::AssetError),
    #[error("failed to start icon runtime: {0}")]
    Runtime(std::io::Error),
    #[error("nothing was rendered")]
    EmptyFrame,
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Gui(#[from] eframe::Error),
}

/// Viewer settings remembered between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub expanded: bool,
    pub fog_preset: FogPreset,
    pub pipeline: PipelineKind,
    pub show_grid: bool,
    pub show_labels: bool,
    pub show_fog: bool,
    pub show_stats: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            expanded: false,
            fog_preset: FogPreset::default(),
            pipeline: PipelineKind::default(),
            show_grid: true,
            show_labels: true,
            show_fog: true,
            show_stats: false,
        }
    }
}

/// Main application state for the minimap viewer.
pub struct MinimapApp {
    controller: MinimapController,
    prefs: Preferences,
    texture: Option<TextureHandle>,
    labels: Vec<LabelPlacement>,
    watcher: Option<SnapshotWatcher>,
    snapshot_source: String,
    toasts: Toasts,
    /// Where the context menu was opened
    context_target: Option<ContextTarget>,
    hovered_location: Option<MapLocation>,
    selected_location: Option<MapLocation>,
    // Dropped last so in-flight icon tasks see the cache go away first.
    _runtime: Runtime,
}

impl MinimapApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        args: &Args,
        config: MinimapConfig,
        snapshot: MapSnapshot,
        runtime: Runtime,
    ) -> Self {
        let toasts = Toasts::new()
            .anchor(egui::Align2::RIGHT_TOP, (-10.0, 10.0))
            .direction(egui::Direction::TopDown);

        let mut prefs: Preferences = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_else(|| Preferences {
                fog_preset: config.fog_preset,
                pipeline: config.pipeline,
                show_grid: config.render.show_grid,
                show_labels: config.render.show_labels,
                show_fog: config.render.show_fog,
                ..Preferences::default()
            });
        if let Some(fog) = args.fog {
            prefs.fog_preset = fog;
        }
        if let Some(pipeline) = args.pipeline {
            prefs.pipeline = pipeline;
        }

        let icons = IconCache::with_runtime(SvgIconRasterizer, runtime.handle().clone());
        let mut controller = MinimapController::new(config, icons);
        controller.set_snapshot(snapshot);
        controller.center_on_current();

        let watcher = args
            .snapshot
            .as_deref()
            .and_then(|path| SnapshotWatcher::new(path, cc.egui_ctx.clone()));
        if args.snapshot.is_some() && watcher.is_none() {
            log::info!("Snapshot watcher not available - live reload disabled");
        }
        let snapshot_source = match &args.snapshot {
            Some(path) => path.display().to_string(),
            None => "demo map".to_owned(),
        };

        let mut app = Self {
            controller,
            prefs,
            texture: None,
            labels: Vec::new(),
            watcher,
            snapshot_source,
            toasts,
            context_target: None,
            hovered_location: None,
            selected_location: None,
            _runtime: runtime,
        };
        app.apply_preferences();
        app
    }

    /// Pushes the persisted preferences into the controller.
    fn apply_preferences(&mut self) {
        self.controller.set_fog_preset(self.prefs.fog_preset);
        self.controller.set_pipeline(self.prefs.pipeline);
        let mut options = self.controller.config().render;
        options.show_grid = self.prefs.show_grid;
        options.show_labels = self.prefs.show_labels;
        options.show_fog = self.prefs.show_fog;
        self.controller.set_render_options(options);
    }

    fn notify(&mut self, kind: ToastKind, text: impl Into<String>, seconds: f64) {
        self.toasts.add(Toast {
            kind,
            text: text.into().into(),
            options: ToastOptions::default()
                .duration_in_seconds(seconds)
                .show_icon(true),
            ..Default::default()
        });
    }

    /// Polls the snapshot watcher for reloads.
    fn poll_snapshot(&mut self) {
        let Some(watcher) = &mut self.watcher else {
            return;
        };
        match watcher.poll() {
            Some(Ok(snapshot)) => self.controller.set_snapshot(snapshot),
            Some(Err(err)) => {
                log::warn!("Failed to reload {}: {err}", watcher.path().display());
                self.notify(ToastKind::Error, err.to_string(), 8.0);
            }
            None => {}
        }
    }
}

impl eframe::App for MinimapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_snapshot();
        self.handle_keyboard_input(ctx);

        self.show_status_bar(ctx);
        self.show_sidebar(ctx);
        self.show_central_panel(ctx);
        self.process_events();

        self.toasts.show(ctx);
        ctx.request_repaint_after(self.controller.config().frame_interval());
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, &self.prefs);
    }
}

fn load_snapshot(path: Option<&Path>) -> Result<MapSnapshot, ViewerError> {
    match path {
        Some(path) => Ok(MapSnapshot::load(path)?),
        None => Ok(assets::load_demo_snapshot()?),
    }
}

/// Renders one settled frame without opening a window.
fn render_png(
    path: &Path,
    args: &Args,
    mut config: MinimapConfig,
    snapshot: MapSnapshot,
    runtime: &Runtime,
) -> Result<(), ViewerError> {
    if let Some(fog) = args.fog {
        config.fog_preset = fog;
    }
    if let Some(pipeline) = args.pipeline {
        config.pipeline = pipeline;
    }
    let icons = IconCache::with_runtime(SvgIconRasterizer, runtime.handle().clone());
    let mut controller = MinimapController::new(config, icons);
    controller.resize(f64::from(args.width), f64::from(args.height));
    controller.set_snapshot(snapshot);
    controller.center_on_current();

    let clock = FrameClock::now();
    controller.render_frame(clock);
    let settled = clock.advanced(HEADLESS_SETTLE);
    let mut report = controller.render_frame(settled);
    for _ in 0..HEADLESS_ICON_RETRIES {
        if report.fallback_icons == 0 {
            break;
        }
        std::thread::sleep(Duration::from_millis(25));
        report = controller.render_frame(settled);
    }
    if report.fallback_icons > 0 {
        log::warn!("{} icons still missing, drawn as discs", report.fallback_icons);
    }

    let pixmap = controller.surface().ok_or(ViewerError::EmptyFrame)?;
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for pixel in pixmap.pixels() {
        let color = pixel.demultiply();
        rgba.extend_from_slice(&[color.red(), color.green(), color.blue(), color.alpha()]);
    }
    let image = image::RgbaImage::from_raw(pixmap.width(), pixmap.height(), rgba)
        .ok_or(ViewerError::EmptyFrame)?;
    image.save(path)?;
    log::info!(
        "Wrote {}x{} frame to {} ({} locations, {} connections)",
        pixmap.width(),
        pixmap.height(),
        path.display(),
        report.locations,
        report.connections
    );
    Ok(())
}

fn main() -> Result<(), ViewerError> {
    env_logger::init();
    let args = Args::parse();

    let config = MinimapConfig::load_or_default(args.config.as_deref())?;
    let snapshot = load_snapshot(args.snapshot.as_deref())?;
    let runtime = Runtime::new().map_err(ViewerError::Runtime)?;

    if let Some(path) = &args.render_png {
        return render_png(path, &args, config, snapshot, &runtime);
    }

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1100.0, 720.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Minimap",
        options,
        Box::new(move |cc| {
            Ok(Box::new(MinimapApp::new(
                cc, &args, config, snapshot, runtime,
            )))
        }),
    )?;
    Ok(())
}
