//! Headless run loops for the viewer commands.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use scanview_core::config::ConfigError;
use scanview_core::reconstruction::JobStatus;
use scanview_core::reveal::TimelineError;
use scanview_core::sequence::SequenceError;
use scanview_core::{
    DelaunayEngine, FrameSequencePlayer, NodeId, PlySequenceStore, ReconstructionError,
    ReconstructionOrchestrator, Scene, SceneNode, ViewerConfig,
};
use scanview_data::{DataError, load_point_cloud_from_ply};
use thiserror::Error;
use tracing::{debug, info, warn};

const CONTAINER_NAME: &str = "container";

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Timeline(#[from] TimelineError),
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Initialize logging from `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    #[cfg(feature = "tracy")]
    {
        use tracing_subscriber::Layer;
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;
        tracing_subscriber::registry()
            .with(tracing_tracy::TracyLayer::default())
            .with(
                tracing_subscriber::fmt::layer().with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                ),
            )
            .init();
    }

    #[cfg(not(feature = "tracy"))]
    {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_target(false)
            .init();
    }
}

pub fn load_config(path: Option<&Path>) -> Result<ViewerConfig, AppError> {
    match path {
        Some(path) => {
            let config = ViewerConfig::from_json_file(path)?;
            info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(ViewerConfig::default()),
    }
}

/// Settings shared by both commands.
#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    frame_time: Duration,
}

impl RunOptions {
    pub fn new(fps: u32) -> Result<Self, AppError> {
        if fps == 0 {
            return Err(AppError::InvalidArgument("fps must be positive".to_string()));
        }
        Ok(Self {
            frame_time: Duration::from_secs_f64(1.0 / fps as f64),
        })
    }
}

/// Paces the presentation loop at a fixed rate.
struct FrameClock {
    frame_time: Duration,
    next: Instant,
}

impl FrameClock {
    fn new(frame_time: Duration) -> Self {
        Self {
            frame_time,
            next: Instant::now() + frame_time,
        }
    }

    fn dt(&self) -> f64 {
        self.frame_time.as_secs_f64()
    }

    fn wait(&mut self) {
        let now = Instant::now();
        if self.next > now {
            thread::sleep(self.next - now);
        }
        self.next += self.frame_time;
    }
}

fn new_scene() -> Result<(Scene, NodeId), AppError> {
    let mut scene = Scene::new();
    let root = scene.root();
    let container = scene
        .add_child(root, SceneNode::empty().with_name(CONTAINER_NAME))
        .map_err(ReconstructionError::from)?;
    Ok((scene, container))
}

fn log_reveal(scene: &Scene, node: NodeId) {
    let Some(state) = scene.node(node) else {
        return;
    };
    let visible = scene.visible_point_count(node).unwrap_or(0);
    let total = state.content.local_points().count();
    info!(
        "t = {:.3}, rotation = {:.3} rad, visible {}/{}",
        state.shading.reveal(),
        state.transform.rotation,
        visible,
        total
    );
}

/// Reconstruct `cloud_path` and run the reveal animation for `seconds`.
pub fn run_reveal(
    config: ViewerConfig,
    cloud_path: &Path,
    seconds: f64,
    resolution: Option<u32>,
    options: RunOptions,
) -> Result<(), AppError> {
    let cloud = Arc::new(load_point_cloud_from_ply(cloud_path)?);
    let timeline = Arc::new(config.reveal.build_timeline()?);
    let mut params = config.meshing;
    if let Some(resolution) = resolution {
        params.resolution = resolution;
    }

    let (mut scene, container) = new_scene()?;
    let orchestrator = ReconstructionOrchestrator::new(
        Arc::new(DelaunayEngine::new()),
        scene.dispatcher(),
        container,
    )
    .with_timeline(timeline)
    .with_visibility(config.reveal.visibility)
    .with_policy(config.container_policy);

    let (done_tx, done_rx) = mpsc::channel();
    let handle = orchestrator.submit(
        cloud,
        params,
        |percent| debug!("Reconstruction {:.0}%", percent),
        move |result| {
            let _ = done_tx.send(result);
        },
    );

    let mut clock = FrameClock::new(options.frame_time);
    let frames_per_log = (1.0 / clock.dt()).round().max(1.0) as u64;
    let mut revealed: Option<(NodeId, u64)> = None;
    let mut frame: u64 = 0;

    loop {
        scene.tick(clock.dt());
        frame += 1;

        if revealed.is_none() {
            match done_rx.try_recv() {
                Ok(Ok(node)) => {
                    info!("Mesh attached as {}; starting reveal", node);
                    revealed = Some((node, frame));
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => {
                    warn!("Reconstruction finished without a result");
                    break;
                }
            }
        }

        if let Some((node, started)) = revealed {
            let shown = frame - started;
            if shown % frames_per_log == 0 {
                log_reveal(&scene, node);
            }
            if shown as f64 * clock.dt() >= seconds {
                break;
            }
        }
        clock.wait();
    }

    let status = handle.wait();
    if status != JobStatus::Completed {
        warn!("Reconstruction ended as {:?}", status);
    }
    Ok(())
}

/// Loop the sequence in `dir` for `seconds`, then dismiss it.
pub fn run_play(
    config: ViewerConfig,
    dir: &Path,
    seconds: f64,
    delete_on_exit: bool,
    options: RunOptions,
) -> Result<(), AppError> {
    let store = PlySequenceStore::open(dir)?;
    if store.is_empty() {
        warn!("No PLY frames in {}", dir.display());
    }

    let (mut scene, container) = new_scene()?;
    let mut player = FrameSequencePlayer::with_frame_interval(
        Box::new(store),
        scene.dispatcher(),
        container,
        config.playback.frame_interval()?,
    )?;
    player.set_delete_on_dismiss(delete_on_exit);
    player.show_first_frame();
    player.play();

    let mut clock = FrameClock::new(options.frame_time);
    let frames_per_log = (1.0 / clock.dt()).round().max(1.0) as u64;
    let total_frames = (seconds / clock.dt()).ceil().max(0.0) as u64;
    for frame in 1..=total_frames {
        scene.tick(clock.dt());
        if frame % frames_per_log == 0 {
            let cursor = player.cursor();
            info!(
                "Showing frame {:?} (next {}, playing: {})",
                cursor.displayed, cursor.index, cursor.is_playing
            );
        }
        clock.wait();
    }

    player.dismiss(&mut scene)?;
    if delete_on_exit {
        info!("Deleted {}", dir.display());
    }
    Ok(())
}
