//! Job scheduling and hand-off of reconstructed meshes to the scene.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use glam::Vec3;
use parking_lot::Mutex;
use scanview_data::{PointCloud, ReconstructedMesh};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{MeshingParameters, ProgressReporter, ReconstructionEngine, ReconstructionError};
use crate::reveal::{RevealState, RevealTimeline, SurfaceVisibility};
use crate::scene::{LightingModel, NodeContent, NodeId, Scene, SceneDispatcher, SceneNode};

/// What happens to earlier results when a new one is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerPolicy {
    /// Clear the container before attaching, keeping one active result.
    #[default]
    ReplacePrevious,
    /// Keep earlier results in the container.
    Accumulate,
}

/// Identifier of a submitted job, unique per orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job#{}", self.0)
    }
}

/// Lifecycle of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

fn read_status(signal: &AtomicU8) -> JobStatus {
    match signal.load(Ordering::Acquire) {
        0 => JobStatus::Pending,
        1 => JobStatus::Running,
        2 => JobStatus::Completed,
        3 => JobStatus::Failed,
        _ => JobStatus::Cancelled,
    }
}

fn write_status(signal: &AtomicU8, status: JobStatus) {
    let value = match status {
        JobStatus::Pending => 0,
        JobStatus::Running => 1,
        JobStatus::Completed => 2,
        JobStatus::Failed => 3,
        JobStatus::Cancelled => 4,
    };
    signal.store(value, Ordering::Release);
}

type CompletionFn = Box<dyn FnOnce(Result<NodeId, ReconstructionError>) + Send>;

/// Single-fire completion slot. Whichever path delivers first wins; later
/// deliveries are ignored.
#[derive(Clone)]
struct Completion {
    slot: Arc<Mutex<Option<CompletionFn>>>,
    status: Arc<AtomicU8>,
}

impl Completion {
    fn deliver(&self, result: Result<NodeId, ReconstructionError>) -> bool {
        let Some(callback) = self.slot.lock().take() else {
            return false;
        };
        let status = match &result {
            Ok(_) => JobStatus::Completed,
            Err(ReconstructionError::Cancelled) => JobStatus::Cancelled,
            Err(_) => JobStatus::Failed,
        };
        write_status(&self.status, status);
        callback(result);
        true
    }
}

/// Completion carried by a scene task. If the task is dropped without
/// running, for example because the scene went away with the task still
/// queued, the job completes with [`ReconstructionError::SceneUnavailable`].
struct QueuedCompletion(Completion);

impl QueuedCompletion {
    fn deliver(self, result: Result<NodeId, ReconstructionError>) {
        self.0.deliver(result);
    }
}

impl Drop for QueuedCompletion {
    fn drop(&mut self) {
        if self.0.deliver(Err(ReconstructionError::SceneUnavailable)) {
            debug!("Scene task dropped before it ran");
        }
    }
}

/// Handle to a submitted job.
pub struct JobHandle {
    id: JobId,
    cancel: Arc<AtomicBool>,
    status: Arc<AtomicU8>,
    worker: Option<JoinHandle<()>>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn status(&self) -> JobStatus {
        read_status(&self.status)
    }

    /// Request cooperative cancellation. The job still completes exactly
    /// once, normally with [`ReconstructionError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Whether the completion callback has run.
    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }

    /// Block until the worker thread has finished. The completion itself
    /// runs on the presentation thread during the next
    /// [`Scene::process_pending`].
    pub fn wait(mut self) -> JobStatus {
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Worker for {} panicked outside the engine", self.id);
            }
        }
        self.status()
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Build the scene node for a reconstructed mesh: pivot at the bounding
/// box's horizontal center (Y = 0) so the mesh spins about its own vertical
/// axis, dissolve shading with constant lighting, and a fresh reveal
/// animation starting at `t = 0`.
pub fn build_reveal_node(
    mesh: ReconstructedMesh,
    visibility: SurfaceVisibility,
    timeline: Arc<RevealTimeline>,
) -> SceneNode {
    let pivot = mesh
        .bounding_box()
        .map(|bounds| {
            let center = bounds.center();
            Vec3::new(center.x, 0.0, center.z)
        })
        .unwrap_or(Vec3::ZERO);

    let mut node = SceneNode::new(NodeContent::Mesh(Arc::new(mesh)));
    node.transform.pivot = pivot;
    node.shading.visibility = Some(visibility);
    node.shading.lighting = LightingModel::Constant;
    node.start_reveal(RevealState::new(timeline));
    node
}

/// Schedules reconstruction jobs and attaches their results to a container
/// node in the scene.
pub struct ReconstructionOrchestrator {
    engine: Arc<dyn ReconstructionEngine>,
    dispatcher: SceneDispatcher,
    container: NodeId,
    timeline: Arc<RevealTimeline>,
    visibility: SurfaceVisibility,
    policy: ContainerPolicy,
    next_job: AtomicU64,
}

impl ReconstructionOrchestrator {
    pub fn new(
        engine: Arc<dyn ReconstructionEngine>,
        dispatcher: SceneDispatcher,
        container: NodeId,
    ) -> Self {
        Self {
            engine,
            dispatcher,
            container,
            timeline: Arc::new(RevealTimeline::default()),
            visibility: SurfaceVisibility::default(),
            policy: ContainerPolicy::default(),
            next_job: AtomicU64::new(1),
        }
    }

    pub fn with_timeline(mut self, timeline: Arc<RevealTimeline>) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn with_visibility(mut self, visibility: SurfaceVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_policy(mut self, policy: ContainerPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn policy(&self) -> ContainerPolicy {
        self.policy
    }

    /// Submit a job. Returns immediately.
    ///
    /// `on_progress` runs on the worker thread, zero or more times.
    /// `on_complete` runs exactly once: on the presentation thread with the
    /// attached node or the error, or with
    /// [`ReconstructionError::SceneUnavailable`] if the scene is gone. In
    /// that case it runs on the worker, or on the thread that drops the
    /// scene while the hand-off is still queued.
    pub fn submit<P, C>(
        &self,
        cloud: Arc<PointCloud>,
        params: MeshingParameters,
        mut on_progress: P,
        on_complete: C,
    ) -> JobHandle
    where
        P: FnMut(f32) + Send + 'static,
        C: FnOnce(Result<NodeId, ReconstructionError>) + Send + 'static,
    {
        let id = JobId(self.next_job.fetch_add(1, Ordering::Relaxed));
        let cancel = Arc::new(AtomicBool::new(false));
        let status = Arc::new(AtomicU8::new(0));
        let completion = Completion {
            slot: Arc::new(Mutex::new(Some(Box::new(on_complete)))),
            status: Arc::clone(&status),
        };

        info!(
            "Submitting {} ({} points, resolution {}, {:?})",
            id,
            cloud.len(),
            params.resolution,
            params.coloring_strategy
        );

        let engine = Arc::clone(&self.engine);
        let dispatcher = self.dispatcher.clone();
        let container = self.container;
        let timeline = Arc::clone(&self.timeline);
        let visibility = self.visibility;
        let policy = self.policy;
        let worker_cancel = Arc::clone(&cancel);
        let worker_status = Arc::clone(&status);
        let worker_completion = completion.clone();

        let spawned = thread::Builder::new()
            .name(format!("reconstruction-{}", id.0))
            .spawn(move || {
                write_status(&worker_status, JobStatus::Running);

                let result = run_engine(
                    engine.as_ref(),
                    &cloud,
                    &params,
                    &mut on_progress,
                    &worker_cancel,
                );
                if let Err(e) = &result {
                    warn!("Reconstruction {} failed: {}", id, e);
                }

                // A task the scene never runs drops its QueuedCompletion, which
                // reports SceneUnavailable. That covers a failed send too.
                let task_completion = QueuedCompletion(worker_completion);
                dispatcher.dispatch(move |scene: &mut Scene| {
                    let outcome = result.and_then(|mesh| {
                        attach_result(scene, id, mesh, container, policy, visibility, timeline)
                    });
                    task_completion.deliver(outcome);
                });
            });

        let worker = match spawned {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!("Could not spawn worker for {}: {}", id, e);
                completion.deliver(Err(ReconstructionError::Spawn(e)));
                None
            }
        };

        JobHandle {
            id,
            cancel,
            status,
            worker,
        }
    }

    /// Best-effort cancellation of a submitted job.
    pub fn cancel(&self, handle: &JobHandle) {
        debug!("Cancelling {}", handle.id());
        handle.cancel();
    }
}

/// Validate inputs and run the engine, converting panics and late
/// cancellation into errors.
fn run_engine(
    engine: &dyn ReconstructionEngine,
    cloud: &PointCloud,
    params: &MeshingParameters,
    on_progress: &mut (dyn FnMut(f32) + Send),
    cancel: &AtomicBool,
) -> Result<ReconstructedMesh, ReconstructionError> {
    params.validate()?;
    if cloud.is_empty() {
        return Err(ReconstructionError::EmptyPointCloud);
    }

    let mut reporter = ProgressReporter::new(on_progress, cancel);
    let mesh = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.reconstruct(cloud, params, &mut reporter)
    }))
    .map_err(|_| ReconstructionError::WorkerPanicked)??;

    // An engine that ignores the flag still must not attach a result.
    if cancel.load(Ordering::Acquire) {
        debug!("Discarding result of cancelled job");
        return Err(ReconstructionError::Cancelled);
    }
    if mesh.vertex_count() == 0 || mesh.face_count() == 0 {
        return Err(ReconstructionError::EmptyMesh);
    }
    mesh.validate()?;

    info!(
        "Reconstructed mesh: {} vertices, {} faces{}",
        mesh.vertex_count(),
        mesh.face_count(),
        if mesh.is_textured() { ", textured" } else { "" }
    );
    Ok(mesh)
}

fn attach_result(
    scene: &mut Scene,
    id: JobId,
    mesh: ReconstructedMesh,
    container: NodeId,
    policy: ContainerPolicy,
    visibility: SurfaceVisibility,
    timeline: Arc<RevealTimeline>,
) -> Result<NodeId, ReconstructionError> {
    if !scene.contains(container) {
        return Err(crate::scene::SceneError::UnknownNode(container).into());
    }

    if policy == ContainerPolicy::ReplacePrevious {
        let removed = scene.clear_children(container);
        if removed > 0 {
            debug!("Retired {} previous result node(s)", removed);
        }
    }

    let node = build_reveal_node(mesh, visibility, timeline).with_name(format!("mesh-{}", id.0));
    let node_id = scene.add_child(container, node)?;
    info!("Attached {} as {}", id, node_id);
    Ok(node_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanview_data::Point;
    use std::sync::mpsc;

    struct QuadEngine;

    impl ReconstructionEngine for QuadEngine {
        fn reconstruct(
            &self,
            _cloud: &PointCloud,
            _params: &MeshingParameters,
            progress: &mut ProgressReporter<'_>,
        ) -> Result<ReconstructedMesh, ReconstructionError> {
            progress.checkpoint(50.0)?;
            Ok(quad_mesh())
        }
    }

    fn quad_mesh() -> ReconstructedMesh {
        ReconstructedMesh::new(
            vec![
                Vec3::new(1.0, 2.0, 3.0),
                Vec3::new(5.0, 2.0, 3.0),
                Vec3::new(5.0, 6.0, 9.0),
                Vec3::new(1.0, 6.0, 9.0),
            ],
            Vec::new(),
            vec![[0, 1, 2], [0, 2, 3]],
        )
    }

    struct FailingEngine;

    impl ReconstructionEngine for FailingEngine {
        fn reconstruct(
            &self,
            _cloud: &PointCloud,
            _params: &MeshingParameters,
            _progress: &mut ProgressReporter<'_>,
        ) -> Result<ReconstructedMesh, ReconstructionError> {
            Err(ReconstructionError::Engine("mesher exploded".to_string()))
        }
    }

    struct PanickingEngine;

    impl ReconstructionEngine for PanickingEngine {
        fn reconstruct(
            &self,
            _cloud: &PointCloud,
            _params: &MeshingParameters,
            _progress: &mut ProgressReporter<'_>,
        ) -> Result<ReconstructedMesh, ReconstructionError> {
            panic!("engine bug");
        }
    }

    fn cloud() -> Arc<PointCloud> {
        Arc::new(PointCloud::new(vec![
            Point::white(Vec3::ZERO),
            Point::white(Vec3::X),
            Point::white(Vec3::Z),
        ]))
    }

    fn setup(engine: Arc<dyn ReconstructionEngine>) -> (Scene, NodeId, ReconstructionOrchestrator) {
        let mut scene = Scene::new();
        let root = scene.root();
        let container = scene
            .add_child(root, SceneNode::empty().with_name("container"))
            .unwrap();
        let orchestrator = ReconstructionOrchestrator::new(engine, scene.dispatcher(), container);
        (scene, container, orchestrator)
    }

    type Outcomes = mpsc::Receiver<Result<NodeId, ReconstructionError>>;

    fn submit(orchestrator: &ReconstructionOrchestrator) -> (JobHandle, Outcomes) {
        let (tx, rx) = mpsc::channel();
        let handle = orchestrator.submit(
            cloud(),
            MeshingParameters::default(),
            |_| {},
            move |result| {
                let _ = tx.send(result);
            },
        );
        (handle, rx)
    }

    #[test]
    fn test_success_attaches_pivoted_node() {
        let (mut scene, container, orchestrator) = setup(Arc::new(QuadEngine));
        let (handle, outcomes) = submit(&orchestrator);
        handle.wait();

        // Nothing is attached until the presentation thread runs the task.
        assert!(scene.children(container).is_empty());
        scene.process_pending();

        let node_id = outcomes.try_recv().unwrap().unwrap();
        assert!(outcomes.try_recv().is_err());
        assert_eq!(scene.children(container), &[node_id]);

        let node = scene.node(node_id).unwrap();
        assert_eq!(node.transform.pivot, Vec3::new(3.0, 0.0, 6.0));
        assert_eq!(node.shading.lighting, LightingModel::Constant);
        assert!(node.shading.visibility.is_some());
        assert_eq!(node.reveal.as_ref().unwrap().reveal_parameter(), 0.0);
    }

    #[test]
    fn test_failure_attaches_nothing() {
        let (mut scene, container, orchestrator) = setup(Arc::new(FailingEngine));
        let (handle, outcomes) = submit(&orchestrator);
        handle.wait();
        scene.process_pending();
        scene.process_pending();

        let result = outcomes.try_recv().unwrap();
        assert!(matches!(result, Err(ReconstructionError::Engine(_))));
        assert!(outcomes.try_recv().is_err());
        assert!(scene.children(container).is_empty());
    }

    #[test]
    fn test_panic_is_reported_once() {
        let (mut scene, container, orchestrator) = setup(Arc::new(PanickingEngine));
        let (handle, outcomes) = submit(&orchestrator);
        handle.wait();
        scene.process_pending();

        assert!(matches!(
            outcomes.try_recv().unwrap(),
            Err(ReconstructionError::WorkerPanicked)
        ));
        assert!(outcomes.try_recv().is_err());
        assert!(scene.children(container).is_empty());
    }

    #[test]
    fn test_status_transitions() {
        let (mut scene, _container, orchestrator) = setup(Arc::new(QuadEngine));
        let (handle, _outcomes) = submit(&orchestrator);
        let id = handle.id();
        let status = Arc::clone(&handle.status);
        assert_eq!(handle.wait(), JobStatus::Running);
        scene.process_pending();
        assert_eq!(read_status(&status), JobStatus::Completed);
        assert_eq!(id, JobId(1));
    }

    #[test]
    fn test_replace_previous_keeps_one_result() {
        let (mut scene, container, orchestrator) = setup(Arc::new(QuadEngine));
        for _ in 0..3 {
            let (handle, _outcomes) = submit(&orchestrator);
            handle.wait();
            scene.process_pending();
        }
        assert_eq!(scene.children(container).len(), 1);
        assert_eq!(scene.animating_nodes().count(), 1);
    }

    #[test]
    fn test_accumulate_policy_keeps_all_results() {
        let (mut scene, container, orchestrator) = setup(Arc::new(QuadEngine));
        let orchestrator = orchestrator.with_policy(ContainerPolicy::Accumulate);
        for _ in 0..3 {
            let (handle, _outcomes) = submit(&orchestrator);
            handle.wait();
            scene.process_pending();
        }
        assert_eq!(scene.children(container).len(), 3);
    }

    #[test]
    fn test_invalid_parameters_fail_without_engine() {
        let (mut scene, container, orchestrator) = setup(Arc::new(PanickingEngine));
        let (tx, rx) = mpsc::channel();
        let params = MeshingParameters {
            resolution: 0,
            ..MeshingParameters::default()
        };
        let handle = orchestrator.submit(cloud(), params, |_| {}, move |r| {
            let _ = tx.send(r);
        });
        handle.wait();
        scene.process_pending();
        assert!(matches!(
            rx.try_recv().unwrap(),
            Err(ReconstructionError::InvalidParameters(_))
        ));
        assert!(scene.children(container).is_empty());
    }

    #[test]
    fn test_scene_dropped_still_completes() {
        let (scene, _container, orchestrator) = setup(Arc::new(QuadEngine));
        drop(scene);
        let (handle, outcomes) = submit(&orchestrator);
        assert_eq!(handle.wait(), JobStatus::Failed);
        assert!(matches!(
            outcomes.try_recv().unwrap(),
            Err(ReconstructionError::SceneUnavailable)
        ));
    }

    #[test]
    fn test_scene_dropped_with_task_queued_still_completes() {
        let (scene, _container, orchestrator) = setup(Arc::new(QuadEngine));
        let (handle, outcomes) = submit(&orchestrator);
        let status = Arc::clone(&handle.status);
        handle.wait();
        assert!(outcomes.try_recv().is_err());

        drop(scene);
        assert_eq!(read_status(&status), JobStatus::Failed);
        assert!(matches!(
            outcomes.try_recv().unwrap(),
            Err(ReconstructionError::SceneUnavailable)
        ));
        assert!(outcomes.try_recv().is_err());
    }

    /// Waits for a release signal, then returns a mesh without polling the
    /// cancel flag.
    struct GatedEngine {
        gate: Mutex<mpsc::Receiver<()>>,
    }

    impl ReconstructionEngine for GatedEngine {
        fn reconstruct(
            &self,
            _cloud: &PointCloud,
            _params: &MeshingParameters,
            _progress: &mut ProgressReporter<'_>,
        ) -> Result<ReconstructedMesh, ReconstructionError> {
            let _ = self.gate.lock().recv();
            Ok(quad_mesh())
        }
    }

    #[test]
    fn test_cancel_discards_late_result() {
        let (release, gate) = mpsc::channel();
        let engine = GatedEngine {
            gate: Mutex::new(gate),
        };
        let (mut scene, container, orchestrator) = setup(Arc::new(engine));
        let (handle, outcomes) = submit(&orchestrator);

        orchestrator.cancel(&handle);
        assert!(handle.is_cancelled());
        release.send(()).unwrap();
        let status = Arc::clone(&handle.status);
        handle.wait();
        scene.process_pending();
        assert_eq!(read_status(&status), JobStatus::Cancelled);

        assert!(matches!(
            outcomes.try_recv().unwrap(),
            Err(ReconstructionError::Cancelled)
        ));
        assert!(outcomes.try_recv().is_err());
        assert!(scene.children(container).is_empty());
    }

    #[test]
    fn test_build_reveal_node_without_vertices() {
        let node = build_reveal_node(
            ReconstructedMesh::default(),
            SurfaceVisibility::default(),
            Arc::new(RevealTimeline::default()),
        );
        assert_eq!(node.transform.pivot, Vec3::ZERO);
    }
}
