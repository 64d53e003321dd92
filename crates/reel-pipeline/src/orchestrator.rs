//! Pipeline orchestrator.
//!
//! Sequences normalize -> assemble -> watermark -> persist for one job,
//! owns the job's temporary files and removes them on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::{watch, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

use reel_media::fs_utils::{move_file, remove_file_if_exists};
use reel_media::{
    cancelled, probe_video, CancelSignal, CommandExecutor, FfmpegRunner, Normalizer,
    SegmentAssembler, WatermarkCompositor,
};
use reel_models::{JobId, JobState, Segment, SegmentKind, VideoRecord};
use reel_store::VideoStore;

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::outro::resolve_outro;
use crate::request::{JobOutcome, JobRequest};
use crate::workspace::JobWorkspace;

/// The video-assembly pipeline.
///
/// One instance serves every job; per-job state lives in [`JobWorkspace`]
/// and on the stack of [`Pipeline::run`].
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    normalizer: Normalizer,
    assembler: SegmentAssembler,
    compositor: WatermarkCompositor,
    store: Arc<dyn VideoStore>,
    admission: Arc<Semaphore>,
}

impl Pipeline {
    /// Create a pipeline that runs the real `ffmpeg` binary.
    pub fn new(config: PipelineConfig, store: Arc<dyn VideoStore>) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout);
        Self::with_executor(config, store, Arc::new(runner))
    }

    /// Create a pipeline with a custom engine executor.
    pub fn with_executor(
        config: PipelineConfig,
        store: Arc<dyn VideoStore>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let normalizer = Normalizer::new(executor.clone())
            .with_profile(config.normalize_profile.clone())
            .with_min_output_bytes(config.min_output_bytes)
            .with_fill_missing_audio(config.fill_missing_audio);
        let assembler = SegmentAssembler::new(executor.clone())
            .with_profile(config.concat_profile.clone())
            .with_min_output_bytes(config.min_output_bytes);
        let compositor = WatermarkCompositor::new(executor, &config.watermark_asset_path)
            .with_placement(config.watermark_placement)
            .with_profile(config.watermark_profile.clone())
            .with_min_output_bytes(config.min_output_bytes);
        let admission = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));

        Self {
            config: Arc::new(config),
            normalizer,
            assembler,
            compositor,
            store,
            admission,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn VideoStore> {
        &self.store
    }

    /// Job slots currently free.
    pub fn available_slots(&self) -> usize {
        self.admission.available_permits()
    }

    /// Run the job on its own task.
    ///
    /// Dropping the returned handle does not stop the job; call
    /// [`RunningJob::cancel`] for that. Either way cleanup runs to completion.
    pub fn spawn(self: Arc<Self>, request: JobRequest) -> RunningJob {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { self.run(request, rx).await });
        RunningJob {
            cancel: CancelHandle(Arc::new(tx)),
            handle,
        }
    }

    /// Run one job to completion.
    ///
    /// On success the deliverable sits in the output directory and the
    /// returned outcome is in the `Completed` state. On failure no
    /// deliverable and no record exist. Temporary files and the uploaded
    /// sources are removed in both cases.
    pub async fn run(&self, request: JobRequest, cancel: CancelSignal) -> PipelineResult<JobOutcome> {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, &request.agent_id);
        let mut progress = JobProgress::new(logger.clone());
        logger.log_start(&format!(
            "{} clip(s), outro requested: {}",
            request.clips.len(),
            request.outro.is_some()
        ));

        // Validating: nothing touches the filesystem until this passes.
        progress.enter(JobState::Validating);
        let (intro, outro) = match self.validate(&request).await {
            Ok(assets) => assets,
            Err(e) => return self.reject(&request, &mut progress, e).await,
        };

        let _permit = match self.admit(&cancel).await {
            Ok(permit) => permit,
            Err(e) => return self.reject(&request, &mut progress, e).await,
        };

        metrics::record_job_started();
        let started = Instant::now();

        let workspace = match JobWorkspace::create(&self.config.temp_root_dir, &job_id).await {
            Ok(ws) => ws,
            Err(e) => {
                self.discard_uploads(&request, &logger).await;
                return Err(self.fail(&mut progress, PipelineError::Workspace(e)));
            }
        };

        let result = self
            .execute(
                &workspace,
                &job_id,
                &request,
                &intro,
                outro.as_deref(),
                &mut progress,
                &cancel,
            )
            .await;

        if let Err(e) = workspace.cleanup().await {
            logger.log_warning(progress.state(), &format!("workspace cleanup failed: {e}"));
        }
        self.discard_uploads(&request, &logger).await;

        match result {
            Ok(mut outcome) => {
                progress.enter(JobState::Completed);
                outcome.state = progress.state();
                metrics::record_job_completed(started.elapsed().as_secs_f64());
                logger.log_completion(&format!(
                    "{} segment(s) -> {}",
                    outcome.segment_count,
                    outcome.deliverable.display()
                ));
                Ok(outcome)
            }
            Err(e) => Err(self.fail(&mut progress, e)),
        }
    }

    /// Check the request and resolve the brand assets.
    async fn validate(&self, request: &JobRequest) -> PipelineResult<(PathBuf, Option<PathBuf>)> {
        if request.agent_id.is_blank() {
            return Err(PipelineError::Unauthenticated);
        }
        if request.clips.is_empty() {
            return Err(PipelineError::NoClipsProvided);
        }
        if request.clips.len() > self.config.max_clips {
            return Err(PipelineError::TooManyClips {
                count: request.clips.len(),
                max: self.config.max_clips,
            });
        }

        let intro = self.config.intro_asset_path.clone();
        if !tokio::fs::try_exists(&intro).await.unwrap_or(false) {
            return Err(PipelineError::IntroAssetMissing(intro));
        }

        let outro = resolve_outro(&self.config, request.outro.as_ref()).await;
        Ok((intro, outro))
    }

    /// Wait for a job slot, giving up after the admission timeout.
    async fn admit(&self, cancel: &CancelSignal) -> PipelineResult<OwnedSemaphorePermit> {
        let mut cancel = cancel.clone();
        let timeout = self.config.admission_timeout;

        tokio::select! {
            permit = tokio::time::timeout(timeout, self.admission.clone().acquire_owned()) => {
                match permit {
                    Ok(Ok(permit)) => Ok(permit),
                    _ => {
                        metrics::record_admission_rejected();
                        Err(PipelineError::Busy(timeout.as_secs()))
                    }
                }
            }
            _ = cancelled(&mut cancel) => Err(PipelineError::Cancelled),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute(
        &self,
        workspace: &JobWorkspace,
        job_id: &JobId,
        request: &JobRequest,
        intro: &Path,
        outro: Option<&Path>,
        progress: &mut JobProgress,
        cancel: &CancelSignal,
    ) -> PipelineResult<JobOutcome> {
        // Normalizing
        progress.enter(JobState::Normalizing);
        let plan = plan_segments(workspace, request, intro, outro);
        progress.log(&format!("normalizing {} segment(s)", plan.len()));

        let normalizer = &self.normalizer;
        let segments: Vec<Segment> = stream::iter(plan)
            .map(|planned| async move {
                normalizer
                    .normalize(&planned.source, &planned.segment.path, cancel)
                    .await
                    .map(|_| planned.segment)
            })
            .buffered(self.config.max_parallel_normalize.max(1))
            .try_collect()
            .await
            .map_err(|e| PipelineError::media(JobState::Normalizing, e))?;
        let includes_outro = segments.iter().any(|s| s.kind == SegmentKind::Outro);

        // Assembling
        progress.enter(JobState::Assembling);
        let assembled = self
            .assembler
            .assemble(
                &segments,
                &workspace.manifest_path(),
                &workspace.assembled_path(),
                cancel,
            )
            .await
            .map_err(|e| PipelineError::media(JobState::Assembling, e))?;

        // Watermarking
        progress.enter(JobState::Watermarking);
        let watermarked = self
            .compositor
            .composite(&assembled, &workspace.watermarked_path(), cancel)
            .await
            .map_err(|e| PipelineError::media(JobState::Watermarking, e))?;
        if let Err(e) = remove_file_if_exists(&assembled).await {
            progress.warn(&format!("failed to remove assembled stream: {e}"));
        }

        // Persisting
        progress.enter(JobState::Persisting);
        if *cancel.borrow() {
            return Err(PipelineError::Cancelled);
        }
        let filename = format!("{job_id}.mp4");
        let deliverable = self.config.output_dir.join(&filename);
        move_file(&watermarked, &deliverable)
            .await
            .map_err(|e| PipelineError::media(JobState::Persisting, e))?;

        if self.config.probe_deliverable {
            self.log_deliverable_info(&deliverable, progress).await;
        }

        let record = VideoRecord::new(request.agent_id.clone(), filename, includes_outro);
        let record = match self.store.create(&record).await {
            Ok(()) => Some(record),
            Err(e) => {
                metrics::record_persist_failure();
                progress.error(&format!(
                    "failed to persist record for {}: {e}",
                    deliverable.display()
                ));
                None
            }
        };

        progress.enter(JobState::Delivering);
        Ok(JobOutcome {
            job_id: job_id.clone(),
            deliverable,
            record,
            segment_count: segments.len(),
            includes_outro,
            state: progress.state(),
        })
    }

    async fn log_deliverable_info(&self, deliverable: &Path, progress: &JobProgress) {
        match probe_video(deliverable).await {
            Ok(info) => progress.log(&format!(
                "deliverable {}x{} {:.2}s, {} bytes",
                info.width, info.height, info.duration, info.size
            )),
            Err(e) => progress.warn(&format!("could not probe deliverable: {e}")),
        }
    }

    /// Fail a job that never started running.
    async fn reject(
        &self,
        request: &JobRequest,
        progress: &mut JobProgress,
        error: PipelineError,
    ) -> PipelineResult<JobOutcome> {
        metrics::record_job_rejected(error.code());
        self.discard_uploads(request, &progress.logger).await;
        progress.enter(JobState::Failed);
        progress.warn(&error.to_string());
        Err(error)
    }

    fn fail(&self, progress: &mut JobProgress, error: PipelineError) -> PipelineError {
        metrics::record_job_failed(error.code());
        let stage = progress.state();
        progress.enter(JobState::Failed);
        progress.logger.log_error(stage, &error.to_string());
        error
    }

    /// Delete the caller's uploaded files; they are consumed by the job.
    async fn discard_uploads(&self, request: &JobRequest, logger: &JobLogger) {
        for path in request.uploaded_files() {
            if let Err(e) = remove_file_if_exists(&path).await {
                logger.log_warning(
                    JobState::Failed,
                    &format!("failed to remove upload {}: {e}", path.display()),
                );
            }
        }
    }
}

/// A job running on its own task.
pub struct RunningJob {
    cancel: CancelHandle,
    handle: JoinHandle<PipelineResult<JobOutcome>>,
}

impl RunningJob {
    /// Request cancellation; the running FFmpeg process is killed.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel the job from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait for the job to finish.
    pub async fn wait(self) -> PipelineResult<JobOutcome> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(PipelineError::TaskFailed(e.to_string())),
        }
    }
}

/// Cancels a [`RunningJob`].
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

struct PlannedSegment {
    segment: Segment,
    source: PathBuf,
}

/// Intro at ordinal 0, clips in upload order, outro last.
fn plan_segments(
    workspace: &JobWorkspace,
    request: &JobRequest,
    intro: &Path,
    outro: Option<&Path>,
) -> Vec<PlannedSegment> {
    let mut plan = Vec::with_capacity(request.clips.len() + 2);
    let mut push = |kind: SegmentKind, source: &Path| {
        let ordinal = plan.len() as u32;
        plan.push(PlannedSegment {
            segment: Segment::new(ordinal, kind, workspace.segment_path(ordinal, kind)),
            source: source.to_path_buf(),
        });
    };

    push(SegmentKind::Intro, intro);
    for clip in &request.clips {
        push(SegmentKind::Clip, &clip.path);
    }
    if let Some(outro) = outro {
        push(SegmentKind::Outro, outro);
    }
    plan
}

/// Current state plus per-stage timing.
struct JobProgress {
    state: JobState,
    logger: JobLogger,
    stage_started: Instant,
}

impl JobProgress {
    fn new(logger: JobLogger) -> Self {
        Self {
            state: JobState::Received,
            logger,
            stage_started: Instant::now(),
        }
    }

    fn state(&self) -> JobState {
        self.state
    }

    fn enter(&mut self, next: JobState) {
        let previous = self.state;
        if let Err(e) = self.state.transition(next) {
            self.logger.log_error(previous, &e.to_string());
            return;
        }
        metrics::record_stage(previous, self.stage_started.elapsed().as_secs_f64());
        self.stage_started = Instant::now();
        if !next.is_terminal() {
            self.logger.log_stage(next, "entered");
        }
    }

    fn log(&self, message: &str) {
        self.logger.log_stage(self.state, message);
    }

    fn warn(&self, message: &str) {
        self.logger.log_warning(self.state, message);
    }

    fn error(&self, message: &str) {
        self.logger.log_error(self.state, message);
    }
}
