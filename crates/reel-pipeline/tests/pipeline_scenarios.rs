//! End-to-end pipeline behavior with FFmpeg replaced by a fake executor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use reel_media::testing::FakeExecutor;
use reel_media::{never_cancelled, parse_manifest, MediaError};
use reel_models::{AgentId, JobState, VideoId, VideoRecord};
use reel_pipeline::{
    Clip, JobRequest, OutroSelection, Pipeline, PipelineConfig, PipelineError,
};
use reel_store::{MemoryStore, StoreError, StoreResult, VideoStore};

struct Fixture {
    dir: TempDir,
    config: PipelineConfig,
    store: Arc<MemoryStore>,
    fake: Arc<FakeExecutor>,
}

impl Fixture {
    async fn new(fake: FakeExecutor) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = PipelineConfig::rooted_at(dir.path());
        config.probe_deliverable = false;
        config.fill_missing_audio = false;

        write(&config.intro_asset_path, 4096).await;
        write(&config.watermark_asset_path, 512).await;
        write(&config.outro_catalog_dir.join("brand.mp4"), 4096).await;

        Self {
            dir,
            config,
            store: Arc::new(MemoryStore::new()),
            fake: Arc::new(fake),
        }
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::with_executor(self.config.clone(), self.store.clone(), self.fake.clone())
    }

    async fn upload(&self, name: &str, bytes: usize) -> Clip {
        let path = self.dir.path().join("incoming").join(name);
        write(&path, bytes).await;
        Clip::new(name, path, bytes as u64)
    }

    fn temp_entries(&self) -> usize {
        std::fs::read_dir(&self.config.temp_root_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    fn deliverables(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.config.output_dir)
            .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    fn manifest_names(&self) -> Vec<String> {
        let call = self
            .fake
            .calls()
            .into_iter()
            .find(|c| c.is_concat())
            .expect("no concat call recorded");
        parse_manifest(&call.manifest.expect("manifest not captured"))
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect()
    }

    /// Source file that was normalized into the segment named `segment`.
    fn source_of(&self, segment: &str) -> PathBuf {
        self.fake
            .calls()
            .into_iter()
            .find(|c| c.output.ends_with(segment))
            .map(|c| c.inputs[0].clone())
            .expect("segment was not normalized")
    }
}

async fn write(path: &Path, bytes: usize) {
    tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
    tokio::fs::write(path, vec![7u8; bytes]).await.unwrap();
}

fn agent() -> AgentId {
    AgentId::from("agent-42")
}

#[tokio::test]
async fn two_clips_without_outro_produce_one_record() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clips = vec![fx.upload("kitchen.mp4", 5000).await, fx.upload("garden.mov", 7000).await];
    let uploads: Vec<PathBuf> = clips.iter().map(|c| c.path.clone()).collect();

    let outcome = fx
        .pipeline()
        .run(JobRequest::new(agent(), clips), never_cancelled())
        .await
        .unwrap();

    assert_eq!(outcome.state, JobState::Completed);
    assert!(outcome.state.is_terminal());
    assert_eq!(outcome.segment_count, 3);
    assert!(!outcome.includes_outro);
    assert!(outcome.deliverable.exists());
    assert_eq!(fx.deliverables(), vec![outcome.deliverable.clone()]);

    let record = outcome.record.unwrap();
    assert!(record.filename_with_outro.is_none());
    assert_eq!(record.agent_id, agent());
    assert_eq!(fx.store.list_for_agent(&agent()).await.unwrap().len(), 1);

    assert_eq!(
        fx.manifest_names(),
        vec!["000_intro.mp4", "001_clip.mp4", "002_clip.mp4"]
    );
    assert_eq!(fx.temp_entries(), 0);
    assert!(uploads.iter().all(|p| !p.exists()));
}

#[tokio::test]
async fn segments_follow_intro_clips_outro_order() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let mut clips = Vec::new();
    for i in 0..5 {
        clips.push(fx.upload(&format!("room_{i}.mp4"), 2048 + i).await);
    }
    let sources: Vec<PathBuf> = clips.iter().map(|c| c.path.clone()).collect();
    let request = JobRequest::new(agent(), clips)
        .with_outro(OutroSelection::Catalog("brand.mp4".into()));

    let outcome = fx.pipeline().run(request, never_cancelled()).await.unwrap();

    assert!(outcome.includes_outro);
    assert_eq!(outcome.segment_count, 7);
    assert_eq!(
        fx.manifest_names(),
        vec![
            "000_intro.mp4",
            "001_clip.mp4",
            "002_clip.mp4",
            "003_clip.mp4",
            "004_clip.mp4",
            "005_clip.mp4",
            "006_outro.mp4",
        ]
    );
    assert_eq!(fx.source_of("000_intro.mp4"), fx.config.intro_asset_path);
    for (i, source) in sources.iter().enumerate() {
        assert_eq!(&fx.source_of(&format!("{:03}_clip.mp4", i + 1)), source);
    }
    assert_eq!(
        fx.source_of("006_outro.mp4"),
        fx.config.outro_catalog_dir.join("brand.mp4")
    );

    let record = outcome.record.unwrap();
    assert_eq!(record.filename_with_outro.as_deref(), Some(record.filename.as_str()));
}

#[tokio::test]
async fn quoted_upload_path_survives_the_manifest() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clip = fx.upload("o'brien's loft.mp4", 4096).await;

    fx.pipeline()
        .run(JobRequest::new(agent(), vec![clip.clone()]), never_cancelled())
        .await
        .unwrap();

    assert_eq!(fx.source_of("001_clip.mp4"), clip.path);
    assert_eq!(fx.manifest_names(), vec!["000_intro.mp4", "001_clip.mp4"]);
}

#[tokio::test]
async fn relative_temp_root_writes_absolute_manifest_entries() {
    let mut fx = Fixture::new(FakeExecutor::new()).await;
    let relative_root = PathBuf::from(format!("scenario-temp-{}", VideoId::new()));
    fx.config.temp_root_dir = relative_root.clone();
    let clips = vec![fx.upload("kitchen.mp4", 4096).await];

    fx.pipeline()
        .run(JobRequest::new(agent(), clips), never_cancelled())
        .await
        .unwrap();

    let call = fx.fake.calls().into_iter().find(|c| c.is_concat()).unwrap();
    let entries = parse_manifest(&call.manifest.unwrap()).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|p| p.is_absolute()), "{entries:?}");
    assert_eq!(fx.temp_entries(), 0);

    std::fs::remove_dir_all(&relative_root).unwrap();
}

#[tokio::test]
async fn no_clips_fails_before_any_work() {
    let fx = Fixture::new(FakeExecutor::new()).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), Vec::new()), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::NoClipsProvided));
    assert_eq!(err.status_code(), 400);
    assert!(fx.fake.calls().is_empty());
    assert!(!fx.config.temp_root_dir.exists());
}

#[tokio::test]
async fn blank_agent_is_unauthenticated() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clip = fx.upload("a.mp4", 4096).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(AgentId::from("  "), vec![clip]), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Unauthenticated));
    assert_eq!(err.status_code(), 401);
}

#[tokio::test]
async fn too_many_clips_rejected() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let mut clips = Vec::new();
    for i in 0..11 {
        clips.push(fx.upload(&format!("c{i}.mp4"), 2048).await);
    }

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), clips.clone()), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::TooManyClips { count: 11, max: 10 }));
    assert!(fx.fake.calls().is_empty());
    assert!(clips.iter().all(|c| !c.path.exists()));
}

#[tokio::test]
async fn empty_second_clip_aborts_with_server_error() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clips = vec![fx.upload("ok.mp4", 4096).await, fx.upload("empty.mp4", 0).await];

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), clips), never_cancelled())
        .await
        .unwrap_err();

    match &err {
        PipelineError::Media { stage, source } => {
            assert_eq!(*stage, JobState::Normalizing);
            match source {
                MediaError::InvalidInput { path, .. } => assert!(path.ends_with("empty.mp4")),
                other => panic!("unexpected media error: {other:?}"),
            }
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status_code(), 500);
    assert!(fx.deliverables().is_empty());
    assert!(fx.store.is_empty().await);
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn missing_catalog_outro_degrades_to_no_outro() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clips = vec![fx.upload("a.mp4", 4096).await, fx.upload("b.mp4", 4096).await];
    let request = JobRequest::new(agent(), clips)
        .with_outro(OutroSelection::Catalog("nonexistent.mp4".into()));

    let outcome = fx.pipeline().run(request, never_cancelled()).await.unwrap();

    assert_eq!(outcome.segment_count, 3);
    assert!(!outcome.includes_outro);
    assert!(outcome.record.unwrap().filename_with_outro.is_none());
    assert_eq!(
        fx.manifest_names(),
        vec!["000_intro.mp4", "001_clip.mp4", "002_clip.mp4"]
    );
}

#[tokio::test]
async fn uploaded_outro_is_appended_and_removed() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clip = fx.upload("a.mp4", 4096).await;
    let outro = fx.upload("my-outro.mp4", 4096).await;
    let request = JobRequest::new(agent(), vec![clip])
        .with_outro(OutroSelection::Uploaded(outro.clone()));

    let outcome = fx.pipeline().run(request, never_cancelled()).await.unwrap();

    assert!(outcome.includes_outro);
    assert_eq!(fx.source_of("002_outro.mp4"), outro.path);
    assert!(!outro.path.exists());
}

#[tokio::test]
async fn missing_intro_is_fatal_before_workspace() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    tokio::fs::remove_file(&fx.config.intro_asset_path).await.unwrap();
    let clip = fx.upload("a.mp4", 4096).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), vec![clip]), never_cancelled())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::IntroAssetMissing(_)));
    assert_eq!(err.status_code(), 500);
    assert!(!fx.config.temp_root_dir.exists());
}

#[tokio::test]
async fn concat_failure_leaves_nothing_behind() {
    let fx = Fixture::new(FakeExecutor::new().fail_on_output("combined")).await;
    let clip = fx.upload("a.mp4", 4096).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), vec![clip]), never_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(JobState::Assembling));
    assert_eq!(err.code(), "concat_failure");
    assert!(fx.deliverables().is_empty());
    assert!(fx.store.is_empty().await);
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn watermark_failure_leaves_nothing_behind() {
    let fx = Fixture::new(FakeExecutor::new().fail_on_input("video-watermark")).await;
    let clip = fx.upload("a.mp4", 4096).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), vec![clip]), never_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.stage(), Some(JobState::Watermarking));
    assert_eq!(err.code(), "compositing_failure");
    assert!(fx.deliverables().is_empty());
    assert!(fx.store.is_empty().await);
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn undersized_clip_encode_fails_the_job() {
    let fx = Fixture::new(FakeExecutor::new().undersized_on_output("001_clip", 1023)).await;
    let clip = fx.upload("a.mp4", 4096).await;

    let err = fx
        .pipeline()
        .run(JobRequest::new(agent(), vec![clip]), never_cancelled())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "encode_failure");
    assert!(fx.deliverables().is_empty());
}

struct FailingStore;

#[async_trait]
impl VideoStore for FailingStore {
    async fn create(&self, _record: &VideoRecord) -> StoreResult<()> {
        Err(StoreError::Io(std::io::Error::other("disk full")))
    }

    async fn get(&self, _id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(None)
    }

    async fn list_for_agent(&self, _agent_id: &AgentId) -> StoreResult<Vec<VideoRecord>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _id: &VideoId) -> StoreResult<Option<VideoRecord>> {
        Ok(None)
    }
}

#[tokio::test]
async fn persistence_failure_still_delivers() {
    let fx = Fixture::new(FakeExecutor::new()).await;
    let clip = fx.upload("a.mp4", 4096).await;
    let pipeline =
        Pipeline::with_executor(fx.config.clone(), Arc::new(FailingStore), fx.fake.clone());

    let outcome = pipeline
        .run(JobRequest::new(agent(), vec![clip]), never_cancelled())
        .await
        .unwrap();

    assert!(outcome.record.is_none());
    assert!(outcome.deliverable.exists());
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn cancellation_kills_job_and_cleans_up() {
    let fx = Fixture::new(FakeExecutor::new().with_delay(Duration::from_secs(30))).await;
    let clip = fx.upload("a.mp4", 4096).await;
    let pipeline = Arc::new(fx.pipeline());

    let job = pipeline.spawn(JobRequest::new(agent(), vec![clip]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    job.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), job.wait())
        .await
        .expect("job did not stop after cancel")
        .unwrap_err();

    assert!(matches!(err, PipelineError::Cancelled));
    assert!(fx.deliverables().is_empty());
    assert_eq!(fx.temp_entries(), 0);
}

#[tokio::test]
async fn saturated_pipeline_answers_busy() {
    let fx = Fixture::new(FakeExecutor::new().with_delay(Duration::from_secs(30))).await;
    let mut config = fx.config.clone();
    config.max_concurrent_jobs = 1;
    config.admission_timeout = Duration::from_millis(100);
    let pipeline = Arc::new(Pipeline::with_executor(
        config,
        fx.store.clone(),
        fx.fake.clone(),
    ));

    let first = pipeline
        .clone()
        .spawn(JobRequest::new(agent(), vec![fx.upload("a.mp4", 4096).await]));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pipeline.available_slots(), 0);

    let err = pipeline
        .run(
            JobRequest::new(agent(), vec![fx.upload("b.mp4", 4096).await]),
            never_cancelled(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Busy(_)));
    assert_eq!(err.status_code(), 503);

    first.cancel();
    let _ = first.wait().await;
    assert_eq!(pipeline.available_slots(), 1);
}
