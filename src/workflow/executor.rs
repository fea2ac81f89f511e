// Executor - Runs the scene sequence through the video job client, one scene at a time
use super::guard::RunGuard;
use crate::jobs::SceneGenerator;
use crate::scene_store::{SceneStore, StoreError};
use crate::types::{GenerationStatus, ProjectConfig};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{error, info, warn};

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every scene is completed
    Finished { completed: usize },
    /// A scene failed; later scenes were not attempted
    Halted { index: usize, error: String },
    /// The scene list changed under the run (e.g. reset) and it stopped
    Interrupted { reason: String },
    /// Another run was active; nothing was started
    AlreadyRunning,
}

pub struct GenerationOrchestrator {
    store: Arc<SceneStore>,
    generator: Arc<dyn SceneGenerator>,
    config: Arc<RwLock<ProjectConfig>>,
    guard: RunGuard,
}

impl GenerationOrchestrator {
    pub fn new(
        store: Arc<SceneStore>,
        generator: Arc<dyn SceneGenerator>,
        config: Arc<RwLock<ProjectConfig>>,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            guard: RunGuard::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_active()
    }

    /// Generate every scene that is not completed yet, in order, stopping at
    /// the first failure.
    pub async fn start_generation(&self) -> RunOutcome {
        let Some(_token) = self.guard.try_acquire() else {
            warn!("Generation already running, ignoring start request");
            return RunOutcome::AlreadyRunning;
        };

        let aspect_ratio = self
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .aspect_ratio;
        info!("🚀 Starting generation run ({} scenes, {})", self.store.len(), aspect_ratio);

        let mut cursor = 0;
        loop {
            let snapshot = self.store.all();
            let next = snapshot
                .iter()
                .enumerate()
                .skip(cursor)
                .find(|(_, scene)| !scene.status.is_completed())
                .map(|(index, scene)| (index, scene.clone()));

            let Some((index, scene)) = next else {
                break;
            };

            info!("📍 Scene {} ({}/{}): generating", scene.scene, index + 1, snapshot.len());
            if let Err(e) = self.store.update_status(index, GenerationStatus::Generating, None, None) {
                return self.interrupted(e);
            }

            match self.generator.generate(&scene.final_prompt, aspect_ratio).await {
                Ok(media_ref) => {
                    if let Err(e) = self.store.update_status(
                        index,
                        GenerationStatus::Completed,
                        Some(media_ref),
                        None,
                    ) {
                        return self.interrupted(e);
                    }
                    cursor = index + 1;
                }
                Err(job_error) => {
                    let message = job_error.to_string();
                    error!("❌ Scene {} failed: {}", scene.scene, message);
                    if let Err(e) = self.store.update_status(
                        index,
                        GenerationStatus::Failed,
                        None,
                        Some(message.clone()),
                    ) {
                        return self.interrupted(e);
                    }
                    return RunOutcome::Halted {
                        index,
                        error: message,
                    };
                }
            }
        }

        let completed = self.store.completed_count();
        info!("✅ Generation run finished: {} scenes completed", completed);
        RunOutcome::Finished { completed }
    }

    /// Put one scene back to `Idle` and, unless a run is active, start a run.
    pub async fn retry(&self, index: usize) -> Result<RunOutcome, StoreError> {
        let scene = self.store.reset_status(index)?;
        info!("🔄 Retrying scene {}", scene.scene);

        if self.guard.is_active() {
            return Ok(RunOutcome::AlreadyRunning);
        }
        Ok(self.start_generation().await)
    }

    fn interrupted(&self, e: StoreError) -> RunOutcome {
        warn!("Generation run interrupted: {}", e);
        RunOutcome::Interrupted {
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobError;
    use crate::scene_store::SceneObserver;
    use crate::script::parse_scene_script;
    use crate::types::{AspectRatio, MediaRef, Scene};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    use GenerationStatus::*;

    /// Answers calls from a script; succeeds once the script runs out
    struct ScriptedGenerator {
        answers: Mutex<VecDeque<Result<MediaRef, JobError>>>,
        calls: Mutex<Vec<(String, AspectRatio)>>,
    }

    impl ScriptedGenerator {
        fn new(answers: Vec<Result<MediaRef, JobError>>) -> Self {
            Self {
                answers: Mutex::new(answers.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SceneGenerator for ScriptedGenerator {
        async fn generate(&self, prompt: &str, aspect_ratio: AspectRatio) -> Result<MediaRef, JobError> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((prompt.to_string(), aspect_ratio));
                calls.len()
            };
            self.answers
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(format!("media/{}.mp4", n)))
        }
    }

    /// Records the status vector after every store mutation
    #[derive(Default)]
    struct History {
        states: Mutex<Vec<Vec<GenerationStatus>>>,
    }

    impl SceneObserver for History {
        fn scenes_changed(&self, scenes: &[Arc<Scene>]) {
            self.states
                .lock()
                .unwrap()
                .push(scenes.iter().map(|s| s.status).collect());
        }
    }

    fn setup(
        count: usize,
        generator: Arc<dyn SceneGenerator>,
    ) -> (Arc<SceneStore>, GenerationOrchestrator) {
        let script: Vec<String> = (1..=count)
            .map(|i| format!(r#"{{"scene": {}, "prompt": "shot {}"}}"#, i, i))
            .collect();
        let scenes = parse_scene_script(&format!("[{}]", script.join(",")), "Film noir").unwrap();

        let store = Arc::new(SceneStore::new());
        store.replace_all(scenes);
        let config = Arc::new(RwLock::new(ProjectConfig {
            api_key_present: true,
            aspect_ratio: AspectRatio::Portrait,
            ..ProjectConfig::default()
        }));
        let orchestrator = GenerationOrchestrator::new(store.clone(), generator, config);
        (store, orchestrator)
    }

    fn statuses(store: &SceneStore) -> Vec<GenerationStatus> {
        store.all().iter().map(|s| s.status).collect()
    }

    #[tokio::test]
    async fn test_all_scenes_complete_in_order() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let (store, orchestrator) = setup(3, generator.clone());

        let outcome = orchestrator.start_generation().await;

        assert_eq!(outcome, RunOutcome::Finished { completed: 3 });
        assert_eq!(statuses(&store), vec![Completed, Completed, Completed]);
        let calls = generator.calls.lock().unwrap();
        assert_eq!(calls[0].0, "Film noir. Scene details: shot 1");
        assert_eq!(calls[2].0, "Film noir. Scene details: shot 3");
        assert!(calls.iter().all(|(_, ratio)| *ratio == AspectRatio::Portrait));
        assert_eq!(store.get(1).unwrap().media_ref.as_deref(), Some("media/2.mp4"));
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_failure_halts_the_run() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("media/a.mp4".into()),
            Err(JobError::NoOutput),
        ]));
        let (store, orchestrator) = setup(3, generator.clone());

        let outcome = orchestrator.start_generation().await;

        assert_eq!(
            outcome,
            RunOutcome::Halted {
                index: 1,
                error: "API returned no video URI".into()
            }
        );
        assert_eq!(statuses(&store), vec![Completed, Failed, Idle]);
        assert_eq!(generator.call_count(), 2);
        assert_eq!(store.get(1).unwrap().error.as_deref(), Some("API returned no video URI"));
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_retry_resumes_at_failed_scene() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("media/a.mp4".into()),
            Err(JobError::Download("Forbidden".into())),
        ]));
        let (store, orchestrator) = setup(3, generator.clone());
        orchestrator.start_generation().await;
        assert_eq!(statuses(&store), vec![Completed, Failed, Idle]);

        let outcome = orchestrator.retry(1).await.unwrap();

        assert_eq!(outcome, RunOutcome::Finished { completed: 3 });
        assert_eq!(statuses(&store), vec![Completed, Completed, Completed]);
        // scene 1 was not submitted again
        assert_eq!(generator.call_count(), 4);
        assert_eq!(store.get(0).unwrap().media_ref.as_deref(), Some("media/a.mp4"));
        assert_eq!(store.get(1).unwrap().error, None);
    }

    #[tokio::test]
    async fn test_retry_out_of_range() {
        let generator = Arc::new(ScriptedGenerator::new(vec![]));
        let (_store, orchestrator) = setup(1, generator);
        assert!(orchestrator.retry(5).await.is_err());
    }

    #[tokio::test]
    async fn test_completed_scenes_never_regress_and_one_generates_at_a_time() {
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Ok("media/a.mp4".into()),
            Ok("media/b.mp4".into()),
            Err(JobError::Remote("quota".into())),
        ]));
        let (store, orchestrator) = setup(4, generator);
        let history = Arc::new(History::default());
        store.add_observer(history.clone());

        orchestrator.start_generation().await;
        orchestrator.retry(2).await.unwrap();

        let states = history.states.lock().unwrap();
        for state in states.iter() {
            assert!(state.iter().filter(|s| **s == Generating).count() <= 1);
        }
        for pair in states.windows(2) {
            for (before, after) in pair[0].iter().zip(pair[1].iter()) {
                if *before == Completed {
                    assert_eq!(*after, Completed);
                }
            }
        }
        assert_eq!(statuses(&store), vec![Completed; 4]);
    }

    /// Blocks inside `generate` until released
    struct GatedGenerator {
        entered: Notify,
        release: Notify,
        entries: AtomicUsize,
    }

    impl GatedGenerator {
        fn new() -> Self {
            Self {
                entered: Notify::new(),
                release: Notify::new(),
                entries: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SceneGenerator for GatedGenerator {
        async fn generate(&self, _prompt: &str, _aspect_ratio: AspectRatio) -> Result<MediaRef, JobError> {
            self.entries.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            Ok("media/gated.mp4".into())
        }
    }

    #[tokio::test]
    async fn test_second_run_is_rejected_while_active() {
        let generator = Arc::new(GatedGenerator::new());
        let (store, orchestrator) = setup(1, generator.clone());
        let orchestrator = Arc::new(orchestrator);

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start_generation().await })
        };
        generator.entered.notified().await;

        assert!(orchestrator.is_running());
        assert_eq!(orchestrator.start_generation().await, RunOutcome::AlreadyRunning);
        assert_eq!(statuses(&store), vec![Generating]);

        generator.release.notify_one();
        assert_eq!(running.await.unwrap(), RunOutcome::Finished { completed: 1 });
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_cleared_store_interrupts_run() {
        let generator = Arc::new(GatedGenerator::new());
        let (store, orchestrator) = setup(2, generator.clone());
        let orchestrator = Arc::new(orchestrator);

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start_generation().await })
        };
        generator.entered.notified().await;
        store.clear();
        generator.release.notify_one();

        assert!(matches!(running.await.unwrap(), RunOutcome::Interrupted { .. }));
        assert!(!orchestrator.is_running());
    }

    #[tokio::test]
    async fn test_retry_during_active_run_only_resets_the_scene() {
        let generator = Arc::new(GatedGenerator::new());
        let (store, orchestrator) = setup(3, generator.clone());
        store
            .update_status(2, Failed, None, Some("quota".into()))
            .unwrap();
        let orchestrator = Arc::new(orchestrator);

        let running = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.start_generation().await })
        };
        generator.entered.notified().await;

        assert_eq!(orchestrator.retry(2).await.unwrap(), RunOutcome::AlreadyRunning);
        assert_eq!(statuses(&store), vec![Generating, Idle, Idle]);
        assert_eq!(store.get(2).unwrap().error, None);
        assert_eq!(generator.entries.load(Ordering::SeqCst), 1);

        // the active run picks the reset scene up when its cursor gets there
        generator.release.notify_one();
        generator.entered.notified().await;
        generator.release.notify_one();
        generator.entered.notified().await;
        generator.release.notify_one();

        assert_eq!(running.await.unwrap(), RunOutcome::Finished { completed: 3 });
        assert_eq!(generator.entries.load(Ordering::SeqCst), 3);
    }
}
