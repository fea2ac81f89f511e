// Progress - Reports scene status transitions while a run is going
use crate::scene_store::{SceneSnapshot, SceneStore};
use crate::types::{GenerationStatus, Scene};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Background task calling `on_change` for every scene whose status moved
pub struct ProgressWatcher {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressWatcher {
    pub fn spawn<F>(store: &SceneStore, mut on_change: F) -> Self
    where
        F: FnMut(&Scene) + Send + 'static,
    {
        let mut updates = store.subscribe();
        let stop = CancellationToken::new();
        let stopped = stop.clone();
        // baseline taken now, not when the task first runs
        let mut last: Vec<GenerationStatus> = updates.borrow().iter().map(|s| s.status).collect();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        report_changes(&mut updates, &mut last, &mut on_change);
                    }
                    _ = stopped.cancelled() => {
                        if updates.has_changed().unwrap_or(false) {
                            report_changes(&mut updates, &mut last, &mut on_change);
                        }
                        break;
                    }
                }
            }
        });
        Self { stop, handle }
    }

    /// Report whatever is still pending, then stop
    pub async fn finish(self) {
        self.stop.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Progress watcher failed: {}", e);
        }
    }
}

fn report_changes<F: FnMut(&Scene)>(
    updates: &mut watch::Receiver<SceneSnapshot>,
    last: &mut Vec<GenerationStatus>,
    on_change: &mut F,
) {
    let scenes = updates.borrow_and_update().clone();
    for (i, scene) in scenes.iter().enumerate() {
        if last.get(i) != Some(&scene.status) {
            on_change(scene);
        }
    }
    *last = scenes.iter().map(|s| s.status).collect();
}
