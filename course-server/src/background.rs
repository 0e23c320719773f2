use course_blob::SessionReaper;
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::PipelineState;

/// Long-running maintenance tasks: the upload session reaper and, when
/// `sync.interval_secs` is set, the registry sync sweeper.
pub struct BackgroundTasks {
    handles: Vec<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn start(state: &PipelineState) -> Self {
        let mut handles = Vec::new();

        let reaper = SessionReaper::new(state.uploads.coordinator().clone());
        handles.push(tokio::spawn(reaper.start()));

        if let Some(every) = state.settings.sync_interval {
            let sweeper = state.sync.sweeper().clone();
            handles.push(tokio::spawn(sweeper.start(every)));
        } else {
            info!("Periodic sync disabled; pending pointer writes flush through the cron route");
        }

        Self { handles }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}
