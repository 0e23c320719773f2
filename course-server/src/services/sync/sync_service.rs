use course_core::{CourseError, CourseResult};
use course_queue::{SweepSummary, SyncSweeper};
use serde::Serialize;

/// Cron-facing wrapper around the registry sweeper.
#[derive(Clone)]
pub struct SyncService {
    sweeper: SyncSweeper,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub success: bool,
    #[serde(flatten)]
    pub summary: SweepSummary,
}

impl SyncService {
    pub fn new(sweeper: SyncSweeper) -> Self {
        Self { sweeper }
    }

    pub fn sweeper(&self) -> &SyncSweeper {
        &self.sweeper
    }

    pub async fn sync_pending_courses(&self) -> CourseResult<SyncReport> {
        let summary = self
            .sweeper
            .sync_pending_courses()
            .await
            .map_err(CourseError::from)?;
        Ok(SyncReport { success: true, summary })
    }

    pub async fn pending_sync_count(&self) -> CourseResult<usize> {
        Ok(self
            .sweeper
            .pending_sync_count()
            .await
            .map_err(CourseError::from)?)
    }
}
