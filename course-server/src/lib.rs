pub mod background;
pub mod config;
pub mod routes;
pub mod services;
pub mod state;

use course_axum::{axum, AxumApp};
use course_core::CourseConfigSnapshot;

use crate::background::BackgroundTasks;
use crate::config::PipelineSettings;
pub use crate::state::{PipelineParts, PipelineState};

/// The assembled HTTP surface plus the services behind it.
pub struct CourseServer {
    pub app: AxumApp,
    pub state: PipelineState,
    pub config: CourseConfigSnapshot,
    background: Option<BackgroundTasks>,
}

impl CourseServer {
    pub fn listen_addr(&self) -> String {
        let host = self.config.get("http.host").unwrap_or("127.0.0.1");
        let port = self.config.get("http.port").unwrap_or("3030");
        format!("{host}:{port}")
    }

    pub async fn listen(self) -> anyhow::Result<()> {
        let addr = self.listen_addr();
        let result = self.app.listen(addr).await;
        if let Some(tasks) = self.background {
            tasks.shutdown();
        }
        result
    }
}

/// Wire the routes over the given backends. No background tasks are started.
pub fn build_with(settings: PipelineSettings, parts: PipelineParts) -> CourseServer {
    let mut config = course_core::CourseConfig::new();
    config::apply_defaults(&mut config);
    assemble(settings, parts, config.snapshot())
}

fn assemble(settings: PipelineSettings, parts: PipelineParts, config: CourseConfigSnapshot) -> CourseServer {
    let state = PipelineState::new(settings, parts);

    let app = axum()
        .merge(routes::router(state.clone()))
        .service("/health", || async { "ok" })
        .with_http_layers();

    CourseServer {
        app,
        state,
        config,
        background: None,
    }
}

/// Configuration from the environment, backends from configuration,
/// background tasks started.
pub async fn build() -> anyhow::Result<CourseServer> {
    let config = config::load().snapshot();
    let settings = PipelineSettings::from_config(&config)?;
    let parts = PipelineParts::from_config(&config).await?;

    let mut server = assemble(settings, parts, config);
    server.background = Some(BackgroundTasks::start(&server.state));
    Ok(server)
}
