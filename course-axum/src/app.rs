use axum::handler::Handler;
use axum::routing::{get, MethodRouter};
use axum::Router;
use tokio::net::{TcpListener, ToSocketAddrs};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Router builder shared by the pipeline's HTTP surface.
///
/// Routes are collected first; [`AxumApp::with_http_layers`] wraps whatever
/// is registered at that point, so call it after the last route.
#[derive(Clone, Default)]
pub struct AxumApp {
    pub router: Router<()>,
}

impl AxumApp {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    pub fn use_router(mut self, path: &str, router: Router<()>) -> Self {
        self.router = self.router.nest(path, router);
        self
    }

    /// Mount routes that carry their own absolute paths.
    pub fn merge(mut self, router: Router<()>) -> Self {
        self.router = self.router.merge(router);
        self
    }

    pub fn r#use(self, path: &str, router: Router<()>) -> Self {
        self.use_router(path, router)
    }

    pub fn route(mut self, path: &str, method_router: MethodRouter<()>) -> Self {
        self.router = self.router.route(path, method_router);
        self
    }

    pub fn use_get<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        self.route(path, get(handler))
    }

    pub fn service<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()> + Clone + Send + Sync + 'static,
        T: 'static,
    {
        self.use_get(path, handler)
    }

    /// Request tracing plus `x-request-id`: an incoming id is kept, a
    /// missing one is generated, and either way it is echoed on the response.
    pub fn with_http_layers(mut self) -> Self {
        self.router = self.router.layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        );
        self
    }

    pub async fn listen<A>(self, addr: A) -> anyhow::Result<()>
    where
        A: ToSocketAddrs,
    {
        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}

pub fn axum() -> AxumApp {
    AxumApp::new()
}
