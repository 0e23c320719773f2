use anyhow::Result;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let server = course_server::build().await?;
    let addr = server.listen_addr();

    println!("[course-server] listening on http://{addr}");

    server.listen().await?;

    Ok(())
}
