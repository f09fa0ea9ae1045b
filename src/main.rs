use config::Config;
use dotenv::dotenv;
use log::{error, info};
use process::FfmpegLauncher;
use server_inner::ServerInner;
use supervisor::Supervisor;
use tonic::transport::Server;

pub mod service {
    tonic::include_proto!("streamer");
}

mod command;
mod config;
mod error;
mod process;
mod readiness;
mod server_inner;
mod session;
mod supervisor;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    let supervisor = Supervisor::new(
        FfmpegLauncher::new(config.ffmpeg_path.clone()),
        config.supervisor(),
    );
    let server = ServerInner::new(supervisor.clone());

    info!(
        "listening on {} (ffmpeg: {})",
        config.listen_addr,
        config.ffmpeg_path.display()
    );
    Server::builder()
        .add_service(service::streamer_server::StreamerServer::new(server))
        .serve_with_shutdown(config.listen_addr, shutdown_signal())
        .await?;

    // ffmpeg must not outlive the service.
    if let Err(e) = supervisor.stop().await {
        error!("failed to stop active stream on shutdown: {}", e);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
