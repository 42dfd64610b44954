use pdf_summarizer::{api, config, documents::UploadStore, logging, processing::SummaryPipeline};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    config::init_config();
    logging::init_tracing();
    let config = config::get_config();

    let store = UploadStore::open(&config.upload_dir)
        .await
        .expect("Failed to prepare upload directory");
    let pipeline =
        SummaryPipeline::from_config(config).expect("Failed to build summarization pipeline");
    let app = api::create_router(
        Arc::new(pipeline),
        Arc::new(store),
        config.max_upload_bytes,
    );

    let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, config.server_port))
        .await
        .expect("Failed to bind listener");
    tracing::info!("Listening on http://0.0.0.0:{}", config.server_port);
    axum::serve(listener, app).await.expect("Server error");
}
