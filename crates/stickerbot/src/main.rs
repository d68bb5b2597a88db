use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use stickerbot_core::{
    config::Config,
    ports::{SpeechSynthesizer, VisionClient},
};
use stickerbot_openai::OpenAiVisionClient;
use stickerbot_telegram::router::{run_polling, Collaborators};
use stickerbot_tts::GttsCli;

mod keepalive;

fn build_collaborators(cfg: &Config) -> anyhow::Result<Collaborators> {
    let vision: Option<Arc<dyn VisionClient>> = match &cfg.openai_api_key {
        Some(key) => Some(Arc::new(OpenAiVisionClient::new(
            key.clone(),
            cfg.openai_base_url.clone(),
            cfg.vision_model.clone(),
            cfg.collaborator_timeout,
        )?)),
        None => {
            tracing::warn!("OPENAI_API_KEY not set; !ocr and !imgtr are disabled");
            None
        }
    };

    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(GttsCli::new(
        cfg.tts_cli_path.clone(),
        cfg.collaborator_timeout,
    ));

    Ok(Collaborators {
        vision,
        speech: Some(speech),
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stickerbot_core::logging::init("stickerbot")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(
        ffmpeg = %cfg.ffmpeg_path.display(),
        tts = %cfg.tts_cli_path.display(),
        temp_dir = %cfg.temp_dir.display(),
        "configuration loaded"
    );
    let collaborators = build_collaborators(&cfg)?;

    let shutdown = CancellationToken::new();
    let keepalive = match cfg.port {
        Some(port) => {
            let listener = TcpListener::bind(("0.0.0.0", port)).await?;
            Some(tokio::spawn(keepalive::serve(listener, shutdown.clone())))
        }
        None => None,
    };

    let result = run_polling(cfg, collaborators).await;

    shutdown.cancel();
    if let Some(handle) = keepalive {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "keep-alive server failed"),
            Err(e) => tracing::warn!(error = %e, "keep-alive task panicked"),
        }
    }

    result
}
