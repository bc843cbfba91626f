use anyhow::Context;
use ph_predictor::{
    api::{self, AppState},
    config::Settings,
    model::{self, Predictor},
    types::{FeatureVector, FEATURE_ORDER},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let settings = Settings::from_env().context("invalid configuration")?;
    tracing::info!("config: {:?}", settings);

    // No model, no service
    let mdl = model::load_regressor(&settings.model_path, settings.meta_path.as_deref())
        .with_context(|| format!("failed to load model from {}", settings.model_path.display()))?;
    let predictor = Predictor::new(mdl);
    tracing::info!(
        "loaded {} model from {}; feat_list[{}]: {:?}",
        predictor.name(),
        settings.model_path.display(),
        FEATURE_ORDER.len(),
        FEATURE_ORDER
    );

    // Warmup so a broken artifact fails here rather than on the first request
    predictor
        .predict_features(&FeatureVector([0.0; 7]))
        .context("warmup forward failed")?;
    tracing::info!("warmup forward ok");

    let state = AppState {
        predictor,
        log_predictions: settings.log_predictions,
    };
    let app = api::router(state);

    let addr = settings.bind_addr()?;
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app).await?;
    Ok(())
}
