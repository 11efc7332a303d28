use argh::FromArgs;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use kornia_riffuse::{
    AudioFormat, InterpolationEngine, InterpolationEngineResult, InterpolationEngineState,
    InterpolationParams, InterpolatorConfig, ScheduleConfig, SeedImage, SeedSelection,
    output_file_name,
};
use serde_json::json;
use std::{path::PathBuf, sync::Arc};

mod messages;
mod tone;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Serves prompt-to-prompt audio interpolations.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// directory holding the built-in seed images
    #[argh(option, default = "PathBuf::from(kornia_riffuse::DEFAULT_SEED_IMAGE_DIR)")]
    seed_image_dir: PathBuf,

    /// output container format, wav or mp3
    #[argh(option, short = 'f', default = "AudioFormat::Wav")]
    format: AudioFormat,

    /// directory finished clips are written to
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,
}

struct ServerState {
    engine: InterpolationEngine,
    format: AudioFormat,
    output_dir: PathBuf,
}

fn bad_request(message: String) -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

async fn post_interpolation(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<messages::InterpolationRequest>,
) -> impl IntoResponse {
    if state.engine.state() != InterpolationEngineState::Idle {
        log::debug!("Engine is still processing");
        return bad_request("Engine is still processing".to_string());
    }

    let schedule = match ScheduleConfig::new(payload.steps, payload.alpha_power) {
        Ok(schedule) => schedule,
        Err(e) => return bad_request(e.to_string()),
    };

    let custom = match payload.custom_image_path.as_ref().map(SeedImage::from_path) {
        Some(Ok(image)) => Some(image),
        Some(Err(e)) => return bad_request(e.to_string()),
        None => None,
    };

    let params = InterpolationParams::new(payload.start, payload.end)
        .with_schedule(schedule)
        .with_inference_steps(payload.inference_steps)
        .with_seed_image(SeedSelection::from_name(&payload.seed_image, custom));

    // reject bad prompts now instead of at poll time
    if let Err(e) = params.validate() {
        return bad_request(e.to_string());
    }

    match state.engine.schedule_interpolation(params) {
        Some(id) => {
            log::info!("Scheduled interpolation {id}");
            (
                StatusCode::OK,
                Json(json!({ "status": "scheduled", "id": id })),
            )
        }
        None => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": "Engine is stopped" })),
        ),
    }
}

async fn get_result(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    match state.engine.try_poll_response() {
        InterpolationEngineResult::Success(run) => {
            let name = output_file_name(
                &run.metadata.start_prompt,
                &run.metadata.end_prompt,
                state.format.extension(),
            );
            let output_path = state.output_dir.join(name);
            if let Err(e) = run.output.audio.save(&output_path) {
                log::error!("Failed to write {}: {e}", output_path.display());
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "status": "error", "message": e.to_string() })),
                );
            }

            log::info!("Interpolation {} written to {}", run.id, output_path.display());
            let response = messages::InterpolationResponse {
                id: run.id,
                prompt_a: run.metadata.start_prompt,
                prompt_b: run.metadata.end_prompt,
                alphas: run.output.alphas(),
                duration: run.duration,
                audio_seconds: run.output.duration_seconds,
                output_path,
            };
            (
                StatusCode::OK,
                Json(json!({ "status": "success", "response": response })),
            )
        }
        InterpolationEngineResult::Failure(run) => {
            log::warn!("Interpolation {} failed: {}", run.id, run.output);
            (
                StatusCode::OK,
                Json(json!({
                    "status": "failed",
                    "id": run.id,
                    "message": run.output.to_string(),
                })),
            )
        }
        InterpolationEngineResult::Empty(engine_state) => (
            StatusCode::OK,
            Json(json!({ "status": engine_state.as_str() })),
        ),
        InterpolationEngineResult::Error(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": e })),
        ),
    }
}

async fn post_cancel(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    state.engine.cancel();
    Json(json!({ "status": state.engine.state().as_str() }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let config = InterpolatorConfig::default()
        .with_output_format(args.format)
        .with_seed_image_dir(&args.seed_image_dir);
    let state = Arc::new(ServerState {
        engine: InterpolationEngine::with_model(tone::ToneModel, config),
        format: args.format,
        output_dir: args.output_dir,
    });

    let app = Router::new()
        .route("/", get(|| async { "Welcome to the interpolation server!" }))
        .route("/interpolation", post(post_interpolation))
        .route("/results", get(get_result))
        .route("/cancel", post(post_cancel))
        .with_state(state);

    log::info!("Starting the server");
    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
