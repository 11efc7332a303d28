use argh::FromArgs;
use kornia_riffuse::PromptEndpoint;
use std::path::PathBuf;

mod messages;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Client for the interpolation server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "interpolate", "results" or "cancel"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Interpolate(InterpolateCommand),
    Results(ResultsCommand),
    Cancel(CancelCommand),
}

#[derive(FromArgs)]
/// Schedule an interpolation between two prompts
#[argh(subcommand, name = "interpolate")]
struct InterpolateCommand {
    /// the starting prompt
    #[argh(option, short = 'a')]
    prompt_a: String,

    /// the ending prompt
    #[argh(option, short = 'b')]
    prompt_b: String,

    /// number of interpolation steps
    #[argh(option, short = 'n', default = "kornia_riffuse::DEFAULT_STEP_COUNT")]
    steps: usize,

    /// power applied to the interpolation curve
    #[argh(option, default = "kornia_riffuse::DEFAULT_CURVE_EXPONENT")]
    alpha_power: f64,

    /// number of denoising steps per model run
    #[argh(option, default = "kornia_riffuse::DEFAULT_INFERENCE_STEPS")]
    inference_steps: u32,

    /// seed image name
    #[argh(option, short = 's', default = "String::from(\"og_beat\")")]
    seed_image: String,

    /// path of a custom seed image, read by the server
    #[argh(option)]
    custom_image_path: Option<PathBuf>,
}

#[derive(FromArgs)]
/// Check interpolation results
#[argh(subcommand, name = "results")]
struct ResultsCommand {}

#[derive(FromArgs)]
/// Cancel the interpolation in flight
#[argh(subcommand, name = "cancel")]
struct CancelCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let response = match args.command {
        ClientCommands::Interpolate(command) => {
            client
                .post(format!("http://{}/interpolation", addr))
                .json(&messages::InterpolationRequest {
                    start: PromptEndpoint::new(command.prompt_a),
                    end: PromptEndpoint::new(command.prompt_b),
                    steps: command.steps,
                    alpha_power: command.alpha_power,
                    inference_steps: command.inference_steps,
                    seed_image: command.seed_image,
                    custom_image_path: command.custom_image_path,
                })
                .send()
                .await?
        }
        ClientCommands::Results(_) => {
            client
                .get(format!("http://{}/results", addr))
                .send()
                .await?
        }
        ClientCommands::Cancel(_) => {
            client
                .post(format!("http://{}/cancel", addr))
                .send()
                .await?
        }
    };

    let result = response.json::<serde_json::Value>().await?;
    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
