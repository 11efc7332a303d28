use argh::FromArgs;
use kornia_riffuse::{
    AudioFormat, Device, InterpolationParams, Interpolator, InterpolatorConfig, PromptEndpoint,
    ScheduleConfig, SeedImage, SeedSelection, format_alphas, output_file_name,
};
use std::path::PathBuf;

mod tone;

#[derive(FromArgs)]
/// Interpolate between two prompts and write the joined clip to disk.
struct InterpolateArgs {
    /// the starting prompt
    #[argh(option, short = 'a')]
    prompt_a: String,

    /// the ending prompt
    #[argh(option, short = 'b')]
    prompt_b: String,

    /// number of model generations between the two prompts
    #[argh(option, short = 'n', default = "kornia_riffuse::DEFAULT_STEP_COUNT")]
    steps: usize,

    /// power applied to the interpolation curve
    #[argh(option, default = "kornia_riffuse::DEFAULT_CURVE_EXPONENT")]
    alpha_power: f64,

    /// number of denoising steps per model run
    #[argh(option, default = "kornia_riffuse::DEFAULT_INFERENCE_STEPS")]
    inference_steps: u32,

    /// seed for both prompts
    #[argh(option, default = "kornia_riffuse::DEFAULT_SEED")]
    seed: u64,

    /// denoising strength for both prompts
    #[argh(option, default = "kornia_riffuse::DEFAULT_DENOISING")]
    denoising: f32,

    /// seed image: og_beat, agile, marim, motorway, vibes or custom
    #[argh(option, short = 's', default = "String::from(\"og_beat\")")]
    seed_image: String,

    /// path of the image used when the seed image is custom
    #[argh(option)]
    custom_image: Option<PathBuf>,

    /// directory holding the built-in seed images
    #[argh(option, default = "PathBuf::from(kornia_riffuse::DEFAULT_SEED_IMAGE_DIR)")]
    seed_image_dir: PathBuf,

    /// output container format, wav or mp3
    #[argh(option, short = 'f', default = "AudioFormat::Wav")]
    format: AudioFormat,

    /// device name passed to the model
    #[argh(option, default = "Device::Cpu")]
    device: Device,

    /// directory to write the clip into
    #[argh(option, short = 'o', default = "PathBuf::from(\".\")")]
    output_dir: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: InterpolateArgs = argh::from_env();

    let schedule = ScheduleConfig::new(args.steps, args.alpha_power)?;
    log::info!("Alphas: {}", format_alphas(&schedule.alphas()?));

    let custom = args.custom_image.as_ref().map(SeedImage::from_path).transpose()?;
    let endpoint = |text: &str| {
        PromptEndpoint::new(text)
            .with_seed(args.seed)
            .with_denoising(args.denoising)
    };
    let params = InterpolationParams::new(endpoint(&args.prompt_a), endpoint(&args.prompt_b))
        .with_schedule(schedule)
        .with_inference_steps(args.inference_steps)
        .with_seed_image(SeedSelection::from_name(&args.seed_image, custom));

    let config = InterpolatorConfig::default()
        .with_device(args.device)
        .with_output_format(args.format)
        .with_seed_image_dir(&args.seed_image_dir);

    let mut interpolator = Interpolator::new(tone::ToneModel, config);
    let output = interpolator.run(&params)?;

    for step in &output.steps {
        log::info!(
            "({} / {}) alpha={:.2} {:.3}s",
            step.index + 1,
            output.steps.len(),
            step.request.alpha,
            step.duration_seconds
        );
    }

    let name = output_file_name(&args.prompt_a, &args.prompt_b, args.format.extension());
    let path = args.output_dir.join(name);
    output.audio.save(&path)?;

    println!(
        "Duration: {:.3} seconds, written to {}",
        output.duration_seconds,
        path.display()
    );

    Ok(())
}
