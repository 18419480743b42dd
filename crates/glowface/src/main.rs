use anyhow::Result;
use clap::{Parser, Subcommand};
use glowface_core::Delegate;
use glowface_hw::{Camera, V4lMediaDevices};
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod initializer;
mod page;
mod scheduler;
mod session;
mod video;

use config::Config;
use page::TerminalPage;
use scheduler::AnimationFrames;
use session::CaptureSession;

#[derive(Parser)]
#[command(name = "glowface", about = "Light up when you pucker or shrug")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webcam demo (Enter toggles the webcam, q quits)
    Run {
        /// V4L2 device path (overrides GLOWFACE_CAMERA_DEVICE)
        #[arg(short, long)]
        device: Option<String>,
        /// Model path or URL (overrides GLOWFACE_MODEL)
        #[arg(short, long)]
        model: Option<String>,
        /// Compute delegate: gpu or cpu (overrides GLOWFACE_DELEGATE)
        #[arg(long)]
        delegate: Option<Delegate>,
    },
    /// List video capture devices
    Devices {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            device,
            model,
            delegate,
        } => {
            let mut config = Config::from_env();
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(delegate) = delegate {
                config.delegate = delegate;
            }
            run(config).await?;
        }
        Commands::Devices { json } => {
            let devices = Camera::list_devices();
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else if devices.is_empty() {
                println!("No video capture devices found");
            } else {
                for d in &devices {
                    println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
                }
            }
        }
    }

    Ok(())
}

/// Single-task event loop: every state change happens in one of these branches.
async fn run(config: Config) -> Result<()> {
    tracing::info!(
        device = %config.camera_device,
        model = %config.model,
        delegate = %config.delegate,
        frame_rate = config.frame_rate,
        "glowface starting"
    );

    let mut media = V4lMediaDevices::new(config.camera_device.clone());
    let mut frames = AnimationFrames::new(config.frame_rate);
    let mut session = CaptureSession::new(TerminalPage::new(std::io::stdout()));
    let mut input = BufReader::new(tokio::io::stdin()).lines();

    let init = initializer::create_face_landmarker(&config);
    tokio::pin!(init);
    let mut initializing = true;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!("press Enter to toggle the webcam, q to quit");

    loop {
        tokio::select! {
            result = &mut init, if initializing => {
                initializing = false;
                match result {
                    Ok(landmarker) => session.detector_ready(landmarker),
                    Err(e) => tracing::error!(
                        error = %e,
                        hint = %initializer::model_hint(&config),
                        "face landmarker failed to initialize; webcam control stays disabled"
                    ),
                }
            }
            line = input.next_line() => match line? {
                Some(line) if line.trim().eq_ignore_ascii_case("q") => break,
                Some(_) => session.toggle(&mut media, &mut frames).await,
                None => break,
            },
            _ = frames.next_frame(), if frames.is_pending() => {
                session.on_animation_frame(&mut frames);
            }
            _ = &mut ctrl_c => break,
        }
    }

    session.shutdown();
    println!();
    tracing::info!("glowface shutting down");
    Ok(())
}
