use anyhow::{Context, Result};
use artgate_core::{Enroller, FeatureExtractor, ImageSize, ReferenceRecord, EXTRACTOR_INPUT_SIZE};
use artgate_hw::Camera;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "artgate", about = "Art-print verification gate CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a reference art print from an image file
    Enroll {
        /// Path to the art print image (JPEG/PNG)
        image: PathBuf,
        /// Free-form note stored with the reference
        #[arg(short, long)]
        note: Option<String>,
        /// Where to write the reference record (default: data dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory containing the ONNX embedding model
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Trigger one verification scan via the daemon
    Scan,
    /// Show daemon status
    Status,
    /// Inspect the enrolled reference record
    Show {
        /// Path to the reference record (default: data dir)
        #[arg(short, long)]
        reference: Option<PathBuf>,
    },
    /// Run camera diagnostics
    Test {
        /// V4L2 device to test (default: probe all)
        #[arg(short, long)]
        device: Option<String>,
    },
}

// Generated proxy for the daemon interface.
#[zbus::proxy(
    interface = "org.artgate.Gate1",
    default_service = "org.artgate.Gate1",
    default_path = "/org/artgate/Gate1"
)]
trait Gate {
    async fn scan(&self) -> zbus::Result<(bool, f64, String)>;
    async fn status(&self) -> zbus::Result<String>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Enroll {
            image,
            note,
            output,
            model_dir,
        } => enroll(image, note, output, model_dir),
        Commands::Scan => scan().await,
        Commands::Status => status().await,
        Commands::Show { reference } => show(reference),
        Commands::Test { device } => test(device),
    }
}

/// Enrollment workflow: LoadModel, AcquireImage, ExtractVector, Persist.
/// Failures print a message and exit; the human re-runs to retry.
fn enroll(
    image_path: PathBuf,
    note: Option<String>,
    output: Option<PathBuf>,
    model_dir: Option<PathBuf>,
) -> Result<()> {
    let model_dir = model_dir.unwrap_or_else(artgate_core::default_model_dir);
    let model_path = FeatureExtractor::model_file(&model_dir);

    // LoadModel — fatal if missing, nothing works without the extractor.
    let mut enroller = Enroller::new(&model_path)?;

    // AcquireImage — non-image input is reported, the user retries.
    let decoded = image::open(&image_path)
        .with_context(|| format!("{} is not a readable image file", image_path.display()))?;
    let size = ImageSize {
        width: decoded.width(),
        height: decoded.height(),
    };
    let rgb = decoded
        .resize_exact(
            EXTRACTOR_INPUT_SIZE as u32,
            EXTRACTOR_INPUT_SIZE as u32,
            image::imageops::FilterType::Triangle,
        )
        .to_rgb8();

    // ExtractVector + Persist — overwrites any prior record.
    let out_path = output.unwrap_or_else(artgate_core::default_reference_path);
    let record = enroller.enroll_to(&out_path, rgb.as_raw(), note, Some(size))?;

    println!(
        "Reference written to {} ({} features, source {}x{})",
        out_path.display(),
        record.dims(),
        size.width,
        size.height
    );
    Ok(())
}

async fn scan() -> Result<()> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus — is artgated running?")?;
    let proxy = GateProxy::new(&conn).await?;

    let (accepted, similarity, message) = proxy.scan().await?;
    println!("{message}");
    if accepted {
        println!("similarity: {:.3}", similarity);
    } else {
        std::process::exit(1);
    }
    Ok(())
}

async fn status() -> Result<()> {
    let conn = zbus::Connection::session()
        .await
        .context("failed to connect to the session bus — is artgated running?")?;
    let proxy = GateProxy::new(&conn).await?;

    let raw = proxy.status().await?;
    // Re-render the daemon's JSON for readability.
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(v) => println!("{}", serde_json::to_string_pretty(&v)?),
        Err(_) => println!("{raw}"),
    }
    Ok(())
}

fn show(reference: Option<PathBuf>) -> Result<()> {
    let path = reference.unwrap_or_else(artgate_core::default_reference_path);
    let record = ReferenceRecord::load(&path)?;

    println!("reference: {}", path.display());
    println!("features:  {}", record.dims());
    println!("generated: {}", record.generated);
    if let Some(note) = &record.note {
        println!("note:      {note}");
    }
    if let Some(size) = &record.image_size {
        println!("source:    {}x{}", size.width, size.height);
    }
    Ok(())
}

fn test(device: Option<String>) -> Result<()> {
    let devices = match &device {
        Some(path) => vec![path.clone()],
        None => {
            let found = Camera::list_devices();
            if found.is_empty() {
                println!("No V4L2 capture devices found");
                return Ok(());
            }
            for info in &found {
                println!("{}: {} ({})", info.path, info.name, info.driver);
            }
            found.into_iter().map(|d| d.path).collect()
        }
    };

    for path in devices {
        match Camera::open(&path) {
            Ok(camera) => match camera.capture_frame() {
                Ok(frame) => println!(
                    "{path}: {}x{} frame captured, brightness {:.1}",
                    frame.width,
                    frame.height,
                    frame.avg_brightness()
                ),
                Err(e) => println!("{path}: capture failed: {e}"),
            },
            Err(e) => println!("{path}: {e}"),
        }
    }
    Ok(())
}
