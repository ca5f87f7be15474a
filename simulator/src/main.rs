mod telemetry;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use reqwest::multipart;
use std::path::PathBuf;
use std::time::Duration;
use telemetry::Reading;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// GET with query parameters, the way the hub relays spoke readings
    Telemetry,
    /// POST with a JSON body
    Json,
    /// POST a multipart `image` field, the way the camera does
    Image,
}

#[derive(Debug, Parser)]
#[command(about = "Field device simulator for the ingest gateway")]
struct Args {
    /// Ingest endpoint URL
    #[arg(long, env = "INGEST_URL", default_value = "http://localhost:8080/")]
    url: String,

    /// Shared secret sent as `token` (query) or `X-Api-Key` (images)
    #[arg(long, env = "INGEST_API_KEY")]
    token: String,

    #[arg(long, value_enum, default_value_t = Mode::Telemetry)]
    mode: Mode,

    /// Number of simulated spokes
    #[arg(long, env = "DEVICES", default_value_t = 4)]
    devices: usize,

    /// Milliseconds between requests
    #[arg(long, env = "INTERVAL_MS", default_value_t = 5000)]
    interval_ms: u64,

    /// Stop after this many requests (0 runs forever)
    #[arg(long, default_value_t = 0)]
    count: u64,

    /// JPEG to upload in image mode
    #[arg(long, required_if_eq("mode", "image"))]
    image: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt::init();

    info!("Starting field device simulator");
    info!(
        "Target: {}, Mode: {:?}, Devices: {}, Interval: {}ms",
        args.url, args.mode, args.devices, args.interval_ms
    );

    let frame = match (&args.mode, &args.image) {
        (Mode::Image, Some(path)) => Some(
            tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read image {}", path.display()))?,
        ),
        _ => None,
    };

    let client = reqwest::Client::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut counter = 0u64;

    loop {
        ticker.tick().await;

        let result = match &frame {
            Some(bytes) => send_image(&client, &args, bytes.clone()).await,
            None => {
                let reading = {
                    let mut rng = rand::thread_rng();
                    let device_id = format!("spoke_{}", counter % args.devices.max(1) as u64);
                    Reading::random(&mut rng, device_id)
                };
                send_reading(&client, &args, &reading).await
            }
        };

        match result {
            Ok((status, body)) if status.is_success() => info!("{} {}", status, body),
            Ok((status, body)) => warn!("Rejected with {}: {}", status, body),
            Err(e) => error!("Request failed: {}", e),
        }

        counter += 1;
        if args.count > 0 && counter >= args.count {
            info!("Sent {} requests, stopping", counter);
            return Ok(());
        }
    }
}

async fn send_reading(
    client: &reqwest::Client,
    args: &Args,
    reading: &Reading,
) -> reqwest::Result<(reqwest::StatusCode, String)> {
    let request = match args.mode {
        Mode::Json => client
            .post(&args.url)
            .query(&[("token", &args.token)])
            .json(reading),
        _ => client
            .get(&args.url)
            .query(&[("token", &args.token)])
            .query(&reading.query_pairs()),
    };

    let response = request.send().await?;
    let status = response.status();
    Ok((status, response.text().await?))
}

async fn send_image(
    client: &reqwest::Client,
    args: &Args,
    bytes: Vec<u8>,
) -> reqwest::Result<(reqwest::StatusCode, String)> {
    let part = multipart::Part::bytes(bytes)
        .file_name("pic.jpg")
        .mime_str("image/jpeg")?;
    let form = multipart::Form::new().part("image", part);

    let response = client
        .post(&args.url)
        .header("X-Api-Key", &args.token)
        .multipart(form)
        .send()
        .await?;
    let status = response.status();
    Ok((status, response.text().await?))
}
