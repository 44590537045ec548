//! Synthetic probe for exercising a running gateway: submits a drifting
//! pH/turbidity random walk through the REST write path, exactly as an
//! ESP32-class device would.

use clap::Parser;
use rand::Rng;
use std::time::Duration;

use lib_telemetry::RawReading;
use lib_telemetry::client::ApiClient;

#[derive(Parser, Debug)]
#[clap(about = "Synthetic water-quality probe for the AquaStream gateway", version)]
struct Args {
    /// Gateway base URL
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    server_url: String,

    /// Seconds between submissions
    #[clap(long, default_value_t = 2.0)]
    interval_secs: f64,

    /// Device label reported with each reading
    #[clap(long, default_value = "sim-probe-1")]
    device_id: String,

    /// Number of readings to send (0 = run until interrupted)
    #[clap(long, default_value_t = 0)]
    count: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let client = ApiClient::new(&args.server_url)?;

    let mut rng = rand::rng();
    let mut ph = 7.0_f64;
    let mut turbidity = 250.0_f64;
    let mut sent = 0_u64;

    println!(
        "Submitting to {} every {}s as '{}'. Press Ctrl+C to stop.",
        args.server_url, args.interval_secs, args.device_id
    );

    loop {
        // Drift inside plausible bounds so the trend stays interesting.
        ph = (ph + rng.random_range(-0.08..0.08)).clamp(6.0, 8.5);
        turbidity = (turbidity + rng.random_range(-15.0..15.0)).clamp(0.0, 1200.0);

        let raw = RawReading {
            ph,
            turbidity,
            timestamp: None,
            device_id: Some(args.device_id.clone()),
        };

        match client.submit_raw(raw).await {
            Ok(accepted) => println!(
                "Accepted {}: ph {} | turbidity {} NTU | next ph ~{}",
                accepted.reading.id,
                accepted.reading.ph,
                accepted.reading.turbidity,
                accepted.predicted_next_ph
            ),
            Err(e) => eprintln!("Submission failed: {e:#}"),
        }

        sent += 1;
        if args.count > 0 && sent >= args.count {
            break;
        }
        tokio::time::sleep(Duration::from_secs_f64(args.interval_secs)).await;
    }

    Ok(())
}
