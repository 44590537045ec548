//! Manual live check against a running AquaStream gateway.
//!
//! Opens several concurrent live subscriptions, submits a steady stream
//! of readings through the REST write path, and prints a per-minute
//! delivery summary for each subscriber. Run the gateway first, then:
//!
//! ```text
//! cargo run -p project_tests --bin test_gateway_live -- --subscribers 4
//! ```

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use clap::Parser;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use lib_telemetry::client::{ApiClient, LiveSubscriber, SubscriberConfig, SubscriberEvent};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Gateway base URL for REST calls
    #[clap(long, default_value = "http://127.0.0.1:5000")]
    api_url: String,

    /// Gateway WebSocket URL
    #[clap(long, default_value = "ws://127.0.0.1:5000/ws")]
    ws_url: String,

    /// Number of concurrent live subscriptions to hold open
    #[clap(short, long, default_value_t = 4)]
    subscribers: usize,

    /// Seconds between submitted readings
    #[clap(long, default_value_t = 1.0)]
    submit_interval_secs: f64,

    /// Report interval in minutes
    #[clap(short, long, default_value_t = 1)]
    report_interval_minutes: u64,
}

struct Stats {
    update_timestamps: HashMap<String, VecDeque<DateTime<Utc>>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let stats = Arc::new(Mutex::new(Stats {
        update_timestamps: HashMap::new(),
    }));

    // Reporter task: prints per-subscriber delivery rates once a minute.
    let stats_reporter = Arc::clone(&stats);
    let report_interval_seconds = args.report_interval_minutes * 60;
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(report_interval_seconds)).await;
            let now = Utc::now();
            let one_minute_ago = now - ChronoDuration::minutes(1);

            let mut data = stats_reporter.lock().unwrap();
            let mut rates: Vec<(String, usize)> = Vec::new();
            for (subscriber, dq) in data.update_timestamps.iter_mut() {
                while dq.front().map_or(false, |&t| t < one_minute_ago) {
                    dq.pop_front();
                }
                rates.push((subscriber.clone(), dq.len()));
            }
            rates.sort_by(|a, b| a.0.cmp(&b.0));

            println!("\n----- 1-Minute Summary -----");
            for (subscriber, rate) in &rates {
                println!("{}: {} updates/min", subscriber, rate);
            }
            if rates.is_empty() {
                println!("No subscribers reported yet");
            }
            println!("----------------------------\n");
        }
    });

    // Open the live subscriptions.
    for i in 0..args.subscribers {
        let name = format!("sub-{}", i + 1);
        let (subscriber, mut events) = LiveSubscriber::new(SubscriberConfig {
            ws_url: args.ws_url.clone(),
            ..SubscriberConfig::default()
        });
        subscriber.connect().await?;
        println!("{} connected", name);

        let stats_task = Arc::clone(&stats);
        tokio::spawn(async move {
            // Keep the handle alive for the life of the event loop so the
            // machine is not torn down early.
            let _subscriber = subscriber;
            while let Some(event) = events.recv().await {
                match event {
                    SubscriberEvent::Update(reading) => {
                        let mut data = stats_task.lock().unwrap();
                        data.update_timestamps
                            .entry(name.clone())
                            .or_default()
                            .push_back(Utc::now());
                        drop(data);
                        println!(
                            "{} <- ph {} | turbidity {} NTU ({})",
                            name, reading.ph, reading.turbidity, reading.device_id
                        );
                    }
                    SubscriberEvent::Disconnected => println!("{} disconnected", name),
                    SubscriberEvent::Connected => println!("{} reconnected", name),
                    SubscriberEvent::Error(e) => {
                        println!("{} gave up: {}", name, e);
                        break;
                    }
                }
            }
        });
    }

    // Submit a slow pH ramp forever; the gateway's trend projection should
    // track it closely.
    let client = ApiClient::new(&args.api_url)?;
    let mut ph = 6.8_f64;
    println!("Submitting readings. Press Ctrl+C to stop.");
    loop {
        ph += 0.01;
        if ph > 7.8 {
            ph = 6.8;
        }
        match client.submit(ph, 300.0).await {
            Ok(accepted) => println!(
                "-> accepted ph {} (next ~{})",
                accepted.reading.ph, accepted.predicted_next_ph
            ),
            Err(e) => println!("-> submission failed: {e:#}"),
        }
        sleep(Duration::from_secs_f64(args.submit_interval_secs)).await;
    }
}
