use clap::Parser;
use glam::Vec3;
use lagcomp::{LagCompensationSettings, ShapeKind};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use server::game::WORLD_HALF_EXTENT;
use server::host::{ClaimKind, HitClaim, Host, HostMessage};
use std::path::PathBuf;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Duration};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// JSON file with lag compensation settings
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// Seconds between pose captures
    #[clap(long)]
    capture_interval: Option<f64>,
    /// Seconds of history kept per target
    #[clap(long)]
    history_window: Option<f64>,
    /// Hard cap on pose captures kept per target
    #[clap(long)]
    capture_limit: Option<usize>,
    /// Buckets kept by each target's coarse bounds history
    #[clap(long)]
    bounds_limit: Option<usize>,
    /// Bounds samples folded into each bucket
    #[clap(long)]
    bounds_per_bucket: Option<usize>,
    /// Distance slack for point claims
    #[clap(long)]
    tolerance: Option<f32>,
    /// Fractional proxy inflation for ray claims
    #[clap(long)]
    tolerance_percent: Option<f32>,
    /// Number of moving targets to spawn
    #[clap(long, default_value = "4")]
    targets: u32,
    /// Number of simulated viewers firing at the targets
    #[clap(long, default_value = "2")]
    viewers: u32,
    /// Maximum number of concurrent viewers
    #[clap(long, default_value = "16")]
    max_viewers: usize,
    /// Seconds viewers render behind the newest state
    #[clap(long, default_value = "0.1")]
    interp_delay: f64,
    /// Stop after this many seconds
    #[clap(long)]
    duration: Option<u64>,
}

/// Builds settings from the optional config file, then applies CLI overrides.
fn load_settings(args: &Args) -> Result<LagCompensationSettings, Box<dyn std::error::Error>> {
    let mut settings = match &args.config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => LagCompensationSettings::default(),
    };

    if let Some(capture_interval) = args.capture_interval {
        settings.capture_interval = capture_interval;
    }
    if let Some(history_window) = args.history_window {
        settings.history_window = history_window;
    }
    if let Some(capture_limit) = args.capture_limit {
        settings.capture_limit = capture_limit;
    }
    if let Some(bounds_limit) = args.bounds_limit {
        settings.bounds_limit = bounds_limit;
    }
    if let Some(bounds_per_bucket) = args.bounds_per_bucket {
        settings.bounds_per_bucket = bounds_per_bucket;
    }
    if let Some(tolerance) = args.tolerance {
        settings.tolerance = tolerance;
    }
    if let Some(tolerance_percent) = args.tolerance_percent {
        settings.tolerance_percent = tolerance_percent;
    }

    settings.validate()?;
    Ok(settings)
}

/// Main-method of the application.
/// Parses command-line arguments, populates the world, then runs the host next to simulated viewers.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    if args.tick_rate == 0 {
        return Err("tick rate must be at least 1".into());
    }
    let settings = load_settings(&args)?;

    let tick_duration = Duration::from_secs_f64(1.0 / args.tick_rate as f64);
    let mut host = Host::new(settings, tick_duration, args.max_viewers, args.interp_delay)?;

    let mut rng = StdRng::from_entropy();
    let spawn_extent = WORLD_HALF_EXTENT * 0.5;
    for i in 0..args.targets {
        let shape_kind = if i % 2 == 0 {
            ShapeKind::Box
        } else {
            ShapeKind::Sphere
        };
        let position = Vec3::new(
            rng.gen_range(-spawn_extent..spawn_extent),
            0.0,
            rng.gen_range(-spawn_extent..spawn_extent),
        );
        let velocity = Vec3::new(rng.gen_range(-8.0..8.0), 0.0, rng.gen_range(-8.0..8.0));
        let size = match shape_kind {
            ShapeKind::Sphere => Vec3::splat(0.75),
            _ => Vec3::new(1.0, 2.0, 1.0),
        };
        host.spawn_target(shape_kind, position, size, velocity, rng.gen_range(-1.0..1.0));
    }
    host.add_obstacle(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 3.0, 0.5));
    host.add_obstacle(Vec3::new(-15.0, 0.0, 10.0), Vec3::new(0.5, 3.0, 6.0));

    let sender = host.sender();
    let host_handle = tokio::spawn(async move {
        if let Err(e) = host.run().await {
            error!("Host stopped with error: {}", e);
        }
    });

    for _ in 0..args.viewers {
        let sender = sender.clone();
        let rtt = rng.gen_range(0.03..0.2);
        let seed = rng.gen();
        let interp_delay = args.interp_delay;
        tokio::spawn(async move {
            run_viewer(sender, StdRng::seed_from_u64(seed), rtt, interp_delay).await;
        });
    }

    let stop_after = args.duration.map(Duration::from_secs);

    // Handle shutdown gracefully
    tokio::select! {
        result = host_handle => {
            if let Err(e) = result {
                error!("Host task panicked: {}", e);
            }
            return Ok(());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
        _ = sleep(stop_after.unwrap_or(Duration::MAX)), if stop_after.is_some() => {
            info!("Run duration elapsed, shutting down");
        }
    }

    let _ = sender.send(HostMessage::Shutdown);
    Ok(())
}

/// Simulated remote viewer.
///
/// Looks at a snapshot, waits as long as the real delay between seeing a
/// target and the shot reaching the host would be, then claims a hit on
/// where the target appeared.
async fn run_viewer(
    sender: mpsc::UnboundedSender<HostMessage>,
    mut rng: StdRng,
    rtt: f64,
    interp_delay: f64,
) {
    let (reply, joined) = oneshot::channel();
    if sender.send(HostMessage::Join { reply }).is_err() {
        return;
    }
    let Ok(Some(viewer_id)) = joined.await else {
        warn!("Simulated viewer could not join");
        return;
    };

    let (mut confirmed, mut total) = (0u32, 0u32);
    loop {
        let jitter = rng.gen_range(-0.005..0.005);
        if sender
            .send(HostMessage::Latency {
                viewer_id,
                rtt: (rtt + jitter).max(0.0),
            })
            .is_err()
        {
            break;
        }

        let (reply, snapshot) = oneshot::channel();
        if sender.send(HostMessage::Snapshot { reply }).is_err() {
            break;
        }
        let Ok(positions) = snapshot.await else {
            break;
        };
        if positions.is_empty() {
            sleep(Duration::from_millis(250)).await;
            continue;
        }
        let (target_id, seen_at) = positions[rng.gen_range(0..positions.len())];

        sleep(Duration::from_secs_f64(rtt / 2.0 + interp_delay)).await;

        let angle = rng.gen_range(0.0..std::f32::consts::TAU);
        let origin = seen_at + Vec3::new(angle.cos(), 0.2, angle.sin()) * 20.0;
        let claim = HitClaim {
            viewer_id,
            target_id,
            kind: ClaimKind::Ray {
                origin,
                target: seen_at,
            },
        };

        let (reply, verdict) = oneshot::channel();
        if sender.send(HostMessage::Claim { claim, reply }).is_err() {
            break;
        }
        let Ok(verdict) = verdict.await else {
            break;
        };

        total += 1;
        if verdict.is_confirmed() {
            confirmed += 1;
        }
        if total % 10 == 0 {
            info!(
                "Viewer {} ({:.0}ms rtt): {}/{} claims confirmed",
                viewer_id,
                rtt * 1000.0,
                confirmed,
                total
            );
        }

        sleep(Duration::from_millis(rng.gen_range(100..400))).await;
    }
}
