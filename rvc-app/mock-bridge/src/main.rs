use std::convert::Infallible;

use clap::Parser;
use critical_section as _;
use embassy_executor::{Executor, Spawner};
use embassy_net::{Config, Ipv4Address, Ipv4Cidr, Runner, StackResources};
use embassy_net_tuntap::TunTapDevice;
use heapless::Vec;
use rand_core::{OsRng, TryRngCore};
use rvc_core::mk_static;
use rvc_core::utils::controllers::drive::{
    self, CommandPublisher, DriveLink, DRIVE_CHANNEL, TOPIC_STATUS,
};
use rvc_core::utils::wss;
use static_cell::StaticCell;
use tracing::{error, info};

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts {
    /// TAP device name
    #[clap(long, default_value = "tap0")]
    tap: String,
    /// use a static IP instead of DHCP
    #[clap(long)]
    static_ip: bool,
    /// operator-facing server port
    #[clap(long, default_value_t = 8000)]
    port: u16,
    /// seconds between mock vehicle status heartbeats (0 disables them)
    #[clap(long, default_value_t = 5)]
    status_interval: u64,
}

/// Command-path driver that logs published payloads instead of handing them
/// to a broker client.
struct LogPublisher;

impl CommandPublisher for LogPublisher {
    type Error = Infallible;

    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), Self::Error> {
        info!("publish [{topic}]: {payload}");
        Ok(())
    }
}

#[embassy_executor::task]
async fn net_task(mut runner: Runner<'static, TunTapDevice>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn drive_task(mut link: DriveLink<LogPublisher>) -> ! {
    loop {
        let envelope = DRIVE_CHANNEL.receive().await;
        if let Err(e) = link.dispatch(envelope) {
            error!("command dispatch failed: {:?}", e);
        }
    }
}

#[embassy_executor::task]
async fn status_task(interval: u64) -> ! {
    // Stands in for the broker subscription carrying vehicle telemetry.
    loop {
        embassy_time::Timer::after_secs(interval).await;
        let message = serde_json::json!({
            "state": "ok",
            "uptime_ms": embassy_time::Instant::now().as_millis(),
        })
        .to_string();
        drive::ingest_status(TOPIC_STATUS, &message);
    }
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let opts: Opts = Opts::parse();

    spawner.spawn(drive_task(DriveLink::new(LogPublisher))).unwrap();
    if opts.status_interval > 0 {
        spawner.spawn(status_task(opts.status_interval)).unwrap();
    }

    // Network setup over TUN/TAP
    let device = TunTapDevice::new(&opts.tap).unwrap();
    let config = if opts.static_ip {
        Config::ipv4_static(embassy_net::StaticConfigV4 {
            address: Ipv4Cidr::new(Ipv4Address::new(192, 168, 69, 2), 24),
            dns_servers: Vec::new(),
            gateway: Some(Ipv4Address::new(192, 168, 69, 1)),
        })
    } else {
        Config::dhcpv4(Default::default())
    };
    let mut seed_buf = [0; 8];
    OsRng.try_fill_bytes(&mut seed_buf).expect("os rng");
    let seed = u64::from_le_bytes(seed_buf);

    let resources = mk_static!(StackResources<3>, StackResources::<3>::new());
    let (stack, runner) = embassy_net::new(device, config, resources, seed);
    spawner.spawn(net_task(runner)).unwrap();

    info!("Starting operator server on port {}", opts.port);
    wss(0, opts.port, stack, None).await;
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}
