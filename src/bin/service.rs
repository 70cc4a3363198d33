use anyhow::Context as _;
use clap::Parser;
use fingervote::{
    common::{Config, DevMode},
    core::VotingStation,
    sensor::SensorDevice,
    service::handle_connection,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "fingervote-service")]
#[command(about = "Fingerprint voter registration service")]
struct Args {
    /// Run in development mode with the simulated sensor
    #[arg(long)]
    dev: bool,

    /// Config file (defaults to the system or dev config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the socket path from the config
    #[arg(long)]
    socket: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    setup_logging(args.dev);
    tracing::info!("Starting fingervote service (dev_mode: {})", args.dev);

    let dev_mode = DevMode::new(args.dev);
    let config = dev_mode
        .load_config(args.config.as_deref())
        .context("Failed to load configuration")?;
    let socket_path = args.socket.clone().unwrap_or_else(|| config.service.socket_path.clone());

    let sensor = SensorDevice::open(&config.sensor).context("Failed to open fingerprint sensor")?;
    let mut station = VotingStation::new(
        sensor,
        config.registry.capacity,
        config.enrollment.options(),
    );

    // Clean up old socket if exists
    if socket_path.exists() {
        fs::remove_file(&socket_path)?;
    }
    if let Some(parent) = socket_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("Failed to bind {}", socket_path.display()))?;
    fs::set_permissions(&socket_path, fs::Permissions::from_mode(0o666))?;

    tracing::info!(
        "Listening on {} (registry capacity {})",
        socket_path.display(),
        config.registry.capacity
    );

    serve(&listener, &mut station, &config, dev_mode.is_enabled());
    Ok(())
}

/// Connections are handled one at a time; the sensor cannot interleave workflows.
fn serve(
    listener: &UnixListener,
    station: &mut VotingStation<SensorDevice>,
    config: &Config,
    dev_mode: bool,
) {
    for stream in listener.incoming() {
        match stream {
            Ok(mut stream) => {
                let timeouts = stream
                    .set_read_timeout(Some(Duration::from_secs(config.service.read_timeout_secs)))
                    .and_then(|_| {
                        stream.set_write_timeout(Some(Duration::from_secs(
                            config.service.write_timeout_secs,
                        )))
                    });
                if let Err(e) = timeouts {
                    tracing::error!("Failed to configure connection: {}", e);
                    continue;
                }

                if let Err(e) = handle_connection(&mut stream, station, dev_mode) {
                    tracing::error!("Client error: {}", e);
                }
            }
            Err(e) => {
                tracing::error!("Connection error: {}", e);
            }
        }
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .init();
    }
}
