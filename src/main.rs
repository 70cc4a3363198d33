use fingervote::{
    common::DevMode,
    core::{IdentificationOutcome, VoterDetails},
    protocol::{ErrorResponse, Response},
    ServiceClient,
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "fingervote")]
#[command(about = "Fingerprint voter registration and identification")]
struct Cli {
    /// Enable development mode (talks to the simulated-sensor service)
    #[arg(long, global = true)]
    dev: bool,

    /// Print responses as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Service socket (defaults to the system or dev socket)
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new voter with two fingerprint captures
    Enroll {
        #[arg(long)]
        voter_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        age: String,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        address: String,
    },
    /// Scan a finger and look up the voter
    Identify,
    /// Confirm a vote for a voter id
    Confirm {
        #[arg(long)]
        voter_id: String,
    },
    /// Erase all fingerprints and voter records
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Show registry usage
    Stats,
    /// Place a simulated finger on the dev sensor
    Touch {
        #[arg(short, long)]
        finger: u32,
        /// Number of touches to queue, at most 16 (enrollment needs two)
        #[arg(short, long, default_value = "1")]
        times: u32,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.dev);

    let dev_mode = DevMode::new(cli.dev);
    let socket = cli.socket.clone().unwrap_or_else(|| dev_mode.socket_path());
    let client = if cli.json {
        ServiceClient::new(socket).quiet()
    } else {
        ServiceClient::new(socket)
    };

    let response = match cli.command {
        Commands::Enroll { voter_id, name, age, gender, address } => {
            if !cli.json {
                println!("Enrolling voter: {}", voter_id);
            }
            client.enroll(VoterDetails { voter_id, name, age, gender, address })?
        }
        Commands::Identify => {
            if !cli.json {
                println!("👆 Place finger on the sensor...");
            }
            client.identify()?
        }
        Commands::Confirm { voter_id } => client.confirm(&voter_id)?,
        Commands::Reset { yes } => {
            if !yes {
                bail!("Reset erases every fingerprint and voter record; re-run with --yes");
            }
            client.reset()?
        }
        Commands::Stats => client.stats()?,
        Commands::Touch { finger, times } => {
            if !cli.dev {
                bail!("touch is only available with --dev");
            }
            client.touch(finger, times)?
        }
    };

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_response(&response);
    }

    if let Response::Error(err) = &response {
        std::process::exit(exit_code(err));
    }
    Ok(())
}

fn print_response(response: &Response) {
    match response {
        Response::Enrolled(record) => {
            println!("✅ Enrolled successfully");
            println!("   Fingerprint slot: {}", record.slot_id);
            println!("   Voter ID: {}", record.voter_id);
            println!("   Name:     {}", record.name);
            println!("   Age:      {}", record.age);
            println!("   Gender:   {}", record.gender);
            println!("   Address:  {}", record.address);
        }
        Response::Identified(IdentificationOutcome::Recognized { record, confidence }) => {
            println!("✅ Match (confidence {})", confidence);
            println!("   Fingerprint slot: {}", record.slot_id);
            println!("   Voter ID: {}", record.voter_id);
            println!("   Name:     {}", record.name);
            println!("   Age:      {}", record.age);
            println!("   Gender:   {}", record.gender);
            println!("   Address:  {}", record.address);
        }
        Response::Identified(IdentificationOutcome::RecognizedUnregistered { slot_id, .. }) => {
            println!("⚠️  Fingerprint matched slot {} but no voter is registered there", slot_id);
        }
        Response::Identified(IdentificationOutcome::NotRecognized) => {
            println!("❌ Fingerprint not recognized");
        }
        Response::Confirmed(confirmation) => {
            println!("🗳️  Vote cast for {} ({})", confirmation.name, confirmation.voter_id);
        }
        Response::ResetComplete => {
            println!("🧹 All fingerprints and voter data deleted");
        }
        Response::Stats(stats) => {
            println!("Voters enrolled: {}/{}", stats.enrolled, stats.capacity);
            println!("Next slot:       {}", stats.next_slot_id);
            println!("Service started: {}", stats.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        Response::Touched { pending } => {
            println!("Queued touch ({} pending)", pending);
        }
        Response::Error(err) => {
            eprintln!("❌ {}", err.message);
            if let Some(code) = err.sensor_code {
                eprintln!("   Sensor code: 0x{:02X}", code);
            }
        }
    }
}

/// 2 for problems the caller can fix, 1 for sensor or service faults.
fn exit_code(err: &ErrorResponse) -> i32 {
    if err.kind.is_client_error() {
        2
    } else {
        1
    }
}

fn setup_logging(dev_mode: bool) {
    if dev_mode {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .init();
    } else {
        tracing_subscriber::fmt::init();
    }
}
