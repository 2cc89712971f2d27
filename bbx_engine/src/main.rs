//! CLI Front-End (C13): the standalone engine binary's argument surface.

use std::process::ExitCode;

use bbx_engine::config::EngineConfig;
use bbx_engine::facade::Engine;
use clap::Parser;
use log::error;

#[derive(Parser, Debug)]
#[command(name = "bbx_engine", about = "Real-time multichannel audio processing engine")]
struct Cli {
    /// Path to the JSON engine configuration file.
    #[arg(long, required_unless_present = "list_devices")]
    config: Option<String>,

    /// Enumerate hardware audio devices and exit, without starting the engine.
    #[arg(long)]
    list_devices: bool,

    /// Raise log verbosity from `info` to `debug`.
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    if cli.list_devices {
        return match Engine::list_devices() {
            Ok(devices) => {
                for device in devices {
                    println!(
                        "{}  (in: {}, out: {}, default rate: {} Hz)",
                        device.name, device.max_input_channels, device.max_output_channels, device.default_sample_rate
                    );
                }
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("failed to enumerate devices: {e}");
                ExitCode::FAILURE
            }
        };
    }

    let config_path = cli.config.expect("clap enforces --config unless --list-devices is set");

    match run(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            error!("engine exited with error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> bbx_engine::Result<()> {
    let config = EngineConfig::load(config_path)?;
    let mut engine = Engine::initialize(config, Vec::new())?;
    engine.run()?;

    // Block the main thread until interrupted; the engine's own threads
    // (driver callback or paced loop, control server, status reporter)
    // do the actual work. A real deployment would wire this to a signal
    // handler; ctrlc is the pack's convention for that seam.
    wait_for_shutdown_signal();

    engine.stop()
}

fn wait_for_shutdown_signal() {
    let (tx, rx) = std::sync::mpsc::channel();
    let handler_result = ctrlc::set_handler(move || {
        let _ = tx.send(());
    });
    match handler_result {
        Ok(()) => {
            let _ = rx.recv();
        }
        Err(e) => {
            error!("failed to install Ctrl-C handler ({e}); engine will run until killed");
            loop {
                std::thread::park();
            }
        }
    }
}
