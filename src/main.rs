use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use log::{info, warn};

use ionrace::ion::{ION_FLAG_FORCE_CONTIGUOUS, ION_FLAG_SECURE};
use ionrace::{HarnessConfig, IonDevice, RetryDriver, StopRequest, request_stop};

struct Cli {
    device: Option<PathBuf>,
    iterations: Option<u64>,
    progress: Option<u64>,
    secure: bool,
    contiguous: bool,
}

impl Cli {
    fn parse() -> Result<Self> {
        let args: Vec<String> = env::args().collect();

        let mut device = None;
        let mut iterations = None;
        let mut progress = None;
        let mut secure = false;
        let mut contiguous = false;

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-d" | "--device" => {
                    i += 1;
                    if i < args.len() {
                        device = Some(PathBuf::from(&args[i]));
                    }
                }
                "-n" | "--iterations" => {
                    i += 1;
                    if i < args.len() {
                        iterations =
                            Some(u64::from_str(&args[i]).context("Invalid iteration count")?);
                    }
                }
                "-p" | "--progress" => {
                    i += 1;
                    if i < args.len() {
                        progress = Some(u64::from_str(&args[i]).context("Invalid progress interval")?);
                    }
                }
                "--secure" => {
                    secure = true;
                }
                "--contiguous" => {
                    contiguous = true;
                }
                "-h" | "--help" => {
                    println!("ION free/map race reproducer");
                    println!("Usage: ionrace [OPTIONS]");
                    println!("Options:");
                    println!("  -d, --device PATH            Allocator device (default: /dev/ion)");
                    println!(
                        "  -n, --iterations N           Stop after N iterations (default: run forever)"
                    );
                    println!(
                        "  -p, --progress N             Log progress every N iterations (0 = never)"
                    );
                    println!("      --secure                 Request secure allocations");
                    println!("      --contiguous             Request physically contiguous allocations");
                    println!("  -h, --help                   Print help information");
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown option: {}", args[i]);
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
            i += 1;
        }

        Ok(Self {
            device,
            iterations,
            progress,
            secure,
            contiguous,
        })
    }

    fn into_config(self) -> Result<HarnessConfig> {
        let mut builder = HarnessConfig::builder();
        if let Some(device) = self.device {
            builder = builder.device_path(device);
        }
        if let Some(limit) = self.iterations {
            builder = builder.max_iterations(limit);
        }
        if let Some(every) = self.progress {
            builder = builder.progress_interval(every);
        }
        if self.secure {
            builder = builder.alloc_flags(ION_FLAG_SECURE);
        }
        if self.contiguous {
            builder = builder.alloc_flags(ION_FLAG_FORCE_CONTIGUOUS);
        }
        builder.build().context("Invalid configuration")
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse()?.into_config()?;
    let device = IonDevice::new(&config.device_path);
    info!("Starting race loop on {}", device.path().display());

    let driver = RetryDriver::new(device, config);

    // Stop between iterations so a race is never cut short. A hung
    // iteration never gets there, so a second Ctrl+C exits outright.
    let running = driver.running();
    ctrlc::set_handler(move || match request_stop(&running) {
        StopRequest::Graceful => {
            warn!("Stopping after the current iteration, press Ctrl+C again to force exit");
        }
        StopRequest::Forced => {
            warn!("Forced exit");
            std::process::exit(130);
        }
    })?;

    let summary = driver.run().context("Race loop aborted")?;
    info!(
        "{} iterations: {} raced, {} allocation failures, {} spawn failures",
        summary.iterations, summary.raced, summary.allocation_failures, summary.spawn_failures
    );
    Ok(())
}
