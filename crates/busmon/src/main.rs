use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use busmon::RunInfo;
use busmon_core::{Images, MonitorConfig, TIMER_HZ};

#[derive(Parser, Debug)]
#[command(
    name = "busmon",
    about = "Bus controller monitor shell driving a simulated W65C02 target."
)]
struct Args {
    /// Image run by the `e` key (defaults to the built-in clock program).
    #[arg(long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Image run by the `t` key (defaults to the built-in echo program).
    #[arg(long, value_name = "PATH")]
    test_image: Option<PathBuf>,

    /// Timer counter rate in Hz.
    #[arg(long, default_value_t = TIMER_HZ)]
    timer_hz: u32,

    /// Spin cycles between the two RDY samples.
    #[arg(long, default_value_t = 3)]
    debounce: u32,

    /// Stop after this many shell commands.
    #[arg(long, value_name = "N")]
    max_steps: Option<u64>,
}

fn read_image(path: Option<&Path>, default: &[u8]) -> Result<Vec<u8>> {
    match path {
        Some(path) => {
            log::info!("loading image '{}'", path.display());
            std::fs::read(path).with_context(|| format!("failed to read image {}", path.display()))
        }
        None => Ok(default.to_vec()),
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let defaults = Images::default();
    let images = Images::new(
        read_image(args.image.as_deref(), defaults.primary())?,
        read_image(args.test_image.as_deref(), defaults.secondary())?,
    )?;
    let config = MonitorConfig::builder()
        .debounce_cycles(args.debounce)
        .build();
    let info = RunInfo::builder()
        .title("busmon".to_string())
        .max_steps(args.max_steps)
        .timer_hz(args.timer_hz)
        .build();

    busmon::run_simulated(images, config, info)
}
