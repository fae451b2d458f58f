use hcsr04_driver::{HcSr04, HcSr04Error, Settings};
use std::{io::Read, path::PathBuf, thread::sleep, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    // Optional TOML file, e.g. `cargo run --example hcsr04_xmpl -- hcsr04.toml`
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let settings = Settings::load(config_path.as_deref())?;
    let sensor = HcSr04::open(&settings)?;

    loop {
        let mut line = String::new();
        match sensor.file().read_to_string(&mut line) {
            Ok(_) => info!("Distance: {}", line.trim_end()),
            Err(e) if e.raw_os_error() == Some(HcSr04Error::Timeout.errno()) => {
                warn!("Measurement timeout")
            }
            Err(e) => warn!("Measurement failed: {}", e),
        }
        sleep(Duration::from_secs_f32(0.2));
    }
}
