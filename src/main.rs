#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    let level = std::env::var("LIFE_LOG")
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(log::LevelFilter::Info);
    gridlife::init_logging(level)?;

    let config = gridlife::LifeConfig::from_env()?;
    gridlife::run(config)
}

// The browser entry points live in the library.
#[cfg(target_arch = "wasm32")]
fn main() {}
