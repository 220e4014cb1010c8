/// Configuration command handlers
use anyhow::{Context, Result};
use flowtrack_core::Config;

pub fn path() -> Result<()> {
    println!("{}", Config::default_path()?.display());
    Ok(())
}

pub fn show() -> Result<()> {
    let path = Config::default_path()?;
    let config = Config::load(&path)?;
    if !path.exists() {
        println!("# {} not found, showing defaults\n", path.display());
    }
    println!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to render config")?
    );
    Ok(())
}
