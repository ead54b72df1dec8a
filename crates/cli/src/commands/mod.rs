pub mod ask;
pub mod doctor;
pub mod init;
pub mod seed;
pub mod serve;

use std::path::Path;

use tutorgate_config::AppConfig;

/// Load config from `path` (or the default location) plus the environment.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    AppConfig::load_with(path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// Print setup hints for missing credentials. Returns how many are missing.
pub fn report_missing_credentials(config: &AppConfig) -> usize {
    let missing = config.missing_credentials();
    if !missing.is_empty() {
        eprintln!();
        eprintln!("  Missing credentials: {}", missing.join(", "));
        eprintln!("  Set them in the environment, in a .env file, or in:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
    }
    missing.len()
}
