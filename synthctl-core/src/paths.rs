use std::path::PathBuf;

/// `<config dir>/synthctl`, or the working directory if the platform has none.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("synthctl")
}

pub fn user_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

pub fn default_synths_dir() -> PathBuf {
    config_dir().join("synths")
}

pub fn default_patches_dir() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("synthctl").join("patches"))
        .unwrap_or_else(|| config_dir().join("patches"))
}

pub fn log_path() -> PathBuf {
    config_dir().join("synthctl.log")
}
