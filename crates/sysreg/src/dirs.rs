//! Platform directories

use std::path::PathBuf;

use etcetera::BaseStrategy;

/// File name looked up in the user config directory and the project root
pub const CONFIG_FILE_NAME: &str = "sysreg.toml";

/// `$XDG_CONFIG_HOME/sysreg/sysreg.toml` or the platform equivalent
pub fn user_config_file() -> Option<PathBuf> {
    let strategy = etcetera::choose_base_strategy().ok()?;
    Some(strategy.config_dir().join("sysreg").join(CONFIG_FILE_NAME))
}

/// `sysreg.toml` in the current directory, if present
pub fn project_config_file() -> Option<PathBuf> {
    let path = std::env::current_dir().ok()?.join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}
