//! Configuration loading for the client.
//!
//! The client reads the same layered configuration as the host so both agree
//! on the endpoint and framing without extra flags.

use std::ffi::OsString;
use std::path::Path;

use ortho_config::OrthoConfig;
use scenebridge_config::Config;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration, reading `config_path` when given.
    fn load(&self, config_path: Option<&Path>) -> Result<Config, AppError>;
}

/// Loads defaults, the optional file and `SCENEBRIDGE_*` variables.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, config_path: Option<&Path>) -> Result<Config, AppError> {
        let mut args = vec![OsString::from("scenebridge")];
        if let Some(path) = config_path {
            args.push(OsString::from("--config-path"));
            args.push(path.as_os_str().to_owned());
        }
        Config::load_from_iter(args).map_err(AppError::LoadConfiguration)
    }
}
