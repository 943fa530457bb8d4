pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required configuration is missing: {0}")]
    ConfigurationMissing(String),
    #[error("failed to build the 'Environment' from the provided string.")]
    StringToEnvironmentFail,
    #[error("invalid url in '{key}': {reason}")]
    InvalidUrl { key: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("figment error: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    /// Missing fields become `ConfigurationMissing` naming the full dotted key.
    fn from(er: figment::Error) -> Self {
        if let figment::error::Kind::MissingField(field) = &er.kind {
            let mut key = er.path.join(".");
            if er.path.last().map(String::as_str) != Some(&**field) {
                if !key.is_empty() {
                    key.push('.');
                }
                key.push_str(field);
            }
            return ConfigError::ConfigurationMissing(key);
        }
        ConfigError::Figment(Box::new(er))
    }
}
