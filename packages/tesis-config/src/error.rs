use std::path::PathBuf;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Cannot read config {}: {source}", path.display())]
	Read { path: PathBuf, source: std::io::Error },
	#[error("Config {} is not valid TOML: {source}", path.display())]
	Parse { path: PathBuf, source: Box<toml::de::Error> },
	/// `key` is the dotted path of the offending setting.
	#[error("{key} {reason}")]
	Invalid { key: &'static str, reason: String },
}
