pub mod config;
pub mod credentials;
pub mod env;
pub mod paths;

pub use config::{Config, LastFmConfig, RetryConfig, YouTubeConfig};
pub use credentials::CredentialStore;
pub use env::{EnvCredentials, GoogleClientCredentials};
pub use paths::{base_path_override, PathManager};
