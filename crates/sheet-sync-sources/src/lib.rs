pub mod error;
pub mod google_auth;
pub mod http;
pub mod lastfm;
pub mod sheets;
pub mod traits;
pub mod youtube;

pub use error::{ErrorCategory, SourceError};
pub use google_auth::{AccessToken, GoogleAuth};
pub use http::build_http_client;
pub use lastfm::LastFmClient;
pub use sheets::GoogleSheetsClient;
pub use traits::{Page, PlaylistSource, ScrobbleSource, SpreadsheetClient};
pub use youtube::YouTubeClient;
