pub mod changes;
pub mod playlist;
pub mod scrobble;
pub mod video;

pub use changes::{OptimizedChanges, PlaylistChanges, PlaylistRename, VideoChanges};
pub use playlist::{PlaylistSnapshot, PlaylistSummary, YouTubeFetchState, YouTubePlaylist};
pub use scrobble::{FetchState, Scrobble, SCROBBLE_DATE_FORMAT};
pub use video::YouTubeVideo;
