use serde::{Deserialize, Serialize};

/// Video details cached per playlist and written as one sheet row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YouTubeVideo {
    pub title: String,
    pub description: String,
    /// Duration in whole seconds
    pub duration_secs: u64,
    pub channel_name: String,
    pub video_id: String,
    pub channel_id: String,
}

impl YouTubeVideo {
    pub fn video_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }

    pub fn channel_url(&self) -> String {
        format!("https://www.youtube.com/channel/{}", self.channel_id)
    }

    /// `HH:MM:SS`, hours are not wrapped at 24
    pub fn formatted_duration(&self) -> String {
        let hours = self.duration_secs / 3600;
        let minutes = (self.duration_secs % 3600) / 60;
        let seconds = self.duration_secs % 60;
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    }

    /// Sheet row in `Title, Description, Duration, Channel, Video URL` order
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.title.clone(),
            self.description.clone(),
            self.formatted_duration(),
            self.channel_name.clone(),
            self.video_url(),
        ]
    }

    /// Row for a video ID the API no longer returns details for
    pub fn unavailable_row(video_id: &str) -> Vec<String> {
        vec![
            "[unavailable]".to_string(),
            String::new(),
            String::new(),
            String::new(),
            format!("https://www.youtube.com/watch?v={}", video_id),
        ]
    }
}
