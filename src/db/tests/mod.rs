
use crate::types::EpisodeRecord;

pub(crate) fn episode(id: &str, publish_date: i64) -> EpisodeRecord {
    EpisodeRecord {
        id: id.to_string(),
        title: format!("Episode {id}"),
        description: String::new(),
        audio: format!("https://cdn.example.com/{id}.mp3"),
        image: None,
        audio_length_sec: 120,
        maybe_audio_invalid: false,
        publish_date,
    }
}
