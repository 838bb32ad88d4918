use serde::{Deserialize, Serialize};

/// Transcription engine a model runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EngineType {
    Whisper,
    Parakeet,
    Moonshine,
    Qwen3,
}

/// A catalog entry as reported by the backend.
///
/// The backend owns this record; the store only ever replaces the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Approximate size in megabytes.
    #[serde(default)]
    pub size_mb: u64,
    pub is_downloaded: bool,
    pub is_downloading: bool,
    /// Bytes already present from an interrupted download.
    #[serde(default)]
    pub partial_size: u64,
    /// Whether the model unpacks into a directory (archive download).
    #[serde(default)]
    pub is_directory: bool,
    pub engine_type: EngineType,
    #[serde(default)]
    pub accuracy_score: f32,
    #[serde(default)]
    pub speed_score: f32,
}

/// Lifecycle state of a model as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelState {
    Idle,
    Downloading,
    Extracting,
    Downloaded,
}

/// Most recent download progress sample for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub model_id: String,
    /// Bytes downloaded so far.
    pub downloaded: u64,
    /// Total bytes to download (0 if unknown).
    pub total: u64,
    /// Download progress as percentage (0.0 - 100.0).
    pub percentage: f64,
}

impl DownloadProgress {
    pub fn new(model_id: impl Into<String>, downloaded: u64, total: u64) -> Self {
        let percentage = if total > 0 {
            (downloaded as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        Self {
            model_id: model_id.into(),
            downloaded,
            total,
            percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_progress_percentage() {
        let progress = DownloadProgress::new("small", 50, 200);
        assert_eq!(progress.percentage, 25.0);

        let unknown = DownloadProgress::new("small", 50, 0);
        assert_eq!(unknown.percentage, 0.0);
    }

    #[test]
    fn test_record_accepts_minimal_payload() {
        let record: ModelRecord = serde_json::from_str(
            r#"{"id":"small","name":"Whisper Small","is_downloaded":false,
                "is_downloading":true,"engine_type":"Whisper"}"#,
        )
        .unwrap();
        assert!(record.is_downloading);
        assert_eq!(record.partial_size, 0);
        assert_eq!(record.engine_type, EngineType::Whisper);
    }
}
