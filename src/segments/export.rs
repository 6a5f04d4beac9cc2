// Export of the segment list as Markdown and JSON files

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use super::store::{combine, Segment};
use crate::error::{CheckpointError, Result};
use crate::platform::Platform;

pub const EXPORT_VERSION: &str = "1.0";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub segment_count: usize,
    pub total_chars: usize,
    pub segments: Vec<ExportedSegment>,
}

#[derive(Debug, Serialize)]
pub struct ExportedSegment {
    pub content: String,
    pub platform: Platform,
    pub timestamp: DateTime<Utc>,
}

/// Paths of the files written by `write_exports`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub markdown: PathBuf,
    pub json: PathBuf,
}

/// Segment contents with the same join rule as the combined checkpoint
pub fn to_markdown(segments: &[Segment]) -> String {
    let mut text = combine(segments);
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

pub fn export_document(segments: &[Segment], exported_at: DateTime<Utc>) -> ExportDocument {
    ExportDocument {
        version: EXPORT_VERSION.to_string(),
        exported_at,
        segment_count: segments.len(),
        total_chars: segments.iter().map(|s| s.content.chars().count()).sum(),
        segments: segments
            .iter()
            .map(|s| ExportedSegment {
                content: s.content.clone(),
                platform: s.platform,
                timestamp: s.created_at,
            })
            .collect(),
    }
}

pub fn to_json(segments: &[Segment], exported_at: DateTime<Utc>) -> Result<String> {
    serde_json::to_string_pretty(&export_document(segments, exported_at))
        .map_err(|e| CheckpointError::Storage(format!("Failed to serialize export: {}", e)))
}

/// Write `checkpoint-<timestamp>.md` and `.json` into `dir`
pub fn write_exports(dir: &Path, segments: &[Segment]) -> Result<ExportPaths> {
    std::fs::create_dir_all(dir)
        .map_err(|e| CheckpointError::Storage(format!("Failed to create export directory: {}", e)))?;

    let now = Utc::now();
    let stem = format!("checkpoint-{}", now.format("%Y-%m-%d_%H-%M-%S"));
    let paths = ExportPaths {
        markdown: dir.join(format!("{}.md", stem)),
        json: dir.join(format!("{}.json", stem)),
    };

    std::fs::write(&paths.markdown, to_markdown(segments))
        .map_err(|e| CheckpointError::Storage(format!("Failed to write Markdown export: {}", e)))?;
    std::fs::write(&paths.json, to_json(segments, now)?)
        .map_err(|e| CheckpointError::Storage(format!("Failed to write JSON export: {}", e)))?;

    tracing::info!(
        "Export: Wrote {} segments to {}",
        segments.len(),
        paths.markdown.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::store::SegmentId;
    use serde_json::Value;

    fn segment(id: u64, content: &str, platform: Platform) -> Segment {
        Segment {
            id: SegmentId(id),
            content: content.to_string(),
            platform,
            created_at: Utc::now(),
            collapsed: false,
            source: None,
        }
    }

    #[test]
    fn test_markdown_uses_join_rule() {
        let segments = vec![
            segment(1, " A ", Platform::Claude),
            segment(2, "   ", Platform::Claude),
            segment(3, "B", Platform::Gemini),
        ];
        assert_eq!(to_markdown(&segments), "A\n\nB\n");
        assert_eq!(to_markdown(&[]), "");
    }

    #[test]
    fn test_json_shape() {
        let segments = vec![
            segment(1, "héllo", Platform::ChatGpt),
            segment(2, "abc", Platform::Unknown),
        ];
        let json: Value = serde_json::from_str(&to_json(&segments, Utc::now()).unwrap()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["segmentCount"], 2);
        assert_eq!(json["totalChars"], 8);
        assert!(json.get("exportedAt").is_some());
        assert_eq!(json["segments"][0]["platform"], "chatgpt");
        assert_eq!(json["segments"][1]["content"], "abc");
        assert!(json["segments"][0].get("timestamp").is_some());
        assert!(json["segments"][0].get("id").is_none());
    }

    #[test]
    fn test_write_exports() {
        let dir = tempfile::tempdir().unwrap();
        let segments = vec![segment(1, "content", Platform::Claude)];
        let paths = write_exports(&dir.path().join("exports"), &segments).unwrap();

        assert_eq!(std::fs::read_to_string(&paths.markdown).unwrap(), "content\n");
        let json: Value =
            serde_json::from_str(&std::fs::read_to_string(&paths.json).unwrap()).unwrap();
        assert_eq!(json["segmentCount"], 1);
    }
}
