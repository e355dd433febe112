//! JSON message format emitted by the landmark source.
//!
//! One message per observation:
//! `{"timestamp", "landmarks": [{"id","x","y","z","visibility"}] | null,
//!   "image_w", "image_h", "mid_hip_z", "fps"}`.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

use super::landmark::{Landmark, LandmarkIndex, PoseFrame};

#[derive(Debug, Clone, Deserialize)]
pub struct LandmarkRecord {
    pub id: usize,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Missing visibility means the source did not report one.
    #[serde(default)]
    pub visibility: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PosePayload {
    #[serde(default)]
    pub timestamp: Option<f64>,
    /// `null` when the source saw no person this observation.
    #[serde(default)]
    pub landmarks: Option<Vec<LandmarkRecord>>,
    #[serde(default)]
    pub image_w: u32,
    #[serde(default)]
    pub image_h: u32,
    #[serde(default)]
    pub mid_hip_z: f32,
    #[serde(default)]
    pub fps: f32,
}

impl PosePayload {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("failed to decode pose payload")
    }

    /// Build a frame from the payload. `None` when the payload carries no landmarks.
    pub fn into_frame(self) -> Option<PoseFrame> {
        let records = self.landmarks?;
        let mut frame = PoseFrame::default();
        frame.timestamp = self.timestamp.unwrap_or(0.0);
        frame.image_width = self.image_w;
        frame.image_height = self.image_h;
        frame.mid_hip_z = self.mid_hip_z;
        frame.fps = self.fps;

        for record in records {
            let Some(index) = LandmarkIndex::from_index(record.id) else {
                warn!(id = record.id, "dropping landmark with unknown id");
                continue;
            };
            frame.set(
                index,
                Some(Landmark::new(
                    record.x,
                    record.y,
                    record.z,
                    record.visibility.unwrap_or(1.0),
                )),
            );
        }
        Some(frame)
    }
}

/// Decode one JSON message straight into a frame.
pub fn decode_frame(text: &str) -> Result<Option<PoseFrame>> {
    Ok(PosePayload::from_json(text)?.into_frame())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_full_message() {
        let json = r#"{
            "timestamp": 12.5,
            "landmarks": [
                {"id": 0, "x": 0.5, "y": 0.2, "z": -0.1, "visibility": 0.99},
                {"id": 23, "x": 0.45, "y": 0.6, "z": 0.0, "visibility": 0.8}
            ],
            "image_w": 640,
            "image_h": 480,
            "mid_hip_z": 0.01,
            "fps": 29.5
        }"#;
        let frame = decode_frame(json).unwrap().unwrap();
        assert_eq!(frame.timestamp, 12.5);
        assert_eq!(frame.image_width, 640);
        assert_eq!(frame.image_height, 480);
        assert_eq!(frame.fps, 29.5);
        assert_eq!(frame.detected_count(), 2);
        let hip = frame.get(LandmarkIndex::LeftHip).unwrap();
        assert_eq!(hip.x, 0.45);
        assert_eq!(hip.visibility, 0.8);
        assert!(frame.get(LandmarkIndex::RightHip).is_none());
    }

    #[test]
    fn test_null_landmarks_is_no_frame() {
        let json = r#"{"timestamp": 1.0, "landmarks": null}"#;
        assert!(decode_frame(json).unwrap().is_none());
    }

    #[test]
    fn test_missing_visibility_defaults_to_full() {
        let json = r#"{"landmarks": [{"id": 11, "x": 0.4, "y": 0.4, "z": 0.0, "visibility": null}]}"#;
        let frame = decode_frame(json).unwrap().unwrap();
        assert_eq!(frame.get(LandmarkIndex::LeftShoulder).unwrap().visibility, 1.0);
    }

    #[test]
    fn test_unknown_id_dropped() {
        let json = r#"{"landmarks": [{"id": 40, "x": 0.4, "y": 0.4, "z": 0.0}]}"#;
        let frame = decode_frame(json).unwrap().unwrap();
        assert_eq!(frame.detected_count(), 0);
    }

    #[test]
    fn test_malformed_message_is_error() {
        assert!(decode_frame("{not json").is_err());
    }
}
