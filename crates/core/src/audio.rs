//! Audio segment types

use serde::{Deserialize, Serialize};

/// One unit of synthesized speech to deliver to the caller
///
/// Segments of the same reply are produced out of order by the synthesis
/// collaborator and must reach the carrier in ascending `index` order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSegment {
    /// Position in the ordered reply stream. `None` bypasses ordering
    /// (session-opening audio such as the greeting).
    pub index: Option<usize>,
    /// Raw audio (μ-law, 8 kHz, no container)
    #[serde(skip)]
    pub payload: Vec<u8>,
    /// Delivery-acknowledgment label round-tripped through the carrier
    pub label: Option<String>,
}

impl AudioSegment {
    /// Create a segment belonging to the ordered reply stream
    pub fn ordered(index: usize, payload: Vec<u8>, label: impl Into<String>) -> Self {
        Self {
            index: Some(index),
            payload,
            label: Some(label.into()),
        }
    }

    /// Create a segment that is delivered as soon as it is submitted
    pub fn unordered(payload: Vec<u8>, label: Option<String>) -> Self {
        Self {
            index: None,
            payload,
            label,
        }
    }

    /// A zero-length payload is a synthesis failure, never a valid segment
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Label to attach to the delivery marker, minting one if none was given
    pub fn mark_label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_label_prefers_supplied_label() {
        let segment = AudioSegment::ordered(0, vec![1, 2, 3], "reply-0");
        assert_eq!(segment.mark_label(), "reply-0");
    }

    #[test]
    fn test_mark_label_is_generated_when_missing() {
        let segment = AudioSegment::unordered(vec![1], None);
        let a = segment.mark_label();
        let b = segment.mark_label();
        assert!(!a.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_payload() {
        assert!(AudioSegment::ordered(3, Vec::new(), "x").is_empty());
        assert!(!AudioSegment::ordered(3, vec![0x7f], "x").is_empty());
    }
}
