//! Ordered delivery of synthesized audio
//!
//! Synthesis requests complete in arbitrary order. The sequencer holds
//! early segments until every lower index has been delivered (or given
//! up on), then writes each one to the carrier followed by its
//! acknowledgment mark.

use std::collections::BTreeMap;

use call_intake_core::{AudioSegment, MediaSink};

use crate::PipelineError;

/// A segment that reached the carrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub index: Option<usize>,
    /// Mark label sent after the audio
    pub label: String,
}

/// Everything one `submit` or `abandon` call wrote to the carrier
///
/// A transport failure partway through a drain stops the drain. Segments
/// written before it are still reported in `delivered`; the failure is
/// kept in `interrupted`.
#[derive(Debug, Default)]
pub struct Submitted {
    pub delivered: Vec<Delivery>,
    pub interrupted: Option<PipelineError>,
}

impl Submitted {
    fn delivered(delivered: Vec<Delivery>) -> Self {
        Self {
            delivered,
            interrupted: None,
        }
    }
}

#[derive(Debug)]
enum Slot {
    Ready(AudioSegment),
    /// Synthesis failed for this index; skip it when draining
    Abandoned,
}

/// Reorders indexed segments into ascending delivery order
#[derive(Debug, Default)]
pub struct AudioSequencer {
    next_expected: usize,
    pending: BTreeMap<usize, Slot>,
}

impl AudioSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next ordered delivery must carry
    pub fn next_expected(&self) -> usize {
        self.next_expected
    }

    /// Number of segments held back waiting for a lower index
    pub fn pending_len(&self) -> usize {
        self.pending
            .values()
            .filter(|slot| matches!(slot, Slot::Ready(_)))
            .count()
    }

    /// Accept a synthesized segment
    ///
    /// Returns every delivery this submission caused, in delivery order.
    /// A stale or duplicate index returns no deliveries. Empty payloads and
    /// a transport that takes nothing are errors and leave the sequencer
    /// untouched. Once audio has been written, a transport failure is
    /// reported in [`Submitted::interrupted`] alongside the deliveries.
    pub fn submit(
        &mut self,
        segment: AudioSegment,
        sink: &dyn MediaSink,
    ) -> Result<Submitted, PipelineError> {
        if segment.is_empty() {
            return Err(PipelineError::EmptyPayload {
                index: segment.index,
            });
        }

        let index = match segment.index {
            None => {
                if !sink.is_open() {
                    return Err(PipelineError::TransportUnavailable);
                }
                return match deliver(&segment, sink) {
                    Written::Complete(delivery) => Ok(Submitted::delivered(vec![delivery])),
                    Written::Unmarked(delivery, e) => Ok(Submitted {
                        delivered: vec![delivery],
                        interrupted: Some(e),
                    }),
                    Written::Nothing(e) => Err(e),
                };
            }
            Some(index) => index,
        };

        if index < self.next_expected
            || (index > self.next_expected && self.pending.contains_key(&index))
        {
            tracing::debug!(
                index,
                next_expected = self.next_expected,
                "Dropping stale or duplicate segment"
            );
            return Ok(Submitted::default());
        }

        if !sink.is_open() {
            return Err(PipelineError::TransportUnavailable);
        }

        if index > self.next_expected {
            tracing::trace!(index, next_expected = self.next_expected, "Holding segment");
            self.pending.insert(index, Slot::Ready(segment));
            return Ok(Submitted::default());
        }

        // a copy held here by an interrupted drain is superseded
        self.pending.remove(&index);

        let first = match deliver(&segment, sink) {
            Written::Nothing(e) => return Err(e),
            Written::Unmarked(delivery, e) => {
                self.next_expected += 1;
                return Ok(Submitted {
                    delivered: vec![delivery],
                    interrupted: Some(e),
                });
            }
            Written::Complete(delivery) => delivery,
        };
        self.next_expected += 1;

        let mut submitted = self.drain(sink);
        submitted.delivered.insert(0, first);
        Ok(submitted)
    }

    /// Give up on an index whose synthesis failed
    ///
    /// Later segments stop waiting for it. Returns deliveries unblocked by
    /// skipping the index.
    pub fn abandon(&mut self, index: usize, sink: &dyn MediaSink) -> Submitted {
        if index < self.next_expected {
            return Submitted::default();
        }

        tracing::debug!(index, "Abandoning segment");

        if index > self.next_expected {
            self.pending.entry(index).or_insert(Slot::Abandoned);
            return Submitted::default();
        }

        self.next_expected += 1;
        self.drain(sink)
    }

    /// Deliver held segments from `next_expected` upward
    ///
    /// A segment whose audio went out counts as delivered even if its mark
    /// did not. A segment whose audio failed stays held at its index.
    fn drain(&mut self, sink: &dyn MediaSink) -> Submitted {
        let mut submitted = Submitted::default();
        while let Some(slot) = self.pending.remove(&self.next_expected) {
            if let Slot::Ready(segment) = &slot {
                match deliver(segment, sink) {
                    Written::Complete(delivery) => submitted.delivered.push(delivery),
                    Written::Unmarked(delivery, e) => {
                        submitted.delivered.push(delivery);
                        self.next_expected += 1;
                        submitted.interrupted = Some(e);
                        break;
                    }
                    Written::Nothing(e) => {
                        self.pending.insert(self.next_expected, slot);
                        submitted.interrupted = Some(e);
                        break;
                    }
                }
            }
            self.next_expected += 1;
        }
        submitted
    }
}

enum Written {
    Complete(Delivery),
    /// Audio written, mark lost
    Unmarked(Delivery, PipelineError),
    Nothing(PipelineError),
}

fn deliver(segment: &AudioSegment, sink: &dyn MediaSink) -> Written {
    let label = segment.mark_label();
    if let Err(e) = sink.send_media(&segment.payload) {
        return Written::Nothing(e.into());
    }

    tracing::debug!(
        index = ?segment.index,
        label = %label,
        bytes = segment.payload.len(),
        "Audio sent"
    );

    let mark = sink.send_mark(&label);
    let delivery = Delivery {
        index: segment.index,
        label,
    };
    match mark {
        Ok(()) => Written::Complete(delivery),
        Err(e) => Written::Unmarked(delivery, e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_intake_core::{Error, Result};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Media(Vec<u8>),
        Mark(String),
    }

    struct RecordingSink {
        open: AtomicBool,
        /// Writes accepted before the carrier starts refusing them
        budget: AtomicUsize,
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                open: AtomicBool::new(true),
                budget: AtomicUsize::new(usize::MAX),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing_after(writes: usize) -> Self {
            let sink = Self::new();
            sink.budget.store(writes, Ordering::SeqCst);
            sink
        }

        fn write(&self, sent: Sent) -> Result<()> {
            if !self.is_open() {
                return Err(Error::TransportUnavailable);
            }
            let spent = self
                .budget
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if spent.is_err() {
                return Err(Error::TransportUnavailable);
            }
            self.sent.lock().push(sent);
            Ok(())
        }

        fn media(&self) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .iter()
                .filter_map(|s| match s {
                    Sent::Media(m) => Some(m.clone()),
                    _ => None,
                })
                .collect()
        }
    }

    impl MediaSink for RecordingSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_media(&self, audio: &[u8]) -> Result<()> {
            self.write(Sent::Media(audio.to_vec()))
        }

        fn send_mark(&self, label: &str) -> Result<()> {
            self.write(Sent::Mark(label.to_string()))
        }

        fn send_clear(&self) -> Result<()> {
            Ok(())
        }

        fn close(&self, _code: u16, _reason: &str) -> Result<()> {
            self.open.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    fn segment(index: usize) -> AudioSegment {
        AudioSegment::ordered(index, vec![index as u8 + 1], format!("seg-{}", index))
    }

    fn permutations(items: Vec<usize>) -> Vec<Vec<usize>> {
        if items.len() <= 1 {
            return vec![items];
        }
        let mut out = Vec::new();
        for i in 0..items.len() {
            let mut rest = items.clone();
            let head = rest.remove(i);
            for mut tail in permutations(rest) {
                tail.insert(0, head);
                out.push(tail);
            }
        }
        out
    }

    #[test]
    fn test_any_arrival_order_delivers_ascending() {
        for order in permutations((0..4).collect()) {
            let sink = RecordingSink::new();
            let mut sequencer = AudioSequencer::new();

            for &i in &order {
                sequencer.submit(segment(i), &sink).unwrap();
            }

            assert_eq!(
                sink.media(),
                vec![vec![1], vec![2], vec![3], vec![4]],
                "arrival order {:?}",
                order
            );
            assert_eq!(sequencer.next_expected(), 4);
            assert_eq!(sequencer.pending_len(), 0);
        }
    }

    #[test]
    fn test_mark_follows_each_payload() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(1), &sink).unwrap();
        let delivered = sequencer.submit(segment(0), &sink).unwrap().delivered;

        assert_eq!(
            delivered.iter().map(|d| d.label.as_str()).collect::<Vec<_>>(),
            vec!["seg-0", "seg-1"]
        );
        assert_eq!(
            *sink.sent.lock(),
            vec![
                Sent::Media(vec![1]),
                Sent::Mark("seg-0".to_string()),
                Sent::Media(vec![2]),
                Sent::Mark("seg-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_resubmitting_delivered_index_is_noop() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(0), &sink).unwrap();
        let again = sequencer.submit(segment(0), &sink).unwrap().delivered;

        assert!(again.is_empty());
        assert_eq!(sink.media().len(), 1);
        assert_eq!(sequencer.next_expected(), 1);
    }

    #[test]
    fn test_duplicate_pending_index_keeps_first() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(1), &sink).unwrap();
        sequencer
            .submit(AudioSegment::ordered(1, vec![99], "late"), &sink)
            .unwrap();
        sequencer.submit(segment(0), &sink).unwrap();

        assert_eq!(sink.media(), vec![vec![1], vec![2]]);
    }

    #[test]
    fn test_unordered_segment_bypasses_ordering() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(2), &sink).unwrap();
        let delivered = sequencer
            .submit(AudioSegment::unordered(vec![42], None), &sink)
            .unwrap()
            .delivered;

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].index, None);
        assert!(!delivered[0].label.is_empty());
        assert_eq!(sink.media(), vec![vec![42]]);
        assert_eq!(sequencer.next_expected(), 0);
    }

    #[test]
    fn test_empty_payload_is_rejected() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        let err = sequencer
            .submit(AudioSegment::ordered(0, Vec::new(), "empty"), &sink)
            .unwrap_err();

        assert_eq!(err, PipelineError::EmptyPayload { index: Some(0) });
        assert_eq!(sequencer.next_expected(), 0);
        assert!(sink.sent.lock().is_empty());

        let err = sequencer
            .submit(AudioSegment::unordered(Vec::new(), None), &sink)
            .unwrap_err();
        assert_eq!(err, PipelineError::EmptyPayload { index: None });
    }

    #[test]
    fn test_closed_transport_leaves_state_intact() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();
        sequencer.submit(segment(0), &sink).unwrap();

        sink.open.store(false, Ordering::SeqCst);
        assert_eq!(
            sequencer.submit(segment(1), &sink).unwrap_err(),
            PipelineError::TransportUnavailable
        );
        assert_eq!(
            sequencer.submit(segment(2), &sink).unwrap_err(),
            PipelineError::TransportUnavailable
        );
        assert_eq!(sequencer.next_expected(), 1);
        assert_eq!(sequencer.pending_len(), 0);

        sink.open.store(true, Ordering::SeqCst);
        sequencer.submit(segment(1), &sink).unwrap();
        assert_eq!(sequencer.next_expected(), 2);
    }

    #[test]
    fn test_abandon_unblocks_later_segments() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(0), &sink).unwrap();
        sequencer.submit(segment(2), &sink).unwrap();
        sequencer.submit(segment(3), &sink).unwrap();

        let delivered = sequencer.abandon(1, &sink).delivered;
        assert_eq!(
            delivered.iter().map(|d| d.index).collect::<Vec<_>>(),
            vec![Some(2), Some(3)]
        );
        assert_eq!(sequencer.next_expected(), 4);
    }

    #[test]
    fn test_abandon_ahead_is_skipped_when_reached() {
        let sink = RecordingSink::new();
        let mut sequencer = AudioSequencer::new();

        sequencer.abandon(1, &sink);
        sequencer.submit(segment(2), &sink).unwrap();
        sequencer.submit(segment(0), &sink).unwrap();

        assert_eq!(sink.media(), vec![vec![1], vec![3]]);
        assert_eq!(sequencer.next_expected(), 3);

        // a late success for the abandoned index is stale
        assert!(sequencer.submit(segment(1), &sink).unwrap().delivered.is_empty());
    }

    #[test]
    fn test_failure_mid_drain_keeps_written_deliveries() {
        let sink = RecordingSink::failing_after(3);
        let mut sequencer = AudioSequencer::new();

        sequencer
            .submit(AudioSegment::ordered(1, vec![2], "transfer-x"), &sink)
            .unwrap();
        let submitted = sequencer
            .submit(AudioSegment::ordered(0, vec![1], "reply-0"), &sink)
            .unwrap();

        // the transfer audio went out; only its mark was refused
        assert_eq!(
            submitted
                .delivered
                .iter()
                .map(|d| d.label.as_str())
                .collect::<Vec<_>>(),
            vec!["reply-0", "transfer-x"]
        );
        assert_eq!(submitted.interrupted, Some(PipelineError::TransportUnavailable));
        assert_eq!(sequencer.next_expected(), 2);
        assert_eq!(sequencer.pending_len(), 0);

        sink.budget.store(usize::MAX, Ordering::SeqCst);
        let later = sequencer.submit(segment(2), &sink).unwrap();
        assert_eq!(later.delivered.len(), 1);
        assert_eq!(later.delivered[0].index, Some(2));
    }

    #[test]
    fn test_refused_audio_stays_held_until_resubmitted() {
        let sink = RecordingSink::failing_after(2);
        let mut sequencer = AudioSequencer::new();

        sequencer.submit(segment(1), &sink).unwrap();
        let submitted = sequencer.submit(segment(0), &sink).unwrap();

        assert_eq!(
            submitted.delivered.iter().map(|d| d.index).collect::<Vec<_>>(),
            vec![Some(0)]
        );
        assert!(submitted.interrupted.is_some());
        assert_eq!(sequencer.next_expected(), 1);
        assert_eq!(sequencer.pending_len(), 1);

        sink.budget.store(usize::MAX, Ordering::SeqCst);
        let retried = sequencer.submit(segment(1), &sink).unwrap();
        assert_eq!(retried.delivered[0].index, Some(1));
        assert!(retried.interrupted.is_none());

        sequencer.submit(segment(2), &sink).unwrap();
        assert_eq!(sink.media(), vec![vec![1], vec![2], vec![3]]);
        assert_eq!(sequencer.next_expected(), 3);
    }

    #[test]
    fn test_first_write_refused_is_an_error() {
        let sink = RecordingSink::failing_after(0);
        let mut sequencer = AudioSequencer::new();

        assert_eq!(
            sequencer.submit(segment(0), &sink).unwrap_err(),
            PipelineError::TransportUnavailable
        );
        assert_eq!(sequencer.next_expected(), 0);
        assert_eq!(sequencer.pending_len(), 0);
    }
}
