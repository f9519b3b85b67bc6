// Event post-processing - cleanup of the raw classified event stream
//
// Orders events, drops sub-threshold velocities, removes near-duplicate
// hits that the multi-estimator onset stage can produce, and smooths the
// velocities of rapid same-instrument sequences.

use std::collections::HashMap;

use super::{DrumEvent, DrumInstrument};

/// Window for duplicate suppression, in seconds
const DUPLICATE_WINDOW: f64 = 0.02;
/// Velocity difference under which two close hits count as duplicates
const DUPLICATE_VELOCITY_DELTA: f64 = 0.1;
/// How many recent kept events are checked for duplicates
const DUPLICATE_LOOKBACK: usize = 5;
/// Same-instrument hits closer than this get their velocities averaged
const SMOOTHING_WINDOW: f64 = 0.1;

/// Summary statistics over a processed event stream.
#[derive(Debug, Clone, Default)]
pub struct EventStatistics {
    pub total_events: usize,
    pub events_per_instrument: HashMap<DrumInstrument, usize>,
    pub mean_velocity: f64,
    pub mean_confidence: f64,
    /// Time between first and last event, in seconds
    pub span_seconds: f64,
}

/// Cleans up raw classified events into a playable transcription.
pub struct EventPostProcessor {
    velocity_threshold: f64,
}

impl EventPostProcessor {
    pub fn new(velocity_threshold: f64) -> Self {
        Self { velocity_threshold }
    }

    /// Run the full cleanup pipeline.
    pub fn process(&self, mut events: Vec<DrumEvent>) -> Vec<DrumEvent> {
        events.sort_by(|a, b| {
            a.timestamp
                .partial_cmp(&b.timestamp)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        events.retain(|event| event.velocity >= self.velocity_threshold);

        let mut kept = self.deduplicate(events);
        self.smooth_velocities(&mut kept);
        kept
    }

    /// Drop events that duplicate a recently kept hit of the same instrument.
    fn deduplicate(&self, events: Vec<DrumEvent>) -> Vec<DrumEvent> {
        let mut kept: Vec<DrumEvent> = Vec::with_capacity(events.len());
        for event in events {
            let recent_start = kept.len().saturating_sub(DUPLICATE_LOOKBACK);
            let duplicate = kept[recent_start..].iter().any(|prev| {
                prev.instrument == event.instrument
                    && (event.timestamp - prev.timestamp) < DUPLICATE_WINDOW
                    && (event.velocity - prev.velocity).abs() < DUPLICATE_VELOCITY_DELTA
            });
            if !duplicate {
                kept.push(event);
            }
        }
        kept
    }

    /// Average the velocities of consecutive same-instrument hits closer
    /// than the smoothing window, evening out rolls and flams.
    fn smooth_velocities(&self, events: &mut [DrumEvent]) {
        for i in 1..events.len() {
            if events[i].instrument == events[i - 1].instrument
                && events[i].timestamp - events[i - 1].timestamp < SMOOTHING_WINDOW
            {
                let average = (events[i].velocity + events[i - 1].velocity) / 2.0;
                events[i - 1].velocity = average;
                events[i].velocity = average;
            }
        }
    }

    /// Compute summary statistics over a processed stream.
    pub fn statistics(&self, events: &[DrumEvent]) -> EventStatistics {
        if events.is_empty() {
            return EventStatistics::default();
        }

        let mut per_instrument: HashMap<DrumInstrument, usize> = HashMap::new();
        let mut velocity_sum = 0.0;
        let mut confidence_sum = 0.0;
        for event in events {
            *per_instrument.entry(event.instrument).or_insert(0) += 1;
            velocity_sum += event.velocity;
            confidence_sum += event.confidence;
        }

        let n = events.len() as f64;
        let first = events.first().map(|e| e.timestamp).unwrap_or(0.0);
        let last = events.last().map(|e| e.timestamp).unwrap_or(0.0);

        EventStatistics {
            total_events: events.len(),
            events_per_instrument: per_instrument,
            mean_velocity: velocity_sum / n,
            mean_confidence: confidence_sum / n,
            span_seconds: last - first,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(instrument: DrumInstrument, timestamp: f64, velocity: f64) -> DrumEvent {
        DrumEvent {
            timestamp,
            instrument,
            velocity,
            confidence: 0.8,
            frequency_hz: None,
            duration: Some(0.1),
        }
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Snare, 1.0, 0.5),
            event(DrumInstrument::Kick, 0.5, 0.5),
        ];
        let processed = processor.process(events);
        assert_eq!(processed[0].instrument, DrumInstrument::Kick);
        assert_eq!(processed[1].instrument, DrumInstrument::Snare);
    }

    #[test]
    fn test_drops_low_velocity() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Kick, 0.0, 0.05),
            event(DrumInstrument::Kick, 1.0, 0.5),
        ];
        let processed = processor.process(events);
        assert_eq!(processed.len(), 1);
        assert!((processed[0].timestamp - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_removes_duplicates() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Kick, 0.500, 0.5),
            event(DrumInstrument::Kick, 0.510, 0.52),
        ];
        let processed = processor.process(events);
        assert_eq!(processed.len(), 1);
        assert!((processed[0].timestamp - 0.500).abs() < 1e-9);
    }

    #[test]
    fn test_keeps_close_hits_of_different_instruments() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Kick, 0.500, 0.5),
            event(DrumInstrument::HiHat, 0.505, 0.5),
        ];
        assert_eq!(processor.process(events).len(), 2);
    }

    #[test]
    fn test_keeps_close_hits_with_different_velocity() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Snare, 0.500, 0.3),
            event(DrumInstrument::Snare, 0.510, 0.9),
        ];
        assert_eq!(processor.process(events).len(), 2);
    }

    #[test]
    fn test_smooths_rapid_same_instrument_hits() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Snare, 0.50, 0.4),
            event(DrumInstrument::Snare, 0.55, 0.8),
        ];
        let processed = processor.process(events);
        assert_eq!(processed.len(), 2);
        assert!((processed[0].velocity - 0.6).abs() < 1e-9);
        assert!((processed[1].velocity - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_statistics() {
        let processor = EventPostProcessor::new(0.1);
        let events = vec![
            event(DrumInstrument::Kick, 0.0, 0.4),
            event(DrumInstrument::Kick, 1.0, 0.6),
            event(DrumInstrument::Snare, 2.0, 0.8),
        ];
        let stats = processor.statistics(&events);
        assert_eq!(stats.total_events, 3);
        assert_eq!(stats.events_per_instrument[&DrumInstrument::Kick], 2);
        assert!((stats.mean_velocity - 0.6).abs() < 1e-9);
        assert!((stats.span_seconds - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stream() {
        let processor = EventPostProcessor::new(0.1);
        assert!(processor.process(Vec::new()).is_empty());
        assert_eq!(processor.statistics(&[]).total_events, 0);
    }
}
