// Drum classification - mapping onset features to drum instruments
//
// Rule-based scoring: each instrument starts from the energy in its
// characteristic band, then timbral heuristics (centroid, ZCR, rolloff)
// boost instruments whose signature matches the window. Confidence reflects
// how much the winner dominates the total score.

use crate::analysis::features::OnsetFeatures;

use super::{DrumEvent, DrumInstrument};

/// Heuristic score multipliers
const KICK_CENTROID_BOOST: f32 = 1.5;
const SNARE_TIMBRE_BOOST: f32 = 1.3;
const HIHAT_TIMBRE_BOOST: f32 = 1.4;
const CRASH_ROLLOFF_BOOST: f32 = 1.2;

/// Default note length assigned to percussive events, in seconds
const DEFAULT_DURATION: f64 = 0.1;

/// Classifies onset feature windows into drum events.
pub struct DrumClassifier {
    confidence_threshold: f64,
}

impl DrumClassifier {
    pub fn new(confidence_threshold: f64) -> Self {
        Self {
            confidence_threshold,
        }
    }

    /// Classify one onset window.
    ///
    /// Returns `None` when the window has no band energy at all or when the
    /// winning instrument's confidence falls below the threshold.
    pub fn classify(&self, features: &OnsetFeatures, timestamp: f64) -> Option<DrumEvent> {
        // Boosts are multiplicative, so zero band energy means zero scores
        if features.band_energies.total() <= 0.0 {
            return None;
        }

        let scores = self.score(features);
        let total: f32 = scores.iter().map(|(_, s)| s).sum();

        let (instrument, best) = scores
            .iter()
            .cloned()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))?;

        let confidence = ((2.0 * best / total) as f64).min(1.0);
        if confidence < self.confidence_threshold {
            return None;
        }

        let velocity = (10.0 * features.rms_energy as f64).min(1.0);
        let frequency_hz = match instrument {
            DrumInstrument::Kick
            | DrumInstrument::TomLow
            | DrumInstrument::TomMid
            | DrumInstrument::TomHigh => Some(features.spectral_centroid as f64),
            _ => None,
        };

        Some(DrumEvent {
            timestamp,
            instrument,
            velocity,
            confidence,
            frequency_hz,
            duration: Some(DEFAULT_DURATION),
        })
    }

    /// Per-instrument scores for a feature window.
    fn score(&self, features: &OnsetFeatures) -> [(DrumInstrument, f32); 7] {
        let bands = &features.band_energies;
        let centroid = features.spectral_centroid;
        let zcr = features.zero_crossing_rate;
        let rolloff = features.spectral_rolloff;

        let mut kick = bands.kick;
        if centroid < 200.0 {
            kick *= KICK_CENTROID_BOOST;
        }

        let mut snare = bands.snare;
        if (150.0..=400.0).contains(&centroid) && zcr > 0.1 {
            snare *= SNARE_TIMBRE_BOOST;
        }

        let mut hihat = bands.hihat;
        if centroid > 5000.0 && zcr > 0.15 {
            hihat *= HIHAT_TIMBRE_BOOST;
        }

        let mut crash = bands.crash;
        if rolloff > 8000.0 {
            crash *= CRASH_ROLLOFF_BOOST;
        }

        [
            (DrumInstrument::Kick, kick),
            (DrumInstrument::Snare, snare),
            (DrumInstrument::HiHat, hihat),
            (DrumInstrument::Crash, crash),
            (DrumInstrument::TomLow, bands.tom_low),
            (DrumInstrument::TomMid, bands.tom_mid),
            (DrumInstrument::TomHigh, bands.tom_high),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::BandEnergies;

    fn kick_features() -> OnsetFeatures {
        OnsetFeatures {
            spectral_centroid: 90.0,
            spectral_rolloff: 150.0,
            zero_crossing_rate: 0.02,
            rms_energy: 0.3,
            band_energies: BandEnergies {
                kick: 10.0,
                tom_low: 2.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn hihat_features() -> OnsetFeatures {
        OnsetFeatures {
            spectral_centroid: 9000.0,
            spectral_rolloff: 14000.0,
            zero_crossing_rate: 0.4,
            rms_energy: 0.05,
            band_energies: BandEnergies {
                hihat: 8.0,
                crash: 2.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_classifies_kick() {
        let classifier = DrumClassifier::new(0.6);
        let event = classifier.classify(&kick_features(), 1.0).unwrap();
        assert_eq!(event.instrument, DrumInstrument::Kick);
        assert!((event.timestamp - 1.0).abs() < 1e-9);
        // Kick carries its fundamental frequency
        assert!(event.frequency_hz.is_some());
        assert!((event.duration.unwrap() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_classifies_hihat_without_frequency() {
        let classifier = DrumClassifier::new(0.6);
        let event = classifier.classify(&hihat_features(), 0.5).unwrap();
        assert_eq!(event.instrument, DrumInstrument::HiHat);
        assert!(event.frequency_hz.is_none());
    }

    #[test]
    fn test_velocity_scaling_and_cap() {
        let classifier = DrumClassifier::new(0.6);
        let quiet = classifier.classify(&hihat_features(), 0.0).unwrap();
        assert!((quiet.velocity - 0.5).abs() < 1e-6);

        let mut loud_features = kick_features();
        loud_features.rms_energy = 0.5;
        let loud = classifier.classify(&loud_features, 0.0).unwrap();
        assert!((loud.velocity - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_silent_window_yields_nothing() {
        let classifier = DrumClassifier::new(0.6);
        let features = OnsetFeatures::default();
        assert!(classifier.classify(&features, 0.0).is_none());
    }

    #[test]
    fn test_ambiguous_window_below_threshold() {
        let classifier = DrumClassifier::new(0.6);
        // Energy spread evenly over many bands: winner never dominates
        let features = OnsetFeatures {
            spectral_centroid: 2000.0,
            band_energies: BandEnergies {
                kick: 1.0,
                snare: 1.0,
                hihat: 1.0,
                crash: 1.0,
                tom_low: 1.0,
                tom_mid: 1.0,
                tom_high: 1.0,
            },
            rms_energy: 0.2,
            ..Default::default()
        };
        assert!(classifier.classify(&features, 0.0).is_none());
    }

    #[test]
    fn test_confidence_capped_at_one() {
        let classifier = DrumClassifier::new(0.6);
        // Only one band has any energy, so 2 * max / total would exceed 1
        let features = OnsetFeatures {
            spectral_centroid: 90.0,
            rms_energy: 0.2,
            band_energies: BandEnergies {
                kick: 5.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let event = classifier.classify(&features, 0.0).unwrap();
        assert!((event.confidence - 1.0).abs() < 1e-9);
    }
}
