use serde::{Deserialize, Serialize};

use crate::{Result, SwingConfig};

/// One accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Acceleration {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Acceleration {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingHit {
    pub timestamp: f64,
    pub magnitude: f64,
}

/// Platform gate for motion sensors.
pub trait MotionPermission {
    /// Returns [`crate::RhythmError::PermissionDenied`] when access is refused.
    fn request(&self) -> Result<()>;
}

/// Threshold detector with a cooldown after every hit.
#[derive(Debug, Clone)]
pub struct SwingDetector {
    config: SwingConfig,
    cooldown_until: Option<f64>,
}

impl SwingDetector {
    pub fn new(config: SwingConfig) -> Self {
        Self {
            config,
            cooldown_until: None,
        }
    }

    /// Asks the platform for sensor access before building a detector.
    pub fn with_permission(config: SwingConfig, permission: &dyn MotionPermission) -> Result<Self> {
        if let Err(err) = permission.request() {
            tracing::warn!(%err, "motion monitoring unavailable");
            return Err(err);
        }
        Ok(Self::new(config))
    }

    /// Feeds one sample; returns a hit when the magnitude crosses the
    /// threshold outside of the cooldown period.
    pub fn process(&mut self, timestamp: f64, sample: Acceleration) -> Option<SwingHit> {
        if self
            .cooldown_until
            .is_some_and(|until| timestamp < until)
        {
            return None;
        }

        let magnitude = sample.magnitude();
        if magnitude <= self.config.magnitude_threshold {
            return None;
        }

        self.cooldown_until = Some(timestamp + self.config.cooldown);
        tracing::debug!(timestamp, magnitude, "swing detected");
        Some(SwingHit {
            timestamp,
            magnitude,
        })
    }

    pub fn reset(&mut self) {
        self.cooldown_until = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RhythmError;

    struct Denied;

    impl MotionPermission for Denied {
        fn request(&self) -> Result<()> {
            Err(RhythmError::PermissionDenied("motion sensors".into()))
        }
    }

    struct Granted;

    impl MotionPermission for Granted {
        fn request(&self) -> Result<()> {
            Ok(())
        }
    }

    fn swing(strength: f64) -> Acceleration {
        Acceleration::new(strength, 0.0, 0.0)
    }

    #[test]
    fn magnitude_is_euclidean() {
        assert_eq!(Acceleration::new(3.0, 4.0, 12.0).magnitude(), 13.0);
    }

    #[test]
    fn crossing_triggers_a_single_hit_per_cooldown() {
        let mut detector = SwingDetector::new(SwingConfig::default());

        assert!(detector.process(0.0, swing(10.0)).is_none());
        let hit = detector.process(0.1, swing(30.0)).unwrap();
        assert_eq!(hit.magnitude, 30.0);

        assert!(detector.process(0.5, swing(40.0)).is_none());
        assert!(detector.process(0.89, swing(40.0)).is_none());
        assert!(detector.process(0.95, swing(40.0)).is_some());
    }

    #[test]
    fn threshold_itself_does_not_count() {
        let mut detector = SwingDetector::new(SwingConfig::default());
        assert!(detector.process(0.0, swing(25.0)).is_none());
    }

    #[test]
    fn reset_clears_cooldown() {
        let mut detector = SwingDetector::new(SwingConfig::default());
        detector.process(0.0, swing(30.0)).unwrap();
        detector.reset();
        assert!(detector.process(0.1, swing(30.0)).is_some());
    }

    #[test]
    fn refused_permission_is_surfaced() {
        let err = SwingDetector::with_permission(SwingConfig::default(), &Denied).unwrap_err();
        assert!(matches!(err, RhythmError::PermissionDenied(_)));

        assert!(SwingDetector::with_permission(SwingConfig::default(), &Granted).is_ok());
    }
}
