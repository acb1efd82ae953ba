//! Head-nod cycle detection from the nose vertical position

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::DmsConfig;

/// Position within one down-then-up nod
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodPhase {
    #[default]
    Rest,
    Descending,
    Ascending,
}

/// Counts complete nod cycles
///
/// Keeps a running `[min_y, max_y]` envelope of the nose position. The envelope only
/// widens between completed nods. `threshold_px` is absolute, so sensitivity drifts
/// with the driver's distance from the camera.
#[derive(Debug, Clone)]
pub struct NodCycleDetector {
    threshold_px: i32,
    reset_after: Duration,
    count_threshold: u32,
    min_y: Option<i32>,
    max_y: Option<i32>,
    phase: NodPhase,
    nod_count: u32,
    last_nod_time: Instant,
}

impl NodCycleDetector {
    pub fn new(config: &DmsConfig, now: Instant) -> Self {
        Self {
            threshold_px: config.nod_threshold_px,
            reset_after: config.nod_reset_time(),
            count_threshold: config.nod_count_thresh,
            min_y: None,
            max_y: None,
            phase: NodPhase::Rest,
            nod_count: 0,
            last_nod_time: now,
        }
    }

    /// Feed one nose position, returning the current nod count
    pub fn update(&mut self, nose_y: i32, now: Instant) -> u32 {
        // Isolated dips are forgiven; a series that reached the threshold sticks
        if self.nod_count > 0
            && self.nod_count < self.count_threshold
            && now.saturating_duration_since(self.last_nod_time) > self.reset_after
        {
            debug!("Nod series of {} expired", self.nod_count);
            self.nod_count = 0;
            self.phase = NodPhase::Rest;
        }

        let (min_y, max_y) = match (self.min_y, self.max_y) {
            (Some(lo), Some(hi)) => (lo.min(nose_y), hi.max(nose_y)),
            _ => {
                self.min_y = Some(nose_y);
                self.max_y = Some(nose_y);
                return 0;
            }
        };
        self.min_y = Some(min_y);
        self.max_y = Some(max_y);

        let lifted = nose_y < max_y.saturating_sub(self.threshold_px);
        match self.phase {
            NodPhase::Rest => {
                if nose_y > min_y.saturating_add(self.threshold_px) {
                    self.phase = NodPhase::Descending;
                }
            }
            NodPhase::Descending => {
                if lifted {
                    self.phase = NodPhase::Ascending;
                }
            }
            NodPhase::Ascending => {
                if lifted {
                    self.nod_count += 1;
                    self.last_nod_time = now;
                    self.min_y = Some(nose_y);
                    self.max_y = Some(nose_y);
                    self.phase = NodPhase::Rest;
                    debug!("Nod #{} completed", self.nod_count);
                }
            }
        }

        self.nod_count
    }

    pub fn nod_count(&self) -> u32 {
        self.nod_count
    }

    pub fn phase(&self) -> NodPhase {
        self.phase
    }

    /// Whether the nod count has reached the warning threshold
    pub fn is_nodding(&self) -> bool {
        self.nod_count >= self.count_threshold
    }

    /// Forget the envelope and the count
    pub fn reset(&mut self, now: Instant) {
        self.min_y = None;
        self.max_y = None;
        self.phase = NodPhase::Rest;
        self.nod_count = 0;
        self.last_nod_time = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FRAME: Duration = Duration::from_millis(33);

    fn detector(now: Instant) -> NodCycleDetector {
        let config = DmsConfig {
            nod_threshold_px: 20,
            nod_count_thresh: 3,
            ..Default::default()
        };
        NodCycleDetector::new(&config, now)
    }

    /// Drive one dip of `depth` pixels below `base` and back, returning the clock
    fn nod(det: &mut NodCycleDetector, base: i32, depth: i32, mut now: Instant) -> Instant {
        for y in [base + depth, base, base] {
            now += FRAME;
            det.update(y, now);
        }
        now
    }

    #[test]
    fn test_first_sample_seeds_envelope() {
        let t0 = Instant::now();
        let mut det = detector(t0);
        assert_eq!(det.update(200, t0), 0);
        assert_eq!(det.phase(), NodPhase::Rest);
    }

    #[test]
    fn test_single_cycle_counts_once() {
        let t0 = Instant::now();
        let mut det = detector(t0);
        det.update(200, t0);

        let now = nod(&mut det, 200, 40, t0);
        assert_eq!(det.nod_count(), 1);
        assert_eq!(det.phase(), NodPhase::Rest);

        // Steady head afterwards adds nothing
        det.update(200, now + FRAME);
        assert_eq!(det.nod_count(), 1);
    }

    #[test]
    fn test_shallow_dip_ignored() {
        let t0 = Instant::now();
        let mut det = detector(t0);
        det.update(200, t0);
        nod(&mut det, 200, 15, t0);
        assert_eq!(det.nod_count(), 0);
    }

    #[test]
    fn test_isolated_nod_forgiven_after_timeout() {
        let t0 = Instant::now();
        let mut det = detector(t0);
        det.update(200, t0);
        let now = nod(&mut det, 200, 40, t0);
        assert_eq!(det.nod_count(), 1);

        let later = now + Duration::from_secs(5);
        assert_eq!(det.update(200, later), 0);
    }

    #[test]
    fn test_count_at_threshold_sticks() {
        let t0 = Instant::now();
        let mut det = detector(t0);
        det.update(200, t0);
        let mut now = t0;
        for _ in 0..3 {
            now = nod(&mut det, 200, 40, now);
        }
        assert_eq!(det.nod_count(), 3);
        assert!(det.is_nodding());

        assert_eq!(det.update(200, now + Duration::from_secs(30)), 3);

        det.reset(now);
        assert_eq!(det.nod_count(), 0);
        assert_eq!(det.update(200, now), 0);
    }

    proptest! {
        #[test]
        fn prop_count_never_decreases_within_window(ys in proptest::collection::vec(100i32..400, 1..90)) {
            let t0 = Instant::now();
            let mut det = detector(t0);
            let mut last = 0;
            // 90 frames at 33ms stay inside the 4s reset window
            for (i, y) in ys.into_iter().enumerate() {
                let count = det.update(y, t0 + FRAME * i as u32);
                prop_assert!(count >= last);
                prop_assert!(count <= last + 1);
                last = count;
            }
        }
    }
}
