//! Turn announcement scheduling.
//!
//! Decides when a maneuver should be spoken: each route step announces at
//! most once, and only when the live distance to the maneuver crosses one of
//! the configured thresholds. Text generation is pure formatting; actual
//! playback goes through [`crate::sinks::SpeechSink`].

use tracing::debug;

/// Default announcement thresholds in meters, checked in this order.
pub const DEFAULT_THRESHOLDS_M: [f64; 4] = [500.0, 200.0, 100.0, 50.0];

/// Default tolerance around a threshold, in meters.
pub const DEFAULT_TOLERANCE_M: f64 = 10.0;

/// Turn sign of a maneuver, using the routing provider's integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManeuverSign {
    UTurn,
    SharpLeft,
    Left,
    SlightLeft,
    Continue,
    SlightRight,
    Right,
    SharpRight,
    Roundabout,
    Arrive,
}

impl ManeuverSign {
    /// Decode a provider sign code. Unknown codes map to `Continue`.
    pub fn from_code(code: i32) -> Self {
        match code {
            -98 | -8 => Self::UTurn,
            -3 => Self::SharpLeft,
            -2 => Self::Left,
            -1 => Self::SlightLeft,
            0 => Self::Continue,
            1 => Self::SlightRight,
            2 => Self::Right,
            3 => Self::SharpRight,
            6 => Self::Roundabout,
            4 | 5 => Self::Arrive,
            _ => Self::Continue,
        }
    }

    /// The spoken instruction fragment for this sign.
    fn phrase(&self) -> &'static str {
        match self {
            Self::UTurn => "make a U-turn",
            Self::SharpLeft => "turn sharp left",
            Self::Left => "turn left",
            Self::SlightLeft => "keep slightly left",
            Self::Continue => "continue straight",
            Self::SlightRight => "keep slightly right",
            Self::Right => "turn right",
            Self::SharpRight => "turn sharp right",
            Self::Roundabout => "enter the roundabout",
            Self::Arrive => "arrive at your destination",
        }
    }
}

impl std::fmt::Display for ManeuverSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phrase())
    }
}

/// A scheduled announcement, ready for the speech sink.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnouncementEvent {
    pub sign: ManeuverSign,
    pub street_name: String,
    pub distance_m: f64,
    pub step_index: usize,
}

/// Announcement tunables.
#[derive(Debug, Clone)]
pub struct AnnouncementConfig {
    /// Distances at which a step announces, checked in order.
    pub thresholds_m: Vec<f64>,

    /// Half-width of the window around each threshold.
    pub tolerance_m: f64,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            thresholds_m: DEFAULT_THRESHOLDS_M.to_vec(),
            tolerance_m: DEFAULT_TOLERANCE_M,
        }
    }
}

/// Decides whether the approaching maneuver should be announced.
///
/// Keeps the last announced step index so the same step is never spoken
/// twice, even when consecutive samples sit inside the same threshold
/// window.
#[derive(Debug)]
pub struct AnnouncementScheduler {
    config: AnnouncementConfig,
    last_announced_step: Option<usize>,
}

impl AnnouncementScheduler {
    pub fn new(config: AnnouncementConfig) -> Self {
        Self {
            config,
            last_announced_step: None,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(AnnouncementConfig::default())
    }

    /// True when `step_index` has not announced yet and `distance_m` lies
    /// within tolerance of one of the thresholds. A true result records the
    /// step, so repeating the call for the same step returns false.
    pub fn should_announce(&mut self, distance_m: f64, step_index: usize) -> bool {
        if self.last_announced_step == Some(step_index) {
            return false;
        }

        match self.matched_threshold(distance_m) {
            Some(threshold) => {
                self.last_announced_step = Some(step_index);
                debug!(
                    step_index,
                    distance_m = format!("{distance_m:.0}"),
                    threshold,
                    "Turn announcement scheduled"
                );
                true
            }
            None => false,
        }
    }

    /// The first configured threshold within tolerance of `distance_m`.
    pub fn matched_threshold(&self, distance_m: f64) -> Option<f64> {
        self.config
            .thresholds_m
            .iter()
            .copied()
            .find(|threshold| (distance_m - threshold).abs() <= self.config.tolerance_m)
    }

    /// Forget the last spoken step.
    ///
    /// Must be called whenever the route is replaced (an accepted reroute),
    /// so the next step of the new route can announce again.
    pub fn reset_last_spoken_step(&mut self) {
        self.last_announced_step = None;
    }

    /// The last announced step, if any.
    pub fn last_announced_step(&self) -> Option<usize> {
        self.last_announced_step
    }
}

/// Render the spoken text for a maneuver at a distance bucket.
///
/// Pure formatting, no I/O: playback belongs to the speech sink.
pub fn announcement_text(sign: ManeuverSign, distance_bucket_m: u32, street_name: &str) -> String {
    let action = if street_name.is_empty() {
        sign.phrase().to_string()
    } else {
        match sign {
            ManeuverSign::Arrive => format!("{} on {street_name}", sign.phrase()),
            _ => format!("{} onto {street_name}", sign.phrase()),
        }
    };

    if distance_bucket_m == 0 {
        format!("Now {action}")
    } else {
        format!("In {distance_bucket_m} meters, {action}")
    }
}
