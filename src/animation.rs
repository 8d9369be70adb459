//! Keyed, wall-clock driven tweening.
//!
//! Animations are measured against [`Instant`]s rather than frame counts, so a tween
//! takes its full duration regardless of how often frames are drawn. Ids are plain
//! strings; callers namespace them per concern (`discover:<id>`, `trail`, ...).

use crate::Coordinates;
use crate::colors::Rgb;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Monotonic and wall-clock time sampled once per frame.
///
/// Tweens run on `now`; snapshot timestamps (unix milliseconds) compare against
/// `unix_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameClock {
    pub now: Instant,
    pub unix_ms: u64,
}

impl FrameClock {
    pub fn now() -> Self {
        let unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self {
            now: Instant::now(),
            unix_ms,
        }
    }

    pub fn at(now: Instant, unix_ms: u64) -> Self {
        Self { now, unix_ms }
    }

    /// The same wall/monotonic pair shifted forward by `elapsed`.
    pub fn advanced(self, elapsed: Duration) -> Self {
        Self {
            now: self.now + elapsed,
            unix_ms: self.unix_ms + elapsed.as_millis() as u64,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Easing {
    Linear,
    InQuad,
    OutQuad,
    InOutQuad,
    InCubic,
    #[default]
    OutCubic,
    InOutCubic,
}

impl Easing {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::InQuad => t * t,
            Self::OutQuad => 1.0 - (1.0 - t) * (1.0 - t),
            Self::InOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(2) / 2.0)
                }
            }
            Self::InCubic => t * t * t,
            Self::OutCubic => 1.0 - (1.0 - t).powi(3),
            Self::InOutCubic => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - ((-2.0 * t + 2.0).powi(3) / 2.0)
                }
            }
        }
    }
}

/// A value an animation can tween between.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimValue {
    Scalar(f64),
    Point(Coordinates),
    Color(Rgb),
}

impl AnimValue {
    /// Interpolates towards `to`. Mismatched kinds snap to `to`.
    pub fn lerp(self, to: AnimValue, t: f64) -> AnimValue {
        match (self, to) {
            (Self::Scalar(a), Self::Scalar(b)) => Self::Scalar(a + (b - a) * t),
            (Self::Point(a), Self::Point(b)) => {
                Self::Point(Coordinates::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t))
            }
            (Self::Color(a), Self::Color(b)) => Self::Color(a.lerp(b, t)),
            _ => to,
        }
    }

    pub fn as_scalar(self) -> Option<f64> {
        match self {
            Self::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
struct Animation {
    start: Instant,
    duration: Duration,
    from: Option<AnimValue>,
    to: Option<AnimValue>,
    easing: Easing,
}

impl Animation {
    fn raw_progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.start);
        (elapsed.as_secs_f64() / self.duration.as_secs_f64()).min(1.0)
    }
}

/// Registry of running animations keyed by id.
#[derive(Debug, Default)]
pub struct AnimationManager {
    animations: HashMap<String, Animation>,
}

impl AnimationManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) the animation under `id` now.
    pub fn start(
        &mut self,
        id: impl Into<String>,
        duration: Duration,
        from: Option<AnimValue>,
        to: Option<AnimValue>,
        easing: Easing,
    ) {
        self.start_at(id, Instant::now(), duration, from, to, easing);
    }

    /// Starts the animation under `id` at an explicit instant, replacing any prior one.
    pub fn start_at(
        &mut self,
        id: impl Into<String>,
        start: Instant,
        duration: Duration,
        from: Option<AnimValue>,
        to: Option<AnimValue>,
        easing: Easing,
    ) {
        self.animations.insert(
            id.into(),
            Animation {
                start,
                duration,
                from,
                to,
                easing,
            },
        );
    }

    pub fn progress(&mut self, id: &str) -> f64 {
        self.progress_at(id, Instant::now())
    }

    /// Eased progress in `[0, 1]`. Unknown ids read as complete.
    ///
    /// The entry is removed the first time it reports `1`.
    pub fn progress_at(&mut self, id: &str, now: Instant) -> f64 {
        let Some(anim) = self.animations.get(id) else {
            return 1.0;
        };
        let raw = anim.raw_progress(now);
        if raw >= 1.0 {
            self.animations.remove(id);
            return 1.0;
        }
        anim.easing.apply(raw)
    }

    pub fn value(&mut self, id: &str) -> Option<AnimValue> {
        self.value_at(id, Instant::now())
    }

    /// Current interpolated value; `to` unchanged when either endpoint is missing.
    pub fn value_at(&mut self, id: &str, now: Instant) -> Option<AnimValue> {
        let (from, to) = {
            let anim = self.animations.get(id)?;
            (anim.from, anim.to)
        };
        let t = self.progress_at(id, now);
        match (from, to) {
            (Some(from), Some(to)) => Some(from.lerp(to, t)),
            _ => to,
        }
    }

    pub fn is_animating(&self, id: &str) -> bool {
        self.is_animating_at(id, Instant::now())
    }

    /// Whether `id` is registered and has not yet run its full duration.
    pub fn is_animating_at(&self, id: &str, now: Instant) -> bool {
        self.animations
            .get(id)
            .is_some_and(|anim| anim.raw_progress(now) < 1.0)
    }

    /// Whether any animation whose id starts with `prefix` is still running.
    pub fn any_running_at(&self, prefix: &str, now: Instant) -> bool {
        self.animations
            .iter()
            .any(|(id, anim)| id.starts_with(prefix) && anim.raw_progress(now) < 1.0)
    }

    pub fn remove(&mut self, id: &str) {
        self.animations.remove(id);
    }

    /// Drops entries whose id is rejected by `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.animations.retain(|id, _| keep(id));
    }

    pub fn clear(&mut self) {
        self.animations.clear();
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 7] = [
        Easing::Linear,
        Easing::InQuad,
        Easing::OutQuad,
        Easing::InOutQuad,
        Easing::InCubic,
        Easing::OutCubic,
        Easing::InOutCubic,
    ];

    #[test]
    fn easing_endpoints_are_stable() {
        for ease in ALL {
            assert_eq!(ease.apply(0.0), 0.0);
            assert_eq!(ease.apply(1.0), 1.0);
        }
    }

    #[test]
    fn unknown_id_is_complete() {
        let mut anims = AnimationManager::new();
        assert_eq!(anims.progress("never-started"), 1.0);
        assert!(!anims.is_animating("never-started"));
        assert_eq!(anims.value("never-started"), None);
    }

    #[test]
    fn progress_is_monotonic_and_consumed_once() {
        let mut anims = AnimationManager::new();
        let t0 = Instant::now();
        anims.start_at("fade", t0, Duration::from_millis(1000), None, None, Easing::OutCubic);

        let mut last = 0.0;
        for ms in (0..1000).step_by(50) {
            let p = anims.progress_at("fade", t0 + Duration::from_millis(ms));
            assert!(p >= last, "progress went backwards at {ms}ms");
            assert!(p < 1.0);
            last = p;
        }
        assert!(anims.is_animating_at("fade", t0 + Duration::from_millis(999)));

        assert_eq!(anims.progress_at("fade", t0 + Duration::from_millis(1000)), 1.0);
        assert!(anims.is_empty());
        assert_eq!(anims.progress_at("fade", t0 + Duration::from_millis(1500)), 1.0);
    }

    #[test]
    fn restart_overwrites_previous() {
        let mut anims = AnimationManager::new();
        let t0 = Instant::now();
        anims.start_at("a", t0, Duration::from_millis(100), None, None, Easing::Linear);
        let later = t0 + Duration::from_millis(90);
        anims.start_at("a", later, Duration::from_millis(100), None, None, Easing::Linear);
        assert_eq!(anims.len(), 1);
        let p = anims.progress_at("a", later + Duration::from_millis(50));
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn values_interpolate_by_kind() {
        let mut anims = AnimationManager::new();
        let t0 = Instant::now();
        let half = t0 + Duration::from_millis(50);
        let d = Duration::from_millis(100);

        anims.start_at(
            "scalar",
            t0,
            d,
            Some(AnimValue::Scalar(10.0)),
            Some(AnimValue::Scalar(20.0)),
            Easing::Linear,
        );
        anims.start_at(
            "point",
            t0,
            d,
            Some(AnimValue::Point(Coordinates::new(0.0, 0.0))),
            Some(AnimValue::Point(Coordinates::new(10.0, -10.0))),
            Easing::Linear,
        );
        anims.start_at(
            "color",
            t0,
            d,
            Some(AnimValue::Color(Rgb::new(0, 0, 0))),
            Some(AnimValue::Color(Rgb::new(200, 100, 50))),
            Easing::Linear,
        );

        assert_eq!(anims.value_at("scalar", half), Some(AnimValue::Scalar(15.0)));
        assert_eq!(
            anims.value_at("point", half),
            Some(AnimValue::Point(Coordinates::new(5.0, -5.0)))
        );
        assert_eq!(
            anims.value_at("color", half),
            Some(AnimValue::Color(Rgb::new(100, 50, 25)))
        );
    }

    #[test]
    fn missing_from_is_a_static_set() {
        let mut anims = AnimationManager::new();
        let t0 = Instant::now();
        anims.start_at(
            "set",
            t0,
            Duration::from_millis(100),
            None,
            Some(AnimValue::Scalar(3.0)),
            Easing::Linear,
        );
        assert_eq!(
            anims.value_at("set", t0 + Duration::from_millis(10)),
            Some(AnimValue::Scalar(3.0))
        );
    }

    #[test]
    fn prefix_queries_and_retain() {
        let mut anims = AnimationManager::new();
        let t0 = Instant::now();
        let d = Duration::from_millis(100);
        anims.start_at("discover:a", t0, d, None, None, Easing::Linear);
        anims.start_at("trail", t0, d, None, None, Easing::Linear);
        assert!(anims.any_running_at("discover:", t0));
        anims.retain(|id| id != "discover:a");
        assert!(!anims.any_running_at("discover:", t0));
        assert_eq!(anims.len(), 1);
    }
}
