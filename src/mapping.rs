//! Strategies that turn pose samples into mouse reports.

use crate::types::{InputReport, PoseSample};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

/// Axis limit declared by the report descriptor.
pub const AXIS_MAX: i8 = 127;

/// Produces the next report for the stream. `sample` is `Some` only when the
/// tracker delivered a fresh frame this tick.
pub trait ReportMapper {
    fn next_report(&mut self, sample: Option<&PoseSample>) -> InputReport;

    fn name(&self) -> &'static str;
}

/// Clamp a scaled value into the descriptor's axis range.
pub fn clamp_axis(value: f32) -> i8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(-(AXIS_MAX as f32), AXIS_MAX as f32) as i8
}

/// Difference `to - from` in degrees, wrapped into (-180, 180].
pub fn angle_delta(from: f32, to: f32) -> f32 {
    let mut d = (to - from) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d <= -180.0 {
        d += 360.0;
    }
    d
}

/// No motion, no buttons.
#[derive(Debug, Default, Clone, Copy)]
pub struct Idle;

impl ReportMapper for Idle {
    fn next_report(&mut self, _sample: Option<&PoseSample>) -> InputReport {
        InputReport::idle()
    }

    fn name(&self) -> &'static str {
        "idle"
    }
}

/// Random relative motion on both axes, ignoring the tracker.
pub struct RandomJitter<R: Rng = StdRng> {
    rng: R,
}

impl RandomJitter<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomJitter<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> ReportMapper for RandomJitter<R> {
    fn next_report(&mut self, _sample: Option<&PoseSample>) -> InputReport {
        InputReport {
            dx: self.rng.gen_range(-AXIS_MAX..=AXIS_MAX),
            dy: self.rng.gen_range(-AXIS_MAX..=AXIS_MAX),
            ..InputReport::idle()
        }
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Moves the pointer by the change in heading (X) and pitch (Y) between
/// consecutive fresh frames, scaled by `gain` counts per degree.
///
/// Looking up (pitch increasing) moves the pointer up, i.e. negative Y.
#[derive(Debug, Clone)]
pub struct HeadingRate {
    gain: f32,
    last: Option<PoseSample>,
}

impl HeadingRate {
    pub fn new(gain: f32) -> Self {
        Self { gain, last: None }
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl ReportMapper for HeadingRate {
    fn next_report(&mut self, sample: Option<&PoseSample>) -> InputReport {
        let Some(sample) = sample else {
            return InputReport::idle();
        };
        let report = match &self.last {
            Some(prev) => InputReport {
                dx: clamp_axis(angle_delta(prev.heading, sample.heading) * self.gain),
                dy: clamp_axis(-angle_delta(prev.pitch, sample.pitch) * self.gain),
                ..InputReport::idle()
            },
            None => InputReport::idle(),
        };
        self.last = Some(*sample);
        report
    }

    fn name(&self) -> &'static str {
        "heading"
    }
}

/// Mapper selection, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperKind {
    Random,
    Heading,
    Idle,
}

impl MapperKind {
    pub fn build(self, heading_gain: f32) -> Box<dyn ReportMapper> {
        match self {
            MapperKind::Random => Box::new(RandomJitter::new()),
            MapperKind::Heading => Box::new(HeadingRate::new(heading_gain)),
            MapperKind::Idle => Box::new(Idle),
        }
    }
}

impl FromStr for MapperKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random" => Ok(MapperKind::Random),
            "heading" => Ok(MapperKind::Heading),
            "idle" => Ok(MapperKind::Idle),
            other => Err(format!("unknown mapper '{}' (supported: random|heading|idle)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(heading: f32, pitch: f32, frame: u32) -> PoseSample {
        PoseSample {
            heading,
            pitch,
            frame_counter: frame,
            ..Default::default()
        }
    }

    #[test]
    fn test_clamp_axis() {
        assert_eq!(clamp_axis(3.4), 3);
        assert_eq!(clamp_axis(-500.0), -127);
        assert_eq!(clamp_axis(500.0), 127);
        assert_eq!(clamp_axis(f32::NAN), 0);
    }

    #[test]
    fn test_angle_delta_wraps() {
        assert_eq!(angle_delta(170.0, -170.0), 20.0);
        assert_eq!(angle_delta(-170.0, 170.0), -20.0);
        assert_eq!(angle_delta(10.0, 15.0), 5.0);
    }

    #[test]
    fn test_heading_rate_first_frame_is_idle() {
        let mut m = HeadingRate::new(4.0);
        assert_eq!(m.next_report(Some(&pose(10.0, 0.0, 1))), InputReport::idle());
    }

    #[test]
    fn test_heading_rate_scales_deltas() {
        let mut m = HeadingRate::new(4.0);
        m.next_report(Some(&pose(10.0, 5.0, 1)));
        let r = m.next_report(Some(&pose(12.0, 6.0, 2)));
        assert_eq!(r.dx, 8);
        assert_eq!(r.dy, -4);
        assert!(r.buttons.is_empty());
    }

    #[test]
    fn test_heading_rate_clamps() {
        let mut m = HeadingRate::new(100.0);
        m.next_report(Some(&pose(0.0, 0.0, 1)));
        let r = m.next_report(Some(&pose(30.0, -30.0, 2)));
        assert_eq!((r.dx, r.dy), (127, 127));
    }

    #[test]
    fn test_heading_rate_idle_without_fresh_frame() {
        let mut m = HeadingRate::new(4.0);
        m.next_report(Some(&pose(0.0, 0.0, 1)));
        assert_eq!(m.next_report(None), InputReport::idle());
        // The reference frame survives the gap.
        assert_eq!(m.next_report(Some(&pose(1.0, 0.0, 2))).dx, 4);
    }

    #[test]
    fn test_random_jitter_stays_in_axis_range() {
        let mut m = RandomJitter::seeded(7);
        for _ in 0..1000 {
            let r = m.next_report(None);
            assert!(r.dx >= -AXIS_MAX && r.dy >= -AXIS_MAX);
            assert!(r.buttons.is_empty());
        }
    }

    #[test]
    fn test_mapper_kind_parse() {
        assert_eq!("Heading".parse::<MapperKind>(), Ok(MapperKind::Heading));
        assert_eq!(" idle ".parse::<MapperKind>(), Ok(MapperKind::Idle));
        assert!("spiral".parse::<MapperKind>().is_err());
        assert_eq!(MapperKind::Random.build(1.0).name(), "random");
    }
}
