//! Timing profiles: each pattern expands into a list of lamp commands, each
//! followed by a hold before the next one is due.

use std::time::Duration;

use lamp::{LampCommand, LampState, MIN_BRIGHTNESS};
use smallvec::SmallVec;

use super::{EffectDecision, Pattern};
use crate::config::resolve::GradualDim;

pub const BLINK_SINGLE_HOLD: Duration = Duration::from_millis(300);
pub const BLINK_DOUBLE_FAST_HOLD: Duration = Duration::from_millis(150);
pub const BLINK_TRIPLE_FAST_HOLD: Duration = Duration::from_millis(120);
pub const PULSE_STEP_HOLD: Duration = Duration::from_millis(60);
pub const PULSE_RAMP_STEPS: u32 = 5;
pub const DIM_STEPS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternStep {
    pub command: LampCommand,
    pub hold: Duration,
}

impl PatternStep {
    fn new(command: LampCommand, hold: Duration) -> Self {
        Self { command, hold }
    }
}

pub type Steps = SmallVec<[PatternStep; 8]>;

/// Expand a decision. `dim` only affects solid patterns.
pub fn steps_for(decision: &EffectDecision, dim: Option<&GradualDim>) -> Steps {
    let state = decision.state();
    match decision.pattern {
        Pattern::Solid => match dim {
            Some(dim) if dim.enabled => gradual_dim(state, dim.duration),
            _ => SmallVec::from_elem(PatternStep::new(LampCommand::Apply(state), Duration::ZERO), 1),
        },
        Pattern::BlinkSingle => blink(state, 1, BLINK_SINGLE_HOLD),
        Pattern::BlinkDoubleFast => blink(state, 2, BLINK_DOUBLE_FAST_HOLD),
        Pattern::BlinkTripleFast => blink(state, 3, BLINK_TRIPLE_FAST_HOLD),
        Pattern::Pulse(count) => pulse(state, count),
        Pattern::FlashOnce(duration) => {
            SmallVec::from_elem(PatternStep::new(LampCommand::Apply(state), duration), 1)
        }
    }
}

/// On, then `offs` off/on pairs using the power switch. Ends lit.
fn blink(state: LampState, offs: usize, hold: Duration) -> Steps {
    let mut steps = Steps::new();
    steps.push(PatternStep::new(LampCommand::Apply(state), hold));
    for i in 0..offs {
        let last = i + 1 == offs;
        steps.push(PatternStep::new(LampCommand::SetPower(false), hold));
        steps.push(PatternStep::new(
            LampCommand::SetPower(true),
            if last { Duration::ZERO } else { hold },
        ));
    }
    steps
}

/// Ramps bottom out at the lowest brightness the devices accept.
fn pulse(state: LampState, count: u8) -> Steps {
    let level = |k: u32| {
        ((u32::from(state.brightness) * k / PULSE_RAMP_STEPS) as u8).max(MIN_BRIGHTNESS)
    };

    let mut steps = Steps::new();
    steps.push(PatternStep::new(LampCommand::SetBrightness(MIN_BRIGHTNESS), Duration::ZERO));
    steps.push(PatternStep::new(LampCommand::SetColor(state.color), Duration::ZERO));
    for _ in 0..count {
        for k in 1..=PULSE_RAMP_STEPS {
            steps.push(PatternStep::new(LampCommand::SetBrightness(level(k)), PULSE_STEP_HOLD));
        }
        for k in (0..PULSE_RAMP_STEPS).rev() {
            steps.push(PatternStep::new(LampCommand::SetBrightness(level(k)), PULSE_STEP_HOLD));
        }
    }
    steps
}

/// Full brightness first, then down to the target in even steps.
fn gradual_dim(state: LampState, duration: Duration) -> Steps {
    if state.brightness >= 100 || duration.is_zero() {
        return SmallVec::from_elem(PatternStep::new(LampCommand::Apply(state), Duration::ZERO), 1);
    }
    let hold = duration / DIM_STEPS;
    let span = 100 - u32::from(state.brightness);

    let mut steps = Steps::new();
    steps.push(PatternStep::new(
        LampCommand::Apply(LampState::new(state.color, 100)),
        hold,
    ));
    for k in 1..=DIM_STEPS {
        let level = (100 - span * k / DIM_STEPS) as u8;
        let hold = if k == DIM_STEPS { Duration::ZERO } else { hold };
        steps.push(PatternStep::new(LampCommand::SetBrightness(level), hold));
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::EffectKind;
    use lamp::Rgb;

    const RED: Rgb = Rgb::new(255, 0, 0);

    fn decision(pattern: Pattern, brightness: u8) -> EffectDecision {
        EffectDecision::new(EffectKind::Check, LampState::new(RED, brightness), pattern)
    }

    fn total_duration(steps: &[PatternStep]) -> Duration {
        steps.iter().map(|s| s.hold).sum()
    }

    fn commands(steps: &[PatternStep]) -> Vec<LampCommand> {
        steps.iter().map(|s| s.command).collect()
    }

    #[test]
    fn test_solid_is_one_apply() {
        let steps = steps_for(&decision(Pattern::Solid, 40), None);
        assert_eq!(commands(&steps), vec![LampCommand::Apply(LampState::new(RED, 40))]);
    }

    #[test]
    fn test_blink_shapes() {
        let on = LampCommand::SetPower(true);
        let off = LampCommand::SetPower(false);
        let first = LampCommand::Apply(LampState::new(RED, 80));

        let single = steps_for(&decision(Pattern::BlinkSingle, 80), None);
        assert_eq!(commands(&single), vec![first, off, on]);
        assert_eq!(total_duration(&single), Duration::from_millis(600));

        let double = steps_for(&decision(Pattern::BlinkDoubleFast, 80), None);
        assert_eq!(commands(&double), vec![first, off, on, off, on]);
        assert!(double[..4].iter().all(|s| s.hold == BLINK_DOUBLE_FAST_HOLD));

        let triple = steps_for(&decision(Pattern::BlinkTripleFast, 80), None);
        assert_eq!(commands(&triple), vec![first, off, on, off, on, off, on]);
        assert_eq!(total_duration(&triple), Duration::from_millis(720));
    }

    #[test]
    fn test_pulse_ramps() {
        let steps = steps_for(&decision(Pattern::Pulse(2), 100), None);
        assert_eq!(steps.len(), 2 + 2 * 10);
        let levels: Vec<_> = steps[2..12]
            .iter()
            .map(|s| match s.command {
                LampCommand::SetBrightness(b) => b,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(levels, vec![20, 40, 60, 80, 100, 80, 60, 40, 20, 1]);
    }

    #[test]
    fn test_no_step_sends_zero_brightness() {
        let patterns = [
            Pattern::BlinkSingle,
            Pattern::BlinkDoubleFast,
            Pattern::BlinkTripleFast,
            Pattern::Pulse(3),
        ];
        for pattern in patterns {
            for brightness in [3, 40, 100] {
                let steps = steps_for(&decision(pattern, brightness), None);
                assert!(
                    !commands(&steps).contains(&LampCommand::SetBrightness(0)),
                    "{pattern} at {brightness}"
                );
            }
        }
    }

    #[test]
    fn test_flash_holds_for_duration() {
        let d = Duration::from_millis(400);
        let steps = steps_for(&decision(Pattern::FlashOnce(d), 100), None);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].hold, d);
    }

    #[test]
    fn test_gradual_dim_steps_down() {
        let dim = GradualDim {
            enabled: true,
            duration: Duration::from_millis(1000),
        };
        let steps = steps_for(&decision(Pattern::Solid, 40), Some(&dim));
        assert_eq!(
            commands(&steps),
            vec![
                LampCommand::Apply(LampState::new(RED, 100)),
                LampCommand::SetBrightness(88),
                LampCommand::SetBrightness(76),
                LampCommand::SetBrightness(64),
                LampCommand::SetBrightness(52),
                LampCommand::SetBrightness(40),
            ]
        );
        assert_eq!(total_duration(&steps), Duration::from_millis(1000));
    }

    #[test]
    fn test_dim_ignored_for_blinks_and_full_brightness() {
        let dim = GradualDim {
            enabled: true,
            duration: Duration::from_millis(1000),
        };
        assert_eq!(steps_for(&decision(Pattern::Solid, 100), Some(&dim)).len(), 1);
        assert_eq!(
            steps_for(&decision(Pattern::BlinkSingle, 40), Some(&dim)).len(),
            3
        );
    }
}
