//! # Smoothed Control Values
//!
//! Every control the host can change (delay time, feedback, mix, pan
//! position, damp amount, active line count) reaches the signal chain
//! through a linear ramp. A knob jump becomes a short glide that the
//! audio thread advances one step per sample.
//!
//! This is a thin wrapper over nih-plug's [`Smoother`]. The wrapper adds
//! two things the engine relies on:
//!
//! - It remembers the sample rate, so setters don't need it.
//! - Re-sending the *same* target is a no-op. The engine re-derives its
//!   targets once per block, and restarting an in-flight ramp with an
//!   unchanged target would stretch it out indefinitely.

use nih_plug::prelude::{Smoother, SmoothingStyle};

pub struct SmoothedValue {
    smoother: Smoother<f32>,
    target: f32,
    current: f32,
    sample_rate: f32,
}

impl SmoothedValue {
    /// A ramp of `ramp_ms` milliseconds that starts settled at `initial`.
    pub fn new(ramp_ms: f32, initial: f32) -> Self {
        let smoother = Smoother::new(SmoothingStyle::Linear(ramp_ms.max(0.0)));
        smoother.reset(initial);
        Self {
            smoother,
            target: initial,
            current: initial,
            sample_rate: 44100.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
    }

    /// Start ramping toward `target`. Ignored when `target` equals the
    /// current target.
    pub fn set_target(&mut self, target: f32) {
        if target != self.target {
            self.target = target;
            self.smoother.set_target(self.sample_rate, target);
        }
    }

    /// Jump straight to `value` with no ramp.
    pub fn reset(&mut self, value: f32) {
        self.target = value;
        self.current = value;
        self.smoother.reset(value);
    }

    /// Advance the ramp by one sample and return the new value.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> f32 {
        self.current = self.smoother.next();
        self.current
    }

    /// The value most recently returned by [`next()`](Self::next).
    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn starts_settled_at_initial_value() {
        let mut value = SmoothedValue::new(50.0, 0.25);
        for _ in 0..10 {
            assert_abs_diff_eq!(value.next(), 0.25, epsilon = 1e-7);
        }
    }

    #[test]
    fn linear_ramp_reaches_target_in_ramp_time() {
        let mut value = SmoothedValue::new(10.0, 0.0);
        value.set_sample_rate(1000.0);
        value.set_target(1.0);

        // 10 ms at 1 kHz is 10 steps.
        let mut previous = 0.0;
        for _ in 0..9 {
            let v = value.next();
            assert!(v > previous, "ramp must rise monotonically");
            assert!(v < 1.0, "ramp finished early at {v}");
            previous = v;
        }
        assert_abs_diff_eq!(value.next(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(value.next(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn repeating_the_target_does_not_restart_the_ramp() {
        let mut value = SmoothedValue::new(10.0, 0.0);
        value.set_sample_rate(1000.0);
        value.set_target(1.0);
        for _ in 0..5 {
            value.next();
            value.set_target(1.0);
        }
        for _ in 0..5 {
            value.next();
        }
        assert_abs_diff_eq!(value.current(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn reset_jumps_without_ramp() {
        let mut value = SmoothedValue::new(100.0, 0.0);
        value.set_target(1.0);
        value.next();
        value.reset(-0.5);
        assert_abs_diff_eq!(value.next(), -0.5, epsilon = 1e-7);
        assert_abs_diff_eq!(value.target(), -0.5);
    }
}
