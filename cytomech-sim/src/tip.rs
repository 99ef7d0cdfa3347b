//! Two-state dynamic instability of a fiber end.
//!
//! The classical model: a growing state whose speed is reduced
//! exponentially by antagonistic load, stochastic catastrophes whose rate
//! increases when growth slows down, a shrinking state at constant speed,
//! and stochastic rescues. All laws are pure functions of the force and the
//! class parameters; the stochastic switching consumes the world generator.

/// Assembly state of a fiber end.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum TipState {
    /// end does not assemble or disassemble
    #[default]
    Static,
    Growing,
    Shrinking,
}

impl TipState {
    pub fn to_byte(self) -> u8 {
        match self {
            TipState::Static => 0,
            TipState::Growing => 1,
            TipState::Shrinking => 2,
        }
    }

    pub fn from_byte(b: u8) -> Option<TipState> {
        match b {
            0 => Some(TipState::Static),
            1 => Some(TipState::Growing),
            2 => Some(TipState::Shrinking),
            _ => None,
        }
    }
}

/// Growth speed under load: `v₀·exp(f/f₀)` for antagonistic force
/// (`f < 0`), unchanged otherwise.
pub fn growth_speed(v0: f64, force: f64, force_scale: f64) -> f64 {
    if force < 0.0 && force_scale.is_finite() && force_scale > 0.0 {
        return v0 * (force / force_scale).exp();
    }
    v0
}

/// Catastrophe rate coupled to the growth speed: stalled tips catastrophe
/// more often, with the rate inversely proportional to the speed ratio.
pub fn catastrophe_rate(base: f64, speed: f64, unloaded_speed: f64) -> f64 {
    if unloaded_speed > 0.0 {
        let ratio = (speed / unloaded_speed).max(0.05);
        return base / ratio;
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_slows_under_load_only() {
        assert!((growth_speed(1.0, 0.0, 1.67) - 1.0).abs() < 1e-12);
        assert!((growth_speed(1.0, 2.0, 1.67) - 1.0).abs() < 1e-12);
        let v = growth_speed(1.0, -1.67, 1.67);
        assert!((v - (-1.0_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn stalling_raises_catastrophes() {
        let base = 0.01;
        assert!((catastrophe_rate(base, 1.0, 1.0) - base).abs() < 1e-15);
        assert!(catastrophe_rate(base, 0.25, 1.0) > 3.0 * base);
        // the rate saturates when the tip is fully stalled
        assert!(catastrophe_rate(base, 0.0, 1.0).is_finite());
    }

    #[test]
    fn tip_state_bytes_round_trip() {
        for s in [TipState::Static, TipState::Growing, TipState::Shrinking] {
            assert_eq!(TipState::from_byte(s.to_byte()), Some(s));
        }
        assert_eq!(TipState::from_byte(7), None);
    }
}
