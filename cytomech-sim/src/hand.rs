use cytomech_datastructures::SlotKey;

/// A position on a fiber: the binding site of a motor head or anchor.
///
/// A hand is either free (`attachment` is `None`) or attached to a fiber at
/// a curvilinear abscissa. The fiber is referenced by its arena key, so a
/// hand can never dangle: if the fiber disappears the key stops resolving,
/// and the owning set detaches the hand before that can be observed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Hand {
    attachment: Option<(SlotKey, f64)>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand { attachment: None }
    }

    pub fn attached(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn fiber(&self) -> Option<SlotKey> {
        self.attachment.map(|(f, _)| f)
    }

    pub fn abscissa(&self) -> f64 {
        self.attachment.map(|(_, a)| a).unwrap_or(0.0)
    }

    pub fn attachment(&self) -> Option<(SlotKey, f64)> {
        self.attachment
    }

    /// Records an attachment; list transfers are handled by the owning set
    pub(crate) fn attach(&mut self, fiber: SlotKey, abscissa: f64) {
        debug_assert!(self.attachment.is_none());
        self.attachment = Some((fiber, abscissa));
    }

    pub(crate) fn detach(&mut self) {
        debug_assert!(self.attachment.is_some());
        self.attachment = None;
    }

    /// Moves along the fiber to the given abscissa
    pub(crate) fn move_to(&mut self, abscissa: f64) {
        if let Some((f, _)) = self.attachment {
            self.attachment = Some((f, abscissa));
        }
    }

    /// Moves to the same abscissa on a different fiber, as done when a
    /// severed piece carries the attachment away.
    pub(crate) fn relocate(&mut self, fiber: SlotKey) {
        if let Some((_, a)) = self.attachment {
            self.attachment = Some((fiber, a));
        }
    }

    /// Relocates with an abscissa shift, as done when fibers are joined
    pub(crate) fn relocate_by(&mut self, fiber: SlotKey, shift: f64) {
        if let Some((_, a)) = self.attachment {
            self.attachment = Some((fiber, a + shift));
        }
    }
}

/// Detachment rate under load (Kramers): `r₀·exp(|f|/f₀)`.
/// A zero or non-finite force scale disables the load dependence.
pub fn detachment_rate(base: f64, force: f64, force_scale: f64) -> f64 {
    if force_scale > 0.0 && force_scale.is_finite() {
        return base * (force.abs() / force_scale).exp();
    }
    base
}

/// Speed of a loaded motor: linear force-velocity relation
/// `v = v₀·max(0, 1 + f∥/f_stall)`, floored at zero so that antagonistic
/// load stalls the motor instead of reversing it; assisting load speeds
/// it up proportionally. `f_parallel` is the force component along the
/// walking direction.
pub fn motor_speed(v0: f64, f_parallel: f64, stall_force: f64) -> f64 {
    if v0 == 0.0 {
        return 0.0;
    }
    let factor = (1.0 + f_parallel / stall_force).max(0.0);
    v0 * factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_accelerates_detachment() {
        assert!((detachment_rate(1.0, 0.0, 6.0) - 1.0).abs() < 1e-12);
        assert!((detachment_rate(1.0, 6.0, 6.0) - 1.0_f64.exp()).abs() < 1e-12);
        // disabled force scale gives a constant hazard
        assert!((detachment_rate(2.0, 100.0, 0.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn motor_stalls_under_antagonistic_load() {
        let v0 = 1.0;
        assert!((motor_speed(v0, 0.0, 5.0) - 1.0).abs() < 1e-12);
        assert_eq!(motor_speed(v0, -5.0, 5.0), 0.0);
        assert!((motor_speed(v0, -2.5, 5.0) - 0.5).abs() < 1e-12);
        // assisting load accelerates the motor, with no cap
        assert!((motor_speed(v0, 50.0, 5.0) - 11.0).abs() < 1e-12);
        assert_eq!(motor_speed(0.0, -5.0, 5.0), 0.0);
    }
}
