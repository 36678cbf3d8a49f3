//! Host hooks for the sensor instructions.
//!
//! `out`, `step`, `eat` and `clone` hand two register values to the host.
//! Returning `Some(v)` stores `v` into the instruction's destination
//! register; returning `None` leaves it untouched.

/// Host callbacks invoked by the sensor instructions.
///
/// Every hook defaults to a no-op, so implementors only override what they use.
pub trait Sensors {
    fn on_out(&mut self, _a: u16, _b: u16) -> Option<u16> {
        None
    }

    fn on_step(&mut self, _a: u16, _b: u16) -> Option<u16> {
        None
    }

    fn on_eat(&mut self, _a: u16, _b: u16) -> Option<u16> {
        None
    }

    fn on_clone(&mut self, _a: u16, _b: u16) -> Option<u16> {
        None
    }
}

/// Sensors that ignore every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoSensors;

impl Sensors for NoSensors {}

impl<S: Sensors + ?Sized> Sensors for &mut S {
    fn on_out(&mut self, a: u16, b: u16) -> Option<u16> {
        (**self).on_out(a, b)
    }

    fn on_step(&mut self, a: u16, b: u16) -> Option<u16> {
        (**self).on_step(a, b)
    }

    fn on_eat(&mut self, a: u16, b: u16) -> Option<u16> {
        (**self).on_eat(a, b)
    }

    fn on_clone(&mut self, a: u16, b: u16) -> Option<u16> {
        (**self).on_clone(a, b)
    }
}
