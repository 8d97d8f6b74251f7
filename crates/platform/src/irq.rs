use std::rc::Rc;

/// A single interrupt output wire.
///
/// Devices drive the level; what the interrupt controller does with it is not the device's
/// concern. Setting the same level twice must be harmless.
pub trait IrqLine {
    fn set_level(&self, level: bool);
}

/// Unconnected interrupt output.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoIrq;

impl IrqLine for NoIrq {
    fn set_level(&self, _level: bool) {}
}

impl<T: IrqLine + ?Sized> IrqLine for Rc<T> {
    fn set_level(&self, level: bool) {
        (**self).set_level(level);
    }
}

impl<T: IrqLine + ?Sized> IrqLine for Box<T> {
    fn set_level(&self, level: bool) {
        (**self).set_level(level);
    }
}
