use crate::IoPortBus;
use std::cell::RefCell;
use std::rc::Rc;

/// Driver-side port accessor (`inb`/`inw`/`outb`/`outw`).
///
/// Accesses are synchronous: a write returns once the device has consumed it and a read returns
/// the device's current value. There is no timeout; a device that never answers stalls the caller.
pub trait PortIo {
    fn inb(&mut self, port: u16) -> u8;
    fn inw(&mut self, port: u16) -> u16;
    fn outb(&mut self, port: u16, value: u8);
    fn outw(&mut self, port: u16, value: u16);
}

impl PortIo for IoPortBus {
    fn inb(&mut self, port: u16) -> u8 {
        self.read(port, 1) as u8
    }

    fn inw(&mut self, port: u16) -> u16 {
        self.read(port, 2) as u16
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.write(port, 1, u32::from(value));
    }

    fn outw(&mut self, port: u16, value: u16) {
        self.write(port, 2, u32::from(value));
    }
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn inb(&mut self, port: u16) -> u8 {
        <T as PortIo>::inb(&mut **self, port)
    }

    fn inw(&mut self, port: u16) -> u16 {
        <T as PortIo>::inw(&mut **self, port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        <T as PortIo>::outb(&mut **self, port, value);
    }

    fn outw(&mut self, port: u16, value: u16) {
        <T as PortIo>::outw(&mut **self, port, value);
    }
}

/// Shared handle, so several drivers (and the test harness) can reach one bus.
impl<T: PortIo + ?Sized> PortIo for Rc<RefCell<T>> {
    fn inb(&mut self, port: u16) -> u8 {
        self.borrow_mut().inb(port)
    }

    fn inw(&mut self, port: u16) -> u16 {
        self.borrow_mut().inw(port)
    }

    fn outb(&mut self, port: u16, value: u8) {
        self.borrow_mut().outb(port, value);
    }

    fn outw(&mut self, port: u16, value: u16) {
        self.borrow_mut().outw(port, value);
    }
}
