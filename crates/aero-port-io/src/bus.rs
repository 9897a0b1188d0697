/// Device-side handler for a window of I/O ports.
pub trait PortIoDevice {
    fn read(&mut self, port: u16, size: u8) -> u32;
    fn write(&mut self, port: u16, size: u8, value: u32);

    /// Reset the device back to its power-on state.
    fn reset(&mut self) {}
}

struct RangeDevice {
    start: u16,
    len: u16,
    dev: Box<dyn PortIoDevice>,
}

impl RangeDevice {
    fn end_exclusive(&self) -> u32 {
        u32::from(self.start) + u32::from(self.len)
    }

    fn contains(&self, port: u16) -> bool {
        let p = u32::from(port);
        p >= u32::from(self.start) && p < self.end_exclusive()
    }

    fn overlaps(&self, other: &RangeDevice) -> bool {
        u32::from(self.start) < other.end_exclusive()
            && u32::from(other.start) < self.end_exclusive()
    }
}

/// Dispatches port accesses to the device mapped over each port window.
///
/// Unmapped reads float the bus high (all ones for the access size); unmapped writes are dropped.
#[derive(Default)]
pub struct IoPortBus {
    ranges: Vec<RangeDevice>,
}

impl IoPortBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `dev` over the ports `[start, start + len)`.
    ///
    /// # Panics
    ///
    /// On an empty window, a window running past port `0xffff`, or one sharing a port with an
    /// existing mapping.
    pub fn register_range(&mut self, start: u16, len: u16, dev: Box<dyn PortIoDevice>) {
        let window = RangeDevice { start, len, dev };
        assert!(len > 0, "empty port window at {start:#06x}");
        assert!(
            window.end_exclusive() <= 0x1_0000,
            "port window {start:#06x}+{len:#x} runs past 0xffff"
        );

        // Windows are kept sorted, so only the neighbours of the insertion point can collide.
        let idx = self.ranges.partition_point(|r| r.start < start);
        let before = idx.checked_sub(1).and_then(|i| self.ranges.get(i));
        for other in before.into_iter().chain(self.ranges.get(idx)) {
            assert!(
                !window.overlaps(other),
                "port window {start:#06x}+{len:#x} collides with {:#06x}+{:#x}",
                other.start,
                other.len
            );
        }

        self.ranges.insert(idx, window);
    }

    /// Unmap the window previously registered at exactly `(start, len)`, returning its device.
    pub fn unregister_range(&mut self, start: u16, len: u16) -> Option<Box<dyn PortIoDevice>> {
        if len == 0 {
            return None;
        }

        let idx = self.ranges.partition_point(|r| r.start < start);
        let cand = self.ranges.get(idx)?;
        if cand.start != start || cand.len != len {
            return None;
        }
        Some(self.ranges.remove(idx).dev)
    }

    fn find_range_mut(&mut self, port: u16) -> Option<&mut RangeDevice> {
        let idx = self.ranges.partition_point(|r| r.start <= port);
        let cand = self.ranges.get_mut(idx.checked_sub(1)?)?;
        cand.contains(port).then_some(cand)
    }

    pub fn read(&mut self, port: u16, size: u8) -> u32 {
        if size == 0 {
            return 0;
        }
        // Only {1,2,4}-byte accesses exist on the port bus; anything else reads as unmapped.
        if !matches!(size, 1 | 2 | 4) {
            return 0xFFFF_FFFF;
        }

        match self.find_range_mut(port) {
            Some(range) => range.dev.read(port, size),
            None => match size {
                1 => 0xFF,
                2 => 0xFFFF,
                _ => 0xFFFF_FFFF,
            },
        }
    }

    pub fn write(&mut self, port: u16, size: u8, value: u32) {
        if !matches!(size, 1 | 2 | 4) {
            return;
        }
        if let Some(range) = self.find_range_mut(port) {
            range.dev.write(port, size, value);
        }
    }

    pub fn reset(&mut self) {
        for range in self.ranges.iter_mut() {
            range.dev.reset();
        }
    }
}

impl core::fmt::Debug for IoPortBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        // (start, len) of every mapped window.
        f.debug_list()
            .entries(self.ranges.iter().map(|r| (r.start, r.len)))
            .finish()
    }
}
