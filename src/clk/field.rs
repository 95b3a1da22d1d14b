// SPDX-License-Identifier: GPL-3.0-or-later

use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::Register;
use super::{ClkError, Result};

/// Serializes every read-modify-write on one register. All fields built
/// over the same register must be handed clones of the same lock.
pub type ClkLock = Arc<Mutex<()>>;

/// A `width`-bit view at `shift` inside a shared register. Muxes and
/// dividers use arbitrary widths, gates are a single bit.
#[derive(Debug)]
pub struct BitField {
    reg: Register,
    shift: u32,
    width: u32,
    lock: ClkLock,
}

impl BitField {
    pub fn new(reg: Register, shift: u32, width: u32, lock: &ClkLock) -> Result<Self> {
        if width == 0 || shift.checked_add(width).map_or(true, |end| end > 32) {
            return Err(ClkError::InvalidField { shift, width });
        }
        Ok(Self { reg, shift, width, lock: lock.clone() })
    }

    pub fn gate(reg: Register, bit_idx: u32, lock: &ClkLock) -> Result<Self> {
        Self::new(reg, bit_idx, 1, lock)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    /// Unshifted mask, `2^width - 1`.
    pub fn mask(&self) -> u32 {
        ((1u64 << self.width) - 1) as u32
    }

    pub fn read(&self) -> u32 {
        let _guard = self.lock.lock();
        (self.reg.read() >> self.shift) & self.mask()
    }

    pub fn write(&self, value: u32) -> Result<()> {
        let mask = self.mask();
        if value > mask {
            return Err(ClkError::OutOfRange { value, width: self.width });
        }

        let _guard = self.lock.lock();
        let mut v = self.reg.read();
        v &= !(mask << self.shift);
        v |= value << self.shift;
        self.reg.write(v);
        Ok(())
    }
}

impl Drop for BitField {
    fn drop(&mut self) {
        trace!("{:?} release field shift={} width={}", self.reg, self.shift, self.width);
    }
}
