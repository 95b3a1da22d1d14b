// SPDX-License-Identifier: GPL-3.0-or-later

use std::fmt;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use anyhow::{Result, bail};
use parking_lot::Mutex;

use crate::clk::ClkError;
use crate::config::RegionConfig;

pub struct RegionSlot {
    pub name: String,
    pub start: u32,
    // exclusive
    pub end: u32,
    words: Arc<[AtomicU32]>,
}

type Claims = Arc<Mutex<Vec<Range<u32>>>>;

/// Backing store for every register window a node may request.
pub struct Bus {
    slots: Vec<RegionSlot>,
    claims: Claims,
}

impl Bus {
    pub fn new() -> Self {
        Self { slots: vec![], claims: Claims::default() }
    }

    pub fn from_config(regions: &[RegionConfig]) -> Result<Self> {
        let mut bus = Self::new();
        for r in regions {
            bus.add_region(&r.name, r.start, r.size)?;
            for (i, v) in r.init.as_deref().unwrap_or_default().iter().enumerate() {
                bus.poke(r.start + 4 * i as u32, *v)?;
            }
        }
        Ok(bus)
    }

    pub fn add_region(&mut self, name: &str, start: u32, size: u32) -> Result<()> {
        if start % 4 != 0 || size % 4 != 0 || size == 0 {
            bail!("Region {} must be word aligned and non-empty", name);
        }
        let end = match start.checked_add(size) {
            Some(end) => end,
            None => bail!("Region {} wraps the address space", name),
        };

        debug!("Region start=0x{:08x} end=0x{:08x} name={}", start, end, name);

        let index = match self.slots.binary_search_by_key(&start, |s| s.start) {
            Ok(_) => bail!("Region {} overlaps an existing region", name),
            Err(i) => i,
        };
        if let Some(prev) = index.checked_sub(1).and_then(|i| self.slots.get(i)) {
            if prev.end > start {
                bail!("Overlapping regions between {} and {}", prev.name, name);
            }
        }
        if let Some(next) = self.slots.get(index) {
            if end > next.start {
                bail!("Overlapping regions between {} and {}", name, next.name);
            }
        }

        let words = (0..size / 4).map(|_| AtomicU32::new(0)).collect();
        self.slots.insert(index, RegionSlot {
            name: name.to_string(),
            start,
            end,
            words,
        });
        Ok(())
    }

    fn get_slot(&self, addr: u32) -> Option<&RegionSlot> {
        let index = self.slots.binary_search_by_key(&addr, |s| s.start)
            .map_or_else(|e| e.checked_sub(1), Some);

        index.and_then(|i| self.slots.get(i)).filter(|s| addr < s.end)
    }

    /// Debug access to a word, bypassing window ownership.
    pub fn peek(&self, addr: u32) -> Option<u32> {
        let slot = self.get_slot(addr).filter(|_| addr % 4 == 0)?;
        Some(slot.words[((addr - slot.start) / 4) as usize].load(Ordering::Relaxed))
    }

    pub fn poke(&self, addr: u32, value: u32) -> Result<()> {
        match self.get_slot(addr).filter(|_| addr % 4 == 0) {
            Some(slot) => {
                slot.words[((addr - slot.start) / 4) as usize].store(value, Ordering::Relaxed);
                Ok(())
            }
            None => bail!("No register at addr=0x{:08x}", addr),
        }
    }

    /// Claims `[start, start+size)` and maps it for `owner`. The claim is
    /// dropped together with the last reference to the mapping.
    pub fn request_and_map(&self, start: u32, size: u32, owner: &str) -> Result<Arc<Mapping>, ClkError> {
        let map_err = |reason: &str| ClkError::Map {
            name: owner.to_string(),
            reason: reason.to_string(),
        };

        if start % 4 != 0 || size < 4 {
            return Err(map_err("window must be word aligned and hold a register"));
        }
        let slot = self.get_slot(start).ok_or_else(|| map_err("no region at this address"))?;
        if start as u64 + size as u64 > slot.end as u64 {
            return Err(map_err("window crosses the region end"));
        }
        let window = start..start + size;
        {
            let mut claims = self.claims.lock();
            if claims.iter().any(|c| c.start < window.end && window.start < c.end) {
                return Err(map_err("window busy"));
            }
            claims.push(window.clone());
        }

        debug!("{} mapped base=0x{:08x} size=0x{:x} region={}", owner, start, size, slot.name);

        let first = ((start - slot.start) / 4) as usize;
        Ok(Arc::new(Mapping {
            owner: owner.to_string(),
            base: start,
            words: slot.words.clone(),
            first,
            len: (size / 4) as usize,
            window,
            claims: self.claims.clone(),
        }))
    }
}

pub struct Mapping {
    owner: String,
    base: u32,
    words: Arc<[AtomicU32]>,
    first: usize,
    len: usize,
    window: Range<u32>,
    claims: Claims,
}

impl Mapping {
    pub fn register(self: &Arc<Self>, offset: u32) -> Result<Register, ClkError> {
        if offset % 4 != 0 || (offset / 4) as usize >= self.len {
            return Err(ClkError::Map {
                name: self.owner.clone(),
                reason: format!("register offset=0x{:x} outside the window", offset),
            });
        }
        Ok(Register { map: self.clone(), index: self.first + (offset / 4) as usize })
    }
}

impl Drop for Mapping {
    fn drop(&mut self) {
        debug!("{} unmapped base=0x{:08x}", self.owner, self.base);
        self.claims.lock().retain(|c| *c != self.window);
    }
}

/// A single 32-bit word inside a mapping. The index is validated once at creation.
#[derive(Clone)]
pub struct Register {
    map: Arc<Mapping>,
    index: usize,
}

impl Register {
    pub fn read(&self) -> u32 {
        self.map.words[self.index].load(Ordering::Relaxed)
    }

    pub fn write(&self, value: u32) {
        trace!("{} write value=0x{:08x}", self.map.owner, value);
        self.map.words[self.index].store(value, Ordering::Relaxed)
    }

    pub fn addr(&self) -> u32 {
        self.map.base + 4 * (self.index - self.map.first) as u32
    }
}

impl fmt::Debug for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Register({} addr=0x{:08x})", self.map.owner, self.addr())
    }
}
