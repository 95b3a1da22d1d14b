// SPDX-License-Identifier: GPL-3.0-or-later

use super::{BitField, ClkError, Result};

/// A named clock made of an optional mux, divider and gate, applied as
/// `gate(divider(mux(parents)))`. All three may live in the same register.
#[derive(Debug)]
pub struct CompositeClock {
    name: String,
    parent_names: Vec<String>,
    mux: Option<BitField>,
    div: Option<BitField>,
    gate: Option<BitField>,
}

impl CompositeClock {
    pub fn new(
        name: String,
        parent_names: Vec<String>,
        mux: Option<BitField>,
        div: Option<BitField>,
        gate: Option<BitField>,
    ) -> Result<Self> {
        let reject = |reason: String| Err(ClkError::Registration { name: name.clone(), reason });

        if mux.is_none() && div.is_none() && gate.is_none() {
            return reject("no mux, divider or gate".to_string());
        }

        let expected_parents = mux.as_ref().map_or(1, |m| 1usize << m.width());
        if parent_names.len() != expected_parents {
            return reject(format!("expected {} parents, got {}", expected_parents, parent_names.len()));
        }

        if let Some(gate) = &gate {
            if gate.width() != 1 {
                return reject(format!("gate is {} bits wide", gate.width()));
            }
        }

        Ok(Self { name, parent_names, mux, div, gate })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_names(&self) -> &[String] {
        &self.parent_names
    }

    pub fn has_gate(&self) -> bool {
        self.gate.is_some()
    }

    pub fn parent_index(&self) -> usize {
        self.mux.as_ref().map_or(0, |m| m.read() as usize)
    }

    /// Empty when the selected slot has no parent.
    pub fn parent_name(&self) -> &str {
        self.parent_names.get(self.parent_index()).map_or("", |p| p.as_str())
    }

    pub fn set_parent(&self, index: u32) -> Result<()> {
        match &self.mux {
            Some(mux) => mux.write(index),
            None if index == 0 => Ok(()),
            None => Err(ClkError::OutOfRange { value: index, width: 0 }),
        }
    }

    pub fn divisor(&self) -> u32 {
        self.div.as_ref().map_or(1, |d| d.read() + 1)
    }

    pub fn set_divisor(&self, divisor: u32) -> Result<()> {
        match (&self.div, divisor) {
            (_, 0) => Err(ClkError::OutOfRange { value: 0, width: self.div.as_ref().map_or(0, |d| d.width()) }),
            (Some(div), d) => div.write(d - 1),
            (None, 1) => Ok(()),
            (None, d) => Err(ClkError::OutOfRange { value: d - 1, width: 0 }),
        }
    }

    /// Rate of the selected parent divided by the current divisor. A parent
    /// slot with no rate counts as 0.
    pub fn effective_rate(&self, parent_rates: &[u64]) -> u64 {
        let parent_rate = parent_rates.get(self.parent_index()).copied().unwrap_or(0);
        parent_rate / self.divisor() as u64
    }

    pub fn is_enabled(&self) -> bool {
        self.gate.as_ref().map_or(true, |g| g.read() == 1)
    }

    pub fn set_enabled(&self, enable: bool) -> Result<()> {
        match &self.gate {
            Some(gate) => {
                debug!("{} {}", self.name, if enable { "enable" } else { "disable" });
                gate.write(enable as u32)
            }
            None if enable => Ok(()),
            None => Err(ClkError::NoGate { name: self.name.clone() }),
        }
    }
}

impl Drop for CompositeClock {
    fn drop(&mut self) {
        trace!("{} free", self.name);
        // reverse of allocation order
        drop(self.div.take());
        drop(self.gate.take());
        drop(self.mux.take());
    }
}
