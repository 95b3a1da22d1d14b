// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ClkError, CompositeClock, Result};

pub type ClkHandle = Arc<CompositeClock>;

// Guards against parent loops when walking the tree.
const MAX_DEPTH: usize = 16;

/// What a clock driver needs from the clock framework.
pub trait ClkFramework {
    fn register_composite(&mut self, clk: CompositeClock) -> Result<ClkHandle>;
    fn unregister(&mut self, name: &str) -> Option<ClkHandle>;
    fn add_provider(&mut self, node: &str, provider: SimpleProvider) -> Result<()>;
}

/// Provider exposing a single clock; the index of a lookup is ignored.
#[derive(Clone)]
pub struct SimpleProvider {
    clk: ClkHandle,
}

impl SimpleProvider {
    pub fn new(clk: ClkHandle) -> Self {
        Self { clk }
    }

    pub fn get(&self, _index: u32) -> ClkHandle {
        self.clk.clone()
    }
}

#[derive(Default)]
pub struct Registry {
    fixed: BTreeMap<String, u64>,
    clocks: BTreeMap<String, ClkHandle>,
    providers: BTreeMap<String, SimpleProvider>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn name_taken(&self, name: &str) -> bool {
        self.fixed.contains_key(name) || self.clocks.contains_key(name)
    }

    pub fn add_fixed_rate(&mut self, name: &str, rate: u64) -> Result<()> {
        if name.is_empty() || self.name_taken(name) {
            return Err(ClkError::Registration { name: name.to_string(), reason: "name already in use".to_string() });
        }
        debug!("Fixed clock name={} rate={}", name, rate);
        self.fixed.insert(name.to_string(), rate);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ClkHandle> {
        self.clocks.get(name)
    }

    pub fn clocks(&self) -> impl Iterator<Item = &ClkHandle> {
        self.clocks.values()
    }

    pub fn len(&self) -> usize {
        self.clocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clocks.is_empty()
    }

    pub fn has_provider(&self, node: &str) -> bool {
        self.providers.contains_key(node)
    }

    pub fn of_clk_get(&self, node: &str, index: u32) -> Result<ClkHandle> {
        self.providers.get(node)
            .map(|p| p.get(index))
            .ok_or_else(|| ClkError::NotFound(node.to_string()))
    }

    /// Live rate of `name`, following the current mux selections up to a fixed clock.
    /// Unknown or empty names are orphans with rate 0.
    pub fn rate(&self, name: &str) -> u64 {
        self.rate_at(name, 0)
    }

    fn rate_at(&self, name: &str, depth: usize) -> u64 {
        if let Some(rate) = self.fixed.get(name) {
            return *rate;
        }
        match self.clocks.get(name) {
            Some(clk) if depth < MAX_DEPTH => {
                let parent_rates: Vec<u64> = clk.parent_names().iter()
                    .map(|p| self.rate_at(p, depth + 1))
                    .collect();
                clk.effective_rate(&parent_rates)
            }
            Some(_) => {
                warn!("Clock {} nested too deep, rate unknown", name);
                0
            }
            None => 0,
        }
    }

    /// Enables `name` after its currently selected parent chain.
    pub fn enable(&self, name: &str) -> Result<()> {
        self.enable_at(name, 0)
    }

    fn enable_at(&self, name: &str, depth: usize) -> Result<()> {
        let clk = self.clocks.get(name).ok_or_else(|| ClkError::NotFound(name.to_string()))?;
        let parent = clk.parent_name();
        if depth < MAX_DEPTH && self.clocks.contains_key(parent) {
            self.enable_at(parent, depth + 1)?;
        }
        clk.set_enabled(true)
    }
}

impl ClkFramework for Registry {
    fn register_composite(&mut self, clk: CompositeClock) -> Result<ClkHandle> {
        if clk.name().is_empty() || self.name_taken(clk.name()) {
            return Err(ClkError::Registration { name: clk.name().to_string(), reason: "name already in use".to_string() });
        }

        debug!("{} registered parents={:?}", clk.name(), clk.parent_names());
        let clk = Arc::new(clk);
        self.clocks.insert(clk.name().to_string(), clk.clone());
        Ok(clk)
    }

    fn unregister(&mut self, name: &str) -> Option<ClkHandle> {
        let clk = self.clocks.remove(name)?;
        self.providers.retain(|_, p| !Arc::ptr_eq(&p.clk, &clk));
        debug!("{} unregistered", name);
        Some(clk)
    }

    fn add_provider(&mut self, node: &str, provider: SimpleProvider) -> Result<()> {
        if self.providers.contains_key(node) {
            return Err(ClkError::Registration { name: node.to_string(), reason: "node already has a provider".to_string() });
        }
        debug!("{} provides {}", node, provider.clk.name());
        self.providers.insert(node.to_string(), provider);
        Ok(())
    }
}
