// SPDX-License-Identifier: GPL-3.0-or-later

use crate::config::NodeConfig;

/// Device tree node as seen by a clock driver.
#[derive(Debug, Clone, Default)]
pub struct DeviceNode {
    pub name: String,
    pub compatible: String,
    pub output_name: Option<String>,
    pub parents: Vec<String>,
    pub reg_start: u32,
    pub reg_size: u32,
}

impl DeviceNode {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> String {
        format!("{}@{:08x}", self.name, self.reg_start)
    }

    pub fn output_name(&self) -> Option<&str> {
        self.output_name.as_deref()
    }

    /// Name of the `index`th parent clock, if declared.
    pub fn parent_name(&self, index: usize) -> Option<&str> {
        self.parents.get(index).map(|p| p.as_str())
    }

    pub fn is_compatible(&self, compatible: &str) -> bool {
        self.compatible == compatible
    }
}

impl From<&NodeConfig> for DeviceNode {
    fn from(config: &NodeConfig) -> Self {
        Self {
            name: config.name.clone(),
            compatible: config.compatible.clone(),
            output_name: config.clock_output_names.clone(),
            parents: config.clocks.clone().unwrap_or_default(),
            reg_start: config.reg.start,
            reg_size: config.reg.size,
        }
    }
}
