// SPDX-License-Identifier: GPL-3.0-or-later

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct RegionConfig {
   pub name: String,
   pub start: u32,
   pub size: u32,
   /// Initial register words, starting at `start`
   pub init: Option<Vec<u32>>,
}

#[derive(Debug, Deserialize)]
pub struct FixedClockConfig {
   pub name: String,
   pub rate: u64,
}

#[derive(Debug, Deserialize)]
pub struct RegConfig {
   pub start: u32,
   pub size: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeConfig {
   pub name: String,
   pub compatible: String,
   pub clock_output_names: Option<String>,
   pub clocks: Option<Vec<String>>,
   pub reg: RegConfig,
}

#[derive(Debug, Deserialize)]
pub struct ActionConfig {
   pub clock: String,
   pub parent: Option<u32>,
   pub divisor: Option<u32>,
   pub enable: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
   pub regions: Vec<RegionConfig>,
   pub fixed_clocks: Option<Vec<FixedClockConfig>>,
   pub nodes: Vec<NodeConfig>,
   pub actions: Option<Vec<ActionConfig>>,
}
