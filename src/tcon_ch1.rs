// SPDX-License-Identifier: GPL-3.0-or-later

//! Sun4i A10 TCON channel 1 clock. One register holds two cascaded
//! composite clocks: sclk2 (mux, divider, gate) feeds sclk1 (divider,
//! gate), and sclk1 is the clock the node provides.

use crate::bus::Bus;
use crate::clk::{BitField, ClkError, ClkFramework, ClkHandle, ClkLock, CompositeClock, Result, SimpleProvider};
use crate::node::DeviceNode;

pub const COMPATIBLE: &str = "allwinner,sun4i-a10-tcon-ch1-clk";

const SCLK2_PARENTS: usize = 4;

const SCLK2_GATE_BIT: u32 = 31;
const SCLK2_MUX_SHIFT: u32 = 24;
const SCLK2_MUX_WIDTH: u32 = 2;
const SCLK2_DIV_SHIFT: u32 = 0;
const SCLK2_DIV_WIDTH: u32 = 4;

const SCLK1_GATE_BIT: u32 = 15;
const SCLK1_DIV_SHIFT: u32 = 11;
const SCLK1_DIV_WIDTH: u32 = 1;

/// The clocks built for one node. sclk1 is also published through the node's provider.
pub struct TconCh1 {
    pub sclk1: ClkHandle,
    pub sclk2: ClkHandle,
}

/// Undoes framework registrations in reverse order unless committed.
struct Teardown<'a> {
    fw: &'a mut dyn ClkFramework,
    registered: Vec<String>,
    armed: bool,
}

impl<'a> Teardown<'a> {
    fn new(fw: &'a mut dyn ClkFramework) -> Self {
        Self { fw, registered: vec![], armed: true }
    }

    fn register(&mut self, clk: CompositeClock) -> Result<ClkHandle> {
        let name = clk.name().to_string();
        let handle = self.fw.register_composite(clk)?;
        self.registered.push(name);
        Ok(handle)
    }

    fn publish(&mut self, node: &str, provider: SimpleProvider) -> Result<()> {
        self.fw.add_provider(node, provider)
    }

    fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        for name in self.registered.drain(..).rev() {
            if self.fw.unregister(&name).is_none() {
                warn!("{} vanished before rollback", name);
            }
        }
    }
}

fn sclk2_name(sclk1_name: &str) -> Result<String> {
    let mut name = String::new();
    name.try_reserve_exact(sclk1_name.len() + 1).map_err(|_| ClkError::Allocation)?;
    name.push_str(sclk1_name);
    name.push('2');
    Ok(name)
}

/// Builds both clocks of `node` and publishes sclk1 as its provider.
///
/// On failure every registration is undone and every field released, in
/// reverse order. The register mapping is owned by the fields, so it is
/// released along with them and the region can be requested again.
pub fn setup(node: &DeviceNode, bus: &Bus, fw: &mut dyn ClkFramework, lock: &ClkLock) -> Result<TconCh1> {
    let sclk1_name = node.output_name().unwrap_or(node.name()).to_string();
    let sclk2_name = sclk2_name(&sclk1_name)?;

    let map = bus.request_and_map(node.reg_start, node.reg_size, &node.full_name())
        .map_err(|e| {
            error!("{}: Could not map the clock registers", sclk2_name);
            e
        })?;
    let reg = map.register(0)?;

    let sclk2_parents: Vec<String> = (0..SCLK2_PARENTS)
        .map(|i| node.parent_name(i).unwrap_or_default().to_string())
        .collect();

    let mut teardown = Teardown::new(fw);

    let sclk2_mux = BitField::new(reg.clone(), SCLK2_MUX_SHIFT, SCLK2_MUX_WIDTH, lock)?;
    let sclk2_gate = BitField::gate(reg.clone(), SCLK2_GATE_BIT, lock)?;
    let sclk2_div = BitField::new(reg.clone(), SCLK2_DIV_SHIFT, SCLK2_DIV_WIDTH, lock)?;

    let sclk2 = CompositeClock::new(sclk2_name.clone(), sclk2_parents, Some(sclk2_mux), Some(sclk2_div), Some(sclk2_gate))
        .and_then(|clk| teardown.register(clk))
        .map_err(|e| {
            error!("{}: Couldn't register the clock", sclk2_name);
            e
        })?;

    let sclk1_div = BitField::new(reg.clone(), SCLK1_DIV_SHIFT, SCLK1_DIV_WIDTH, lock)?;
    let sclk1_gate = BitField::gate(reg, SCLK1_GATE_BIT, lock)?;

    let sclk1 = CompositeClock::new(sclk1_name.clone(), vec![sclk2_name], None, Some(sclk1_div), Some(sclk1_gate))
        .and_then(|clk| teardown.register(clk))
        .map_err(|e| {
            error!("{}: Couldn't register the clock", sclk1_name);
            e
        })?;

    teardown.publish(node.name(), SimpleProvider::new(sclk1.clone()))
        .map_err(|e| {
            error!("{}: Couldn't add the clock provider: {}", node.full_name(), e);
            e
        })?;

    teardown.commit();
    info!("{} ready sclk1={} sclk2={}", node.full_name(), sclk1.name(), sclk2.name());

    Ok(TconCh1 { sclk1, sclk2 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clk::Registry;
    use std::sync::Arc;

    const CCU: u32 = 0x01c2_0000;
    const TCON0_CH1: u32 = 0x01c2_012c;

    fn bus() -> Bus {
        let mut bus = Bus::new();
        bus.add_region("ccu", CCU, 0x400).unwrap();
        bus
    }

    fn tcon0() -> DeviceNode {
        DeviceNode {
            name: "tcon0".into(),
            compatible: COMPATIBLE.into(),
            output_name: Some("tcon0ch1".into()),
            parents: vec!["pll3".into(), "pll7".into()],
            reg_start: TCON0_CH1,
            reg_size: 4,
        }
    }

    #[derive(Default)]
    struct Faulty {
        inner: Registry,
        fail_register: Option<&'static str>,
        fail_provider: bool,
    }

    impl ClkFramework for Faulty {
        fn register_composite(&mut self, clk: CompositeClock) -> Result<ClkHandle> {
            if self.fail_register == Some(clk.name()) {
                return Err(ClkError::Registration { name: clk.name().to_string(), reason: "injected".into() });
            }
            self.inner.register_composite(clk)
        }

        fn unregister(&mut self, name: &str) -> Option<ClkHandle> {
            self.inner.unregister(name)
        }

        fn add_provider(&mut self, node: &str, provider: SimpleProvider) -> Result<()> {
            if self.fail_provider {
                return Err(ClkError::Registration { name: node.to_string(), reason: "injected".into() });
            }
            self.inner.add_provider(node, provider)
        }
    }

    fn assert_fully_unwound(bus: &Bus, registry: &Registry) {
        assert!(registry.is_empty());
        assert!(!registry.has_provider("tcon0"));
        assert!(registry.of_clk_get("tcon0", 0).is_err());
        // the window is free again
        assert!(bus.request_and_map(TCON0_CH1, 4, "again").is_ok());
    }

    #[test]
    fn builds_both_stages() {
        let bus = bus();
        let mut registry = Registry::new();
        let tree = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();

        assert_eq!(tree.sclk2.name(), "tcon0ch12");
        assert_eq!(tree.sclk2.parent_names(), ["pll3", "pll7", "", ""]);
        assert_eq!(tree.sclk1.name(), "tcon0ch1");
        assert_eq!(tree.sclk1.parent_names(), ["tcon0ch12"]);

        assert_eq!(registry.len(), 2);
        let provided = registry.of_clk_get("tcon0", 0).unwrap();
        assert!(Arc::ptr_eq(&provided, &tree.sclk1));
        assert!(Arc::ptr_eq(&registry.of_clk_get("tcon0", 1).unwrap(), &tree.sclk1));
    }

    #[test]
    fn node_name_without_override() {
        let bus = bus();
        let mut registry = Registry::new();
        let node = DeviceNode { output_name: None, ..tcon0() };
        let tree = setup(&node, &bus, &mut registry, &ClkLock::default()).unwrap();
        assert_eq!(tree.sclk1.name(), "tcon0");
        assert_eq!(tree.sclk2.name(), "tcon02");
    }

    #[test]
    fn register_layout() {
        let bus = bus();
        let mut registry = Registry::new();
        let tree = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();
        let word = || bus.peek(TCON0_CH1).unwrap();

        tree.sclk2.set_enabled(true).unwrap();
        assert_eq!(word(), 1 << 31);
        tree.sclk2.set_parent(3).unwrap();
        assert_eq!(word(), 1 << 31 | 3 << 24);
        tree.sclk1.set_enabled(true).unwrap();
        assert_eq!(word(), 1 << 31 | 3 << 24 | 1 << 15);
        tree.sclk1.set_divisor(2).unwrap();
        assert_eq!(word(), 1 << 31 | 3 << 24 | 1 << 15 | 1 << 11);
        tree.sclk2.set_divisor(16).unwrap();
        assert_eq!(word(), 0x8300_880f);

        assert!(tree.sclk1.set_divisor(3).is_err());
        assert!(tree.sclk2.set_parent(4).is_err());
        assert_eq!(word(), 0x8300_880f);
    }

    #[test]
    fn existing_register_value_is_read_back() {
        let bus = bus();
        bus.poke(TCON0_CH1, 0x8100_0803).unwrap();
        let mut registry = Registry::new();
        let tree = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();

        assert!(tree.sclk2.is_enabled());
        assert_eq!(tree.sclk2.parent_name(), "pll7");
        assert_eq!(tree.sclk2.divisor(), 4);
        assert!(!tree.sclk1.is_enabled());
        assert_eq!(tree.sclk1.divisor(), 2);
    }

    #[test]
    fn rate_through_the_tree() {
        let bus = bus();
        let mut registry = Registry::new();
        registry.add_fixed_rate("pll3", 100).unwrap();
        registry.add_fixed_rate("pll7", 200).unwrap();
        let tree = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();

        tree.sclk2.set_parent(1).unwrap();
        tree.sclk2.set_divisor(4).unwrap();
        tree.sclk1.set_divisor(1).unwrap();
        assert_eq!(registry.rate("tcon0ch12"), 50);
        assert_eq!(registry.rate("tcon0ch1"), 50);

        registry.enable("tcon0ch1").unwrap();
        assert!(tree.sclk1.is_enabled());
        assert!(tree.sclk2.is_enabled());
    }

    #[test]
    fn stage1_registration_failure_unwinds_everything() {
        let bus = bus();
        let mut fw = Faulty { fail_register: Some("tcon0ch1"), ..Faulty::default() };
        let err = setup(&tcon0(), &bus, &mut fw, &ClkLock::default()).err().unwrap();

        assert!(matches!(err, ClkError::Registration { ref name, .. } if name == "tcon0ch1"));
        assert_fully_unwound(&bus, &fw.inner);
    }

    #[test]
    fn stage2_registration_failure() {
        let bus = bus();
        let mut registry = Registry::new();
        registry.add_fixed_rate("tcon0ch12", 1).unwrap();
        let err = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).err().unwrap();

        assert!(matches!(err, ClkError::Registration { ref name, .. } if name == "tcon0ch12"));
        assert_fully_unwound(&bus, &registry);
    }

    #[test]
    fn provider_failure_unwinds_everything() {
        let bus = bus();
        let mut fw = Faulty { fail_provider: true, ..Faulty::default() };
        assert!(setup(&tcon0(), &bus, &mut fw, &ClkLock::default()).is_err());
        assert_fully_unwound(&bus, &fw.inner);
    }

    #[test]
    fn unmapped_window_aborts_before_allocation() {
        let bus = bus();
        let mut registry = Registry::new();
        let node = DeviceNode { reg_start: 0x0100_0000, ..tcon0() };
        let err = setup(&node, &bus, &mut registry, &ClkLock::default()).err().unwrap();

        assert!(matches!(err, ClkError::Map { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn busy_window_is_a_map_failure() {
        let bus = bus();
        let mut registry = Registry::new();
        let _tree = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();

        let node = DeviceNode { name: "tcon1".into(), output_name: Some("tcon1ch1".into()), ..tcon0() };
        let err = setup(&node, &bus, &mut registry, &ClkLock::default()).err().unwrap();
        assert!(matches!(err, ClkError::Map { .. }));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn independent_trees_with_independent_locks() {
        let mut bus = bus();
        bus.add_region("ccu-b", 0x0200_0000, 0x4).unwrap();
        let mut registry = Registry::new();

        let a = setup(&tcon0(), &bus, &mut registry, &ClkLock::default()).unwrap();
        let node = DeviceNode {
            name: "tcon1".into(),
            output_name: None,
            reg_start: 0x0200_0000,
            ..tcon0()
        };
        let b = setup(&node, &bus, &mut registry, &ClkLock::default()).unwrap();

        a.sclk2.set_enabled(true).unwrap();
        b.sclk1.set_enabled(true).unwrap();
        assert_eq!(bus.peek(TCON0_CH1), Some(1 << 31));
        assert_eq!(bus.peek(0x0200_0000), Some(1 << 15));
        assert_eq!(registry.len(), 4);
    }
}
