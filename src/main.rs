// SPDX-License-Identifier: GPL-3.0-or-later

mod bus;
mod clk;
mod config;
mod node;
mod tcon_ch1;
mod util;

use std::io::prelude::*;
use clap::Parser;
use clap::AppSettings;
use anyhow::{Result, Context};
use env_logger::fmt::Color;
use log::LevelFilter;

use bus::Bus;
use clk::{ClkLock, Registry};
use config::{ActionConfig, Config};
use node::DeviceNode;
use util::{format_rate, read_file_str};


#[macro_use]
extern crate log;

/// Build the TCON channel 1 clock tree described by a config file and print it
#[derive(Parser, Debug)]
#[clap(
    global_setting(AppSettings::DeriveDisplayOrder)
)]
pub struct Args {
    /// Config file
    config: String,

    /// Verbosity. Can be repeated
    #[clap(short, long, parse(from_occurrences))]
    verbose: u8,

    /// Register address to print once the tree is set up. Can be repeated
    #[clap(short, long, parse(try_from_str=clap_num::maybe_hex))]
    dump: Vec<u32>,
}


fn init_logging(level: u8) {
    let lf = match level {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(lf)
        .target(env_logger::Target::Stdout)
        .format(|buf, record| {
            let mut style = buf.style();
            let level = match record.level() {
                log::Level::Error => style.set_color(Color::Red).set_intense(true).value("ERROR"),
                log::Level::Warn =>  style.set_color(Color::Yellow).set_intense(true).value("WARN "),
                log::Level::Info =>  style.set_color(Color::Green).set_intense(true).value("INFO "),
                log::Level::Debug => style.set_color(Color::Cyan).set_intense(true).value("DEBUG"),
                log::Level::Trace => style.set_color(Color::Blue).set_intense(true).value("TRACE"),
            };

            writeln!(buf, "{} {}", level, record.args())
        })
        .init();
}

fn apply_action(registry: &Registry, action: &ActionConfig) -> Result<()> {
    let clk = registry.get(&action.clock)
        .with_context(|| format!("Unknown clock {}", action.clock))?;

    if let Some(parent) = action.parent {
        clk.set_parent(parent)
            .with_context(|| format!("{}: set parent={}", clk.name(), parent))?;
    }
    if let Some(divisor) = action.divisor {
        clk.set_divisor(divisor)
            .with_context(|| format!("{}: set divisor={}", clk.name(), divisor))?;
    }
    match action.enable {
        Some(true) => registry.enable(clk.name())?,
        Some(false) => clk.set_enabled(false)?,
        None => {}
    }
    Ok(())
}

fn print_summary(registry: &Registry, nodes: &[String]) {
    for node in nodes {
        match registry.of_clk_get(node, 0) {
            Ok(clk) => info!("{} provides {}", node, clk.name()),
            Err(e) => warn!("{}: {}", node, e),
        }
    }

    info!("{:<16} {:<16} {:>4} {:>8} {:>14}", "clock", "parent", "div", "enabled", "rate");
    for clk in registry.clocks() {
        info!("{:<16} {:<16} {:>4} {:>8} {:>14}",
            clk.name(), clk.parent_name(), clk.divisor(), clk.is_enabled(), format_rate(registry.rate(clk.name())));
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config: Config = serde_yaml::from_str(&read_file_str(&args.config)?)
        .with_context(|| format!("Failed to parse {}", args.config))?;

    let bus = Bus::from_config(&config.regions)
        .context("Failed to set up register regions")?;

    let mut registry = Registry::new();
    for fixed in config.fixed_clocks.as_deref().unwrap_or_default() {
        registry.add_fixed_rate(&fixed.name, fixed.rate)?;
    }

    let mut providers = vec![];
    for node in config.nodes.iter().map(DeviceNode::from) {
        if !node.is_compatible(tcon_ch1::COMPATIBLE) {
            warn!("{}: no driver for compatible={}", node.full_name(), node.compatible);
            continue;
        }

        // one lock per register
        let lock = ClkLock::default();
        match tcon_ch1::setup(&node, &bus, &mut registry, &lock) {
            Ok(tree) => {
                debug!("{} sclk2={} feeds sclk1={}", node.full_name(), tree.sclk2.name(), tree.sclk1.name());
                providers.push(node.name().to_string());
            }
            Err(e) => error!("{}: setup failed: {}", node.full_name(), e),
        }
    }

    for action in config.actions.as_deref().unwrap_or_default() {
        if let Err(e) = apply_action(&registry, action) {
            warn!("{:#}", e);
        }
    }

    print_summary(&registry, &providers);

    for addr in args.dump {
        match bus.peek(addr) {
            Some(v) => info!("addr=0x{:08x} value=0x{:08x}", addr, v),
            None => warn!("addr=0x{:08x} not backed by any region", addr),
        }
    }

    Ok(())
}
