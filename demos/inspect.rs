//! Print what a VST 2.x plugin reports about itself
//!
//! Shows the plugin's identity, its parameters and programs, and the
//! opcode table built by probing.
//!
//! Run with: cargo run --example inspect -- path/to/plugin.dll

use plughost::prelude::*;
use plughost::Capability;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| Error::InvalidSettings("usage: inspect <plugin>".to_string()))?;
    let mut host = PluginHost::load_vst2(&path, HostConfig::default())?;

    let info = host.info().clone();
    let descriptor = info.descriptor;
    println!("Plugin");
    println!("======");
    println!("  Name:      {}", info.name);
    println!("  Vendor:    {}", info.vendor);
    println!("  Product:   {}", info.product);
    println!("  Unique ID: {:#010x}", descriptor.unique_id);
    println!("  Version:   {} (vendor {})", descriptor.version, info.vendor_version);
    println!("  Channels:  {} in / {} out", descriptor.num_inputs, descriptor.num_outputs);
    println!("  Synth:     {}", descriptor.is_synth());
    println!("  Editor:    {}", host.supports_editor());
    println!("  MIDI in:   {}", host.can_do("receiveVstMidiEvent").unwrap_or(false));
    println!();

    println!("Parameters ({})", host.parameter_count());
    for param in host.parameters()? {
        println!(
            "  [{:3}] {:<24} {:>10} {:<6} ({:.3})",
            param.index, param.name, param.display, param.label, param.value
        );
    }
    println!();

    println!("Programs ({})", host.program_count());
    if host.capabilities().supports(Capability::GetProgramName) {
        if let (Ok(index), Ok(name)) = (host.program(), host.program_name()) {
            println!("  current: {} \"{}\"", index, name);
        }
    }
    println!();

    println!("Capabilities ({})", host.capabilities().len());
    for (name, opcode) in host.capabilities().entries() {
        println!("  {:4} {}", opcode, name);
    }

    host.close()?;
    Ok(())
}
