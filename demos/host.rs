//! Load a VST 2.x plugin, optionally show its editor, save its bank and render a note
//!
//! This example demonstrates:
//! - Loading a plugin module and importing a bank file
//! - Running the editor on its own thread (Windows)
//! - Exporting the plugin state after the editor is closed
//! - Rendering a note to a WAV file
//!
//! # Usage
//!
//! ```bash
//! cargo run --example host -- synth.dll --load-fxb in.fxb --gui --save-fxb out.fxb \
//!     --render note.wav --seconds 2 --note 60
//! ```

use std::path::PathBuf;

use plughost::prelude::*;

struct Args {
    plugin: PathBuf,
    load_bank: Option<PathBuf>,
    save_bank: Option<PathBuf>,
    gui: bool,
    render_to: Option<PathBuf>,
    seconds: f64,
    note: u8,
}

fn parse_args() -> Result<Args> {
    let usage = || {
        Error::InvalidSettings(
            "usage: host <plugin> [--load-fxb FILE] [--save-fxb FILE] [--gui] \
             [--render WAV] [--seconds N] [--note N]"
                .to_string(),
        )
    };

    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        plugin: PathBuf::new(),
        load_bank: None,
        save_bank: None,
        gui: false,
        render_to: None,
        seconds: 2.0,
        note: 60,
    };
    let mut plugin = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--load-fxb" => parsed.load_bank = Some(args.next().ok_or_else(usage)?.into()),
            "--save-fxb" => parsed.save_bank = Some(args.next().ok_or_else(usage)?.into()),
            "--render" => parsed.render_to = Some(args.next().ok_or_else(usage)?.into()),
            "--gui" => parsed.gui = true,
            "--seconds" => {
                parsed.seconds = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .ok_or_else(usage)?;
            }
            "--note" => {
                parsed.note = args
                    .next()
                    .and_then(|s| s.parse().ok())
                    .filter(|n| *n < 128)
                    .ok_or_else(usage)?;
            }
            _ if arg.starts_with("--") => return Err(usage()),
            _ => plugin = Some(PathBuf::from(arg)),
        }
    }
    parsed.plugin = plugin.ok_or_else(usage)?;
    Ok(parsed)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = parse_args()?;

    println!("plughost demo");
    println!("=============\n");

    let mut host = PluginHost::load_vst2(&args.plugin, HostConfig::default())?;
    println!("Loaded: {}", host.info());

    if let Some(path) = &args.load_bank {
        let bank = BankBlob::from(std::fs::read(path)?);
        host.import_state(&bank)?;
        println!("✓ Imported {} bytes from {}", bank.len(), path.display());
    }

    if args.gui {
        host = show_editor(host)?;
    }

    if let Some(path) = &args.save_bank {
        match host.state() {
            LifecycleState::Loaded => {
                host.start()?;
                host.suspend()?;
            }
            LifecycleState::Running => host.suspend()?,
            _ => {}
        }
        match host.export_state() {
            Ok(bank) => {
                std::fs::write(path, bank.as_bytes())?;
                println!("✓ Saved {} bytes to {}", bank.len(), path.display());
            }
            Err(e) => println!("Could not save bank: {}", e),
        }
    }

    if let Some(path) = &args.render_to {
        let sample_rate = host.config().sample_rate as u32;
        let settings =
            RenderSettings::from_duration(args.seconds, sample_rate).with_note(args.note, 127);
        let report = render(&mut host, &settings, WavSink::new(path))?;
        println!(
            "✓ Rendered {} frames in {} blocks to {} ({} clipped samples)",
            report.frames,
            report.blocks,
            path.display(),
            report.clipped_samples
        );
    }

    host.close()?;
    Ok(())
}

#[cfg(windows)]
fn show_editor(host: PluginHost) -> Result<PluginHost> {
    let ui = match UiCoordinator::spawn_native(host) {
        Ok(ui) => ui,
        Err(err) => {
            println!("Editor unavailable: {}", err.source);
            return err.host.ok_or(err.source);
        }
    };

    let name = ui.call(|host| host.info().name.clone())?;
    println!("Editor for {} is open. Press Enter to close it...", name);
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    ui.close()
}

#[cfg(not(windows))]
fn show_editor(host: PluginHost) -> Result<PluginHost> {
    println!("Native editor windows are only available on Windows; skipping --gui");
    Ok(host)
}
