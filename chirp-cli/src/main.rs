//! # Chirp - Frequency Response Measurement CLI
//!
//! Front end for the chirp-core measurement pipeline. Plays an
//! exponential sine sweep through the default output device while
//! recording the default microphone, reduces the recording to a
//! peak/RMS response curve and writes it to a JSON file.
//!
//! ## Architecture
//! - **Main thread**: argument parsing and the textual status sink
//! - **Measurement thread**: runs the blocking capture session
//! - **Communication**: crossbeam channel for status updates

use std::thread;

use anyhow::{Context, anyhow};
use clap::Parser;
use crossbeam_channel::Receiver;

use chirp_core::session::{SessionManager, StatusUpdate};
use chirp_core::{CHIRP_DURATION_S, END_FREQ_HZ, ResponseCurve, START_FREQ_HZ, SweepSpec};

/// Measure the frequency response of an acoustic path with a sine sweep.
#[derive(Debug, Parser)]
#[command(name = "chirp", version)]
struct Args {
    /// Sweep duration in seconds
    #[arg(long, default_value_t = CHIRP_DURATION_S)]
    duration: f32,

    /// Sweep start frequency in Hz
    #[arg(long, default_value_t = START_FREQ_HZ)]
    start_freq: f32,

    /// Sweep end frequency in Hz
    #[arg(long, default_value_t = END_FREQ_HZ)]
    end_freq: f32,

    /// Number of response points (the plot width in pixels)
    #[arg(long, default_value_t = 600)]
    width: u32,

    /// Output file for the measured curve
    #[arg(long, default_value = "response.json")]
    output: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let spec = SweepSpec {
        duration_s: args.duration,
        start_freq_hz: args.start_freq,
        end_freq_hz: args.end_freq,
    };

    println!(
        "Measuring {:.1} Hz .. {:.1} Hz over {:.1} s ({} points)",
        spec.start_freq_hz, spec.end_freq_hz, spec.duration_s, args.width
    );

    let (status_tx, status_rx) = crossbeam_channel::unbounded();
    let width = args.width;
    let worker = thread::spawn(move || {
        let mut manager = SessionManager::new();
        manager.run(&spec, width, Some(&status_tx))
    });

    print_status_updates(status_rx);

    let curve = worker
        .join()
        .map_err(|_| anyhow!("measurement thread panicked"))?
        .context("measurement failed")?;

    print_summary(&curve);

    let json = serde_json::to_string_pretty(&curve).context("serializing response curve")?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("writing {}", args.output))?;
    println!("Wrote {} ({} points per curve)", args.output, curve.peak.len());

    Ok(())
}

/// Drains the status channel until the session drops its sender.
///
/// Termination relies on the worker closure owning `status_tx`: when
/// the run returns (or panics) the sender drops, the channel closes and
/// this loop ends, which is what lets `main` reach `worker.join()`.
/// Keep the sender owned by the worker.
fn print_status_updates(status_rx: Receiver<StatusUpdate>) {
    for update in status_rx {
        println!("[{:?}] {}", update.state, update.message);
    }
}

/// Prints a short excerpt of the measured curve.
fn print_summary(curve: &ResponseCurve) {
    if curve.peak.is_empty() {
        println!("No response points were produced (empty capture).");
        return;
    }

    let step = (curve.peak.len() / 8).max(1);
    println!("{:>10}  {:>9}  {:>9}", "freq (Hz)", "peak (dB)", "rms (dB)");
    for (p, r) in curve.peak.iter().zip(&curve.rms).step_by(step) {
        println!(
            "{:>10.1}  {:>9.1}  {:>9.1}",
            p.frequency_hz, p.level_db, r.level_db
        );
    }
}
