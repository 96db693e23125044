//! `snn`: command-line interface for the LIF accelerator.
//!
//! ```text
//! USAGE:
//!   snn masks [--layer name:neurons:density]...   Generate connections_<i>.mem files
//!   snn step --x <bits> --w <bits>                Run the reference neuron model
//!   snn run <scenario.toml>                       Drive a scenario on the software die
//!   snn layouts                                   Show bus presets and their frames
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use snn_chip::bus::{BusLayout, Mode};
use snn_driver::{BitVector, NeuronParams, ProtocolFrame, ScenarioConfig};
use snn_masks::{default_file_name, LayerPipeline, MaskGenerator};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "snn", about = "LIF accelerator tools", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Generate sparse connectivity masks, one file per layer.
    Masks {
        /// Width of the external input vector.
        #[arg(long, default_value_t = snn_chip::topology::INPUT_WIDTH)]
        input_width: usize,
        /// Layer as `name:neurons:density`; repeat in order. Defaults to the shuttle plan.
        #[arg(long = "layer", value_parser = parse_layer)]
        layers: Vec<(String, usize, f64)>,
        /// Seed for reproducible masks.
        #[arg(long)]
        seed: Option<u64>,
        /// Output directory.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Run the reference neuron model with constant input and weights.
    Step {
        /// Input bits (decimal, 0x.. or 0b..).
        #[arg(long, value_parser = parse_bits)]
        x: u64,
        /// Weight bits (decimal, 0x.. or 0b..).
        #[arg(long, value_parser = parse_bits)]
        w: u64,
        /// Vector width in bits.
        #[arg(long, default_value_t = 8)]
        width: usize,
        /// Decay shift (0 = no leak).
        #[arg(long, default_value_t = snn_chip::topology::reset_state::SHIFT)]
        shift: u32,
        /// Firing threshold.
        #[arg(long, default_value_t = snn_chip::topology::reset_state::THRESHOLD)]
        threshold: i32,
        /// Number of steps.
        #[arg(long, default_value_t = 1)]
        steps: usize,
    },
    /// Drive a scenario file on the software die and check it against the model.
    Run {
        /// Scenario TOML file.
        scenario: PathBuf,
        /// Print every bus word driven.
        #[arg(long)]
        bus_log: bool,
    },
    /// List bus presets and the frame each mode encodes to.
    Layouts,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Masks {
            input_width,
            layers,
            seed,
            out,
        } => cmd_masks(input_width, &layers, seed, &out)?,
        Cmd::Step {
            x,
            w,
            width,
            shift,
            threshold,
            steps,
        } => cmd_step(x, w, width, shift, threshold, steps)?,
        Cmd::Run { scenario, bus_log } => cmd_run(&scenario, bus_log)?,
        Cmd::Layouts => cmd_layouts(),
    }

    Ok(())
}

fn cmd_masks(
    input_width: usize,
    layers: &[(String, usize, f64)],
    seed: Option<u64>,
    out: &Path,
) -> Result<()> {
    let plan = if layers.is_empty() {
        LayerPipeline::default_layers(input_width)
    } else {
        layers
            .iter()
            .fold(LayerPipeline::new(input_width), |p, (name, neurons, density)| {
                p.layer(name.clone(), *neurons, *density)
            })
    };

    let mut generator = MaskGenerator::new(seed);
    let output = plan.generate(&mut generator)?;
    std::fs::create_dir_all(out).with_context(|| format!("creating {}", out.display()))?;
    let paths = output.write_files(out, |i, _| default_file_name(i))?;

    for (stage, path) in output.layers.iter().zip(&paths) {
        println!(
            "{:<10} {:>3}×{:<3} {}  → {}",
            stage.layer.name(),
            stage.layer.neuron_count(),
            stage.layer.fan_in(),
            stage.report,
            path.display()
        );
    }
    println!("total      {}", output.total);
    if let Some(seed) = generator.seed() {
        println!("seed       {seed}");
    }
    Ok(())
}

fn cmd_step(x: u64, w: u64, width: usize, shift: u32, threshold: i32, steps: usize) -> Result<()> {
    let xv = BitVector::from_u64(x, width)?;
    let wv = BitVector::from_u64(w, width)?;
    let params = NeuronParams::new(shift, threshold)?;

    println!("x   = {xv}");
    println!("w   = {wv}");
    println!("psp = {}", snn_driver::psp(&xv, &wv)?);
    println!();
    println!("step  spike  u");
    for (i, out) in snn_driver::spike_train(&xv, &wv, params, steps)?
        .iter()
        .enumerate()
    {
        println!("{:>4}  {:>5}  {}", i + 1, u8::from(out.spike), out.u);
    }
    Ok(())
}

fn cmd_run(path: &Path, bus_log: bool) -> Result<()> {
    let config = ScenarioConfig::from_file(path)
        .with_context(|| format!("loading scenario {}", path.display()))?;
    let report = snn_driver::run_software(&config)
        .with_context(|| format!("scenario {:?} failed", config.name))?;

    println!("Scenario     : {}", report.name);
    println!("Bus          : {:?}", config.bus);
    println!("Die          : {} neurons × {} inputs", config.neuron_count, config.fan_in);
    let cycles = report.capture.cycles();
    println!(
        "Cycles       : {cycles} ({} µs at the bring-up clock)",
        cycles as u64 * snn_chip::timing::CLOCK_PERIOD_US
    );
    println!("Samples      : {}", report.capture.len());
    println!("Result       : matches reference model");
    println!();
    for (i, count) in report.spike_counts().iter().enumerate() {
        let train: String = report
            .capture
            .spikes(i)
            .iter()
            .map(|&s| if s { '|' } else { '.' })
            .collect();
        println!("n{i:<3} {count:>3}  {train}");
    }

    if let Some(pwm) = report.capture.pwm() {
        let estimate = snn_driver::pwm_estimate(&pwm, 5);
        if let Some(last) = estimate.last() {
            println!("PWM estimate : {last:.2}");
        }
    }

    if bus_log {
        let layout = config.layout()?;
        println!();
        for (cycle, &word) in report.capture.bus.iter().enumerate() {
            let frame = ProtocolFrame::decode(&layout, word);
            let mode = match frame.selected_mode(&layout) {
                Some(mode) => mode.to_string(),
                None if !frame.n_reset => "RESET".to_string(),
                None => format!("?{:#x}", frame.mode_code),
            };
            println!("{cycle:>5}  {word:#010x}  {mode:<13} data={:#04x}", frame.data);
        }
    }
    Ok(())
}

fn cmd_layouts() {
    for (name, layout) in BusLayout::PRESETS {
        println!(
            "{name}: n_reset bit {}, mode bits {}..{}, data bits {}..{}, {:?}",
            layout.n_reset_bit,
            layout.mode_offset,
            layout.mode_offset + layout.mode_width - 1,
            layout.data_offset,
            layout.data_offset + layout.data_width - 1,
            layout.word_order
        );
        println!("  {:<13} {:#010x}", "reset", ProtocolFrame::reset().encode(&layout));
        println!("  {:<13} {:#010x}", "release", ProtocolFrame::release().encode(&layout));
        for mode in Mode::ALL {
            let frame = ProtocolFrame::mode(&layout, mode, 0);
            println!(
                "  {:<13} {:#010x}  (code {:#x})",
                mode.to_string(),
                frame.encode(&layout),
                frame.mode_code
            );
        }
        println!();
    }
}

fn parse_bits(s: &str) -> Result<u64> {
    let clean = s.replace('_', "");
    let value = if let Some(hex) = clean.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = clean.strip_prefix("0b") {
        u64::from_str_radix(bin, 2)
    } else {
        clean.parse()
    };
    value.with_context(|| format!("not a number: {s}"))
}

fn parse_layer(s: &str) -> Result<(String, usize, f64)> {
    let parts: Vec<&str> = s.split(':').collect();
    let [name, neurons, density] = parts.as_slice() else {
        bail!("expected name:neurons:density, got {s}");
    };
    let neurons = neurons
        .parse()
        .with_context(|| format!("bad neuron count in {s}"))?;
    let density = density
        .parse()
        .with_context(|| format!("bad density in {s}"))?;
    Ok(((*name).to_string(), neurons, density))
}
