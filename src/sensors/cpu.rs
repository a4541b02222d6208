//! CPU clock and temperature adapters.
//!
//! Both go through `vcgencmd` the way the Pi firmware tooling expects;
//! temperature falls back to the kernel thermal zone. Every failure mode
//! (missing binary, bad exit status, parse error) collapses to `None`;
//! the HTTP layer renders that as `"N/A"`, nothing propagates.

use std::fs;
use std::process::Command;

use tracing::debug;

/// Injectable pair of CPU adapters, so handlers can be exercised with
/// failing implementations.
#[derive(Clone, Copy)]
pub struct CpuAdapters {
    pub clock: fn() -> Option<f64>,
    pub temp: fn() -> Option<f64>,
}

impl Default for CpuAdapters {
    fn default() -> Self {
        Self {
            clock: read_cpu_clock,
            temp: read_cpu_temp,
        }
    }
}

/// Current ARM core clock in MHz, or `None` when the query fails.
pub fn read_cpu_clock() -> Option<f64> {
    let output = run_vcgencmd(&["measure_clock", "arm"])?;
    parse_clock_output(&output)
}

/// CPU temperature in degrees Celsius, or `None` when both the firmware
/// query and the thermal-zone fallback fail.
pub fn read_cpu_temp() -> Option<f64> {
    if let Some(output) = run_vcgencmd(&["measure_temp"]) {
        if let Some(temp) = parse_temp_output(&output) {
            return Some(temp);
        }
    }
    read_thermal_zone()
}

fn run_vcgencmd(args: &[&str]) -> Option<String> {
    match Command::new("vcgencmd").args(args).output() {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => {
            debug!(args = ?args, status = %output.status, "vcgencmd failed");
            None
        }
        Err(e) => {
            debug!(args = ?args, error = %e, "vcgencmd not invocable");
            None
        }
    }
}

/// Parse `frequency(48)=1500398464` into MHz.
fn parse_clock_output(output: &str) -> Option<f64> {
    let hz: f64 = output.trim().split('=').nth(1)?.trim().parse().ok()?;
    Some(hz / 1_000_000.0)
}

/// Parse `temp=42.8'C` into degrees Celsius.
fn parse_temp_output(output: &str) -> Option<f64> {
    output
        .trim()
        .strip_prefix("temp=")?
        .trim_end_matches("'C")
        .parse()
        .ok()
}

/// Kernel thermal zone, reported in millidegrees.
fn read_thermal_zone() -> Option<f64> {
    let raw = fs::read_to_string("/sys/class/thermal/thermal_zone0/temp").ok()?;
    let millicelsius: i64 = raw.trim().parse().ok()?;
    Some(millicelsius as f64 / 1000.0)
}
