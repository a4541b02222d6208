//! Room temperature/humidity probe.
//!
//! Reading the sensor can always fail (wire noise, checksum mismatch, no
//! hardware at all); unavailability is a value, not an error, and turns
//! into the literal `"N/A"` only at the JSON edge. The DHT22 backend is
//! feature-gated so the crate builds on non-Pi systems.

use serde::{Deserialize, Serialize};

/// One valid reading from the climate sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Room temperature in degrees Celsius
    pub temperature: f64,
    /// Relative humidity in percent
    pub humidity: f64,
}

impl SensorReading {
    /// Whether the values fall inside the DHT22's rated range.
    pub fn is_plausible(&self) -> bool {
        (-40.0..=80.0).contains(&self.temperature) && (0.0..=100.0).contains(&self.humidity)
    }
}

/// A source of climate readings.
///
/// `read` must never panic past this boundary; any internal failure is
/// reported as `None`.
pub trait ClimateProbe: Send {
    fn read(&mut self) -> Option<SensorReading>;
}

/// Probe for systems without a climate sensor; always unavailable.
pub struct NullProbe;

impl ClimateProbe for NullProbe {
    fn read(&mut self) -> Option<SensorReading> {
        None
    }
}

#[cfg(feature = "gpio")]
pub use dht22::Dht22Probe;

#[cfg(feature = "gpio")]
mod dht22 {
    use super::{ClimateProbe, SensorReading};
    use crate::error::{Error, Result};
    use rppal::gpio::{Gpio, IoPin, Mode, PullUpDown};
    use std::thread;
    use std::time::{Duration, Instant};
    use tracing::debug;

    /// The sensor cannot be polled faster than this; reads inside the
    /// window return the cached value.
    const MIN_POLL_INTERVAL: Duration = Duration::from_secs(2);

    /// Bit-banged DHT22 single-wire probe on a BCM GPIO pin.
    pub struct Dht22Probe {
        pin: IoPin,
        last: Option<(Instant, SensorReading)>,
    }

    impl Dht22Probe {
        pub fn new(bcm_pin: u8) -> Result<Self> {
            let gpio = Gpio::new()
                .map_err(|e| Error::config_error(format!("GPIO init: {}", e)))?;
            let pin = gpio
                .get(bcm_pin)
                .map_err(|e| Error::config_error(format!("GPIO pin {}: {}", bcm_pin, e)))?
                .into_io(Mode::Input);
            Ok(Self { pin, last: None })
        }

        /// One full wire exchange: start signal, sensor ack, 40 data bits.
        fn exchange(&mut self) -> Option<SensorReading> {
            // Host start signal: hold the line low for >1 ms, then release
            self.pin.set_mode(Mode::Output);
            self.pin.set_low();
            thread::sleep(Duration::from_millis(2));
            self.pin.set_mode(Mode::Input);
            self.pin.set_pullupdown(PullUpDown::Up);

            // Sensor ack: ~80 us low, ~80 us high
            wait_for(&self.pin, false, 200)?;
            wait_for(&self.pin, true, 200)?;
            wait_for(&self.pin, false, 200)?;

            // 40 bits, each a ~50 us low followed by a high whose length
            // encodes the bit (~27 us = 0, ~70 us = 1)
            let mut bytes = [0u8; 5];
            for i in 0..40 {
                wait_for(&self.pin, true, 150)?;
                let high_us = wait_for(&self.pin, false, 150)?;
                if high_us > 45 {
                    bytes[i / 8] |= 1 << (7 - (i % 8));
                }
            }

            decode(&bytes)
        }
    }

    impl ClimateProbe for Dht22Probe {
        fn read(&mut self) -> Option<SensorReading> {
            if let Some((at, reading)) = self.last {
                if at.elapsed() < MIN_POLL_INTERVAL {
                    return Some(reading);
                }
            }
            match self.exchange() {
                Some(reading) => {
                    self.last = Some((Instant::now(), reading));
                    Some(reading)
                }
                None => {
                    debug!("DHT22 exchange failed");
                    None
                }
            }
        }
    }

    /// Busy-wait until the line reaches `level`, returning the elapsed
    /// microseconds, or `None` on timeout. The pulses are tens of
    /// microseconds, far below what a sleep can resolve.
    fn wait_for(pin: &IoPin, level: bool, timeout_us: u64) -> Option<u64> {
        let start = Instant::now();
        let timeout = Duration::from_micros(timeout_us);
        while pin.is_high() != level {
            if start.elapsed() > timeout {
                return None;
            }
        }
        Some(start.elapsed().as_micros() as u64)
    }

    fn decode(bytes: &[u8; 5]) -> Option<SensorReading> {
        let sum = bytes[0]
            .wrapping_add(bytes[1])
            .wrapping_add(bytes[2])
            .wrapping_add(bytes[3]);
        if sum != bytes[4] {
            return None;
        }

        let humidity = u16::from_be_bytes([bytes[0], bytes[1]]) as f64 / 10.0;
        let raw_temp = u16::from_be_bytes([bytes[2], bytes[3]]);
        let mut temperature = (raw_temp & 0x7fff) as f64 / 10.0;
        if raw_temp & 0x8000 != 0 {
            temperature = -temperature;
        }

        let reading = SensorReading {
            temperature,
            humidity,
        };
        reading.is_plausible().then_some(reading)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_probe_is_unavailable() {
        let mut probe = NullProbe;
        assert!(probe.read().is_none());
    }

    #[test]
    fn test_plausibility_bounds() {
        let ok = SensorReading {
            temperature: 21.5,
            humidity: 40.0,
        };
        assert!(ok.is_plausible());

        let too_cold = SensorReading {
            temperature: -60.0,
            humidity: 40.0,
        };
        assert!(!too_cold.is_plausible());

        let too_wet = SensorReading {
            temperature: 20.0,
            humidity: 130.0,
        };
        assert!(!too_wet.is_plausible());
    }

    #[test]
    fn test_reading_serializes_as_pair() {
        let reading = SensorReading {
            temperature: 21.5,
            humidity: 40.0,
        };
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["temperature"], 21.5);
        assert_eq!(json["humidity"], 40.0);
    }
}
