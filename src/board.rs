//! Board adapter: sensor sampling and message display behind one capability
//! surface. The kit named in the config selects a variant at startup; the
//! `gpio` feature gates the real Grove kit driver, and without it the
//! simulated board is the only selectable kit.

use anyhow::{bail, Result};
use chrono::{Timelike, Utc};
use tracing::info;

#[cfg(feature = "gpio")]
mod grove;

// ---------------------------------------------------------------------------
// Capability surface
// ---------------------------------------------------------------------------

/// Closed set of board implementations.
///
/// Enum dispatch instead of trait objects: the set of supported kits is
/// fixed at compile time and selected by `from_kit`.
#[derive(Debug)]
pub enum Board {
    /// Simulated sensors for development without hardware.
    Sim(SimBoard),
    /// Grove starter kit: ADS1115 ADC + JHD1313 LCD over I2C.
    #[cfg(feature = "gpio")]
    Grove(grove::GroveBoard),
    /// Fixed readings for tests.
    #[cfg(test)]
    Fixed(FixedBoard),
}

impl Board {
    /// Construct the board named by the config `kit` value.
    pub fn from_kit(kit: &str) -> Result<Self> {
        match kit {
            "sim" => Ok(Self::Sim(SimBoard::new())),
            #[cfg(feature = "gpio")]
            "grove" => Ok(Self::Grove(grove::GroveBoard::new()?)),
            #[cfg(not(feature = "gpio"))]
            "grove" => bail!("kit 'grove' requires building with the `gpio` feature"),
            other => bail!("unknown board kit '{other}' (expected 'sim' or 'grove')"),
        }
    }

    /// Current soil moisture, normalised to 0.0 (dry) ..= 1.0 (wet).
    pub fn sample_moisture(&self) -> Result<f32> {
        match self {
            Self::Sim(b) => Ok(b.sample_moisture()),
            #[cfg(feature = "gpio")]
            Self::Grove(b) => b.sample_moisture(),
            #[cfg(test)]
            Self::Fixed(b) => b.sample_moisture(),
        }
    }

    /// Current ambient light level in lux.
    pub fn sample_lux(&self) -> Result<f32> {
        match self {
            Self::Sim(b) => Ok(b.sample_lux()),
            #[cfg(feature = "gpio")]
            Self::Grove(b) => b.sample_lux(),
            #[cfg(test)]
            Self::Fixed(b) => b.sample_lux(),
        }
    }

    /// Show `text` on the board display.
    pub fn write_message(&self, text: &str) -> Result<()> {
        match self {
            Self::Sim(b) => {
                b.write_message(text);
                Ok(())
            }
            #[cfg(feature = "gpio")]
            Self::Grove(b) => b.write_message(text),
            #[cfg(test)]
            Self::Fixed(b) => b.write_message(text),
        }
    }

    #[cfg(test)]
    pub fn fixed(moisture: f32, lux: f32) -> Self {
        Self::Fixed(FixedBoard::new(moisture, lux))
    }

    #[cfg(test)]
    pub fn as_fixed(&self) -> &FixedBoard {
        match self {
            Self::Fixed(b) => b,
            _ => panic!("not a fixed board"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gaussian approximation (no extra dependency)
// ---------------------------------------------------------------------------

/// Approximate a sample from N(0,1) using the Irwin-Hall method:
/// sum of 12 uniform [0,1) values minus 6.
fn approx_std_normal() -> f32 {
    let mut sum: f32 = 0.0;
    for _ in 0..12 {
        sum += fastrand::f32();
    }
    sum - 6.0
}

/// Sample from N(mean, sigma).
fn gaussian(mean: f32, sigma: f32) -> f32 {
    mean + sigma * approx_std_normal()
}

// ---------------------------------------------------------------------------
// Simulated board
// ---------------------------------------------------------------------------

/// Moisture hovers around mid-range with mild electronic noise.
const SIM_MOISTURE_CENTER: f32 = 0.42;
const SIM_MOISTURE_SIGMA: f32 = 0.05;

/// Daylight hours (UTC) for the simulated diurnal lux cycle.
const SIM_DAY_HOURS: std::ops::Range<u32> = 6..20;
const SIM_LUX_DAY: f32 = 350.0;
const SIM_LUX_NIGHT: f32 = 0.5;

#[derive(Debug)]
pub struct SimBoard;

impl SimBoard {
    pub fn new() -> Self {
        info!("[sim-board] initialised (no hardware)");
        Self
    }

    pub fn sample_moisture(&self) -> f32 {
        gaussian(SIM_MOISTURE_CENTER, SIM_MOISTURE_SIGMA).clamp(0.0, 1.0)
    }

    pub fn sample_lux(&self) -> f32 {
        let base = if SIM_DAY_HOURS.contains(&Utc::now().hour()) {
            SIM_LUX_DAY
        } else {
            SIM_LUX_NIGHT
        };
        gaussian(base, base * 0.1).max(0.0)
    }

    pub fn write_message(&self, text: &str) {
        info!("[sim-board] display: {text}");
    }
}

impl Default for SimBoard {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Fixed board (tests only)
// ---------------------------------------------------------------------------

#[cfg(test)]
#[derive(Debug)]
pub struct FixedBoard {
    moisture: std::sync::Mutex<f32>,
    lux: std::sync::Mutex<f32>,
    failing: std::sync::atomic::AtomicBool,
    display_failing: std::sync::atomic::AtomicBool,
    messages: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FixedBoard {
    fn new(moisture: f32, lux: f32) -> Self {
        Self {
            moisture: std::sync::Mutex::new(moisture),
            lux: std::sync::Mutex::new(lux),
            failing: std::sync::atomic::AtomicBool::new(false),
            display_failing: std::sync::atomic::AtomicBool::new(false),
            messages: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn set_moisture(&self, value: f32) {
        *self.moisture.lock().unwrap() = value;
    }

    pub fn set_lux(&self, value: f32) {
        *self.lux.lock().unwrap() = value;
    }

    /// Make every board call fail, for tick-isolation tests.
    pub fn set_failing(&self, failing: bool) {
        self.failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    /// Make only `write_message` fail, leaving the sensors healthy.
    pub fn set_display_failing(&self, failing: bool) {
        self.display_failing
            .store(failing, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn check_failing(&self) -> Result<()> {
        if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
            bail!("simulated board failure");
        }
        Ok(())
    }

    fn sample_moisture(&self) -> Result<f32> {
        self.check_failing()?;
        Ok(*self.moisture.lock().unwrap())
    }

    fn sample_lux(&self) -> Result<f32> {
        self.check_failing()?;
        Ok(*self.lux.lock().unwrap())
    }

    fn write_message(&self, text: &str) -> Result<()> {
        self.check_failing()?;
        if self.display_failing.load(std::sync::atomic::Ordering::SeqCst) {
            bail!("simulated display failure");
        }
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================
