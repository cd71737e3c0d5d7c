//! Grove kit driver: soil moisture and light sensors behind an ADS1115
//! 16-bit ADC, plus a JHD1313 16x2 LCD for alert messages, all over I2C.
//!
//! ADC reads are single-ended at PGA ±4.096 V, 128 SPS, single-shot mode.
//! With the sensors powered from 3.3 V the usable range tops out around
//! 26400 counts.

use anyhow::{Context, Result};
use rppal::i2c::I2c;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

// ── I2C addresses ───────────────────────────────────────────────────────────

/// ADS1115 with ADDR tied to GND.
const ADC_ADDR: u16 = 0x48;
/// JHD1313 text controller.
const LCD_ADDR: u16 = 0x3e;

// ── ADS1115 register addresses ──────────────────────────────────────────────

/// Conversion result register (read-only, 16-bit signed).
const REG_CONVERSION: u8 = 0x00;
/// Configuration register (read/write).
const REG_CONFIG: u8 = 0x01;

// ── Config register bit fields ──────────────────────────────────────────────
//
// Layout (MSB first):
//   [15]    OS       — write 1 to start single-shot conversion
//   [14:12] MUX      — input multiplexer (channel selection)
//   [11:9]  PGA      — programmable gain amplifier
//   [8]     MODE     — 0 = continuous, 1 = single-shot
//   [7:5]   DR       — data rate
//   [4:0]   comparator controls — 11 in [1:0] disables the comparator

/// Bits common to all channel reads:
///   OS=1 (start), PGA=001 (±4.096 V), MODE=1 (single-shot),
///   DR=100 (128 SPS), COMP_QUE=11 (comparator off).
const CONFIG_BASE: u16 = 0b1_000_001_1_100_0_0_0_11;

/// MUX values for single-ended reads (AINx vs GND).
const MUX_SHIFT: u8 = 12;
const MUX_SINGLE_ENDED: [u16; 4] = [0b100, 0b101, 0b110, 0b111];

/// Moisture probe on AIN0, light sensor on AIN1.
const MOISTURE_CHANNEL: usize = 0;
const LIGHT_CHANNEL: usize = 1;

/// Conversion time at 128 SPS is ~7.8 ms.  We wait 9 ms for margin.
const CONVERSION_WAIT: Duration = Duration::from_millis(9);

/// Bit 15 of the config register: conversion-ready flag when read.
const OS_READY_BIT: u16 = 1 << 15;

// ── Sensor calibration ──────────────────────────────────────────────────────

/// Capacitive probe endpoints at 3.3 V: reading in air vs submerged.
const RAW_DRY: f32 = 26000.0;
const RAW_WET: f32 = 12000.0;

/// Coarse counts-per-lux mapping for the Grove light sensor divider at
/// 3.3 V: near-full-scale (~26400) corresponds to roughly 1000 lux.
const RAW_PER_LUX: f32 = 26.4;

// ── JHD1313 LCD ─────────────────────────────────────────────────────────────

/// Control byte prefixes: command register vs display data register.
const LCD_CMD: u8 = 0x80;
const LCD_DATA: u8 = 0x40;

const LCD_CLEAR: u8 = 0x01;
/// Function set: 2 lines, 5x8 font.
const LCD_FUNCTION_SET: u8 = 0x28;
/// Display on, cursor off, blink off.
const LCD_DISPLAY_ON: u8 = 0x0c;
/// DDRAM address of the second line.
const LCD_LINE2: u8 = 0x80 | 0x40;

const LCD_COLS: usize = 16;

// ── Conversions ─────────────────────────────────────────────────────────────

/// Build the config register value for a single-ended read on `channel`.
fn config_for_channel(channel: usize) -> u16 {
    CONFIG_BASE | (MUX_SINGLE_ENDED[channel] << MUX_SHIFT)
}

/// Normalise a raw moisture reading to 0.0 (dry) ..= 1.0 (wet).
fn moisture_from_raw(raw: i16) -> f32 {
    ((RAW_DRY - raw as f32) / (RAW_DRY - RAW_WET)).clamp(0.0, 1.0)
}

/// Approximate lux from a raw light sensor reading.
fn lux_from_raw(raw: i16) -> f32 {
    (raw.max(0) as f32) / RAW_PER_LUX
}

// ── Driver ──────────────────────────────────────────────────────────────────

/// Grove board backed by `rppal::i2c`.  The bus handle is shared between
/// the ADC and the LCD, so it is guarded for exclusive access per
/// transaction.
pub struct GroveBoard {
    bus: Mutex<I2c>,
}

impl std::fmt::Debug for GroveBoard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroveBoard").finish_non_exhaustive()
    }
}

impl GroveBoard {
    /// Open I2C bus 1 and initialise the LCD.
    pub fn new() -> Result<Self> {
        let i2c = I2c::new().context("failed to open I2C bus")?;
        let board = Self {
            bus: Mutex::new(i2c),
        };
        board.lcd_init().context("failed to initialise LCD")?;
        tracing::info!(
            adc = format_args!("0x{ADC_ADDR:02x}"),
            lcd = format_args!("0x{LCD_ADDR:02x}"),
            "grove board initialised"
        );
        Ok(board)
    }

    pub fn sample_moisture(&self) -> Result<f32> {
        let raw = self.read_channel(MOISTURE_CHANNEL)?;
        Ok(moisture_from_raw(raw))
    }

    pub fn sample_lux(&self) -> Result<f32> {
        let raw = self.read_channel(LIGHT_CHANNEL)?;
        Ok(lux_from_raw(raw))
    }

    /// Clear the display and show up to two 16-column lines of `text`.
    pub fn write_message(&self, text: &str) -> Result<()> {
        let mut bus = self.bus.lock().expect("i2c bus lock poisoned");
        bus.set_slave_address(LCD_ADDR)?;

        bus.write(&[LCD_CMD, LCD_CLEAR])?;
        // Clear needs more settling time than other commands.
        thread::sleep(Duration::from_millis(2));

        for (i, ch) in text.bytes().take(LCD_COLS * 2).enumerate() {
            if i == LCD_COLS {
                bus.write(&[LCD_CMD, LCD_LINE2])?;
            }
            bus.write(&[LCD_DATA, ch])?;
        }
        Ok(())
    }

    /// Perform a single-shot read on `channel`, returning the raw 16-bit
    /// signed value (0-32767 for single-ended).
    fn read_channel(&self, channel: usize) -> Result<i16> {
        let config = config_for_channel(channel);
        let config_bytes = config.to_be_bytes();

        let mut bus = self.bus.lock().expect("i2c bus lock poisoned");
        bus.set_slave_address(ADC_ADDR)?;

        // Write config register to start conversion.
        bus.block_write(REG_CONFIG, &config_bytes)?;

        // Wait for conversion to complete.
        thread::sleep(CONVERSION_WAIT);

        // Poll the OS bit to confirm conversion is done.  Normally one wait
        // is enough at 128 SPS; we retry briefly to be safe.
        for _ in 0..3 {
            let mut buf = [0u8; 2];
            bus.block_read(REG_CONFIG, &mut buf)?;
            let status = u16::from_be_bytes(buf);
            if status & OS_READY_BIT != 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }

        // Read the conversion result.
        let mut buf = [0u8; 2];
        bus.block_read(REG_CONVERSION, &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    fn lcd_init(&self) -> Result<()> {
        let mut bus = self.bus.lock().expect("i2c bus lock poisoned");
        bus.set_slave_address(LCD_ADDR)?;
        for cmd in [LCD_FUNCTION_SET, LCD_DISPLAY_ON, LCD_CLEAR] {
            bus.write(&[LCD_CMD, cmd])?;
            thread::sleep(Duration::from_millis(2));
        }
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
