//! Moisture sampling and grow-light checks: the two periodic loops, and the
//! on/off assertions shared with the manual web triggers.
//!
//! Tick isolation: a failing check is logged and recorded as an error
//! event; it never cancels future ticks of either loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Timelike, Utc};
use tracing::{error, info, warn};

use crate::board::Board;
use crate::sms::SmsClient;
use crate::state::SharedState;

/// Lux floor the light sensor must reach when the light is scheduled on.
pub const LUX_ON_MIN: f32 = 2.0;
/// Lux ceiling when the light is scheduled off. Readings inside the
/// (2.0, 4.0) band alert in neither direction, absorbing sensor noise.
pub const LUX_OFF_MAX: f32 = 4.0;

/// Message shown on the board display when a light check fails.
const ALERT_DISPLAY_TEXT: &str = "Lighting alert";
/// Text of the outbound alert SMS.
const ALERT_SMS_TEXT: &str = "Lighting alert.";

// ---------------------------------------------------------------------------
// Checks
// ---------------------------------------------------------------------------

/// Sample soil moisture and append it to the bounded history.
pub async fn check_moisture(board: &Board, shared: &SharedState) -> Result<()> {
    let value = board.sample_moisture().context("moisture sample failed")?;
    let now = Utc::now();
    info!(moisture = value, "moisture check");

    let mut st = shared.write().await;
    st.record_moisture(now, value);
    Ok(())
}

/// Light check for the current UTC hour.
pub async fn check_lights(board: &Board, shared: &SharedState, sms: &SmsClient) -> Result<()> {
    let hour = Utc::now().hour() as u8;
    check_lights_at(hour, board, shared, sms).await
}

/// Light check for a specific hour. Hours absent from the schedule read as
/// all-false and take the off branch; the `off` flag itself is never
/// consulted.
pub async fn check_lights_at(
    hour: u8,
    board: &Board,
    shared: &SharedState,
    sms: &SmsClient,
) -> Result<()> {
    let window = { shared.read().await.light_window(hour) };
    info!(hour, expect_on = window.on, "light check");

    if window.on {
        assert_on(board, shared, sms).await
    } else {
        assert_off(board, shared, sms).await
    }
}

/// Verify the sensed light level agrees with an on-expectation.
pub async fn assert_on(board: &Board, shared: &SharedState, sms: &SmsClient) -> Result<()> {
    {
        shared.write().await.record_lights(true);
    }
    let lux = board.sample_lux().context("lux sample failed")?;

    if lux < LUX_ON_MIN {
        warn!(lux, "light on check failed");
        alert(board, shared, sms).await
    } else {
        info!(lux, "light on check passed");
        Ok(())
    }
}

/// Verify the sensed light level agrees with an off-expectation.
pub async fn assert_off(board: &Board, shared: &SharedState, sms: &SmsClient) -> Result<()> {
    {
        shared.write().await.record_lights(false);
    }
    let lux = board.sample_lux().context("lux sample failed")?;

    if lux > LUX_OFF_MAX {
        warn!(lux, "light off check failed");
        alert(board, shared, sms).await
    } else {
        info!(lux, "light off check passed");
        Ok(())
    }
}

/// Raise a lighting alert: board display message plus SMS. No debounce; a
/// sustained fault alerts once per failing check.
async fn alert(board: &Board, shared: &SharedState, sms: &SmsClient) -> Result<()> {
    {
        shared
            .write()
            .await
            .record_alert("lighting alert triggered".to_string());
    }
    board
        .write_message(ALERT_DISPLAY_TEXT)
        .context("alert display failed")?;
    sms.send(ALERT_SMS_TEXT).await.context("alert sms failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Periodic loops
// ---------------------------------------------------------------------------

/// Moisture sampling loop. Intended to be `tokio::spawn`-ed from main.
///
/// The first tick fires one full interval after start: the synchronous
/// priming sample in `main` covers t=0.
pub async fn run_moisture(board: Arc<Board>, shared: SharedState, every: Duration) {
    info!(every_sec = every.as_secs(), "moisture loop started");
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);

    loop {
        ticker.tick().await;
        if let Err(e) = check_moisture(&board, &shared).await {
            error!("moisture check failed: {e:#}");
            let mut st = shared.write().await;
            st.record_error(format!("moisture check failed: {e:#}"));
        }
    }
}

/// Hourly light check loop, aligned to the top of each hour (all 24 hours).
/// Intended to be `tokio::spawn`-ed from main.
pub async fn run_lights(board: Arc<Board>, shared: SharedState, sms: Arc<SmsClient>) {
    info!("light check loop started");

    loop {
        tokio::time::sleep(until_next_hour()).await;
        if let Err(e) = check_lights(&board, &shared, &sms).await {
            error!("light check failed: {e:#}");
            let mut st = shared.write().await;
            st.record_error(format!("light check failed: {e:#}"));
        }
    }
}

/// Duration until the next top-of-hour boundary.
fn until_next_hour() -> Duration {
    let now = Utc::now();
    let into_hour = u64::from(now.minute()) * 60 + u64::from(now.second());
    Duration::from_secs(3600 - into_hour)
}

// ===========================================================================
// Tests
// ===========================================================================
