//! Validation gate for incoming readings. Runs before any shared state is
//! touched; a reading that fails here is never created.

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use crate::core::reading::{round2, RawReading, Reading, DEFAULT_DEVICE_ID};

/// Inclusive pH domain.
pub const PH_MIN: f64 = 0.0;
pub const PH_MAX: f64 = 14.0;

/// Inclusive turbidity domain, in NTU.
pub const TURBIDITY_MIN: f64 = 0.0;
pub const TURBIDITY_MAX: f64 = 3000.0;

/// Reasons a submission is rejected. Each rejects the submission entirely;
/// there is no partial acceptance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("ph and turbidity must be present and numeric")]
    MalformedInput,
    #[error("ph value {0} is outside {PH_MIN}..={PH_MAX}")]
    PhOutOfRange(f64),
    #[error("turbidity value {0} is outside {TURBIDITY_MIN}..={TURBIDITY_MAX} NTU")]
    TurbidityOutOfRange(f64),
}

impl ValidationError {
    /// The stable constraint name reported on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            ValidationError::MalformedInput => "MalformedInput",
            ValidationError::PhOutOfRange(_) => "PhOutOfRange",
            ValidationError::TurbidityOutOfRange(_) => "TurbidityOutOfRange",
        }
    }
}

/// Range-checks a raw submission and mints the accepted [`Reading`].
///
/// Values are rounded to two decimals, the timestamp is assigned here
/// (server time, never the client's), and a missing device label falls
/// back to [`DEFAULT_DEVICE_ID`].
pub fn validate(raw: RawReading) -> Result<Reading, ValidationError> {
    // serde_json never produces NaN or infinities, but the gate is also
    // used on readings built in-process.
    if !raw.ph.is_finite() || !raw.turbidity.is_finite() {
        return Err(ValidationError::MalformedInput);
    }
    if raw.ph < PH_MIN || raw.ph > PH_MAX {
        return Err(ValidationError::PhOutOfRange(raw.ph));
    }
    if raw.turbidity < TURBIDITY_MIN || raw.turbidity > TURBIDITY_MAX {
        return Err(ValidationError::TurbidityOutOfRange(raw.turbidity));
    }

    let device_id = raw
        .device_id
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string());

    Ok(Reading {
        id: Uuid::new_v4().to_string(),
        ph: round2(raw.ph),
        turbidity: round2(raw.turbidity),
        timestamp: Utc::now(),
        device_id,
    })
}
