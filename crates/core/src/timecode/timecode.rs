use std::fmt;

use crate::error::TimecodeError;

/// Length of a well-formed `HH:MM:SS:FF` string.
pub const TIMECODE_TEXT_LEN: usize = 11;

/// Tolerance, in frames, absorbed before flooring the frame field.
const FRAME_EPSILON: f64 = 1e-6;

/// A split `HH:MM:SS:FF` timecode at a given frame rate.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
pub struct TimeCode {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub frames: u32,
    pub frame_rate: u32,
}

impl TimeCode {
    /// Parses `HH:MM:SS:FF`. Exactly four fields of ASCII digits are required,
    /// two digits each except the hours which may run longer, and the frame
    /// field must be below the frame rate.
    pub fn parse(text: &str, frame_rate: u32) -> Result<Self, TimecodeError> {
        if frame_rate == 0 {
            return Err(TimecodeError::ZeroFrameRate);
        }

        let parts: Vec<&str> = text.split(':').collect();
        if parts.len() != 4 {
            return Err(TimecodeError::Format(text.to_string()));
        }

        let field = |s: &str, hours: bool| -> Result<u32, TimecodeError> {
            let width_ok = if hours { s.len() >= 2 } else { s.len() == 2 };
            if !width_ok || !s.bytes().all(|b| b.is_ascii_digit()) {
                return Err(TimecodeError::Format(text.to_string()));
            }
            s.parse::<u32>()
                .map_err(|_| TimecodeError::Format(text.to_string()))
        };

        let timecode = Self {
            hours: field(parts[0], true)?,
            minutes: field(parts[1], false)?,
            seconds: field(parts[2], false)?,
            frames: field(parts[3], false)?,
            frame_rate,
        };

        if timecode.frames >= frame_rate {
            return Err(TimecodeError::Format(text.to_string()));
        }

        Ok(timecode)
    }

    /// Splits a seconds value into fields. Negative and non-finite inputs
    /// clamp to zero.
    pub fn from_seconds(seconds: f64, frame_rate: u32) -> Result<Self, TimecodeError> {
        if frame_rate == 0 {
            return Err(TimecodeError::ZeroFrameRate);
        }

        let mut remaining = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };

        let hours = (remaining / 3600.0).floor();
        remaining %= 3600.0;
        let minutes = (remaining / 60.0).floor();
        remaining %= 60.0;
        let whole_seconds = remaining.floor();
        let frames = ((remaining - whole_seconds) * frame_rate as f64 + FRAME_EPSILON).floor();

        Ok(Self {
            hours: hours as u32,
            minutes: minutes as u32,
            seconds: whole_seconds as u32,
            frames: (frames as u32).min(frame_rate - 1),
            frame_rate,
        })
    }

    pub fn to_seconds(&self) -> f64 {
        self.hours as f64 * 3600.0
            + self.minutes as f64 * 60.0
            + self.seconds as f64
            + self.frames as f64 / self.frame_rate as f64
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hours, self.minutes, self.seconds, self.frames
        )
    }
}

/// Converts `HH:MM:SS:FF` text into seconds.
pub fn decode(text: &str, fps: u32) -> Result<f64, TimecodeError> {
    TimeCode::parse(text, fps).map(|tc| tc.to_seconds())
}

/// Converts seconds into zero-padded `HH:MM:SS:FF` text.
pub fn encode(seconds: f64, fps: u32) -> Result<String, TimecodeError> {
    TimeCode::from_seconds(seconds, fps).map(|tc| tc.to_string())
}

/// Normalizes timecode text reported by a console. Anything that is not an
/// eleven character `HH:MM:SS:FF` string, or fails to decode, is absent.
pub fn decode_remote(text: &str, fps: u32) -> Option<f64> {
    if text.len() != TIMECODE_TEXT_LEN {
        return None;
    }

    match decode(text, fps) {
        Ok(seconds) => Some(seconds),
        Err(e) => {
            log::debug!("Ignoring remote timecode {:?}: {}", text, e);
            None
        }
    }
}
