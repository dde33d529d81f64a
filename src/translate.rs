//! Value translation between normalized parameter values and hardware encodings
//!
//! Level and pan curves are lookup tables holding one strictly increasing
//! normalized value per raw step. Decoding is a table read; encoding picks the
//! nearest entry. That makes `to_hardware(from_hardware(r)) == r` exact for every
//! raw step and keeps encoding monotonic, whatever shape the curve has.

use crate::error::{MixerError, Result};
use crate::types::ParamValue;

/// Normalized fader position for a level in dB on a typical console fader
///
/// Four linear segments: -inf..-60, -60..-30, -30..-10 and -10..+10 dB, the
/// scale printed next to most motorized faders.
pub fn db_to_fader_position(db: f64) -> f64 {
    let pos = if db == f64::NEG_INFINITY {
        0.0
    } else if db >= -10.0 {
        (db + 30.0) / 40.0
    } else if db >= -30.0 {
        (db + 50.0) / 80.0
    } else if db >= -60.0 {
        (db + 70.0) / 160.0
    } else {
        (db + 90.0) / 480.0
    };
    pos.clamp(0.0, 1.0)
}

/// Table-driven curve over raw values `0..=max`
#[derive(Debug, Clone, PartialEq)]
pub struct CurveTable {
    values: Vec<f64>,
}

impl CurveTable {
    fn from_values(values: Vec<f64>) -> Self {
        debug_assert!(
            values.windows(2).all(|w| w[0] < w[1]),
            "curve table must be strictly increasing"
        );
        Self { values }
    }

    /// Highest raw value
    pub fn max_raw(&self) -> u16 {
        (self.values.len() - 1) as u16
    }

    fn lookup(&self, raw: u16) -> Result<f64> {
        self.values.get(raw as usize).copied().ok_or_else(|| {
            MixerError::Translation(format!("raw value {} outside 0..={}", raw, self.max_raw()))
        })
    }

    /// Nearest raw step for `v` (already clamped); ties resolve downward
    fn nearest(&self, v: f64) -> u16 {
        let idx = self.values.partition_point(|&x| x < v);
        if idx == 0 {
            return 0;
        }
        if idx >= self.values.len() {
            return self.max_raw();
        }
        let below = self.values[idx - 1];
        let above = self.values[idx];
        if (above - v) < (v - below) {
            idx as u16
        } else {
            (idx - 1) as u16
        }
    }
}

/// Per-parameter translator
#[derive(Debug, Clone, PartialEq)]
pub enum Translator {
    /// Fader travel in [0,1]
    Level(CurveTable),
    /// Pan in [-1,1]
    Pan(CurveTable),
    /// Boolean carried as two raw values
    Toggle { on: u16, off: u16 },
}

impl Translator {
    /// Fader where raw steps are evenly spaced along the travel
    pub fn linear(max: u16) -> Self {
        assert!(max > 0, "curve needs at least two steps");
        let values = (0..=max).map(|r| r as f64 / max as f64).collect();
        Translator::Level(CurveTable::from_values(values))
    }

    /// Fader whose raw steps follow the console's dB scale
    ///
    /// `raw_to_db` must be strictly increasing over `1..=max`; raw 0 is -inf.
    pub fn db_taper(max: u16, raw_to_db: impl Fn(u16) -> f64) -> Self {
        assert!(max > 0, "curve needs at least two steps");
        let values = (0..=max)
            .map(|r| {
                if r == 0 {
                    0.0
                } else {
                    db_to_fader_position(raw_to_db(r))
                }
            })
            .collect();
        Translator::Level(CurveTable::from_values(values))
    }

    /// Pan with `center` as the detent: `0..=center` covers left, `center..=max` right
    pub fn pan(max: u16, center: u16) -> Self {
        assert!(center > 0 && center < max, "pan center must be inside the range");
        let values = (0..=max)
            .map(|r| {
                if r <= center {
                    (r as f64 - center as f64) / center as f64
                } else {
                    (r - center) as f64 / (max - center) as f64
                }
            })
            .collect();
        Translator::Pan(CurveTable::from_values(values))
    }

    pub fn toggle(on: u16, off: u16) -> Self {
        Translator::Toggle { on, off }
    }

    /// Valid raw range for this parameter
    pub fn raw_range(&self) -> (u16, u16) {
        match self {
            Translator::Level(t) | Translator::Pan(t) => (0, t.max_raw()),
            Translator::Toggle { on, off } => ((*on).min(*off), (*on).max(*off)),
        }
    }

    /// Normalized → raw, clamping to the parameter's domain first
    pub fn to_hardware(&self, value: ParamValue) -> Result<u16> {
        match self {
            Translator::Level(table) => {
                let v = Self::finite_level(value)?.clamp(0.0, 1.0);
                Ok(table.nearest(v))
            }
            Translator::Pan(table) => {
                let v = Self::finite_level(value)?.clamp(-1.0, 1.0);
                Ok(table.nearest(v))
            }
            Translator::Toggle { on, off } => match value {
                ParamValue::Toggle(true) => Ok(*on),
                ParamValue::Toggle(false) => Ok(*off),
                other => Err(MixerError::Translation(format!("expected on/off, got {}", other))),
            },
        }
    }

    /// Raw → normalized
    pub fn from_hardware(&self, raw: u16) -> Result<ParamValue> {
        match self {
            Translator::Level(table) | Translator::Pan(table) => {
                table.lookup(raw).map(ParamValue::Level)
            }
            Translator::Toggle { on, off } => {
                let (lo, hi) = ((*on).min(*off), (*on).max(*off));
                // 0/1 flags accept nothing else; 7-bit codecs take the whole byte range
                if raw > hi.max(127) || (hi < 127 && raw > hi) {
                    return Err(MixerError::Translation(format!(
                        "raw toggle value {} above {}",
                        raw, hi
                    )));
                }
                let midpoint = lo + (hi - lo + 1) / 2;
                let high_is_on = on > off;
                Ok(ParamValue::Toggle((raw >= midpoint) == high_is_on))
            }
        }
    }

    /// Value the hardware will report back after receiving `value`
    pub fn quantize(&self, value: ParamValue) -> Result<ParamValue> {
        self.from_hardware(self.to_hardware(value)?)
    }

    fn finite_level(value: ParamValue) -> Result<f64> {
        match value {
            ParamValue::Level(v) if v.is_finite() => Ok(v),
            ParamValue::Level(v) => Err(MixerError::Translation(format!(
                "level {} is not a finite number",
                v
            ))),
            other => Err(MixerError::Translation(format!("expected a level, got {}", other))),
        }
    }
}
