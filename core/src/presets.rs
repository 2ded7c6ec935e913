/// Intent-vector offsets for the enumerated preset names. Each preset
/// nudges the blended target position in parameter space before
/// unprojection; values are chosen to produce measurable LUFS/crest
/// differences among presets for the same input, per the open question
/// on intent-vector offsets (no canonical values existed to recover).
use crate::error::CoreError;
use crate::types::ParameterSpaceOffset;

pub const PRESET_NAMES: [&str; 5] = ["adaptive", "gentle", "warm", "bright", "punchy"];

pub fn resolve(name: &str) -> Result<ParameterSpaceOffset, CoreError> {
    match name {
        "adaptive" => Ok(ParameterSpaceOffset::default()),
        "gentle" => Ok(ParameterSpaceOffset {
            input_level: -0.03,
            dynamic_range: 0.08,
            bass_mid_ratio: 0.0,
            bass_pct: 0.0,
            mid_pct: 0.0,
        }),
        "warm" => Ok(ParameterSpaceOffset {
            input_level: 0.0,
            dynamic_range: 0.03,
            bass_mid_ratio: 0.12,
            bass_pct: 0.05,
            mid_pct: -0.03,
        }),
        "bright" => Ok(ParameterSpaceOffset {
            input_level: 0.0,
            dynamic_range: -0.02,
            bass_mid_ratio: -0.12,
            bass_pct: -0.04,
            mid_pct: 0.04,
        }),
        "punchy" => Ok(ParameterSpaceOffset {
            input_level: 0.05,
            dynamic_range: 0.1,
            bass_mid_ratio: 0.05,
            bass_pct: 0.03,
            mid_pct: 0.0,
        }),
        other => Err(CoreError::UnknownPreset(other.to_string())),
    }
}
