//! Note names and pitch ratios
//!
//! Notes are written tracker-style: a letter `A`-`G`, an optional `#`, an
//! optional `-` separator and a single octave digit (`C-4`, `F#3`, `G#-2`).
//! The absolute semitone index of a note is `octave * 12 + chromatic index`,
//! with `C-0` as index 0.

use crate::{ModMixError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Chromatic names in index order, as produced by [`note_name`]
pub const CHROMATIC_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Semitones per octave
pub const SEMITONES_PER_OCTAVE: i32 = 12;

/// Frequency of equal-tempered C-4 in Hz
pub const C4_FREQUENCY: f64 = 261.625565;

fn note_regex() -> &'static Regex {
    static NOTE: OnceLock<Regex> = OnceLock::new();
    NOTE.get_or_init(|| Regex::new(r"^([A-G])(#)?-?([0-9])$").expect("static note regex"))
}

/// Parse a note string into its absolute semitone index.
pub fn parse_note(note: &str) -> Result<i32> {
    let caps = note_regex()
        .captures(note)
        .ok_or_else(|| ModMixError::InvalidNoteFormat(note.to_string()))?;

    let letter = &caps[1];
    let sharp = caps.get(2).is_some();
    let octave: i32 = caps[3]
        .parse()
        .map_err(|_| ModMixError::InvalidNoteFormat(note.to_string()))?;

    let name = if sharp {
        format!("{letter}#")
    } else {
        letter.to_string()
    };
    let chromatic = CHROMATIC_NAMES
        .iter()
        .position(|&n| n == name)
        .ok_or_else(|| ModMixError::InvalidNoteName(note.to_string()))?;

    Ok(octave * SEMITONES_PER_OCTAVE + chromatic as i32)
}

/// Signed semitone distance from `base` to `target`.
///
/// `note_to_semitones("C-5", "C-4") == 12`.
pub fn note_to_semitones(target: &str, base: &str) -> Result<i32> {
    Ok(parse_note(target)? - parse_note(base)?)
}

/// Playback-rate ratio for a semitone offset: `2^(s/12)`.
pub fn semitones_to_pitch_ratio(semitones: f64) -> f64 {
    2f64.powf(semitones / 12.0)
}

/// Format an absolute semitone index as a note name.
///
/// Returns `None` when the octave falls outside the single-digit range 0-9.
pub fn note_name(index: i32) -> Option<String> {
    let octave = index.div_euclid(SEMITONES_PER_OCTAVE);
    if !(0..=9).contains(&octave) {
        return None;
    }
    let name = CHROMATIC_NAMES[index.rem_euclid(SEMITONES_PER_OCTAVE) as usize];
    if name.len() == 1 {
        Some(format!("{name}-{octave}"))
    } else {
        Some(format!("{name}{octave}"))
    }
}

/// Nearest equal-tempered semitone offset from C-4 for a frequency in Hz.
pub fn frequency_to_semitones(frequency: f64) -> i32 {
    (12.0 * (frequency / C4_FREQUENCY).log2()).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_note_reference_points() {
        assert_eq!(parse_note("C-0").unwrap(), 0);
        assert_eq!(parse_note("C-4").unwrap(), 48);
        assert_eq!(parse_note("C#4").unwrap(), 49);
        assert_eq!(parse_note("C#-4").unwrap(), 49);
        assert_eq!(parse_note("B9").unwrap(), 119);
    }

    #[test]
    fn test_octave_linearity() {
        assert_eq!(note_to_semitones("C-5", "C-4").unwrap(), 12);
        assert_eq!(note_to_semitones("C-3", "C-4").unwrap(), -12);
        assert_eq!(note_to_semitones("E-4", "C-4").unwrap(), 4);
    }

    #[test]
    fn test_semitone_symmetry() {
        let notes = ["C-0", "D#3", "G-4", "A#7", "B-9"];
        for a in notes {
            assert_eq!(note_to_semitones(a, a).unwrap(), 0);
            for b in notes {
                assert_eq!(
                    note_to_semitones(a, b).unwrap(),
                    -note_to_semitones(b, a).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_invalid_note_format() {
        for bad in ["", "H-4", "C-", "c-4", "C-10", "Cb4", "C--4"] {
            assert!(
                matches!(parse_note(bad), Err(ModMixError::InvalidNoteFormat(_))),
                "{bad} should be a format error"
            );
        }
    }

    #[test]
    fn test_invalid_note_name() {
        assert!(matches!(
            parse_note("E#4"),
            Err(ModMixError::InvalidNoteName(_))
        ));
        assert!(matches!(
            parse_note("B#-2"),
            Err(ModMixError::InvalidNoteName(_))
        ));
    }

    #[test]
    fn test_pitch_ratio() {
        assert_eq!(semitones_to_pitch_ratio(0.0), 1.0);
        assert_relative_eq!(semitones_to_pitch_ratio(12.0), 2.0, epsilon = 1e-12);
        assert_relative_eq!(semitones_to_pitch_ratio(-12.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(
            semitones_to_pitch_ratio(7.0),
            1.4983070768766815,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_note_name_round_trip() {
        for index in 0..120 {
            let name = note_name(index).unwrap();
            assert_eq!(parse_note(&name).unwrap(), index);
        }
        assert_eq!(note_name(48).as_deref(), Some("C-4"));
        assert_eq!(note_name(49).as_deref(), Some("C#4"));
        assert!(note_name(-1).is_none());
        assert!(note_name(120).is_none());
    }

    #[test]
    fn test_frequency_to_semitones() {
        assert_eq!(frequency_to_semitones(C4_FREQUENCY), 0);
        assert_eq!(frequency_to_semitones(C4_FREQUENCY * 2.0), 12);
        assert_eq!(frequency_to_semitones(440.0), 9);
    }
}
