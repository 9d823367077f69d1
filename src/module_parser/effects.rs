//! Effect command decoding
//!
//! Only the effects the mixer implements are decoded into [`Effect`]
//! variants: volume, panning, note delay, plus speed/tempo for timing
//! discovery. Everything else decodes to [`Effect::Unsupported`] and is
//! ignored by the adapters.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// ProTracker effect command nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ProTrackerCommand {
    /// 0xy: arpeggio
    Arpeggio = 0x0,
    /// 1xx: portamento up
    PortamentoUp = 0x1,
    /// 2xx: portamento down
    PortamentoDown = 0x2,
    /// 3xx: tone portamento
    TonePortamento = 0x3,
    /// 4xy: vibrato
    Vibrato = 0x4,
    /// 5xy: tone portamento + volume slide
    TonePortamentoVolumeSlide = 0x5,
    /// 6xy: vibrato + volume slide
    VibratoVolumeSlide = 0x6,
    /// 7xy: tremolo
    Tremolo = 0x7,
    /// 8xx: set panning
    SetPanning = 0x8,
    /// 9xx: sample offset
    SampleOffset = 0x9,
    /// Axy: volume slide
    VolumeSlide = 0xA,
    /// Bxx: position jump
    PositionJump = 0xB,
    /// Cxx: set volume
    SetVolume = 0xC,
    /// Dxx: pattern break
    PatternBreak = 0xD,
    /// Exy: extended command, sub-command in the high nibble
    Extended = 0xE,
    /// Fxx: set speed (< 32) or tempo (>= 32)
    SetSpeed = 0xF,
}

/// ScreamTracker 3 effect command (1 = `A` ... 26 = `Z`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum S3mCommand {
    /// Axx: set speed
    SetSpeed = 1,
    /// Bxx: position jump
    PositionJump = 2,
    /// Cxx: pattern break
    PatternBreak = 3,
    /// Dxy: volume slide
    VolumeSlide = 4,
    /// Exx: portamento down
    PortamentoDown = 5,
    /// Fxx: portamento up
    PortamentoUp = 6,
    /// Gxx: tone portamento
    TonePortamento = 7,
    /// Hxy: vibrato
    Vibrato = 8,
    /// Ixy: tremor
    Tremor = 9,
    /// Jxy: arpeggio
    Arpeggio = 10,
    /// Kxy: vibrato + volume slide
    VibratoVolumeSlide = 11,
    /// 0x0C carries an explicit volume, mirroring the MOD `Cxx` command
    SetVolume = 12,
    /// Mxx: channel volume
    ChannelVolume = 13,
    /// Nxy: channel volume slide
    ChannelVolumeSlide = 14,
    /// Oxx: sample offset
    SampleOffset = 15,
    /// Pxy: panning slide
    PanningSlide = 16,
    /// Qxy: retrigger
    Retrigger = 17,
    /// Rxy: tremolo
    Tremolo = 18,
    /// Sxy: special, sub-command in the high nibble
    Special = 19,
    /// Txx: set tempo
    SetTempo = 20,
    /// Uxy: fine vibrato
    FineVibrato = 21,
    /// Vxx: global volume
    GlobalVolume = 22,
    /// Wxy: global volume slide
    GlobalVolumeSlide = 23,
    /// Xxx: set panning (0x00-0x80)
    SetPanning = 24,
    /// Yxy: panbrello
    Panbrello = 25,
    /// Zxx: MIDI macro
    MidiMacro = 26,
}

/// Extended/special sub-command for note delay (`EDx` / `SDx`)
const SUB_NOTE_DELAY: u8 = 0xD;

/// S3M special sub-command for coarse panning (`S8x`)
const SUB_PANNING: u8 = 0x8;

/// A decoded effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Set channel volume (raw parameter, may exceed 64 in malformed files)
    SetVolume(u8),
    /// Set ticks per row
    SetSpeed(u8),
    /// Set tempo in BPM
    SetTempo(u8),
    /// Delay the note trigger by this many ticks
    NoteDelay(u8),
    /// Set channel pan, 0-255
    SetPanning(u8),
    /// Any effect the engine does not implement
    Unsupported {
        /// Raw command
        command: u8,
        /// Raw parameter
        param: u8,
    },
}

impl Effect {
    /// Decode a ProTracker effect; `None` for the empty `000` effect.
    pub fn from_protracker(command: u8, param: u8) -> Option<Effect> {
        if command == 0 && param == 0 {
            return None;
        }
        let effect = match ProTrackerCommand::from_u8(command) {
            Some(ProTrackerCommand::SetVolume) => Effect::SetVolume(param),
            Some(ProTrackerCommand::SetSpeed) if param == 0 => {
                Effect::Unsupported { command, param }
            }
            Some(ProTrackerCommand::SetSpeed) if param < 32 => Effect::SetSpeed(param),
            Some(ProTrackerCommand::SetSpeed) => Effect::SetTempo(param),
            Some(ProTrackerCommand::Extended) if param >> 4 == SUB_NOTE_DELAY => {
                Effect::NoteDelay(param & 0x0F)
            }
            _ => Effect::Unsupported { command, param },
        };
        Some(effect)
    }

    /// Decode an S3M effect; `None` when no command is present.
    pub fn from_s3m(command: u8, info: u8) -> Option<Effect> {
        if command == 0 {
            return None;
        }
        let effect = match S3mCommand::from_u8(command) {
            Some(S3mCommand::SetSpeed) if info > 0 => Effect::SetSpeed(info),
            Some(S3mCommand::SetTempo) if info > 0 => Effect::SetTempo(info),
            Some(S3mCommand::SetVolume) => Effect::SetVolume(info),
            Some(S3mCommand::Special) if info >> 4 == SUB_NOTE_DELAY => {
                Effect::NoteDelay(info & 0x0F)
            }
            Some(S3mCommand::Special) if info >> 4 == SUB_PANNING => {
                Effect::SetPanning((info & 0x0F) * 17)
            }
            Some(S3mCommand::SetPanning) => {
                Effect::SetPanning((u16::from(info.min(0x80)) * 2).min(255) as u8)
            }
            _ => Effect::Unsupported {
                command,
                param: info,
            },
        };
        Some(effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protracker_speed_tempo_split() {
        assert_eq!(Effect::from_protracker(0xF, 0x06), Some(Effect::SetSpeed(6)));
        assert_eq!(Effect::from_protracker(0xF, 0x1F), Some(Effect::SetSpeed(31)));
        assert_eq!(Effect::from_protracker(0xF, 0x20), Some(Effect::SetTempo(32)));
        assert!(matches!(
            Effect::from_protracker(0xF, 0x00),
            Some(Effect::Unsupported { .. })
        ));
    }

    #[test]
    fn test_protracker_volume_and_delay() {
        assert_eq!(Effect::from_protracker(0xC, 0x30), Some(Effect::SetVolume(0x30)));
        assert_eq!(Effect::from_protracker(0xE, 0xD3), Some(Effect::NoteDelay(3)));
        assert!(matches!(
            Effect::from_protracker(0xE, 0xC3),
            Some(Effect::Unsupported { command: 0xE, param: 0xC3 })
        ));
        assert_eq!(Effect::from_protracker(0, 0), None);
        assert!(matches!(
            Effect::from_protracker(0x0, 0x37),
            Some(Effect::Unsupported { .. })
        ));
    }

    #[test]
    fn test_s3m_effects() {
        assert_eq!(Effect::from_s3m(0, 0x40), None);
        assert_eq!(Effect::from_s3m(1, 3), Some(Effect::SetSpeed(3)));
        assert_eq!(Effect::from_s3m(20, 150), Some(Effect::SetTempo(150)));
        assert_eq!(Effect::from_s3m(0x0C, 20), Some(Effect::SetVolume(20)));
        assert_eq!(Effect::from_s3m(19, 0xD4), Some(Effect::NoteDelay(4)));
        assert_eq!(Effect::from_s3m(19, 0x8F), Some(Effect::SetPanning(255)));
        assert_eq!(Effect::from_s3m(24, 0x40), Some(Effect::SetPanning(128)));
        assert_eq!(Effect::from_s3m(24, 0xA4), Some(Effect::SetPanning(255)));
        assert!(matches!(
            Effect::from_s3m(8, 0x44),
            Some(Effect::Unsupported { command: 8, .. })
        ));
    }
}
