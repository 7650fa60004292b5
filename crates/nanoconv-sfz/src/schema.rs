//! Schema registry: header kinds, opcodes and the per-kind whitelists of
//! the target instrument format.
//!
//! The target sampler has no public documentation. The whitelists below
//! describe what its zone/oscillator layout can represent:
//!
//! ```text
//! control   (instrument root)
//! global    volume polyphony
//! group     lovel hivel volume pan tune           -> one velocity layer
//! region    sample lokey hikey pitch_keycenter... -> one sample zone
//! ```
//!
//! `key`, `default_path` and the transpose family are legal on regions only:
//! they are consumed there by the value normalizer.

use std::fmt;

/// The nesting level of a block, ordered coarsest to finest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderKind {
    Control,
    Global,
    Group,
    Region,
}

impl HeaderKind {
    /// All kinds, coarsest first.
    pub const ALL: [HeaderKind; 4] = [
        HeaderKind::Control,
        HeaderKind::Global,
        HeaderKind::Group,
        HeaderKind::Region,
    ];

    /// Parse a header name (without angle brackets).
    pub fn from_header(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "control" => Some(HeaderKind::Control),
            "global" => Some(HeaderKind::Global),
            "group" => Some(HeaderKind::Group),
            "region" => Some(HeaderKind::Region),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HeaderKind::Control => "control",
            HeaderKind::Global => "global",
            HeaderKind::Group => "group",
            HeaderKind::Region => "region",
        }
    }

    /// Position in the hierarchy, 0 for control.
    pub fn depth(&self) -> usize {
        *self as usize
    }

    /// The next finer kind.
    pub fn finer(&self) -> Option<Self> {
        HeaderKind::ALL.get(self.depth() + 1).copied()
    }

    /// The next coarser kind.
    pub fn coarser(&self) -> Option<Self> {
        self.depth()
            .checked_sub(1)
            .map(|depth| HeaderKind::ALL[depth])
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.name())
    }
}

/// An SFZ opcode name.
///
/// The opcodes the converter understands are closed variants; everything
/// else is kept as [`Opcode::Other`] until the resolver drops it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Opcode {
    Sample,
    DefaultPath,
    Key,
    LoKey,
    HiKey,
    PitchKeycenter,
    LoVel,
    HiVel,
    Transpose,
    NoteOffset,
    OctaveOffset,
    Tune,
    Volume,
    Pan,
    Polyphony,
    LoopMode,
    LoopStart,
    LoopEnd,
    Offset,
    End,
    Direction,
    /// `loopmode`, SFZ v1 spelling of `loop_mode`
    LegacyLoopMode,
    /// `loopstart`
    LegacyLoopStart,
    /// `loopend`
    LegacyLoopEnd,
    Other(String),
}

impl Opcode {
    pub fn parse(name: &str) -> Self {
        match name {
            "sample" => Opcode::Sample,
            "default_path" => Opcode::DefaultPath,
            "key" => Opcode::Key,
            "lokey" => Opcode::LoKey,
            "hikey" => Opcode::HiKey,
            "pitch_keycenter" => Opcode::PitchKeycenter,
            "lovel" => Opcode::LoVel,
            "hivel" => Opcode::HiVel,
            "transpose" => Opcode::Transpose,
            "note_offset" => Opcode::NoteOffset,
            "octave_offset" => Opcode::OctaveOffset,
            "tune" => Opcode::Tune,
            "volume" => Opcode::Volume,
            "pan" => Opcode::Pan,
            "polyphony" => Opcode::Polyphony,
            "loop_mode" => Opcode::LoopMode,
            "loop_start" => Opcode::LoopStart,
            "loop_end" => Opcode::LoopEnd,
            "offset" => Opcode::Offset,
            "end" => Opcode::End,
            "direction" => Opcode::Direction,
            "loopmode" => Opcode::LegacyLoopMode,
            "loopstart" => Opcode::LegacyLoopStart,
            "loopend" => Opcode::LegacyLoopEnd,
            other => Opcode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Opcode::Sample => "sample",
            Opcode::DefaultPath => "default_path",
            Opcode::Key => "key",
            Opcode::LoKey => "lokey",
            Opcode::HiKey => "hikey",
            Opcode::PitchKeycenter => "pitch_keycenter",
            Opcode::LoVel => "lovel",
            Opcode::HiVel => "hivel",
            Opcode::Transpose => "transpose",
            Opcode::NoteOffset => "note_offset",
            Opcode::OctaveOffset => "octave_offset",
            Opcode::Tune => "tune",
            Opcode::Volume => "volume",
            Opcode::Pan => "pan",
            Opcode::Polyphony => "polyphony",
            Opcode::LoopMode => "loop_mode",
            Opcode::LoopStart => "loop_start",
            Opcode::LoopEnd => "loop_end",
            Opcode::Offset => "offset",
            Opcode::End => "end",
            Opcode::Direction => "direction",
            Opcode::LegacyLoopMode => "loopmode",
            Opcode::LegacyLoopStart => "loopstart",
            Opcode::LegacyLoopEnd => "loopend",
            Opcode::Other(name) => name,
        }
    }

    /// Opcodes whose value is a MIDI key.
    pub fn is_key(&self) -> bool {
        matches!(
            self,
            Opcode::Key | Opcode::LoKey | Opcode::HiKey | Opcode::PitchKeycenter
        )
    }

    /// Semitones per unit for the transpose family.
    pub fn transpose_factor(&self) -> Option<i32> {
        match self {
            Opcode::Transpose | Opcode::NoteOffset => Some(1),
            Opcode::OctaveOffset => Some(12),
            _ => None,
        }
    }
}

impl From<&str> for Opcode {
    fn from(name: &str) -> Self {
        Opcode::parse(name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Legal opcodes of one header kind.
#[derive(Debug)]
pub struct SchemaEntry {
    pub kind: HeaderKind,
    pub opcodes: &'static [Opcode],
}

/// Immutable schema of the target format, shared by every pass.
#[derive(Debug)]
pub struct Schema {
    entries: [SchemaEntry; 4],
    aliases: &'static [(Opcode, Opcode)],
}

static CONTROL_OPCODES: [Opcode; 0] = [];

static GLOBAL_OPCODES: [Opcode; 2] = [Opcode::Volume, Opcode::Polyphony];

static GROUP_OPCODES: [Opcode; 5] = [
    Opcode::LoVel,
    Opcode::HiVel,
    Opcode::Volume,
    Opcode::Pan,
    Opcode::Tune,
];

static REGION_OPCODES: [Opcode; 18] = [
    Opcode::Sample,
    Opcode::DefaultPath,
    Opcode::Key,
    Opcode::LoKey,
    Opcode::HiKey,
    Opcode::PitchKeycenter,
    Opcode::Transpose,
    Opcode::NoteOffset,
    Opcode::OctaveOffset,
    Opcode::Tune,
    Opcode::Volume,
    Opcode::Pan,
    Opcode::LoopMode,
    Opcode::LoopStart,
    Opcode::LoopEnd,
    Opcode::Offset,
    Opcode::End,
    Opcode::Direction,
];

static ALIASES: [(Opcode, Opcode); 3] = [
    (Opcode::LegacyLoopMode, Opcode::LoopMode),
    (Opcode::LegacyLoopStart, Opcode::LoopStart),
    (Opcode::LegacyLoopEnd, Opcode::LoopEnd),
];

static STANDARD: Schema = Schema::new(
    &CONTROL_OPCODES,
    &GLOBAL_OPCODES,
    &GROUP_OPCODES,
    &REGION_OPCODES,
    &ALIASES,
);

impl Schema {
    pub const fn new(
        control: &'static [Opcode],
        global: &'static [Opcode],
        group: &'static [Opcode],
        region: &'static [Opcode],
        aliases: &'static [(Opcode, Opcode)],
    ) -> Self {
        Self {
            entries: [
                SchemaEntry {
                    kind: HeaderKind::Control,
                    opcodes: control,
                },
                SchemaEntry {
                    kind: HeaderKind::Global,
                    opcodes: global,
                },
                SchemaEntry {
                    kind: HeaderKind::Group,
                    opcodes: group,
                },
                SchemaEntry {
                    kind: HeaderKind::Region,
                    opcodes: region,
                },
            ],
            aliases,
        }
    }

    /// The schema of the target sampler.
    pub fn standard() -> &'static Schema {
        &STANDARD
    }

    pub fn entry(&self, kind: HeaderKind) -> &SchemaEntry {
        &self.entries[kind.depth()]
    }

    pub fn opcodes(&self, kind: HeaderKind) -> &[Opcode] {
        self.entry(kind).opcodes
    }

    /// `(alias, canonical)` pairs.
    pub fn aliases(&self) -> &[(Opcode, Opcode)] {
        self.aliases
    }

    /// The canonical spelling of an opcode.
    pub fn canonical<'a>(&'a self, opcode: &'a Opcode) -> &'a Opcode {
        self.aliases
            .iter()
            .find(|(alias, _)| alias == opcode)
            .map(|(_, canonical)| canonical)
            .unwrap_or(opcode)
    }

    /// Whether `opcode` (or the opcode it aliases) is whitelisted for `kind`.
    pub fn is_legal(&self, kind: HeaderKind, opcode: &Opcode) -> bool {
        self.opcodes(kind).contains(self.canonical(opcode))
    }

    /// Whether some kind strictly coarser than `kind` accepts `opcode`.
    pub fn is_legal_above(&self, kind: HeaderKind, opcode: &Opcode) -> bool {
        HeaderKind::ALL[..kind.depth()]
            .iter()
            .any(|coarser| self.is_legal(*coarser, opcode))
    }

    /// Whether any kind accepts `opcode`.
    pub fn is_known(&self, opcode: &Opcode) -> bool {
        HeaderKind::ALL
            .iter()
            .any(|kind| self.is_legal(*kind, opcode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_order() {
        assert!(HeaderKind::Control < HeaderKind::Global);
        assert!(HeaderKind::Group < HeaderKind::Region);
        assert_eq!(HeaderKind::Global.finer(), Some(HeaderKind::Group));
        assert_eq!(HeaderKind::Region.finer(), None);
        assert_eq!(HeaderKind::Control.coarser(), None);
        assert_eq!(HeaderKind::from_header("REGION"), Some(HeaderKind::Region));
        assert_eq!(HeaderKind::from_header("master"), None);
    }

    #[test]
    fn test_opcode_names_round_trip() {
        for name in ["sample", "pitch_keycenter", "loopmode", "amp_veltrack"] {
            assert_eq!(Opcode::parse(name).as_str(), name);
        }
        assert_eq!(
            Opcode::parse("amp_veltrack"),
            Opcode::Other("amp_veltrack".to_string())
        );
    }

    #[test]
    fn test_legality_follows_aliases() {
        let schema = Schema::standard();
        assert!(schema.is_legal(HeaderKind::Region, &Opcode::LoopMode));
        assert!(schema.is_legal(HeaderKind::Region, &Opcode::LegacyLoopMode));
        assert!(!schema.is_legal(HeaderKind::Group, &Opcode::LegacyLoopMode));
        assert_eq!(schema.canonical(&Opcode::LegacyLoopEnd), &Opcode::LoopEnd);
        assert_eq!(schema.canonical(&Opcode::Sample), &Opcode::Sample);
    }

    #[test]
    fn test_legal_above() {
        let schema = Schema::standard();
        assert!(schema.is_legal_above(HeaderKind::Group, &Opcode::Polyphony));
        assert!(!schema.is_legal_above(HeaderKind::Global, &Opcode::LoVel));
        assert!(schema.is_legal_above(HeaderKind::Region, &Opcode::HiVel));
        assert!(!schema.is_known(&Opcode::parse("amp_veltrack")));
    }
}
