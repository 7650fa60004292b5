//! Value normalizer: rewrites opcode values into the forms the target
//! format understands.
//!
//! The steps run in a fixed order over every node, each relying on the one
//! before:
//!
//! 1. legacy aliases are renamed to their canonical opcode
//! 2. key values (`c4`, `F#2`, `60`) become MIDI numbers
//! 3. a lone `key` expands into `lokey`/`hikey`/`pitch_keycenter`
//! 4. `transpose`, `note_offset` and `octave_offset` are added to the keys
//! 5. `default_path` is prepended to `sample`

use crate::error::{Error, Result};
use crate::path_utils::combine_sample_path;
use crate::schema::{Opcode, Schema};
use crate::tree::DocumentTree;

const KEY_RANGE: [Opcode; 3] = [Opcode::LoKey, Opcode::HiKey, Opcode::PitchKeycenter];

/// MIDI key numbers a folded key must stay within.
const MIDI_KEYS: std::ops::RangeInclusive<i32> = 0..=127;

/// Octaves a note name may use (`c-1` is key 0, `g9` is key 127).
const OCTAVES: std::ops::RangeInclusive<i32> = -1..=9;

pub struct Normalizer {
    schema: &'static Schema,
}

impl Normalizer {
    pub fn new(schema: &'static Schema) -> Self {
        Self { schema }
    }

    /// Run every step in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] for a key that is neither a number nor
    /// a note name, a transposition that is not an integer, or a
    /// transposition that moves a key outside the MIDI range.
    pub fn normalize(&self, tree: &mut DocumentTree) -> Result<()> {
        self.consolidate_aliases(tree);
        normalize_keys(tree)?;
        synthesize_keys(tree);
        fold_transpose(tree)?;
        concat_paths(tree);
        Ok(())
    }

    /// Rename legacy spellings; the alias value replaces a canonical one.
    pub fn consolidate_aliases(&self, tree: &mut DocumentTree) {
        for id in tree.walk() {
            let node = tree.node_mut(id);
            for (alias, canonical) in self.schema.aliases() {
                if let Some(value) = node.remove(alias) {
                    log::debug!("Renaming {} to {}", alias, canonical);
                    node.set(canonical.clone(), value);
                }
            }
        }
    }
}

/// Convert every key opcode to a MIDI note number.
pub fn normalize_keys(tree: &mut DocumentTree) -> Result<()> {
    for id in tree.walk() {
        for (opcode, value) in tree.node_mut(id).opcodes.iter_mut() {
            if !opcode.is_key() {
                continue;
            }
            let key = parse_key(value).ok_or_else(|| Error::invalid_value(opcode, &*value))?;
            *value = key.to_string();
        }
    }
    Ok(())
}

/// Expand `key` into the key range opcodes the node does not set itself.
pub fn synthesize_keys(tree: &mut DocumentTree) {
    for id in tree.walk() {
        let node = tree.node_mut(id);
        if let Some(key) = node.remove(&Opcode::Key) {
            for opcode in KEY_RANGE {
                node.opcodes.entry(opcode).or_insert_with(|| key.clone());
            }
        }
    }
}

/// Add the transpose family to the key opcodes of the same node.
///
/// Nodes without a key opcode keep their transpose opcodes. A shift that
/// overflows, or a folded key outside `0..=127`, is an invalid value.
pub fn fold_transpose(tree: &mut DocumentTree) -> Result<()> {
    for id in tree.walk() {
        let node = tree.node_mut(id);
        if !node.opcodes.keys().any(Opcode::is_key) {
            continue;
        }

        let mut shift: i32 = 0;
        let mut folded = Vec::new();
        for (opcode, value) in &node.opcodes {
            if let Some(factor) = opcode.transpose_factor() {
                shift = value
                    .trim()
                    .parse::<i32>()
                    .ok()
                    .and_then(|amount| amount.checked_mul(factor))
                    .and_then(|semitones| shift.checked_add(semitones))
                    .ok_or_else(|| Error::invalid_value(opcode, value))?;
                folded.push(opcode.clone());
            }
        }
        if folded.is_empty() {
            continue;
        }

        for (opcode, value) in node.opcodes.iter_mut() {
            if opcode.is_key() {
                let key = value
                    .parse::<i32>()
                    .ok()
                    .and_then(|key| key.checked_add(shift))
                    .filter(|key| MIDI_KEYS.contains(key))
                    .ok_or_else(|| Error::invalid_value(opcode, &*value))?;
                *value = key.to_string();
            }
        }
        for opcode in folded {
            node.remove(&opcode);
        }
        log::debug!("Folded a transposition of {} semitones", shift);
    }
    Ok(())
}

/// Prefix `sample` with `default_path` and drop the latter.
pub fn concat_paths(tree: &mut DocumentTree) {
    for id in tree.walk() {
        let node = tree.node_mut(id);
        if !node.contains(&Opcode::Sample) {
            continue;
        }
        if let Some(prefix) = node.remove(&Opcode::DefaultPath) {
            if let Some(sample) = node.opcodes.get_mut(&Opcode::Sample) {
                *sample = combine_sample_path(&prefix, sample);
            }
        }
    }
}

/// Parse a key given as a MIDI number or a note name.
///
/// Note names are a letter `a`-`g` (any case), any number of `#` (sharp) or
/// `b` (flat) modifiers and a signed octave from -1 to 9, with middle C
/// written `c4` (MIDI 60). Note names outside the MIDI range are rejected;
/// plain numbers pass through as written.
///
/// ```
/// use nanoconv_sfz::normalizer::parse_key;
///
/// assert_eq!(parse_key("60"), Some(60));
/// assert_eq!(parse_key("c4"), Some(60));
/// assert_eq!(parse_key("A0"), Some(21));
/// assert_eq!(parse_key("f#2"), Some(42));
/// assert_eq!(parse_key("h9"), None);
/// assert_eq!(parse_key("c99"), None);
/// ```
pub fn parse_key(value: &str) -> Option<i32> {
    let value = value.trim();
    if let Ok(number) = value.parse::<i32>() {
        return Some(number);
    }

    let mut chars = value.chars();
    let pitch_class = match chars.next()?.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let octave_start = rest.find(|c: char| c != '#' && c != 'b')?;
    let accidental: i32 = rest[..octave_start]
        .chars()
        .map(|c| if c == '#' { 1 } else { -1 })
        .sum();
    let octave: i32 = rest[octave_start..].parse().ok()?;
    if !OCTAVES.contains(&octave) || accidental.unsigned_abs() > 12 {
        return None;
    }

    Some(pitch_class + accidental + (octave + 1) * 12).filter(|key| MIDI_KEYS.contains(key))
}
