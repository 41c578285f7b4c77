//! Pitch names inside patterns: "c4", "Eb2", "f#" to MIDI note numbers.

/// Octave assumed when a lowercase pitch omits it.
pub const DEFAULT_OCTAVE: i32 = 4;

/// Parse a pitch name into a MIDI note number.
///
/// Format: `<letter><optional accidental><octave>`
/// - Letter: a-g or A-G
/// - Accidental: `#` (sharp) or `b` (flat)
/// - Octave: 0 to 9 (C4 = middle C = MIDI 60). Lowercase names may omit it.
///
/// Uppercase names need an explicit octave so that words like "A" or "C"
/// stay available as sample names. Results are clamped to 0..=127.
pub fn parse_pitch(name: &str) -> Option<u8> {
    let chars: Vec<char> = name.chars().collect();
    let first = *chars.first()?;

    let base = match first.to_ascii_lowercase() {
        'c' => 0,
        'd' => 2,
        'e' => 4,
        'f' => 5,
        'g' => 7,
        'a' => 9,
        'b' => 11,
        _ => return None,
    };

    let mut i = 1;
    let accidental: i32 = match chars.get(i) {
        Some('#') => {
            i += 1;
            1
        }
        Some('b') => {
            i += 1;
            -1
        }
        _ => 0,
    };

    let octave_str: String = chars[i..].iter().collect();
    let octave: i32 = if octave_str.is_empty() {
        if first.is_ascii_uppercase() {
            return None;
        }
        DEFAULT_OCTAVE
    } else if octave_str.chars().all(|c| c.is_ascii_digit()) && octave_str.len() <= 2 {
        octave_str.parse().ok()?
    } else {
        return None;
    };

    // MIDI note = (octave + 1) * 12 + base + accidental
    let midi = (octave + 1) * 12 + base + accidental;
    Some(midi.clamp(0, 127) as u8)
}

/// Equal-tempered frequency of a MIDI note, A4 = 440 Hz.
pub fn midi_to_freq(note: u8) -> f64 {
    440.0 * 2f64.powf((note as f64 - 69.0) / 12.0)
}
