//! Mini-notation for `pat("...")`.
//!
//! A pattern is a whitespace-separated sequence that divides one cycle
//! evenly between its steps:
//!
//! - `bd sd`: sample names
//! - `c4 e4 g4`, `60 64 67`: pitches (note names) and plain numbers
//! - `~` or `_`: rest
//! - `[a b]`: subdivide one step
//! - `x*3`: repeat a step three times within its slot
//!
//! Samples cannot be mixed with pitches or numbers in one pattern.

use super::error::{codes, Diagnostic, SourceLocation};
use super::note::parse_pitch;

/// Upper bound on the events one pattern may expand to, counting rests.
pub const MAX_PATTERN_EVENTS: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Rest,
    Number(f64),
    Pitch(u8),
    Sample(String),
}

/// One sounding step of a pattern, in cycle-relative time.
#[derive(Debug, Clone, PartialEq)]
pub struct MiniEvent {
    /// Start, as a fraction of the cycle in `[0, 1)`.
    pub time: f64,
    pub duration: f64,
    pub atom: Atom,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MiniPattern {
    /// Events in time order. Rests are omitted.
    pub events: Vec<MiniEvent>,
}

impl MiniPattern {
    pub fn is_sample(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.atom, Atom::Sample(_)))
    }

    /// Sample names in event order, with repeats.
    pub fn sample_names(&self) -> impl Iterator<Item = &str> {
        self.events.iter().filter_map(|e| match &e.atom {
            Atom::Sample(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Element {
    Atom(Atom),
    Group(Vec<Step>),
}

#[derive(Debug, Clone, PartialEq)]
struct Step {
    element: Element,
    repeat: usize,
}

/// Parse a pattern string.
///
/// `literal` is the location of the quoted string in the program; error
/// locations point inside it.
pub fn parse_mini(
    text: &str,
    literal: SourceLocation,
    filename: &str,
) -> Result<MiniPattern, Diagnostic> {
    let mut parser = MiniParser {
        chars: text.char_indices().collect(),
        pos: 0,
        text_len: text.len(),
        literal,
        filename,
    };

    let steps = parser.parse_sequence(false)?;
    if steps.is_empty() {
        return Err(parser.error_at(0, text.len(), "empty pattern"));
    }

    if expanded_len(&steps) > MAX_PATTERN_EVENTS {
        return Err(parser.error_at(
            0,
            text.len(),
            format!("pattern expands to more than {MAX_PATTERN_EVENTS} events"),
        ));
    }

    let mut events = Vec::new();
    place(&steps, 0.0, 1.0, &mut events);

    let pattern = MiniPattern { events };
    if pattern.is_sample()
        && pattern
            .events
            .iter()
            .any(|e| !matches!(e.atom, Atom::Sample(_)))
    {
        return Err(parser.error_at(
            0,
            text.len(),
            "pattern mixes sample names with pitches or numbers",
        ));
    }
    Ok(pattern)
}

/// Number of slots `steps` expands to. Saturates instead of overflowing.
fn expanded_len(steps: &[Step]) -> usize {
    steps.iter().fold(0usize, |total, step| {
        let each = match &step.element {
            Element::Atom(_) => 1,
            Element::Group(inner) => expanded_len(inner),
        };
        total.saturating_add(each.saturating_mul(step.repeat))
    })
}

/// Spread `steps` evenly over `[start, start + span)`.
fn place(steps: &[Step], start: f64, span: f64, out: &mut Vec<MiniEvent>) {
    let slot = span / steps.len() as f64;
    for (i, step) in steps.iter().enumerate() {
        let slot_start = start + slot * i as f64;
        let sub = slot / step.repeat as f64;
        for r in 0..step.repeat {
            let t = slot_start + sub * r as f64;
            match &step.element {
                Element::Atom(Atom::Rest) => {}
                Element::Atom(atom) => out.push(MiniEvent {
                    time: t,
                    duration: sub,
                    atom: atom.clone(),
                }),
                Element::Group(inner) => place(inner, t, sub, out),
            }
        }
    }
}

struct MiniParser<'a> {
    chars: Vec<(usize, char)>,
    pos: usize,
    text_len: usize,
    literal: SourceLocation,
    filename: &'a str,
}

impl MiniParser<'_> {
    fn parse_sequence(&mut self, nested: bool) -> Result<Vec<Step>, Diagnostic> {
        let mut steps = Vec::new();
        loop {
            self.skip_whitespace();
            let Some((at, ch)) = self.peek() else {
                if nested {
                    return Err(self.error_at(self.text_len, 0, "unclosed '['"));
                }
                return Ok(steps);
            };

            let element = match ch {
                '[' => {
                    self.pos += 1;
                    let inner = self.parse_sequence(true)?;
                    if inner.is_empty() {
                        return Err(self.error_at(at, 1, "empty group"));
                    }
                    Element::Group(inner)
                }
                ']' => {
                    if !nested {
                        return Err(self.error_at(at, 1, "unexpected ']'"));
                    }
                    self.pos += 1;
                    return Ok(steps);
                }
                '*' => return Err(self.error_at(at, 1, "'*' must follow a step")),
                _ => Element::Atom(self.parse_atom()?),
            };

            let repeat = self.parse_repeat()?;
            steps.push(Step { element, repeat });
        }
    }

    fn parse_atom(&mut self) -> Result<Atom, Diagnostic> {
        let start = self.byte_pos();
        let mut word = String::new();
        while let Some((_, ch)) = self.peek() {
            if ch.is_whitespace() || matches!(ch, '[' | ']' | '*') {
                break;
            }
            word.push(ch);
            self.pos += 1;
        }

        if word == "~" || word == "_" {
            return Ok(Atom::Rest);
        }
        if word.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.') {
            return word
                .parse::<f64>()
                .map(Atom::Number)
                .map_err(|_| self.error_at(start, word.len(), format!("invalid number '{word}'")));
        }
        if let Some(midi) = parse_pitch(&word) {
            return Ok(Atom::Pitch(midi));
        }
        let valid_name = word.starts_with(|c: char| c.is_ascii_alphabetic())
            && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid_name {
            Ok(Atom::Sample(word))
        } else {
            Err(self.error_at(start, word.len(), format!("invalid pattern step '{word}'")))
        }
    }

    fn parse_repeat(&mut self) -> Result<usize, Diagnostic> {
        let Some((at, '*')) = self.peek() else {
            return Ok(1);
        };
        self.pos += 1;
        let mut digits = String::new();
        while let Some((_, ch)) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            digits.push(ch);
            self.pos += 1;
        }
        match digits.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(self.error_at(
                at,
                digits.len() + 1,
                "'*' needs a positive whole number",
            )),
        }
    }

    fn peek(&self) -> Option<(usize, char)> {
        self.chars.get(self.pos).copied()
    }

    fn byte_pos(&self) -> usize {
        self.peek().map_or(self.text_len, |(at, _)| at)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|(_, c)| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    /// Diagnostic at byte `at` inside the pattern text.
    fn error_at(&self, at: usize, len: usize, message: impl Into<String>) -> Diagnostic {
        // +1 skips the opening quote; strings never span lines.
        let chars_before = self.chars.iter().take_while(|(b, _)| *b < at).count() as u32;
        let loc = SourceLocation::new(
            self.literal.line,
            self.literal.column + 1 + chars_before,
            self.literal.offset + 1 + at as u32,
            len.max(1) as u32,
        );
        Diagnostic::error(codes::INVALID_PATTERN, message, self.filename, loc)
    }
}
