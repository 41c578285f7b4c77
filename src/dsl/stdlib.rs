//! Standard library preamble, compiled ahead of every program.

/// Filename reported for diagnostics that originate in the preamble.
pub const STDLIB_FILENAME: &str = "<stdlib>";

pub const STDLIB: &str = "\
// Akkado standard library
// Prepended to every program; user code cannot redefine these names.

fn detune(freq, amt = 0.01) -> saw(freq) + saw(freq * (1 + amt))
fn pluck(freq, cut = 2400) -> saw(freq) |> lp(%, cut, 0.8)
fn gain(sig, amt) -> sig * amt
fn stereo(sig) -> out(sig, sig)
";

/// Where the preamble ends inside a [`LinkedSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    /// Bytes before the first user byte, including the joining newline.
    pub byte_len: u32,
    /// Lines before the first user line.
    pub line_count: u32,
}

impl Boundary {
    /// Boundary for a preamble joined to user text with one `'\n'`.
    pub fn after(preamble: &str) -> Self {
        Self {
            byte_len: preamble.len() as u32 + 1,
            line_count: preamble.bytes().filter(|&b| b == b'\n').count() as u32 + 1,
        }
    }

    pub fn contains_offset(&self, offset: u32) -> bool {
        offset < self.byte_len
    }
}

/// The preamble and the user's text in one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSource {
    pub text: String,
    pub boundary: Boundary,
}

impl LinkedSource {
    pub fn link(preamble: &str, user: &str) -> Self {
        let mut text = String::with_capacity(preamble.len() + 1 + user.len());
        text.push_str(preamble);
        text.push('\n');
        text.push_str(user);
        Self {
            text,
            boundary: Boundary::after(preamble),
        }
    }

    /// Link the user's text behind [`STDLIB`].
    pub fn with_stdlib(user: &str) -> Self {
        Self::link(STDLIB, user)
    }

    /// The user's part of the buffer.
    pub fn user_text(&self) -> &str {
        &self.text[self.boundary.byte_len as usize..]
    }
}
