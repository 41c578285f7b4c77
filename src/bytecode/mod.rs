//! Cedar VM bytecode: opcodes and the fixed 16-byte instruction record.
//!
//! Layout, little-endian:
//!
//! ```text
//! [opcode u8][rate u8][out u16][in0 u16][in1 u16][in2 u16][in3 u16][payload u32]
//! ```

use std::fmt;

use serde::Serialize;

/// Marks an unused input slot (and the buffer field of non-signal symbols).
pub const BUFFER_UNUSED: u16 = 0xFFFF;

/// Maximum number of buffers a single program may allocate.
pub const MAX_BUFFERS: usize = 256;

/// Size of one encoded instruction.
pub const INSTRUCTION_SIZE: usize = 16;

macro_rules! opcodes {
    ($($name:ident = $value:literal => $mnemonic:literal,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $value,)*
        }

        impl Opcode {
            pub fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    Nop = 0 => "NOP",
    PushConst = 1 => "PUSH_CONST",
    Copy = 2 => "COPY",

    Add = 10 => "ADD",
    Sub = 11 => "SUB",
    Mul = 12 => "MUL",
    Div = 13 => "DIV",
    Pow = 14 => "POW",
    Neg = 15 => "NEG",

    OscSin = 20 => "OSC_SIN",
    OscTri = 21 => "OSC_TRI",
    OscSaw = 22 => "OSC_SAW",
    OscSqr = 23 => "OSC_SQR",
    OscRamp = 24 => "OSC_RAMP",
    OscPhasor = 25 => "OSC_PHASOR",

    FilterSvfLp = 33 => "FILTER_SVF_LP",
    FilterSvfHp = 34 => "FILTER_SVF_HP",
    FilterSvfBp = 35 => "FILTER_SVF_BP",
    FilterMoog = 36 => "FILTER_MOOG",

    Abs = 40 => "ABS",
    Sqrt = 41 => "SQRT",
    Log = 42 => "LOG",
    Exp = 43 => "EXP",
    Min = 44 => "MIN",
    Max = 45 => "MAX",
    Clamp = 46 => "CLAMP",
    Wrap = 47 => "WRAP",
    Floor = 48 => "FLOOR",
    Ceil = 49 => "CEIL",

    Output = 50 => "OUTPUT",
    Noise = 51 => "NOISE",
    Mtof = 52 => "MTOF",
    Dc = 53 => "DC",
    Slew = 54 => "SLEW",
    Sah = 55 => "SAH",
    EnvGet = 56 => "ENV_GET",

    EnvAdsr = 60 => "ENV_ADSR",
    EnvAr = 61 => "ENV_AR",

    Delay = 70 => "DELAY",

    Clock = 90 => "CLOCK",
    Lfo = 91 => "LFO",
    SeqStep = 92 => "SEQ_STEP",
    Euclid = 93 => "EUCLID",
    Trigger = 94 => "TRIGGER",
    Timeline = 95 => "TIMELINE",

    SamplePlay = 100 => "SAMPLE_PLAY",
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Processing rate of an instruction's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Rate {
    #[default]
    Audio = 0,
    Control = 1,
}

/// One VM instruction.
///
/// `payload` is dual-purpose: the raw `f32` bits of a constant for
/// `PUSH_CONST`, a state-init index for `SEQ_STEP`, a parameter-name hash for
/// `ENV_GET` and a semantic state id for every other stateful opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub opcode: Opcode,
    pub rate: u8,
    pub out: u16,
    pub inputs: [u16; 4],
    pub payload: u32,
}

impl Instruction {
    pub fn new(opcode: Opcode, out: u16, inputs: &[u16]) -> Self {
        let mut slots = [BUFFER_UNUSED; 4];
        for (slot, &input) in slots.iter_mut().zip(inputs) {
            *slot = input;
        }
        Self {
            opcode,
            rate: Rate::Audio as u8,
            out,
            inputs: slots,
            payload: 0,
        }
    }

    pub fn with_payload(mut self, payload: u32) -> Self {
        self.payload = payload;
        self
    }

    pub fn push_const(out: u16, value: f32) -> Self {
        Self::new(Opcode::PushConst, out, &[]).with_payload(value.to_bits())
    }

    /// The constant carried by a `PUSH_CONST`.
    pub fn const_value(&self) -> f32 {
        f32::from_bits(self.payload)
    }

    pub fn to_bytes(&self) -> [u8; INSTRUCTION_SIZE] {
        let mut b = [0u8; INSTRUCTION_SIZE];
        b[0] = self.opcode as u8;
        b[1] = self.rate;
        b[2..4].copy_from_slice(&self.out.to_le_bytes());
        for (i, input) in self.inputs.iter().enumerate() {
            let at = 4 + i * 2;
            b[at..at + 2].copy_from_slice(&input.to_le_bytes());
        }
        b[12..16].copy_from_slice(&self.payload.to_le_bytes());
        b
    }

    pub fn from_bytes(b: &[u8; INSTRUCTION_SIZE]) -> Result<Self, DecodeError> {
        let opcode = Opcode::from_u8(b[0]).ok_or(DecodeError::UnknownOpcode(b[0]))?;
        let u16_at = |at: usize| u16::from_le_bytes([b[at], b[at + 1]]);
        Ok(Self {
            opcode,
            rate: b[1],
            out: u16_at(2),
            inputs: [u16_at(4), u16_at(6), u16_at(8), u16_at(10)],
            payload: u32::from_le_bytes([b[12], b[13], b[14], b[15]]),
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<14} b{:<3}", self.opcode.mnemonic(), self.out)?;
        let inputs: Vec<String> = self
            .inputs
            .iter()
            .filter(|&&i| i != BUFFER_UNUSED)
            .map(|i| format!("b{i}"))
            .collect();
        if !inputs.is_empty() {
            write!(f, " <- {}", inputs.join(", "))?;
        }
        match self.opcode {
            Opcode::PushConst => write!(f, " ; {}", self.const_value()),
            Opcode::SeqStep => write!(f, " ; state_init #{}", self.payload),
            _ if self.payload != 0 => write!(f, " ; {:#010x}", self.payload),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("bytecode length {0} is not a multiple of 16")]
    TruncatedInstruction(usize),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
}

/// Serialize a program at a fixed 16-byte stride.
pub fn encode(instructions: &[Instruction]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(instructions.len() * INSTRUCTION_SIZE);
    for inst in instructions {
        bytes.extend_from_slice(&inst.to_bytes());
    }
    bytes
}

/// Decode a flat bytecode buffer back into instructions.
pub fn decode(bytes: &[u8]) -> Result<Vec<Instruction>, DecodeError> {
    if bytes.len() % INSTRUCTION_SIZE != 0 {
        return Err(DecodeError::TruncatedInstruction(bytes.len()));
    }
    bytes
        .chunks_exact(INSTRUCTION_SIZE)
        .map(|chunk| {
            let mut record = [0u8; INSTRUCTION_SIZE];
            record.copy_from_slice(chunk);
            Instruction::from_bytes(&record)
        })
        .collect()
}

/// Human-readable listing, one numbered instruction per line.
pub fn disassemble(instructions: &[Instruction]) -> String {
    let mut out = String::new();
    for (i, inst) in instructions.iter().enumerate() {
        out.push_str(&format!("{i:04}  {inst}\n"));
    }
    out
}
