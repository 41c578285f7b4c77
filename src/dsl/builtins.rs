//! Builtin function table and alias table.
//!
//! Both tables are static, read-only data shared by every compilation.

use crate::bytecode::Opcode;

/// Default for a builtin parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    /// The argument must be supplied.
    Required,
    Value(f64),
    /// Reuse the node bound to the parameter at this index (`out(x)` is `out(x, x)`).
    SameAs(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: ParamDefault,
}

/// Kind of value a user-facing parameter call declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Continuous,
    Button,
    Toggle,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BuiltinKind {
    /// Lowers to a single instruction with one input per parameter.
    Op(Opcode),
    /// `pat("...")`: mini-notation sequence.
    Pattern,
    /// `param` / `button` / `toggle`: host-controlled value.
    Param(ParamKind),
}

#[derive(Debug, PartialEq)]
pub struct BuiltinInfo {
    pub name: &'static str,
    pub kind: BuiltinKind,
    pub params: &'static [ParamSpec],
    /// Whether the lowered instruction keeps per-instance state in the VM.
    pub stateful: bool,
}

impl BuiltinInfo {
    pub fn required_count(&self) -> usize {
        self.params
            .iter()
            .filter(|p| p.default == ParamDefault::Required)
            .count()
    }

    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

const fn req(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        default: ParamDefault::Required,
    }
}

const fn opt(name: &'static str, value: f64) -> ParamSpec {
    ParamSpec {
        name,
        default: ParamDefault::Value(value),
    }
}

const fn op(
    name: &'static str,
    opcode: Opcode,
    params: &'static [ParamSpec],
    stateful: bool,
) -> BuiltinInfo {
    BuiltinInfo {
        name,
        kind: BuiltinKind::Op(opcode),
        params,
        stateful,
    }
}

const FREQ: &[ParamSpec] = &[req("freq")];
const SVF: &[ParamSpec] = &[req("in"), req("cut"), opt("q", 0.707)];
const BINARY: &[ParamSpec] = &[req("a"), req("b")];
const UNARY: &[ParamSpec] = &[req("x")];
const RANGE: &[ParamSpec] = &[req("x"), req("lo"), req("hi")];
const NONE: &[ParamSpec] = &[];
const MOOG: &[ParamSpec] = &[req("in"), req("cut"), opt("res", 1.0)];
const ADSR: &[ParamSpec] = &[
    req("gate"),
    opt("attack", 0.01),
    opt("decay", 0.1),
    opt("sustain", 0.7),
];
const AR: &[ParamSpec] = &[req("trig"), opt("attack", 0.01), opt("release", 0.3)];
const DELAY: &[ParamSpec] = &[req("in"), req("time"), req("fb")];
const MTOF: &[ParamSpec] = &[req("note")];
const DC: &[ParamSpec] = &[req("offset")];
const SLEW: &[ParamSpec] = &[req("target"), req("rate")];
const SAH: &[ParamSpec] = &[req("in"), req("trig")];
const OUT: &[ParamSpec] = &[
    req("left"),
    ParamSpec {
        name: "right",
        default: ParamDefault::SameAs(0),
    },
];
const LFO: &[ParamSpec] = &[req("rate"), opt("duty", 0.5)];
const TRIGGER: &[ParamSpec] = &[req("div")];
const EUCLID: &[ParamSpec] = &[req("hits"), req("steps"), opt("rot", 0.0)];
const PATTERN: &[ParamSpec] = &[req("pattern")];
const PARAM: &[ParamSpec] = &[
    req("name"),
    opt("default", 0.0),
    opt("min", 0.0),
    opt("max", 1.0),
];
const BUTTON: &[ParamSpec] = &[req("name")];
const TOGGLE: &[ParamSpec] = &[req("name"), opt("default", 0.0)];

pub static BUILTINS: &[BuiltinInfo] = &[
    // Oscillators
    op("sin", Opcode::OscSin, FREQ, true),
    op("tri", Opcode::OscTri, FREQ, true),
    op("saw", Opcode::OscSaw, FREQ, true),
    op("sqr", Opcode::OscSqr, FREQ, true),
    op("ramp", Opcode::OscRamp, FREQ, true),
    op("phasor", Opcode::OscPhasor, FREQ, true),
    // Filters
    op("lp", Opcode::FilterSvfLp, SVF, true),
    op("hp", Opcode::FilterSvfHp, SVF, true),
    op("bp", Opcode::FilterSvfBp, SVF, true),
    op("moog", Opcode::FilterMoog, MOOG, true),
    // Envelopes
    op("adsr", Opcode::EnvAdsr, ADSR, true),
    op("ar", Opcode::EnvAr, AR, true),
    // Delay
    op("delay", Opcode::Delay, DELAY, true),
    // Arithmetic
    op("add", Opcode::Add, BINARY, false),
    op("sub", Opcode::Sub, BINARY, false),
    op("mul", Opcode::Mul, BINARY, false),
    op("div", Opcode::Div, BINARY, false),
    op("pow", Opcode::Pow, BINARY, false),
    op("neg", Opcode::Neg, UNARY, false),
    // Math
    op("abs", Opcode::Abs, UNARY, false),
    op("sqrt", Opcode::Sqrt, UNARY, false),
    op("log", Opcode::Log, UNARY, false),
    op("exp", Opcode::Exp, UNARY, false),
    op("floor", Opcode::Floor, UNARY, false),
    op("ceil", Opcode::Ceil, UNARY, false),
    op("min", Opcode::Min, BINARY, false),
    op("max", Opcode::Max, BINARY, false),
    op("clamp", Opcode::Clamp, RANGE, false),
    op("wrap", Opcode::Wrap, RANGE, false),
    // Utility
    op("noise", Opcode::Noise, NONE, true),
    op("mtof", Opcode::Mtof, MTOF, false),
    op("dc", Opcode::Dc, DC, false),
    op("slew", Opcode::Slew, SLEW, true),
    op("sah", Opcode::Sah, SAH, true),
    op("out", Opcode::Output, OUT, false),
    // Timing
    op("clock", Opcode::Clock, NONE, false),
    op("lfo", Opcode::Lfo, LFO, true),
    op("trigger", Opcode::Trigger, TRIGGER, true),
    op("euclid", Opcode::Euclid, EUCLID, true),
    // Sequencing and host parameters
    BuiltinInfo {
        name: "pat",
        kind: BuiltinKind::Pattern,
        params: PATTERN,
        stateful: true,
    },
    BuiltinInfo {
        name: "param",
        kind: BuiltinKind::Param(ParamKind::Continuous),
        params: PARAM,
        stateful: false,
    },
    BuiltinInfo {
        name: "button",
        kind: BuiltinKind::Param(ParamKind::Button),
        params: BUTTON,
        stateful: false,
    },
    BuiltinInfo {
        name: "toggle",
        kind: BuiltinKind::Param(ParamKind::Toggle),
        params: TOGGLE,
        stateful: false,
    },
];

/// `(alias, canonical)` pairs. Every canonical name must appear in [`BUILTINS`].
pub static ALIASES: &[(&str, &str)] = &[
    ("sine", "sin"),
    ("triangle", "tri"),
    ("sawtooth", "saw"),
    ("square", "sqr"),
    ("lowpass", "lp"),
    ("highpass", "hp"),
    ("bandpass", "bp"),
    ("svflp", "lp"),
    ("svfhp", "hp"),
    ("svfbp", "bp"),
    ("moogladder", "moog"),
    ("envelope", "adsr"),
    ("output", "out"),
];

/// Look up a builtin by canonical name or alias.
pub fn lookup(name: &str) -> Option<&'static BuiltinInfo> {
    let canonical = ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, canonical)| *canonical);
    BUILTINS.iter().find(|b| b.name == canonical)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_resolves() {
        for (alias, canonical) in ALIASES {
            let info = lookup(alias).unwrap_or_else(|| panic!("alias {alias} is dangling"));
            assert_eq!(info.name, *canonical);
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in BUILTINS.iter().enumerate() {
            assert!(
                BUILTINS[i + 1..].iter().all(|b| b.name != a.name),
                "duplicate builtin {}",
                a.name
            );
            assert!(ALIASES.iter().all(|(alias, _)| *alias != a.name));
        }
    }

    #[test]
    fn op_builtins_fit_in_four_inputs() {
        for b in BUILTINS {
            if matches!(b.kind, BuiltinKind::Op(_)) {
                assert!(b.params.len() <= 4, "{} has too many inputs", b.name);
            }
        }
    }

    #[test]
    fn filter_signature() {
        let lp = lookup("lowpass").unwrap();
        assert_eq!(lp.kind, BuiltinKind::Op(Opcode::FilterSvfLp));
        assert_eq!(lp.required_count(), 2);
        assert_eq!(lp.param_index("q"), Some(2));
        assert_eq!(lp.params[2].default, ParamDefault::Value(0.707));
    }

    #[test]
    fn unknown_name() {
        assert!(lookup("wobble").is_none());
    }
}
