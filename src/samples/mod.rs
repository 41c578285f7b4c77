//! Sample registry: which sample names a program may reference.
//!
//! The compiler only needs to know whether a name exists; loading and
//! decoding the audio is the host's job.

use std::collections::HashMap;

/// Names registered by [`SampleBank::with_defaults`].
pub const DEFAULT_SAMPLES: &[&str] = &[
    "bd",
    "kick",
    "sd",
    "snare",
    "hh",
    "hihat",
    "oh",
    "cp",
    "clap",
    "rim",
    "tom",
    "perc",
    "cymbal",
    "crash",
    "cowbell",
    "shaker",
    "tambourine",
    "conga",
    "bongo",
];

/// Read-only view of the samples available to a compilation.
pub trait SampleRegistry {
    fn contains(&self, name: &str) -> bool;
}

/// In-memory registry mapping sample names to host sample ids.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    ids: HashMap<String, u32>,
    next_id: u32,
}

impl SampleBank {
    /// Create an empty sample bank.
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank holding the standard drum names.
    pub fn with_defaults() -> Self {
        let mut bank = Self::new();
        for &name in DEFAULT_SAMPLES {
            bank.insert(name);
        }
        bank
    }

    /// Register a sample name, returning its id. Re-registering keeps the old id.
    pub fn insert(&mut self, name: impl Into<String>) -> u32 {
        let next = self.next_id;
        let id = *self.ids.entry(name.into()).or_insert(next);
        if id == next {
            self.next_id += 1;
        }
        id
    }

    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.ids.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of samples in the bank.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the bank is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl SampleRegistry for SampleBank {
    fn contains(&self, name: &str) -> bool {
        self.ids.contains_key(name)
    }
}

impl<T: SampleRegistry + ?Sized> SampleRegistry for &T {
    fn contains(&self, name: &str) -> bool {
        (**self).contains(name)
    }
}
