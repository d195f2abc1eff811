//! Numeric parameters of CSI and DCS sequences.
//!
//! Parameters are separated by `;` and sub-parameters by `:`. Every slot is
//! either empty or holds a `u32`; an empty slot is distinct from a zero so
//! that defaulting rules can tell `CSI m` apart from `CSI 0 m`, and `1;;3`
//! apart from `1;3`.

use std::fmt;
use std::str::FromStr;

/// A borrowed view of one parameter's sub-parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subparams<'a> {
    slots: &'a [Option<u32>],
}

impl<'a> Subparams<'a> {
    pub fn get(&self, index: usize, fallback: u32) -> u32 {
        self.slots.get(index).copied().flatten().unwrap_or(fallback)
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
}

/// An ordered list of parameters, each an ordered list of sub-parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Params {
    parameters: Vec<Vec<Option<u32>>>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from literal slices, for dispatch tables and tests.
    pub fn from_slices(params: &[&[u32]]) -> Self {
        Self {
            parameters: params
                .iter()
                .map(|subparams| subparams.iter().copied().map(Some).collect())
                .collect(),
        }
    }

    /// First sub-parameter of parameter `index`, or `fallback` if absent or
    /// empty.
    pub fn get(&self, index: usize, fallback: u32) -> u32 {
        self.get_subparam(index, 0, fallback)
    }

    pub fn get_subparam(&self, index: usize, subindex: usize, fallback: u32) -> u32 {
        self.parameters
            .get(index)
            .and_then(|subparams| subparams.get(subindex))
            .copied()
            .flatten()
            .unwrap_or(fallback)
    }

    pub fn subparams(&self, index: usize) -> Subparams<'_> {
        Subparams {
            slots: self.parameters.get(index).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn add_param(&mut self, value: u32) {
        self.parameters.push(vec![Some(value)]);
    }

    pub fn add_empty_param(&mut self) {
        self.parameters.push(vec![None]);
    }

    /// Append a sub-parameter to the last parameter, starting a new parameter
    /// if there is none yet.
    pub fn add_subparam(&mut self, value: u32) {
        match self.parameters.last_mut() {
            Some(last) => last.push(Some(value)),
            None => self.add_param(value),
        }
    }

    pub fn add_empty_subparam(&mut self) {
        match self.parameters.last_mut() {
            Some(last) => last.push(None),
            None => self.add_empty_param(),
        }
    }

    pub fn add_subparams(&mut self, subparams: Vec<Option<u32>>) {
        self.parameters.push(subparams);
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, subparams) in self.parameters.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            for (j, slot) in subparams.iter().enumerate() {
                if j > 0 {
                    f.write_str(":")?;
                }
                if let Some(value) = slot {
                    write!(f, "{value}")?;
                }
            }
        }
        Ok(())
    }
}

/// Parsing never fails: non-numeric garbage in a slot decays to an empty
/// slot, matching how the escape parser treats unparseable digits.
impl FromStr for Params {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::new());
        }
        let parameters = s
            .split(';')
            .map(|param| {
                param
                    .split(':')
                    .map(|slot| {
                        if slot.is_empty() {
                            None
                        } else {
                            slot.parse::<u32>().ok()
                        }
                    })
                    .collect()
            })
            .collect();
        Ok(Self { parameters })
    }
}
