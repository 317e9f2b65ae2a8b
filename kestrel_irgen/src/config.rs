//! Target layout and lowering options.

use serde::{Deserialize, Serialize};

use crate::error::{IrGenError, Result};

/// Layout facts of the single modeled target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TargetLayout {
    /// Size of a pointer in bytes.
    pub pointer_size: u64,
    /// ABI alignment of a pointer in bytes.
    pub pointer_align: u64,
}

impl Default for TargetLayout {
    fn default() -> Self {
        Self {
            pointer_size: 8,
            pointer_align: 8,
        }
    }
}

impl TargetLayout {
    pub fn validate(&self) -> Result<()> {
        if self.pointer_size == 0 {
            return Err(IrGenError::InvalidConfig(
                "pointer_size must be non-zero".to_string(),
            ));
        }
        if !self.pointer_align.is_power_of_two() {
            return Err(IrGenError::InvalidConfig(format!(
                "pointer_align {} is not a power of two",
                self.pointer_align
            )));
        }
        Ok(())
    }
}

/// Options controlling a lowering session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IrGenOptions {
    pub layout: TargetLayout,
    /// Largest number of scalars a tuple or struct may explode to before it
    /// is passed and returned by address instead.
    pub max_scalars: usize,
    /// Run the IR verifier on every function when the module is finished.
    pub verify: bool,
}

impl Default for IrGenOptions {
    fn default() -> Self {
        Self {
            layout: TargetLayout::default(),
            max_scalars: 3,
            verify: true,
        }
    }
}

impl IrGenOptions {
    /// Parse options from JSON. Missing fields take their default values.
    pub fn from_json(text: &str) -> Result<Self> {
        let options: IrGenOptions = serde_json::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if self.max_scalars == 0 {
            return Err(IrGenError::InvalidConfig(
                "max_scalars must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
