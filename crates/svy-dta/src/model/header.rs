//! Dataset header: release, byte order, counts, label, timestamp.

use serde::{Deserialize, Serialize};

use crate::codec::{ByteOrder, truncate_text};
use crate::error::{DtaError, Result};

/// The only supported format release.
pub const RELEASE: &str = "118";

/// Maximum number of variables a file may declare.
pub const MAX_VARIABLES: usize = 65535;

/// Dataset label limits: 80 characters, 320 UTF-8 bytes.
pub const MAX_LABEL_CHARS: usize = 80;
pub const MAX_LABEL_BYTES: usize = 320;

/// File header fields.
///
/// Setters validate; over-long labels are truncated, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    release: String,
    byte_order: ByteOrder,
    variable_count: u16,
    observation_count: u64,
    label: String,
    timestamp: Option<String>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            release: RELEASE.to_string(),
            byte_order: ByteOrder::default(),
            variable_count: 0,
            observation_count: 0,
            label: String::new(),
            timestamp: None,
        }
    }
}

impl Header {
    /// Format release, always "118".
    pub fn release(&self) -> &str {
        &self.release
    }

    /// Reject any release other than "118".
    pub fn set_release(&mut self, release: &str) -> Result<()> {
        if release != RELEASE {
            return Err(DtaError::UnsupportedRelease {
                release: release.to_string(),
            });
        }
        self.release = RELEASE.to_string();
        Ok(())
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn set_byte_order(&mut self, order: ByteOrder) {
        self.byte_order = order;
    }

    pub fn variable_count(&self) -> usize {
        self.variable_count as usize
    }

    /// Set the variable count; counts above 65535 are a range error.
    pub fn set_variable_count(&mut self, count: usize) -> Result<()> {
        if count > MAX_VARIABLES {
            return Err(DtaError::TooManyVariables {
                count: count as u64,
            });
        }
        self.variable_count = count as u16;
        Ok(())
    }

    pub fn observation_count(&self) -> u64 {
        self.observation_count
    }

    pub fn set_observation_count(&mut self, count: u64) {
        self.observation_count = count;
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set the dataset label, truncated to 80 characters / 320 bytes.
    pub fn set_label(&mut self, label: &str) {
        self.label = truncate_text(label, MAX_LABEL_CHARS, MAX_LABEL_BYTES).to_string();
    }

    pub fn clear_label(&mut self) {
        self.label.clear();
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }

    pub fn set_timestamp(&mut self, timestamp: Option<String>) {
        self.timestamp = timestamp;
    }
}
