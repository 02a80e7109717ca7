//! Variable types and dictionary entries.

use serde::{Deserialize, Serialize};

use crate::error::{DtaError, Result};

/// Largest fixed-string width (`str1` through `str2045`).
pub const MAX_STR_WIDTH: u16 = 2045;

/// Type code for out-of-line long strings.
pub const STRL_CODE: u16 = 32768;
/// Type code for `double`.
pub const DOUBLE_CODE: u16 = 65526;
/// Type code for `float`.
pub const FLOAT_CODE: u16 = 65527;
/// Type code for `long`.
pub const LONG_CODE: u16 = 65528;
/// Type code for `int`.
pub const INT_CODE: u16 = 65529;
/// Type code for `byte`.
pub const BYTE_CODE: u16 = 65530;

/// Storage type of a variable.
///
/// Codes 1..=2045 are fixed strings of that byte width; the remaining
/// codes are the numeric types and the out-of-line long string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarType {
    /// Fixed-width string of 1..=2045 bytes (`str#`).
    Str(u16),
    /// Out-of-line long string (`strL`).
    StrL,
    /// 8-byte IEEE float (`double`).
    Double,
    /// 4-byte IEEE float (`float`).
    Float,
    /// 4-byte signed integer (`long`).
    Long,
    /// 2-byte signed integer (`int`).
    Int,
    /// 1-byte signed integer (`byte`).
    Byte,
}

impl VarType {
    /// Decode a type code. Unknown codes are a format error.
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            1..=MAX_STR_WIDTH => Ok(Self::Str(code)),
            STRL_CODE => Ok(Self::StrL),
            DOUBLE_CODE => Ok(Self::Double),
            FLOAT_CODE => Ok(Self::Float),
            LONG_CODE => Ok(Self::Long),
            INT_CODE => Ok(Self::Int),
            BYTE_CODE => Ok(Self::Byte),
            _ => Err(DtaError::InvalidTypeCode { code }),
        }
    }

    /// The numeric type code.
    pub fn code(self) -> u16 {
        match self {
            Self::Str(width) => width,
            Self::StrL => STRL_CODE,
            Self::Double => DOUBLE_CODE,
            Self::Float => FLOAT_CODE,
            Self::Long => LONG_CODE,
            Self::Int => INT_CODE,
            Self::Byte => BYTE_CODE,
        }
    }

    /// Decode a type name (`str12`, `strL`, `double`, ...).
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "strL" => Ok(Self::StrL),
            "double" => Ok(Self::Double),
            "float" => Ok(Self::Float),
            "long" => Ok(Self::Long),
            "int" => Ok(Self::Int),
            "byte" => Ok(Self::Byte),
            _ => {
                let width = name
                    .strip_prefix("str")
                    .and_then(|digits| digits.parse::<u16>().ok())
                    .filter(|width| (1..=MAX_STR_WIDTH).contains(width));
                width.map(Self::Str).ok_or_else(|| DtaError::InvalidTypeName {
                    name: name.to_string(),
                })
            }
        }
    }

    /// The human type name.
    pub fn name(self) -> String {
        match self {
            Self::Str(width) => format!("str{width}"),
            Self::StrL => "strL".to_string(),
            Self::Double => "double".to_string(),
            Self::Float => "float".to_string(),
            Self::Long => "long".to_string(),
            Self::Int => "int".to_string(),
            Self::Byte => "byte".to_string(),
        }
    }

    /// Byte width of the field in the data section.
    ///
    /// Fixed strings occupy their declared width; a `strL` field holds an
    /// 8-byte reference into the long-string table.
    pub fn width(self) -> usize {
        match self {
            Self::Str(width) => width as usize,
            Self::StrL | Self::Double => 8,
            Self::Float | Self::Long => 4,
            Self::Int => 2,
            Self::Byte => 1,
        }
    }

    /// Whether this type stores string payload (fixed or long).
    pub fn is_string(self) -> bool {
        matches!(self, Self::Str(_) | Self::StrL)
    }
}

/// One dictionary entry: everything the file declares about a variable.
///
/// Field widths on disk: name 129 bytes (32 characters), format 57 bytes,
/// value-label name 129 bytes, label 321 bytes. Setters on the dictionary
/// truncate instead of erroring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name, at most 32 characters.
    pub name: String,
    /// Storage type.
    pub var_type: VarType,
    /// Display format, at most 56 bytes.
    pub format: Option<String>,
    /// Free-text label, at most 320 bytes.
    pub label: Option<String>,
    /// 0-based rank in the dataset sort order.
    pub sort_rank: Option<usize>,
    /// Name of the value-label table attached to this variable.
    pub value_label: Option<String>,
}

impl Variable {
    /// Create an entry with a name and type, everything else unset.
    pub fn new(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            format: None,
            label: None,
            sort_rank: None,
            value_label: None,
        }
    }

    /// Placeholder entry used while a dictionary is being populated.
    pub(crate) fn placeholder() -> Self {
        Self::new(String::new(), VarType::Byte)
    }

    /// Set the free-text label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the display format.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_name_bijection() {
        let codes = [1u16, 9, 2045, 32768, 65526, 65527, 65528, 65529, 65530];
        for code in codes {
            let ty = VarType::from_code(code).unwrap();
            assert_eq!(ty.code(), code);
            assert_eq!(VarType::from_name(&ty.name()).unwrap(), ty);
        }
    }

    #[test]
    fn test_invalid_codes() {
        for code in [0u16, 2046, 30000, 65525, 65531, u16::MAX] {
            assert!(VarType::from_code(code).is_err(), "code {code}");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "str", "str0", "str2046", "strl", "word", "int8"] {
            assert!(VarType::from_name(name).is_err(), "name {name}");
        }
    }

    #[test]
    fn test_widths() {
        assert_eq!(VarType::Str(9).width(), 9);
        assert_eq!(VarType::StrL.width(), 8);
        assert_eq!(VarType::Double.width(), 8);
        assert_eq!(VarType::Float.width(), 4);
        assert_eq!(VarType::Long.width(), 4);
        assert_eq!(VarType::Int.width(), 2);
        assert_eq!(VarType::Byte.width(), 1);
    }

    #[test]
    fn test_builder() {
        let var = Variable::new("age", VarType::Int).with_label("Age in years");
        assert_eq!(var.name, "age");
        assert_eq!(var.label.as_deref(), Some("Age in years"));
        assert!(var.format.is_none());
    }
}
