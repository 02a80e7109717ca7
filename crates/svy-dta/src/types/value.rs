//! Typed field values and their JSON document form.
//!
//! Observations live in the document store as JSON objects; an absent
//! field is simply not present in the object. This module converts
//! between the store's JSON values and the typed values the codec
//! encodes, checking that a JSON value actually fits the variable's
//! declared type.

use serde_json::{Number, Value as Json};

use crate::error::{DtaError, Result};
use crate::types::variable::VarType;

/// A present field value, typed per its variable's declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `byte`
    Byte(i8),
    /// `int`
    Int(i16),
    /// `long`
    Long(i32),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Fixed-width string (`str#`).
    Str(String),
    /// Out-of-line long string (`strL`).
    StrL(String),
}

impl Value {
    /// Convert to the JSON form stored in a row document.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Byte(v) => Json::from(*v),
            Self::Int(v) => Json::from(*v),
            Self::Long(v) => Json::from(*v),
            Self::Float(v) => Number::from_f64(f64::from(*v))
                .map_or(Json::Null, Json::Number),
            Self::Double(v) => Number::from_f64(*v).map_or(Json::Null, Json::Number),
            Self::Str(s) | Self::StrL(s) => Json::from(s.clone()),
        }
    }

    /// Interpret a stored JSON value under a variable's declared type.
    ///
    /// Integer widths are checked; a value that does not fit is a
    /// [`DtaError::ValueTypeMismatch`] reported with the variable name.
    pub fn from_json(var_type: VarType, json: &Json, variable: &str) -> Result<Self> {
        let mismatch = || DtaError::ValueTypeMismatch {
            name: variable.to_string(),
            type_name: var_type.name(),
        };

        match var_type {
            VarType::Byte => json
                .as_i64()
                .and_then(|v| i8::try_from(v).ok())
                .map(Self::Byte)
                .ok_or_else(mismatch),
            VarType::Int => json
                .as_i64()
                .and_then(|v| i16::try_from(v).ok())
                .map(Self::Int)
                .ok_or_else(mismatch),
            VarType::Long => json
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Self::Long)
                .ok_or_else(mismatch),
            VarType::Float => json
                .as_f64()
                .map(|v| Self::Float(v as f32))
                .ok_or_else(mismatch),
            VarType::Double => json.as_f64().map(Self::Double).ok_or_else(mismatch),
            VarType::Str(_) => json
                .as_str()
                .map(|s| Self::Str(s.to_string()))
                .ok_or_else(mismatch),
            VarType::StrL => json
                .as_str()
                .map(|s| Self::StrL(s.to_string()))
                .ok_or_else(mismatch),
        }
    }
}
