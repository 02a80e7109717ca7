//! `.dta` file writer.
//!
//! Sections are emitted in the same order the reader consumes them. The
//! offset map is written first as a zero-filled placeholder; the position
//! of every subsequent section is recorded as it is written, and once the
//! data-dependent sections are done the writer seeks back, rewrites the
//! map with real offsets, then returns to the end of the file for the
//! close marker.

use std::collections::HashMap;
use std::io::{Seek, Write};

use serde_json::{json, Value as Json};
use tracing::debug;

use svy_store::{document_id, DocumentStore};

use crate::codec::{
    encode_byte_field, encode_double_field, encode_fixed_str, encode_float_field,
    encode_int_field, encode_long_field, encode_prefixed_str, encode_timestamp, encode_u16,
    encode_u32, encode_u48, encode_u64, ByteOrder,
};
use crate::error::{DtaError, Result};
use crate::gso::{self, StrlTable};
use crate::model::dictionary::{FORMAT_FIELD_LEN, NAME_FIELD_LEN, VAR_LABEL_FIELD_LEN};
use crate::model::{DatasetModel, MapSection, OffsetMap};
use crate::reader::FILE_TOKEN;
use crate::sink::ByteSink;
use crate::token::token_bytes;
use crate::types::{Value, VarType};

/// Write the model and the store's observations as a complete file.
pub(crate) fn write_file<W: Write + Seek, S: DocumentStore>(
    writer: W,
    model: &mut DatasetModel,
    store: &S,
    collection: &str,
) -> Result<()> {
    validate_model(model)?;

    let order = model.header.byte_order();
    let mut sink = ByteSink::new(writer)?;
    model.map = OffsetMap::default();

    model.map.set(MapSection::Open, sink.position());
    sink.push(&token_bytes(FILE_TOKEN, false))?;

    write_header(&mut sink, model)?;

    // Placeholder map image; rewritten in place once offsets are known.
    model.map.set(MapSection::Map, sink.position());
    let map_position = sink.position();
    sink.push(&map_image(order, &OffsetMap::default()))?;

    write_dictionary(&mut sink, model)?;
    write_characteristics(&mut sink, model)?;
    let strl_table = write_data(&mut sink, model, store, collection)?;
    write_long_strings(&mut sink, model, &strl_table)?;
    write_value_labels(&mut sink, model)?;

    let close_position = sink.position();
    model.map.set(MapSection::Close, close_position);
    model
        .map
        .set(MapSection::Eof, close_position + token_bytes(FILE_TOKEN, true).len() as u64);

    sink.seek_to(map_position)?;
    sink.push(&map_image(order, &model.map))?;
    sink.seek_to(close_position)?;
    sink.push(&token_bytes(FILE_TOKEN, true))?;
    sink.finish()?;

    debug!(
        variables = model.header.variable_count(),
        observations = model.header.observation_count(),
        "file write complete"
    );
    Ok(())
}

/// Reject models the format cannot represent before any byte is written.
fn validate_model(model: &DatasetModel) -> Result<()> {
    if model.dictionary.len() != model.header.variable_count() {
        return Err(DtaError::invalid_format(format!(
            "dictionary has {} entries for a declared variable count of {}",
            model.dictionary.len(),
            model.header.variable_count()
        )));
    }
    for entry in model.dictionary.entries() {
        if let Some(name) = entry.value_label.as_deref() {
            if !model.enumerations.contains(name) {
                return Err(DtaError::unknown_enumeration(name));
            }
        }
    }
    Ok(())
}

fn write_header<W: Write + Seek>(sink: &mut ByteSink<W>, model: &DatasetModel) -> Result<()> {
    let order = model.header.byte_order();
    sink.push(&token_bytes("header", false))?;

    sink.push(&token_bytes("release", false))?;
    sink.push(model.header.release().as_bytes())?;
    sink.push(&token_bytes("release", true))?;

    sink.push(&token_bytes("byteorder", false))?;
    sink.push(order.as_str().as_bytes())?;
    sink.push(&token_bytes("byteorder", true))?;

    sink.push(&token_bytes("K", false))?;
    sink.push(&encode_u16(order, model.header.variable_count() as u16))?;
    sink.push(&token_bytes("K", true))?;

    sink.push(&token_bytes("N", false))?;
    sink.push(&encode_u64(order, model.header.observation_count()))?;
    sink.push(&token_bytes("N", true))?;

    sink.push(&token_bytes("label", false))?;
    sink.push(&encode_prefixed_str(order, model.header.label()))?;
    sink.push(&token_bytes("label", true))?;

    sink.push(&token_bytes("timestamp", false))?;
    sink.push(&encode_timestamp(model.header.timestamp()))?;
    sink.push(&token_bytes("timestamp", true))?;

    sink.push(&token_bytes("header", true))
}

fn map_image(order: ByteOrder, map: &OffsetMap) -> Vec<u8> {
    let mut buf = token_bytes("map", false);
    for &offset in map.as_slice() {
        buf.extend_from_slice(&encode_u64(order, offset));
    }
    buf.extend_from_slice(&token_bytes("map", true));
    buf
}

fn write_dictionary<W: Write + Seek>(
    sink: &mut ByteSink<W>,
    model: &mut DatasetModel,
) -> Result<()> {
    let order = model.header.byte_order();
    let count = model.header.variable_count();

    model.map.set(MapSection::VariableTypes, sink.position());
    sink.push(&token_bytes("variable_types", false))?;
    for entry in model.dictionary.entries() {
        sink.push(&encode_u16(order, entry.var_type.code()))?;
    }
    sink.push(&token_bytes("variable_types", true))?;

    model.map.set(MapSection::VariableNames, sink.position());
    sink.push(&token_bytes("varnames", false))?;
    for entry in model.dictionary.entries() {
        sink.push(&encode_fixed_str(&entry.name, NAME_FIELD_LEN))?;
    }
    sink.push(&token_bytes("varnames", true))?;

    model.map.set(MapSection::SortList, sink.position());
    sink.push(&token_bytes("sortlist", false))?;
    let mut slots = vec![0u16; count + 1];
    for (index, entry) in model.dictionary.entries().iter().enumerate() {
        if let Some(rank) = entry.sort_rank {
            slots[rank] = index as u16 + 1;
        }
    }
    for slot in slots {
        sink.push(&encode_u16(order, slot))?;
    }
    sink.push(&token_bytes("sortlist", true))?;

    model.map.set(MapSection::Formats, sink.position());
    sink.push(&token_bytes("formats", false))?;
    for entry in model.dictionary.entries() {
        sink.push(&encode_fixed_str(
            entry.format.as_deref().unwrap_or(""),
            FORMAT_FIELD_LEN,
        ))?;
    }
    sink.push(&token_bytes("formats", true))?;

    model.map.set(MapSection::ValueLabelNames, sink.position());
    sink.push(&token_bytes("value_label_names", false))?;
    for entry in model.dictionary.entries() {
        sink.push(&encode_fixed_str(
            entry.value_label.as_deref().unwrap_or(""),
            NAME_FIELD_LEN,
        ))?;
    }
    sink.push(&token_bytes("value_label_names", true))?;

    model.map.set(MapSection::VariableLabels, sink.position());
    sink.push(&token_bytes("variable_labels", false))?;
    for entry in model.dictionary.entries() {
        sink.push(&encode_fixed_str(
            entry.label.as_deref().unwrap_or(""),
            VAR_LABEL_FIELD_LEN,
        ))?;
    }
    sink.push(&token_bytes("variable_labels", true))?;

    debug!(variables = count, "dictionary written");
    Ok(())
}

fn write_characteristics<W: Write + Seek>(
    sink: &mut ByteSink<W>,
    model: &mut DatasetModel,
) -> Result<()> {
    let order = model.header.byte_order();
    model.map.set(MapSection::Characteristics, sink.position());
    sink.push(&token_bytes("characteristics", false))?;

    for record in model.characteristics.records() {
        let size = u32::try_from(record.size).map_err(|_| {
            DtaError::invalid_format(format!("characteristic size {} too large", record.size))
        })?;
        sink.push(&token_bytes("ch", false))?;
        sink.push(&encode_u32(order, size))?;
        sink.push(&encode_fixed_str(&record.variable, NAME_FIELD_LEN))?;
        sink.push(&encode_fixed_str(&record.name, NAME_FIELD_LEN))?;
        sink.push(&encode_fixed_str(&record.payload, (size - 258) as usize))?;
        sink.push(&token_bytes("ch", true))?;
    }

    sink.push(&token_bytes("characteristics", true))
}

fn write_data<W: Write + Seek, S: DocumentStore>(
    sink: &mut ByteSink<W>,
    model: &mut DatasetModel,
    store: &S,
    collection: &str,
) -> Result<StrlTable> {
    let order = model.header.byte_order();
    let observations = model.header.observation_count();

    model.map.set(MapSection::Data, sink.position());
    sink.push(&token_bytes("data", false))?;

    let mut rows: HashMap<u64, Json> = HashMap::new();
    for doc in store.find(collection, &json!({}))? {
        let Some(id) = document_id(&doc) else {
            return Err(DtaError::invalid_format(
                "observation document without an integer _id",
            ));
        };
        if id == 0 {
            // Reserved for the model bundle.
            continue;
        }
        let row = u64::try_from(id)
            .map_err(|_| DtaError::invalid_format(format!("negative row id {id}")))?;
        if row > observations {
            return Err(DtaError::RowOutOfBounds {
                row,
                count: observations,
            });
        }
        rows.insert(row, doc);
    }

    let mut strl_table = StrlTable::new();
    for row in 1..=observations {
        let doc = rows.get(&row);
        for (index, entry) in model.dictionary.entries().iter().enumerate() {
            let field = doc.and_then(|d| d.get(&entry.name));
            let value = field
                .map(|json| Value::from_json(entry.var_type, json, &entry.name))
                .transpose()?;

            match (entry.var_type, value) {
                (VarType::Str(width), value) => {
                    let text = match &value {
                        Some(Value::Str(text)) => text.as_str(),
                        _ => "",
                    };
                    sink.push(&encode_fixed_str(text, width as usize))?;
                }
                (VarType::StrL, Some(Value::StrL(payload))) => {
                    let key = strl_table.key_for(index as u32 + 1, row, &payload);
                    sink.push(&encode_u16(order, key.variable as u16))?;
                    sink.push(&encode_u48(order, key.observation))?;
                }
                (VarType::StrL, _) => {
                    sink.push(&encode_u16(order, 0))?;
                    sink.push(&encode_u48(order, 0))?;
                }
                (VarType::Byte, value) => {
                    let number = match value {
                        Some(Value::Byte(v)) => Some(v),
                        _ => None,
                    };
                    sink.push(&encode_byte_field(number))?;
                }
                (VarType::Int, value) => {
                    let number = match value {
                        Some(Value::Int(v)) => Some(v),
                        _ => None,
                    };
                    sink.push(&encode_int_field(order, number))?;
                }
                (VarType::Long, value) => {
                    let number = match value {
                        Some(Value::Long(v)) => Some(v),
                        _ => None,
                    };
                    sink.push(&encode_long_field(order, number))?;
                }
                (VarType::Float, value) => {
                    let number = match value {
                        Some(Value::Float(v)) => Some(v),
                        _ => None,
                    };
                    sink.push(&encode_float_field(order, number))?;
                }
                (VarType::Double, value) => {
                    let number = match value {
                        Some(Value::Double(v)) => Some(v),
                        _ => None,
                    };
                    sink.push(&encode_double_field(order, number))?;
                }
            }
        }
    }

    sink.push(&token_bytes("data", true))?;
    debug!(rows = observations, "data section written");
    Ok(strl_table)
}

fn write_long_strings<W: Write + Seek>(
    sink: &mut ByteSink<W>,
    model: &mut DatasetModel,
    strl_table: &StrlTable,
) -> Result<()> {
    let order = model.header.byte_order();
    model.map.set(MapSection::LongStrings, sink.position());
    sink.push(&token_bytes("strls", false))?;
    for (key, payload) in strl_table.entries() {
        sink.push(&gso::encode_record(order, *key, payload))?;
    }
    sink.push(&token_bytes("strls", true))?;

    debug!(records = strl_table.entries().len(), "long strings written");
    Ok(())
}

fn write_value_labels<W: Write + Seek>(
    sink: &mut ByteSink<W>,
    model: &mut DatasetModel,
) -> Result<()> {
    let order = model.header.byte_order();
    model.map.set(MapSection::ValueLabels, sink.position());
    sink.push(&token_bytes("value_labels", false))?;

    for table in model.enumerations.tables() {
        let mut offsets = Vec::with_capacity(table.len());
        let mut keys = Vec::with_capacity(table.len());
        let mut text = Vec::new();
        for (key, label) in table.entries() {
            offsets.push(text.len() as u32);
            keys.push(*key);
            text.extend_from_slice(label.as_bytes());
            text.push(0);
        }

        let declared = 8 + 8 * table.len() as u32 + text.len() as u32;
        sink.push(&token_bytes("lbl", false))?;
        sink.push(&encode_u32(order, declared))?;
        sink.push(&encode_fixed_str(table.name(), NAME_FIELD_LEN))?;
        sink.push(&[0u8; 3])?;
        sink.push(&encode_u32(order, table.len() as u32))?;
        sink.push(&encode_u32(order, text.len() as u32))?;
        for offset in offsets {
            sink.push(&encode_u32(order, offset))?;
        }
        for key in keys {
            sink.push(&encode_u32(order, key as u32))?;
        }
        sink.push(&text)?;
        sink.push(&token_bytes("lbl", true))?;
    }

    sink.push(&token_bytes("value_labels", true))?;
    debug!(tables = model.enumerations.len(), "value labels written");
    Ok(())
}
