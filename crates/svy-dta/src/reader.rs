//! `.dta` file reader.
//!
//! Sections are consumed strictly in file order, each framed by its
//! markers; parsed rows stream into the document store through the row
//! buffer, and long-string payloads are applied to stored rows as soon
//! as their GSO records are decoded.

use std::collections::HashMap;
use std::io::Read;

use serde_json::json;
use tracing::{debug, warn};

use svy_store::{DocumentStore, ID_FIELD};

use crate::codec::{
    read_array, read_fixed_str, read_prefixed_str, read_timestamp, read_u16, read_u32, read_u48,
    read_u64, read_vec, ByteOrder, read_byte_field, read_double_field, read_float_field,
    read_int_field, read_long_field,
};
use crate::error::{DtaError, Result};
use crate::gso::{GSO_MAGIC, GSO_TYPE_BINARY, GSO_TYPE_CSTR};
use crate::model::chars::Characteristic;
use crate::model::dictionary::{FORMAT_FIELD_LEN, NAME_FIELD_LEN, VAR_LABEL_FIELD_LEN};
use crate::model::{DatasetModel, MapSection};
use crate::sink::RowBuffer;
use crate::token::{expect_remainder, expect_token, token_bytes};
use crate::types::VarType;

/// Outermost section marker name.
pub(crate) const FILE_TOKEN: &str = "stata_dta";

/// Pending long-string references collected from the data section:
/// (variable, observation) key to the rows and fields that cite it.
type StrlRefs = HashMap<(u32, u64), Vec<(u64, String)>>;

/// Read a complete file into `model` and stream observations into the
/// store collection.
pub(crate) fn read_file<R: Read, S: DocumentStore>(
    reader: &mut R,
    model: &mut DatasetModel,
    store: &mut S,
    collection: &str,
) -> Result<()> {
    expect_token(reader, FILE_TOKEN, false)?;

    read_header(reader, model)?;
    read_map(reader, model)?;
    read_dictionary(reader, model)?;
    read_characteristics(reader, model)?;
    let refs = read_data(reader, model, store, collection)?;
    read_long_strings(reader, model, store, collection, refs)?;
    read_value_labels(reader, model)?;

    expect_token(reader, FILE_TOKEN, true)?;
    debug!(
        variables = model.header.variable_count(),
        observations = model.header.observation_count(),
        "file read complete"
    );
    Ok(())
}

fn read_header<R: Read>(reader: &mut R, model: &mut DatasetModel) -> Result<()> {
    expect_token(reader, "header", false)?;

    expect_token(reader, "release", false)?;
    let release = read_array::<3, _>(reader)?;
    model
        .header
        .set_release(&String::from_utf8_lossy(&release))?;
    expect_token(reader, "release", true)?;

    expect_token(reader, "byteorder", false)?;
    let marker = read_array::<3, _>(reader)?;
    let order = ByteOrder::from_marker(&String::from_utf8_lossy(&marker))?;
    model.header.set_byte_order(order);
    expect_token(reader, "byteorder", true)?;

    expect_token(reader, "K", false)?;
    let variables = read_u16(reader, order)?;
    model.set_variable_count(variables as usize)?;
    expect_token(reader, "K", true)?;

    expect_token(reader, "N", false)?;
    let observations = read_u64(reader, order)?;
    model.header.set_observation_count(observations);
    expect_token(reader, "N", true)?;

    expect_token(reader, "label", false)?;
    let label = read_prefixed_str(reader, order)?;
    model.header.set_label(&label);
    expect_token(reader, "label", true)?;

    expect_token(reader, "timestamp", false)?;
    model.header.set_timestamp(read_timestamp(reader)?);
    expect_token(reader, "timestamp", true)?;

    expect_token(reader, "header", true)?;
    debug!(order = ?order, variables, observations, "header read");
    Ok(())
}

fn read_map<R: Read>(reader: &mut R, model: &mut DatasetModel) -> Result<()> {
    let order = model.header.byte_order();
    expect_token(reader, "map", false)?;
    for section in MapSection::ALL {
        let offset = read_u64(reader, order)?;
        model.map.set(section, offset);
    }
    expect_token(reader, "map", true)
}

fn read_dictionary<R: Read>(reader: &mut R, model: &mut DatasetModel) -> Result<()> {
    let order = model.header.byte_order();
    let count = model.header.variable_count();

    expect_token(reader, "variable_types", false)?;
    let mut types = Vec::with_capacity(count);
    for _ in 0..count {
        types.push(VarType::from_code(read_u16(reader, order)?)?);
    }
    model.dictionary.set_all_types(types)?;
    expect_token(reader, "variable_types", true)?;

    expect_token(reader, "varnames", false)?;
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        names.push(read_fixed_str(reader, NAME_FIELD_LEN)?);
    }
    model.dictionary.set_all_names(names)?;
    expect_token(reader, "varnames", true)?;

    expect_token(reader, "sortlist", false)?;
    let mut terminated = false;
    for rank in 0..=count {
        let slot = read_u16(reader, order)? as usize;
        if terminated || slot == 0 {
            terminated = true;
            continue;
        }
        if slot > count {
            return Err(DtaError::invalid_format(format!(
                "sort list entry {slot} exceeds variable count {count}"
            )));
        }
        let id = model.dictionary.id_at(slot - 1)?;
        model.dictionary.set_sort_rank(id, rank)?;
    }
    expect_token(reader, "sortlist", true)?;

    expect_token(reader, "formats", false)?;
    for index in 0..count {
        let format = read_fixed_str(reader, FORMAT_FIELD_LEN)?;
        if !format.is_empty() {
            let id = model.dictionary.id_at(index)?;
            model.dictionary.set_format(id, &format);
        }
    }
    expect_token(reader, "formats", true)?;

    expect_token(reader, "value_label_names", false)?;
    for index in 0..count {
        let name = read_fixed_str(reader, NAME_FIELD_LEN)?;
        if !name.is_empty() {
            // Tables are parsed later in file order, so the reference
            // is recorded unchecked here.
            let id = model.dictionary.id_at(index)?;
            model.dictionary.set_value_label_unchecked(id, &name);
        }
    }
    expect_token(reader, "value_label_names", true)?;

    expect_token(reader, "variable_labels", false)?;
    for index in 0..count {
        let label = read_fixed_str(reader, VAR_LABEL_FIELD_LEN)?;
        if !label.is_empty() {
            let id = model.dictionary.id_at(index)?;
            model.dictionary.set_label(id, &label);
        }
    }
    expect_token(reader, "variable_labels", true)?;

    debug!(variables = count, "dictionary read");
    Ok(())
}

fn read_characteristics<R: Read>(reader: &mut R, model: &mut DatasetModel) -> Result<()> {
    let order = model.header.byte_order();
    expect_token(reader, "characteristics", false)?;

    let open_element = token_bytes("ch", false);
    loop {
        let lookahead = read_array::<4, _>(reader)?;
        if lookahead == open_element.as_slice() {
            let size = read_u32(reader, order)? as u64;
            let variable = read_fixed_str(reader, NAME_FIELD_LEN)?;
            let name = read_fixed_str(reader, NAME_FIELD_LEN)?;
            if size < 258 {
                return Err(DtaError::invalid_format(format!(
                    "characteristic size {size} below the 258-byte minimum"
                )));
            }
            let payload = read_fixed_str(reader, (size - 258) as usize)?;
            expect_token(reader, "ch", true)?;
            model.characteristics.append_raw(Characteristic {
                variable,
                name,
                payload,
                size,
            });
        } else if lookahead == b"</ch"[..] {
            expect_remainder(reader, "characteristics", &lookahead)?;
            break;
        } else {
            return Err(DtaError::token_mismatch("<ch>", &lookahead));
        }
    }

    debug!(records = model.characteristics.len(), "characteristics read");
    Ok(())
}

fn read_data<R: Read, S: DocumentStore>(
    reader: &mut R,
    model: &DatasetModel,
    store: &mut S,
    collection: &str,
) -> Result<StrlRefs> {
    let order = model.header.byte_order();
    expect_token(reader, "data", false)?;

    let mut refs: StrlRefs = HashMap::new();
    let mut buffer = RowBuffer::new(collection);

    for row in 1..=model.header.observation_count() {
        let mut fields = serde_json::Map::new();
        fields.insert(ID_FIELD.to_string(), json!(row));

        for entry in model.dictionary.entries() {
            match entry.var_type {
                VarType::Str(width) => {
                    let text = read_fixed_str(reader, width as usize)?;
                    if !text.is_empty() {
                        fields.insert(entry.name.clone(), json!(text));
                    }
                }
                VarType::StrL => {
                    let variable = read_u16(reader, order)? as u32;
                    let observation = read_u48(reader, order)?;
                    if variable != 0 || observation != 0 {
                        refs.entry((variable, observation))
                            .or_default()
                            .push((row, entry.name.clone()));
                    }
                }
                VarType::Byte => {
                    if let Some(value) = read_byte_field(reader)? {
                        fields.insert(entry.name.clone(), json!(value));
                    }
                }
                VarType::Int => {
                    if let Some(value) = read_int_field(reader, order)? {
                        fields.insert(entry.name.clone(), json!(value));
                    }
                }
                VarType::Long => {
                    if let Some(value) = read_long_field(reader, order)? {
                        fields.insert(entry.name.clone(), json!(value));
                    }
                }
                VarType::Float => {
                    if let Some(value) = read_float_field(reader, order)? {
                        fields.insert(entry.name.clone(), json!(value));
                    }
                }
                VarType::Double => {
                    if let Some(value) = read_double_field(reader, order)? {
                        fields.insert(entry.name.clone(), json!(value));
                    }
                }
            }
        }

        buffer.push(store, serde_json::Value::Object(fields))?;
    }

    // Rows must be in the store before GSO records patch them.
    buffer.flush(store)?;
    expect_token(reader, "data", true)?;

    debug!(rows = model.header.observation_count(), "data section read");
    Ok(refs)
}

fn read_long_strings<R: Read, S: DocumentStore>(
    reader: &mut R,
    model: &DatasetModel,
    store: &mut S,
    collection: &str,
    mut refs: StrlRefs,
) -> Result<()> {
    let order = model.header.byte_order();
    expect_token(reader, "strls", false)?;

    loop {
        let lookahead = read_array::<3, _>(reader)?;
        if lookahead == *GSO_MAGIC {
            let variable = read_u32(reader, order)?;
            let observation = read_u64(reader, order)?;
            let [encoding] = read_array::<1, _>(reader)?;
            let length = read_u32(reader, order)? as usize;
            let raw = read_vec(reader, length)?;

            let payload = match encoding {
                GSO_TYPE_BINARY => String::from_utf8_lossy(&raw).into_owned(),
                GSO_TYPE_CSTR => {
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    String::from_utf8_lossy(&raw[..end]).into_owned()
                }
                other => {
                    return Err(DtaError::invalid_format(format!(
                        "unknown GSO encoding type {other}"
                    )));
                }
            };

            match refs.remove(&(variable, observation)) {
                Some(citations) => {
                    for (row, field) in citations {
                        store.update_one(
                            collection,
                            &json!({ ID_FIELD: row }),
                            &json!({ field: payload.clone() }),
                        )?;
                    }
                }
                None => {
                    warn!(variable, observation, "GSO record never referenced");
                }
            }
        } else if lookahead == b"</s"[..] {
            expect_remainder(reader, "strls", &lookahead)?;
            break;
        } else {
            return Err(DtaError::token_mismatch("GSO", &lookahead));
        }
    }

    if !refs.is_empty() {
        return Err(DtaError::invalid_format(format!(
            "{} long-string references have no GSO record",
            refs.len()
        )));
    }
    Ok(())
}

fn read_value_labels<R: Read>(reader: &mut R, model: &mut DatasetModel) -> Result<()> {
    let order = model.header.byte_order();
    expect_token(reader, "value_labels", false)?;

    let open_block = token_bytes("lbl", false);
    loop {
        let lookahead = read_array::<5, _>(reader)?;
        if lookahead == open_block.as_slice() {
            let declared = read_u32(reader, order)? as usize;
            let name = read_fixed_str(reader, NAME_FIELD_LEN)?;
            let _padding = read_array::<3, _>(reader)?;
            let entry_count = read_u32(reader, order)? as usize;
            let text_len = read_u32(reader, order)? as usize;
            if declared != 8 + 8 * entry_count + text_len {
                return Err(DtaError::invalid_format(format!(
                    "value-label table length {declared} does not match its contents"
                )));
            }

            let mut offsets = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                offsets.push(read_u32(reader, order)? as usize);
            }
            let mut keys = Vec::with_capacity(entry_count);
            for _ in 0..entry_count {
                keys.push(read_u32(reader, order)? as i32);
            }
            let text = read_vec(reader, text_len)?;

            let table = model.enumerations.get_or_create(&name);
            for (index, (&offset, &key)) in offsets.iter().zip(keys.iter()).enumerate() {
                let end = offsets.get(index + 1).copied().unwrap_or(text_len);
                if offset > end || end > text_len {
                    return Err(DtaError::invalid_format(
                        "value-label offsets out of order",
                    ));
                }
                let slice = &text[offset..end];
                let label_end = slice.iter().position(|&b| b == 0).unwrap_or(slice.len());
                table.insert(key, String::from_utf8_lossy(&slice[..label_end]).into_owned());
            }
            expect_token(reader, "lbl", true)?;
        } else if lookahead == b"</val"[..] {
            expect_remainder(reader, "value_labels", &lookahead)?;
            break;
        } else {
            return Err(DtaError::token_mismatch("<lbl>", &lookahead));
        }
    }

    debug!(tables = model.enumerations.len(), "value labels read");
    Ok(())
}
