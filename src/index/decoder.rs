//! Decoder for the binary resource index.
//!
//! Every read is bounded by the declared total length; a malformed buffer
//! fails with [`Error::Decode`] instead of looping or panicking.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, trace};

use super::{DecodedIndex, HEADER_LEN, IDSS_TAG, KEYS_TAG, QualifierNode, VERSION_LEN};
use crate::{
    error::{Error, Result},
    locale::LocaleComparator,
    qualifier::{QualifierDescriptor, decode_for_match, encode_folder_path},
    types::{KeyParam, KeyType, RecordValue, ResType, ResourceRecord},
};

const KEY_PARAM_LEN: usize = 8;
const ID_ENTRY_LEN: usize = 8;
const RECORD_HEADER_LEN: usize = 12;

/// Decodes an index buffer.
///
/// With a `pin`, qualifier nodes whose locale the comparator finds
/// incompatible keep their qualifier but contribute no records.
pub fn decode(
    bytes: &[u8],
    pin: Option<&QualifierDescriptor>,
    locales: &dyn LocaleComparator,
) -> Result<DecodedIndex> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::decode(format!(
            "index is {} bytes, header needs {}",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let version_bytes = &bytes[..VERSION_LEN];
    let version_end = version_bytes
        .iter()
        .position(|b| *b == 0)
        .unwrap_or(VERSION_LEN);
    let version = std::str::from_utf8(&version_bytes[..version_end])
        .map_err(|_| Error::decode("index version is not UTF-8"))?
        .to_string();

    let mut header = &bytes[VERSION_LEN..HEADER_LEN];
    let total_length = read_u32(&mut header, "total length")? as usize;
    let key_count = read_u32(&mut header, "key count")?;
    if total_length == 0 {
        return Err(Error::decode("total length is zero"));
    }
    if key_count == 0 {
        return Err(Error::decode("key count is zero"));
    }
    if total_length > bytes.len() {
        return Err(Error::decode(format!(
            "total length {} exceeds buffer of {} bytes",
            total_length,
            bytes.len()
        )));
    }
    if total_length < HEADER_LEN {
        return Err(Error::decode("total length is shorter than the header"));
    }

    let buf = &bytes[..total_length];
    let mut cursor = &buf[HEADER_LEN..];
    let mut nodes = Vec::new();

    for index in 0..key_count {
        expect_tag(&mut cursor, KEYS_TAG)?;
        let offset = read_u32(&mut cursor, "record node offset")? as usize;
        let param_count = read_u32(&mut cursor, "param count")? as usize;
        ensure_available(cursor, param_count, KEY_PARAM_LEN, "key params")?;

        let mut params = Vec::with_capacity(param_count);
        for _ in 0..param_count {
            let tag = read_u32(&mut cursor, "key param type")?;
            let value = read_u32(&mut cursor, "key param value")?;
            let key_type = KeyType::from_tag(tag)
                .ok_or_else(|| Error::decode(format!("unknown key param type {}", tag)))?;
            params.push(KeyParam::new(key_type, value)?);
        }

        let descriptor = decode_for_match(&params)?;
        let folder = encode_folder_path(&params);
        let compatible = pin.is_none_or(|pin| {
            locales.is_compatible(descriptor.locale.as_ref(), pin.locale.as_ref())
        });

        let records = if compatible {
            let records = decode_record_node(buf, offset)?;
            trace!("node {} `{}`: {} records", index, folder, records.len());
            records
        } else {
            debug!("skipping node {} `{}`: locale filtered", index, folder);
            Vec::new()
        };

        nodes.push(QualifierNode {
            params,
            descriptor,
            folder,
            records,
            filtered: !compatible,
        });
    }

    debug!(
        "decoded index `{}`: {} nodes, {} bytes",
        version,
        nodes.len(),
        total_length
    );
    Ok(DecodedIndex { version, nodes })
}

fn decode_record_node(buf: &[u8], offset: usize) -> Result<Vec<ResourceRecord>> {
    let mut cursor = at(buf, offset, "record node")?;
    expect_tag(&mut cursor, IDSS_TAG)?;
    let count = read_u32(&mut cursor, "id count")? as usize;
    ensure_available(cursor, count, ID_ENTRY_LEN, "id entries")?;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let id = read_u32(&mut cursor, "id")?;
        let record_offset = read_u32(&mut cursor, "record offset")? as usize;
        records.push(decode_record(buf, record_offset, id)?);
    }
    Ok(records)
}

fn decode_record(buf: &[u8], offset: usize, expected_id: u32) -> Result<ResourceRecord> {
    let mut cursor = at(buf, offset, "resource record")?;
    let size = read_u32(&mut cursor, "record size")? as usize;
    if size < RECORD_HEADER_LEN || size > buf.len() - offset {
        return Err(Error::decode(format!(
            "record at {} declares size {}",
            offset, size
        )));
    }
    let mut cursor = &buf[offset + 4..offset + size];

    let tag = read_u32(&mut cursor, "record type")?;
    let res_type = ResType::from_tag(tag)
        .ok_or_else(|| Error::decode(format!("unknown resource type {}", tag)))?;
    let id = read_u32(&mut cursor, "record id")?;
    if id != expected_id {
        return Err(Error::decode(format!(
            "record at {} has id {:#x}, index says {:#x}",
            offset, id, expected_id
        )));
    }

    let value = if res_type.is_array() {
        let byte_len = read_u16(&mut cursor, "array length")? as usize;
        if byte_len > cursor.len() {
            return Err(Error::decode("array value overruns its record"));
        }
        let (mut packed, rest) = cursor.split_at(byte_len);
        cursor = rest;
        let mut values = Vec::new();
        while !packed.is_empty() {
            values.push(read_string(&mut packed)?);
        }
        RecordValue::Array(values)
    } else {
        RecordValue::Scalar(read_string(&mut cursor)?)
    };
    let name = read_string(&mut cursor)?;

    Ok(ResourceRecord {
        id,
        name,
        res_type,
        value,
    })
}

fn at<'a>(buf: &'a [u8], offset: usize, what: &str) -> Result<&'a [u8]> {
    buf.get(offset..)
        .filter(|rest| !rest.is_empty())
        .ok_or_else(|| Error::decode(format!("{} offset {} is out of bounds", what, offset)))
}

fn ensure_available(cursor: &[u8], count: usize, width: usize, what: &str) -> Result<()> {
    match count.checked_mul(width) {
        Some(needed) if needed <= cursor.len() => Ok(()),
        _ => Err(Error::decode(format!(
            "{} {} do not fit in the remaining {} bytes",
            count,
            what,
            cursor.len()
        ))),
    }
}

fn expect_tag(cursor: &mut &[u8], expected: &[u8; 4]) -> Result<()> {
    let mut tag = [0u8; 4];
    cursor
        .read_exact(&mut tag)
        .map_err(|_| truncated("tag"))?;
    if &tag != expected {
        return Err(Error::decode(format!(
            "expected tag {:?}, found {:?}",
            String::from_utf8_lossy(expected),
            String::from_utf8_lossy(&tag)
        )));
    }
    Ok(())
}

fn read_u32(cursor: &mut &[u8], what: &str) -> Result<u32> {
    cursor
        .read_u32::<LittleEndian>()
        .map_err(|_| truncated(what))
}

fn read_u16(cursor: &mut &[u8], what: &str) -> Result<u16> {
    cursor
        .read_u16::<LittleEndian>()
        .map_err(|_| truncated(what))
}

/// Reads a `u16` length, that many UTF-8 bytes and the terminating NUL.
fn read_string(cursor: &mut &[u8]) -> Result<String> {
    let len = read_u16(cursor, "string length")? as usize;
    if cursor.len() < len + 1 {
        return Err(truncated("string"));
    }
    let (text, rest) = cursor.split_at(len);
    if rest[0] != 0 {
        return Err(Error::decode("string is not NUL terminated"));
    }
    let text = std::str::from_utf8(text)
        .map_err(|_| Error::decode("string is not UTF-8"))?
        .to_string();
    *cursor = &rest[1..];
    Ok(text)
}

fn truncated(what: &str) -> Error {
    Error::decode(format!("truncated {}", what))
}
