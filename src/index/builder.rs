//! Serializes qualifier directories and their records into the binary index.
//!
//! Used to produce fixtures and by packaging tools; the runtime never writes
//! an index.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};

use super::{HEADER_LEN, IDSS_TAG, KEYS_TAG, VERSION_LEN};
use crate::{
    error::{Error, Result},
    qualifier::QualifierDescriptor,
    types::{KeyParam, ResourceRecord},
};

/// Builder for a `resources.index` buffer.
///
/// # Example
///
/// ```rust
/// use resindex::index::{IndexBuilder, decode};
/// use resindex::locale::LocaleMatcher;
/// use resindex::types::{ResType, ResourceRecord};
///
/// let mut builder = IndexBuilder::new("demo");
/// builder.add_folder(
///     "default",
///     vec![ResourceRecord::scalar(1, "app_name", ResType::String, "App")],
/// )?;
/// let bytes = builder.build()?;
/// let index = decode(&bytes, None, &LocaleMatcher)?;
/// assert_eq!(index.nodes[0].records[0].text(), "App");
/// # Ok::<(), resindex::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    version: String,
    nodes: Vec<(Vec<KeyParam>, Vec<ResourceRecord>)>,
}

impl IndexBuilder {
    pub fn new(version: &str) -> Self {
        Self {
            version: version.to_string(),
            nodes: Vec::new(),
        }
    }

    /// Adds a qualifier directory given by its params.
    pub fn add_qualifier(&mut self, params: Vec<KeyParam>, records: Vec<ResourceRecord>) -> &mut Self {
        self.nodes.push((params, records));
        self
    }

    /// Adds a qualifier directory given by its folder name (`default`, `zh_CN-dark`, ...).
    pub fn add_folder(&mut self, folder: &str, records: Vec<ResourceRecord>) -> Result<&mut Self> {
        let params = QualifierDescriptor::from_folder_name(folder)?.to_params();
        Ok(self.add_qualifier(params, records))
    }

    pub fn build(&self) -> Result<Vec<u8>> {
        if self.version.len() >= VERSION_LEN {
            return Err(Error::decode("index version is too long"));
        }

        let mut buf = Vec::new();
        buf.extend_from_slice(self.version.as_bytes());
        buf.resize(VERSION_LEN, 0);
        buf.write_u32::<LittleEndian>(0)?;
        buf.write_u32::<LittleEndian>(self.nodes.len() as u32)?;
        debug_assert_eq!(buf.len(), HEADER_LEN);

        let mut offset_slots = Vec::with_capacity(self.nodes.len());
        for (params, _) in &self.nodes {
            buf.extend_from_slice(KEYS_TAG);
            offset_slots.push(buf.len());
            buf.write_u32::<LittleEndian>(0)?;
            buf.write_u32::<LittleEndian>(params.len() as u32)?;
            for param in params {
                buf.write_u32::<LittleEndian>(param.key_type.tag())?;
                buf.write_u32::<LittleEndian>(param.value)?;
            }
        }

        for ((_, records), slot) in self.nodes.iter().zip(offset_slots) {
            let node_offset = to_u32(buf.len())?;
            LittleEndian::write_u32(&mut buf[slot..slot + 4], node_offset);

            buf.extend_from_slice(IDSS_TAG);
            buf.write_u32::<LittleEndian>(records.len() as u32)?;
            let entries_start = buf.len();
            for record in records {
                buf.write_u32::<LittleEndian>(record.id)?;
                buf.write_u32::<LittleEndian>(0)?;
            }
            for (i, record) in records.iter().enumerate() {
                let record_offset = to_u32(buf.len())?;
                let entry = entries_start + i * 8 + 4;
                LittleEndian::write_u32(&mut buf[entry..entry + 4], record_offset);
                write_record(&mut buf, record)?;
            }
        }

        let total = to_u32(buf.len())?;
        LittleEndian::write_u32(&mut buf[VERSION_LEN..VERSION_LEN + 4], total);
        Ok(buf)
    }
}

fn write_record(buf: &mut Vec<u8>, record: &ResourceRecord) -> Result<()> {
    let start = buf.len();
    buf.write_u32::<LittleEndian>(0)?;
    buf.write_u32::<LittleEndian>(record.res_type.tag())?;
    buf.write_u32::<LittleEndian>(record.id)?;

    if record.res_type.is_array() {
        let mut packed = Vec::new();
        for value in record.values() {
            write_string(&mut packed, value)?;
        }
        let len = u16::try_from(packed.len())
            .map_err(|_| Error::decode(format!("array `{}` is too long", record.name)))?;
        buf.write_u16::<LittleEndian>(len)?;
        buf.extend_from_slice(&packed);
    } else {
        write_string(buf, record.text())?;
    }
    write_string(buf, &record.name)?;

    let size = to_u32(buf.len() - start)?;
    LittleEndian::write_u32(&mut buf[start..start + 4], size);
    Ok(())
}

fn write_string(buf: &mut Vec<u8>, text: &str) -> Result<()> {
    let len = u16::try_from(text.len())
        .map_err(|_| Error::decode(format!("string of {} bytes is too long", text.len())))?;
    buf.write_u16::<LittleEndian>(len)?;
    buf.extend_from_slice(text.as_bytes());
    buf.push(0);
    Ok(())
}

fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::decode("index exceeds 4 GiB"))
}
