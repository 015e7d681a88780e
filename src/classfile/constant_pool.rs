// src/classfile/constant_pool.rs

//! Class file constant pool
//!
//! Entries are kept exactly as decoded so that an untouched pool re-encodes
//! to the same bytes. New entries are only ever appended; an identical
//! existing entry is reused instead.

use crate::error::{Error, Result};
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

/// A single constant pool entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constant {
    /// Modified UTF-8 bytes, kept undecoded
    Utf8(Vec<u8>),
    Integer(u32),
    Float(u32),
    Long(u64),
    Double(u64),
    Class(u16),
    String(u16),
    Fieldref { class: u16, name_and_type: u16 },
    Methodref { class: u16, name_and_type: u16 },
    InterfaceMethodref { class: u16, name_and_type: u16 },
    NameAndType { name: u16, descriptor: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType(u16),
    Dynamic { bootstrap: u16, name_and_type: u16 },
    InvokeDynamic { bootstrap: u16, name_and_type: u16 },
    Module(u16),
    Package(u16),
}

impl Constant {
    /// Long and Double occupy two pool indices
    fn is_wide(&self) -> bool {
        matches!(self, Self::Long(_) | Self::Double(_))
    }
}

/// The constant pool of one class file
///
/// Index 0 is unused, and the slot following a Long or Double is a
/// placeholder, both stored as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantPool {
    entries: Vec<Option<Constant>>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    pub fn new() -> Self {
        Self { entries: vec![None] }
    }

    /// Value of the `constant_pool_count` field
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: u16) -> Option<&Constant> {
        self.entries.get(index as usize).and_then(|e| e.as_ref())
    }

    /// Decoded string of a Utf8 entry
    pub fn utf8(&self, index: u16) -> Option<String> {
        match self.get(index) {
            Some(Constant::Utf8(bytes)) => decode_modified_utf8(bytes),
            _ => None,
        }
    }

    /// Internal name (`pkg/Outer$Inner`) referenced by a Class entry
    pub fn class_name(&self, index: u16) -> Option<String> {
        match self.get(index) {
            Some(Constant::Class(name)) => self.utf8(*name),
            _ => None,
        }
    }

    /// Append an entry without looking for an existing copy
    pub fn push(&mut self, constant: Constant) -> Result<u16> {
        let wide = constant.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.entries.len() + needed > u16::MAX as usize {
            return Err(Error::class_format(
                "constant pool",
                "more than 65535 entries required",
            ));
        }
        let index = self.entries.len() as u16;
        self.entries.push(Some(constant));
        if wide {
            self.entries.push(None);
        }
        Ok(index)
    }

    /// Index of an identical entry, appending one if none exists
    pub fn intern(&mut self, constant: Constant) -> Result<u16> {
        let existing = self
            .entries
            .iter()
            .position(|e| e.as_ref() == Some(&constant));
        match existing {
            Some(index) => Ok(index as u16),
            None => self.push(constant),
        }
    }

    pub fn intern_utf8(&mut self, value: &str) -> Result<u16> {
        let bytes = encode_modified_utf8(value);
        if bytes.len() > u16::MAX as usize {
            return Err(Error::class_format("constant pool", "string constant too long"));
        }
        self.intern(Constant::Utf8(bytes))
    }

    pub fn intern_name_and_type(&mut self, name: &str, descriptor: &str) -> Result<u16> {
        let name = self.intern_utf8(name)?;
        let descriptor = self.intern_utf8(descriptor)?;
        self.intern(Constant::NameAndType { name, descriptor })
    }

    /// Methodref to `name` + `descriptor` on the class at pool index `class`
    pub fn intern_methodref(&mut self, class: u16, name: &str, descriptor: &str) -> Result<u16> {
        let name_and_type = self.intern_name_and_type(name, descriptor)?;
        self.intern(Constant::Methodref {
            class,
            name_and_type,
        })
    }

    pub(crate) fn parse(reader: &mut super::Reader<'_>) -> Result<Self> {
        let count = reader.u16()? as usize;
        if count == 0 {
            return Err(reader.error("constant_pool_count is zero"));
        }

        let mut pool = Self {
            entries: Vec::with_capacity(count),
        };
        pool.entries.push(None);

        while pool.entries.len() < count {
            let tag = reader.u8()?;
            let constant = match tag {
                TAG_UTF8 => {
                    let len = reader.u16()? as usize;
                    Constant::Utf8(reader.bytes(len)?)
                }
                TAG_INTEGER => Constant::Integer(reader.u32()?),
                TAG_FLOAT => Constant::Float(reader.u32()?),
                TAG_LONG => Constant::Long(reader.u64()?),
                TAG_DOUBLE => Constant::Double(reader.u64()?),
                TAG_CLASS => Constant::Class(reader.u16()?),
                TAG_STRING => Constant::String(reader.u16()?),
                TAG_FIELDREF => Constant::Fieldref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                TAG_METHODREF => Constant::Methodref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                TAG_INTERFACE_METHODREF => Constant::InterfaceMethodref {
                    class: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                TAG_NAME_AND_TYPE => Constant::NameAndType {
                    name: reader.u16()?,
                    descriptor: reader.u16()?,
                },
                TAG_METHOD_HANDLE => Constant::MethodHandle {
                    kind: reader.u8()?,
                    reference: reader.u16()?,
                },
                TAG_METHOD_TYPE => Constant::MethodType(reader.u16()?),
                TAG_DYNAMIC => Constant::Dynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                TAG_INVOKE_DYNAMIC => Constant::InvokeDynamic {
                    bootstrap: reader.u16()?,
                    name_and_type: reader.u16()?,
                },
                TAG_MODULE => Constant::Module(reader.u16()?),
                TAG_PACKAGE => Constant::Package(reader.u16()?),
                other => {
                    return Err(reader.error(format!(
                        "unknown constant pool tag {} at index {}",
                        other,
                        pool.entries.len()
                    )));
                }
            };

            let wide = constant.is_wide();
            pool.entries.push(Some(constant));
            if wide {
                if pool.entries.len() >= count {
                    return Err(reader.error("8-byte constant in the last pool slot"));
                }
                pool.entries.push(None);
            }
        }

        Ok(pool)
    }

    pub(crate) fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u16::<BigEndian>(self.entries.len() as u16)?;
        for constant in self.entries.iter().flatten() {
            match constant {
                Constant::Utf8(bytes) => {
                    out.write_u8(TAG_UTF8)?;
                    out.write_u16::<BigEndian>(bytes.len() as u16)?;
                    out.write_all(bytes)?;
                }
                Constant::Integer(v) => {
                    out.write_u8(TAG_INTEGER)?;
                    out.write_u32::<BigEndian>(*v)?;
                }
                Constant::Float(v) => {
                    out.write_u8(TAG_FLOAT)?;
                    out.write_u32::<BigEndian>(*v)?;
                }
                Constant::Long(v) => {
                    out.write_u8(TAG_LONG)?;
                    out.write_u64::<BigEndian>(*v)?;
                }
                Constant::Double(v) => {
                    out.write_u8(TAG_DOUBLE)?;
                    out.write_u64::<BigEndian>(*v)?;
                }
                Constant::Class(i) => write_index(out, TAG_CLASS, *i)?,
                Constant::String(i) => write_index(out, TAG_STRING, *i)?,
                Constant::Fieldref { class, name_and_type } => {
                    write_pair(out, TAG_FIELDREF, *class, *name_and_type)?
                }
                Constant::Methodref { class, name_and_type } => {
                    write_pair(out, TAG_METHODREF, *class, *name_and_type)?
                }
                Constant::InterfaceMethodref { class, name_and_type } => {
                    write_pair(out, TAG_INTERFACE_METHODREF, *class, *name_and_type)?
                }
                Constant::NameAndType { name, descriptor } => {
                    write_pair(out, TAG_NAME_AND_TYPE, *name, *descriptor)?
                }
                Constant::MethodHandle { kind, reference } => {
                    out.write_u8(TAG_METHOD_HANDLE)?;
                    out.write_u8(*kind)?;
                    out.write_u16::<BigEndian>(*reference)?;
                }
                Constant::MethodType(i) => write_index(out, TAG_METHOD_TYPE, *i)?,
                Constant::Dynamic { bootstrap, name_and_type } => {
                    write_pair(out, TAG_DYNAMIC, *bootstrap, *name_and_type)?
                }
                Constant::InvokeDynamic { bootstrap, name_and_type } => {
                    write_pair(out, TAG_INVOKE_DYNAMIC, *bootstrap, *name_and_type)?
                }
                Constant::Module(i) => write_index(out, TAG_MODULE, *i)?,
                Constant::Package(i) => write_index(out, TAG_PACKAGE, *i)?,
            }
        }
        Ok(())
    }
}

fn write_index<W: Write>(out: &mut W, tag: u8, index: u16) -> io::Result<()> {
    out.write_u8(tag)?;
    out.write_u16::<BigEndian>(index)
}

fn write_pair<W: Write>(out: &mut W, tag: u8, first: u16, second: u16) -> io::Result<()> {
    out.write_u8(tag)?;
    out.write_u16::<BigEndian>(first)?;
    out.write_u16::<BigEndian>(second)
}

/// Encode a string as JVM modified UTF-8
///
/// NUL becomes `C0 80` and supplementary characters are written as a
/// surrogate pair, each half encoded on three bytes.
pub fn encode_modified_utf8(value: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(value.len());
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | ((unit >> 6) as u8 & 0x1F));
                out.push(0x80 | (unit as u8 & 0x3F));
            }
            _ => {
                out.push(0xE0 | ((unit >> 12) as u8 & 0x0F));
                out.push(0x80 | ((unit >> 6) as u8 & 0x3F));
                out.push(0x80 | (unit as u8 & 0x3F));
            }
        }
    }
    out
}

/// Decode JVM modified UTF-8, or `None` if the bytes are malformed
pub fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b & 0x80 == 0 {
            if b == 0 {
                return None;
            }
            units.push(b as u16);
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            let b2 = *bytes.get(i + 1)?;
            if b2 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x1F) as u16) << 6) | (b2 & 0x3F) as u16);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            let b2 = *bytes.get(i + 1)?;
            let b3 = *bytes.get(i + 2)?;
            if b2 & 0xC0 != 0x80 || b3 & 0xC0 != 0x80 {
                return None;
            }
            units.push((((b & 0x0F) as u16) << 12) | (((b2 & 0x3F) as u16) << 6) | (b3 & 0x3F) as u16);
            i += 3;
        } else {
            return None;
        }
    }
    String::from_utf16(&units).ok()
}
