// src/classfile/mod.rs

//! JVM class file codec
//!
//! Decodes the full class file structure: header, constant pool, type
//! header, fields, methods and attributes. Attribute bodies (including
//! `Code`) stay as raw bytes; nothing here interprets or executes the
//! bytecode of existing members. Re-encoding an untouched class yields the
//! exact input bytes.

pub mod code;
pub mod constant_pool;

pub use constant_pool::{Constant, ConstantPool};

use crate::descriptor::{JavaType, parse_method_params};
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read, Write};

pub const MAGIC: u32 = 0xCAFE_BABE;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_PRIVATE: u16 = 0x0002;
pub const ACC_PROTECTED: u16 = 0x0004;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;
pub const ACC_ANNOTATION: u16 = 0x2000;
pub const ACC_ENUM: u16 = 0x4000;
pub const ACC_MODULE: u16 = 0x8000;

/// Name of instance initializer methods
pub const CONSTRUCTOR_NAME: &str = "<init>";

/// Big-endian reader that reports truncation against the entry name
pub(crate) struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    entry: &'a str,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], entry: &'a str) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            entry,
        }
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> Error {
        Error::class_format(self.entry, reason)
    }

    fn truncated(&self, e: io::Error) -> Error {
        self.error(format!(
            "truncated at byte {} ({})",
            self.cursor.position(),
            e
        ))
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        self.cursor.read_u8().map_err(|e| self.truncated(e))
    }

    pub(crate) fn u16(&mut self) -> Result<u16> {
        self.cursor.read_u16::<BigEndian>().map_err(|e| self.truncated(e))
    }

    pub(crate) fn u32(&mut self) -> Result<u32> {
        self.cursor.read_u32::<BigEndian>().map_err(|e| self.truncated(e))
    }

    pub(crate) fn u64(&mut self) -> Result<u64> {
        self.cursor.read_u64::<BigEndian>().map_err(|e| self.truncated(e))
    }

    pub(crate) fn bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.cursor.read_exact(&mut buf).map_err(|e| self.truncated(e))?;
        Ok(buf)
    }

    fn remaining(&self) -> usize {
        let total = self.cursor.get_ref().len() as u64;
        total.saturating_sub(self.cursor.position()) as usize
    }
}

/// A raw attribute: name index plus undecoded body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name_index: u16,
    pub info: Vec<u8>,
}

/// A field or method declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<Attribute>,
}

/// What kind of type a class file declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Interface,
    Annotation,
    Enum,
    Module,
}

/// A decoded class file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<MemberInfo>,
    pub methods: Vec<MemberInfo>,
    pub attributes: Vec<Attribute>,
}

impl ClassFile {
    /// Decode a class file; `entry` names it in error messages
    pub fn parse(bytes: &[u8], entry: &str) -> Result<Self> {
        let mut reader = Reader::new(bytes, entry);

        let magic = reader.u32()?;
        if magic != MAGIC {
            return Err(reader.error(format!("bad magic 0x{:08X}", magic)));
        }
        let minor_version = reader.u16()?;
        let major_version = reader.u16()?;
        let constant_pool = ConstantPool::parse(&mut reader)?;
        let access_flags = reader.u16()?;
        let this_class = reader.u16()?;
        let super_class = reader.u16()?;

        let interface_count = reader.u16()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(reader.u16()?);
        }

        let fields = parse_members(&mut reader)?;
        let methods = parse_members(&mut reader)?;
        let attributes = parse_attributes(&mut reader)?;

        if reader.remaining() != 0 {
            return Err(reader.error(format!("{} trailing bytes", reader.remaining())));
        }

        let class = Self {
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        };
        if class.constant_pool.class_name(this_class).is_none() {
            return Err(Error::class_format(entry, "this_class is not a Class constant"));
        }
        Ok(class)
    }

    /// Encode back into class file bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let name = self.internal_name().unwrap_or_default();
        let mut out = Vec::new();
        self.write(&mut out)
            .map_err(|e| Error::class_format(name, e.to_string()))?;
        Ok(out)
    }

    fn write<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<BigEndian>(MAGIC)?;
        out.write_u16::<BigEndian>(self.minor_version)?;
        out.write_u16::<BigEndian>(self.major_version)?;
        self.constant_pool.write(out)?;
        out.write_u16::<BigEndian>(self.access_flags)?;
        out.write_u16::<BigEndian>(self.this_class)?;
        out.write_u16::<BigEndian>(self.super_class)?;

        out.write_u16::<BigEndian>(checked_count(self.interfaces.len(), "interfaces")?)?;
        for interface in &self.interfaces {
            out.write_u16::<BigEndian>(*interface)?;
        }

        write_members(out, &self.fields, "fields")?;
        write_members(out, &self.methods, "methods")?;
        write_attributes(out, &self.attributes)
    }

    /// Internal name of the declared class, e.g. `org/example/Widget`
    pub fn internal_name(&self) -> Option<String> {
        self.constant_pool.class_name(self.this_class)
    }

    /// Binary name with dots, e.g. `org.example.Outer$Inner`
    pub fn binary_name(&self) -> Option<String> {
        self.internal_name().map(|n| n.replace('/', "."))
    }

    pub fn kind(&self) -> ClassKind {
        if self.access_flags & ACC_MODULE != 0 {
            ClassKind::Module
        } else if self.access_flags & ACC_ANNOTATION != 0 {
            ClassKind::Annotation
        } else if self.access_flags & ACC_INTERFACE != 0 {
            ClassKind::Interface
        } else if self.access_flags & ACC_ENUM != 0 {
            ClassKind::Enum
        } else {
            ClassKind::Class
        }
    }

    pub fn member_name(&self, member: &MemberInfo) -> Option<String> {
        self.constant_pool.utf8(member.name_index)
    }

    pub fn member_descriptor(&self, member: &MemberInfo) -> Option<String> {
        self.constant_pool.utf8(member.descriptor_index)
    }

    /// Parameter types of every declared constructor, in declaration order
    pub fn constructors(&self) -> Vec<Vec<JavaType>> {
        self.methods
            .iter()
            .filter(|m| self.member_name(m).as_deref() == Some(CONSTRUCTOR_NAME))
            .filter_map(|m| self.member_descriptor(m))
            .filter_map(|d| parse_method_params(&d))
            .collect()
    }

    /// Class-level attribute with the given name
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes
            .iter()
            .find(|a| self.constant_pool.utf8(a.name_index).as_deref() == Some(name))
    }

    /// Access flags recorded for this class in its own `InnerClasses` table
    ///
    /// `None` for top-level classes. Nested classes carry `ACC_STATIC` here
    /// (never in the class header), so this is the only place that tells an
    /// inner class from a static nested one.
    pub fn inner_class_flags(&self, entry: &str) -> Result<Option<u16>> {
        let Some(attribute) = self.attribute("InnerClasses") else {
            return Ok(None);
        };
        let this_name = self.internal_name();
        let mut reader = Reader::new(&attribute.info, entry);
        let count = reader.u16()?;
        for _ in 0..count {
            let inner = reader.u16()?;
            let _outer = reader.u16()?;
            let _name = reader.u16()?;
            let flags = reader.u16()?;
            if inner == self.this_class || self.constant_pool.class_name(inner) == this_name {
                return Ok(Some(flags));
            }
        }
        Ok(None)
    }

    /// Attribute of `member` with the given name
    pub fn member_attribute<'a>(&self, member: &'a MemberInfo, name: &str) -> Option<&'a Attribute> {
        member
            .attributes
            .iter()
            .find(|a| self.constant_pool.utf8(a.name_index).as_deref() == Some(name))
    }
}

fn checked_count(len: usize, what: &str) -> io::Result<u16> {
    u16::try_from(len).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("too many {} ({})", what, len),
        )
    })
}

fn parse_members(reader: &mut Reader<'_>) -> Result<Vec<MemberInfo>> {
    let count = reader.u16()?;
    let mut members = Vec::with_capacity(count as usize);
    for _ in 0..count {
        members.push(MemberInfo {
            access_flags: reader.u16()?,
            name_index: reader.u16()?,
            descriptor_index: reader.u16()?,
            attributes: parse_attributes(reader)?,
        });
    }
    Ok(members)
}

fn parse_attributes(reader: &mut Reader<'_>) -> Result<Vec<Attribute>> {
    let count = reader.u16()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = reader.u16()?;
        let len = reader.u32()? as usize;
        if len > reader.remaining() {
            return Err(reader.error(format!("attribute length {} exceeds class size", len)));
        }
        attributes.push(Attribute {
            name_index,
            info: reader.bytes(len)?,
        });
    }
    Ok(attributes)
}

fn write_members<W: Write>(out: &mut W, members: &[MemberInfo], what: &str) -> io::Result<()> {
    out.write_u16::<BigEndian>(checked_count(members.len(), what)?)?;
    for member in members {
        out.write_u16::<BigEndian>(member.access_flags)?;
        out.write_u16::<BigEndian>(member.name_index)?;
        out.write_u16::<BigEndian>(member.descriptor_index)?;
        write_attributes(out, &member.attributes)?;
    }
    Ok(())
}

fn write_attributes<W: Write>(out: &mut W, attributes: &[Attribute]) -> io::Result<()> {
    out.write_u16::<BigEndian>(checked_count(attributes.len(), "attributes")?)?;
    for attribute in attributes {
        out.write_u16::<BigEndian>(attribute.name_index)?;
        let len = u32::try_from(attribute.info.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "attribute too large"))?;
        out.write_u32::<BigEndian>(len)?;
        out.write_all(&attribute.info)?;
    }
    Ok(())
}
