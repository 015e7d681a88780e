// src/classfile/code.rs

//! Delegating constructor synthesis
//!
//! The synthesized body is straight-line code:
//!
//! ```text
//! aload_0
//! <load each forwarded parameter, in delegate order>
//! invokespecial this_class.<init>(delegate descriptor)
//! return
//! ```
//!
//! With no branches there is no StackMapTable to emit, and the verifier
//! accepts the method at every class file version.

use super::{ACC_FINAL, ACC_PROTECTED, Attribute, CONSTRUCTOR_NAME, ClassFile, MemberInfo};
use crate::descriptor::{JavaType, Primitive, constructor_descriptor};
use crate::error::{Error, Result};
use crate::spec::PatchSpec;
use byteorder::{BigEndian, WriteBytesExt};
use std::io::{self, Write};
use tracing::debug;

const OP_ILOAD: u8 = 0x15;
const OP_LLOAD: u8 = 0x16;
const OP_FLOAD: u8 = 0x17;
const OP_DLOAD: u8 = 0x18;
const OP_ALOAD: u8 = 0x19;
const OP_ILOAD_0: u8 = 0x1a;
const OP_LLOAD_0: u8 = 0x1e;
const OP_FLOAD_0: u8 = 0x22;
const OP_DLOAD_0: u8 = 0x26;
const OP_ALOAD_0: u8 = 0x2a;
const OP_INVOKESPECIAL: u8 = 0xb7;
const OP_RETURN: u8 = 0xb1;
const OP_WIDE: u8 = 0xc4;

/// First class file version with the MethodParameters attribute (Java 8)
const METHOD_PARAMETERS_MAJOR: u16 = 52;

/// JVM limit on method parameter slots, `this` included
const MAX_PARAMETER_SLOTS: u16 = 255;

/// Long-form and `_0` short-form load opcodes for a type
fn load_opcodes(ty: &JavaType) -> (u8, u8) {
    match ty {
        JavaType::Primitive(Primitive::Long) => (OP_LLOAD, OP_LLOAD_0),
        JavaType::Primitive(Primitive::Float) => (OP_FLOAD, OP_FLOAD_0),
        JavaType::Primitive(Primitive::Double) => (OP_DLOAD, OP_DLOAD_0),
        JavaType::Primitive(_) => (OP_ILOAD, OP_ILOAD_0),
        JavaType::Class(_) | JavaType::Array(_) => (OP_ALOAD, OP_ALOAD_0),
    }
}

/// Append the load instruction for local `slot`
fn emit_load(code: &mut Vec<u8>, ty: &JavaType, slot: u16) {
    let (long_form, short_base) = load_opcodes(ty);
    match slot {
        0..=3 => code.push(short_base + slot as u8),
        4..=255 => {
            code.push(long_form);
            code.push(slot as u8);
        }
        _ => {
            code.push(OP_WIDE);
            code.push(long_form);
            code.extend_from_slice(&slot.to_be_bytes());
        }
    }
}

/// Local variable slot of each parameter; slot 0 holds `this`
fn parameter_slots(params: &[JavaType]) -> Vec<u16> {
    let mut next = 1u16;
    params
        .iter()
        .map(|p| {
            let slot = next;
            next += p.slot_size();
            slot
        })
        .collect()
}

/// Bytecode and frame sizes of a delegating constructor body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorBody {
    pub code: Vec<u8>,
    pub max_stack: u16,
    pub max_locals: u16,
}

/// Build the body of a constructor forwarding to the method at `methodref`
pub fn delegating_body(spec: &PatchSpec, methodref: u16) -> Result<ConstructorBody> {
    let signature = spec.signature();
    let max_locals = 1 + signature.iter().map(JavaType::slot_size).sum::<u16>();
    if max_locals > MAX_PARAMETER_SLOTS {
        return Err(Error::InvalidSpec(format!(
            "{}: constructor needs {} parameter slots, the JVM allows {}",
            spec.label(),
            max_locals,
            MAX_PARAMETER_SLOTS
        )));
    }
    let slots = parameter_slots(&signature);

    let mut code = vec![OP_ALOAD_0];
    let mut max_stack = 1u16;
    for &index in spec.arguments() {
        let ty = &signature[index];
        emit_load(&mut code, ty, slots[index]);
        max_stack += ty.slot_size();
    }
    code.push(OP_INVOKESPECIAL);
    code.extend_from_slice(&methodref.to_be_bytes());
    code.push(OP_RETURN);

    Ok(ConstructorBody {
        code,
        max_stack,
        max_locals,
    })
}

impl ConstructorBody {
    /// Body of a `Code` attribute with no handlers and no sub-attributes
    fn code_attribute(&self) -> io::Result<Vec<u8>> {
        let code_length = u32::try_from(self.code.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "method code too large"))?;
        let mut info = Vec::with_capacity(12 + self.code.len());
        info.write_u16::<BigEndian>(self.max_stack)?;
        info.write_u16::<BigEndian>(self.max_locals)?;
        info.write_u32::<BigEndian>(code_length)?;
        info.write_all(&self.code)?;
        // exception_table_length, attributes_count
        info.write_u16::<BigEndian>(0)?;
        info.write_u16::<BigEndian>(0)?;
        Ok(info)
    }
}

/// Body of a `MethodParameters` attribute marking every parameter final
fn method_parameters(name_indices: &[u16]) -> io::Result<Vec<u8>> {
    let count = u8::try_from(name_indices.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "more than 255 parameters"))?;
    let mut info = Vec::with_capacity(1 + 4 * name_indices.len());
    info.write_u8(count)?;
    for &name_index in name_indices {
        info.write_u16::<BigEndian>(name_index)?;
        info.write_u16::<BigEndian>(ACC_FINAL)?;
    }
    Ok(info)
}

impl ClassFile {
    /// Append a protected constructor that forwards to `spec`'s delegate
    ///
    /// The caller has already checked that the delegate exists exactly once
    /// and that the new signature is not declared yet. Existing members and
    /// constant pool entries are untouched; new constants are appended.
    pub fn add_delegating_constructor(&mut self, spec: &PatchSpec) -> Result<()> {
        let pool = &mut self.constant_pool;
        let methodref = pool.intern_methodref(
            self.this_class,
            CONSTRUCTOR_NAME,
            &constructor_descriptor(spec.delegate()),
        )?;
        let body = delegating_body(spec, methodref)?;
        let encode_error = |e: io::Error| Error::class_format(spec.target(), e.to_string());

        let name_index = pool.intern_utf8(CONSTRUCTOR_NAME)?;
        let descriptor_index = pool.intern_utf8(&constructor_descriptor(&spec.signature()))?;

        let mut attributes = vec![Attribute {
            name_index: pool.intern_utf8("Code")?,
            info: body.code_attribute().map_err(encode_error)?,
        }];

        if self.major_version >= METHOD_PARAMETERS_MAJOR {
            let names = spec
                .parameters()
                .iter()
                .map(|param| pool.intern_utf8(&param.name))
                .collect::<Result<Vec<_>>>()?;
            attributes.push(Attribute {
                name_index: pool.intern_utf8("MethodParameters")?,
                info: method_parameters(&names).map_err(encode_error)?,
            });
        }

        debug!(
            "Synthesized {} bytes of bytecode (max_stack {}, max_locals {}) for {}",
            body.code.len(),
            body.max_stack,
            body.max_locals,
            spec.label()
        );

        self.methods.push(MemberInfo {
            access_flags: ACC_PROTECTED,
            name_index,
            descriptor_index,
            attributes,
        });
        Ok(())
    }
}
