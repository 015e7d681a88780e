// tests/common/mod.rs

//! Shared test utilities for integration tests.
//!
//! Class fixtures are built with the crate's own codec so no JDK is needed.

#![allow(dead_code)]

use ctorgraft::PatchSet;
use ctorgraft::classfile::{
    ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, ACC_SUPER, Attribute, ClassFile, Constant, ConstantPool,
    MemberInfo,
};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const WIDGET_CLASS: &str = "pkg/Widget.class";
pub const HANDLER_CLASS: &str = "pkg/Handler.class";
pub const DELEGATE_DESCRIPTOR: &str = "(Ljava/util/concurrent/ThreadFactory;Lpkg/Handler;)V";
pub const NEW_DESCRIPTOR: &str =
    "(Ljava/nio/file/Path;Ljava/util/concurrent/ThreadFactory;Lpkg/Handler;)V";

/// Build a class file with one trivial `<init>` per descriptor
///
/// Each constructor body calls `super()`; the content only has to be
/// well-formed for the codec. A field and a SourceFile attribute are added
/// so re-encoding covers every section.
pub fn class_bytes(internal_name: &str, access: u16, major: u16, constructors: &[&str]) -> Vec<u8> {
    let mut pool = ConstantPool::new();
    let name = pool.intern_utf8(internal_name).unwrap();
    let this_class = pool.intern(Constant::Class(name)).unwrap();
    let object = pool.intern_utf8("java/lang/Object").unwrap();
    let super_class = pool.intern(Constant::Class(object)).unwrap();
    let super_init = pool.intern_methodref(super_class, "<init>", "()V").unwrap();
    pool.push(Constant::Long(0x0102_0304_0506_0708)).unwrap();
    pool.push(Constant::String(name)).unwrap();

    let init = pool.intern_utf8("<init>").unwrap();
    let code_name = pool.intern_utf8("Code").unwrap();
    let super_init_bytes = super_init.to_be_bytes();

    let mut methods = Vec::new();
    for descriptor in constructors {
        let descriptor_index = pool.intern_utf8(descriptor).unwrap();
        let code = [0x2a, 0xb7, super_init_bytes[0], super_init_bytes[1], 0xb1];
        let mut info = vec![0, 1, 0, 10, 0, 0, 0, code.len() as u8];
        info.extend_from_slice(&code);
        info.extend_from_slice(&[0, 0, 0, 0]);
        methods.push(MemberInfo {
            access_flags: ACC_PUBLIC,
            name_index: init,
            descriptor_index,
            attributes: vec![Attribute {
                name_index: code_name,
                info,
            }],
        });
    }

    let field_name = pool.intern_utf8("count").unwrap();
    let field_desc = pool.intern_utf8("I").unwrap();
    let source_file = pool.intern_utf8("SourceFile").unwrap();
    let simple = internal_name.rsplit('/').next().unwrap();
    let file_name = pool.intern_utf8(&format!("{}.java", simple)).unwrap();

    let class = ClassFile {
        minor_version: 0,
        major_version: major,
        constant_pool: pool,
        access_flags: access,
        this_class,
        super_class,
        interfaces: vec![],
        fields: vec![MemberInfo {
            access_flags: 0,
            name_index: field_name,
            descriptor_index: field_desc,
            attributes: vec![],
        }],
        methods,
        attributes: vec![Attribute {
            name_index: source_file,
            info: file_name.to_be_bytes().to_vec(),
        }],
    };
    class.to_bytes().unwrap()
}

/// Record `flags` for the class in its own `InnerClasses` table
///
/// The outer class is taken from the last `$` in the internal name.
pub fn nested_class_bytes(bytes: &[u8], flags: u16) -> Vec<u8> {
    let mut class = ClassFile::parse(bytes, "nested.class").unwrap();
    let name = class.internal_name().unwrap();
    let (outer_name, simple) = name.rsplit_once('$').unwrap();
    let pool = &mut class.constant_pool;
    let outer_utf8 = pool.intern_utf8(outer_name).unwrap();
    let outer = pool.intern(Constant::Class(outer_utf8)).unwrap();
    let simple = pool.intern_utf8(simple).unwrap();
    let attribute_name = pool.intern_utf8("InnerClasses").unwrap();

    let mut info = vec![0, 1];
    for index in [class.this_class, outer, simple, flags] {
        info.extend_from_slice(&index.to_be_bytes());
    }
    class.attributes.push(Attribute {
        name_index: attribute_name,
        info,
    });
    class.to_bytes().unwrap()
}

/// `pkg.Widget` with `Widget()` and `Widget(ThreadFactory, Handler)`
pub fn widget_class() -> Vec<u8> {
    class_bytes(
        "pkg/Widget",
        ACC_PUBLIC | ACC_SUPER,
        61,
        &["()V", DELEGATE_DESCRIPTOR],
    )
}

pub fn handler_interface() -> Vec<u8> {
    class_bytes("pkg/Handler", ACC_PUBLIC | ACC_INTERFACE | ACC_ABSTRACT, 61, &[])
}

pub const MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\nCreated-By: test\r\n\r\n";

/// Write a jar with a `META-INF/` directory entry followed by `entries`
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.add_directory("META-INF/", options).unwrap();
    for (name, content) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(content).unwrap();
    }
    zip.finish().unwrap();
}

/// Every file entry of a jar, in archive order
pub fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut out = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        out.push((entry.name().to_string(), content));
    }
    out
}

pub fn jar_entry(path: &Path, name: &str) -> Vec<u8> {
    read_jar(path)
        .into_iter()
        .find(|(n, _)| n == name)
        .map(|(_, c)| c)
        .unwrap_or_else(|| panic!("{} not in {}", name, path.display()))
}

/// Compiled widget library
pub fn write_widget_jar(path: &Path) {
    let widget = widget_class();
    let handler = handler_interface();
    write_jar(
        path,
        &[
            ("META-INF/MANIFEST.MF", MANIFEST),
            (HANDLER_CLASS, &handler),
            (WIDGET_CLASS, &widget),
            ("pkg/messages.properties", b"greeting=hello\n"),
        ],
    );
}

pub const WIDGET_JAVA: &str = "package pkg;

import java.util.concurrent.ThreadFactory;

/**
 * A widget.
 */
public class Widget {
    private int count;

    public Widget() {
        this.count = 0;
    }

    public Widget(ThreadFactory threadFactory, Handler handler) {
        this();
    }
}
";

pub const HANDLER_JAVA: &str = "package pkg;

public interface Handler {
    void handle();
}
";

/// Sources jar matching [`write_widget_jar`]
pub fn write_widget_sources_jar(path: &Path) {
    write_jar(
        path,
        &[
            ("META-INF/MANIFEST.MF", MANIFEST),
            ("pkg/Handler.java", HANDLER_JAVA.as_bytes()),
            ("pkg/Widget.java", WIDGET_JAVA.as_bytes()),
            ("pkg/messages.properties", b"greeting=hello\n"),
        ],
    );
}

pub const WIDGET_PATCHES: &str = r#"
[[patch]]
name = "widget"
target = "pkg.Widget"
delegate = ["java.util.concurrent.ThreadFactory", "pkg.Handler"]
arguments = [1, 2]

[[patch.parameters]]
type = "java.nio.file.Path"
name = "dir"
doc = "The directory."

[[patch.parameters]]
type = "java.util.concurrent.ThreadFactory"
name = "tf"
doc = "The thread factory."

[[patch.parameters]]
type = "pkg.Handler"
name = "h"
"#;

pub fn widget_patches() -> PatchSet {
    PatchSet::parse(WIDGET_PATCHES).unwrap()
}

/// Patch list whose target is not in the widget library
pub fn missing_target_patches() -> PatchSet {
    PatchSet::parse(&WIDGET_PATCHES.replace("pkg.Widget", "pkg.Gadget")).unwrap()
}
