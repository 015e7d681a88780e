// tests/binary_pipeline.rs

//! Integration tests for patching class files inside a jar

mod common;

use common::*;
use ctorgraft::classfile::{ACC_PROTECTED, ACC_PUBLIC, ACC_STATIC, ACC_SUPER, ClassFile, Constant};
use ctorgraft::{ErrorKind, JavaType, Outcome, PatchSet, patch_jar};
use tempfile::tempdir;

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

#[test]
fn test_widget_constructor_bytecode() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("widget-patched.jar");
    write_widget_jar(&input);

    let applied = patch_jar(&input, &output, &widget_patches()).unwrap();
    assert_eq!(applied.len(), 1);
    assert_eq!(applied[0].outcome, Outcome::Added);

    let class = ClassFile::parse(&jar_entry(&output, WIDGET_CLASS), WIDGET_CLASS).unwrap();
    assert_eq!(class.methods.len(), 3);

    let method = class.methods.last().unwrap();
    assert_eq!(method.access_flags, ACC_PROTECTED);
    assert_eq!(class.member_name(method).unwrap(), "<init>");
    assert_eq!(class.member_descriptor(method).unwrap(), NEW_DESCRIPTOR);

    let code = &class.member_attribute(method, "Code").unwrap().info;
    assert_eq!(u16_at(code, 0), 3, "max_stack");
    assert_eq!(u16_at(code, 2), 4, "max_locals");
    assert_eq!(&code[4..8], &[0, 0, 0, 7]);
    let body = &code[8..15];
    assert_eq!(&body[..4], &[0x2a, 0x2c, 0x2d, 0xb7]);
    assert_eq!(body[6], 0xb1);

    // invokespecial target is this class's delegate constructor
    let Some(Constant::Methodref { class: owner, name_and_type }) =
        class.constant_pool.get(u16_at(body, 4))
    else {
        panic!("invokespecial operand is not a Methodref");
    };
    assert_eq!(class.constant_pool.class_name(*owner).unwrap(), "pkg/Widget");
    let Some(Constant::NameAndType { name, descriptor }) = class.constant_pool.get(*name_and_type)
    else {
        panic!("Methodref without NameAndType");
    };
    assert_eq!(class.constant_pool.utf8(*name).unwrap(), "<init>");
    assert_eq!(class.constant_pool.utf8(*descriptor).unwrap(), DELEGATE_DESCRIPTOR);

    let params = &class.member_attribute(method, "MethodParameters").unwrap().info;
    assert_eq!(params[0], 3);
    let first_name = u16_at(params, 1);
    assert_eq!(class.constant_pool.utf8(first_name).unwrap(), "dir");
}

#[test]
fn test_untouched_entries_are_identical() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    write_widget_jar(&input);

    patch_jar(&input, &output, &widget_patches()).unwrap();

    let before = read_jar(&input);
    let after = read_jar(&output);
    let names: Vec<&str> = after.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, before.iter().map(|(n, _)| n.as_str()).collect::<Vec<_>>());

    for ((name, old), (_, new)) in before.iter().zip(&after) {
        if name == WIDGET_CLASS {
            assert_ne!(old, new);
        } else {
            assert_eq!(old, new, "{} changed", name);
        }
    }
}

#[test]
fn test_rerun_is_idempotent() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let once = dir.path().join("once.jar");
    let twice = dir.path().join("twice.jar");
    write_widget_jar(&input);

    patch_jar(&input, &once, &widget_patches()).unwrap();
    let applied = patch_jar(&once, &twice, &widget_patches()).unwrap();
    assert_eq!(applied[0].outcome, Outcome::AlreadyPresent);

    assert_eq!(jar_entry(&once, WIDGET_CLASS), jar_entry(&twice, WIDGET_CLASS));
    let class = ClassFile::parse(&jar_entry(&twice, WIDGET_CLASS), WIDGET_CLASS).unwrap();
    let new_signature: Vec<JavaType> = widget_patches().patches[0].signature();
    let count = class.constructors().iter().filter(|c| **c == new_signature).count();
    assert_eq!(count, 1);
}

#[test]
fn test_missing_target_writes_nothing() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    write_widget_jar(&input);

    let err = patch_jar(&input, &output, &missing_target_patches()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeNotFound);
    assert!(err.to_string().contains("pkg.Gadget"));
    assert!(!output.exists());
}

#[test]
fn test_missing_delegate_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    let widget = class_bytes(
        "pkg/Widget",
        ctorgraft::classfile::ACC_PUBLIC,
        61,
        &["(Ljava/util/concurrent/ThreadFactory;)V"],
    );
    write_jar(&input, &[(WIDGET_CLASS, &widget)]);

    let err = patch_jar(&input, &output, &widget_patches()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DelegateNotFound);
    assert!(!output.exists());
}

#[test]
fn test_interface_target_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    write_widget_jar(&input);

    let patches = PatchSet::parse(
        r#"
[[patch]]
target = "pkg.Handler"
delegate = []
arguments = []

[[patch.parameters]]
type = "int"
name = "n"
"#,
    )
    .unwrap();
    let err = patch_jar(&input, &output, &patches).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAClass);
}

const PART_PATCH: &str = r#"
[[patch]]
target = "pkg.Widget$Part"
delegate = ["pkg.Handler"]
arguments = [1]

[[patch.parameters]]
type = "int"
name = "n"

[[patch.parameters]]
type = "pkg.Handler"
name = "h"
"#;

#[test]
fn test_inner_class_target_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    // javac gives an inner class constructor the enclosing instance first
    let part = class_bytes(
        "pkg/Widget$Part",
        ACC_PUBLIC | ACC_SUPER,
        61,
        &["(Lpkg/Widget;Lpkg/Handler;)V"],
    );
    let part = nested_class_bytes(&part, ACC_PUBLIC);
    write_jar(&input, &[(WIDGET_CLASS, &widget_class()), ("pkg/Widget$Part.class", &part)]);

    let patches = PatchSet::parse(PART_PATCH).unwrap();
    let err = patch_jar(&input, &output, &patches).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAClass);
    assert!(err.to_string().contains("inner (non-static) class"));
    assert!(!output.exists());
}

#[test]
fn test_static_nested_class_is_patched() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("widget.jar");
    let output = dir.path().join("out.jar");
    let part = class_bytes("pkg/Widget$Part", ACC_SUPER, 61, &["(Lpkg/Handler;)V"]);
    let part = nested_class_bytes(&part, ACC_PUBLIC | ACC_STATIC);
    write_jar(&input, &[(WIDGET_CLASS, &widget_class()), ("pkg/Widget$Part.class", &part)]);

    let patches = PatchSet::parse(PART_PATCH).unwrap();
    let applied = patch_jar(&input, &output, &patches).unwrap();
    assert_eq!(applied[0].outcome, Outcome::Added);

    let entry = "pkg/Widget$Part.class";
    let class = ClassFile::parse(&jar_entry(&output, entry), entry).unwrap();
    assert!(class.constructors().contains(&vec![
        JavaType::Primitive(ctorgraft::descriptor::Primitive::Int),
        JavaType::Class("pkg.Handler".to_string()),
    ]));
}

#[test]
fn test_old_class_version_has_no_method_parameters() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("old.jar");
    let output = dir.path().join("out.jar");
    let widget = class_bytes("pkg/Widget", ctorgraft::classfile::ACC_PUBLIC, 50, &[DELEGATE_DESCRIPTOR]);
    write_jar(&input, &[(WIDGET_CLASS, &widget)]);

    patch_jar(&input, &output, &widget_patches()).unwrap();
    let class = ClassFile::parse(&jar_entry(&output, WIDGET_CLASS), WIDGET_CLASS).unwrap();
    let method = class.methods.last().unwrap();
    assert!(class.member_attribute(method, "MethodParameters").is_none());
    assert_eq!(class.major_version, 50);
}
