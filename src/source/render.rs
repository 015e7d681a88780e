// src/source/render.rs

//! Source text of a synthesized constructor

use crate::spec::PatchSpec;

/// First line of every generated Javadoc block
pub const DOC_SUMMARY: &str = "Delegating constructor added by ctorgraft.";
/// Second line, tying the declaration to the binary artifact
pub const DOC_MIRROR: &str =
    "It mirrors the constructor added to the compiled class by the binary transform.";

/// Render a protected delegating constructor
///
/// `types` holds the source spelling of each parameter type, in order.
/// Every line is prefixed with `indent`; the body is indented one further
/// `unit`. The result ends with a newline.
pub fn constructor(
    spec: &PatchSpec,
    class_name: &str,
    types: &[String],
    indent: &str,
    unit: &str,
) -> String {
    let mut lines = vec![
        "/**".to_string(),
        format!(" * {}", DOC_SUMMARY),
        format!(" * {}", DOC_MIRROR),
        " *".to_string(),
    ];
    for param in spec.parameters() {
        if param.doc.is_empty() {
            lines.push(format!(" * @param {}", param.name));
        } else {
            lines.push(format!(" * @param {} {}", param.name, param.doc));
        }
    }
    lines.push(" */".to_string());

    let params: Vec<String> = spec
        .parameters()
        .iter()
        .zip(types)
        .map(|(param, ty)| format!("final {} {}", ty, param.name))
        .collect();
    lines.push(format!("protected {}({}) {{", class_name, params.join(", ")));

    let args: Vec<&str> = spec.forwarded().map(|p| p.name.as_str()).collect();
    lines.push(format!("{}this({});", unit, args.join(", ")));
    lines.push("}".to_string());

    let mut out = String::new();
    for line in lines {
        out.push_str(indent);
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Render the explicit form of a class's default constructor
///
/// Declaring any constructor removes the implicit one, so it is written
/// out when a new constructor delegates to it. `access` is the class's
/// access keyword, if any.
pub fn default_constructor(class_name: &str, access: Option<&str>, indent: &str) -> String {
    let head = match access {
        Some(keyword) => format!("{} {}() {{", keyword, class_name),
        None => format!("{}() {{", class_name),
    };
    format!("{indent}{head}\n{indent}}}\n")
}

/// `import` declaration for a qualified name
pub fn import(qualified: &str) -> String {
    format!("import {};", qualified)
}
