// build.rs

use clap::{Arg, ArgGroup, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common arguments: patch list from a file or a preset
fn with_patch_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("patches")
            .short('p')
            .long("patches")
            .value_name("FILE")
            .help("TOML file of [[patch]] tables"),
    )
    .arg(
        Arg::new("preset")
            .long("preset")
            .value_name("NAME")
            .help("Built-in patch list (commons-exec)"),
    )
    .group(
        ArgGroup::new("patch_source")
            .args(["patches", "preset"])
            .required(true),
    )
}

fn work_dir_arg() -> Arg {
    Arg::new("work_dir")
        .long("work-dir")
        .value_name("DIR")
        .help("Directory to expand the sources into (emptied first)")
}

fn build_cli() -> Command {
    Command::new("ctorgraft")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Add delegating constructors to a compiled JVM library and its sources")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::SetTrue)
                .help("Log at debug level unless RUST_LOG says otherwise"),
        )
        .subcommand_required(true)
        .subcommand(with_patch_args(
            Command::new("jar")
                .about("Add constructors to the classes of a jar")
                .arg(Arg::new("input").short('i').long("input").required(true).help("Input jar"))
                .arg(Arg::new("output").short('o').long("output").required(true).help("Patched jar to write")),
        ))
        .subcommand(with_patch_args(
            Command::new("sources")
                .about("Add constructors to the Java sources of a sources jar")
                .arg(Arg::new("input").short('i').long("input").required(true).help("Input sources jar"))
                .arg(work_dir_arg().short('w'))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .required(true)
                        .help("Patched sources jar to write"),
                ),
        ))
        .subcommand(with_patch_args(
            Command::new("tree")
                .about("Add constructors to a Java source tree in place")
                .arg(Arg::new("root").required(true).help("Root of the source tree"))
                .arg(
                    Arg::new("strict")
                        .long("strict")
                        .action(clap::ArgAction::SetTrue)
                        .help("Fail on syntax errors in any file, not only patched ones"),
                )
                .arg(
                    Arg::new("no_auto_import")
                        .long("no-auto-import")
                        .action(clap::ArgAction::SetTrue)
                        .help("Write qualified type names instead of adding imports"),
                ),
        ))
        .subcommand(with_patch_args(
            Command::new("patch")
                .about("Patch a jar and its sources jar and check the results agree")
                .arg(Arg::new("jar").long("jar").required(true).help("Input jar"))
                .arg(Arg::new("sources").long("sources").required(true).help("Input sources jar"))
                .arg(
                    Arg::new("out_dir")
                        .long("out-dir")
                        .required(true)
                        .help("Directory for both patched artifacts"),
                )
                .arg(work_dir_arg()),
        ))
        .subcommand(with_patch_args(
            Command::new("check").about("Validate a patch list and print it"),
        ))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("ctorgraft.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
