// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common flag: operate on the global install location
fn global_arg() -> Arg {
    Arg::new("global")
        .short('g')
        .long("global")
        .action(ArgAction::SetTrue)
        .help("Use the global install location")
}

fn build_cli() -> Command {
    Command::new("criage")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Criage Contributors")
        .about("Package manager with self-describing compressed archives")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Config file (default: ~/.config/criage/config.yaml)"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("install")
                .about("Install a package from the configured repositories")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(global_arg())
                .arg(Arg::new("version").short('v').long("version").help("Version to install"))
                .arg(
                    Arg::new("force")
                        .short('f')
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Reinstall even if already installed"),
                )
                .arg(
                    Arg::new("dev")
                        .short('d')
                        .long("dev")
                        .action(ArgAction::SetTrue)
                        .help("Also install dev dependencies"),
                )
                .arg(Arg::new("arch").short('a').long("arch").help("Target architecture"))
                .arg(Arg::new("os").short('o').long("os").help("Target operating system")),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Remove an installed package")
                .arg(Arg::new("package").required(true).help("Package name"))
                .arg(global_arg())
                .arg(
                    Arg::new("purge")
                        .short('p')
                        .long("purge")
                        .action(ArgAction::SetTrue)
                        .help("Also remove cached downloads"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Update one or all installed packages")
                .arg(Arg::new("package").help("Package name"))
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Update every installed package"),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Search the configured repositories")
                .arg(Arg::new("query").required(true).help("Search text")),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(global_arg())
                .arg(
                    Arg::new("all_scopes")
                        .long("all-scopes")
                        .action(ArgAction::SetTrue)
                        .help("List local and global packages"),
                )
                .arg(
                    Arg::new("outdated")
                        .short('o')
                        .long("outdated")
                        .action(ArgAction::SetTrue)
                        .help("Only packages with a newer version available"),
                ),
        )
        .subcommand(
            Command::new("info")
                .about("Show an installed package")
                .arg(Arg::new("package").required(true).help("Package name")),
        )
        .subcommand(
            Command::new("create")
                .about("Scaffold a new package project")
                .arg(Arg::new("name").required(true).help("Package name"))
                .arg(Arg::new("template").short('t').long("template").default_value("basic"))
                .arg(Arg::new("author").short('a').long("author"))
                .arg(Arg::new("description").short('d').long("description")),
        )
        .subcommand(
            Command::new("build")
                .about("Build a package archive from the current directory")
                .arg(Arg::new("output").short('o').long("output").help("Output file"))
                .arg(Arg::new("format").short('f').long("format").help("Archive format"))
                .arg(Arg::new("level").short('c').long("compression").help("Compression level")),
        )
        .subcommand(
            Command::new("publish")
                .about("Build and upload the package in the current directory")
                .arg(Arg::new("registry").short('r').long("registry").help("Repository API URL"))
                .arg(Arg::new("token").short('t').long("token").help("Upload token")),
        )
        .subcommand(
            Command::new("config")
                .about("Read and change client settings")
                .subcommand(
                    Command::new("set")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true)),
                )
                .subcommand(Command::new("get").arg(Arg::new("key").required(true)))
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("repo")
                .about("Manage repositories")
                .subcommand(
                    Command::new("add")
                        .arg(Arg::new("name").required(true))
                        .arg(Arg::new("url").required(true))
                        .arg(Arg::new("priority").long("priority").default_value("50"))
                        .arg(Arg::new("type").long("type").default_value("http")),
                )
                .subcommand(Command::new("remove").arg(Arg::new("name").required(true)))
                .subcommand(Command::new("list")),
        )
        .subcommand(
            Command::new("metadata")
                .about("Print the metadata embedded in an archive")
                .arg(Arg::new("archive").required(true).help("Archive path")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completions")
                .arg(Arg::new("shell").required(true)),
        )
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

    let man_path = man_dir.join("criage.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
