// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn path_arg(id: &'static str, short: char, long: &'static str, help: &'static str) -> Arg {
    Arg::new(id)
        .short(short)
        .long(long)
        .value_name("PATH")
        .help(help)
}

fn build_cli() -> Command {
    Command::new("pkg-mgr")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Install and remove packages from a local library of tar archives")
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help(
                    "Mode of operation: install (i), uninstall (u), follow (f), unfollow (uf), \
                     list-all (la) or list-installed (li)",
                ),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .value_name("LEVEL")
                .help("Verbosity from 0 (silent) to 4 (trace)"),
        )
        .arg(path_arg(
            "global_config",
            'g',
            "global-config",
            "Global config file (default: /etc/pkg-mgr.conf)",
        ))
        .arg(path_arg(
            "user_config",
            'u',
            "user-config",
            "User config file (default: ~/.config/pkg-mgr.conf)",
        ))
        .arg(path_arg(
            "system_root",
            's',
            "system-root",
            "Directory packages are installed under (default: /)",
        ))
        .arg(path_arg(
            "package_library",
            'l',
            "package-library",
            "Directory holding package archives (default: /var/lib/pkg-mgr/pkgs/)",
        ))
        .arg(path_arg(
            "installed_pkg_library",
            'i',
            "installed-pkg-library",
            "Directory of installed-package markers (default: /var/lib/pkg-mgr/installed/)",
        ))
        .arg(
            Arg::new("keep_hook_dirs")
                .long("keep-hook-dirs")
                .action(ArgAction::SetTrue)
                .help("Keep extracted hook scripts under <tmp>/<package>-<phase>/"),
        )
        .arg(
            Arg::new("completions")
                .long("completions")
                .value_name("SHELL")
                .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                .help("Print a shell completion script and exit"),
        )
        .arg(
            Arg::new("packages")
                .num_args(0..)
                .help("Packages to operate on, by name in the package library"),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pkg-mgr.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}
