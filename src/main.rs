// src/main.rs

use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use pkg_mgr::db::InstalledIndex;
use pkg_mgr::options::{
    CliOverrides, DEFAULT_VERBOSITY, MAX_VERBOSITY, Mode, OptionField, Options, log_directive,
};
use pkg_mgr::packages::{HookSettings, Package, list_all, resolve_package};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type LogHandle = reload::Handle<EnvFilter, Registry>;

#[derive(Parser, Debug)]
#[command(name = "pkg-mgr")]
#[command(author, version, about = "Install and remove packages from a local library of tar archives", long_about = None)]
struct Cli {
    /// Mode of operation: install (i), uninstall (u), follow (f), unfollow (uf),
    /// list-all (la) or list-installed (li)
    #[arg(short = 'm', long, value_name = "MODE")]
    mode: Option<String>,

    /// Verbosity from 0 (silent) to 4 (trace)
    #[arg(short = 'v', long, value_name = "LEVEL")]
    verbosity: Option<u8>,

    /// Global config file (default: /etc/pkg-mgr.conf)
    #[arg(short = 'g', long, value_name = "PATH")]
    global_config: Option<PathBuf>,

    /// User config file (default: ~/.config/pkg-mgr.conf)
    #[arg(short = 'u', long, value_name = "PATH")]
    user_config: Option<PathBuf>,

    /// Directory packages are installed under (default: /)
    #[arg(short = 's', long, value_name = "PATH")]
    system_root: Option<PathBuf>,

    /// Directory holding package archives (default: /var/lib/pkg-mgr/pkgs/)
    #[arg(short = 'l', long, value_name = "PATH")]
    package_library: Option<PathBuf>,

    /// Directory of installed-package markers (default: /var/lib/pkg-mgr/installed/)
    #[arg(short = 'i', long, value_name = "PATH")]
    installed_pkg_library: Option<PathBuf>,

    /// Keep extracted hook scripts under <tmp>/<package>-<phase>/
    #[arg(long)]
    keep_hook_dirs: bool,

    /// Print a shell completion script and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,

    /// Packages to operate on, by name in the package library
    packages: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            mode: self.mode.clone(),
            verbosity: self.verbosity,
            global_config_path: self.global_config.clone(),
            user_config_path: self.user_config.clone(),
            system_root: self.system_root.clone(),
            package_library_path: self.package_library.clone(),
            installed_pkg_path: self.installed_pkg_library.clone(),
            keep_hook_dirs: self.keep_hook_dirs,
        }
    }
}

fn log_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_directive(verbosity)))
}

fn init_logging(verbosity: u8) -> LogHandle {
    let (filter, handle) = reload::Layer::new(log_filter(verbosity));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal())
                .with_target(false),
        )
        .init();
    handle
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        clap_complete::generate(shell, &mut Cli::command(), "pkg-mgr", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let initial = cli.verbosity.map_or(DEFAULT_VERBOSITY, |v| v.min(MAX_VERBOSITY));
    let log_handle = init_logging(initial);

    match run(&cli, &log_handle) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, log_handle: &LogHandle) -> Result<ExitCode> {
    let mut options = Options::new();
    options
        .apply_cli(&cli.overrides())
        .context("Invalid command-line option")?;

    if !options.cli_mask().contains(OptionField::Mode) {
        bail!("pkg-mgr requires a mode of operation; see pkg-mgr --help");
    }

    let mode = options.mode();
    if mode.is_list() && !cli.packages.is_empty() {
        bail!("The mode {} does not take any packages", mode);
    }

    options
        .load_config_layers()
        .context("Failed to apply configuration files")?;
    if let Err(e) = log_handle.reload(log_filter(options.verbosity())) {
        warn!("Could not apply verbosity {}: {}", options.verbosity(), e);
    }

    debug!("Resolved options: {:?}", options);

    match mode {
        Mode::ListAll => {
            for name in list_all(options.package_library_path())? {
                println!("{}", name);
            }
            return Ok(ExitCode::SUCCESS);
        }
        Mode::ListInstalled => {
            let index = InstalledIndex::open(options.installed_pkg_path())?;
            for package in index.list()? {
                match package.followed_at {
                    Some(at) if options.verbosity() >= 3 => {
                        println!("{}\t{}", package.name, at.format("%Y-%m-%d %H:%M:%S"))
                    }
                    _ => println!("{}", package.name),
                }
            }
            return Ok(ExitCode::SUCCESS);
        }
        Mode::NoOp => bail!("No operation mode was resolved"),
        Mode::Install | Mode::Uninstall | Mode::Follow | Mode::Unfollow => {}
    }

    if cli.packages.is_empty() {
        bail!("The mode {} requires at least one package", mode);
    }

    let packages = cli
        .packages
        .iter()
        .map(|name| resolve_package(options.package_library_path(), name).and_then(Package::open))
        .collect::<pkg_mgr::Result<Vec<_>>>()?;

    let hooks = HookSettings::new(options.keep_hook_dirs());
    let mut failed = 0;

    for package in &packages {
        debug!("Operation: {}; package: {}", mode, package.name());

        match run_package(mode, package, &options, &hooks) {
            Ok(true) => {}
            Ok(false) => failed += 1,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                error!("{}: {}", package.name(), e);
                failed += 1;
            }
        }
    }

    if failed > 0 {
        warn!("{} of {} package(s) failed", failed, packages.len());
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Run one package operation; `Ok(false)` is a reported, non-fatal failure
fn run_package(
    mode: Mode,
    package: &Package,
    options: &Options,
    hooks: &HookSettings,
) -> pkg_mgr::Result<bool> {
    let root = options.system_root();
    let index = options.installed_pkg_path();
    let exclusions = options.excluded_files();

    match mode {
        Mode::Install => {
            let report = package.install_with_scripts(root, index, exclusions, hooks)?;
            info!(
                "{}: {} entries extracted, {} excluded",
                package.name(),
                report.extracted,
                report.excluded
            );
            Ok(true)
        }
        Mode::Uninstall => {
            let report = package.uninstall_with_scripts(root, index, exclusions, hooks)?;
            info!(
                "{}: {} paths removed, {} directories kept",
                package.name(),
                report.removed,
                report.non_empty_dirs
            );
            if report.failed > 0 {
                error!("{}: {} paths could not be removed", package.name(), report.failed);
            }
            Ok(report.failed == 0)
        }
        Mode::Follow => Ok(package.follow(index)),
        Mode::Unfollow => Ok(package.unfollow(index)),
        Mode::ListAll | Mode::ListInstalled | Mode::NoOp => Ok(true),
    }
}
