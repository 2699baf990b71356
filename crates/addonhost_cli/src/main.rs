//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `addonhost_core` linkage and the built-in descriptors.
//! - Print install order and the resulting backend bundle deterministically.
//!
//! Usage: `addonhost_cli [--config <host.json>] [addons_root]`. Descriptors
//! found under `addons_root` are loaded next to the built-in ones; addon
//! directories that repeat a built-in id are skipped. With `--config`, the
//! file's settings apply and file logging starts when it names a `log_dir`.

use addonhost_core::{
    init_logging_from_config, ExtensionRegistry, FirstPartyExtensionAdapter, HostConfig,
    MissingAssetPolicy, KANBAN_THEME_ID, WEB_ASSETS_BACKEND,
};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("addonhost error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("addonhost_core version={}", addonhost_core::core_version());

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let mut config = match &args.config_path {
        Some(path) => HostConfig::load(path)?,
        // Built-in theme files are not shipped with the CLI; skip them if absent.
        None => HostConfig::default().with_missing_asset_policy(MissingAssetPolicy::Skip),
    };
    if let Some(root) = args.addons_root {
        config = config.with_addons_root(root);
    }
    if init_logging_from_config(&config)? {
        println!("logging=enabled level={}", config.log_level);
    }

    let mut registry = ExtensionRegistry::with_config(config);
    let web = FirstPartyExtensionAdapter::web_baseline();
    let theme = FirstPartyExtensionAdapter::kanban_theme()?;
    registry.load_all(&[&web, &theme])?;
    for id in registry.discover()? {
        println!("discovered={id}");
    }

    let order: Vec<&str> = registry
        .resolve_install_order()?
        .into_iter()
        .map(|entry| entry.id())
        .collect();
    println!("install_order={}", order.join(","));

    let report = registry.install(KANBAN_THEME_ID)?;
    println!("installed={}", report.installed.join(","));
    for path in &report.skipped_assets {
        println!("skipped_asset={path}");
    }

    if let Some(bundle) = registry.bundle(WEB_ASSETS_BACKEND) {
        for (rank, entry) in bundle.entries().iter().enumerate() {
            println!(
                "{WEB_ASSETS_BACKEND}[{rank}] owner={} kind={} priority={} path={}",
                entry.owner,
                entry.kind.as_str(),
                entry.priority,
                entry.path
            );
        }
    }
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    config_path: Option<PathBuf>,
    addons_root: Option<PathBuf>,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        let mut parsed = Self::default();
        while let Some(arg) = args.next() {
            if arg == "--config" {
                let path = args.next().ok_or("--config requires a path")?;
                parsed.config_path = Some(PathBuf::from(path));
            } else if arg.starts_with("--") {
                return Err(format!("unknown option: {arg}"));
            } else if parsed.addons_root.is_none() {
                parsed.addons_root = Some(PathBuf::from(arg));
            } else {
                return Err(format!("unexpected argument: {arg}"));
            }
        }
        Ok(parsed)
    }
}
