use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use cambench_cam::defaults::{self, NcProgramDefaults};
use cambench_cam::set_defaults::{self, SELECT_FOLDER};
use cambench_cam::{register_all, CamPaths};
use cambench_commands::ExtensionRegistry;
use cambench_host::{InputChange, InputValue, SimulatedHost, TerminationReason};
use cambench_settings::{AddinConfig, SettingValue, SettingsStore};
use clap::{Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const CONFIG_FILE: &str = "addin.json";

#[derive(Parser)]
#[command(
    name = "cambench-cli",
    about = "Inspect and exercise the CamBench CAM utility add-in",
    author,
    version
)]
struct Cli {
    /// 外掛設定檔；預設為目前目錄的 addin.json。 / Add-in config file (defaults to ./addin.json).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// 使用者設定目錄；預設為目前目錄。 / Directory holding defaults.json (defaults to current directory).
    #[arg(long, global = true, value_name = "PATH")]
    settings_dir: Option<PathBuf>,
    /// 圖示資源目錄。 / Icon resource directory (defaults to ./resources).
    #[arg(long, global = true, value_name = "PATH")]
    resources: Option<PathBuf>,
    /// 輸出除錯紀錄。 / Emit debug logs on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 檢視或修改 NC 程式預設值。 / Show or edit the NC-program defaults.
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// 列出安裝後的命令配置。 / Print the command layout the add-in installs.
    Tree,
    /// 在模擬主機上執行一次完整流程。 / Run a scripted start, edit and stop on a simulated host.
    Simulate(SimulateArgs),
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// 列出所有設定值。 / List every setting with its effective value.
    Show {
        /// 以 JSON 輸出。 / Print the effective values as JSON.
        #[arg(long)]
        json: bool,
    },
    /// 讀取單一設定值。 / Print one setting.
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },
    /// 寫入設定值並立即保存。 / Store a setting and persist it.
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
    /// 移除覆寫值，恢復預設。 / Drop an override so the default applies again.
    Reset {
        #[arg(value_name = "KEY")]
        key: String,
    },
}

#[derive(Args)]
struct SimulateArgs {
    /// 新的顯示名稱。 / Display name entered in the defaults dialog.
    #[arg(long, value_name = "TEXT")]
    display_name: Option<String>,
    /// 資料夾選擇器回傳的路徑。 / Folder the simulated picker returns.
    #[arg(long, value_name = "PATH")]
    folder: Option<PathBuf>,
    /// 取消而非確認對話框。 / Cancel the dialog instead of confirming it.
    #[arg(long)]
    cancel: bool,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Cli {
        config,
        settings_dir,
        resources,
        verbose,
        command,
    } = Cli::parse();

    let config_path = resolve_path(config, CONFIG_FILE)?;
    let addin = AddinConfig::load(&config_path)
        .with_context(|| format!("load add-in config {}", config_path.display()))?;
    init_tracing(verbose || addin.debug);
    debug!(config = %config_path.display(), "add-in config loaded");

    let paths = CamPaths::new(
        resolve_path(resources, "resources")?,
        resolve_path(settings_dir, "")?,
    );
    match command {
        Commands::Settings(subcommand) => execute_settings_command(subcommand, &paths),
        Commands::Tree => print_tree(&addin, &paths),
        Commands::Simulate(args) => simulate(args, &addin, &paths),
    }
}

/// 紀錄輸出至 stderr，stdout 保留給命令結果。 / Logs go to stderr; stdout carries results.
fn init_tracing(verbose: bool) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(directives) => EnvFilter::new(directives),
        Err(_) if verbose => EnvFilter::new("debug"),
        Err(_) => EnvFilter::new("warn"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn execute_settings_command(command: SettingsCommand, paths: &CamPaths) -> Result<()> {
    let mut store = open_defaults(paths)?;
    match command {
        SettingsCommand::Show { json } => {
            let effective = store.document().effective_map();
            if json {
                let rendered =
                    serde_json::to_string_pretty(&effective).context("serialize settings")?;
                println!("{rendered}");
                return Ok(());
            }
            for (key, value) in &effective {
                let origin = if store.document().is_overridden(key) {
                    ""
                } else {
                    " (default)"
                };
                println!("{key} = {value}{origin}");
            }
        }
        SettingsCommand::Get { key } => {
            let value = store.get(&key)?;
            println!("{value}");
        }
        SettingsCommand::Set { key, value } => {
            let expected = NcProgramDefaults::compiled();
            let Some(default) = expected.get(&key) else {
                bail!("unknown setting '{key}'");
            };
            let parsed = match default {
                SettingValue::Text(_) => SettingValue::Text(value),
                _ => SettingValue::parse_literal(&value),
            };
            if parsed.kind() != default.kind() {
                bail!(
                    "setting '{key}' expects a {} value, got {}",
                    default.kind(),
                    parsed.kind()
                );
            }
            store.set(key.clone(), parsed)?;
            println!("Saved {key} to {}", store.path().display());
        }
        SettingsCommand::Reset { key } => {
            if store.reset(&key)? {
                println!("Reset {key}");
            } else {
                println!("{key} already uses its default");
            }
        }
    }
    Ok(())
}

fn open_defaults(paths: &CamPaths) -> Result<SettingsStore> {
    let file = paths.defaults_file();
    let store = SettingsStore::load(&file, NcProgramDefaults::compiled())
        .with_context(|| format!("load settings {}", file.display()))?;
    if store.recovered_from_malformed() {
        eprintln!("Warning: {} was malformed; showing defaults", file.display());
    }
    Ok(store)
}

fn cam_host(addin: &AddinConfig) -> Rc<SimulatedHost> {
    let host = Rc::new(SimulatedHost::new());
    host.add_container(addin.workspace_id.clone(), "Manufacture");
    host
}

fn start_extension(
    host: &Rc<SimulatedHost>,
    addin: &AddinConfig,
    paths: &CamPaths,
) -> Result<ExtensionRegistry> {
    let mut registry = ExtensionRegistry::new();
    register_all(&mut registry, host.clone(), addin, paths)?;
    let report = registry.start();
    for (command, err) in &report.failed {
        eprintln!("Warning: {command} was not installed: {err}");
    }
    Ok(registry)
}

fn print_tree(addin: &AddinConfig, paths: &CamPaths) -> Result<()> {
    let host = cam_host(addin);
    let registry = start_extension(&host, addin, paths)?;
    print!("{}", host.render_tree());
    registry.stop();
    Ok(())
}

fn simulate(args: SimulateArgs, addin: &AddinConfig, paths: &CamPaths) -> Result<()> {
    let host = cam_host(addin);
    let registry = start_extension(&host, addin, paths)?;
    println!("== installed ==");
    print!("{}", host.render_tree());

    let command = addin.command_id(set_defaults::COMMAND);
    let session = host.start_session(&command)?;
    println!("== session {session} on {command} ==");

    if let Some(folder) = args.folder {
        host.set_folder_choice(Some(folder));
        host.change_input(
            session,
            InputChange::new(SELECT_FOLDER, InputValue::Toggle(true)),
        )?;
    }
    if let Some(display_name) = args.display_name {
        host.change_input(
            session,
            InputChange::new(defaults::DISPLAY_NAME, InputValue::Text(display_name)),
        )?;
    }

    if args.cancel {
        host.destroy(session, TerminationReason::Cancelled)?;
        println!("dialog cancelled");
    } else {
        if !host.validate(session)? {
            host.destroy(session, TerminationReason::Cancelled)?;
            bail!("dialog inputs are invalid");
        }
        let seen = host.notices().len();
        let delivered = host.execute(session)?;
        let failure = host.notices().into_iter().nth(seen);
        if delivered == 0 || failure.is_some() {
            host.destroy(session, TerminationReason::Cancelled)?;
            let reason = failure.unwrap_or_else(|| "no handler ran".to_string());
            bail!("defaults were not saved: {reason}");
        }
        host.destroy(session, TerminationReason::Completed)?;
        println!("defaults saved");
    }
    for notice in host.notices() {
        println!("notice: {notice}");
    }

    let store = open_defaults(paths)?;
    let saved = NcProgramDefaults::from_store(&store)?;
    println!("display name: {}", saved.display_name);
    println!("output folder: {}", saved.output_folder().display());

    let report = registry.stop();
    for (command, reason) in &report.incomplete {
        eprintln!("Warning: {command} left resources behind: {reason}");
    }
    println!("== after stop ==");
    print!("{}", host.render_tree());
    if host.subscription_count() != 0 {
        return Err(anyhow!(
            "{} host subscriptions survived shutdown",
            host.subscription_count()
        ));
    }
    Ok(())
}

fn resolve_path(path: Option<PathBuf>, fallback: &str) -> Result<PathBuf> {
    let cwd = || std::env::current_dir().context("determine current directory");
    match path {
        Some(path) if path.is_absolute() => Ok(path),
        Some(path) => Ok(cwd()?.join(path)),
        None if fallback.is_empty() => cwd(),
        None => Ok(cwd()?.join(Path::new(fallback))),
    }
}
