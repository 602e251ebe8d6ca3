use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use auriya_panel_lib::app::commands::{self, PanelContext};
use auriya_panel_lib::app::config;
use auriya_panel_lib::app::daemon::ProfileMode;
use auriya_panel_lib::app::error::AppError;
use auriya_panel_lib::app::games::ProfileRequest;
use auriya_panel_lib::app::logging::init_logging;
use auriya_panel_lib::app::settings::{FpsInput, SettingsPatch};
use auriya_panel_lib::app::shell::ShellExecutor;
use auriya_panel_lib::app::state::PanelState;

#[derive(Parser)]
#[command(name = "auriya-panel")]
#[command(about = "Control panel for the Auriya daemon", long_about = None)]
struct Cli {
    /// Correlates every log line and error of this invocation.
    #[arg(long, global = true)]
    trace_id: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Daemon status record
    Status,
    /// Module, kernel and device information
    System,
    /// Installed packages, managed games first
    Packages {
        #[arg(long)]
        search: Option<String>,
    },
    /// Game profiles known to the daemon
    Games,
    /// Create, update or remove one game profile
    Game {
        #[command(subcommand)]
        action: GameCommands,
    },
    /// Read or write settings.toml
    Settings {
        #[command(subcommand)]
        action: SettingsCommands,
    },
    /// Available CPU governors
    Governors,
    /// Write a governor to every CPU policy
    Governor { name: String },
    /// Toggle daemon debug logging
    Debug { state: Toggle },
    /// Daemon control verbs
    Daemon {
        #[command(subcommand)]
        action: DaemonCommands,
    },
    /// Force a profile mode
    Profile { mode: ProfileMode },
    /// Set the daemon's target FPS
    Fps { fps: u32 },
    /// Collect daemon and kernel logs into shared storage
    ExportLogs,
    /// Show or save the panel's own configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum DaemonCommands {
    /// Whether the daemon answers PONG
    Ping,
    /// Foreground package and PID the daemon is tracking
    Pid,
    Enable,
    Disable,
    /// Re-read the game list from disk
    Reload,
    /// Treat a package as the foreground game
    Inject { package: String },
    ClearInject,
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    /// Write the effective configuration back to its file
    Save,
}

#[derive(Subcommand)]
enum GameCommands {
    Set {
        package: String,
        #[arg(long, default_value = "performance")]
        governor: String,
        #[arg(long)]
        dnd: bool,
        #[arg(long)]
        fps: Option<u32>,
        #[arg(long)]
        rate: Option<u32>,
        #[arg(long)]
        mode: Option<ProfileMode>,
    },
    Remove {
        package: String,
    },
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Set {
        #[arg(long)]
        fas_enabled: Option<bool>,
        #[arg(long)]
        fas_mode: Option<ProfileMode>,
        #[arg(long)]
        target_fps: Option<String>,
        #[arg(long)]
        dnd_default: Option<bool>,
        #[arg(long)]
        default_governor: Option<String>,
        #[arg(long)]
        game_governor: Option<String>,
        /// Also write the new default governor to the CPU policies.
        #[arg(long)]
        apply_governor: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(err) => eprintln!("Failed to render output: {err}"),
    }
}

fn run(
    ctx: &PanelContext<ShellExecutor>,
    command: Commands,
    trace_id: &str,
) -> Result<(), AppError> {
    let mut state = PanelState::new();
    let trace = || Some(trace_id.to_string());

    match command {
        Commands::Status => print_json(&commands::daemon_status(ctx, trace())?),
        Commands::System => print_json(&commands::load_system_info(ctx, trace())?),
        Commands::Packages { search } => {
            let listing = commands::load_packages(ctx, &mut state, trace())?;
            commands::load_active_games(ctx, &mut state, trace())?;
            if let Some(query) = search {
                state.set_search_query(&query);
            }
            print_json(&serde_json::json!({
                "trace_id": listing.trace_id,
                "source": listing.data.source,
                "packages": state.filtered_packages(),
            }));
        }
        Commands::Games => print_json(&commands::load_active_games(ctx, &mut state, trace())?),
        Commands::Game { action } => {
            commands::load_active_games(ctx, &mut state, trace())?;
            let request = match action {
                GameCommands::Set {
                    package,
                    governor,
                    dnd,
                    fps,
                    rate,
                    mode,
                } => ProfileRequest {
                    target_fps: fps,
                    refresh_rate: rate,
                    mode: mode.map(|mode| mode.as_str().to_string()),
                    ..ProfileRequest::enable(package, governor, dnd)
                },
                GameCommands::Remove { package } => ProfileRequest::disable(package),
            };
            print_json(&commands::save_game_profile(ctx, &mut state, request, trace())?);
        }
        Commands::Settings { action } => match action {
            SettingsCommands::Show => {
                print_json(&commands::load_settings_view(ctx, &mut state, trace())?)
            }
            SettingsCommands::Set {
                fas_enabled,
                fas_mode,
                target_fps,
                dnd_default,
                default_governor,
                game_governor,
                apply_governor,
            } => {
                commands::load_settings_view(ctx, &mut state, trace())?;
                let patch = SettingsPatch {
                    fas_enabled,
                    fas_mode,
                    target_fps: target_fps.map(FpsInput::Text),
                    dnd_default_enable: dnd_default,
                    default_governor: default_governor.clone(),
                    game_governor,
                };
                if apply_governor {
                    if let Some(governor) = default_governor {
                        commands::set_global_governor(ctx, governor, trace())?;
                    }
                }
                print_json(&commands::save_settings(ctx, &mut state, patch, trace())?);
            }
        },
        Commands::Governors => print_json(&commands::discover_governors(ctx, &mut state, trace())?),
        Commands::Governor { name } => {
            print_json(&commands::set_global_governor(ctx, name, trace())?)
        }
        Commands::Debug { state: toggle } => {
            let enabled = matches!(toggle, Toggle::On);
            print_json(&commands::set_debug_mode(ctx, &mut state, enabled, trace())?);
        }
        Commands::Daemon { action } => match action {
            DaemonCommands::Ping => print_json(&commands::ping_daemon(ctx, trace())?),
            DaemonCommands::Pid => print_json(&commands::foreground_process(ctx, trace())?),
            DaemonCommands::Enable => {
                print_json(&commands::set_daemon_enabled(ctx, true, trace())?)
            }
            DaemonCommands::Disable => {
                print_json(&commands::set_daemon_enabled(ctx, false, trace())?)
            }
            DaemonCommands::Reload => print_json(&commands::reload_profiles(ctx, trace())?),
            DaemonCommands::Inject { package } => {
                print_json(&commands::inject_package(ctx, package, trace())?)
            }
            DaemonCommands::ClearInject => {
                print_json(&commands::clear_injected_package(ctx, trace())?)
            }
        },
        Commands::Profile { mode } => print_json(&commands::set_profile_mode(ctx, mode, trace())?),
        Commands::Fps { fps } => {
            print_json(&commands::set_target_fps(ctx, &mut state, fps, trace())?)
        }
        Commands::ExportLogs => print_json(&commands::export_logs(ctx, trace())?),
        Commands::Config { action } => match action.unwrap_or(ConfigCommands::Show) {
            ConfigCommands::Show => print_json(&serde_json::json!({
                "path": config::config_path(),
                "config": ctx.config,
            })),
            ConfigCommands::Save => {
                let path = config::save_config(&ctx.config, trace_id)?;
                print_json(&serde_json::json!({
                    "trace_id": trace_id,
                    "path": path,
                }));
            }
        },
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let trace_id = cli
        .trace_id
        .clone()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let loaded = config::load_config(&trace_id);
    let panel_config = loaded.clone().unwrap_or_default();
    init_logging(&panel_config.log_level);
    if let Err(err) = loaded {
        warn!(trace_id = %trace_id, error = %err, "panel config unusable, using defaults");
    }

    let ctx = PanelContext::from_config(panel_config);
    match run(&ctx, cli.command, &trace_id) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match serde_json::to_string_pretty(&err) {
                Ok(text) => eprintln!("{text}"),
                Err(_) => eprintln!("{err}"),
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_game_set_flags() {
        let cli = Cli::try_parse_from([
            "auriya-panel",
            "game",
            "set",
            "com.game",
            "--governor",
            "schedutil",
            "--dnd",
            "--fps",
            "90",
            "--mode",
            "balance",
        ])
        .expect("parse");
        match cli.command {
            Commands::Game {
                action:
                    GameCommands::Set {
                        package,
                        governor,
                        dnd,
                        fps,
                        mode,
                        ..
                    },
            } => {
                assert_eq!(package, "com.game");
                assert_eq!(governor, "schedutil");
                assert!(dnd);
                assert_eq!(fps, Some(90));
                assert_eq!(mode, Some(ProfileMode::Balance));
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn parses_settings_set_with_text_fps() {
        let cli = Cli::try_parse_from([
            "auriya-panel",
            "--trace-id",
            "t-cli",
            "settings",
            "set",
            "--target-fps",
            "abc",
            "--fas-enabled",
            "true",
        ])
        .expect("parse");
        assert_eq!(cli.trace_id.as_deref(), Some("t-cli"));
        match cli.command {
            Commands::Settings {
                action:
                    SettingsCommands::Set {
                        target_fps,
                        fas_enabled,
                        apply_governor,
                        ..
                    },
            } => {
                assert_eq!(target_fps.as_deref(), Some("abc"));
                assert_eq!(fas_enabled, Some(true));
                assert!(!apply_governor);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn parses_daemon_control_verbs() {
        let cli = Cli::try_parse_from(["auriya-panel", "daemon", "inject", "com.game"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Daemon {
                action: DaemonCommands::Inject { ref package }
            } if package == "com.game"
        ));

        let cli = Cli::try_parse_from(["auriya-panel", "profile", "powersave"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Profile {
                mode: ProfileMode::Powersave
            }
        ));

        let cli = Cli::try_parse_from(["auriya-panel", "fps", "90"]).expect("parse");
        assert!(matches!(cli.command, Commands::Fps { fps: 90 }));
        assert!(Cli::try_parse_from(["auriya-panel", "fps", "ninety"]).is_err());
    }

    #[test]
    fn parses_export_logs_and_config_save() {
        let cli = Cli::try_parse_from(["auriya-panel", "export-logs"]).expect("parse");
        assert!(matches!(cli.command, Commands::ExportLogs));

        let cli = Cli::try_parse_from(["auriya-panel", "config", "save"]).expect("parse");
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: Some(ConfigCommands::Save)
            }
        ));
        let cli = Cli::try_parse_from(["auriya-panel", "config"]).expect("parse");
        assert!(matches!(cli.command, Commands::Config { action: None }));
    }
}
