// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod report;
mod runtime;

use anyhow::{Context, Result, anyhow, bail};
use config::Config;
use imagecheck_app::{AppCommand, AppState};
use report::ListRequest;
use runtime::{DEMO_CATALOG, DEMO_SOURCE, FsRuntime};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `imagecheck --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let relay = if config.relay_enabled() {
        Some(
            imagecheck_relay::Client::new(config.relay_base_url(), config.relay_timeout()?)
                .with_context(|| {
                    format!(
                        "invalid [relay] config in {}; fix base_url/timeout values",
                        options.config_path.display()
                    )
                })?,
        )
    } else {
        None
    };
    if options.check_only {
        return Ok(());
    }

    logging::init(
        &logging::filter_directive(config.log_level()),
        &config.log_path()?,
    )?;
    match &relay {
        Some(client) => tracing::info!(
            base_url = client.base_url(),
            timeout = ?client.timeout(),
            "relay enabled"
        ),
        None => tracing::info!("relay disabled"),
    }

    let mut state = AppState::default();
    if options.demo {
        state.dispatch(AppCommand::Load {
            source: DEMO_SOURCE.to_owned(),
            bytes: DEMO_CATALOG.as_bytes().to_vec(),
        });
    }

    if options.list {
        return run_list(&mut state, &options, relay.as_ref());
    }

    let initial_path = if options.demo { None } else { options.file };
    let mut runtime = FsRuntime::new(relay);
    imagecheck_tui::run_app(&mut state, &mut runtime, initial_path)
}

fn run_list(
    state: &mut AppState,
    options: &CliOptions,
    relay: Option<&imagecheck_relay::Client>,
) -> Result<()> {
    if !options.demo {
        let path = options
            .file
            .as_ref()
            .ok_or_else(|| anyhow!("--list needs a CSV file (or --demo)"))?;
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
        state.dispatch(AppCommand::Load {
            source: path.display().to_string(),
            bytes,
        });
    }
    report::apply_request(state, &options.request)?;

    let statuses = if options.request.probe {
        let client = relay.ok_or_else(|| {
            anyhow!("--probe needs the relay; set [relay].enabled = true in the config")
        })?;
        report::probe_visible(state, client)
    } else {
        BTreeMap::new()
    };

    let out = report::render(
        state,
        relay.map(imagecheck_relay::Client::base_url),
        &statuses,
        options.request.json,
    )?;
    io::stdout()
        .lock()
        .write_all(out.as_bytes())
        .context("write listing to stdout")
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    file: Option<PathBuf>,
    list: bool,
    request: ListRequest,
    print_config_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        file: None,
        list: false,
        request: ListRequest::default(),
        print_config_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--filter" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--filter requires COLUMN=VALUE"))?;
                let (column, selected) = value.as_ref().split_once('=').ok_or_else(|| {
                    anyhow!(
                        "--filter expects COLUMN=VALUE, got {:?}",
                        value.as_ref()
                    )
                })?;
                if column.is_empty() {
                    bail!("--filter {:?} is missing a column name", value.as_ref());
                }
                options
                    .request
                    .filters
                    .push((column.to_owned(), selected.to_owned()));
            }
            "--group-by" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--group-by requires a column name"))?;
                options.request.group_by.push(value.as_ref().to_owned());
            }
            "--list" => {
                options.list = true;
            }
            "--json" => {
                options.request.json = true;
            }
            "--probe" => {
                options.request.probe = true;
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown if unknown.starts_with('-') => {
                bail!("unknown argument {unknown:?}; run with --help to see supported options");
            }
            path => {
                if options.file.is_some() {
                    bail!("only one CSV file may be given, got a second: {path:?}");
                }
                options.file = Some(PathBuf::from(path));
            }
        }
    }

    if !options.list && (options.request.json || options.request.probe) {
        bail!("--json and --probe only apply to --list");
    }
    let has_selection = !options.request.filters.is_empty() || !options.request.group_by.is_empty();
    if !options.list && has_selection {
        bail!("--filter and --group-by only apply to --list; use [ ] and g in the gallery");
    }

    Ok(options)
}

fn print_help() {
    println!("imagecheck [FILE]");
    println!("  FILE                     CSV catalog to open");
    println!("  --list                   Print the grouped catalog instead of opening the gallery");
    println!("  --json                   With --list, print JSON");
    println!("  --filter <col=value>     With --list, keep rows where col equals value (repeatable)");
    println!("  --group-by <col>         With --list, group rows by col (repeatable)");
    println!("  --probe                  With --list, check every image through the relay");
    println!("  --demo                   Use the built-in sample catalog");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and relay settings");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use crate::report::ListRequest;
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/imagecheck-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                file: None,
                list: false,
                request: ListRequest::default(),
                print_config_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_takes_positional_file() -> Result<()> {
        let options = parse_cli_args(vec!["stock.csv"], default_options_path())?;
        assert_eq!(options.file, Some(PathBuf::from("stock.csv")));
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_second_file() {
        let error = parse_cli_args(vec!["a.csv", "b.csv"], default_options_path())
            .expect_err("two files should fail");
        assert!(error.to_string().contains("only one CSV file"));
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_config_value() {
        let error = parse_cli_args(vec!["--config"], default_options_path())
            .expect_err("missing config value should fail");
        assert!(error.to_string().contains("--config requires a file path"));
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_collects_list_selection() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--list",
                "stock.csv",
                "--filter",
                "Paint Description=Carpathian Grey",
                "--filter",
                "Base Model=",
                "--group-by",
                "Base Model",
                "--json",
                "--probe",
            ],
            default_options_path(),
        )?;
        assert!(options.list);
        assert_eq!(
            options.request,
            ListRequest {
                filters: vec![
                    ("Paint Description".to_owned(), "Carpathian Grey".to_owned()),
                    ("Base Model".to_owned(), String::new()),
                ],
                group_by: vec!["Base Model".to_owned()],
                probe: true,
                json: true,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_rejects_malformed_filter() {
        let missing_equals = parse_cli_args(vec!["--list", "--filter", "Paint"], default_options_path())
            .expect_err("filter without = should fail");
        assert!(missing_equals.to_string().contains("COLUMN=VALUE"));

        let missing_column = parse_cli_args(vec!["--list", "--filter", "=x"], default_options_path())
            .expect_err("filter without column should fail");
        assert!(missing_column.to_string().contains("missing a column name"));
    }

    #[test]
    fn parse_cli_args_rejects_list_flags_without_list() {
        let error = parse_cli_args(vec!["--json"], default_options_path())
            .expect_err("--json without --list should fail");
        assert!(error.to_string().contains("only apply to --list"));

        let error = parse_cli_args(vec!["--group-by", "VRM"], default_options_path())
            .expect_err("--group-by without --list should fail");
        assert!(error.to_string().contains("only apply to --list"));
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_demo_flag() -> Result<()> {
        let options = parse_cli_args(vec!["--demo", "--list"], default_options_path())?;
        assert!(options.demo);
        assert!(options.list);
        assert_eq!(options.file, None);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
