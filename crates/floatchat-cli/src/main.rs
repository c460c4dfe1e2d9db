// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod headless;
mod runtime;

use anyhow::{Context, Result, anyhow};
use config::Config;
use floatchat_app::ConversationState;
use floatchat_client::Client;
use floatchat_tui::{AppRuntime, UiOptions};
use runtime::{DemoRuntime, ServiceRuntime};
use std::env;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEMO_SEED: u64 = 53_548;

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
            "load config {}; run `floatchat --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;

    let client = Client::new(config.base_url(), config.timeout()?).with_context(|| {
        format!(
            "invalid [service] config in {}; fix base_url/timeout values",
            options.config_path.display()
        )
    })?;
    if options.check_only {
        return Ok(());
    }

    init_logging(&config)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = client.endpoint(),
        demo = options.demo,
        "floatchat starting"
    );

    let mut state = ConversationState::with_greeting(config.greeting());
    if options.demo {
        let mut runtime = DemoRuntime::new(DEMO_SEED);
        start(&options, &config, &mut state, &mut runtime)
    } else {
        let mut runtime = ServiceRuntime::new(client);
        start(&options, &config, &mut state, &mut runtime)
    }
}

fn start<R: AppRuntime>(
    options: &CliOptions,
    config: &Config,
    state: &mut ConversationState,
    runtime: &mut R,
) -> Result<()> {
    if let Some(question) = &options.ask {
        let answered = headless::ask_once(
            state,
            runtime,
            question,
            config.strictness(),
            &mut io::stdout().lock(),
        )?;
        if !answered {
            return Err(anyhow!("question was not answered"));
        }
        return Ok(());
    }

    let ui = UiOptions {
        show_sql: config.show_sql(),
        strictness: config.strictness(),
    };
    floatchat_tui::run_app(state, runtime, ui)
}

/// Sends tracing output to the log file so the terminal UI stays clean.
/// `RUST_LOG` wins over `[log] level`.
fn init_logging(config: &Config) -> Result<()> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;

    let mut rejected = None;
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => match config.log_level().parse::<EnvFilter>() {
            Ok(filter) => filter,
            Err(error) => {
                rejected = Some(error.to_string());
                EnvFilter::new(config::DEFAULT_LOG_LEVEL)
            }
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))?;

    if let Some(error) = rejected {
        warn!(
            level = config.log_level(),
            %error,
            "[log] level is not a valid filter; falling back to info"
        );
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    demo: bool,
    ask: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        demo: false,
        ask: None,
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
            "--ask" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--ask requires a question"))?;
                options.ask = Some(value.as_ref().to_owned());
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
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("floatchat: ask questions about ARGO float data");
    println!("  --config <path>          Use a specific config path");
    println!("  --ask <question>         Ask once, print the transcript, and exit");
    println!("  --demo                   Answer from synthetic data instead of the service");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --check                  Validate config and exit");
    println!("  --help                   Show this help");
}
