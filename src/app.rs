use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::{error::ErrorKind, Parser};
use colored::{Color, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::controller::{self, Controller, UiCommand};
use crate::output::{self, OutputFormat, PageView};
use crate::registry::{CategoryId, Registry};
use crate::session::{self, AuthLinks};
use crate::state::{Event, PageState, Phase};
use crate::transport::{ClientOptions, ReqwestTransport};

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub base_url: String,
    pub links: AuthLinks,
    pub client: ClientOptions,
    pub registry: Registry,
    pub initial_tab: Option<CategoryId>,
    pub output: Option<String>,
    pub output_format: OutputFormat,
    pub interactive: bool,
    pub no_color: bool,
    pub verbose: u8,
}

fn status(tag: &str, color: Color, message: &str) {
    println!(
        "{}{}{} {}",
        "[".bold().white(),
        tag.bold().color(color),
        "]".bold().white(),
        message
    );
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let env = std::env::var("DATABROWSE_LOG").unwrap_or_else(|_| default.to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

fn pick<T>(cli: Option<T>, cfg: Option<T>) -> Option<T> {
    cli.or(cfg)
}

pub fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let base_url = pick(args.base_url, cfg.base_url.clone())
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| "a base URL is required (--base-url or base_url in config)".to_string())?;
    reqwest::Url::parse(&base_url).map_err(|e| format!("invalid base URL '{base_url}': {e}"))?;

    let defaults = AuthLinks::default();
    let links = AuthLinks {
        identity_path: pick(args.identity_path, cfg.identity_path.clone())
            .unwrap_or(defaults.identity_path),
        login_url: pick(args.login_path, cfg.login_path.clone()).unwrap_or(defaults.login_url),
        logout_url: pick(args.logout_path, cfg.logout_path.clone())
            .unwrap_or(defaults.logout_url),
    };
    for (name, value) in [
        ("identity_path", &links.identity_path),
        ("login_path", &links.login_url),
        ("logout_path", &links.logout_url),
    ] {
        validation::validate_path(value).map_err(|e| format!("invalid {name} '{value}': {e}"))?;
    }

    let header = match pick(args.header, cfg.header.clone()) {
        Some(raw) if !raw.trim().is_empty() => Some(
            validation::parse_header(&raw).map_err(|e| format!("invalid header '{raw}': {e}"))?,
        ),
        _ => None,
    };
    let client = ClientOptions {
        timeout_seconds: pick(args.timeout, cfg.timeout),
        proxy: pick(args.proxy, cfg.proxy.clone()),
        header,
    };

    let registry =
        config::build_registry(&cfg).map_err(|e| format!("invalid category config: {e}"))?;
    let initial_tab = match pick(args.tab, cfg.tab.clone()) {
        Some(label) => Some(
            registry
                .resolve(&label)
                .ok_or_else(|| format!("unknown tab '{label}'"))?,
        ),
        None => None,
    };

    let output = pick(args.output, cfg.output.clone()).filter(|o| !o.trim().is_empty());
    let output_format = match pick(args.output_format, cfg.output_format.clone()) {
        Some(raw) => OutputFormat::parse(&raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected html, text or json"))?,
        None => match output.as_deref() {
            Some(path) => output::infer_format_from_path(path).unwrap_or(OutputFormat::Html),
            None => OutputFormat::Text,
        },
    };

    Ok(RunConfig {
        base_url,
        links,
        client,
        registry,
        initial_tab,
        output,
        output_format,
        interactive: args.interactive || cfg.interactive.unwrap_or(false),
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
        verbose: args.verbose,
    })
}

fn spawn_stdin_commands(
    registry: Arc<Registry>,
    login_url: String,
    tx: mpsc::Sender<Event>,
) -> task::JoinHandle<()> {
    task::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let command = match controller::parse_command(&line, &registry) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    status("ERR", Color::Red, &e.to_string());
                    continue;
                }
            };
            match command {
                UiCommand::Quit => break,
                UiCommand::Login => status("NAV", Color::Cyan, &format!("login at {login_url}")),
                other => {
                    if let Some(event) = other.into_event() {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                }
            }
        }
    })
}

fn describe(registry: &Registry, state: &PageState) -> (&'static str, Color, String) {
    let label = &registry.category(state.view.active).label;
    match state.phase {
        Phase::Displayed => (
            "OK",
            Color::Green,
            format!("{label}: {} row(s)", state.view.rows.len()),
        ),
        Phase::Forbidden | Phase::TransientError => (
            "ERR",
            Color::Red,
            format!("{label}: {}", state.error_message().unwrap_or_default()),
        ),
        Phase::Fetching => ("...", Color::Yellow, format!("{label}: loading")),
        Phase::Idle => ("...", Color::Yellow, label.to_string()),
    }
}

fn new_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn run_async(run: RunConfig) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let transport = ReqwestTransport::new(&run.base_url, &run.client)
        .map_err(|e| format!("failed to build http client: {e}"))?;
    let registry = Arc::new(run.registry);
    let links = run.links;
    let mut controller = Controller::new(Arc::clone(&registry), Arc::new(transport), links.clone());

    let (tx, rx) = mpsc::channel::<Event>(16);
    if let Some(tab) = run.initial_tab {
        tx.send(Event::SelectCategory(tab))
            .await
            .map_err(|_| "failed to queue initial tab".to_string())?;
    }
    if run.interactive {
        status(
            "INF",
            Color::Cyan,
            "type a tab name or number, 'r' to retry, 'login', 'logout' or 'q' to quit",
        );
        spawn_stdin_commands(Arc::clone(&registry), links.login_url.clone(), tx);
    } else {
        drop(tx);
    }
    let ui = Box::pin(futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|ev| (ev, rx))
    }));

    let interactive = run.interactive;
    let mut sink = PageSink::new(
        run.output_format,
        run.output.clone(),
        interactive,
        std::io::stdout(),
    );
    let mut spinner: Option<ProgressBar> = None;

    let final_state = controller
        .run(ui, |state: &PageState| {
            let (tag, color, message) = describe(&registry, state);
            if state.phase == Phase::Fetching {
                if interactive && spinner.is_none() {
                    spinner = Some(new_spinner(message));
                }
                return;
            }
            if let Some(pb) = spinner.take() {
                pb.finish_and_clear();
            }
            if sink.renders_change(state) {
                status(tag, color, &message);
                sink.emit(&registry, &links, state);
            }
        })
        .await;

    if sink.renders_final(&final_state) {
        if run.output_format == OutputFormat::Text {
            let (tag, color, message) = describe(&registry, &final_state);
            status(tag, color, &message);
        }
        sink.emit(&registry, &links, &final_state);
    }
    if let Some(url) = final_state.navigated_to.as_deref() {
        status("NAV", Color::Cyan, &format!("logged out, continue at {url}"));
    }
    sink.finish().map(|_| ())
}

/// Destination for rendered pages. Interactive sessions and output files
/// follow every settled change; one-shot stdout gets a single page built
/// from the state the controller returns.
pub(crate) struct PageSink<W: Write> {
    format: OutputFormat,
    path: Option<String>,
    follow_changes: bool,
    out: W,
    write_error: Option<String>,
}

impl<W: Write> PageSink<W> {
    pub(crate) fn new(format: OutputFormat, path: Option<String>, interactive: bool, out: W) -> Self {
        let follow_changes = interactive || path.is_some();
        Self {
            format,
            path,
            follow_changes,
            out,
            write_error: None,
        }
    }

    fn renderable(state: &PageState) -> bool {
        !state.is_terminated() && state.is_settled()
    }

    pub(crate) fn renders_change(&self, state: &PageState) -> bool {
        self.follow_changes && Self::renderable(state)
    }

    pub(crate) fn renders_final(&self, state: &PageState) -> bool {
        !self.follow_changes && Self::renderable(state)
    }

    pub(crate) fn emit(&mut self, registry: &Registry, links: &AuthLinks, state: &PageState) {
        let view = PageView::new(registry, state, links);
        let rendered = output::render(self.format, &view);
        let result = match self.path.as_deref() {
            Some(path) => std::fs::write(path, &rendered)
                .map_err(|e| format!("failed to write output file: {e}")),
            None => self
                .out
                .write_all(&rendered)
                .and_then(|_| self.out.flush())
                .map_err(|e| format!("failed to write output: {e}")),
        };
        if let Err(e) = result {
            tracing::error!(path = self.path.as_deref().unwrap_or("-"), error = %e, "output not written");
            self.write_error.get_or_insert(e);
        }
    }

    /// Hands back the writer, or the first write failure.
    pub(crate) fn finish(self) -> Result<W, String> {
        match self.write_error {
            Some(e) => Err(e),
            None => Ok(self.out),
        }
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                let _ = e.print();
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    let config_path = match args.config.as_deref() {
        Some(path) => Some(config::expand_tilde(path)),
        None => config::default_config_path(),
    };

    if args.init_config {
        let path = config_path.ok_or_else(|| "could not determine config path".to_string())?;
        let created = config::write_default_config(&path).map_err(|e| e.to_string())?;
        if created {
            println!("config written to {}", path.display());
        } else {
            println!("config already exists at {}", path.display());
        }
        return Ok(());
    }

    let cfg = match config_path.as_ref() {
        Some(path) => config::load_config(path, args.config.is_none()).map_err(|e| e.to_string())?,
        None => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg)?;
    init_tracing(run.verbose);
    tracing::debug!(
        base_url = %run.base_url,
        identity = %run.links.identity_path,
        categories = run.registry.len(),
        "starting"
    );
    if run.links.identity_path != session::DEFAULT_IDENTITY_PATH {
        tracing::info!(path = %run.links.identity_path, "using custom identity endpoint");
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    let result = rt.block_on(run_async(run));
    // stdin reads sit on the blocking pool and never observe the page ending
    rt.shutdown_background();
    result
}
