mod browser;
mod console;
mod http;
mod reports;
mod store;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use browser::{BrowserConfig, BrowserKind, PageFetchBridge, new_session};
use console::ConsoleNotifier;
use http::HttpExecutor;
use spinrelay_core::{
    CaptureStore, CapturedRequest, Collaborators, GameMode, HistoryStore, LoopConfig,
    LoopController, RequestClass, RequestExecutor, StartOutcome,
};
use store::{FileCaptureStore, FileHistoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Primary slot spins with bonus chaining
    Slots,
    /// Wheel game with level-up reward claims
    Wheel,
}

impl From<ModeArg> for GameMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Slots => Self::Slots,
            ModeArg::Wheel => Self::Wheel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutorKind {
    /// Send requests directly with the captured cookies
    Http,
    /// Send requests from inside a logged-in browser page via WebDriver
    Browser,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HeadlessMode {
    /// Run browsers in headless mode
    Headless,
    /// Run browsers with visible windows
    Windowed,
}

impl HeadlessMode {
    const fn is_headless(self) -> bool {
        matches!(self, Self::Headless)
    }
}

#[derive(Debug, Parser)]
#[command(name = "spinrelay", version)]
#[command(about = "Replays captured slot spins, plays bonus rounds out and keeps session stats")]
struct Args {
    /// Which loop to drive
    #[arg(long, value_enum, default_value_t = ModeArg::Slots)]
    mode: ModeArg,

    /// How requests reach the game server
    #[arg(long, value_enum, default_value_t = ExecutorKind::Http)]
    executor: ExecutorKind,

    /// JSON file holding the captured requests, re-read every iteration
    #[arg(long, default_value = "spinrelay-captures.json")]
    captures: PathBuf,

    /// JSON file session history is appended to
    #[arg(long, default_value = "spinrelay-history.json")]
    history: PathBuf,

    /// Loop configuration file (JSON); flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum delay between spins in milliseconds
    #[arg(long)]
    min_delay: Option<u64>,

    /// Maximum delay between spins in milliseconds
    #[arg(long)]
    max_delay: Option<u64>,

    /// Stop after this many spins (0 = unlimited)
    #[arg(long)]
    max_iterations: Option<u64>,

    /// Stop once the balance has fallen this far below the start (0 = disabled)
    #[arg(long)]
    stop_on_loss: Option<i64>,

    /// Consecutive failed spins tolerated before stopping
    #[arg(long)]
    max_errors: Option<u32>,

    /// Skip the game-event posts sent before polled bonus rounds
    #[arg(long)]
    no_telemetry: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print a line for every spin, not only bonuses and warnings
    #[arg(short, long)]
    verbose: bool,

    /// Print every stored capture and exit
    #[arg(long)]
    list_captures: bool,

    /// Remove the capture for a request class and exit
    #[arg(long, value_name = "CLASS")]
    clear_capture: Option<String>,

    /// Store a capture from a JSON file and exit (class=path)
    #[arg(long, value_name = "CLASS=FILE")]
    import_capture: Option<String>,

    /// Render the stored history for --mode and exit
    #[arg(long)]
    show_history: bool,

    /// Delete the stored history for --mode and exit
    #[arg(long)]
    clear_history: bool,

    /// Request timeout for the HTTP executor in seconds
    #[arg(long, default_value_t = 30)]
    http_timeout: u64,

    // Browser-specific options
    /// Browser driving the game page (browser executor only)
    #[arg(long, value_enum, default_value_t = BrowserKind::Chrome)]
    browser: BrowserKind,

    /// Game page to open before replaying; its cookies authenticate every request
    #[arg(long)]
    page_url: Option<String>,

    /// Connect to a Selenium Grid hub instead of a local driver
    #[arg(long)]
    hub: Option<String>,

    /// Run headless where supported
    #[arg(long, value_enum, default_value_t = HeadlessMode::Headless)]
    headless: HeadlessMode,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_run_store_command(&args)? {
        return Ok(());
    }

    announce_banner();

    let config = build_loop_config(&args)?;
    let (executor, bridge) = build_executor(&args).await?;
    let result = run_session(&args, config, executor).await;

    if let Some(bridge) = bridge
        && let Err(err) = bridge.quit().await
    {
        log::warn!("failed to close browser session: {err}");
    }
    result
}

fn announce_banner() {
    println!("{}", "🎰 Spinrelay".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

/// Operator commands that touch the stores and exit without spinning.
fn maybe_run_store_command(args: &Args) -> Result<bool> {
    let captures = FileCaptureStore::new(&args.captures);
    let history = FileHistoryStore::new(&args.history);
    let mode = GameMode::from(args.mode);

    if let Some(spec) = &args.import_capture {
        let (class, path) = parse_import(spec)?;
        let request = read_capture_file(&path)?;
        captures
            .publish(class, request)
            .with_context(|| format!("failed to store {class} capture"))?;
        println!("Stored {class} capture from {}", path.display());
        return Ok(true);
    }

    if let Some(key) = &args.clear_capture {
        let class = parse_class(key)?;
        if captures.clear(class)? {
            println!("Cleared {class} capture");
        } else {
            println!("No {class} capture to clear");
        }
        return Ok(true);
    }

    if args.list_captures {
        let mut output_target = OutputTarget::new(args.output.clone())?;
        list_captures(&captures, output_target.writer())?;
        output_target.flush_inner()?;
        return Ok(true);
    }

    if args.clear_history {
        history.clear(mode)?;
        println!("Cleared {mode} history");
        return Ok(true);
    }

    if args.show_history {
        let records = history.list(mode)?;
        let mut output_target = OutputTarget::new(args.output.clone())?;
        match args.report.as_str() {
            "json" => reports::write_json_history(output_target.writer(), &records)?,
            "markdown" => reports::write_markdown_history(output_target.writer(), mode, &records)?,
            _ => reports::write_console_history(output_target.writer(), mode, &records)?,
        }
        output_target.flush_inner()?;
        return Ok(true);
    }

    Ok(false)
}

fn parse_class(key: &str) -> Result<RequestClass> {
    RequestClass::from_key(key.trim()).ok_or_else(|| {
        let known: Vec<&str> = RequestClass::ALL.iter().map(|c| c.key()).collect();
        anyhow!("unknown request class '{key}' (expected one of {})", known.join(", "))
    })
}

fn parse_import(spec: &str) -> Result<(RequestClass, PathBuf)> {
    let Some((class, path)) = spec.split_once('=') else {
        bail!("--import-capture expects CLASS=FILE, got '{spec}'");
    };
    Ok((parse_class(class)?, PathBuf::from(path.trim())))
}

fn read_capture_file(path: &Path) -> Result<CapturedRequest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let request: CapturedRequest = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a captured request", path.display()))?;
    if request.url.is_empty() {
        bail!("{} has an empty url", path.display());
    }
    Ok(request)
}

fn list_captures(captures: &FileCaptureStore, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Captures in {}:", captures.path().display())?;
    let stored = captures.load()?;
    for class in RequestClass::ALL {
        match stored.get(&class) {
            Some(request) => {
                let when = request
                    .captured_at_ms
                    .and_then(chrono::DateTime::from_timestamp_millis)
                    .map_or_else(|| "unknown time".to_string(), |t| t.to_rfc3339());
                writeln!(
                    out,
                    "  {:14} {} ({} headers, {} body bytes, {when})",
                    class.key(),
                    request.url,
                    request.headers.len(),
                    request.body.len()
                )?;
            }
            None => writeln!(out, "  {:14} -", class.key())?,
        }
    }
    Ok(())
}

fn build_loop_config(args: &Args) -> Result<LoopConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("invalid loop config in {}", path.display()))?
        }
        None => LoopConfig::default(),
    };

    if let Some(v) = args.min_delay {
        config.min_delay_ms = v;
    }
    if let Some(v) = args.max_delay {
        config.max_delay_ms = v;
    }
    if let Some(v) = args.max_iterations {
        config.max_iterations = v;
    }
    if let Some(v) = args.stop_on_loss {
        config.stop_on_loss = v;
    }
    if let Some(v) = args.max_errors {
        config.max_consecutive_errors = v;
    }
    if args.no_telemetry {
        config.telemetry.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

fn build_browser_config(args: &Args) -> BrowserConfig {
    BrowserConfig {
        headless: args.headless.is_headless(),
        remote_hub: args.hub.clone(),
        page_url: args.page_url.clone().unwrap_or_default(),
        ..BrowserConfig::default()
    }
}

async fn build_executor(
    args: &Args,
) -> Result<(Arc<dyn RequestExecutor>, Option<PageFetchBridge>)> {
    match args.executor {
        ExecutorKind::Http => {
            let executor = HttpExecutor::new(Duration::from_secs(args.http_timeout))
                .context("failed to build HTTP client")?;
            Ok((Arc::new(executor), None))
        }
        ExecutorKind::Browser => {
            if args.page_url.is_none() {
                bail!("--page-url is required with the browser executor");
            }
            let cfg = build_browser_config(args);
            let driver = new_session(args.browser, &cfg)
                .await
                .with_context(|| format!("failed to start {:?} session", args.browser))?;
            let bridge = PageFetchBridge::new(driver);
            if !bridge.ensure_page_loaded().await.unwrap_or(false) {
                log::warn!("game page has not finished loading; requests may fail");
            }
            Ok((Arc::new(bridge.clone()), Some(bridge)))
        }
    }
}

async fn run_session(
    args: &Args,
    config: LoopConfig,
    executor: Arc<dyn RequestExecutor>,
) -> Result<()> {
    let mode = GameMode::from(args.mode);
    let captures = Arc::new(FileCaptureStore::new(&args.captures));
    if captures.current(mode.primary_class()).is_none() {
        println!(
            "{}",
            format!(
                "No {} capture in {} yet; the loop will keep retrying until one appears",
                mode.primary_class(),
                args.captures.display()
            )
            .yellow()
        );
    }

    let deps = Collaborators::new(executor, captures)
        .with_history(Arc::new(FileHistoryStore::new(&args.history)))
        .with_notifier(Arc::new(ConsoleNotifier::new(args.verbose)));
    let controller = LoopController::new(mode, deps);

    if controller.start(config)? == StartOutcome::AlreadyActive {
        bail!("{mode} loop is already running");
    }
    println!("Press Ctrl+C to stop");

    tokio::select! {
        () = controller.join() => {}
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl+C")?;
            controller.stop();
        }
    }

    let status = controller.status();
    let mut output_target = OutputTarget::new(args.output.clone())?;
    if args.report == "json" {
        serde_json::to_writer_pretty(output_target.writer(), &status.ledger)?;
        writeln!(output_target.writer())?;
    } else {
        reports::write_session_summary(output_target.writer(), mode, &status.ledger)?;
        if let Some(err) = status.last_error {
            writeln!(output_target.writer(), "Last error: {err}")?;
        }
    }
    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
