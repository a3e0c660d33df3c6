//! CLI entry point for `mailpager`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::info;

use mailpager::config::{self, Config};
use mailpager::logging::LogQueue;
use mailpager::pager::{Markers, PagerFlags, PagerView};
use mailpager::source::{self, SourceMode};

#[derive(Parser)]
#[command(name = "mailpager", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Message or text file to page
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Page a file in the terminal
    View {
        path: PathBuf,
        /// Page the file bytes without decoding the message
        #[arg(long)]
        raw: bool,
        /// Classify lines but draw them without colors
        #[arg(long)]
        no_color: bool,
        /// Color lines as message-log entries
        #[arg(long)]
        logs: bool,
        /// Start at this byte offset of the paged text
        #[arg(long, value_name = "BYTES", default_value_t = 0)]
        offset: u64,
    },
    /// Print every laid-out row with its classification
    Dump {
        path: PathBuf,
        /// Wrap width in columns
        #[arg(short, long, default_value_t = 80)]
        width: usize,
        #[arg(long)]
        json: bool,
        #[arg(long)]
        raw: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page
    Manpage,
}

/// How `view` presents the content.
#[derive(Debug, Clone, Copy, Default)]
struct ViewArgs {
    raw: bool,
    no_color: bool,
    logs: bool,
    offset: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let interactive = matches!(cli.command, None | Some(Commands::View { .. }));
    let logs = setup_logging(log_level, &config, interactive);

    match cli.command {
        Some(Commands::View {
            path,
            raw,
            no_color,
            logs: log_mode,
            offset,
        }) => {
            let args = ViewArgs {
                raw,
                no_color,
                logs: log_mode,
                offset,
            };
            cmd_view(&path, args, &config, &logs)
        }
        None => match cli.file {
            Some(path) => cmd_view(&path, ViewArgs::default(), &config, &logs),
            None => {
                Cli::command().print_help()?;
                Ok(())
            }
        },
        Some(Commands::Dump {
            path,
            width,
            json,
            raw,
        }) => cmd_dump(&path, width, json, raw, &config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Install the subscriber: env filter, log file, in-memory log queue and,
/// outside the terminal UI, stderr.
fn setup_logging(level: &str, config: &Config, interactive: bool) -> LogQueue {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer =
        (!interactive).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    let file_layer = std::fs::create_dir_all(&log_dir).is_ok().then(|| {
        let file_appender = tracing_appender::rolling::never(&log_dir, config::LOG_FILE_NAME);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender)
    });

    let queue = LogQueue::default();
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .with(queue.clone())
        .init();
    queue
}

fn cmd_view(path: &Path, args: ViewArgs, config: &Config, logs: &LogQueue) -> anyhow::Result<()> {
    let settings = config.compile()?;
    let markers = Markers::generate();
    let mode = if args.raw || args.logs {
        SourceMode::Raw
    } else {
        SourceMode::Auto
    };
    let opened = source::open_stream(path, mode, &markers)?;

    let flags = if args.logs {
        PagerFlags::logs()
    } else if args.no_color {
        PagerFlags::plain().with_headers(opened.has_headers)
    } else {
        PagerFlags::message().with_headers(opened.has_headers)
    };
    let view = PagerView::new(opened.stream, settings.clone(), markers, flags, opened.banner)?;
    let outcome = mailpager::tui::run_tui(view, &settings, logs, args.offset)?;
    info!(
        path = %path.display(),
        log = %config::log_file_path(config).display(),
        reason = ?outcome.reason,
        last_offset = outcome.last_offset,
        "Pager closed"
    );
    Ok(())
}

fn cmd_dump(path: &Path, width: usize, json: bool, raw: bool, config: &Config) -> anyhow::Result<()> {
    if width == 0 {
        anyhow::bail!("width must be at least 1");
    }
    let start = Instant::now();
    let settings = config.compile()?;
    let markers = Markers::generate();
    let mode = if raw { SourceMode::Raw } else { SourceMode::Auto };
    let opened = source::open_stream(path, mode, &markers)?;

    let mut view = PagerView::new(
        opened.stream,
        settings,
        markers,
        PagerFlags::plain().with_headers(opened.has_headers),
        opened.banner,
    )?;
    let rows = view.dump(width)?;
    info!(rows = rows.len(), elapsed = ?start.elapsed(), "Dump complete");

    if json {
        let out = serde_json::json!({
            "file": path.to_string_lossy(),
            "width": width,
            "message": opened.is_message,
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        for row in &rows {
            let mark = if row.continuation { '+' } else { ' ' };
            let depth = row
                .quote_depth
                .map(|d| d.to_string())
                .unwrap_or_default();
            println!(
                "{:>6} {:>8} {:<14} {:>2} {mark}{}",
                row.index,
                row.offset,
                format!("{:?}", row.content_type),
                depth,
                row.text
            );
        }
    }
    Ok(())
}

fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailpager", &mut std::io::stdout());
    Ok(())
}

fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
