mod render;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use grid_sync::{
    resolve_offset, DevicePrefs, GridSession, HttpSlotClient, SlotApi, SyncScheduler,
};
use slots::{CalendarId, GridWindow, Nickname, SlotKey, TimezoneOffset};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::render::render_view;

#[derive(Parser)]
#[command(name = "slotgrid")]
#[command(about = "Shared availability grid client - mark the hours you are free")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Slot server base URL
    #[arg(
        long,
        env = "SLOTGRID_SERVER",
        default_value = "http://127.0.0.1:3001",
        global = true
    )]
    server: String,

    /// Calendar to work on
    #[arg(short, long, default_value = CalendarId::DEFAULT, global = true)]
    calendar: String,

    /// Your nickname (2-20 characters)
    #[arg(short, long, env = "SLOTGRID_NICKNAME", global = true)]
    nickname: Option<String>,

    /// Display offset for this run only, -4..=4
    #[arg(long, global = true, allow_hyphen_values = true)]
    tz: Option<i64>,

    /// Device preferences file
    #[arg(long, global = true)]
    prefs: Option<PathBuf>,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the calendar in local time
    List {
        /// Highlight cells where all of these nicknames are present
        #[arg(long, num_args = 1..)]
        filter: Vec<String>,

        /// Number of days to show, starting today
        #[arg(long, default_value_t = GridWindow::DEFAULT_DAYS)]
        days: u32,
    },

    /// Click one cell: add yourself, or remove yourself if already there
    Toggle {
        /// Local date, YYYY-MM-DD
        date: String,

        /// Local hour, HH:00
        time: String,
    },

    /// Drag across cells; the first cell decides add or remove
    Paint {
        /// Pairs of local date and hour: 2024-06-01 10:00 2024-06-01 11:00 ...
        #[arg(required = true, num_args = 2..)]
        cells: Vec<String>,
    },

    /// Show or choose the display timezone
    Timezone {
        #[command(subcommand)]
        action: Option<TimezoneCommand>,
    },

    /// Keep the view in sync and print it whenever it changes
    Watch {
        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 2000, value_parser = clap::value_parser!(u64).range(1..))]
        interval_ms: u64,

        #[arg(long, num_args = 1..)]
        filter: Vec<String>,
    },

    /// Remove every selection from every calendar
    Clear {
        /// Confirm the wipe
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum TimezoneCommand {
    /// Use this offset on this device and share it with the calendar
    Set {
        #[arg(allow_hyphen_values = true)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt().with_max_level(level).init();

    let ctx = AppContext::from_cli(&cli)?;
    match cli.command {
        Commands::List { filter, days } => list_command(&ctx, filter, days).await,
        Commands::Toggle { date, time } => toggle_command(&ctx, &date, &time).await,
        Commands::Paint { cells } => paint_command(&ctx, &cells).await,
        Commands::Timezone { action } => match action {
            None => timezone_command(&ctx).await,
            Some(TimezoneCommand::Set { hours }) => set_timezone_command(&ctx, hours).await,
        },
        Commands::Watch {
            interval_ms,
            filter,
        } => watch_command(&ctx, interval_ms, filter).await,
        Commands::Clear { yes } => clear_command(&ctx, yes).await,
    }
}

/// Settings shared by every command.
struct AppContext {
    api: Arc<HttpSlotClient>,
    calendar: CalendarId,
    nickname: Option<String>,
    tz: Option<TimezoneOffset>,
    prefs_path: Option<PathBuf>,
}

impl AppContext {
    fn from_cli(cli: &Cli) -> Result<Self> {
        let api = HttpSlotClient::new(&cli.server)?;
        let tz = cli.tz.map(TimezoneOffset::new).transpose()?;
        let prefs_path = cli.prefs.clone().or_else(DevicePrefs::default_path);
        debug!("server {}, prefs {:?}", api.base_url(), prefs_path);

        Ok(Self {
            api: Arc::new(api),
            calendar: CalendarId::new(cli.calendar.as_str()),
            nickname: cli.nickname.clone(),
            tz,
            prefs_path,
        })
    }

    fn nickname(&self) -> Result<Nickname> {
        let raw = self
            .nickname
            .as_deref()
            .ok_or_else(|| anyhow!("a nickname is required (--nickname or SLOTGRID_NICKNAME)"))?;
        Ok(Nickname::parse(raw)?)
    }

    fn prefs(&self) -> DevicePrefs {
        let Some(path) = &self.prefs_path else {
            return DevicePrefs::default();
        };
        match DevicePrefs::load(path) {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!("{}", e);
                DevicePrefs::default()
            }
        }
    }

    /// `--tz` wins over the stored device choice.
    fn local_override(&self) -> Option<TimezoneOffset> {
        self.tz.or_else(|| self.prefs().timezone(&self.calendar))
    }

    async fn session(&self) -> Result<GridSession> {
        let api: Arc<dyn SlotApi> = self.api.clone();
        let session = GridSession::connect(
            api,
            self.calendar.clone(),
            self.nickname()?,
            self.local_override(),
        )
        .await;
        if !session.view().is_loaded() {
            bail!("could not load calendar {} from {}", self.calendar, self.api.base_url());
        }
        Ok(session)
    }
}

fn parse_cell(date: &str, time: &str) -> Result<SlotKey> {
    let key = SlotKey::parse_parts(date, time)
        .with_context(|| format!("invalid cell {} {}", date, time))?;
    GridWindow::from_today().check(&key)?;
    Ok(key)
}

async fn list_command(ctx: &AppContext, filter: Vec<String>, days: u32) -> Result<()> {
    let session = ctx.session().await?;
    let window = GridWindow::new(chrono::Local::now().date_naive(), days);

    println!(
        "Calendar {} ({}), you are {}",
        session.calendar(),
        session.offset(),
        session.nickname()
    );
    print!(
        "{}",
        render_view(&session.view(), &window, session.nickname().as_str(), &filter)
    );
    Ok(())
}

async fn toggle_command(ctx: &AppContext, date: &str, time: &str) -> Result<()> {
    let key = parse_cell(date, time)?;
    let session = ctx.session().await?;

    session.click(key).await?;

    let state = if session.view().is_mine(&key, session.nickname().as_str()) {
        "available"
    } else {
        "not available"
    };
    info!("{} is now {} at {} ({})", session.nickname(), state, key, session.offset());
    Ok(())
}

async fn paint_command(ctx: &AppContext, raw: &[String]) -> Result<()> {
    if raw.len() % 2 != 0 {
        bail!("cells are given as DATE TIME pairs");
    }
    let cells = raw
        .chunks(2)
        .map(|pair| parse_cell(&pair[0], &pair[1]))
        .collect::<Result<Vec<_>>>()?;

    let session = ctx.session().await?;
    let report = session.paint(&cells).await?;

    info!(
        "{} cells saved, {} failed{}",
        report.sent,
        report.failed,
        if report.resynced { "" } else { " (view may be stale)" }
    );
    if report.failed > 0 {
        bail!("{} of {} changes were not saved", report.failed, report.sent + report.failed);
    }
    Ok(())
}

async fn timezone_command(ctx: &AppContext) -> Result<()> {
    let local = ctx.local_override();
    let shared = match ctx.api.get_timezone(&ctx.calendar).await {
        Ok(shared) => shared,
        Err(e) => {
            warn!("could not read the calendar timezone: {}", e);
            None
        }
    };
    let device = TimezoneOffset::device_default();
    let offset = resolve_offset(local, shared, device);

    let source = if local.is_some() {
        "this device"
    } else if shared.is_some() {
        "calendar"
    } else {
        "device clock"
    };
    println!("{} ({})", offset, source);
    Ok(())
}

async fn set_timezone_command(ctx: &AppContext, hours: i64) -> Result<()> {
    let offset = TimezoneOffset::new(hours)?;

    if let Some(path) = &ctx.prefs_path {
        let mut prefs = ctx.prefs();
        prefs.set_timezone(&ctx.calendar, offset);
        prefs.save(path)?;
    }

    match ctx.api.set_timezone(&ctx.calendar, offset).await {
        Ok(accepted) => info!("calendar {} now uses {}", ctx.calendar, accepted),
        Err(e) => warn!("saved locally, but the calendar was not updated: {}", e),
    }
    Ok(())
}

async fn watch_command(ctx: &AppContext, interval_ms: u64, filter: Vec<String>) -> Result<()> {
    let session = Arc::new(ctx.session().await?);
    let window = GridWindow::from_today();
    let nickname = session.nickname().as_str().to_string();

    let mut last = render_view(&session.view(), &window, &nickname, &filter);
    print!("{}", last);

    let handle = SyncScheduler::with_interval(session.clone(), Duration::from_millis(interval_ms))
        .spawn();
    let mut updates = handle.updates();

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = render_view(&session.view(), &window, &nickname, &filter);
                if current != last {
                    println!("--- {}", chrono::Local::now().format("%H:%M:%S"));
                    print!("{}", current);
                    last = current;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    let stats = handle.stop().await;
    debug!("sync stats: {:?}", stats);
    Ok(())
}

async fn clear_command(ctx: &AppContext, yes: bool) -> Result<()> {
    if !yes {
        bail!("this removes every selection in every calendar; pass --yes to confirm");
    }
    ctx.api.clear_all().await?;
    info!("all selections cleared");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["slotgrid", "watch", "--interval-ms", "0"]).is_err());

        let cli = Cli::try_parse_from(["slotgrid", "watch", "--interval-ms", "500"]).unwrap();
        match cli.command {
            Commands::Watch { interval_ms, .. } => assert_eq!(interval_ms, 500),
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_watch_interval_defaults_to_two_seconds() {
        let cli = Cli::try_parse_from(["slotgrid", "watch"]).unwrap();
        match cli.command {
            Commands::Watch { interval_ms, .. } => assert_eq!(interval_ms, 2000),
            _ => panic!("expected watch"),
        }
    }
}
