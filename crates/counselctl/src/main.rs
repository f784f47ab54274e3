//! counselctl - operator tool for the counsel scheduling core
//!
//! Wires together:
//! - Configuration loading
//! - Store initialization
//! - The core services (calendar, slots, sessions, client directory)
//!
//! and exposes them as subcommands for administrators.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use counsel_api::{CalendarDay, ClientRecord, LoginCodeDelivery, Session};
use counsel_config::{Settings, load_config};
use counsel_core::{ClientUpsert, CounselCore};
use counsel_ports::{BaseUrlVideoLinks, NoSmsGateway};
use counsel_store::{AuditEventType, SqliteStore, Store};
use counsel_util::{
    ClientId, DB_FILENAME, DateKey, MonthRef, PsychologistId, SessionId, WallClock,
    default_config_path, format_datetime_full,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// counselctl - manage counseling slots, clients and sessions
#[derive(Parser, Debug)]
#[command(name = "counselctl")]
#[command(about = "Manage counseling slots, clients and sessions", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/counsel/counsel.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set COUNSEL_DATA_DIR env var)
    #[arg(short, long, env = "COUNSEL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Base URL for generated meeting rooms
    #[arg(long, env = "COUNSEL_MEETING_BASE_URL", default_value = "https://meet.jit.si")]
    meeting_base_url: String,

    /// Log level
    #[arg(short, long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the month grid with active slot counts
    Calendar {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long)]
        month: Option<MonthRef>,
    },

    /// Administer slot availability
    #[command(subcommand)]
    Slots(SlotsCommand),

    /// Administer client records
    #[command(subcommand)]
    Client(ClientCommand),

    /// Book a session
    Book {
        #[arg(long)]
        client: ClientId,
        #[arg(long)]
        psychologist: String,
        date: DateKey,
        time: WallClock,
        /// Price in minor currency units (default from config)
        #[arg(long)]
        amount: Option<u64>,
    },

    /// List sessions
    Sessions {
        #[arg(long, conflicts_with = "date")]
        client: Option<ClientId>,
        #[arg(long)]
        date: Option<DateKey>,
        #[arg(long, conflicts_with_all = ["client", "date"])]
        psychologist: Option<String>,
    },

    /// Show a client's next upcoming session
    Next {
        #[arg(long)]
        client: ClientId,
    },

    /// Change a session's status or payment
    #[command(subcommand)]
    Session(SessionCommand),

    /// Show recent audit events
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand, Debug)]
enum SlotsCommand {
    /// Show all slots recorded for a date
    Show { date: DateKey },

    /// Set one slot active (or inactive with --off)
    Set {
        date: DateKey,
        time: WallClock,
        #[arg(long)]
        off: bool,
    },

    /// Activate every configured slot label
    Open { date: DateKey },

    /// Deactivate every configured slot label
    Close { date: DateKey },

    /// Apply a working-hours window (defaults from config)
    Hours {
        date: DateKey,
        #[arg(long)]
        start: Option<WallClock>,
        #[arg(long)]
        end: Option<WallClock>,
        #[arg(long)]
        interval: Option<u32>,
    },
}

#[derive(Subcommand, Debug)]
enum ClientCommand {
    /// Insert or update a client by phone
    Upsert {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
        /// Required for new clients; omitted keeps the current password
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        disabled: bool,
    },

    /// List clients
    List,

    /// Check a phone and password
    Login {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        password: String,
    },

    /// Issue a phone login code
    Code { phone: String },

    /// Log in with a phone login code
    Verify { phone: String, code: String },

    /// Enable a client
    Enable { id: ClientId },

    /// Disable a client
    Disable { id: ClientId },
}

#[derive(Subcommand, Debug)]
enum SessionCommand {
    Show { id: SessionId },
    Start { id: SessionId },
    Complete { id: SessionId },
    Cancel { id: SessionId },
    Pay {
        id: SessionId,
        #[arg(long)]
        payment_id: Option<String>,
    },
    FailPayment { id: SessionId },
    Refund { id: SessionId },
    /// Print (and assign on first use) the meeting join URL
    Link { id: SessionId },
    /// Replace the session notes; omit the text to clear them
    Notes { id: SessionId, text: Option<String> },
}

/// Operator tool state
struct Ctl {
    core: CounselCore,
    store: Arc<dyn Store>,
    settings: Settings,
}

impl Ctl {
    fn new(args: &Args) -> Result<Self> {
        let settings = if args.config.exists() {
            let settings = load_config(&args.config)
                .with_context(|| format!("Failed to load config from {:?}", args.config))?;
            info!(config_path = %args.config.display(), "Configuration loaded");
            settings
        } else {
            info!(config_path = %args.config.display(), "No config file, using defaults");
            Settings::default()
        };

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(DB_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        debug!(db_path = %db_path.display(), "Store initialized");

        counsel_core::audit(store.as_ref(), AuditEventType::StoreOpened);

        let core = CounselCore::new(
            store.clone(),
            &settings,
            Arc::new(BaseUrlVideoLinks::new(&args.meeting_base_url)),
            Arc::new(NoSmsGateway),
        );

        Ok(Self {
            core,
            store,
            settings,
        })
    }

    fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Calendar { month } => {
                let today = counsel_util::today();
                let month = month.unwrap_or_else(|| MonthRef::containing(today));
                let grid = self.core.month_view(month, today)?;
                print_grid(month, &grid);
            }

            Command::Slots(cmd) => self.run_slots(cmd)?,
            Command::Client(cmd) => self.run_client(cmd)?,

            Command::Book {
                client,
                psychologist,
                date,
                time,
                amount,
            } => {
                let psychologist = PsychologistId::new(psychologist);
                let mut request = self.core.booking(client, psychologist, date, time);
                if let Some(amount) = amount {
                    request.amount = amount;
                }
                let session = self
                    .core
                    .sessions
                    .create_session(request, counsel_util::now())?;
                print_session(&session);
            }

            Command::Sessions {
                client,
                date,
                psychologist,
            } => {
                let sessions = match (client, date, psychologist) {
                    (Some(client), _, _) => self.core.sessions.sessions_for_client(client)?,
                    (_, Some(date), _) => self.core.sessions.sessions_on(date)?,
                    (_, _, Some(p)) => self
                        .core
                        .sessions
                        .sessions_for_psychologist(&PsychologistId::new(p))?,
                    _ => self.core.sessions.list()?,
                };
                if sessions.is_empty() {
                    println!("No sessions");
                }
                for session in &sessions {
                    print_session(session);
                }
            }

            Command::Next { client } => {
                match self
                    .core
                    .sessions
                    .next_session_for(client, counsel_util::today())?
                {
                    Some(session) => print_session(&session),
                    None => println!("No upcoming sessions"),
                }
            }

            Command::Session(cmd) => self.run_session(cmd)?,

            Command::Audit { limit } => {
                for event in self.store.get_recent_audits(limit)? {
                    println!(
                        "{:>6}  {}  {:?}",
                        event.id,
                        format_datetime_full(&event.timestamp),
                        event.event
                    );
                }
            }
        }

        Ok(())
    }

    fn run_slots(&self, cmd: SlotsCommand) -> Result<()> {
        let slots = &self.core.slots;
        match cmd {
            SlotsCommand::Show { date } => {
                let day = slots.slots_for_date(date)?;
                if day.is_empty() {
                    println!("No slots recorded for {}", date);
                }
                for (time, active) in day {
                    println!("{}  {}", time, if active { "active" } else { "-" });
                }
            }
            SlotsCommand::Set { date, time, off } => {
                slots.set_slot(date, time, !off)?;
                println!("{} {} {}", date, time, if off { "inactive" } else { "active" });
            }
            SlotsCommand::Open { date } => {
                self.core.open_day(date)?;
                println!("Opened {} slots on {}", self.core.schedule().slot_labels.len(), date);
            }
            SlotsCommand::Close { date } => {
                self.core.close_day(date)?;
                println!("Closed configured slots on {}", date);
            }
            SlotsCommand::Hours {
                date,
                start,
                end,
                interval,
            } => {
                let schedule = &self.settings.schedule;
                let start = start.unwrap_or(schedule.working_start);
                let end = end.unwrap_or(schedule.working_end);
                let interval = interval.unwrap_or(schedule.interval_minutes);
                let active = slots.apply_working_hours(date, start, end, interval)?;
                println!("{} active slots on {} ({}-{} every {} min)", active, date, start, end, interval);
            }
        }
        Ok(())
    }

    fn run_client(&self, cmd: ClientCommand) -> Result<()> {
        let directory = &self.core.directory;
        let now = counsel_util::now();
        match cmd {
            ClientCommand::Upsert {
                name,
                phone,
                password,
                disabled,
            } => {
                let record = directory.upsert(
                    ClientUpsert {
                        name,
                        phone,
                        password,
                        is_active: !disabled,
                    },
                    now,
                )?;
                print_client(&record);
            }
            ClientCommand::List => {
                for record in directory.list()? {
                    print_client(&record);
                }
            }
            ClientCommand::Login { phone, password } => {
                let outcome = directory.login(&phone, &password, now);
                match (&outcome.client, outcome.user_message(self.settings.auth.reveal_disabled)) {
                    (Some(client), _) => print_client(client),
                    (None, Some(message)) => anyhow::bail!("{}", message),
                    (None, None) => anyhow::bail!("Login failed"),
                }
            }
            ClientCommand::Code { phone } => match directory.request_login_code(&phone, now)? {
                LoginCodeDelivery::Sent { message_id } => {
                    println!("Code sent ({})", message_id.as_deref().unwrap_or("no receipt"));
                }
                LoginCodeDelivery::Displayed { code } => {
                    println!("SMS unavailable, login code: {}", code);
                }
            },
            ClientCommand::Verify { phone, code } => {
                let record = directory.verify_login_code(&phone, &code, now)?;
                print_client(&record);
            }
            ClientCommand::Enable { id } => print_client(&directory.set_active(id, true)?),
            ClientCommand::Disable { id } => print_client(&directory.set_active(id, false)?),
        }
        Ok(())
    }

    fn run_session(&self, cmd: SessionCommand) -> Result<()> {
        let sessions = &self.core.sessions;
        let session = match cmd {
            SessionCommand::Show { id } => sessions.get(id)?,
            SessionCommand::Start { id } => sessions.start(id, counsel_util::now())?,
            SessionCommand::Complete { id } => sessions.complete(id)?,
            SessionCommand::Cancel { id } => sessions.cancel(id)?,
            SessionCommand::Pay { id, payment_id } => sessions.record_payment(id, payment_id)?,
            SessionCommand::FailPayment { id } => sessions.fail_payment(id)?,
            SessionCommand::Refund { id } => sessions.refund(id)?,
            SessionCommand::Link { id } => {
                println!("{}", sessions.join_link(id)?);
                return Ok(());
            }
            SessionCommand::Notes { id, text } => sessions.set_notes(id, text)?,
        };
        print_session(&session);
        Ok(())
    }
}

fn print_grid(month: MonthRef, grid: &[CalendarDay]) {
    println!("{}", month);
    println!("   Su     Mo     Tu     We     Th     Fr     Sa");
    for week in grid.chunks(7) {
        let row: Vec<String> = week
            .iter()
            .map(|day| {
                if !day.is_current_month {
                    return "     . ".to_string();
                }
                let marker = if day.is_today { '*' } else { ' ' };
                let count = if day.active_slot_count > 0 {
                    format!("{:<3}", day.active_slot_count)
                } else if day.is_selectable {
                    "-  ".to_string()
                } else {
                    "   ".to_string()
                };
                format!("{}{:>2} {}", marker, day.day, count)
            })
            .collect();
        println!(" {}", row.join(""));
    }
}

fn print_session(session: &Session) {
    println!(
        "{}  {} {}  {:<10} {:<9} {:>8}  psychologist={} client={}",
        session.id,
        session.date,
        session.time,
        session.status,
        session.payment_status,
        session.amount,
        session.psychologist,
        session.client
    );
}

fn print_client(record: &ClientRecord) {
    println!(
        "{}  {:<24} {:<14} {:<8} last_login={}",
        record.id,
        record.name,
        record.phone.masked(),
        if record.is_active { "active" } else { "disabled" },
        record
            .last_login
            .as_ref()
            .map(format_datetime_full)
            .unwrap_or_else(|| "never".into())
    );
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    debug!(version = env!("CARGO_PKG_VERSION"), "counselctl starting");

    let ctl = Ctl::new(&args)?;
    ctl.run(args.command)
}
