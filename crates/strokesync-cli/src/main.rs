use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use glam::Vec3;

use strokesync::{
    Color3, ProtocolMode, SessionConfig, SessionEvent, SessionState, Stroke, SyncSession,
    WireProfile,
};

const TICK: Duration = Duration::from_millis(5);

#[derive(Parser)]
#[command(name = "strokesync")]
#[command(about = "Stroke sync peer")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Receive strokes and log each one delivered
    Listen {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long, help = "Stop after this many seconds")]
        duration_secs: Option<u64>,
    },
    /// Send one or more strokes
    Send {
        #[command(flatten)]
        session: SessionArgs,

        #[arg(long, help = "Points as \"x,y,z;x,y,z;...\"")]
        points: String,

        #[arg(long, default_value = "1,1,1", help = "Color as r,g,b in 0..1")]
        color: String,

        #[arg(long, default_value_t = 0)]
        index: i32,

        #[arg(long, default_value_t = 1)]
        count: u32,
    },
}

#[derive(Args)]
struct SessionArgs {
    #[arg(short, long)]
    address: String,

    #[arg(short, long, default_value = "udp")]
    mode: ProtocolMode,

    #[arg(short, long, help = "Local bind address (udp)")]
    bind: Option<String>,

    #[arg(short, long, help = "raw_binary_multi | json_base64 | json_event_wrapped")]
    profile: Option<WireProfile>,

    #[arg(short, long, help = "YAML session config")]
    config: Option<PathBuf>,
}

impl SessionArgs {
    fn session_config(&self) -> Result<SessionConfig> {
        let mut config = match &self.config {
            Some(path) => SessionConfig::load_from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => SessionConfig::default(),
        };
        if let Some(bind) = &self.bind {
            config.local_bind = bind.clone();
        }
        if let Some(profile) = self.profile {
            config.profile = profile;
        }
        config.validate()?;
        Ok(config)
    }

    fn open(&self) -> Result<SyncSession> {
        let mut session = SyncSession::new(self.session_config()?);
        session.on_status(|event| match event {
            SessionEvent::Connecting { address, mode } => {
                log::info!("Connecting to {} ({})", address, mode)
            }
            SessionEvent::Connected { peer } => log::info!("Connected: {}", peer),
            SessionEvent::Disconnected { reason } => log::info!("Disconnected: {}", reason.as_str()),
            SessionEvent::Error { message } => log::error!("{}", message),
        });

        session.start(&self.address, self.mode)?;

        while session.state() == SessionState::Connecting {
            session.poll();
            thread::sleep(TICK);
        }
        if !session.connection_status() {
            bail!("could not connect to {}", self.address);
        }
        Ok(session)
    }
}

fn parse_triple(s: &str) -> Result<Vec3> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("invalid triple '{s}'"))?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => bail!("expected 3 components in '{s}', got {}", parts.len()),
    }
}

fn parse_points(s: &str) -> Result<Vec<Vec3>> {
    s.split(';')
        .filter(|p| !p.trim().is_empty())
        .map(parse_triple)
        .collect()
}

fn listen(args: &SessionArgs, duration: Option<Duration>) -> Result<()> {
    let mut session = args.open()?;
    session.on_stroke_received(|stroke| {
        log::info!(
            "stroke {} from '{}': {} points, color {:?}",
            stroke.index(),
            stroke.source_event(),
            stroke.len(),
            stroke.color().to_array()
        );
    });

    let start = Instant::now();
    while session.connection_status() {
        if duration.is_some_and(|d| start.elapsed() >= d) {
            break;
        }
        session.poll();
        thread::sleep(TICK);
    }

    let stats = session.stats().clone();
    session.close();
    log::info!(
        "Received {} payloads, delivered {} strokes ({} duplicate, {} short, {} malformed)",
        stats.payloads_received,
        stats.strokes_delivered,
        stats.duplicates_dropped,
        stats.short_strokes_dropped,
        stats.malformed_dropped
    );
    Ok(())
}

fn send(args: &SessionArgs, points: Vec<Vec3>, color: Color3, index: i32, count: u32) -> Result<()> {
    let mut session = args.open()?;

    let mut next = index;
    let end = index.saturating_add(i32::try_from(count).unwrap_or(i32::MAX));
    while next < end && session.connection_status() {
        session.poll();
        let stroke = Stroke::new(next, color, points.clone());
        if session.send_stroke(&stroke) {
            log::info!("Sent stroke {}", next);
            next += 1;
        }
        thread::sleep(TICK);
    }

    // Let the transport flush before tearing it down.
    session.poll();
    let sent = session.stats().strokes_sent;
    session.close();

    if sent < u64::from(count) {
        bail!("sent {} of {} strokes", sent, count);
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Listen {
            session,
            duration_secs,
        } => listen(&session, duration_secs.map(Duration::from_secs)),
        Command::Send {
            session,
            points,
            color,
            index,
            count,
        } => {
            let points = parse_points(&points)?;
            let color = Color3::from_vec3(parse_triple(&color)?);
            send(&session, points, color, index, count)
        }
    }
}
