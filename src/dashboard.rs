use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::AppConfig;
use crate::supervisor::{DashboardSnapshot, StatusBoard};
use crate::theme::{banner, Theme};

/// Keys the dashboard reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Up,
    Down,
    PageLeft,
    PageRight,
    Quit,
}

/// Cheap handle lifecycle tasks and the input path use to request a
/// redraw. Requests coalesce in the render task.
#[derive(Clone)]
pub struct RedrawHandle {
    tx: mpsc::UnboundedSender<()>,
}

impl RedrawHandle {
    pub fn new(tx: mpsc::UnboundedSender<()>) -> Self {
        Self { tx }
    }

    pub fn request(&self) {
        let _ = self.tx.send(());
    }
}

/// Debounce arithmetic for physical draws: at most one draw per window,
/// with a request inside the window deferred to the window boundary.
pub struct RenderGate {
    min_interval: Duration,
    last_draw: Option<Instant>,
}

impl RenderGate {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_draw: None,
        }
    }

    /// How long to hold off before the next physical draw.
    pub fn delay_until_due(&self, now: Instant) -> Duration {
        match self.last_draw {
            None => Duration::ZERO,
            Some(last) => {
                let elapsed = now.duration_since(last);
                if elapsed >= self.min_interval {
                    Duration::ZERO
                } else {
                    self.min_interval - elapsed
                }
            }
        }
    }

    pub fn mark_drawn(&mut self, now: Instant) {
        self.last_draw = Some(now);
    }
}

/// Render task: waits for redraw requests, coalesces bursts through the
/// gate, and always draws from a snapshot taken at draw time so the last
/// draw reflects the latest state.
pub async fn render_loop<S, D>(
    cfg: Arc<AppConfig>,
    mut requests: mpsc::UnboundedReceiver<()>,
    mut shutdown: watch::Receiver<bool>,
    snapshot: S,
    mut draw: D,
) where
    S: Fn() -> DashboardSnapshot,
    D: FnMut(&str),
{
    let mut gate = RenderGate::new(cfg.min_render_interval);
    loop {
        tokio::select! {
            received = requests.recv() => {
                if received.is_none() {
                    break;
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }
        while requests.try_recv().is_ok() {}

        let wait = gate.delay_until_due(Instant::now());
        if wait > Duration::ZERO {
            tokio::time::sleep(wait).await;
            // Requests that arrived while waiting are covered by this draw.
            while requests.try_recv().is_ok() {}
        }

        let frame = render_frame(&snapshot(), &cfg);
        draw(&frame);
        gate.mark_drawn(Instant::now());
    }
}

pub fn spawn_renderer(
    board: Arc<StatusBoard>,
    cfg: Arc<AppConfig>,
    requests: mpsc::UnboundedReceiver<()>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stdout = io::stdout();
        render_loop(
            cfg,
            requests,
            shutdown,
            move || board.snapshot(),
            move |frame| draw_frame(&mut stdout, frame),
        )
        .await;
    })
}

/// Physical draw: ANSI clear + home, then the frame. Raw mode needs
/// explicit carriage returns.
fn draw_frame(out: &mut impl Write, frame: &str) {
    let _ = write!(out, "\x1b[2J\x1b[H{}", frame.replace('\n', "\r\n"));
    let _ = out.flush();
}

/// Build one full dashboard frame from a snapshot.
pub fn render_frame(snapshot: &DashboardSnapshot, cfg: &AppConfig) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(banner());
    lines.push(String::new());

    let total = snapshot.rows.len();
    let view = snapshot.view;
    let (start, end) = view.page_bounds(total);

    for (index, row) in snapshot.rows[start..end].iter().enumerate() {
        let selected = start + index == view.selected;
        let prefix = if selected {
            format!(" {} ", Theme::selection("→"))
        } else {
            "   ".to_string()
        };
        let status = &row.status;

        lines.push(format!(
            "{}{} {}",
            prefix,
            Theme::label("Wallet:"),
            Theme::address(&short_address(&row.address))
        ));
        lines.push(format!(
            "    {} {}",
            Theme::label("Status:"),
            Theme::status(status.state)
        ));
        lines.push(format!(
            "    {} {}",
            Theme::label("Points:"),
            Theme::value(&status.points.to_string())
        ));
        lines.push(format!(
            "    {} {}",
            Theme::label("Streak:"),
            Theme::value(&status.daily_streak.to_string())
        ));
        lines.push(format!(
            "    {} {}",
            Theme::label("Last Ping:"),
            Theme::value(&format_last_ping(status.last_ping))
        ));
        lines.push(format!(
            "    {} {}",
            Theme::label("Last Claim:"),
            Theme::value(&format_last_claim(status.last_claimed))
        ));
        if let Some(error) = &status.last_error {
            lines.push(format!(
                "    {} {}",
                Theme::label("Error:"),
                Theme::error(error)
            ));
        }
        lines.push(String::new());
    }

    lines.push(
        Theme::dim(&format!(
            "Page {}/{}",
            view.page + 1,
            view.total_pages(total)
        ))
        .to_string(),
    );
    lines.push(String::new());
    lines.push(Theme::heading("Configuration:").to_string());
    lines.push(format!("Ping Interval: {}s", cfg.ping_interval.as_secs()));
    lines.push(String::new());
    lines.push(Theme::heading("Controls:").to_string());
    lines.push(
        Theme::dim("↑/↓: Navigate | ←/→: Change Page | Q/Ctrl+C: Exit").to_string(),
    );
    lines.push(String::new());

    lines.join("\n")
}

fn short_address(address: &str) -> String {
    if address.len() > 10 {
        format!("{}...{}", &address[..6], &address[address.len() - 4..])
    } else {
        address.to_string()
    }
}

fn format_last_ping(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn format_last_claim(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| {
            t.with_timezone(&Local)
                .format("%b %e %I:%M:%S %p")
                .to_string()
        })
        .unwrap_or_else(|| "Never Claimed".to_string())
}

/// Blocking input task: polls the terminal and forwards mapped keys. The
/// watch flag stops it at shutdown.
pub fn spawn_input_reader(
    tx: mpsc::UnboundedSender<InputEvent>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !*shutdown.borrow() {
            if !event::poll(Duration::from_millis(150)).unwrap_or(false) {
                continue;
            }
            let Ok(Event::Key(key)) = event::read() else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let mapped = match key.code {
                KeyCode::Up => Some(InputEvent::Up),
                KeyCode::Down => Some(InputEvent::Down),
                KeyCode::Left => Some(InputEvent::PageLeft),
                KeyCode::Right => Some(InputEvent::PageRight),
                KeyCode::Char('q') | KeyCode::Char('Q') => Some(InputEvent::Quit),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    Some(InputEvent::Quit)
                }
                _ => None,
            };
            if let Some(event) = mapped {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
    })
}

pub fn setup_terminal() -> Result<()> {
    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen, cursor::Hide)?;
    Ok(())
}

pub fn restore_terminal() -> Result<()> {
    execute!(io::stdout(), cursor::Show, LeaveAlternateScreen)?;
    disable_raw_mode()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::{WalletState, WalletStatus};
    use crate::supervisor::{ViewState, WalletRow};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    fn row(index: usize, points: u64) -> WalletRow {
        WalletRow {
            address: format!("0x{:040x}", index),
            status: WalletStatus {
                state: WalletState::Active,
                last_ping: None,
                points,
                daily_streak: 1,
                last_claimed: None,
                last_error: None,
            },
        }
    }

    fn snapshot_with(total: usize, page: usize) -> DashboardSnapshot {
        DashboardSnapshot {
            rows: (0..total).map(|i| row(i, i as u64)).collect(),
            view: ViewState {
                selected: page * 5,
                page,
                page_size: 5,
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_delay_arithmetic() {
        let mut gate = RenderGate::new(Duration::from_millis(100));
        let t0 = Instant::now();
        assert_eq!(gate.delay_until_due(t0), Duration::ZERO);

        gate.mark_drawn(t0);
        assert_eq!(gate.delay_until_due(t0), Duration::from_millis(100));
        assert_eq!(
            gate.delay_until_due(t0 + Duration::from_millis(40)),
            Duration::from_millis(60)
        );
        assert_eq!(
            gate.delay_until_due(t0 + Duration::from_millis(100)),
            Duration::ZERO
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_draws_coalesce_and_keep_latest_state() {
        let cfg = Arc::new(AppConfig::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let points = Arc::new(AtomicU64::new(111));
        let frames: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));

        let snapshot_points = points.clone();
        let sink_frames = frames.clone();
        let handle = tokio::spawn(render_loop(
            cfg,
            rx,
            shutdown_rx,
            move || DashboardSnapshot {
                rows: vec![row(0, snapshot_points.load(Ordering::SeqCst))],
                view: ViewState {
                    selected: 0,
                    page: 0,
                    page_size: 5,
                },
            },
            move |frame| sink_frames.lock().unwrap().push(frame.to_string()),
        ));

        // First request draws immediately.
        tx.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(frames.lock().unwrap().len(), 1);

        // A burst inside the window coalesces into one trailing draw that
        // sees the newest state.
        points.store(222, Ordering::SeqCst);
        for _ in 0..10 {
            tx.send(()).unwrap();
        }
        tokio::time::sleep(Duration::from_millis(250)).await;

        let drawn = frames.lock().unwrap();
        assert_eq!(drawn.len(), 2);
        assert!(drawn.last().unwrap().contains("222"));
        drop(drawn);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[test]
    fn test_frame_shows_only_current_page() {
        let cfg = AppConfig::default();
        // 12 wallets, page 2 holds indices 10 and 11.
        let frame = render_frame(&snapshot_with(12, 2), &cfg);

        assert!(frame.contains(&short_address(&format!("0x{:040x}", 10))));
        assert!(frame.contains(&short_address(&format!("0x{:040x}", 11))));
        assert!(!frame.contains(&short_address(&format!("0x{:040x}", 0))));
        assert!(frame.contains("Page 3/3"));
    }

    #[test]
    fn test_frame_footer_and_fallbacks() {
        let cfg = AppConfig::default();
        let frame = render_frame(&snapshot_with(1, 0), &cfg);

        assert!(frame.contains("Ping Interval: 30s"));
        assert!(frame.contains("Never Claimed"));
        assert!(frame.contains("Page 1/1"));
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x7E5F4552091A69125d5DfCb7b8C2659029395Bdf"),
            "0x7E5F...5Bdf"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }
}
