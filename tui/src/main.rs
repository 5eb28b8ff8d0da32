use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use parking_lot::Mutex;
use ratatui::{
    DefaultTerminal,
    buffer::Buffer,
    crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    layout::{Constraint, Layout, Rect},
    style::{
        Color, Style, Stylize,
        palette::tailwind::{BLUE, GREEN, RED, SLATE, YELLOW},
    },
    symbols,
    text::{Line, Span},
    widgets::{Block, Borders, Padding, Paragraph, Widget},
};
use smartroom_client_rs::{
    DEFAULT_POLL_INTERVAL, LIGHT_STATUS_PATH, LightSnapshot, LogConfig, StatusUpdate, StoreClient,
    StoreOptions, SyncController, SyncObserver, SyncPhase, init_file_logging,
};
use std::sync::Arc;
use std::time::Duration;

const PANEL_HEADER_STYLE: Style = Style::new().fg(SLATE.c100).bg(BLUE.c800);
const PANEL_BG: Color = SLATE.c950;
const TEXT_FG_COLOR: Color = SLATE.c200;
const DIM_FG_COLOR: Color = SLATE.c500;
const ONLINE_FG_COLOR: Color = GREEN.c500;
const OFFLINE_FG_COLOR: Color = RED.c500;
const LIT_FG_COLOR: Color = YELLOW.c400;
const ALERT_FG_COLOR: Color = RED.c400;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
struct Params {
    /// Base URL of the cloud document store
    #[arg(long, env = "SMARTROOM_DB_URL")]
    db_url: String,
    /// Auth secret appended to every request
    #[arg(long, env = "SMARTROOM_DB_SECRET", hide_env_values = true)]
    db_secret: String,
    /// Document path of the light fixture
    #[arg(long, default_value = LIGHT_STATUS_PATH)]
    path: String,
    /// Poll interval in milliseconds
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,
    /// Log directory (the terminal itself belongs to the dashboard)
    #[arg(long)]
    log_dir: Option<String>,
}

/// Collects alerts raised by the controller so the render loop can show
/// them on the next frame.
#[derive(Default)]
struct AlertSink {
    message: Mutex<Option<String>>,
}

impl AlertSink {
    fn take(&self) -> Option<String> {
        self.message.lock().take()
    }
}

#[async_trait]
impl StatusUpdate for AlertSink {
    async fn status_update(&self, _snapshot: &LightSnapshot) {}

    async fn write_failed(&self, message: &str) {
        *self.message.lock() = Some(message.to_string());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().expect("Failed to install Color Eyre");
    let params = Params::parse();
    let _log_guard = match &params.log_dir {
        Some(log_dir) => Some(init_file_logging(LogConfig {
            log_dir: log_dir.clone(),
            prefix: "smartroom-tui".to_string(),
            ..LogConfig::default()
        })?),
        None => None,
    };

    let alerts = Arc::new(AlertSink::default());
    let options = StoreOptions::builder()
        .base_url(params.db_url)
        .secret(params.db_secret)
        .document_path(params.path)
        .build()?;
    let client = StoreClient::new(options)?;
    let controller = SyncController::new(
        Arc::new(client),
        Some(alerts.clone() as SyncObserver),
    );
    controller.start_polling(Duration::from_millis(params.interval_ms));

    let terminal = ratatui::init();
    let app_result = App::new(controller.clone(), alerts).run(terminal);
    ratatui::restore();
    controller.stop_polling();
    app_result
}

struct App {
    should_exit: bool,
    controller: SyncController,
    alerts: Arc<AlertSink>,
    alert: Option<String>,
    snapshot: LightSnapshot,
}

impl App {
    fn new(controller: SyncController, alerts: Arc<AlertSink>) -> Self {
        let snapshot = controller.snapshot();
        Self {
            should_exit: false,
            controller,
            alerts,
            alert: None,
            snapshot,
        }
    }

    fn run(mut self, mut terminal: DefaultTerminal) -> Result<()> {
        while !self.should_exit {
            if let Some(message) = self.alerts.take() {
                self.alert = Some(message);
            }
            self.snapshot = self.controller.snapshot();
            terminal.draw(|frame| frame.render_widget(&mut self, frame.area()))?;
            if event::poll(REDRAW_INTERVAL)?
                && let Event::Key(key) = event::read()?
            {
                self.handle_key(key);
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        // Any keypress dismisses a pending alert.
        self.alert = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_exit = true,
            KeyCode::Char('t') | KeyCode::Char(' ') | KeyCode::Enter => self.request_toggle(),
            KeyCode::Char('r') => self.request_refresh(),
            _ => {}
        }
    }

    fn request_toggle(&mut self) {
        if self.snapshot.phase() != SyncPhase::Synced {
            self.alert = Some("Device offline, command not sent.".to_string());
            return;
        }
        let controller = self.controller.clone();
        tokio::spawn(async move {
            controller.toggle().await;
        });
    }

    fn request_refresh(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            controller.poll_once().await;
        });
    }
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let [header_area, main_area, footer_area] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Fill(1),
            Constraint::Length(2),
        ])
        .areas(area);

        self.render_header(header_area, buf);
        self.render_light(main_area, buf);
        self.render_footer(footer_area, buf);
    }
}

/// Rendering logic for the app
impl App {
    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        let link = if self.snapshot.connected {
            Span::styled("● ONLINE", ONLINE_FG_COLOR)
        } else {
            Span::styled("● OFFLINE", OFFLINE_FG_COLOR)
        };
        let title = Line::from(vec![
            Span::styled("Smart Room", Style::new().fg(TEXT_FG_COLOR).bold()),
            Span::raw("   "),
            link,
        ]);
        Paragraph::new(title).centered().render(area, buf);
    }

    fn render_light(&self, area: Rect, buf: &mut Buffer) {
        let block = Block::new()
            .title(Line::raw("Living Room Light").centered())
            .borders(Borders::TOP)
            .border_set(symbols::border::EMPTY)
            .border_style(PANEL_HEADER_STYLE)
            .bg(PANEL_BG)
            .padding(Padding::vertical(1));

        let lines = match self.snapshot.phase() {
            SyncPhase::Loading => vec![
                Line::styled("○", DIM_FG_COLOR),
                Line::raw(""),
                Line::styled("Loading...", TEXT_FG_COLOR),
                Line::styled("Connecting to system...", DIM_FG_COLOR),
            ],
            _ => {
                let (bulb, status, detail, color) = if self.snapshot.power {
                    ("◉", "LIGHT ON", "System Active", LIT_FG_COLOR)
                } else {
                    ("○", "LIGHT OFF", "Standby Mode", DIM_FG_COLOR)
                };
                let button = if !self.snapshot.connected {
                    Line::styled("[t] unavailable", DIM_FG_COLOR)
                } else if self.snapshot.power {
                    Line::styled("[t] TURN OFF", OFFLINE_FG_COLOR)
                } else {
                    Line::styled("[t] TURN ON", ONLINE_FG_COLOR)
                };
                vec![
                    Line::styled(bulb, color),
                    Line::raw(""),
                    Line::styled(status, Style::new().fg(TEXT_FG_COLOR).bold()),
                    Line::styled(detail, DIM_FG_COLOR),
                    Line::raw(""),
                    button,
                ]
            }
        };

        Paragraph::new(lines)
            .block(block)
            .centered()
            .render(area, buf);
    }

    fn render_footer(&self, area: Rect, buf: &mut Buffer) {
        if let Some(alert) = &self.alert {
            Paragraph::new(Line::styled(alert.as_str(), ALERT_FG_COLOR))
                .centered()
                .render(area, buf);
            return;
        }
        let stats = format!(
            "Mode: REST API | state: {} | polls: {} (failed: {}) | IoT Dashboard v1.0",
            self.snapshot.phase().as_str(),
            self.snapshot.poll_count,
            self.snapshot.poll_failures
        );
        let help = "t toggle, r refresh, q quit";
        Paragraph::new(vec![
            Line::styled(stats, DIM_FG_COLOR),
            Line::styled(help, DIM_FG_COLOR),
        ])
        .centered()
        .render(area, buf);
    }
}
