mod logging;
mod worker;

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use futures::StreamExt;
use rag::{Config, Hit, Message, Role};
use ratatui::{Frame, Terminal};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Margin, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::worker::{Request, Update, run_session};

const TITLE: &str = "re:Connect, next gen AI therapist";
const INPUT_PLACEHOLDER: &str = "Feel free to talk about anything!";
const ABOUT_TEXT: &str = "\
re:Connect is an AI companion for mental health support. It specializes in two \
therapeutic frameworks, Cognitive Behavioral Therapy (CBT) and Narrative Therapy, \
to give empathetic and personalized responses.

How to use re:Connect

Talk with re:Connect in any way you want. It is here to listen and help where it can.

Replies draw on a curated library of documents about hikikomori and social withdrawal. \
The Sources panel lists the passages used for the latest reply.";

#[tokio::main]
async fn main() -> io::Result<()> {
    let cfg = match Config::from_env() {
        Ok(cfg) => Arc::new(cfg),
        Err(err) => {
            eprintln!("re:Connect cannot start: {}", err);
            std::process::exit(1);
        }
    };
    logging::init(&cfg.log_dir);
    info!(config = ?cfg, "starting re:Connect");

    let (req_tx, req_rx) = mpsc::unbounded_channel::<Request>();
    let (upd_tx, upd_rx) = mpsc::unbounded_channel::<Update>();
    let worker_cfg = cfg.clone();
    // A plain thread, so quitting never waits on an in-flight HTTP call.
    thread::Builder::new()
        .name("session".to_string())
        .spawn(move || run_session(worker_cfg, req_rx, upd_tx))?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let res = run_app(&mut terminal, &mut app, req_tx, upd_rx).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = &res {
        error!(error = %err, "terminal loop failed");
    }
    res
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Status {
    Connecting,
    Ready,
    Generating,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SidePanel {
    Sources,
    About,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFocus {
    Transcript,
    Side,
}

struct App {
    input: String,
    /// Cursor position in chars.
    cursor: usize,
    transcript: Vec<Message>,
    streaming: Option<String>,
    sources: Vec<Hit>,
    index_name: Option<String>,
    last_error: Option<String>,
    status: Status,
    side_panel: SidePanel,
    output_focus: OutputFocus,
    transcript_scroll: usize,
    transcript_content_len: usize,
    transcript_view_height: usize,
    transcript_auto_scroll: bool,
    side_scroll: usize,
    side_content_len: usize,
    side_view_height: usize,
    spinner_idx: usize,
}

impl App {
    fn new() -> Self {
        Self {
            input: String::new(),
            cursor: 0,
            transcript: Vec::new(),
            streaming: None,
            sources: Vec::new(),
            index_name: None,
            last_error: None,
            status: Status::Connecting,
            side_panel: SidePanel::Sources,
            output_focus: OutputFocus::Transcript,
            transcript_scroll: 0,
            transcript_content_len: 0,
            transcript_view_height: 0,
            transcript_auto_scroll: true,
            side_scroll: 0,
            side_content_len: 0,
            side_view_height: 0,
            spinner_idx: 0,
        }
    }

    fn is_busy(&self) -> bool {
        self.status != Status::Ready
    }

    fn byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn insert_char(&mut self, c: char) {
        let idx = self.byte_index();
        self.input.insert(idx, c);
        self.cursor += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index();
        self.input.remove(idx);
    }

    fn move_left(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
    }

    fn move_right(&mut self) {
        if self.cursor < self.input.chars().count() {
            self.cursor += 1;
        }
    }

    fn submit(&mut self, tx: &mpsc::UnboundedSender<Request>) {
        if self.input.trim().is_empty() || self.is_busy() {
            return;
        }
        let prompt = std::mem::take(&mut self.input);
        self.cursor = 0;
        self.start_turn();
        let _ = tx.send(Request::Submit(prompt));
    }

    /// Re-attempts a reply for a user message left unanswered by a failure.
    fn retry(&mut self, tx: &mpsc::UnboundedSender<Request>) {
        let pending = self.transcript.last().is_some_and(|m| m.role == Role::User);
        if !pending || self.is_busy() {
            return;
        }
        self.start_turn();
        let _ = tx.send(Request::Retry);
    }

    fn start_turn(&mut self) {
        self.status = Status::Generating;
        self.last_error = None;
        self.streaming = None;
        self.transcript_auto_scroll = true;
    }

    fn apply(&mut self, update: Update) {
        match update {
            Update::Connecting => self.status = Status::Connecting,
            Update::Connected(name) => {
                self.index_name = Some(name);
                self.status = Status::Ready;
            }
            Update::Transcript(messages) => {
                self.transcript = messages;
                self.streaming = None;
            }
            Update::Fragment(fragment) => {
                self.streaming.get_or_insert_with(String::new).push_str(&fragment);
            }
            Update::Finished(sources) => {
                self.sources = sources;
                self.side_scroll = 0;
                self.status = Status::Ready;
            }
            Update::Failed(err) => {
                self.streaming = None;
                self.last_error = Some(err);
                self.status = Status::Ready;
            }
            Update::Rejected(err) => {
                self.last_error = Some(err);
                self.status = Status::Ready;
            }
            Update::Idle => self.status = Status::Ready,
        }
        self.transcript_auto_scroll = true;
    }

    fn scroll_up(&mut self, by: usize) {
        match self.output_focus {
            OutputFocus::Transcript => {
                self.transcript_scroll = self.transcript_scroll.saturating_sub(by);
            }
            OutputFocus::Side => {
                self.side_scroll = self.side_scroll.saturating_sub(by);
            }
        }
    }

    fn scroll_down(&mut self, by: usize) {
        match self.output_focus {
            OutputFocus::Transcript => {
                let max_scroll = self
                    .transcript_content_len
                    .saturating_sub(self.transcript_view_height);
                self.transcript_scroll = (self.transcript_scroll + by).min(max_scroll);
            }
            OutputFocus::Side => {
                let max_scroll = self.side_content_len.saturating_sub(self.side_view_height);
                self.side_scroll = (self.side_scroll + by).min(max_scroll);
            }
        }
    }

    fn scroll_to_start(&mut self) {
        match self.output_focus {
            OutputFocus::Transcript => self.transcript_scroll = 0,
            OutputFocus::Side => self.side_scroll = 0,
        }
    }

    fn scroll_to_end(&mut self) {
        match self.output_focus {
            OutputFocus::Transcript => {
                self.transcript_scroll = self
                    .transcript_content_len
                    .saturating_sub(self.transcript_view_height);
            }
            OutputFocus::Side => {
                self.side_scroll = self.side_content_len.saturating_sub(self.side_view_height);
            }
        }
    }

    fn focused_view_height(&self) -> usize {
        match self.output_focus {
            OutputFocus::Transcript => self.transcript_view_height,
            OutputFocus::Side => self.side_view_height,
        }
    }
}

fn inner_width(area: Rect) -> usize {
    area.width.saturating_sub(2) as usize
}

fn inner_height(area: Rect) -> usize {
    area.height.saturating_sub(2) as usize
}

/// Start of the visible input window, in chars, keeping the cursor in view.
fn input_window_start(len: usize, cursor: usize, max_width: usize) -> usize {
    if len <= max_width {
        return 0;
    }
    let cursor = cursor.min(len);
    let start = cursor.saturating_sub(max_width / 2);
    start.min(len - max_width)
}

fn truncate_input(input: &str, cursor: usize, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    let len = input.chars().count();
    let start = input_window_start(len, cursor, max_width);
    input.chars().skip(start).take(max_width).collect()
}

fn cursor_x_in_view(input: &str, cursor: usize, max_width: usize) -> usize {
    if max_width == 0 {
        return 0;
    }
    let len = input.chars().count();
    let start = input_window_start(len, cursor, max_width);
    cursor.min(len).saturating_sub(start).min(max_width)
}

fn message_lines(role: Role, content: &str, lines: &mut Vec<Line<'static>>) {
    let (name, name_style, text_style) = match role {
        Role::Assistant => (
            "re:Connect",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::Blue),
        ),
        Role::User => (
            "You",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            Style::default().fg(Color::DarkGray),
        ),
    };
    lines.push(Line::from(Span::styled(name, name_style)));
    for text in content.lines() {
        lines.push(Line::from(Span::styled(text.to_string(), text_style)));
    }
    lines.push(Line::default());
}

fn transcript_lines(app: &App) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for message in &app.transcript {
        message_lines(message.role, &message.content, &mut lines);
    }
    if let Some(partial) = &app.streaming {
        message_lines(Role::Assistant, &format!("{}▌", partial), &mut lines);
    }
    if let Some(err) = &app.last_error {
        lines.push(Line::from(Span::styled(
            format!("Error: {}", err),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        if app.transcript.last().is_some_and(|m| m.role == Role::User) {
            lines.push(Line::from(Span::styled(
                "Press Ctrl+R to try again.",
                Style::default().fg(Color::Red),
            )));
        }
    }
    lines
}

fn sources_text(sources: &[Hit]) -> String {
    if sources.is_empty() {
        return "Passages used for a reply will appear here.".to_string();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, hit)| format!("[{}] score {:.3}\n{}", i + 1, hit.score, hit.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn focus_marker(app: &App, focus: OutputFocus) -> &'static str {
    if app.output_focus == focus { " *" } else { "" }
}

fn draw_ui(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>, app: &mut App) -> io::Result<()> {
    terminal.draw(|frame| render(frame, app))?;
    Ok(())
}

fn render(frame: &mut Frame, app: &mut App) {
    let spinner = ["|", "/", "-", "\\"];

    let title_style = Style::default().fg(Color::Black).add_modifier(Modifier::BOLD);
    let info_border = Style::default().fg(Color::Black);
    let input_border = Style::default().fg(Color::DarkGray);
    let help_text_style = Style::default().fg(Color::DarkGray);
    let side_text_style = Style::default().fg(Color::Blue);

    let area = frame.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(area);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
        .split(chunks[1]);

    let status_text = match app.status {
        Status::Connecting => format!(
            "{} re:Connect is waking up - hang tight!",
            spinner[app.spinner_idx]
        ),
        Status::Generating => format!("{} Generating response...", spinner[app.spinner_idx]),
        Status::Ready => match &app.index_name {
            Some(name) => format!("Connected to {}", name),
            None => "Not connected yet; the next message will try again.".to_string(),
        },
    };
    let header = Paragraph::new(status_text)
        .style(help_text_style)
        .block(
            Block::bordered()
                .title(TITLE)
                .title_style(title_style)
                .border_style(info_border),
        );
    frame.render_widget(header, chunks[0]);

    // Content length is counted in wrapped rows, so the tail of a long
    // reply stays reachable.
    let transcript = Paragraph::new(transcript_lines(app)).wrap(Wrap { trim: false });
    app.transcript_content_len = transcript.line_count(inner_width(body[0]) as u16).max(1);
    app.transcript_view_height = inner_height(body[0]);
    let max_scroll = app
        .transcript_content_len
        .saturating_sub(app.transcript_view_height);
    if app.transcript_auto_scroll {
        app.transcript_scroll = max_scroll;
        app.transcript_auto_scroll = false;
    } else if app.transcript_scroll > max_scroll {
        app.transcript_scroll = max_scroll;
    }

    let transcript_block = Block::bordered()
        .title(format!("Conversation{}", focus_marker(app, OutputFocus::Transcript)))
        .title_style(title_style)
        .border_style(info_border);
    let transcript = transcript
        .scroll((app.transcript_scroll as u16, 0))
        .block(transcript_block);
    frame.render_widget(transcript, body[0]);

    let mut transcript_scrollbar =
        ScrollbarState::new(app.transcript_content_len).position(app.transcript_scroll);
    let transcript_scrollbar_widget = Scrollbar::new(ScrollbarOrientation::VerticalRight)
        .track_style(Style::default().fg(Color::DarkGray))
        .thumb_style(Style::default().fg(Color::Blue));
    frame.render_stateful_widget(
        transcript_scrollbar_widget,
        body[0].inner(Margin {
            vertical: 1,
            horizontal: 0,
        }),
        &mut transcript_scrollbar,
    );

    let (side_title, side_text) = match app.side_panel {
        SidePanel::Sources => ("Sources", sources_text(&app.sources)),
        SidePanel::About => ("About", ABOUT_TEXT.to_string()),
    };
    let side = Paragraph::new(side_text)
        .style(side_text_style)
        .wrap(Wrap { trim: true });
    app.side_content_len = side.line_count(inner_width(body[1]) as u16).max(1);
    app.side_view_height = inner_height(body[1]);
    app.side_scroll = app
        .side_scroll
        .min(app.side_content_len.saturating_sub(app.side_view_height));
    let side = side
        .scroll((app.side_scroll as u16, 0))
        .block(
            Block::bordered()
                .title(format!("{}{}", side_title, focus_marker(app, OutputFocus::Side)))
                .title_style(title_style)
                .border_style(info_border),
        );
    frame.render_widget(side, body[1]);

    let input_block = Block::bordered()
        .title("Message")
        .title_style(title_style)
        .border_style(input_border);
    let input = if app.input.is_empty() {
        Paragraph::new(INPUT_PLACEHOLDER).style(help_text_style)
    } else {
        Paragraph::new(truncate_input(&app.input, app.cursor, inner_width(chunks[2])))
            .style(Style::default().fg(Color::Reset))
    };
    frame.render_widget(input.block(input_block), chunks[2]);

    let cursor_x = cursor_x_in_view(&app.input, app.cursor, inner_width(chunks[2]));
    frame.set_cursor_position((chunks[2].x + 1 + cursor_x as u16, chunks[2].y + 1));

    let help = Paragraph::new(
        "Enter: Send | Ctrl+R: Retry | F1: About/Sources | Ctrl+O: Focus | Up/Down/PgUp/PgDn/Home/End: Scroll | Esc/Ctrl+C: Quit",
    )
    .style(help_text_style)
    .wrap(Wrap { trim: true })
    .block(
        Block::bordered()
            .title("Controls")
            .title_style(title_style)
            .border_style(input_border),
    );
    frame.render_widget(help, chunks[3]);
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tx: mpsc::UnboundedSender<Request>,
    mut rx: mpsc::UnboundedReceiver<Update>,
) -> io::Result<()> {
    let mut events = EventStream::new();
    let mut spinner_tick = tokio::time::interval(Duration::from_millis(100));
    spinner_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    draw_ui(terminal, app)?;

    loop {
        tokio::select! {
            _ = spinner_tick.tick() => {
                if app.is_busy() {
                    app.spinner_idx = (app.spinner_idx + 1) % 4;
                    draw_ui(terminal, app)?;
                }
            }
            maybe_update = rx.recv() => {
                match maybe_update {
                    Some(update) => {
                        app.apply(update);
                        draw_ui(terminal, app)?;
                    }
                    None => return Ok(()),
                }
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => {
                        match key.code {
                            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                            KeyCode::Char('r') if key.modifiers.contains(KeyModifiers::CONTROL) => app.retry(&tx),
                            KeyCode::Char('o') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                                app.output_focus = match app.output_focus {
                                    OutputFocus::Transcript => OutputFocus::Side,
                                    OutputFocus::Side => OutputFocus::Transcript,
                                };
                            }
                            KeyCode::F(1) => {
                                app.side_panel = match app.side_panel {
                                    SidePanel::Sources => SidePanel::About,
                                    SidePanel::About => SidePanel::Sources,
                                };
                                app.side_scroll = 0;
                            }
                            KeyCode::Esc => return Ok(()),
                            KeyCode::Enter => app.submit(&tx),
                            KeyCode::Up => app.scroll_up(1),
                            KeyCode::Down => app.scroll_down(1),
                            KeyCode::PageUp => app.scroll_up(app.focused_view_height().max(1)),
                            KeyCode::PageDown => app.scroll_down(app.focused_view_height().max(1)),
                            KeyCode::Home => app.scroll_to_start(),
                            KeyCode::End => app.scroll_to_end(),
                            KeyCode::Left => app.move_left(),
                            KeyCode::Right => app.move_right(),
                            KeyCode::Backspace => app.delete_char(),
                            KeyCode::Char(ch) => app.insert_char(ch),
                            _ => {}
                        }
                        draw_ui(terminal, app)?;
                    }
                    Some(Ok(Event::Resize(_, _))) => draw_ui(terminal, app)?,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => {}
                    None => return Ok(()),
                }
            }
        }
    }
}
