//! Full-screen terminal browsers.
//!
//! Keys are read on a blocking thread and forwarded over a channel; the
//! async loop selects between key input and fetch completions so a slow
//! backend never stalls the keyboard.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bessie_client::{ClientConfig, TimingReporter};
use bessie_core::{
    GalleryEvent, GallerySession, ImageRecord, ImageSource, Key, Layer, Mode, SheetEvent,
    ViewerSession,
};
use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind, KeyModifiers,
    MouseButton, MouseEventKind,
};
use crossterm::style::Print;
use crossterm::terminal::{
    self, disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use crossterm::{execute, queue};
use tokio::sync::mpsc;

use crate::commands::summary;

/// Rows above the grid in the contact sheet.
const SHEET_HEADER_ROWS: u16 = 2;
const CELL_WIDTH: u16 = 20;

enum Input {
    Key(Key),
    /// Left click at terminal column, row.
    Click(u16, u16),
    Quit,
}

fn map_key(code: KeyCode, modifiers: KeyModifiers) -> Option<Input> {
    let key = match code {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Some(Input::Quit),
        KeyCode::Char('q') => return Some(Input::Quit),
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Esc => Key::Escape,
        KeyCode::Enter => Key::Enter,
        KeyCode::PageUp => Key::PageUp,
        KeyCode::PageDown => Key::PageDown,
        KeyCode::Char(c) => Key::Char(c),
        _ => return None,
    };
    Some(Input::Key(key))
}

/// Forward terminal input until the receiver goes away.
fn spawn_input_reader() -> mpsc::UnboundedReceiver<Input> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        while !tx.is_closed() {
            match event::poll(Duration::from_millis(100)) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "terminal input unavailable");
                    break;
                }
            }
            let input = match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                    map_key(key.code, key.modifiers)
                }
                Ok(Event::Mouse(mouse)) if mouse.kind == MouseEventKind::Down(MouseButton::Left) => {
                    Some(Input::Click(mouse.column, mouse.row))
                }
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal read failed");
                    break;
                }
            };
            if let Some(input) = input {
                if tx.send(input).is_err() {
                    break;
                }
            }
        }
    });
    rx
}

/// Raw mode and the alternate screen for as long as it lives.
struct Screen {
    out: Stdout,
}

impl Screen {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, EnableMouseCapture, Hide)?;
        Ok(Self { out })
    }

    fn draw(&mut self, lines: &[String]) -> Result<()> {
        let (width, height) = terminal::size().unwrap_or((80, 24));
        queue!(self.out, Clear(ClearType::All))?;
        for (row, line) in lines.iter().take(usize::from(height)).enumerate() {
            let clipped: String = line.chars().take(usize::from(width)).collect();
            queue!(self.out, MoveTo(0, row as u16), Print(clipped))?;
        }
        self.out.flush()?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = execute!(self.out, Show, DisableMouseCapture, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

// ── Viewer ────────────────────────────────────────────────────────────

pub async fn view<S: ImageSource>(
    source: Arc<S>,
    config: &ClientConfig,
    reporter: TimingReporter,
) -> Result<()> {
    let mut session = ViewerSession::new(source, config.loader_config());
    let mut input = spawn_input_reader();
    let mut screen = Screen::enter()?;

    session.start();
    screen.draw(&viewer_lines(&session))?;

    loop {
        tokio::select! {
            next = input.recv() => match next {
                Some(Input::Key(key)) => {
                    session.handle_key(key);
                }
                Some(Input::Click(..)) => {}
                Some(Input::Quit) | None => break,
            },
            Some(done) = session.next_completion(), if session.outstanding() > 0 => {
                session.apply(done);
            }
        }

        for timing in session.take_timings() {
            let reporter = reporter.clone();
            tokio::spawn(async move { reporter.report(&timing).await });
        }
        screen.draw(&viewer_lines(&session))?;
    }

    session.dispose();
    Ok(())
}

fn viewer_lines<S: ImageSource>(session: &ViewerSession<S>) -> Vec<String> {
    let loader = session.loader();
    let total = loader
        .total()
        .map_or_else(|| "?".to_string(), |t| t.to_string());
    let mut lines = vec![format!(
        "bessie viewer   {}/{} loaded of {}{}",
        if loader.is_empty() { 0 } else { session.cursor() + 1 },
        loader.len(),
        total,
        if session.is_loading() { "   loading…" } else { "" }
    )];
    lines.push(String::new());

    match session.current() {
        Some(record) => {
            let marker = if session.is_zoomed() { "[zoomed] " } else { "" };
            lines.push(format!("{marker}{}", record.original_name));
            lines.extend(record_lines(record));
        }
        None if session.is_loading() => lines.push("Loading…".into()),
        None => lines.push("No images".into()),
    }

    if let bessie_core::FetchState::Failure(err) = loader.last_outcome() {
        lines.push(String::new());
        lines.push(format!("last fetch failed: {err}"));
    }
    lines.push(String::new());
    lines.push("←/→ navigate   space zoom   esc unzoom   q quit".into());
    lines
}

// ── Contact sheet ─────────────────────────────────────────────────────

pub async fn gallery<S: ImageSource>(source: Arc<S>, config: &ClientConfig, mode: Mode) -> Result<()> {
    let mut sheet = GallerySession::new(source, config.gallery_config(), config.grid_columns);
    let mut input = spawn_input_reader();
    let mut screen = Screen::enter()?;
    let mut status = String::new();

    sheet.start(mode);
    screen.draw(&sheet_lines(&sheet, &status))?;

    loop {
        tokio::select! {
            next = input.recv() => match next {
                Some(Input::Key(key)) => {
                    sheet.handle_key(key);
                }
                Some(Input::Click(column, row)) => {
                    if let Some(index) = cell_at(column, row, sheet.columns()) {
                        sheet.click(index);
                    }
                }
                Some(Input::Quit) | None => break,
            },
            Some(done) = sheet.next_completion(), if sheet.outstanding() > 0 => {
                sheet.apply(done);
            }
        }

        for event in sheet.take_events() {
            match event {
                SheetEvent::Gallery(GalleryEvent::LoadFailed(err)) => {
                    status = format!("load failed: {err}");
                }
                SheetEvent::Gallery(GalleryEvent::ModeChanged(mode)) => {
                    status = format!("{mode} order");
                }
                SheetEvent::OpenDetail(id) => {
                    status = match sheet.source().fetch_image(&id).await {
                        Ok(record) => detail_line(&record),
                        Err(err) => format!("{id}: {err}"),
                    };
                }
                _ => {}
            }
        }
        screen.draw(&sheet_lines(&sheet, &status))?;
    }

    sheet.dispose();
    Ok(())
}

/// Grid cell under a click, if any.
fn cell_at(column: u16, row: u16, columns: usize) -> Option<usize> {
    let row = row.checked_sub(SHEET_HEADER_ROWS)?;
    let col = usize::from(column / CELL_WIDTH);
    if col >= columns {
        return None;
    }
    Some(usize::from(row) * columns + col)
}

fn sheet_lines<S: ImageSource>(sheet: &GallerySession<S>, status: &str) -> Vec<String> {
    let g = sheet.gallery();
    let mut lines = vec![
        format!(
            "bessie {}   page {}/{}   {} images{}",
            g.mode(),
            g.current_page(),
            g.page_count(),
            g.total(),
            if g.is_loading() { "   loading…" } else { "" }
        ),
        String::new(),
    ];

    if sheet.live_layer() == Layer::Modal {
        if let Some(record) = sheet.modal_index().and_then(|i| sheet.visible().get(i)) {
            lines.push(format!("▶ {}", record.original_name));
            lines.extend(record_lines(record));
        }
        lines.push(String::new());
        lines.push("←/→ cycle   enter details   esc/space close".into());
    } else {
        let width = usize::from(CELL_WIDTH);
        for (r, row) in sheet.visible().chunks(sheet.columns()).enumerate() {
            let mut line = String::new();
            for (c, record) in row.iter().enumerate() {
                let index = r * sheet.columns() + c;
                let name: String = record.original_name.chars().take(width - 3).collect();
                let cell = if index == sheet.cursor() {
                    format!("[{name}]")
                } else {
                    format!(" {name} ")
                };
                line.push_str(&format!("{cell:<width$}"));
            }
            lines.push(line);
        }
        if sheet.visible().is_empty() && !g.is_loading() {
            lines.push("No images".into());
        }
        lines.push(String::new());
        lines.push(
            "arrows select   space open   enter details   c/n mode   pgup/pgdn page   q quit"
                .into(),
        );
    }
    if !status.is_empty() {
        lines.push(status.to_string());
    }
    lines
}

fn record_lines(record: &ImageRecord) -> Vec<String> {
    let mut lines = vec![format!("  id:   {}", record.id), format!("  url:  {}", record.url)];
    if let Some((lat, lon)) = record.location() {
        lines.push(format!("  gps:  {lat:.6}, {lon:.6}"));
    }
    lines
}

fn detail_line(record: &ImageRecord) -> String {
    format!("{} ({})", summary(record), record.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_mapping() {
        assert!(matches!(
            map_key(KeyCode::Char('q'), KeyModifiers::NONE),
            Some(Input::Quit)
        ));
        assert!(matches!(
            map_key(KeyCode::Char('c'), KeyModifiers::CONTROL),
            Some(Input::Quit)
        ));
        assert!(matches!(
            map_key(KeyCode::Char('c'), KeyModifiers::NONE),
            Some(Input::Key(Key::Char('c')))
        ));
        assert!(matches!(
            map_key(KeyCode::Esc, KeyModifiers::NONE),
            Some(Input::Key(Key::Escape))
        ));
        assert!(map_key(KeyCode::F(1), KeyModifiers::NONE).is_none());
    }

    #[test]
    fn test_click_maps_to_grid_cell() {
        assert_eq!(cell_at(0, 2, 6), Some(0));
        assert_eq!(cell_at(45, 3, 6), Some(8));
        assert_eq!(cell_at(5, 1, 6), None);
        assert_eq!(cell_at(130, 2, 6), None);
    }
}
