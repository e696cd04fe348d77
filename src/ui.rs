use crate::{
    controller::{
        Action,
        ActionAvailability,
        AppSnapshot,
    },
    ledger::ItemId,
    notifications::{
        Notification,
        Severity,
    },
    units,
};
use alloy::primitives::Address;
use color_eyre::eyre::Result;
use crossterm::{
    event::{
        Event,
        EventStream,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use itertools::Itertools;
use ratatui::{
    prelude::*,
    widgets::*,
};
use std::io::stdout;
use unicode_width::UnicodeWidthChar;

pub const TITLE: &str = "Lottery - Ballot";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Redraw,
    Action(Action),
    NextAccount,
    OpenOwnerModal,
    OwnerInput(char),
    OwnerBackspace,
    CancelOwner,
    DismissNotification,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
enum Mode {
    #[default]
    Normal,
    ChangeOwner,
    QuitModal,
}

#[derive(Debug, Default)]
pub struct UiState {
    mode: Mode,
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;
    // Kept across draws so ratatui can diff against the previous frame.
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(
        std::io::stdout(),
        crossterm::event::DisableMouseCapture,
        crossterm::terminal::LeaveAlternateScreen
    )?;
    Ok(())
}

pub fn input_event_stream() -> EventStream {
    EventStream::new()
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    if let Some(mut term) = state.terminal.take() {
        let drawn = term.draw(|f| ui(f, state, snap)).map(drop);
        state.terminal = Some(term);
        drawn?;
    }
    Ok(())
}

/// Maps a terminal event to a user intent, updating modal state on the way.
pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let k = match event {
        Event::Key(k) if k.kind == KeyEventKind::Press => k,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    // Raw mode swallows SIGINT, so Ctrl-C arrives as a key.
    if k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }

    match state.mode {
        Mode::ChangeOwner => match k.code {
            KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::CancelOwner)
            }
            KeyCode::Enter => {
                state.mode = Mode::Normal;
                Some(UserEvent::Action(Action::ChangeOwner))
            }
            KeyCode::Backspace => Some(UserEvent::OwnerBackspace),
            KeyCode::Char(c) => Some(UserEvent::OwnerInput(c)),
            _ => None,
        },
        Mode::QuitModal => match k.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(UserEvent::Quit),
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                state.mode = Mode::Normal;
                Some(UserEvent::Redraw)
            }
            _ => None,
        },
        Mode::Normal => match k.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                state.mode = Mode::QuitModal;
                Some(UserEvent::Redraw)
            }
            KeyCode::Char(c @ '1'..='3') => {
                let index = c as usize - '1' as usize;
                ItemId::new(index).map(|item| UserEvent::Action(Action::Bid(item)))
            }
            KeyCode::Char('w') => Some(UserEvent::Action(Action::DeclareWinners)),
            KeyCode::Char('c') => Some(UserEvent::Action(Action::CheckWinner)),
            KeyCode::Char('d') => Some(UserEvent::Action(Action::Withdraw)),
            KeyCode::Char('r') => Some(UserEvent::Action(Action::Reset)),
            KeyCode::Char('x') => Some(UserEvent::Action(Action::Destroy)),
            KeyCode::Char('o') => {
                state.mode = Mode::ChangeOwner;
                Some(UserEvent::OpenOwnerModal)
            }
            KeyCode::Char('a') => Some(UserEvent::NextAccount),
            KeyCode::Char('n') => Some(UserEvent::DismissNotification),
            _ => None,
        },
    }
}

fn ui(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    // Modals leave residue in cells the next frame does not touch.
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(5), // bid cards
            Constraint::Length(6), // account + contract
            Constraint::Length(3), // actions
            Constraint::Length(3), // won items
            Constraint::Min(3),    // notifications
            Constraint::Length(4), // status + help
        ])
        .split(f.area());

    draw_title(f, chunks[0], snap);
    draw_cards(f, chunks[1], snap);
    draw_accounts(f, chunks[2], snap);
    draw_actions(f, chunks[3], &snap.availability);
    draw_won_items(f, chunks[4], snap);
    draw_notifications(f, chunks[5], &snap.notifications);
    draw_bottom(f, chunks[6], snap);
    draw_modals(f, state, snap);
}

fn button(key: &str, label: &str, enabled: bool) -> Span<'static> {
    let style = if enabled {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::DIM)
    };
    Span::styled(format!("[{key}] {label}"), style)
}

fn address_or_dash(address: Option<Address>) -> String {
    match address {
        Some(address) if address == Address::ZERO => "none (destroyed)".to_string(),
        Some(address) => address.to_string(),
        None => "-".to_string(),
    }
}

/// Cuts `text` to at most `width` terminal columns.
fn fit(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::new();
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            out.pop();
            out.push('…');
            return out;
        }
        used += w;
        out.push(c);
    }
    out
}

fn draw_title(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let title = Paragraph::new(Line::from(vec![
        Span::styled(TITLE, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  contract {}", snap.contract)),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, area);
}

fn draw_cards(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(area);
    let stake = units::to_display(snap.stake);
    for (item, rect) in ItemId::ALL.into_iter().zip(columns.iter()) {
        let key = (item.index() + 1).to_string();
        let lines = vec![
            Line::from(format!("Bids: {}", snap.bid_counts[item.index()])),
            Line::from(button(&key, &format!("Bid {stake} ETH"), snap.availability.bid)),
        ];
        let card = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title(item.name()));
        f.render_widget(card, *rect);
    }
}

fn draw_accounts(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    let label = Style::default().add_modifier(Modifier::BOLD);
    let account = Paragraph::new(vec![
        Line::styled("Connected as", label),
        Line::from(address_or_dash(snap.account)),
        Line::styled("Current Balance", label),
        Line::from(snap.account_balance_display()),
    ])
    .block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(account, columns[0]);

    let contract = Paragraph::new(vec![
        Line::styled("Contract Owner", label),
        Line::from(address_or_dash(snap.owner)),
        Line::from(vec![
            Span::styled("Contract Balance ", label),
            Span::raw(snap.contract_balance_display()),
        ]),
        Line::from(vec![
            Span::styled("Phase ", label),
            Span::raw(snap.phase.to_string()),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Contract"));
    f.render_widget(contract, columns[1]);
}

fn draw_actions(f: &mut Frame, area: Rect, availability: &ActionAvailability) {
    let buttons = [
        button("w", "Declare Winners", availability.declare_winners),
        button("c", "Am I Winner?", availability.check_winner),
        button("d", "Withdraw", availability.withdraw),
        button("r", "Reset", availability.reset),
        button("o", "Change Owner", availability.change_owner),
        button("x", "Destroy", availability.destroy),
    ];
    let mut spans = Vec::with_capacity(buttons.len() * 2);
    for b in buttons {
        spans.push(b);
        spans.push(Span::raw("  "));
    }
    let actions =
        Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(actions, area);
}

fn draw_won_items(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let text = if snap.won_items.is_empty() {
        Line::styled("None", Style::default().fg(Color::DarkGray))
    } else {
        Line::from(snap.won_items.iter().map(|item| item.name()).join(", "))
    };
    let won =
        Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Won Items"));
    f.render_widget(won, area);
}

fn notification_line(entry: &Notification, width: usize) -> Line<'static> {
    let mut style = match entry.severity {
        Severity::Success => Style::default().fg(Color::Green),
        Severity::Error => Style::default().fg(Color::Red),
    };
    if entry.faded {
        style = style.fg(Color::DarkGray).add_modifier(Modifier::DIM);
    }
    let text = format!("{} {}", entry.created_at.format("%H:%M:%S"), entry.text);
    Line::styled(fit(&text, width), style)
}

fn draw_notifications(f: &mut Frame, area: Rect, notifications: &[Notification]) {
    let width = area.width.saturating_sub(2) as usize;
    let lines: Vec<Line> = if notifications.is_empty() {
        vec![Line::styled("None", Style::default().fg(Color::DarkGray))]
    } else {
        notifications
            .iter()
            .map(|entry| notification_line(entry, width))
            .collect()
    };
    let list = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Notifications"));
    f.render_widget(list, area);
}

fn draw_bottom(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let help = "1/2/3 bid  w winners  c am I winner  d withdraw  r reset  o owner  x destroy  a next account  n dismiss  q quit";
    let bottom = Paragraph::new(vec![
        Line::from(snap.status.clone()),
        Line::styled(help, Style::default().fg(Color::DarkGray)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(bottom, area);
}

fn draw_modals(f: &mut Frame, state: &UiState, snap: &AppSnapshot) {
    match state.mode {
        Mode::ChangeOwner => {
            let area = centered_rect(60, 20, f.area());
            f.render_widget(Clear, area);
            let body = vec![
                Line::from("New owner address:"),
                Line::from(format!("{}_", snap.owner_input)),
                Line::styled(
                    "Enter submit  Esc cancel",
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            let modal = Paragraph::new(body)
                .block(Block::default().borders(Borders::ALL).title("Change Owner"));
            f.render_widget(modal, area);
        }
        Mode::QuitModal => {
            let area = centered_rect(40, 20, f.area());
            f.render_widget(Clear, area);
            let modal = Paragraph::new("Quit? (y/n)")
                .alignment(Alignment::Center)
                .block(Block::default().borders(Borders::ALL).title("Confirm"));
            f.render_widget(modal, area);
        }
        Mode::Normal => {}
    }
}

fn centered_rect(w_percent: u16, h_percent: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - h_percent) / 2),
            Constraint::Percentage(h_percent),
            Constraint::Percentage((100 - h_percent) / 2),
        ])
        .split(r);

    let vertical = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - w_percent) / 2),
            Constraint::Percentage(w_percent),
            Constraint::Percentage((100 - w_percent) / 2),
        ])
        .split(popup_layout[1]);

    vertical[1]
}
