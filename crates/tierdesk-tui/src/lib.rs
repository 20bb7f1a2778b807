// Copyright 2026 Tierdesk contributors
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use std::collections::{BTreeSet, VecDeque};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tierdesk_app::{
    Account, AccountId, Board, BoardCommand, BoardEffect, CountQuery, Notice, NoticeSeverity,
    PageNav, PromoteState, RowQuery, Tier, TierPane, UserRef, format_remote_error,
};

const FILTER_DEBOUNCE_MS: u64 = 250;
const STATUS_CLEAR_SECS: u64 = 4;
const SELECTED_MARK: &str = "x";

/// Everything the board's host needs from the outside world. The CLI binds
/// this to the sqlite store; tests bind it to scripted fixtures.
pub trait AccountService {
    fn fetch_accounts(&mut self, query: &RowQuery) -> Result<Vec<Account>>;
    fn count_accounts(&mut self, query: &CountQuery) -> Result<u64>;
    fn list_active_users(&mut self) -> Result<Vec<UserRef>>;
    fn promote_accounts(&mut self, account_ids: &[AccountId]) -> Result<usize>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
    CommitFilter { token: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterField {
    Name,
    Phone,
}

impl FilterField {
    const fn label(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FilterEditor {
    tier: Tier,
    field: FilterField,
    buffer: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    focus: usize,
    cursors: [usize; 3],
    filter_editor: Option<FilterEditor>,
    filter_token: u64,
    owner_cursor: usize,
    status: Option<String>,
    status_token: u64,
    help_visible: bool,
}

pub fn run_board<S: AccountService>(board: &mut Board, service: &mut S) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    let init = board.init_effects();
    drain_effects(board, service, &mut view_data, &internal_tx, init);

    let mut result = Ok(());
    loop {
        process_internal_events(board, service, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, board, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) => {
                    if handle_key_event(board, service, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Event::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                view_data.status = None;
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::CommitFilter { token } if token == view_data.filter_token => {
                commit_filter(board, service, view_data, tx);
            }
            InternalEvent::CommitFilter { .. } => {}
        }
    }
}

fn commit_filter<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
) {
    let Some(editor) = view_data.filter_editor.clone() else {
        return;
    };
    let command = match editor.field {
        FilterField::Name => BoardCommand::SetNameFilter {
            tier: editor.tier,
            value: editor.buffer,
        },
        FilterField::Phone => BoardCommand::SetPhoneFilter {
            tier: editor.tier,
            value: editor.buffer,
        },
    };
    let effects = board.dispatch(command);
    drain_effects(board, service, view_data, tx, effects);
}

fn schedule_filter_commit(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(FILTER_DEBOUNCE_MS));
        let _ = sender.send(InternalEvent::CommitFilter { token });
    });
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(STATUS_CLEAR_SECS));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    view_data.status = Some(message.into());
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

/// Executes board effects against the service and feeds the results back in,
/// looping until the board has nothing further to ask for.
fn drain_effects<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    effects: Vec<BoardEffect>,
) {
    let mut queue: VecDeque<BoardEffect> = effects.into();
    while let Some(effect) = queue.pop_front() {
        match effect {
            BoardEffect::FetchRows { tier, seq, query } => {
                let result = service
                    .fetch_accounts(&query)
                    .map_err(|error| format_remote_error(&error));
                queue.extend(board.apply_rows(tier, seq, result));
            }
            BoardEffect::FetchCount { tier, seq, query } => {
                let result = service
                    .count_accounts(&query)
                    .map_err(|error| format_remote_error(&error));
                queue.extend(board.apply_count(tier, seq, result));
            }
            BoardEffect::LoadUsers => {
                let result = service
                    .list_active_users()
                    .map_err(|error| format_remote_error(&error));
                board.apply_users(result);
            }
            BoardEffect::Promote { account_ids } => {
                let result = service
                    .promote_accounts(&account_ids)
                    .map(|_| ())
                    .map_err(|error| format_remote_error(&error));
                queue.extend(board.apply_promote_result(result));
            }
            BoardEffect::Notify(notice) => {
                emit_status(view_data, tx, notice_text(&notice));
            }
            BoardEffect::SelectionsCleared => {}
            BoardEffect::LoadingChanged(_) => {}
        }
    }
    clamp_cursors(board, view_data);
}

fn notice_text(notice: &Notice) -> String {
    let mark = match notice.severity {
        NoticeSeverity::Info | NoticeSeverity::Success => "",
        NoticeSeverity::Warning | NoticeSeverity::Error => "! ",
    };
    format!("{mark}{}: {}", notice.title, notice.message)
}

fn clamp_cursors(board: &Board, view_data: &mut ViewData) {
    for (index, tier) in Tier::ALL.into_iter().enumerate() {
        let rows = board.pane(tier).rows.len();
        view_data.cursors[index] = view_data.cursors[index].min(rows.saturating_sub(1));
    }
}

fn focused_tier(view_data: &ViewData) -> Tier {
    Tier::ALL[view_data.focus % Tier::ALL.len()]
}

fn handle_key_event<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if board.promote_state() == PromoteState::ConfirmPending {
        handle_confirm_key(board, service, view_data, internal_tx, key);
        return false;
    }

    if view_data.help_visible {
        view_data.help_visible = false;
        return false;
    }

    if view_data.filter_editor.is_some() {
        handle_filter_editor_key(board, service, view_data, internal_tx, key);
        return false;
    }

    let tier = focused_tier(view_data);
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return true,
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Tab => view_data.focus = (view_data.focus + 1) % Tier::ALL.len(),
        KeyCode::BackTab => {
            view_data.focus = (view_data.focus + Tier::ALL.len() - 1) % Tier::ALL.len();
        }
        KeyCode::Char('j') | KeyCode::Down => move_cursor(board, view_data, 1),
        KeyCode::Char('k') | KeyCode::Up => move_cursor(board, view_data, -1),
        KeyCode::Char(' ') => toggle_selection(board, view_data),
        KeyCode::Char('n') | KeyCode::Right => {
            let effects = board.dispatch(BoardCommand::GoToPage {
                tier,
                nav: PageNav::Next,
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('p') | KeyCode::Left => {
            let effects = board.dispatch(BoardCommand::GoToPage {
                tier,
                nav: PageNav::Prev,
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('g') => {
            let effects = board.dispatch(BoardCommand::GoToPage {
                tier,
                nav: PageNav::First,
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('G') => {
            let effects = board.dispatch(BoardCommand::GoToPage {
                tier,
                nav: PageNav::Last,
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('s') => {
            let pane = board.pane(tier);
            let effects = board.dispatch(BoardCommand::SetSort {
                tier,
                field: pane.sort_field.next(),
                direction: pane.sort_direction,
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('r') => {
            let pane = board.pane(tier);
            let effects = board.dispatch(BoardCommand::SetSort {
                tier,
                field: pane.sort_field,
                direction: pane.sort_direction.reversed(),
            });
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('/') => open_filter_editor(board, view_data, tier, FilterField::Name),
        KeyCode::Char('f') => open_filter_editor(board, view_data, tier, FilterField::Phone),
        KeyCode::Char('o') => cycle_owner(board, service, view_data, internal_tx),
        KeyCode::Char('P') => {
            let effects = board.dispatch(BoardCommand::RequestPromote);
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Enter => {
            let pane = board.pane(tier);
            if let Some(row) = pane.rows.get(view_data.cursors[view_data.focus]) {
                let link = row.detail_url.clone();
                emit_status(view_data, internal_tx, format!("open {link}"));
            }
        }
        _ => {}
    }
    false
}

fn handle_confirm_key<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            let effects = board.dispatch(BoardCommand::ConfirmPromote);
            drain_effects(board, service, view_data, internal_tx, effects);
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            board.dispatch(BoardCommand::CancelPromote);
        }
        _ => {}
    }
}

fn handle_filter_editor_key<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.filter_editor = None;
        }
        KeyCode::Enter => {
            view_data.filter_token = view_data.filter_token.saturating_add(1);
            commit_filter(board, service, view_data, internal_tx);
            view_data.filter_editor = None;
        }
        KeyCode::Backspace => {
            if let Some(editor) = view_data.filter_editor.as_mut() {
                editor.buffer.pop();
            }
            restart_debounce(view_data, internal_tx);
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if let Some(editor) = view_data.filter_editor.as_mut() {
                editor.buffer.push(ch);
            }
            restart_debounce(view_data, internal_tx);
        }
        _ => {}
    }
}

/// Bumps the commit token so any timer already in flight lands stale, then
/// arms a fresh one.
fn restart_debounce(view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    view_data.filter_token = view_data.filter_token.saturating_add(1);
    schedule_filter_commit(internal_tx, view_data.filter_token);
}

fn open_filter_editor(board: &Board, view_data: &mut ViewData, tier: Tier, field: FilterField) {
    let pane = board.pane(tier);
    let buffer = match field {
        FilterField::Name => pane.name_filter.clone(),
        FilterField::Phone => pane.phone_filter.clone(),
    };
    view_data.filter_editor = Some(FilterEditor {
        tier,
        field,
        buffer,
    });
}

fn move_cursor(board: &Board, view_data: &mut ViewData, delta: isize) {
    let rows = board.pane(focused_tier(view_data)).rows.len();
    if rows == 0 {
        return;
    }
    let cursor = &mut view_data.cursors[view_data.focus];
    let next = cursor.saturating_add_signed(delta);
    *cursor = next.min(rows - 1);
}

fn toggle_selection(board: &mut Board, view_data: &ViewData) {
    let tier = focused_tier(view_data);
    let pane = board.pane(tier);
    let Some(row) = pane.rows.get(view_data.cursors[view_data.focus]) else {
        return;
    };

    let mut ids: BTreeSet<AccountId> = pane.selected.clone();
    if !ids.remove(&row.id) {
        ids.insert(row.id);
    }
    board.dispatch(BoardCommand::SetSelection { tier, ids });
}

fn cycle_owner<S: AccountService>(
    board: &mut Board,
    service: &mut S,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let options = &board.owner.user_options;
    if options.is_empty() {
        let message = board
            .owner
            .error
            .clone()
            .unwrap_or_else(|| "owner list is empty".to_owned());
        emit_status(view_data, internal_tx, format!("! owners unavailable: {message}"));
        return;
    }

    view_data.owner_cursor = (view_data.owner_cursor + 1) % options.len();
    let option = options[view_data.owner_cursor].clone();
    let effects = board.dispatch(BoardCommand::SetOwner(option.value));
    drain_effects(board, service, view_data, internal_tx, effects);
    emit_status(view_data, internal_tx, format!("owner: {}", option.label));
}

fn render(frame: &mut ratatui::Frame<'_>, board: &Board, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(board))
        .block(Block::default().title("tierdesk").borders(Borders::ALL));
    frame.render_widget(header, layout[0]);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(33),
            Constraint::Percentage(34),
            Constraint::Percentage(33),
        ])
        .split(layout[1]);
    for (index, tier) in Tier::ALL.into_iter().enumerate() {
        render_pane(frame, panes[index], board.pane(tier), view_data, index);
    }

    let status = Paragraph::new(status_text(board, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if board.promote_state() == PromoteState::ConfirmPending {
        let area = centered_rect(50, 26, frame.area());
        frame.render_widget(Clear, area);
        let confirm = Paragraph::new(confirm_overlay_text(board)).block(
            Block::default()
                .title("promote")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(confirm, area);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_pane(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    pane: &TierPane,
    view_data: &ViewData,
    index: usize,
) {
    let focused = view_data.focus == index;
    let border_style = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::White)
    };

    let header = Row::new(vec![
        Cell::from(" "),
        Cell::from("name"),
        Cell::from("phone"),
        Cell::from("modified by"),
        Cell::from("owner"),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let rows = pane.rows.iter().enumerate().map(|(row_index, row)| {
        let marker = if pane.selected.contains(&row.id) {
            SELECTED_MARK
        } else {
            " "
        };
        let mut styled = Row::new(vec![
            Cell::from(marker),
            Cell::from(row.name.clone()),
            Cell::from(row.phone.clone()),
            Cell::from(row.last_modified_by.clone()),
            Cell::from(row.owner_name.clone()),
        ]);
        if focused && row_index == view_data.cursors[index] {
            styled = styled.style(Style::default().add_modifier(Modifier::REVERSED));
        }
        styled
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(1),
            Constraint::Min(16),
            Constraint::Length(14),
            Constraint::Min(10),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .title(pane_title(pane))
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(table, area);
}

fn pane_title(pane: &TierPane) -> String {
    let mut title = format!(
        "{} [{} | page {}/{}]",
        pane.tier.label(),
        pane.total_records,
        pane.current_page,
        pane.total_pages(),
    );
    if !pane.name_filter.is_empty() || !pane.phone_filter.is_empty() {
        title.push_str(" *");
    }
    if !pane.selected.is_empty() {
        title.push_str(&format!(" sel:{}", pane.selected.len()));
    }
    title
}

fn header_text(board: &Board) -> String {
    let owner = board
        .owner
        .user_options
        .iter()
        .find(|option| option.value == board.owner.owner_id)
        .map(|option| option.label.clone())
        .unwrap_or_else(|| "All Owners".to_owned());
    let loading = if board.is_loading() { "  [working]" } else { "" };
    format!(
        "owner: {owner}  selected: {}{loading}",
        board.selected_total()
    )
}

fn status_text(board: &Board, view_data: &ViewData) -> String {
    if let Some(editor) = &view_data.filter_editor {
        return format!(
            "{} {} filter: {}_",
            editor.tier.label(),
            editor.field.label(),
            editor.buffer,
        );
    }
    if let Some(status) = &view_data.status {
        return status.clone();
    }

    let pane = board.pane(focused_tier(view_data));
    if let Some(error) = &pane.error {
        return format!("! {error}");
    }
    "space select | / name | f phone | o owner | s sort | r reverse | n/p page | P promote | ? help"
        .to_owned()
}

fn confirm_overlay_text(board: &Board) -> String {
    format!(
        "Promote {} selected account(s) one tier up?\n\n[y] confirm   [n] cancel",
        board.selected_total()
    )
}

fn help_overlay_text() -> String {
    [
        "tab / shift-tab   switch tier pane",
        "j / k             move row cursor",
        "space             toggle row selection",
        "n / p             next / previous page",
        "g / G             first / last page",
        "/                 edit name filter (debounced)",
        "f                 edit phone filter (debounced)",
        "o                 cycle owner filter",
        "s                 cycle sort column",
        "r                 reverse sort direction",
        "P                 promote selected accounts",
        "enter             show record link",
        "q                 quit",
    ]
    .join("\n")
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
