use super::*;

const TICK_RATE: Duration = Duration::from_millis(200);
const CARD_WIDTH: u16 = 44;
const CARD_HEIGHT: u16 = 8;
const HISTORY_HEIGHT: u16 = 8;
const LOG_LINES: usize = 6;
const HIGHLIGHT_MS: i64 = 2_000;
const INTERVAL_STEP: u64 = 5;

#[derive(Clone)]
struct UiSnapshot {
    ids: Vec<EventId>,
    cards: Vec<EventRecord>,
    histories: BTreeMap<EventId, Vec<HistoryEntry>>,
    logs: Vec<String>,
    last_updated: Option<DateTime<Local>>,
    next_refresh: u64,
    refresh_secs: u64,
    paused: bool,
    view_mode: ViewMode,
    relay_enabled: bool,
    desktop: Permission,
    now: DateTime<Local>,
}

#[derive(Default)]
struct UiState {
    selected: usize,
    expanded: bool,
    /// Digits typed after `i`, applied on Enter.
    input: Option<String>,
    table: TableState,
}

#[derive(Debug, PartialEq, Eq)]
enum KeyAction {
    Quit,
    Apply(Control),
    Nothing,
}

fn collect_ui_snapshot(session: &ConsoleSession) -> UiSnapshot {
    let state = session.state();
    let ids = session.event_ids().to_vec();
    // Configured order; ids without a finished cycle yet have no card.
    let cards: Vec<EventRecord> = ids
        .iter()
        .filter_map(|id| state.events.get(id).cloned())
        .collect();
    let histories = cards
        .iter()
        .map(|c| (c.id, session.history(c.id).to_vec()))
        .collect();
    let notifier = session.monitor().notifier();
    UiSnapshot {
        ids,
        cards,
        histories,
        logs: session.logs().iter().cloned().collect(),
        last_updated: state.last_updated,
        next_refresh: state.next_refresh,
        refresh_secs: state.refresh_secs,
        paused: state.paused,
        view_mode: state.view_mode,
        relay_enabled: notifier.relay_enabled(),
        desktop: notifier.desktop_permission(),
        now: Local::now(),
    }
}

pub(crate) async fn run_tui(mut session: ConsoleSession) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("enter alt screen")?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("terminal init")?;

    let mut ui = UiState::default();
    let res = drive_tui(&mut terminal, &mut session, &mut ui).await;

    teardown_tui(terminal)?;
    res
}

async fn drive_tui(
    terminal: &mut Terminal<ratatui::backend::CrosstermBackend<Stdout>>,
    session: &mut ConsoleSession,
    ui: &mut UiState,
) -> Result<()> {
    loop {
        let snap = collect_ui_snapshot(session);
        terminal.draw(|f| draw_ui(f, &snap, ui))?;

        // `step` is cancel safe; losing the race to the redraw tick drops nothing.
        tokio::select! {
            _ = session.step() => {}
            _ = tokio::time::sleep(TICK_RATE) => {}
        }

        while event::poll(Duration::ZERO)? {
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
                return Ok(());
            }
            let refresh_secs = session.state().refresh_secs;
            match handle_key(ui, key.code, refresh_secs, snap.cards.len()) {
                KeyAction::Quit => return Ok(()),
                KeyAction::Apply(control) => session.apply(control),
                KeyAction::Nothing => {}
            }
        }
    }
}

pub(crate) async fn run_plain(mut session: ConsoleSession) -> Result<()> {
    // Line-per-cycle printer for non-interactive stdout.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                res.context("listen for ctrl-c")?;
                break;
            }
            step = session.step() => {
                if matches!(step, Step::CycleComplete(_)) {
                    println!("{}", plain_line(&collect_ui_snapshot(&session)));
                }
            }
        }
    }
    Ok(())
}

fn teardown_tui(mut terminal: Terminal<ratatui::backend::CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).context("leave alt screen")?;
    terminal.show_cursor().context("show cursor")?;
    Ok(())
}

fn handle_key(ui: &mut UiState, code: KeyCode, refresh_secs: u64, cards: usize) -> KeyAction {
    if let Some(buf) = ui.input.as_mut() {
        match code {
            KeyCode::Char(c) if c.is_ascii_digit() && buf.len() < 5 => buf.push(c),
            KeyCode::Backspace => {
                buf.pop();
            }
            KeyCode::Enter => {
                let typed = ui.input.take().unwrap_or_default();
                if let Ok(secs) = typed.parse::<u64>() {
                    return KeyAction::Apply(Control::SetInterval(secs));
                }
            }
            KeyCode::Esc => ui.input = None,
            _ => {}
        }
        return KeyAction::Nothing;
    }

    match code {
        KeyCode::Char('q') | KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('p') | KeyCode::Char(' ') => KeyAction::Apply(Control::TogglePause),
        KeyCode::Char('r') => KeyAction::Apply(Control::RefreshNow),
        KeyCode::Char('t') => KeyAction::Apply(Control::TestNotification),
        KeyCode::Char('v') => KeyAction::Apply(Control::ToggleView),
        KeyCode::Char('+') | KeyCode::Char('=') => {
            KeyAction::Apply(Control::SetInterval(refresh_secs + INTERVAL_STEP))
        }
        KeyCode::Char('-') => KeyAction::Apply(Control::SetInterval(
            refresh_secs
                .saturating_sub(INTERVAL_STEP)
                .max(MIN_REFRESH_SECS),
        )),
        KeyCode::Char('i') => {
            ui.input = Some(String::new());
            KeyAction::Nothing
        }
        KeyCode::Down => {
            if cards > 0 {
                ui.selected = (ui.selected + 1).min(cards - 1);
            }
            KeyAction::Nothing
        }
        KeyCode::Up => {
            ui.selected = ui.selected.saturating_sub(1);
            KeyAction::Nothing
        }
        KeyCode::Enter | KeyCode::Char('h') => {
            ui.expanded = !ui.expanded;
            KeyAction::Nothing
        }
        _ => KeyAction::Nothing,
    }
}

fn draw_ui(f: &mut Frame, snap: &UiSnapshot, ui: &mut UiState) {
    if !snap.cards.is_empty() && ui.selected >= snap.cards.len() {
        ui.selected = snap.cards.len() - 1;
    }
    let history_height = if ui.expanded { HISTORY_HEIGHT } else { 0 };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(CARD_HEIGHT),
            Constraint::Length(history_height),
            Constraint::Length(LOG_LINES as u16 + 2),
        ])
        .split(f.area());

    let header = Paragraph::new(build_header(snap))
        .alignment(Alignment::Left)
        .block(Block::default());
    f.render_widget(
        header,
        Rect::new(chunks[0].x, chunks[0].y, chunks[0].width, 1),
    );
    let help = Paragraph::new(build_help_line(ui)).style(Style::default().fg(Color::DarkGray));
    f.render_widget(
        help,
        Rect::new(chunks[0].x, chunks[0].y + 1, chunks[0].width, 1),
    );
    f.render_widget(Block::default().borders(Borders::BOTTOM), chunks[0]);

    match snap.view_mode {
        ViewMode::Grid => draw_grid(f, snap, ui.selected, chunks[1]),
        ViewMode::List => draw_list(f, snap, ui, chunks[1]),
    }
    if ui.expanded {
        draw_history(f, snap, ui.selected, chunks[2]);
    }
    draw_logs(f, &snap.logs, chunks[3]);
}

fn build_header(snap: &UiSnapshot) -> String {
    let ids = snap
        .ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let updated = snap
        .last_updated
        .map(clock_string)
        .unwrap_or_else(|| "—".to_string());
    let next = if snap.paused {
        "PAUSED".to_string()
    } else {
        format!("next {}s", snap.next_refresh)
    };
    let relay = if snap.relay_enabled { "on" } else { "off" };
    let desktop = match snap.desktop {
        Permission::Granted => "on",
        Permission::Denied => "off",
    };
    format!(
        "Ticket Monitor | ids {ids} | updated {updated} | {next} | every {}s | {} | relay {relay} | desktop {desktop}",
        snap.refresh_secs,
        snap.view_mode.label()
    )
}

fn build_help_line(ui: &UiState) -> String {
    match &ui.input {
        Some(buf) => format!("interval (s, min {MIN_REFRESH_SECS}): {buf}_   Enter=apply Esc=cancel"),
        None => "p=pause r=refresh t=test i=interval +/-=5s v=view ↑↓=select h=history q=quit"
            .to_string(),
    }
}

fn tone_color(tone: StatusTone) -> Color {
    match tone {
        StatusTone::Urgent => Color::Green,
        StatusTone::SoldOut => Color::Red,
        StatusTone::Neutral => Color::Gray,
    }
}

fn status_badge(record: &EventRecord) -> Span<'static> {
    Span::styled(
        format!(" {} ", record.status),
        Style::default()
            .fg(Color::Black)
            .bg(tone_color(record.tone()))
            .add_modifier(Modifier::BOLD),
    )
}

fn is_highlighted(record: &EventRecord, snap: &UiSnapshot) -> bool {
    record.highlight
        && snap
            .last_updated
            .is_some_and(|at| (snap.now - at).num_milliseconds() < HIGHLIGHT_MS)
}

fn card_title(record: &EventRecord) -> String {
    if record.name.is_empty() {
        format!("Event {}", record.id)
    } else {
        record.name.clone()
    }
}

fn draw_grid(f: &mut Frame, snap: &UiSnapshot, selected: usize, area: Rect) {
    if snap.cards.is_empty() {
        let p = Paragraph::new("waiting for first poll...")
            .block(Block::default().title("Events").borders(Borders::ALL));
        f.render_widget(p, area);
        return;
    }

    let cols = (area.width / CARD_WIDTH).max(1) as usize;
    let visible_rows = (area.height / CARD_HEIGHT).max(1) as usize;
    let first_row = (selected / cols).saturating_sub(visible_rows - 1);
    let card_width = area.width / cols as u16;

    for (i, record) in snap.cards.iter().enumerate() {
        let row = i / cols;
        if row < first_row || row >= first_row + visible_rows {
            continue;
        }
        let rect = Rect::new(
            area.x + (i % cols) as u16 * card_width,
            area.y + (row - first_row) as u16 * CARD_HEIGHT,
            card_width,
            CARD_HEIGHT,
        )
        .intersection(area);

        let mut border = Style::default();
        if is_highlighted(record, snap) {
            border = border.fg(Color::Yellow).add_modifier(Modifier::BOLD);
        } else if i == selected {
            border = border.fg(Color::Cyan);
        }

        let mut lines = vec![
            Line::from(vec![status_badge(record), Span::raw(format!("  #{}", record.id))]),
            Line::from(record.display_time().to_string()),
            Line::from(describe_start(&record.time, &snap.now)),
            Line::from(record.display_venue()),
        ];
        if let Some(banner) = &record.banner {
            lines.push(Line::styled(
                banner.clone(),
                Style::default().fg(Color::DarkGray),
            ));
        }

        let p = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .title(card_title(record))
                .borders(Borders::ALL)
                .border_style(border),
        );
        f.render_widget(p, rect);
    }
}

fn draw_list(f: &mut Frame, snap: &UiSnapshot, ui: &mut UiState, area: Rect) {
    let header_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let header = Row::new(vec![
        Cell::from("Id"),
        Cell::from("Event"),
        Cell::from("Status"),
        Cell::from("Time"),
        Cell::from("Starts"),
        Cell::from("Venue"),
    ])
    .style(header_style);

    let rows: Vec<Row> = snap
        .cards
        .iter()
        .map(|r| {
            let row = Row::new(vec![
                Cell::from(r.id.to_string()),
                Cell::from(card_title(r)),
                Cell::from(r.status.clone()).style(Style::default().fg(tone_color(r.tone()))),
                Cell::from(r.display_time().to_string()),
                Cell::from(describe_start(&r.time, &snap.now)),
                Cell::from(r.display_venue()),
            ]);
            if is_highlighted(r, snap) {
                row.style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Percentage(25),
            Constraint::Length(14),
            Constraint::Length(26),
            Constraint::Length(18),
            Constraint::Percentage(40),
        ],
    )
    .header(header)
    .block(Block::default().title("Events").borders(Borders::ALL))
    .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    ui.table
        .select((!snap.cards.is_empty()).then_some(ui.selected));
    f.render_stateful_widget(table, area, &mut ui.table);
}

fn draw_history(f: &mut Frame, snap: &UiSnapshot, selected: usize, area: Rect) {
    let Some(record) = snap.cards.get(selected) else {
        return;
    };
    let entries = snap
        .histories
        .get(&record.id)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let room = area.height.saturating_sub(2) as usize;
    let text = if entries.is_empty() {
        "no status changes yet".to_string()
    } else {
        // Newest last, like the log pane.
        entries
            .iter()
            .skip(entries.len().saturating_sub(room))
            .map(|h| format!("{}  {}", h.time, h.status))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let title = format!("History: {}", card_title(record));
    let p = Paragraph::new(text).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(p, area);
}

fn draw_logs(f: &mut Frame, logs: &[String], area: Rect) {
    let text = logs
        .iter()
        .skip(logs.len().saturating_sub(LOG_LINES))
        .cloned()
        .collect::<Vec<_>>()
        .join("\n");
    let p = Paragraph::new(text).block(Block::default().title("Logs").borders(Borders::ALL));
    f.render_widget(p, area);
}

fn plain_line(snap: &UiSnapshot) -> String {
    let updated = snap
        .last_updated
        .map(clock_string)
        .unwrap_or_else(|| "—".to_string());
    let cards = snap
        .cards
        .iter()
        .map(|r| {
            let mark = if r.highlight { "*" } else { "" };
            format!("{} {}{mark}", r.id, r.status)
        })
        .collect::<Vec<_>>()
        .join(" | ");
    format!("[{updated}] {cards}")
}
