use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use gradebook::{Gradebook, LetterGrade, RankEntry, StudentReport, SubjectAverage};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Students,
    Rankings,
    Subjects,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Students => Page::Rankings,
            Page::Rankings => Page::Subjects,
            Page::Subjects => Page::Students,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Students => Page::Subjects,
            Page::Rankings => Page::Students,
            Page::Subjects => Page::Rankings,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Students => "Students",
            Page::Rankings => "Rankings",
            Page::Subjects => "Subjects",
        }
    }
}

/// Read-only snapshot of a gradebook for browsing
pub struct App {
    pub reports: Vec<StudentReport>,
    pub rankings: Vec<RankEntry>,
    pub subjects: Vec<SubjectAverage>,
    pub current_page: Page,
    pub students_state: TableState,
    pub rankings_state: TableState,
    pub subjects_state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(book: &Gradebook) -> Self {
        let reports = book.all_reports().unwrap_or_default();
        let rankings = book.rankings().unwrap_or_default();
        let subjects = book.subject_averages();

        Self {
            students_state: initial_state(reports.len()),
            rankings_state: initial_state(rankings.len()),
            subjects_state: initial_state(subjects.len()),
            reports,
            rankings,
            subjects,
            current_page: Page::Students,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn selected_report(&self) -> Option<&StudentReport> {
        self.students_state.selected().and_then(|i| self.reports.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn current_table(&mut self) -> (&mut TableState, usize) {
        match self.current_page {
            Page::Students => (&mut self.students_state, self.reports.len()),
            Page::Rankings => (&mut self.rankings_state, self.rankings.len()),
            Page::Subjects => (&mut self.subjects_state, self.subjects.len()),
        }
    }

    pub fn next(&mut self) {
        let (state, len) = self.current_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(i) if i >= len - 1 => 0,
            Some(i) => i + 1,
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let (state, len) = self.current_table();
        if len == 0 {
            return;
        }
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    pub fn first(&mut self) {
        let (state, len) = self.current_table();
        if len > 0 {
            state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let (state, len) = self.current_table();
        if len > 0 {
            state.select(Some(len - 1));
        }
    }

    pub fn graded_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| r.overall_average.is_some())
            .count()
    }
}

fn initial_state(len: usize) -> TableState {
    let mut state = TableState::default();
    if len > 0 {
        state.select(Some(0));
    }
    state
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail && app.current_page == Page::Students {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        render_students(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        match app.current_page {
            Page::Students => render_students(f, chunks[1], app),
            Page::Rankings => render_rankings(f, chunks[1], app),
            Page::Subjects => render_subjects(f, chunks[1], app),
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn letter_color(letter: Option<LetterGrade>) -> Color {
    match letter {
        Some(LetterGrade::APlus | LetterGrade::A | LetterGrade::AMinus) => Color::Green,
        Some(LetterGrade::BPlus | LetterGrade::B) => Color::Cyan,
        Some(LetterGrade::CPlus | LetterGrade::C) => Color::Yellow,
        Some(LetterGrade::D | LetterGrade::F) => Color::Red,
        None => Color::DarkGray,
    }
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn table_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::White))
        .title(title)
}

fn highlight() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Students, Page::Rankings, Page::Subjects];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("Students: {}", app.reports.len()),
        Style::default().fg(Color::White),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Graded: {}", app.graded_count()),
        Style::default().fg(Color::Green),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("Subjects: {}", app.subjects.len()),
        Style::default().fg(Color::Cyan),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    f.render_widget(header, area);
}

fn render_students(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.reports.iter().map(|report| {
        let color = letter_color(report.overall_letter);
        let average = report
            .overall_average
            .map(|avg| format!("{:.2}", avg))
            .unwrap_or_else(|| "-".to_string());
        let letter = report
            .overall_letter
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());

        Row::new(vec![
            Cell::from(truncate(&report.name, 28)),
            Cell::from(report.subjects.len().to_string()),
            Cell::from(average).style(Style::default().fg(color)),
            Cell::from(letter).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header_row(&["Student", "Subjects", "Average", "Letter"]))
    .block(table_block(" Students "))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.students_state);
}

fn render_rankings(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.rankings.iter().map(|entry| {
        let color = letter_color(Some(entry.letter));
        Row::new(vec![
            Cell::from(entry.rank.to_string()),
            Cell::from(truncate(&entry.name, 28)),
            Cell::from(format!("{:.2}", entry.average)).style(Style::default().fg(color)),
            Cell::from(entry.letter.to_string()).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(6),
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header_row(&["Rank", "Student", "Average", "Letter"]))
    .block(table_block(" Rankings "))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.rankings_state);
}

fn render_subjects(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.subjects.iter().map(|avg| {
        let color = letter_color(Some(avg.letter));
        Row::new(vec![
            Cell::from(truncate(&avg.subject, 28)),
            Cell::from(avg.student_count.to_string()),
            Cell::from(avg.grade_count.to_string()),
            Cell::from(format!("{:.2}", avg.average)).style(Style::default().fg(color)),
            Cell::from(avg.letter.to_string()).style(Style::default().fg(color)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(30),
            Constraint::Length(10),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Length(8),
        ],
    )
    .header(header_row(&["Subject", "Students", "Grades", "Average", "Letter"]))
    .block(table_block(" Subjects - Class Averages "))
    .highlight_style(highlight())
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.subjects_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &mut App) {
    let (state, total) = app.current_table();
    let selected = state.selected().map(|i| i + 1).unwrap_or(0);

    let status_spans = vec![
        Span::styled(
            format!(" Row: {}/{} ", selected, total),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Report ");

    let Some(report) = app.selected_report() else {
        f.render_widget(Paragraph::new("No student selected").block(block), area);
        return;
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Report for ", label),
            Span::raw(report.name.clone()),
        ]),
        Line::from("  ─────────────────────────────────────"),
    ];

    if report.subjects.is_empty() {
        content.push(Line::from(Span::styled(
            "  No grades available.",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    for summary in &report.subjects {
        let grades = summary
            .grades
            .iter()
            .map(|g| g.to_string())
            .collect::<Vec<_>>()
            .join(", ");

        content.push(Line::from(vec![
            Span::styled(format!("  {}: ", summary.subject), label),
            Span::raw(format!("[{}]", grades)),
        ]));
        content.push(Line::from(vec![
            Span::raw("      Average: "),
            Span::styled(
                format!("{:.2} ({})", summary.average, summary.letter),
                Style::default().fg(letter_color(Some(summary.letter))),
            ),
        ]));
    }

    if let (Some(avg), Some(letter)) = (report.overall_average, report.overall_letter) {
        content.push(Line::from("  ─────────────────────────────────────"));
        content.push(Line::from(vec![
            Span::styled("  Overall Average: ", label),
            Span::styled(
                format!("{:.2} ({})", avg, letter),
                Style::default()
                    .fg(letter_color(Some(letter)))
                    .add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    content.push(Line::from(""));
    content.push(Line::from(Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
