use crate::app::{App, AuthField, FormField, TextInput, ViewId};
use playground_application::playground::Mode;
use playground_application::render::{ChartView, ResultView};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Chart, Clear, Dataset, GraphType, Paragraph, Tabs, Wrap,
};
use ratatui::Frame;

const CURSOR: char = '▏';

pub fn draw(frame: &mut Frame, app: &App) {
    let size = frame.area();
    let outer = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(8),
            ]
            .as_ref(),
        )
        .split(size);

    draw_top_banner(frame, outer[0], app);
    match app.active_view {
        ViewId::SignUp | ViewId::SignIn => draw_auth(frame, outer[1], app),
        ViewId::Playground => draw_playground(frame, outer[1], app),
    }
    draw_bottom(frame, outer[2], app);

    if let Some(alert) = app.controller.alert() {
        draw_alert(frame, size, alert);
    }
}

fn draw_top_banner(frame: &mut Frame, area: Rect, app: &App) {
    let who = app
        .signed_in_as
        .as_deref()
        .map(|who| format!("signed in as {who}"))
        .unwrap_or_else(|| "signed out".to_string());
    let mut spans = vec![
        Span::styled(
            "Quant Playground",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("  ({who})")),
    ];
    if let Some(info) = &app.info_message {
        spans.push(Span::styled(
            format!("  {info}"),
            Style::default().fg(Color::Cyan),
        ));
    }
    frame.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center),
        area,
    );
}

fn draw_auth(frame: &mut Frame, area: Rect, app: &App) {
    let (title, switch_hint) = match app.active_view {
        ViewId::SignUp => (
            "Create an Account",
            "Already have an account? Ctrl-S to sign in.",
        ),
        _ => ("Sign In", "No account yet? Ctrl-S to sign up."),
    };
    let form = &app.auth_form;

    let masked = TextInput {
        value: "*".repeat(form.password.value.chars().count()),
        cursor: form.password.value[..form.password.cursor].chars().count(),
    };
    let mut lines = vec![
        field_line("Email", &form.email, form.focus == AuthField::Email),
        field_line("Password", &masked, form.focus == AuthField::Password),
        Line::from(""),
    ];
    if form.pending {
        lines.push(Line::from(Span::styled(
            format!("working {}", app.spinner_char()),
            Style::default().fg(Color::Yellow),
        )));
    } else {
        lines.push(Line::from("Enter: submit | Tab: next field | Esc: quit"));
    }
    if let Some(err) = &form.error {
        lines.push(Line::from(Span::styled(
            err.clone(),
            Style::default().fg(Color::Red),
        )));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        switch_hint,
        Style::default().fg(Color::DarkGray),
    )));

    let rect = centered_rect(60, 12, area);
    frame.render_widget(
        Paragraph::new(lines)
            .block(Block::default().title(title).borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        rect,
    );
}

fn draw_playground(frame: &mut Frame, area: Rect, app: &App) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(area);
    draw_form(frame, cols[0], app);
    draw_results(frame, cols[1], app);
}

fn draw_form(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(5),
                Constraint::Min(3),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);

    let mode = app.controller.mode();
    let tabs = Tabs::new(vec![Line::from("Manual"), Line::from("AI")])
        .select(match mode {
            Mode::Manual => 0,
            Mode::Ai => 1,
        })
        .block(Block::default().title("Mode (Ctrl-G)").borders(Borders::ALL))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );
    frame.render_widget(tabs, chunks[0]);

    let manual = mode == Mode::Manual;
    let params = vec![
        field_line(
            "Ticker",
            &app.inputs.ticker,
            manual && app.focus == FormField::Ticker,
        ),
        field_line(
            "Start",
            &app.inputs.start_date,
            manual && app.focus == FormField::StartDate,
        ),
        field_line(
            "End",
            &app.inputs.end_date,
            manual && app.focus == FormField::EndDate,
        ),
    ];
    frame.render_widget(
        Paragraph::new(params).block(Block::default().title("Backtest").borders(Borders::ALL)),
        chunks[1],
    );

    let (title, input, focused) = match mode {
        Mode::Manual => (
            "Strategy Code",
            &app.inputs.code,
            app.focus == FormField::Code,
        ),
        Mode::Ai => ("Describe your strategy", &app.inputs.prompt, true),
    };
    let text = if focused {
        input.with_cursor(CURSOR)
    } else {
        input.value.clone()
    };
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    frame.render_widget(
        Paragraph::new(text)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .border_style(border),
            )
            .wrap(Wrap { trim: false }),
        chunks[2],
    );

    let status = match app.busy_label() {
        Some(label) => Line::from(Span::styled(label, Style::default().fg(Color::Yellow))),
        None => Line::from(match mode {
            Mode::Manual => {
                "Ctrl-R/Enter: run backtest | Tab: next field | Ctrl-O: sign out | Esc: quit"
            }
            Mode::Ai => "Enter: generate strategy | Esc: back to manual",
        }),
    };
    frame.render_widget(
        Paragraph::new(status).block(Block::default().borders(Borders::ALL)),
        chunks[3],
    );
}

fn draw_results(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().title("Backtest Result").borders(Borders::ALL);
    let view = ResultView::project(app.controller.output());
    match &view {
        ResultView::Empty => {
            frame.render_widget(
                Paragraph::new("Run a backtest to see results here.").block(block),
                area,
            );
        }
        ResultView::Error(_) => {
            let lines: Vec<Line> = view
                .lines()
                .into_iter()
                .map(|l| Line::from(Span::styled(l, Style::default().fg(Color::Red))))
                .collect();
            frame.render_widget(
                Paragraph::new(lines)
                    .block(block)
                    .wrap(Wrap { trim: false }),
                area,
            );
        }
        ResultView::Metrics(metrics) => {
            let mut lines: Vec<Line> = Vec::new();
            if let Some(message) = &metrics.message {
                lines.push(Line::from(Span::styled(
                    message.clone(),
                    Style::default().fg(Color::Green),
                )));
            }
            lines.extend(view.lines().into_iter().map(Line::from));

            let Some(chart) = &metrics.chart else {
                frame.render_widget(
                    Paragraph::new(lines)
                        .block(block)
                        .wrap(Wrap { trim: false }),
                    area,
                );
                return;
            };

            let height = (lines.len() as u16).saturating_add(2);
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(height), Constraint::Min(5)].as_ref())
                .split(area);
            frame.render_widget(
                Paragraph::new(lines)
                    .block(block)
                    .wrap(Wrap { trim: false }),
                chunks[0],
            );
            draw_chart(frame, chunks[1], chart);
        }
    }
}

fn draw_chart(frame: &mut Frame, area: Rect, chart: &ChartView) {
    let dataset = Dataset::default()
        .name("cumulative return")
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Green))
        .data(&chart.points);
    let widget = Chart::new(vec![dataset])
        .block(
            Block::default()
                .title("Cumulative Return")
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .bounds([chart.x_bounds.0, chart.x_bounds.1])
                .labels(chart.x_labels().into_iter().map(Line::from).collect::<Vec<_>>()),
        )
        .y_axis(
            Axis::default()
                .bounds([chart.y_bounds.0, chart.y_bounds.1])
                .labels(chart.y_labels().into_iter().map(Line::from).collect::<Vec<_>>()),
        );
    frame.render_widget(widget, area);
}

fn draw_alert(frame: &mut Frame, area: Rect, message: &str) {
    let rect = centered_rect(50, 7, area);
    frame.render_widget(Clear, rect);
    let lines = vec![
        Line::from(Span::styled(message, Style::default().fg(Color::Red))),
        Line::from(""),
        Line::from("Press Enter to dismiss."),
    ];
    frame.render_widget(
        Paragraph::new(lines)
            .block(
                Block::default()
                    .title("Alert")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .wrap(Wrap { trim: false }),
        rect,
    );
}

fn draw_bottom(frame: &mut Frame, area: Rect, app: &App) {
    let max_lines = area.height.saturating_sub(2) as usize;
    let visible = app.logs.lock().window(app.log_scroll, max_lines);
    let text: Vec<Line> = visible.into_iter().map(Line::from).collect();
    frame.render_widget(
        Paragraph::new(text)
            .block(Block::default().title("Logs (PgUp/PgDn)").borders(Borders::ALL))
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn field_line(label: &str, input: &TextInput, focused: bool) -> Line<'static> {
    let (value, style) = if focused {
        (
            input.with_cursor(CURSOR),
            Style::default().fg(Color::Yellow),
        )
    } else {
        (input.value.clone(), Style::default())
    };
    Line::from(vec![
        Span::styled(format!("{label:>8}: "), Style::default().fg(Color::DarkGray)),
        Span::styled(value, style),
    ])
}

/// A `width` percent wide, `height` rows tall rect centered in `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let height = height.min(area.height);
    let w = u16::try_from(u32::from(area.width) * u32::from(width.min(100)) / 100)
        .unwrap_or(area.width);
    Rect {
        x: area.x + (area.width.saturating_sub(w)) / 2,
        y: area.y + (area.height.saturating_sub(height)) / 2,
        width: w,
        height,
    }
}
