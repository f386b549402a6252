/// colltune table viewer: renders the latest cost-table snapshot.
///
/// Run in a separate terminal after `colltune --snapshot`:
///   cargo run --bin viz
///
/// Polls /tmp/colltune_table.json every 200ms and renders:
///
///     ┌ header: ranks / nodes / channels / collective ─────────────┐
///     │ latency/bandwidth table (one row per collective)           │
///     │ thread ceilings + thresholds │ best choice per size sweep  │
///     │ q/esc: quit  …footer…                                      │
///
/// Press q or Esc to quit.
use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use colltune::snapshot::{SNAPSHOT_PATH, TuningSnapshot, read_snapshot};
use colltune::{Algorithm, CollFunc, Protocol};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table},
    Frame, Terminal,
};
use std::{io, time::Duration};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        let snapshot = read_snapshot(SNAPSHOT_PATH);
        terminal.draw(|f| render(f, snapshot.as_ref()))?;

        // Non-blocking: poll for 200ms, then redraw regardless
        if event::poll(Duration::from_millis(200))? {
            if let Event::Key(key) = event::read()? {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    break;
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Top-level layout
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, snapshot: Option<&TuningSnapshot>) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                                  // header
            Constraint::Length(CollFunc::ALL.len() as u16 + 4),     // cost table
            Constraint::Min(8),                                     // threads + sweep
            Constraint::Length(1),                                  // footer
        ])
        .split(f.area());

    render_header(f, rows[0], snapshot);

    match snapshot {
        None => {
            let msg = Paragraph::new(vec![
                Line::raw(""),
                Line::from(Span::styled(
                    "  No snapshot yet.",
                    Style::default().fg(Color::DarkGray),
                )),
                Line::from(Span::styled(
                    "  Run `colltune --snapshot` to produce one.",
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .block(Block::default().borders(Borders::ALL));
            f.render_widget(msg, rows[1]);
        }
        Some(s) => {
            render_costs(f, rows[1], s);

            let cols = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
                .split(rows[2]);
            render_threads(f, cols[0], s);
            render_sweep(f, cols[1], s);
        }
    }

    render_footer(f, rows[3]);
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

fn render_header(f: &mut Frame, area: Rect, snapshot: Option<&TuningSnapshot>) {
    let block = Block::default()
        .title(Span::styled(
            " ⚡ colltune cost model ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let spans = match snapshot {
        None => vec![Span::styled("  waiting for snapshot…", Style::default().fg(Color::DarkGray))],
        Some(s) => vec![
            Span::styled("  ranks: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.comm.n_ranks.to_string(), Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)),
            Span::styled("   nodes: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.comm.n_nodes.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled("   channels: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.comm.n_channels.to_string(), Style::default().fg(Color::Yellow)),
            Span::styled("   sweep: ", Style::default().fg(Color::DarkGray)),
            Span::styled(s.coll.to_string(), Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD)),
        ],
    };
    f.render_widget(Paragraph::new(Line::from(spans)), inner);
}

// ---------------------------------------------------------------------------
// Latency / bandwidth table
// ---------------------------------------------------------------------------

fn render_costs(f: &mut Frame, area: Rect, s: &TuningSnapshot) {
    let mut header = vec![Cell::from("lat us / GB/s")];
    for a in Algorithm::ALL {
        for p in Protocol::ALL {
            header.push(Cell::from(format!("{}/{}", a, p)));
        }
    }

    let rows: Vec<Row> = CollFunc::ALL
        .iter()
        .map(|&c| {
            let mut cells = vec![Cell::from(c.name())];
            for a in Algorithm::ALL {
                for p in Protocol::ALL {
                    let bw = s.comm.bandwidth(c, a, p);
                    let cell = if bw == 0.0 {
                        Cell::from("—").style(Style::default().fg(Color::DarkGray))
                    } else {
                        Cell::from(format!("{:.1}/{:.1}", s.comm.latency(c, a, p), bw))
                            .style(Style::default().fg(Color::Green))
                    };
                    cells.push(cell);
                }
            }
            let style = if c == s.coll { Style::default().add_modifier(Modifier::BOLD) } else { Style::default() };
            Row::new(cells).style(style)
        })
        .collect();

    let mut widths = vec![Constraint::Length(14)];
    widths.extend(std::iter::repeat(Constraint::Min(11)).take(Algorithm::ALL.len() * Protocol::ALL.len()));

    let table = Table::new(rows, widths)
        .header(Row::new(header).style(Style::default().fg(Color::Cyan)))
        .block(Block::default().title(" Latency / AlgBw ").borders(Borders::ALL));
    f.render_widget(table, area);
}

// ---------------------------------------------------------------------------
// Thread panel
// ---------------------------------------------------------------------------

fn render_threads(f: &mut Frame, area: Rect, s: &TuningSnapshot) {
    let block = Block::default().title(" Threads (max / threshold) ").borders(Borders::ALL);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    for a in Algorithm::ALL {
        let mut spans = vec![Span::styled(format!("  {:<8}", a.name()), Style::default().fg(Color::DarkGray))];
        for p in Protocol::ALL {
            spans.push(Span::raw(format!(
                "{:>6}: {:>4} / {:<6}",
                p.name(),
                s.comm.max_threads(a, p),
                s.comm.thread_threshold(a, p),
            )));
        }
        lines.push(Line::from(spans));
    }
    lines.push(Line::raw(""));
    lines.push(Line::from(vec![
        Span::styled("  warp size: ", Style::default().fg(Color::DarkGray)),
        Span::raw(s.comm.limits.warp_size.to_string()),
    ]));

    f.render_widget(Paragraph::new(lines), inner);
}

// ---------------------------------------------------------------------------
// Sweep panel
// ---------------------------------------------------------------------------

fn render_sweep(f: &mut Frame, area: Rect, s: &TuningSnapshot) {
    let rows: Vec<Row> = s
        .sweep
        .iter()
        .map(|pt| match (&pt.selection, &pt.launch) {
            (Some(sel), Some(shape)) => {
                let proto_color = match sel.protocol {
                    Protocol::Ll => Color::Yellow,
                    Protocol::Ll128 => Color::Magenta,
                    Protocol::Simple => Color::Green,
                };
                Row::new(vec![
                    Cell::from(human_bytes(pt.bytes)),
                    Cell::from(sel.algorithm.name()),
                    Cell::from(sel.protocol.name()).style(Style::default().fg(proto_color)),
                    Cell::from(format!("{:.1}", sel.time_us)),
                    Cell::from(format!("{}×{}", shape.n_channels, shape.n_threads)),
                ])
            }
            _ => Row::new(vec![
                Cell::from(human_bytes(pt.bytes)),
                Cell::from("—").style(Style::default().fg(Color::DarkGray)),
            ]),
        })
        .collect();

    let widths = [
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Length(7),
        Constraint::Length(12),
        Constraint::Min(8),
    ];
    let table = Table::new(rows, widths)
        .header(Row::new(vec!["size", "algo", "proto", "time (us)", "ch×thr"]).style(Style::default().fg(Color::Cyan)))
        .block(Block::default().title(format!(" Best choice: {} ", s.coll)).borders(Borders::ALL));
    f.render_widget(table, area);
}

fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024 && value % 1024 == 0 && unit + 1 < UNITS.len() {
        value /= 1024;
        unit += 1;
    }
    format!("{} {}", value, UNITS[unit])
}

// ---------------------------------------------------------------------------
// Footer
// ---------------------------------------------------------------------------

fn render_footer(f: &mut Frame, area: Rect) {
    let text = Paragraph::new(Span::styled(
        format!("  q / esc: quit    auto-refreshes every 200ms    reads {}", SNAPSHOT_PATH),
        Style::default().fg(Color::DarkGray),
    ));
    f.render_widget(text, area);
}
