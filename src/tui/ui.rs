//! UI rendering for the debugger.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, List, ListItem},
    style::{Color, Style, Modifier},
};
use crate::cpu::bus::BusValue;
use crate::cpu::control::{Line as ControlLine, ControlWord};
use crate::cpu::machine::MachineState;
use super::app::DebuggerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &DebuggerApp) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Percentage(45),
        ])
        .split(frame.area());

    // Left side: program and status
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(18),
            Constraint::Length(3),
        ])
        .split(chunks[0]);

    draw_program(frame, left_chunks[0], app);
    draw_status(frame, left_chunks[1], app);

    // Right side: registers, control word, help
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(9),
            Constraint::Min(6),
            Constraint::Length(5),
        ])
        .split(chunks[1]);

    draw_registers(frame, right_chunks[0], app);
    draw_control(frame, right_chunks[1], app);
    draw_help(frame, right_chunks[2]);
}

/// Draw every RAM cell with its disassembly.
fn draw_program(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let mar = app.machine.mar.address().value();

    let items: Vec<ListItem> = app
        .get_listing()
        .into_iter()
        .map(|(addr, byte, text, is_pc)| {
            let prefix = if is_pc { "▶ " } else { "  " };
            let bp = if app.breakpoints.contains(&addr) { "●" } else { " " };
            let mar_mark = if addr == mar { "◆" } else { " " };
            let line = format!("{} {}{:X}: {:08b}  {:<10} {}", bp, prefix, addr, byte, text, mar_mark);

            let style = if is_pc {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else if app.breakpoints.contains(&addr) {
                Style::default().fg(Color::Red)
            } else if byte == 0 {
                Style::default().fg(Color::DarkGray)
            } else {
                Style::default()
            };

            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(Block::default()
            .title(" RAM ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(list, area);
}

fn byte_line(name: &str, value: u8, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::raw(format!("{:<4}", name)),
        Span::styled(format!("{:08b}", value), Style::default().fg(color)),
        Span::raw(format!("  {:>3}  0x{:02X}", value, value)),
    ])
}

/// Draw register state.
fn draw_registers(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let snap = app.machine.snapshot();
    let flag = |set: bool| if set { Color::Green } else { Color::DarkGray };

    let content = vec![
        byte_line("A:", snap.a, Color::White),
        byte_line("B:", snap.b, Color::White),
        byte_line("OUT:", snap.out, Color::Yellow),
        byte_line("IR:", snap.ir, Color::White),
        Line::from(vec![
            Span::raw(format!("PC: {:X}   MAR: {:X}   ", snap.pc, snap.mar)),
            Span::styled("C", Style::default().fg(flag(snap.flags.carry))),
            Span::raw(" "),
            Span::styled("Z", Style::default().fg(flag(snap.flags.zero))),
        ]),
        Line::from(vec![
            Span::raw("Cycles: "),
            Span::styled(format!("{}", snap.cycles), Style::default().fg(Color::Cyan)),
            Span::raw("   State: "),
            Span::styled(format!("{:?}", snap.state),
                if snap.state == MachineState::Running {
                    Style::default().fg(Color::Green)
                } else {
                    Style::default().fg(Color::Red)
                }),
        ]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Registers ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw the current step, its control word and the bus.
fn draw_control(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let snap = app.machine.snapshot();
    let word = snap.control_word.map(ControlWord::from_bits);

    let lines: Vec<Span> = ControlLine::ALL
        .iter()
        .map(|line| {
            let on = word.map_or(false, |w| w.is_set(*line));
            let style = if on {
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Span::styled(format!("{} ", line.mnemonic()), style)
        })
        .collect();

    let bus = match snap.bus {
        BusValue::Driving(v) => Span::styled(format!("{:08b} ({})", v, v), Style::default().fg(Color::White)),
        BusValue::Floating => Span::styled("zzzzzzzz", Style::default().fg(Color::DarkGray)),
    };

    let content = vec![
        Line::from(format!(
            "Step: T{}{}",
            snap.step,
            if app.machine.control.is_fetching() { " (fetch)" } else { "" }
        )),
        Line::from(match word {
            Some(w) => format!("Word: {}", w.to_grouped_binary()),
            None => "Word: (invalid step)".to_string(),
        }),
        Line::from(lines),
        Line::from(vec![Span::raw("Bus:  "), bus]),
    ];

    let paragraph = Paragraph::new(content)
        .block(Block::default()
            .title(" Control ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Magenta)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &DebuggerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

/// Draw help panel.
fn draw_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(vec![
        Line::from("c: Clock  s: Step  r: Run  p: Pause"),
        Line::from("b: Breakpoint  x: Reset  l: Reload  q: Quit"),
    ])
    .style(Style::default().fg(Color::DarkGray))
    .block(Block::default()
        .title(" Help ")
        .borders(Borders::ALL));

    frame.render_widget(help, area);
}
