use itertools::Itertools;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;

use crate::{
    app::App,
    palette::Rgb,
    runtime::{tile_key, tile_keys_hint},
    scheduler::Scheduler,
    session::{SessionState, SessionTimer, WordDisplay},
};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const CARD_HEIGHT: u16 = 5;
const TILE_HEIGHT: u16 = 3;
const NEUTRAL_CARD: Color = Color::Rgb(0x2b, 0x30, 0x3b);

pub fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.r, rgb.g, rgb.b)
}

impl<S: Scheduler<SessionTimer>> Widget for &App<S> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snap = &self.snapshot;
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1),            // status
                Constraint::Length(1),            // padding
                Constraint::Length(CARD_HEIGHT),  // word card
                Constraint::Length(1),            // padding
                Constraint::Length(TILE_HEIGHT),  // tiles
                Constraint::Length(1),            // selection
                Constraint::Length(1),            // feedback
                Constraint::Min(0),
                Constraint::Length(1),            // legend
            ])
            .split(area);

        render_status(self, chunks[0], buf, bold_style, dim_style);
        render_card(&snap.display, chunks[2], buf, bold_style);
        render_tiles(self, chunks[4], buf);

        if !snap.selection.is_empty() {
            Paragraph::new(Span::styled(snap.selection.iter().join(" · "), dim_style))
                .alignment(Alignment::Center)
                .render(chunks[5], buf);
        }

        if let Some(feedback) = &self.feedback {
            let style = feedback
                .color
                .map_or(bold_style, |c| bold_style.fg(to_color(c)));
            Paragraph::new(Span::styled(feedback.text.as_str(), style))
                .alignment(Alignment::Center)
                .render(chunks[6], buf);
        }

        let legend = match snap.state {
            SessionState::Idle => "(enter) start / (t)imer / (R)eset best / (esc)ape".to_string(),
            SessionState::Failed(_) => "(enter) retry / (m)enu / (t)imer / (esc)ape".to_string(),
            _ => format!(
                "({}) pick color / (x) stop / (t)imer / (esc)ape",
                tile_keys_hint(self.session.palette().active().len())
            ),
        };
        Paragraph::new(Span::styled(legend, italic_style)).render(chunks[8], buf);
    }
}

fn render_status<S: Scheduler<SessionTimer>>(
    app: &App<S>,
    area: Rect,
    buf: &mut Buffer,
    bold_style: Style,
    dim_style: Style,
) {
    let snap = &app.snapshot;
    let best = match &snap.best_player {
        Some(player) if snap.best > 0 => format!("Best {} ({player})", snap.best),
        _ => format!("Best {}", snap.best),
    };
    let timer = match snap.remaining_secs {
        Some(secs) => Span::styled(format!("{secs:.1}s"), bold_style),
        None => Span::styled("timer off", dim_style),
    };
    let line = Line::from(vec![
        Span::styled(format!("Round {}", snap.round), bold_style),
        Span::raw("   "),
        Span::styled(best, dim_style),
        Span::raw("   "),
        timer,
    ]);
    Paragraph::new(line)
        .alignment(Alignment::Center)
        .render(area, buf);
}

fn render_card(display: &WordDisplay, area: Rect, buf: &mut Buffer, bold_style: Style) {
    let (text, style) = match display {
        WordDisplay::Ready => (
            "Press enter to start".to_string(),
            Style::default().bg(NEUTRAL_CARD).fg(Color::Gray),
        ),
        WordDisplay::Shown {
            word,
            text_color,
            background,
        } => (
            word.to_uppercase(),
            bold_style
                .fg(to_color(*text_color))
                .bg(background.map_or(NEUTRAL_CARD, to_color)),
        ),
        WordDisplay::Concealed => (
            "?".to_string(),
            bold_style.bg(NEUTRAL_CARD).fg(Color::Gray),
        ),
        WordDisplay::Stopped => (
            "Stopped".to_string(),
            Style::default().bg(NEUTRAL_CARD).fg(Color::Gray),
        ),
        WordDisplay::Solution(solution) => (
            solution.clone(),
            bold_style.bg(NEUTRAL_CARD).fg(Color::White),
        ),
    };

    let inner_pad = area.height.saturating_sub(3) / 2;
    let mut lines = vec![Line::default(); inner_pad as usize];
    lines.push(Line::from(text));

    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).style(style))
        .style(style)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(area, buf);
}

fn render_tiles<S: Scheduler<SessionTimer>>(app: &App<S>, area: Rect, buf: &mut Buffer) {
    let snap = &app.snapshot;
    let tokens = app.session.palette().active();
    if tokens.is_empty() {
        return;
    }

    let cells = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(vec![Constraint::Ratio(1, tokens.len() as u32); tokens.len()])
        .split(area);

    for (i, (token, cell)) in tokens.iter().zip(cells.iter()).enumerate() {
        let flashing = snap.flashing.iter().any(|f| f == token.name());
        let mut style = Style::default()
            .bg(to_color(token.color()))
            .fg(Color::Black);
        if flashing {
            style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        } else if !snap.input_enabled {
            style = style.add_modifier(Modifier::DIM);
        }

        let key = tile_key(i).unwrap_or(' ');
        let label = tile_label(key, token.name(), cell.width.saturating_sub(2));
        Paragraph::new(vec![Line::default(), Line::from(label)])
            .style(style)
            .alignment(Alignment::Center)
            .render(*cell, buf);
    }
}

/// "3 Green", shortened to the key when the tile is too narrow.
fn tile_label(key: char, name: &str, width: u16) -> String {
    let label = format!("{key} {name}");
    if label.width() <= width as usize {
        label
    } else {
        key.to_string()
    }
}
