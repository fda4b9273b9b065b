//! Text rendering of the dashboard using comfy-table

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use std::fmt::Write;
use streamstats::format::{
    calculate_uptime, format_compact_number, format_countdown, format_number, updated_label,
};
use streamstats::model::LiveStatus;
use streamstats::Stream;

use crate::controller::{LoadState, ViewController};

/// Rows shown in the trending panel.
const TRENDING: usize = 10;

/// Render the whole screen: KPI row, status line, stream table or its
/// placeholder, pagination and the trending panel.
pub fn render_dashboard(view: &ViewController, notice: Option<&str>, now: DateTime<Utc>) -> String {
    let mut out = String::new();

    out.push_str(&kpi_table(view, now));
    out.push('\n');
    let _ = writeln!(out, "{}", status_line(view));

    let rows = view.visible_streams();
    if let LoadState::Failed { reason } = view.state() {
        let _ = writeln!(out, "\nError loading streams: {reason}");
        out.push_str("Type `r` to retry.\n");
    } else if matches!(view.state(), LoadState::Idle | LoadState::Loading) {
        out.push_str("\nLoading streams...\n");
    } else if rows.is_empty() {
        let search = &view.filters().search;
        if search.trim().is_empty() {
            out.push_str("\nNo streams are live right now.\n");
        } else {
            let _ = writeln!(out, "\nNo streams match \"{search}\".");
        }
    } else {
        let offset = view.current_page().map_or(0, |p| p.offset as usize);
        out.push_str(&streams_table(&rows, offset, now));
        out.push('\n');
        out.push_str(&pagination_line(view));
        out.push_str(&trending_panel(&rows));
    }

    if let Some(notice) = notice {
        let _ = writeln!(out, "\n{notice}");
    }
    out
}

fn kpi_table(view: &ViewController, now: DateTime<Utc>) -> String {
    let kpis = view.kpis(now);

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Total Streams", "Total Viewers", "Peak Viewers", "Last Updated"]);
    table.add_row(vec![
        Cell::new(format_number(kpis.total_streams)),
        Cell::new(format_number(kpis.total_participants)),
        Cell::new(format_number(kpis.peak_participants)),
        Cell::new(kpis.last_updated.format("%H:%M:%S UTC")),
    ]);
    table.to_string()
}

fn status_line(view: &ViewController) -> String {
    let f = view.filters();
    let refresh = if view.is_polling() {
        format!("auto refresh on, next in {}", format_countdown(view.countdown()))
    } else {
        "auto refresh off".to_string()
    };
    let mut line = format!("Sorted by {} ({}) | {refresh}", f.sort_by.label(), f.sort_order);
    if !f.search.is_empty() {
        let _ = write!(line, " | search \"{}\"", f.search);
    }
    if view.is_loading() {
        line.push_str(" | loading");
    }
    line
}

fn streams_table(rows: &[&Stream], offset: usize, now: DateTime<Utc>) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Stream", "Handle", "Status", "Viewers", "Chat", "Uptime", "Updated"]);

    for (i, s) in rows.iter().enumerate() {
        let chat = s.chat_members.or(s.reply_count).unwrap_or(0);
        table.add_row(vec![
            Cell::new(offset + i + 1).set_alignment(CellAlignment::Right),
            Cell::new(s.display_name()),
            Cell::new(format!("@{}", s.handle_label())),
            Cell::new(status_badge(s.live_status())),
            Cell::new(format_compact_number(s.participants())).set_alignment(CellAlignment::Right),
            Cell::new(format_compact_number(chat)).set_alignment(CellAlignment::Right),
            Cell::new(calculate_uptime(s.started(), now)),
            Cell::new(updated_label(s.updated_at, now)),
        ]);
    }
    table.to_string()
}

fn status_badge(status: LiveStatus) -> &'static str {
    match status {
        LiveStatus::Live => "● LIVE",
        LiveStatus::Ended => "ENDED",
        LiveStatus::Unknown => "-",
    }
}

fn pagination_line(view: &ViewController) -> String {
    let p = view.pagination();
    let window = p
        .window()
        .into_iter()
        .map(|n| if n == p.current_page { format!("[{n}]") } else { n.to_string() })
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        "Showing {} to {} of {} streams | Page {} of {} | {}{window}{}\n",
        format_number(p.first_item),
        format_number(p.last_item),
        format_number(p.total),
        p.current_page,
        p.total_pages,
        if p.has_prev { "< " } else { "" },
        if p.has_next { " >" } else { "" },
    )
}

fn trending_panel(rows: &[&Stream]) -> String {
    let mut out = String::from("\nTrending streams\n");
    for (i, s) in rows.iter().take(TRENDING).enumerate() {
        let _ = writeln!(
            out,
            "{:>3}. {} ({} viewers)",
            i + 1,
            s.display_name(),
            format_compact_number(s.participants())
        );
    }
    out
}
