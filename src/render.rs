//! Plain-text rendering for the CLI.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use chrono::{Datelike, NaiveDate};

use crate::model::{Item, ReadingBundle, Section, SourceKind};
use crate::settings::UserSettings;
use crate::storage::{HistoryRecord, HistoryStats};
use crate::util::{display_width, truncate_to_width, wrap_to_width};

const WEEKDAYS: [&str; 7] = ["日", "月", "火", "水", "木", "金", "土"];

/// Render a bundle as reading text, wrapped for the configured font size.
/// `completed` marks a day already recorded as read.
pub fn render_bundle(bundle: &ReadingBundle, settings: &UserSettings, completed: bool) -> String {
    let width = settings.font_size.wrap_width();
    let mut out = String::new();

    let _ = writeln!(out, "{}", bundle.date.format("%Y年%m月%d日"));
    let _ = write!(
        out,
        "総文字数 {}字（目安 {}字）",
        bundle.total_char_count, settings.max_char_count
    );
    if bundle.cached {
        out.push_str("  [キャッシュ]");
    }
    if completed {
        out.push_str("  [読了済み]");
    }
    out.push('\n');

    for section in &bundle.sections {
        out.push('\n');
        render_section(&mut out, section, width);
    }

    if let Some(errors) = &bundle.partial_errors {
        out.push('\n');
        out.push_str(&render_errors(errors));
    }
    out
}

fn render_section(out: &mut String, section: &Section, width: usize) {
    let _ = writeln!(out, "■ {}（{}字）", section.title, section.char_count);
    let numbered = section.items.len() > 1;

    for (i, item) in section.items.iter().enumerate() {
        let prefix = if numbered {
            format!("{}. ", i + 1)
        } else {
            String::new()
        };
        let body = match item {
            Item::Wikipedia(w) => match w.year {
                Some(year) => format!("{year}年 {}", w.text),
                None => w.text.clone(),
            },
            Item::Fallback(f) => match &f.work {
                Some(work) => format!("{}（{}『{}』）", f.text, f.author, work),
                None => format!("{}（{}）", f.text, f.author),
            },
            other => other.text().to_string(),
        };

        let indent = " ".repeat(display_width(&prefix));
        let lines = wrap_to_width(&body, width.saturating_sub(indent.len()).max(1));
        for (n, line) in lines.iter().enumerate() {
            let lead = if n == 0 { prefix.as_str() } else { indent.as_str() };
            let _ = writeln!(out, "{lead}{line}");
        }
    }
    let _ = writeln!(out, "出典: {}", section.attribution);
}

/// One line per failed source.
pub fn render_errors(errors: &BTreeMap<SourceKind, String>) -> String {
    let mut out = String::from("取得できなかったソース:\n");
    for (kind, reason) in errors {
        let _ = writeln!(out, "  - {kind}: {reason}");
    }
    out
}

/// History, newest first, one line per day.
pub fn render_history(records: &[HistoryRecord]) -> String {
    if records.is_empty() {
        return "まだ記録がありません。\n".to_string();
    }
    let mut out = String::new();
    for r in records {
        let sources = r
            .sources
            .as_ref()
            .map(|s| s.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(","))
            .unwrap_or_default();
        let mark = if r.completed { "✓" } else { "-" };
        let _ = writeln!(
            out,
            "{} {} {:>5}字  {}",
            r.date,
            mark,
            r.char_count,
            truncate_to_width(&sources, 40)
        );
    }
    out
}

pub fn render_stats(stats: &HistoryStats) -> String {
    format!(
        "読んだ日数: {}日\n総文字数: {}字\n連続記録: {}日\n",
        stats.days_read, stats.total_char_count, stats.current_streak
    )
}

/// A month grid with completed days marked `*`.
pub fn render_calendar(year: i32, month: u32, records: &[HistoryRecord]) -> Option<String> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    let days_in_month = next.signed_duration_since(first).num_days() as u32;
    let read: BTreeSet<u32> = records
        .iter()
        .filter(|r| r.completed && r.date.year() == year && r.date.month() == month)
        .map(|r| r.date.day())
        .collect();

    let mut out = format!("{year}年{month}月\n");
    for w in WEEKDAYS {
        let _ = write!(out, "  {w}");
    }
    out.push('\n');

    let offset = first.weekday().num_days_from_sunday();
    out.push_str(&"    ".repeat(offset as usize));
    for day in 1..=days_in_month {
        let mark = if read.contains(&day) { '*' } else { ' ' };
        let _ = write!(out, "{day:>3}{mark}");
        if (offset + day) % 7 == 0 {
            out.push('\n');
        }
    }
    if (offset + days_in_month) % 7 != 0 {
        out.push('\n');
    }
    let _ = writeln!(out, "読んだ日: {}日", read.len());
    Some(out)
}
