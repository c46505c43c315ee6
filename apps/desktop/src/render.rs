//! Text rendering of published grid views.

use std::fmt::Write;

use grid_core::{query_state::SortDirection, GridView};
use serde_json::Value;

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

/// Page numbers shown by a pagination control with `size` buttons, keeping
/// `current` as close to the middle as the bounds allow.
pub fn page_buttons(current: u32, max: u32, size: u32) -> Vec<u32> {
    if max == 0 || size == 0 {
        return Vec::new();
    }
    let size = size.min(max);
    let first = current
        .saturating_sub(size / 2)
        .max(1)
        .min(max - size + 1);
    (first..first + size).collect()
}

pub fn render_view(view: &GridView) -> String {
    let mut out = String::new();
    let _ = write!(out, "== {} ==", view.id);
    if let Some(sec) = view.auto_refresh_sec.filter(|sec| *sec > 0) {
        let _ = write!(out, "  (auto refresh {sec}s)");
    }
    out.push('\n');

    if !view.sort.is_empty() {
        let sort: Vec<String> = view.sort.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "sort: {}", sort.join(", "));
    }
    if view.has_search_queries {
        let search: Vec<String> = view
            .search_queries
            .iter()
            .map(|(key, value)| format!("{key}={}", cell(Some(value))))
            .collect();
        let _ = writeln!(out, "search: {}", search.join(" "));
    }

    if view.is_loading {
        out.push_str("loading...\n");
        return out;
    }
    if let Some(error) = &view.error {
        let _ = writeln!(out, "error: {error}");
        return out;
    }

    let mut header = vec!["#".to_string()];
    header.extend(view.columns.iter().map(|column| {
        match view.sort_direction(&column.key) {
            Some(SortDirection::Asc) => format!("{} ^", column.label()),
            Some(SortDirection::Desc) => format!("{} v", column.label()),
            None => column.label().to_string(),
        }
    }));
    let body: Vec<Vec<String>> = view
        .rows()
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let mut line = vec![index.to_string()];
            line.extend(view.columns.iter().map(|column| cell(row.get(&column.key))));
            line
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|title| title.chars().count()).collect();
    for line in &body {
        for (width, text) in widths.iter_mut().zip(line) {
            *width = (*width).max(text.chars().count());
        }
    }
    let format_line = |line: &[String]| {
        line.iter()
            .zip(&widths)
            .map(|(text, width)| format!("{text:<width$}"))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };
    let _ = writeln!(out, "{}", format_line(&header));
    let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for line in &body {
        let _ = writeln!(out, "{}", format_line(line));
    }

    if let Some(pagination) = view.pagination {
        let buttons: Vec<String> =
            page_buttons(pagination.current, pagination.max, view.pagination_size)
                .into_iter()
                .map(|page| {
                    if page == pagination.current {
                        format!("[{page}]")
                    } else {
                        page.to_string()
                    }
                })
                .collect();
        let _ = writeln!(
            out,
            "page {}/{}  {}",
            pagination.current,
            pagination.max,
            buttons.join(" ")
        );
    }

    let mut actions = Vec::new();
    if view.has_search_parameters {
        actions.push("search".to_string());
    }
    if view.has_post_operation {
        actions.push("post".to_string());
    }
    if !view.table_operations.is_empty() {
        actions.push(format!("ops ({})", view.table_operations.len()));
    }
    if !view.row_operations.is_empty() {
        actions.push(format!("ops <row> [{}]", view.row_operations_icon.as_str()));
    }
    if !actions.is_empty() {
        let _ = writeln!(out, "actions: {}", actions.join(", "));
    }
    out
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
