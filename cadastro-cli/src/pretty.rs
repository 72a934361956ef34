use crate::color_choice;
use anyhow::Result;
use cadastro::app::{ListPage, Page};
use cadastro::resources::Tabular;
use cadastro::views::DashboardCounts;
use cadastro::{Partition, ResourceKind};
use serde::Serialize;
use serde_json::{json, Value};
use std::io::Write;
use termcolor::{Color, ColorSpec, StandardStream, WriteColor};

/// Column widths: the widest cell per column, header included, capped so one long description
/// doesn't push everything off screen.
pub fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    const MAX_WIDTH: usize = 40;
    headers
        .iter()
        .enumerate()
        .map(|(i, h)| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .chain(std::iter::once(h.chars().count()))
                .max()
                .unwrap_or(0)
                .min(MAX_WIDTH)
        })
        .collect()
}

fn truncate(cell: &str, width: usize) -> String {
    if cell.chars().count() <= width {
        cell.to_string()
    } else {
        let mut out: String = cell.chars().take(width.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

pub fn pp_table<T: Tabular>(kind: ResourceKind, partition: Partition, rows: &[T]) -> Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(atty::Stream::Stdout));

    stdout.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(
        &mut stdout,
        "{} {}",
        capitalize(partition.label()),
        kind.label()
    )?;
    stdout.reset()?;

    if rows.is_empty() {
        stdout.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(
            &mut stdout,
            "  no {} {} found\n",
            partition.label(),
            kind.noun()
        )?;
        stdout.reset()?;
        return Ok(());
    }

    let headers = T::headers();
    let cells: Vec<Vec<String>> = rows.iter().map(|r| r.cells()).collect();
    let widths = column_widths(headers, &cells);

    stdout.set_color(ColorSpec::new().set_dimmed(true))?;
    write!(&mut stdout, " ")?;
    for (h, w) in headers.iter().zip(&widths) {
        write!(&mut stdout, " {:<w$}", h, w = *w)?;
    }
    writeln!(&mut stdout, "  STATUS")?;
    stdout.reset()?;

    let (badge, badge_color) = match partition {
        Partition::Active => ("active", Color::Green),
        Partition::Inactive => ("inactive", Color::Red),
    };
    for row in cells {
        write!(&mut stdout, " ")?;
        for (cell, w) in row.iter().zip(&widths) {
            write!(&mut stdout, " {:<w$}", truncate(cell, *w), w = *w)?;
        }
        write!(&mut stdout, "  ")?;
        stdout.set_color(ColorSpec::new().set_fg(Some(badge_color)))?;
        writeln!(&mut stdout, "{badge}")?;
        stdout.reset()?;
    }
    writeln!(&mut stdout)?;
    Ok(())
}

pub fn pp_dashboard(counts: &DashboardCounts) -> Result<()> {
    let mut stdout = StandardStream::stdout(color_choice(atty::Stream::Stdout));
    stdout.set_color(ColorSpec::new().set_bold(true))?;
    writeln!(&mut stdout, "Dashboard")?;
    stdout.reset()?;
    for kind in ResourceKind::ALL {
        write!(&mut stdout, "  {:<10}", capitalize(kind.label()))?;
        stdout.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true))?;
        write!(&mut stdout, "{:>6}", counts.get(kind))?;
        stdout.reset()?;
        stdout.set_color(ColorSpec::new().set_dimmed(true))?;
        writeln!(&mut stdout, "  active  (see {})", kind.route())?;
        stdout.reset()?;
    }
    Ok(())
}

fn pp_list<T: Tabular>(kind: ResourceKind, page: &ListPage<T>, show: &[Partition]) -> Result<()> {
    for partition in show {
        pp_table(kind, *partition, page.partition(*partition))?;
    }
    Ok(())
}

/// Human-readable rendering of whatever page a command ended on.
pub fn pp_page(page: &Page, show: &[Partition]) -> Result<()> {
    match page {
        Page::Loading => println!("loading..."),
        Page::Login => println!("Not logged in. Use `cadastro login --username <name>`."),
        Page::Dashboard(counts) => pp_dashboard(counts)?,
        Page::Users(list) => pp_list(ResourceKind::Users, list, show)?,
        Page::Types(list) => pp_list(ResourceKind::Types, list, show)?,
        Page::Contacts(list) => pp_list(ResourceKind::Contacts, list, show)?,
        Page::NotFound(path) => println!("Nothing at {path}"),
    }
    Ok(())
}

fn list_json<T: Serialize>(page: &ListPage<T>, show: &[Partition]) -> Result<Value> {
    let mut obj = serde_json::Map::new();
    for partition in show {
        obj.insert(
            partition.label().to_string(),
            serde_json::to_value(page.partition(*partition))?,
        );
    }
    Ok(Value::Object(obj))
}

/// Machine-readable rendering, for `--json`.
pub fn page_json(page: &Page, show: &[Partition]) -> Result<Value> {
    Ok(match page {
        Page::Loading => json!({"page": "loading"}),
        Page::Login => json!({"page": "login"}),
        Page::Dashboard(c) => json!({
            "page": "dashboard",
            "users": c.users,
            "types": c.types,
            "contacts": c.contacts,
        }),
        Page::Users(list) => list_json(list, show)?,
        Page::Types(list) => list_json(list, show)?,
        Page::Contacts(list) => list_json(list, show)?,
        Page::NotFound(path) => json!({"page": "not-found", "path": path}),
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[test]
fn test_column_widths() {
    let rows = vec![
        vec!["1".to_string(), "Ana".to_string()],
        vec!["22".to_string(), "x".repeat(80)],
    ];
    assert_eq!(column_widths(&["ID", "NAME"], &rows), vec![2, 40]);
    assert_eq!(truncate("abcdef", 4), "abc…");
    assert_eq!(truncate("abc", 4), "abc");
    assert_eq!(capitalize("inactive"), "Inactive");
}

#[test]
fn test_page_json() {
    let page = Page::Dashboard(DashboardCounts {
        users: 3,
        types: 1,
        contacts: 0,
    });
    assert_eq!(
        page_json(&page, &Partition::BOTH).unwrap()["users"],
        json!(3)
    );

    let page = Page::Types(ListPage {
        active: vec![],
        inactive: vec![],
    });
    let val = page_json(&page, &[Partition::Inactive]).unwrap();
    assert_eq!(val, json!({"inactive": []}));
}
