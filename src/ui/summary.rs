use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};
use is_terminal::IsTerminal;
use owo_colors::OwoColorize;
use std::path::Path;

use crate::orchestrator::ports::{PortCategory, PortSet};
use crate::orchestrator::registry::InstanceRecord;

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn print_indented(table: &Table) {
    for line in table.to_string().lines() {
        println!("  {}", line);
    }
}

fn endpoint(category: PortCategory, port: u16) -> String {
    match category {
        PortCategory::Main => format!("http://localhost:{}", port),
        PortCategory::Debug => format!("jdwp localhost:{}", port),
        _ => format!("localhost:{}", port),
    }
}

pub fn print_startup_summary(name: &str, env: &str, home: &Path, ports: &PortSet) {
    let use_color = std::io::stdout().is_terminal();

    println!();
    if use_color {
        println!("  {} {} ({})", "srvrig".bold(), name.cyan(), env.dimmed());
    } else {
        println!("  srvrig {} ({})", name, env);
    }
    println!("  {}", home.display());
    println!();

    let mut table = new_table();
    table.set_header(vec![
        Cell::new("Port").set_alignment(CellAlignment::Left),
        Cell::new("Endpoint").set_alignment(CellAlignment::Left),
    ]);
    for (category, port) in ports.iter() {
        table.add_row(vec![
            Cell::new(category.as_str()),
            Cell::new(endpoint(category, port)),
        ]);
    }
    print_indented(&table);

    println!();
    if use_color {
        println!("  Press {} to stop", "Ctrl+C".bold());
    } else {
        println!("  Press Ctrl+C to stop");
    }
    println!();
}

/// Build the `ps` table. `is_live` reports whether an instance still holds
/// its server port.
pub fn instances_table(
    records: &[InstanceRecord],
    is_live: impl Fn(&InstanceRecord) -> bool,
    use_color: bool,
) -> Table {
    let mut table = new_table();
    let mut header = vec![Cell::new("Instance")];
    header.extend(PortCategory::ALL.iter().map(|c| Cell::new(c.as_str())));
    header.push(Cell::new("Started"));
    header.push(Cell::new("Status").set_alignment(CellAlignment::Center));
    table.set_header(header);

    let mut sorted: Vec<&InstanceRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    for record in sorted {
        let live = is_live(record);
        let status = match (live, use_color) {
            (true, true) => format!("{} {}", "\u{25cf}".green(), "running".green()),
            (false, true) => format!("{} {}", "\u{25cf}".red(), "gone".red()),
            (true, false) => "\u{25cf} running".to_string(),
            (false, false) => "\u{25cf} gone".to_string(),
        };
        let mut row = vec![Cell::new(&record.name)];
        row.extend(record.ports().iter().map(|(_, p)| Cell::new(p)));
        row.push(Cell::new(
            record.started_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ));
        row.push(Cell::new(status));
        table.add_row(row);
    }
    table
}

pub fn print_instances(records: &[InstanceRecord], is_live: impl Fn(&InstanceRecord) -> bool) {
    if records.is_empty() {
        println!("No running instances found.");
        println!("Run `srvrig start <app>` to start one.");
        return;
    }
    let use_color = std::io::stdout().is_terminal();
    print_indented(&instances_table(records, is_live, use_color));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(base: u16) -> PortSet {
        PortSet {
            main: base,
            server: base + 1,
            debug: base + 2,
            connector: base + 3,
            redirect: base + 4,
        }
    }

    #[test]
    fn endpoint_formats() {
        assert_eq!(endpoint(PortCategory::Main, 9000), "http://localhost:9000");
        assert_eq!(endpoint(PortCategory::Debug, 5000), "jdwp localhost:5000");
        assert_eq!(endpoint(PortCategory::Redirect, 8400), "localhost:8400");
    }

    #[test]
    fn instances_table_lists_every_port_sorted_by_name() {
        let records = vec![
            InstanceRecord::new("zeta", ports(9100)),
            InstanceRecord::new("alpha", ports(9000)),
        ];
        let rendered = instances_table(&records, |r| r.name == "alpha", false).to_string();

        let alpha = rendered.find("alpha").unwrap();
        let zeta = rendered.find("zeta").unwrap();
        assert!(alpha < zeta);
        for port in ["9000", "9004", "9100", "9104"] {
            assert!(rendered.contains(port), "missing {port} in:\n{rendered}");
        }
        assert!(rendered.contains("running"));
        assert!(rendered.contains("gone"));
    }
}
