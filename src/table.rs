use crate::model::{BatchReport, HostReport, HostState, IdentificationEvent};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};

/// Build the per-host result table
pub fn render_report(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS);

    table.set_header(vec![
        "IP",
        "Hostname",
        "MAC",
        "Vendor",
        "Type",
        "Device",
        "Confidence",
        "State",
        "Collectors",
        "Notes",
    ]);

    for host in &report.hosts {
        let ident = &host.identification;

        let device = match (&ident.manufacturer, &ident.model) {
            (Some(manufacturer), Some(model)) => format!("{} {}", manufacturer, model),
            _ => "—".to_string(),
        };

        let type_cell = if ident.is_identified() {
            Cell::new(ident.display_type()).add_attribute(Attribute::Bold)
        } else {
            Cell::new(ident.display_type())
        };

        table.add_row(vec![
            Cell::new(host.ip.to_string()),
            Cell::new(hostname_display(host)),
            Cell::new(&host.mac),
            Cell::new(ident.vendor.clone().unwrap_or_else(|| "—".to_string())),
            type_cell,
            Cell::new(device),
            Cell::new(confidence_display(host)),
            Cell::new(state_display(host.state)),
            Cell::new(collectors_display(host)),
            Cell::new(notes_display(host)),
        ]);
    }

    table
}

/// Print the table followed by the batch summary
pub fn print_report(report: &BatchReport) {
    println!("{}", render_report(report));

    let summary = &report.summary;
    let identification_rate = if report.hosts.is_empty() {
        0.0
    } else {
        (summary.identified as f32 / report.hosts.len() as f32) * 100.0
    };

    println!("\nFingerprint Batch Summary:");
    println!("==========================");
    println!(
        "Batch completed in {:.2} seconds",
        summary.elapsed.as_secs_f64()
    );
    println!(
        "Hosts scanned: {} (skipped from cache: {})",
        summary.scanned, summary.skipped
    );
    println!(
        "Identified: {:.1}% ({}/{})",
        identification_rate,
        summary.identified,
        report.hosts.len()
    );
    if summary.timed_out > 0 {
        println!("Hosts cut off by the per-host timeout: {}", summary.timed_out);
    }
}

fn hostname_display(host: &HostReport) -> String {
    host.hostname.as_ref().map_or("—".to_string(), |h| {
        if h.chars().count() > 20 {
            format!("{}...", h.chars().take(17).collect::<String>())
        } else {
            h.to_string()
        }
    })
}

fn confidence_display(host: &HostReport) -> String {
    if host.identification.is_identified() {
        return format!("{:.0}%", host.identification.confidence * 100.0);
    }
    // Sub-threshold best guess, shown for diagnostics only
    match host.best_match {
        Some(ref best) if best.confidence > 0.0 => {
            format!("({:.0}% {})", best.confidence * 100.0, best.signature_id)
        }
        _ => "—".to_string(),
    }
}

fn state_display(state: HostState) -> &'static str {
    match state {
        HostState::Queued => "queued",
        HostState::Probing => "probing",
        HostState::Scoring => "scoring",
        HostState::Done => "done",
        HostState::Skipped => "cached",
    }
}

fn collectors_display(host: &HostReport) -> String {
    if host.collectors_run.is_empty() {
        return "—".to_string();
    }
    host.collectors_run
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn notes_display(host: &HostReport) -> String {
    let mut notes: Vec<String> = host
        .failures
        .iter()
        .map(|f| format!("{}: {}", f.collector, f.failure))
        .collect();
    if host.timed_out {
        notes.push("host timeout".to_string());
    }
    if let Some(ref event) = host.event {
        notes.push(match event {
            IdentificationEvent::Identified { .. } => "new".to_string(),
            IdentificationEvent::Changed { from, .. } => format!("was {}", from),
            IdentificationEvent::Lost { previous, .. } => {
                format!("lost {}", previous)
            }
        });
    }
    if notes.is_empty() {
        "—".to_string()
    } else {
        notes.join("; ")
    }
}
