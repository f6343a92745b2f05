use crate::collectors::{CoreMetric, Snapshot};
use crate::format::{self, escape_html, UNAVAILABLE};

const STYLE: &str = include_str!("../assets/dashboard.css");
const CHART_JS_URL: &str = "https://cdn.jsdelivr.net/npm/chart.js";
const ICONS_URL: &str = "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/6.5.0/css/all.min.css";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Home,
    Cpu,
    Memory,
    Disk,
}

impl Page {
    pub fn name(self) -> &'static str {
        match self {
            Page::Home => "home",
            Page::Cpu => "cpu",
            Page::Memory => "memory",
            Page::Disk => "disk",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageOptions {
    /// Reload interval for the browser; 0 disables it.
    pub refresh_secs: u64,
}

pub fn render(page: Page, snapshot: &Snapshot, options: &PageOptions) -> String {
    match page {
        Page::Home => layout("System Monitoring Dashboard", &home(snapshot), options),
        Page::Cpu => layout("CPU Details", &cpu(snapshot), options),
        Page::Memory => layout("Memory Details", &memory(snapshot), options),
        Page::Disk => layout("Disk Details", &disk(snapshot), options),
    }
}

pub fn render_error(reason: &str, message: &str, options: &PageOptions) -> String {
    let body = format!(
        r#"<section class="panel error">
  <h2><i class="fa-solid fa-triangle-exclamation"></i> Collection failed</h2>
  <p><strong>Reason:</strong> {}</p>
  <p>{}</p>
</section>
{}"#,
        escape_html(reason),
        escape_html(message),
        back_link(),
    );
    layout("System Monitoring Dashboard", &body, options)
}

fn layout(title: &str, body: &str, options: &PageOptions) -> String {
    let refresh = if options.refresh_secs > 0 {
        format!(
            r#"<meta http-equiv="refresh" content="{}">"#,
            options.refresh_secs
        )
    } else {
        String::new()
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
{refresh}
<title>{title}</title>
<link rel="stylesheet" href="{ICONS_URL}">
<style>
{STYLE}
</style>
<script src="{CHART_JS_URL}"></script>
</head>
<body>
<header class="header"><h1>{title}</h1></header>
<main class="main-content">
{body}
</main>
</body>
</html>
"#
    )
}

fn home(s: &Snapshot) -> String {
    let boot_available = s.available(CoreMetric::BootTime);
    let network_available = s.available(CoreMetric::Network);

    let system = [
        detail_row("fa-solid fa-desktop", "OS", &escape_html(&s.os_name)),
        detail_row("fa-solid fa-microchip", "Processor", &escape_html(&s.processor)),
        detail_row(
            "fa-solid fa-clock",
            "Boot Time",
            &text_or_unavailable(boot_available, || format::timestamp(s.boot_time)),
        ),
        detail_row(
            "fa-solid fa-hourglass-half",
            "Uptime",
            &text_or_unavailable(boot_available, || format::uptime(s.uptime)),
        ),
        detail_row(
            "fa-solid fa-battery-half",
            "Battery",
            &s.battery_percent
                .map(|p| format!("{}%", format::percent(p)))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        ),
    ]
    .concat();

    let performance = [
        bar_row(
            "fa-solid fa-microchip",
            "CPU Usage",
            reading(s, CoreMetric::CpuUsage, s.cpu_percent),
        ),
        bar_row(
            "fa-solid fa-memory",
            "Memory Usage",
            reading(s, CoreMetric::Memory, s.memory_percent),
        ),
        bar_row(
            "fa-solid fa-hdd",
            "Disk Usage",
            reading(s, CoreMetric::Disk, s.disk_percent),
        ),
    ]
    .concat();

    let network = [
        detail_row(
            "fa-solid fa-wifi",
            "IP Address",
            &s.ip_address
                .map(|ip| ip.to_string())
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        ),
        detail_row(
            "fa-solid fa-arrow-up",
            "Network Sent",
            &text_or_unavailable(network_available, || format::mb(s.network_bytes_sent)),
        ),
        detail_row(
            "fa-solid fa-arrow-down",
            "Network Received",
            &text_or_unavailable(network_available, || {
                format::mb(s.network_bytes_received)
            }),
        ),
    ]
    .concat();

    format!(
        r#"<section class="system-info">
  <div class="last-updated"><i class="fa-solid fa-rotate"></i> Last updated: {updated}</div>
  <h2>System Information</h2>
  <div class="info-grid">
    <div class="info-section"><h3>System</h3>
{system}    </div>
    <div class="info-section"><h3>Performance</h3>
{performance}    </div>
    <div class="info-section"><h3>Network</h3>
{network}    </div>
  </div>
</section>
<div class="overview-links">
  <div class="overview"><i class="fa-solid fa-microchip fa-3x"></i><h3>CPU Overview</h3><a href="/cpu" class="btn">View Details</a></div>
  <div class="overview"><i class="fa-solid fa-memory fa-3x"></i><h3>Memory Overview</h3><a href="/memory" class="btn">View Details</a></div>
  <div class="overview"><i class="fa-solid fa-hdd fa-3x"></i><h3>Disk Overview</h3><a href="/disk" class="btn">View Details</a></div>
</div>
"#,
        updated = format::clock(s.collected_at),
    )
}

fn cpu(s: &Snapshot) -> String {
    let usage = reading(s, CoreMetric::CpuUsage, s.cpu_percent);
    let details = [
        detail_row(
            "fa-solid fa-microchip",
            "Cores",
            &if s.cpu_physical_cores > 0 {
                s.cpu_physical_cores.to_string()
            } else {
                UNAVAILABLE.to_string()
            },
        ),
        detail_row(
            "fa-solid fa-microchip",
            "Logical Cores",
            &s.cpu_logical_cores.to_string(),
        ),
        detail_row(
            "fa-solid fa-tachometer-alt",
            "Current Frequency",
            &format::mhz(s.cpu_freq_current_mhz),
        ),
        detail_row(
            "fa-solid fa-tachometer-alt",
            "Max Frequency",
            &format::mhz(s.cpu_freq_max_mhz),
        ),
    ]
    .concat();

    detail_page(
        &format!("CPU Usage: {}", percent_text(usage)),
        "cpuChart",
        usage,
        ("#007bff", "#cce6ff"),
        "CPU Details",
        &details,
    )
}

fn memory(s: &Snapshot) -> String {
    let usage = reading(s, CoreMetric::Memory, s.memory_percent);
    let available = usage.is_some();
    let heading = if available {
        format!(
            "Memory Used: {} GB / {} GB",
            format::gb(s.memory_used_bytes),
            format::gb(s.memory_total_bytes)
        )
    } else {
        format!("Memory Used: {UNAVAILABLE}")
    };
    let details = [
        detail_row(
            "fa-solid fa-memory",
            "Total Memory",
            &gb_or_unavailable(available, s.memory_total_bytes),
        ),
        detail_row(
            "fa-solid fa-memory",
            "Used Memory",
            &gb_or_unavailable(available, s.memory_used_bytes),
        ),
        detail_row(
            "fa-solid fa-memory",
            "Free Memory",
            &gb_or_unavailable(available, s.memory_available_bytes),
        ),
        detail_row(
            "fa-solid fa-exchange-alt",
            "Swap Used",
            &text_or_unavailable(available, || {
                format!(
                    "{} GB / {} GB",
                    format::gb(s.swap_used_bytes),
                    format::gb(s.swap_total_bytes)
                )
            }),
        ),
    ]
    .concat();

    detail_page(
        &heading,
        "memChart",
        usage,
        ("#28a745", "#d4edda"),
        "Memory Details",
        &details,
    )
}

fn disk(s: &Snapshot) -> String {
    let usage = reading(s, CoreMetric::Disk, s.disk_percent);
    let available = usage.is_some();
    let heading = if available {
        format!(
            "Disk Used: {} GB / {} GB",
            format::gb(s.disk_used_bytes),
            format::gb(s.disk_total_bytes)
        )
    } else {
        format!("Disk Used: {UNAVAILABLE}")
    };
    let details = [
        detail_row(
            "fa-solid fa-folder",
            "Mount Point",
            &escape_html(&s.disk_path.display().to_string()),
        ),
        detail_row(
            "fa-solid fa-hdd",
            "Total Disk",
            &gb_or_unavailable(available, s.disk_total_bytes),
        ),
        detail_row(
            "fa-solid fa-hdd",
            "Used Disk",
            &gb_or_unavailable(available, s.disk_used_bytes),
        ),
        detail_row(
            "fa-solid fa-hdd",
            "Free Disk",
            &gb_or_unavailable(available, s.disk_free_bytes),
        ),
        detail_row(
            "fa-solid fa-folder-open",
            "Usage Percent",
            &percent_text(usage),
        ),
    ]
    .concat();

    detail_page(
        &heading,
        "diskChart",
        usage,
        ("#ffc107", "#fff3cd"),
        "Disk Details",
        &details,
    )
}

fn detail_page(
    heading: &str,
    canvas_id: &str,
    used: Option<f64>,
    colors: (&str, &str),
    details_title: &str,
    details: &str,
) -> String {
    format!(
        r#"<div class="detail-layout">
  <div class="chart-panel">
    <h2>{heading}</h2>
    {chart}
  </div>
  <div class="panel">
    <h3>{details_title}</h3>
{details}  </div>
</div>
{back}
"#,
        chart = doughnut(canvas_id, used, colors),
        back = back_link(),
    )
}

fn doughnut(canvas_id: &str, used: Option<f64>, (used_color, free_color): (&str, &str)) -> String {
    let Some(used) = used else {
        return format!(r#"<p class="placeholder">{UNAVAILABLE}</p>"#);
    };
    format!(
        r#"<canvas id="{canvas_id}"></canvas>
    <script>
      new Chart(document.getElementById('{canvas_id}'), {{
        type: 'doughnut',
        data: {{ labels: ['Used', 'Free'], datasets: [{{ data: [{used}, {free}],
          backgroundColor: ['{used_color}', '{free_color}'], borderWidth: 0 }}] }},
        options: {{ plugins: {{ legend: {{ position: 'bottom' }} }}, cutout: '60%' }}
      }});
    </script>"#,
        used = format::percent(used),
        free = format::percent(100.0 - used),
    )
}

fn detail_row(icon: &str, label: &str, value: &str) -> String {
    format!(r#"      <p><i class="{icon}"></i><strong>{label}:</strong> {value}</p>"#) + "\n"
}

fn bar_row(icon: &str, label: &str, value: Option<f64>) -> String {
    let mut row = detail_row(icon, label, &percent_text(value));
    if let Some(v) = value {
        row.push_str(&format!(
            "      <div class=\"bar\"><div style=\"width: {}%\"></div></div>\n",
            format::percent(v)
        ));
    }
    row
}

fn back_link() -> &'static str {
    r#"<a href="/" class="btn back"><i class="fa-solid fa-arrow-left"></i> Back to Home</a>"#
}

fn reading(s: &Snapshot, metric: CoreMetric, value: f64) -> Option<f64> {
    s.available(metric).then_some(value)
}

fn percent_text(value: Option<f64>) -> String {
    value
        .map(|v| format!("{}%", format::percent(v)))
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

fn gb_or_unavailable(available: bool, bytes: u64) -> String {
    text_or_unavailable(available, || format!("{} GB", format::gb(bytes)))
}

fn text_or_unavailable(available: bool, text: impl FnOnce() -> String) -> String {
    if available {
        text()
    } else {
        UNAVAILABLE.to_string()
    }
}
