//! Output formatting utilities for the CLI
//!
//! Node tables and colored status lines.

use tabled::{
    settings::{Style, Width},
    Table, Tabled,
};

use mcc_core::config::Profile;
use mcc_protocol::Device;

/// Format a list of nodes as an ASCII table
///
/// The detailed view adds the node id, connectivity and power columns.
pub fn format_devices(devices: &[Device], detailed: bool) -> String {
    if devices.is_empty() {
        return "No nodes found".to_string();
    }

    #[derive(Tabled)]
    struct DeviceRow {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "OS")]
        os: String,
        #[tabled(rename = "IP")]
        ip: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
    }

    #[derive(Tabled)]
    struct DeviceRowDetailed {
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "NODE ID")]
        id: String,
        #[tabled(rename = "OS")]
        os: String,
        #[tabled(rename = "IP")]
        ip: String,
        #[tabled(rename = "STATUS")]
        status: &'static str,
        #[tabled(rename = "CONN")]
        conn: u32,
        #[tabled(rename = "PWR")]
        pwr: u32,
    }

    if detailed {
        let rows: Vec<DeviceRowDetailed> = devices
            .iter()
            .map(|d| DeviceRowDetailed {
                name: or_dash(&d.name),
                id: d.id.clone(),
                os: or_dash(&d.os),
                ip: or_dash(&d.ip),
                status: status(d),
                conn: d.conn,
                pwr: d.pwr,
            })
            .collect();

        Table::new(rows)
            .with(Style::rounded())
            .with(Width::wrap(120))
            .to_string()
    } else {
        let rows: Vec<DeviceRow> = devices
            .iter()
            .map(|d| DeviceRow {
                name: or_dash(&d.name),
                os: truncate(&or_dash(&d.os), 40),
                ip: or_dash(&d.ip),
                status: status(d),
            })
            .collect();

        Table::new(rows).with(Style::rounded()).to_string()
    }
}

/// Format saved profiles, marking the default
pub fn format_profiles(profiles: &[Profile], default: Option<&str>) -> String {
    if profiles.is_empty() {
        return "No profiles configured".to_string();
    }

    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "")]
        marker: &'static str,
        #[tabled(rename = "NAME")]
        name: String,
        #[tabled(rename = "SERVER")]
        server: String,
        #[tabled(rename = "USER")]
        username: String,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .map(|p| ProfileRow {
            marker: if Some(p.name.as_str()) == default { "*" } else { "" },
            name: p.name.clone(),
            server: p.server.clone(),
            username: p.username.clone(),
        })
        .collect();

    Table::new(rows).with(Style::rounded()).to_string()
}

fn status(device: &Device) -> &'static str {
    if device.is_online() {
        "online"
    } else {
        "offline"
    }
}

fn or_dash(s: &str) -> String {
    if s.is_empty() {
        "-".to_string()
    } else {
        s.to_string()
    }
}

/// Truncate a string with ellipsis if too long
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Print a success message in green with a checkmark prefix
pub fn print_success(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stdout = std::io::stdout();
    let _ = crossterm::execute!(
        stdout,
        SetForegroundColor(Color::Green),
        Print("✓ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an error message in red with an X prefix
///
/// Outputs to stderr.
pub fn print_error(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Red),
        Print("✗ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print a warning message in yellow to stderr
pub fn print_warning(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Yellow),
        Print("⚠ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}

/// Print an informational message in cyan
///
/// Goes to stderr so that stdout stays clean in proxy mode, where it
/// carries tunnel bytes.
pub fn print_info(msg: &str) {
    use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};

    let mut stderr = std::io::stderr();
    let _ = crossterm::execute!(
        stderr,
        SetForegroundColor(Color::Cyan),
        Print("ℹ "),
        ResetColor,
        Print(msg),
        Print("\n")
    );
}
