//! WiFi helpers used for automatic profile selection

use anyhow::Result;
use std::process::Command;

/// SSID of the active WiFi connection, via NetworkManager
pub fn current_ssid() -> Result<Option<String>> {
    let output = Command::new("nmcli")
        .args(["-t", "-f", "active,ssid", "dev", "wifi"])
        .output()?;

    Ok(parse_active_ssid(&String::from_utf8_lossy(&output.stdout)))
}

/// Pick the active network from `nmcli -t -f active,ssid` output
fn parse_active_ssid(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("yes:"))
        .map(|ssid| ssid.replace("\\:", ":"))
        .find(|ssid| !ssid.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_active_ssid() {
        let out = "no:Neighbour\nyes:Telekom_ICE\nno:\n";
        assert_eq!(parse_active_ssid(out), Some("Telekom_ICE".to_string()));
    }

    #[test]
    fn test_parse_escaped_colon() {
        assert_eq!(parse_active_ssid("yes:Cafe\\: Guest\n"), Some("Cafe: Guest".to_string()));
    }

    #[test]
    fn test_parse_not_connected() {
        assert_eq!(parse_active_ssid("no:Telekom\nno:@BayernWLAN\n"), None);
        assert_eq!(parse_active_ssid(""), None);
    }
}
