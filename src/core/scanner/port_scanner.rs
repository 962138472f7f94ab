// src/core/scanner/port_scanner.rs

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::errors::ToolExecutionError;
use crate::core::models::{PortFinding, ScanOutcome, UNKNOWN};
use crate::core::scanner::PortScanner;
use crate::core::target::Target;

/// Aggressive timing, OS/service detection, XML report on stdout.
const NMAP_ARGS: &[&str] = &["-T4", "-A", "-oX", "-"];

/// How many trailing stderr lines are kept in a non-zero exit error.
const STDERR_TAIL_LINES: usize = 10;

/// Runs the `nmap` binary once per target.
pub struct NmapScanner {
    program: String,
    timeout: Option<Duration>,
}

impl NmapScanner {
    /// `timeout` of `None` lets the process run for as long as it likes.
    pub fn new(program: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self { program: program.into(), timeout }
    }

    async fn execute(&self, target: &str) -> Result<String, ToolExecutionError> {
        // The domain pattern admits a leading '-'.
        if target.starts_with('-') {
            return Err(ToolExecutionError::OptionLikeTarget {
                tool: self.program.clone(),
                target: target.to_string(),
            });
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(NMAP_ARGS)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, args = ?NMAP_ARGS, target, "Spawning scanner.");

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| ToolExecutionError::TimedOut {
                    tool: self.program.clone(),
                    limit,
                })?,
            None => cmd.output().await,
        };

        let output = output.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                ToolExecutionError::NotFound { tool: self.program.clone() }
            } else {
                ToolExecutionError::Spawn { tool: self.program.clone(), source: e }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<&str> = stderr.lines().collect();
            let tail = lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n");
            return Err(ToolExecutionError::NonZeroExit {
                tool: self.program.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: tail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl PortScanner for NmapScanner {
    /// Runs one scanner process against `target` and parses its XML report.
    ///
    /// Failures never escape: a missing binary, a non-zero exit or an expired
    /// timeout all come back as an outcome with an error and no findings.
    ///
    /// # Arguments
    /// * `target` - A validated domain or IPv4 target, passed as the last argument.
    ///
    /// # Returns
    /// A `ScanOutcome` with the parsed findings, or with a
    /// `"Nmap scan failed: ..."` error message.
    async fn scan(&self, target: &Target) -> ScanOutcome {
        info!(target = %target, "Starting port scan.");
        match self.execute(target.as_str()).await {
            Ok(xml) => {
                let findings = parse_nmap_xml(&xml);
                info!(ports = findings.len(), "Port scan finished.");
                ScanOutcome::completed(findings)
            }
            Err(e) => {
                warn!(error = %e, "Port scan failed.");
                ScanOutcome::failed(format!("Nmap scan failed: {e}"))
            }
        }
    }
}

#[derive(Default)]
struct PortDraft {
    protocol: Option<String>,
    portid: Option<String>,
    state: Option<String>,
    service: Option<(String, Option<String>)>,
}

impl PortDraft {
    fn from_element(e: &BytesStart<'_>) -> Self {
        Self {
            protocol: attr(e, b"protocol"),
            portid: attr(e, b"portid"),
            ..Default::default()
        }
    }

    fn finish(self) -> Option<PortFinding> {
        let (service, product) = match self.service {
            Some((name, product)) => (name, product),
            None => (UNKNOWN.to_string(), Some(UNKNOWN.to_string())),
        };
        Some(PortFinding {
            protocol: self.protocol?,
            port: self.portid?,
            state: self.state.unwrap_or_else(|| UNKNOWN.to_string()),
            service,
            product,
        })
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Extracts every `host/ports/port` element directly under the document root.
///
/// Empty output yields no findings. Malformed XML also yields no findings:
/// a scan that produced nothing parseable is still a completed scan.
pub fn parse_nmap_xml(xml: &str) -> Vec<PortFinding> {
    if xml.trim().is_empty() {
        return Vec::new();
    }

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut findings = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut current: Option<PortDraft> = None;

    loop {
        let (element, is_empty) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(_)) => {
                // Closing the port element itself (depth 4: root/host/ports/port).
                if path.len() == 4 {
                    if let Some(draft) = current.take() {
                        findings.extend(draft.finish());
                    }
                }
                path.pop();
                continue;
            }
            Ok(Event::Eof) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, position = reader.buffer_position(), "Malformed scanner XML, discarding findings.");
                return Vec::new();
            }
        };

        let name = element.name().as_ref().to_vec();
        match (path.len(), name.as_slice()) {
            (3, b"port") if path[1] == b"host" && path[2] == b"ports" => {
                let draft = PortDraft::from_element(&element);
                if is_empty {
                    findings.extend(draft.finish());
                } else {
                    current = Some(draft);
                }
            }
            (4, b"state") => {
                if let Some(draft) = current.as_mut() {
                    draft.state = attr(&element, b"state");
                }
            }
            (4, b"service") => {
                if let Some(draft) = current.as_mut() {
                    let name = attr(&element, b"name").unwrap_or_else(|| UNKNOWN.to_string());
                    draft.service = Some((name, attr(&element, b"product")));
                }
            }
            _ => {}
        }

        if !is_empty {
            path.push(name);
        }
    }

    if !path.is_empty() {
        warn!("Scanner XML ended before the document was closed, discarding findings.");
        return Vec::new();
    }

    debug!(count = findings.len(), "Parsed scanner output.");
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -T4 -A -oX - example.com" version="7.94">
  <scaninfo type="syn" protocol="tcp" numservices="1000" services="1-1000"/>
  <host starttime="1" endtime="2">
    <status state="up" reason="syn-ack"/>
    <address addr="93.184.216.34" addrtype="ipv4"/>
    <ports>
      <extraports state="filtered" count="996"/>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack" reason_ttl="0"/>
        <service name="ssh" product="OpenSSH" version="8.9p1" method="probed" conf="10">
          <cpe>cpe:/a:openbsd:openssh:8.9p1</cpe>
        </service>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack"/>
        <service name="http" method="table" conf="3"/>
      </port>
      <port protocol="udp" portid="9999">
        <state state="closed" reason="reset"/>
      </port>
    </ports>
    <os><osmatch name="Linux 5.X" accuracy="95"/></os>
  </host>
  <runstats><finished time="2" exit="success"/></runstats>
</nmaprun>"#;

    #[test]
    fn parses_ports_with_and_without_service() {
        let findings = parse_nmap_xml(SAMPLE);
        assert_eq!(findings.len(), 3);

        assert_eq!(
            findings[0],
            PortFinding {
                protocol: "tcp".into(),
                port: "22".into(),
                state: "open".into(),
                service: "ssh".into(),
                product: Some("OpenSSH".into()),
            }
        );
        // Service element present but no product attribute.
        assert_eq!(findings[1].service, "http");
        assert_eq!(findings[1].product, None);
        // No service element at all.
        assert_eq!(findings[2].protocol, "udp");
        assert_eq!(findings[2].state, "closed");
        assert_eq!(findings[2].service, "unknown");
        assert_eq!(findings[2].product.as_deref(), Some("unknown"));
    }

    #[test]
    fn empty_output_is_an_empty_scan() {
        assert!(parse_nmap_xml("").is_empty());
        assert!(parse_nmap_xml("  \n ").is_empty());
    }

    #[test]
    fn host_without_ports_is_an_empty_scan() {
        let xml = r#"<nmaprun><host><status state="down"/></host><runstats/></nmaprun>"#;
        assert!(parse_nmap_xml(xml).is_empty());
    }

    #[test]
    fn malformed_output_yields_no_findings() {
        let truncated = &SAMPLE[..SAMPLE.find("</ports>").unwrap()];
        assert!(parse_nmap_xml(truncated).is_empty());
        assert!(parse_nmap_xml("<nmaprun><host></ports></nmaprun>").is_empty());
    }

    #[test]
    fn ignores_ports_outside_host_ports() {
        let xml = r#"<nmaprun>
            <port protocol="tcp" portid="1"><state state="open"/></port>
            <host><ports><port protocol="tcp" portid="443"><state state="open"/></port></ports></host>
        </nmaprun>"#;
        let findings = parse_nmap_xml(xml);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].port, "443");
    }

    #[tokio::test]
    async fn missing_binary_reports_tool_error() {
        let scanner = NmapScanner::new("/nonexistent/definitely-not-nmap", None);
        let target = Target::parse("example.com").unwrap();
        let outcome = scanner.scan(&target).await;
        assert_eq!(outcome.findings, None);
        let error = outcome.error.unwrap();
        assert!(error.starts_with("Nmap scan failed:"), "{error}");
        assert!(error.contains("not found"), "{error}");
    }

    #[tokio::test]
    async fn option_like_target_is_never_passed_to_the_scanner() {
        let scanner = NmapScanner::new("/nonexistent/definitely-not-nmap", None);
        let target = Target::parse("-iLetc.com").unwrap();
        let outcome = scanner.scan(&target).await;
        assert_eq!(outcome.findings, None);
        assert!(outcome.error.unwrap().contains("would be read as an option"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_scanner_is_killed_at_the_timeout() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("slow-nmap.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let scanner = NmapScanner::new(script.to_string_lossy(), Some(Duration::from_millis(300)));
        let target = Target::parse("example.com").unwrap();
        let started = std::time::Instant::now();
        // A concurrent fork elsewhere in the test binary can briefly hold the
        // freshly written script open (ETXTBSY).
        let mut outcome = scanner.scan(&target).await;
        for _ in 0..5 {
            if !outcome.error.as_deref().is_some_and(|e| e.contains("busy")) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            outcome = scanner.scan(&target).await;
        }

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.findings, None);
        let error = outcome.error.unwrap();
        assert!(error.contains("timed out after 300ms"), "{error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_reports_tool_error() {
        // `false` ignores its arguments and exits 1.
        let scanner = NmapScanner::new("false", Some(Duration::from_secs(10)));
        let target = Target::parse("203.0.113.5").unwrap();
        let outcome = scanner.scan(&target).await;
        assert_eq!(outcome.findings, None);
        assert!(outcome.error.unwrap().contains("exited with status 1"));
    }
}
