use crate::errors::ProbeFailure;
use crate::model::ServiceRecord;
use crate::signature::normalize_service;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

/// Run an external tool, killing it if the deadline passes first
async fn run_tool(mut command: Command, tool: &str, limit: Duration) -> Result<Output, ProbeFailure> {
    command.kill_on_drop(true);
    match timeout(limit, command.output()).await {
        Err(_) => Err(ProbeFailure::Timeout),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(tool, "external tool not installed");
            Err(ProbeFailure::ToolUnavailable(tool.to_string()))
        }
        Ok(Err(e)) => Err(ProbeFailure::ToolFailed(format!("{}: {}", tool, e))),
        Ok(Ok(output)) => Ok(output),
    }
}

/// TCP/UDP connect and banner helpers
pub mod tcp {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpStream, UdpSocket};

    /// Service-specific probe that makes a quiet service talk
    pub fn service_probe(port: u16) -> Option<&'static [u8]> {
        match port {
            80 | 5000 | 8000 | 8008 | 8060 | 8080 => Some(
                b"HEAD / HTTP/1.1\r\nHost: netprint\r\nUser-Agent: netprint/0.1\r\nConnection: close\r\n\r\n"
                    .as_slice(),
            ),
            443 | 8443 => Some(b"GET / HTTP/1.1\r\nHost: netprint\r\nConnection: close\r\n\r\n".as_slice()),
            21 => Some(b"HELP\r\n".as_slice()),
            25 => Some(b"EHLO netprint.local\r\n".as_slice()),
            110 => Some(b"USER test\r\n".as_slice()),
            143 => Some(b"A001 CAPABILITY\r\n".as_slice()),
            22 => None, // SSH sends banner immediately
            _ => None,
        }
    }

    /// First five non-empty lines, trimmed and joined.
    pub fn clean_banner(raw: &[u8]) -> Option<String> {
        let text = String::from_utf8_lossy(raw);
        let cleaned = text
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .take(5)
            .collect::<Vec<&str>>()
            .join(" | ");
        if cleaned.is_empty() {
            None
        } else {
            Some(cleaned)
        }
    }

    /// Connect to `ip:port` and try to read a banner.
    ///
    /// `Ok(None)` means the port is open but said nothing in time.
    pub async fn probe_tcp(
        ip: IpAddr,
        port: u16,
        connect_timeout: Duration,
        banner_timeout: Duration,
    ) -> Result<Option<String>, ProbeFailure> {
        let mut stream = match timeout(connect_timeout, TcpStream::connect((ip, port))).await {
            Err(_) => return Err(ProbeFailure::Timeout),
            Ok(Err(e)) => return Err(ProbeFailure::from_io(&e)),
            Ok(Ok(stream)) => stream,
        };

        if let Some(probe) = service_probe(port) {
            if timeout(connect_timeout, stream.write_all(probe)).await.is_err() {
                return Ok(None);
            }
        }

        let mut buf = vec![0; 2048];
        match timeout(banner_timeout, stream.read(&mut buf)).await {
            Ok(Ok(count)) if count > 0 => Ok(clean_banner(&buf[..count])),
            _ => Ok(None),
        }
    }

    /// Payload that should get an answer from a UDP service
    pub fn udp_payload(port: u16, snmp_community: &str) -> Option<Vec<u8>> {
        match port {
            161 => snmp_sysdescr_request(snmp_community),
            _ => None,
        }
    }

    /// SNMP v2c GetRequest for sysDescr (1.3.6.1.2.1.1.1.0), BER encoded.
    pub fn snmp_sysdescr_request(community: &str) -> Option<Vec<u8>> {
        const PDU: [u8; 30] = [
            0xA0, 0x1C, // GetRequest-PDU, len 28
            0x02, 0x04, 0x6E, 0x70, 0x72, 0x74, // request-id
            0x02, 0x01, 0x00, // error-status 0
            0x02, 0x01, 0x00, // error-index 0
            0x30, 0x0E, // VarBindList, len 14
            0x30, 0x0C, // VarBind, len 12
            0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, // sysDescr
            0x05, 0x00, // NULL
        ];
        let community = community.as_bytes();
        let body_len = 3 + 2 + community.len() + PDU.len();
        // Short-form BER lengths only
        if body_len > 0x7F {
            return None;
        }

        let mut packet = Vec::with_capacity(body_len + 2);
        packet.extend_from_slice(&[0x30, body_len as u8]);
        packet.extend_from_slice(&[0x02, 0x01, 0x01]); // version 2c
        packet.extend_from_slice(&[0x04, community.len() as u8]);
        packet.extend_from_slice(community);
        packet.extend_from_slice(&PDU);
        Some(packet)
    }

    /// Send `payload` to a UDP port and wait for any reply.
    pub async fn probe_udp(
        ip: IpAddr,
        port: u16,
        payload: &[u8],
        wait: Duration,
    ) -> Result<Vec<u8>, ProbeFailure> {
        let local: SocketAddr = match ip {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)
            .await
            .map_err(|e| ProbeFailure::from_io(&e))?;
        socket
            .send_to(payload, (ip, port))
            .await
            .map_err(|e| ProbeFailure::from_io(&e))?;

        let mut buf = [0u8; 1500];
        match timeout(wait, socket.recv_from(&mut buf)).await {
            Err(_) => Err(ProbeFailure::NoResponse),
            Ok(Err(e)) => Err(ProbeFailure::from_io(&e)),
            Ok(Ok((len, from))) if from.ip() == ip && len > 0 => Ok(buf[..len].to_vec()),
            Ok(Ok(_)) => Err(ProbeFailure::NoResponse),
        }
    }

}

/// SNMP query capability and its `snmpget` adapter
pub mod snmp {
    use super::*;

    /// What to ask an SNMP agent
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SnmpRequest {
        pub community: String,
        pub oids: Vec<String>,
    }

    #[async_trait]
    pub trait SnmpQuery: Send + Sync {
        /// Fetch the requested OIDs; missing OIDs are simply absent from the map.
        async fn get(
            &self,
            target: IpAddr,
            request: &SnmpRequest,
            timeout: Duration,
        ) -> Result<BTreeMap<String, String>, ProbeFailure>;
    }

    /// Net-SNMP `snmpget` run as a child process
    #[derive(Debug, Clone)]
    pub struct SnmpGetCommand {
        program: String,
    }

    impl Default for SnmpGetCommand {
        fn default() -> Self {
            Self {
                program: "snmpget".to_string(),
            }
        }
    }

    impl SnmpGetCommand {
        pub fn new(program: impl Into<String>) -> Self {
            Self {
                program: program.into(),
            }
        }
    }

    #[async_trait]
    impl SnmpQuery for SnmpGetCommand {
        async fn get(
            &self,
            target: IpAddr,
            request: &SnmpRequest,
            limit: Duration,
        ) -> Result<BTreeMap<String, String>, ProbeFailure> {
            let agent = match target {
                IpAddr::V4(v4) => v4.to_string(),
                IpAddr::V6(v6) => format!("udp6:[{}]", v6),
            };
            let seconds = limit.as_secs().max(1).to_string();

            let mut command = Command::new(&self.program);
            command
                .args(["-v2c", "-c", request.community.as_str(), "-On", "-Oq"])
                .args(["-t", seconds.as_str(), "-r", "0"])
                .arg(&agent)
                .args(&request.oids);

            let output = run_tool(command, &self.program, limit).await?;
            let stdout = String::from_utf8_lossy(&output.stdout);
            let values = parse_snmpget_output(&stdout);

            if !output.status.success() && values.is_empty() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if stderr.contains("Timeout") {
                    return Err(ProbeFailure::Timeout);
                }
                let first = stderr.lines().next().unwrap_or("non-zero exit").trim();
                return Err(ProbeFailure::ToolFailed(first.to_string()));
            }
            debug!(%target, values = values.len(), "snmpget answered");
            Ok(values)
        }
    }

    /// Parse `snmpget -On -Oq` output: one `.OID value` pair per line.
    pub fn parse_snmpget_output(output: &str) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        for line in output.lines() {
            let Some((oid, value)) = line.trim().split_once(char::is_whitespace) else {
                continue;
            };
            let oid = oid.trim_start_matches('.');
            if oid.is_empty() || !oid.chars().all(|c| c.is_ascii_digit() || c == '.') {
                continue;
            }
            let value = value.trim().trim_matches('"');
            if value.starts_with("No Such") || value.starts_with("No more variables") {
                continue;
            }
            values.insert(oid.to_string(), value.to_string());
        }
        values
    }

}

/// mDNS / DNS-SD query capability, backed by avahi or an in-process browser
pub mod mdns {
    use super::*;
    use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};

    #[async_trait]
    pub trait MdnsQuery: Send + Sync {
        /// Service instances advertised from `target`, restricted to
        /// `services` when that list is non-empty.
        async fn browse(
            &self,
            target: IpAddr,
            services: &[String],
            timeout: Duration,
        ) -> Result<Vec<ServiceRecord>, ProbeFailure>;
    }

    /// `avahi-browse -a -k -p -r -t` run as a child process
    #[derive(Debug, Clone)]
    pub struct AvahiBrowseCommand {
        program: String,
    }

    impl Default for AvahiBrowseCommand {
        fn default() -> Self {
            Self {
                program: "avahi-browse".to_string(),
            }
        }
    }

    impl AvahiBrowseCommand {
        pub fn new(program: impl Into<String>) -> Self {
            Self {
                program: program.into(),
            }
        }
    }

    #[async_trait]
    impl MdnsQuery for AvahiBrowseCommand {
        async fn browse(
            &self,
            target: IpAddr,
            services: &[String],
            limit: Duration,
        ) -> Result<Vec<ServiceRecord>, ProbeFailure> {
            let mut command = Command::new(&self.program);
            command.args(["-a", "-k", "-p", "-r", "-t"]);

            let output = run_tool(command, &self.program, limit).await?;
            if !output.status.success() && output.stdout.is_empty() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let first = stderr.lines().next().unwrap_or("non-zero exit").trim();
                return Err(ProbeFailure::ToolFailed(first.to_string()));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(parse_avahi_output(&stdout, target, services))
        }
    }

    /// Resolved (`=`) lines of parsable avahi-browse output for one address.
    ///
    /// Line layout: `=;iface;proto;name;type;domain;host;address;port;txt`.
    pub fn parse_avahi_output(output: &str, target: IpAddr, services: &[String]) -> Vec<ServiceRecord> {
        let wanted: Vec<String> = services.iter().map(|s| normalize_service(s)).collect();
        let mut records = Vec::new();

        for line in output.lines() {
            let fields: Vec<&str> = line.splitn(10, ';').collect();
            if fields.len() < 9 || fields[0] != "=" {
                continue;
            }
            let address = fields[7].split('%').next().unwrap_or_default();
            if address.parse::<IpAddr>().ok() != Some(target) {
                continue;
            }
            let service_type = normalize_service(&unescape_label(fields[4]));
            if !wanted.is_empty() && !wanted.contains(&service_type) {
                continue;
            }

            let hostname = fields[6].trim_end_matches('.');
            records.push(ServiceRecord {
                service_type,
                instance: unescape_label(fields[3]),
                hostname: (!hostname.is_empty()).then(|| hostname.to_string()),
                port: fields[8].parse().ok(),
                txt: fields.get(9).map(|t| parse_txt(t)).unwrap_or_default(),
            });
        }

        records.sort();
        records.dedup();
        records
    }

    /// Undo avahi's label escaping (`\032` decimal bytes, `\.` literals).
    pub fn unescape_label(label: &str) -> String {
        let bytes = label.as_bytes();
        let mut out = Vec::with_capacity(bytes.len());
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\\' && i + 1 < bytes.len() {
                let digits = &bytes[i + 1..bytes.len().min(i + 4)];
                if digits.len() == 3 && digits.iter().all(u8::is_ascii_digit) {
                    let value = digits
                        .iter()
                        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
                    if let Ok(byte) = u8::try_from(value) {
                        out.push(byte);
                        i += 4;
                        continue;
                    }
                }
                out.push(bytes[i + 1]);
                i += 2;
                continue;
            }
            out.push(bytes[i]);
            i += 1;
        }
        String::from_utf8_lossy(&out).into_owned()
    }

    /// `"k=v" "flag"` TXT strings; a bare flag maps to an empty value.
    pub fn parse_txt(raw: &str) -> BTreeMap<String, String> {
        let mut txt = BTreeMap::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = raw.chars();

        while let Some(c) = chars.next() {
            match c {
                '"' if in_quotes => {
                    insert_txt(&mut txt, &current);
                    current.clear();
                    in_quotes = false;
                }
                '"' => in_quotes = true,
                '\\' if in_quotes => {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                _ if in_quotes => current.push(c),
                _ => {}
            }
        }
        txt
    }

    fn insert_txt(txt: &mut BTreeMap<String, String>, entry: &str) {
        if entry.is_empty() {
            return;
        }
        let (key, value) = entry.split_once('=').unwrap_or((entry, ""));
        txt.entry(key.to_ascii_lowercase())
            .or_insert_with(|| value.to_string());
    }

    /// Record for a resolved service, if it is advertised from `target`
    fn resolved_record(
        info: &ServiceInfo,
        service_type: &str,
        full_type: &str,
        target: IpAddr,
    ) -> Option<ServiceRecord> {
        if !info.get_addresses().iter().any(|ip| *ip == target) {
            return None;
        }
        let instance = info
            .get_fullname()
            .trim_end_matches(full_type)
            .trim_end_matches('.')
            .to_string();
        let hostname = info.get_hostname().trim_end_matches('.').to_string();
        let txt = info
            .get_properties()
            .iter()
            .map(|p| (p.key().to_ascii_lowercase(), p.val_str().to_string()))
            .collect();
        Some(ServiceRecord {
            service_type: service_type.to_string(),
            instance,
            hostname: (!hostname.is_empty()).then_some(hostname),
            port: Some(info.get_port()),
            txt,
        })
    }

    /// In-process multicast browser
    #[derive(Debug, Clone, Default)]
    pub struct MdnsSdBrowser;

    #[async_trait]
    impl MdnsQuery for MdnsSdBrowser {
        async fn browse(
            &self,
            target: IpAddr,
            services: &[String],
            limit: Duration,
        ) -> Result<Vec<ServiceRecord>, ProbeFailure> {
            let daemon =
                ServiceDaemon::new().map_err(|e| ProbeFailure::ToolUnavailable(e.to_string()))?;
            let total_deadline = Instant::now() + limit;
            let share = limit / services.len().max(1) as u32;
            let mut records = Vec::new();

            for service in services {
                let service_type = normalize_service(service);
                let full_type = format!("{}.local.", service_type);
                let service_deadline = std::cmp::min(Instant::now() + share, total_deadline);

                let receiver = match daemon.browse(&full_type) {
                    Ok(receiver) => receiver,
                    Err(e) => {
                        warn!(service = %full_type, error = %e, "mDNS browse failed");
                        continue;
                    }
                };

                loop {
                    let now = Instant::now();
                    if now >= service_deadline {
                        break;
                    }
                    match timeout(service_deadline - now, receiver.recv_async()).await {
                        Ok(Ok(ServiceEvent::ServiceResolved(info))) => {
                            if let Some(record) = resolved_record(&info, &service_type, &full_type, target) {
                                records.push(record);
                            }
                        }
                        Ok(Ok(_)) => continue,
                        Ok(Err(_)) | Err(_) => break,
                    }
                }

                daemon.stop_browse(&full_type).ok();
                if Instant::now() >= total_deadline {
                    break;
                }
            }

            daemon.shutdown().ok();
            records.sort();
            records.dedup();
            Ok(records)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const OUTPUT: &str = "\
+;eth0;IPv4;Living\\032Room;_googlecast._tcp;local
=;eth0;IPv4;Living\\032Room;_googlecast._tcp;local;Chromecast-abc.local;192.168.1.20;8009;\"id=abc\" \"md=Chromecast Ultra\" \"fn=Living Room\"
=;eth0;IPv4;Office;_ipp._tcp;local;printer.local;192.168.1.30;631;\"ty=HP LaserJet\"
=;eth0;IPv4;Kitchen;_airplay._tcp;local;kitchen.local;192.168.1.20;7000;\"model=AudioAccessory5,1\"
";

        #[test]
        fn keeps_resolved_records_of_target() {
            let target: IpAddr = "192.168.1.20".parse().unwrap();
            let records = parse_avahi_output(OUTPUT, target, &[]);
            assert_eq!(records.len(), 2);
            let cast = records
                .iter()
                .find(|r| r.service_type == "_googlecast._tcp")
                .unwrap();
            assert_eq!(cast.instance, "Living Room");
            assert_eq!(cast.port, Some(8009));
            assert_eq!(cast.txt["md"], "Chromecast Ultra");
            assert_eq!(cast.hostname.as_deref(), Some("Chromecast-abc.local"));
        }

        #[test]
        fn filters_by_requested_service() {
            let target: IpAddr = "192.168.1.20".parse().unwrap();
            let records = parse_avahi_output(OUTPUT, target, &["_airplay._tcp.local.".to_string()]);
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].txt["model"], "AudioAccessory5,1");
        }

        #[test]
        fn resolved_service_must_come_from_target() {
            let properties = [("MD", "Chromecast"), ("id", "abc")];
            let info = ServiceInfo::new(
                "_googlecast._tcp.local.",
                "Living Room",
                "chromecast.local.",
                "192.168.1.20",
                8009,
                &properties[..],
            )
            .unwrap();

            let target: IpAddr = "192.168.1.20".parse().unwrap();
            let record =
                resolved_record(&info, "_googlecast._tcp", "_googlecast._tcp.local.", target).unwrap();
            assert_eq!(record.instance, "Living Room");
            assert_eq!(record.hostname.as_deref(), Some("chromecast.local"));
            assert_eq!(record.port, Some(8009));
            assert_eq!(record.txt["md"], "Chromecast");

            let other: IpAddr = "192.168.1.21".parse().unwrap();
            assert!(resolved_record(&info, "_googlecast._tcp", "_googlecast._tcp.local.", other).is_none());
        }

        #[test]
        fn txt_flags_and_escapes() {
            let txt = parse_txt("\"a=1\" \"flag\" \"q=say \\\"hi\\\"\"");
            assert_eq!(txt["a"], "1");
            assert_eq!(txt["flag"], "");
            assert_eq!(txt["q"], "say \"hi\"");
            assert_eq!(unescape_label("A\\032B\\.C"), "A B.C");
        }
    }
}
