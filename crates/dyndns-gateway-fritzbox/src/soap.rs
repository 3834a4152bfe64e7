//! SOAP envelopes for the WANIPConnection service and their responses

use dyndns_core::{Error, Ipv6Prefix, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// UPnP service type all actions belong to
pub const SERVICE: &str = "urn:schemas-upnp-org:service:WANIPConnection:1";

/// Control URL path of the service
pub const CONTROL_PATH: &str = "/igdupnp/control/WANIPConn1";

/// The actions this client calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ExternalIpv4,
    ExternalIpv6,
    Ipv6Prefix,
}

impl Action {
    pub fn name(self) -> &'static str {
        match self {
            Action::ExternalIpv4 => "GetExternalIPAddress",
            Action::ExternalIpv6 => "X_AVM_DE_GetExternalIPv6Address",
            Action::Ipv6Prefix => "X_AVM_DE_GetIPv6Prefix",
        }
    }

    /// Value of the `SoapAction` header
    pub fn header(self) -> String {
        format!("{}#{}", SERVICE, self.name())
    }

    /// Request envelope (the actions take no arguments)
    pub fn envelope(self) -> String {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"utf-8\"?>",
                "<s:Envelope s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\" ",
                "xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\">",
                "<s:Body><u:{action} xmlns:u=\"{service}\" /></s:Body>",
                "</s:Envelope>"
            ),
            action = self.name(),
            service = SERVICE
        )
    }
}

/// Collect the text of every element, keyed by local name
///
/// Namespace prefixes are dropped. Elements without text map to "".
pub fn fields(xml: &str) -> Result<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = HashMap::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                fields.entry(name.clone()).or_insert_with(String::new);
                current = Some(name);
            }
            Ok(Event::Empty(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                fields.entry(name).or_insert_with(String::new);
            }
            Ok(Event::Text(t)) => {
                if let Some(name) = &current {
                    let text = t
                        .unescape()
                        .map_err(|e| Error::source(format!("Malformed SOAP text: {}", e)))?;
                    fields.insert(name.clone(), text.into_owned());
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(Error::source(format!(
                    "Malformed SOAP response at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    Ok(fields)
}

/// Describe a SOAP fault, if the response is one
pub fn fault(fields: &HashMap<String, String>) -> Option<String> {
    if !fields.contains_key("Fault") {
        return None;
    }

    let code = fields.get("errorCode").map(String::as_str).unwrap_or("?");
    let description = fields
        .get("errorDescription")
        .or_else(|| fields.get("faultstring"))
        .map(String::as_str)
        .unwrap_or("unknown fault");

    Some(format!("{} (UPnP error {})", description, code))
}

fn field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(|v| v.trim())
        .ok_or_else(|| Error::source(format!("SOAP response lacks {}", name)))
}

/// A zero or absent valid lifetime means IPv6 is disabled on the gateway
fn ipv6_disabled(fields: &HashMap<String, String>) -> bool {
    fields
        .get("NewValidLifetime")
        .map(|v| v.trim())
        .is_none_or(|v| v.is_empty() || v == "0")
}

/// `GetExternalIPAddress`: empty or unspecified means the WAN is down
pub fn parse_ipv4(fields: &HashMap<String, String>) -> Result<Option<Ipv4Addr>> {
    let value = field(fields, "NewExternalIPAddress")?;
    if value.is_empty() {
        return Ok(None);
    }

    let ip: Ipv4Addr = value
        .parse()
        .map_err(|_| Error::source(format!("Gateway returned invalid IPv4 '{}'", value)))?;

    Ok((!ip.is_unspecified()).then_some(ip))
}

/// `X_AVM_DE_GetExternalIPv6Address`
pub fn parse_ipv6(fields: &HashMap<String, String>) -> Result<Option<Ipv6Addr>> {
    if ipv6_disabled(fields) {
        return Ok(None);
    }

    let value = field(fields, "NewExternalIPv6Address")?;
    if value.is_empty() {
        return Ok(None);
    }

    let ip: Ipv6Addr = value
        .parse()
        .map_err(|_| Error::source(format!("Gateway returned invalid IPv6 '{}'", value)))?;

    Ok((!ip.is_unspecified()).then_some(ip))
}

/// `X_AVM_DE_GetIPv6Prefix`
pub fn parse_prefix(fields: &HashMap<String, String>) -> Result<Option<Ipv6Prefix>> {
    if ipv6_disabled(fields) {
        return Ok(None);
    }

    let base = field(fields, "NewIPv6Prefix")?;
    if base.is_empty() {
        return Ok(None);
    }

    let base: Ipv6Addr = base
        .parse()
        .map_err(|_| Error::source(format!("Gateway returned invalid IPv6 prefix '{}'", base)))?;
    let len = field(fields, "NewPrefixLength")?;
    let len: u8 = len
        .parse()
        .map_err(|_| Error::source(format!("Gateway returned invalid prefix length '{}'", len)))?;

    Ipv6Prefix::new(base, len).map(Some)
}
