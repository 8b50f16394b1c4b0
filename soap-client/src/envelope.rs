//! SOAP 1.1 envelope construction and response scanning.
//!
//! Responses are scanned with a single-pass streaming tokenizer instead of
//! full unmarshalling: devices in the field emit partially-namespaced and
//! occasionally malformed XML, and every scalar this client reads is a
//! single named element's text value.

use quick_xml::events::Event;
use quick_xml::Reader;

use maestro_parser::xml;

/// A structured SOAP fault extracted from a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub code: u16,
    pub description: String,
}

/// Build a SOAP 1.1 envelope for `action` on `service_type`.
///
/// Argument values are entity-escaped; names are trusted (they come from
/// the fixed action tables in this crate).
pub fn build_envelope(service_type: &str, action: &str, args: &[(&str, String)]) -> String {
    let mut payload = String::new();
    for (name, value) in args {
        payload.push('<');
        payload.push_str(name);
        payload.push('>');
        payload.push_str(&xml::escape(value));
        payload.push_str("</");
        payload.push_str(name);
        payload.push('>');
    }

    format!(
        r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action} xmlns:u="{service_type}">{payload}</u:{action}></s:Body></s:Envelope>"#
    )
}

/// Extract the text value of the first element whose local name matches
/// `element`, ignoring namespace prefixes.
///
/// Returns `Some("")` for a present-but-empty element, `None` when the
/// element does not appear. Unbalanced closing tags elsewhere in the
/// document do not abort the scan.
pub fn extract_text(body: &str, element: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    reader.check_end_names(false);

    let target = element.as_bytes();
    let mut inside = false;
    let mut value = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == target => {
                inside = true;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == target => {
                return Some(String::new());
            }
            Ok(Event::Text(t)) if inside => {
                if let Ok(text) = t.unescape() {
                    value.push_str(&text);
                }
            }
            Ok(Event::End(e)) if inside && e.local_name().as_ref() == target => {
                return Some(value);
            }
            Ok(Event::Eof) => return if inside { Some(value) } else { None },
            Ok(_) => {}
            // Tolerate locally-malformed regions; the element we want may
            // still appear later in the document.
            Err(_) => return if inside { Some(value) } else { None },
        }
    }
}

/// Detect a SOAP fault in `body`.
///
/// Devices report UPnP errors via `errorCode`/`errorDescription` inside the
/// fault detail; a bare `faultstring` without a UPnP error code maps to 500.
pub fn parse_fault(body: &str) -> Option<SoapFault> {
    if let Some(code_text) = extract_text(body, "errorCode") {
        let code = code_text.trim().parse().unwrap_or(500);
        let description = extract_text(body, "errorDescription")
            .filter(|d| !d.is_empty())
            .or_else(|| extract_text(body, "faultstring"))
            .unwrap_or_default();
        return Some(SoapFault { code, description });
    }

    extract_text(body, "faultstring").map(|description| SoapFault {
        code: 500,
        description,
    })
}
