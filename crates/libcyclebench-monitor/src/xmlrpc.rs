//! XML-RPC transport for monitoring agents
//!
//! Agents expose three methods, each taking the recording key as its only
//! string parameter: `startRecord`, `stopRecord` and `getXmlResult`.

use std::error::Error as _;
use std::io;
use std::time::Duration;

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::MonitorError;
use crate::target::MonitorTarget;
use crate::MonitorRpc;

pub const METHOD_START_RECORD: &str = "startRecord";
pub const METHOD_STOP_RECORD: &str = "stopRecord";
pub const METHOD_GET_XML_RESULT: &str = "getXmlResult";

/// Blocking XML-RPC client bound to one monitor target
pub struct XmlRpcMonitor {
    agent: ureq::Agent,
    endpoint: String,
    timeout_ms: u64,
}

impl XmlRpcMonitor {
    /// Create a client for the given target
    pub fn new(target: &MonitorTarget, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            endpoint: target.endpoint(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Get the endpoint this client posts to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Perform one call and return the decoded string result
    pub fn call(&self, method: &str, key: &str) -> Result<String, MonitorError> {
        let body = encode_call(method, key);
        debug!(endpoint = %self.endpoint, method, key, "XML-RPC call");

        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "text/xml")
            .send_string(&body)
            .map_err(|e| self.map_transport_error(e))?;

        let text = response.into_string()?;
        decode_response(&text)
    }

    fn map_transport_error(&self, error: ureq::Error) -> MonitorError {
        match error {
            ureq::Error::Status(status, _) => MonitorError::Http { status },
            ureq::Error::Transport(transport) => {
                let io_kind = transport
                    .source()
                    .and_then(|source| source.downcast_ref::<io::Error>())
                    .map(io::Error::kind);
                classify_transport(
                    transport.kind(),
                    io_kind,
                    transport.to_string(),
                    self.timeout_ms,
                )
            }
        }
    }
}

/// Map a transport failure to a monitor error by its kind, never its text
fn classify_transport(
    kind: ureq::ErrorKind,
    io_kind: Option<io::ErrorKind>,
    message: String,
    timeout_ms: u64,
) -> MonitorError {
    let timed_out = matches!(
        io_kind,
        Some(io::ErrorKind::TimedOut) | Some(io::ErrorKind::WouldBlock)
    );
    match kind {
        ureq::ErrorKind::Io | ureq::ErrorKind::ConnectionFailed if timed_out => {
            MonitorError::Timeout(timeout_ms)
        }
        _ => MonitorError::ConnectionFailed(message),
    }
}

impl MonitorRpc for XmlRpcMonitor {
    fn start_record(&self, key: &str) -> Result<(), MonitorError> {
        self.call(METHOD_START_RECORD, key).map(|_| ())
    }

    fn stop_record(&self, key: &str) -> Result<(), MonitorError> {
        self.call(METHOD_STOP_RECORD, key).map(|_| ())
    }

    fn get_xml_result(&self, key: &str) -> Result<String, MonitorError> {
        self.call(METHOD_GET_XML_RESULT, key)
    }
}

/// Build a `methodCall` document with a single string parameter
pub fn encode_call(method: &str, param: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n\
         <methodCall>\n\
         <methodName>{}</methodName>\n\
         <params>\n\
         <param><value><string>{}</string></value></param>\n\
         </params>\n\
         </methodCall>\n",
        escape(method),
        escape(param)
    )
}

/// Decode a `methodResponse` document into its first parameter as text
pub fn decode_response(body: &str) -> Result<String, MonitorError> {
    let mut reader = Reader::from_str(body);
    reader.trim_text(true);

    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut in_fault = false;
    let mut saw_param_value = false;
    let mut result: Option<String> = None;
    let mut member_name: Option<String> = None;
    let mut fault_code = 0i64;
    let mut fault_message = String::new();

    loop {
        let text = match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name().as_ref().to_vec();
                if name == b"fault" {
                    in_fault = true;
                } else if name == b"value" && !in_fault && within(&stack, b"params") {
                    saw_param_value = true;
                }
                stack.push(name);
                continue;
            }
            Event::Empty(e) => {
                if e.name().as_ref() == b"value" && !in_fault && within(&stack, b"params") {
                    saw_param_value = true;
                }
                continue;
            }
            Event::End(_) => {
                stack.pop();
                continue;
            }
            Event::Text(t) => t.unescape()?.into_owned(),
            Event::CData(c) => String::from_utf8_lossy(&c.into_inner()).into_owned(),
            Event::Eof => break,
            _ => continue,
        };

        if stack.last().map(|n| n.as_slice()) == Some(b"name".as_slice()) {
            member_name = Some(text);
        } else if in_fault {
            match member_name.as_deref() {
                Some("faultCode") => fault_code = text.trim().parse().unwrap_or(0),
                Some("faultString") => fault_message = text,
                _ => {}
            }
        } else if result.is_none() && within(&stack, b"params") {
            result = Some(text);
        }
    }

    if in_fault {
        return Err(MonitorError::Fault {
            code: fault_code,
            message: fault_message,
        });
    }

    match result {
        Some(value) => Ok(value),
        None if saw_param_value => Ok(String::new()),
        None => Err(MonitorError::MalformedResponse(
            "methodResponse carries no parameter".to_string(),
        )),
    }
}

fn within(stack: &[Vec<u8>], element: &[u8]) -> bool {
    stack.iter().any(|n| n.as_slice() == element)
}
