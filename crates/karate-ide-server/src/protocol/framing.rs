//! Line framing and classification of runner output.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use super::{EventDecodeError, ExecutionEvent};

/// Prefix marking a structured event line.
pub const EVENT_SENTINEL: &str = "##vscode ";

static READY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:debug|test) server started.*?(\d+)\s*$").unwrap_or_else(|_| unreachable!())
});

/// Reassembles newline-delimited lines from arbitrarily chunked output.
///
/// Bytes are buffered until a `\n` arrives, so both partial lines and UTF-8
/// sequences split across chunks come out intact. A trailing `\r` is
/// stripped from each line.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }
        lines
    }

    /// Flush the unterminated tail, if any, once the stream has closed.
    #[must_use]
    pub fn finish(self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let mut tail = self.pending;
        if tail.last() == Some(&b'\r') {
            tail.pop();
        }
        Some(String::from_utf8_lossy(&tail).into_owned())
    }
}

/// One line of runner stdout, classified.
#[derive(Debug)]
pub enum OutputLine<'a> {
    /// A structured execution event.
    Event(Box<ExecutionEvent>),
    /// Plain output destined for the log sink.
    Raw(&'a str),
    /// A sentinel line whose payload could not be decoded.
    Malformed(EventDecodeError),
}

/// Classify a single stdout line.
///
/// The JSON payload runs from the `{` after [`EVENT_SENTINEL`] through the
/// last `}` on the line, so trailing noise after the object is ignored.
///
/// # Examples
///
/// ```
/// use karate_ide_server::protocol::{OutputLine, classify_output};
///
/// let line = r#"##vscode {"event":"testSuiteStarted"}"#;
/// assert!(matches!(classify_output(line), OutputLine::Event(_)));
/// assert!(matches!(classify_output("12:00 INFO hello"), OutputLine::Raw(_)));
/// ```
#[must_use]
pub fn classify_output(line: &str) -> OutputLine<'_> {
    let Some(payload) = line
        .strip_prefix(EVENT_SENTINEL)
        .filter(|rest| rest.starts_with('{'))
    else {
        return OutputLine::Raw(line);
    };
    let Some(json) = payload.rfind('}').and_then(|end| payload.get(..=end)) else {
        return OutputLine::Malformed(EventDecodeError::MissingPayload);
    };
    match serde_json::from_str::<ExecutionEvent>(json) {
        Ok(event) => OutputLine::Event(Box::new(event)),
        Err(err) => OutputLine::Malformed(err.into()),
    }
}

/// Extract the port from a runner readiness line.
///
/// Readiness lines contain `debug server started` or `test server started`
/// and end with the bound port number.
#[must_use]
pub fn readiness_port(line: &str) -> Option<u16> {
    READY_RE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|port| port.as_str().parse().ok())
}

/// Short feature name for progress messages: the file stem of a hint.
#[must_use]
pub fn feature_name(location_hint: &str) -> &str {
    Path::new(location_hint)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(location_hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::EventKind;
    use rstest::rstest;

    #[test]
    fn framer_joins_partial_lines_across_chunks() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"##vscode {\"ev").is_empty());
        let lines = framer.push(b"ent\":\"x\"}\r\nnext\npart");
        assert_eq!(lines, vec!["##vscode {\"event\":\"x\"}", "next"]);
        assert_eq!(framer.finish().as_deref(), Some("part"));
    }

    #[test]
    fn framer_keeps_split_utf8_sequences_intact() {
        let mut framer = LineFramer::new();
        let bytes = "héllo\n".as_bytes();
        let (head, tail) = bytes.split_at(2);
        assert!(framer.push(head).is_empty());
        assert_eq!(framer.push(tail), vec!["héllo"]);
        assert!(framer.finish().is_none());
    }

    #[test]
    fn framer_emits_empty_lines() {
        let mut framer = LineFramer::new();
        assert_eq!(framer.push(b"a\n\nb\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn classify_decodes_events_and_ignores_trailing_noise() {
        let line = r#"##vscode {"event":"featureStarted","locationHint":"f.feature","name":"F"} tail"#;
        let OutputLine::Event(event) = classify_output(line) else {
            panic!("expected an event");
        };
        assert_eq!(event.event, EventKind::FeatureStarted);
        assert_eq!(event.name.as_deref(), Some("F"));
    }

    #[rstest]
    #[case("##vscode {not json}")]
    #[case("##vscode {\"event\":")]
    fn classify_reports_malformed_payloads(#[case] line: &str) {
        assert!(matches!(classify_output(line), OutputLine::Malformed(_)));
    }

    #[rstest]
    #[case("plain output")]
    #[case("##vscode")]
    #[case(" ##vscode {\"event\":\"testStarted\"}")]
    fn classify_treats_other_lines_as_raw(#[case] line: &str) {
        assert!(matches!(classify_output(line), OutputLine::Raw(raw) if raw == line));
    }

    #[rstest]
    #[case("Karate debug server started on port 4711", Some(4711))]
    #[case("test server started: 8080  ", Some(8080))]
    #[case("test server starting: 8080", None)]
    #[case("debug server started", None)]
    fn readiness_port_reads_trailing_digits(#[case] line: &str, #[case] expected: Option<u16>) {
        assert_eq!(readiness_port(line), expected);
    }

    #[rstest]
    #[case("classpath:features/users.feature:12", "users")]
    #[case("users.feature", "users")]
    fn feature_name_is_the_file_stem(#[case] hint: &str, #[case] expected: &str) {
        assert_eq!(feature_name(hint), expected);
    }
}
