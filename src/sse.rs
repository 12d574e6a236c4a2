//! Incremental decoder for `text/event-stream` bodies.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub event: String,
    pub data: String,
    pub id: Option<String>,
}

/// Longest line kept; longer lines are dropped.
pub const MAX_LINE: usize = 1 << 20;

#[derive(Debug)]
pub struct Decoder {
    line: Vec<u8>,
    max_line: usize,
    overflow: bool,
    after_cr: bool,
    started: bool,
    event: String,
    data: String,
    last_id: Option<String>,
    retry: Option<Duration>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE)
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            line: Vec::new(),
            max_line,
            overflow: false,
            after_cr: false,
            started: false,
            event: String::new(),
            data: String::new(),
            last_id: None,
            retry: None,
        }
    }
    /// Reconnection time last announced by the server, if any.
    pub fn retry(&self) -> Option<Duration> {
        self.retry
    }
    /// Feed a chunk of the body and collect every event it completes.
    /// Partial lines are kept until the next chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in chunk {
            match byte {
                b'\n' if self.after_cr => {
                    self.after_cr = false;
                }
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    if std::mem::take(&mut self.overflow) {
                        continue;
                    }
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ => {
                    self.after_cr = false;
                    if self.overflow {
                        continue;
                    }
                    if self.line.len() >= self.max_line {
                        log::warn!("drop event stream line longer than {} bytes", self.max_line);
                        self.line = Vec::new();
                        self.overflow = true;
                        continue;
                    }
                    self.line.push(byte);
                }
            }
        }
        events
    }
    fn process_line(&mut self, line: &[u8]) -> Option<Event> {
        let mut line = String::from_utf8_lossy(line).into_owned();
        if !self.started {
            self.started = true;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_str(), ""),
        };
        match field {
            "event" => self.event = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(millis) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(millis));
                }
            }
            _ => log::debug!("ignore event stream field: {field}"),
        }
        None
    }
    fn dispatch(&mut self) -> Option<Event> {
        let event = std::mem::take(&mut self.event);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        data.pop();
        Some(Event {
            event: if event.is_empty() {
                String::from("message")
            } else {
                event
            },
            data,
            id: self.last_id.clone(),
        })
    }
}
