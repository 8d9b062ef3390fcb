use chrono::Local;
use std::fs::{self, File};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::warn;

use rdt_abstract::peek_header;

/// What happened to a frame at the channel boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceAction {
    Sent,
    Dropped,
    Received,
}

impl TraceAction {
    fn label(self) -> &'static str {
        match self {
            TraceAction::Sent => "SENT",
            TraceAction::Dropped => "DROPPED",
            TraceAction::Received => "RECEIVED",
        }
    }
}

/// Wireshark-like packet trace, one line per channel action:
///
/// ```text
/// HH:MM:SS.mmm ACTION   (host:port) -> (host:port) - TYPE [SEQ=x, LEN=y]
/// ```
///
/// The file is truncated when created and appended per action. Clones share
/// the underlying file, so every channel of a process can write to one
/// trace. [`TraceLog::disabled`] is a no-op sink for callers that want no
/// file at all.
#[derive(Clone)]
pub struct TraceLog {
    sink: Option<Arc<Mutex<File>>>,
}

impl TraceLog {
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        Ok(Self {
            sink: Some(Arc::new(Mutex::new(file))),
        })
    }

    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn record(&self, action: TraceAction, src: SocketAddr, dst: SocketAddr, frame: &[u8]) {
        let Some(sink) = &self.sink else { return };

        let timestamp = Local::now().format("%H:%M:%S%.3f");
        let line = match peek_header(frame) {
            Some((packet_type, seq, len)) => format!(
                "{timestamp} {:<8} ({src}) -> ({dst}) - {:<4} [SEQ={seq}, LEN={len}]\n",
                action.label(),
                packet_type.to_string(),
            ),
            None => format!("{timestamp} {:<8} ({src}) -> ({dst}) - ???\n", action.label()),
        };

        let Ok(mut file) = sink.lock() else { return };
        if let Err(err) = file.write_all(line.as_bytes()) {
            warn!(%err, "trace write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdt_abstract::Packet;
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    fn temp_path(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("rdt-trace-{tag}-{}.log", std::process::id()))
    }

    #[test]
    fn lines_follow_the_wire_format() {
        let path = temp_path("format");
        let trace = TraceLog::create(&path).unwrap();

        let data = Packet::data(0, b"HELLO".to_vec()).encode();
        let ack = Packet::ack(1).encode();
        trace.record(TraceAction::Sent, addr(5001), addr(5000), &data);
        trace.record(TraceAction::Dropped, addr(5001), addr(5000), &data);
        trace.record(TraceAction::Received, addr(5000), addr(5001), &ack);

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("SENT"));
        assert!(
            lines[0].ends_with("(127.0.0.1:5001) -> (127.0.0.1:5000) - DATA [SEQ=0, LEN=5]"),
            "unexpected line: {}",
            lines[0]
        );
        assert!(lines[1].contains("DROPPED"));
        assert!(
            lines[2].ends_with("(127.0.0.1:5000) -> (127.0.0.1:5001) - ACK  [SEQ=1, LEN=3]"),
            "unexpected line: {}",
            lines[2]
        );
        // HH:MM:SS.mmm prefix
        let stamp = lines[0].split_whitespace().next().unwrap();
        assert_eq!(stamp.len(), 12);
        assert_eq!(&stamp[2..3], ":");
        assert_eq!(&stamp[8..9], ".");

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn create_truncates_an_existing_log() {
        let path = temp_path("truncate");
        std::fs::write(&path, "stale contents\n").unwrap();
        let _trace = TraceLog::create(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn disabled_sink_writes_nothing() {
        let trace = TraceLog::disabled();
        let frame = Packet::data(0, b"x".to_vec()).encode();
        trace.record(TraceAction::Sent, addr(1), addr(2), &frame);
    }
}
