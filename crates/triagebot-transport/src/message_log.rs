//! Dated message log writer (§6).
//!
//! One UTF-8 file per UTC date at `logs/messages/messages_YYYY-MM-DD.txt`,
//! opened with a leading BOM, flushed every 10 entries or 5 s (whichever
//! comes first) and on shutdown.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

const BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const FLUSH_EVERY_ENTRIES: u32 = 10;
const FLUSH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn label(&self) -> &'static str {
        match self {
            Direction::Inbound => "INBOUND",
            Direction::Outbound => "OUTBOUND",
        }
    }
}

/// Optional fields rendered after the fixed header (§6 template).
#[derive(Debug, Clone, Default)]
pub struct LogEntryFields {
    pub priority: Option<String>,
    pub content: Option<String>,
    pub media_type: Option<String>,
    pub media_caption: Option<String>,
    pub status: Option<String>,
    pub error: Option<String>,
}

struct OpenFile {
    date: NaiveDate,
    file: std::fs::File,
    pending_entries: u32,
    last_flush: std::time::Instant,
}

pub struct MessageLog {
    dir: PathBuf,
    state: Mutex<Option<OpenFile>>,
}

impl MessageLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            state: Mutex::new(None),
        }
    }

    /// Append one formatted record, creating/rotating the dated file as needed.
    pub async fn append(
        &self,
        at: DateTime<Utc>,
        direction: Direction,
        counterpart_id: &str,
        message_id: &str,
        kind: &str,
        fields: LogEntryFields,
    ) -> std::io::Result<()> {
        let record = format_record(at, direction, counterpart_id, message_id, kind, &fields);

        let mut guard = self.state.lock().await;
        let today = at.date_naive();

        let needs_new_file = match guard.as_ref() {
            Some(open) => open.date != today,
            None => true,
        };

        if needs_new_file {
            std::fs::create_dir_all(&self.dir)?;
            let path = self.path_for(today);
            let is_new = !path.exists();
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            if is_new {
                file.write_all(&BOM)?;
            }
            *guard = Some(OpenFile {
                date: today,
                file,
                pending_entries: 0,
                last_flush: std::time::Instant::now(),
            });
        }

        let open = guard.as_mut().expect("just ensured a file is open");
        open.file.write_all(record.as_bytes())?;
        open.pending_entries += 1;

        if open.pending_entries >= FLUSH_EVERY_ENTRIES || open.last_flush.elapsed() >= FLUSH_INTERVAL
        {
            open.file.flush()?;
            open.pending_entries = 0;
            open.last_flush = std::time::Instant::now();
        }

        Ok(())
    }

    /// Force a flush regardless of the entry/interval counters — called on shutdown.
    pub async fn flush(&self) -> std::io::Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(open) = guard.as_mut() {
            open.file.flush()?;
            open.pending_entries = 0;
        }
        Ok(())
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        Path::new(&self.dir).join(format!("messages_{}.txt", date.format("%Y-%m-%d")))
    }
}

fn format_record(
    at: DateTime<Utc>,
    direction: Direction,
    counterpart_id: &str,
    message_id: &str,
    kind: &str,
    fields: &LogEntryFields,
) -> String {
    let bar = "=".repeat(80);
    let label = direction.label();
    let counterpart_label = match direction {
        Direction::Inbound => "From",
        Direction::Outbound => "To",
    };

    let mut out = String::new();
    out.push_str(&bar);
    out.push('\n');
    out.push_str(&format!("[{}] {}\n", at.to_rfc3339(), label));
    out.push_str(&bar);
    out.push('\n');
    out.push_str(&format!("{counterpart_label}: {counterpart_id}\n"));
    out.push_str(&format!("Message ID: {message_id}\n"));
    out.push_str(&format!("Type: {kind}\n"));

    if let Some(p) = &fields.priority {
        out.push_str(&format!("Priority: {p}\n"));
    }
    if let Some(c) = &fields.content {
        out.push_str(&format!("Content: {c}\n"));
    }
    if let Some(m) = &fields.media_type {
        out.push_str(&format!("Media Type: {m}\n"));
    }
    if let Some(c) = &fields.media_caption {
        out.push_str(&format!("Media Caption: {c}\n"));
    }
    if let Some(s) = &fields.status {
        out.push_str(&format!("Status: {s}\n"));
    }
    if let Some(e) = &fields.error {
        out.push_str(&format!("Error: {e}\n"));
    }

    out.push_str(&bar);
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_record_with_only_required_fields() {
        let at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let record = format_record(at, Direction::Inbound, "s1", "m1", "text", LogEntryFields::default());
        assert!(record.starts_with(&"=".repeat(80)));
        assert!(record.contains("INBOUND"));
        assert!(record.contains("From: s1"));
        assert!(record.contains("Message ID: m1"));
        assert!(!record.contains("Content:"));
    }

    #[test]
    fn formats_record_with_optional_fields() {
        let at = Utc::now();
        let fields = LogEntryFields {
            priority: Some("high".to_string()),
            content: Some("hola".to_string()),
            ..Default::default()
        };
        let record = format_record(at, Direction::Outbound, "d1", "m2", "text", fields);
        assert!(record.contains("To: d1"));
        assert!(record.contains("Priority: high"));
        assert!(record.contains("Content: hola"));
    }

    #[tokio::test]
    async fn append_creates_file_with_bom_and_rotates_by_date() {
        let tmp = std::env::temp_dir().join(format!("triagebot-log-test-{}", std::process::id()));
        let log = MessageLog::new(&tmp);

        let day1 = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        log.append(day1, Direction::Inbound, "s1", "m1", "text", LogEntryFields::default())
            .await
            .unwrap();

        let path = tmp.join("messages_2026-01-01.txt");
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[0..3], &BOM);

        let day2 = DateTime::parse_from_rfc3339("2026-01-02T00:00:00Z").unwrap().with_timezone(&Utc);
        log.append(day2, Direction::Inbound, "s1", "m2", "text", LogEntryFields::default())
            .await
            .unwrap();
        assert!(tmp.join("messages_2026-01-02.txt").exists());

        let _ = std::fs::remove_dir_all(&tmp);
    }
}
