//! Formatting helpers for CLI output.

use dtbo_core::{DtTableHeader, Dtbo, TableEntry};
use serde::Serialize;

/// Width keys are right-aligned to in dumps.
const KEY_WIDTH: usize = 20;

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn dec(lines: &mut Vec<String>, key: &str, value: u32) {
    lines.push(format!("{key:>KEY_WIDTH$} = {value}"));
}

fn hex(lines: &mut Vec<String>, key: &str, value: u32) {
    lines.push(format!("{key:>KEY_WIDTH$} = {value:08x}"));
}

/// Header fields, one `key = value` line each.
pub fn format_header(header: &DtTableHeader) -> Vec<String> {
    let mut lines = Vec::new();
    hex(&mut lines, "magic", header.magic);
    dec(&mut lines, "total_size", header.total_size);
    dec(&mut lines, "header_size", header.header_size);
    dec(&mut lines, "dt_entry_size", header.dt_entry_size);
    dec(&mut lines, "dt_entry_count", header.dt_entry_count);
    dec(&mut lines, "dt_entries_offset", header.dt_entries_offset);
    dec(&mut lines, "page_size", header.page_size);
    dec(&mut lines, "version", header.version);
    lines
}

/// Entry header fields, one `key = value` line each.
pub fn format_entry(entry: &TableEntry) -> Vec<String> {
    let m = &entry.metadata;
    let mut lines = Vec::new();
    dec(&mut lines, "dt_size", entry.size);
    dec(&mut lines, "dt_offset", entry.offset);
    hex(&mut lines, "id", m.id);
    hex(&mut lines, "rev", m.rev);
    hex(&mut lines, "flags", m.flags);
    hex(&mut lines, "custom[0]", m.custom0);
    hex(&mut lines, "custom[1]", m.custom1);
    hex(&mut lines, "custom[2]", m.custom2);
    lines
}

/// Human-readable dump of an image's header and entry table.
pub fn format_dump(dtbo: &Dtbo) -> String {
    let mut lines = vec!["dt_table_header:".to_string()];
    lines.extend(format_header(dtbo.header()));
    for (i, entry) in dtbo.entries().iter().enumerate() {
        lines.push(format!("dt_table_entry[{i}]:"));
        lines.extend(format_entry(entry));
    }
    lines.join("\n")
}

#[derive(Serialize)]
struct DumpView<'a> {
    header: &'a DtTableHeader,
    entries: &'a [TableEntry],
}

/// JSON dump of an image's header and entry table.
pub fn dump_json(dtbo: &Dtbo) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&DumpView {
        header: dtbo.header(),
        entries: dtbo.entries(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtbo_core::EntryMetadata;

    fn sample_image() -> Dtbo {
        // header + one entry holding the 4-byte payload "blob"
        let words: [u32; 16] = [
            0xd7b7ab1e, 68, 32, 32, 1, 32, 2048, 1, // header
            4, 64, 0x1, 0x2, 0x1, 0xa, 0xb, 0xc, // entry
        ];
        let mut image: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        image.extend_from_slice(b"blob");
        Dtbo::parse(image).unwrap()
    }

    // --- format_bytes tests ---

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(10 * 1073741824), "10.0 GB");
    }

    // --- dump tests ---

    #[test]
    fn test_format_header_lines() {
        let dtbo = sample_image();
        let lines = format_header(dtbo.header());
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "               magic = d7b7ab1e");
        assert_eq!(lines[1], "          total_size = 68");
        assert_eq!(lines[5], "   dt_entries_offset = 32");
        assert_eq!(lines[7], "             version = 1");
    }

    #[test]
    fn test_format_entry_lines() {
        let entry = TableEntry {
            size: 100,
            offset: 64,
            metadata: EntryMetadata {
                id: 0xdead,
                rev: 1,
                flags: 2,
                custom0: 3,
                custom1: 4,
                custom2: 0xffff_ffff,
            },
            source: None,
        };
        let lines = format_entry(&entry);
        assert_eq!(
            lines,
            vec![
                "             dt_size = 100",
                "           dt_offset = 64",
                "                  id = 0000dead",
                "                 rev = 00000001",
                "               flags = 00000002",
                "           custom[0] = 00000003",
                "           custom[1] = 00000004",
                "           custom[2] = ffffffff",
            ]
        );
    }

    #[test]
    fn test_format_dump_sections() {
        let text = format_dump(&sample_image());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 8 + 1 + 8);
        assert_eq!(lines[0], "dt_table_header:");
        assert_eq!(lines[9], "dt_table_entry[0]:");
        assert_eq!(lines[14], "               flags = 00000001");
    }

    #[test]
    fn test_dump_json_fields() {
        let json = dump_json(&sample_image()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["header"]["magic"], 0xd7b7ab1eu32);
        assert_eq!(value["header"]["page_size"], 2048);
        assert_eq!(value["entries"][0]["size"], 4);
        assert_eq!(value["entries"][0]["custom2"], 0xc);
        assert!(value["entries"][0].get("source").is_none());
    }
}
