//! Buffer Formatter
//!
//! Renders delivered banks for display

use colored::Colorize;

use crate::scope::BufferRecord;

/// Samples shown inline in text mode
const PREVIEW_LEN: usize = 8;

pub struct BufferFormatter {
    json_format: bool,
}

impl BufferFormatter {
    pub fn new(json_format: bool) -> Self {
        Self { json_format }
    }

    pub fn format_record(&self, record: &BufferRecord) -> serde_json::Result<String> {
        if self.json_format {
            serde_json::to_string(record)
        } else {
            Ok(self.format_text(record))
        }
    }

    fn format_text(&self, record: &BufferRecord) -> String {
        let input = format!("A{}", record.input).bright_cyan();
        let header = format!("#{:<4} {:?}", record.sequence, record.bank);
        let marker = if record.is_final {
            " final".green().bold().to_string()
        } else {
            String::new()
        };

        format!(
            "{:4} {} n={:<5} {}{} {}",
            input,
            header,
            record.samples.len(),
            self.format_stats(&record.microvolts),
            marker,
            self.format_preview(&record.samples)
        )
    }

    fn format_stats(&self, microvolts: &[u32]) -> String {
        let (Some(min), Some(max)) = (microvolts.iter().min(), microvolts.iter().max()) else {
            return "-".dimmed().to_string();
        };
        let mean = microvolts.iter().map(|&uv| u64::from(uv)).sum::<u64>() / microvolts.len() as u64;
        format!(
            "min={} mean={} max={}",
            format_volts(u64::from(*min)),
            format_volts(mean).bright_yellow(),
            format_volts(u64::from(*max))
        )
    }

    fn format_preview(&self, samples: &[u16]) -> String {
        let mut preview = samples
            .iter()
            .take(PREVIEW_LEN)
            .map(|s| format!("{s:04x}"))
            .collect::<Vec<_>>()
            .join(" ");
        if samples.len() > PREVIEW_LEN {
            preview.push_str(" ..");
        }
        preview.dimmed().to_string()
    }
}

fn format_volts(microvolts: u64) -> String {
    format!("{}.{:06}V", microvolts / 1_000_000, microvolts % 1_000_000)
}
