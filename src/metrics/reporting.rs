//! Report rendering and output formatting

use std::fmt::Write as _;

use crate::constants::SCALE;
use crate::metrics::StressReport;

const KB: f64 = 1024.0;
const MB: f64 = 1_048_576.0;
const GB: f64 = 1_073_741_824.0;

impl StressReport {
    /// Render in the format selected by `output` and write to stdout.
    pub fn print(&self) {
        match self.output.as_str() {
            "csv" => print!("{}", self.render_csv()),
            _ => print!("{}", self.render_text()),
        }
    }

    /// One `Duration,Count` header, then a row per latency bucket in
    /// sorted order.
    pub fn render_csv(&self) -> String {
        let mut out = String::from("Duration,Count\n");
        for (bucket, count) in &self.lats {
            let _ = writeln!(out, "{},{}", bucket, count);
        }
        out
    }

    /// The default human-readable summary block.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        if !self.lats.is_empty() {
            let _ = writeln!(out, "Summary:");
            let _ = writeln!(out, "  Total:\t{:4.3} secs", descale(self.duration));
            let _ = writeln!(out, "  Slowest:\t{:4.3} secs", descale(self.slowest));
            let _ = writeln!(out, "  Fastest:\t{:4.3} secs", descale(self.fastest));
            let _ = writeln!(out, "  Average:\t{:4.3} secs", descale(self.average));
            let _ = writeln!(out, "  Requests/sec:\t{:4.3}", descale(self.rps));
            if self.size_total > 0 {
                let _ = writeln!(out, "  Total data:\t{}", format_size(self.size_total));
                let _ = writeln!(
                    out,
                    "  Size/request:\t{} bytes",
                    self.size_total / self.lats_total.max(1)
                );
            }
            out.push_str(&self.render_status_codes());
            out.push_str(&self.render_latencies());
        }
        if !self.error_dist.is_empty() {
            out.push_str(&self.render_errors());
        }
        out
    }

    fn render_status_codes(&self) -> String {
        let mut out = String::from("\nStatus code distribution:\n");
        for (code, count) in &self.status_code_dist {
            let _ = writeln!(out, "  [{}]\t{} responses", code, count);
        }
        out
    }

    fn render_latencies(&self) -> String {
        let mut out = String::from("\nLatency distribution:\n");
        for (percentile, bucket) in self.percentiles() {
            let _ = writeln!(out, "  {}% in {} secs", percentile, bucket);
        }
        out
    }

    fn render_errors(&self) -> String {
        let mut out = String::from("\nError distribution:\n");
        for (message, count) in &self.error_dist {
            let _ = writeln!(out, "  [{}]\t{}", count, message);
        }
        out
    }
}

fn descale(value: i64) -> f64 {
    value as f64 / SCALE as f64
}

fn format_size(bytes: i64) -> String {
    let bytes = bytes as f64;
    if bytes > GB {
        format!("{:4.3} GB", bytes / GB)
    } else if bytes > MB {
        format!("{:4.3} MB", bytes / MB)
    } else if bytes > KB {
        format!("{:4.3} KB", bytes / KB)
    } else {
        format!("{:4.3} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Sample;
    use std::time::Duration;

    fn report_with_buckets() -> StressReport {
        let mut report = StressReport::new();
        for millis in [5, 5, 12, 40] {
            report.record(&Sample::success(200, Duration::from_millis(millis), 128));
        }
        report.finalize(Duration::from_secs(1));
        report
    }

    #[test]
    fn csv_has_header_and_sorted_bucket_rows() {
        let mut report = report_with_buckets();
        report.output = "csv".to_string();

        let csv = report.render_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Duration,Count");
        assert_eq!(lines[1], "0.005,2");
        assert_eq!(lines[2], "0.012,1");
        assert_eq!(lines[3], "0.040,1");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn text_report_carries_summary_sections() {
        let text = report_with_buckets().render_text();
        assert!(text.contains("Summary:"));
        assert!(text.contains("Status code distribution:"));
        assert!(text.contains("[200]\t4 responses"));
        assert!(text.contains("Latency distribution:"));
        assert!(text.contains("Total data:"));
    }

    #[test]
    fn empty_report_prints_nothing_but_errors() {
        let mut report = StressReport::new();
        report.record(&Sample::failure("dns failure".to_string()));
        let text = report.render_text();
        assert!(!text.contains("Summary:"));
        assert!(text.contains("Error distribution:"));
        assert!(text.contains("[1]\tdns failure"));
    }

    #[test]
    fn size_line_scales_units() {
        assert_eq!(format_size(512), "512.000 bytes");
        assert!(format_size(2048).ends_with(" KB"));
        assert!(format_size(5 * 1_048_576).ends_with(" MB"));
        assert!(format_size(3 * 1_073_741_824).ends_with(" GB"));
    }
}
