// Pure line classification for yt-dlp output streams.
use super::*;
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub percent: f32,
    pub speed: String,
    pub eta: String,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Progress(ProgressUpdate),
    Log(String),
}

fn percent_pattern() -> &'static Regex {
    static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
    PERCENT_RE.get_or_init(|| Regex::new(r"(\d+\.?\d*)%").expect("valid percent pattern"))
}

fn speed_pattern() -> &'static Regex {
    static SPEED_RE: OnceLock<Regex> = OnceLock::new();
    SPEED_RE.get_or_init(|| Regex::new(r"at\s+(\S+)").expect("valid speed pattern"))
}

fn eta_pattern() -> &'static Regex {
    static ETA_RE: OnceLock<Regex> = OnceLock::new();
    ETA_RE.get_or_init(|| Regex::new(r"ETA\s+(\S+)").expect("valid eta pattern"))
}

fn capture_field(pattern: &Regex, line: &str) -> Option<String> {
    pattern
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
}

// Classification never fails: sub-fields that do not match fall back to
// 0 / empty so one malformed line cannot abort the stream.
pub fn classify_output_line(line: &str) -> ParsedLine {
    if line.contains("[download]") && line.contains('%') {
        let percent = capture_field(percent_pattern(), line)
            .and_then(|value| value.parse::<f32>().ok())
            .unwrap_or(0.0);
        let speed = capture_field(speed_pattern(), line).unwrap_or_default();
        let eta = capture_field(eta_pattern(), line).unwrap_or_default();
        return ParsedLine::Progress(ProgressUpdate {
            percent,
            speed,
            eta,
            line: line.to_string(),
        });
    }
    ParsedLine::Log(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_progress(line: &str) -> ProgressUpdate {
        match classify_output_line(line) {
            ParsedLine::Progress(update) => update,
            ParsedLine::Log(other) => panic!("expected progress line, got log: {other}"),
        }
    }

    #[test]
    fn extracts_percent_speed_and_eta() {
        let update = expect_progress("[download]  42.5% at 1.2MiB/s ETA 00:10");
        assert!((update.percent - 42.5).abs() < f32::EPSILON);
        assert_eq!(update.speed, "1.2MiB/s");
        assert_eq!(update.eta, "00:10");
        assert_eq!(update.line, "[download]  42.5% at 1.2MiB/s ETA 00:10");
    }

    #[test]
    fn extracts_integer_percent() {
        let update = expect_progress("[download] 100% of 10.00MiB at 3.4MiB/s ETA 00:00");
        assert!((update.percent - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_sub_fields_default_instead_of_failing() {
        let update = expect_progress("[download]  12.0%");
        assert!((update.percent - 12.0).abs() < f32::EPSILON);
        assert_eq!(update.speed, "");
        assert_eq!(update.eta, "");
    }

    #[test]
    fn unparseable_percent_defaults_to_zero() {
        let update = expect_progress("[download] NA% at 1.2MiB/s ETA Unknown");
        assert!(update.percent.abs() < f32::EPSILON);
        assert_eq!(update.speed, "1.2MiB/s");
        assert_eq!(update.eta, "Unknown");
    }

    #[test]
    fn progress_requires_both_markers() {
        assert_eq!(
            classify_output_line("[download] Destination: video.mp4"),
            ParsedLine::Log("[download] Destination: video.mp4".to_string())
        );
        assert_eq!(
            classify_output_line("100% unrelated percent talk"),
            ParsedLine::Log("100% unrelated percent talk".to_string())
        );
    }

    #[test]
    fn plain_lines_pass_through_unchanged() {
        assert_eq!(
            classify_output_line("[info] Writing video description"),
            ParsedLine::Log("[info] Writing video description".to_string())
        );
    }
}
