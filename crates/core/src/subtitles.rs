//! SRT rendering of transcript segments.

use crate::job::Segment;

/// Render segments as an SRT document.
///
/// Cues are numbered from 1 and separated by a blank line.
pub fn segments_to_srt(segments: &[Segment]) -> String {
    let mut lines = Vec::with_capacity(segments.len() * 4);

    for (index, segment) in segments.iter().enumerate() {
        lines.push((index + 1).to_string());
        lines.push(format!(
            "{} --> {}",
            srt_timestamp(segment.start),
            srt_timestamp(segment.end)
        ));
        lines.push(segment.text.clone());
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Format seconds as `HH:MM:SS,mmm`, rounded to the nearest millisecond.
pub fn srt_timestamp(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!("{hours:02}:{minutes:02}:{secs:02},{millis:03}")
}
