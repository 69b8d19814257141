//! Map a free-text edit of a transcript back onto its timed segments.
//!
//! The editor presents the transcript as paragraphs, one per segment.
//! After editing, the paragraph count may no longer match:
//!
//! - same count: paragraph `i` becomes the text of segment `i`;
//! - fewer paragraphs: all words are spread evenly over the segments;
//! - more paragraphs: consecutive paragraphs are combined so that each
//!   segment receives an even share of them.
//!
//! Segment ids and timings are always preserved.

use crate::job::Segment;

/// Split free text into paragraphs separated by blank lines.
///
/// Line breaks inside a paragraph collapse to single spaces.
pub fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                out.push(current.join(" "));
                current.clear();
            }
            continue;
        }
        current.push(line);
    }
    if !current.is_empty() {
        out.push(current.join(" "));
    }

    out
}

/// Render segments as editable free text, one paragraph per segment.
pub fn to_free_text(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Produce new segments carrying the edited `text`.
pub fn redistribute(segments: &[Segment], text: &str) -> Vec<Segment> {
    let paras = paragraphs(text);
    let slots = segments.len();

    let texts: Vec<String> = if paras.len() == slots {
        paras
    } else if paras.len() < slots {
        spread_words(&paras, slots)
    } else {
        combine_paragraphs(&paras, slots)
    };

    segments
        .iter()
        .zip(texts)
        .map(|(segment, text)| Segment {
            text,
            ..segment.clone()
        })
        .collect()
}

fn spread_words(paras: &[String], slots: usize) -> Vec<String> {
    let words: Vec<&str> = paras.iter().flat_map(|p| p.split_whitespace()).collect();
    let total = words.len();

    (0..slots)
        .map(|i| {
            let from = i * total / slots;
            let to = (i + 1) * total / slots;
            words[from..to].join(" ")
        })
        .collect()
}

fn combine_paragraphs(paras: &[String], slots: usize) -> Vec<String> {
    let mut buckets: Vec<Vec<&str>> = vec![Vec::new(); slots];
    if slots == 0 {
        return Vec::new();
    }

    for (j, para) in paras.iter().enumerate() {
        buckets[j * slots / paras.len()].push(para.as_str());
    }

    buckets.into_iter().map(|b| b.join(" ")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment {
                id: i as i64 + 10,
                start: i as f64,
                end: i as f64 + 1.0,
                text: format!("original {i}"),
            })
            .collect()
    }

    fn texts(segs: &[Segment]) -> Vec<&str> {
        segs.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let text = "one\ntwo\n\n\n three \n\nfour";
        assert_eq!(paragraphs(text), vec!["one two", "three", "four"]);
        assert!(paragraphs("  \n\n ").is_empty());
    }

    #[test]
    fn free_text_round_trips_equal_count() {
        let segs = segments(3);
        let text = to_free_text(&segs);
        let out = redistribute(&segs, &text);
        assert_eq!(out, segs);
    }

    #[test]
    fn equal_count_maps_one_to_one() {
        let segs = segments(2);
        let out = redistribute(&segs, "alpha\n\nbeta");
        assert_eq!(texts(&out), vec!["alpha", "beta"]);
        assert_eq!(out[1].id, 11);
        assert_eq!(out[1].start, 1.0);
    }

    #[test]
    fn fewer_paragraphs_spread_words_evenly() {
        let segs = segments(3);
        let out = redistribute(&segs, "a b c d e f");
        assert_eq!(texts(&out), vec!["a b", "c d", "e f"]);
    }

    #[test]
    fn fewer_words_than_segments_leaves_blanks() {
        let segs = segments(3);
        let out = redistribute(&segs, "solo");
        assert_eq!(texts(&out), vec!["", "", "solo"]);
    }

    #[test]
    fn more_paragraphs_are_combined() {
        let segs = segments(2);
        let out = redistribute(&segs, "p1\n\np2\n\np3\n\np4\n\np5");
        assert_eq!(texts(&out), vec!["p1 p2 p3", "p4 p5"]);
    }

    #[test]
    fn no_segments_yields_nothing() {
        assert!(redistribute(&[], "anything\n\nat all").is_empty());
    }
}
