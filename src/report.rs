use crate::error::Result;
use crate::models::Topic;
use std::path::Path;

/// Writes the ranked topics as UTF-8 CSV. Example phrasings are joined into
/// one cell with `" | "`; embedded newlines are flattened so each topic stays
/// on one row for spreadsheet import.
pub fn write_csv(topics: &[Topic], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["representative_text", "member_count", "total_weight", "examples"])?;
    for topic in topics {
        let examples = topic
            .examples
            .iter()
            .map(|e| flatten(e))
            .collect::<Vec<_>>()
            .join(" | ");
        writer.write_record([
            flatten(&topic.representative_text),
            topic.member_count.to_string(),
            topic.total_weight.to_string(),
            examples,
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn flatten(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(representative: &str, members: usize, weight: u32, examples: &[&str]) -> Topic {
        Topic {
            representative_text: representative.to_string(),
            member_count: members,
            total_weight: weight,
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn writes_header_and_one_row_per_topic() {
        let dir = std::env::temp_dir().join("feedsift-report-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("topics.csv");

        let topics = vec![
            topic(
                "How do I start keto?",
                2,
                13,
                &["How do I start keto?", "how do i start a keto diet?"],
            ),
            topic("Where can I park?", 1, 1, &["Where can I park?"]),
        ];
        write_csv(&topics, &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "representative_text,member_count,total_weight,examples"
        );
        assert!(lines[1].contains("How do I start keto? | how do i start a keto diet?"));
        assert!(lines[2].contains("Where can I park?"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn newlines_in_text_are_flattened() {
        let dir = std::env::temp_dir().join("feedsift-report-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("topics-newlines.csv");

        write_csv(
            &[topic("line one\nline two", 1, 1, &["a\nb"])],
            &path,
        )
        .unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("line one line two"));
        assert!(written.contains("a b"));

        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn empty_topic_list_writes_only_the_header() {
        let dir = std::env::temp_dir().join("feedsift-report-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("topics-empty.csv");

        write_csv(&[], &path).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written.trim(),
            "representative_text,member_count,total_weight,examples"
        );

        std::fs::remove_file(&path).unwrap();
    }
}
