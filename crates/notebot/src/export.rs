//! Plain-text export artifact: a header followed by one block per note.

use chrono::{DateTime, Utc};

use crate::notes_db::Note;

const RULE: &str = "==================================================";

/// Render the downloadable export document. `notes` is expected in
/// ascending local id order, as returned by `NoteStore::export_all`.
pub fn render_export(display_name: &str, exported_at: DateTime<Utc>, notes: &[Note]) -> String {
    let mut out = String::new();
    out.push_str(&format!("Notes export for {}\n", display_name));
    out.push_str(&format!(
        "Exported: {}\n",
        exported_at.format("%d.%m.%Y %H:%M:%S")
    ));
    out.push_str(RULE);
    out.push_str("\n\n");

    for note in notes {
        out.push_str(&format!("NOTE #{}\n", note.local_id));
        out.push_str(&format!("Title: {}\n", note.title));
        out.push_str(&format!("Category: {}\n", note.category));
        out.push_str(&format!(
            "Created: {}\n",
            note.created_at.format("%d.%m.%Y %H:%M:%S")
        ));
        out.push_str(&format!(
            "Updated: {}\n",
            note.updated_at.format("%d.%m.%Y %H:%M:%S")
        ));
        if let Some(ref tags) = note.tags {
            if !tags.is_empty() {
                out.push_str(&format!("Tags: {}\n", tags.join(", ")));
            }
        }
        out.push_str("\nContent:\n");
        out.push_str(&note.content);
        out.push('\n');
        out.push_str(RULE);
        out.push_str("\n\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_note(local_id: i64, tags: Option<Vec<String>>) -> Note {
        Note {
            user_id: 1,
            local_id,
            title: format!("Note {}", local_id),
            content: "body text".to_string(),
            tags,
            category: "general".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_header_and_one_block_per_note() {
        let notes = vec![sample_note(1, None), sample_note(3, None)];
        let text = render_export("@ann", Utc::now(), &notes);
        assert!(text.starts_with("Notes export for @ann\n"));
        assert!(text.contains("NOTE #1\n"));
        assert!(text.contains("NOTE #3\n"));
        assert!(text.contains("Title: Note 3\n"));
        assert!(text.contains("Content:\nbody text"));
    }

    #[test]
    fn test_tags_line_only_when_present() {
        let tagged = render_export(
            "@ann",
            Utc::now(),
            &[sample_note(1, Some(vec!["work".to_string(), "urgent".to_string()]))],
        );
        assert!(tagged.contains("Tags: work, urgent\n"));

        let untagged = render_export("@ann", Utc::now(), &[sample_note(1, None)]);
        assert!(!untagged.contains("Tags:"));

        let empty = render_export("@ann", Utc::now(), &[sample_note(1, Some(Vec::new()))]);
        assert!(!empty.contains("Tags:"));
    }
}
