//! `/database` reply rendering.

use std::fmt::Write;

use super::knowledge::KnowledgeTable;
use super::telegram::fit_to_message;

pub const LISTING_HEADER: &str = "📋 Fault database:";
pub const LISTING_TRUNCATED_NOTICE: &str = "\n\n... (database too large, showing a part)";

/// Numbered symptom → fault listing, cut to fit one Telegram message.
pub fn render_listing(table: &KnowledgeTable) -> String {
    let mut text = String::from(LISTING_HEADER);
    text.push_str("\n\n");

    if table.is_empty() {
        text.push_str("(no entries)");
    }
    for (idx, row) in table.rows().iter().enumerate() {
        let _ = write!(text, "{}. {}\n   → {}\n\n", idx + 1, row.symptom, row.fault);
    }

    fit_to_message(text.trim_end(), LISTING_TRUNCATED_NOTICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnosis::knowledge::KnowledgeRow;
    use crate::diagnosis::telegram::{MAX_MESSAGE_UNITS, message_len};

    fn table_of(n: usize, symptom_len: usize) -> KnowledgeTable {
        KnowledgeTable::new(
            (0..n)
                .map(|i| KnowledgeRow {
                    symptom: format!("{i}-{}", "s".repeat(symptom_len)),
                    fault: format!("fault {i}"),
                })
                .collect(),
        )
    }

    #[test]
    fn test_small_listing() {
        let table = KnowledgeTable::new(vec![
            KnowledgeRow { symptom: "knock at idle".into(), fault: "worn bearing".into() },
            KnowledgeRow { symptom: "blue smoke".into(), fault: "worn rings".into() },
        ]);
        let text = render_listing(&table);
        assert_eq!(
            text,
            "📋 Fault database:\n\n1. knock at idle\n   → worn bearing\n\n2. blue smoke\n   → worn rings"
        );
    }

    #[test]
    fn test_empty_table_listing() {
        let text = render_listing(&KnowledgeTable::new(Vec::new()));
        assert!(text.starts_with(LISTING_HEADER));
        assert!(text.contains("(no entries)"));
    }

    #[test]
    fn test_large_listing_truncated_with_notice_last() {
        let text = render_listing(&table_of(200, 50));
        assert!(message_len(&text) <= MAX_MESSAGE_UNITS);
        assert!(text.ends_with(LISTING_TRUNCATED_NOTICE));
        assert!(text.starts_with(LISTING_HEADER));
    }

    #[test]
    fn test_listing_never_exceeds_cap() {
        for rows in [0, 1, 10, 60, 61, 62, 500] {
            let text = render_listing(&table_of(rows, 55));
            assert!(message_len(&text) <= MAX_MESSAGE_UNITS, "rows={rows}");
            if text.contains("showing a part") {
                assert!(text.ends_with(LISTING_TRUNCATED_NOTICE));
            }
        }
    }
}
