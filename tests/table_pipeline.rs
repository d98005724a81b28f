//! From a fault table file on disk to the prompt and the listing reply,
//! through the public API only.

use std::io::Write;

use motordiag::diagnosis::listing::{LISTING_TRUNCATED_NOTICE, render_listing};
use motordiag::diagnosis::telegram::{MAX_MESSAGE_UNITS, message_len};
use motordiag::diagnosis::{KnowledgeTable, PromptBuilder, TableState};

fn write_table(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .prefix("sounddefbase")
        .suffix(".csv")
        .tempfile()
        .unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_csv_to_prompt() {
    let file = write_table(
        "Симптомы,Поломка\n\
         knock at idle,worn bearing\n\
         \"black smoke, loss of power\",clogged air filter\n",
    );

    let state = TableState::from_load(KnowledgeTable::load(file.path()));
    let table = state.table().expect("table should load");
    assert_eq!(table.len(), 2);

    let prompt = PromptBuilder::default().build(state.table()).unwrap();
    assert!(prompt.contains("1. Symptoms: knock at idle"));
    assert!(prompt.contains("Fault: worn bearing"));
    assert!(prompt.contains("2. Symptoms: black smoke, loss of power\n   Fault: clogged air filter"));
}

#[test]
fn test_header_only_file_gives_no_prompt() {
    let file = write_table("symptom,fault\n");
    let state = TableState::from_load(KnowledgeTable::load(file.path()));
    assert!(state.table().is_some());
    assert!(PromptBuilder::default().build(state.table()).is_none());
}

#[test]
fn test_missing_file_gives_absent_state_and_no_prompt() {
    let state = TableState::from_load(KnowledgeTable::load("/definitely/missing/sounddefbase.xlsx"));
    assert!(matches!(state, TableState::Absent { .. }));
    assert!(PromptBuilder::default().build(state.table()).is_none());
}

#[test]
fn test_large_csv_listing_fits_one_message() {
    let mut content = String::from("symptom,fault\n");
    for i in 0..400 {
        content.push_str(&format!("metallic knocking under load variant {i},connecting rod bearing wear {i}\n"));
    }
    let file = write_table(&content);

    let table = KnowledgeTable::load(file.path()).unwrap();
    assert_eq!(table.len(), 400);

    let listing = render_listing(&table);
    assert!(message_len(&listing) <= MAX_MESSAGE_UNITS);
    assert!(listing.ends_with(LISTING_TRUNCATED_NOTICE));
}
