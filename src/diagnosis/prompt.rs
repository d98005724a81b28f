//! Renders the fault table and the fixed diagnostic instructions into a
//! single prompt for the audio model.

use std::fmt::Write;

use super::knowledge::KnowledgeTable;

const TABLE_HEADER: &str = "Tractor engine fault database:";

pub struct PromptBuilder {
    reply_language: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("English")
    }
}

impl PromptBuilder {
    pub fn new(reply_language: impl Into<String>) -> Self {
        Self { reply_language: reply_language.into() }
    }

    /// Returns `None` when there is no table or it has no rows.
    pub fn build(&self, table: Option<&KnowledgeTable>) -> Option<String> {
        let table = table.filter(|t| !t.is_empty())?;

        let mut prompt = String::new();
        prompt.push_str(TABLE_HEADER);
        prompt.push_str("\n\n");
        for (idx, row) in table.rows().iter().enumerate() {
            let _ = write!(
                prompt,
                "{}. Symptoms: {}\n   Fault: {}\n\n",
                idx + 1,
                row.symptom,
                row.fault
            );
        }
        prompt.push_str(&self.instructions());
        Some(prompt)
    }

    fn instructions(&self) -> String {
        format!(
            r#"
You are an expert in diagnosing the engines of agricultural machinery.
Analyze the audio recording of a tractor engine and identify the symptoms you can hear.

IMPORTANT: Use ONLY the database above to determine the fault.
Match the symptoms you detect against the symptoms in the database and name the corresponding fault.

Return the result strictly in the following template:

Detected symptoms:
[Describe what you hear: knocking, noise, uneven running, etc.]

Diagnosis:
[Name the fault from the database that matches the detected symptoms]

Recommendations:
[Give concrete repair recommendations based on the fault found]

If the symptoms do not match any entry in the database, write:
Diagnosis: Symptoms not found in the database. A specialist consultation is recommended.

If the recording contains no engine sound, or a person is imitating an engine sound, REPORT THAT THE SOUND DOES NOT MATCH AN ENGINE.

Answer briefly and to the point, in {}.
"#,
            self.reply_language
        )
    }
}
