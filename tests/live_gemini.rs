//! Live test against the Gemini API.
//!
//! These tests require:
//! 1. GEMINI_API_KEY in the environment
//! 2. A short engine recording at data/test/audio/engine.ogg
//!
//! Run with: cargo test --features integ_test --test live_gemini

#[cfg(feature = "integ_test")]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use motordiag::diagnosis::gemini::DEFAULT_API_BASE;
    use motordiag::diagnosis::{Diagnoser, GeminiClient, KnowledgeRow, KnowledgeTable, PromptBuilder};

    fn test_audio_path() -> PathBuf {
        std::env::var("ENGINE_AUDIO_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/test/audio/engine.ogg"))
    }

    #[tokio::test]
    async fn test_live_diagnosis_follows_template() {
        let Ok(api_key) = std::env::var("GEMINI_API_KEY") else {
            eprintln!("Skipping test: GEMINI_API_KEY not set");
            return;
        };
        let audio_path = test_audio_path();
        if !audio_path.exists() {
            eprintln!("Skipping test: audio not found at {:?}", audio_path);
            return;
        }

        let table = KnowledgeTable::new(vec![
            KnowledgeRow { symptom: "metallic knock at idle".into(), fault: "worn crankshaft bearing".into() },
            KnowledgeRow { symptom: "uneven running, misfires".into(), fault: "faulty injector".into() },
        ]);
        let prompt = PromptBuilder::default().build(Some(&table)).unwrap();
        let audio = std::fs::read(&audio_path).expect("Failed to read test audio");

        let client = GeminiClient::new(
            api_key,
            "gemini-2.5-flash".to_string(),
            DEFAULT_API_BASE.to_string(),
            Duration::from_secs(120),
        )
        .unwrap();

        let text = client
            .diagnose(&prompt, &audio, "audio/ogg")
            .await
            .expect("diagnosis call failed");
        println!("Diagnosis:\n{text}");

        assert!(!text.is_empty());
        assert!(text.contains("Diagnosis"), "Missing diagnosis section: {text}");
    }
}
