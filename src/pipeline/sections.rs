//! Section extraction: the seven named parts of an Act as a [`SectionMap`].

use crate::error::DigestError;
use crate::output::SectionMap;
use crate::pipeline::llm::{generate, CallPolicy, LlmClient};
use crate::pipeline::respond::{parse_or_else, Shape};
use crate::progress::Stage;
use crate::prompts::section_prompt;
use tracing::info;

/// Extract sections from the cleaned document text.
///
/// Whatever the model returns is normalised to the seven keys; a response
/// that is not a JSON object yields seven empty sections.
pub async fn extract_sections(
    client: &dyn LlmClient,
    text: &str,
    policy: &CallPolicy,
) -> Result<SectionMap, DigestError> {
    info!("Extracting sections from {} chars", text.len());
    let response = generate(client, &section_prompt(text), policy, Stage::Sections).await?;

    let sections: SectionMap =
        parse_or_else(&response, Shape::Object, Stage::Sections, SectionMap::default);
    info!("Sections extracted: {}/7 non-empty", sections.filled());
    Ok(sections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl LlmClient for Canned {
        async fn complete(&self, _prompt: &str, _temperature: f32) -> Result<String, DigestError> {
            Ok(self.0.to_string())
        }
    }

    fn policy() -> CallPolicy {
        CallPolicy {
            temperature: 0.3,
            max_retries: 0,
            retry_backoff_ms: 1,
            timeout_secs: None,
        }
    }

    #[tokio::test]
    async fn fenced_object_is_normalised() {
        let client = Canned(
            "Sure!\n```json\n{\"definitions\": \"'Minister' means...\", \"extra\": \"x\", \"record_keepin\": \"7 years\"}\n```",
        );
        let s = extract_sections(&client, "text", &policy()).await.unwrap();
        assert_eq!(s.definitions, "'Minister' means...");
        assert_eq!(s.record_keeping, "7 years");
        assert_eq!(s.obligations, "");
    }

    #[tokio::test]
    async fn duplicate_record_keeping_keys_keep_other_sections() {
        let client = Canned(
            r#"{"definitions":"'Minister' means X","record_keeping":"7 years","record_keepin":"7 years"}"#,
        );
        let s = extract_sections(&client, "text", &policy()).await.unwrap();
        assert_eq!(s.definitions, "'Minister' means X");
        assert_eq!(s.record_keeping, "7 years");
        assert_eq!(s.filled(), 2);
    }

    #[tokio::test]
    async fn empty_response_falls_back_to_empty_sections() {
        let client = Canned("");
        let s = extract_sections(&client, "text", &policy()).await.unwrap();
        assert_eq!(s, SectionMap::default());
    }

    #[tokio::test]
    async fn prose_falls_back_to_empty_sections() {
        let client = Canned("I could not find any sections.");
        let s = extract_sections(&client, "text", &policy()).await.unwrap();
        assert_eq!(s, SectionMap::default());
    }

    #[tokio::test]
    async fn array_falls_back_to_empty_sections() {
        let client = Canned("[\"definitions\"]");
        let s = extract_sections(&client, "text", &policy()).await.unwrap();
        assert_eq!(s, SectionMap::default());
    }
}
