//! Study material: structured notes from the corpus, then exam-style
//! questions from those notes.

use anyhow::{bail, Result};

use crate::llm::{ChatModel, Prompt};

pub const NOTES_INSTRUCTION: &str =
    "You are a subject teacher. You have to create structured notes based on the input.";

pub fn notes_prompt(corpus: &str) -> Prompt {
    Prompt::new(NOTES_INSTRUCTION).user(corpus)
}

pub fn questions_prompt(notes: &str) -> Prompt {
    Prompt::default().user(format!(
        "Generate 2-mark and 5-mark questions based on the following notes:\n\n{}",
        notes
    ))
}

/// Generate structured notes. An empty reply is an error.
pub async fn generate_notes(model: &dyn ChatModel, corpus: &str) -> Result<String> {
    let notes = model.complete(&notes_prompt(corpus)).await?;
    if notes.trim().is_empty() {
        bail!("model returned empty notes");
    }
    Ok(notes)
}

/// Generate 2-mark and 5-mark questions. An empty reply is an error.
pub async fn generate_questions(model: &dyn ChatModel, notes: &str) -> Result<String> {
    let questions = model.complete(&questions_prompt(notes)).await?;
    if questions.trim().is_empty() {
        bail!("model returned no questions");
    }
    Ok(questions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedModel;

    #[tokio::test]
    async fn notes_then_questions() {
        let model = ScriptedModel::new(&["# Cells\n- nucleus", "Q1 (2 marks): ..."]);
        let notes = generate_notes(&model, "raw lecture text").await.unwrap();
        let questions = generate_questions(&model, &notes).await.unwrap();
        assert_eq!(questions, "Q1 (2 marks): ...");

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].system, NOTES_INSTRUCTION);
        assert_eq!(prompts[0].messages[0].text, "raw lecture text");
        assert!(prompts[1].system.is_empty());
        assert_eq!(
            prompts[1].messages[0].text,
            "Generate 2-mark and 5-mark questions based on the following notes:\n\n# Cells\n- nucleus"
        );
    }

    #[tokio::test]
    async fn empty_notes_is_error() {
        let model = ScriptedModel::new(&["  \n"]);
        let err = generate_notes(&model, "text").await.unwrap_err();
        assert!(err.to_string().contains("empty notes"));
    }
}
