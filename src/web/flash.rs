use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::MangakaError;

const FLASH_KEY: &str = "flash";

/// One-shot status messages carried across a redirect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) enum Flash {
    CharacterCreated,
    CharacterDeleted,
    FieldsRequired,
    StoryRequired,
    CharacterNotFound,
    RefineImageRequired,
    ProfileGenerationFailed(String),
    MangaGenerationFailed(String),
    RefineFailed(String),
}

#[derive(Clone, Debug)]
pub(crate) struct FlashMessage {
    pub(crate) text: String,
    pub(crate) class: &'static str,
}

impl Flash {
    pub(crate) fn message(&self) -> FlashMessage {
        let (text, class) = match self {
            Flash::CharacterCreated => ("Character created successfully!".to_string(), "success"),
            Flash::CharacterDeleted => ("Character deleted successfully!".to_string(), "success"),
            Flash::FieldsRequired => ("All fields are required!".to_string(), "error"),
            Flash::StoryRequired => ("Story prompt is required!".to_string(), "error"),
            Flash::CharacterNotFound => ("Character not found!".to_string(), "error"),
            Flash::RefineImageRequired => ("Image to refine is required!".to_string(), "error"),
            Flash::ProfileGenerationFailed(reason) => (
                format!("Error generating profile picture: {reason}"),
                "error",
            ),
            Flash::MangaGenerationFailed(reason) => {
                (format!("Error generating manga: {reason}"), "error")
            }
            Flash::RefineFailed(reason) => (format!("Error refining manga: {reason}"), "error"),
        };
        FlashMessage { text, class }
    }
}

pub(crate) async fn set_flash(session: &Session, flash: Flash) -> Result<(), MangakaError> {
    session.insert(FLASH_KEY, flash).await?;
    Ok(())
}

/// Returns the pending message, clearing it so it shows once.
pub(crate) async fn take_flash_message(
    session: &Session,
) -> Result<Option<FlashMessage>, MangakaError> {
    let flash = session.remove::<Flash>(FLASH_KEY).await?;
    Ok(flash.as_ref().map(Flash::message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_carry_the_reason() {
        let message = Flash::ProfileGenerationFailed("backend down".to_string()).message();
        assert_eq!(message.text, "Error generating profile picture: backend down");
        assert_eq!(message.class, "error");
    }

    #[test]
    fn successes_are_styled_as_success() {
        assert_eq!(Flash::CharacterCreated.message().class, "success");
        assert_eq!(Flash::CharacterDeleted.message().class, "success");
    }
}
