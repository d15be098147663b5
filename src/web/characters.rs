//! Character creation and deletion.

use super::images::{remove_profile_pic, save_profile_pic};
use super::prelude::*;
use crate::prompt::portrait_prompt;
use crate::store::{Character, CharacterId};

#[derive(Deserialize)]
pub(crate) struct CreateCharacterForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    appearance: String,
    #[serde(default)]
    traits: String,
}

#[derive(Deserialize)]
pub(crate) struct DeleteCharacterForm {
    #[serde(default)]
    character_key: String,
}

/// Generates a portrait for the new character, then stores both.
#[instrument(skip_all, fields(name = %form.name))]
pub(crate) async fn create_character_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<CreateCharacterForm>,
) -> Result<Redirect, MangakaError> {
    let name = form.name.trim();
    let appearance = form.appearance.trim();
    let traits = form.traits.trim();

    if name.is_empty() || appearance.is_empty() || traits.is_empty() {
        set_flash(&session, Flash::FieldsRequired).await?;
        return Ok(Redirect::to("/c_character"));
    }

    let prompt = portrait_prompt(name, appearance, traits);
    let png = match state.sd.txt2img(&prompt, None).await {
        Ok(png) => png,
        Err(err) => {
            warn!("Portrait generation failed: {}", err);
            set_flash(&session, Flash::ProfileGenerationFailed(err.to_string())).await?;
            return Ok(Redirect::to("/c_character"));
        }
    };

    let id = state.store.allocate_id().await;
    let profile_pic = save_profile_pic(&state.profile_dir, id, &png).await?;
    let character = Character::new(name, appearance, traits, profile_pic.clone());
    if let Err(err) = state.store.insert(id, character).await {
        if let Err(cleanup) = remove_profile_pic(&state.profile_dir, &profile_pic).await {
            warn!("Failed to clean up {}: {}", profile_pic, cleanup);
        }
        return Err(err.into());
    }

    info!("Created character {} ({})", id, name);
    set_flash(&session, Flash::CharacterCreated).await?;
    Ok(Redirect::to("/"))
}

/// Deletes a character and its portrait file.
#[instrument(skip_all, fields(character_key = %form.character_key))]
pub(crate) async fn delete_character_handler(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<DeleteCharacterForm>,
) -> Result<Redirect, MangakaError> {
    let character = match form.character_key.trim().parse::<CharacterId>() {
        Ok(id) => state.store.get(id).await.map(|character| (id, character)),
        Err(_) => None,
    };
    let Some((id, character)) = character else {
        debug!("No character with key {:?}", form.character_key);
        set_flash(&session, Flash::CharacterNotFound).await?;
        return Ok(Redirect::to("/"));
    };

    if state.store.remove(id).await?.is_none() {
        // lost a race with another delete
        set_flash(&session, Flash::CharacterNotFound).await?;
        return Ok(Redirect::to("/"));
    }
    // portrait goes only once the record is off disk
    remove_profile_pic(&state.profile_dir, &character.profile_pic).await?;

    info!("Deleted character {} ({})", id, character.name);
    set_flash(&session, Flash::CharacterDeleted).await?;
    Ok(Redirect::to("/"))
}
