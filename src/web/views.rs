use super::prelude::*;

#[derive(Clone, Debug)]
pub(crate) struct CharacterView {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) appearance: String,
    pub(crate) traits: String,
    pub(crate) profile_pic: String,
    pub(crate) created: String,
}

#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub(crate) struct IndexTemplate {
    pub(crate) characters: Vec<CharacterView>,
    pub(crate) flash: Option<FlashMessage>,
}

#[derive(Template, WebTemplate)]
#[template(path = "c_character.html")]
pub(crate) struct CreateCharacterTemplate {
    pub(crate) flash: Option<FlashMessage>,
}

#[derive(Template, WebTemplate)]
#[template(path = "generate_manga.html")]
pub(crate) struct MangaTemplate {
    pub(crate) manga_image: String,
    pub(crate) prompt: String,
    pub(crate) refined: bool,
}

/// handles the / GET
pub(crate) async fn root_handler(
    State(state): State<AppState>,
    session: Session,
) -> Result<IndexTemplate, MangakaError> {
    let characters = state
        .store
        .list()
        .await
        .into_iter()
        .map(|(id, character)| CharacterView {
            id: id.to_string(),
            created: character
                .created_at
                .map(|created| created.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            name: character.name,
            appearance: character.appearance,
            traits: character.traits,
            profile_pic: character.profile_pic,
        })
        .collect();

    Ok(IndexTemplate {
        characters,
        flash: take_flash_message(&session).await?,
    })
}

/// handles the /c_character GET
pub(crate) async fn create_character_form(
    session: Session,
) -> Result<CreateCharacterTemplate, MangakaError> {
    Ok(CreateCharacterTemplate {
        flash: take_flash_message(&session).await?,
    })
}
