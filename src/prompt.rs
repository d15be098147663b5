//! Prompt building for portraits and story panels.

use crate::store::{Character, CharacterId};

/// Prompt used to render a new character's portrait.
pub fn portrait_prompt(name: &str, appearance: &str, traits: &str) -> String {
    format!("Anime character portrait of {name}. Appearance: {appearance}, Traits: {traits}")
}

/// Expands every known character name in `story` into
/// `"name, appearance, traits"`.
///
/// This is plain substring replacement applied character by character in the
/// order given (id order when coming from the store). It ignores word
/// boundaries, so `"Mia"` also matches inside `"Miami"`, and a later name can
/// match inside text inserted for an earlier one.
pub fn compose_story_prompt<'a, I>(story: &str, characters: I) -> String
where
    I: IntoIterator<Item = &'a (CharacterId, Character)>,
{
    let mut prompt = story.to_string();
    for (_, character) in characters {
        // "".replace would splice the description between every char
        if character.name.is_empty() {
            continue;
        }
        let expanded = format!(
            "{}, {}, {}",
            character.name, character.appearance, character.traits
        );
        prompt = prompt.replace(&character.name, &expanded);
    }
    prompt
}
