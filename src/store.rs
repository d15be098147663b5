//! Character storage backed by a single pretty-printed JSON file.
//!
//! The whole mapping lives in memory behind a mutex and is rewritten to disk
//! on every change. Files written by older versions, a bare `{"1": {...}}`
//! mapping, are still accepted on load.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Identifier of a stored character, written as a string key in the JSON file.
pub type CharacterId = u64;

/// A user-defined persona and its generated portrait.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Display name, also what story prompts are matched against.
    pub name: String,
    /// Free text describing how the character looks.
    pub appearance: String,
    /// Free text describing personality.
    pub traits: String,
    /// URL path of the generated portrait.
    #[serde(default)]
    pub profile_pic: String,
    /// When the character was created, missing for legacy records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Character {
    /// Builds a new character stamped with the current time.
    pub fn new(name: &str, appearance: &str, traits: &str, profile_pic: String) -> Self {
        Self {
            name: name.to_string(),
            appearance: appearance.to_string(),
            traits: traits.to_string(),
            profile_pic,
            created_at: Some(Utc::now()),
        }
    }
}

/// Errors returned when reading or writing the character file.
#[derive(Debug)]
pub enum StoreError {
    /// Reading or writing the file failed.
    Io(std::io::Error),
    /// The file exists but isn't valid character JSON.
    Parse(serde_json::Error),
    /// The in-memory mapping couldn't be serialized.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Character file I/O failed: {err}"),
            Self::Parse(err) => write!(f, "Failed to parse character file: {err}"),
            Self::Serialize(err) => write!(f, "Failed to serialize characters: {err}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) | Self::Serialize(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: CharacterId,
    characters: BTreeMap<CharacterId, Character>,
}

impl StoreFile {
    fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let is_current =
            matches!(&value, Value::Object(map) if map.contains_key("characters"));
        let mut file = if is_current {
            serde_json::from_value::<StoreFile>(value)?
        } else {
            StoreFile {
                next_id: 0,
                characters: serde_json::from_value(value)?,
            }
        };
        // never hand out an id that's already on disk
        let floor = file
            .characters
            .keys()
            .next_back()
            .map_or(1, |max| max.saturating_add(1));
        file.next_id = file.next_id.max(floor);
        Ok(file)
    }
}

/// The character mapping plus the file it is persisted to.
#[derive(Debug)]
pub struct CharacterStore {
    path: PathBuf,
    inner: Mutex<StoreFile>,
}

impl CharacterStore {
    /// Loads the store from `path`, starting empty if the file doesn't exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let file = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let value: Value = serde_json::from_slice(&bytes).map_err(StoreError::Parse)?;
                StoreFile::from_value(value).map_err(StoreError::Parse)?
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("{} not found, starting with no characters", path.display());
                StoreFile {
                    next_id: 1,
                    ..Default::default()
                }
            }
            Err(err) => return Err(StoreError::Io(err)),
        };
        info!(
            "Loaded {} characters from {}",
            file.characters.len(),
            path.display()
        );
        Ok(Self {
            path,
            inner: Mutex::new(file),
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All characters in id order.
    pub async fn list(&self) -> Vec<(CharacterId, Character)> {
        self.inner
            .lock()
            .await
            .characters
            .iter()
            .map(|(id, character)| (*id, character.clone()))
            .collect()
    }

    /// Looks up a single character.
    pub async fn get(&self, id: CharacterId) -> Option<Character> {
        self.inner.lock().await.characters.get(&id).cloned()
    }

    /// Number of stored characters.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.characters.len()
    }

    /// True when no characters are stored.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.characters.is_empty()
    }

    /// Hands out the next unused id. Ids are never reused, even if the caller
    /// never inserts anything under the one it got.
    pub async fn allocate_id(&self) -> CharacterId {
        let mut file = self.inner.lock().await;
        let id = file.next_id;
        file.next_id = id.saturating_add(1);
        id
    }

    /// Adds a character under `id` and rewrites the file.
    pub async fn insert(&self, id: CharacterId, character: Character) -> Result<(), StoreError> {
        let mut file = self.inner.lock().await;
        let previous = file.characters.insert(id, character);
        let next_floor = id.saturating_add(1);
        let previous_next = file.next_id;
        file.next_id = file.next_id.max(next_floor);
        if let Err(err) = write_file(&self.path, &file).await {
            match previous {
                Some(previous) => {
                    file.characters.insert(id, previous);
                }
                None => {
                    file.characters.remove(&id);
                }
            }
            file.next_id = previous_next;
            return Err(err);
        }
        Ok(())
    }

    /// Removes a character, returning it. Absent ids leave the file alone.
    pub async fn remove(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        let mut file = self.inner.lock().await;
        let Some(removed) = file.characters.remove(&id) else {
            return Ok(None);
        };
        if let Err(err) = write_file(&self.path, &file).await {
            file.characters.insert(id, removed);
            return Err(err);
        }
        Ok(Some(removed))
    }

    /// Rewrites the file from the in-memory state.
    pub async fn save(&self) -> Result<(), StoreError> {
        let file = self.inner.lock().await;
        write_file(&self.path, &file).await
    }
}

/// Serializes with four-space indentation, then swaps the file in with a rename.
async fn write_file(path: &Path, file: &StoreFile) -> Result<(), StoreError> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    file.serialize(&mut serializer)
        .map_err(StoreError::Serialize)?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, &buf).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(
        "Wrote {} characters to {}",
        file.characters.len(),
        path.display()
    );
    Ok(())
}
