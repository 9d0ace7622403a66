//! Move, ability and held-item definitions, looked up by name.
//!
//! The built-in catalog is compiled in from `data/*.ron`. A directory of RON
//! files with the same names can replace or extend individual entries.

use crate::config::BattleConfig;
use crate::effects::{Ability, HeldItem};
use crate::errors::{DefinitionError, DefinitionResult};
use crate::move_data::MoveData;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const BUILTIN_MOVES: &str = include_str!("../data/moves.ron");
const BUILTIN_ABILITIES: &str = include_str!("../data/abilities.ron");
const BUILTIN_ITEMS: &str = include_str!("../data/items.ron");

const MOVES_FILE: &str = "moves.ron";
const ABILITIES_FILE: &str = "abilities.ron";
const ITEMS_FILE: &str = "items.ron";

/// Read access to definitions by name. Unknown names resolve to `None`.
pub trait DefinitionLookup: Send + Sync {
    fn get_move(&self, name: &str) -> Option<MoveData>;
    fn get_ability(&self, name: &str) -> Option<Ability>;
    fn get_item(&self, name: &str) -> Option<HeldItem>;

    /// Resolves every name, failing on the first unknown move.
    fn resolve_moves(&self, names: &[String]) -> DefinitionResult<Vec<MoveData>> {
        names
            .iter()
            .map(|name| {
                self.get_move(name)
                    .ok_or_else(|| DefinitionError::MoveNotFound(name.clone()))
            })
            .collect()
    }
}

/// Names match ignoring case, spaces, hyphens and underscores.
fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect()
}

fn parse_list<T: DeserializeOwned>(source_name: &str, text: &str) -> DefinitionResult<Vec<T>> {
    ron::from_str(text).map_err(|err| DefinitionError::MalformedData {
        source_name: source_name.to_string(),
        message: err.to_string(),
    })
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionCatalog {
    moves: HashMap<String, MoveData>,
    abilities: HashMap<String, Ability>,
    items: HashMap<String, HeldItem>,
}

impl DefinitionCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> DefinitionResult<Self> {
        Self::from_ron_strs(BUILTIN_MOVES, BUILTIN_ABILITIES, BUILTIN_ITEMS)
    }

    pub fn from_ron_strs(moves: &str, abilities: &str, items: &str) -> DefinitionResult<Self> {
        let mut catalog = Self::default();
        catalog.merge_moves(parse_list(MOVES_FILE, moves)?);
        catalog.merge_abilities(parse_list(ABILITIES_FILE, abilities)?);
        catalog.merge_items(parse_list(ITEMS_FILE, items)?);
        Ok(catalog)
    }

    /// The catalog a config asks for: its `definitions` directory layered
    /// over the built-in entries, or just the built-in entries.
    pub fn from_config(config: &BattleConfig) -> DefinitionResult<Self> {
        match &config.definitions {
            Some(dir) => Self::load_dir(dir),
            None => Self::builtin(),
        }
    }

    /// The built-in catalog with entries from `dir` layered on top. Each of
    /// `moves.ron`, `abilities.ron` and `items.ron` is optional.
    pub fn load_dir(dir: &Path) -> DefinitionResult<Self> {
        let mut catalog = Self::builtin()?;

        if let Some(text) = read_optional(&dir.join(MOVES_FILE))? {
            catalog.merge_moves(parse_list(MOVES_FILE, &text)?);
        }
        if let Some(text) = read_optional(&dir.join(ABILITIES_FILE))? {
            catalog.merge_abilities(parse_list(ABILITIES_FILE, &text)?);
        }
        if let Some(text) = read_optional(&dir.join(ITEMS_FILE))? {
            catalog.merge_items(parse_list(ITEMS_FILE, &text)?);
        }

        tracing::info!(
            dir = %dir.display(),
            moves = catalog.moves.len(),
            abilities = catalog.abilities.len(),
            items = catalog.items.len(),
            "loaded definition catalog"
        );
        Ok(catalog)
    }

    pub fn merge_moves(&mut self, moves: Vec<MoveData>) {
        for data in moves {
            self.moves.insert(normalize(&data.name), data);
        }
    }

    pub fn merge_abilities(&mut self, abilities: Vec<Ability>) {
        for ability in abilities {
            self.abilities.insert(normalize(&ability.name), ability);
        }
    }

    pub fn merge_items(&mut self, items: Vec<HeldItem>) {
        for item in items {
            self.items.insert(normalize(&item.name), item);
        }
    }

    pub fn move_count(&self) -> usize {
        self.moves.len()
    }
}

fn read_optional(path: &Path) -> DefinitionResult<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| DefinitionError::Io {
            path: path.display().to_string(),
            source,
        })
}

impl DefinitionLookup for DefinitionCatalog {
    fn get_move(&self, name: &str) -> Option<MoveData> {
        self.moves.get(&normalize(name)).cloned()
    }

    fn get_ability(&self, name: &str) -> Option<Ability> {
        self.abilities.get(&normalize(name)).cloned()
    }

    fn get_item(&self, name: &str) -> Option<HeldItem> {
        self.items.get(&normalize(name)).cloned()
    }
}
