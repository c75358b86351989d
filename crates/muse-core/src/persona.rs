//! Personas: the voice captions are written in.
//!
//! A `PersonaBook` always holds at least one persona. The active id is
//! stored separately (in settings) and may dangle after a reload; lookups
//! then fall back to the first persona.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_PERSONA_ID: &str = "default_gigi";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub age: String,
    pub occupation: String,
    pub location: String,
    /// IANA zone name, e.g. `America/Los_Angeles`.
    pub timezone: String,
    pub bio: String,
    pub aesthetic: String,
    pub voice_tone: String,
    pub emoji_style: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Default for Persona {
    /// The built-in persona every fresh install starts with.
    fn default() -> Self {
        Self {
            id: DEFAULT_PERSONA_ID.into(),
            name: "Gigi".into(),
            age: "28".into(),
            occupation: "Creative Director".into(),
            location: "Los Angeles".into(),
            timezone: "America/Los_Angeles".into(),
            bio: "Less is more. Digital artist obsessed with brutalism and matcha.".into(),
            aesthetic: "Minimalist, Industrial, Raw".into(),
            voice_tone: "Witty, Nonchalant".into(),
            emoji_style: "Minimalist (🖤, 🌫, ⚓️)".into(),
            avatar: None,
        }
    }
}

impl Persona {
    /// A blank identity seeded from the default persona.
    pub fn new_identity() -> Self {
        Self {
            id: uuid::Uuid::new_v4().simple().to_string(),
            name: "New Identity".into(),
            avatar: None,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersonaError {
    #[error("cannot delete the last persona")]
    LastPersona,
    #[error("unknown persona: {0}")]
    UnknownPersona(String),
}

/// The persona list plus the active selection.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonaBook {
    personas: Vec<Persona>,
    active_id: String,
}

impl Default for PersonaBook {
    fn default() -> Self {
        Self {
            personas: vec![Persona::default()],
            active_id: DEFAULT_PERSONA_ID.into(),
        }
    }
}

impl PersonaBook {
    /// Build from stored data. An empty list is replaced by the default
    /// persona.
    pub fn from_parts(personas: Vec<Persona>, active_id: impl Into<String>) -> Self {
        let personas = if personas.is_empty() {
            vec![Persona::default()]
        } else {
            personas
        };
        Self {
            personas,
            active_id: active_id.into(),
        }
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    pub fn active_id(&self) -> &str {
        &self.active_id
    }

    /// The active persona, or the first one when the stored id dangles.
    pub fn active(&self) -> &Persona {
        self.personas
            .iter()
            .find(|p| p.id == self.active_id)
            .unwrap_or(&self.personas[0])
    }

    pub fn get(&self, id: &str) -> Option<&Persona> {
        self.personas.iter().find(|p| p.id == id)
    }

    /// Append a new identity. It does not become active.
    pub fn create_identity(&mut self) -> &Persona {
        let persona = Persona::new_identity();
        log::debug!("created persona {}", persona.id);
        self.personas.push(persona);
        &self.personas[self.personas.len() - 1]
    }

    /// Replace the persona with the same id.
    pub fn update(&mut self, updated: Persona) -> Result<(), PersonaError> {
        let slot = self
            .personas
            .iter_mut()
            .find(|p| p.id == updated.id)
            .ok_or_else(|| PersonaError::UnknownPersona(updated.id.clone()))?;
        *slot = updated;
        Ok(())
    }

    /// Remove a persona. Deleting the active one activates the first
    /// remaining persona.
    pub fn delete(&mut self, id: &str) -> Result<Persona, PersonaError> {
        if self.personas.len() <= 1 {
            return Err(PersonaError::LastPersona);
        }
        let index = self
            .personas
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PersonaError::UnknownPersona(id.to_string()))?;
        let removed = self.personas.remove(index);
        if self.active_id == id {
            self.active_id = self.personas[0].id.clone();
        }
        log::debug!("deleted persona {id}, active is {}", self.active_id);
        Ok(removed)
    }

    pub fn set_active(&mut self, id: &str) -> Result<(), PersonaError> {
        if self.get(id).is_none() {
            return Err(PersonaError::UnknownPersona(id.to_string()));
        }
        self.active_id = id.to_string();
        Ok(())
    }
}
