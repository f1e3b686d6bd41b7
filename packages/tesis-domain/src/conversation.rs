use serde::{Deserialize, Serialize};

use crate::record::JurisprudenceRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
	pub role: Role,
	pub content: String,
	/// Sources cited by an assistant turn. Stored as `null` for turns without citations.
	#[serde(default, deserialize_with = "null_as_empty")]
	pub sources: Vec<JurisprudenceRecord>,
}
impl Turn {
	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into(), sources: Vec::new() }
	}

	pub fn assistant(content: impl Into<String>, sources: Vec<JurisprudenceRecord>) -> Self {
		Self { role: Role::Assistant, content: content.into(), sources }
	}
}

/// The last `window` turns, oldest first.
pub fn recent(turns: &[Turn], window: usize) -> &[Turn] {
	&turns[turns.len().saturating_sub(window)..]
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<JurisprudenceRecord>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	Ok(Option::<Vec<JurisprudenceRecord>>::deserialize(deserializer)?.unwrap_or_default())
}
