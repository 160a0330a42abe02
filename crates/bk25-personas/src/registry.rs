use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::types::{Persona, PersonaError, Personality};

/// One prior conversation turn handed to `build_prompt`.
#[derive(Debug, Clone)]
pub struct PromptTurn {
    pub role: String,
    pub content: String,
}

struct Inner {
    personas: BTreeMap<String, Arc<Persona>>,
    current: Option<Arc<Persona>>,
}

/// Loads, validates, and serves immutable persona descriptors.
///
/// Read-mostly: lookups clone `Arc`s out of the map; `switch`, `reload`, and
/// `add_custom` serialize behind the write lock.
pub struct PersonaRegistry {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl PersonaRegistry {
    pub fn new(personas_path: impl AsRef<Path>) -> Self {
        Self {
            path: personas_path.as_ref().to_path_buf(),
            inner: RwLock::new(Inner {
                personas: BTreeMap::new(),
                current: None,
            }),
        }
    }

    /// Load every `*.json` descriptor in the configured directory.
    ///
    /// Malformed files are skipped with a log entry and never abort startup.
    /// After this returns, `current()` is guaranteed non-empty: an empty or
    /// failed load synthesizes the fallback persona.
    pub fn load_all(&self) -> usize {
        let loaded = self.read_descriptors();

        let mut inner = self.inner.write().unwrap();
        inner.personas.clear();
        for persona in loaded {
            inner
                .personas
                .insert(persona.id.clone(), Arc::new(persona));
        }

        if inner.personas.is_empty() {
            let fallback = Arc::new(fallback_persona());
            inner.personas.insert(fallback.id.clone(), fallback);
            warn!("no personas loaded, using fallback persona");
        }

        inner.current = pick_default(&inner.personas);
        info!(
            count = inner.personas.len(),
            current = inner.current.as_ref().map(|p| p.id.as_str()),
            "persona registry loaded"
        );
        inner.personas.len()
    }

    /// Reload descriptors from disk, keeping the current persona selected
    /// when it still exists.
    pub fn reload(&self) -> usize {
        let current_id = self
            .inner
            .read()
            .unwrap()
            .current
            .as_ref()
            .map(|p| p.id.clone());

        let count = self.load_all();

        if let Some(id) = current_id {
            let mut inner = self.inner.write().unwrap();
            if let Some(p) = inner.personas.get(&id).cloned() {
                inner.current = Some(p);
            }
        }
        count
    }

    fn read_descriptors(&self) -> Vec<Persona> {
        let mut out = Vec::new();
        let entries = match std::fs::read_dir(&self.path) {
            Ok(e) => e,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "personas directory not readable");
                return out;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_descriptor(&path) {
                Ok(persona) => {
                    info!(id = %persona.id, name = %persona.name, "loaded persona");
                    out.push(persona);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping invalid persona file");
                }
            }
        }
        out
    }

    pub fn list(&self) -> Vec<Arc<Persona>> {
        self.inner.read().unwrap().personas.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Arc<Persona>> {
        self.inner.read().unwrap().personas.get(id).cloned()
    }

    /// Personas eligible on `channel_id` (empty `channels` set = everywhere).
    pub fn list_for_channel(&self, channel_id: &str) -> Vec<Arc<Persona>> {
        self.inner
            .read()
            .unwrap()
            .personas
            .values()
            .filter(|p| p.is_eligible_for(channel_id))
            .cloned()
            .collect()
    }

    pub fn current(&self) -> Option<Arc<Persona>> {
        self.inner.read().unwrap().current.clone()
    }

    /// Switch the current persona. Unknown ids are a no-op returning `None`.
    pub fn switch(&self, id: &str) -> Option<Arc<Persona>> {
        let mut inner = self.inner.write().unwrap();
        match inner.personas.get(id).cloned() {
            Some(persona) => {
                info!(id = %persona.id, name = %persona.name, "switched persona");
                inner.current = Some(persona.clone());
                Some(persona)
            }
            None => {
                warn!(id, "persona not found");
                None
            }
        }
    }

    /// Register a runtime-created persona. It behaves exactly like a loaded
    /// one apart from the `custom` flag.
    pub fn add_custom(&self, mut persona: Persona) -> Result<Arc<Persona>, PersonaError> {
        persona.validate()?;
        persona.custom = true;

        let mut inner = self.inner.write().unwrap();
        if inner.personas.contains_key(&persona.id) {
            return Err(PersonaError::DuplicateId(persona.id));
        }
        let persona = Arc::new(persona);
        inner.personas.insert(persona.id.clone(), persona.clone());
        info!(id = %persona.id, "registered custom persona");
        Ok(persona)
    }

    /// Assemble the conversation prompt for the current persona:
    /// system prompt, a history header, one `role: content` line per prior
    /// turn, then the `User: …\nAssistant:` suffix. Without a current persona
    /// only the suffix is produced.
    pub fn build_prompt(&self, message: &str, history: &[PromptTurn]) -> String {
        let current = self.current();
        let Some(persona) = current else {
            return format!("User: {}\nAssistant:", message);
        };

        let mut prompt = String::with_capacity(persona.system_prompt.len() + 128);
        prompt.push_str(&persona.system_prompt);
        prompt.push_str("\n\nConversation history:\n");
        for turn in history {
            prompt.push_str(&format!("{}: {}\n", turn.role, turn.content));
        }
        prompt.push_str(&format!("\nUser: {}\nAssistant:", message));
        prompt
    }

    /// Greeting of the current persona, with a generic default.
    pub fn greeting(&self) -> String {
        self.current()
            .map(|p| p.greeting.clone())
            .unwrap_or_else(|| "Hello! How can I help you today?".to_string())
    }

    pub fn capabilities(&self) -> Vec<String> {
        self.current()
            .map(|p| p.capabilities.clone())
            .unwrap_or_else(|| vec!["General assistance".to_string()])
    }

    pub fn examples(&self) -> Vec<String> {
        self.current().map(|p| p.examples.clone()).unwrap_or_default()
    }
}

fn load_descriptor(path: &Path) -> Result<Persona, PersonaError> {
    let raw = std::fs::read_to_string(path)?;
    let persona: Persona = serde_json::from_str(&raw)?;
    persona.validate()?;
    Ok(persona)
}

/// Default selection order: `vanilla`, then `default`, then the first loaded.
fn pick_default(personas: &BTreeMap<String, Arc<Persona>>) -> Option<Arc<Persona>> {
    personas
        .get("vanilla")
        .or_else(|| personas.get("default"))
        .cloned()
        .or_else(|| personas.values().next().cloned())
}

fn fallback_persona() -> Persona {
    Persona {
        id: "fallback".to_string(),
        name: "BK25 Assistant".to_string(),
        description: "Default assistant persona".to_string(),
        greeting: "Hello! I'm BK25, your helpful AI assistant.".to_string(),
        system_prompt: "You are BK25, a helpful AI assistant that can generate \
                        automation scripts and provide conversational assistance."
            .to_string(),
        capabilities: vec![
            "General conversation".to_string(),
            "Automation scripting".to_string(),
        ],
        examples: vec![
            "Create a PowerShell script".to_string(),
            "Help with automation".to_string(),
        ],
        personality: Personality {
            tone: "friendly".to_string(),
            approach: "helpful".to_string(),
            philosophy: "assistance".to_string(),
            motto: "here to help".to_string(),
        },
        channels: Vec::new(),
        custom: false,
        extra: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;

    fn write_persona(dir: &Path, id: &str, channels: &[&str]) {
        let channels_json = serde_json::to_string(channels).unwrap();
        let body = format!(
            r#"{{
                "id": "{id}",
                "name": "Persona {id}",
                "description": "test persona",
                "greeting": "hi from {id}",
                "systemPrompt": "You are {id}.",
                "channels": {channels_json}
            }}"#
        );
        let mut f = std::fs::File::create(dir.join(format!("{id}.json"))).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn load_all_skips_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "alpha", &[]);
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("incomplete.json"), r#"{"id": "x"}"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = PersonaRegistry::new(dir.path());
        let count = registry.load_all();
        assert_eq!(count, 1);
        assert!(registry.get("alpha").is_some());
        assert!(registry.current().is_some());
    }

    #[test]
    fn empty_directory_yields_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let current = registry.current().expect("current must not be None");
        assert_eq!(current.id, "fallback");
        assert!(!current.system_prompt.is_empty());
    }

    #[test]
    fn missing_directory_yields_fallback() {
        let registry = PersonaRegistry::new("/nonexistent/personas/dir");
        registry.load_all();
        assert!(registry.current().is_some());
    }

    #[test]
    fn ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "a", &[]);
        write_persona(dir.path(), "b", &[]);
        write_persona(dir.path(), "c", &[]);

        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let personas = registry.list();
        let ids: HashSet<_> = personas.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids.len(), personas.len());
    }

    #[test]
    fn vanilla_is_preferred_default() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "alpha", &[]);
        write_persona(dir.path(), "vanilla", &[]);

        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();
        assert_eq!(registry.current().unwrap().id, "vanilla");
    }

    #[test]
    fn list_for_channel_filters_by_eligibility() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "everywhere", &[]);
        write_persona(dir.path(), "slack-only", &["slack"]);

        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let web = registry.list_for_channel("web");
        assert_eq!(web.len(), 1);
        assert_eq!(web[0].id, "everywhere");

        let slack = registry.list_for_channel("slack");
        assert_eq!(slack.len(), 2);
    }

    #[test]
    fn switch_unknown_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "alpha", &[]);
        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let before = registry.current().unwrap().id.clone();
        assert!(registry.switch("ghost").is_none());
        assert_eq!(registry.current().unwrap().id, before);
    }

    #[test]
    fn build_prompt_contains_system_prompt_and_suffix() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "alpha", &[]);
        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let history = vec![
            PromptTurn {
                role: "user".to_string(),
                content: "earlier question".to_string(),
            },
            PromptTurn {
                role: "assistant".to_string(),
                content: "earlier answer".to_string(),
            },
        ];
        let prompt = registry.build_prompt("list my files", &history);

        assert!(prompt.contains("You are alpha."));
        assert!(prompt.contains("Conversation history:"));
        assert!(prompt.contains("user: earlier question"));
        assert!(prompt.ends_with("User: list my files\nAssistant:"));
    }

    #[test]
    fn build_prompt_without_current_is_suffix_only() {
        let registry = PersonaRegistry::new("/nonexistent");
        // no load_all: current is None
        let prompt = registry.build_prompt("hello", &[]);
        assert_eq!(prompt, "User: hello\nAssistant:");
    }

    #[test]
    fn add_custom_rejects_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        write_persona(dir.path(), "alpha", &[]);
        let registry = PersonaRegistry::new(dir.path());
        registry.load_all();

        let dup: Persona = serde_json::from_str(
            r#"{"id": "alpha", "name": "n", "description": "d",
                "greeting": "g", "systemPrompt": "s"}"#,
        )
        .unwrap();
        assert!(matches!(
            registry.add_custom(dup),
            Err(PersonaError::DuplicateId(_))
        ));

        let fresh: Persona = serde_json::from_str(
            r#"{"id": "beta", "name": "n", "description": "d",
                "greeting": "g", "systemPrompt": "s"}"#,
        )
        .unwrap();
        let added = registry.add_custom(fresh).unwrap();
        assert!(added.custom);
        assert!(registry.get("beta").is_some());
    }
}
