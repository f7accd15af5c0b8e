//! Catalog of templates, builders, agents, and topics, plus the resolution
//! cache.
//!
//! The registry is an explicit, constructor-injected instance — there is no
//! process-wide singleton. Each kind lives in its own namespace; ids are flat
//! strings (`core.agent.hint`, `topic.math.linear-equations`) and kinds are
//! never cross-looked-up. Every resolve/build path consults the cache first,
//! keyed by `(kind, id, context snapshot)`. Failed resolutions are never
//! cached; recomputation is always a safe fallback.

use crate::agents::{AgentDefinition, AgentKind};
use crate::builder::PromptBuilder;
use crate::error::{Result, TutorError};
use crate::instruction::Instruction;
use crate::template::Template;
use crate::topic::Topic;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// The four registrable kinds. They share the namespace shape but never
/// cross-resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryKind {
    Template,
    Builder,
    Agent,
    Topic,
}

impl fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryKind::Template => "template",
            RegistryKind::Builder => "builder",
            RegistryKind::Agent => "agent",
            RegistryKind::Topic => "topic",
        };
        write!(f, "{name}")
    }
}

/// Bookkeeping attached to every registered payload.
#[derive(Debug, Clone)]
pub struct RegistryMetadata {
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub version: u32,
}

impl RegistryMetadata {
    fn new() -> Self {
        let now = SystemTime::now();
        Self {
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    fn bump(&mut self) {
        self.updated_at = SystemTime::now();
        self.version += 1;
    }
}

#[derive(Debug, Clone)]
struct RegistryEntry<T> {
    payload: T,
    metadata: RegistryMetadata,
}

/// Cache sizing and expiry policy.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300),
            max_entries: 128,
        }
    }
}

struct CacheEntry {
    text: String,
    inserted_at: u64,
    hit_count: u64,
}

/// Millisecond clock the cache reads time from; injectable for tests.
pub type ClockFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// TTL- and size-bounded store of resolved prompt text. Entries older than
/// the TTL are treated as absent; inserting past the size bound evicts the
/// oldest entry. Shared across sessions behind a mutex — the cache is a pure
/// optimization, so a lost entry only costs a recomputation.
struct PromptCache {
    entries: Mutex<HashMap<u64, CacheEntry>>,
    config: CacheConfig,
    clock: ClockFn,
}

fn wall_clock_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl PromptCache {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock: Arc::new(wall_clock_millis),
        }
    }

    fn with_clock(config: CacheConfig, clock: ClockFn) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            config,
            clock,
        }
    }

    fn get(&self, key: u64) -> Option<String> {
        let now = (self.clock)();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(&key) {
            Some(entry) => now.saturating_sub(entry.inserted_at) > self.config.ttl.as_millis() as u64,
            None => return None,
        };
        if expired {
            entries.remove(&key);
            return None;
        }
        let entry = entries.get_mut(&key)?;
        entry.hit_count += 1;
        Some(entry.text.clone())
    }

    fn insert(&self, key: u64, text: String) {
        let now = (self.clock)();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| *k);
            match oldest {
                Some(k) => {
                    entries.remove(&k);
                }
                None => break,
            }
        }
        entries.insert(
            key,
            CacheEntry {
                text,
                inserted_at: now,
                hit_count: 0,
            },
        );
    }

    fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn hit_count(&self, key: u64) -> u64 {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .map(|entry| entry.hit_count)
            .unwrap_or(0)
    }
}

/// Process-wide catalog of prompt building blocks plus the resolution cache.
pub struct Registry {
    templates: HashMap<String, RegistryEntry<Template>>,
    builders: HashMap<String, RegistryEntry<PromptBuilder>>,
    agents: HashMap<String, RegistryEntry<AgentDefinition>>,
    topics: HashMap<String, RegistryEntry<Topic>>,
    cache: PromptCache,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Registry {
    pub fn new(cache_config: CacheConfig) -> Self {
        Self {
            templates: HashMap::new(),
            builders: HashMap::new(),
            agents: HashMap::new(),
            topics: HashMap::new(),
            cache: PromptCache::new(cache_config),
        }
    }

    /// A registry whose cache reads time from the given millisecond clock.
    /// Lets tests drive expiry without sleeping.
    pub fn with_clock(cache_config: CacheConfig, clock: ClockFn) -> Self {
        Self {
            templates: HashMap::new(),
            builders: HashMap::new(),
            agents: HashMap::new(),
            topics: HashMap::new(),
            cache: PromptCache::with_clock(cache_config, clock),
        }
    }

    pub fn register_template(&mut self, id: impl Into<String>, template: Template) {
        register(&mut self.templates, id.into(), template);
    }

    pub fn register_builder(&mut self, id: impl Into<String>, builder: PromptBuilder) {
        register(&mut self.builders, id.into(), builder);
    }

    pub fn register_agent(&mut self, id: impl Into<String>, agent: AgentDefinition) {
        register(&mut self.agents, id.into(), agent);
    }

    pub fn register_topic(&mut self, id: impl Into<String>, topic: Topic) {
        register(&mut self.topics, id.into(), topic);
    }

    pub fn template(&self, id: &str) -> Result<&Template> {
        lookup(&self.templates, RegistryKind::Template, id)
    }

    pub fn builder(&self, id: &str) -> Result<&PromptBuilder> {
        lookup(&self.builders, RegistryKind::Builder, id)
    }

    pub fn agent(&self, id: &str) -> Result<&AgentDefinition> {
        lookup(&self.agents, RegistryKind::Agent, id)
    }

    pub fn topic(&self, id: &str) -> Result<&Topic> {
        lookup(&self.topics, RegistryKind::Topic, id)
    }

    pub fn template_version(&self, id: &str) -> Option<u32> {
        self.templates.get(id).map(|entry| entry.metadata.version)
    }

    /// Resolves a registered template with the given context bound in.
    pub fn resolve_template(&self, id: &str, context: Option<&Value>) -> Result<String> {
        let key = cache_key(RegistryKind::Template, id, context, "");
        if let Some(text) = self.cache.get(key) {
            debug!(id, "template cache hit");
            return Ok(text);
        }
        let mut template = self.template(id)?.clone();
        if let Some(context) = context {
            template.set_context(context);
        }
        let resolved = template.resolve()?;
        self.cache.insert(key, resolved.text.clone());
        Ok(resolved.text)
    }

    /// Builds a registered prompt builder, appending the context as a final
    /// section when present.
    pub fn build_prompt(&self, id: &str, context: Option<&Value>) -> Result<String> {
        let key = cache_key(RegistryKind::Builder, id, context, "");
        if let Some(text) = self.cache.get(key) {
            debug!(id, "builder cache hit");
            return Ok(text);
        }
        let mut builder = self.builder(id)?.clone();
        if let Some(context) = context {
            builder = builder.add_context(context);
        }
        let text = builder.build();
        self.cache.insert(key, text.clone());
        Ok(text)
    }

    /// Builds a registered agent's base prompt with optional context.
    pub fn build_agent_prompt(&self, id: &str, context: Option<&Value>) -> Result<String> {
        let key = cache_key(RegistryKind::Agent, id, context, "");
        if let Some(text) = self.cache.get(key) {
            debug!(id, "agent cache hit");
            return Ok(text);
        }
        let agent = self.agent(id)?;
        let mut builder = agent.base_builder();
        if let Some(context) = context {
            builder = builder.add_context(context);
        }
        let text = builder.build();
        self.cache.insert(key, text.clone());
        Ok(text)
    }

    /// Builds an agent prompt scoped to a topic: the base agent's role merged
    /// with the topic's per-agent customization and learning objectives.
    pub fn build_topic_prompt(
        &self,
        topic_id: &str,
        agent_kind: AgentKind,
        context: Option<&Value>,
    ) -> Result<String> {
        let scoped_id = format!("{topic_id}#{agent_kind}");
        let key = cache_key(RegistryKind::Topic, &scoped_id, context, "");
        if let Some(text) = self.cache.get(key) {
            debug!(topic_id, agent = %agent_kind, "topic prompt cache hit");
            return Ok(text);
        }
        let builder = self.topic_builder(topic_id, agent_kind, context)?;
        let text = builder.build();
        self.cache.insert(key, text.clone());
        Ok(text)
    }

    /// Builds the full prompt for one decision: the topic-scoped agent
    /// prompt with the instruction payload applied. This is the path the
    /// session runner takes every turn.
    pub fn build_instruction_prompt(
        &self,
        topic_id: &str,
        instruction: &Instruction,
        context: Option<&Value>,
    ) -> Result<String> {
        let agent_kind = AgentKind::for_action(instruction.action());
        let scoped_id = format!("{topic_id}#{agent_kind}");
        let salt = serde_json::to_string(instruction).unwrap_or_default();
        let key = cache_key(RegistryKind::Topic, &scoped_id, context, &salt);
        if let Some(text) = self.cache.get(key) {
            debug!(topic_id, agent = %agent_kind, "instruction prompt cache hit");
            return Ok(text);
        }
        let agent = self.agent(&agent_kind.registry_id())?;
        let builder = self.topic_builder(topic_id, agent_kind, context)?;
        let builder = agent.apply_instruction(builder, instruction)?;
        let text = builder.build();
        self.cache.insert(key, text.clone());
        Ok(text)
    }

    fn topic_builder(
        &self,
        topic_id: &str,
        agent_kind: AgentKind,
        context: Option<&Value>,
    ) -> Result<PromptBuilder> {
        let topic = self.topic(topic_id)?;
        let agent = self.agent(&agent_kind.registry_id())?;
        let mut builder = agent.base_builder();
        if let Some(customization) = topic.agent_customizations.get(&agent_kind) {
            builder = builder.add_section("TOPIC GUIDANCE", customization.as_str());
        }
        builder = builder
            .add_section("TOPIC", topic.display_name.as_str())
            .add_objectives(topic.learning_objectives.clone());
        if !topic.key_formulas.is_empty() {
            builder = builder.add_section("KEY FORMULAS", topic.key_formulas.clone());
        }
        if !topic.math_tools.is_null() {
            builder = builder.add_visual_tools(&topic.math_tools);
        }
        if let Some(context) = context {
            builder = builder.add_context(context);
        }
        Ok(builder)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Hit count for a template cache entry; used to verify round-trip
    /// behavior.
    pub fn template_cache_hits(&self, id: &str, context: Option<&Value>) -> u64 {
        self.cache
            .hit_count(cache_key(RegistryKind::Template, id, context, ""))
    }
}

/// Registers the canonical definitions of all five generation agents under
/// their `core.agent.*` ids.
pub fn install_core_agents(registry: &mut Registry) {
    for kind in AgentKind::ALL {
        registry.register_agent(kind.registry_id(), AgentDefinition::for_kind(kind));
    }
}

fn register<T>(map: &mut HashMap<String, RegistryEntry<T>>, id: String, payload: T) {
    match map.get_mut(&id) {
        Some(entry) => {
            entry.payload = payload;
            entry.metadata.bump();
        }
        None => {
            map.insert(
                id,
                RegistryEntry {
                    payload,
                    metadata: RegistryMetadata::new(),
                },
            );
        }
    }
}

fn lookup<'a, T>(
    map: &'a HashMap<String, RegistryEntry<T>>,
    kind: RegistryKind,
    id: &str,
) -> Result<&'a T> {
    map.get(id)
        .map(|entry| &entry.payload)
        .ok_or_else(|| TutorError::not_found(kind, id))
}

fn cache_key(kind: RegistryKind, id: &str, context: Option<&Value>, salt: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    id.hash(&mut hasher);
    if let Some(context) = context {
        serde_json::to_string(context)
            .unwrap_or_default()
            .hash(&mut hasher);
    }
    salt.hash(&mut hasher);
    hasher.finish()
}

/// A manually advanced clock for cache tests. Kept here rather than in the
/// test module so integration tests can reuse it.
pub fn manual_clock() -> (ClockFn, Arc<AtomicU64>) {
    let now = Arc::new(AtomicU64::new(0));
    let handle = Arc::clone(&now);
    (Arc::new(move || now.load(Ordering::SeqCst)), handle)
}
