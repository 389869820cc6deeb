//! The `prompt` sub-format: ComfyUI's executed graph.
//!
//! A flat object from node id to `{class_type, inputs}`. An input is either
//! a literal or a reference `[source_node_id, output_slot]`:
//!
//! ```json
//! "3": {"class_type": "KSampler",
//!       "inputs": {"seed": 42, "sampler_name": "euler", "positive": ["6", 0]}}
//! ```
//!
//! Nodes are first classified into roles ([`NodeRoles`]) in id order, the
//! first node of each role winning. Parameters come from the sampler node,
//! then from the pieces of a composite `SamplerCustomAdvanced` for whatever
//! is still empty. Prompts come from dedicated prompt nodes if present,
//! otherwise by tracing the sampler's conditioning references back to a
//! node with literal text.

use super::workflow::MAX_HOPS;
use crate::detect::GeneratorFamily;
use crate::metadata::{ExtractedMetadata, Seed};
use crate::parsers::{PayloadError, value_text};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Keys that hold the value of a primitive/literal node.
const VALUE_KEYS: &[&str] = &["value", "seed", "int", "float", "string", "text"];

/// Literal prompt fields, in preference order.
const TEXT_KEYS: &[&str] = &["text", "positive", "tags"];

/// Inputs followed when tracing conditioning back to its text.
const TRACE_KEYS: &[&str] = &[
    "text",
    "positive",
    "tags",
    "conditioning",
    "conditioning_1",
    "conditioning_to",
    "string",
    "prompt",
];

#[derive(Debug, Clone, Deserialize)]
pub struct PromptNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: Map<String, Value>,
}

/// `[node_id, slot]` reference to another node's output.
fn reference(value: &Value) -> Option<String> {
    match value.as_array()?.as_slice() {
        [id, slot] if slot.is_number() => match id {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        },
        _ => None,
    }
}

/// Numeric ids in numeric order, then the rest lexically.
fn id_order(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// The parsed graph with nodes in classification order.
pub struct PromptGraph {
    order: Vec<String>,
    nodes: HashMap<String, PromptNode>,
}

impl PromptGraph {
    /// Parse the payload. Entries that are not `{class_type, inputs}`
    /// objects are skipped.
    pub fn parse(payload: &str) -> Result<Self, PayloadError> {
        let raw: Map<String, Value> = serde_json::from_str(payload.trim())?;
        let mut nodes = HashMap::new();
        for (id, value) in raw {
            match serde_json::from_value::<PromptNode>(value) {
                Ok(node) => {
                    nodes.insert(id, node);
                }
                Err(e) => tracing::debug!(node = %id, error = %e, "skipping malformed prompt node"),
            }
        }
        let mut order: Vec<String> = nodes.keys().cloned().collect();
        order.sort_by(|a, b| id_order(a, b));
        Ok(Self { order, nodes })
    }

    pub fn node(&self, id: &str) -> Option<&PromptNode> {
        self.nodes.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PromptNode> {
        self.order.iter().filter_map(|id| self.nodes.get(id))
    }

    /// The node an input of `node` references.
    fn follow(&self, node: &PromptNode, input: &str) -> Option<&PromptNode> {
        node.inputs
            .get(input)
            .and_then(reference)
            .and_then(|id| self.node(&id))
    }

    /// Literal value of `key` on `node`. A reference is followed to the
    /// source node, which supplies either the same key or a value-like key
    /// (primitive nodes), for at most [`MAX_HOPS`] steps.
    pub fn literal<'a>(&'a self, node: &'a PromptNode, key: &str) -> Option<&'a Value> {
        let mut value = node.inputs.get(key)?;
        let mut visited = HashSet::new();
        for _ in 0..MAX_HOPS {
            let Some(id) = reference(value) else {
                return Some(value);
            };
            if !visited.insert(id.clone()) {
                return None;
            }
            let source = self.node(&id)?;
            value = std::iter::once(key)
                .chain(VALUE_KEYS.iter().copied())
                .find_map(move |k| source.inputs.get(k))?;
        }
        None
    }

    fn literal_text(&self, node: &PromptNode, keys: &[&str]) -> Option<String> {
        keys.iter()
            .find_map(|key| self.literal(node, key).and_then(value_text))
    }

    fn literal_seed(&self, node: &PromptNode, keys: &[&str]) -> Option<Seed> {
        keys.iter()
            .find_map(|key| self.literal(node, key).and_then(Seed::from_json))
    }

    /// Prompt text of `node`: `text`, then `positive`, then `tags`.
    pub fn prompt_text(&self, node: &PromptNode) -> Option<String> {
        TEXT_KEYS.iter().find_map(|key| {
            self.literal(node, key)
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    /// Walk conditioning references from `start` back to a node with
    /// literal prompt text. When the chain cannot be traced further, the
    /// last visited node is returned.
    pub fn get_prompt_node(&self, start: &str) -> Option<&PromptNode> {
        let mut current = self.node(start)?;
        let mut visited = HashSet::from([start.to_string()]);
        for _ in 0..MAX_HOPS {
            if self.prompt_text(current).is_some() {
                return Some(current);
            }
            let next = TRACE_KEYS
                .iter()
                .find_map(|key| current.inputs.get(*key).and_then(reference));
            match next {
                Some(id) if visited.insert(id.clone()) => match self.node(&id) {
                    Some(node) => current = node,
                    None => return Some(current),
                },
                _ => return Some(current),
            }
        }
        Some(current)
    }

    /// Prompt reached from the reference stored in `input` of `node`.
    fn traced_prompt(&self, node: &PromptNode, input: &str) -> Option<String> {
        let start = node.inputs.get(input).and_then(reference)?;
        self.get_prompt_node(&start)
            .and_then(|n| self.prompt_text(n))
    }
}

/// First node of each role, by id order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeRoles<'a> {
    pub sampler: Option<&'a PromptNode>,
    pub composite: Option<&'a PromptNode>,
    pub checkpoint: Option<&'a PromptNode>,
    pub unet: Option<&'a PromptNode>,
    pub positive: Option<&'a PromptNode>,
    pub negative: Option<&'a PromptNode>,
}

impl<'a> NodeRoles<'a> {
    /// Classify `graph` in one pass.
    pub fn classify(graph: &'a PromptGraph) -> Self {
        graph.iter().fold(Self::default(), Self::with)
    }

    /// `self` with `node` recorded under its role, unless that role is
    /// already taken.
    fn with(self, node: &'a PromptNode) -> Self {
        match node.class_type.as_str() {
            "KSampler" | "KSampler (Efficient)" | "BasicScheduler" => Self {
                sampler: self.sampler.or(Some(node)),
                ..self
            },
            "SamplerCustomAdvanced" => Self {
                composite: self.composite.or(Some(node)),
                ..self
            },
            "CheckpointLoaderSimple" | "easy a1111Loader" => Self {
                checkpoint: self.checkpoint.or(Some(node)),
                ..self
            },
            "UNETLoader" => Self {
                unet: self.unet.or(Some(node)),
                ..self
            },
            "easy positive" => Self {
                positive: self.positive.or(Some(node)),
                ..self
            },
            "easy negative" => Self {
                negative: self.negative.or(Some(node)),
                ..self
            },
            _ => self,
        }
    }

    fn is_empty(&self) -> bool {
        self.sampler.is_none()
            && self.composite.is_none()
            && self.checkpoint.is_none()
            && self.unet.is_none()
            && self.positive.is_none()
            && self.negative.is_none()
    }
}

fn fill(field: &mut String, value: Option<String>) {
    if !field.is_empty() {
        return;
    }
    if let Some(value) = value {
        *field = value;
    }
}

/// Read a `prompt` payload. Fails when no node plays any known role.
pub fn read_prompt_graph(payload: &str) -> Result<ExtractedMetadata, PayloadError> {
    let graph = PromptGraph::parse(payload)?;
    let roles = NodeRoles::classify(&graph);
    if roles.is_empty() {
        return Err(PayloadError::Shape("prompt graph has no recognised nodes".into()));
    }

    let mut metadata = ExtractedMetadata::new(GeneratorFamily::ComfyUi);

    if let Some(sampler) = roles.sampler {
        metadata.seed = graph
            .literal_seed(sampler, &["seed", "noise_seed"])
            .unwrap_or_default();
        metadata.steps = graph.literal_text(sampler, &["steps"]).unwrap_or_default();
        metadata.cfg = graph.literal_text(sampler, &["cfg"]).unwrap_or_default();
        metadata.sampler = graph
            .literal_text(sampler, &["sampler_name"])
            .unwrap_or_default();
        metadata.scheduler = graph
            .literal_text(sampler, &["scheduler"])
            .unwrap_or_default();
    }

    let guider = roles.composite.and_then(|c| graph.follow(c, "guider"));
    if let Some(composite) = roles.composite {
        let picked = graph.follow(composite, "sampler");
        fill(
            &mut metadata.sampler,
            picked.and_then(|n| graph.literal_text(n, &["sampler_name"])),
        );
        let sigmas = graph.follow(composite, "sigmas");
        fill(
            &mut metadata.scheduler,
            sigmas.and_then(|n| graph.literal_text(n, &["scheduler"])),
        );
        fill(
            &mut metadata.steps,
            sigmas.and_then(|n| graph.literal_text(n, &["steps"])),
        );
        fill(
            &mut metadata.cfg,
            guider.and_then(|n| graph.literal_text(n, &["cfg"])),
        );
        if metadata.seed.is_empty() {
            let noise = graph.follow(composite, "noise");
            if let Some(seed) = noise.and_then(|n| graph.literal_seed(n, &["noise_seed", "seed"])) {
                metadata.seed = seed;
            }
        }
    }

    let model = roles
        .checkpoint
        .and_then(|n| graph.literal_text(n, &["ckpt_name"]))
        .or_else(|| roles.unet.and_then(|n| graph.literal_text(n, &["unet_name"])));
    metadata.set_model(model.as_deref());

    let conditioning: Vec<&PromptNode> = roles.sampler.into_iter().chain(guider).collect();
    let traced = |inputs: &[&str]| {
        conditioning.iter().find_map(|node| {
            inputs
                .iter()
                .find_map(|input| graph.traced_prompt(node, input))
        })
    };
    metadata.positive_prompt = roles
        .positive
        .and_then(|n| graph.literal_text(n, &["positive"]))
        .or_else(|| traced(&["positive", "conditioning"]))
        .unwrap_or_default();
    metadata.negative_prompt = roles
        .negative
        .and_then(|n| graph.literal_text(n, &["negative"]))
        .or_else(|| traced(&["negative"]))
        .unwrap_or_default();

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn read(graph: Value) -> ExtractedMetadata {
        read_prompt_graph(&graph.to_string()).unwrap()
    }

    // =========================================================================
    // Basic graphs
    // =========================================================================

    #[test]
    fn checkpoint_sampler_and_text_encoders() {
        let meta = read(json!({
            "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sd_xl_base_1.0.safetensors"}},
            "3": {"class_type": "KSampler", "inputs": {
                "seed": 8566257, "steps": 20, "cfg": 8, "sampler_name": "euler",
                "scheduler": "normal", "denoise": 1,
                "model": ["4", 0], "positive": ["6", 0], "negative": ["7", 0],
                "latent_image": ["5", 0]
            }},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "masterpiece, a glass orb", "clip": ["4", 1]}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "bad hands", "clip": ["4", 1]}}
        }));
        assert_eq!(meta.model, "sd_xl_base_1.0.safetensors");
        assert_eq!(meta.sampler, "euler");
        assert_eq!(meta.scheduler, "normal");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.cfg, "8");
        assert_eq!(meta.seed.to_string(), "8566257");
        assert_eq!(meta.positive_prompt, "masterpiece, a glass orb");
        assert_eq!(meta.negative_prompt, "bad hands");
    }

    #[test]
    fn first_sampler_by_numeric_id_wins() {
        let meta = read(json!({
            "10": {"class_type": "KSampler", "inputs": {"sampler_name": "second"}},
            "9": {"class_type": "KSampler", "inputs": {"sampler_name": "first"}}
        }));
        assert_eq!(meta.sampler, "first");
    }

    #[test]
    fn seed_reference_resolves_to_primitive() {
        let meta = read(json!({
            "3": {"class_type": "KSampler", "inputs": {"seed": ["12", 0], "steps": 4}},
            "12": {"class_type": "Seed (rgthree)", "inputs": {"seed": -1}}
        }));
        assert_eq!(meta.seed.to_string(), "-1");
        assert!(matches!(meta.seed, Seed::Number(_)));
    }

    #[test]
    fn conditioning_chain_is_traced() {
        let meta = read(json!({
            "3": {"class_type": "KSampler", "inputs": {"positive": ["20", 0], "negative": ["21", 0]}},
            "20": {"class_type": "ConditioningCombine", "inputs": {"conditioning_1": ["6", 0], "conditioning_2": ["7", 0]}},
            "21": {"class_type": "ControlNetApply", "inputs": {"conditioning": ["7", 0]}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "castle"}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": "fog"}}
        }));
        assert_eq!(meta.positive_prompt, "castle");
        assert_eq!(meta.negative_prompt, "fog");
    }

    #[test]
    fn text_from_string_primitive() {
        let meta = read(json!({
            "3": {"class_type": "KSampler", "inputs": {"positive": ["6", 0]}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": ["8", 0]}},
            "8": {"class_type": "PrimitiveString", "inputs": {"value": "from a primitive"}}
        }));
        assert_eq!(meta.positive_prompt, "from a primitive");
    }

    #[test]
    fn dedicated_prompt_nodes_win() {
        let meta = read(json!({
            "1": {"class_type": "easy a1111Loader", "inputs": {"ckpt_name": "anything.ckpt"}},
            "2": {"class_type": "easy positive", "inputs": {"positive": "direct positive"}},
            "3": {"class_type": "easy negative", "inputs": {"negative": "direct negative"}},
            "4": {"class_type": "KSampler", "inputs": {"positive": ["6", 0]}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "traced"}}
        }));
        assert_eq!(meta.model, "anything.ckpt");
        assert_eq!(meta.positive_prompt, "direct positive");
        assert_eq!(meta.negative_prompt, "direct negative");
    }

    // =========================================================================
    // Composite sampler (Flux-style)
    // =========================================================================

    #[test]
    fn composite_sampler_pieces() {
        let meta = read(json!({
            "12": {"class_type": "UNETLoader", "inputs": {"unet_name": "flux1-dev.safetensors"}},
            "13": {"class_type": "SamplerCustomAdvanced", "inputs": {
                "noise": ["25", 0], "guider": ["22", 0], "sampler": ["16", 0],
                "sigmas": ["17", 0], "latent_image": ["27", 0]
            }},
            "16": {"class_type": "KSamplerSelect", "inputs": {"sampler_name": "euler"}},
            "17": {"class_type": "BasicScheduler", "inputs": {"scheduler": "simple", "steps": 20, "denoise": 1}},
            "22": {"class_type": "CFGGuider", "inputs": {"cfg": 3.5, "positive": ["6", 0], "negative": ["7", 0]}},
            "25": {"class_type": "RandomNoise", "inputs": {"noise_seed": 219670278747233u64}},
            "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "a fox in snow"}},
            "7": {"class_type": "CLIPTextEncode", "inputs": {"text": ""}}
        }));
        assert_eq!(meta.model, "flux1-dev.safetensors");
        assert_eq!(meta.scheduler, "simple");
        assert_eq!(meta.steps, "20");
        assert_eq!(meta.sampler, "euler");
        assert_eq!(meta.cfg, "3.5");
        assert_eq!(meta.seed.to_string(), "219670278747233");
        assert_eq!(meta.positive_prompt, "a fox in snow");
        assert_eq!(meta.negative_prompt, "");
    }

    // =========================================================================
    // Degenerate graphs
    // =========================================================================

    #[test]
    fn reference_cycle_terminates() {
        let meta = read(json!({
            "3": {"class_type": "KSampler", "inputs": {"positive": ["20", 0], "seed": ["30", 0]}},
            "20": {"class_type": "Reroute", "inputs": {"conditioning": ["21", 0]}},
            "21": {"class_type": "Reroute", "inputs": {"conditioning": ["20", 0]}},
            "30": {"class_type": "Loop", "inputs": {"seed": ["31", 0]}},
            "31": {"class_type": "Loop", "inputs": {"seed": ["30", 0]}}
        }));
        assert_eq!(meta.positive_prompt, "");
        assert_eq!(meta.seed.to_string(), "");
    }

    #[test]
    fn unknown_nodes_only_is_an_error() {
        let payload = json!({"1": {"class_type": "SaveImage", "inputs": {}}}).to_string();
        assert!(matches!(read_prompt_graph(&payload), Err(PayloadError::Shape(_))));
    }

    #[test]
    fn malformed_nodes_are_skipped() {
        let meta = read(json!({
            "1": "not a node",
            "2": {"inputs": {}},
            "3": {"class_type": "KSampler", "inputs": {"steps": 0}}
        }));
        assert_eq!(meta.steps, "0");
    }

    #[test]
    fn id_order_numeric_before_text() {
        let mut ids = vec!["b", "10", "a", "2"];
        ids.sort_by(|a, b| id_order(a, b));
        assert_eq!(ids, ["2", "10", "a", "b"]);
    }
}
