//! The `workflow` sub-format: ComfyUI's editor graph.
//!
//! Nodes carry typed inputs (each with an optional incoming link id), typed
//! outputs (each with the link ids it feeds) and a positional
//! `widgets_values` array whose meaning depends on the node type:
//!
//! ```text
//! KSampler               [seed, (control)?, steps, cfg, sampler, scheduler, denoise]
//! KSampler (Efficient)   [seed, (unused), steps, cfg, sampler, scheduler, ...]
//! KSamplerAdvanced       [add_noise, seed, (control), steps, cfg, sampler, scheduler, ...]
//! CLIPTextEncode         [text]
//! ```
//!
//! Prompts are found by walking backwards from the sampler's `positive` and
//! `negative` inputs until a text-encoding node is reached. The walk is
//! bounded by [`MAX_HOPS`] and never revisits a link, so cyclic or malformed
//! graphs end with "prompt unavailable".

use crate::detect::GeneratorFamily;
use crate::metadata::{ExtractedMetadata, Seed};
use crate::parsers::{PayloadError, value_text};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;

/// Upper bound on links followed while resolving one prompt.
pub const MAX_HOPS: usize = 20;

const TEXT_ENCODERS: &[&str] = &[
    "CLIPTextEncode",
    "BNK_CLIPTextEncodeAdvanced",
    "CLIPTextEncodeFlux",
];

const MODEL_LOADERS: &[&str] = &["CheckpointLoaderSimple", "easy a1111Loader", "UNETLoader"];

const SEED_CONTROL_WORDS: &[&str] = &["fixed", "increment", "decrement", "randomize"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WidgetLayout {
    Standard,
    Efficient,
    Advanced,
}

/// Sampler node types in priority order.
const SAMPLER_TYPES: &[(&str, WidgetLayout)] = &[
    ("KSampler", WidgetLayout::Standard),
    ("KSampler (Efficient)", WidgetLayout::Efficient),
    ("KSamplerAdvanced", WidgetLayout::Advanced),
];

/// Widget indices of the sampler parameters.
struct SamplerSlots {
    seed: usize,
    steps: usize,
    cfg: usize,
    sampler: usize,
    scheduler: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Workflow {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<WorkflowNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowNode {
    #[serde(default)]
    pub id: Value,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub node_type: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub inputs: Vec<NodeInput>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub outputs: Vec<NodeOutput>,
    #[serde(default)]
    pub widgets_values: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeInput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default)]
    pub link: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeOutput {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub links: Vec<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl WorkflowNode {
    fn widget(&self, index: usize) -> Option<&Value> {
        self.widgets_values.as_array()?.get(index)
    }

    fn widget_text(&self, index: usize) -> Option<String> {
        self.widget(index).and_then(value_text)
    }

    fn input_link(&self, name: &str) -> Option<u64> {
        self.inputs.iter().find(|i| i.name == name)?.link
    }
}

/// Follows link ids backwards through a [`Workflow`].
pub struct WorkflowGraphResolver<'a> {
    workflow: &'a Workflow,
}

impl<'a> WorkflowGraphResolver<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        Self { workflow }
    }

    /// The node and output slot that feed `link`.
    pub fn source_of(&self, link: u64) -> Option<(&'a WorkflowNode, &'a NodeOutput)> {
        self.workflow.nodes.iter().find_map(|node| {
            node.outputs
                .iter()
                .find(|output| output.links.contains(&link))
                .map(|output| (node, output))
        })
    }

    /// Text of the encoder node that ultimately produces `link`.
    ///
    /// `None` when the chain dead-ends, revisits a link, or exceeds
    /// [`MAX_HOPS`].
    pub fn resolve_prompt(&self, link: u64) -> Option<String> {
        let mut visited = HashSet::new();
        let mut current = link;
        for _ in 0..MAX_HOPS {
            if !visited.insert(current) {
                tracing::debug!(link = current, "workflow link cycle");
                return None;
            }
            let (node, output) = self.source_of(current)?;
            if TEXT_ENCODERS.contains(&node.node_type.as_str()) {
                return node.widget_text(0);
            }
            current = pass_through_link(node, output)?;
        }
        tracing::debug!(link, "workflow prompt chain exceeded hop bound");
        None
    }
}

/// The linked input of a pass-through node that corresponds to `output`:
/// same name, else same type, else the node's only linked input.
fn pass_through_link(node: &WorkflowNode, output: &NodeOutput) -> Option<u64> {
    let linked: Vec<&NodeInput> = node.inputs.iter().filter(|i| i.link.is_some()).collect();
    let by_name = linked
        .iter()
        .find(|i| !output.name.is_empty() && i.name == output.name);
    let by_kind = || {
        linked
            .iter()
            .find(|i| !output.kind.is_empty() && i.kind == output.kind)
    };
    let only = || match linked.as_slice() {
        [single] => Some(single),
        _ => None,
    };
    by_name.or_else(by_kind).or_else(only).and_then(|i| i.link)
}

fn find_sampler(workflow: &Workflow) -> Option<(&WorkflowNode, WidgetLayout)> {
    SAMPLER_TYPES.iter().find_map(|(node_type, layout)| {
        workflow
            .nodes
            .iter()
            .find(|n| n.node_type == *node_type)
            .map(|n| (n, *layout))
    })
}

fn sampler_slots(node: &WorkflowNode, layout: WidgetLayout) -> SamplerSlots {
    match layout {
        WidgetLayout::Standard => {
            let skip = node
                .widget(1)
                .and_then(Value::as_str)
                .is_some_and(|w| SEED_CONTROL_WORDS.contains(&w));
            let offset = usize::from(skip);
            SamplerSlots {
                seed: 0,
                steps: 1 + offset,
                cfg: 2 + offset,
                sampler: 3 + offset,
                scheduler: 4 + offset,
            }
        }
        WidgetLayout::Efficient => SamplerSlots {
            seed: 0,
            steps: 2,
            cfg: 3,
            sampler: 4,
            scheduler: 5,
        },
        WidgetLayout::Advanced => SamplerSlots {
            seed: 1,
            steps: 3,
            cfg: 4,
            sampler: 5,
            scheduler: 6,
        },
    }
}

/// Read a `workflow` payload. Fails when no sampler node is present.
pub fn read_workflow(payload: &str) -> Result<ExtractedMetadata, PayloadError> {
    let workflow: Workflow = serde_json::from_str(payload.trim())?;
    let (sampler, layout) = find_sampler(&workflow)
        .ok_or_else(|| PayloadError::Shape("workflow has no sampler node".into()))?;
    let slots = sampler_slots(sampler, layout);

    let mut metadata = ExtractedMetadata::new(GeneratorFamily::ComfyUi);
    metadata.seed = sampler
        .widget(slots.seed)
        .and_then(Seed::from_json)
        .unwrap_or_default();
    metadata.steps = sampler.widget_text(slots.steps).unwrap_or_default();
    metadata.cfg = sampler.widget_text(slots.cfg).unwrap_or_default();
    metadata.sampler = sampler.widget_text(slots.sampler).unwrap_or_default();
    metadata.scheduler = sampler.widget_text(slots.scheduler).unwrap_or_default();

    let resolver = WorkflowGraphResolver::new(&workflow);
    let prompt = |input: &str| {
        sampler
            .input_link(input)
            .and_then(|link| resolver.resolve_prompt(link))
            .unwrap_or_default()
    };
    metadata.positive_prompt = prompt("positive");
    metadata.negative_prompt = prompt("negative");

    let model = workflow
        .nodes
        .iter()
        .find(|n| MODEL_LOADERS.contains(&n.node_type.as_str()))
        .and_then(|n| n.widget_text(0));
    metadata.set_model(model.as_deref());
    Ok(metadata)
}
