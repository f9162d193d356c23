/// Visualization capability: typed plot data for the client UI.
///
/// The kind set is closed; an unknown kind is rejected before any network
/// call. Upstream replies arrive as loose JSON and are mapped field by field
/// into the typed payloads here, so schema drift surfaces as a mapping error
/// (and a degraded sample) instead of leaking arbitrary JSON to the client.
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use med_common::error::CommonError;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizKind {
    NerEntities,
    KnowledgeGraph,
    EmbeddingPoints,
    SimilarityRanking,
}

impl VizKind {
    pub const ALL: [VizKind; 4] = [
        VizKind::NerEntities,
        VizKind::KnowledgeGraph,
        VizKind::EmbeddingPoints,
        VizKind::SimilarityRanking,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            VizKind::NerEntities => "ner_entities",
            VizKind::KnowledgeGraph => "knowledge_graph",
            VizKind::EmbeddingPoints => "embedding_points",
            VizKind::SimilarityRanking => "similarity_ranking",
        }
    }

    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim() {
            "ner_entities" => Ok(VizKind::NerEntities),
            "knowledge_graph" => Ok(VizKind::KnowledgeGraph),
            "embedding_points" => Ok(VizKind::EmbeddingPoints),
            "similarity_ranking" => Ok(VizKind::SimilarityRanking),
            other => Err(AppError::UnsupportedCapability(format!(
                "unknown visualization type {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VisualizationPayload {
    NerEntities { entities: Vec<EntityCount> },
    KnowledgeGraph { nodes: Vec<GraphNode>, edges: Vec<GraphEdge> },
    EmbeddingPoints { points: Vec<EmbeddingPoint> },
    SimilarityRanking { rankings: Vec<SimilarityEntry> },
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntityCount {
    pub label: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphNode {
    pub id: String,
    /// Node role in the graph, e.g. "drug" or "condition".
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub relation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EmbeddingPoint {
    pub label: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub cluster: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SimilarityEntry {
    pub drug_name: String,
    pub score: f64,
}

// Upstream body shapes, one per kind. Extra fields are ignored.

#[derive(Debug, Deserialize)]
struct NerEntitiesBody {
    #[serde(default)]
    entities: Vec<EntityCount>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeGraphBody {
    #[serde(default)]
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingPointsBody {
    #[serde(default)]
    points: Vec<EmbeddingPoint>,
}

#[derive(Debug, Deserialize)]
struct SimilarityRankingBody {
    #[serde(default)]
    rankings: Vec<SimilarityEntry>,
}

/// Map an upstream reply into the typed payload for `kind`. A body that does
/// not fit the expected shape is a tier failure, not a panic.
pub fn map_response(
    kind: VizKind,
    value: serde_json::Value,
) -> Result<VisualizationPayload, CommonError> {
    let payload = match kind {
        VizKind::NerEntities => {
            let body: NerEntitiesBody = serde_json::from_value(value)?;
            VisualizationPayload::NerEntities { entities: body.entities }
        }
        VizKind::KnowledgeGraph => {
            let body: KnowledgeGraphBody = serde_json::from_value(value)?;
            VisualizationPayload::KnowledgeGraph {
                nodes: body.nodes,
                edges: body.edges,
            }
        }
        VizKind::EmbeddingPoints => {
            let body: EmbeddingPointsBody = serde_json::from_value(value)?;
            VisualizationPayload::EmbeddingPoints { points: body.points }
        }
        VizKind::SimilarityRanking => {
            let body: SimilarityRankingBody = serde_json::from_value(value)?;
            VisualizationPayload::SimilarityRanking { rankings: body.rankings }
        }
    };
    Ok(payload)
}

/// Deterministic sample data per kind, served when the primary tier fails.
/// There is no generative tier for structured plot data.
pub fn fallback_payload(kind: VizKind) -> VisualizationPayload {
    match kind {
        VizKind::NerEntities => VisualizationPayload::NerEntities {
            entities: vec![
                EntityCount { label: "DRUG".to_string(), count: 12 },
                EntityCount { label: "CONDITION".to_string(), count: 9 },
                EntityCount { label: "SIDE_EFFECT".to_string(), count: 17 },
            ],
        },
        VizKind::KnowledgeGraph => VisualizationPayload::KnowledgeGraph {
            nodes: vec![
                GraphNode { id: "aspirin".to_string(), kind: Some("drug".to_string()) },
                GraphNode { id: "pain".to_string(), kind: Some("condition".to_string()) },
                GraphNode {
                    id: "stomach irritation".to_string(),
                    kind: Some("side_effect".to_string()),
                },
            ],
            edges: vec![
                GraphEdge {
                    source: "aspirin".to_string(),
                    target: "pain".to_string(),
                    relation: Some("treats".to_string()),
                },
                GraphEdge {
                    source: "aspirin".to_string(),
                    target: "stomach irritation".to_string(),
                    relation: Some("may_cause".to_string()),
                },
            ],
        },
        VizKind::EmbeddingPoints => VisualizationPayload::EmbeddingPoints {
            points: vec![
                EmbeddingPoint {
                    label: "acetaminophen".to_string(),
                    x: -1.2,
                    y: 0.4,
                    cluster: Some(0),
                },
                EmbeddingPoint {
                    label: "ibuprofen".to_string(),
                    x: -0.9,
                    y: 0.7,
                    cluster: Some(0),
                },
                EmbeddingPoint {
                    label: "metformin".to_string(),
                    x: 1.5,
                    y: -0.8,
                    cluster: Some(1),
                },
            ],
        },
        VizKind::SimilarityRanking => VisualizationPayload::SimilarityRanking {
            rankings: vec![
                SimilarityEntry { drug_name: "ibuprofen".to_string(), score: 0.91 },
                SimilarityEntry { drug_name: "acetaminophen".to_string(), score: 0.84 },
                SimilarityEntry { drug_name: "aspirin".to_string(), score: 0.79 },
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_accepts_every_known_kind() {
        for kind in VizKind::ALL {
            assert_eq!(VizKind::parse(kind.as_str()).unwrap(), kind);
        }
    }

    #[test]
    fn parse_rejects_unknown_kind() {
        assert!(matches!(
            VizKind::parse("word_cloud"),
            Err(AppError::UnsupportedCapability(_))
        ));
    }

    #[test]
    fn map_response_extracts_typed_entities() {
        let value = json!({
            "entities": [{"label": "DRUG", "count": 3}],
            "model": "en_core_sci_sm"
        });
        let payload = map_response(VizKind::NerEntities, value).unwrap();
        match payload {
            VisualizationPayload::NerEntities { entities } => {
                assert_eq!(entities.len(), 1);
                assert_eq!(entities[0].label, "DRUG");
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn map_response_rejects_mismatched_shape() {
        let value = json!({"entities": "not a list"});
        assert!(map_response(VizKind::NerEntities, value).is_err());
    }

    #[test]
    fn fallback_samples_are_non_empty_for_every_kind() {
        for kind in VizKind::ALL {
            match fallback_payload(kind) {
                VisualizationPayload::NerEntities { entities } => assert!(!entities.is_empty()),
                VisualizationPayload::KnowledgeGraph { nodes, edges } => {
                    assert!(!nodes.is_empty());
                    assert!(!edges.is_empty());
                }
                VisualizationPayload::EmbeddingPoints { points } => assert!(!points.is_empty()),
                VisualizationPayload::SimilarityRanking { rankings } => {
                    assert!(!rankings.is_empty())
                }
            }
        }
    }

    #[test]
    fn payload_serializes_with_type_tag() {
        let value = serde_json::to_value(fallback_payload(VizKind::NerEntities)).unwrap();
        assert_eq!(value["type"], "ner_entities");
    }
}
