//! ---
//! feeder_section: "08-topology-compiler"
//! feeder_subsection: "module"
//! feeder_type: "source"
//! feeder_scope: "code"
//! feeder_description: "Per-record annotations written back for the GIS layers."
//! feeder_version: "v0.0.0-prealpha"
//! feeder_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// GIS layers that receive engine names for their features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeoLayerKind {
    /// Network transformers at the feeder head (`mv_net_txs`).
    MvTx,
    MvLines,
    /// In-line MV transformers and regulators (`mvtx`).
    MvMvTxs,
    /// Distribution substations (`lvtx`).
    MvlvTxs,
    LvLines,
    Caps,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoAnnotation {
    pub dss_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ampacity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity_kva: Option<f64>,
}

impl GeoAnnotation {
    pub fn named(dss_name: impl Into<String>) -> Self {
        Self {
            dss_name: dss_name.into(),
            ampacity: None,
            capacity_kva: None,
        }
    }

    pub fn with_ampacity(mut self, ampacity: Option<f64>) -> Self {
        self.ampacity = ampacity;
        self
    }

    pub fn with_capacity(mut self, capacity_kva: f64) -> Self {
        self.capacity_kva = Some(capacity_kva);
        self
    }
}

/// Annotations keyed by layer and by record index within the source table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeoLayer {
    layers: IndexMap<GeoLayerKind, IndexMap<usize, GeoAnnotation>>,
}

impl GeoLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn annotate(&mut self, kind: GeoLayerKind, record: usize, annotation: GeoAnnotation) {
        let previous = self
            .layers
            .entry(kind)
            .or_default()
            .insert(record, annotation);
        if let Some(previous) = previous {
            warn!(
                layer = ?kind,
                record,
                replaced = %previous.dss_name,
                "geo annotation written twice"
            );
        }
    }

    pub fn get(&self, kind: GeoLayerKind, record: usize) -> Option<&GeoAnnotation> {
        self.layers.get(&kind).and_then(|layer| layer.get(&record))
    }

    pub fn layer(&self, kind: GeoLayerKind) -> Option<&IndexMap<usize, GeoAnnotation>> {
        self.layers.get(&kind)
    }

    /// Total number of annotated records across all layers.
    pub fn len(&self) -> usize {
        self.layers.values().map(IndexMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
