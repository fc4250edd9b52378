// libs/appointment-cell/src/services/location.rs
use std::sync::Arc;

use futures::future::try_join_all;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{AppointmentError, IdentifierKind, LocationId, LocationIdentity};
use crate::services::clients::{LocationMappingApi, LocationsApi};

/// One lookup from an identifier space into another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionEdge {
    NumericToOpaque,
    OpaqueToNumeric,
    OpaqueToKey,
    KeyToOpaque,
}

impl ResolutionEdge {
    pub fn from(&self) -> IdentifierKind {
        match self {
            ResolutionEdge::NumericToOpaque => IdentifierKind::Numeric,
            ResolutionEdge::OpaqueToNumeric | ResolutionEdge::OpaqueToKey => IdentifierKind::Opaque,
            ResolutionEdge::KeyToOpaque => IdentifierKind::Key,
        }
    }

    pub fn to(&self) -> IdentifierKind {
        match self {
            ResolutionEdge::NumericToOpaque | ResolutionEdge::KeyToOpaque => IdentifierKind::Opaque,
            ResolutionEdge::OpaqueToNumeric => IdentifierKind::Numeric,
            ResolutionEdge::OpaqueToKey => IdentifierKind::Key,
        }
    }
}

/// Every lookup the resolver may make. Numeric ids reach keys only through the opaque id.
/// When two edges lead to the same identifier space, the earlier one is used.
pub const RESOLUTION_EDGES: [ResolutionEdge; 4] = [
    ResolutionEdge::NumericToOpaque,
    ResolutionEdge::OpaqueToNumeric,
    ResolutionEdge::OpaqueToKey,
    ResolutionEdge::KeyToOpaque,
];

#[derive(Debug, Default)]
struct PartialIdentity {
    numeric_id: Option<i64>,
    opaque_id: Option<Uuid>,
    key: Option<String>,
    display_name: Option<String>,
}

impl PartialIdentity {
    fn get(&self, kind: IdentifierKind) -> Option<LocationId> {
        match kind {
            IdentifierKind::Numeric => self.numeric_id.map(LocationId::Numeric),
            IdentifierKind::Opaque => self.opaque_id.map(LocationId::Opaque),
            IdentifierKind::Key => self.key.clone().map(LocationId::Key),
        }
    }

    fn knows(&self, kind: IdentifierKind) -> bool {
        match kind {
            IdentifierKind::Numeric => self.numeric_id.is_some(),
            IdentifierKind::Opaque => self.opaque_id.is_some(),
            IdentifierKind::Key => self.key.is_some(),
        }
    }

    fn record(&mut self, id: LocationId) {
        match id {
            LocationId::Numeric(numeric_id) => self.numeric_id = Some(numeric_id),
            LocationId::Opaque(opaque_id) => self.opaque_id = Some(opaque_id),
            LocationId::Key(key) => self.key = Some(key),
        }
    }

    fn into_identity(self) -> Option<LocationIdentity> {
        Some(LocationIdentity {
            numeric_id: self.numeric_id?,
            opaque_id: self.opaque_id?,
            key: self.key?,
            display_name: self.display_name,
        })
    }
}

struct Traversal {
    id: LocationId,
    display_name: Option<String>,
}

/// Reconciles the numeric, opaque and key identifiers of a location.
pub struct LocationIdentityResolver {
    mapping: Arc<dyn LocationMappingApi>,
    locations: Arc<dyn LocationsApi>,
}

impl LocationIdentityResolver {
    pub fn new(mapping: Arc<dyn LocationMappingApi>, locations: Arc<dyn LocationsApi>) -> Self {
        Self { mapping, locations }
    }

    pub async fn from_numeric_id(&self, numeric_id: i64) -> Result<LocationIdentity, AppointmentError> {
        self.resolve(&LocationId::Numeric(numeric_id)).await
    }

    pub async fn from_opaque_id(&self, opaque_id: Uuid) -> Result<LocationIdentity, AppointmentError> {
        self.resolve(&LocationId::Opaque(opaque_id)).await
    }

    pub async fn from_key(&self, key: &str) -> Result<LocationIdentity, AppointmentError> {
        self.resolve(&LocationId::Key(key.to_string())).await
    }

    /// Walks [`RESOLUTION_EDGES`] outward from `id` until every identifier is known.
    /// Edges that become usable in the same round are looked up concurrently.
    pub async fn resolve(&self, id: &LocationId) -> Result<LocationIdentity, AppointmentError> {
        debug!("Resolving location identity for {}", id);

        let mut known = PartialIdentity::default();
        known.record(id.clone());

        loop {
            let mut frontier: Vec<(ResolutionEdge, LocationId)> = Vec::new();
            for edge in RESOLUTION_EDGES {
                if known.knows(edge.to()) || frontier.iter().any(|(e, _)| e.to() == edge.to()) {
                    continue;
                }
                if let Some(source) = known.get(edge.from()) {
                    frontier.push((edge, source));
                }
            }

            if frontier.is_empty() {
                break;
            }

            let lookups = frontier
                .iter()
                .map(|(edge, source)| self.traverse(*edge, source));
            let results = try_join_all(lookups).await?;

            for ((edge, source), result) in frontier.iter().zip(results) {
                match result {
                    Some(traversal) => {
                        if traversal.display_name.is_some() {
                            known.display_name = traversal.display_name;
                        }
                        known.record(traversal.id);
                    }
                    None => {
                        warn!("No {:?} entry for {} while resolving {}", edge, source, id);
                        return Err(AppointmentError::LocationNotMapped(id.to_string()));
                    }
                }
            }
        }

        known
            .into_identity()
            .ok_or_else(|| AppointmentError::LocationNotMapped(id.to_string()))
    }

    async fn traverse(
        &self,
        edge: ResolutionEdge,
        source: &LocationId,
    ) -> Result<Option<Traversal>, AppointmentError> {
        let traversal = match (edge, source) {
            (ResolutionEdge::NumericToOpaque, LocationId::Numeric(numeric_id)) => self
                .mapping
                .opaque_id_for_numeric(*numeric_id)
                .await?
                .map(|opaque_id| Traversal {
                    id: LocationId::Opaque(opaque_id),
                    display_name: None,
                }),
            (ResolutionEdge::OpaqueToNumeric, LocationId::Opaque(opaque_id)) => self
                .mapping
                .numeric_id_for_opaque(*opaque_id)
                .await?
                .map(|numeric_id| Traversal {
                    id: LocationId::Numeric(numeric_id),
                    display_name: None,
                }),
            (ResolutionEdge::OpaqueToKey, LocationId::Opaque(opaque_id)) => self
                .locations
                .get_by_opaque_id(*opaque_id)
                .await?
                .map(|location| Traversal {
                    id: LocationId::Key(location.key),
                    display_name: location.display_name,
                }),
            (ResolutionEdge::KeyToOpaque, LocationId::Key(key)) => self
                .locations
                .get_by_key(key)
                .await?
                .map(|location| Traversal {
                    id: LocationId::Opaque(location.id),
                    display_name: location.display_name,
                }),
            (edge, source) => unreachable!("edge {:?} cannot start from {}", edge, source),
        };

        Ok(traversal)
    }
}
