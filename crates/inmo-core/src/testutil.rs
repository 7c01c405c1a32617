//! Test utilities: mock implementations of the pipeline traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;

use crate::error::AppError;
use crate::models::{
    Agency, EnrichmentUpdate, Property, PropertyDetails, PropertyStatus, PropertyStub,
};
use crate::pipeline::{EnrichmentEvent, EnrichmentReporter};
use crate::traits::{AdapterFactory, EnrichmentStore, PendingScope, SiteAdapter};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn sample_agency(id: i64, system: Option<&str>) -> Agency {
    Agency {
        id,
        name: format!("Inmobiliaria {}", id),
        url: format!("https://agency{}.example", id),
        system: system.map(str::to_string),
        zone: Some("Lanús".into()),
        address: None,
        phone: None,
        rating: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_property(id: i64, agency_id: i64, code: &str) -> Property {
    Property {
        id,
        agency_id,
        code: code.to_string(),
        title: format!("Departamento {}", code),
        price: "USD 85.000".into(),
        currency: Some("USD".into()),
        address: Some("Av. Mitre 1200".into()),
        url: format!("https://agency{}.example/p/{}", agency_id, code),
        image_url: None,
        images: vec![],
        property_type_id: None,
        property_type: None,
        location: None,
        description: None,
        bedrooms: None,
        bathrooms: None,
        rooms: None,
        floors: None,
        garages: None,
        age: None,
        covered_area: None,
        total_area: None,
        land_area: None,
        front: None,
        back: None,
        situation: None,
        expenses: None,
        operation: None,
        condition: None,
        orientation: None,
        disposition: None,
        latitude: None,
        longitude: None,
        status: PropertyStatus::Pending,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_details() -> PropertyDetails {
    let mut features = crate::models::FeatureMap::new();
    features.insert(
        "servicio".into(),
        BTreeSet::from(["Gas Natural".to_string(), "Agua Corriente".to_string()]),
    );
    PropertyDetails {
        property_type: Some("Departamento".into()),
        location: Some("Lanús Oeste".into()),
        bedrooms: Some(2),
        bathrooms: Some(1),
        rooms: Some(3),
        age: Some(7),
        covered_area: Some(55.0),
        total_area: Some(60.0),
        images: vec!["https://cdn.example/1.jpg".into()],
        features,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// MockAdapter
// ---------------------------------------------------------------------------

/// Scripted adapter reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Details(PropertyDetails),
    NotFound,
    Error(String),
    /// Never resolves; only a deadline or cancellation ends the call.
    Hang,
}

/// Mock adapter with per-URL scripted replies and in-flight instrumentation.
///
/// Replies for a URL are consumed in order; the last one repeats.
#[derive(Clone)]
pub struct MockAdapter {
    replies: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    default_reply: Arc<Mutex<MockReply>>,
    stubs: Arc<Mutex<Vec<PropertyStub>>>,
    latency: Duration,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAdapter {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(HashMap::new())),
            default_reply: Arc::new(Mutex::new(MockReply::Details(sample_details()))),
            stubs: Arc::new(Mutex::new(vec![])),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_reply(self, url: &str, reply: MockReply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn with_default(self, reply: MockReply) -> Self {
        *self.default_reply.lock().unwrap() = reply;
        self
    }

    pub fn with_stubs(self, stubs: Vec<PropertyStub>) -> Self {
        *self.stubs.lock().unwrap() = stubs;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn next_reply(&self, url: &str) -> MockReply {
        let mut replies = self.replies.lock().unwrap();
        match replies.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => self.default_reply.lock().unwrap().clone(),
        }
    }
}

/// Decrements the in-flight counter even when the call future is dropped.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl SiteAdapter for MockAdapter {
    async fn search_properties(&self) -> Result<Vec<PropertyStub>, AppError> {
        Ok(self.stubs.lock().unwrap().clone())
    }

    async fn property_details(&self, url: &str) -> Result<PropertyDetails, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(self.in_flight.clone());

        let reply = self.next_reply(url);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match reply {
            MockReply::Details(details) => Ok(details),
            MockReply::NotFound => Err(AppError::NotFound(url.to_string())),
            MockReply::Error(msg) => Err(AppError::NetworkError(msg)),
            MockReply::Hang => {
                std::future::pending::<()>().await;
                Err(AppError::Cancelled)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockAdapterFactory
// ---------------------------------------------------------------------------

/// Hands out clones of one mock adapter, optionally only for some systems.
#[derive(Clone)]
pub struct MockAdapterFactory {
    adapter: MockAdapter,
    supported: Option<HashSet<String>>,
}

impl MockAdapterFactory {
    pub fn new(adapter: MockAdapter) -> Self {
        Self {
            adapter,
            supported: None,
        }
    }

    pub fn supporting(mut self, system: &str) -> Self {
        self.supported
            .get_or_insert_with(HashSet::new)
            .insert(system.to_string());
        self
    }
}

impl AdapterFactory for MockAdapterFactory {
    type Adapter = MockAdapter;

    fn for_agency(&self, agency: &Agency) -> Result<MockAdapter, AppError> {
        let system = agency.system.clone().unwrap_or_default();
        match &self.supported {
            Some(supported) if !supported.contains(&system) => {
                Err(AppError::UnsupportedSystem(system))
            }
            _ => Ok(self.adapter.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory enrichment store.
#[derive(Clone, Default)]
pub struct MockStore {
    properties: Arc<Mutex<Vec<Property>>>,
    agencies: Arc<Mutex<HashMap<i64, Agency>>>,
    applied: Arc<Mutex<Vec<(i64, EnrichmentUpdate)>>>,
    apply_errors: Arc<Mutex<HashMap<i64, AppError>>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_property(&self, property: Property) {
        self.properties.lock().unwrap().push(property);
    }

    pub fn add_agency(&self, agency: Agency) {
        self.agencies.lock().unwrap().insert(agency.id, agency);
    }

    /// Make the next `apply_enrichment` for this property fail.
    pub fn fail_apply_for(&self, property_id: i64, error: AppError) {
        self.apply_errors.lock().unwrap().insert(property_id, error);
    }

    pub fn status(&self, property_id: i64) -> Option<PropertyStatus> {
        self.properties
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == property_id)
            .map(|p| p.status)
    }

    pub fn applied(&self) -> Vec<(i64, EnrichmentUpdate)> {
        self.applied.lock().unwrap().clone()
    }

    pub fn set_status(&self, property_id: i64, status: PropertyStatus) {
        if let Some(p) = self.properties.lock().unwrap().iter_mut().find(|p| p.id == property_id) {
            p.status = status;
        }
    }

    /// Move a pending property to `status`; `Ok(false)` if it was not pending.
    fn leave_pending(&self, property_id: i64, status: PropertyStatus) -> Result<bool, AppError> {
        let mut properties = self.properties.lock().unwrap();
        let property = properties
            .iter_mut()
            .find(|p| p.id == property_id)
            .ok_or_else(|| AppError::NotFound(format!("property {}", property_id)))?;
        if property.status != PropertyStatus::Pending {
            return Ok(false);
        }
        property.status = status;
        Ok(true)
    }
}

impl EnrichmentStore for MockStore {
    async fn pending_properties(&self, scope: &PendingScope) -> Result<Vec<Property>, AppError> {
        let properties = self.properties.lock().unwrap();
        let pending = properties
            .iter()
            .filter(|p| p.status == PropertyStatus::Pending)
            .filter(|p| scope.agency_ids.is_empty() || scope.agency_ids.contains(&p.agency_id))
            .take(scope.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(pending)
    }

    async fn agency(&self, id: i64) -> Result<Option<Agency>, AppError> {
        Ok(self.agencies.lock().unwrap().get(&id).cloned())
    }

    async fn apply_enrichment(
        &self,
        property_id: i64,
        update: &EnrichmentUpdate,
    ) -> Result<bool, AppError> {
        if let Some(e) = self.apply_errors.lock().unwrap().remove(&property_id) {
            return Err(e);
        }
        if !self.leave_pending(property_id, PropertyStatus::Completed)? {
            return Ok(false);
        }
        self.applied
            .lock()
            .unwrap()
            .push((property_id, update.clone()));
        Ok(true)
    }

    async fn mark_not_available(&self, property_id: i64) -> Result<bool, AppError> {
        self.leave_pending(property_id, PropertyStatus::NotAvailable)
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<&'static str>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| **e == name)
            .count()
    }
}

impl EnrichmentReporter for RecordingReporter {
    fn report(&self, event: EnrichmentEvent<'_>) {
        let name = match event {
            EnrichmentEvent::RunStarted { .. } => "run_started",
            EnrichmentEvent::WorkerStarted { .. } => "worker_started",
            EnrichmentEvent::Extracting { .. } => "extracting",
            EnrichmentEvent::TimeoutEscalated { .. } => "timeout_escalated",
            EnrichmentEvent::Extracted { .. } => "extracted",
            EnrichmentEvent::WorkerStopped { .. } => "worker_stopped",
            EnrichmentEvent::Written { .. } => "written",
            EnrichmentEvent::RunFinished { .. } => "run_finished",
        };
        self.events.lock().unwrap().push(name);
    }
}
