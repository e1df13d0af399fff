//! In-memory event capture for logging assertions
//!
//! One capture layer is installed per test binary; every test reads the
//! same buffer, so assertions filter by operation and relation instead of
//! relying on the buffer being empty.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::core_types::schema::{FIELD_EVENT, FIELD_OP, FIELD_RELATION};

/// A recorded event, with every field rendered as text
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    pub level: Level,
    pub fields: BTreeMap<String, String>,
}

impl CapturedEvent {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn op(&self) -> Option<&str> {
        self.field(FIELD_OP)
    }

    pub fn event(&self) -> Option<&str> {
        self.field(FIELD_EVENT)
    }

    /// Message text of a plain `tracing::debug!("...")` style event
    pub fn message(&self) -> Option<&str> {
        self.field("message")
    }
}

#[derive(Default)]
struct Fields(BTreeMap<String, String>);

impl Visit for Fields {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }
}

type Buffer = Arc<Mutex<Vec<CapturedEvent>>>;

struct CaptureLayer(Buffer);

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut fields = Fields::default();
        event.record(&mut fields);
        if let Ok(mut events) = self.0.lock() {
            events.push(CapturedEvent {
                level: *event.metadata().level(),
                fields: fields.0,
            });
        }
    }
}

/// Read handle over the shared capture buffer
#[derive(Clone)]
pub struct TestCapture(Buffer);

impl TestCapture {
    /// Snapshot of everything captured so far
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of `op` whose `relation` field names `relation`
    pub fn for_relation(&self, op: &str, relation: &str) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.op() == Some(op) && e.field(FIELD_RELATION) == Some(relation))
            .collect()
    }

    /// # Panics
    ///
    /// Panics when no event of `op` carries `event`
    pub fn assert_event_exists(&self, op: &str, event: &str) {
        let events = self.events();
        assert!(
            events
                .iter()
                .any(|e| e.op() == Some(op) && e.event() == Some(event)),
            "no {}/{} event among {} captured",
            op,
            event,
            events.len()
        );
    }
}

static CAPTURE: OnceLock<TestCapture> = OnceLock::new();

/// Install the capture layer as the global subscriber, once per process
///
/// Must run before anything else installs a subscriber in the same binary.
///
/// ```
/// use embedx_core::logging_facility::test_capture::init_test_capture;
/// use embedx_core::log_op_start;
///
/// let capture = init_test_capture();
/// log_op_start!("cast", relation = "doc_addresses");
/// assert_eq!(capture.for_relation("cast", "doc_addresses").len(), 1);
/// ```
pub fn init_test_capture() -> TestCapture {
    CAPTURE
        .get_or_init(|| {
            let buffer = Buffer::default();
            let _ = tracing_subscriber::registry()
                .with(CaptureLayer(Arc::clone(&buffer)))
                .try_init();
            TestCapture(buffer)
        })
        .clone()
}
