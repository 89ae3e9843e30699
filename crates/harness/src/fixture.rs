use tempfile::TempDir;
use timeslice_core::clock::WriteClock;
use timeslice_core::value::Data;
use timeslice_engine::{
    Engine, EngineConfig, EngineError, LinkWrite, OverrideWrite,
};
use timeslice_storage::SqliteStore;

pub const DAY: i64 = 86_400;

/// Fixed "now" used by scenarios so validity windows are reproducible.
pub const NOW: i64 = 1_700_000_000;

pub const ACTOR: &str = "tester";

/// Install a test logger once; later calls are no-ops.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// An engine over a fresh store with a frozen provenance clock.
pub struct TestEngine {
    pub engine: Engine<SqliteStore>,
    // Keeps a file-backed store's directory alive.
    _dir: Option<TempDir>,
}

impl TestEngine {
    pub fn new() -> Result<Self, EngineError> {
        init_logging();
        let engine = Engine::open_in_memory()?.with_clock(WriteClock::frozen(NOW));
        Ok(Self { engine, _dir: None })
    }

    /// A file-backed engine in a temporary directory.
    pub fn on_disk(config: EngineConfig) -> Result<Self, Box<dyn std::error::Error>> {
        init_logging();
        let dir = tempfile::tempdir()?;
        let engine = Engine::open(dir.path().join("timeslice.db"), config)?
            .with_clock(WriteClock::frozen(NOW));
        Ok(Self {
            engine,
            _dir: Some(dir),
        })
    }

    /// Record an override for `entity_type:entity_id` valid over `[begin, end)`.
    pub fn set(
        &mut self,
        entity_type: &str,
        entity_id: u64,
        begin: i64,
        end: i64,
        data: Data,
    ) -> Result<timeslice_core::FactId, EngineError> {
        self.engine.record_override(
            OverrideWrite::new(entity_type, entity_id, ACTOR, data).with_window(begin, end),
        )
    }

    /// Record a link between `keys` valid over `[begin, end)`.
    pub fn link(
        &mut self,
        keys: &[(&str, u64)],
        begin: i64,
        end: i64,
    ) -> Result<timeslice_core::NodeId, EngineError> {
        self.engine.record_link(
            LinkWrite::new(keys.iter().copied(), ACTOR).with_window(begin, end),
        )
    }

    pub fn state(
        &mut self,
        entity_type: &str,
        entity_id: u64,
        as_of: i64,
    ) -> Result<Option<Data>, EngineError> {
        self.engine.query_state(entity_type, entity_id, as_of)
    }
}
