use timeslice_core::value::data;
use timeslice_engine::{Engine, EngineConfig, EngineError};
use timeslice_harness::{NOW, TestEngine, init_logging};
use timeslice_storage::StoreConfig;

#[test]
fn timelines_survive_reopening() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("timeslice.db");
    let config = EngineConfig::default().with_store(StoreConfig::default().with_wal(false));

    {
        let mut engine = Engine::open(&path, config.clone())?;
        engine.record_override(
            timeslice_engine::OverrideWrite::new("post", 1, "writer", data([("title", "kept")])),
        )?;
        engine.record_link(timeslice_engine::LinkWrite::new(
            [("person", 1), ("role", 2)],
            "writer",
        ))?;
    }

    let mut engine = Engine::open(&path, config)?;
    assert!(!engine.ensure_schema()?);
    assert_eq!(engine.query_state("post", 1, NOW)?, Some(data([("title", "kept")])));
    assert_eq!(engine.query_links("role", 2, NOW, &[])?.len(), 1);

    Ok(())
}

#[test]
fn registry_ids_are_stable_across_engines() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::on_disk(EngineConfig::default())?;
    let post = t.engine.entity_type("post")?;
    let person = t.engine.entity_type("person")?;
    assert_ne!(post, person);
    assert_eq!(t.engine.entity_type("post")?, post);

    let types = t.engine.entity_types()?;
    assert_eq!(
        types,
        vec![(post, "post".to_string()), (person, "person".to_string())]
    );

    Ok(())
}

#[test]
fn ensure_schema_is_a_no_op_once_applied() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 1, 0, 0, data([("title", "x")]))?;
    assert!(!t.engine.ensure_schema()?);
    assert!(!t.engine.ensure_schema()?);
    assert_eq!(t.state("post", 1, NOW)?, Some(data([("title", "x")])));
    Ok(())
}

#[test]
fn zero_link_depth_is_rejected_on_open() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let config = EngineConfig {
        max_link_depth: 0,
        ..EngineConfig::default()
    };
    let result = Engine::open(dir.path().join("timeslice.db"), config);
    assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    Ok(())
}
