use timeslice_core::value::{Value, data};
use timeslice_engine::{EngineError, OverrideWrite, ValidationError};
use timeslice_harness::{ACTOR, DAY, NOW, TestEngine};

// ============================================================================
// Point-in-time state
// ============================================================================

#[test]
fn post_title_follows_the_newest_covering_override() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 1, NOW - 5 * DAY, 0, data([("title", "test post")]))?;
    t.set("post", 1, NOW - DAY, NOW + 2 * DAY, data([("title", "hello world")]))?;

    assert_eq!(t.state("post", 1, NOW)?, Some(data([("title", "hello world")])));
    assert_eq!(t.state("post", 1, NOW - 6 * DAY)?, None);
    assert_eq!(t.state("post", 1, NOW + 10 * DAY)?, Some(data([("title", "test post")])));

    Ok(())
}

#[test]
fn later_fact_keeps_fields_it_does_not_mention() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set(
        "post",
        7,
        NOW - 10 * DAY,
        0,
        data([("title", Value::from("draft")), ("words", Value::from(120i64))]),
    )?;
    t.set("post", 7, NOW - DAY, 0, data([("title", "final")]))?;

    let state = t.state("post", 7, NOW)?.expect("state at now");
    assert_eq!(state["title"], Value::from("final"));
    assert_eq!(state["words"], Value::from(120i64));

    let earlier = t.state("post", 7, NOW - 5 * DAY)?.expect("state five days ago");
    assert_eq!(earlier["title"], Value::from("draft"));

    Ok(())
}

#[test]
fn precedence_follows_begin_not_recording_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    // Recorded newest-window first.
    t.set("post", 2, NOW - DAY, 0, data([("status", "published")]))?;
    t.set("post", 2, NOW - 3 * DAY, 0, data([("status", "draft")]))?;

    assert_eq!(t.state("post", 2, NOW)?, Some(data([("status", "published")])));
    assert_eq!(t.state("post", 2, NOW - 2 * DAY)?, Some(data([("status", "draft")])));

    Ok(())
}

#[test]
fn open_end_covers_the_far_future() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 3, NOW, 0, data([("pinned", true)]))?;

    assert_eq!(t.state("post", 3, NOW)?, Some(data([("pinned", true)])));
    assert_eq!(t.state("post", 3, i64::MAX)?, Some(data([("pinned", true)])));
    assert_eq!(t.state("post", 3, NOW - 1)?, None);

    Ok(())
}

#[test]
fn always_valid_override_answers_every_instant() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 4, 0, 0, data([("lang", "en")]))?;

    assert_eq!(t.state("post", 4, 0)?, Some(data([("lang", "en")])));
    assert_eq!(t.state("post", 4, NOW)?, Some(data([("lang", "en")])));

    Ok(())
}

#[test]
fn closed_window_stops_covering_after_its_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 5, NOW - DAY, NOW + DAY, data([("banner", "sale")]))?;

    assert!(t.state("post", 5, NOW + DAY)?.is_some());
    assert_eq!(t.state("post", 5, NOW + DAY + 1)?, None);

    Ok(())
}

#[test]
fn unknown_entity_type_is_empty_not_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    assert_eq!(t.state("never-seen", 1, NOW)?, None);

    let names: Vec<String> = t
        .engine
        .entity_types()?
        .into_iter()
        .map(|(_, name)| name)
        .collect();
    assert_eq!(names, vec!["never-seen".to_string()]);

    Ok(())
}

// ============================================================================
// Timeline shape
// ============================================================================

#[test]
fn touching_equal_overrides_collapse_into_one_segment() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 10, NOW - 2 * DAY, NOW, data([("title", "same")]))?;
    t.set("post", 10, NOW, NOW + 2 * DAY, data([("title", "same")]))?;

    let timeline = t.engine.state_timeline("post", 10)?;
    assert_eq!(timeline.len(), 1);
    assert_eq!(timeline[0].begin, NOW - 2 * DAY);
    assert_eq!(timeline[0].end, NOW + 2 * DAY);

    Ok(())
}

#[test]
fn timeline_boundaries_come_from_fact_windows() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 11, 100, 400, data([("a", 1i64)]))?;
    t.set("post", 11, 200, 300, data([("b", 2i64)]))?;

    let bounds: Vec<(i64, i64)> = t
        .engine
        .state_timeline("post", 11)?
        .iter()
        .map(|s| (s.begin, s.end))
        .collect();
    assert_eq!(bounds, vec![(100, 200), (200, 300), (300, 400)]);

    Ok(())
}

#[test]
fn recompute_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 12, NOW - 4 * DAY, 0, data([("title", "one")]))?;
    t.set("post", 12, NOW - 2 * DAY, NOW + DAY, data([("title", "two")]))?;
    t.set("post", 12, NOW - DAY, NOW, data([("extra", true)]))?;

    let digest = |segments: &[timeslice_storage::StateSegment]| -> Result<[u8; 32], Box<dyn std::error::Error>> {
        let mut hasher = blake3::Hasher::new();
        for segment in segments {
            hasher.update(&segment.begin.to_be_bytes());
            hasher.update(&segment.end.to_be_bytes());
            hasher.update(&rmp_serde::to_vec(&segment.data)?);
        }
        Ok(*hasher.finalize().as_bytes())
    };

    let before = t.engine.state_timeline("post", 12)?;
    t.engine.recompute_overrides("post", 12)?;
    t.engine.recompute_overrides("post", 12)?;
    let after = t.engine.state_timeline("post", 12)?;

    assert_eq!(before, after);
    assert_eq!(digest(&before)?, digest(&after)?);

    Ok(())
}

// ============================================================================
// Soft delete and audit
// ============================================================================

#[test]
fn idle_override_is_excluded_but_retained() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 20, NOW - 5 * DAY, 0, data([("title", "base")]))?;
    let fix = t.set("post", 20, NOW - DAY, 0, data([("title", "typo")]))?;

    t.engine.set_override_idle(fix, true)?;
    assert_eq!(t.state("post", 20, NOW)?, Some(data([("title", "base")])));

    let history = t.engine.override_history("post", 20)?;
    assert_eq!(history.len(), 2);
    assert!(history.iter().any(|f| f.id == fix && f.idle));

    t.engine.set_override_idle(fix, false)?;
    assert_eq!(t.state("post", 20, NOW)?, Some(data([("title", "typo")])));

    Ok(())
}

#[test]
fn provenance_is_assigned_by_the_engine() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    t.set("post", 21, 0, 0, data([("title", "x")]))?;

    let history = t.engine.override_history("post", 21)?;
    assert_eq!(history[0].actor, ACTOR);
    assert_eq!(history[0].timestamp, NOW);

    Ok(())
}

#[test]
fn idling_a_missing_fact_is_not_found() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    let result = t.engine.set_override_idle(timeslice_core::FactId::new(999), true);
    assert!(matches!(result, Err(EngineError::FactNotFound(_))));
    Ok(())
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn missing_actor_is_rejected_before_persistence() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    let result = t
        .engine
        .record_override(OverrideWrite::new("post", 30, "  ", data([("title", "x")])));
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::MissingActor))
    ));
    assert!(t.engine.override_history("post", 30)?.is_empty());
    Ok(())
}

#[test]
fn caller_supplied_provenance_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    let result = t.set("post", 31, 0, 0, data([("title", Value::from("x")), ("timestamp", Value::from(5i64))]));
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::ReservedField(ref f))) if f == "timestamp"
    ));

    let result = t.set("post", 31, 0, 0, data([("actor", "mallory")]));
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::ReservedField(ref f))) if f == "actor"
    ));

    assert!(t.engine.override_history("post", 31)?.is_empty());
    Ok(())
}

#[test]
fn inverted_window_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let mut t = TestEngine::new()?;
    let result = t.set("post", 32, NOW, NOW - DAY, data([("title", "x")]));
    assert!(matches!(
        result,
        Err(EngineError::Validation(ValidationError::InvalidInterval { .. }))
    ));
    assert!(t.engine.override_history("post", 32)?.is_empty());
    Ok(())
}
