// Integration tests for survey session state: navigation, artifact
// storage and the recording/upload exclusion

mod common;

use common::{artifact, FakeStream};
use phoneme_survey::{RecordingError, Session};

fn session(phonemes: &[&str]) -> Session {
    let mut session = Session::new();
    session.set_phonemes(phonemes.iter().map(|p| p.to_string()).collect());
    session
}

#[test]
fn test_navigation_stays_within_bounds() {
    let mut session = session(&["a", "b", "c"]);

    assert!(!session.retreat(), "cannot go before the first item");
    assert!(session.advance());
    assert!(session.advance());
    assert!(session.is_last_item());
    assert!(!session.advance(), "cannot go past the last item");
    assert_eq!(session.current_phoneme(), Some("c"));
}

#[test]
fn test_navigation_blocked_while_recording() {
    let mut session = session(&["a", "b"]);
    session.begin_recording().unwrap();

    assert!(!session.advance());
    assert_eq!(session.current_index(), 0);

    session.end_recording();
    assert!(session.advance());
}

#[test]
fn test_navigating_back_restores_the_same_artifact() {
    // Setup: record item 0, move on, come back
    let mut session = session(&["a", "b", "c"]);
    let recorded = artifact(128);
    session.stage_artifact(recorded.clone());

    assert!(session.advance());
    assert!(session.active_artifact().is_none());
    assert!(session.retreat());

    // Verify: the restored artifact is the recorded buffer, not a copy
    let restored = session.active_artifact().expect("artifact restored");
    assert!(restored.same_buffer(&recorded));
    assert!(session.recording("a").unwrap().same_buffer(&recorded));
}

#[test]
fn test_empty_stored_artifact_is_not_restored() {
    let mut session = session(&["a", "b"]);
    session.stage_artifact(artifact(0));
    session.advance();
    session.retreat();

    assert!(session.active_artifact().is_none());
}

#[test]
fn test_commit_active_without_staged_artifact() {
    let mut session = session(&["a"]);

    assert!(!session.commit_active());
    assert!(session.recordings().is_empty());
}

#[test]
fn test_upload_batch_follows_item_order() {
    let mut session = session(&["a", "b", "c"]);
    for _ in 0..3 {
        session.stage_artifact(artifact(8));
        session.commit_active();
        session.advance();
    }

    let batch: Vec<String> = session.upload_batch().into_iter().map(|(p, _)| p).collect();

    assert_eq!(batch, vec!["a", "b", "c"]);
}

#[test]
fn test_recording_refused_while_uploading() {
    let mut session = session(&["a"]);
    assert!(session.begin_upload());

    let result = session.begin_recording();

    assert!(matches!(result, Err(RecordingError::UploadInProgress)));
    assert!(!session.is_recording());
}

#[test]
fn test_upload_refused_while_recording_or_after_submission() {
    let mut session = session(&["a"]);

    session.begin_recording().unwrap();
    assert!(!session.begin_upload());
    session.end_recording();

    assert!(session.begin_upload());
    assert!(!session.begin_upload(), "second claim while uploading");

    let pass = session.session_id().to_string();
    session.finish_upload(&pass, true);
    assert!(session.has_submitted());
    assert!(!session.is_uploading());
    assert!(!session.begin_upload(), "already submitted");
}

#[test]
fn test_failed_upload_can_be_retried() {
    let mut session = session(&["a"]);

    assert!(session.begin_upload());
    let pass = session.session_id().to_string();
    session.finish_upload(&pass, false);

    assert!(!session.has_submitted());
    assert!(session.begin_upload());
}

#[test]
fn test_faulty_microphone_is_not_usable() {
    let mut session = session(&["a"]);
    session.set_microphone(Box::new(FakeStream::live(Vec::new())));
    assert!(session.usable_microphone().is_some());

    session.mark_microphone_faulty();

    assert!(session.has_microphone());
    assert!(session.usable_microphone().is_none());
}

#[test]
fn test_release_microphone_stops_tracks() {
    let mut session = session(&["a"]);
    let stream = FakeStream::live(Vec::new());
    let counters = std::sync::Arc::clone(&stream.counters);
    session.set_microphone(Box::new(stream));

    session.release_microphone();

    assert!(!session.has_microphone());
    assert_eq!(
        counters
            .streams_stopped
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

#[test]
fn test_restart_clears_progress_but_keeps_items() {
    let mut session = session(&["a", "b"]);
    session.stage_artifact(artifact(16));
    session.advance();
    let first_id = session.session_id().to_string();
    assert!(session.begin_upload());
    session.finish_upload(&first_id, true);

    session.reset_for_restart().unwrap();

    assert_ne!(session.session_id(), first_id);
    assert_eq!(session.phonemes().len(), 2);
    assert_eq!(session.current_index(), 0);
    assert!(session.recordings().is_empty());
    assert!(!session.has_submitted());
}

#[test]
fn test_restart_refused_while_uploading() {
    let mut session = session(&["a", "b"]);
    session.stage_artifact(artifact(16));
    let first_id = session.session_id().to_string();
    assert!(session.begin_upload());

    let result = session.reset_for_restart();

    // Verify: the pass is untouched and still owns the network side
    assert!(matches!(result, Err(RecordingError::UploadInProgress)));
    assert_eq!(session.session_id(), first_id);
    assert!(session.is_uploading());
    assert!(session.active_artifact().is_some());
    assert!(matches!(
        session.begin_recording(),
        Err(RecordingError::UploadInProgress)
    ));
}

#[test]
fn test_upload_result_for_an_earlier_pass_is_ignored() {
    let mut session = session(&["a"]);
    let stale = String::from("earlier-pass");
    assert!(session.begin_upload());

    session.finish_upload(&stale, true);

    // Verify: the network side is released but the pass stays open
    assert!(!session.is_uploading());
    assert!(!session.has_submitted());
    assert!(session.begin_upload());
}

#[test]
fn test_stats_reflect_recorded_items() {
    let mut session = session(&["a", "b", "c", "d"]);
    session.stage_artifact(artifact(100));
    session.advance();
    session.stage_artifact(artifact(50));
    session.commit_active();

    let stats = session.stats();

    assert_eq!(stats.total_items, 4);
    assert_eq!(stats.current_index, 1);
    assert_eq!(stats.recorded_items, 2);
    assert_eq!(stats.recorded_bytes, 150);
    assert!((stats.progress() - 0.5).abs() < f64::EPSILON);
}
