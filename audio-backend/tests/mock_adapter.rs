use audio_backend::MockAdapter;
use soundcard_core::{SampleFormat, Soundcard};

#[test]
fn record_init_then_record_advances_published_offset() {
    let adapter = MockAdapter::new(2, 44100, 256, SampleFormat::S16);
    adapter.record_init().unwrap();

    let before = adapter.get_published_offset().note_offset_absolute;
    for _ in 0..8 {
        adapter.record().unwrap();
    }
    let after = adapter.get_published_offset().note_offset_absolute;

    assert!(after >= before);
    assert!(adapter.is_recording());
    adapter.stop().unwrap();
}

#[test]
fn stop_is_idempotent_and_future_blocks_fail() {
    let adapter = MockAdapter::new(2, 44100, 256, SampleFormat::S16);
    adapter.play_init().unwrap();
    adapter.play().unwrap();

    adapter.stop().unwrap();
    assert!(adapter.stop().is_ok());
    assert!(adapter.play().is_err());
}

#[test]
fn pcm_info_round_trips_through_list_cards() {
    let adapter = MockAdapter::new(2, 44100, 256, SampleFormat::S16);
    let (ids, names) = adapter.list_cards().unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(names.len(), 1);

    let info = adapter.pcm_info(&ids[0]).unwrap();
    assert!(info.channels_min <= info.channels_max);
    assert!(info.rate_min <= info.rate_max);
    adapter.stop().unwrap();
}
