mod common;

use common::constant_store;
use modmix::{
    BufferSink, Engine, NullSink, Pattern, PatternCell, PlaybackController, PlaybackState,
    RenderConfig, RenderOptions, Repeat,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn fast_config(repeat: Repeat) -> anyhow::Result<RenderConfig> {
    Ok(RenderConfig::from_tick_seconds(0.001, 2, repeat)?.with_sample_rate(8_000)?)
}

#[test]
fn infinite_loop_stops_with_one_callback() -> anyhow::Result<()> {
    let engine = Engine::new(constant_store("pad", 40, 64));
    let pattern = Pattern::new(vec![vec![PatternCell::note("pad", "C-4")], vec![]]);

    let calls = Arc::new(AtomicUsize::new(0));
    let stop_sent = Arc::new(AtomicBool::new(false));
    let called_after_stop = Arc::new(AtomicBool::new(false));
    let (counter, sent, after) = (calls.clone(), stop_sent.clone(), called_after_stop.clone());

    let handle = engine.play(&pattern, &fast_config(Repeat::Forever)?, NullSink::new(), move |_| {
        after.store(sent.load(Ordering::SeqCst), Ordering::SeqCst);
        counter.fetch_add(1, Ordering::SeqCst);
    })?;

    thread::sleep(Duration::from_millis(50));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(handle.state(), PlaybackState::Playing);

    stop_sent.store(true, Ordering::SeqCst);
    handle.stop();
    handle.stop();
    let summary = handle.wait()?;

    assert!(summary.stopped);
    assert!(summary.passes > 0);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(called_after_stop.load(Ordering::SeqCst));
    Ok(())
}

#[test]
fn dropping_infinite_handle_stops_session() -> anyhow::Result<()> {
    let engine = Engine::new(constant_store("pad", 40, 64));
    let pattern = Pattern::new(vec![vec![PatternCell::note("pad", "C-4")]]);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let handle = engine.play(&pattern, &fast_config(Repeat::Forever)?, NullSink::new(), move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    })?;
    drop(handle);

    for _ in 0..200 {
        if calls.load(Ordering::SeqCst) == 1 {
            break;
        }
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn finite_playback_matches_offline_render() -> anyhow::Result<()> {
    let engine = Engine::new(constant_store("pad", 40, 64));
    let pattern = Pattern::new(vec![
        vec![PatternCell::note("pad", "C-4")],
        vec![PatternCell::note("pad", "G-4").with_volume(20)],
    ]);
    let config = RenderConfig::try_from(
        RenderOptions::rows_per_minute(600.0)
            .with_speed(4)
            .with_repeat(3)
            .with_sample_rate(11_025),
    )?;

    let offline = engine.render(&pattern, &config)?;
    let sink = Arc::new(Mutex::new(BufferSink::new()));
    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let summary = engine
        .play(&pattern, &config, Arc::clone(&sink), move |_| {
            flag.store(true, Ordering::SeqCst)
        })?
        .wait()?;

    assert!(done.load(Ordering::SeqCst));
    assert_eq!(summary.passes, 3);
    assert!(!summary.stopped);
    assert_eq!(sink.lock().samples(), offline.as_slice());
    Ok(())
}

#[test]
fn infinite_empty_pattern_is_rejected() -> anyhow::Result<()> {
    let engine = Engine::new(constant_store("pad", 40, 64));
    let result = engine.play(&Pattern::new(Vec::new()), &fast_config(Repeat::Forever)?, NullSink::new(), |_| {});
    assert!(matches!(result, Err(modmix::ModMixError::InvalidArgument(_))));
    Ok(())
}
