//! Integration tests for patchbay-core.
//!
//! Exercises whole-unit scenarios through the public API: fan-in and
//! one-to-one aliasing across resizes, resize events, persistence round trips,
//! and a render thread refreshing snapshots while another thread resizes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use patchbay_core::{
    AudioUnit, BufferFormat, RangeId, RenderSnapshot, ResizeEvent, Role, TopologyError,
    TopologyFlags, TopologyLimits,
};

fn fan_in_unit() -> AudioUnit {
    AudioUnit::builder()
        .parallel_paths(2)
        .output_pads(1)
        .input_pads(4)
        .flags(TopologyFlags::fan_in())
        .build()
        .unwrap()
}

/// Input ranges at `path`, in pad order.
fn input_column(unit: &AudioUnit, path: usize) -> Vec<RangeId> {
    unit.read(|t| {
        (0..t.pad_count(Role::Input))
            .map(|pad| t.channel_at(Role::Input, pad, path).unwrap())
            .map(|id| t.span(id).unwrap().first)
            .collect()
    })
}

/// Ranges covered by the output channel at `(pad, path)`.
fn output_ranges(unit: &AudioUnit, pad: usize, path: usize) -> Vec<RangeId> {
    unit.read(|t| {
        let id = t.channel_at(Role::Output, pad, path).unwrap();
        t.span(id)
            .map(|span| t.span_ranges(span).collect())
            .unwrap_or_default()
    })
}

// ============================================================================
// 1. Fan-in scenario
// ============================================================================

#[test]
fn fan_in_outputs_cover_every_input_pad() {
    let unit = fan_in_unit();
    unit.read(|t| {
        assert_eq!(t.channel_count(Role::Output), 2);
        assert_eq!(t.channel_count(Role::Input), 8);
        assert_eq!(t.range_count(), 8);
    });
    for path in 0..2 {
        assert_eq!(output_ranges(&unit, 0, path), input_column(&unit, path));
        assert_eq!(output_ranges(&unit, 0, path).len(), 4);
    }
}

#[test]
fn growing_input_pads_extends_fan_in_spans() {
    let unit = fan_in_unit();
    let outputs_before: Vec<_> = unit.read(|t| t.channels(Role::Output).map(|c| c.id).collect());

    let report = unit.set_pad_count(Role::Input, 6).unwrap();
    assert_eq!(report.created_channels, 4);
    assert_eq!(report.allocated_ranges, 4);
    assert_eq!(report.realiased_channels, 2);

    let outputs_after: Vec<_> = unit.read(|t| t.channels(Role::Output).map(|c| c.id).collect());
    assert_eq!(outputs_before, outputs_after, "output channels must survive");
    for path in 0..2 {
        let covered = output_ranges(&unit, 0, path);
        assert_eq!(covered.len(), 6);
        assert_eq!(covered, input_column(&unit, path));
    }
    unit.verify().unwrap();
}

#[test]
fn fan_in_pad_grow_leaves_other_outputs_untouched() {
    let unit = fan_in_unit();
    unit.set_pad_count(Role::Output, 3).unwrap();
    let spans_before: Vec<_> = unit.read(|t| t.channels(Role::Output).map(|c| c.span).collect());

    // Growing the output role adds outputs but must not recompute existing spans.
    let report = unit.set_pad_count(Role::Output, 4).unwrap();
    assert_eq!(report.realiased_channels, 2);
    let spans_after: Vec<_> = unit.read(|t| t.channels(Role::Output).map(|c| c.span).collect());
    assert_eq!(&spans_after[..6], spans_before.as_slice());
}

// ============================================================================
// 2. One-to-one scenario
// ============================================================================

#[test]
fn sync_outputs_alias_single_inputs() {
    let unit = AudioUnit::builder()
        .parallel_paths(2)
        .output_pads(1)
        .input_pads(1)
        .flags(TopologyFlags::sync())
        .build()
        .unwrap();

    unit.read(|t| {
        for output in t.channels(Role::Output) {
            let input = t.channel_at(Role::Input, output.pad, output.path).unwrap();
            let span = output.span.unwrap();
            assert!(span.is_single());
            assert_eq!(Some(span), t.span(input));
            assert!(t.has_aliasers(span.first));
        }
    });
}

#[test]
fn shrinking_sync_outputs_releases_no_input_ranges() {
    let unit = AudioUnit::builder()
        .parallel_paths(2)
        .output_pads(1)
        .input_pads(1)
        .flags(TopologyFlags::sync())
        .build()
        .unwrap();
    let inputs = input_column(&unit, 0)
        .into_iter()
        .chain(input_column(&unit, 1))
        .collect::<Vec<_>>();

    let report = unit.set_pad_count(Role::Output, 0).unwrap();
    assert_eq!(report.destroyed_channels, 2);
    assert_eq!(report.released_ranges, 0);

    unit.read(|t| {
        assert_eq!(t.channel_count(Role::Output), 0);
        assert_eq!(t.range_count(), 2);
        for range in &inputs {
            assert!(t.range(*range).is_some(), "input range {range} must survive");
            assert!(!t.has_aliasers(*range));
        }
    });
    unit.verify().unwrap();
}

#[test]
fn sync_source_shrink_severs_orphaned_aliases() {
    let unit = AudioUnit::builder()
        .parallel_paths(1)
        .output_pads(3)
        .input_pads(3)
        .flags(TopologyFlags::sync())
        .build()
        .unwrap();

    let report = unit.set_pad_count(Role::Input, 1).unwrap();
    assert_eq!(report.released_ranges, 2);
    assert_eq!(report.realiased_channels, 2);
    unit.read(|t| {
        let spans: Vec<bool> = t.channels(Role::Output).map(|c| c.span.is_some()).collect();
        assert_eq!(spans, vec![true, false, false]);
    });

    unit.set_pad_count(Role::Input, 3).unwrap();
    unit.read(|t| assert!(t.channels(Role::Output).all(|c| c.span.is_some())));
}

// ============================================================================
// 3. Events, limits, persistence
// ============================================================================

#[test]
fn events_carry_old_and_new_values() {
    let unit = fan_in_unit();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    unit.on_resize(move |event| sink.lock().unwrap().push(event.clone()));

    unit.set_parallel_path_count(3).unwrap();
    unit.set_parallel_path_count(3).unwrap();
    unit.set_pad_count(Role::Input, 2).unwrap();
    unit.set_flags(TopologyFlags::independent()).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        ResizeEvent::ParallelPaths { old: 2, new: 3, .. }
    ));
    match &events[1] {
        ResizeEvent::Pads {
            role, old, new, report, ..
        } => {
            assert_eq!((*role, *old, *new), (Role::Input, 4, 2));
            assert_eq!(report.released_ranges, 6);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(events.iter().all(|e| e.unit() == unit.id()));
}

#[test]
fn limits_leave_unit_unchanged() {
    let unit = AudioUnit::builder()
        .parallel_paths(2)
        .input_pads(2)
        .limits(TopologyLimits {
            max_parallel_paths: 4,
            max_pads: 4,
        })
        .build()
        .unwrap();
    let before = unit.topology_snapshot();

    assert!(matches!(
        unit.set_parallel_path_count(5),
        Err(TopologyError::TooManyParallelPaths { requested: 5, limit: 4 })
    ));
    assert!(matches!(
        unit.set_pad_count(Role::Input, 9),
        Err(TopologyError::TooManyPads { .. })
    ));
    assert_eq!(unit.topology_snapshot(), before);
}

#[test]
fn snapshot_restore_round_trip() {
    let unit = fan_in_unit();
    unit.set_format(BufferFormat {
        samplerate: 48_000,
        buffer_size: 256,
    })
    .unwrap();
    let snapshot = unit.topology_snapshot();
    let restored = snapshot.restore().unwrap();
    assert_eq!(restored.topology_snapshot(), snapshot);
    assert_eq!(restored.format().samplerate, 48_000);
}

#[test]
fn handles_do_not_cross_units() {
    let a = fan_in_unit();
    let b = fan_in_unit();
    let foreign = a.read(|t| t.first(Role::Input).unwrap());
    b.read(|t| {
        assert!(t.channel(foreign).is_none());
        assert!(t.span(foreign).is_none());
    });
}

// ============================================================================
// 4. Render thread
// ============================================================================

#[test]
fn failed_reservation_leaves_unit_untouched() {
    let unit = AudioUnit::builder()
        .parallel_paths(2)
        .output_pads(1)
        .input_pads(4)
        .flags(TopologyFlags::fan_in())
        .limits(TopologyLimits {
            max_parallel_paths: usize::MAX,
            max_pads: usize::MAX,
        })
        .build()
        .unwrap();
    let events = Arc::new(Mutex::new(0usize));
    let seen = Arc::clone(&events);
    unit.on_resize(move |_| *seen.lock().unwrap() += 1);

    let before = unit.topology_snapshot();
    let revision = unit.revision();

    let err = unit.set_pad_count(Role::Input, usize::MAX / 2).unwrap_err();
    assert!(matches!(err, TopologyError::AllocationFailed { what: "channels", .. }));
    let err = unit.set_parallel_path_count(usize::MAX / 4).unwrap_err();
    assert!(matches!(err, TopologyError::AllocationFailed { what: "channels", .. }));

    assert_eq!(unit.topology_snapshot(), before);
    assert_eq!(unit.revision(), revision);
    assert_eq!(*events.lock().unwrap(), 0);
    unit.verify().unwrap();

    // The unit keeps working after a refused request.
    unit.set_pad_count(Role::Input, 6).unwrap();
    assert_eq!(output_ranges(&unit, 0, 1), input_column(&unit, 1));
    unit.verify().unwrap();
}

#[test]
fn pad_counts_without_paths_build_instantly() {
    let unit = AudioUnit::builder()
        .limits(TopologyLimits {
            max_parallel_paths: usize::MAX,
            max_pads: usize::MAX,
        })
        .input_pads(usize::MAX)
        .output_pads(3)
        .build()
        .unwrap();
    assert_eq!(unit.pad_count(Role::Input), usize::MAX);
    assert_eq!(unit.read(|t| t.channel_count(Role::Input)), 0);
    unit.verify().unwrap();

    let err = unit.set_parallel_path_count(1).unwrap_err();
    assert!(matches!(err, TopologyError::AllocationFailed { .. }));
    assert_eq!(unit.parallel_path_count(), 0);

    let report = unit.set_pad_count(Role::Input, 2).unwrap();
    assert!(report.is_empty());
    unit.set_parallel_path_count(2).unwrap();
    assert_eq!(unit.read(|t| t.channel_count(Role::Input)), 4);
    unit.verify().unwrap();
}

#[test]
fn render_thread_only_sees_consistent_snapshots() {
    let unit = fan_in_unit();
    let stop = Arc::new(AtomicBool::new(false));

    let render = {
        let unit = unit.clone();
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut snapshot = RenderSnapshot::with_capacity(64, 256);
            while !stop.load(Ordering::Relaxed) {
                // A busy lock keeps the previous snapshot.
                let _ = unit.try_snapshot_spans(&mut snapshot);
                // Every output span covers the full input column of the same revision.
                let inputs = snapshot.entries(Role::Input).len();
                let width = snapshot.parallel_path_count();
                for entry in snapshot.entries(Role::Output) {
                    let expected = if width == 0 { 0 } else { inputs / width };
                    assert_eq!(entry.span_len(), expected);
                }
            }
            snapshot.revision()
        })
    };

    for step in 0..200 {
        unit.set_pad_count(Role::Input, 1 + step % 7).unwrap();
        unit.set_parallel_path_count(1 + step % 3).unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    let seen = render.join().unwrap();
    assert!(seen <= unit.revision());
    unit.verify().unwrap();

    let mut snapshot = RenderSnapshot::new();
    assert!(unit.snapshot_spans(&mut snapshot));
    assert!(!unit.snapshot_spans(&mut snapshot));
}
