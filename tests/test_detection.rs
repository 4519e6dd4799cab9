mod common;
use common::{dilation_pupil, step_pupil, step_pupil_between, velocity_step, SR};
use wakeup::{detect_events, BlockFate, Block, OnsetSelection, PipelineConfig, Signal};

#[test]
fn step_with_whisker_surge_yields_one_event() {
    let pupil = dilation_pupil(1500, 500);
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();

    assert_eq!(d.sampling_rate, 40);
    assert_eq!(d.blocks.len(), 1);
    assert_eq!(d.blocks[0].block, Block::new(0, 1499));
    assert_eq!(d.events.len(), 1);
    // The further a downward window reaches into the relaxation after the
    // step, the more negative its sum, so the last scanned offset before the
    // step wins.  The scan visits every 0.25 s (9 or 10 samples at 40 Hz) and
    // the step sample itself is above the 0.5 onset ceiling, so the onset
    // lands within one stride before sample 500 rather than on it.
    let onset = d.events[0];
    assert!((490..500).contains(&onset), "onset {onset}");
    match d.blocks[0].fate {
        BlockFate::Validated { onset: o, ratio } => {
            assert_eq!(o, onset);
            assert!(ratio > 1.5, "ratio {ratio}");
        }
        ref other => panic!("unexpected fate {other:?}"),
    }
}

#[test]
fn whisker_quieting_rejects_the_event() {
    let pupil = dilation_pupil(1500, 500);
    let velocity = velocity_step(1500, 500, 0.3, 0.05);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert!(d.events.is_empty());
    assert_eq!(d.refined().len(), 1);
    assert!(matches!(d.blocks[0].fate, BlockFate::RejectedByWhisker { ratio, .. } if ratio < 1.5));
}

#[test]
fn flat_pupil_has_no_blocks() {
    // Baseline std is zero everywhere but so is every mean shift.
    let pupil = Signal::from_rate(vec![1.0; 1500], SR).unwrap();
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert_eq!(d.n_changes, 0);
    assert!(d.blocks.is_empty());
    assert!(d.events.is_empty());
}

#[test]
fn block_below_midline_is_dropped() {
    let pupil = step_pupil_between(1500, 500, 0.05, 0.45);
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert_eq!(d.blocks.len(), 1);
    assert_eq!(d.blocks[0].fate, BlockFate::DroppedAtMidline);
    assert!(d.events.is_empty());
}

#[test]
fn narrow_block_is_dropped_at_amplitude() {
    let pupil = step_pupil_between(1500, 500, 0.3, 0.7);
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert_eq!(d.blocks.len(), 1);
    assert_eq!(d.blocks[0].fate, BlockFate::DroppedAtAmplitude);
}

#[test]
fn short_whisker_recording_skips_the_event() {
    let pupil = dilation_pupil(1500, 500);
    // 15 s of whisker data cannot hold a 15 s window starting at ~12 s.
    let velocity = velocity_step(600, 500, 0.1, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert!(d.events.is_empty());
    match &d.blocks[0].fate {
        BlockFate::Skipped { onset: Some(o), reason } => {
            assert!((490..500).contains(o));
            assert!(reason.contains("does not fit"), "{reason}");
        }
        other => panic!("unexpected fate {other:?}"),
    }
}

#[test]
fn least_downward_keeps_the_earliest_flat_onset() {
    // plotter.py behaviour: every downward window that ends before the step
    // sums to 0, the highest value, so the first offset whose 5 s baseline
    // fits wins (200 at a stride of 10, 207 at a stride of 9).
    let pupil = dilation_pupil(1500, 500);
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let least = PipelineConfig { onset_selection: OnsetSelection::LeastDownward, ..PipelineConfig::default() };
    let d = detect_events(&pupil, &velocity, &least).unwrap();
    assert_eq!(d.events.len(), 1);
    assert!((195..215).contains(&d.events[0]), "onset {}", d.events[0]);

    let most = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert!((490..500).contains(&most.events[0]), "onset {}", most.events[0]);
}

#[test]
fn refined_onset_window_stays_in_bounds() {
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    for pupil in [dilation_pupil(1500, 500), step_pupil(1500, 500, 1.0)] {
        for selection in [OnsetSelection::LeastDownward, OnsetSelection::MostDownward] {
            let cfg = PipelineConfig { onset_selection: selection, ..PipelineConfig::default() };
            let d = detect_events(&pupil, &velocity, &cfg).unwrap();
            let mut seen = 0;
            for report in &d.blocks {
                let onset = match report.fate {
                    BlockFate::Validated { onset, .. } | BlockFate::RejectedByWhisker { onset, .. } => onset,
                    BlockFate::Skipped { onset: Some(onset), .. } => onset,
                    _ => continue,
                };
                seen += 1;
                assert!(report.block.start <= onset && onset < report.block.end);
                assert!(onset + 599 <= pupil.len());
                assert!(onset >= 199);
            }
            assert_eq!(seen, d.refined().len());
            assert!(seen > 0);
        }
    }
}

#[test]
fn zero_whisker_baseline_is_skipped_not_fatal() {
    let pupil = dilation_pupil(1500, 500);
    let velocity = velocity_step(1500, 500, 0.0, 0.3);
    let d = detect_events(&pupil, &velocity, &PipelineConfig::default()).unwrap();
    assert!(d.events.is_empty());
    assert!(matches!(&d.blocks[0].fate, BlockFate::Skipped { reason, .. } if reason.contains("degenerate")));
}

#[test]
fn structural_errors_abort_the_run() {
    let velocity = velocity_step(1500, 500, 0.1, 0.3);
    let empty = Signal { time: vec![], values: vec![] };
    assert!(detect_events(&empty, &velocity, &PipelineConfig::default()).is_err());

    let backwards = Signal { time: vec![0.0, 0.2, 0.1], values: vec![0.0; 3] };
    assert!(detect_events(&backwards, &velocity, &PipelineConfig::default()).is_err());

    let cfg = PipelineConfig { scan_step_secs: 0.0, ..PipelineConfig::default() };
    assert!(detect_events(&step_pupil(1500, 500, 1.0), &velocity, &cfg).is_err());
}
