/// Shared synthetic-signal generators.
use std::f64::consts::PI;
use std::fmt::Write as _;
use std::path::Path;
use wakeup::Signal;

pub const SR: f64 = 40.0;

#[allow(unused)]
/// Pupil at 40 Hz: a low zigzag (0.20 / 0.21) until `step`, then flat `high`.
pub fn step_pupil(n: usize, step: usize, high: f64) -> Signal {
    step_pupil_between(n, step, 0.2, high)
}

#[allow(unused)]
/// Like [`step_pupil`] with an arbitrary low level.
pub fn step_pupil_between(n: usize, step: usize, low: f64, high: f64) -> Signal {
    let values = (0..n)
        .map(|i| if i < step { low + 0.01 * (i % 2) as f64 } else { high })
        .collect();
    Signal::from_rate(values, SR).unwrap()
}

#[allow(unused)]
/// Pupil at 40 Hz: flat 0.2 until `step`, a jump to 1.0 that relaxes by
/// 0.001 per sample over 200 samples, then flat 0.8.
pub fn dilation_pupil(n: usize, step: usize) -> Signal {
    let values = (0..n)
        .map(|i| match i.checked_sub(step) {
            None => 0.2,
            Some(j) if j < 200 => 1.0 - 0.001 * j as f64,
            Some(_) => 0.8,
        })
        .collect();
    Signal::from_rate(values, SR).unwrap()
}

#[allow(unused)]
/// Velocity at 40 Hz: `before` until sample `at`, `after` from it.
pub fn velocity_step(n: usize, at: usize, before: f64, after: f64) -> Signal {
    let values = (0..n).map(|i| if i < at { before } else { after }).collect();
    Signal::from_rate(values, SR).unwrap()
}

#[allow(unused)]
/// Write `(time, value)` rows with a header.
pub fn write_two_column(path: &Path, header: &str, sr: f64, secs: f64, f: impl Fn(f64) -> f64) {
    let n = (secs * sr) as usize;
    let mut text = format!("time,{header}\n");
    for i in 0..n {
        let t = i as f64 / sr;
        writeln!(text, "{t},{}", f(t)).unwrap();
    }
    std::fs::write(path, text).unwrap();
}

#[allow(unused)]
/// A 120 s recording folder with one dilation at 60 s, followed by 15 s of
/// strong whisking.  The whisker file spans 120 s in 4801 samples.
pub fn write_recording(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    write_two_column(&dir.join("pupil_size.csv"), "pupil", 40.0, 120.0, |t| {
        let level = if t >= 60.0 { 1.0 } else { 0.0 };
        level + 0.03 * (2.0 * PI * t / 4.0).sin()
    });
    write_two_column(&dir.join("calcium.csv"), "dff", 30.0, 120.0, |t| {
        1.0 + 0.1 * (2.0 * PI * t / 7.0).sin() + if t >= 60.0 { 0.5 } else { 0.0 }
    });
    write_two_column(&dir.join("arteriole_diameter.csv"), "diameter", 10.0, 120.0, |t| {
        10.0 + 0.2 * (2.0 * PI * t / 9.0).sin()
    });

    let mut text = String::new();
    for i in 0..=4800 {
        let t = i as f64 * 120.0 / 4800.0;
        let amp = if (60.0..75.0).contains(&t) { 1.0 } else { 0.1 };
        writeln!(text, "{}", amp * (2.0 * PI * 2.0 * t).sin()).unwrap();
    }
    std::fs::write(dir.join("resampled_whiskerAngle.csv"), text).unwrap();
}
