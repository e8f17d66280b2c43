//! Drives a session with synthetic PEP breathing audio while a simulated
//! pressure sensor pushes readings from another thread.
//!
//! Run with `RUST_LOG=debug` to see lock and time registration events.

use std::thread;
use std::time::Duration;

use pep_ear::{EstimatorConfig, Session};
use rand::{rngs::StdRng, Rng, SeedableRng};

const SAMPLE_RATE: f64 = 44100.0;
const CHUNK_SIZE: usize = 8820;
const CHUNK_COUNT: usize = 150;
const SENSOR_LAG_SECS: f64 = 0.3;

/// Flutter rate over one exhalation cycle of six seconds, rising from 12 Hz
/// to 28 Hz and back.
fn flutter_freq(t: f64) -> f64 {
    let cycle = (t % 6.0) / 6.0;
    12.0 + 16.0 * (std::f64::consts::PI * cycle).sin()
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut session = Session::new(EstimatorConfig::default()).unwrap();
    let mut feed = session.pressure_feed(1024);
    let calibration = session.config().calibration;

    let sensor = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(5);
        // 50 Hz readings of the true pressure, lagging the audio.
        for i in 0..(CHUNK_COUNT * 10) {
            let t = i as f64 * 0.02;
            let pressure = calibration.slope * flutter_freq(t) as f32 + calibration.intercept;
            let noise = rng.gen_range(-0.2..0.2);
            if feed.push(pressure + noise, t + SENSOR_LAG_SECS).is_err() {
                eprintln!("pressure feed full");
            }
            thread::sleep(Duration::from_micros(200));
        }
    });

    let mut rng = StdRng::seed_from_u64(6);
    let mut phase = 0.0_f64;
    let mut sample_index = 0_usize;
    for chunk_index in 0..CHUNK_COUNT {
        let chunk: Vec<f32> = (0..CHUNK_SIZE)
            .map(|_| {
                let t = sample_index as f64 / SAMPLE_RATE;
                sample_index += 1;
                phase += 2.0 * std::f64::consts::PI * flutter_freq(t) / SAMPLE_RATE;
                let flutter = 1.0 + phase.sin();
                let carrier = (2.0 * std::f64::consts::PI * 980.0 * t).sin();
                (0.3 * flutter * carrier) as f32 + rng.gen_range(-0.02..0.02)
            })
            .collect();

        let snapshot = session.process_chunk(&chunk).unwrap();
        if chunk_index % 5 == 0 {
            println!(
                "t={:6.2}s  true {:5.1} Hz  pitch {:5.1} Hz  pressure {:5.1} cmH2O  run {}  level {:6.1} dB",
                snapshot.timestamp_secs,
                flutter_freq(snapshot.timestamp_secs),
                snapshot.pitch_hz,
                snapshot.pressure_cm_h2o,
                snapshot.run_length,
                snapshot.level_db
            );
        }
    }

    sensor.join().unwrap();
    session.poll_pressure_feed();

    let registration = session.registration();
    println!(
        "sensor offset {:.2}s (simulated {:.2}s), confidence {:.2}",
        registration.offset_secs, SENSOR_LAG_SECS, registration.confidence
    );
}
