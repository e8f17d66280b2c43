use log::{debug, trace, warn};
use rtrb::{Consumer, Producer, RingBuffer};

use crate::common::F32ArrayExt;
use crate::config::EstimatorConfig;
use crate::envelope::ChunkPreprocessor;
use crate::error::{Error, InvalidInput};
use crate::pitch::{PitchEstimate, PitchEstimator, StabilityState, StabilityTracker};
use crate::pressure::PressureMapper;
use crate::registration::{pressure_feed, PressureFeed, PressureReading, TimeRegistration, TimeRegistrationEngine};

/// Level reported for chunks with zero RMS.
pub const SILENCE_LEVEL_DB: f32 = -120.0;

/// The published outputs of one processed chunk.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    /// Stabilized pitch in Hz, or 0 if there is no lock.
    pub pitch_hz: f32,
    /// Estimated pressure in cmH2O, or 0 if the pitch is out of range.
    pub pressure_cm_h2o: f32,
    pub run_length: usize,
    /// The unstabilized candidate of this chunk.
    pub raw: PitchEstimate,
    /// Mean of the chunk's envelope.
    pub energy: f32,
    /// RMS level of the input chunk in dB.
    pub level_db: f32,
    /// End of the chunk, in seconds.
    pub timestamp_secs: f64,
}

/// The receiving end of a snapshot channel.
pub struct SnapshotReceiver {
    consumer: Consumer<Snapshot>,
}

impl SnapshotReceiver {
    /// Pops the oldest pending snapshot.
    pub fn pop(&mut self) -> Option<Snapshot> {
        self.consumer.pop().ok()
    }

    /// Drains all pending snapshots and returns the newest one.
    pub fn latest(&mut self) -> Option<Snapshot> {
        let mut latest = None;
        while let Ok(snapshot) = self.consumer.pop() {
            latest = Some(snapshot);
        }
        latest
    }

    /// The number of pending snapshots.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    /// Returns true if the session has been dropped or has opened a new
    /// channel.
    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

/// A PEP pitch and pressure estimation session.
///
/// Chunks of audio are processed one at a time with
/// [`process_chunk`](Self::process_chunk). Each chunk goes through the
/// envelope preprocessor, the pitch estimator, the stability tracker and the
/// pressure mapper, and yields a [`Snapshot`]. The aggregate envelope energy
/// of every chunk is also recorded for time registration against pressure
/// sensor readings.
///
/// Pressure readings are either recorded directly with
/// [`record_pressure_reading`](Self::record_pressure_reading) or pushed from
/// another thread through a [`PressureFeed`].
///
/// ```
/// use pep_ear::{EstimatorConfig, Session};
///
/// let mut session = Session::new(EstimatorConfig::default()).unwrap();
/// let snapshot = session.process_chunk(&[0.0; 4410]).unwrap();
/// assert_eq!(snapshot.pitch_hz, 0.0);
/// assert_eq!(snapshot.pressure_cm_h2o, 0.0);
/// assert!((snapshot.timestamp_secs - 0.1).abs() < 1e-9);
/// ```
pub struct Session {
    config: EstimatorConfig,
    preprocessor: ChunkPreprocessor,
    estimator: PitchEstimator,
    tracker: StabilityTracker,
    mapper: PressureMapper,
    registration: TimeRegistrationEngine,
    /// Audio samples processed since creation or the last reset.
    processed_samples: u64,
    snapshot: Snapshot,
    pressure_feed: Option<Consumer<PressureReading>>,
    snapshot_channel: Option<Producer<Snapshot>>,
}

impl Session {
    /// Creates a session, validating `config` first.
    pub fn new(config: EstimatorConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: EstimatorConfig) -> Self {
        Session {
            preprocessor: ChunkPreprocessor::new(&config),
            estimator: PitchEstimator::new(&config),
            tracker: StabilityTracker::new(&config),
            mapper: PressureMapper::new(config.min_freq, config.max_freq, config.calibration),
            registration: TimeRegistrationEngine::new(&config.registration),
            processed_samples: 0,
            snapshot: Snapshot::default(),
            pressure_feed: None,
            snapshot_channel: None,
            config,
        }
    }

    /// Processes a chunk timestamped with the session's audio clock, the
    /// number of seconds of audio processed so far including this chunk.
    pub fn process_chunk(&mut self, samples: &[f32]) -> Result<Snapshot, Error> {
        let end = self.processed_samples + samples.len() as u64;
        let timestamp_secs = end as f64 / f64::from(self.config.sample_rate);
        self.process_chunk_at(samples, timestamp_secs)
    }

    /// Processes a chunk ending at `timestamp_secs`, in the time base shared
    /// with the pressure readings. Timestamps must not decrease from one
    /// chunk to the next.
    ///
    /// Nothing is modified if the input is rejected.
    pub fn process_chunk_at(&mut self, samples: &[f32], timestamp_secs: f64) -> Result<Snapshot, Error> {
        validate_chunk(samples)?;
        if !timestamp_secs.is_finite() {
            return Err(InvalidInput::NonFiniteTimestamp { timestamp_secs }.into());
        }
        if let Some(previous) = self.registration.energy_history().latest_timestamp() {
            if timestamp_secs < previous {
                return Err(InvalidInput::TimestampOutOfOrder {
                    previous,
                    got: timestamp_secs,
                }
                .into());
            }
        }

        self.poll_pressure_feed();

        let envelope = self.preprocessor.process(samples);
        let raw = self.estimator.estimate(envelope);
        let mut energy = envelope.mean_level();
        if !energy.is_finite() {
            // Finite samples near f32::MAX overflow once squared.
            warn!("chunk energy at {:.3}s is not finite, recording 0", timestamp_secs);
            energy = 0.0;
        }
        trace!(
            "candidate {:.2} Hz, correlation {:.3}, lag {}",
            raw.frequency_hz,
            raw.correlation,
            raw.lag_samples
        );

        self.tracker.update(&raw);
        if self.tracker.run_length() == 0 {
            // Lock lost: search the full lag range until a new lock is
            // acquired. See the lock loss notes in DESIGN.md.
            self.estimator.clear_prediction();
        }

        let pitch_hz = self.tracker.final_pitch();
        self.registration.record_energy(timestamp_secs, energy)?;
        self.processed_samples += samples.len() as u64;

        self.snapshot = Snapshot {
            pitch_hz,
            pressure_cm_h2o: self.mapper.pressure(pitch_hz),
            run_length: self.tracker.run_length(),
            raw,
            energy,
            level_db: level_db(samples),
            timestamp_secs,
        };
        self.publish();
        Ok(self.snapshot)
    }

    fn publish(&mut self) {
        if let Some(channel) = self.snapshot_channel.as_mut() {
            if channel.push(self.snapshot).is_err() {
                warn!(
                    "snapshot channel full, dropping snapshot at {:.3}s",
                    self.snapshot.timestamp_secs
                );
            }
        }
    }

    /// Records a pressure sensor reading. Readings pending in the pressure
    /// feed are recorded first.
    ///
    /// May update the time registration, which is a diagnostic and does not
    /// affect pitch or pressure estimation.
    pub fn record_pressure_reading(&mut self, value_cm_h2o: f32, timestamp_secs: f64) -> Result<(), Error> {
        self.poll_pressure_feed();
        self.registration.record_pressure(PressureReading {
            timestamp_secs,
            value_cm_h2o,
        })?;
        Ok(())
    }

    /// Records all readings pending in the pressure feed. Invalid readings
    /// are logged and dropped. Returns the number of readings recorded.
    pub fn poll_pressure_feed(&mut self) -> usize {
        let Some(feed) = self.pressure_feed.as_mut() else {
            return 0;
        };
        let mut recorded = 0;
        while let Ok(reading) = feed.pop() {
            match self.registration.record_pressure(reading) {
                Ok(_) => recorded += 1,
                Err(error) => warn!("dropping pressure reading from feed: {}", error),
            }
        }
        recorded
    }

    /// Opens a feed through which another thread can push pressure readings
    /// without blocking. Replaces any previously opened feed; readings still
    /// queued in the old feed are recorded first.
    pub fn pressure_feed(&mut self, capacity: usize) -> PressureFeed {
        self.poll_pressure_feed();
        let (feed, consumer) = pressure_feed(capacity);
        self.pressure_feed = Some(consumer);
        debug!("opened pressure feed with capacity {}", capacity);
        feed
    }

    /// Opens a channel receiving the snapshot of every processed chunk.
    /// Snapshots are dropped while the channel is full. Replaces any
    /// previously opened channel.
    pub fn snapshot_channel(&mut self, capacity: usize) -> SnapshotReceiver {
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        self.snapshot_channel = Some(producer);
        SnapshotReceiver { consumer }
    }

    /// Clears all estimation state: the stability state, the predicted lag,
    /// both time registration histories, the registration offset and the
    /// audio clock. Readings still queued in the pressure feed are discarded.
    /// Open feeds and channels stay connected.
    pub fn reset(&mut self) {
        if let Some(feed) = self.pressure_feed.as_mut() {
            while feed.pop().is_ok() {}
        }
        self.estimator.reset();
        self.tracker.reset();
        self.registration.reset();
        self.processed_samples = 0;
        self.snapshot = Snapshot::default();
        debug!("session reset");
    }

    pub fn pitch_hz(&self) -> f32 {
        self.snapshot.pitch_hz
    }

    pub fn pressure_cm_h2o(&self) -> f32 {
        self.snapshot.pressure_cm_h2o
    }

    pub fn run_length(&self) -> usize {
        self.snapshot.run_length
    }

    /// The most recently accepted time registration.
    pub fn registration(&self) -> TimeRegistration {
        self.registration.registration()
    }

    /// The snapshot of the most recently processed chunk.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn stability_state(&self) -> &StabilityState {
        self.tracker.state()
    }

    /// The lag, in envelope samples, the next pitch search is centered on.
    pub fn predicted_lag(&self) -> Option<usize> {
        self.estimator.predicted_lag()
    }

    pub fn energy_history_len(&self) -> usize {
        self.registration.energy_history().len()
    }

    pub fn pressure_history_len(&self) -> usize {
        self.registration.pressure_history().len()
    }

    /// The time registration engine, for diagnostics.
    pub fn registration_engine(&self) -> &TimeRegistrationEngine {
        &self.registration
    }

    /// Seconds of audio processed since creation or the last reset.
    pub fn elapsed_secs(&self) -> f64 {
        self.processed_samples as f64 / f64::from(self.config.sample_rate)
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::with_valid_config(EstimatorConfig::default())
    }
}

fn validate_chunk(samples: &[f32]) -> Result<(), InvalidInput> {
    if samples.is_empty() {
        return Err(InvalidInput::EmptyChunk);
    }
    match samples.iter().position(|sample| !sample.is_finite()) {
        Some(index) => Err(InvalidInput::NonFiniteSample { index }),
        None => Ok(()),
    }
}

fn level_db(samples: &[f32]) -> f32 {
    let rms = samples.rms_level();
    if !rms.is_finite() {
        f32::INFINITY
    } else if rms > 0.0 {
        samples.rms_level_db().max(SILENCE_LEVEL_DB)
    } else {
        SILENCE_LEVEL_DB
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    // A 980 Hz carrier, amplitude modulated at `modulation_hz`.
    fn modulated_tone(modulation_hz: f32, start: usize, sample_count: usize) -> Vec<f32> {
        (start..start + sample_count)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE;
                let modulation = 1.0 + (2.0 * core::f32::consts::PI * modulation_hz * t).sin();
                0.5 * modulation * (2.0 * core::f32::consts::PI * 980.0 * t).sin()
            })
            .collect()
    }

    fn locked_session() -> Session {
        let mut session = Session::default();
        for i in 0..5 {
            session.process_chunk(&modulated_tone(20.0, i * 8820, 8820)).unwrap();
        }
        assert_eq!(session.run_length(), 5);
        session
    }

    #[test]
    fn test_lock_acquisition() {
        let session = locked_session();
        assert!((session.pitch_hz() - 20.0).abs() <= 0.5, "pitch {}", session.pitch_hz());
        // 0.68 * 20 - 1.2
        assert!((session.pressure_cm_h2o() - 12.4).abs() <= 0.5);
        assert_eq!(session.predicted_lag(), Some(49));
        assert_eq!(session.snapshot().raw.lag_samples, 49);
        assert_eq!(session.energy_history_len(), 5);
    }

    #[test]
    fn test_rejects_invalid_chunks() {
        let mut session = locked_session();
        let before = *session.snapshot();

        let error = session.process_chunk(&[]).unwrap_err();
        assert!(matches!(error, Error::InvalidInput(InvalidInput::EmptyChunk)));

        let mut chunk = vec![0.0; 4410];
        chunk[17] = f32::NAN;
        let error = session.process_chunk(&chunk).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidInput(InvalidInput::NonFiniteSample { index: 17 })
        ));

        chunk[17] = f32::INFINITY;
        assert!(session.process_chunk(&chunk).unwrap_err().is_invalid_input());

        let error = session.process_chunk_at(&[0.0; 4410], 0.1).unwrap_err();
        assert!(matches!(
            error,
            Error::InvalidInput(InvalidInput::TimestampOutOfOrder { .. })
        ));
        assert!(session.process_chunk_at(&[0.0; 4410], f64::NAN).is_err());

        assert_eq!(session.snapshot(), &before);
        assert_eq!(session.energy_history_len(), 5);
    }

    #[test]
    fn test_silence_drains_run_length() {
        let mut session = locked_session();
        let mut previous_run_length = session.run_length();
        for _ in 0..8 {
            let snapshot = session.process_chunk(&[0.0; 8820]).unwrap();
            assert!(snapshot.run_length <= previous_run_length);
            assert_eq!(snapshot.raw, PitchEstimate::NONE);
            assert_eq!(snapshot.energy, 0.0);
            assert_eq!(snapshot.level_db, SILENCE_LEVEL_DB);
            previous_run_length = snapshot.run_length;
        }
        assert_eq!(session.run_length(), 0);
        assert_eq!(session.pitch_hz(), 0.0);
        assert_eq!(session.pressure_cm_h2o(), 0.0);
        // Lock loss widens the next search to the full range.
        assert_eq!(session.predicted_lag(), None);
    }

    #[test]
    fn test_overflowing_chunk_records_zero_energy() {
        let mut session = locked_session();
        // Finite samples whose squares overflow f32.
        let chunk: Vec<f32> = (0..8820).map(|i| if i % 2 == 0 { 1e20 } else { -1e20 }).collect();
        let snapshot = session.process_chunk(&chunk).unwrap();
        assert_eq!(snapshot.energy, 0.0);
        assert_eq!(snapshot.raw, PitchEstimate::NONE);
        assert_eq!(snapshot.level_db, f32::INFINITY);
        assert_eq!(session.energy_history_len(), 6);
        for point in session.registration_engine().energy_history().iter() {
            assert!(point.energy.is_finite());
        }
        assert!(session.registration_engine().search().confidence.is_finite());
    }

    #[test]
    fn test_silence_from_start() {
        let mut session = Session::default();
        for _ in 0..10 {
            let snapshot = session.process_chunk(&[0.0; 4410]).unwrap();
            assert_eq!(snapshot.pitch_hz, 0.0);
            assert_eq!(snapshot.pressure_cm_h2o, 0.0);
            assert_eq!(snapshot.run_length, 0);
        }
        assert!((session.elapsed_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset() {
        let mut session = locked_session();
        session.record_pressure_reading(10.0, 0.5).unwrap();
        assert_eq!(session.pressure_history_len(), 1);

        session.reset();
        assert_eq!(session.pitch_hz(), 0.0);
        assert_eq!(session.pressure_cm_h2o(), 0.0);
        assert_eq!(session.run_length(), 0);
        assert_eq!(session.energy_history_len(), 0);
        assert_eq!(session.pressure_history_len(), 0);
        assert_eq!(session.registration(), TimeRegistration::default());
        assert_eq!(session.predicted_lag(), None);
        assert_eq!(session.stability_state(), &StabilityState::default());
        assert_eq!(session.elapsed_secs(), 0.0);

        // A reset session behaves like a new one.
        let mut fresh = Session::default();
        let chunk = modulated_tone(20.0, 0, 8820);
        assert_eq!(session.process_chunk(&chunk).unwrap(), fresh.process_chunk(&chunk).unwrap());
    }

    #[test]
    fn test_record_pressure_reading() {
        let mut session = Session::default();
        session.record_pressure_reading(5.0, 1.0).unwrap();
        let error = session.record_pressure_reading(5.0, 0.5).unwrap_err();
        assert!(error.is_invalid_input());
        assert!(session.record_pressure_reading(f32::NAN, 2.0).is_err());
        assert_eq!(session.pressure_history_len(), 1);
    }

    #[test]
    fn test_pressure_feed() {
        let mut session = Session::default();
        let mut feed = session.pressure_feed(8);
        feed.push(5.0, 0.1).unwrap();
        feed.push(6.0, 0.2).unwrap();
        // Out of order, dropped when drained.
        feed.push(7.0, 0.15).unwrap();
        assert_eq!(session.pressure_history_len(), 0);

        session.process_chunk(&[0.0; 4410]).unwrap();
        assert_eq!(session.pressure_history_len(), 2);

        feed.push(8.0, 0.3).unwrap();
        assert_eq!(session.poll_pressure_feed(), 1);
        assert_eq!(session.poll_pressure_feed(), 0);

        // Queued readings are discarded by a reset.
        feed.push(9.0, 0.4).unwrap();
        session.reset();
        assert_eq!(session.poll_pressure_feed(), 0);
        assert_eq!(session.pressure_history_len(), 0);

        // A new feed replaces the old one.
        let _replacement = session.pressure_feed(8);
        assert!(feed.is_abandoned());
    }

    #[test]
    fn test_snapshot_channel() {
        let mut session = Session::default();
        let mut receiver = session.snapshot_channel(2);
        for _ in 0..3 {
            session.process_chunk(&[0.0; 4410]).unwrap();
        }
        // The third snapshot did not fit.
        assert_eq!(receiver.pending(), 2);
        let first = receiver.pop().unwrap();
        assert!((first.timestamp_secs - 0.1).abs() < 1e-9);
        let latest = receiver.latest().unwrap();
        assert!((latest.timestamp_secs - 0.2).abs() < 1e-9);
        assert!(receiver.pop().is_none());
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = EstimatorConfig::default();
        config.min_freq = 50.0;
        assert!(matches!(Session::new(config), Err(Error::InvalidConfig { .. })));
    }
}
