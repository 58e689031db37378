//! Periodic sampling of the measurement channels behind one shared timer.
//!
//! A [`PowerMonitor`] owns the device handle and a fixed set of four channels. Starting any
//! channel lazily creates a single polling thread; every tick reads the registers of the
//! enabled channels only and stores the converted values. The thread is torn down as soon as
//! the last channel is stopped, so at most one timer exists per monitor at any time.
//!
//! Ticks and the configuration setters reached through [`PowerMonitor::with_device`] share one
//! lock, so a tick never observes a half-applied calibration or configuration update.

use crate::channel::{Channel, ChannelKind, CHANNEL_COUNT};
use crate::config::Ina219Config;
use crate::driver::{Ina219, Ina219Error};
use embedded_hal::i2c::I2c;
use log::{debug, error, warn};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Fastest useful polling period, one full 12-bit shunt + bus conversion cycle with margin.
pub const MIN_PERIOD: Duration = Duration::from_millis(20);

pub const DEFAULT_PERIOD: Duration = MIN_PERIOD;

#[derive(Copy, Clone, Debug)]
struct ChannelState {
    enabled: bool,
    value: f32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            enabled: false,
            value: f32::NAN,
        }
    }
}

struct Sampler<I2C> {
    device: Ina219<I2C>,
    channels: [ChannelState; CHANNEL_COUNT],
    faults: u32,
}

impl<I2C> Sampler<I2C>
where
    I2C: I2c,
{
    fn tick(&mut self) {
        for kind in ChannelKind::ALL {
            if !self.channels[kind.index()].enabled {
                continue;
            }
            match self.device.read(kind) {
                Ok(value) => self.channels[kind.index()].value = value,
                // the previous value stays in place
                Err(e) => {
                    self.faults = self.faults.wrapping_add(1);
                    warn!(
                        "INA219 @ {:#04x}: {:?} sample failed: {}",
                        self.device.address(),
                        kind,
                        e
                    );
                }
            }
        }
    }
}

impl<I2C> Sampler<I2C> {
    fn any_enabled(&self) -> bool {
        self.channels.iter().any(|channel| channel.enabled)
    }

    fn disable_all(&mut self) {
        for channel in &mut self.channels {
            channel.enabled = false;
        }
    }
}

/// A running polling thread. Dropping it stops the thread and waits for the tick in progress.
struct PollTimer {
    period: Duration,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl PollTimer {
    fn spawn<I2C>(sampler: Arc<Mutex<Sampler<I2C>>>, period: Duration) -> io::Result<Self>
    where
        I2C: I2c + Send + 'static,
    {
        let (stop, stopped) = mpsc::channel::<()>();
        let thread = thread::Builder::new()
            .name("ina219-poll".into())
            .spawn(move || {
                let mut deadline = Instant::now().checked_add(period);
                loop {
                    let received = match deadline {
                        Some(deadline) => {
                            let timeout = deadline.saturating_duration_since(Instant::now());
                            stopped.recv_timeout(timeout)
                        }
                        // past the end of the clock: only a stop can arrive
                        None => stopped.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match received {
                        Err(RecvTimeoutError::Timeout) => {
                            lock(&sampler).tick();
                            deadline = next_deadline(deadline, period, Instant::now());
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })?;

        Ok(Self {
            period,
            stop: Some(stop),
            thread: Some(thread),
        })
    }
}

/// Advances a fixed-rate deadline. An overrun skips the missed ticks instead of bursting.
fn next_deadline(deadline: Option<Instant>, period: Duration, now: Instant) -> Option<Instant> {
    deadline
        .and_then(|deadline| deadline.checked_add(period))
        .filter(|next| *next >= now)
        .or_else(|| now.checked_add(period))
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        // disconnecting the channel wakes the thread
        drop(self.stop.take());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("INA219 polling thread panicked");
            }
        }
    }
}

struct Shared<I2C> {
    sampler: Arc<Mutex<Sampler<I2C>>>,
    timer: Mutex<Option<PollTimer>>,
    timers_spawned: AtomicUsize,
}

/// Shared-timer scheduler for the four channels of one device.
///
/// Cloning yields another handle to the same monitor. The polling thread stops when the last
/// handle (including [`MonitorChannel`]s) is dropped.
pub struct PowerMonitor<I2C> {
    shared: Arc<Shared<I2C>>,
}

impl<I2C> Clone for PowerMonitor<I2C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I2C> PowerMonitor<I2C>
where
    I2C: I2c + Send + 'static,
{
    pub fn new(device: Ina219<I2C>) -> Self {
        let sampler = Sampler {
            device,
            channels: [ChannelState::default(); CHANNEL_COUNT],
            faults: 0,
        };
        Self {
            shared: Arc::new(Shared {
                sampler: Arc::new(Mutex::new(sampler)),
                timer: Mutex::new(None),
                timers_spawned: AtomicUsize::new(0),
            }),
        }
    }

    /// Initializes the device and wraps it in a monitor. No channel is returned when the
    /// device cannot be identified.
    pub fn connect(i2c: I2C, config: Ina219Config) -> Result<Self, Ina219Error<I2C::Error>> {
        Ina219::new(i2c, config).map(Self::new)
    }

    /// Handle for channel `index` (see [`ChannelKind`] for the mapping).
    pub fn channel(&self, index: usize) -> Option<MonitorChannel<I2C>> {
        ChannelKind::try_from(index)
            .ok()
            .map(|kind| MonitorChannel {
                monitor: self.clone(),
                kind,
            })
    }

    /// Enables `kind` and starts the timer at `period` (at least [`MIN_PERIOD`]) if none is
    /// running. A running timer keeps its period.
    pub fn start(&self, kind: ChannelKind, period: Duration) -> io::Result<()> {
        let mut timer = lock(&self.shared.timer);
        lock(&self.shared.sampler).channels[kind.index()].enabled = true;
        if timer.is_none() {
            self.spawn_timer(&mut timer, period.max(MIN_PERIOD))?;
        }
        Ok(())
    }

    /// Disables `kind`, tearing the timer down when no channel is left enabled.
    pub fn stop(&self, kind: ChannelKind) {
        let mut timer = lock(&self.shared.timer);
        let any_enabled = {
            let mut sampler = lock(&self.shared.sampler);
            sampler.channels[kind.index()].enabled = false;
            sampler.any_enabled()
        };
        if !any_enabled {
            Self::teardown(&mut timer);
        }
    }

    pub fn stop_all(&self) {
        let mut timer = lock(&self.shared.timer);
        lock(&self.shared.sampler).disable_all();
        Self::teardown(&mut timer);
    }

    /// Recreates the timer at `period` (at least [`MIN_PERIOD`]) for the enabled channels.
    ///
    /// A tick in flight completes before the old timer is gone; the first tick of the new timer
    /// fires one full period later.
    pub fn change_period(&self, period: Duration) -> io::Result<()> {
        let mut timer = lock(&self.shared.timer);
        Self::teardown(&mut timer);
        if lock(&self.shared.sampler).any_enabled() {
            self.spawn_timer(&mut timer, period.max(MIN_PERIOD))?;
        }
        Ok(())
    }

    /// Runs one tick on the calling thread.
    pub fn poll_once(&self) {
        lock(&self.shared.sampler).tick();
    }

    /// Runs `f` with exclusive access to the device, between ticks.
    pub fn with_device<R>(&self, f: impl FnOnce(&mut Ina219<I2C>) -> R) -> R {
        f(&mut lock(&self.shared.sampler).device)
    }

    /// Stops polling and gives the device back, unless other handles to this monitor exist.
    pub fn release(self) -> Result<Ina219<I2C>, Self> {
        let shared = Arc::try_unwrap(self.shared).map_err(|shared| Self { shared })?;
        let timer = shared
            .timer
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        drop(timer);

        match Arc::try_unwrap(shared.sampler) {
            Ok(sampler) => Ok(sampler
                .into_inner()
                .unwrap_or_else(PoisonError::into_inner)
                .device),
            Err(sampler) => Err(Self {
                shared: Arc::new(Shared {
                    sampler,
                    timer: Mutex::new(None),
                    timers_spawned: shared.timers_spawned,
                }),
            }),
        }
    }

    fn spawn_timer(&self, timer: &mut Option<PollTimer>, period: Duration) -> io::Result<()> {
        match PollTimer::spawn(Arc::clone(&self.shared.sampler), period) {
            Ok(spawned) => {
                self.shared.timers_spawned.fetch_add(1, Ordering::Relaxed);
                debug!("polling every {:?}", period);
                *timer = Some(spawned);
                Ok(())
            }
            Err(e) => {
                // no timer, so no channel may stay enabled
                lock(&self.shared.sampler).disable_all();
                Err(e)
            }
        }
    }

    fn teardown(timer: &mut Option<PollTimer>) {
        if let Some(stopped) = timer.take() {
            debug!("stopping polling every {:?}", stopped.period);
            drop(stopped);
        }
    }
}

impl<I2C> PowerMonitor<I2C> {
    /// Last sampled value of `kind`, `NaN` until its first successful sample.
    pub fn value(&self, kind: ChannelKind) -> f32 {
        lock(&self.shared.sampler).channels[kind.index()].value
    }

    pub fn is_enabled(&self, kind: ChannelKind) -> bool {
        lock(&self.shared.sampler).channels[kind.index()].enabled
    }

    pub fn is_polling(&self) -> bool {
        lock(&self.shared.timer).is_some()
    }

    /// Period of the running timer.
    pub fn period(&self) -> Option<Duration> {
        lock(&self.shared.timer).as_ref().map(|timer| timer.period)
    }

    /// How many timers this monitor has created so far.
    pub fn timers_spawned(&self) -> usize {
        self.shared.timers_spawned.load(Ordering::Relaxed)
    }

    /// Samples that failed with a bus error.
    pub fn fault_count(&self) -> u32 {
        lock(&self.shared.sampler).faults
    }
}

/// One channel of a [`PowerMonitor`].
pub struct MonitorChannel<I2C> {
    monitor: PowerMonitor<I2C>,
    kind: ChannelKind,
}

impl<I2C> Clone for MonitorChannel<I2C> {
    fn clone(&self) -> Self {
        Self {
            monitor: self.monitor.clone(),
            kind: self.kind,
        }
    }
}

impl<I2C> MonitorChannel<I2C> {
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.monitor.is_enabled(self.kind)
    }
}

impl<I2C> MonitorChannel<I2C>
where
    I2C: I2c + Send + 'static,
{
    /// See [`PowerMonitor::change_period`]; applies to every enabled channel.
    pub fn change_period(&self, period: Duration) -> io::Result<()> {
        self.monitor.change_period(period)
    }
}

impl<I2C> Channel for MonitorChannel<I2C>
where
    I2C: I2c + Send + 'static,
{
    type Error = io::Error;

    fn start(&self, period: Duration) -> io::Result<()> {
        self.monitor.start(self.kind, period)
    }

    fn stop(&self) {
        self.monitor.stop(self.kind)
    }

    fn value(&self) -> f32 {
        self.monitor.value(self.kind)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
