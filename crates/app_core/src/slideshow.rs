//! Timed automatic draws

use crate::draw::DrawEngine;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Slideshow settings; `start` spawns the loop
pub struct Slideshow {
    engine: DrawEngine,
    interval: Duration,
    max_draws: Option<usize>,
}

impl Slideshow {
    pub fn new(engine: DrawEngine, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            max_draws: None,
        }
    }

    /// Stop on its own after `count` draws
    pub fn max_draws(mut self, count: usize) -> Self {
        self.max_draws = Some(count);
        self
    }

    /// Draw immediately, then on every tick
    ///
    /// A tick that finds a draw or restore in flight is skipped. The loop
    /// ends when stopped, when nothing is left to draw, or after
    /// `max_draws` draws have settled.
    pub fn start(self, runtime: &Handle) -> SlideshowHandle {
        let running = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(Notify::new());
        let draws = Arc::new(AtomicUsize::new(0));

        let task = runtime.spawn(run(
            self,
            Arc::clone(&running),
            Arc::clone(&stop),
            Arc::clone(&draws),
        ));

        SlideshowHandle {
            control: SlideshowControl { running, stop },
            draws,
            task,
        }
    }
}

/// Cloneable stop switch for a running slideshow
#[derive(Clone)]
pub struct SlideshowControl {
    running: Arc<AtomicBool>,
    stop: Arc<Notify>,
}

impl SlideshowControl {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        self.stop.notify_one();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct SlideshowHandle {
    control: SlideshowControl,
    draws: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl SlideshowHandle {
    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_running(&self) -> bool {
        self.control.is_running()
    }

    pub fn control(&self) -> SlideshowControl {
        self.control.clone()
    }

    /// Draws started so far
    pub fn draws(&self) -> usize {
        self.draws.load(Ordering::Relaxed)
    }

    /// Wait for the loop to end
    pub async fn join(self) -> usize {
        if let Err(e) = self.task.await {
            tracing::warn!("Slideshow task ended abnormally: {}", e);
        }
        self.draws.load(Ordering::Relaxed)
    }
}

async fn run(slideshow: Slideshow, running: Arc<AtomicBool>, stop: Arc<Notify>, draws: Arc<AtomicUsize>) {
    let Slideshow {
        engine,
        interval: period,
        max_draws,
    } = slideshow;

    tracing::info!("Slideshow started, interval {:?}", period);

    if engine.perform_random_draw() {
        draws.fetch_add(1, Ordering::Relaxed);

        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            if max_draws.is_some_and(|max| draws.load(Ordering::Relaxed) >= max) {
                tokio::select! {
                    _ = engine.settled() => {}
                    _ = stop.notified() => {}
                }
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.notified() => break,
            }

            if !running.load(Ordering::Acquire) {
                break;
            }
            if !engine.can_draw() {
                tracing::info!("Slideshow stopped: nothing left to draw");
                break;
            }

            let snapshot = engine.snapshot();
            if snapshot.is_drawing() || snapshot.is_restoring() {
                tracing::trace!("Slideshow tick skipped: draw in flight");
                continue;
            }

            if engine.perform_random_draw() {
                draws.fetch_add(1, Ordering::Relaxed);
            }
        }
    } else {
        tracing::info!("Slideshow not started: nothing to draw");
    }

    running.store(false, Ordering::Release);
    tracing::info!("Slideshow ended after {} draw(s)", draws.load(Ordering::Relaxed));
}
