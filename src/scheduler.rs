extern crate std;

use std::time::{Duration, Instant};

use crate::config;
use crate::network;
use crate::oebb;
use crate::structs;

pub const REFRESH_INTERVAL: Duration = Duration::from_millis(30000);
pub const SCROLL_INTERVAL: Duration = Duration::from_millis(100);
pub const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct IntervalTimer {
    period: Duration,
    last_fired: Option<Instant>,
}

impl IntervalTimer {
    /// Due on the first check.
    pub fn new(period: Duration) -> IntervalTimer {
        return IntervalTimer {
            period: period,
            last_fired: None,
        };
    }

    pub fn starting_at(period: Duration, start: Instant) -> IntervalTimer {
        return IntervalTimer {
            period: period,
            last_fired: Some(start),
        };
    }

    pub fn expired(&self, now: Instant) -> bool {
        match self.last_fired {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.period,
        }
    }

    pub fn rearm(&mut self, now: Instant) {
        self.last_fired = Some(now);
    }

    pub fn force(&mut self) {
        self.last_fired = None;
    }

    fn fire(&mut self, now: Instant) -> bool {
        if !self.expired(now) {
            return false;
        }
        self.rearm(now);
        return true;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Due {
    pub refresh: bool,
    pub scroll: bool,
}

impl Due {
    pub fn idle(&self) -> bool {
        return !self.refresh && !self.scroll;
    }
}

pub struct Scheduler {
    refresh: IntervalTimer,
    scroll: IntervalTimer,
}

impl Scheduler {
    pub fn new(start: Instant) -> Scheduler {
        return Scheduler::with_periods(start, REFRESH_INTERVAL, SCROLL_INTERVAL);
    }

    // Refresh is due on the first poll; scrolling waits a full period.
    pub fn with_periods(start: Instant, refresh_period: Duration, scroll_period: Duration) -> Scheduler {
        return Scheduler {
            refresh: IntervalTimer::new(refresh_period),
            scroll: IntervalTimer::starting_at(scroll_period, start),
        };
    }

    pub fn poll(&mut self, now: Instant) -> Due {
        return Due {
            refresh: self.refresh.fire(now),
            scroll: self.scroll.fire(now),
        };
    }

    pub fn request_refresh(&mut self) {
        self.refresh.force();
    }

    /// The fetch may block for seconds; count the next period from when it finished.
    pub fn refresh_finished(&mut self, now: Instant) {
        self.refresh.rearm(now);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(oebb::ParseReport),
    NoConnectivity,
    FetchFailed,
}

impl RefreshOutcome {
    /// Text for the error screen, if this outcome gets one.
    pub fn error_message(&self) -> Option<&'static str> {
        match *self {
            RefreshOutcome::Updated(_) => None,
            RefreshOutcome::NoConnectivity => Some("Kein WiFi"),
            RefreshOutcome::FetchFailed => Some("Keine Daten"),
        }
    }
}

pub struct Hooks {
    pub link_up: network::LinkFn,
    pub fetch: oebb::FetchFn,
}

impl Hooks {
    pub fn real() -> Hooks {
        return Hooks {
            link_up: network::link_up,
            fetch: oebb::real_fetch,
        };
    }
}

pub fn refresh_records(slots: &mut structs::Slots, settings: &config::Settings, hooks: &Hooks) -> RefreshOutcome {
    structs::invalidate_all(slots);

    if !(hooks.link_up)() {
        warn!("No network link");
        return RefreshOutcome::NoConnectivity;
    }

    let body = oebb::fetch_departures(&settings.api_base_url, &settings.station_id, hooks.fetch);
    if body.is_empty() {
        warn!("No API response");
        return RefreshOutcome::FetchFailed;
    }

    let report = oebb::parse_departures(&body, &settings.parse_options(), slots);
    info!("Parsed: {:?}", report);
    return RefreshOutcome::Updated(report);
}
