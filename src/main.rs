// sudo apt-get install fonts-roboto libssl-dev
extern crate anyhow;
extern crate flexi_logger;
extern crate getopts;
extern crate image;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde_derive;
extern crate std;

mod clock;
mod config;
mod display;
mod drawing;
mod marquee;
mod network;
mod oebb;
mod portal;
mod result;
mod scheduler;
mod structs;

use anyhow::Context;

const DEFAULT_PORTAL_PORT: u16 = 8080;
const LOG_ROTATE_BYTES: u64 = 1_000_000;
const LOG_KEEP_FILES: usize = 5;

struct OebbDash<'a> {
    settings: config::Settings,
    config_path: Option<String>,
    slots: structs::Slots,
    renderer: drawing::Renderer<'a>,
    panels: Vec<Box<dyn display::Panel>>,
    scheduler: scheduler::Scheduler,
    hooks: scheduler::Hooks,
    portal: Option<portal::Portal>,
}

impl<'a> OebbDash<'a> {
    fn one_iteration(&mut self, now: std::time::Instant) -> bool {
        if self.poll_portal() {
            self.scheduler.request_refresh();
        }

        let due = self.scheduler.poll(now);
        if due.idle() {
            return false;
        }

        let mut refreshed = false;

        if due.refresh {
            self.refresh();
            self.scheduler.refresh_finished(std::time::Instant::now());
            refreshed = true;
        }

        if due.scroll {
            self.scroll();
        }

        return refreshed;
    }

    fn poll_portal(&mut self) -> bool {
        let portal = match self.portal.as_ref() {
            Some(portal) => portal,
            None => return false,
        };

        match portal.process(&mut self.settings, self.renderer.canvas()) {
            portal::PortalEvent::Nothing => return false,
            portal::PortalEvent::SettingsChanged => {},
        }

        if let Some(path) = self.config_path.as_ref() {
            match config::save_settings(path, &self.settings) {
                Ok(_) => info!("Saved settings to {}", path),
                Err(err) => error!("Could not save settings: {}", err),
            }
        }
        return true;
    }

    fn refresh(&mut self) {
        info!("Refreshing station {} track {}",
              self.settings.station_id, self.settings.describe_track());

        let outcome = scheduler::refresh_records(&mut self.slots, &self.settings, &self.hooks);
        info!("{} of {} slots valid", structs::valid_count(&self.slots), structs::SLOT_COUNT);
        let dirty = match outcome.error_message() {
            Some(message) => self.renderer.draw_error_screen(message),
            None => {
                let now = clock::current_time(&self.settings.tz(), true);
                self.renderer.draw_full_screen(&mut self.slots, &now)
            },
        };
        self.show(dirty);
    }

    fn scroll(&mut self) {
        for slot in 0..structs::SLOT_COUNT {
            if !self.slots[slot].wants_scroll_tick() {
                continue;
            }
            let dirty = self.renderer.draw_info_line(slot, &mut self.slots[slot]);
            self.show(dirty);
        }
    }

    fn show(&mut self, dirty: display::Dirty) {
        if dirty == display::Dirty::Clean {
            return;
        }
        let canvas = self.renderer.canvas();
        for panel in self.panels.iter_mut() {
            if let Err(err) = panel.show(canvas, dirty) {
                error!("Showing on {} failed: {}", panel.name(), err);
            }
        }
    }
}

fn options() -> getopts::Options {
    let mut opts = getopts::Options::new();
    opts.optflag("d", "skip-display", "don't drive the ST7789 panel");
    opts.optflag("o", "one-shot", "refresh once, then exit");
    opts.optopt("i", "save-image", "Where to put a png.", "FILENAME");
    opts.optopt("c", "config", "JSON settings file, rewritten by the portal", "FILENAME");
    opts.optopt("", "station", "ÖBB station id", "ID");
    opts.optopt("", "track", "only show this platform", "TRACK");
    opts.optopt("", "api-url", "departures API base URL", "URL");
    opts.optopt("", "timezone", "timezone for the clock", "TZ");
    opts.optopt("", "slots", "how many departures to show (1 or 2)", "N");
    opts.optopt("", "portal-port", "port for the settings portal, 0 disables it", "PORT");
    opts.optopt("", "log-dir", "where the log files go", "DIR");
    opts.optopt("", "font", "regular TTF font", "FILE");
    opts.optopt("", "font-bold", "bold TTF font", "FILE");
    opts.optflag("h", "help", "print this help");
    return opts;
}

// File first, flags on top.
fn settings_from_args(matches: &getopts::Matches) -> result::DashResult<config::Settings> {
    let mut settings = match matches.opt_str("config") {
        Some(path) if std::path::Path::new(&path).exists() => config::settings_from_file(&path)?,
        Some(path) => {
            warn!("No settings at {}, starting from defaults", path);
            config::Settings::default()
        },
        None => config::Settings::default(),
    };

    if let Some(station) = matches.opt_str("station") {
        settings.set_station(&station)?;
    }
    if let Some(track) = matches.opt_str("track") {
        settings.set_track(&track)?;
    }
    if let Some(url) = matches.opt_str("api-url") {
        settings.api_base_url = url;
    }
    if let Some(tz) = matches.opt_str("timezone") {
        settings.timezone = tz;
    }
    if let Some(slots) = matches.opt_str("slots") {
        let slots = slots.parse::<usize>()
            .with_context(|| format!("--slots '{}'", slots))?;
        settings.set_slots(slots)?;
    }
    return Ok(settings);
}

fn portal_port(matches: &getopts::Matches) -> result::DashResult<u16> {
    return match matches.opt_str("portal-port") {
        Some(port) => Ok(port.parse::<u16>().with_context(|| format!("--portal-port '{}'", port))?),
        None => Ok(DEFAULT_PORTAL_PORT),
    };
}

fn start_logger(log_dir: &str) -> result::DashResult<flexi_logger::LoggerHandle> {
    let handle = flexi_logger::Logger::try_with_env_or_str("info")?
        .log_to_file(flexi_logger::FileSpec::default().directory(log_dir))
        .duplicate_to_stderr(flexi_logger::Duplicate::Info)
        .rotate(
            flexi_logger::Criterion::Size(LOG_ROTATE_BYTES),
            flexi_logger::Naming::Numbers,
            flexi_logger::Cleanup::KeepLogFiles(LOG_KEEP_FILES))
        .start()?;
    return Ok(handle);
}

fn run() -> result::DashResult<()> {
    let args: Vec<String> = std::env::args().collect();
    let opts = options();
    let matches = opts.parse(&args[1..])
        .map_err(|err| result::make_error(&err.to_string()))?;

    if matches.opt_present("help") {
        print!("{}", opts.usage(&format!("Usage: {} [options]", args[0])));
        return Ok(());
    }

    let log_dir = matches.opt_str("log-dir").unwrap_or("./".to_string());
    let _logger = start_logger(&log_dir)?;

    let display = !matches.opt_present("skip-display");
    let one_shot = matches.opt_present("one-shot");
    let settings = settings_from_args(&matches)?;

    info!("Running. display={} one-shot={} settings={:?}", display, one_shot, settings);

    let styles = drawing::Styles::load(
        &matches.opt_str("font").unwrap_or(drawing::DEFAULT_FONT.to_string()),
        &matches.opt_str("font-bold").unwrap_or(drawing::DEFAULT_FONT_BOLD.to_string()))?;

    let mut panels: Vec<Box<dyn display::Panel>> = vec![];
    if display {
        panels.push(Box::new(display::St7789Panel::new()?));
    }
    if let Some(path) = matches.opt_str("save-image") {
        panels.push(Box::new(display::PngPanel::new(&path)));
    }

    let portal = match portal_port(&matches)? {
        0 => None,
        _ if one_shot => None,
        port => Some(portal::Portal::start(port, &log_dir)?),
    };

    let mut dash = OebbDash {
        settings: settings,
        config_path: matches.opt_str("config"),
        slots: structs::empty_slots(),
        renderer: drawing::Renderer::new(styles),
        panels: panels,
        scheduler: scheduler::Scheduler::new(std::time::Instant::now()),
        hooks: scheduler::Hooks::real(),
        portal: portal,
    };

    let boot = dash.renderer.draw_boot_screen();
    dash.show(boot);

    loop {
        let refreshed = dash.one_iteration(std::time::Instant::now());
        if one_shot && refreshed {
            break;
        }
        std::thread::sleep(scheduler::IDLE_SLEEP);
    }

    return Ok(());
}

fn main() {
    if let Err(err) = run() {
        error!("Fatal: {}", err);
        eprintln!("{}", err);
        std::process::exit(1);
    }
}
