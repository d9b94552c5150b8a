extern crate anyhow;
extern crate chrono_tz;
extern crate serde;
extern crate serde_json;

use anyhow::Context;
use crate::oebb;
use crate::result;
use crate::structs;

pub const DEFAULT_STATION_ID: &str = "8100151"; // Gmunden
pub const DEFAULT_API_BASE_URL: &str = "http://168.119.111.217:3000/oebb-departures";
pub const DEFAULT_TIMEZONE: chrono_tz::Tz = chrono_tz::Europe::Vienna;

pub const MAX_STATION_ID_LEN: usize = 63;
pub const MAX_TRACK_ID_LEN: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub station_id: String,
    // Empty means every platform.
    pub track_id: String,
    pub api_base_url: String,
    pub timezone: String,
    pub slots: usize,
}

impl Default for Settings {
    fn default() -> Settings {
        return Settings {
            station_id: DEFAULT_STATION_ID.to_string(),
            track_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timezone: DEFAULT_TIMEZONE.name().to_string(),
            slots: 1,
        };
    }
}

impl Settings {
    pub fn set_station(&mut self, station_id: &str) -> result::DashResult<()> {
        let station_id = station_id.trim();
        if station_id.is_empty() {
            return Err(result::make_error("Station id must not be empty"));
        }
        if station_id.chars().count() > MAX_STATION_ID_LEN {
            return Err(result::make_error(&format!(
                "Station id longer than {} characters", MAX_STATION_ID_LEN)));
        }
        self.station_id = station_id.to_string();
        return Ok(());
    }

    pub fn set_track(&mut self, track_id: &str) -> result::DashResult<()> {
        let track_id = track_id.trim();
        if track_id.chars().count() > MAX_TRACK_ID_LEN {
            return Err(result::make_error(&format!(
                "Track longer than {} characters", MAX_TRACK_ID_LEN)));
        }
        self.track_id = track_id.to_string();
        return Ok(());
    }

    pub fn set_slots(&mut self, slots: usize) -> result::DashResult<()> {
        if slots < 1 || slots > structs::SLOT_COUNT {
            return Err(result::make_error(&format!(
                "Slots must be between 1 and {}", structs::SLOT_COUNT)));
        }
        self.slots = slots;
        return Ok(());
    }

    /// Runs values that bypassed the setters (a settings file) through them.
    pub fn validate(&mut self) -> result::DashResult<()> {
        let station_id = self.station_id.clone();
        self.set_station(&station_id)?;
        let track_id = self.track_id.clone();
        self.set_track(&track_id)?;
        let slots = self.slots;
        self.set_slots(slots)?;
        return Ok(());
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        match self.timezone.parse::<chrono_tz::Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!("Unknown timezone '{}', using {}", self.timezone, DEFAULT_TIMEZONE.name());
                DEFAULT_TIMEZONE
            },
        }
    }

    pub fn parse_options(&self) -> oebb::ParseOptions {
        return oebb::ParseOptions {
            platform_filter: self.track_id.clone(),
            max_matches: self.slots,
        };
    }

    pub fn describe_track(&self) -> &str {
        if self.track_id.is_empty() {
            return "ALLE";
        }
        return &self.track_id;
    }
}

pub fn settings_from_file<P: AsRef<std::path::Path>>(path: P) -> result::DashResult<Settings> {
    let debug_path = path.as_ref().display().to_string();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Opening settings from '{}'", debug_path))?;
    let reader = std::io::BufReader::new(file);
    let mut settings: Settings = serde_json::from_reader(reader)
        .with_context(|| format!("while parsing settings '{}'", debug_path))?;
    if let Err(err) = settings.validate() {
        return Err(result::make_error(&format!("Invalid settings in '{}': {}", debug_path, err)));
    }
    return Ok(settings);
}

pub fn save_settings<P: AsRef<std::path::Path>>(path: P, settings: &Settings) -> result::DashResult<()> {
    let debug_path = path.as_ref().display().to_string();
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)
        .with_context(|| format!("Writing settings to '{}'", debug_path))?;
    return Ok(());
}
